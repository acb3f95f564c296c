//! Instrumented browser facade.
//!
//! [`Browser`] specializes the proxy with the helpers test bodies
//! actually use: counted screenshots, form-field input, clicks that
//! accept either a locator or an already-resolved element, inline script
//! evaluation through a transient DOM node, and the derived
//! active-request probe. Everything forwards through the proxy dispatch
//! path, so every helper inherits logging, retry, and
//! screenshot-on-error.
//!
//! Backend-specific input behavior is an explicit [`InputStrategy`]
//! chosen at construction: the Internet-Explorer-compatible backend
//! cannot reliably inject keystrokes or native clicks into nested
//! frames, so it assigns values and fires clicks through inline scripts
//! instead.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use tracing::{info, warn};

use crate::backend::{BackendRef, BrowserKind, DriverCommand, Locator, WindowHandle};
use crate::error::{Error, Result};
use crate::proxy::{Call, DialogProxy, ElementProxy, ExecMode, Proxy};

// ============================================================================
// Constants
// ============================================================================

/// Id of the transient DOM node used to capture script return values.
const EVAL_NODE_ID: &str = "harness-eval-output";

// ============================================================================
// InputStrategy
// ============================================================================

/// How field input and clicks reach the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputStrategy {
    /// Native driver keystrokes and clicks.
    Native,
    /// Inline-script assignment and clicks, for backends where native
    /// injection inside nested frames is unreliable.
    Scripted,
}

impl InputStrategy {
    /// Selects the strategy for a browser kind.
    #[inline]
    #[must_use]
    pub fn for_kind(kind: BrowserKind) -> Self {
        match kind {
            BrowserKind::InternetExplorer => Self::Scripted,
            BrowserKind::Firefox | BrowserKind::Chrome => Self::Native,
        }
    }
}

// ============================================================================
// ClickTarget
// ============================================================================

/// What [`Browser::click`] acts on.
///
/// Either a locator resolved at click time or an element that was
/// already resolved (and is therefore proxy-wrapped).
#[derive(Clone)]
pub enum ClickTarget {
    /// Resolve this locator, then click.
    Locator(Locator),
    /// Click this element.
    Element(ElementProxy),
}

impl From<Locator> for ClickTarget {
    fn from(locator: Locator) -> Self {
        Self::Locator(locator)
    }
}

impl From<ElementProxy> for ClickTarget {
    fn from(element: ElementProxy) -> Self {
        Self::Element(element)
    }
}

impl From<&ElementProxy> for ClickTarget {
    fn from(element: &ElementProxy) -> Self {
        Self::Element(element.clone())
    }
}

// ============================================================================
// Screenshot State
// ============================================================================

/// Per-facade screenshot naming state.
///
/// Holds its own backend reference: diagnostic capture goes straight to
/// the delegate so a failing screenshot can never re-enter the
/// instrumented path it is diagnosing.
struct ScreenshotState {
    suffix: String,
    counter: AtomicU32,
    backend: BackendRef,
}

// ============================================================================
// Browser
// ============================================================================

/// Instrumented browser facade bound to one driver session.
#[derive(Clone)]
pub struct Browser {
    proxy: Proxy,
    strategy: InputStrategy,
    shots: Arc<ScreenshotState>,
}

impl fmt::Debug for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Browser")
            .field("kind", &self.kind())
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl Browser {
    /// Creates a facade over a backend and installs the
    /// screenshot-on-error diagnostic hook.
    #[must_use]
    pub fn new(
        backend: BackendRef,
        mode: ExecMode,
        strategy: InputStrategy,
        screenshot_suffix: impl Into<String>,
    ) -> Self {
        let proxy = Proxy::new(Arc::clone(&backend), mode);
        let shots = Arc::new(ScreenshotState {
            suffix: screenshot_suffix.into(),
            counter: AtomicU32::new(0),
            backend,
        });

        let hook_shots = Arc::clone(&shots);
        proxy.set_error_hook(Arc::new(move |_err| {
            let shots = Arc::clone(&hook_shots);
            Box::pin(async move {
                match Self::save_numbered_screenshot(&shots).await {
                    Ok(path) => {
                        info!(path = %path.display(), "Captured diagnostic screenshot");
                    }
                    Err(err) => {
                        warn!(error = %err, "Diagnostic screenshot failed");
                    }
                }
            })
        }));

        Self {
            proxy,
            strategy,
            shots,
        }
    }

    /// The underlying instrumented proxy.
    #[inline]
    #[must_use]
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    /// The browser kind this facade drives.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> BrowserKind {
        self.proxy.backend().kind()
    }

    /// The active input strategy.
    #[inline]
    #[must_use]
    pub fn input_strategy(&self) -> InputStrategy {
        self.strategy
    }
}

// ============================================================================
// Browser - Navigation & Introspection
// ============================================================================

impl Browser {
    /// Navigates to a URL.
    pub async fn goto(&self, url: impl Into<String>) -> Result<()> {
        self.proxy.navigate(url, Call::new()).await
    }

    /// Returns the current page title.
    pub async fn title(&self) -> Result<String> {
        self.proxy.title().await
    }

    /// Returns the current page source.
    pub async fn page_source(&self) -> Result<String> {
        self.proxy.page_source().await
    }

    /// Lists the handles of every open window.
    pub async fn window_handles(&self) -> Result<Vec<WindowHandle>> {
        self.proxy.window_handles().await
    }

    /// Switches session focus to a window.
    pub async fn switch_to_window(&self, handle: WindowHandle) -> Result<()> {
        self.proxy.switch_to_window(handle).await
    }

    /// Closes the focused window.
    pub async fn close_window(&self) -> Result<()> {
        self.proxy.close_window().await
    }

    /// Finds an element, wrapped in a child proxy.
    pub async fn find_element(&self, locator: Locator) -> Result<ElementProxy> {
        self.proxy
            .find_element(locator, Call::new())
            .await?
            .ok_or_else(|| Error::driver("element lookup returned no handle"))
    }

    /// Switches to the active modal dialog.
    pub async fn switch_to_dialog(&self) -> Result<DialogProxy> {
        self.proxy.switch_to_dialog().await
    }

    /// Terminates the driver session.
    pub async fn quit(&self) -> Result<()> {
        self.proxy.quit().await
    }
}

// ============================================================================
// Browser - Screenshots
// ============================================================================

impl Browser {
    /// Captures a screenshot into the working context, named
    /// `<suffix>_<n>.png` with `n` starting at 1 and strictly
    /// increasing per facade.
    ///
    /// Capture failures are logged and swallowed: this is a diagnostic
    /// helper and must never mask the failure it is documenting.
    /// Returns the written path on success.
    pub async fn do_screenshot(&self) -> Option<PathBuf> {
        match Self::save_numbered_screenshot(&self.shots).await {
            Ok(path) => {
                info!(path = %path.display(), "Saving screenshot");
                Some(path)
            }
            Err(err) => {
                warn!(error = %err, "Screenshot capture failed, continuing");
                None
            }
        }
    }

    /// Captures a screenshot to an explicit path.
    ///
    /// Unlike [`do_screenshot`](Self::do_screenshot) this propagates
    /// failures; the archive helper treats them as test failures.
    pub async fn capture_screenshot_to(&self, path: impl AsRef<Path>) -> Result<()> {
        Self::write_screenshot(&self.shots.backend, path.as_ref()).await
    }

    async fn save_numbered_screenshot(shots: &ScreenshotState) -> Result<PathBuf> {
        let n = shots.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let path = PathBuf::from(format!("{}_{}.png", shots.suffix, n));
        Self::write_screenshot(&shots.backend, &path).await?;
        Ok(path)
    }

    async fn write_screenshot(backend: &BackendRef, path: &Path) -> Result<()> {
        let data = backend
            .execute(DriverCommand::CaptureScreenshot)
            .await?
            .expect_data()?;
        let bytes = Base64Standard
            .decode(data.as_bytes())
            .map_err(|e| Error::driver(format!("invalid screenshot data: {e}")))?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

// ============================================================================
// Browser - Input & Clicks
// ============================================================================

impl Browser {
    /// Fills a form field: resolve, clear, type.
    ///
    /// Under [`InputStrategy::Scripted`] the value is assigned through
    /// an inline script instead of keystrokes. With a noncritical call
    /// a missing field is skipped.
    pub async fn input_field(&self, locator: Locator, value: &str, call: Call) -> Result<()> {
        if locator.is_empty() {
            return Err(Error::usage("input_field requires a non-empty locator"));
        }
        match self.strategy {
            InputStrategy::Native => {
                let Some(element) = self.proxy.find_element(locator, call).await? else {
                    return Ok(());
                };
                element.clear(call).await?;
                element.send_keys(value, call).await
            }
            InputStrategy::Scripted => {
                let script = scripted_assign(&locator, value);
                self.proxy.execute_script(script, call).await.map(|_| ())
            }
        }
    }

    /// Clicks a locator or an already-resolved element.
    ///
    /// Under [`InputStrategy::Scripted`] a locator click is performed by
    /// inline script; an already-resolved element is clicked natively
    /// (its handle is the only address we have for it).
    pub async fn click(&self, target: impl Into<ClickTarget>, call: Call) -> Result<()> {
        match target.into() {
            ClickTarget::Locator(locator) => {
                if locator.is_empty() {
                    return Err(Error::usage("click requires a non-empty locator"));
                }
                match self.strategy {
                    InputStrategy::Native => {
                        let Some(element) = self.proxy.find_element(locator, call).await? else {
                            return Ok(());
                        };
                        element.click(call).await
                    }
                    InputStrategy::Scripted => {
                        let script = scripted_click(&locator);
                        self.proxy.execute_script(script, call).await.map(|_| ())
                    }
                }
            }
            ClickTarget::Element(element) => element.click(call).await,
        }
    }
}

// ============================================================================
// Browser - Script Evaluation
// ============================================================================

impl Browser {
    /// Evaluates inline JavaScript and returns its result as text.
    ///
    /// The script body should `return` a value. The value is captured
    /// through a hidden DOM node (written, read back as element text,
    /// then removed), which works uniformly across backends whose
    /// script execution does not return values reliably.
    pub async fn eval_script(&self, code: &str) -> Result<String> {
        self.proxy
            .execute_script(inject_eval_node(code), Call::new())
            .await?;
        let node = self.find_element(Locator::id(EVAL_NODE_ID)).await?;
        let text = node.text().await?;
        self.proxy
            .execute_script(remove_eval_node(), Call::new())
            .await?;
        Ok(text)
    }

    /// Number of asynchronous network requests currently in flight,
    /// read from the page's `window.activeRequests` counter.
    pub async fn active_request_count(&self) -> Result<u64> {
        let text = self.eval_script("return window.activeRequests || 0;").await?;
        text.trim()
            .parse()
            .map_err(|_| Error::driver(format!("unexpected active request count: {text:?}")))
    }
}

// ============================================================================
// Script Builders
// ============================================================================

/// Escapes a string for safe embedding in JavaScript.
fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}

/// JavaScript expression resolving a locator to an element.
fn element_lookup(locator: &Locator) -> String {
    match locator {
        Locator::Css(sel) => format!("document.querySelector({})", js_string(sel)),
        Locator::XPath(xp) => format!(
            "document.evaluate({}, document, null, \
             XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
            js_string(xp)
        ),
        Locator::Id(id) => format!("document.getElementById({})", js_string(id)),
        Locator::Name(name) => format!("document.getElementsByName({})[0]", js_string(name)),
    }
}

fn scripted_assign(locator: &Locator, value: &str) -> String {
    format!(
        "(function() {{ var el = {lookup}; \
         if (!el) {{ throw new Error('no element for {loc}'); }} \
         el.value = {value}; }})();",
        lookup = element_lookup(locator),
        loc = locator,
        value = js_string(value),
    )
}

fn scripted_click(locator: &Locator) -> String {
    format!(
        "(function() {{ var el = {lookup}; \
         if (!el) {{ throw new Error('no element for {loc}'); }} \
         el.click(); }})();",
        lookup = element_lookup(locator),
        loc = locator,
    )
}

fn inject_eval_node(code: &str) -> String {
    format!(
        "(function() {{ \
         var node = document.createElement('pre'); \
         node.id = {id}; \
         node.style.display = 'none'; \
         node.textContent = String((function() {{ {code} }})()); \
         document.body.appendChild(node); }})();",
        id = js_string(EVAL_NODE_ID),
    )
}

fn remove_eval_node() -> String {
    format!(
        "(function() {{ var node = document.getElementById({id}); \
         if (node) {{ node.parentNode.removeChild(node); }} }})();",
        id = js_string(EVAL_NODE_ID),
    )
}

// ============================================================================
// Tests
// ============================================================================
