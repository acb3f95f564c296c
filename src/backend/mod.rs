//! Driver capability boundary.
//!
//! The harness never speaks a wire protocol itself. Everything it needs
//! from a browser-automation driver is expressed as the closed
//! [`DriverCommand`] set, executed by an external [`Backend`]
//! implementation. Results come back as [`CommandValue`], whose
//! [`Element`](CommandValue::Element) and [`Dialog`](CommandValue::Dialog)
//! variants are the wrappable set: the instrumented proxy re-wraps them
//! into child proxies before handing them to the caller.
//!
//! Backends also own the transient-vs-fatal classification of their
//! errors via [`Backend::classify`], so a backend known to raise spurious
//! "not found" errors can widen what the retry loop absorbs.

// ============================================================================
// Submodules
// ============================================================================

/// Element locator strategies.
pub mod locator;

#[cfg(test)]
pub(crate) mod testing;

pub use locator::Locator;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// Browser Kind
// ============================================================================

/// The browser backend a driver session talks to.
///
/// Resolved once at driver construction from the environment selection.
/// Drives quirk configuration: Internet Explorer sessions get a non-zero
/// default retry timeout and scripted input/click strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    /// Local Firefox.
    Firefox,
    /// Local Chrome (default), extensions disabled.
    #[default]
    Chrome,
    /// Remote Internet-Explorer-compatible endpoint.
    InternetExplorer,
}

impl BrowserKind {
    /// Resolves a kind from the environment selector string.
    ///
    /// Unrecognized or empty selectors fall back to Chrome.
    #[must_use]
    pub fn from_selector(selector: &str) -> Self {
        match selector.trim().to_ascii_lowercase().as_str() {
            "firefox" | "ff" => Self::Firefox,
            "ie" | "msie" | "internet-explorer" | "internetexplorer" => Self::InternetExplorer,
            _ => Self::Chrome,
        }
    }

    /// Returns `true` if this backend needs a remote endpoint.
    #[inline]
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::InternetExplorer)
    }
}

impl fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Firefox => "firefox",
            Self::Chrome => "chrome",
            Self::InternetExplorer => "internet-explorer",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Handles
// ============================================================================

macro_rules! handle_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new handle from its driver-side identifier.
            #[inline]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the raw identifier.
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }
    };
}

handle_type! {
    /// Opaque reference to an open browser window.
    WindowHandle
}

handle_type! {
    /// Opaque reference to a DOM element held by the driver session.
    ElementHandle
}

handle_type! {
    /// Opaque reference to an active modal dialog.
    DialogHandle
}

// ============================================================================
// Commands
// ============================================================================

/// The closed set of operations the harness forwards to a driver.
///
/// Command names follow the `module.methodName` convention used in
/// logging; see [`DriverCommand::method`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCommand {
    /// Navigate the current window to a URL.
    Navigate {
        /// Absolute URL to load.
        url: String,
    },
    /// Find one element in the current browsing context.
    FindElement {
        /// Locator strategy and value.
        locator: Locator,
    },
    /// Find one element under a previously resolved element.
    FindChildElement {
        /// Parent element.
        parent: ElementHandle,
        /// Locator strategy and value.
        locator: Locator,
    },
    /// List the handles of every open window.
    WindowHandles,
    /// Switch the session focus to a window.
    SwitchToWindow {
        /// Target window.
        handle: WindowHandle,
    },
    /// Close the focused window.
    CloseWindow,
    /// Get the current page title.
    Title,
    /// Get the current page source.
    PageSource,
    /// Capture a screenshot of the focused window as base64 PNG data.
    CaptureScreenshot,
    /// Execute inline JavaScript in the page, returning its value.
    ExecuteScript {
        /// Script body.
        code: String,
    },
    /// Switch to the active modal dialog.
    ///
    /// Raises [`Error::NoDialog`] when none is open.
    SwitchToDialog,
    /// Read a dialog's message text.
    DialogText {
        /// Target dialog.
        handle: DialogHandle,
    },
    /// Dismiss a dialog.
    DismissDialog {
        /// Target dialog.
        handle: DialogHandle,
    },
    /// Click an element.
    Click {
        /// Target element.
        element: ElementHandle,
    },
    /// Clear an input element's value.
    Clear {
        /// Target element.
        element: ElementHandle,
    },
    /// Send keystrokes to an element.
    SendKeys {
        /// Target element.
        element: ElementHandle,
        /// Text to type.
        text: String,
    },
    /// Read an element's text content.
    ElementText {
        /// Target element.
        element: ElementHandle,
    },
    /// Terminate the driver session.
    Quit,
}

impl DriverCommand {
    /// Returns the command name in `module.methodName` form.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Navigate { .. } => "session.navigate",
            Self::FindElement { .. } => "element.find",
            Self::FindChildElement { .. } => "element.findChild",
            Self::WindowHandles => "session.windowHandles",
            Self::SwitchToWindow { .. } => "session.switchToWindow",
            Self::CloseWindow => "session.closeWindow",
            Self::Title => "session.title",
            Self::PageSource => "session.pageSource",
            Self::CaptureScreenshot => "session.captureScreenshot",
            Self::ExecuteScript { .. } => "session.executeScript",
            Self::SwitchToDialog => "session.switchToDialog",
            Self::DialogText { .. } => "dialog.text",
            Self::DismissDialog { .. } => "dialog.dismiss",
            Self::Click { .. } => "element.click",
            Self::Clear { .. } => "element.clear",
            Self::SendKeys { .. } => "element.sendKeys",
            Self::ElementText { .. } => "element.text",
            Self::Quit => "session.quit",
        }
    }

    /// Returns `true` if the command produces no value.
    ///
    /// Unit commands are the ones background execution mode may defer;
    /// value-producing commands always execute inline.
    #[must_use]
    pub fn returns_unit(&self) -> bool {
        matches!(
            self,
            Self::Navigate { .. }
                | Self::SwitchToWindow { .. }
                | Self::CloseWindow
                | Self::DismissDialog { .. }
                | Self::Click { .. }
                | Self::Clear { .. }
                | Self::SendKeys { .. }
                | Self::Quit
        )
    }

    /// Compact argument rendering for call logging.
    #[must_use]
    pub fn args(&self) -> String {
        match self {
            Self::Navigate { url } => format!("url={url}"),
            Self::FindElement { locator } => format!("locator={locator}"),
            Self::FindChildElement { parent, locator } => {
                format!("parent={parent}, locator={locator}")
            }
            Self::SwitchToWindow { handle } => format!("handle={handle}"),
            Self::ExecuteScript { code } => format!("code_len={}", code.len()),
            Self::DialogText { handle } | Self::DismissDialog { handle } => {
                format!("handle={handle}")
            }
            Self::Click { element } | Self::Clear { element } | Self::ElementText { element } => {
                format!("element={element}")
            }
            Self::SendKeys { element, text } => {
                format!("element={element}, text_len={}", text.len())
            }
            Self::WindowHandles
            | Self::CloseWindow
            | Self::Title
            | Self::PageSource
            | Self::CaptureScreenshot
            | Self::SwitchToDialog
            | Self::Quit => String::new(),
        }
    }
}

impl fmt::Display for DriverCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args = self.args();
        if args.is_empty() {
            f.write_str(self.method())
        } else {
            write!(f, "{}({})", self.method(), args)
        }
    }
}

// ============================================================================
// Command Values
// ============================================================================

/// Result of a forwarded driver command.
///
/// `Element` and `Dialog` are the wrappable variants; the proxy binds
/// them to child proxies before returning them. All other variants are
/// returned to the caller as-is.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandValue {
    /// No value (navigation, clicks, teardown).
    Unit,
    /// Plain text (title, page source, element text, dialog text).
    Text(String),
    /// Base64-encoded binary data (screenshots).
    Data(String),
    /// A JSON value from script execution.
    Json(Value),
    /// Open window handles.
    Windows(Vec<WindowHandle>),
    /// A resolved element — wrappable.
    Element(ElementHandle),
    /// A resolved dialog — wrappable.
    Dialog(DialogHandle),
}

impl CommandValue {
    /// Returns `true` if the proxy must re-wrap this value.
    #[inline]
    #[must_use]
    pub fn is_wrappable(&self) -> bool {
        matches!(self, Self::Element(_) | Self::Dialog(_))
    }

    /// Short variant name for logging.
    #[must_use]
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Text(_) => "text",
            Self::Data(_) => "data",
            Self::Json(_) => "json",
            Self::Windows(_) => "windows",
            Self::Element(_) => "element",
            Self::Dialog(_) => "dialog",
        }
    }

    /// Expects a unit result.
    ///
    /// # Errors
    ///
    /// [`Error::Driver`] if the backend returned a different variant.
    pub fn expect_unit(self) -> Result<()> {
        match self {
            Self::Unit => Ok(()),
            other => Err(unexpected("unit", &other)),
        }
    }

    /// Expects a text result.
    pub fn expect_text(self) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text),
            other => Err(unexpected("text", &other)),
        }
    }

    /// Expects base64 data.
    pub fn expect_data(self) -> Result<String> {
        match self {
            Self::Data(data) => Ok(data),
            other => Err(unexpected("data", &other)),
        }
    }

    /// Expects a JSON value.
    pub fn expect_json(self) -> Result<Value> {
        match self {
            Self::Json(value) => Ok(value),
            other => Err(unexpected("json", &other)),
        }
    }

    /// Expects a window handle list.
    pub fn expect_windows(self) -> Result<Vec<WindowHandle>> {
        match self {
            Self::Windows(handles) => Ok(handles),
            other => Err(unexpected("windows", &other)),
        }
    }

    /// Expects an element handle.
    pub fn expect_element(self) -> Result<ElementHandle> {
        match self {
            Self::Element(handle) => Ok(handle),
            other => Err(unexpected("element", &other)),
        }
    }

    /// Expects a dialog handle.
    pub fn expect_dialog(self) -> Result<DialogHandle> {
        match self {
            Self::Dialog(handle) => Ok(handle),
            other => Err(unexpected("dialog", &other)),
        }
    }
}

fn unexpected(expected: &str, got: &CommandValue) -> Error {
    Error::driver(format!(
        "backend returned {} where {expected} was expected",
        got.describe()
    ))
}

// ============================================================================
// Error Classification
// ============================================================================

/// Whether a backend error is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Retryable up to the proxy's explicit-retry budget.
    Transient,
    /// Propagated immediately.
    Fatal,
}

// ============================================================================
// Backend Trait
// ============================================================================

/// The capability interface an external driver collaborator provides.
///
/// Implementations own the session, the wire protocol, and the process
/// lifecycle of whatever browser they control. The harness only ever
/// calls [`execute`](Self::execute) with a [`DriverCommand`].
#[async_trait]
pub trait Backend: Send + Sync {
    /// Executes one driver command.
    async fn execute(&self, command: DriverCommand) -> Result<CommandValue>;

    /// The browser kind this backend drives.
    fn kind(&self) -> BrowserKind;

    /// Classifies an error from [`execute`](Self::execute) for the
    /// retry loop.
    ///
    /// The default classification retries the standard transient
    /// interaction set. Backends with additional spurious failure modes
    /// may widen this.
    fn classify(&self, err: &Error) -> ErrorClass {
        if err.is_transient() {
            ErrorClass::Transient
        } else {
            ErrorClass::Fatal
        }
    }
}

/// Shared backend handle.
pub type BackendRef = Arc<dyn Backend>;

// ============================================================================
// Tests
// ============================================================================
