//! Instrumented delegation proxy.
//!
//! [`Proxy`] sits between the harness and a [`Backend`] and makes every
//! forwarded driver call observable and resilient:
//!
//! - each call is logged before invocation (method, arguments);
//! - calls are retried under the backend's transient-error
//!   classification while an explicit-retry budget remains;
//! - failures trigger a pluggable diagnostic hook (the browser facade
//!   installs screenshot-on-error) before being re-raised — or swallowed
//!   when the call was marked [`Call::noncritical`];
//! - wrappable results (elements, dialogs) come back as child proxies
//!   sharing the same logging context, retry policy, and execution mode,
//!   so a whole chain of handles is instrumented uniformly;
//! - in [`ExecMode::Background`], unit-valued calls are spawned onto the
//!   tokio worker pool in issue order and awaited later through
//!   [`Proxy::drain_pending`].

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

use crate::backend::{
    BackendRef, CommandValue, DialogHandle, DriverCommand, ElementHandle, ErrorClass, Locator,
};
use crate::error::{Error, Result};
use crate::wait::{self, DEFAULT_POLL_INTERVAL};

// ============================================================================
// Retry Policy
// ============================================================================

/// Explicit-retry configuration for transient remote-interaction errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total budget for retrying one call.
    pub timeout: Duration,
    /// Delay between attempts.
    pub interval: Duration,
}

impl RetryPolicy {
    /// Creates a retry policy.
    #[inline]
    #[must_use]
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// Creates a retry policy with the default poll interval.
    #[inline]
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(timeout, DEFAULT_POLL_INTERVAL)
    }
}

// ============================================================================
// Execution Mode
// ============================================================================

/// How forwarded calls are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecMode {
    /// Calls complete before returning to the caller.
    #[default]
    Sync,
    /// Unit-valued calls are dispatched to a background worker; the
    /// caller must sequence dependent calls via [`Proxy::drain_pending`].
    Background,
}

// ============================================================================
// Call Options
// ============================================================================

/// Per-call options, stripped before the command reaches the backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct Call {
    noncritical: bool,
}

impl Call {
    /// A normal, critical call: failures re-raise to the caller.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A noncritical call: a failure is logged, the diagnostic hook
    /// runs, and the test continues as if the call had returned nothing.
    #[inline]
    #[must_use]
    pub fn noncritical() -> Self {
        Self { noncritical: true }
    }

    /// Returns `true` if failures should be swallowed.
    #[inline]
    #[must_use]
    pub fn is_noncritical(&self) -> bool {
        self.noncritical
    }
}

// ============================================================================
// Error Hook
// ============================================================================

/// Diagnostic hook invoked on every forwarded-call failure, before the
/// error is swallowed or re-raised.
pub type ErrorHook = Arc<dyn for<'a> Fn(&'a Error) -> BoxFuture<'a, ()> + Send + Sync>;

// ============================================================================
// Pending Calls
// ============================================================================

/// A background driver call that has been dispatched but not awaited.
#[derive(Debug)]
pub struct PendingCall {
    method: &'static str,
    handle: JoinHandle<Result<CommandValue>>,
}

impl PendingCall {
    /// The method name of the deferred call.
    #[inline]
    #[must_use]
    pub fn method(&self) -> &'static str {
        self.method
    }

    /// Awaits completion of the deferred call.
    pub async fn finish(self) -> Result<CommandValue> {
        match self.handle.await {
            Ok(result) => result,
            Err(_) => Err(Error::TaskAborted),
        }
    }
}

// ============================================================================
// Shared State
// ============================================================================

/// State shared by a proxy and all child proxies derived from it.
struct ProxyShared {
    /// The delegate. The proxy never owns the underlying session.
    backend: BackendRef,
    /// Logging label for this proxy chain.
    subject: String,
    /// Explicit-retry budget; `None` disables retrying.
    retry: Mutex<Option<RetryPolicy>>,
    /// Current execution mode.
    mode: Mutex<ExecMode>,
    /// Diagnostic hook, installed once by the facade.
    hook: Mutex<Option<ErrorHook>>,
    /// Background calls dispatched but not yet awaited, in issue order.
    pending: Mutex<Vec<PendingCall>>,
}

// ============================================================================
// Proxy
// ============================================================================

/// Instrumented proxy over a driver [`Backend`].
///
/// Cloning is cheap and clones share retry policy, execution mode, the
/// error hook, and the pending-call list. Exactly one proxy layer sits
/// above any given delegate handle: child proxies bind a handle to the
/// same shared state instead of stacking.
#[derive(Clone)]
pub struct Proxy {
    shared: Arc<ProxyShared>,
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("subject", &self.shared.subject)
            .finish_non_exhaustive()
    }
}

impl Proxy {
    /// Creates a proxy over a backend.
    #[must_use]
    pub fn new(backend: BackendRef, mode: ExecMode) -> Self {
        let subject = format!("driver[{}]", backend.kind());
        Self {
            shared: Arc::new(ProxyShared {
                backend,
                subject,
                retry: Mutex::new(None),
                mode: Mutex::new(mode),
                hook: Mutex::new(None),
                pending: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Returns the underlying backend.
    #[inline]
    #[must_use]
    pub fn backend(&self) -> &BackendRef {
        &self.shared.backend
    }

    /// Returns the current retry policy.
    #[inline]
    #[must_use]
    pub fn retry(&self) -> Option<RetryPolicy> {
        *self.shared.retry.lock()
    }

    /// Sets or clears the explicit-retry policy.
    pub fn set_retry(&self, policy: Option<RetryPolicy>) {
        *self.shared.retry.lock() = policy;
    }

    /// Returns the current execution mode.
    #[inline]
    #[must_use]
    pub fn mode(&self) -> ExecMode {
        *self.shared.mode.lock()
    }

    /// Switches execution mode.
    ///
    /// Switching back to [`ExecMode::Sync`] does not await in-flight
    /// background calls; call [`drain_pending`](Self::drain_pending).
    pub fn set_mode(&self, mode: ExecMode) {
        *self.shared.mode.lock() = mode;
    }

    /// Installs the diagnostic hook invoked on call failures.
    pub fn set_error_hook(&self, hook: ErrorHook) {
        *self.shared.hook.lock() = Some(hook);
    }

    /// Number of dispatched background calls not yet awaited.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared.pending.lock().len()
    }

    /// Awaits every in-flight background call in issue order.
    ///
    /// All calls are awaited even if an earlier one failed; the first
    /// failure is returned.
    pub async fn drain_pending(&self) -> Result<()> {
        let pending: Vec<PendingCall> = std::mem::take(&mut *self.shared.pending.lock());
        if pending.is_empty() {
            return Ok(());
        }
        debug!(subject = %self.shared.subject, count = pending.len(), "Draining background calls");

        let mut first_failure: Option<Error> = None;
        for call in pending {
            if let Err(err) = call.finish().await {
                if first_failure.is_none() {
                    first_failure = Some(err);
                }
            }
        }
        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Proxy - Dispatch
// ============================================================================

impl Proxy {
    /// Forwards one command through the full instrumentation path.
    ///
    /// In background mode, unit-valued commands are spawned onto the
    /// worker pool and `Unit` is returned immediately; everything else
    /// executes inline.
    pub(crate) async fn dispatch(&self, command: DriverCommand, call: Call) -> Result<CommandValue> {
        if self.mode() == ExecMode::Background && command.returns_unit() {
            Ok(self.spawn_call(command, call))
        } else {
            Self::execute_instrumented(&self.shared, command, call).await
        }
    }

    /// Spawns a deferred call and records it in the pending list.
    fn spawn_call(&self, command: DriverCommand, call: Call) -> CommandValue {
        let method = command.method();
        let shared = Arc::clone(&self.shared);
        debug!(subject = %self.shared.subject, method, "Deferring driver call to background worker");

        // Instrumentation (including the error hook and noncritical
        // swallowing) runs inside the task, attached to its completion.
        let handle =
            tokio::spawn(async move { Self::execute_instrumented(&shared, command, call).await });

        self.shared.pending.lock().push(PendingCall { method, handle });
        CommandValue::Unit
    }

    /// The single forwarding helper every operation funnels through:
    /// log, retry, hook on failure, swallow or re-raise.
    async fn execute_instrumented(
        shared: &Arc<ProxyShared>,
        command: DriverCommand,
        call: Call,
    ) -> Result<CommandValue> {
        debug!(
            subject = %shared.subject,
            method = command.method(),
            args = %command.args(),
            noncritical = call.is_noncritical(),
            "Forwarding driver call"
        );

        match Self::execute_with_retry(shared, &command).await {
            Ok(value) => {
                trace!(
                    subject = %shared.subject,
                    method = command.method(),
                    result = value.describe(),
                    "Driver call succeeded"
                );
                Ok(value)
            }
            Err(err) => {
                error!(
                    subject = %shared.subject,
                    method = command.method(),
                    args = %command.args(),
                    error = %err,
                    "Driver call failed"
                );

                let hook = shared.hook.lock().clone();
                if let Some(hook) = hook {
                    hook(&err).await;
                }

                if call.is_noncritical() {
                    info!(
                        subject = %shared.subject,
                        method = command.method(),
                        "Test will continue, the call was noncritical"
                    );
                    Ok(CommandValue::Unit)
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Executes a command, polling it under the backend's transient
    /// classification while the explicit-retry budget allows.
    async fn execute_with_retry(
        shared: &Arc<ProxyShared>,
        command: &DriverCommand,
    ) -> Result<CommandValue> {
        let policy = *shared.retry.lock();
        let Some(policy) = policy else {
            return shared.backend.execute(command.clone()).await;
        };

        let backend = &shared.backend;
        let result = wait::wait_for_with(
            command.method(),
            policy.timeout,
            policy.interval,
            |err| backend.classify(err) == ErrorClass::Transient,
            move || {
                let backend = backend;
                let command = command;
                async move { backend.execute(command.clone()).await.map(Some) }
            },
        )
        .await;

        // Past the retry budget the last transient error is surfaced,
        // not the timeout itself.
        result.map_err(|err| match err {
            Error::WaitTimeout { last: Some(inner), .. } => *inner,
            other => other,
        })
    }
}

// ============================================================================
// Proxy - Typed Forwarding
// ============================================================================

impl Proxy {
    /// Navigates to a URL.
    pub async fn navigate(&self, url: impl Into<String>, call: Call) -> Result<()> {
        self.dispatch(DriverCommand::Navigate { url: url.into() }, call)
            .await?
            .expect_unit()
    }

    /// Finds an element in the current browsing context.
    ///
    /// Returns `None` only when a noncritical call failed and was
    /// swallowed; a critical call either resolves or errors.
    pub async fn find_element(&self, locator: Locator, call: Call) -> Result<Option<ElementProxy>> {
        match self.dispatch(DriverCommand::FindElement { locator }, call).await? {
            CommandValue::Element(handle) => Ok(Some(self.bind_element(handle))),
            CommandValue::Unit => Ok(None),
            other => Err(Error::driver(format!(
                "backend returned {} where element was expected",
                other.describe()
            ))),
        }
    }

    /// Lists the handles of every open window.
    pub async fn window_handles(&self) -> Result<Vec<crate::backend::WindowHandle>> {
        self.dispatch(DriverCommand::WindowHandles, Call::new())
            .await?
            .expect_windows()
    }

    /// Switches session focus to a window.
    pub async fn switch_to_window(&self, handle: crate::backend::WindowHandle) -> Result<()> {
        self.dispatch(DriverCommand::SwitchToWindow { handle }, Call::new())
            .await?
            .expect_unit()
    }

    /// Closes the focused window.
    pub async fn close_window(&self) -> Result<()> {
        self.dispatch(DriverCommand::CloseWindow, Call::new())
            .await?
            .expect_unit()
    }

    /// Returns the current page title.
    pub async fn title(&self) -> Result<String> {
        self.dispatch(DriverCommand::Title, Call::new())
            .await?
            .expect_text()
    }

    /// Returns the current page source.
    pub async fn page_source(&self) -> Result<String> {
        self.dispatch(DriverCommand::PageSource, Call::new())
            .await?
            .expect_text()
    }

    /// Executes inline JavaScript, returning its JSON value.
    ///
    /// A swallowed noncritical failure yields `Value::Null`.
    pub async fn execute_script(
        &self,
        code: impl Into<String>,
        call: Call,
    ) -> Result<serde_json::Value> {
        match self
            .dispatch(DriverCommand::ExecuteScript { code: code.into() }, call)
            .await?
        {
            CommandValue::Json(value) => Ok(value),
            CommandValue::Unit => Ok(serde_json::Value::Null),
            other => Err(Error::driver(format!(
                "backend returned {} where json was expected",
                other.describe()
            ))),
        }
    }

    /// Switches to the active modal dialog.
    ///
    /// # Errors
    ///
    /// [`Error::NoDialog`] when no dialog is open.
    pub async fn switch_to_dialog(&self) -> Result<DialogProxy> {
        let handle = self
            .dispatch(DriverCommand::SwitchToDialog, Call::new())
            .await?
            .expect_dialog()?;
        Ok(DialogProxy {
            shared: Arc::clone(&self.shared),
            handle,
        })
    }

    /// Terminates the driver session.
    pub async fn quit(&self) -> Result<()> {
        self.dispatch(DriverCommand::Quit, Call::new())
            .await?
            .expect_unit()
    }

    /// Binds an element handle to a child proxy sharing this proxy's
    /// instrumentation.
    fn bind_element(&self, handle: ElementHandle) -> ElementProxy {
        ElementProxy {
            shared: Arc::clone(&self.shared),
            handle,
        }
    }
}

// ============================================================================
// ElementProxy
// ============================================================================

/// Instrumented handle to a resolved DOM element.
///
/// Produced by the proxy's result re-wrapping: element operations go
/// through the same dispatch path as session operations, so they are
/// logged, retried, and diagnosed identically.
#[derive(Clone)]
pub struct ElementProxy {
    shared: Arc<ProxyShared>,
    handle: ElementHandle,
}

impl fmt::Debug for ElementProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementProxy")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl ElementProxy {
    /// The underlying element handle.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> &ElementHandle {
        &self.handle
    }

    /// Clicks the element.
    pub async fn click(&self, call: Call) -> Result<()> {
        self.dispatch(DriverCommand::Click { element: self.handle.clone() }, call)
            .await?
            .expect_unit()
    }

    /// Clears the element's value.
    pub async fn clear(&self, call: Call) -> Result<()> {
        self.dispatch(DriverCommand::Clear { element: self.handle.clone() }, call)
            .await?
            .expect_unit()
    }

    /// Sends keystrokes to the element.
    pub async fn send_keys(&self, text: impl Into<String>, call: Call) -> Result<()> {
        let command = DriverCommand::SendKeys {
            element: self.handle.clone(),
            text: text.into(),
        };
        self.dispatch(command, call).await?.expect_unit()
    }

    /// Returns the element's text content.
    pub async fn text(&self) -> Result<String> {
        self.dispatch(
            DriverCommand::ElementText { element: self.handle.clone() },
            Call::new(),
        )
        .await?
        .expect_text()
    }

    /// Finds a child element, itself wrapped in a proxy.
    pub async fn find_element(&self, locator: Locator, call: Call) -> Result<Option<ElementProxy>> {
        let command = DriverCommand::FindChildElement {
            parent: self.handle.clone(),
            locator,
        };
        match self.dispatch(command, call).await? {
            CommandValue::Element(handle) => Ok(Some(ElementProxy {
                shared: Arc::clone(&self.shared),
                handle,
            })),
            CommandValue::Unit => Ok(None),
            other => Err(Error::driver(format!(
                "backend returned {} where element was expected",
                other.describe()
            ))),
        }
    }

    async fn dispatch(&self, command: DriverCommand, call: Call) -> Result<CommandValue> {
        let proxy = Proxy {
            shared: Arc::clone(&self.shared),
        };
        proxy.dispatch(command, call).await
    }
}

// ============================================================================
// DialogProxy
// ============================================================================

/// Instrumented handle to an active modal dialog.
#[derive(Clone)]
pub struct DialogProxy {
    shared: Arc<ProxyShared>,
    handle: DialogHandle,
}

impl fmt::Debug for DialogProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialogProxy")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl DialogProxy {
    /// The underlying dialog handle.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> &DialogHandle {
        &self.handle
    }

    /// Returns the dialog's message text.
    pub async fn text(&self) -> Result<String> {
        let proxy = Proxy {
            shared: Arc::clone(&self.shared),
        };
        proxy
            .dispatch(
                DriverCommand::DialogText { handle: self.handle.clone() },
                Call::new(),
            )
            .await?
            .expect_text()
    }

    /// Dismisses the dialog.
    pub async fn dismiss(&self, call: Call) -> Result<()> {
        let proxy = Proxy {
            shared: Arc::clone(&self.shared),
        };
        proxy
            .dispatch(
                DriverCommand::DismissDialog { handle: self.handle.clone() },
                call,
            )
            .await?
            .expect_unit()
    }
}

// ============================================================================
// Tests
// ============================================================================
