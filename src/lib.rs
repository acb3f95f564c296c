//! WebDriver Harness - Instrumented browser-test orchestration library.
//!
//! This library wraps a WebDriver-style backend in an instrumented
//! delegation proxy and drives browser tests through a uniform
//! Setup → Run → Teardown → Restore lifecycle.
//!
//! # Architecture
//!
//! Every driver call funnels through one dispatch path that adds:
//!
//! - **Logging**: `module.methodName`-style call logs before and after
//! - **Retry**: opt-in polling retry for backend-classified transient errors
//! - **Diagnostics**: a numbered screenshot captured on every failed call
//! - **Noncritical calls**: per-call opt-in to swallow failures and continue
//! - **Re-wrapping**: element and dialog handles come back proxy-wrapped
//! - **Background mode**: side-effect-only calls deferred to spawned tasks
//!
//! The actual wire protocol lives behind the [`Backend`] trait; tests
//! exercise the full stack against an in-memory double.
//!
//! # Quick Start
//!
//! ```no_run
//! use webdriver_harness::{
//!     BackendConnector, Call, HarnessConfig, Locator, Result, TestRunner,
//! };
//!
//! async fn run(connector: &dyn BackendConnector) -> Result<()> {
//!     let config = HarnessConfig::from_env();
//!     let runner = TestRunner::new(config);
//!
//!     let outcome = runner
//!         .run_test(connector, "accounts.login", "test_valid_password", |ctx| async move {
//!             let browser = ctx.browser();
//!             browser.goto("https://example.com/login").await?;
//!             browser
//!                 .input_field(Locator::name("user"), "admin", Call::new())
//!                 .await?;
//!             browser.click(Locator::css("button[type='submit']"), Call::new()).await?;
//!             ctx.validate_html().await
//!         })
//!         .await;
//!     outcome.into_result()
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`backend`] | [`Backend`] trait, command and handle types |
//! | [`proxy`] | Instrumented delegation proxy |
//! | [`harness`] | Driver factory, browser facade, test lifecycle |
//! | [`wait`] | Condition polling with a deadline |
//! | [`config`] | Environment-driven configuration |
//! | [`logging`] | Redirectable tracing sink |
//! | [`validator`] | Markup validation client |
//! | [`error`] | Error types and [`Result`] alias |

// ============================================================================
// Modules
// ============================================================================

/// Backend trait, driver commands, and typed handles.
pub mod backend;

/// Environment-driven configuration.
pub mod config;

/// Error types and [`Result`] alias.
pub mod error;

/// Driver factory, browser facade, and test lifecycle.
pub mod harness;

/// Redirectable tracing sink.
pub mod logging;

/// Instrumented delegation proxy.
pub mod proxy;

/// Markup validation client.
pub mod validator;

/// Condition polling with a deadline.
pub mod wait;

#[cfg(test)]
pub(crate) mod test_support;

// ============================================================================
// Re-exports
// ============================================================================

pub use backend::{
    Backend, BackendRef, BrowserKind, CommandValue, DialogHandle, DriverCommand, ElementHandle,
    ErrorClass, Locator, WindowHandle,
};
pub use config::HarnessConfig;
pub use error::{Error, Result, TransientKind};
pub use harness::{
    BackendConnector, Browser, ClickTarget, DriverFactory, DriverSpec, InputStrategy, Phase,
    PhaseError, TestContext, TestOutcome, TestRunner,
};
pub use logging::LogSink;
pub use proxy::{Call, DialogProxy, ElementProxy, ExecMode, Proxy, RetryPolicy};
pub use validator::HtmlValidator;
pub use wait::{wait_for, wait_until};
