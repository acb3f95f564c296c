//! Per-test lifecycle orchestration.
//!
//! [`TestRunner`] drives each test through four phases:
//!
//! 1. **Setup** — create a fresh working directory named after the
//!    canonical dotted test id, enter it, redirect logs into it, and
//!    connect a driver.
//! 2. **Run** — execute the test body with a [`TestContext`].
//! 3. **Teardown** — drain deferred background calls, screenshot every
//!    open window, quit the driver.
//! 4. **Restore** — leave the working directory and detach the log
//!    sink, unconditionally.
//!
//! Phases are failure-isolated: an error in one phase is recorded in
//! the [`TestOutcome`] and later phases still run, except that a Setup
//! failure skips Run and the browser half of Teardown (there is nothing
//! to tear down). Restore runs no matter what.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, error, info, warn};

use crate::config::HarnessConfig;
use crate::error::{Error, Result};
use crate::harness::browser::Browser;
use crate::harness::factory::{BackendConnector, DriverFactory};
use crate::logging::LogSink;
use crate::proxy::{DialogProxy, ExecMode};
use crate::validator::HtmlValidator;
use crate::wait;

// ============================================================================
// Constants
// ============================================================================

/// Log file written inside each test's working directory.
const TEST_LOG_FILE: &str = "test.log";

/// Poll interval for the context wait helpers.
const WAIT_INTERVAL: Duration = Duration::from_millis(500);

// ============================================================================
// Phase & Outcome
// ============================================================================

/// Lifecycle phase an error was recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Setup,
    Run,
    Teardown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Setup => "setup",
            Self::Run => "run",
            Self::Teardown => "teardown",
        })
    }
}

/// An error attributed to the phase it happened in.
#[derive(Debug)]
pub struct PhaseError {
    pub phase: Phase,
    pub error: Error,
}

impl fmt::Display for PhaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.phase, self.error)
    }
}

/// Everything that happened while running one test.
#[derive(Debug)]
pub struct TestOutcome {
    /// Canonical dotted test id (`module.name`).
    pub test_id: String,
    /// Working directory artifacts were written to.
    pub workdir: PathBuf,
    /// Every phase error, in occurrence order.
    pub errors: Vec<PhaseError>,
}

impl TestOutcome {
    /// Whether every phase completed cleanly.
    #[inline]
    #[must_use]
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }

    /// The first recorded error, if any.
    #[inline]
    #[must_use]
    pub fn first_error(&self) -> Option<&PhaseError> {
        self.errors.first()
    }

    /// Converts the outcome into a `Result`, surfacing the first error.
    pub fn into_result(mut self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors.remove(0).error)
        }
    }
}

// ============================================================================
// ArtifactCounters
// ============================================================================

/// Per-prefix artifact counters, shared across a whole run so archive
/// filenames stay unique and ordered.
#[derive(Default)]
pub struct ArtifactCounters {
    counts: Mutex<FxHashMap<String, u32>>,
}

impl ArtifactCounters {
    /// Next 1-based sequence number for `prefix`.
    pub fn next(&self, prefix: &str) -> u32 {
        let mut counts = self.counts.lock();
        let n = counts.entry(prefix.to_string()).or_insert(0);
        *n += 1;
        *n
    }
}

// ============================================================================
// WorkdirGuard
// ============================================================================

/// Enters a directory and restores the previous one on drop.
///
/// Drop-based so Restore happens even when a phase panics through the
/// runner.
struct WorkdirGuard {
    original: PathBuf,
}

impl WorkdirGuard {
    fn enter(dir: &Path) -> Result<Self> {
        let original = std::env::current_dir()?;
        std::env::set_current_dir(dir)?;
        Ok(Self { original })
    }
}

impl Drop for WorkdirGuard {
    fn drop(&mut self) {
        if let Err(err) = std::env::set_current_dir(&self.original) {
            warn!(
                path = %self.original.display(),
                error = %err,
                "Failed to restore working directory"
            );
        }
    }
}

// ============================================================================
// TestContext
// ============================================================================

/// State handed to a test body.
pub struct TestContext {
    test_id: String,
    browser: Browser,
    config: HarnessConfig,
    workdir: PathBuf,
    counters: Arc<ArtifactCounters>,
    validator: Option<HtmlValidator>,
}

impl TestContext {
    /// Canonical dotted test id.
    #[inline]
    #[must_use]
    pub fn test_id(&self) -> &str {
        &self.test_id
    }

    /// The instrumented browser for this test.
    #[inline]
    #[must_use]
    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    /// The resolved harness configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// This test's working directory.
    #[inline]
    #[must_use]
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Waits until exactly `count` windows are open.
    pub async fn wait_for_windows(&self, count: usize, timeout: Duration) -> Result<()> {
        let browser = &self.browser;
        wait::wait_until("window count", timeout, WAIT_INTERVAL, move || {
            let browser = browser;
            async move { Ok(browser.window_handles().await?.len() == count) }
        })
        .await
    }

    /// Waits until the page reports no asynchronous request in flight.
    pub async fn wait_for_idle_network(&self, timeout: Duration) -> Result<()> {
        let browser = &self.browser;
        wait::wait_until("idle network", timeout, WAIT_INTERVAL, move || {
            let browser = browser;
            async move { Ok(browser.active_request_count().await? == 0) }
        })
        .await
    }

    /// Waits for a modal dialog to appear and returns its proxy.
    pub async fn wait_for_dialog(&self, timeout: Duration) -> Result<DialogProxy> {
        let browser = &self.browser;
        wait::wait_for("dialog", timeout, WAIT_INTERVAL, move || {
            let browser = browser;
            async move { browser.switch_to_dialog().await.map(Some) }
        })
        .await
    }

    /// Captures a screenshot into the archive directory as
    /// `<test_id>_<nn>_<name>.png`, numbered per test across the run.
    ///
    /// Returns `None` when no archive directory is configured. Unlike
    /// the browser's own diagnostic screenshots, archive failures are
    /// test failures.
    ///
    /// # Errors
    ///
    /// [`Error::Artifact`] when the configured archive directory does
    /// not exist.
    pub async fn archive_screenshot(&self, name: &str) -> Result<Option<PathBuf>> {
        let Some(dir) = &self.config.archive_dir else {
            debug!(name, "No archive directory configured, skipping screenshot");
            return Ok(None);
        };
        if !dir.is_dir() {
            return Err(Error::artifact(format!(
                "archive directory does not exist: {}",
                dir.display()
            )));
        }
        let n = self.counters.next(&self.test_id);
        let path = dir.join(format!("{}_{:02}_{}.png", self.test_id, n, name));
        self.browser.capture_screenshot_to(&path).await?;
        info!(path = %path.display(), "Archived screenshot");
        Ok(Some(path))
    }

    /// Validates the current page source against the configured
    /// markup validator. The validator's report is persisted next to
    /// the other artifacts when validation fails.
    ///
    /// A no-op when validation is skipped or no validator is
    /// configured.
    pub async fn validate_html(&self) -> Result<()> {
        let Some(validator) = &self.validator else {
            debug!("Markup validation skipped");
            return Ok(());
        };
        let source = self.browser.page_source().await?;
        match validator.check(&source).await {
            Err(Error::Validation { error_count, report }) => {
                if let Some(path) = self.persist_validation_report(&report) {
                    warn!(path = %path.display(), error_count, "Validation report saved");
                }
                Err(Error::Validation { error_count, report })
            }
            other => other,
        }
    }

    fn persist_validation_report(&self, report: &str) -> Option<PathBuf> {
        let dir = self.config.archive_dir.as_deref().filter(|d| d.is_dir())?;
        let n = self.counters.next("validation");
        let path = dir.join(format!("validation_{n:02}.html"));
        match std::fs::write(&path, report) {
            Ok(()) => Some(path),
            Err(err) => {
                warn!(error = %err, "Could not persist validation report");
                None
            }
        }
    }
}

// ============================================================================
// TestRunner
// ============================================================================

/// Runs test bodies through the full lifecycle.
pub struct TestRunner {
    config: HarnessConfig,
    mode: ExecMode,
    sink: LogSink,
    counters: Arc<ArtifactCounters>,
}

impl TestRunner {
    /// Creates a runner with synchronous call execution.
    #[must_use]
    pub fn new(config: HarnessConfig) -> Self {
        Self::with_mode(config, ExecMode::Sync)
    }

    /// Creates a runner with an explicit execution mode; whole suites
    /// opt into background driver calls here.
    ///
    /// Installs the process-global log subscriber on first use; every
    /// runner shares the same sink and retargets it per test.
    #[must_use]
    pub fn with_mode(config: HarnessConfig, mode: ExecMode) -> Self {
        let sink = LogSink::global();
        Self {
            config,
            mode,
            sink,
            counters: Arc::new(ArtifactCounters::default()),
        }
    }

    /// The log sink tests' output is redirected through.
    #[inline]
    #[must_use]
    pub fn log_sink(&self) -> &LogSink {
        &self.sink
    }

    /// Runs one test through Setup, Run, Teardown, and Restore.
    ///
    /// The canonical test id is `<module_path>.<name>`. Never returns
    /// an error: everything that went wrong is collected in the
    /// [`TestOutcome`].
    pub async fn run_test<F, Fut>(
        &self,
        connector: &dyn BackendConnector,
        module_path: &str,
        name: &str,
        body: F,
    ) -> TestOutcome
    where
        F: FnOnce(Arc<TestContext>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let test_id = format!("{module_path}.{name}");
        let workdir = PathBuf::from(&test_id);
        let mut outcome = TestOutcome {
            test_id: test_id.clone(),
            workdir: workdir.clone(),
            errors: Vec::new(),
        };

        info!(test = %test_id, workdir = %workdir.display(), "Starting test");

        // Setup: working directory, log redirection, driver.
        let guard = match self.enter_workdir(&workdir) {
            Ok(guard) => Some(guard),
            Err(err) => {
                error!(test = %test_id, error = %err, "Setup failed");
                outcome.errors.push(PhaseError {
                    phase: Phase::Setup,
                    error: err,
                });
                None
            }
        };

        if guard.is_some() {
            match self.setup_context(connector, test_id.clone(), workdir.clone()).await {
                Ok(ctx) => {
                    let ctx = Arc::new(ctx);

                    // Run.
                    if let Err(err) = body(Arc::clone(&ctx)).await {
                        error!(test = %test_id, error = %err, "Test failed");
                        outcome.errors.push(PhaseError {
                            phase: Phase::Run,
                            error: err,
                        });
                    }

                    // Teardown, every step attempted.
                    for err in Self::teardown(&ctx.browser).await {
                        outcome.errors.push(PhaseError {
                            phase: Phase::Teardown,
                            error: err,
                        });
                    }
                }
                Err(err) => {
                    error!(test = %test_id, error = %err, "Setup failed");
                    outcome.errors.push(PhaseError {
                        phase: Phase::Setup,
                        error: err,
                    });
                }
            }
        }

        // Restore: the guard drop returns to the original directory.
        drop(guard);
        self.sink.detach();

        if outcome.passed() {
            info!(test = %test_id, "Test passed");
        } else {
            warn!(test = %test_id, errors = outcome.errors.len(), "Test finished with errors");
        }
        outcome
    }

    /// Creates the working directory fresh and enters it.
    ///
    /// A leftover directory from a previous run is a Setup error, not
    /// something to silently reuse: stale artifacts in it would be
    /// indistinguishable from this run's.
    fn enter_workdir(&self, workdir: &Path) -> Result<WorkdirGuard> {
        std::fs::create_dir(workdir)?;
        let guard = WorkdirGuard::enter(workdir)?;
        self.sink.redirect_to(Path::new(TEST_LOG_FILE))?;
        Ok(guard)
    }

    async fn setup_context(
        &self,
        connector: &dyn BackendConnector,
        test_id: String,
        workdir: PathBuf,
    ) -> Result<TestContext> {
        self.config.ensure_config_file()?;
        let browser = DriverFactory::create(&self.config, connector, self.mode).await?;
        let validator = if self.config.skip_validation {
            None
        } else {
            self.config
                .validator_url
                .as_deref()
                .map(HtmlValidator::new)
                .transpose()?
        };
        Ok(TestContext {
            test_id,
            browser,
            config: self.config.clone(),
            workdir,
            counters: Arc::clone(&self.counters),
            validator,
        })
    }

    /// Drains deferred calls, screenshots and closes every window,
    /// quits.
    ///
    /// Each step is attempted even when an earlier one fails; all
    /// failures are returned.
    async fn teardown(browser: &Browser) -> Vec<Error> {
        let mut errors = Vec::new();

        // Background calls must land before the session goes away.
        browser.proxy().set_mode(ExecMode::Sync);
        if let Err(err) = browser.proxy().drain_pending().await {
            errors.push(err);
        }

        match browser.window_handles().await {
            Ok(handles) => {
                for handle in handles {
                    if let Err(err) = browser.switch_to_window(handle.clone()).await {
                        warn!(window = %handle, error = %err, "Could not switch for final screenshot");
                        continue;
                    }
                    match browser.title().await {
                        Ok(title) => info!(window = %handle, title = %title, "Closing window"),
                        Err(err) => warn!(window = %handle, error = %err, "Could not read title"),
                    }
                    browser.do_screenshot().await;
                    if let Err(err) = browser.close_window().await {
                        warn!(window = %handle, error = %err, "Could not close window");
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "Could not enumerate windows for final screenshots");
            }
        }

        if let Err(err) = browser.quit().await {
            errors.push(err);
        }
        errors
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use crate::backend::testing::MockBackend;
    use crate::backend::{BackendRef, BrowserKind};
    use crate::harness::factory::DriverSpec;
    use crate::test_support::CwdGuard;

    /// Connector serving a pre-built shared mock.
    struct StaticConnector {
        backend: MockBackend,
    }

    #[async_trait]
    impl BackendConnector for StaticConnector {
        async fn connect(&self, _spec: &DriverSpec) -> Result<BackendRef> {
            Ok(Arc::new(self.backend.clone()))
        }
    }

    /// Connector that always fails.
    struct BrokenConnector;

    #[async_trait]
    impl BackendConnector for BrokenConnector {
        async fn connect(&self, _spec: &DriverSpec) -> Result<BackendRef> {
            Err(Error::driver("driver executable not found"))
        }
    }

    fn runner() -> TestRunner {
        TestRunner::new(HarnessConfig::new().skip_validation(true))
    }

    #[tokio::test]
    async fn test_passing_body_full_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let _guard = CwdGuard::enter(dir.path());

        let backend = MockBackend::new(BrowserKind::Chrome);
        let connector = StaticConnector {
            backend: backend.clone(),
        };

        let outcome = runner()
            .run_test(&connector, "suite.login", "test_ok", |ctx| async move {
                assert_eq!(ctx.test_id(), "suite.login.test_ok");
                ctx.browser().goto("https://example.com").await
            })
            .await;

        assert!(outcome.passed(), "errors: {:?}", outcome.errors);
        assert_eq!(std::env::current_dir().unwrap(), dir.path());

        let workdir = dir.path().join("suite.login.test_ok");
        assert!(workdir.is_dir());
        assert!(workdir.join(TEST_LOG_FILE).exists());
        // final-screenshot of the one open window, then quit
        assert!(workdir.join("screenshot_1.png").exists());
        assert_eq!(backend.methods().last(), Some(&"session.quit"));
    }

    #[tokio::test]
    async fn test_failing_body_still_tears_down_and_restores() {
        let dir = tempfile::tempdir().unwrap();
        let _guard = CwdGuard::enter(dir.path());

        let backend = MockBackend::new(BrowserKind::Chrome);
        let connector = StaticConnector {
            backend: backend.clone(),
        };

        let outcome = runner()
            .run_test(&connector, "suite", "test_boom", |_ctx| async move {
                Err(Error::driver("assertion failed"))
            })
            .await;

        assert!(!outcome.passed());
        assert_eq!(outcome.first_error().unwrap().phase, Phase::Run);
        assert_eq!(std::env::current_dir().unwrap(), dir.path());
        assert_eq!(backend.methods().last(), Some(&"session.quit"));
    }

    #[tokio::test]
    async fn test_setup_failure_skips_body() {
        let dir = tempfile::tempdir().unwrap();
        let _guard = CwdGuard::enter(dir.path());

        let ran = Arc::new(AtomicBool::new(false));
        let ran_probe = Arc::clone(&ran);

        let outcome = runner()
            .run_test(&BrokenConnector, "suite", "test_no_driver", |_ctx| {
                let ran = Arc::clone(&ran_probe);
                async move {
                    ran.store(true, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;

        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].phase, Phase::Setup);
        assert_eq!(std::env::current_dir().unwrap(), dir.path());
    }

    #[tokio::test]
    async fn test_leftover_workdir_is_setup_error() {
        let dir = tempfile::tempdir().unwrap();
        let _guard = CwdGuard::enter(dir.path());
        std::fs::create_dir(dir.path().join("suite.test_stale")).unwrap();

        let backend = MockBackend::new(BrowserKind::Chrome);
        let connector = StaticConnector {
            backend: backend.clone(),
        };

        let outcome = runner()
            .run_test(&connector, "suite", "test_stale", |_ctx| async move { Ok(()) })
            .await;

        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].phase, Phase::Setup);
        // never reached the driver
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_quit_failure_recorded_as_teardown() {
        let dir = tempfile::tempdir().unwrap();
        let _guard = CwdGuard::enter(dir.path());

        let backend = MockBackend::new(BrowserKind::Chrome);
        backend.fail_on_quit();
        let connector = StaticConnector {
            backend: backend.clone(),
        };

        let outcome = runner()
            .run_test(&connector, "suite", "test_bad_quit", |_ctx| async move { Ok(()) })
            .await;

        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].phase, Phase::Teardown);
        assert_eq!(std::env::current_dir().unwrap(), dir.path());
    }

    #[tokio::test]
    async fn test_teardown_screenshots_and_closes_every_window() {
        let dir = tempfile::tempdir().unwrap();
        let _guard = CwdGuard::enter(dir.path());

        let backend = MockBackend::new(BrowserKind::Chrome);
        backend.respond_with_windows(vec!["main", "popup"]);
        let connector = StaticConnector {
            backend: backend.clone(),
        };

        let outcome = runner()
            .run_test(&connector, "suite", "test_two_windows", |_ctx| async move { Ok(()) })
            .await;
        assert!(outcome.passed(), "errors: {:?}", outcome.errors);

        let workdir = dir.path().join("suite.test_two_windows");
        assert!(workdir.join("screenshot_1.png").exists());
        assert!(workdir.join("screenshot_2.png").exists());

        // each window is closed after its final screenshot
        let methods = backend.methods();
        let closes = methods.iter().filter(|m| **m == "session.closeWindow").count();
        assert_eq!(closes, 2);
        assert_eq!(methods.last(), Some(&"session.quit"));
    }

    #[tokio::test]
    async fn test_missing_config_file_is_setup_error() {
        let dir = tempfile::tempdir().unwrap();
        let _guard = CwdGuard::enter(dir.path());

        let backend = MockBackend::new(BrowserKind::Chrome);
        let connector = StaticConnector {
            backend: backend.clone(),
        };
        let runner = TestRunner::new(
            HarnessConfig::new()
                .skip_validation(true)
                .config_path("/nonexistent/harness.conf"),
        );

        let outcome = runner
            .run_test(&connector, "suite", "test_no_config", |_ctx| async move { Ok(()) })
            .await;

        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].phase, Phase::Setup);
        assert!(matches!(outcome.errors[0].error, Error::Config { .. }));
        // no driver was ever connected
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_wait_for_windows_counts_open_windows() {
        let dir = tempfile::tempdir().unwrap();
        let _guard = CwdGuard::enter(dir.path());

        let backend = MockBackend::new(BrowserKind::Chrome);
        backend.respond_with_windows(vec!["main", "popup"]);
        let connector = StaticConnector {
            backend: backend.clone(),
        };

        let outcome = runner()
            .run_test(&connector, "suite", "test_two_open", |ctx| async move {
                ctx.wait_for_windows(2, Duration::from_secs(2)).await
            })
            .await;
        assert!(outcome.passed(), "errors: {:?}", outcome.errors);
    }

    #[tokio::test]
    async fn test_wait_for_windows_times_out_on_wrong_count() {
        let dir = tempfile::tempdir().unwrap();
        let _guard = CwdGuard::enter(dir.path());

        let backend = MockBackend::new(BrowserKind::Chrome);
        backend.respond_with_windows(vec!["main"]);
        let connector = StaticConnector {
            backend: backend.clone(),
        };

        let outcome = runner()
            .run_test(&connector, "suite", "test_never_three", |ctx| async move {
                // zero timeout probes once, then reports the timeout
                let err = ctx.wait_for_windows(3, Duration::ZERO).await.unwrap_err();
                assert!(err.is_timeout());
                Ok(())
            })
            .await;
        assert!(outcome.passed(), "errors: {:?}", outcome.errors);
    }

    #[tokio::test]
    async fn test_wait_for_idle_network_reads_request_counter() {
        let dir = tempfile::tempdir().unwrap();
        let _guard = CwdGuard::enter(dir.path());

        let backend = MockBackend::new(BrowserKind::Chrome);
        backend.respond_with_element("eval-node");
        backend.set_element_text("0");
        let connector = StaticConnector {
            backend: backend.clone(),
        };

        let outcome = runner()
            .run_test(&connector, "suite", "test_idle", |ctx| async move {
                ctx.wait_for_idle_network(Duration::from_secs(2)).await
            })
            .await;
        assert!(outcome.passed(), "errors: {:?}", outcome.errors);
    }

    #[tokio::test]
    async fn test_background_calls_drained_before_quit() {
        let dir = tempfile::tempdir().unwrap();
        let _guard = CwdGuard::enter(dir.path());

        let backend = MockBackend::new(BrowserKind::Chrome);
        let connector = StaticConnector {
            backend: backend.clone(),
        };

        let outcome = TestRunner::with_mode(
            HarnessConfig::new().skip_validation(true),
            ExecMode::Background,
        )
        .run_test(&connector, "suite", "test_background", |ctx| async move {
            ctx.browser().goto("https://example.com").await?;
            assert_eq!(ctx.browser().proxy().pending_count(), 1);
            Ok(())
        })
        .await;

        assert!(outcome.passed(), "errors: {:?}", outcome.errors);
        assert_eq!(backend.methods().first(), Some(&"session.navigate"));
        assert_eq!(backend.methods().last(), Some(&"session.quit"));
    }

    #[tokio::test]
    async fn test_archive_screenshot_numbering_and_location() {
        let dir = tempfile::tempdir().unwrap();
        let archive = tempfile::tempdir().unwrap();
        let _guard = CwdGuard::enter(dir.path());

        let backend = MockBackend::new(BrowserKind::Chrome);
        let connector = StaticConnector {
            backend: backend.clone(),
        };
        let runner = TestRunner::new(
            HarnessConfig::new()
                .skip_validation(true)
                .archive_dir(archive.path()),
        );

        let outcome = runner
            .run_test(&connector, "suite", "test_archive", |ctx| async move {
                let first = ctx.archive_screenshot("form").await?.unwrap();
                let second = ctx.archive_screenshot("form").await?.unwrap();
                let third = ctx.archive_screenshot("result").await?.unwrap();
                assert!(first.ends_with("suite.test_archive_01_form.png"));
                assert!(second.ends_with("suite.test_archive_02_form.png"));
                assert!(third.ends_with("suite.test_archive_03_result.png"));
                Ok(())
            })
            .await;
        assert!(outcome.passed(), "errors: {:?}", outcome.errors);

        assert!(archive.path().join("suite.test_archive_01_form.png").exists());
        assert!(archive.path().join("suite.test_archive_02_form.png").exists());
        assert!(archive.path().join("suite.test_archive_03_result.png").exists());
    }

    #[tokio::test]
    async fn test_archive_screenshot_without_archive_dir_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let _guard = CwdGuard::enter(dir.path());

        let backend = MockBackend::new(BrowserKind::Chrome);
        let connector = StaticConnector {
            backend: backend.clone(),
        };

        let outcome = runner()
            .run_test(&connector, "suite", "test_no_archive", |ctx| async move {
                assert!(ctx.archive_screenshot("form").await?.is_none());
                Ok(())
            })
            .await;
        assert!(outcome.passed(), "errors: {:?}", outcome.errors);
    }

    #[tokio::test]
    async fn test_archive_screenshot_missing_dir_is_artifact_error() {
        let dir = tempfile::tempdir().unwrap();
        let _guard = CwdGuard::enter(dir.path());

        let backend = MockBackend::new(BrowserKind::Chrome);
        let connector = StaticConnector {
            backend: backend.clone(),
        };
        let runner = TestRunner::new(
            HarnessConfig::new()
                .skip_validation(true)
                .archive_dir("/nonexistent/archive"),
        );

        let outcome = runner
            .run_test(&connector, "suite", "test_bad_archive", |ctx| async move {
                ctx.archive_screenshot("form").await?;
                Ok(())
            })
            .await;

        assert!(!outcome.passed());
        assert!(matches!(
            outcome.first_error().unwrap().error,
            Error::Artifact { .. }
        ));
    }

    #[tokio::test]
    async fn test_wait_for_dialog_polls_until_present() {
        let dir = tempfile::tempdir().unwrap();
        let _guard = CwdGuard::enter(dir.path());

        let backend = MockBackend::new(BrowserKind::Chrome);
        backend.dialog_after_polls(2, "confirm-1");
        let connector = StaticConnector {
            backend: backend.clone(),
        };

        let outcome = runner()
            .run_test(&connector, "suite", "test_dialog", |ctx| async move {
                let dialog = ctx.wait_for_dialog(Duration::from_secs(2)).await?;
                assert_eq!(dialog.handle().as_str(), "confirm-1");
                Ok(())
            })
            .await;
        assert!(outcome.passed(), "errors: {:?}", outcome.errors);
    }

    #[test]
    fn test_artifact_counters_are_per_prefix() {
        let counters = ArtifactCounters::default();
        assert_eq!(counters.next("a"), 1);
        assert_eq!(counters.next("a"), 2);
        assert_eq!(counters.next("b"), 1);
    }

    #[test]
    fn test_outcome_into_result() {
        let ok = TestOutcome {
            test_id: "t".into(),
            workdir: PathBuf::from("t"),
            errors: Vec::new(),
        };
        assert!(ok.into_result().is_ok());

        let failed = TestOutcome {
            test_id: "t".into(),
            workdir: PathBuf::from("t"),
            errors: vec![PhaseError {
                phase: Phase::Run,
                error: Error::driver("boom"),
            }],
        };
        assert!(failed.into_result().is_err());
    }
}
