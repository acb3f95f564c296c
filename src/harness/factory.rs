//! Driver selection and construction.
//!
//! The factory turns the environment selection (browser kind, optional
//! binary path, optional remote endpoint) into a validated
//! [`DriverSpec`], asks the external [`BackendConnector`] collaborator
//! for a session, and assembles the instrumented [`Browser`] facade with
//! the kind's quirks applied: Internet Explorer sessions get a non-zero
//! explicit-retry timeout (that backend raises spurious "not found"
//! errors while frames settle) and scripted input/click strategies;
//! Chrome runs with extension loading disabled.

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};
use url::Url;

use crate::backend::{BackendRef, BrowserKind};
use crate::config::{ENV_REMOTE, HarnessConfig};
use crate::error::{Error, Result};
use crate::proxy::{ExecMode, RetryPolicy};

use super::browser::{Browser, InputStrategy};

// ============================================================================
// Constants
// ============================================================================

/// Default explicit-retry budget for Internet Explorer sessions.
const IE_RETRY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default screenshot filename prefix.
const SCREENSHOT_SUFFIX: &str = "screenshot";

// ============================================================================
// DriverSpec
// ============================================================================

/// Validated construction parameters handed to a [`BackendConnector`].
///
/// For [`BrowserKind::InternetExplorer`] the connector must bind to
/// `remote` and declare Internet-Explorer-compatible capabilities
/// explicitly; for local kinds `remote` is always `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverSpec {
    /// Which browser to drive.
    pub kind: BrowserKind,
    /// Explicit local binary, when one was selected.
    pub binary: Option<PathBuf>,
    /// Remote driver endpoint (`host:port`) for remote kinds.
    pub remote: Option<String>,
    /// Whether extension loading must be disabled.
    pub disable_extensions: bool,
}

// ============================================================================
// BackendConnector
// ============================================================================

/// External collaborator that opens a driver session for a spec.
///
/// The wire protocol, process management, and capability negotiation
/// all live behind this trait.
#[async_trait]
pub trait BackendConnector: Send + Sync {
    /// Opens a session matching the spec.
    async fn connect(&self, spec: &DriverSpec) -> Result<BackendRef>;
}

// ============================================================================
// DriverFactory
// ============================================================================

/// Builds an instrumented [`Browser`] from the environment selection.
pub struct DriverFactory;

impl DriverFactory {
    /// Resolves the spec, connects, and assembles the facade.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] before any connection attempt when the
    /// selection is incomplete (Internet Explorer without a remote
    /// endpoint) or the endpoint is malformed.
    pub async fn create(
        config: &HarnessConfig,
        connector: &dyn BackendConnector,
        mode: ExecMode,
    ) -> Result<Browser> {
        let kind = BrowserKind::from_selector(&config.browser);
        let spec = Self::resolve_spec(kind, config)?;
        debug!(kind = %kind, ?spec.binary, ?spec.remote, "Connecting driver");

        let backend = connector.connect(&spec).await?;

        let strategy = InputStrategy::for_kind(kind);
        let browser = Browser::new(backend, mode, strategy, SCREENSHOT_SUFFIX);

        // IE throws transient "not found" errors far more aggressively
        // than the local backends, so polling retry is on by default
        // there and off everywhere else.
        if kind == BrowserKind::InternetExplorer {
            browser
                .proxy()
                .set_retry(Some(RetryPolicy::with_timeout(IE_RETRY_TIMEOUT)));
        }

        info!(kind = %kind, strategy = ?strategy, "Driver ready");
        Ok(browser)
    }

    /// Validates the environment selection for a kind.
    fn resolve_spec(kind: BrowserKind, config: &HarnessConfig) -> Result<DriverSpec> {
        match kind {
            BrowserKind::Firefox => Ok(DriverSpec {
                kind,
                binary: config.binary.clone(),
                remote: None,
                disable_extensions: false,
            }),
            BrowserKind::Chrome => Ok(DriverSpec {
                kind,
                binary: config.binary.clone(),
                remote: None,
                disable_extensions: true,
            }),
            BrowserKind::InternetExplorer => {
                let remote = config.remote_endpoint.clone().ok_or_else(|| {
                    Error::config(format!(
                        "Internet Explorer requires a remote endpoint. \
                         Set {ENV_REMOTE} to host:port."
                    ))
                })?;
                Self::validate_endpoint(&remote)?;
                Ok(DriverSpec {
                    kind,
                    binary: None,
                    remote: Some(remote),
                    disable_extensions: false,
                })
            }
        }
    }

    /// Checks that an endpoint parses as `host:port`.
    fn validate_endpoint(endpoint: &str) -> Result<()> {
        let url = Url::parse(&format!("http://{endpoint}"))
            .map_err(|e| Error::config(format!("invalid remote endpoint {endpoint:?}: {e}")))?;
        if url.port().is_none() {
            return Err(Error::config(format!(
                "remote endpoint {endpoint:?} is missing a port"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
