//! Environment-provided harness configuration.
//!
//! The harness treats configuration as a set of already-resolved scalar
//! inputs: which browser to drive, where its binary or remote endpoint
//! lives, where to archive artifacts, and how to reach the HTML
//! validator. Parsing a configuration file format is out of scope; the
//! `HARNESS_CONFIG` variable only locates one for the test cases
//! themselves, with the sentinel value `ignore` meaning "run without
//! one".

// ============================================================================
// Imports
// ============================================================================

use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

// ============================================================================
// Environment Variables
// ============================================================================

/// Location of the test-case configuration file, or `ignore`.
pub const ENV_CONFIG: &str = "HARNESS_CONFIG";
/// Browser kind selector (`firefox`, `chrome`, `ie`).
pub const ENV_BROWSER: &str = "HARNESS_BROWSER";
/// Optional local browser binary path.
pub const ENV_BINARY: &str = "HARNESS_BINARY";
/// Optional remote driver endpoint, `host:port`.
pub const ENV_REMOTE: &str = "HARNESS_REMOTE";
/// Optional directory screenshots are archived into.
pub const ENV_ARCHIVE_DIR: &str = "HARNESS_ARCHIVE_DIR";
/// Optional HTML validator address.
pub const ENV_VALIDATOR: &str = "HARNESS_VALIDATOR";
/// Set to `1`/`true` to skip HTML validation.
pub const ENV_SKIP_VALIDATION: &str = "HARNESS_SKIP_VALIDATION";

/// Sentinel for [`ENV_CONFIG`]: run without a configuration file.
pub const CONFIG_IGNORE: &str = "ignore";

// ============================================================================
// HarnessConfig
// ============================================================================

/// Resolved scalar configuration for one harness process.
#[derive(Debug, Clone, Default)]
pub struct HarnessConfig {
    /// Test-case configuration file location, if any.
    pub config_path: Option<PathBuf>,
    /// Browser kind selector string.
    pub browser: String,
    /// Local browser binary, if explicitly selected.
    pub binary: Option<PathBuf>,
    /// Remote driver endpoint (`host:port`), required for remote kinds.
    pub remote_endpoint: Option<String>,
    /// Screenshot archive directory, if archiving is enabled.
    pub archive_dir: Option<PathBuf>,
    /// HTML validator address, if validation is enabled.
    pub validator_url: Option<String>,
    /// Skip HTML validation even when a validator is configured.
    pub skip_validation: bool,
}

impl HarnessConfig {
    /// Creates an empty configuration (Chrome defaults, nothing else).
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let non_empty = |key: &str| env::var(key).ok().filter(|v| !v.trim().is_empty());

        let config_path = non_empty(ENV_CONFIG)
            .filter(|v| v != CONFIG_IGNORE)
            .map(PathBuf::from);

        Self {
            config_path,
            browser: non_empty(ENV_BROWSER).unwrap_or_default(),
            binary: non_empty(ENV_BINARY).map(PathBuf::from),
            remote_endpoint: non_empty(ENV_REMOTE),
            archive_dir: non_empty(ENV_ARCHIVE_DIR).map(PathBuf::from),
            validator_url: non_empty(ENV_VALIDATOR),
            skip_validation: non_empty(ENV_SKIP_VALIDATION)
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }

    /// Sets the configuration file path.
    #[must_use]
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Sets the browser selector.
    #[must_use]
    pub fn browser(mut self, selector: impl Into<String>) -> Self {
        self.browser = selector.into();
        self
    }

    /// Sets the local browser binary path.
    #[must_use]
    pub fn binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary = Some(path.into());
        self
    }

    /// Sets the remote driver endpoint.
    #[must_use]
    pub fn remote_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.remote_endpoint = Some(endpoint.into());
        self
    }

    /// Sets the screenshot archive directory.
    #[must_use]
    pub fn archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.archive_dir = Some(dir.into());
        self
    }

    /// Sets the HTML validator address.
    #[must_use]
    pub fn validator_url(mut self, url: impl Into<String>) -> Self {
        self.validator_url = Some(url.into());
        self
    }

    /// Skips HTML validation.
    #[must_use]
    pub fn skip_validation(mut self, skip: bool) -> Self {
        self.skip_validation = skip;
        self
    }

    /// Checks that the configuration file, when one is named, exists.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] naming the resolved absolute path, so the
    /// failure report tells the operator exactly what to fix.
    pub fn ensure_config_file(&self) -> Result<Option<&Path>> {
        match &self.config_path {
            None => Ok(None),
            Some(path) if path.exists() => Ok(Some(path)),
            Some(path) => {
                let shown = path
                    .canonicalize()
                    .unwrap_or_else(|_| path.clone());
                Err(Error::config(format!(
                    "configuration file not found: {}. Set {ENV_CONFIG} to a valid path, \
                     or to '{CONFIG_IGNORE}' to run without one.",
                    shown.display()
                )))
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
