//! Markup validation client.
//!
//! Posts page source to a W3C-style validator service and turns a
//! non-zero error count into [`Error::Validation`]. The service
//! chokes on non-ASCII bytes in multipart uploads, so the markup is
//! ASCII-filtered before posting.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use reqwest::multipart::Form;
use tracing::{debug, info};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Response header carrying the validator's error count.
const ERRORS_HEADER: &str = "x-w3c-validator-errors";

/// Budget for one validation round-trip.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// HtmlValidator
// ============================================================================

/// Client for one validator endpoint.
pub struct HtmlValidator {
    client: Client,
    endpoint: Url,
}

impl fmt::Debug for HtmlValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtmlValidator")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl HtmlValidator {
    /// Creates a client for the given validator endpoint.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when the endpoint is not a valid URL.
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| Error::config(format!("invalid validator URL {endpoint:?}: {e}")))?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(Error::from)?;
        Ok(Self { client, endpoint })
    }

    /// The endpoint this client posts to.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Validates a markup fragment.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] when the validator reports errors,
    /// [`Error::Http`] on transport failures, [`Error::Driver`] when
    /// the response does not look like a validator response.
    pub async fn check(&self, html: &str) -> Result<()> {
        let fragment = ascii_filter(html);
        debug!(endpoint = %self.endpoint, bytes = fragment.len(), "Posting markup for validation");

        let form = Form::new()
            .text("output", "soap12")
            .text("fragment", fragment);
        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;

        let header = response
            .headers()
            .get(ERRORS_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .ok_or_else(|| {
                Error::driver(format!("validator response is missing the {ERRORS_HEADER} header"))
            })?;
        let error_count = parse_error_count(&header)?;

        if error_count > 0 {
            let report = response.text().await.unwrap_or_default();
            return Err(Error::Validation {
                error_count,
                report,
            });
        }
        info!(endpoint = %self.endpoint, "Markup is valid");
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Replaces every non-ASCII character with `?`.
fn ascii_filter(html: &str) -> String {
    html.chars()
        .map(|c| if c.is_ascii() { c } else { '?' })
        .collect()
}

/// Parses the validator's error-count header.
fn parse_error_count(value: &str) -> Result<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::driver(format!("unexpected validator error count: {value:?}")))
}

// ============================================================================
// Tests
// ============================================================================
