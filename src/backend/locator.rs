//! Element locator strategies.
//!
//! # Example
//!
//! ```ignore
//! use webdriver_harness::Locator;
//!
//! // CSS selector
//! browser.find_element(Locator::css("#submit")).await?;
//!
//! // XPath expression
//! browser.find_element(Locator::xpath("//button[@type='submit']")).await?;
//!
//! // By id / name attribute
//! browser.find_element(Locator::id("login-form")).await?;
//! browser.find_element(Locator::name("email")).await?;
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Locator Enum
// ============================================================================

/// Element locator strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "value", rename_all = "camelCase")]
pub enum Locator {
    /// CSS selector.
    Css(String),
    /// XPath expression.
    XPath(String),
    /// Element ID attribute.
    Id(String),
    /// Name attribute.
    Name(String),
}

impl Locator {
    /// Creates a CSS selector locator.
    #[inline]
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Creates an XPath locator.
    #[inline]
    #[must_use]
    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::XPath(expression.into())
    }

    /// Creates an ID locator.
    #[inline]
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// Creates a name-attribute locator.
    #[inline]
    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Returns the strategy name sent to the driver.
    #[must_use]
    pub fn strategy(&self) -> &'static str {
        match self {
            Self::Css(_) => "css",
            Self::XPath(_) => "xpath",
            Self::Id(_) => "id",
            Self::Name(_) => "name",
        }
    }

    /// Returns the locator value.
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Css(v) | Self::XPath(v) | Self::Id(v) | Self::Name(v) => v,
        }
    }

    /// Returns `true` if the locator value is blank.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value().trim().is_empty()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.strategy(), self.value())
    }
}

// ============================================================================
// Tests
// ============================================================================
