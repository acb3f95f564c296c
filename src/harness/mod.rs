//! Test harness: driver factory, browser facade, lifecycle orchestrator.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`DriverFactory`] | Selects and assembles a driver from the environment |
//! | [`Browser`] | Instrumented facade with test helpers |
//! | [`TestRunner`] | Per-test Setup → Run → Teardown → Restore |
//! | [`TestContext`] | State handed to each test body |

// ============================================================================
// Submodules
// ============================================================================

/// Browser facade and input/click strategies.
pub mod browser;

/// Driver selection and construction.
pub mod factory;

/// Per-test lifecycle orchestration.
pub mod orchestrator;

// ============================================================================
// Re-exports
// ============================================================================

pub use browser::{Browser, ClickTarget, InputStrategy};
pub use factory::{BackendConnector, DriverFactory, DriverSpec};
pub use orchestrator::{
    ArtifactCounters, Phase, PhaseError, TestContext, TestOutcome, TestRunner,
};
