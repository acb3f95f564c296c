//! Per-test log file management.
//!
//! Tracing's global subscriber is installed once per process, but each
//! test case owns its log file inside its working directory. [`LogSink`]
//! bridges the two: it is a retargetable [`MakeWriter`] the orchestrator
//! points at `<testdir>/test.log` during Setup. Events emitted while no
//! file is attached fall through to stderr.

// ============================================================================
// Imports
// ============================================================================

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;

use crate::error::Result;

// ============================================================================
// LogSink
// ============================================================================

/// Retargetable log destination shared by the subscriber and the
/// orchestrator. Cloning shares the target.
#[derive(Clone, Default)]
pub struct LogSink {
    target: Arc<Mutex<Option<File>>>,
}

/// The one sink the global subscriber writes through. `try_init` only
/// installs a subscriber once per process, so the sink it writes
/// through must be process-wide too; handing each caller a fresh sink
/// would leave every retarget after the first invisible.
static GLOBAL_SINK: OnceLock<LogSink> = OnceLock::new();

impl LogSink {
    /// Creates a standalone sink with no file attached (events go to
    /// stderr). Not connected to the global subscriber; see
    /// [`LogSink::global`].
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide sink, installing the global subscriber
    /// through it on first call.
    ///
    /// Every caller gets a handle to the same sink, so any of them can
    /// retarget where the subscriber writes. The filter honors
    /// `RUST_LOG`, defaulting to `debug` so forwarded driver calls are
    /// recorded.
    #[must_use]
    pub fn global() -> Self {
        let sink = GLOBAL_SINK.get_or_init(Self::new);

        let filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::DEBUG.into())
            .from_env_lossy();

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(sink.clone())
            .with_ansi(false)
            .try_init();

        sink.clone()
    }

    /// Points the sink at a fresh log file.
    ///
    /// The previous file, if any, is closed by replacement.
    pub fn redirect_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        *self.target.lock() = Some(file);
        Ok(())
    }

    /// Detaches the current log file; subsequent events go to stderr.
    pub fn detach(&self) {
        *self.target.lock() = None;
    }
}

// ============================================================================
// Writer
// ============================================================================

/// Writer handed to the subscriber for each event.
pub struct SinkWriter {
    target: Arc<Mutex<Option<File>>>,
}

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut *self.target.lock() {
            Some(file) => file.write(buf),
            None => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut *self.target.lock() {
            Some(file) => file.flush(),
            None => io::stderr().flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = SinkWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SinkWriter {
            target: Arc::clone(&self.target),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
