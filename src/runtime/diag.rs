//! Non-fatal diagnostic reporting
//!
//! Pause/resume failures during a restore must not change control flow, but
//! they must not vanish either. They go through this sink instead of the
//! operation's error return, so tests can assert on them independently.

use std::error::Error as StdError;

/// Sink for failures that are reported but never returned
pub trait DiagnosticSink: Send + Sync {
    fn error(&self, message: &str, err: &(dyn StdError + 'static));
}

/// Default sink backed by the tracing subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn error(&self, message: &str, err: &(dyn StdError + 'static)) {
        tracing::error!(error = %err, "{}", message);
    }
}
