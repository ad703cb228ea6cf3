//! RAII-based timing utilities for measuring and logging operation durations.

use std::time::Instant;
use tracing::{debug, info, warn};

/// RAII guard that measures and logs the duration of an operation.
///
/// When dropped, logs the elapsed time since creation. Used around whole
/// operations (a full walk, an encode, a diff); the walker's per-subtree
/// budget keeps its own stopwatch.
pub struct TimingGuard {
    /// Type of operation (e.g., "walk", "encode", "diff")
    operation_type: &'static str,
    /// Name of the specific operation (e.g., the root expression or file)
    operation_name: String,
    /// When the operation started
    start: Instant,
    /// Minimum duration to log at info level (below this uses debug)
    info_threshold_ms: u64,
    /// Minimum duration to log at warn level (for slow operations)
    warn_threshold_ms: u64,
}

impl TimingGuard {
    /// Create a new timing guard.
    ///
    /// The duration will be logged when the guard is dropped.
    pub fn new(operation_type: &'static str, operation_name: impl Into<String>) -> Self {
        let operation_name = operation_name.into();
        debug!(
            operation_type = operation_type,
            operation_name = %operation_name,
            "Starting operation"
        );
        Self {
            operation_type,
            operation_name,
            start: Instant::now(),
            info_threshold_ms: 100,
            warn_threshold_ms: 60_000,
        }
    }

    /// Create a timing guard for a graph walk.
    pub fn walk(name: impl Into<String>) -> Self {
        Self::new("walk", name)
    }

    /// Create a timing guard for snapshot encoding.
    pub fn encode(name: impl Into<String>) -> Self {
        Self::new("encode", name)
    }

    /// Create a timing guard for a structural diff.
    pub fn diff(name: impl Into<String>) -> Self {
        Self::new("diff", name)
    }

    /// Get the elapsed time so far.
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }

    /// Get the elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        let duration_ms = self.start.elapsed().as_millis();

        let duration_str = if duration_ms < 1000 {
            format!("{duration_ms}ms")
        } else if duration_ms < 60_000 {
            format!("{:.2}s", duration_ms as f64 / 1000.0)
        } else {
            let mins = duration_ms / 60_000;
            let secs = (duration_ms % 60_000) as f64 / 1000.0;
            format!("{mins}m {secs:.1}s")
        };

        if duration_ms >= self.warn_threshold_ms as u128 {
            warn!(
                operation_type = self.operation_type,
                operation_name = %self.operation_name,
                duration = %duration_str,
                "Slow operation completed"
            );
        } else if duration_ms >= self.info_threshold_ms as u128 {
            info!(
                operation_type = self.operation_type,
                operation_name = %self.operation_name,
                duration = %duration_str,
                "Operation completed"
            );
        } else {
            debug!(
                operation_type = self.operation_type,
                operation_name = %self.operation_name,
                duration = %duration_str,
                "Operation completed"
            );
        }
    }
}
