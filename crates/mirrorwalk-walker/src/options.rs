//! Walk configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a walk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkOptions {
    /// Depth at which container children stop being recursed into and are
    /// rendered as truncation markers instead.
    pub max_depth: usize,

    /// Minimum length of a run of identical sequence values before it is
    /// collapsed into a single run group. Shorter runs are expanded
    /// element by element.
    pub run_threshold: u64,

    /// Wall-clock budget for a single subtree, in seconds. A subtree that
    /// takes longer is flagged slow, which later selects chunked encoding.
    pub slow_budget_secs: f64,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            max_depth: 4,
            run_threshold: 100,
            slow_budget_secs: 30.0,
        }
    }
}

impl WalkOptions {
    pub fn slow_budget(&self) -> Duration {
        Duration::from_secs_f64(self.slow_budget_secs.max(0.0))
    }
}
