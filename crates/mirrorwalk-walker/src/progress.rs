//! Hierarchical, time-thresholded heartbeat logging.
//!
//! The heartbeat log is a separate durable sink from the transcript,
//! flushed on every line, so an outside observer can tail it during a
//! multi-hour walk even if the process is later killed or hangs.
//!
//! Hierarchy is carried by an explicit per-level state value rather than
//! nested closures: the walker hands each recursion level a
//! [`ProgressSlot`], which becomes a [`ProgressState`] holding the start
//! times and position the level's log lines need.

use chrono::Utc;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::warn;

/// Heartbeat depth beyond which no further reporting happens.
pub(crate) const MAX_PROGRESS_LEVEL: u8 = 3;

/// Time thresholds for the per-level logging rules.
#[derive(Debug, Clone)]
pub struct HeartbeatThresholds {
    /// A level-2 node logs on completion only past this.
    pub level2: Duration,
    /// A level-3 node logs on completion only past this.
    pub level3: Duration,
    /// Interval of the level-3 interim beat while still in progress.
    pub beat_interval: Duration,
}

impl Default for HeartbeatThresholds {
    fn default() -> Self {
        Self {
            level2: Duration::from_secs(10),
            level3: Duration::from_secs(5),
            beat_interval: Duration::from_secs(30),
        }
    }
}

/// Line-oriented heartbeat sink, flushed immediately on every write.
pub struct HeartbeatLog {
    sink: Box<dyn Write + Send>,
    thresholds: HeartbeatThresholds,
    write_failed: bool,
}

impl HeartbeatLog {
    pub fn new(sink: Box<dyn Write + Send>, thresholds: HeartbeatThresholds) -> Self {
        Self {
            sink,
            thresholds,
            write_failed: false,
        }
    }

    /// Open a heartbeat log file. Opening is fatal to the caller if it
    /// fails; the sink is the sole liveness signal during a long walk.
    pub fn create(path: &Path, thresholds: HeartbeatThresholds) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(Box::new(file), thresholds))
    }

    /// Append one line and flush. Mid-run write failures degrade to a
    /// single diagnostic instead of aborting the walk.
    fn line(&mut self, message: &str) {
        let stamped = format!("{} {}\n", Utc::now().format("%H:%M:%S%.3f"), message);
        let result = self
            .sink
            .write_all(stamped.as_bytes())
            .and_then(|()| self.sink.flush());
        if let Err(e) = result {
            if !self.write_failed {
                warn!("heartbeat sink write failed: {e}");
                self.write_failed = true;
            }
        }
    }

    pub(crate) fn on_enter(&mut self, state: &ProgressState, label: &str) {
        tracing::debug!(level = state.level, label, "entering node");
    }

    /// Completion line for a node, per its level's rule.
    pub(crate) fn on_leave(&mut self, state: &ProgressState, label: &str) {
        let own = state.own_start.elapsed().as_secs_f64();
        match state.level {
            0 => self.line(&format!("walk complete in {own:.1}s")),
            1 => {
                let since_root = state.root_start.elapsed().as_secs_f64();
                self.line(&format!(
                    "{}/{} ({since_root:.1}s | +{own:.1}s) {label}",
                    state.index, state.total
                ));
            }
            2 if own > self.thresholds.level2.as_secs_f64() => {
                self.line(&format!("  {label} ({own:.1}s)"));
            }
            3 if own > self.thresholds.level3.as_secs_f64() => {
                self.line(&format!("    {label} ({own:.1}s)"));
            }
            _ => {}
        }
    }

    /// Interim liveness beat while a level-3 node is still in progress.
    pub(crate) fn beat_if_due(&mut self, state: &mut ProgressState, label: &str) {
        if state.level != MAX_PROGRESS_LEVEL {
            return;
        }
        if state.last_beat.elapsed() >= self.thresholds.beat_interval {
            let own = state.own_start.elapsed().as_secs_f64();
            self.line(&format!("    still walking {label} ({own:.0}s)"));
            state.last_beat = Instant::now();
        }
    }
}

/// Position a node occupies in the progress hierarchy, assigned by its
/// parent before the node starts processing.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ProgressSlot {
    pub level: u8,
    /// 1-based position among siblings.
    pub index: usize,
    /// Sibling count, taken before traversal starts.
    pub total: usize,
    /// Walk start; `None` for the root slot, which starts the clock.
    pub root_start: Option<Instant>,
}

impl ProgressSlot {
    pub fn root() -> Self {
        Self {
            level: 0,
            index: 0,
            total: 0,
            root_start: None,
        }
    }

    /// Slot for the `index`-th of `total` children, one level down.
    /// Returns `None` past the reporting depth.
    pub fn child(state: &ProgressState, index: usize, total: usize) -> Option<Self> {
        if state.level >= MAX_PROGRESS_LEVEL {
            return None;
        }
        Some(Self {
            level: state.level + 1,
            index,
            total,
            root_start: Some(state.root_start),
        })
    }
}

/// Live timing state for one node, built from its slot on entry.
#[derive(Debug)]
pub(crate) struct ProgressState {
    pub level: u8,
    pub index: usize,
    pub total: usize,
    pub root_start: Instant,
    pub own_start: Instant,
    pub last_beat: Instant,
}

impl ProgressState {
    pub fn begin(slot: ProgressSlot) -> Self {
        let now = Instant::now();
        Self {
            level: slot.level,
            index: slot.index,
            total: slot.total,
            root_start: slot.root_start.unwrap_or(now),
            own_start: now,
            last_beat: now,
        }
    }
}
