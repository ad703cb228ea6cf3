//! Run-length grouping plan for sequences.

use mirrorwalk_core::{ObjectId, ObjectSource, ValueClass};
use std::collections::HashMap;

/// Precomputed positions of collapsible runs inside one sequence.
///
/// A run is a maximal stretch of consecutive values that are identical
/// under the same display-string equality used everywhere else: value
/// level, not node identity. Distinct containers never compare equal
/// because their fallback display carries their identity.
#[derive(Debug, Clone)]
pub struct RunGroupPlan {
    /// Child index at which a run starts -> run length.
    runs: HashMap<usize, u64>,
}

impl RunGroupPlan {
    /// Scan `seq` for runs of at least `threshold` identical values.
    /// Returns `None` when the sequence has nothing worth collapsing.
    pub fn for_sequence(
        source: &dyn ObjectSource,
        seq: ObjectId,
        threshold: u64,
    ) -> Option<RunGroupPlan> {
        if threshold == 0 {
            return None;
        }
        let children = source.try_children(seq)?;
        let mut runs = HashMap::new();

        let mut start = 0usize;
        let mut start_display: Option<String> = None;
        for (i, (_, child)) in children.iter().enumerate() {
            let display = value_display(source, *child);
            match &start_display {
                Some(current) if *current == display => continue,
                _ => {
                    record_run(&mut runs, start, i, threshold);
                    start = i;
                    start_display = Some(display);
                }
            }
        }
        record_run(&mut runs, start, children.len(), threshold);

        if runs.is_empty() {
            None
        } else {
            Some(RunGroupPlan { runs })
        }
    }

    /// Length of the run starting at `index`, if one was planned there.
    pub fn run_at(&self, index: usize) -> Option<u64> {
        self.runs.get(&index).copied()
    }
}

fn record_run(runs: &mut HashMap<usize, u64>, start: usize, end: usize, threshold: u64) {
    let len = (end - start) as u64;
    if len >= threshold {
        runs.insert(start, len);
    }
}

/// Display form used for run equality: scalar literal, explicit display
/// string, or an identity-bearing fallback so unalike values never group.
fn value_display(source: &dyn ObjectSource, id: ObjectId) -> String {
    if let Some(s) = source.try_scalar(id) {
        return s.to_string();
    }
    if let Some(d) = source.try_display(id) {
        return d;
    }
    let class = source
        .classify(id)
        .map(ValueClass::generic_label)
        .unwrap_or("value");
    format!("{class}{id}")
}
