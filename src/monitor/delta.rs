use std::collections::{HashMap, HashSet};
use std::time::Instant;

/// Identity of a process across sampling cycles.
///
/// The OS recycles pids, so the pid alone is not enough: a new process that
/// inherits the pid of a dead one must not inherit its I/O counters and
/// report a bogus throughput spike. The start time disambiguates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcKey {
    pub pid: u32,
    pub start_time: u64,
}

#[derive(Debug, Clone, Copy)]
struct DeltaState {
    sampled_at: Instant,
    read_bytes: u64,
    write_bytes: u64,
}

/// Floor for the elapsed time between two readings of the same process, so
/// two cycles landing on the same clock tick cannot divide by zero.
const MIN_INTERVAL_SECS: f64 = 0.001;

/// Converts cumulative per-process I/O byte counters into a KB/s rate
/// between consecutive sightings.
///
/// This is the only state in the engine that survives across cycles.
#[derive(Debug, Default)]
pub struct DeltaTracker {
    states: HashMap<ProcKey, DeltaState>,
}

impl DeltaTracker {
    /// Record the latest cumulative counters for `key` and return the
    /// combined read+write throughput since the previous sighting.
    ///
    /// The first sighting of a key yields `0.0`. Counter resets show up as
    /// negative deltas and are clamped to zero.
    pub fn rate_kbs(&mut self, key: ProcKey, now: Instant, read_bytes: u64, write_bytes: u64) -> f64 {
        let next = DeltaState {
            sampled_at: now,
            read_bytes,
            write_bytes,
        };
        match self.states.insert(key, next) {
            None => 0.0,
            Some(prev) => {
                let dt = now
                    .duration_since(prev.sampled_at)
                    .as_secs_f64()
                    .max(MIN_INTERVAL_SECS);
                let delta = read_bytes.saturating_sub(prev.read_bytes)
                    + write_bytes.saturating_sub(prev.write_bytes);
                delta as f64 / 1024.0 / dt
            }
        }
    }

    /// Drop state for processes absent from the latest full enumeration.
    /// Callers pass every enumerated key, including ones later filtered out
    /// of the visible set, so filtering never loses tracking state.
    pub fn retain_keys(&mut self, live: &HashSet<ProcKey>) {
        self.states.retain(|key, _| live.contains(key));
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
