use std::collections::HashSet;
use std::time::Instant;

use log::*;

use crate::monitor::delta::{DeltaTracker, ProcKey};
use crate::monitor::record::{ProcessRecord, round1};
use crate::monitor::source::{SnapshotSource, SourceError};

/// Walks the process table and shapes each live process into a
/// [`ProcessRecord`], reconciling cumulative I/O counters against the
/// previous cycle through the owned [`DeltaTracker`].
///
/// Each call to [`Sampler::sample`] is independent; the tracker is the only
/// state mutated between calls.
pub struct Sampler {
    source: Box<dyn SnapshotSource + Send>,
    deltas: DeltaTracker,
}

impl Sampler {
    pub fn new(source: Box<dyn SnapshotSource + Send>) -> Self {
        Self {
            source,
            deltas: DeltaTracker::default(),
        }
    }

    /// Warm-up pass. Per-process CPU% is a delta against the previous
    /// reading, so without this the first real cycle reports near-zero for
    /// every process.
    pub fn prime(&mut self) {
        if let Err(err) = self.source.processes() {
            warn!(target: "sampler", "Priming enumeration failed: {err}");
        }
    }

    /// Run one sampling cycle and return the records in enumeration order,
    /// unfiltered by search and unsorted. Search and sort are a separate
    /// stage (see [`crate::monitor::shape`]).
    ///
    /// A process whose basic stats cannot be fetched (exited mid-cycle,
    /// unreadable) is skipped without aborting the cycle. I/O counters and
    /// socket counts degrade to zero instead: /proc gates those harder than
    /// the basic stats, and a permission failure there must not drop the row.
    pub fn sample(&mut self, show_system: bool) -> Result<Vec<ProcessRecord>, SourceError> {
        let now = Instant::now();
        let metas = self.source.processes()?;
        let mut live = HashSet::with_capacity(metas.len());
        let mut records = Vec::with_capacity(metas.len());
        for meta in metas {
            let key = ProcKey {
                pid: meta.pid,
                start_time: meta.start_time,
            };
            live.insert(key);
            if !show_system && meta.owner.is_none() {
                continue;
            }
            let (cpu, memory) = match self.fetch_basic(meta.pid) {
                Ok(pair) => pair,
                Err(err) => {
                    debug!(target: "sampler", "Skipping pid {}: {err}", meta.pid);
                    continue;
                }
            };
            let (read_bytes, write_bytes) = self.source.io_counters(meta.pid).unwrap_or((0, 0));
            let connection_count = self.source.socket_count(meta.pid).unwrap_or(0);
            let rate = self.deltas.rate_kbs(key, now, read_bytes, write_bytes);
            records.push(ProcessRecord {
                pid: meta.pid,
                name: meta.name,
                cpu_percent: round1(cpu as f64),
                memory_mb: round1(memory as f64 / (1024.0 * 1024.0)),
                io_rate_kbs: round1(rate),
                connection_count,
                owner: meta.owner,
            });
        }
        // Prune against the full enumeration, not the filtered set, so a
        // process hidden by show_system keeps its counters.
        self.deltas.retain_keys(&live);
        Ok(records)
    }

    fn fetch_basic(&self, pid: u32) -> Result<(f32, u64), SourceError> {
        Ok((self.source.cpu_percent(pid)?, self.source.memory_rss(pid)?))
    }

    #[cfg(test)]
    pub fn tracked(&self) -> usize {
        self.deltas.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::source::fake::{FakeProc, FakeSource};

    const MB: u64 = 1024 * 1024;

    fn sampler(procs: Vec<FakeProc>) -> Sampler {
        Sampler::new(Box::new(FakeSource::new(procs)))
    }

    #[test]
    fn records_carry_rounded_stats() {
        let mut proc = FakeProc::new(100, "chrome", Some("alice"));
        proc.cpu = Ok(12.34);
        proc.memory = Ok(256 * MB + 512 * 1024);
        proc.sockets = Ok(3);
        let mut sampler = sampler(vec![proc]);

        let records = sampler.sample(true).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.pid, 100);
        assert_eq!(record.name, "chrome");
        assert_eq!(record.cpu_percent, 12.3);
        assert_eq!(record.memory_mb, 256.5);
        assert_eq!(record.connection_count, 3);
        assert_eq!(record.owner.as_deref(), Some("alice"));
    }

    #[test]
    fn first_sighting_reports_zero_io() {
        let mut proc = FakeProc::new(100, "dd", Some("alice"));
        proc.io = Ok((1 << 30, 1 << 30));
        let mut sampler = sampler(vec![proc]);

        let records = sampler.sample(true).unwrap();
        assert_eq!(records[0].io_rate_kbs, 0.0);
    }

    #[test]
    fn unchanged_counters_report_zero_io() {
        let mut proc = FakeProc::new(100, "dd", Some("alice"));
        proc.io = Ok((4096, 4096));
        let mut sampler = sampler(vec![proc]);

        sampler.sample(true).unwrap();
        let records = sampler.sample(true).unwrap();
        assert_eq!(records[0].io_rate_kbs, 0.0);
    }

    #[test]
    fn show_system_false_hides_unowned_processes() {
        let mut sampler = sampler(vec![
            FakeProc::new(1, "init", Some("root")),
            FakeProc::new(2, "kthreadd", None),
            FakeProc::new(100, "chrome", Some("alice")),
        ]);

        let hidden = sampler.sample(false).unwrap();
        assert_eq!(
            hidden.iter().map(|r| r.pid).collect::<Vec<_>>(),
            vec![1, 100]
        );

        // show_system=true is a strict superset.
        let all = sampler.sample(true).unwrap();
        assert_eq!(all.len(), 3);
        for record in &hidden {
            assert!(all.iter().any(|r| r.pid == record.pid));
        }
    }

    #[test]
    fn filtered_processes_keep_delta_state() {
        let mut sampler = sampler(vec![
            FakeProc::new(1, "init", Some("root")),
            FakeProc::new(2, "kthreadd", None),
        ]);
        sampler.sample(true).unwrap();
        assert_eq!(sampler.tracked(), 2);

        // Hiding system processes must not reclaim their tracking state.
        sampler.sample(false).unwrap();
        assert_eq!(sampler.tracked(), 2);
    }

    #[test]
    fn one_failing_process_does_not_poison_the_cycle() {
        let mut broken = FakeProc::new(50, "ghost", Some("alice"));
        broken.cpu = Err(SourceError::Vanished);
        let mut sampler = sampler(vec![
            FakeProc::new(1, "init", Some("root")),
            broken,
            FakeProc::new(100, "chrome", Some("alice")),
        ]);

        let records = sampler.sample(true).unwrap();
        assert_eq!(records.iter().map(|r| r.pid).collect::<Vec<_>>(), vec![1, 100]);
    }

    #[test]
    fn permission_denied_counters_degrade_to_zero() {
        let mut proc = FakeProc::new(100, "postgres", Some("postgres"));
        proc.io = Err(SourceError::PermissionDenied);
        proc.sockets = Err(SourceError::PermissionDenied);
        let mut sampler = sampler(vec![proc]);

        let records = sampler.sample(true).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].io_rate_kbs, 0.0);
        assert_eq!(records[0].connection_count, 0);
    }

    #[test]
    fn delta_state_follows_process_death() {
        let mut sampler = Sampler::new(Box::new(FakeSource::new(vec![
            FakeProc::new(1, "init", Some("root")),
            FakeProc::new(100, "chrome", Some("alice")),
        ])));
        sampler.sample(true).unwrap();
        assert_eq!(sampler.tracked(), 2);

        sampler.source = Box::new(FakeSource::new(vec![FakeProc::new(1, "init", Some("root"))]));
        sampler.sample(true).unwrap();
        assert_eq!(sampler.tracked(), 1);
    }
}
