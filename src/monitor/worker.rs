use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Local;
use log::*;
use tokio::select;
use tokio::sync::{mpsc, watch};
use tokio::task;
use tokio::time::sleep;

use crate::monitor::record::Snapshot;
use crate::monitor::sampler::Sampler;

/// Messages from the sampling worker to the presentation loop.
#[derive(Debug, Clone)]
pub enum WorkerUpdate {
    Snapshot(Snapshot),
    /// Whole-cycle failure; the previous snapshot stays on screen.
    Status(String),
}

/// Floor on the pause between cycles, so a cycle slower than the configured
/// interval self-throttles instead of running back-to-back.
const MIN_PAUSE: Duration = Duration::from_millis(100);
const UPDATE_QUEUE: usize = 8;

/// Handle to the background sampling machinery.
///
/// The sampler (and with it the delta tracker) sits behind a mutex: the
/// periodic loop and any one-off refresh are each a single writer for the
/// duration of their cycle, so racing refreshes cannot interleave counter
/// updates.
pub struct Monitor {
    sampler: Arc<Mutex<Sampler>>,
    show_system: Arc<AtomicBool>,
    stop: watch::Sender<bool>,
    updates_tx: mpsc::Sender<WorkerUpdate>,
}

impl Monitor {
    /// Prime the sampler and spawn the periodic worker. The returned
    /// receiver delivers one update per completed cycle.
    pub fn spawn(
        mut sampler: Sampler,
        interval: Duration,
        show_system: bool,
    ) -> (Self, mpsc::Receiver<WorkerUpdate>) {
        sampler.prime();
        let sampler = Arc::new(Mutex::new(sampler));
        let show_system = Arc::new(AtomicBool::new(show_system));
        let (updates_tx, updates_rx) = mpsc::channel(UPDATE_QUEUE);
        let (stop, stop_rx) = watch::channel(false);
        tokio::spawn(run_loop(
            Arc::clone(&sampler),
            updates_tx.clone(),
            stop_rx,
            interval,
            Arc::clone(&show_system),
        ));
        let monitor = Self {
            sampler,
            show_system,
            stop,
            updates_tx,
        };
        (monitor, updates_rx)
    }

    /// One-off cycle outside the periodic cadence (search submit, manual
    /// refresh key). Runs as its own task; the sampler mutex keeps it from
    /// corrupting delta state if it races the periodic loop.
    pub fn refresh_now(&self) {
        let sampler = Arc::clone(&self.sampler);
        let updates = self.updates_tx.clone();
        let show_system = self.show_system.load(Ordering::Relaxed);
        tokio::spawn(async move {
            let update = run_cycle(sampler, show_system).await;
            let _ = updates.send(update).await;
        });
    }

    /// Flip system-process visibility, returning the new value.
    pub fn toggle_show_system(&self) -> bool {
        !self.show_system.fetch_xor(true, Ordering::Relaxed)
    }

    /// Ask the worker to exit at the next cycle boundary.
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }
}

async fn run_loop(
    sampler: Arc<Mutex<Sampler>>,
    updates: mpsc::Sender<WorkerUpdate>,
    mut stop: watch::Receiver<bool>,
    interval: Duration,
    show_system: Arc<AtomicBool>,
) {
    loop {
        if *stop.borrow() {
            break;
        }
        let started = Instant::now();
        let update = run_cycle(Arc::clone(&sampler), show_system.load(Ordering::Relaxed)).await;
        if updates.send(update).await.is_err() {
            // Presentation side is gone; nothing left to publish to.
            break;
        }
        let pause = interval.saturating_sub(started.elapsed()).max(MIN_PAUSE);
        select! {
            _ = sleep(pause) => {}
            _ = stop.changed() => {}
        }
    }
    debug!(target: "monitor", "Sampling worker stopped");
}

/// One full cycle on the blocking pool. In-progress results never leak: the
/// cycle publishes exactly one update once it is complete.
async fn run_cycle(sampler: Arc<Mutex<Sampler>>, show_system: bool) -> WorkerUpdate {
    let result = task::spawn_blocking(move || {
        let mut sampler = sampler.lock().expect("sampler mutex poisoned");
        sampler.sample(show_system)
    })
    .await;
    match result {
        Ok(Ok(records)) => WorkerUpdate::Snapshot(Snapshot {
            records,
            taken_at: Local::now(),
        }),
        Ok(Err(err)) => WorkerUpdate::Status(format!("Sampling failed: {err}")),
        Err(err) => WorkerUpdate::Status(format!("Sampling task failed: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::source::fake::{FakeProc, FakeSource};

    fn sampler() -> Sampler {
        Sampler::new(Box::new(FakeSource::new(vec![
            FakeProc::new(1, "init", Some("root")),
            FakeProc::new(100, "chrome", Some("alice")),
        ])))
    }

    #[tokio::test]
    async fn worker_publishes_completed_snapshots() {
        let (monitor, mut updates) = Monitor::spawn(sampler(), Duration::from_millis(10), true);
        match updates.recv().await.expect("first update") {
            WorkerUpdate::Snapshot(snapshot) => {
                assert_eq!(snapshot.count(), 2);
            }
            WorkerUpdate::Status(status) => panic!("unexpected status: {status}"),
        }
        monitor.stop();
    }

    #[tokio::test]
    async fn refresh_now_publishes_outside_the_cadence() {
        // Interval far beyond the test's lifetime: the second update can
        // only come from the one-off refresh.
        let (monitor, mut updates) = Monitor::spawn(sampler(), Duration::from_secs(600), true);
        updates.recv().await.expect("initial cycle");

        monitor.refresh_now();
        match updates.recv().await.expect("refresh update") {
            WorkerUpdate::Snapshot(snapshot) => assert_eq!(snapshot.count(), 2),
            WorkerUpdate::Status(status) => panic!("unexpected status: {status}"),
        }
        monitor.stop();
    }

    #[tokio::test]
    async fn toggle_show_system_flips_and_reports() {
        let (monitor, _updates) = Monitor::spawn(sampler(), Duration::from_secs(600), true);
        assert!(!monitor.toggle_show_system());
        assert!(monitor.toggle_show_system());
        monitor.stop();
    }
}
