use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::info;

use crate::scan::{ScanOrchestrator, TriggerOutcome};

/// Recurring scan trigger with an explicit start/stop lifecycle. Runs one
/// cycle immediately, then one per interval. There is no cancellation of an
/// in-flight cycle: an overrun delays the next tick, it never overlaps it.
pub struct Scheduler {
    shutdown: watch::Sender<()>,
    handle: JoinHandle<()>,
}

impl Scheduler {
    pub fn start(orchestrator: Arc<ScanOrchestrator>, every: Duration) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(());
        let handle = tokio::spawn(async move {
            info!("scheduler started, scanning every {}s", every.as_secs());
            let mut interval = time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if orchestrator.run_cycle().await == TriggerOutcome::AlreadyRunning {
                            info!("periodic scan skipped, another cycle is in flight");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        info!("scheduler shutting down");
                        return;
                    }
                }
            }
        });
        Self { shutdown, handle }
    }

    /// Signal shutdown and wait for the loop to exit. A cycle already in
    /// flight finishes first.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::DiffEngine;
    use crate::snapshot::SnapshotStore;

    fn orchestrator(dir: &std::path::Path) -> Arc<ScanOrchestrator> {
        Arc::new(ScanOrchestrator::new(
            Vec::new(),
            Arc::new(crate::scan::HttpPodSource::new(Duration::from_secs(1))),
            SnapshotStore::new(dir),
            DiffEngine::reference(),
            chrono::Duration::minutes(10),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn initial_cycle_runs_immediately_and_stop_resolves() {
        let dir = tempfile::tempdir().expect("tempdir");
        let orchestrator = orchestrator(dir.path());

        let scheduler = Scheduler::start(orchestrator.clone(), Duration::from_secs(600));
        // The first interval tick fires immediately; give the loop a turn.
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(orchestrator.cached_view().await.is_some());
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_ticks_keep_refreshing_the_view() {
        let dir = tempfile::tempdir().expect("tempdir");
        let orchestrator = orchestrator(dir.path());

        let scheduler = Scheduler::start(orchestrator.clone(), Duration::from_secs(60));
        tokio::time::sleep(Duration::from_millis(50)).await;
        let first = orchestrator
            .cached_view()
            .await
            .expect("initial view")
            .last_updated;

        tokio::time::sleep(Duration::from_secs(61)).await;
        let second = orchestrator
            .cached_view()
            .await
            .expect("refreshed view")
            .last_updated;

        assert!(second > first);
        scheduler.stop().await;
    }
}
