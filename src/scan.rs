use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Days, Duration as ChronoDuration, Local, Utc};
use futures_util::future::BoxFuture;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, RwLock};
use tracing::{error, info, warn};

use crate::classifier::classify;
use crate::clients::ClusterClient;
use crate::clients::contexts::ClusterTarget;
use crate::diff::{DiffEngine, DiffResult};
use crate::error::CollectError;
use crate::models::k8s::Pod;
use crate::models::record::AbnormalPodRecord;
use crate::models::views::{
    Charts, DashboardView, Distribution, LastResult, ScanStats, SchedulerStatus,
};
use crate::snapshot::SnapshotStore;

/// Supplies the raw pod listing for one cluster. The production source talks
/// to the API server through a freshly provisioned client; tests substitute
/// canned data.
pub trait PodSource: Send + Sync {
    fn list_pods<'a>(
        &'a self,
        target: &'a ClusterTarget,
    ) -> BoxFuture<'a, Result<Vec<Pod>, CollectError>>;
}

/// Lists pods through a client built per call, so every scan observes the
/// credentials currently on disk.
pub struct HttpPodSource {
    timeout: Duration,
}

impl HttpPodSource {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl PodSource for HttpPodSource {
    fn list_pods<'a>(
        &'a self,
        target: &'a ClusterTarget,
    ) -> BoxFuture<'a, Result<Vec<Pod>, CollectError>> {
        Box::pin(async move {
            let client = ClusterClient::connect(target, self.timeout)?;
            let list = client.list_all_pods().await?;
            Ok(list.items)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Accepted,
    AlreadyRunning,
}

/// Drives one scan cycle end to end and owns everything a cycle touches:
/// the scan lock, the published view, and the run status. At most one cycle
/// runs at a time; a trigger that finds the lock held is rejected, never
/// queued.
pub struct ScanOrchestrator {
    targets: Vec<ClusterTarget>,
    source: Arc<dyn PodSource>,
    store: SnapshotStore,
    engine: DiffEngine,
    pending_threshold: ChronoDuration,
    scan_lock: Arc<AsyncMutex<()>>,
    cache: RwLock<Option<Arc<DashboardView>>>,
    status: Mutex<SchedulerStatus>,
}

impl ScanOrchestrator {
    pub fn new(
        targets: Vec<ClusterTarget>,
        source: Arc<dyn PodSource>,
        store: SnapshotStore,
        engine: DiffEngine,
        pending_threshold: ChronoDuration,
    ) -> Self {
        Self {
            targets,
            source,
            store,
            engine,
            pending_threshold,
            scan_lock: Arc::new(AsyncMutex::new(())),
            cache: RwLock::new(None),
            status: Mutex::new(SchedulerStatus::default()),
        }
    }

    /// Ad-hoc trigger. The lock is taken synchronously before the cycle is
    /// spawned, so a second caller is rejected even before the first cycle
    /// has been polled.
    pub fn trigger_scan(self: Arc<Self>) -> TriggerOutcome {
        match self.scan_lock.clone().try_lock_owned() {
            Ok(guard) => {
                let orchestrator = self.clone();
                tokio::spawn(async move {
                    orchestrator.run_locked(guard).await;
                });
                TriggerOutcome::Accepted
            }
            Err(_) => TriggerOutcome::AlreadyRunning,
        }
    }

    /// Scheduler path: runs the cycle inline. Subject to the same
    /// single-flight rule as `trigger_scan`.
    pub async fn run_cycle(&self) -> TriggerOutcome {
        match self.scan_lock.clone().try_lock_owned() {
            Ok(guard) => {
                self.run_locked(guard).await;
                TriggerOutcome::Accepted
            }
            Err(_) => TriggerOutcome::AlreadyRunning,
        }
    }

    /// The last published view. Never touches the scan lock; a reader sees
    /// either the previous complete view or the newly swapped-in one.
    pub async fn cached_view(&self) -> Option<Arc<DashboardView>> {
        self.cache.read().await.clone()
    }

    pub fn status(&self) -> SchedulerStatus {
        self.status.lock().unwrap().clone()
    }

    async fn run_locked(&self, _guard: OwnedMutexGuard<()>) {
        let started = Utc::now();
        self.status.lock().unwrap().running = true;
        info!("scan cycle started across {} cluster(s)", self.targets.len());

        let records = self.collect_all().await;

        let today = Local::now().date_naive();
        if let Err(e) = self.store.save(&records, today) {
            error!("snapshot persistence failed: {}", e);
            self.finish(started, LastResult::Failed(format!("snapshot persistence failed: {e}")));
            return;
        }

        let yesterday = today - Days::new(1);
        let previous = self.store.load(yesterday);
        let analysis = self.engine.diff(&records, &previous);
        let view = build_view(&records, analysis);

        *self.cache.write().await = Some(Arc::new(view));
        self.finish(started, LastResult::Success);
        info!(
            "scan cycle completed, {} abnormal pod(s) across all clusters",
            records.len()
        );
    }

    /// Fan out one task per cluster and join them all at a single completion
    /// point. No cluster's result is published individually.
    async fn collect_all(&self) -> Vec<AbnormalPodRecord> {
        let mut handles = Vec::new();
        for target in self.targets.clone() {
            let source = self.source.clone();
            let threshold = self.pending_threshold;
            handles.push(tokio::spawn(async move {
                scan_cluster(source.as_ref(), &target, threshold).await
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(records) => all.extend(records),
                Err(e) => warn!("cluster scan task panicked: {}", e),
            }
        }
        all
    }

    fn finish(&self, started: DateTime<Utc>, result: LastResult) {
        let mut status = self.status.lock().unwrap();
        status.running = false;
        status.last_run = Some(started);
        status.last_result = result;
    }
}

/// Scan one cluster: list, classify, convert findings to records. A
/// collection failure becomes a single synthetic record for the cluster and
/// never aborts the cycle.
async fn scan_cluster(
    source: &dyn PodSource,
    target: &ClusterTarget,
    pending_threshold: ChronoDuration,
) -> Vec<AbnormalPodRecord> {
    info!(
        "checking cluster '{}' (context '{}')",
        target.cluster, target.context
    );

    let pods = match source.list_pods(target).await {
        Ok(pods) => pods,
        Err(e) => {
            warn!("cluster '{}' scan failed: {}", target.cluster, e);
            return vec![AbnormalPodRecord::cluster_error(
                &target.cluster,
                &target.context,
                e.status_label(),
                &e.to_string(),
                Utc::now(),
            )];
        }
    };

    let now = Utc::now();
    let mut records = Vec::new();
    for pod in &pods {
        let classification = classify(pod, now, pending_threshold);
        if classification.abnormal {
            records.push(AbnormalPodRecord::from_pod(
                &target.cluster,
                &target.context,
                pod,
                &classification.reasons,
                now,
            ));
        }
    }
    info!(
        "cluster '{}' scan complete, {} abnormal pod(s)",
        target.cluster,
        records.len()
    );
    records
}

fn build_view(records: &[AbnormalPodRecord], analysis: DiffResult) -> DashboardView {
    let mut status_counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut cluster_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for record in records {
        *status_counts.entry(record.status.as_str()).or_default() += 1;
        *cluster_counts.entry(record.cluster.as_str()).or_default() += 1;
    }

    DashboardView {
        stats: ScanStats {
            total: records.len(),
            new: analysis.new.len(),
            ongoing: analysis.ongoing.len(),
            resolved: analysis.resolved.len(),
        },
        charts: Charts {
            status_distribution: to_distribution(status_counts),
            cluster_distribution: to_distribution(cluster_counts),
        },
        lists: analysis,
        last_updated: Utc::now(),
    }
}

fn to_distribution(counts: BTreeMap<&str, usize>) -> Distribution {
    let mut distribution = Distribution::default();
    for (label, value) in counts {
        distribution.labels.push(label.to_string());
        distribution.values.push(value);
    }
    distribution
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::k8s::{ObjectMeta, Pod, PodSpec, PodStatus};
    use std::collections::HashMap;

    fn failed_pod(name: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: name.to_string(),
                namespace: "default".to_string(),
                ..Default::default()
            },
            spec: PodSpec {
                node_name: "node-1".to_string(),
            },
            status: PodStatus {
                phase: "Failed".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn target(cluster: &str) -> ClusterTarget {
        ClusterTarget {
            cluster: cluster.to_string(),
            context: format!("{cluster}-admin"),
            server: format!("https://{cluster}.example:6443"),
            token: None,
            token_path: None,
            ca_cert_path: None,
            ca_cert_data: None,
            insecure_skip_tls_verify: false,
        }
    }

    /// Per-cluster canned listings, optionally delayed to hold the scan
    /// lock for a while.
    struct StaticSource {
        pods: HashMap<String, Result<Vec<Pod>, String>>,
        delay: Duration,
    }

    impl StaticSource {
        fn new(pods: HashMap<String, Result<Vec<Pod>, String>>) -> Self {
            Self {
                pods,
                delay: Duration::ZERO,
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    impl PodSource for StaticSource {
        fn list_pods<'a>(
            &'a self,
            target: &'a ClusterTarget,
        ) -> BoxFuture<'a, Result<Vec<Pod>, CollectError>> {
            Box::pin(async move {
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                match self.pods.get(&target.cluster) {
                    Some(Ok(pods)) => Ok(pods.clone()),
                    Some(Err(message)) => Err(CollectError::Connectivity(message.clone())),
                    None => Ok(Vec::new()),
                }
            })
        }
    }

    fn orchestrator_with(
        targets: Vec<ClusterTarget>,
        source: StaticSource,
        dir: &std::path::Path,
    ) -> Arc<ScanOrchestrator> {
        Arc::new(ScanOrchestrator::new(
            targets,
            Arc::new(source),
            SnapshotStore::new(dir),
            DiffEngine::reference(),
            ChronoDuration::minutes(10),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn second_trigger_is_rejected_while_first_runs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut pods = HashMap::new();
        pods.insert("prod".to_string(), Ok(vec![failed_pod("p1")]));
        let source = StaticSource::new(pods).with_delay(Duration::from_millis(200));
        let orchestrator = orchestrator_with(vec![target("prod")], source, dir.path());

        assert_eq!(orchestrator.clone().trigger_scan(), TriggerOutcome::Accepted);
        assert_eq!(
            orchestrator.clone().trigger_scan(),
            TriggerOutcome::AlreadyRunning
        );

        // The first cycle still completes normally.
        tokio::time::sleep(Duration::from_millis(300)).await;
        let status = orchestrator.status();
        assert!(!status.running);
        assert_eq!(status.last_result, LastResult::Success);
        let view = orchestrator.cached_view().await.expect("view published");
        assert_eq!(view.stats.total, 1);
    }

    #[tokio::test]
    async fn one_failing_cluster_does_not_abort_the_cycle() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut pods = HashMap::new();
        pods.insert("good".to_string(), Ok(vec![failed_pod("p1")]));
        pods.insert("bad".to_string(), Err("connection refused".to_string()));
        let orchestrator = orchestrator_with(
            vec![target("good"), target("bad")],
            StaticSource::new(pods),
            dir.path(),
        );

        assert_eq!(orchestrator.run_cycle().await, TriggerOutcome::Accepted);

        let view = orchestrator.cached_view().await.expect("view published");
        assert_eq!(view.stats.total, 2);
        let synthetic = view
            .lists
            .new
            .iter()
            .find(|r| r.cluster == "bad")
            .expect("synthetic record present");
        assert_eq!(synthetic.status, "CONNECTION_ERROR");
        assert_eq!(synthetic.pod, "N/A");
        assert!(view.lists.new.iter().any(|r| r.cluster == "good"));
    }

    #[tokio::test]
    async fn cycle_diffs_against_yesterday_snapshot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path());
        let yesterday = Local::now().date_naive() - Days::new(1);
        let ongoing = AbnormalPodRecord::from_pod(
            "prod",
            "prod-admin",
            &failed_pod("p1"),
            &[],
            Utc::now(),
        );
        let resolved = AbnormalPodRecord::from_pod(
            "prod",
            "prod-admin",
            &failed_pod("gone"),
            &[],
            Utc::now(),
        );
        store
            .save(&[ongoing, resolved], yesterday)
            .expect("seed yesterday");

        let mut pods = HashMap::new();
        pods.insert(
            "prod".to_string(),
            Ok(vec![failed_pod("p1"), failed_pod("p2")]),
        );
        let orchestrator =
            orchestrator_with(vec![target("prod")], StaticSource::new(pods), dir.path());

        orchestrator.run_cycle().await;

        let view = orchestrator.cached_view().await.expect("view published");
        assert_eq!(view.stats.new, 1);
        assert_eq!(view.stats.ongoing, 1);
        assert_eq!(view.stats.resolved, 1);
        assert_eq!(view.lists.new[0].pod, "p2");
        assert_eq!(view.lists.ongoing[0].pod, "p1");
        assert_eq!(view.lists.resolved[0].pod, "gone");
    }

    #[tokio::test]
    async fn failed_persistence_retains_previous_view() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut pods = HashMap::new();
        pods.insert("prod".to_string(), Ok(vec![failed_pod("p1")]));
        let orchestrator =
            orchestrator_with(vec![target("prod")], StaticSource::new(pods), dir.path());

        orchestrator.run_cycle().await;
        let first = orchestrator.cached_view().await.expect("first view");

        // Occupy today's snapshot path with a directory so the atomic
        // rename in the next save fails.
        let today = Local::now().date_naive();
        let path = dir
            .path()
            .join(format!("abnormal_pods_{}.json", today.format("%Y%m%d")));
        std::fs::remove_file(&path).expect("remove snapshot");
        std::fs::create_dir(&path).expect("block snapshot path");

        orchestrator.run_cycle().await;

        let status = orchestrator.status();
        assert!(matches!(status.last_result, LastResult::Failed(_)));
        let retained = orchestrator.cached_view().await.expect("view retained");
        assert_eq!(retained.last_updated, first.last_updated);
    }

    #[tokio::test]
    async fn empty_target_list_publishes_an_empty_view() {
        let dir = tempfile::tempdir().expect("tempdir");
        let orchestrator =
            orchestrator_with(Vec::new(), StaticSource::new(HashMap::new()), dir.path());

        orchestrator.run_cycle().await;

        let view = orchestrator.cached_view().await.expect("view published");
        assert_eq!(view.stats.total, 0);
        assert!(view.charts.status_distribution.labels.is_empty());
    }

    #[tokio::test]
    async fn status_distribution_counts_by_phase() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut pods = HashMap::new();
        pods.insert(
            "prod".to_string(),
            Ok(vec![failed_pod("p1"), failed_pod("p2")]),
        );
        let orchestrator =
            orchestrator_with(vec![target("prod")], StaticSource::new(pods), dir.path());

        orchestrator.run_cycle().await;

        let view = orchestrator.cached_view().await.expect("view published");
        assert_eq!(view.charts.status_distribution.labels, vec!["Failed"]);
        assert_eq!(view.charts.status_distribution.values, vec![2]);
        assert_eq!(view.charts.cluster_distribution.labels, vec!["prod"]);
        assert_eq!(view.charts.cluster_distribution.values, vec![2]);
    }
}
