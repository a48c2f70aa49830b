//! Reconciliation loop.
//!
//! Two independent triggers feed one classify+act entry point: change events
//! from the store subscription, and a clock-driven sweep over the full store
//! snapshot at twice the resync interval. The sweep is a required control
//! path, not an optimization — an object can become eligible purely because
//! time passed, with no cluster-side update ever arriving.
//!
//! Both triggers are safe to overlap: classification is a pure function of
//! the snapshot and deletes are idempotent (a duplicate delete resolves to
//! "not found", which counts as success).

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::classify;
use crate::config::{RetentionThresholds, SweeperConfig};
use crate::delete::DeleteExecutor;
use crate::metrics::SweeperMetrics;
use crate::ownership::{OwnershipStrategy, PodOwnership};
use crate::resources::{PodSnapshot, WorkItem};
use crate::store::ClusterStore;

pub struct Sweeper<S> {
    store: Arc<S>,
    config: SweeperConfig,
    thresholds: RetentionThresholds,
    strategy: OwnershipStrategy,
    executor: DeleteExecutor<S>,
}

impl<S: ClusterStore> Sweeper<S> {
    pub fn new(
        store: Arc<S>,
        config: SweeperConfig,
        strategy: OwnershipStrategy,
        metrics: SweeperMetrics,
    ) -> Self {
        let executor = DeleteExecutor::new(store.clone(), metrics, config.dry_run);
        let thresholds = config.thresholds();
        Self {
            store,
            config,
            thresholds,
            strategy,
            executor,
        }
    }

    /// Run until the stop signal fires. Consumes the change-event
    /// subscription and drives the periodic sweep; both funnel through
    /// [`Sweeper::process`].
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut events = self.store.subscribe();
        let mut events_open = true;
        let mut ticker = tokio::time::interval(self.config.sweep_interval());
        // the first tick fires immediately; skip it so startup does not
        // double up with the initial list the store just performed
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                maybe_event = events.recv(), if events_open => {
                    match maybe_event {
                        Some(event) => {
                            // resyncs re-deliver unchanged objects
                            if event.old != event.new {
                                self.process(&event.new).await;
                            }
                        }
                        None => {
                            warn!("change-event subscription closed, relying on periodic sweep");
                            events_open = false;
                        }
                    }
                }
                _ = ticker.tick() => {
                    self.sweep().await;
                }
            }
        }
    }

    /// Walk the full store snapshot once, feeding every Job and Pod through
    /// the same decision path the event trigger uses.
    pub async fn sweep(&self) {
        match self.store.list_jobs().await {
            Ok(jobs) => {
                debug!(count = jobs.len(), "sweeping jobs");
                for job in jobs {
                    self.process(&WorkItem::Job(job)).await;
                }
            }
            Err(err) => warn!(error = %err, "failed to list jobs, retrying next sweep"),
        }
        match self.store.list_pods().await {
            Ok(pods) => {
                debug!(count = pods.len(), "sweeping pods");
                for pod in pods {
                    self.process(&WorkItem::Pod(pod)).await;
                }
            }
            Err(err) => warn!(error = %err, "failed to list pods, retrying next sweep"),
        }
    }

    /// The single classify+act entry point used by both triggers.
    pub async fn process(&self, item: &WorkItem) {
        // a set deletion marker means a delete is already in flight;
        // re-issuing would double-count metrics
        if item.deletion_timestamp().is_some() {
            return;
        }

        match item {
            WorkItem::Job(job) => {
                if classify::should_delete_job(
                    job,
                    &self.thresholds,
                    self.config.ignore_owned_by_cronjob,
                    self.config.respect_annotations,
                    self.strategy,
                    Utc::now(),
                ) {
                    self.executor.delete_job(job).await;
                }
            }
            WorkItem::Pod(pod) => {
                let ownership = self.strategy.pod_ownership(pod);
                if self.config.ignore_owned_by_cronjob
                    && self.pod_related_to_cronjob(pod, &ownership).await
                {
                    return;
                }
                if classify::should_delete_pod(
                    pod,
                    &ownership,
                    &self.thresholds,
                    self.config.respect_annotations,
                    Utc::now(),
                ) {
                    self.executor.delete_pod(pod).await;
                }
            }
        }
    }

    /// A pod is cron-related when its single owning Job is itself owned by
    /// a CronJob. Lookup failures keep the pod (fail toward retention).
    async fn pod_related_to_cronjob(&self, pod: &PodSnapshot, ownership: &PodOwnership) -> bool {
        let PodOwnership::Job(owner_name) = ownership else {
            return false;
        };
        match self.store.get_job(&pod.namespace, owner_name).await {
            Ok(Some(job)) => self.strategy.job_owned_by_cronjob(&job),
            Ok(None) => false,
            Err(err) => {
                warn!(
                    namespace = %pod.namespace,
                    pod = %pod.name,
                    job = %owner_name,
                    error = %err,
                    "owning job lookup failed"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{
        JobSnapshot, OwnerRef, PodCondition, PodConditionType, PodPhase,
    };
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn test_config() -> SweeperConfig {
        SweeperConfig {
            delete_successful_after: Duration::from_secs(1),
            delete_failed_after: Duration::from_secs(1),
            delete_pending_after: Duration::from_secs(1),
            delete_orphaned_after: Duration::from_secs(1),
            delete_evicted_after: Duration::from_secs(1),
            resync_interval: Duration::from_millis(10),
            ..Default::default()
        }
    }

    fn finished_pod(name: &str, owners: Vec<OwnerRef>) -> PodSnapshot {
        PodSnapshot {
            namespace: "default".into(),
            name: name.into(),
            phase: PodPhase::Succeeded,
            reason: None,
            conditions: vec![PodCondition {
                condition_type: PodConditionType::Ready,
                status: false,
                last_transition_time: Utc::now() - chrono::Duration::minutes(5),
            }],
            owner_references: owners,
            annotations: BTreeMap::new(),
            deletion_timestamp: None,
        }
    }

    fn finished_job(name: &str, owners: Vec<OwnerRef>) -> JobSnapshot {
        JobSnapshot {
            namespace: "default".into(),
            name: name.into(),
            active: 0,
            succeeded: 1,
            failed: 0,
            completion_time: Some(Utc::now() - chrono::Duration::minutes(5)),
            conditions: vec![],
            owner_references: owners,
            annotations: BTreeMap::new(),
            deletion_timestamp: None,
        }
    }

    fn sweeper(store: Arc<crate::store::InMemoryStore>, config: SweeperConfig) -> Sweeper<crate::store::InMemoryStore> {
        Sweeper::new(
            store,
            config,
            OwnershipStrategy::Modern,
            SweeperMetrics::new(),
        )
    }

    #[tokio::test]
    async fn test_sweep_deletes_expired_items() {
        let store = Arc::new(crate::store::InMemoryStore::new());
        store.insert_job(finished_job("j1", vec![]));
        store.insert_pod(finished_pod("p1", vec![]));
        let s = sweeper(store.clone(), test_config());

        s.sweep().await;

        assert_eq!(store.deleted_jobs().len(), 1);
        assert_eq!(store.deleted_pods().len(), 1);
    }

    #[tokio::test]
    async fn test_deletion_marker_skips_processing() {
        let store = Arc::new(crate::store::InMemoryStore::new());
        let mut pod = finished_pod("p1", vec![]);
        pod.deletion_timestamp = Some(Utc::now());
        store.insert_pod(pod.clone());
        let s = sweeper(store.clone(), test_config());

        // both trigger paths, twice each: still no delete call
        s.process(&WorkItem::Pod(pod.clone())).await;
        s.process(&WorkItem::Pod(pod)).await;
        s.sweep().await;

        assert!(store.deleted_pods().is_empty());
    }

    #[tokio::test]
    async fn test_event_and_sweep_paths_agree() {
        let make_store = || {
            let store = Arc::new(crate::store::InMemoryStore::new());
            store.insert_job(finished_job("expired", vec![]));
            store.insert_job(JobSnapshot {
                completion_time: None,
                succeeded: 0,
                ..finished_job("running", vec![])
            });
            store.insert_pod(finished_pod("orphan", vec![]));
            store
        };

        // event path: each item processed individually
        let event_store = make_store();
        let s = sweeper(event_store.clone(), test_config());
        for job in event_store.list_jobs().await.unwrap() {
            s.process(&WorkItem::Job(job)).await;
        }
        for pod in event_store.list_pods().await.unwrap() {
            s.process(&WorkItem::Pod(pod)).await;
        }

        // sweep path: one snapshot walk
        let sweep_store = make_store();
        let s2 = sweeper(sweep_store.clone(), test_config());
        s2.sweep().await;

        assert_eq!(event_store.deleted_jobs(), sweep_store.deleted_jobs());
        assert_eq!(event_store.deleted_pods(), sweep_store.deleted_pods());
        assert_eq!(event_store.deleted_jobs().len(), 1);
    }

    #[tokio::test]
    async fn test_cron_owned_jobs_and_their_pods_are_skipped() {
        let store = Arc::new(crate::store::InMemoryStore::new());
        let cron_job = finished_job(
            "nightly-123",
            vec![OwnerRef {
                kind: "CronJob".into(),
                name: "nightly".into(),
            }],
        );
        store.insert_job(cron_job);
        store.insert_pod(finished_pod(
            "nightly-123-pod",
            vec![OwnerRef {
                kind: "Job".into(),
                name: "nightly-123".into(),
            }],
        ));

        let config = SweeperConfig {
            ignore_owned_by_cronjob: true,
            ..test_config()
        };
        let s = sweeper(store.clone(), config);
        s.sweep().await;

        assert!(store.deleted_jobs().is_empty());
        assert!(store.deleted_pods().is_empty());
    }

    #[tokio::test]
    async fn test_job_owned_pod_with_missing_parent_is_still_cleaned() {
        let store = Arc::new(crate::store::InMemoryStore::new());
        store.insert_pod(finished_pod(
            "stray",
            vec![OwnerRef {
                kind: "Job".into(),
                name: "gone".into(),
            }],
        ));
        let config = SweeperConfig {
            ignore_owned_by_cronjob: true,
            ..test_config()
        };
        let s = sweeper(store.clone(), config);
        s.sweep().await;

        assert_eq!(store.deleted_pods().len(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_deletes_nothing() {
        let store = Arc::new(crate::store::InMemoryStore::new());
        store.insert_job(finished_job("j1", vec![]));
        store.insert_pod(finished_pod("p1", vec![]));
        let config = SweeperConfig {
            dry_run: true,
            ..test_config()
        };
        let s = sweeper(store.clone(), config);
        s.sweep().await;

        assert!(store.deleted_jobs().is_empty());
        assert!(store.deleted_pods().is_empty());
    }

    #[tokio::test]
    async fn test_unchanged_events_are_suppressed() {
        let store = Arc::new(crate::store::InMemoryStore::new());
        // the pod exists in the store so a delete would succeed if issued
        store.insert_pod(finished_pod("p1", vec![]));
        // long resync keeps the periodic sweep out of this test
        let config = SweeperConfig {
            resync_interval: Duration::from_secs(3600),
            ..test_config()
        };
        let s = Arc::new(sweeper(store.clone(), config));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let runner = {
            let s = s.clone();
            tokio::spawn(async move { s.run(shutdown_rx).await })
        };

        // identical old/new must be dropped before classification
        let item = WorkItem::Pod(finished_pod("p1", vec![]));
        store.publish_update(item.clone(), item.clone()).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(store.deleted_pods().is_empty());

        // a real change goes through the classify+act path
        let mut changed = finished_pod("p1", vec![]);
        changed
            .annotations
            .insert("touched".to_string(), "1".to_string());
        store
            .publish_update(item, WorkItem::Pod(changed))
            .await;

        let deleted = wait_for(|| !store.deleted_pods().is_empty()).await;
        assert!(deleted, "expected the changed pod to be deleted");

        shutdown_tx.send(true).unwrap();
        runner.await.unwrap();
    }

    #[tokio::test]
    async fn test_periodic_sweep_catches_time_only_eligibility() {
        let store = Arc::new(crate::store::InMemoryStore::new());
        // already expired, but no event will ever arrive for it
        store.insert_job(finished_job("silent", vec![]));
        let s = Arc::new(sweeper(store.clone(), test_config()));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let runner = {
            let s = s.clone();
            tokio::spawn(async move { s.run(shutdown_rx).await })
        };

        let deleted = wait_for(|| !store.deleted_jobs().is_empty()).await;
        assert!(deleted, "expected the sweep to delete the expired job");

        shutdown_tx.send(true).unwrap();
        runner.await.unwrap();
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..100 {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        condition()
    }
}
