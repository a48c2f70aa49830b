//! Boundary to the external cluster store/client.
//!
//! The controller is a pure reader plus a delete-issuer: everything it needs
//! from the cluster fits behind [`ClusterStore`]. The real API client, its
//! watch machinery and TLS/auth plumbing live outside this crate; tests and
//! the default binary wiring use the in-memory implementation below.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::ownership::ServerVersion;
use crate::resources::{JobSnapshot, PodSnapshot, WorkItem};

/// Cascading behavior of a delete call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeletePropagation {
    /// Server-side default.
    Default,
    /// Foreground cascading: dependents are removed as part of the same
    /// operation (used for Jobs so their Pods go with them).
    Foreground,
}

/// Outcome taxonomy for delete calls. "Not found" is surfaced separately
/// because the executor treats it as the successful terminal state.
#[derive(Error, Debug)]
pub enum StoreDeleteError {
    #[error("object not found")]
    NotFound,

    #[error("delete failed: {0}")]
    Other(String),
}

/// Incremental change notification. Only update events are delivered; a
/// newly created object cannot yet be past any positive threshold, and the
/// periodic sweep covers immediate-eviction cases on the next tick.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeEvent {
    pub old: WorkItem,
    pub new: WorkItem,
}

/// Read/delete access to the locally-cached, versioned mirror of cluster
/// objects, plus the one-shot version probe.
#[async_trait]
pub trait ClusterStore: Send + Sync + 'static {
    /// Probed once at startup to pick the ownership strategy.
    async fn server_version(&self) -> anyhow::Result<ServerVersion>;

    async fn list_jobs(&self) -> anyhow::Result<Vec<JobSnapshot>>;

    async fn list_pods(&self) -> anyhow::Result<Vec<PodSnapshot>>;

    /// Lookup used to walk a Pod's owning Job when cron exclusion is on.
    async fn get_job(&self, namespace: &str, name: &str) -> anyhow::Result<Option<JobSnapshot>>;

    async fn delete_job(
        &self,
        namespace: &str,
        name: &str,
        propagation: DeletePropagation,
    ) -> Result<(), StoreDeleteError>;

    async fn delete_pod(
        &self,
        namespace: &str,
        name: &str,
        propagation: DeletePropagation,
    ) -> Result<(), StoreDeleteError>;

    /// Register a change-event subscription. Events are delivered in store
    /// order on a bounded channel.
    fn subscribe(&self) -> mpsc::Receiver<ChangeEvent>;
}

/// In-memory [`ClusterStore`]: the default backend of the binary when no
/// real client is wired in, and the test double for the reconcile/delete
/// paths. Deletes are recorded for inspection.
#[derive(Debug)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
    subscribers: Mutex<Vec<mpsc::Sender<ChangeEvent>>>,
}

#[derive(Debug)]
struct Inner {
    version: ServerVersion,
    jobs: BTreeMap<(String, String), JobSnapshot>,
    pods: BTreeMap<(String, String), PodSnapshot>,
    deleted_jobs: Vec<(String, String, DeletePropagation)>,
    deleted_pods: Vec<(String, String, DeletePropagation)>,
    fail_deletes: bool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_version(ServerVersion::new("1", "28"))
    }

    pub fn with_version(version: ServerVersion) -> Self {
        Self {
            inner: Mutex::new(Inner {
                version,
                jobs: BTreeMap::new(),
                pods: BTreeMap::new(),
                deleted_jobs: Vec::new(),
                deleted_pods: Vec::new(),
                fail_deletes: false,
            }),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn insert_job(&self, job: JobSnapshot) {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner
            .jobs
            .insert((job.namespace.clone(), job.name.clone()), job);
    }

    pub fn insert_pod(&self, pod: PodSnapshot) {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner
            .pods
            .insert((pod.namespace.clone(), pod.name.clone()), pod);
    }

    /// Make every subsequent delete call fail with a non-NotFound error.
    pub fn fail_deletes(&self, fail: bool) {
        self.inner.lock().expect("store lock poisoned").fail_deletes = fail;
    }

    /// Deliver an update event to all subscribers, as the watch machinery
    /// would on a change or a resync re-delivery.
    pub async fn publish_update(&self, old: WorkItem, new: WorkItem) {
        let senders: Vec<_> = self
            .subscribers
            .lock()
            .expect("store lock poisoned")
            .clone();
        for sender in senders {
            let _ = sender.send(ChangeEvent {
                old: old.clone(),
                new: new.clone(),
            })
            .await;
        }
    }

    pub fn deleted_jobs(&self) -> Vec<(String, String, DeletePropagation)> {
        self.inner
            .lock()
            .expect("store lock poisoned")
            .deleted_jobs
            .clone()
    }

    pub fn deleted_pods(&self) -> Vec<(String, String, DeletePropagation)> {
        self.inner
            .lock()
            .expect("store lock poisoned")
            .deleted_pods
            .clone()
    }
}

#[async_trait]
impl ClusterStore for InMemoryStore {
    async fn server_version(&self) -> anyhow::Result<ServerVersion> {
        Ok(self
            .inner
            .lock()
            .expect("store lock poisoned")
            .version
            .clone())
    }

    async fn list_jobs(&self) -> anyhow::Result<Vec<JobSnapshot>> {
        Ok(self
            .inner
            .lock()
            .expect("store lock poisoned")
            .jobs
            .values()
            .cloned()
            .collect())
    }

    async fn list_pods(&self) -> anyhow::Result<Vec<PodSnapshot>> {
        Ok(self
            .inner
            .lock()
            .expect("store lock poisoned")
            .pods
            .values()
            .cloned()
            .collect())
    }

    async fn get_job(&self, namespace: &str, name: &str) -> anyhow::Result<Option<JobSnapshot>> {
        Ok(self
            .inner
            .lock()
            .expect("store lock poisoned")
            .jobs
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn delete_job(
        &self,
        namespace: &str,
        name: &str,
        propagation: DeletePropagation,
    ) -> Result<(), StoreDeleteError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        if inner.fail_deletes {
            return Err(StoreDeleteError::Other("injected delete failure".into()));
        }
        let key = (namespace.to_string(), name.to_string());
        if inner.jobs.remove(&key).is_none() {
            return Err(StoreDeleteError::NotFound);
        }
        inner
            .deleted_jobs
            .push((namespace.to_string(), name.to_string(), propagation));
        Ok(())
    }

    async fn delete_pod(
        &self,
        namespace: &str,
        name: &str,
        propagation: DeletePropagation,
    ) -> Result<(), StoreDeleteError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        if inner.fail_deletes {
            return Err(StoreDeleteError::Other("injected delete failure".into()));
        }
        let key = (namespace.to_string(), name.to_string());
        if inner.pods.remove(&key).is_none() {
            return Err(StoreDeleteError::NotFound);
        }
        inner
            .deleted_pods
            .push((namespace.to_string(), name.to_string(), propagation));
        Ok(())
    }

    fn subscribe(&self) -> mpsc::Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel(64);
        self.subscribers
            .lock()
            .expect("store lock poisoned")
            .push(tx);
        rx
    }
}
