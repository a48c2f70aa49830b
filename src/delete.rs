//! Deletion executor.
//!
//! Performs the actual delete calls. "Not found" is the successful terminal
//! state of a delete (the object is already gone), any other error is logged
//! and counted but never retried here: the next change event or the next
//! periodic sweep is the system's at-least-once retry mechanism. In dry-run
//! mode the intent is logged and no cluster call is issued.

use std::sync::Arc;

use tracing::{info, warn};

use crate::metrics::SweeperMetrics;
use crate::resources::{JobSnapshot, PodSnapshot};
use crate::store::{ClusterStore, DeletePropagation, StoreDeleteError};

pub struct DeleteExecutor<S> {
    store: Arc<S>,
    metrics: SweeperMetrics,
    dry_run: bool,
}

impl<S: ClusterStore> DeleteExecutor<S> {
    pub fn new(store: Arc<S>, metrics: SweeperMetrics, dry_run: bool) -> Self {
        Self {
            store,
            metrics,
            dry_run,
        }
    }

    /// Delete a Job with foreground cascading so its Pods are removed as
    /// part of the same operation.
    pub async fn delete_job(&self, job: &JobSnapshot) {
        if self.dry_run {
            info!(
                namespace = %job.namespace,
                name = %job.name,
                "dry-run: job would have been deleted"
            );
            return;
        }

        info!(namespace = %job.namespace, name = %job.name, "deleting job");
        match self
            .store
            .delete_job(&job.namespace, &job.name, DeletePropagation::Foreground)
            .await
        {
            Ok(()) | Err(StoreDeleteError::NotFound) => {
                self.metrics.record_job_deleted(&job.namespace);
            }
            Err(err) => {
                warn!(
                    namespace = %job.namespace,
                    name = %job.name,
                    error = %err,
                    "failed to delete job"
                );
                self.metrics.record_job_delete_failed(&job.namespace);
            }
        }
    }

    /// Delete a Pod with default propagation.
    pub async fn delete_pod(&self, pod: &PodSnapshot) {
        if self.dry_run {
            info!(
                namespace = %pod.namespace,
                name = %pod.name,
                "dry-run: pod would have been deleted"
            );
            return;
        }

        info!(namespace = %pod.namespace, name = %pod.name, "deleting pod");
        match self
            .store
            .delete_pod(&pod.namespace, &pod.name, DeletePropagation::Default)
            .await
        {
            Ok(()) | Err(StoreDeleteError::NotFound) => {
                self.metrics.record_pod_deleted(&pod.namespace);
            }
            Err(err) => {
                warn!(
                    namespace = %pod.namespace,
                    name = %pod.name,
                    error = %err,
                    "failed to delete pod"
                );
                self.metrics.record_pod_delete_failed(&pod.namespace);
            }
        }
    }
}
