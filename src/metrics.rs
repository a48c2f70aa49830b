//! Deletion counters and their HTTP exposition.
//!
//! Counters are per namespace and concurrency-safe; the render path produces
//! Prometheus text format served on `/metrics`. Dry-run deletions increment
//! nothing.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use axum::{Router, routing::get};

const JOBS_DELETED: &str = "jobs_deleted_total";
const JOBS_DELETED_FAILED: &str = "jobs_deleted_failed_total";
const PODS_DELETED: &str = "pods_deleted_total";
const PODS_DELETED_FAILED: &str = "pods_deleted_failed_total";

/// Thread-safe per-namespace deletion counters.
#[derive(Clone, Debug, Default)]
pub struct SweeperMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    jobs_deleted: Mutex<BTreeMap<String, u64>>,
    jobs_deleted_failed: Mutex<BTreeMap<String, u64>>,
    pods_deleted: Mutex<BTreeMap<String, u64>>,
    pods_deleted_failed: Mutex<BTreeMap<String, u64>>,
}

fn bump(counters: &Mutex<BTreeMap<String, u64>>, namespace: &str) {
    let mut map = counters.lock().expect("metrics lock poisoned");
    *map.entry(namespace.to_string()).or_insert(0) += 1;
}

fn value(counters: &Mutex<BTreeMap<String, u64>>, namespace: &str) -> u64 {
    counters
        .lock()
        .expect("metrics lock poisoned")
        .get(namespace)
        .copied()
        .unwrap_or(0)
}

fn render_counter(out: &mut String, name: &str, counters: &Mutex<BTreeMap<String, u64>>) {
    let map = counters.lock().expect("metrics lock poisoned");
    out.push_str(&format!("# TYPE {name} counter\n"));
    for (namespace, count) in map.iter() {
        out.push_str(&format!("{name}{{namespace=\"{namespace}\"}} {count}\n"));
    }
}

impl SweeperMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_job_deleted(&self, namespace: &str) {
        bump(&self.inner.jobs_deleted, namespace);
    }

    pub fn record_job_delete_failed(&self, namespace: &str) {
        bump(&self.inner.jobs_deleted_failed, namespace);
    }

    pub fn record_pod_deleted(&self, namespace: &str) {
        bump(&self.inner.pods_deleted, namespace);
    }

    pub fn record_pod_delete_failed(&self, namespace: &str) {
        bump(&self.inner.pods_deleted_failed, namespace);
    }

    pub fn jobs_deleted(&self, namespace: &str) -> u64 {
        value(&self.inner.jobs_deleted, namespace)
    }

    pub fn jobs_delete_failed(&self, namespace: &str) -> u64 {
        value(&self.inner.jobs_deleted_failed, namespace)
    }

    pub fn pods_deleted(&self, namespace: &str) -> u64 {
        value(&self.inner.pods_deleted, namespace)
    }

    pub fn pods_delete_failed(&self, namespace: &str) -> u64 {
        value(&self.inner.pods_deleted_failed, namespace)
    }

    /// Prometheus text exposition of all counters.
    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();
        render_counter(&mut out, JOBS_DELETED, &self.inner.jobs_deleted);
        render_counter(&mut out, JOBS_DELETED_FAILED, &self.inner.jobs_deleted_failed);
        render_counter(&mut out, PODS_DELETED, &self.inner.pods_deleted);
        render_counter(&mut out, PODS_DELETED_FAILED, &self.inner.pods_deleted_failed);
        out
    }
}

/// Router exposing `/metrics` and `/healthz`.
pub fn router(metrics: SweeperMetrics) -> Router {
    Router::new()
        .route(
            "/metrics",
            get(move || {
                let metrics = metrics.clone();
                async move { metrics.render_prometheus() }
            }),
        )
        .route("/healthz", get(|| async { "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let metrics = SweeperMetrics::new();
        assert_eq!(metrics.jobs_deleted("default"), 0);
        assert_eq!(metrics.pods_delete_failed("default"), 0);
    }

    #[test]
    fn test_counters_increment_per_namespace() {
        let metrics = SweeperMetrics::new();
        metrics.record_job_deleted("default");
        metrics.record_job_deleted("default");
        metrics.record_job_deleted("batch");
        metrics.record_pod_delete_failed("batch");

        assert_eq!(metrics.jobs_deleted("default"), 2);
        assert_eq!(metrics.jobs_deleted("batch"), 1);
        assert_eq!(metrics.pods_delete_failed("batch"), 1);
        assert_eq!(metrics.pods_deleted("batch"), 0);
    }

    #[test]
    fn test_prometheus_rendering() {
        let metrics = SweeperMetrics::new();
        metrics.record_pod_deleted("default");
        metrics.record_pod_deleted("default");
        metrics.record_job_deleted("kube-system");

        let text = metrics.render_prometheus();
        assert!(text.contains("pods_deleted_total{namespace=\"default\"} 2"));
        assert!(text.contains("jobs_deleted_total{namespace=\"kube-system\"} 1"));
        assert!(text.contains("# TYPE jobs_deleted_total counter"));
    }

    #[test]
    fn test_clones_share_state() {
        let metrics = SweeperMetrics::new();
        let clone = metrics.clone();
        clone.record_job_deleted("default");
        assert_eq!(metrics.jobs_deleted("default"), 1);
    }
}
