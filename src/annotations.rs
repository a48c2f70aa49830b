//! Per-object annotation overrides.
//!
//! Objects can opt out of cleanup entirely or override individual retention
//! durations. Overrides are merged on top of the global configuration right
//! before classification; the merged value never outlives one decision.
//! Malformed values fail open to the configured default — an unparseable
//! annotation must never break reconciliation.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::RetentionThresholds;

pub const ANNOTATION_PREFIX: &str = "kube-sweeper.io/";

pub const ANNOTATION_DISABLED: &str = "kube-sweeper.io/disabled";
pub const ANNOTATION_DELETE_SUCCESSFUL_AFTER: &str = "kube-sweeper.io/delete-successful-after";
pub const ANNOTATION_DELETE_FAILED_AFTER: &str = "kube-sweeper.io/delete-failed-after";
pub const ANNOTATION_DELETE_ORPHANED_AFTER: &str = "kube-sweeper.io/delete-orphaned-after";
pub const ANNOTATION_DELETE_EVICTED_AFTER: &str = "kube-sweeper.io/delete-evicted-after";
pub const ANNOTATION_DELETE_PENDING_AFTER: &str = "kube-sweeper.io/delete-pending-after";

/// True when the object carries a disable annotation that parses as boolean
/// true. Parsing is case-sensitive (`"true"`, not `"True"`); anything that
/// fails to parse counts as not disabled.
pub fn cleanup_disabled(annotations: &BTreeMap<String, String>) -> bool {
    annotations
        .get(ANNOTATION_DISABLED)
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false)
}

/// Replace `slot` with the annotated duration when present and parseable;
/// keep the prior value otherwise.
fn override_duration(slot: &mut Duration, key: &str, annotations: &BTreeMap<String, String>) {
    if let Some(val) = annotations.get(key)
        && let Ok(d) = humantime::parse_duration(val)
    {
        *slot = d;
    }
}

/// Thresholds for one Job after annotation overrides.
pub fn effective_job_thresholds(
    base: &RetentionThresholds,
    annotations: &BTreeMap<String, String>,
) -> RetentionThresholds {
    let mut thresholds = base.clone();
    override_duration(
        &mut thresholds.successful,
        ANNOTATION_DELETE_SUCCESSFUL_AFTER,
        annotations,
    );
    override_duration(
        &mut thresholds.failed,
        ANNOTATION_DELETE_FAILED_AFTER,
        annotations,
    );
    thresholds
}

/// Thresholds for one Pod after annotation overrides.
pub fn effective_pod_thresholds(
    base: &RetentionThresholds,
    annotations: &BTreeMap<String, String>,
) -> RetentionThresholds {
    let mut thresholds = effective_job_thresholds(base, annotations);
    override_duration(
        &mut thresholds.orphaned,
        ANNOTATION_DELETE_ORPHANED_AFTER,
        annotations,
    );
    override_duration(
        &mut thresholds.evicted,
        ANNOTATION_DELETE_EVICTED_AFTER,
        annotations,
    );
    override_duration(
        &mut thresholds.pending,
        ANNOTATION_DELETE_PENDING_AFTER,
        annotations,
    );
    thresholds
}
