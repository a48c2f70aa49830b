//! Disposition classifier.
//!
//! Pure decision functions mapping an object snapshot, the effective
//! retention thresholds and the mode flags to a delete/keep verdict. No I/O,
//! no clock access: `now` is an argument. The reconciliation loop filters
//! delete-in-flight objects before these functions ever see them.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::annotations;
use crate::config::RetentionThresholds;
use crate::ownership::{OwnershipStrategy, PodOwnership};
use crate::resources::{JobSnapshot, PodPhase, PodSnapshot};

/// Non-negative wall time since `t`; timestamps in the future count as zero.
fn elapsed_since(now: DateTime<Utc>, t: DateTime<Utc>) -> Duration {
    (now - t).to_std().unwrap_or(Duration::ZERO)
}

/// Decide whether a finished Job should be deleted.
///
/// Threshold comparison is deliberately asymmetric: successful jobs use
/// strict `>`, failed jobs use `>=`. At exact threshold equality a failed
/// job is deleted and a successful one is kept; both behaviors are part of
/// the observable contract.
///
/// The active-pod count does not gate deletion: a job that already reports
/// `succeeded`/`failed` past its threshold is deleted even while `active > 0`.
pub fn should_delete_job(
    job: &JobSnapshot,
    base: &RetentionThresholds,
    ignore_cron: bool,
    respect_annotations: bool,
    strategy: OwnershipStrategy,
    now: DateTime<Utc>,
) -> bool {
    if ignore_cron && strategy.job_owned_by_cronjob(job) {
        return false;
    }

    let thresholds = if respect_annotations {
        if annotations::cleanup_disabled(&job.annotations) {
            return false;
        }
        annotations::effective_job_thresholds(base, &job.annotations)
    } else {
        base.clone()
    };

    let Some(finish_time) = job.finish_time() else {
        // still running, or no terminal signal yet
        return false;
    };
    let since_finish = elapsed_since(now, finish_time);

    if job.succeeded > 0 && !thresholds.successful.is_zero() && since_finish > thresholds.successful
    {
        return true;
    }
    if job.is_failed() && !thresholds.failed.is_zero() && since_finish >= thresholds.failed {
        return true;
    }
    false
}

/// Decide whether a Pod should be deleted.
///
/// Order matters: the evicted check carries no elapsed-time gate because
/// eviction has no reliable timestamp; the pending check runs independently
/// of the finish-time/ownership block, so a pod can be pending-expired even
/// without a Ready-false condition.
pub fn should_delete_pod(
    pod: &PodSnapshot,
    ownership: &PodOwnership,
    base: &RetentionThresholds,
    respect_annotations: bool,
    now: DateTime<Utc>,
) -> bool {
    let thresholds = if respect_annotations {
        if annotations::cleanup_disabled(&pod.annotations) {
            return false;
        }
        annotations::effective_pod_thresholds(base, &pod.annotations)
    } else {
        base.clone()
    };

    if pod.phase == PodPhase::Failed
        && pod.reason.as_deref() == Some("Evicted")
        && !thresholds.evicted.is_zero()
    {
        return true;
    }

    if let Some(finish_time) = pod.finish_time() {
        let age = elapsed_since(now, finish_time);
        match ownership {
            PodOwnership::Orphaned => {
                if !thresholds.orphaned.is_zero() && age >= thresholds.orphaned {
                    return true;
                }
            }
            PodOwnership::Job(_) => match pod.phase {
                PodPhase::Succeeded => {
                    if !thresholds.successful.is_zero() && age >= thresholds.successful {
                        return true;
                    }
                }
                PodPhase::Failed => {
                    if !thresholds.failed.is_zero() && age >= thresholds.failed {
                        return true;
                    }
                }
                _ => {}
            },
            PodOwnership::Other => {}
        }
    }

    if pod.phase == PodPhase::Pending
        && !thresholds.pending.is_zero()
        && let Some(pending_since) = pod.pending_since()
        && elapsed_since(now, pending_since) >= thresholds.pending
    {
        return true;
    }

    false
}
