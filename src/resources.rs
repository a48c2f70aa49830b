//! Snapshot types for the watched cluster objects.
//!
//! These are the controller's read-only view of Jobs and Pods as mirrored by
//! the external store. The union is tagged once at the store boundary; nothing
//! downstream re-inspects dynamic payloads.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Back-pointer from a resource to its controlling resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
    pub kind: String,
    pub name: String,
}

/// Pod lifecycle phase as reported by the orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobConditionType {
    Complete,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobCondition {
    pub condition_type: JobConditionType,
    pub status: bool,
    pub last_transition_time: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodConditionType {
    Ready,
    PodScheduled,
    Initialized,
    ContainersReady,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PodCondition {
    pub condition_type: PodConditionType,
    pub status: bool,
    pub last_transition_time: DateTime<Utc>,
}

/// Point-in-time view of a Job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub namespace: String,
    pub name: String,
    pub active: i32,
    pub succeeded: i32,
    pub failed: i32,
    pub completion_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub conditions: Vec<JobCondition>,
    #[serde(default)]
    pub owner_references: Vec<OwnerRef>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Non-empty while a delete is already in flight on the cluster side.
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

impl JobSnapshot {
    /// End-of-execution timestamp: `completion_time` when populated, otherwise
    /// the transition time of a true `Failed` condition. Deadline-exceeded
    /// jobs report failure only via the condition, never via completion time.
    pub fn finish_time(&self) -> Option<DateTime<Utc>> {
        if let Some(t) = self.completion_time {
            return Some(t);
        }

        self.conditions
            .iter()
            .find(|c| c.condition_type == JobConditionType::Failed && c.status)
            .map(|c| c.last_transition_time)
    }

    /// A job counts as failed when the failed-pod counter is non-zero or a
    /// true `Failed` condition exists (the counter stays zero for
    /// deadline-exceeded jobs).
    pub fn is_failed(&self) -> bool {
        if self.failed > 0 {
            return true;
        }

        self.conditions
            .iter()
            .any(|c| c.condition_type == JobConditionType::Failed && c.status)
    }
}

/// Point-in-time view of a Pod.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PodSnapshot {
    pub namespace: String,
    pub name: String,
    pub phase: PodPhase,
    pub reason: Option<String>,
    #[serde(default)]
    pub conditions: Vec<PodCondition>,
    #[serde(default)]
    pub owner_references: Vec<OwnerRef>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

impl PodSnapshot {
    /// End-of-execution timestamp: when the `Ready` condition went false.
    pub fn finish_time(&self) -> Option<DateTime<Utc>> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == PodConditionType::Ready && !c.status)
            .map(|c| c.last_transition_time)
    }

    /// Start of the unscheduled-pending window: when `PodScheduled` went
    /// false. Absent for pods that were scheduled normally.
    pub fn pending_since(&self) -> Option<DateTime<Utc>> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == PodConditionType::PodScheduled && !c.status)
            .map(|c| c.last_transition_time)
    }
}

/// Tagged union of the two managed kinds, decided once at the store boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WorkItem {
    Job(JobSnapshot),
    Pod(PodSnapshot),
}

impl WorkItem {
    pub fn namespace(&self) -> &str {
        match self {
            WorkItem::Job(j) => &j.namespace,
            WorkItem::Pod(p) => &p.namespace,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            WorkItem::Job(j) => &j.name,
            WorkItem::Pod(p) => &p.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WorkItem::Job(_) => "Job",
            WorkItem::Pod(_) => "Pod",
        }
    }

    pub fn deletion_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            WorkItem::Job(j) => j.deletion_timestamp,
            WorkItem::Pod(p) => p.deletion_timestamp,
        }
    }
}
