//! Ownership resolution for Jobs and Pods.
//!
//! Two strategies exist because old cluster versions encoded the creating
//! controller in a JSON annotation instead of owner references. The strategy
//! is probed once at startup and fixed for the process lifetime; no
//! classification code re-checks the server version per object.

use log::{debug, warn};
use serde::Deserialize;

use crate::resources::{JobSnapshot, PodSnapshot};

/// Annotation used by pre-owner-reference clusters to record the creator.
pub const CREATED_BY_ANNOTATION: &str = "kubernetes.io/created-by";

/// Server version as reported by the cluster, kept in its raw string form
/// (minors can look like `"8+"` on managed offerings).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerVersion {
    pub major: String,
    pub minor: String,
}

impl ServerVersion {
    pub fn new(major: impl Into<String>, minor: impl Into<String>) -> Self {
        Self {
            major: major.into(),
            minor: minor.into(),
        }
    }

    /// Owner references landed in 1.8; anything older runs the legacy
    /// annotation-based resolver.
    pub fn is_legacy(&self) -> bool {
        let major = self.major.parse::<u32>().unwrap_or(0);
        let minor = match leading_digits(&self.minor) {
            Some(m) => m,
            None => {
                warn!("failed to parse minor version {:?}, assuming 0", self.minor);
                0
            }
        };
        major < 2 && minor < 8
    }
}

fn leading_digits(s: &str) -> Option<u32> {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// How a Pod relates to a controlling Job, as far as cleanup is concerned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PodOwnership {
    /// No owner references at all.
    Orphaned,
    /// Exactly one controlling Job (or Workflow), by name.
    Job(String),
    /// Some other controller; cleanup leaves these alone.
    Other,
}

/// Wire shape of the legacy created-by annotation (a serialized reference).
#[derive(Debug, Deserialize)]
struct CreatedBy {
    #[serde(alias = "Reference")]
    reference: CreatedByReference,
}

#[derive(Debug, Deserialize)]
struct CreatedByReference {
    #[serde(alias = "Kind")]
    kind: String,
    #[serde(alias = "Name")]
    name: String,
}

/// Ownership strategy, fixed at startup from the probed server version.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OwnershipStrategy {
    /// Inspect owner references.
    Modern,
    /// Parse the deprecated created-by annotation; only resolves Pod→Job and
    /// never reports cron ownership.
    Legacy,
}

impl OwnershipStrategy {
    pub fn from_version(version: &ServerVersion) -> Self {
        if version.is_legacy() {
            OwnershipStrategy::Legacy
        } else {
            OwnershipStrategy::Modern
        }
    }

    /// A job is cron-owned iff it has exactly one owner of kind CronJob.
    /// The legacy annotation never recorded recurring schedulers, so the
    /// legacy strategy reports no job as cron-owned.
    pub fn job_owned_by_cronjob(&self, job: &JobSnapshot) -> bool {
        match self {
            OwnershipStrategy::Modern => {
                job.owner_references.len() == 1 && job.owner_references[0].kind == "CronJob"
            }
            OwnershipStrategy::Legacy => false,
        }
    }

    pub fn pod_ownership(&self, pod: &PodSnapshot) -> PodOwnership {
        match self {
            OwnershipStrategy::Modern => {
                if pod.owner_references.is_empty() {
                    return PodOwnership::Orphaned;
                }
                if pod.owner_references.len() == 1 {
                    let owner = &pod.owner_references[0];
                    if owner.kind == "Job" || owner.kind == "Workflow" {
                        return PodOwnership::Job(owner.name.clone());
                    }
                }
                PodOwnership::Other
            }
            OwnershipStrategy::Legacy => {
                let Some(raw) = pod.annotations.get(CREATED_BY_ANNOTATION) else {
                    return PodOwnership::Other;
                };
                match serde_json::from_str::<CreatedBy>(raw) {
                    Ok(created_by) if created_by.reference.kind == "Job" => {
                        PodOwnership::Job(created_by.reference.name)
                    }
                    Ok(_) => PodOwnership::Other,
                    Err(err) => {
                        // Recovered locally: an unreadable annotation means
                        // the pod has no resolvable owner.
                        debug!(
                            "failed to parse created-by annotation for pod {}/{}: {err}",
                            pod.namespace, pod.name
                        );
                        PodOwnership::Other
                    }
                }
            }
        }
    }
}
