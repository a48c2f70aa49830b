//! Kube Sweeper Library
//!
//! Retention-driven cleanup of finished batch workloads: classifies Jobs and
//! Pods from a locally-mirrored cluster store against configured retention
//! thresholds (with optional per-object annotation overrides) and deletes the
//! ones past their threshold. Deletion counters are exposed in Prometheus
//! text format.

pub mod annotations;
pub mod classify;
pub mod config;
pub mod delete;
pub mod metrics;
pub mod ownership;
pub mod reconcile;
pub mod resources;
pub mod store;

// Re-export commonly used types
pub use config::{ConfigError, RetentionThresholds, SweeperConfig};
pub use delete::DeleteExecutor;
pub use metrics::SweeperMetrics;
pub use ownership::{OwnershipStrategy, PodOwnership, ServerVersion};
pub use reconcile::Sweeper;
pub use resources::{JobSnapshot, PodSnapshot, WorkItem};
pub use store::{ChangeEvent, ClusterStore, DeletePropagation, InMemoryStore, StoreDeleteError};
