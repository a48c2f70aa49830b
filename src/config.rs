//! Sweeper configuration.
//!
//! Configuration is layered figment-style: serde defaults, then an optional
//! TOML file, then `SWEEPER__`-prefixed environment variables. All durations
//! use human-readable syntax (`15m`, `1h`). A zero duration is the "never
//! delete for this reason" sentinel, not "delete immediately".

use std::path::Path;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Retention durations consulted by the disposition classifier.
///
/// Zero means the corresponding cleanup path is disabled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionThresholds {
    #[serde(with = "humantime_serde")]
    pub successful: Duration,
    #[serde(with = "humantime_serde")]
    pub failed: Duration,
    #[serde(with = "humantime_serde")]
    pub pending: Duration,
    #[serde(with = "humantime_serde")]
    pub orphaned: Duration,
    #[serde(with = "humantime_serde")]
    pub evicted: Duration,
}

impl RetentionThresholds {
    /// True when every cleanup path is disabled.
    pub fn is_noop(&self) -> bool {
        self.successful.is_zero()
            && self.failed.is_zero()
            && self.pending.is_zero()
            && self.orphaned.is_zero()
            && self.evicted.is_zero()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SweeperConfig {
    /// Namespace scope; empty means all namespaces.
    #[serde(default)]
    pub namespace: String,

    /// Label selector passed to List/Subscribe; empty means no filtering.
    ///
    /// Env: SWEEPER__LABEL_SELECTOR
    #[serde(default)]
    pub label_selector: String,

    /// Address for the metrics/health HTTP listener.
    ///
    /// Env: SWEEPER__LISTEN_ADDR
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Log decisions and intended deletes without issuing them.
    ///
    /// Env: SWEEPER__DRY_RUN
    #[serde(default)]
    pub dry_run: bool,

    /// Delete jobs/pods in successful state this long after they finished.
    ///
    /// Env: SWEEPER__DELETE_SUCCESSFUL_AFTER
    #[serde(with = "humantime_serde", default = "default_successful_after")]
    pub delete_successful_after: Duration,

    /// Delete jobs/pods in failed state this long after they finished.
    ///
    /// Env: SWEEPER__DELETE_FAILED_AFTER
    #[serde(with = "humantime_serde", default)]
    pub delete_failed_after: Duration,

    /// Delete pods stuck unscheduled in pending state this long.
    ///
    /// Env: SWEEPER__DELETE_PENDING_AFTER
    #[serde(with = "humantime_serde", default)]
    pub delete_pending_after: Duration,

    /// Delete pods without any owner reference this long after they finished.
    ///
    /// Env: SWEEPER__DELETE_ORPHANED_AFTER
    #[serde(with = "humantime_serde", default = "default_orphaned_after")]
    pub delete_orphaned_after: Duration,

    /// Delete evicted pods on discovery (eviction carries no timestamp; any
    /// non-zero value enables the path).
    ///
    /// Env: SWEEPER__DELETE_EVICTED_AFTER
    #[serde(with = "humantime_serde", default = "default_evicted_after")]
    pub delete_evicted_after: Duration,

    /// Never delete jobs owned by a recurring scheduler, nor their pods.
    ///
    /// Env: SWEEPER__IGNORE_OWNED_BY_CRONJOB
    #[serde(default)]
    pub ignore_owned_by_cronjob: bool,

    /// Honor per-object disable/override annotations.
    ///
    /// Env: SWEEPER__RESPECT_ANNOTATIONS
    #[serde(default = "default_respect_annotations")]
    pub respect_annotations: bool,

    /// External store resync interval; the periodic sweep runs at twice this.
    ///
    /// Env: SWEEPER__RESYNC_INTERVAL
    #[serde(with = "humantime_serde", default = "default_resync_interval")]
    pub resync_interval: Duration,
}

fn default_listen_addr() -> String {
    "0.0.0.0:7000".to_string()
}

fn default_successful_after() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_orphaned_after() -> Duration {
    Duration::from_secs(3600)
}

fn default_evicted_after() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_respect_annotations() -> bool {
    true
}

fn default_resync_interval() -> Duration {
    Duration::from_secs(30)
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            label_selector: String::new(),
            listen_addr: default_listen_addr(),
            dry_run: false,
            delete_successful_after: default_successful_after(),
            delete_failed_after: Duration::ZERO,
            delete_pending_after: Duration::ZERO,
            delete_orphaned_after: default_orphaned_after(),
            delete_evicted_after: default_evicted_after(),
            ignore_owned_by_cronjob: false,
            respect_annotations: default_respect_annotations(),
            resync_interval: default_resync_interval(),
        }
    }
}

impl SweeperConfig {
    /// Load configuration: defaults, then the TOML file at `path` (skipped
    /// when absent), then `SWEEPER__`-prefixed environment variables.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: SweeperConfig = Figment::from(Serialized::defaults(SweeperConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("SWEEPER__").split("__"))
            .extract()
            .map_err(Box::new)?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// An all-zero retention set is accepted (the caller warns about it); a
    /// zero resync interval is not, since the sweep ticker derives from it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resync_interval.is_zero() {
            return Err(ConfigError::InvalidResyncInterval(self.resync_interval));
        }
        Ok(())
    }

    /// Global retention thresholds before per-object annotation overrides.
    pub fn thresholds(&self) -> RetentionThresholds {
        RetentionThresholds {
            successful: self.delete_successful_after,
            failed: self.delete_failed_after,
            pending: self.delete_pending_after,
            orphaned: self.delete_orphaned_after,
            evicted: self.delete_evicted_after,
        }
    }

    /// Period of the clock-driven full-store sweep.
    pub fn sweep_interval(&self) -> Duration {
        2 * self.resync_interval
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid resync interval: {0:?} must be positive")]
    InvalidResyncInterval(Duration),

    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_flag_defaults() {
        let config = SweeperConfig::default();
        assert_eq!(config.delete_successful_after, Duration::from_secs(900));
        assert_eq!(config.delete_failed_after, Duration::ZERO);
        assert_eq!(config.delete_pending_after, Duration::ZERO);
        assert_eq!(config.delete_orphaned_after, Duration::from_secs(3600));
        assert_eq!(config.delete_evicted_after, Duration::from_secs(900));
        assert_eq!(config.listen_addr, "0.0.0.0:7000");
        assert!(!config.dry_run);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sweep_interval_is_twice_resync() {
        let config = SweeperConfig {
            resync_interval: Duration::from_secs(30),
            ..Default::default()
        };
        assert_eq!(config.sweep_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_zero_resync_interval_is_rejected() {
        let config = SweeperConfig {
            resync_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidResyncInterval(_))
        ));
    }

    #[test]
    fn test_noop_thresholds_detection() {
        let mut config = SweeperConfig::default();
        assert!(!config.thresholds().is_noop());

        config.delete_successful_after = Duration::ZERO;
        config.delete_orphaned_after = Duration::ZERO;
        config.delete_evicted_after = Duration::ZERO;
        assert!(config.thresholds().is_noop());
    }

    #[test]
    fn test_toml_and_env_layering() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "sweeper.toml",
                r#"
                    namespace = "batch"
                    delete_successful_after = "5m"
                    delete_failed_after = "1h"
                "#,
            )?;
            jail.set_env("SWEEPER__DELETE_FAILED_AFTER", "2h");
            jail.set_env("SWEEPER__DRY_RUN", "true");

            let config = SweeperConfig::load(Path::new("sweeper.toml")).expect("load");
            assert_eq!(config.namespace, "batch");
            assert_eq!(config.delete_successful_after, Duration::from_secs(300));
            // env wins over file
            assert_eq!(config.delete_failed_after, Duration::from_secs(7200));
            assert!(config.dry_run);
            Ok(())
        });
    }

    #[test]
    fn test_zero_sentinel_survives_round_trip() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("sweeper.toml", r#"delete_successful_after = "0s""#)?;
            let config = SweeperConfig::load(Path::new("sweeper.toml")).expect("load");
            assert_eq!(config.delete_successful_after, Duration::ZERO);
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        figment::Jail::expect_with(|_jail| {
            let config = SweeperConfig::load(Path::new("does-not-exist.toml")).expect("load");
            assert_eq!(config.delete_orphaned_after, Duration::from_secs(3600));
            Ok(())
        });
    }
}
