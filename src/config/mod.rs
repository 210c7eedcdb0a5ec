//! # Provisioner Configuration
//!
//! Layered configuration: built-in defaults, then `config/provisioner.toml`,
//! then `config/<environment>.toml`, then `PROVISIONER__*` environment
//! variables (`__` separates nesting levels, e.g.
//! `PROVISIONER__TASK__DEFAULT_LIFETIME_SECS=120`).
//!
//! ```rust,no_run
//! use provisioner_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let lifetime = manager.config().task.default_lifetime();
//! # Ok(())
//! # }
//! ```

pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{
    DEFAULT_TASK_LIFETIME_SECS, DEFAULT_UPDATE_QUEUE_CAPACITY, VERSION_RETENTION_LIMIT,
};
use crate::error::{ProvisionerError, Result};

pub use loader::ConfigManager;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionerConfig {
    pub task: TaskConfig,
    pub resource: ResourceConfig,
    pub provisioning: ProvisioningDefaults,
    pub logging: LoggingConfig,
}

impl ProvisionerConfig {
    /// Reject values that would leave the host unable to run tasks
    pub fn validate(&self) -> Result<()> {
        if self.task.default_lifetime_secs == 0 {
            return Err(ProvisionerError::Configuration(
                "task.default_lifetime_secs must be greater than 0".to_string(),
            ));
        }
        if self.task.update_queue_capacity == 0 {
            return Err(ProvisionerError::Configuration(
                "task.update_queue_capacity must be greater than 0".to_string(),
            ));
        }
        if self.resource.version_retention_limit == 0 {
            return Err(ProvisionerError::Configuration(
                "resource.version_retention_limit must be greater than 0".to_string(),
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ProvisionerError::Configuration(
                "logging.level must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Lifetime of a task created without `taskLifetime`
    pub default_lifetime_secs: u64,
    /// Bound on self-updates waiting for the pipeline
    pub update_queue_capacity: usize,
}

impl TaskConfig {
    pub fn default_lifetime(&self) -> Duration {
        Duration::from_secs(self.default_lifetime_secs)
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            default_lifetime_secs: DEFAULT_TASK_LIFETIME_SECS,
            update_queue_capacity: DEFAULT_UPDATE_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    pub version_retention_limit: usize,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            version_retention_limit: VERSION_RETENTION_LIMIT,
        }
    }
}

/// Credentials handed to the provisioning task a new resource spawns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningDefaults {
    pub user: Option<String>,
    pub password: Option<String>,
    pub os_domain: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG` when set
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
