//! Topology discovery and connection selection for master/replica
//! deployments.
//!
//! Starting from one seed address, the [`TopologyManager`] polls every known
//! instance with `ROLE`, adds the replicas and masters it hears about, and
//! hands out ready connections by role in round-robin order. Failed
//! connections are dropped and re-created after a fixed interval.

pub mod discovery;
mod failover;
mod health;
pub mod manager;
pub mod record;
pub mod registry;
pub mod role;
pub mod selector;
pub mod types;

pub use manager::TopologyManager;
pub use record::{ConnectionRecord, RecordKey, RecordState};
pub use registry::Registry;
pub use role::{parse_role, MasterInfo, RoleDescriptor, SlaveInfo};
pub use selector::{ConnectionView, RoleCursors};
pub use types::*;

pub use kvtopo_client::{Connection, ConnectionOptions, Connector};
pub use kvtopo_common::{Address, Result, Role, TopologyError};

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Topology manager configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Seed host
    pub host: String,

    /// Seed port
    pub port: u16,

    /// Options for every connection opened, including checkouts
    pub options: ConnectionOptions,

    /// Poll cadence and reconnect delay (milliseconds)
    pub check_interval_ms: u64,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            options: ConnectionOptions::default(),
            check_interval_ms: 1000,
        }
    }
}

impl TopologyConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn seed(&self) -> Address {
        Address::new(self.host.clone(), self.port)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(TopologyError::Config { message });

        if self.host.trim().is_empty() {
            return invalid("host must not be empty".to_string());
        }
        if self.port == 0 {
            return invalid("port must be greater than zero".to_string());
        }
        if self.check_interval_ms == 0 {
            return invalid("check_interval_ms must be greater than zero".to_string());
        }
        self.options.validate().or_else(invalid)
    }

    /// Load from a file (format taken from its extension), overridden by
    /// `KVTOPO_`-prefixed environment variables, e.g. `KVTOPO_PORT` or
    /// `KVTOPO_OPTIONS__PASSWORD`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("KVTOPO")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| TopologyError::Config {
                message: e.to_string(),
            })?;

        let config: TopologyConfig = settings
            .try_deserialize()
            .map_err(|e| TopologyError::Config {
                message: e.to_string(),
            })?;
        config.validate()?;

        Ok(config)
    }
}
