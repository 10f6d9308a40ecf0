use serde::{Deserialize, Serialize};
use std::fmt;

/// Endpoint of a single store instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub host: String,
    pub port: u16,
}

impl Address {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Stable lookup key, `host:port`
    pub fn id(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Replication role reported by an instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Not polled yet
    #[default]
    Unknown,

    /// Accepts writes, replicates to slaves
    Master,

    /// Read-only replica of a master
    Slave,

    /// Replica-set controller, not a data node
    Sentinel,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Unknown, Role::Master, Role::Slave, Role::Sentinel];

    /// Dense index, used for per-role tables
    pub fn index(self) -> usize {
        match self {
            Role::Unknown => 0,
            Role::Master => 1,
            Role::Slave => 2,
            Role::Sentinel => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Unknown => "unknown",
            Role::Master => "master",
            Role::Slave => "slave",
            Role::Sentinel => "sentinel",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
