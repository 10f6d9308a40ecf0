use serde::{Deserialize, Serialize};

/// Counts over the registry, for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyStats {
    pub total: usize,
    pub ready: usize,
    pub masters: usize,
    pub slaves: usize,
    pub sentinels: usize,
    /// Connected but not polled successfully yet
    pub unknown: usize,
}
