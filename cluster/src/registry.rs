use crate::record::ConnectionRecord;
use crate::selector::{ConnectionView, RoleCursors};
use crate::types::TopologyStats;
use kvtopo_common::{Address, Role};
use std::sync::Arc;

/// All known connections in insertion order, at most one per id
#[derive(Debug, Default)]
pub struct Registry {
    records: Vec<Arc<ConnectionRecord>>,
    cursors: RoleCursors,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Arc<ConnectionRecord>] {
        &self.records
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.iter().any(|r| r.id == id)
    }

    pub fn contains_address(&self, address: &Address) -> bool {
        self.records.iter().any(|r| &r.address == address)
    }

    pub fn get(&self, id: &str) -> Option<Arc<ConnectionRecord>> {
        self.records.iter().find(|r| r.id == id).cloned()
    }

    /// Append `record` unless one with the same id is already present
    pub fn insert(&mut self, record: Arc<ConnectionRecord>) -> bool {
        if self.contains(&record.id) {
            return false;
        }
        self.records.push(record);
        true
    }

    /// Remove every record for `address`
    pub fn remove_by_address(&mut self, address: &Address) -> Vec<Arc<ConnectionRecord>> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.records)
            .into_iter()
            .partition(|r| &r.address == address);
        self.records = kept;
        removed
    }

    /// Empty the registry, handing back what it held
    pub fn drain(&mut self) -> Vec<Arc<ConnectionRecord>> {
        std::mem::take(&mut self.records)
    }

    /// Next ready connection of `role`.
    ///
    /// With an `id`, only that record qualifies and the rotation is left
    /// untouched. Without one, ready candidates are handed out round-robin in
    /// insertion order.
    pub fn find_next(&mut self, role: Role, id: Option<&str>) -> Option<ConnectionView> {
        let candidates: Vec<&Arc<ConnectionRecord>> = self
            .records
            .iter()
            .filter(|r| r.is_ready() && r.role() == role)
            .filter(|r| id.map_or(true, |id| r.id == id))
            .collect();

        if candidates.is_empty() {
            return None;
        }

        let pick = match id {
            Some(_) => candidates[0],
            None => candidates[self.cursors.next(role, candidates.len())],
        };

        Some(ConnectionView::new(pick.clone()))
    }

    /// First record of `role` (and `id`, when given), ready or not
    pub fn lookup(&self, role: Role, id: Option<&str>) -> Option<Arc<ConnectionRecord>> {
        self.records
            .iter()
            .filter(|r| r.role() == role)
            .find(|r| id.map_or(true, |id| r.id == id))
            .cloned()
    }

    pub fn stats(&self) -> TopologyStats {
        let mut stats = TopologyStats {
            total: self.records.len(),
            ..Default::default()
        };

        for record in &self.records {
            let state = record.state();
            if state.ready {
                stats.ready += 1;
            }
            match state.role {
                Role::Master => stats.masters += 1,
                Role::Slave => stats.slaves += 1,
                Role::Sentinel => stats.sentinels += 1,
                Role::Unknown => stats.unknown += 1,
            }
        }

        stats
    }
}
