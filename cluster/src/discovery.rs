//! Topology expansion.
//!
//! Discovery follows master to slave edges. A poll of a master queues the
//! slaves it reports on a [`Worklist`], and the manager drains the queue
//! against the registry, opening a record for every address the registry
//! does not hold yet. Those records are polled in turn, so the registry grows
//! breadth-first from the seed. Termination follows from the registry holding
//! at most one record per address.
//!
//! The one upward edge is a seed that turns out to be a replica: the master it
//! follows is queued once so discovery can continue from there. Other
//! replicas' masters are never followed, since replicas usually name their
//! master differently from how it was seeded.

use crate::role::RoleDescriptor;
use kvtopo_common::{Address, Role};
use std::collections::{HashSet, VecDeque};

/// Addresses waiting to be admitted to the registry, in discovery order
#[derive(Debug, Default)]
pub struct Worklist {
    queue: VecDeque<Address>,
    seen: HashSet<Address>,
}

impl Worklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// The replicas `descriptor` reports
    pub fn from_descriptor(descriptor: &RoleDescriptor) -> Self {
        let mut worklist = Self::new();
        worklist.extend(descriptor.peers());
        worklist
    }

    /// Queue `address` unless it was queued before. Returns whether it was.
    pub fn push(&mut self, address: Address) -> bool {
        if !self.seen.insert(address.clone()) {
            return false;
        }
        self.queue.push_back(address);
        true
    }

    pub fn extend(&mut self, addresses: impl IntoIterator<Item = Address>) {
        for address in addresses {
            self.push(address);
        }
    }

    pub fn pop(&mut self) -> Option<Address> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl From<Address> for Worklist {
    fn from(address: Address) -> Self {
        let mut worklist = Self::new();
        worklist.push(address);
        worklist
    }
}

/// The master to follow upward when `polled` is the seed and reports itself
/// as a replica.
pub fn seed_master(
    seed: &Address,
    polled: &Address,
    descriptor: &RoleDescriptor,
) -> Option<Address> {
    if polled != seed || descriptor.role != Role::Slave {
        return None;
    }
    descriptor.master.as_ref().map(|master| master.address())
}
