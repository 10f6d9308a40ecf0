use crate::role::RoleDescriptor;
use chrono::{DateTime, Utc};
use kvtopo_client::{ConnectionOptions, WireHandle};
use kvtopo_common::{Address, Role, WireError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Identity of one record instance. A record re-created for the same
/// address after a reconnect gets a new key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey(pub Uuid);

impl RecordKey {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mutable part of a record, replaced as a whole by each successful poll
#[derive(Debug, Clone, Default)]
pub struct RecordState {
    pub role: Role,
    pub ready: bool,
    pub descriptor: Option<RoleDescriptor>,
    pub polled_at: Option<DateTime<Utc>>,
}

/// A known instance: its address, the wire handle the record owns, and what
/// the last role query said about it.
pub struct ConnectionRecord {
    pub key: RecordKey,
    pub address: Address,
    pub id: String,
    pub options: ConnectionOptions,
    handle: Arc<dyn WireHandle>,
    state: RwLock<RecordState>,
    killed: AtomicBool,
    polling: AtomicBool,
    cancel: CancellationToken,
}

impl ConnectionRecord {
    pub fn new(address: Address, options: ConnectionOptions, handle: Arc<dyn WireHandle>) -> Self {
        Self {
            key: RecordKey::new(),
            id: address.id(),
            address,
            options,
            handle,
            state: RwLock::new(RecordState::default()),
            killed: AtomicBool::new(false),
            polling: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    pub fn handle(&self) -> &Arc<dyn WireHandle> {
        &self.handle
    }

    pub fn role(&self) -> Role {
        self.state.read().role
    }

    pub fn is_ready(&self) -> bool {
        self.state.read().ready
    }

    pub fn set_ready(&self, ready: bool) {
        self.state.write().ready = ready;
    }

    /// Snapshot of role, readiness and metadata
    pub fn state(&self) -> RecordState {
        self.state.read().clone()
    }

    /// Replace everything learned from the previous poll with `descriptor`.
    /// Returns the role held before.
    pub fn apply(&self, descriptor: RoleDescriptor) -> Role {
        let mut state = self.state.write();
        let previous = state.role;

        state.role = descriptor.role;
        state.ready = descriptor.ready.unwrap_or(true);
        state.descriptor = Some(descriptor);
        state.polled_at = Some(Utc::now());

        previous
    }

    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    /// Mark the record torn down. Only the first caller gets `true`.
    pub fn kill(&self) -> bool {
        let first = !self.killed.swap(true, Ordering::SeqCst);
        if first {
            self.state.write().ready = false;
            self.cancel.cancel();
        }
        first
    }

    /// Resolves once the record has been torn down
    pub async fn killed(&self) {
        self.cancel.cancelled().await
    }

    /// Claim the right to run this record's poll loop. Only the first caller
    /// gets `true`.
    pub fn begin_polling(&self) -> bool {
        !self.polling.swap(true, Ordering::SeqCst)
    }

    pub fn close(&self) -> Result<(), WireError> {
        self.handle.close()
    }
}

impl fmt::Debug for ConnectionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("ConnectionRecord")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("role", &state.role)
            .field("ready", &state.ready)
            .field("killed", &self.is_killed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvtopo_client::mock::MockConnector;
    use kvtopo_client::Connector;

    fn record(host: &str, port: u16) -> ConnectionRecord {
        let address = Address::new(host, port);
        let options = ConnectionOptions::default();
        let conn = MockConnector::new().create(&address, &options);
        ConnectionRecord::new(address, options, conn.handle)
    }

    #[test]
    fn test_record_creation() {
        let rec = record("host", 6379);

        assert_eq!(rec.id, "host:6379");
        assert_eq!(rec.role(), Role::Unknown);
        assert!(!rec.is_ready());
        assert!(!rec.is_killed());
        assert!(rec.state().descriptor.is_none());
    }

    #[test]
    fn test_fresh_records_have_distinct_keys() {
        assert_ne!(record("host", 6379).key, record("host", 6379).key);
    }

    #[test]
    fn test_apply_replaces_metadata_wholesale() {
        let rec = record("host", 6379);

        let mut slave = RoleDescriptor::standalone();
        slave.role = Role::Slave;
        slave.status = Some("connected".to_string());
        slave.offset = Some(42);
        slave.ready = Some(true);
        assert_eq!(rec.apply(slave), Role::Unknown);
        assert_eq!(rec.role(), Role::Slave);
        assert!(rec.is_ready());

        // Promoted: nothing of the slave view may linger
        assert_eq!(rec.apply(RoleDescriptor::standalone()), Role::Slave);
        let state = rec.state();
        assert_eq!(state.role, Role::Master);
        assert!(state.ready);
        let descriptor = state.descriptor.unwrap();
        assert!(descriptor.status.is_none());
        assert!(descriptor.offset.is_none());
        assert!(state.polled_at.is_some());
    }

    #[test]
    fn test_apply_honours_descriptor_readiness() {
        let rec = record("host", 6379);
        let mut syncing = RoleDescriptor::standalone();
        syncing.role = Role::Slave;
        syncing.ready = Some(false);

        rec.apply(syncing);
        assert_eq!(rec.role(), Role::Slave);
        assert!(!rec.is_ready());
    }

    #[test]
    fn test_kill_is_one_shot() {
        let rec = record("host", 6379);
        rec.set_ready(true);

        assert!(rec.kill());
        assert!(!rec.kill());
        assert!(rec.is_killed());
        assert!(!rec.is_ready());
    }

    #[test]
    fn test_single_poll_loop_claim() {
        let rec = record("host", 6379);
        assert!(rec.begin_polling());
        assert!(!rec.begin_polling());
    }
}
