use crate::record::{ConnectionRecord, RecordKey, RecordState};
use crate::role::RoleDescriptor;
use chrono::{DateTime, Utc};
use kvtopo_client::WireHandle;
use kvtopo_common::{Address, Role, Value, WireError};
use std::fmt;
use std::sync::Arc;

/// Round-robin position per role
#[derive(Debug, Clone, Default)]
pub struct RoleCursors {
    offsets: [usize; Role::ALL.len()],
}

impl RoleCursors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the candidate to hand out next among `len` candidates of
    /// `role`, advancing the cursor. `len` must be non-zero.
    pub fn next(&mut self, role: Role, len: usize) -> usize {
        debug_assert!(len > 0);
        let cursor = &mut self.offsets[role.index()];
        if *cursor >= len {
            *cursor = 0;
        }
        let pick = *cursor;
        *cursor = (pick + 1) % len;
        pick
    }
}

/// A selected connection: the record's metadata as of selection time plus
/// the live wire handle.
#[derive(Clone)]
pub struct ConnectionView {
    record: Arc<ConnectionRecord>,
    state: RecordState,
}

impl ConnectionView {
    pub fn new(record: Arc<ConnectionRecord>) -> Self {
        let state = record.state();
        Self { record, state }
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn key(&self) -> RecordKey {
        self.record.key
    }

    pub fn address(&self) -> &Address {
        &self.record.address
    }

    pub fn role(&self) -> Role {
        self.state.role
    }

    pub fn is_ready(&self) -> bool {
        self.state.ready
    }

    /// Replication offset from the last poll
    pub fn offset(&self) -> Option<i64> {
        self.descriptor().and_then(|d| d.offset)
    }

    /// Replication link status, slaves only
    pub fn status(&self) -> Option<&str> {
        self.descriptor().and_then(|d| d.status.as_deref())
    }

    pub fn descriptor(&self) -> Option<&RoleDescriptor> {
        self.state.descriptor.as_ref()
    }

    pub fn polled_at(&self) -> Option<DateTime<Utc>> {
        self.state.polled_at
    }

    pub fn handle(&self) -> &Arc<dyn WireHandle> {
        self.record.handle()
    }

    pub fn record(&self) -> &Arc<ConnectionRecord> {
        &self.record
    }

    /// Send a command over this connection's handle
    pub async fn send_command(&self, name: &str, args: &[String]) -> Result<Value, WireError> {
        self.record.handle().send_command(name, args).await
    }
}

impl fmt::Debug for ConnectionView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionView")
            .field("id", &self.record.id)
            .field("role", &self.state.role)
            .field("ready", &self.state.ready)
            .field("offset", &self.offset())
            .finish()
    }
}
