//! Interpretation of `ROLE` replies.
//!
//! ```text
//! master:   ["master", <offset>, [[<host>, <port>, <offset>], ...]]
//! slave:    ["slave", <master host>, <master port>, <link status>, <offset>]
//! sentinel: ["sentinel", [<master name>, ...]]
//! ```

use kvtopo_common::{Address, Role, Value};
use serde::Serialize;
use tracing::warn;

/// A replica reported by a master
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlaveInfo {
    pub host: String,
    pub port: u16,
    pub offset: Option<i64>,
}

impl SlaveInfo {
    pub fn address(&self) -> Address {
        Address::new(self.host.clone(), self.port)
    }
}

/// The master a replica follows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MasterInfo {
    pub host: String,
    pub port: u16,
}

impl MasterInfo {
    pub fn address(&self) -> Address {
        Address::new(self.host.clone(), self.port)
    }
}

/// Structured form of a `ROLE` reply. Only the fields belonging to `role`
/// are ever populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleDescriptor {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slaves: Option<Vec<SlaveInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master: Option<MasterInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub masters: Option<Vec<String>>,
}

impl RoleDescriptor {
    fn empty(role: Role) -> Self {
        Self {
            role,
            offset: None,
            slaves: None,
            master: None,
            status: None,
            ready: None,
            masters: None,
        }
    }

    /// Descriptor for an instance that does not support `ROLE`: a single
    /// standalone server, which is by definition a master without replicas.
    pub fn standalone() -> Self {
        Self::empty(Role::Master)
    }

    /// Replicas to discover from this node. Only masters report any.
    pub fn peers(&self) -> Vec<Address> {
        self.slaves
            .iter()
            .flatten()
            .map(SlaveInfo::address)
            .collect()
    }
}

/// Parse a raw `ROLE` reply. Returns `None` when the leading tag is not a
/// role this engine understands.
pub fn parse_role(reply: &Value) -> Option<RoleDescriptor> {
    let tag = reply.get(0)?.as_text()?;

    match tag.as_str() {
        "master" => Some(parse_master(reply)),
        "slave" | "replica" => Some(parse_slave(reply)),
        "sentinel" => Some(parse_sentinel(reply)),
        _ => None,
    }
}

fn parse_master(reply: &Value) -> RoleDescriptor {
    let mut descriptor = RoleDescriptor::empty(Role::Master);
    descriptor.offset = reply.get(1).and_then(Value::as_int);

    let entries = reply.get(2).and_then(Value::as_array).unwrap_or(&[]);
    descriptor.slaves = Some(entries.iter().filter_map(parse_slave_entry).collect());

    descriptor
}

fn parse_slave_entry(entry: &Value) -> Option<SlaveInfo> {
    let host = entry.get(0).and_then(Value::as_text);
    let port = entry.get(1).and_then(as_port);

    match (host, port) {
        (Some(host), Some(port)) => Some(SlaveInfo {
            host,
            port,
            offset: entry.get(2).and_then(Value::as_int),
        }),
        _ => {
            warn!("Skipping unreadable slave entry in ROLE reply: {:?}", entry);
            None
        }
    }
}

fn parse_slave(reply: &Value) -> RoleDescriptor {
    let mut descriptor = RoleDescriptor::empty(Role::Slave);

    let host = reply.get(1).and_then(Value::as_text);
    let port = reply.get(2).and_then(as_port);
    descriptor.master = match (host, port) {
        (Some(host), Some(port)) => Some(MasterInfo { host, port }),
        _ => {
            warn!("ROLE reply from slave carries no usable master address: {:?}", reply);
            None
        }
    };

    descriptor.status = reply.get(3).and_then(Value::as_text);
    descriptor.offset = reply.get(4).and_then(Value::as_int);
    descriptor.ready = Some(descriptor.status.as_deref() == Some("connected"));

    descriptor
}

fn parse_sentinel(reply: &Value) -> RoleDescriptor {
    let mut descriptor = RoleDescriptor::empty(Role::Sentinel);
    descriptor.masters = Some(
        reply
            .get(1)
            .and_then(Value::as_array)
            .unwrap_or(&[])
            .iter()
            .filter_map(Value::as_text)
            .collect(),
    );
    descriptor
}

fn as_port(value: &Value) -> Option<u16> {
    value.as_int().and_then(|p| u16::try_from(p).ok())
}
