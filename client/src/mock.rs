//! In-memory connector for exercising the topology engine without a server.
//!
//! # Features
//!
//! - **Creation log**: every handle created, with its address and options
//! - **Event injection**: emit `connect`/`error`/`end` on any handle
//! - **Scripted replies**: per-address reply for every command; unscripted
//!   commands never complete, like a server that has not answered yet
//! - **Command log**: every command sent through each handle
//!
//! # Example
//!
//! ```rust,ignore
//! let connector = MockConnector::new().auto_connect();
//! connector.set_reply(&seed, Ok(master_reply));
//! let manager = TopologyManager::new(config, Arc::new(connector.clone()));
//! ```

use crate::{
    event_channel, Connection, ConnectionOptions, Connector, EventSender, HandleEvent, WireHandle,
};
use kvtopo_common::{Address, Value, WireError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

type Reply = Result<Value, WireError>;

#[derive(Default)]
struct MockState {
    /// Handles in creation order
    created: RwLock<Vec<Arc<MockHandle>>>,

    /// Reply returned for every command sent to an address
    replies: RwLock<HashMap<Address, Reply>>,

    /// Emit `Connect` as soon as a handle is created
    auto_connect: AtomicBool,
}

/// Scripted [`Connector`] that records everything it is asked to do
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<MockState>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subsequently created handle announces `Connect` immediately
    pub fn auto_connect(self) -> Self {
        self.state.auto_connect.store(true, Ordering::SeqCst);
        self
    }

    /// Script the reply for every command sent to `address`, including
    /// commands already waiting on a handle created earlier.
    pub fn set_reply(&self, address: &Address, reply: Reply) {
        self.state.replies.write().insert(address.clone(), reply);
    }

    pub fn clear_reply(&self, address: &Address) {
        self.state.replies.write().remove(address);
    }

    /// Number of handles created so far
    pub fn creations(&self) -> usize {
        self.state.created.read().len()
    }

    /// Most recently created handle for `address`
    pub fn latest(&self, address: &Address) -> Option<Arc<MockHandle>> {
        self.state
            .created
            .read()
            .iter()
            .rev()
            .find(|h| &h.address == address)
            .cloned()
    }

    /// Number of handles ever created for `address`
    pub fn creations_for(&self, address: &Address) -> usize {
        self.state
            .created
            .read()
            .iter()
            .filter(|h| &h.address == address)
            .count()
    }
}

impl Connector for MockConnector {
    fn create(&self, address: &Address, options: &ConnectionOptions) -> Connection {
        let (events, stream) = event_channel();
        let handle = Arc::new(MockHandle {
            address: address.clone(),
            options: options.clone(),
            events,
            state: self.state.clone(),
            commands: RwLock::new(Vec::new()),
            close_calls: AtomicUsize::new(0),
            fail_close: AtomicBool::new(false),
        });

        self.state.created.write().push(handle.clone());

        if self.state.auto_connect.load(Ordering::SeqCst) {
            handle.emit(HandleEvent::Connect);
        }

        Connection::new(handle, stream)
    }
}

/// Handle produced by [`MockConnector`]
pub struct MockHandle {
    pub address: Address,
    pub options: ConnectionOptions,
    events: EventSender,
    state: Arc<MockState>,
    commands: RwLock<Vec<(String, Vec<String>)>>,
    close_calls: AtomicUsize,
    fail_close: AtomicBool,
}

impl MockHandle {
    /// Deliver an event to whoever consumes this handle's stream.
    /// Events sent after the consumer went away are dropped.
    pub fn emit(&self, event: HandleEvent) {
        let _ = self.events.send(event);
    }

    pub fn commands(&self) -> Vec<(String, Vec<String>)> {
        self.commands.read().clone()
    }

    pub fn command_count(&self) -> usize {
        self.commands.read().len()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Make `close` report an error, as a half-broken socket would
    pub fn fail_close(&self) {
        self.fail_close.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl WireHandle for MockHandle {
    async fn send_command(&self, name: &str, args: &[String]) -> Result<Value, WireError> {
        self.commands
            .write()
            .push((name.to_string(), args.to_vec()));

        let reply = self.state.replies.read().get(&self.address).cloned();
        match reply {
            Some(reply) => reply,
            None => std::future::pending().await,
        }
    }

    fn close(&self) -> Result<(), WireError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(WireError::Closed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_creation_log_and_events() {
        let connector = MockConnector::new().auto_connect();
        let addr = Address::new("host", 6379);

        let mut conn = connector.create(&addr, &ConnectionOptions::default());
        assert_eq!(connector.creations(), 1);
        assert_eq!(conn.events.recv().await, Some(HandleEvent::Connect));

        let handle = connector.latest(&addr).unwrap();
        handle.emit(HandleEvent::End);
        assert_eq!(conn.events.recv().await, Some(HandleEvent::End));
    }

    #[tokio::test]
    async fn test_scripted_reply() {
        let connector = MockConnector::new();
        let addr = Address::new("host", 6379);
        connector.set_reply(&addr, Ok(Value::from("PONG")));

        let conn = connector.create(&addr, &ConnectionOptions::default());
        let reply = tokio_test::assert_ok!(conn.handle.send_command("PING", &[]).await);
        assert_eq!(reply, Value::from("PONG"));

        let handle = connector.latest(&addr).unwrap();
        assert_eq!(handle.commands(), vec![("PING".to_string(), vec![])]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unscripted_command_stays_pending() {
        let connector = MockConnector::new();
        let addr = Address::new("host", 6379);
        let conn = connector.create(&addr, &ConnectionOptions::default());

        let outcome = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            conn.handle.send_command("ROLE", &[]),
        )
        .await;
        assert!(outcome.is_err());
    }

    #[test]
    fn test_failing_close() {
        let connector = MockConnector::new();
        let addr = Address::new("host", 6379);
        let conn = connector.create(&addr, &ConnectionOptions::default());
        connector.latest(&addr).unwrap().fail_close();

        tokio_test::assert_err!(conn.handle.close());
        assert_eq!(connector.latest(&addr).unwrap().close_calls(), 1);
    }
}
