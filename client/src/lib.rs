//! Contract between the topology engine and the wire client that speaks the
//! store's protocol.
//!
//! A [`Connector`] opens handles. Every handle reports its lifecycle through an
//! event stream (`connect`, `error`, `end`) and answers commands
//! asynchronously. Nothing in this crate performs network I/O.

pub mod config;
#[cfg(feature = "mock")]
pub mod mock;

use kvtopo_common::{Address, Value, WireError};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

pub use config::*;

/// Lifecycle notifications emitted by a wire handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleEvent {
    /// The handle established (or re-established) its socket
    Connect,

    /// The handle failed
    Error(WireError),

    /// The server or the network ended the connection
    End,
}

pub type EventSender = mpsc::UnboundedSender<HandleEvent>;
pub type EventStream = mpsc::UnboundedReceiver<HandleEvent>;

/// Create a linked event sender/stream pair for a new handle
pub fn event_channel() -> (EventSender, EventStream) {
    mpsc::unbounded_channel()
}

/// An open (or opening) connection to one store instance
#[async_trait::async_trait]
pub trait WireHandle: Send + Sync {
    /// Dispatch a command and wait for its reply
    async fn send_command(&self, name: &str, args: &[String]) -> Result<Value, WireError>;

    /// Close the underlying socket. Closing a broken handle may fail.
    fn close(&self) -> Result<(), WireError>;
}

/// Factory for wire handles
pub trait Connector: Send + Sync {
    /// Open a handle to `address`. The handle connects in the background and
    /// announces the outcome on the returned event stream.
    fn create(&self, address: &Address, options: &ConnectionOptions) -> Connection;
}

/// A freshly created handle together with its event stream
pub struct Connection {
    pub handle: Arc<dyn WireHandle>,
    pub events: EventStream,
}

impl Connection {
    pub fn new(handle: Arc<dyn WireHandle>, events: EventStream) -> Self {
        Self { handle, events }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}
