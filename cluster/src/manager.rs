use crate::discovery::Worklist;
use crate::failover;
use crate::record::ConnectionRecord;
use crate::registry::Registry;
use crate::selector::ConnectionView;
use crate::types::TopologyStats;
use crate::TopologyConfig;
use kvtopo_client::{Connection, ConnectionOptions, Connector};
use kvtopo_common::{Address, Result, Role, TopologyError};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// State shared between the facade and the per-connection tasks
pub(crate) struct Shared {
    pub config: TopologyConfig,
    pub connector: Arc<dyn Connector>,
    pub registry: Mutex<Registry>,
    pub shutdown: CancellationToken,
    seed_master_followed: AtomicBool,
    runtime: Handle,
}

impl Shared {
    pub fn new(config: TopologyConfig, connector: Arc<dyn Connector>) -> Result<Arc<Self>> {
        let runtime = Handle::try_current().map_err(|_| TopologyError::NoRuntime)?;
        Ok(Arc::new(Self {
            config,
            connector,
            registry: Mutex::new(Registry::new()),
            shutdown: CancellationToken::new(),
            seed_master_followed: AtomicBool::new(false),
            runtime,
        }))
    }

    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.runtime.spawn(future);
    }

    /// Open a connection to `address` and start supervising it, unless the
    /// address is already known. Returns whether a record was added.
    pub fn add_connection(self: &Arc<Self>, address: Address) -> bool {
        self.admit(&mut Worklist::from(address)) == 1
    }

    /// Drain `worklist`, opening a record for every address the registry
    /// does not hold yet. The diff and the inserts happen under one lock.
    /// Returns the number of records added.
    pub fn admit(self: &Arc<Self>, worklist: &mut Worklist) -> usize {
        if self.shutdown.is_cancelled() {
            return 0;
        }

        let mut opened = Vec::new();
        {
            let mut registry = self.registry.lock();
            while let Some(address) = worklist.pop() {
                if registry.contains_address(&address) {
                    continue;
                }

                let options = self.config.options.clone();
                let Connection { handle, events } = self.connector.create(&address, &options);
                let record = Arc::new(ConnectionRecord::new(address, options, handle));
                registry.insert(record.clone());
                opened.push((record, events));
            }
        }

        let added = opened.len();
        for (record, events) in opened {
            info!("Added connection to topology: id={}, key={}", record.id, record.key);
            self.spawn(failover::supervise(self.clone(), record, events));
        }

        added
    }

    /// True the first time it is called; the seed's master is followed once.
    pub fn follow_seed_master(&self) -> bool {
        !self.seed_master_followed.swap(true, Ordering::SeqCst)
    }
}

/// Keeps a live view of a master/replica deployment and hands out
/// connections by role.
///
/// Created explicitly and passed to whoever needs connections; the
/// [`Connector`] it is given decides how handles are made, which is also how
/// tests substitute a scripted one.
pub struct TopologyManager {
    shared: Arc<Shared>,
}

impl TopologyManager {
    /// Create a manager. Must be called from within a tokio runtime, which
    /// then drives all polling and reconnection.
    pub fn new(config: TopologyConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        config.validate()?;
        let shared = Shared::new(config, connector)?;
        Ok(Self { shared })
    }

    pub fn config(&self) -> &TopologyConfig {
        &self.shared.config
    }

    /// Connect to the configured seed. Everything else is discovered from it.
    #[instrument(skip(self), fields(seed = %self.shared.config.seed()))]
    pub fn initialize(&self) {
        info!("Initializing topology");
        self.shared.add_connection(self.shared.config.seed());
    }

    /// Connect to `address` unless it is already known
    pub fn add_connection(&self, address: Address) -> bool {
        self.shared.add_connection(address)
    }

    /// Next ready connection of `role`, or the one with `id` if given
    pub fn find_next(&self, role: Role, id: Option<&str>) -> Option<ConnectionView> {
        self.shared.registry.lock().find_next(role, id)
    }

    /// A ready master for writes
    pub fn get_master(&self, id: Option<&str>) -> Option<ConnectionView> {
        self.find_next(Role::Master, id)
    }

    /// A ready slave for reads.
    ///
    /// Without an `id`, falls back to a master when no slave is ready, so
    /// single-node deployments still serve reads. A specific `id` never
    /// falls back.
    pub fn get_slave(&self, id: Option<&str>) -> Option<ConnectionView> {
        self.find_next(Role::Slave, id).or_else(|| match id {
            None => self.get_master(None),
            Some(_) => None,
        })
    }

    /// Open a new connection, outside the pool, to the instance of `role`
    /// (and `id`, if given). Intended for long-lived sessions such as
    /// subscriptions. The connection is neither polled nor reconnected and
    /// has not necessarily finished connecting when returned.
    pub fn checkout(&self, role: Role, id: Option<&str>) -> Option<Connection> {
        let options = self.shared.config.options.clone();
        self.checkout_with(role, id, &options)
    }

    /// [`checkout`](Self::checkout) with explicit connection options
    #[instrument(skip(self, options))]
    pub fn checkout_with(
        &self,
        role: Role,
        id: Option<&str>,
        options: &ConnectionOptions,
    ) -> Option<Connection> {
        let record = self.shared.registry.lock().lookup(role, id)?;
        debug!("Checking out dedicated connection to {}", record.address);
        Some(self.shared.connector.create(&record.address, options))
    }

    /// All known connections, ready or not, in insertion order
    pub fn connections(&self) -> Vec<ConnectionView> {
        self.shared
            .registry
            .lock()
            .records()
            .iter()
            .cloned()
            .map(ConnectionView::new)
            .collect()
    }

    pub fn stats(&self) -> TopologyStats {
        self.shared.registry.lock().stats()
    }

    /// Stop polling and reconnecting and close every pooled connection.
    /// Checked-out connections are left to their owners.
    pub fn shutdown(&self) {
        if self.shared.shutdown.is_cancelled() {
            return;
        }
        self.shared.shutdown.cancel();

        let records = self.shared.registry.lock().drain();
        for record in &records {
            if record.kill() {
                if let Err(e) = record.close() {
                    debug!("Ignoring error while closing {}: {}", record.id, e);
                }
            }
        }

        info!("Topology manager shut down: connections_closed={}", records.len());
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }
}

impl Drop for TopologyManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
