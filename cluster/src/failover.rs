//! Per-connection event handling and reconnection.
//!
//! Each record gets one supervising task consuming its handle's events.
//! `connect` starts the poll loop; `error` and `end` tear the record down and
//! schedule a fresh record for the same address one check interval later.

use crate::health;
use crate::manager::Shared;
use crate::record::ConnectionRecord;
use kvtopo_client::{EventStream, HandleEvent};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Consume `events` for `record` until the record is torn down, the stream
/// ends or the manager shuts down.
pub(crate) async fn supervise(
    shared: Arc<Shared>,
    record: Arc<ConnectionRecord>,
    mut events: EventStream,
) {
    loop {
        let event = tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            _ = record.killed() => break,
            event = events.recv() => event,
        };

        match event {
            Some(HandleEvent::Connect) => {
                debug!("Connection established: id={}", record.id);
                if record.begin_polling() {
                    shared.spawn(health::poll_loop(shared.clone(), record.clone()));
                }
            }
            Some(HandleEvent::Error(err)) => {
                warn!("Connection error: id={}, error={}", record.id, err);
                handle_failure(&shared, &record);
            }
            Some(HandleEvent::End) => {
                warn!("Connection ended: id={}", record.id);
                handle_failure(&shared, &record);
            }
            None => {
                warn!("Event stream closed: id={}", record.id);
                handle_failure(&shared, &record);
            }
        }

        if record.is_killed() {
            break;
        }
    }

    trace!("Supervisor exiting: id={}, key={}", record.id, record.key);
}

/// Tear down `record` and schedule its replacement. Returns `false` if the
/// record was already torn down, in which case nothing happens.
pub(crate) fn handle_failure(shared: &Arc<Shared>, record: &Arc<ConnectionRecord>) -> bool {
    if !record.kill() {
        trace!("Ignoring failure of torn-down record: id={}", record.id);
        return false;
    }

    if let Err(e) = record.close() {
        debug!("Ignoring error while closing failed connection {}: {}", record.id, e);
    }

    let removed = shared.registry.lock().remove_by_address(&record.address);
    info!(
        "Removed connection from topology: id={}, records_removed={}",
        record.id,
        removed.len()
    );

    let delay = shared.config.check_interval();
    let address = record.address.clone();
    let scheduler = shared.clone();
    shared.spawn(async move {
        tokio::select! {
            _ = scheduler.shutdown.cancelled() => {}
            _ = tokio::time::sleep(delay) => {
                debug!("Reconnecting: address={}", address);
                scheduler.add_connection(address);
            }
        }
    });

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TopologyConfig;
    use kvtopo_client::mock::MockConnector;
    use kvtopo_common::Address;
    use std::time::Duration;

    const INTERVAL: Duration = Duration::from_millis(2000);

    fn shared(connector: &MockConnector) -> Arc<Shared> {
        let config = TopologyConfig::new("host", 6379).with_check_interval(INTERVAL);
        Shared::new(config, Arc::new(connector.clone())).unwrap()
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_removes_and_reconnects_once() {
        let connector = MockConnector::new();
        let shared = shared(&connector);
        let seed = Address::new("host", 6379);
        shared.add_connection(seed.clone());
        let record = shared.registry.lock().get("host:6379").unwrap();

        assert!(handle_failure(&shared, &record));
        assert!(!handle_failure(&shared, &record));
        assert!(shared.registry.lock().is_empty());
        assert_eq!(connector.latest(&seed).unwrap().close_calls(), 1);

        tokio::time::sleep(INTERVAL - Duration::from_millis(10)).await;
        assert!(shared.registry.lock().is_empty());
        assert_eq!(connector.creations(), 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(shared.registry.lock().len(), 1);
        assert_eq!(connector.creations(), 2);

        let replacement = shared.registry.lock().get("host:6379").unwrap();
        assert_ne!(replacement.key, record.key);
        assert!(!replacement.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_errors_are_suppressed() {
        let connector = MockConnector::new();
        let shared = shared(&connector);
        let seed = Address::new("host", 6379);
        shared.add_connection(seed.clone());
        connector.latest(&seed).unwrap().fail_close();

        connector.latest(&seed).unwrap().emit(HandleEvent::Error(
            kvtopo_common::WireError::connection("ECONNRESET"),
        ));
        settle().await;

        assert!(shared.registry.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_events_schedule_one_reconnect() {
        let connector = MockConnector::new();
        let shared = shared(&connector);
        let seed = Address::new("host", 6379);
        shared.add_connection(seed.clone());

        let handle = connector.latest(&seed).unwrap();
        handle.emit(HandleEvent::Error(kvtopo_common::WireError::Closed));
        handle.emit(HandleEvent::End);
        handle.emit(HandleEvent::Error(kvtopo_common::WireError::Closed));
        settle().await;

        tokio::time::sleep(INTERVAL * 3).await;
        assert_eq!(connector.creations_for(&seed), 2);
        assert_eq!(shared.registry.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_starts_single_poll_loop() {
        let connector = MockConnector::new();
        let shared = shared(&connector);
        let seed = Address::new("host", 6379);
        shared.add_connection(seed.clone());

        let handle = connector.latest(&seed).unwrap();
        assert_eq!(handle.command_count(), 0);

        handle.emit(HandleEvent::Connect);
        handle.emit(HandleEvent::Connect);
        settle().await;

        // unscripted ROLE never answers, so one loop means one command
        assert_eq!(handle.commands(), vec![("ROLE".to_string(), vec![])]);
    }
}
