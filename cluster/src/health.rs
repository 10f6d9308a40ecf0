use crate::discovery::{self, Worklist};
use crate::manager::Shared;
use crate::record::ConnectionRecord;
use crate::role::{parse_role, RoleDescriptor};
use kvtopo_common::{Result, TopologyError, Value, WireError};
use std::sync::Arc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, trace, warn};

const ROLE_COMMAND: &str = "ROLE";

/// Poll `record` with `ROLE` every check interval for as long as it lives.
///
/// The next poll is scheduled before the reply is looked at, so a failing
/// node keeps being polled and recovers as soon as it answers again.
pub(crate) async fn poll_loop(shared: Arc<Shared>, record: Arc<ConnectionRecord>) {
    let interval = shared.config.check_interval();

    loop {
        if record.is_killed() {
            break;
        }

        let reply = tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            _ = record.killed() => break,
            reply = record.handle().send_command(ROLE_COMMAND, &[]) => reply,
        };
        let next_poll = Instant::now() + interval;

        if let Err(e) = handle_reply(&shared, &record, reply) {
            error!("Role poll failed: {}", e);
        }

        tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            _ = record.killed() => break,
            _ = sleep_until(next_poll) => {}
        }
    }

    trace!("Poll loop exiting: id={}, key={}", record.id, record.key);
}

/// Interpret one `ROLE` reply for `record` and admit any peers it names.
/// Returns the number of connections added.
pub(crate) fn handle_reply(
    shared: &Arc<Shared>,
    record: &Arc<ConnectionRecord>,
    reply: std::result::Result<Value, WireError>,
) -> Result<usize> {
    let descriptor = match reply {
        Ok(value) => parse_role(&value).unwrap_or_else(|| {
            warn!(
                "Unrecognized ROLE reply from {}, treating as standalone: {:?}",
                record.id, value
            );
            RoleDescriptor::standalone()
        }),
        Err(e) if e.is_unknown_command() => {
            trace!("{} does not support ROLE, treating as standalone master", record.id);
            RoleDescriptor::standalone()
        }
        Err(e) => {
            record.set_ready(false);
            return Err(TopologyError::RoleQuery {
                id: record.id.clone(),
                source: e,
            });
        }
    };

    // Torn down while the query was in flight
    if record.is_killed() {
        return Ok(0);
    }

    let mut worklist = Worklist::from_descriptor(&descriptor);
    let seed = shared.config.seed();
    if let Some(master) = discovery::seed_master(&seed, &record.address, &descriptor) {
        if shared.follow_seed_master() {
            debug!("Seed {} is a replica, following its master {}", seed, master);
            worklist.push(master);
        }
    }

    let role = descriptor.role;
    let previous = record.apply(descriptor);
    if previous != role {
        info!("Role changed: id={}, {} -> {}", record.id, previous, role);
    }

    let added = shared.admit(&mut worklist);

    debug!(
        "Polled {}: role={}, ready={}, discovered={}",
        record.id,
        role,
        record.is_ready(),
        added
    );

    Ok(added)
}
