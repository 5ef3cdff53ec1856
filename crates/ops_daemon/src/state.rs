use ops_control::{Ack, DeviceCommand, DeviceLink, StationController};
use ops_core::{EventEnvelope, OpsContent, OpsError, OpsState, PortId, PortKey, StationId};
use ops_world::scenario::TelemetryFeed;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Link backend for simulated charge points: acknowledges everything and
/// traces the command for debugging.
pub struct LoggingLink;

impl DeviceLink for LoggingLink {
    fn send(
        &mut self,
        station: &StationId,
        port: &PortId,
        command: DeviceCommand,
    ) -> Result<Ack, OpsError> {
        tracing::debug!(%station, %port, kind = command.kind(), "device command");
        Ok(Ack)
    }
}

pub struct OpsDaemonState {
    pub state: OpsState,
    pub content: OpsContent,
    pub feed: TelemetryFeed,
    pub controller: StationController<LoggingLink>,
    /// All port keys in a fixed order; the tick loop polls them round-robin.
    pub poll_order: Vec<PortKey>,
    pub next_poll: usize,
}

impl OpsDaemonState {
    pub fn new(content: OpsContent, state: OpsState, seed: u64) -> Self {
        let mut poll_order: Vec<PortKey> = state
            .stations
            .values()
            .flat_map(|s| s.ports.keys().map(|p| PortKey::new(&s.id, p)))
            .collect();
        poll_order.sort();
        Self {
            state,
            content,
            feed: TelemetryFeed::new(seed),
            controller: StationController::new(LoggingLink),
            poll_order,
            next_poll: 0,
        }
    }
}

pub type SharedOps = Arc<Mutex<OpsDaemonState>>;
pub type EventTx = broadcast::Sender<Vec<EventEnvelope>>;
