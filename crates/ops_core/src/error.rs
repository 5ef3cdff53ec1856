use thiserror::Error;

use crate::{PortId, StationId};

/// Pipeline error taxonomy. Every variant surfaces to the immediate caller;
/// step failures inside the queue processor are contained per task and
/// reported as events instead.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OpsError {
    #[error("malformed telemetry: {0}")]
    Validation(String),

    #[error("no maintainer available for assignment")]
    NoAvailableMaintainer,

    #[error("device command '{command}' to {station}/{port} failed")]
    Communication {
        station: StationId,
        port: PortId,
        command: String,
    },

    #[error("unknown station {0}")]
    UnknownStation(StationId),

    #[error("unknown port {station}/{port}")]
    UnknownPort { station: StationId, port: PortId },

    #[error("power {requested_kw} kW outside [{min_kw}, {max_kw}] for {station}/{port}")]
    PowerOutOfRange {
        station: StationId,
        port: PortId,
        requested_kw: f32,
        min_kw: f32,
        max_kw: f32,
    },

    #[error("port {station}/{port} cannot {action} in its current status")]
    InvalidPortStatus {
        station: StationId,
        port: PortId,
        action: String,
    },
}
