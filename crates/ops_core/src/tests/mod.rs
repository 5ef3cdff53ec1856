use super::*;
use crate::telemetry::TelemetrySample;
use crate::test_fixtures::{
    base_content, base_state, link_down_telemetry, nominal_telemetry, overvoltage_telemetry,
};

mod assignment;
mod diagnosis;

// --- Shared test helpers ------------------------------------------------

fn station() -> StationId {
    StationId("CS001".to_string())
}

fn port() -> PortId {
    PortId("P01".to_string())
}

fn port_key() -> PortKey {
    PortKey::new(&station(), &port())
}

fn diagnose_sample(
    state: &mut OpsState,
    content: &OpsContent,
    sample: &TelemetrySample,
) -> FusedDiagnosisReport {
    diagnose(state, content, &station(), &port(), sample)
        .unwrap()
        .0
}

/// Diagnose a sustained overvoltage on CS001-P01 and create its handling
/// task. The task is `Ready` and staffed when this returns.
fn overvoltage_task(state: &mut OpsState, content: &OpsContent) -> TaskId {
    let report = diagnose_sample(state, content, &overvoltage_telemetry());
    handle_fault(state, content, &station(), &port(), &report)
        .unwrap()
        .0
}

fn run_ticks(state: &mut OpsState, content: &OpsContent, count: u64) -> Vec<EventEnvelope> {
    let mut events = Vec::new();
    for _ in 0..count {
        events.extend(tick(state, content));
    }
    events
}

fn queue_tasks<'a>(state: &'a OpsState, key: &PortKey) -> &'a [HandlingTask] {
    state.queues.get(key).map_or(&[], Vec::as_slice)
}
