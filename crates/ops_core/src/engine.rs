use crate::handling::process_queues;
use crate::{EventEnvelope, OpsContent, OpsState};

/// Advance the pipeline by one tick.
///
/// Order of operations:
/// 1. Run the queue processor when the tick lands on the process interval.
/// 2. Increment the tick counter.
///
/// Diagnosis and task creation happen outside the tick, driven by callers;
/// the tick only moves queued tasks through their lifecycle on virtual time.
/// Returns all events produced this tick.
pub fn tick(state: &mut OpsState, content: &OpsContent) -> Vec<EventEnvelope> {
    let mut events = Vec::new();

    let interval = content.constants.process_interval_ticks.max(1);
    if state.meta.tick.is_multiple_of(interval) {
        process_queues(state, content, &mut events);
    }

    state.meta.tick += 1;
    events
}
