//! `ops_core`: deterministic fault diagnosis and handling pipeline.
//!
//! No IO, no network, no wall clock. State is an explicit context object
//! owned by the caller; engines return event envelopes instead of
//! dispatching ambient notifications.

mod diagnosis;
mod engine;
mod error;
mod handling;
pub mod rules;
pub mod telemetry;
mod types;

pub use diagnosis::{diagnose, feature_vector, FEATURE_DIM};
pub use engine::tick;
pub use error::OpsError;
pub use handling::{handle_fault, maintainer_score, task_priority};
pub use types::*;

#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;

/// Wrap an event in an envelope with the next sequential id. Everything
/// that produces events, here and in downstream crates, goes through this.
pub fn emit(counters: &mut Counters, tick: u64, event: Event) -> EventEnvelope {
    let id = EventId(format!("evt_{:06}", counters.next_event_id));
    counters.next_event_id += 1;
    EventEnvelope { id, tick, event }
}

#[cfg(test)]
mod tests;
