//! Notification delivery.
//!
//! The engines record who should hear about an event; actual delivery is a
//! daemon concern. The production sink writes structured log lines; a
//! paging or SMS integration would implement the same trait.

use ops_core::{Event, EventEnvelope};
use tokio::sync::broadcast;

pub type EventRx = broadcast::Receiver<Vec<EventEnvelope>>;

pub trait NotificationSink: Send {
    fn deliver(&mut self, envelope: &EventEnvelope);
}

pub struct LogSink;

impl NotificationSink for LogSink {
    fn deliver(&mut self, envelope: &EventEnvelope) {
        let tick = envelope.tick;
        match &envelope.event {
            Event::TaskFailed {
                task_id,
                sequence,
                reason,
            } => {
                tracing::error!(tick, %task_id, sequence, reason, "handling task failed");
            }
            Event::LowStock {
                part_id,
                name,
                stock,
                threshold,
                ..
            } => {
                tracing::warn!(tick, %part_id, name, stock, threshold, "spare part low");
            }
            Event::DiagnosisCompleted {
                report_id,
                station,
                port,
                severity,
                confidence,
                fault_count,
            } => {
                if *fault_count > 0 {
                    tracing::warn!(
                        tick, %report_id, %station, %port, ?severity, confidence,
                        fault_count, "faults diagnosed"
                    );
                } else {
                    tracing::debug!(tick, %report_id, %station, %port, "port healthy");
                }
            }
            Event::TaskCreated {
                recipient,
                task_id,
                station,
                port,
                severity,
            } => {
                tracing::info!(
                    tick, ?recipient, %task_id, %station, %port, ?severity,
                    "handling task created"
                );
            }
            Event::TaskAssigned {
                recipient,
                task_id,
                priority,
                ..
            } => {
                tracing::info!(tick, ?recipient, %task_id, priority, "task assigned");
            }
            Event::TaskCompleted {
                recipient,
                task_id,
                maintainer,
                ..
            } => {
                tracing::info!(tick, ?recipient, %task_id, ?maintainer, "task completed");
            }
            other => {
                tracing::debug!(tick, event = ?other, "event");
            }
        }
    }
}

/// Drain the broadcast channel into a sink until every sender is gone.
pub async fn run_sink(mut rx: EventRx, mut sink: impl NotificationSink) {
    loop {
        match rx.recv().await {
            Ok(events) => {
                for envelope in &events {
                    sink.deliver(envelope);
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "notification sink lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
