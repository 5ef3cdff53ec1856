//! Periodic queue processor.
//!
//! Each pass scans the per-port queues in key order, promotes at most one
//! `Ready` task per key to `InProgress`, and drives the in-progress task's
//! steps on virtual time: a step completes when its eta tick arrives.
//! Failures are contained per task; the processor itself never aborts.

use crate::{
    emit, Event, EventEnvelope, LogKind, OpsContent, OpsState, PlanStep, PortKey, Recipient,
    RequiredPart, SparePart, StepKind, TaskLogEntry, TaskStatus,
};
use std::collections::HashMap;

use crate::PartId;

pub(crate) fn process_queues(
    state: &mut OpsState,
    content: &OpsContent,
    events: &mut Vec<EventEnvelope>,
) {
    let mut keys: Vec<PortKey> = state.queues.keys().cloned().collect();
    keys.sort();

    for key in &keys {
        promote_first_ready(state, key, events);
        run_due_step(state, content, key, events);
    }

    state.queues.retain(|_, queue| !queue.is_empty());
}

/// Advance the highest-priority `Ready` task to `InProgress`, unless this
/// key already has one running. Distinct keys advance independently.
fn promote_first_ready(state: &mut OpsState, key: &PortKey, events: &mut Vec<EventEnvelope>) {
    let tick = state.meta.tick;
    let mut started = None;

    if let Some(queue) = state.queues.get_mut(key) {
        if queue.iter().any(|t| t.status == TaskStatus::InProgress) {
            return;
        }
        if let Some(task) = queue.iter_mut().find(|t| t.status == TaskStatus::Ready) {
            task.status = TaskStatus::InProgress;
            task.started_tick = Some(tick);
            task.step_eta_tick = task
                .plan
                .steps
                .first()
                .map(|s| tick + s.estimated_minutes);
            task.log.push(TaskLogEntry {
                tick,
                kind: LogKind::Progress,
                message: "task started".to_string(),
            });
            started = Some((task.id.clone(), task.station.clone(), task.port.clone()));
        }
    }

    if let Some((task_id, station, port)) = started {
        events.push(emit(
            &mut state.counters,
            tick,
            Event::TaskStarted {
                task_id,
                station,
                port,
            },
        ));
    }
}

enum StepAction {
    Wait,
    StepDone,
    Fail(u32, String),
    EmptyPlan,
}

fn run_due_step(
    state: &mut OpsState,
    _content: &OpsContent,
    key: &PortKey,
    events: &mut Vec<EventEnvelope>,
) {
    let tick = state.meta.tick;
    let Some(queue) = state.queues.get_mut(key) else {
        return;
    };
    let Some(idx) = queue
        .iter()
        .position(|t| t.status == TaskStatus::InProgress)
    else {
        return;
    };

    let action = {
        let task = &queue[idx];
        if task.plan.steps.is_empty() {
            StepAction::EmptyPlan
        } else {
            match task.step_eta_tick {
                Some(eta) if tick >= eta => {
                    let step = &task.plan.steps[task.next_step];
                    if step.kind == StepKind::Repair {
                        match missing_part(step, &task.required_parts, &state.parts) {
                            Some(part_id) => StepAction::Fail(
                                step.sequence,
                                format!("required part {part_id} not in stock"),
                            ),
                            None => StepAction::StepDone,
                        }
                    } else {
                        StepAction::StepDone
                    }
                }
                _ => StepAction::Wait,
            }
        }
    };

    match action {
        StepAction::Wait => {}
        StepAction::StepDone => {
            let task = &mut queue[idx];
            let step_sequence = task.plan.steps[task.next_step].sequence;
            let description = task.plan.steps[task.next_step].description.clone();
            task.next_step += 1;
            task.progress = task.next_step as f32 / task.plan.steps.len() as f32 * 100.0;
            task.log.push(TaskLogEntry {
                tick,
                kind: LogKind::Progress,
                message: format!("completed step {step_sequence}: {description}"),
            });
            let finished = task.next_step == task.plan.steps.len();
            task.step_eta_tick = if finished {
                None
            } else {
                Some(tick + task.plan.steps[task.next_step].estimated_minutes)
            };
            let task_id = task.id.clone();
            let progress = task.progress;

            events.push(emit(
                &mut state.counters,
                tick,
                Event::StepCompleted {
                    task_id,
                    sequence: step_sequence,
                    progress,
                },
            ));

            if finished {
                complete_task(state, key, idx, events);
            }
        }
        StepAction::Fail(sequence, reason) => fail_task(state, key, idx, sequence, reason, events),
        StepAction::EmptyPlan => complete_task(state, key, idx, events),
    }
}

/// First part of the step whose stock cannot cover the requested quantity.
fn missing_part(
    step: &PlanStep,
    required: &[RequiredPart],
    parts: &HashMap<PartId, SparePart>,
) -> Option<PartId> {
    for part_id in &step.parts {
        let quantity = required
            .iter()
            .find(|r| &r.part_id == part_id)
            .map_or(1, |r| r.quantity);
        let stock = parts.get(part_id).map_or(0, |p| p.stock);
        if stock < quantity {
            return Some(part_id.clone());
        }
    }
    None
}

fn complete_task(state: &mut OpsState, key: &PortKey, idx: usize, events: &mut Vec<EventEnvelope>) {
    let tick = state.meta.tick;
    let Some(queue) = state.queues.get_mut(key) else {
        return;
    };
    let mut task = queue.remove(idx);
    task.status = TaskStatus::Completed;
    task.progress = 100.0;
    task.completed_tick = Some(tick);
    task.step_eta_tick = None;
    task.log.push(TaskLogEntry {
        tick,
        kind: LogKind::Progress,
        message: "task completed".to_string(),
    });

    super::release_maintainer(state, &task.id);

    // Consume stock; the repair-step gate makes a shortfall here unlikely,
    // and saturating arithmetic keeps stock non-negative regardless.
    let mut low_stock = Vec::new();
    for part in &task.required_parts {
        if let Some(stocked) = state.parts.get_mut(&part.part_id) {
            stocked.stock = stocked.stock.saturating_sub(part.quantity);
            if stocked.stock <= stocked.threshold {
                low_stock.push((
                    stocked.id.clone(),
                    stocked.name.clone(),
                    stocked.stock,
                    stocked.threshold,
                ));
            }
        }
    }

    let task_id = task.id.clone();
    let station = task.station.clone();
    let port = task.port.clone();
    let maintainer = task.maintainer.clone();
    state.task_history.entry(key.clone()).or_default().push(task);

    for recipient in [
        Recipient::StationAdmin(station.clone()),
        Recipient::MaintenanceSupervisor,
    ] {
        events.push(emit(
            &mut state.counters,
            tick,
            Event::TaskCompleted {
                recipient,
                task_id: task_id.clone(),
                station: station.clone(),
                port: port.clone(),
                maintainer: maintainer.clone(),
            },
        ));
    }

    for (part_id, name, stock, threshold) in low_stock {
        events.push(emit(
            &mut state.counters,
            tick,
            Event::LowStock {
                recipient: Recipient::InventoryManager,
                part_id,
                name,
                stock,
                threshold,
            },
        ));
    }
}

/// A failed step skips the task's remaining steps without rolling back
/// side effects already applied. The task lands in the terminal `Failed`
/// state, its maintainer is released, and processing of other tasks
/// continues untouched.
fn fail_task(
    state: &mut OpsState,
    key: &PortKey,
    idx: usize,
    sequence: u32,
    reason: String,
    events: &mut Vec<EventEnvelope>,
) {
    let tick = state.meta.tick;
    let Some(queue) = state.queues.get_mut(key) else {
        return;
    };
    let mut task = queue.remove(idx);
    task.status = TaskStatus::Failed;
    task.completed_tick = Some(tick);
    task.step_eta_tick = None;
    task.log.push(TaskLogEntry {
        tick,
        kind: LogKind::Error,
        message: format!("step {sequence} failed: {reason}"),
    });

    super::release_maintainer(state, &task.id);

    let task_id = task.id.clone();
    state.task_history.entry(key.clone()).or_default().push(task);

    events.push(emit(
        &mut state.counters,
        tick,
        Event::TaskFailed {
            task_id,
            sequence,
            reason,
        },
    ));
}
