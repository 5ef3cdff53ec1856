//! Fault handling: task creation, maintainer assignment, spare-part
//! resolution, remediation planning and the queued task lifecycle
//! `Created → Ready → InProgress → Completed | Failed`.

mod assign;
mod parts;
mod plan;
mod queue;

pub use assign::maintainer_score;
pub(crate) use queue::process_queues;

use std::collections::BTreeSet;

use crate::{
    emit, Event, EventEnvelope, FaultCategory, FusedDiagnosisReport, HandlingPlan, HandlingTask,
    LogKind, OpsContent, OpsError, OpsState, PortId, PortKey, Recipient, Severity, StationId,
    TaskId, TaskLogEntry, TaskStatus,
};

/// Create, enqueue, staff, provision and plan a handling task for one
/// diagnosis report. On success the task is `Ready` in its port queue and
/// the returned events carry the assignment and creation notifications.
///
/// `NoAvailableMaintainer` aborts cleanly: the freshly enqueued task is
/// removed again, so a failed call leaves no trace.
pub fn handle_fault(
    state: &mut OpsState,
    content: &OpsContent,
    station: &StationId,
    port: &PortId,
    report: &FusedDiagnosisReport,
) -> Result<(TaskId, Vec<EventEnvelope>), OpsError> {
    let task_id = TaskId(format!("task_{:06}", state.counters.next_task_id));
    state.counters.next_task_id += 1;

    let key = PortKey::new(station, port);
    let created_tick = state.meta.tick;

    let task = HandlingTask {
        id: task_id.clone(),
        station: station.clone(),
        port: port.clone(),
        report: report.clone(),
        priority: task_priority(report),
        status: TaskStatus::Created,
        maintainer: None,
        required_parts: Vec::new(),
        plan: HandlingPlan::default(),
        progress: 0.0,
        log: vec![TaskLogEntry {
            tick: created_tick,
            kind: LogKind::Progress,
            message: "task created".to_string(),
        }],
        created_tick,
        started_tick: None,
        completed_tick: None,
        next_step: 0,
        step_eta_tick: None,
    };

    let queue = state.queues.entry(key.clone()).or_default();
    queue.push(task);
    // Stable sort: equal priorities keep arrival order.
    queue.sort_by_key(|t| std::cmp::Reverse(t.priority));

    let required: BTreeSet<FaultCategory> =
        report.faults.iter().map(|f| f.category).collect();

    let maintainer_id = match assign::assign(state, &required, report.overall_severity, &task_id) {
        Ok(id) => id,
        Err(err) => {
            if let Some(queue) = state.queues.get_mut(&key) {
                queue.retain(|t| t.id != task_id);
            }
            return Err(err);
        }
    };

    let required_parts = parts::resolve(report, content, &state.parts);
    let handling_plan = plan::generate(report, content);

    let priority = if let Some(task) = state
        .queues
        .get_mut(&key)
        .and_then(|q| q.iter_mut().find(|t| t.id == task_id))
    {
        task.maintainer = Some(maintainer_id.clone());
        task.required_parts = required_parts;
        task.plan = handling_plan;
        task.status = TaskStatus::Ready;
        task.log.push(TaskLogEntry {
            tick: created_tick,
            kind: LogKind::Progress,
            message: format!("assigned to {maintainer_id}, plan ready"),
        });
        task.priority
    } else {
        0
    };

    let events = vec![
        emit(
            &mut state.counters,
            created_tick,
            Event::TaskAssigned {
                recipient: Recipient::Maintainer(maintainer_id),
                task_id: task_id.clone(),
                station: station.clone(),
                port: port.clone(),
                priority,
            },
        ),
        emit(
            &mut state.counters,
            created_tick,
            Event::TaskCreated {
                recipient: Recipient::StationAdmin(station.clone()),
                task_id: task_id.clone(),
                station: station.clone(),
                port: port.clone(),
                severity: report.overall_severity,
            },
        ),
    ];

    Ok((task_id, events))
}

/// Priority is a pure function of the report: severity weight plus the sum
/// of per-fault category weights, scaled by report confidence and rounded.
pub fn task_priority(report: &FusedDiagnosisReport) -> i32 {
    let mut priority = severity_weight(report.overall_severity);
    priority += report
        .faults
        .iter()
        .map(|f| category_weight(f.category))
        .sum::<f32>();

    #[allow(clippy::cast_possible_truncation)]
    let rounded = (priority * report.confidence).round() as i32;
    rounded
}

fn severity_weight(severity: Severity) -> f32 {
    match severity {
        Severity::Critical => 100.0,
        Severity::Warning => 50.0,
        Severity::Notice => 10.0,
        Severity::Normal => 0.0,
    }
}

fn category_weight(category: FaultCategory) -> f32 {
    match category {
        FaultCategory::Power => 30.0,
        FaultCategory::Temperature => 20.0,
        FaultCategory::Communication => 10.0,
        FaultCategory::Charging => 0.0,
    }
}

pub(crate) fn release_maintainer(state: &mut OpsState, task_id: &TaskId) {
    if let Some(m) = state
        .maintainers
        .iter_mut()
        .find(|m| m.current_task.as_ref() == Some(task_id))
    {
        m.available = true;
        m.current_task = None;
    }
}
