use super::*;
use std::collections::BTreeSet;

fn power_only() -> BTreeSet<FaultCategory> {
    BTreeSet::from([FaultCategory::Power])
}

#[test]
fn score_rewards_skill_match_level_and_critical_expertise() {
    let state = base_state();
    let required = power_only();

    let expert = &state.maintainers[0];
    let intermediate = &state.maintainers[1];
    let basic = &state.maintainers[2];

    // Full match + expert level + critical bonus.
    let s = maintainer_score(expert, &required, Severity::Critical);
    assert!((s - 100.0).abs() < f32::EPSILON);

    // Full match + intermediate level, no critical bonus at this level.
    let s = maintainer_score(intermediate, &required, Severity::Critical);
    assert!((s - 70.0).abs() < f32::EPSILON);

    // No skill match, basic level.
    let s = maintainer_score(basic, &required, Severity::Warning);
    assert!((s - 10.0).abs() < f32::EPSILON);
}

#[test]
fn partial_skill_match_is_proportional() {
    let state = base_state();
    let required = BTreeSet::from([FaultCategory::Power, FaultCategory::Charging]);

    // M002 covers one of two required categories: 25 + 20.
    let s = maintainer_score(&state.maintainers[1], &required, Severity::Warning);
    assert!((s - 45.0).abs() < f32::EPSILON);
}

#[test]
fn critical_power_task_goes_to_the_expert() {
    let content = base_content();
    let mut state = base_state();

    let task_id = overvoltage_task(&mut state, &content);

    let expert = &state.maintainers[0];
    assert_eq!(expert.id.0, "M001");
    assert!(!expert.available);
    assert_eq!(expert.current_task, Some(task_id.clone()));

    let task = &queue_tasks(&state, &port_key())[0];
    assert_eq!(task.maintainer, Some(expert.id.clone()));
    assert_eq!(task.status, TaskStatus::Ready);
}

#[test]
fn busy_maintainers_are_skipped() {
    let content = base_content();
    let mut state = base_state();

    // First task takes the expert; the second falls to the next best match.
    overvoltage_task(&mut state, &content);
    overvoltage_task(&mut state, &content);

    assert!(!state.maintainers[0].available);
    assert!(!state.maintainers[1].available);
    let tasks = queue_tasks(&state, &port_key());
    assert_eq!(tasks[1].maintainer.as_ref().map(|m| m.0.as_str()), Some("M002"));
}

#[test]
fn score_ties_break_toward_earlier_roster_entry() {
    let content = base_content();
    let mut state = base_state();

    // Flatten the roster so the first two maintainers score identically.
    state.maintainers[0].level = SkillLevel::Intermediate;
    state.maintainers[0].skills = vec![FaultCategory::Power];
    state.maintainers[1].skills = vec![FaultCategory::Power];

    let report = diagnose_sample(&mut state, &content, &overvoltage_telemetry());
    handle_fault(&mut state, &content, &station(), &port(), &report).unwrap();

    assert!(!state.maintainers[0].available, "earlier entry wins the tie");
    assert!(state.maintainers[1].available);
}

#[test]
fn exhausted_roster_fails_cleanly() {
    let content = base_content();
    let mut state = base_state();
    for m in &mut state.maintainers {
        m.available = false;
    }

    let report = diagnose_sample(&mut state, &content, &overvoltage_telemetry());
    let err = handle_fault(&mut state, &content, &station(), &port(), &report);

    assert!(matches!(err, Err(OpsError::NoAvailableMaintainer)));
    // The aborted task is removed again: no residue in the queue.
    assert!(state
        .queues
        .get(&port_key())
        .is_none_or(|q| q.is_empty()));
}

#[test]
fn completed_task_frees_its_maintainer() {
    let content = base_content();
    let mut state = base_state();

    let task_id = overvoltage_task(&mut state, &content);
    run_ticks(&mut state, &content, 150);

    let expert = &state.maintainers[0];
    assert!(expert.available);
    assert_eq!(expert.current_task, None);
    let done = &state.task_history[&port_key()][0];
    assert_eq!(done.id, task_id);
    assert_eq!(done.status, TaskStatus::Completed);
}
