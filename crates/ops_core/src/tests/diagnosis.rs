use super::*;
use crate::telemetry::FieldValue;

#[test]
fn nominal_telemetry_yields_clean_report() {
    let content = base_content();
    let mut state = base_state();

    let report = diagnose_sample(&mut state, &content, &nominal_telemetry());

    assert!(report.faults.is_empty(), "no faults on healthy telemetry");
    assert_eq!(report.overall_severity, Severity::Normal);
    assert!(report.confidence.abs() < f32::EPSILON);
    assert!(report.recommendations.is_empty());
    assert_eq!(report.summary, "no anomalies detected");
    // A clean report is still backed by history, so reliability stays high.
    assert!(report.reliability > 0.5);
}

#[test]
fn overvoltage_fires_rule_and_pattern_as_one_fault() {
    let content = base_content();
    let mut state = base_state();

    let report = diagnose_sample(&mut state, &content, &overvoltage_telemetry());

    // Rule P001 and the overvoltage signature both report the same fault
    // name; fusion merges them into a single entry.
    assert_eq!(report.faults.len(), 1);
    let fault = &report.faults[0];
    assert_eq!(fault.name, "output overvoltage");
    assert_eq!(fault.category, FaultCategory::Power);
    assert_eq!(fault.severity, Severity::Critical);
    assert_eq!(report.overall_severity, Severity::Critical);

    // The pattern match is exact (similarity 1.0), so the fused confidence
    // lands above the rule method's own confidence.
    assert!(fault.confidence > 0.79, "got {}", fault.confidence);
    assert!(fault.confidence < 1.0);
    assert_eq!(report.recommendations.len(), 1);
    assert_eq!(report.recommendations[0].fault, "output overvoltage");
}

#[test]
fn two_agreeing_methods_raise_reliability() {
    let content = base_content();
    let mut state = base_state();

    let clean = diagnose_sample(&mut state, &content, &nominal_telemetry());
    let faulty = diagnose_sample(&mut state, &content, &overvoltage_telemetry());
    let single = diagnose_sample(&mut state, &content, &link_down_telemetry());

    assert!(faulty.reliability > single.reliability);
    assert!((0.05..=1.0).contains(&faulty.reliability));
    assert!((0.05..=1.0).contains(&clean.reliability));
}

#[test]
fn link_down_is_a_single_warning() {
    let content = base_content();
    let mut state = base_state();

    let report = diagnose_sample(&mut state, &content, &link_down_telemetry());

    assert_eq!(report.faults.len(), 1);
    assert_eq!(report.faults[0].name, "communication link down");
    assert_eq!(report.overall_severity, Severity::Warning);
    // Textual predicates carry no degree, so rule confidence sits at the floor.
    assert!((report.confidence - 0.6).abs() < 1e-4);
}

#[test]
fn diagnosis_is_deterministic() {
    let content = base_content();
    let mut state_a = base_state();
    let mut state_b = base_state();

    let a = diagnose_sample(&mut state_a, &content, &overvoltage_telemetry());
    let b = diagnose_sample(&mut state_b, &content, &overvoltage_telemetry());

    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn non_finite_telemetry_is_rejected_without_trace() {
    let content = base_content();
    let mut state = base_state();

    let mut sample = nominal_telemetry();
    sample
        .fields
        .insert("output_voltage".to_string(), FieldValue::Number(f32::NAN));

    let err = diagnose(&mut state, &content, &station(), &port(), &sample);
    assert!(matches!(err, Err(OpsError::Validation(_))));
    // A failed diagnosis leaves no partial report behind.
    assert!(state.diagnosis_history.is_empty());
    assert_eq!(state.counters.next_event_id, 0);
}

#[test]
fn unknown_station_and_port_are_rejected() {
    let content = base_content();
    let mut state = base_state();
    let sample = nominal_telemetry();

    let bad_station = StationId("CS999".to_string());
    assert!(matches!(
        diagnose(&mut state, &content, &bad_station, &port(), &sample),
        Err(OpsError::UnknownStation(_))
    ));

    let bad_port = PortId("P99".to_string());
    assert!(matches!(
        diagnose(&mut state, &content, &station(), &bad_port, &sample),
        Err(OpsError::UnknownPort { .. })
    ));
}

#[test]
fn history_is_bounded_and_evicts_oldest_first() {
    let mut content = base_content();
    content.constants.diagnosis_history_cap = 3;
    let mut state = base_state();

    for _ in 0..5 {
        diagnose_sample(&mut state, &content, &nominal_telemetry());
    }

    let history = &state.diagnosis_history[&port_key()];
    assert_eq!(history.len(), 3);
    let ids: Vec<&str> = history.iter().map(|r| r.id.0.as_str()).collect();
    assert_eq!(ids, ["diag_000002", "diag_000003", "diag_000004"]);
}

/// Same eviction behavior at the shipped cap of 100: one diagnosis past the
/// cap retains exactly 100 reports and drops only the oldest.
#[test]
fn history_eviction_holds_at_default_cap() {
    let content = base_content();
    let mut state = base_state();
    assert_eq!(content.constants.diagnosis_history_cap, 100);

    for _ in 0..101 {
        diagnose_sample(&mut state, &content, &nominal_telemetry());
    }

    let history = &state.diagnosis_history[&port_key()];
    assert_eq!(history.len(), 100);
    assert_eq!(history.front().map(|r| r.id.0.as_str()), Some("diag_000001"));
    assert_eq!(history.back().map(|r| r.id.0.as_str()), Some("diag_000100"));
}

#[test]
fn histories_are_partitioned_per_port() {
    let content = base_content();
    let mut state = base_state();

    diagnose_sample(&mut state, &content, &nominal_telemetry());
    let other = PortId("P02".to_string());
    diagnose(&mut state, &content, &station(), &other, &nominal_telemetry()).unwrap();

    assert_eq!(state.diagnosis_history.len(), 2);
    assert_eq!(state.diagnosis_history[&port_key()].len(), 1);
    assert_eq!(
        state.diagnosis_history[&PortKey::new(&station(), &other)].len(),
        1
    );
}

#[test]
fn diagnosis_emits_completion_event() {
    let content = base_content();
    let mut state = base_state();

    let (report, events) = diagnose(
        &mut state,
        &content,
        &station(),
        &port(),
        &overvoltage_telemetry(),
    )
    .unwrap();

    assert_eq!(events.len(), 1);
    match &events[0].event {
        Event::DiagnosisCompleted {
            report_id,
            severity,
            fault_count,
            ..
        } => {
            assert_eq!(report_id, &report.id);
            assert_eq!(*severity, Severity::Critical);
            assert_eq!(*fault_count, 1);
        }
        other => panic!("unexpected event {other:?}"),
    }
}
