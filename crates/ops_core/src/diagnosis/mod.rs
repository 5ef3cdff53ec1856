//! Fault diagnosis: preprocess → three independent methods → fusion →
//! reliability → report assembly → bounded history.
//!
//! The three methods share no mutable state and only their outputs feed the
//! fusion step, so a multi-threaded port may run them in parallel and join
//! before fusing. Here they run sequentially.

mod fusion;
mod pattern;
mod rule_based;
mod statistical;

pub use pattern::{feature_vector, FEATURE_DIM};

use std::collections::VecDeque;

use crate::telemetry::{preprocess, AugmentedTelemetry, TelemetrySample};
use crate::{
    emit, Event, EventEnvelope, FusedDiagnosisReport, MethodResult, OpsContent, OpsError,
    OpsState, PortId, PortKey, Recommendation, ReportId, Severity, StationId,
};

/// Run a full diagnosis for one port.
///
/// Any failure aborts the whole call: no partial report, no history append.
/// Callers retry explicitly.
pub fn diagnose(
    state: &mut OpsState,
    content: &OpsContent,
    station: &StationId,
    port: &PortId,
    telemetry: &TelemetrySample,
) -> Result<(FusedDiagnosisReport, Vec<EventEnvelope>), OpsError> {
    let station_state = state
        .stations
        .get(station)
        .ok_or_else(|| OpsError::UnknownStation(station.clone()))?;
    if !station_state.ports.contains_key(port) {
        return Err(OpsError::UnknownPort {
            station: station.clone(),
            port: port.clone(),
        });
    }

    let augmented = preprocess(telemetry, &content.constants)?;

    let results = [
        rule_based::run(&augmented, content),
        statistical::run(&augmented, content),
        pattern::run(&augmented, content),
    ];

    let fused = fusion::fuse(&results, content.constants.method_weights);
    let reliability = assess_reliability(&results, &augmented, &content.constants);

    let report_id = ReportId(format!("diag_{:06}", state.counters.next_report_id));
    state.counters.next_report_id += 1;

    let report = FusedDiagnosisReport {
        id: report_id.clone(),
        station: station.clone(),
        port: port.clone(),
        tick: state.meta.tick,
        summary: summarize(&fused),
        recommendations: recommend(&fused, content),
        faults: fused.faults,
        overall_severity: fused.severity,
        confidence: fused.confidence,
        reliability,
    };

    push_history(state, PortKey::new(station, port), report.clone(), content);

    let event = emit(
        &mut state.counters,
        state.meta.tick,
        Event::DiagnosisCompleted {
            report_id,
            station: station.clone(),
            port: port.clone(),
            severity: report.overall_severity,
            confidence: report.confidence,
            fault_count: report.faults.len(),
        },
    );

    Ok((report, vec![event]))
}

/// Trust in the fused result as a whole. Rises with the number of methods
/// that reported, with cross-method agreement on fault names, and with the
/// amount of history backing the statistics; severity disagreement between
/// methods on the same fault pulls it down.
fn assess_reliability(
    results: &[MethodResult; 3],
    augmented: &AugmentedTelemetry,
    constants: &crate::Constants,
) -> f32 {
    let window = constants.reliability_sample_window.max(1);
    let sample_len = (augmented.sample.voltage_history.len()
        + augmented.sample.current_history.len()
        + augmented.sample.temperature_history.len())
        / 3;
    let sample_term = (sample_len as f32 / window as f32).min(1.0);

    let reporting = results.iter().filter(|r| !r.faults.is_empty()).count();
    if reporting == 0 {
        return 0.5 + 0.5 * sample_term;
    }

    let mut names: Vec<&str> = results
        .iter()
        .flat_map(|r| r.faults.iter().map(|f| f.name.as_str()))
        .collect();
    names.sort_unstable();
    names.dedup();

    let mut agreeing = 0usize;
    let mut conflicting = 0usize;
    for name in &names {
        let severities: Vec<Severity> = results
            .iter()
            .flat_map(|r| r.faults.iter())
            .filter(|f| f.name == *name)
            .map(|f| f.severity)
            .collect();
        if severities.len() > 1 {
            agreeing += 1;
            if severities.windows(2).any(|w| w[0] != w[1]) {
                conflicting += 1;
            }
        }
    }

    let agreement = agreeing as f32 / names.len() as f32;
    let penalty = 0.15 * conflicting as f32 / names.len() as f32;

    (0.35 * reporting as f32 / 3.0 + 0.35 * agreement + 0.3 * sample_term - penalty)
        .clamp(0.05, 1.0)
}

fn summarize(fused: &fusion::FusedOutcome) -> String {
    if fused.faults.is_empty() {
        "no anomalies detected".to_string()
    } else {
        format!(
            "{} fault(s) detected, worst severity {}",
            fused.faults.len(),
            severity_label(fused.severity),
        )
    }
}

/// Checks come from the fired rule's suggested actions when the fault maps
/// back to a rule; statistical and pattern findings fall back to the
/// category's generic check list.
fn recommend(fused: &fusion::FusedOutcome, content: &OpsContent) -> Vec<Recommendation> {
    fused
        .faults
        .iter()
        .filter_map(|fault| {
            let actions = content.actions.get(&fault.category)?;
            let checks = content
                .rules
                .get(&fault.category)
                .and_then(|rules| rules.iter().find(|r| r.name == fault.name))
                .map_or_else(|| actions.checks.clone(), |r| r.suggested_actions.clone());
            Some(Recommendation {
                fault: fault.name.clone(),
                checks,
                repairs: actions.repairs.clone(),
                preventive: actions.preventive.clone(),
            })
        })
        .collect()
}

fn push_history(
    state: &mut OpsState,
    key: PortKey,
    report: FusedDiagnosisReport,
    content: &OpsContent,
) {
    let history = state.diagnosis_history.entry(key).or_insert_with(VecDeque::new);
    history.push_back(report);
    while history.len() > content.constants.diagnosis_history_cap {
        history.pop_front();
    }
}

pub(crate) fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Normal => "normal",
        Severity::Notice => "notice",
        Severity::Warning => "warning",
        Severity::Critical => "critical",
    }
}
