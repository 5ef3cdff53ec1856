use crate::{Fault, MethodResult, Severity};

/// Intermediate fused outcome before report assembly.
#[derive(Debug, Clone)]
pub struct FusedOutcome {
    pub faults: Vec<Fault>,
    pub confidence: f32,
    pub severity: Severity,
}

/// Weighted consensus over the three method outputs, in method order
/// rule-based / statistical / pattern.
///
/// Per fault name the confidence is the weighted mean across contributing
/// methods; a fault unique to one method keeps that method's confidence,
/// a fault seen by several blends them by weight. Severity combines by
/// taking the more severe of the two. Overall confidence is the arithmetic
/// mean across retained faults (0.0 when none), overall severity the
/// maximum (`Normal` when none).
pub fn fuse(results: &[MethodResult; 3], weights: [f32; 3]) -> FusedOutcome {
    struct Acc {
        fault: Fault,
        weighted_sum: f32,
        weight_total: f32,
    }

    let mut merged: Vec<Acc> = Vec::new();

    for (result, weight) in results.iter().zip(weights) {
        for fault in &result.faults {
            match merged.iter_mut().find(|a| a.fault.name == fault.name) {
                Some(acc) => {
                    acc.weighted_sum += fault.confidence * weight;
                    acc.weight_total += weight;
                    acc.fault.severity = acc.fault.severity.max(fault.severity);
                }
                None => merged.push(Acc {
                    fault: fault.clone(),
                    weighted_sum: fault.confidence * weight,
                    weight_total: weight,
                }),
            }
        }
    }

    let faults: Vec<Fault> = merged
        .into_iter()
        .map(|acc| Fault {
            confidence: acc.weighted_sum / acc.weight_total,
            ..acc.fault
        })
        .collect();

    let confidence = if faults.is_empty() {
        0.0
    } else {
        faults.iter().map(|f| f.confidence).sum::<f32>() / faults.len() as f32
    };
    let severity = faults
        .iter()
        .map(|f| f.severity)
        .max()
        .unwrap_or(Severity::Normal);

    FusedOutcome {
        faults,
        confidence,
        severity,
    }
}
