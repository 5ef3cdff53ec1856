use crate::rules::rule_confidence;
use crate::telemetry::AugmentedTelemetry;
use crate::{Fault, FaultCategory, MethodResult, OpsContent};

/// Rule-based method: every rule in every category is evaluated against the
/// instantaneous fields; a rule fires only when all its predicates hold.
pub(super) fn run(augmented: &AugmentedTelemetry, content: &OpsContent) -> MethodResult {
    let mut faults = Vec::new();

    // Fixed category order keeps the output deterministic across runs.
    for category in FaultCategory::ALL {
        let Some(rules) = content.rules.get(&category) else {
            continue;
        };
        for rule in rules {
            if let Some(margins) = rule.evaluate(&augmented.sample, &content.constants) {
                faults.push(Fault {
                    name: rule.name.clone(),
                    category: rule.category,
                    severity: rule.severity,
                    confidence: rule_confidence(&margins),
                });
            }
        }
    }

    MethodResult { faults }
}
