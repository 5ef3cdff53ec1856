use crate::{
    FusedDiagnosisReport, HandlingPlan, OpsContent, PlanStep, StepKind,
};

/// Build the ordered remediation plan for a report.
///
/// Safety precautions are the two universal entries plus category-specific
/// additions. Per fault: one preparation step, one check step per suggested
/// check action (tools resolved through the keyword table), the category's
/// repair step, and a closing test step. Steps are renumbered into a single
/// ascending sequence across all faults.
pub(super) fn generate(report: &FusedDiagnosisReport, content: &OpsContent) -> HandlingPlan {
    let constants = &content.constants;

    let mut safety_precautions = content.safety.universal.clone();
    let mut seen_categories = Vec::new();
    for fault in &report.faults {
        if seen_categories.contains(&fault.category) {
            continue;
        }
        seen_categories.push(fault.category);
        if let Some(extra) = content.safety.by_category.get(&fault.category) {
            safety_precautions.extend(extra.iter().cloned());
        }
    }

    let mut steps = Vec::new();
    let mut sequence = 1u32;
    let mut push = |steps: &mut Vec<PlanStep>, mut step: PlanStep| {
        step.sequence = sequence;
        sequence += 1;
        steps.push(step);
    };

    for fault in &report.faults {
        push(
            &mut steps,
            PlanStep {
                sequence: 0,
                kind: StepKind::Preparation,
                description: "verify tools and spare parts".to_string(),
                estimated_minutes: constants.prep_step_minutes,
                tools: vec![constants.default_tool.clone()],
                parts: Vec::new(),
            },
        );

        let checks = report
            .recommendations
            .iter()
            .find(|r| r.fault == fault.name)
            .map(|r| r.checks.as_slice())
            .unwrap_or_default();
        for action in checks {
            push(
                &mut steps,
                PlanStep {
                    sequence: 0,
                    kind: StepKind::Check,
                    description: action.clone(),
                    estimated_minutes: constants.check_step_minutes,
                    tools: tools_for(action, content),
                    parts: Vec::new(),
                },
            );
        }

        if let Some(repair) = content.repair_steps.get(&fault.category) {
            push(
                &mut steps,
                PlanStep {
                    sequence: 0,
                    kind: StepKind::Repair,
                    description: repair.description.clone(),
                    estimated_minutes: repair.estimated_minutes,
                    tools: repair.tools.clone(),
                    parts: repair.parts.clone(),
                },
            );
        }

        push(
            &mut steps,
            PlanStep {
                sequence: 0,
                kind: StepKind::Test,
                description: "functional test and verification".to_string(),
                estimated_minutes: constants.test_step_minutes,
                tools: vec!["test instrument".to_string()],
                parts: Vec::new(),
            },
        );
    }

    steps.sort_by_key(|s| s.sequence);

    let estimated_minutes = steps.iter().map(|s| s.estimated_minutes).sum();
    let mut required_tools: Vec<String> = steps.iter().flat_map(|s| s.tools.clone()).collect();
    required_tools.sort();
    required_tools.dedup();

    HandlingPlan {
        steps,
        safety_precautions,
        required_tools,
        estimated_minutes,
    }
}

/// Keyword lookup into the tool table; unmatched actions get the default
/// toolkit.
fn tools_for(action: &str, content: &OpsContent) -> Vec<String> {
    for rule in &content.tool_rules {
        if action.contains(rule.keyword.as_str()) {
            return rule.tools.clone();
        }
    }
    vec![content.constants.default_tool.clone()]
}
