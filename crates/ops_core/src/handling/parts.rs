use std::collections::HashMap;

use crate::{FusedDiagnosisReport, OpsContent, PartId, RequiredPart, SparePart};

/// Match each fault against the keyword→part table for its category and
/// annotate the result with live stock. Nothing is reserved here; stock is
/// only consumed when the task completes.
pub(super) fn resolve(
    report: &FusedDiagnosisReport,
    content: &OpsContent,
    parts: &HashMap<PartId, SparePart>,
) -> Vec<RequiredPart> {
    let mut required = Vec::new();

    for fault in &report.faults {
        for rule in content
            .part_rules
            .iter()
            .filter(|r| r.category == fault.category)
        {
            let matches = rule
                .keywords
                .iter()
                .any(|keyword| fault.name.contains(keyword.as_str()));
            if !matches {
                continue;
            }
            let (name, stock) = parts
                .get(&rule.part_id)
                .map_or_else(|| (rule.part_id.0.clone(), 0), |p| (p.name.clone(), p.stock));
            required.push(RequiredPart {
                part_id: rule.part_id.clone(),
                name,
                quantity: rule.quantity,
                stock,
                available: stock >= rule.quantity,
            });
        }
    }

    required
}
