use std::collections::BTreeSet;

use crate::{FaultCategory, Maintainer, MaintainerId, OpsError, OpsState, Severity, SkillLevel, TaskId};

/// Pick the best-scoring available maintainer and mark them busy.
///
/// Ties break toward the earlier roster entry: a later candidate replaces
/// the incumbent only with a strictly higher score.
pub(super) fn assign(
    state: &mut OpsState,
    required: &BTreeSet<FaultCategory>,
    severity: Severity,
    task_id: &TaskId,
) -> Result<MaintainerId, OpsError> {
    let mut best: Option<(f32, usize)> = None;
    for (idx, maintainer) in state.maintainers.iter().enumerate() {
        if !maintainer.available {
            continue;
        }
        let score = maintainer_score(maintainer, required, severity);
        if best.is_none_or(|(best_score, _)| score > best_score) {
            best = Some((score, idx));
        }
    }

    let (_, idx) = best.ok_or(OpsError::NoAvailableMaintainer)?;
    let selected = &mut state.maintainers[idx];
    selected.available = false;
    selected.current_task = Some(task_id.clone());
    Ok(selected.id.clone())
}

/// Skill-match share (worth 50 points) plus level weight, plus a bonus for
/// putting an expert on a critical task.
pub fn maintainer_score(
    maintainer: &Maintainer,
    required: &BTreeSet<FaultCategory>,
    severity: Severity,
) -> f32 {
    let matched = maintainer
        .skills
        .iter()
        .filter(|skill| required.contains(skill))
        .count();
    let mut score = 50.0 * matched as f32 / required.len().max(1) as f32;

    score += match maintainer.level {
        SkillLevel::Expert => 30.0,
        SkillLevel::Intermediate => 20.0,
        SkillLevel::Basic => 10.0,
    };

    if severity == Severity::Critical && maintainer.level == SkillLevel::Expert {
        score += 20.0;
    }

    score
}
