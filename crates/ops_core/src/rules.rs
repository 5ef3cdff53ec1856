//! Fault rules: named predicate sets over telemetry fields.
//!
//! Rules are data, defined in content at process start and grouped by
//! category. A rule fires only when every one of its field predicates holds.

use serde::{Deserialize, Serialize};

use crate::telemetry::TelemetrySample;
use crate::{Constants, FaultCategory, RuleId, Severity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultRule {
    pub id: RuleId,
    pub name: String,
    pub severity: Severity,
    pub category: FaultCategory,
    pub conditions: Vec<FieldCondition>,
    pub suggested_actions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldCondition {
    pub field: String,
    pub predicate: Predicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RatedQuantity {
    Voltage,
    Current,
}

impl RatedQuantity {
    fn value(self, constants: &Constants) -> f32 {
        match self {
            RatedQuantity::Voltage => constants.rated_voltage,
            RatedQuantity::Current => constants.rated_current,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Predicate {
    /// value > factor × rated quantity.
    AboveRated { rated: RatedQuantity, factor: f32 },
    /// value < factor × rated quantity.
    BelowRated { rated: RatedQuantity, factor: f32 },
    Above { threshold: f32 },
    AtLeast { threshold: f32 },
    Equals { text: String },
    NotEquals { text: String },
}

impl Predicate {
    /// Evaluate against one field value. Returns `None` when the predicate
    /// does not hold (or the field is missing / of the wrong kind), or
    /// `Some(margin)` where `margin >= 0` measures how far past the
    /// threshold the value lies, relative to the threshold. Textual
    /// predicates carry no degree and report margin 0.
    pub fn margin(&self, sample: &TelemetrySample, field: &str, constants: &Constants) -> Option<f32> {
        match self {
            Predicate::AboveRated { rated, factor } => {
                let threshold = factor * rated.value(constants);
                numeric_margin(sample.number(field)?, threshold, Direction::Above)
            }
            Predicate::BelowRated { rated, factor } => {
                let threshold = factor * rated.value(constants);
                numeric_margin(sample.number(field)?, threshold, Direction::Below)
            }
            Predicate::Above { threshold } => {
                numeric_margin(sample.number(field)?, *threshold, Direction::Above)
            }
            Predicate::AtLeast { threshold } => {
                let value = sample.number(field)?;
                if value >= *threshold {
                    Some(relative_excess(value - threshold, *threshold))
                } else {
                    None
                }
            }
            Predicate::Equals { text } => (sample.text(field)? == text).then_some(0.0),
            Predicate::NotEquals { text } => (sample.text(field)? != text).then_some(0.0),
        }
    }
}

enum Direction {
    Above,
    Below,
}

fn numeric_margin(value: f32, threshold: f32, direction: Direction) -> Option<f32> {
    let excess = match direction {
        Direction::Above => value - threshold,
        Direction::Below => threshold - value,
    };
    if excess > 0.0 {
        Some(relative_excess(excess, threshold))
    } else {
        None
    }
}

fn relative_excess(excess: f32, threshold: f32) -> f32 {
    excess / threshold.abs().max(1.0)
}

impl FaultRule {
    /// All conditions must hold (logical AND). Returns the per-condition
    /// margins when the rule fires.
    pub fn evaluate(&self, sample: &TelemetrySample, constants: &Constants) -> Option<Vec<f32>> {
        self.conditions
            .iter()
            .map(|c| c.predicate.margin(sample, &c.field, constants))
            .collect()
    }
}

/// Map the mean degree-of-violation into a confidence in [0.6, 0.95).
/// Monotonic in the margin, saturating; a rule that barely fires reports
/// 0.6, gross violations approach 0.95.
pub fn rule_confidence(margins: &[f32]) -> f32 {
    if margins.is_empty() {
        return 0.6;
    }
    let mean = margins.iter().sum::<f32>() / margins.len() as f32;
    0.6 + 0.35 * (mean / (mean + 0.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_monotonic_in_margin() {
        let low = rule_confidence(&[0.05]);
        let mid = rule_confidence(&[0.2]);
        let high = rule_confidence(&[2.0]);
        assert!(low < mid && mid < high);
        assert!((0.6..0.95).contains(&low));
        assert!(high < 0.95);
    }

    #[test]
    fn zero_margin_gives_floor_confidence() {
        assert!((rule_confidence(&[0.0, 0.0]) - 0.6).abs() < 1e-6);
    }
}
