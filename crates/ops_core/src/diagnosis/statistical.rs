use crate::telemetry::{classify_trend, latest_z_score, AugmentedTelemetry};
use crate::{Fault, FaultCategory, MethodResult, OpsContent, Severity, Trend};

/// Statistical method: z-score anomaly flags on the tracked histories plus
/// trend classification. Findings are produced only for an anomaly or a
/// trend moving in the metric's adverse direction; a clean sample yields an
/// empty result.
pub(super) fn run(augmented: &AugmentedTelemetry, content: &OpsContent) -> MethodResult {
    let constants = &content.constants;
    let mut faults = Vec::new();

    let metrics = [
        Metric {
            series: &augmented.sample.voltage_history,
            slope: augmented.features.voltage.slope,
            // Falling supply voltage is the adverse direction.
            adverse: Trend::Negative,
            anomaly_name: "output voltage instability",
            trend_name: "output voltage sagging",
            category: FaultCategory::Power,
        },
        Metric {
            series: &augmented.sample.current_history,
            slope: augmented.features.current.slope,
            adverse: Trend::Negative,
            anomaly_name: "output current instability",
            trend_name: "output current decay",
            category: FaultCategory::Power,
        },
        Metric {
            series: &augmented.sample.temperature_history,
            slope: augmented.features.temperature.slope,
            // Heat builds up; a rising temperature is the adverse direction.
            adverse: Trend::Positive,
            anomaly_name: "abnormal temperature excursion",
            trend_name: "sustained temperature rise",
            category: FaultCategory::Temperature,
        },
    ];

    for metric in metrics {
        let z = latest_z_score(metric.series);
        if z.abs() > constants.anomaly_z_threshold {
            faults.push(Fault {
                name: metric.anomaly_name.to_string(),
                category: metric.category,
                severity: Severity::Warning,
                confidence: anomaly_confidence(z),
            });
        }
        if classify_trend(metric.slope, constants.trend_dead_band) == metric.adverse {
            faults.push(Fault {
                name: metric.trend_name.to_string(),
                category: metric.category,
                severity: Severity::Notice,
                confidence: TREND_CONFIDENCE,
            });
        }
    }

    MethodResult { faults }
}

const TREND_CONFIDENCE: f32 = 0.55;

/// Grows with the z magnitude, capped below certainty.
fn anomaly_confidence(z: f32) -> f32 {
    (0.4 + 0.1 * z.abs()).min(0.9)
}

struct Metric<'a> {
    series: &'a [f32],
    slope: f32,
    adverse: Trend,
    anomaly_name: &'static str,
    trend_name: &'static str,
    category: FaultCategory,
}
