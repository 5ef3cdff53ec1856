//! Telemetry intake and preprocessing.
//!
//! Raw samples arrive from an external monitoring collaborator and are never
//! mutated; preprocessing produces an augmented copy with normalized values
//! and extracted features.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Constants, OpsError, Trend};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f32),
    Text(String),
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f32> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Number(_) => None,
            FieldValue::Text(s) => Some(s),
        }
    }
}

/// One telemetry snapshot for a single port: named instantaneous fields plus
/// short histories backing the statistical and pattern methods.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub fields: HashMap<String, FieldValue>,
    pub voltage_history: Vec<f32>,
    pub current_history: Vec<f32>,
    pub temperature_history: Vec<f32>,
}

impl TelemetrySample {
    pub fn number(&self, field: &str) -> Option<f32> {
        self.fields.get(field).and_then(FieldValue::as_number)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(FieldValue::as_text)
    }
}

/// Per-history slope and variance, computed once during preprocessing.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SeriesFeatures {
    pub mean: f32,
    pub variance: f32,
    pub slope: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Features {
    pub voltage: SeriesFeatures,
    pub current: SeriesFeatures,
    pub temperature: SeriesFeatures,
}

/// The raw sample plus derived values. The diagnosis methods read this; the
/// raw sample inside is shared read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AugmentedTelemetry {
    pub sample: TelemetrySample,
    /// Voltage/current fields divided by their rated values.
    pub normalized: HashMap<String, f32>,
    pub features: Features,
}

/// Validate and augment a sample. Fails with `Validation` on NaN or
/// non-finite values; the input is copied, never mutated.
pub fn preprocess(
    sample: &TelemetrySample,
    constants: &Constants,
) -> Result<AugmentedTelemetry, OpsError> {
    validate(sample)?;

    let mut normalized = HashMap::new();
    if let Some(v) = sample.number("output_voltage") {
        normalized.insert("output_voltage".to_string(), v / constants.rated_voltage);
    }
    if let Some(i) = sample.number("output_current") {
        normalized.insert("output_current".to_string(), i / constants.rated_current);
    }

    let features = Features {
        voltage: series_features(&sample.voltage_history),
        current: series_features(&sample.current_history),
        temperature: series_features(&sample.temperature_history),
    };

    Ok(AugmentedTelemetry {
        sample: sample.clone(),
        normalized,
        features,
    })
}

fn validate(sample: &TelemetrySample) -> Result<(), OpsError> {
    for (name, value) in &sample.fields {
        if let FieldValue::Number(n) = value {
            if !n.is_finite() {
                return Err(OpsError::Validation(format!(
                    "field '{name}' is not finite"
                )));
            }
        }
    }
    for (name, series) in [
        ("voltage_history", &sample.voltage_history),
        ("current_history", &sample.current_history),
        ("temperature_history", &sample.temperature_history),
    ] {
        if series.iter().any(|v| !v.is_finite()) {
            return Err(OpsError::Validation(format!(
                "series '{name}' contains a non-finite value"
            )));
        }
    }
    Ok(())
}

pub(crate) fn series_features(series: &[f32]) -> SeriesFeatures {
    if series.is_empty() {
        return SeriesFeatures::default();
    }
    let n = series.len() as f32;
    let mean = series.iter().sum::<f32>() / n;
    let variance = series.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
    SeriesFeatures {
        mean,
        variance,
        slope: least_squares_slope(series),
    }
}

/// Least-squares slope over sample index. Zero for fewer than two points.
fn least_squares_slope(series: &[f32]) -> f32 {
    if series.len() < 2 {
        return 0.0;
    }
    let n = series.len() as f32;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = series.iter().sum::<f32>() / n;
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, y) in series.iter().enumerate() {
        let dx = i as f32 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Classify a slope into a trend with a dead band around zero.
pub(crate) fn classify_trend(slope: f32, dead_band: f32) -> Trend {
    if slope > dead_band {
        Trend::Positive
    } else if slope < -dead_band {
        Trend::Negative
    } else {
        Trend::Stable
    }
}

/// z-score of the latest sample against the rest of the series. Zero when
/// the series is too short or flat.
pub(crate) fn latest_z_score(series: &[f32]) -> f32 {
    let Some((&latest, history)) = series.split_last() else {
        return 0.0;
    };
    if history.len() < 2 {
        return 0.0;
    }
    let stats = series_features(history);
    let std_dev = stats.variance.sqrt();
    if std_dev <= f32::EPSILON {
        return 0.0;
    }
    (latest - stats.mean) / std_dev
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slope_of_rising_series_is_positive() {
        let slope = least_squares_slope(&[1.0, 2.0, 3.0, 4.0]);
        assert!((slope - 1.0).abs() < 1e-5);
    }

    #[test]
    fn slope_of_flat_series_is_zero() {
        assert!(least_squares_slope(&[5.0, 5.0, 5.0]).abs() < 1e-6);
        assert!(least_squares_slope(&[5.0]).abs() < 1e-6);
    }

    #[test]
    fn trend_dead_band_reports_stable() {
        assert_eq!(classify_trend(0.005, 0.01), Trend::Stable);
        assert_eq!(classify_trend(0.02, 0.01), Trend::Positive);
        assert_eq!(classify_trend(-0.02, 0.01), Trend::Negative);
    }

    #[test]
    fn z_score_flags_outlier_last_sample() {
        let series = [220.0, 221.0, 219.0, 220.0, 260.0];
        assert!(latest_z_score(&series) > 3.0);
    }

    #[test]
    fn nan_field_fails_validation() {
        let mut sample = TelemetrySample::default();
        sample
            .fields
            .insert("output_voltage".to_string(), FieldValue::Number(f32::NAN));
        let err = validate(&sample).unwrap_err();
        assert!(matches!(err, OpsError::Validation(_)));
    }
}
