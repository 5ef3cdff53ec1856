use crate::telemetry::AugmentedTelemetry;
use crate::{Fault, MethodResult, OpsContent};

/// Number of dimensions in the telemetry feature vector. Pattern signatures
/// must match; `ops_world::validate_content` enforces it.
pub const FEATURE_DIM: usize = 6;

/// Pattern method: compare the telemetry feature vector against the library
/// of known fault signatures and retain matches above the similarity
/// threshold. Match similarity doubles as confidence.
pub(super) fn run(augmented: &AugmentedTelemetry, content: &OpsContent) -> MethodResult {
    let features = feature_vector(augmented, content);
    let threshold = content.constants.pattern_similarity_threshold;

    let faults = content
        .patterns
        .iter()
        .filter(|p| p.signature.len() == FEATURE_DIM)
        .filter_map(|pattern| {
            let sim = similarity(&features, &pattern.signature);
            (sim > threshold).then(|| Fault {
                name: pattern.name.clone(),
                category: pattern.category,
                severity: pattern.severity,
                confidence: sim,
            })
        })
        .collect();

    MethodResult { faults }
}

/// Normalised history means plus normalised slopes. Voltage and current
/// relative to rated, temperature scaled to roughly unit range.
pub fn feature_vector(augmented: &AugmentedTelemetry, content: &OpsContent) -> [f32; FEATURE_DIM] {
    let c = &content.constants;
    let f = &augmented.features;
    [
        f.voltage.mean / c.rated_voltage,
        f.current.mean / c.rated_current,
        f.temperature.mean / 100.0,
        f.voltage.slope / c.rated_voltage,
        f.current.slope / c.rated_current,
        f.temperature.slope / 100.0,
    ]
}

/// Inverse-distance similarity in [0, 1]: 1 at an exact match, falling off
/// with euclidean distance. `sim > 0.8` corresponds to distance < 1/16,
/// tight enough that signatures of distinct faults never cross-match.
fn similarity(a: &[f32], b: &[f32]) -> f32 {
    let dist = a
        .iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt();
    1.0 / (1.0 + 4.0 * dist)
}
