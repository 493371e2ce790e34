//! Confidence-gated decision policy: argmax versus per-class thresholds.

use crate::distribution::ProbabilityDistribution;
use crate::thresholds::ThresholdTable;

/// The "act" outcome: apply `class_name` as a label and say so in a comment.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub class_name: String,
    pub probability: f64,
}

/// Selects the most probable class and compares it against its threshold.
/// Returns `None` (stay silent) when the maximum falls short or the
/// distribution is empty. Pure; ties resolve to the first class in key
/// order via [`ProbabilityDistribution::argmax`].
pub fn decide(
    distribution: &ProbabilityDistribution,
    thresholds: &ThresholdTable,
) -> Option<Decision> {
    let (class_name, probability) = distribution.argmax()?;
    if probability < thresholds.threshold_for(class_name) {
        return None;
    }
    Some(Decision {
        class_name: class_name.to_string(),
        probability,
    })
}
