//! Per-class confidence thresholds with a default for unlisted classes.

use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThresholdError {
    #[error("threshold for '{class}' must be within [0, 1], got {value}")]
    OutOfRange { class: String, value: f64 },
}

/// Immutable threshold table. Classes absent from the overrides fall back
/// to the default threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdTable {
    default: f64,
    overrides: BTreeMap<String, f64>,
}

impl ThresholdTable {
    pub fn new(
        default: f64,
        overrides: impl IntoIterator<Item = (String, f64)>,
    ) -> Result<Self, ThresholdError> {
        validate_threshold("default", default)?;
        let mut table = BTreeMap::new();
        for (class, value) in overrides {
            validate_threshold(&class, value)?;
            table.insert(class, value);
        }
        Ok(Self {
            default,
            overrides: table,
        })
    }

    pub fn threshold_for(&self, class_name: &str) -> f64 {
        self.overrides
            .get(class_name)
            .copied()
            .unwrap_or(self.default)
    }

    pub fn default_threshold(&self) -> f64 {
        self.default
    }
}

impl Default for ThresholdTable {
    /// The production table: 0.6 for everything, 0.7 for `question`, which
    /// carries a higher false-positive cost.
    fn default() -> Self {
        Self::new(0.6, [("question".to_string(), 0.7)])
            .expect("builtin thresholds are within range")
    }
}

fn validate_threshold(class: &str, value: f64) -> Result<(), ThresholdError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ThresholdError::OutOfRange {
            class: class.to_string(),
            value,
        });
    }
    Ok(())
}
