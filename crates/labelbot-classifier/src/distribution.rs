//! Ordered class-name to probability mapping produced by the classifier.

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Probabilities keyed by class name, preserving the classifier's class
/// order. Values are independent confidences and need not sum to 1.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProbabilityDistribution {
    entries: Vec<(String, f64)>,
}

impl ProbabilityDistribution {
    pub fn new(entries: Vec<(String, f64)>) -> Self {
        Self { entries }
    }

    /// Zips class names with model scores. Extra scores beyond the class
    /// list (or vice versa) are not tolerated by the adapter, which checks
    /// lengths before calling this.
    pub fn from_aligned(class_names: &[String], probabilities: &[f64]) -> Self {
        Self {
            entries: class_names
                .iter()
                .cloned()
                .zip(probabilities.iter().copied())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, class_name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(name, _)| name == class_name)
            .map(|(_, probability)| *probability)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries
            .iter()
            .map(|(name, probability)| (name.as_str(), *probability))
    }

    /// Highest-probability entry. Exact ties resolve to the first class in
    /// key order so repeated runs over the same distribution agree.
    pub fn argmax(&self) -> Option<(&str, f64)> {
        let mut best: Option<(&str, f64)> = None;
        for (name, probability) in self.iter() {
            match best {
                Some((_, best_probability)) if probability <= best_probability => {}
                _ => best = Some((name, probability)),
            }
        }
        best
    }

    /// JSON object snapshot in key order, persisted alongside each
    /// prediction for audit.
    pub fn snapshot_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Serialize for ProbabilityDistribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, probability) in &self.entries {
            map.serialize_entry(name, probability)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::ProbabilityDistribution;

    fn sample() -> ProbabilityDistribution {
        ProbabilityDistribution::new(vec![
            ("bug".to_string(), 0.08),
            ("feature".to_string(), 0.64),
            ("question".to_string(), 0.28),
        ])
    }

    #[test]
    fn unit_get_returns_probability_for_known_class_only() {
        let distribution = sample();
        assert_eq!(distribution.get("feature"), Some(0.64));
        assert_eq!(distribution.get("enhancement"), None);
    }

    #[test]
    fn unit_argmax_selects_single_global_maximum() {
        let distribution = sample();
        assert_eq!(distribution.argmax(), Some(("feature", 0.64)));
    }

    #[test]
    fn unit_argmax_is_none_for_empty_distribution() {
        assert_eq!(ProbabilityDistribution::default().argmax(), None);
    }

    #[test]
    fn regression_argmax_breaks_exact_ties_by_key_order() {
        let distribution = ProbabilityDistribution::new(vec![
            ("bug".to_string(), 0.5),
            ("feature".to_string(), 0.5),
            ("question".to_string(), 0.1),
        ]);
        assert_eq!(distribution.argmax(), Some(("bug", 0.5)));
    }

    #[test]
    fn functional_snapshot_json_preserves_key_order() {
        let snapshot = ProbabilityDistribution::new(vec![
            ("question".to_string(), 0.1),
            ("bug".to_string(), 0.2),
        ])
        .snapshot_json();
        assert_eq!(snapshot, r#"{"question":0.1,"bug":0.2}"#);
    }

    #[test]
    fn functional_from_aligned_zips_names_with_scores() {
        let classes = vec!["bug".to_string(), "feature".to_string()];
        let distribution = ProbabilityDistribution::from_aligned(&classes, &[0.3, 0.7]);
        assert_eq!(distribution.len(), 2);
        assert_eq!(distribution.get("feature"), Some(0.7));
    }
}
