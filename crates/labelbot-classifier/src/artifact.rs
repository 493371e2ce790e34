//! JSON model artifact: vocabulary preprocessors and a linear sigmoid head.
//!
//! The artifact bundles everything the adapter needs to stand up a working
//! classifier without a native ML runtime: one vocabulary per text input
//! (body and title) and a per-class linear head over the concatenated
//! term-frequency vectors. Sigmoid activation keeps the outputs independent
//! confidences that need not sum to 1.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::labeler::{ClassificationError, IssueLabeler, IssueModel, TextPreprocessor};

pub const ARTIFACT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("unsupported artifact schema: expected {expected}, found {found}")]
    UnsupportedSchema { expected: u32, found: u32 },
    #[error("invalid model artifact: {0}")]
    Invalid(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelArtifact {
    schema_version: u32,
    class_names: Vec<String>,
    body_vocabulary: Vec<String>,
    title_vocabulary: Vec<String>,
    /// One row per class over `[body features ++ title features]`.
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
}

impl ModelArtifact {
    pub fn from_json(raw: &str) -> Result<Self, ArtifactError> {
        let artifact: Self = serde_json::from_str(raw)?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    fn validate(&self) -> Result<(), ArtifactError> {
        if self.schema_version != ARTIFACT_SCHEMA_VERSION {
            return Err(ArtifactError::UnsupportedSchema {
                expected: ARTIFACT_SCHEMA_VERSION,
                found: self.schema_version,
            });
        }
        if self.class_names.is_empty() {
            return Err(ArtifactError::Invalid("no class names".to_string()));
        }
        if self.weights.len() != self.class_names.len() {
            return Err(ArtifactError::Invalid(format!(
                "{} weight rows for {} classes",
                self.weights.len(),
                self.class_names.len()
            )));
        }
        if self.bias.len() != self.class_names.len() {
            return Err(ArtifactError::Invalid(format!(
                "{} bias values for {} classes",
                self.bias.len(),
                self.class_names.len()
            )));
        }
        let feature_count = self.body_vocabulary.len() + self.title_vocabulary.len();
        for (index, row) in self.weights.iter().enumerate() {
            if row.len() != feature_count {
                return Err(ArtifactError::Invalid(format!(
                    "weight row {} has {} values, expected {}",
                    index,
                    row.len(),
                    feature_count
                )));
            }
        }
        Ok(())
    }

    /// Consumes the artifact and wires up a ready-to-serve labeler.
    pub fn into_labeler(self) -> IssueLabeler {
        let body_preprocessor = VocabularyPreprocessor::new(&self.body_vocabulary);
        let title_preprocessor = VocabularyPreprocessor::new(&self.title_vocabulary);
        let model = LinearIssueModel {
            weights: self.weights,
            bias: self.bias,
            body_features: self.body_vocabulary.len(),
            title_features: self.title_vocabulary.len(),
        };
        IssueLabeler::new(
            Box::new(body_preprocessor),
            Box::new(title_preprocessor),
            Box::new(model),
            self.class_names,
        )
    }
}

/// Term-frequency vectorizer over a fixed vocabulary. Tokens are lowercased
/// alphanumeric runs; out-of-vocabulary tokens are dropped.
pub struct VocabularyPreprocessor {
    index: HashMap<String, usize>,
    dimensions: usize,
}

impl VocabularyPreprocessor {
    pub fn new(vocabulary: &[String]) -> Self {
        let index = vocabulary
            .iter()
            .enumerate()
            .map(|(position, token)| (token.to_ascii_lowercase(), position))
            .collect();
        Self {
            index,
            dimensions: vocabulary.len(),
        }
    }
}

impl TextPreprocessor for VocabularyPreprocessor {
    fn transform(&self, text: &str) -> Result<Vec<f32>, ClassificationError> {
        let mut features = vec![0.0f32; self.dimensions];
        for token in tokenize(text) {
            if let Some(position) = self.index.get(&token) {
                features[*position] += 1.0;
            }
        }
        Ok(features)
    }
}

/// Per-class dot product over concatenated body+title features, squashed
/// through a sigmoid.
pub struct LinearIssueModel {
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
    body_features: usize,
    title_features: usize,
}

impl IssueModel for LinearIssueModel {
    fn predict(&self, body: &[f32], title: &[f32]) -> Result<Vec<f32>, ClassificationError> {
        if body.len() != self.body_features || title.len() != self.title_features {
            return Err(ClassificationError::Predict(format!(
                "feature shape mismatch: got body={} title={}, expected body={} title={}",
                body.len(),
                title.len(),
                self.body_features,
                self.title_features
            )));
        }
        let mut scores = Vec::with_capacity(self.weights.len());
        for (row, bias) in self.weights.iter().zip(self.bias.iter()) {
            let mut activation = *bias;
            for (weight, feature) in row.iter().zip(body.iter().chain(title.iter())) {
                activation += weight * feature;
            }
            scores.push(sigmoid(activation));
        }
        Ok(scores)
    }
}

fn sigmoid(value: f32) -> f32 {
    1.0 / (1.0 + (-value).exp())
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::{ArtifactError, ModelArtifact, VocabularyPreprocessor};
    use crate::labeler::{IssueClassifier, TextPreprocessor};

    fn artifact_json() -> String {
        serde_json::json!({
            "schema_version": 1,
            "class_names": ["bug", "feature", "question"],
            "body_vocabulary": ["crash", "panic", "add", "how"],
            "title_vocabulary": ["error", "request", "question"],
            "weights": [
                [2.0, 2.0, -1.0, -1.0, 2.0, -1.0, -1.0],
                [-1.0, -1.0, 2.0, -1.0, -1.0, 2.0, -1.0],
                [-1.0, -1.0, -1.0, 2.0, -1.0, -1.0, 2.0]
            ],
            "bias": [-0.5, -0.5, -0.5]
        })
        .to_string()
    }

    #[test]
    fn functional_artifact_round_trips_into_working_labeler() {
        let labeler = ModelArtifact::from_json(&artifact_json())
            .unwrap()
            .into_labeler();
        let distribution = labeler
            .classify("error", "the app will crash and panic on startup")
            .unwrap();
        let (class, probability) = distribution.argmax().unwrap();
        assert_eq!(class, "bug");
        assert!(probability > 0.9);
    }

    #[test]
    fn unit_vocabulary_preprocessor_counts_term_frequencies() {
        let preprocessor =
            VocabularyPreprocessor::new(&["crash".to_string(), "panic".to_string()]);
        let features = preprocessor.transform("Crash, crash, then PANIC!").unwrap();
        assert_eq!(features, vec![2.0, 1.0]);
    }

    #[test]
    fn unit_vocabulary_preprocessor_drops_unknown_tokens() {
        let preprocessor = VocabularyPreprocessor::new(&["crash".to_string()]);
        let features = preprocessor.transform("nothing matches here").unwrap();
        assert_eq!(features, vec![0.0]);
    }

    #[test]
    fn regression_from_json_rejects_unknown_schema_version() {
        let raw = artifact_json().replace("\"schema_version\":1", "\"schema_version\":9");
        let error = ModelArtifact::from_json(&raw).unwrap_err();
        assert!(matches!(
            error,
            ArtifactError::UnsupportedSchema {
                expected: 1,
                found: 9
            }
        ));
    }

    #[test]
    fn regression_from_json_rejects_misshapen_weight_rows() {
        let raw = artifact_json().replace(
            "[2.0,2.0,-1.0,-1.0,2.0,-1.0,-1.0]",
            "[2.0,2.0]",
        );
        let error = ModelArtifact::from_json(&raw).unwrap_err();
        assert!(matches!(error, ArtifactError::Invalid(_)));
    }

    #[test]
    fn regression_from_json_rejects_bias_class_mismatch() {
        let raw = artifact_json().replace("[-0.5,-0.5,-0.5]", "[-0.5]");
        let error = ModelArtifact::from_json(&raw).unwrap_err();
        assert!(matches!(error, ArtifactError::Invalid(_)));
    }
}
