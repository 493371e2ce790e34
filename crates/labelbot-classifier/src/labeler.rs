//! Classifier adapter around an injected model and text preprocessors.

use thiserror::Error;

use crate::distribution::ProbabilityDistribution;

#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("{input} preprocessor failed: {reason}")]
    Preprocess {
        input: &'static str,
        reason: String,
    },
    #[error("model prediction failed: {0}")]
    Predict(String),
    #[error("model returned {got} scores for {expected} classes")]
    ClassCountMismatch { expected: usize, got: usize },
}

/// Turns raw text into the feature vector the model was trained on.
pub trait TextPreprocessor: Send + Sync {
    fn transform(&self, text: &str) -> Result<Vec<f32>, ClassificationError>;
}

/// Opaque trained model: two feature vectors in, one score per class out,
/// aligned to the adapter's class order.
pub trait IssueModel: Send + Sync {
    fn predict(&self, body: &[f32], title: &[f32]) -> Result<Vec<f32>, ClassificationError>;
}

/// Polymorphic classification capability. Tests substitute deterministic
/// fakes; production uses [`IssueLabeler`].
pub trait IssueClassifier: Send + Sync {
    fn classify(&self, title: &str, body: &str)
        -> Result<ProbabilityDistribution, ClassificationError>;
}

/// Production classifier adapter. Holds the model, the two preprocessors,
/// and the ordered class names, all fixed at construction. Performs no
/// training and no I/O.
pub struct IssueLabeler {
    body_preprocessor: Box<dyn TextPreprocessor>,
    title_preprocessor: Box<dyn TextPreprocessor>,
    model: Box<dyn IssueModel>,
    class_names: Vec<String>,
}

impl IssueLabeler {
    pub fn new(
        body_preprocessor: Box<dyn TextPreprocessor>,
        title_preprocessor: Box<dyn TextPreprocessor>,
        model: Box<dyn IssueModel>,
        class_names: Vec<String>,
    ) -> Self {
        Self {
            body_preprocessor,
            title_preprocessor,
            model,
            class_names,
        }
    }

    pub fn with_default_classes(
        body_preprocessor: Box<dyn TextPreprocessor>,
        title_preprocessor: Box<dyn TextPreprocessor>,
        model: Box<dyn IssueModel>,
    ) -> Self {
        Self::new(
            body_preprocessor,
            title_preprocessor,
            model,
            crate::DEFAULT_CLASS_NAMES
                .iter()
                .map(|name| name.to_string())
                .collect(),
        )
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }
}

impl IssueClassifier for IssueLabeler {
    /// Empty title or body is valid input and is passed through as given.
    /// Scores come back exactly as the model produced them, without
    /// renormalization.
    fn classify(
        &self,
        title: &str,
        body: &str,
    ) -> Result<ProbabilityDistribution, ClassificationError> {
        let body_vector = self.body_preprocessor.transform(body)?;
        let title_vector = self.title_preprocessor.transform(title)?;
        let scores = self.model.predict(&body_vector, &title_vector)?;
        if scores.len() != self.class_names.len() {
            return Err(ClassificationError::ClassCountMismatch {
                expected: self.class_names.len(),
                got: scores.len(),
            });
        }
        let probabilities: Vec<f64> = scores.iter().map(|score| f64::from(*score)).collect();
        Ok(ProbabilityDistribution::from_aligned(
            &self.class_names,
            &probabilities,
        ))
    }
}
