//! Issue and prediction persistence: store contract, record types, and the
//! in-memory backend used by tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;

mod sqlite;

pub use sqlite::SqliteLabelStore;

/// Result type for label store operations.
pub type StoreResult<T> = Result<T, LabelStoreError>;

/// Errors returned by store implementations.
#[derive(Debug, Error)]
pub enum LabelStoreError {
    #[error("issue {id} not found")]
    IssueNotFound { id: i64 },
    #[error("invalid persisted value for '{field}': {value}")]
    InvalidPersistedValue { field: &'static str, value: String },
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Chrono(#[from] chrono::ParseError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An observed issue, before it has a row id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIssue {
    pub owner: String,
    pub repo: String,
    pub number: u64,
    pub title: String,
    pub body: String,
}

/// A stored issue. Immutable once written; predictions reference it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueRecord {
    pub id: i64,
    pub owner: String,
    pub repo: String,
    pub number: u64,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// A labeling decision to persist, created only when the policy acts.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPrediction {
    pub comment_id: u64,
    pub predicted_class: String,
    pub probability: f64,
    pub distribution_json: String,
}

/// A stored prediction. Like/dislike counts are mutated exclusively by the
/// feedback reconciler; rows are never deleted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRecord {
    pub id: i64,
    pub issue_id: i64,
    pub comment_id: u64,
    pub predicted_class: String,
    pub probability: f64,
    pub distribution_json: String,
    pub likes: u64,
    pub dislikes: u64,
    pub created_at: DateTime<Utc>,
}

/// Fresh reaction counts for one prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackUpdate {
    pub prediction_id: i64,
    pub likes: u64,
    pub dislikes: u64,
}

/// Async store contract shared by the SQLite and in-memory backends.
#[async_trait]
pub trait LabelStore: Send + Sync {
    /// Records an issue, treating a duplicate owner/repo/number as the same
    /// logical issue: the existing row is returned untouched.
    async fn record_issue(&self, issue: NewIssue) -> StoreResult<IssueRecord>;

    /// Attaches a prediction to a stored issue.
    async fn add_prediction(
        &self,
        issue_id: i64,
        prediction: NewPrediction,
    ) -> StoreResult<PredictionRecord>;

    /// All predictions belonging to issues of the given owner/repo, in
    /// insertion order.
    async fn predictions_for_repo(
        &self,
        owner: &str,
        repo: &str,
    ) -> StoreResult<Vec<PredictionRecord>>;

    /// Overwrites like/dislike counts as one batch. Returns how many rows
    /// were updated; unknown prediction ids are skipped.
    async fn apply_feedback(&self, updates: &[FeedbackUpdate]) -> StoreResult<usize>;
}

/// In-memory backend for tests and local experimentation.
#[derive(Debug, Default)]
pub struct InMemoryLabelStore {
    inner: RwLock<StoreInner>,
}

#[derive(Debug, Default)]
struct StoreInner {
    issues: Vec<IssueRecord>,
    predictions: Vec<PredictionRecord>,
    next_issue_id: i64,
    next_prediction_id: i64,
}

impl InMemoryLabelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LabelStore for InMemoryLabelStore {
    async fn record_issue(&self, issue: NewIssue) -> StoreResult<IssueRecord> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.issues.iter().find(|candidate| {
            candidate.owner == issue.owner
                && candidate.repo == issue.repo
                && candidate.number == issue.number
        }) {
            return Ok(existing.clone());
        }
        inner.next_issue_id += 1;
        let record = IssueRecord {
            id: inner.next_issue_id,
            owner: issue.owner,
            repo: issue.repo,
            number: issue.number,
            title: issue.title,
            body: issue.body,
            created_at: Utc::now(),
        };
        inner.issues.push(record.clone());
        Ok(record)
    }

    async fn add_prediction(
        &self,
        issue_id: i64,
        prediction: NewPrediction,
    ) -> StoreResult<PredictionRecord> {
        let mut inner = self.inner.write().await;
        if !inner.issues.iter().any(|issue| issue.id == issue_id) {
            return Err(LabelStoreError::IssueNotFound { id: issue_id });
        }
        inner.next_prediction_id += 1;
        let record = PredictionRecord {
            id: inner.next_prediction_id,
            issue_id,
            comment_id: prediction.comment_id,
            predicted_class: prediction.predicted_class,
            probability: prediction.probability,
            distribution_json: prediction.distribution_json,
            likes: 0,
            dislikes: 0,
            created_at: Utc::now(),
        };
        inner.predictions.push(record.clone());
        Ok(record)
    }

    async fn predictions_for_repo(
        &self,
        owner: &str,
        repo: &str,
    ) -> StoreResult<Vec<PredictionRecord>> {
        let inner = self.inner.read().await;
        let issue_ids: Vec<i64> = inner
            .issues
            .iter()
            .filter(|issue| issue.owner == owner && issue.repo == repo)
            .map(|issue| issue.id)
            .collect();
        Ok(inner
            .predictions
            .iter()
            .filter(|prediction| issue_ids.contains(&prediction.issue_id))
            .cloned()
            .collect())
    }

    async fn apply_feedback(&self, updates: &[FeedbackUpdate]) -> StoreResult<usize> {
        let mut inner = self.inner.write().await;
        let mut updated = 0usize;
        for update in updates {
            if let Some(prediction) = inner
                .predictions
                .iter_mut()
                .find(|prediction| prediction.id == update.prediction_id)
            {
                prediction.likes = update.likes;
                prediction.dislikes = update.dislikes;
                updated += 1;
            }
        }
        Ok(updated)
    }
}
