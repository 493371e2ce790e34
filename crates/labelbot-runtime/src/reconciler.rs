//! Folds comment reactions back into stored prediction records.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use labelbot_github::IssuePlatform;
use labelbot_store::{FeedbackUpdate, LabelStore, LabelStoreError};

#[derive(Debug, Error)]
pub enum ReconciliationError {
    #[error(transparent)]
    Store(#[from] LabelStoreError),
}

/// One prediction whose reaction fetch failed this run.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationFailure {
    pub comment_id: u64,
    pub reason: String,
}

/// Outcome of one reconciliation pass over a repository.
#[derive(Debug, Default, Serialize)]
pub struct ReconciliationReport {
    pub total: usize,
    pub updated: usize,
    pub failures: Vec<ReconciliationFailure>,
}

/// Re-fetches reaction counts for every stored prediction of a repository
/// and overwrites the like/dislike tallies. Per-comment fetch failures are
/// skipped and reported rather than aborting the run: a deleted comment
/// must not wedge feedback collection for the whole repository. All
/// successful updates land as one store batch.
pub struct FeedbackReconciler {
    platform: Arc<dyn IssuePlatform>,
    store: Arc<dyn LabelStore>,
}

impl FeedbackReconciler {
    pub fn new(platform: Arc<dyn IssuePlatform>, store: Arc<dyn LabelStore>) -> Self {
        Self { platform, store }
    }

    pub async fn reconcile(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<ReconciliationReport, ReconciliationError> {
        let predictions = self.store.predictions_for_repo(owner, repo).await?;

        let mut updates = Vec::with_capacity(predictions.len());
        let mut failures = Vec::new();
        for prediction in &predictions {
            match self
                .platform
                .comment_reactions(owner, repo, prediction.comment_id)
                .await
            {
                Ok(tally) => updates.push(FeedbackUpdate {
                    prediction_id: prediction.id,
                    likes: tally.plus_one,
                    dislikes: tally.minus_one,
                }),
                Err(error) => {
                    tracing::warn!(
                        owner,
                        repo,
                        comment_id = prediction.comment_id,
                        %error,
                        "skipping prediction, reaction fetch failed"
                    );
                    failures.push(ReconciliationFailure {
                        comment_id: prediction.comment_id,
                        reason: error.to_string(),
                    });
                }
            }
        }

        let updated = self.store.apply_feedback(&updates).await?;
        tracing::info!(
            owner,
            repo,
            total = predictions.len(),
            updated,
            failed = failures.len(),
            "reconciled prediction feedback"
        );
        Ok(ReconciliationReport {
            total: predictions.len(),
            updated,
            failures,
        })
    }
}
