//! Comment → label → persist sequence for a confident prediction.

use std::sync::Arc;

use thiserror::Error;

use labelbot_classifier::{Decision, ProbabilityDistribution};
use labelbot_github::{render_prediction_comment, IssuePlatform, IssueRef};
use labelbot_store::{IssueRecord, LabelStore, LabelStoreError, NewPrediction, PredictionRecord};

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("failed to post prediction comment on {owner}/{repo}#{number}: {source}")]
    Comment {
        owner: String,
        repo: String,
        number: u64,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to apply label '{label}' on {owner}/{repo}#{number}: {source}")]
    Label {
        owner: String,
        repo: String,
        number: u64,
        label: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to persist prediction for {owner}/{repo}#{number}: {source}")]
    Persist {
        owner: String,
        repo: String,
        number: u64,
        #[source]
        source: LabelStoreError,
    },
}

/// Executes the act outcome against the platform and the store. The order
/// is fixed: the persisted prediction needs the comment id, and a label
/// without an explanatory comment would be mute.
pub struct ActionExecutor {
    platform: Arc<dyn IssuePlatform>,
    store: Arc<dyn LabelStore>,
}

impl ActionExecutor {
    pub fn new(platform: Arc<dyn IssuePlatform>, store: Arc<dyn LabelStore>) -> Self {
        Self { platform, store }
    }

    pub async fn execute(
        &self,
        issue: &IssueRecord,
        decision: &Decision,
        distribution: &ProbabilityDistribution,
    ) -> Result<PredictionRecord, ActionError> {
        let issue_ref = IssueRef {
            owner: issue.owner.clone(),
            repo: issue.repo.clone(),
            number: issue.number,
        };

        let comment_body = render_prediction_comment(&decision.class_name, decision.probability);
        let comment = self
            .platform
            .create_comment(&issue_ref, &comment_body)
            .await
            .map_err(|source| ActionError::Comment {
                owner: issue.owner.clone(),
                repo: issue.repo.clone(),
                number: issue.number,
                source,
            })?;

        self.platform
            .add_label(&issue_ref, &decision.class_name)
            .await
            .map_err(|source| ActionError::Label {
                owner: issue.owner.clone(),
                repo: issue.repo.clone(),
                number: issue.number,
                label: decision.class_name.clone(),
                source,
            })?;

        let prediction = self
            .store
            .add_prediction(
                issue.id,
                NewPrediction {
                    comment_id: comment.id,
                    predicted_class: decision.class_name.clone(),
                    probability: decision.probability,
                    distribution_json: distribution.snapshot_json(),
                },
            )
            .await
            .map_err(|source| ActionError::Persist {
                owner: issue.owner.clone(),
                repo: issue.repo.clone(),
                number: issue.number,
                source,
            })?;

        tracing::info!(
            owner = %issue.owner,
            repo = %issue.repo,
            issue_number = issue.number,
            class = %decision.class_name,
            probability = decision.probability,
            comment_id = comment.id,
            "auto-labeled issue"
        );
        Ok(prediction)
    }
}
