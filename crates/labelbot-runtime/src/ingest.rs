//! The classify-and-act pipeline for one "issue opened" event.

use thiserror::Error;

use labelbot_classifier::{decide, ClassificationError};
use labelbot_store::{LabelStoreError, NewIssue, PredictionRecord};

use crate::event::IssueOpenedEvent;
use crate::executor::{ActionError, ActionExecutor};
use crate::server::ServerState;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to record issue: {0}")]
    Store(#[from] LabelStoreError),
    #[error(transparent)]
    Classification(#[from] ClassificationError),
    #[error(transparent)]
    Action(#[from] ActionError),
}

/// What became of one event.
#[derive(Debug)]
pub enum IngestOutcome {
    /// The policy acted; the issue was commented on, labeled, and the
    /// decision persisted.
    Labeled(PredictionRecord),
    /// The best class fell short of its threshold (or the distribution was
    /// empty); nothing was posted.
    Silent,
}

/// Runs classify → decide → (comment → label → persist) for one event. The
/// issue row is written first, mirroring the order of observation: an issue
/// was seen even if classification subsequently fails. A classification
/// failure drops the event with no partial prediction.
pub async fn process_issue_opened(
    state: &ServerState,
    event: IssueOpenedEvent,
) -> Result<IngestOutcome, IngestError> {
    let issue = state
        .store
        .record_issue(NewIssue {
            owner: event.owner.clone(),
            repo: event.repo.clone(),
            number: event.issue_number,
            title: event.title.clone(),
            body: event.body.clone(),
        })
        .await?;

    tracing::info!(
        owner = %event.owner,
        repo = %event.repo,
        issue_number = event.issue_number,
        title = %event.title,
        "issue opened"
    );

    let distribution = state.classifier.classify(&event.title, &event.body)?;
    tracing::debug!(
        owner = %event.owner,
        repo = %event.repo,
        issue_number = event.issue_number,
        distribution = %distribution.snapshot_json(),
        "classifier output"
    );

    let Some(decision) = decide(&distribution, &state.config.thresholds) else {
        tracing::info!(
            owner = %event.owner,
            repo = %event.repo,
            issue_number = event.issue_number,
            "no class cleared its threshold, staying silent"
        );
        return Ok(IngestOutcome::Silent);
    };

    let executor = ActionExecutor::new(state.platform.clone(), state.store.clone());
    let prediction = executor.execute(&issue, &decision, &distribution).await?;
    Ok(IngestOutcome::Labeled(prediction))
}
