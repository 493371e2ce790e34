//! Webhook payload extraction for "issue opened" deliveries.

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
struct WebhookPayload {
    action: Option<String>,
    issue: Option<IssuePayload>,
    repository: Option<RepositoryPayload>,
    installation: Option<InstallationPayload>,
}

#[derive(Debug, Clone, Deserialize)]
struct IssuePayload {
    number: u64,
    title: Option<String>,
    body: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RepositoryPayload {
    full_name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct InstallationPayload {
    id: u64,
}

/// One newly opened issue, as carried by the webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueOpenedEvent {
    pub installation_id: Option<u64>,
    pub owner: String,
    pub repo: String,
    pub issue_number: u64,
    pub title: String,
    pub body: String,
}

/// Parses a raw delivery. `Ok(None)` means a well-formed payload that is
/// not an "issue opened" event (acknowledged and ignored upstream). A
/// missing title or body becomes the empty string; the classifier treats
/// empty text as valid input.
pub fn extract_issue_opened_event(raw: &[u8]) -> Result<Option<IssueOpenedEvent>> {
    let payload: WebhookPayload =
        serde_json::from_slice(raw).context("failed to parse webhook payload")?;

    if payload.action.as_deref() != Some("opened") {
        return Ok(None);
    }
    let Some(issue) = payload.issue else {
        return Ok(None);
    };

    let repository = payload
        .repository
        .context("webhook payload has no repository")?;
    let (owner, repo) = repository
        .full_name
        .split_once('/')
        .with_context(|| format!("malformed repository full_name '{}'", repository.full_name))?;

    Ok(Some(IssueOpenedEvent {
        installation_id: payload.installation.map(|installation| installation.id),
        owner: owner.to_string(),
        repo: repo.to_string(),
        issue_number: issue.number,
        title: issue.title.unwrap_or_default(),
        body: issue.body.unwrap_or_default(),
    }))
}
