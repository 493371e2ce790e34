//! GitHub REST client for comments, labels, and reaction tallies.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::transport::{
    is_retryable_github_status, is_retryable_transport_error, parse_retry_after, retry_delay,
    truncate_for_error,
};

/// Fully-qualified reference to one issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedComment {
    pub id: u64,
    pub html_url: Option<String>,
}

/// `+1` / `-1` reaction counts on one comment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReactionTally {
    pub plus_one: u64,
    pub minus_one: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct ReactionRow {
    content: String,
}

/// Platform seam consumed by the runtime. Tests substitute a fake; the
/// production implementation is [`GithubApiClient`].
#[async_trait]
pub trait IssuePlatform: Send + Sync {
    async fn create_comment(&self, issue: &IssueRef, body: &str) -> Result<CreatedComment>;
    async fn add_label(&self, issue: &IssueRef, label: &str) -> Result<()>;
    async fn comment_reactions(
        &self,
        owner: &str,
        repo: &str,
        comment_id: u64,
    ) -> Result<ReactionTally>;
}

#[derive(Clone)]
pub struct GithubApiClient {
    http: reqwest::Client,
    api_base: String,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl GithubApiClient {
    pub fn new(
        api_base: String,
        token: String,
        request_timeout_ms: u64,
        retry_max_attempts: usize,
        retry_base_delay_ms: u64,
    ) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("labelbot"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        let auth_header = format!("Bearer {}", token.trim());
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&auth_header)
                .context("invalid github authorization header")?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create github api client")?;
        Ok(Self {
            http: client,
            api_base: api_base.trim_end_matches('/').to_string(),
            retry_max_attempts: retry_max_attempts.max(1),
            retry_base_delay_ms: retry_base_delay_ms.max(1),
        })
    }

    async fn request_json<T, F>(&self, operation: &str, mut request_builder: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = request_builder().send().await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let parsed = response
                            .json::<T>()
                            .await
                            .with_context(|| format!("failed to decode github {operation}"))?;
                        return Ok(parsed);
                    }

                    let retry_after = parse_retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    if attempt < self.retry_max_attempts
                        && is_retryable_github_status(status.as_u16())
                    {
                        tokio::time::sleep(retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }

                    bail!(
                        "github api {operation} failed with status {}: {}",
                        status.as_u16(),
                        truncate_for_error(&body, 800)
                    );
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts && is_retryable_transport_error(&error) {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(error)
                        .with_context(|| format!("github api {operation} request failed"));
                }
            }
        }
    }
}

#[async_trait]
impl IssuePlatform for GithubApiClient {
    async fn create_comment(&self, issue: &IssueRef, body: &str) -> Result<CreatedComment> {
        let payload = json!({ "body": body });
        self.request_json("create issue comment", || {
            self.http
                .post(format!(
                    "{}/repos/{}/{}/issues/{}/comments",
                    self.api_base, issue.owner, issue.repo, issue.number
                ))
                .json(&payload)
        })
        .await
    }

    async fn add_label(&self, issue: &IssueRef, label: &str) -> Result<()> {
        let payload = json!({ "labels": [label] });
        let _applied: Vec<serde_json::Value> = self
            .request_json("add issue label", || {
                self.http
                    .post(format!(
                        "{}/repos/{}/{}/issues/{}/labels",
                        self.api_base, issue.owner, issue.repo, issue.number
                    ))
                    .json(&payload)
            })
            .await?;
        Ok(())
    }

    async fn comment_reactions(
        &self,
        owner: &str,
        repo: &str,
        comment_id: u64,
    ) -> Result<ReactionTally> {
        let mut page = 1_u32;
        let mut tally = ReactionTally::default();
        loop {
            let page_value = page.to_string();
            let chunk: Vec<ReactionRow> = self
                .request_json("list comment reactions", || {
                    self.http
                        .get(format!(
                            "{}/repos/{}/{}/issues/comments/{}/reactions",
                            self.api_base, owner, repo, comment_id
                        ))
                        .query(&[("per_page", "100"), ("page", page_value.as_str())])
                })
                .await?;
            let chunk_len = chunk.len();
            for reaction in chunk {
                match reaction.content.as_str() {
                    "+1" => tally.plus_one = tally.plus_one.saturating_add(1),
                    "-1" => tally.minus_one = tally.minus_one.saturating_add(1),
                    _ => {}
                }
            }
            if chunk_len < 100 {
                break;
            }
            page = page.saturating_add(1);
        }
        Ok(tally)
    }
}
