//! Remote model artifact download with optional integrity checking.

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};

use labelbot_classifier::ModelArtifact;

/// Downloads a model artifact over HTTP(S) and parses it. When
/// `expected_sha256` is given, the raw bytes must hash to it (hex,
/// case-insensitive) before parsing is even attempted.
pub async fn fetch_model_artifact(
    url: &str,
    expected_sha256: Option<&str>,
) -> Result<ModelArtifact> {
    let response = reqwest::get(url)
        .await
        .with_context(|| format!("failed to fetch model artifact from {url}"))?;
    let status = response.status();
    if !status.is_success() {
        bail!(
            "model artifact fetch from {url} failed with status {}",
            status.as_u16()
        );
    }
    let bytes = response
        .bytes()
        .await
        .context("failed to read model artifact body")?;

    if let Some(expected) = expected_sha256 {
        let digest = hex_digest(&bytes);
        if !digest.eq_ignore_ascii_case(expected.trim()) {
            bail!(
                "model artifact checksum mismatch: expected {}, computed {digest}",
                expected.trim()
            );
        }
    }

    let raw = std::str::from_utf8(&bytes).context("model artifact is not valid utf-8")?;
    let artifact = ModelArtifact::from_json(raw).context("failed to parse model artifact")?;
    tracing::info!(url, classes = artifact.class_names().len(), "loaded model artifact");
    Ok(artifact)
}

fn hex_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::{fetch_model_artifact, hex_digest};
    use httpmock::prelude::*;

    fn artifact_json() -> String {
        serde_json::json!({
            "schema_version": 1,
            "class_names": ["bug", "feature", "question"],
            "body_vocabulary": ["crash"],
            "title_vocabulary": ["error"],
            "weights": [
                [2.0, 2.0],
                [-1.0, -1.0],
                [-1.0, -1.0]
            ],
            "bias": [0.0, 0.0, 0.0]
        })
        .to_string()
    }

    #[tokio::test]
    async fn integration_fetch_downloads_and_parses_artifact() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/model.json");
                then.status(200).body(artifact_json());
            })
            .await;

        let artifact = fetch_model_artifact(&format!("{}/model.json", server.base_url()), None)
            .await
            .unwrap();
        assert_eq!(artifact.class_names().len(), 3);
    }

    #[tokio::test]
    async fn integration_fetch_verifies_sha256_when_given() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/model.json");
                then.status(200).body(artifact_json());
            })
            .await;
        let url = format!("{}/model.json", server.base_url());
        let digest = hex_digest(artifact_json().as_bytes());

        assert!(fetch_model_artifact(&url, Some(&digest)).await.is_ok());

        let error = fetch_model_artifact(&url, Some("deadbeef"))
            .await
            .unwrap_err();
        assert!(error.to_string().contains("checksum mismatch"));
    }

    #[tokio::test]
    async fn regression_fetch_rejects_http_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/model.json");
                then.status(404);
            })
            .await;

        let error = fetch_model_artifact(&format!("{}/model.json", server.base_url()), None)
            .await
            .unwrap_err();
        assert!(error.to_string().contains("status 404"));
    }
}
