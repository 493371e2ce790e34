//! End-to-end flow: signed webhook in, GitHub comment + label out, feedback
//! reconciled back into the SQLite store.

use std::sync::Arc;
use std::time::Duration;

use hmac::{Hmac, Mac};
use httpmock::prelude::*;
use serde_json::json;
use sha2::Sha256;
use tokio::net::TcpListener;

use labelbot_classifier::{ModelArtifact, ThresholdTable};
use labelbot_github::GithubApiClient;
use labelbot_runtime::{build_router, RuntimeConfig, ServerState};
use labelbot_store::{LabelStore, SqliteLabelStore};

const WEBHOOK_SECRET: &str = "integration-secret";

fn model_artifact() -> ModelArtifact {
    let raw = json!({
        "schema_version": 1,
        "class_names": ["bug", "feature", "question"],
        "body_vocabulary": ["crash", "panic", "add", "how"],
        "title_vocabulary": ["error", "request", "question"],
        "weights": [
            [2.0, 2.0, -1.0, -1.0, 2.0, -1.0, -1.0],
            [-1.0, -1.0, 2.0, -1.0, -1.0, 2.0, -1.0],
            [-1.0, -1.0, -1.0, 1.0, -1.0, -1.0, 2.0]
        ],
        "bias": [-0.5, -0.5, -0.5]
    })
    .to_string();
    ModelArtifact::from_json(&raw).expect("builtin test artifact is valid")
}

fn sign(payload: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes())
        .expect("hmac accepts any key size");
    mac.update(payload);
    let hex: String = mac
        .finalize()
        .into_bytes()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect();
    format!("sha256={hex}")
}

fn opened_issue_payload() -> Vec<u8> {
    serde_json::to_vec(&json!({
        "action": "opened",
        "installation": { "id": 27079 },
        "issue": {
            "number": 41,
            "title": "Crash error on startup",
            "body": "The app will crash and panic right after launch."
        },
        "repository": { "full_name": "octo/widgets" }
    }))
    .expect("payload serializes")
}

struct Harness {
    base_url: String,
    github: MockServer,
    store: Arc<SqliteLabelStore>,
    _db_dir: tempfile::TempDir,
    server: tokio::task::JoinHandle<()>,
}

async fn start_harness() -> Harness {
    let github = MockServer::start_async().await;

    let db_dir = tempfile::tempdir().expect("create temp dir");
    let store = Arc::new(
        SqliteLabelStore::new(db_dir.path().join("labelbot.sqlite3")).expect("create store"),
    );
    let platform = GithubApiClient::new(github.base_url(), "token".to_string(), 2_000, 2, 1)
        .expect("build github client");

    let state = Arc::new(ServerState {
        config: RuntimeConfig::new(
            "127.0.0.1:0".to_string(),
            Some(WEBHOOK_SECRET.to_string()),
            ThresholdTable::default(),
        ),
        classifier: Arc::new(model_artifact().into_labeler()),
        platform: Arc::new(platform),
        store: store.clone(),
    });

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral listener");
    let addr = listener.local_addr().expect("resolve listener addr");
    let app = build_router(state);
    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    Harness {
        base_url: format!("http://{addr}"),
        github,
        store,
        _db_dir: db_dir,
        server,
    }
}

#[tokio::test]
async fn integration_opened_issue_is_labeled_and_feedback_reconciled() {
    let harness = start_harness().await;
    let client = reqwest::Client::new();

    let comment_mock = harness
        .github
        .mock_async(|when, then| {
            when.method(POST).path("/repos/octo/widgets/issues/41/comments");
            then.status(201).json_body(json!({ "id": 777 }));
        })
        .await;
    let label_mock = harness
        .github
        .mock_async(|when, then| {
            when.method(POST)
                .path("/repos/octo/widgets/issues/41/labels")
                .json_body(json!({ "labels": ["bug"] }));
            then.status(200).json_body(json!([{ "name": "bug" }]));
        })
        .await;
    harness
        .github
        .mock_async(|when, then| {
            when.method(GET)
                .path("/repos/octo/widgets/issues/comments/777/reactions");
            then.status(200).json_body(json!([
                { "content": "+1" },
                { "content": "+1" },
                { "content": "-1" },
                { "content": "confused" }
            ]));
        })
        .await;

    // Signed delivery gets classified and acted on.
    let payload = opened_issue_payload();
    let response = client
        .post(format!("{}/event_handler", harness.base_url))
        .header("x-hub-signature-256", sign(&payload))
        .body(payload)
        .send()
        .await
        .expect("deliver webhook");
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.expect("parse response");
    assert_eq!(body["status"], "labeled");
    assert_eq!(body["class"], "bug");
    assert_eq!(body["comment_id"], 777);

    comment_mock.assert_async().await;
    label_mock.assert_async().await;

    // The decision is persisted with a distribution snapshot.
    let rows = harness
        .store
        .predictions_for_repo("octo", "widgets")
        .await
        .expect("load predictions");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].comment_id, 777);
    assert_eq!(rows[0].predicted_class, "bug");
    assert!(rows[0].probability >= 0.6);
    assert!(rows[0].distribution_json.contains("bug"));
    assert_eq!(rows[0].likes, 0);

    // Reconciliation folds the posted reactions back in.
    let report: serde_json::Value = client
        .post(format!("{}/update_feedback/octo/widgets", harness.base_url))
        .send()
        .await
        .expect("reconcile")
        .json()
        .await
        .expect("parse report");
    assert_eq!(report["total"], 1);
    assert_eq!(report["updated"], 1);
    assert_eq!(report["failures"].as_array().unwrap().len(), 0);

    let api: serde_json::Value = client
        .get(format!("{}/api/predictions/octo/widgets", harness.base_url))
        .send()
        .await
        .expect("list predictions")
        .json()
        .await
        .expect("parse predictions");
    assert_eq!(api["predictions"][0]["likes"], 2);
    assert_eq!(api["predictions"][0]["dislikes"], 1);

    // A second reconciliation with unchanged reactions is a no-op.
    let second: serde_json::Value = client
        .post(format!("{}/update_feedback/octo/widgets", harness.base_url))
        .send()
        .await
        .expect("reconcile again")
        .json()
        .await
        .expect("parse report");
    assert_eq!(second["updated"], 1);
    let after: serde_json::Value = client
        .get(format!("{}/api/predictions/octo/widgets", harness.base_url))
        .send()
        .await
        .expect("list predictions")
        .json()
        .await
        .expect("parse predictions");
    assert_eq!(after["predictions"][0]["likes"], 2);
    assert_eq!(after["predictions"][0]["dislikes"], 1);

    // The HTML data page renders the stored row.
    let page = client
        .get(format!("{}/data/octo/widgets", harness.base_url))
        .send()
        .await
        .expect("fetch data page")
        .text()
        .await
        .expect("read page");
    assert!(page.contains("<td>bug</td>"));
    assert!(page.contains("<td>777</td>"));

    harness.server.abort();
}

#[tokio::test]
async fn integration_unsigned_delivery_is_rejected_without_side_effects() {
    let harness = start_harness().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/event_handler", harness.base_url))
        .body(opened_issue_payload())
        .send()
        .await
        .expect("deliver webhook");
    assert_eq!(response.status().as_u16(), 400);

    let rows = harness
        .store
        .predictions_for_repo("octo", "widgets")
        .await
        .expect("load predictions");
    assert!(rows.is_empty());

    harness.server.abort();
}

#[tokio::test]
async fn integration_question_below_raised_threshold_stays_silent() {
    let harness = start_harness().await;
    let client = reqwest::Client::new();

    // "how" alone puts `question` in front, but its sigmoid output lands
    // under the 0.7 question threshold.
    let payload = serde_json::to_vec(&json!({
        "action": "opened",
        "issue": {
            "number": 42,
            "title": "",
            "body": "how"
        },
        "repository": { "full_name": "octo/widgets" }
    }))
    .expect("payload serializes");

    let response = client
        .post(format!("{}/event_handler", harness.base_url))
        .header("x-hub-signature-256", sign(&payload))
        .body(payload)
        .send()
        .await
        .expect("deliver webhook");
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.expect("parse response");
    assert_eq!(body["status"], "silent");

    let rows = harness
        .store
        .predictions_for_repo("octo", "widgets")
        .await
        .expect("load predictions");
    assert!(rows.is_empty());

    harness.server.abort();
}
