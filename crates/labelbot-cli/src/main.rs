//! labelbot server binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use labelbot_classifier::{ModelArtifact, ThresholdTable};
use labelbot_github::GithubApiClient;
use labelbot_runtime::artifact_fetch::fetch_model_artifact;
use labelbot_runtime::{run_server, RuntimeConfig, ServerState};
use labelbot_store::SqliteLabelStore;

#[derive(Parser, Debug)]
#[command(
    name = "labelbot",
    about = "Auto-labels newly opened GitHub issues with a confidence-thresholded classifier"
)]
struct Cli {
    /// Address the HTTP server binds.
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// SQLite database path.
    #[arg(long, env = "LABELBOT_DATABASE", default_value = "labelbot.sqlite3")]
    database: PathBuf,

    /// Webhook shared secret; verification is disabled when absent.
    #[arg(long, env = "LABELBOT_WEBHOOK_SECRET")]
    webhook_secret: Option<String>,

    /// GitHub API token used for comments, labels, and reactions.
    #[arg(long, env = "LABELBOT_GITHUB_TOKEN")]
    github_token: String,

    #[arg(long, default_value = "https://api.github.com")]
    github_api_base: String,

    #[arg(long, default_value_t = 30_000)]
    github_timeout_ms: u64,

    #[arg(long, default_value_t = 3)]
    github_retry_max_attempts: usize,

    #[arg(long, default_value_t = 500)]
    github_retry_base_delay_ms: u64,

    /// Local model artifact path. Exactly one of this and
    /// --model-artifact-url must be given.
    #[arg(long)]
    model_artifact: Option<PathBuf>,

    /// Remote model artifact URL.
    #[arg(long)]
    model_artifact_url: Option<String>,

    /// Expected sha256 of the remote artifact (hex).
    #[arg(long)]
    model_artifact_sha256: Option<String>,

    /// Confidence required for classes without an explicit threshold.
    #[arg(long, default_value_t = 0.6)]
    default_threshold: f64,

    /// Per-class threshold override as `class=value`, repeatable. Defaults
    /// to `question=0.7` when none are given.
    #[arg(long = "class-threshold", value_parser = parse_class_threshold)]
    class_thresholds: Vec<(String, f64)>,
}

fn parse_class_threshold(raw: &str) -> Result<(String, f64), String> {
    let (class, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected class=value, got '{raw}'"))?;
    let class = class.trim();
    if class.is_empty() {
        return Err(format!("empty class name in '{raw}'"));
    }
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|error| format!("invalid threshold in '{raw}': {error}"))?;
    Ok((class.to_string(), value))
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

async fn load_artifact(cli: &Cli) -> Result<ModelArtifact> {
    match (&cli.model_artifact, &cli.model_artifact_url) {
        (Some(_), Some(_)) => {
            bail!("--model-artifact and --model-artifact-url are mutually exclusive")
        }
        (Some(path), None) => ModelArtifact::from_file(path)
            .with_context(|| format!("failed to load model artifact from {}", path.display())),
        (None, Some(url)) => {
            fetch_model_artifact(url, cli.model_artifact_sha256.as_deref()).await
        }
        (None, None) => bail!("one of --model-artifact or --model-artifact-url is required"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let overrides = if cli.class_thresholds.is_empty() {
        vec![("question".to_string(), 0.7)]
    } else {
        cli.class_thresholds.clone()
    };
    let thresholds = ThresholdTable::new(cli.default_threshold, overrides)
        .context("invalid threshold configuration")?;

    let artifact = load_artifact(&cli).await?;
    let labeler = artifact.into_labeler();

    let store = SqliteLabelStore::new(&cli.database)
        .with_context(|| format!("failed to open database {}", cli.database.display()))?;
    let platform = GithubApiClient::new(
        cli.github_api_base.clone(),
        cli.github_token.clone(),
        cli.github_timeout_ms,
        cli.github_retry_max_attempts,
        cli.github_retry_base_delay_ms,
    )?;

    let state = Arc::new(ServerState {
        config: RuntimeConfig::new(cli.bind.clone(), cli.webhook_secret.clone(), thresholds),
        classifier: Arc::new(labeler),
        platform: Arc::new(platform),
        store: Arc::new(store),
    });

    run_server(state).await
}
