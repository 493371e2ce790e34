//! Webhook runtime for the labeling bot: event ingestion, the
//! classify-and-act pipeline, feedback reconciliation, and the HTTP server
//! that fronts them.

pub mod artifact_fetch;
pub mod config;
pub mod event;
pub mod executor;
pub mod ingest;
pub mod reconciler;
pub mod render;
pub mod server;
pub mod signature;

pub use config::RuntimeConfig;
pub use event::{extract_issue_opened_event, IssueOpenedEvent};
pub use executor::{ActionError, ActionExecutor};
pub use ingest::{process_issue_opened, IngestError, IngestOutcome};
pub use reconciler::{
    FeedbackReconciler, ReconciliationError, ReconciliationFailure, ReconciliationReport,
};
pub use server::{build_router, run_server, ServerState};
