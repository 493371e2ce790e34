//! SQLite-backed `LabelStore` implementation with durable persistence.

use crate::{
    FeedbackUpdate, IssueRecord, LabelStore, LabelStoreError, NewIssue, NewPrediction,
    PredictionRecord, StoreResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Persistent SQLite store backend.
#[derive(Debug)]
pub struct SqliteLabelStore {
    db_path: PathBuf,
}

impl SqliteLabelStore {
    /// Creates a SQLite-backed store at `path`, creating schema if needed.
    pub fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db_path = path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let store = Self { db_path };
        let connection = store.open_connection()?;
        store.initialize_schema(&connection)?;
        Ok(store)
    }

    fn open_connection(&self) -> StoreResult<Connection> {
        let connection = Connection::open(&self.db_path)?;
        connection.busy_timeout(Duration::from_secs(5))?;
        connection.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            "#,
        )?;
        Ok(connection)
    }

    fn initialize_schema(&self, connection: &Connection) -> StoreResult<()> {
        connection.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS issues (
                issue_id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner TEXT NOT NULL,
                repo TEXT NOT NULL,
                issue_number INTEGER NOT NULL,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (owner, repo, issue_number)
            );

            CREATE TABLE IF NOT EXISTS predictions (
                prediction_id INTEGER PRIMARY KEY AUTOINCREMENT,
                issue_id INTEGER NOT NULL,
                comment_id INTEGER NOT NULL,
                predicted_class TEXT NOT NULL,
                probability REAL NOT NULL,
                distribution_json TEXT NOT NULL,
                likes INTEGER NOT NULL,
                dislikes INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY(issue_id) REFERENCES issues(issue_id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_issues_owner_repo ON issues (owner, repo);
            CREATE INDEX IF NOT EXISTS idx_predictions_issue ON predictions (issue_id);
            "#,
        )?;
        Ok(())
    }
}

#[async_trait]
impl LabelStore for SqliteLabelStore {
    async fn record_issue(&self, issue: NewIssue) -> StoreResult<IssueRecord> {
        let mut connection = self.open_connection()?;
        // Immediate so a concurrent delivery of the same issue serializes on
        // the write lock instead of racing the uniqueness check.
        let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing = transaction
            .query_row(
                r#"
                SELECT issue_id, owner, repo, issue_number, title, body, created_at
                FROM issues WHERE owner = ?1 AND repo = ?2 AND issue_number = ?3
                "#,
                params![issue.owner, issue.repo, u64_to_db("issue_number", issue.number)?],
                issue_from_row,
            )
            .optional()?;
        if let Some(row) = existing {
            transaction.commit()?;
            return row;
        }

        let created_at = Utc::now();
        transaction.execute(
            r#"
            INSERT INTO issues (owner, repo, issue_number, title, body, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                issue.owner,
                issue.repo,
                u64_to_db("issue_number", issue.number)?,
                issue.title,
                issue.body,
                timestamp_to_db(created_at),
            ],
        )?;
        let id = transaction.last_insert_rowid();
        transaction.commit()?;

        Ok(IssueRecord {
            id,
            owner: issue.owner,
            repo: issue.repo,
            number: issue.number,
            title: issue.title,
            body: issue.body,
            created_at,
        })
    }

    async fn add_prediction(
        &self,
        issue_id: i64,
        prediction: NewPrediction,
    ) -> StoreResult<PredictionRecord> {
        let mut connection = self.open_connection()?;
        let transaction = connection.transaction()?;

        let exists = transaction
            .query_row(
                "SELECT 1 FROM issues WHERE issue_id = ?1",
                params![issue_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(LabelStoreError::IssueNotFound { id: issue_id });
        }

        let created_at = Utc::now();
        transaction.execute(
            r#"
            INSERT INTO predictions (
                issue_id, comment_id, predicted_class, probability,
                distribution_json, likes, dislikes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, ?6)
            "#,
            params![
                issue_id,
                u64_to_db("comment_id", prediction.comment_id)?,
                prediction.predicted_class,
                prediction.probability,
                prediction.distribution_json,
                timestamp_to_db(created_at),
            ],
        )?;
        let id = transaction.last_insert_rowid();
        transaction.commit()?;

        Ok(PredictionRecord {
            id,
            issue_id,
            comment_id: prediction.comment_id,
            predicted_class: prediction.predicted_class,
            probability: prediction.probability,
            distribution_json: prediction.distribution_json,
            likes: 0,
            dislikes: 0,
            created_at,
        })
    }

    async fn predictions_for_repo(
        &self,
        owner: &str,
        repo: &str,
    ) -> StoreResult<Vec<PredictionRecord>> {
        let connection = self.open_connection()?;
        let mut statement = connection.prepare(
            r#"
            SELECT p.prediction_id, p.issue_id, p.comment_id, p.predicted_class,
                   p.probability, p.distribution_json, p.likes, p.dislikes, p.created_at
            FROM predictions p
            JOIN issues i ON i.issue_id = p.issue_id
            WHERE i.owner = ?1 AND i.repo = ?2
            ORDER BY p.prediction_id
            "#,
        )?;
        let rows = statement.query_map(params![owner, repo], prediction_from_row)?;

        let mut predictions = Vec::new();
        for row in rows {
            predictions.push(row??);
        }
        Ok(predictions)
    }

    async fn apply_feedback(&self, updates: &[FeedbackUpdate]) -> StoreResult<usize> {
        let mut connection = self.open_connection()?;
        let transaction = connection.transaction()?;

        let mut updated = 0usize;
        for update in updates {
            updated += transaction.execute(
                "UPDATE predictions SET likes = ?1, dislikes = ?2 WHERE prediction_id = ?3",
                params![
                    u64_to_db("likes", update.likes)?,
                    u64_to_db("dislikes", update.dislikes)?,
                    update.prediction_id,
                ],
            )?;
        }
        transaction.commit()?;
        Ok(updated)
    }
}

fn issue_from_row(row: &Row<'_>) -> rusqlite::Result<StoreResult<IssueRecord>> {
    let id: i64 = row.get(0)?;
    let owner: String = row.get(1)?;
    let repo: String = row.get(2)?;
    let number: i64 = row.get(3)?;
    let title: String = row.get(4)?;
    let body: String = row.get(5)?;
    let created_at: String = row.get(6)?;
    Ok(build_issue_record(
        id, owner, repo, number, title, body, created_at,
    ))
}

fn build_issue_record(
    id: i64,
    owner: String,
    repo: String,
    number: i64,
    title: String,
    body: String,
    created_at: String,
) -> StoreResult<IssueRecord> {
    Ok(IssueRecord {
        id,
        owner,
        repo,
        number: u64_from_db("issue_number", number)?,
        title,
        body,
        created_at: timestamp_from_db(&created_at)?,
    })
}

fn prediction_from_row(row: &Row<'_>) -> rusqlite::Result<StoreResult<PredictionRecord>> {
    let id: i64 = row.get(0)?;
    let issue_id: i64 = row.get(1)?;
    let comment_id: i64 = row.get(2)?;
    let predicted_class: String = row.get(3)?;
    let probability: f64 = row.get(4)?;
    let distribution_json: String = row.get(5)?;
    let likes: i64 = row.get(6)?;
    let dislikes: i64 = row.get(7)?;
    let created_at: String = row.get(8)?;
    Ok(build_prediction_record(
        id,
        issue_id,
        comment_id,
        predicted_class,
        probability,
        distribution_json,
        likes,
        dislikes,
        created_at,
    ))
}

#[allow(clippy::too_many_arguments)]
fn build_prediction_record(
    id: i64,
    issue_id: i64,
    comment_id: i64,
    predicted_class: String,
    probability: f64,
    distribution_json: String,
    likes: i64,
    dislikes: i64,
    created_at: String,
) -> StoreResult<PredictionRecord> {
    Ok(PredictionRecord {
        id,
        issue_id,
        comment_id: u64_from_db("comment_id", comment_id)?,
        predicted_class,
        probability,
        distribution_json,
        likes: u64_from_db("likes", likes)?,
        dislikes: u64_from_db("dislikes", dislikes)?,
        created_at: timestamp_from_db(&created_at)?,
    })
}

fn timestamp_to_db(value: DateTime<Utc>) -> String {
    value.to_rfc3339()
}

fn timestamp_from_db(value: &str) -> StoreResult<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

fn u64_to_db(field: &'static str, value: u64) -> StoreResult<i64> {
    i64::try_from(value).map_err(|_| LabelStoreError::InvalidPersistedValue {
        field,
        value: value.to_string(),
    })
}

fn u64_from_db(field: &'static str, value: i64) -> StoreResult<u64> {
    u64::try_from(value).map_err(|_| LabelStoreError::InvalidPersistedValue {
        field,
        value: value.to_string(),
    })
}
