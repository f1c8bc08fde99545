use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use tokio::task;

use crate::models::{
    FeedbackType, LearningExample, NewFeedback, NewLearningExample, QueryFeedback,
    TranslationRecord,
};

/// SQLite store for translation history and curation data.
///
/// `query_history` is append-only: rows are inserted once per translation
/// attempt and doubles as the translation cache.
pub struct Storage {
    db_path: PathBuf,
}

const HISTORY_COLUMNS: &str =
    "id, natural_query, cache_key, sql_query, successful, error_message, created_at";

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<TranslationRecord> {
    Ok(TranslationRecord {
        id: row.get(0)?,
        natural_query: row.get(1)?,
        cache_key: row.get(2)?,
        sql_query: row.get(3)?,
        successful: row.get(4)?,
        error_message: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn feedback_from_row(row: &Row<'_>) -> rusqlite::Result<QueryFeedback> {
    let feedback_type: String = row.get(3)?;
    let feedback_type = FeedbackType::parse(&feedback_type).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown feedback type: {}", feedback_type).into(),
        )
    })?;
    Ok(QueryFeedback {
        id: row.get(0)?,
        query_id: row.get(1)?,
        was_helpful: row.get(2)?,
        feedback_type,
        user_comment: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn learning_example_from_row(row: &Row<'_>) -> rusqlite::Result<LearningExample> {
    let context: String = row.get(3)?;
    let conversation_context = serde_json::from_str(&context).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(LearningExample {
        id: row.get(0)?,
        original_query: row.get(1)?,
        successful_sql: row.get(2)?,
        conversation_context,
        notes: row.get(4)?,
        approved_by: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl Storage {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;

        let db_path = data_dir.join("history.db");

        // Initialize database in blocking thread
        let db_path_clone = db_path.clone();
        task::spawn_blocking(move || -> Result<()> {
            let conn = Connection::open(&db_path_clone)?;

            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS query_history (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    natural_query TEXT NOT NULL,
                    cache_key TEXT NOT NULL,
                    sql_query TEXT NOT NULL,
                    successful INTEGER NOT NULL,
                    error_message TEXT,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_history_cache_key
                    ON query_history(cache_key, successful);

                CREATE TABLE IF NOT EXISTS query_feedback (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    query_id INTEGER NOT NULL REFERENCES query_history(id),
                    was_helpful INTEGER NOT NULL,
                    feedback_type TEXT NOT NULL,
                    user_comment TEXT,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_feedback_query_id
                    ON query_feedback(query_id);

                CREATE TABLE IF NOT EXISTS learning_examples (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    original_query TEXT NOT NULL,
                    successful_sql TEXT NOT NULL,
                    conversation_context TEXT NOT NULL,
                    notes TEXT,
                    approved_by TEXT,
                    created_at TEXT NOT NULL
                );",
            )?;

            Ok(())
        })
        .await??;

        Ok(Self { db_path })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Most recent successful translation stored under `cache_key`.
    pub async fn find_successful_translation(
        &self,
        cache_key: &str,
    ) -> Result<Option<TranslationRecord>> {
        let db_path = self.db_path.clone();
        let cache_key = cache_key.to_string();

        task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM query_history
                 WHERE cache_key = ?1 AND successful = 1
                 ORDER BY id DESC LIMIT 1",
                HISTORY_COLUMNS
            ))?;

            let record = stmt.query_row(params![cache_key], history_from_row).optional()?;
            Ok::<_, anyhow::Error>(record)
        })
        .await?
    }

    pub async fn record_translation(
        &self,
        natural_query: &str,
        cache_key: &str,
        sql_query: &str,
        successful: bool,
        error_message: Option<&str>,
    ) -> Result<TranslationRecord> {
        let db_path = self.db_path.clone();
        let mut record = TranslationRecord {
            id: 0,
            natural_query: natural_query.to_string(),
            cache_key: cache_key.to_string(),
            sql_query: sql_query.to_string(),
            successful,
            error_message: error_message.map(str::to_string),
            created_at: now(),
        };

        task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)?;
            conn.execute(
                "INSERT INTO query_history
                 (natural_query, cache_key, sql_query, successful, error_message, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.natural_query,
                    record.cache_key,
                    record.sql_query,
                    record.successful,
                    record.error_message,
                    record.created_at
                ],
            )?;
            record.id = conn.last_insert_rowid();
            Ok::<_, anyhow::Error>(record)
        })
        .await?
    }

    pub async fn get_translation(&self, id: i64) -> Result<Option<TranslationRecord>> {
        let db_path = self.db_path.clone();

        task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM query_history WHERE id = ?1",
                HISTORY_COLUMNS
            ))?;
            let record = stmt.query_row(params![id], history_from_row).optional()?;
            Ok::<_, anyhow::Error>(record)
        })
        .await?
    }

    /// Newest first, optionally filtered by outcome.
    pub async fn recent_translations(
        &self,
        limit: usize,
        successful: Option<bool>,
    ) -> Result<Vec<TranslationRecord>> {
        let db_path = self.db_path.clone();

        task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM query_history
                 WHERE (?1 IS NULL OR successful = ?1)
                 ORDER BY id DESC LIMIT ?2",
                HISTORY_COLUMNS
            ))?;

            let rows = stmt.query_map(params![successful, limit as i64], history_from_row)?;
            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok::<_, anyhow::Error>(records)
        })
        .await?
    }

    /// Stores feedback for an existing history row; `None` when the row
    /// does not exist.
    pub async fn add_feedback(&self, feedback: NewFeedback) -> Result<Option<QueryFeedback>> {
        let db_path = self.db_path.clone();

        task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)?;
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM query_history WHERE id = ?1)",
                params![feedback.query_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Ok(None);
            }

            let created_at = now();
            conn.execute(
                "INSERT INTO query_feedback
                 (query_id, was_helpful, feedback_type, user_comment, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    feedback.query_id,
                    feedback.was_helpful,
                    feedback.feedback_type.as_str(),
                    feedback.user_comment,
                    created_at
                ],
            )?;

            Ok::<_, anyhow::Error>(Some(QueryFeedback {
                id: conn.last_insert_rowid(),
                query_id: feedback.query_id,
                was_helpful: feedback.was_helpful,
                feedback_type: feedback.feedback_type,
                user_comment: feedback.user_comment,
                created_at,
            }))
        })
        .await?
    }

    pub async fn feedback_for_query(&self, query_id: i64) -> Result<Vec<QueryFeedback>> {
        let db_path = self.db_path.clone();

        task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)?;
            let mut stmt = conn.prepare(
                "SELECT id, query_id, was_helpful, feedback_type, user_comment, created_at
                 FROM query_feedback WHERE query_id = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![query_id], feedback_from_row)?;
            let mut feedback = Vec::new();
            for row in rows {
                feedback.push(row?);
            }
            Ok::<_, anyhow::Error>(feedback)
        })
        .await?
    }

    pub async fn add_learning_example(&self, example: NewLearningExample) -> Result<LearningExample> {
        let db_path = self.db_path.clone();

        task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)?;
            let created_at = now();
            let context = serde_json::to_string(&example.conversation_context)?;
            conn.execute(
                "INSERT INTO learning_examples
                 (original_query, successful_sql, conversation_context, notes, approved_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    example.original_query,
                    example.successful_sql,
                    context,
                    example.notes,
                    example.approved_by,
                    created_at
                ],
            )?;

            Ok::<_, anyhow::Error>(LearningExample {
                id: conn.last_insert_rowid(),
                original_query: example.original_query,
                successful_sql: example.successful_sql,
                conversation_context: example.conversation_context,
                notes: example.notes,
                approved_by: example.approved_by,
                created_at,
            })
        })
        .await?
    }

    /// Newest first.
    pub async fn recent_learning_examples(&self, limit: usize) -> Result<Vec<LearningExample>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let db_path = self.db_path.clone();

        task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)?;
            let mut stmt = conn.prepare(
                "SELECT id, original_query, successful_sql, conversation_context,
                        notes, approved_by, created_at
                 FROM learning_examples ORDER BY id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit as i64], learning_example_from_row)?;
            let mut examples = Vec::new();
            for row in rows {
                examples.push(row?);
            }
            Ok::<_, anyhow::Error>(examples)
        })
        .await?
    }
}
