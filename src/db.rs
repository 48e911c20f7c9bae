//! SQLite persistence: connection setup, schema migrations, and the
//! [`SqliteStore`] backend used by the CLI.

use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::config::Config;
use crate::models::AnalysisResult;
use crate::store::{CorpusRecord, Store};

pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Create the schema. Idempotent — safe to run on an existing database.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = connect(config).await?;

    // Create corpus entries table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS corpus_entries (
            id TEXT PRIMARY KEY,
            text TEXT NOT NULL,
            dedup_hash TEXT NOT NULL UNIQUE,
            vocab_version INTEGER NOT NULL,
            added_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Create analyses table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analyses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            document_id TEXT NOT NULL,
            overall_status TEXT NOT NULL,
            result_json TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_corpus_added_at ON corpus_entries(added_at)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_analyses_document_id ON analyses(document_id)")
        .execute(&pool)
        .await?;

    pool.close().await;
    Ok(())
}

/// SQLite-backed [`Store`].
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(config: &Config) -> Result<Self> {
        let pool = connect(config).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn load_corpus(&self) -> Result<Vec<CorpusRecord>> {
        let rows = sqlx::query(
            "SELECT id, text, dedup_hash, vocab_version, added_at
             FROM corpus_entries ORDER BY added_at, id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let added_ts: i64 = row.get("added_at");
            records.push(CorpusRecord {
                id: row.get("id"),
                text: row.get("text"),
                dedup_hash: row.get("dedup_hash"),
                vocab_version: row.get::<i64, _>("vocab_version") as u64,
                added_at: chrono::DateTime::from_timestamp(added_ts, 0)
                    .unwrap_or_else(chrono::Utc::now),
            });
        }
        Ok(records)
    }

    async fn append_corpus_entry(&self, record: &CorpusRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO corpus_entries (id, text, dedup_hash, vocab_version, added_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.text)
        .bind(&record.dedup_hash)
        .bind(record.vocab_version as i64)
        .bind(record.added_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_analysis(&self, result: &AnalysisResult) -> Result<()> {
        let result_json = serde_json::to_string(result)?;
        sqlx::query(
            "INSERT INTO analyses (document_id, overall_status, result_json, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&result.document_id)
        .bind(serde_json::to_value(result.overall_status)?.as_str().unwrap_or("unknown").to_string())
        .bind(result_json)
        .bind(result.created_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
