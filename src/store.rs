//! Storage abstraction for the analysis engine.
//!
//! The [`Store`] trait covers the two things the engine persists: reference
//! corpus entries (so the plagiarism index survives restarts) and completed
//! analysis results. Implementations must be `Send + Sync`; the in-memory
//! store backs tests, the SQLite store (in [`crate::db`]) backs the CLI.
//!
//! Corpus rows persist `(id, text, dedup_hash, vocab_version, added_at)`
//! only — vectors are recomputed deterministically from text at load time,
//! so they are never written to disk.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::AnalysisResult;

/// One persisted reference-corpus entry.
#[derive(Debug, Clone)]
pub struct CorpusRecord {
    pub id: String,
    pub text: String,
    pub dedup_hash: String,
    /// Vocabulary snapshot the entry was last vectorized under.
    pub vocab_version: u64,
    pub added_at: DateTime<Utc>,
}

/// Abstract persistence backend for corpus entries and analysis results.
#[async_trait]
pub trait Store: Send + Sync {
    /// All persisted corpus entries, in insertion order.
    async fn load_corpus(&self) -> Result<Vec<CorpusRecord>>;

    /// Append one corpus entry. Duplicate `dedup_hash` values are rejected
    /// by the backend.
    async fn append_corpus_entry(&self, record: &CorpusRecord) -> Result<()>;

    /// Record one completed analysis.
    async fn record_analysis(&self, result: &AnalysisResult) -> Result<()>;
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryStore {
    corpus: std::sync::Mutex<Vec<CorpusRecord>>,
    analyses: std::sync::Mutex<Vec<AnalysisResult>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every recorded analysis.
    pub fn analyses(&self) -> Vec<AnalysisResult> {
        self.analyses.lock().unwrap().clone()
    }

    pub fn corpus_len(&self) -> usize {
        self.corpus.lock().unwrap().len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load_corpus(&self) -> Result<Vec<CorpusRecord>> {
        Ok(self.corpus.lock().unwrap().clone())
    }

    async fn append_corpus_entry(&self, record: &CorpusRecord) -> Result<()> {
        let mut corpus = self.corpus.lock().unwrap();
        if corpus.iter().any(|r| r.dedup_hash == record.dedup_hash) {
            anyhow::bail!("corpus entry with identical content already exists");
        }
        corpus.push(record.clone());
        Ok(())
    }

    async fn record_analysis(&self, result: &AnalysisResult) -> Result<()> {
        self.analyses.lock().unwrap().push(result.clone());
        Ok(())
    }
}
