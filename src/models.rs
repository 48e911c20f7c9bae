//! Core data models for the analysis pipeline.
//!
//! These types represent the document under analysis, the per-stage
//! outcomes produced by the executor, and the composite [`AnalysisResult`]
//! returned to callers. The result serializes to JSON with explicit `null`
//! for fields whose stage did not succeed — an absent plagiarism report is
//! never collapsed into a genuine 0.0 score.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{StageError, StageErrorKind};

/// Immutable input to one analysis run. Owned by the caller; the engine
/// only reads it.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub raw_text: String,
    pub word_count: usize,
    pub language: Option<String>,
}

impl Document {
    /// Build a document from extracted text, deriving the word count.
    pub fn from_text(id: impl Into<String>, raw_text: impl Into<String>) -> Self {
        let raw_text = raw_text.into();
        let word_count = raw_text.split_whitespace().count();
        Self {
            id: id.into(),
            raw_text,
            word_count,
            language: None,
        }
    }
}

/// One of the four analysis stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Summarizer,
    Plagiarism,
    Citations,
    FactCheck,
}

impl StageName {
    pub const ALL: [StageName; 4] = [
        StageName::Summarizer,
        StageName::Plagiarism,
        StageName::Citations,
        StageName::FactCheck,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Summarizer => "summarizer",
            StageName::Plagiarism => "plagiarism",
            StageName::Citations => "citations",
            StageName::FactCheck => "fact_check",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload carried by a successful stage run.
#[derive(Debug, Clone)]
pub enum StagePayload {
    Summary(String),
    Plagiarism(PlagiarismReport),
    Citations(Vec<Citation>),
    FactChecks(Vec<FactCheck>),
}

/// Terminal outcome of one stage for one run.
#[derive(Debug, Clone)]
pub enum StageResult {
    Success(StagePayload),
    Failed {
        kind: StageErrorKind,
        message: String,
    },
    TimedOut,
    Skipped,
}

impl StageResult {
    pub fn failed(err: StageError) -> Self {
        StageResult::Failed {
            kind: err.kind,
            message: err.message,
        }
    }

    /// The serializable tag recorded in `stage_statuses`.
    pub fn status(&self) -> StageStatus {
        match self {
            StageResult::Success(_) => StageStatus::Success,
            StageResult::Failed { kind, message } => StageStatus::Failed {
                kind: *kind,
                message: message.clone(),
            },
            StageResult::TimedOut => StageStatus::TimedOut,
            StageResult::Skipped => StageStatus::Skipped,
        }
    }
}

/// Payload-free stage outcome, as exposed in [`AnalysisResult::stage_statuses`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageStatus {
    Success,
    Failed {
        kind: StageErrorKind,
        message: String,
    },
    TimedOut,
    Skipped,
}

/// A corpus entry matched by the plagiarism scorer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedSource {
    pub corpus_entry_id: String,
    pub similarity: f64,
}

/// Plagiarism stage output: the maximum corpus similarity plus the ranked
/// match list (descending similarity).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlagiarismReport {
    /// Maximum cosine similarity against the corpus, in `[0.0, 1.0]`.
    pub score: f64,
    pub matched_sources: Vec<MatchedSource>,
}

/// Resolution outcome for a single extracted citation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationStatus {
    /// The resolver returned a matching work.
    Verified,
    /// The resolver answered and found no matching work.
    NotFound,
    /// No resolvable identifier could be parsed; no lookup was attempted.
    Unverifiable,
    /// The lookup itself failed; existence of the work is unknown.
    LookupFailed,
}

/// One extracted citation and its validation outcome.
#[derive(Debug, Clone, Serialize)]
pub struct Citation {
    pub raw_text: String,
    pub parsed_identifier: Option<String>,
    pub status: CitationStatus,
}

/// Verdict for a single fact-checked claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Supported,
    Disputed,
    Unverified,
    LookupFailed,
}

/// One candidate claim and its fact-check verdict.
#[derive(Debug, Clone, Serialize)]
pub struct FactCheck {
    pub claim: String,
    pub verdict: Verdict,
    pub source_url: Option<String>,
}

/// How much of the stage set completed successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    /// Every stage succeeded.
    Complete,
    /// Some stages succeeded; missing fields are explained by `stage_statuses`.
    PartialSuccess,
    /// Every stage failed or timed out.
    Failed,
}

/// Composite result of one orchestration run. Created once per run and
/// immutable after aggregation; never exposed mid-run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub document_id: String,
    pub summary: Option<String>,
    pub plagiarism: Option<PlagiarismReport>,
    pub citations: Option<Vec<Citation>>,
    pub fact_checks: Option<Vec<FactCheck>>,
    pub overall_status: OverallStatus,
    pub stage_statuses: BTreeMap<StageName, StageStatus>,
    pub created_at: DateTime<Utc>,
}
