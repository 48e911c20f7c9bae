//! Library-level tests of the full analysis engine: stage fan-out,
//! deadlines, aggregation invariants, and corpus behavior across runs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};

use paperlens::config::{CorpusConfig, ExecutorConfig};
use paperlens::corpus::CorpusIndex;
use paperlens::error::StageError;
use paperlens::executor::StageExecutor;
use paperlens::lookup::{Lookup, LookupError};
use paperlens::models::{
    Document, OverallStatus, StageName, StagePayload, StageStatus,
};
use paperlens::orchestrator::AnalysisEngine;
use paperlens::stages::citations::CitationValidator;
use paperlens::stages::factcheck::FactChecker;
use paperlens::stages::plagiarism::PlagiarismScorer;
use paperlens::stages::summarizer::{Summarizer, SummarizerBackend};
use paperlens::stages::Stage;
use paperlens::store::{MemoryStore, Store};

const PAPER: &str = "\
This study proposes a novel framework for automated research-paper analysis. \
The global mean surface temperature has risen by about one degree Celsius since 1900. \
Experimental results demonstrate significant improvements over all baseline methods. \
We conclude that the proposed approach generalizes across domains and document lengths.

References
1. Smith, J. (2020). Deep learning for citation parsing. Journal of AI, 12(3), 45-67.
2. Doe, A. \"A survey of plagiarism detection methods\". Proceedings of TextConf.
";

struct CannedLookup(Value);

#[async_trait]
impl Lookup for CannedLookup {
    fn service_name(&self) -> &str {
        "canned"
    }

    async fn lookup(&self, _query: &str) -> Result<Value, LookupError> {
        Ok(self.0.clone())
    }
}

struct HangingLookup;

#[async_trait]
impl Lookup for HangingLookup {
    fn service_name(&self) -> &str {
        "hanging"
    }

    async fn lookup(&self, _query: &str) -> Result<Value, LookupError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        unreachable!()
    }
}

struct HangingSummarizer;

#[async_trait]
impl Stage for HangingSummarizer {
    fn name(&self) -> StageName {
        StageName::Summarizer
    }

    async fn run(&self, _document: &Document) -> Result<StagePayload, StageError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        unreachable!()
    }
}

fn crossref_found() -> Value {
    json!({"message": {"items": [{"title": ["A matching work"], "DOI": "10.1/x"}]}})
}

fn factcheck_supported() -> Value {
    json!({
        "claims": [{
            "claimReview": [{
                "textualRating": "Accurate",
                "url": "https://factcheck.example/review"
            }]
        }]
    })
}

fn test_corpus() -> Arc<CorpusIndex> {
    Arc::new(CorpusIndex::new(&CorpusConfig {
        top_k: 5,
        similarity_floor: 0.0,
        min_text_chars: 1,
    }))
}

fn executor_with_deadline(secs: u64) -> StageExecutor {
    StageExecutor::new(&ExecutorConfig {
        stage_deadline_secs: secs,
        summarizer_deadline_secs: secs,
        max_attempts: 3,
        retry_base_delay_ms: 10,
    })
}

/// All four real stages over injected corpus, store, and lookups.
fn full_stage_set(
    corpus: Arc<CorpusIndex>,
    store: Arc<MemoryStore>,
    citation_lookup: Arc<dyn Lookup>,
    factcheck_lookup: Option<Arc<dyn Lookup>>,
) -> Vec<Arc<dyn Stage>> {
    vec![
        Arc::new(Summarizer::new(SummarizerBackend::Extractive, 1200, 200, 100)),
        Arc::new(PlagiarismScorer::new(corpus, store as Arc<dyn Store>, 5)),
        Arc::new(CitationValidator::new(citation_lookup, 50)),
        Arc::new(FactChecker::new(factcheck_lookup, 20, 40)),
    ]
}

#[tokio::test]
async fn all_stages_succeeding_yields_a_complete_result() {
    let store = Arc::new(MemoryStore::new());
    let stages = full_stage_set(
        test_corpus(),
        store.clone(),
        Arc::new(CannedLookup(crossref_found())),
        Some(Arc::new(CannedLookup(factcheck_supported()))),
    );
    let engine = AnalysisEngine::with_stages(executor_with_deadline(30), stages, store.clone());

    let doc = Document::from_text("paper-1", PAPER);
    let result = engine.analyze(&doc).await.unwrap();

    assert_eq!(result.document_id, "paper-1");
    assert_eq!(result.overall_status, OverallStatus::Complete);
    assert!(result
        .stage_statuses
        .values()
        .all(|s| *s == StageStatus::Success));
    assert!(result.summary.is_some());
    assert!(result.plagiarism.is_some());
    assert!(!result.citations.as_ref().unwrap().is_empty());
    assert!(!result.fact_checks.as_ref().unwrap().is_empty());
    assert_eq!(store.analyses().len(), 1);
}

#[tokio::test]
async fn timed_out_summarizer_yields_partial_success_with_summary_absent() {
    let store = Arc::new(MemoryStore::new());
    let mut stages = full_stage_set(
        test_corpus(),
        store.clone(),
        Arc::new(CannedLookup(crossref_found())),
        Some(Arc::new(CannedLookup(factcheck_supported()))),
    );
    stages[0] = Arc::new(HangingSummarizer);
    let engine = AnalysisEngine::with_stages(executor_with_deadline(1), stages, store);

    let doc = Document::from_text("paper-1", PAPER);
    let started = Instant::now();
    let result = engine.analyze(&doc).await.unwrap();

    assert_eq!(result.overall_status, OverallStatus::PartialSuccess);
    assert!(result.summary.is_none());
    assert_eq!(
        result.stage_statuses[&StageName::Summarizer],
        StageStatus::TimedOut
    );
    // The hanging stage must not delay the run past its deadline.
    assert!(started.elapsed() < Duration::from_secs(10));

    // Absent fields serialize as explicit null, distinguishable from empty.
    let json = serde_json::to_value(&result).unwrap();
    assert!(json["summary"].is_null());
    assert!(json["plagiarism"].is_object());
}

#[tokio::test]
async fn unreachable_citation_service_is_bounded_by_the_deadline() {
    let store = Arc::new(MemoryStore::new());
    let stages = full_stage_set(
        test_corpus(),
        store.clone(),
        Arc::new(HangingLookup),
        None,
    );
    let engine = AnalysisEngine::with_stages(executor_with_deadline(1), stages, store);

    let doc = Document::from_text("paper-1", PAPER);
    let started = Instant::now();
    let result = engine.analyze(&doc).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(
        result.stage_statuses[&StageName::Citations],
        StageStatus::TimedOut
    );
    assert!(result.citations.is_none());
    // Fact checker had no lookup configured.
    assert_eq!(
        result.stage_statuses[&StageName::FactCheck],
        StageStatus::Skipped
    );
    assert_eq!(result.overall_status, OverallStatus::PartialSuccess);
}

#[tokio::test]
async fn reanalysis_never_matches_the_document_against_itself() {
    let corpus = test_corpus();
    let store = Arc::new(MemoryStore::new());
    let stages = full_stage_set(
        Arc::clone(&corpus),
        store.clone(),
        Arc::new(CannedLookup(crossref_found())),
        None,
    );
    let engine = AnalysisEngine::with_stages(executor_with_deadline(30), stages, store);

    let doc = Document::from_text("paper-1", PAPER);

    let first = engine.analyze(&doc).await.unwrap();
    assert_eq!(first.plagiarism.as_ref().unwrap().score, 0.0);
    let ids_after_first = corpus.entry_ids();
    assert_eq!(ids_after_first.len(), 1);

    let second = engine.analyze(&doc).await.unwrap();
    let report = second.plagiarism.as_ref().unwrap();
    assert_eq!(report.score, 0.0);
    assert!(report.matched_sources.is_empty());
    assert_eq!(corpus.entry_ids(), ids_after_first);
}

#[tokio::test]
async fn corpus_duplicate_scores_near_one_across_documents() {
    let corpus = test_corpus();
    corpus.insert(PAPER);
    let store = Arc::new(MemoryStore::new());
    let stages = full_stage_set(
        Arc::clone(&corpus),
        store.clone(),
        Arc::new(CannedLookup(crossref_found())),
        None,
    );
    let engine = AnalysisEngine::with_stages(executor_with_deadline(30), stages, store);

    // Same wording under a different document id and punctuation.
    let doc = Document::from_text("paper-2", PAPER.replace('.', "!"));
    let result = engine.analyze(&doc).await.unwrap();
    let report = result.plagiarism.as_ref().unwrap();
    assert!(report.score > 0.9, "got {}", report.score);
    assert_eq!(report.matched_sources[0].similarity, report.score);
}

#[tokio::test]
async fn each_run_produces_a_fresh_result() {
    let store = Arc::new(MemoryStore::new());
    let stages = full_stage_set(
        test_corpus(),
        store.clone(),
        Arc::new(CannedLookup(crossref_found())),
        None,
    );
    let engine = AnalysisEngine::with_stages(executor_with_deadline(30), stages, store.clone());

    let doc = Document::from_text("paper-1", PAPER);
    engine.analyze(&doc).await.unwrap();
    engine.analyze(&doc).await.unwrap();

    let analyses = store.analyses();
    assert_eq!(analyses.len(), 2);
    assert!(analyses.iter().all(|a| a.document_id == "paper-1"));
}

#[tokio::test]
async fn concurrent_runs_share_the_corpus_without_losing_entries() {
    let corpus = test_corpus();
    let store = Arc::new(MemoryStore::new());

    let mut handles = Vec::new();
    for i in 0..4 {
        let stages = full_stage_set(
            Arc::clone(&corpus),
            store.clone(),
            Arc::new(CannedLookup(crossref_found())),
            None,
        );
        let engine =
            AnalysisEngine::with_stages(executor_with_deadline(30), stages, store.clone());
        handles.push(tokio::spawn(async move {
            let doc = Document::from_text(
                format!("paper-{i}"),
                format!("Document number {i} contains its own distinct wording about topic {i}."),
            );
            engine.analyze(&doc).await.unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    // Every concurrent insertion landed; none were lost or duplicated.
    assert_eq!(corpus.len(), 4);
    assert_eq!(store.corpus_len(), 4);
}
