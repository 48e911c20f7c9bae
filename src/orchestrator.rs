//! Top-level analysis engine.
//!
//! [`AnalysisEngine::analyze`] is the one entry point: validate the
//! document, fan out the stage set through the executor, aggregate, record
//! the result, return it. Stage construction — summarizer backend
//! selection, lookup clients, enablement — happens once when the engine is
//! built from config; per-stage faults never escape `analyze`.

use std::sync::Arc;

use anyhow::Result;

use crate::aggregate::aggregate;
use crate::config::Config;
use crate::corpus::CorpusIndex;
use crate::error::AnalysisError;
use crate::executor::StageExecutor;
use crate::lookup::{CrossRefLookup, FactCheckLookup, Lookup, RemoteSummaryLookup};
use crate::models::{AnalysisResult, Document};
use crate::stages::citations::CitationValidator;
use crate::stages::factcheck::FactChecker;
use crate::stages::plagiarism::PlagiarismScorer;
use crate::stages::summarizer::{Summarizer, SummarizerBackend};
use crate::stages::Stage;
use crate::store::Store;

pub struct AnalysisEngine {
    stages: Vec<Arc<dyn Stage>>,
    executor: StageExecutor,
    store: Arc<dyn Store>,
}

impl AnalysisEngine {
    /// Build the full four-stage engine from config, loading the persisted
    /// corpus into a fresh index.
    pub async fn from_config(config: &Config, store: Arc<dyn Store>) -> Result<Self> {
        let corpus = Arc::new(CorpusIndex::new(&config.corpus));
        let records = store.load_corpus().await?;
        corpus.load(records.into_iter().map(|r| (r.id, r.text)));

        let backend = match config.summarizer.backend.as_str() {
            "remote" => SummarizerBackend::Remote(Arc::new(RemoteSummaryLookup::new(
                &config.summarizer,
                config.summarizer.endpoint.clone(),
            )?)),
            _ => SummarizerBackend::Extractive,
        };
        let summarizer = Summarizer::new(
            backend,
            config.summarizer.max_input_chars,
            config.summarizer.target_words,
            config.corpus.min_text_chars,
        );

        let plagiarism = PlagiarismScorer::new(
            Arc::clone(&corpus),
            Arc::clone(&store),
            config.corpus.top_k,
        );

        let citations = CitationValidator::new(
            Arc::new(CrossRefLookup::new(&config.citations)?),
            config.citations.max_citations,
        );

        // Without a key the fact checker stays disabled and is skipped.
        let factcheck_key = std::env::var(&config.factcheck.api_key_env)
            .ok()
            .filter(|k| !k.is_empty());
        let factcheck_lookup: Option<Arc<dyn Lookup>> = match factcheck_key {
            Some(key) => Some(Arc::new(FactCheckLookup::new(&config.factcheck, key)?)),
            None => None,
        };
        let factcheck = FactChecker::new(
            factcheck_lookup,
            config.factcheck.max_claims,
            config.factcheck.min_claim_chars,
        );

        Ok(Self {
            stages: vec![
                Arc::new(summarizer),
                Arc::new(plagiarism),
                Arc::new(citations),
                Arc::new(factcheck),
            ],
            executor: StageExecutor::new(&config.executor),
            store,
        })
    }

    /// Build an engine over an explicit stage set. Tests inject stubs here.
    pub fn with_stages(
        executor: StageExecutor,
        stages: Vec<Arc<dyn Stage>>,
        store: Arc<dyn Store>,
    ) -> Self {
        Self {
            stages,
            executor,
            store,
        }
    }

    /// Analyze one document. Every call produces a fresh result; re-running
    /// a document never mutates a prior result.
    pub async fn analyze(&self, document: &Document) -> Result<AnalysisResult, AnalysisError> {
        if document.raw_text.trim().is_empty() {
            return Err(AnalysisError::EmptyDocument(document.id.clone()));
        }

        let stage_results = self.executor.execute(document, &self.stages).await;
        if stage_results.is_empty() {
            return Err(AnalysisError::Executor(
                "no stages produced a result".to_string(),
            ));
        }
        let result = aggregate(&document.id, stage_results);

        // Persistence is best-effort; the caller still gets the result.
        if let Err(err) = self.store.record_analysis(&result).await {
            eprintln!("Warning: failed to record analysis result: {err}");
        }
        Ok(result)
    }
}
