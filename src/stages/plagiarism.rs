//! Plagiarism scoring stage.
//!
//! Queries the shared corpus index for the top-k most similar reference
//! texts, reports the maximum similarity as the score, then inserts the
//! analyzed document into the index so later analyses can detect
//! cross-document similarity. The insert happens strictly after the query,
//! and identical content is never matched against itself.

use std::sync::Arc;

use async_trait::async_trait;

use crate::corpus::{CorpusIndex, InsertOutcome};
use crate::error::StageError;
use crate::models::{Document, MatchedSource, PlagiarismReport, StageName, StagePayload};
use crate::stages::Stage;
use crate::store::{CorpusRecord, Store};

pub struct PlagiarismScorer {
    corpus: Arc<CorpusIndex>,
    store: Arc<dyn Store>,
    top_k: usize,
}

impl PlagiarismScorer {
    pub fn new(corpus: Arc<CorpusIndex>, store: Arc<dyn Store>, top_k: usize) -> Self {
        Self {
            corpus,
            store,
            top_k,
        }
    }
}

#[async_trait]
impl Stage for PlagiarismScorer {
    fn name(&self) -> StageName {
        StageName::Plagiarism
    }

    async fn run(&self, document: &Document) -> Result<StagePayload, StageError> {
        let matches = self.corpus.query_top_matches(&document.raw_text, self.top_k);
        let report = PlagiarismReport {
            score: matches.first().map(|m| m.similarity).unwrap_or(0.0),
            matched_sources: matches
                .into_iter()
                .map(|m| MatchedSource {
                    corpus_entry_id: m.entry_id,
                    similarity: m.similarity,
                })
                .collect(),
        };

        // Append after query, never before — the document must not score
        // against itself.
        if let InsertOutcome::Added(meta) = self.corpus.insert(&document.raw_text) {
            let record = CorpusRecord {
                id: meta.id,
                text: document.raw_text.clone(),
                dedup_hash: meta.dedup_hash,
                vocab_version: meta.vocab_version,
                added_at: meta.added_at,
            };
            if let Err(err) = self.store.append_corpus_entry(&record).await {
                eprintln!("Warning: failed to persist corpus entry: {err}");
            }
        }

        Ok(StagePayload::Plagiarism(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CorpusConfig;
    use crate::store::MemoryStore;

    fn scorer_with(texts: &[&str]) -> (PlagiarismScorer, Arc<CorpusIndex>, Arc<MemoryStore>) {
        let corpus = Arc::new(CorpusIndex::new(&CorpusConfig {
            top_k: 5,
            similarity_floor: 0.0,
            min_text_chars: 1,
        }));
        for text in texts {
            corpus.insert(text);
        }
        let store = Arc::new(MemoryStore::new());
        let scorer = PlagiarismScorer::new(Arc::clone(&corpus), store.clone() as Arc<dyn Store>, 5);
        (scorer, corpus, store)
    }

    fn report(payload: StagePayload) -> PlagiarismReport {
        match payload {
            StagePayload::Plagiarism(report) => report,
            other => panic!("expected plagiarism payload, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn empty_corpus_scores_zero() {
        let (scorer, _, _) = scorer_with(&[]);
        let doc = Document::from_text("doc-1", "Fresh text the corpus has never seen before.");
        let report = report(scorer.run(&doc).await.unwrap());
        assert_eq!(report.score, 0.0);
        assert!(report.matched_sources.is_empty());
    }

    #[tokio::test]
    async fn exact_duplicate_ranks_first_with_high_score() {
        let (scorer, _, _) = scorer_with(&[
            "The quick brown fox jumps.",
            "Astronomy concerns celestial bodies and their motion.",
        ]);
        let doc = Document::from_text("doc-1", "The quick brown fox jumps!");
        let report = report(scorer.run(&doc).await.unwrap());
        assert!(report.score >= 0.999, "got {}", report.score);
        assert_eq!(report.matched_sources[0].similarity, report.score);
    }

    #[tokio::test]
    async fn unrelated_text_scores_near_zero() {
        let (scorer, _, _) = scorer_with(&["The quick brown fox jumps."]);
        let doc = Document::from_text("doc-1", "Completely unrelated content about astronomy.");
        let report = report(scorer.run(&doc).await.unwrap());
        assert!(report.score < 0.1, "got {}", report.score);
    }

    #[tokio::test]
    async fn document_is_inserted_after_scoring() {
        let (scorer, corpus, store) = scorer_with(&[]);
        let doc = Document::from_text("doc-1", "Each analyzed document grows the corpus.");
        scorer.run(&doc).await.unwrap();
        assert_eq!(corpus.len(), 1);
        assert_eq!(store.corpus_len(), 1);
    }

    #[tokio::test]
    async fn reanalyzing_the_same_document_never_self_matches() {
        let (scorer, corpus, store) = scorer_with(&[]);
        let doc = Document::from_text("doc-1", "A document analyzed twice must not match itself.");

        scorer.run(&doc).await.unwrap();
        let ids_after_first = corpus.entry_ids();

        // Second run queries the updated corpus, which now contains the
        // document's own text.
        let second = report(scorer.run(&doc).await.unwrap());
        assert_eq!(second.score, 0.0);
        assert!(second.matched_sources.is_empty());
        assert_eq!(corpus.entry_ids(), ids_after_first);
        assert_eq!(store.corpus_len(), 1);
    }
}
