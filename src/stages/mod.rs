//! The four analysis stage adapters.
//!
//! Every adapter implements [`Stage`]: one document in, one payload or a
//! classified [`StageError`] out. Adapters are pure with respect to the
//! document and safe to run concurrently; the executor owns deadlines,
//! retries, and fault isolation, so adapters never loop on transient
//! errors themselves.

pub mod citations;
pub mod factcheck;
pub mod plagiarism;
pub mod summarizer;

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::error::StageError;
use crate::models::{Document, StageName, StagePayload};

/// Uniform contract for one analysis stage.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> StageName;

    /// Disabled stages are recorded as skipped without being spawned.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Run one attempt over the document. Transient errors may be retried
    /// by the executor; internal errors end the stage immediately.
    async fn run(&self, document: &Document) -> Result<StagePayload, StageError>;
}

static SENTENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^.!?]+[.!?]+|[^.!?]+$").unwrap());

/// Split text into sentences, keeping terminal punctuation. Fragments of
/// ten characters or fewer are dropped.
pub(crate) fn split_sentences(text: &str) -> Vec<String> {
    SENTENCE_RE
        .find_iter(text)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| s.len() > 10)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_terminal_punctuation() {
        let sentences = split_sentences(
            "The study shows clear results. Does it generalize? Further work is needed!",
        );
        assert_eq!(
            sentences,
            vec![
                "The study shows clear results.",
                "Does it generalize?",
                "Further work is needed!",
            ]
        );
    }

    #[test]
    fn drops_short_fragments() {
        let sentences = split_sentences("Yes. This sentence is long enough to keep.");
        assert_eq!(sentences, vec!["This sentence is long enough to keep."]);
    }

    #[test]
    fn keeps_trailing_unterminated_text() {
        let sentences = split_sentences("A full sentence here. and a trailing fragment tail");
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[1], "and a trailing fragment tail");
    }
}
