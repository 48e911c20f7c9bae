//! Summarization stage.
//!
//! Two backends, chosen when the engine is built: `Remote` sends a capped
//! chunk of the document to a hosted summarization model through the
//! [`Lookup`] contract, and `Extractive` condenses the document locally by
//! sentence scoring. A remote failure of any kind degrades to the
//! extractive path with a warning instead of failing the stage; the
//! extractive path itself only fails on input with no sentences.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StageError;
use crate::lookup::Lookup;
use crate::models::{Document, StageName, StagePayload};
use crate::stages::{split_sentences, Stage};

/// Terms that mark a sentence as carrying the paper's substance.
const IMPORTANT_KEYWORDS: &[&str] = &[
    "study",
    "result",
    "method",
    "conclude",
    "finding",
    "research",
    "analysis",
    "experiment",
    "data",
    "significant",
    "demonstrate",
    "propose",
    "novel",
    "approach",
    "framework",
    "model",
    "algorithm",
];

/// Summarization backend, fixed at construction.
pub enum SummarizerBackend {
    /// Hosted model reached through the lookup contract.
    Remote(Arc<dyn Lookup>),
    /// Local sentence-scoring condensation.
    Extractive,
}

pub struct Summarizer {
    backend: SummarizerBackend,
    /// Cap on the chunk sent to the remote model.
    max_input_chars: usize,
    /// Word budget for the extractive summary.
    target_words: usize,
    /// Documents shorter than this are returned as their own summary.
    min_doc_chars: usize,
}

impl Summarizer {
    pub fn new(
        backend: SummarizerBackend,
        max_input_chars: usize,
        target_words: usize,
        min_doc_chars: usize,
    ) -> Self {
        Self {
            backend,
            max_input_chars,
            target_words,
            min_doc_chars,
        }
    }

    async fn summarize_remote(&self, lookup: &dyn Lookup, text: &str) -> Result<String, StageError> {
        let chunk = truncate_at_sentence(text, self.max_input_chars);
        let value = lookup.lookup(chunk).await.map_err(StageError::from)?;
        let summary = value
            .get(0)
            .and_then(|item| item.get("summary_text"))
            .and_then(|s| s.as_str())
            .ok_or_else(|| {
                StageError::internal(format!(
                    "{}: response missing summary_text",
                    lookup.service_name()
                ))
            })?;
        let summary = summary.trim();
        if summary.is_empty() {
            return Err(StageError::internal(format!(
                "{}: empty summary returned",
                lookup.service_name()
            )));
        }
        Ok(summary.to_string())
    }
}

#[async_trait]
impl Stage for Summarizer {
    fn name(&self) -> StageName {
        StageName::Summarizer
    }

    async fn run(&self, document: &Document) -> Result<StagePayload, StageError> {
        let text = document.raw_text.trim();
        if text.is_empty() {
            return Err(StageError::internal("document is empty"));
        }
        // Too short to condense — the document is its own summary.
        if text.chars().count() < self.min_doc_chars {
            return Ok(StagePayload::Summary(text.to_string()));
        }

        let summary = match &self.backend {
            SummarizerBackend::Remote(lookup) => {
                match self.summarize_remote(lookup.as_ref(), text).await {
                    Ok(summary) => summary,
                    Err(err) => {
                        eprintln!(
                            "Warning: remote summarization failed ({}), falling back to extractive",
                            err
                        );
                        extractive_summary(text, self.target_words)?
                    }
                }
            }
            SummarizerBackend::Extractive => extractive_summary(text, self.target_words)?,
        };
        Ok(StagePayload::Summary(summary))
    }
}

/// Cut `text` to at most `max_chars` bytes on a char boundary, preferring
/// the last sentence end when one falls in the final 30% of the window.
fn truncate_at_sentence(text: &str, max_chars: usize) -> &str {
    if text.len() <= max_chars {
        return text;
    }
    let mut end = max_chars;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let chunk = &text[..end];
    if let Some(pos) = chunk.rfind('.') {
        if pos + 1 >= (max_chars * 7) / 10 {
            return &chunk[..=pos];
        }
    }
    chunk
}

/// Condense text by selecting the highest-scoring sentences and emitting
/// them in document order. Scoring favors medium-length sentences, research
/// vocabulary, and the opening/closing fifths of the document.
pub fn extractive_summary(text: &str, target_words: usize) -> Result<String, StageError> {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return Err(StageError::internal("no sentences to summarize"));
    }
    let total = sentences.len();

    let mut scored: Vec<(usize, u32)> = sentences
        .iter()
        .enumerate()
        .filter_map(|(index, sentence)| {
            let word_count = sentence.split_whitespace().count();
            if word_count < 5 {
                return None;
            }
            let mut score = 0u32;
            if (15..=30).contains(&word_count) {
                score += 2;
            } else if (10..=40).contains(&word_count) {
                score += 1;
            }
            let lower = sentence.to_lowercase();
            for keyword in IMPORTANT_KEYWORDS {
                if lower.contains(keyword) {
                    score += 1;
                }
            }
            if index * 5 < total {
                score += 1;
            } else if index * 5 >= total * 4 {
                score += 1;
            }
            Some((index, score))
        })
        .collect();

    // Highest score first; ties keep document order.
    scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut selected: Vec<usize> = Vec::new();
    let mut total_words = 0usize;
    for &(index, _) in &scored {
        let words = sentences[index].split_whitespace().count();
        if total_words + words <= target_words {
            selected.push(index);
            total_words += words;
        }
        if selected.len() >= 7 || total_words * 10 >= target_words * 9 {
            break;
        }
    }
    if selected.len() < 3 {
        for &(index, _) in &scored {
            if !selected.contains(&index) {
                selected.push(index);
                if selected.len() >= 5 {
                    break;
                }
            }
        }
    }
    if selected.is_empty() {
        // Nothing scored (all sentences under five words): lead with the text.
        selected = (0..total.min(3)).collect();
    }

    selected.sort_unstable();
    let summary = selected
        .into_iter()
        .map(|index| sentences[index].as_str())
        .collect::<Vec<_>>()
        .join(" ");
    Ok(summary)
}
