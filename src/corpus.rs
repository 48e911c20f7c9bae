//! Reference corpus index for plagiarism similarity scoring.
//!
//! Maintains sparse TF-IDF vectors over every known reference text and
//! answers top-k cosine-similarity queries against them. The index is
//! shared across concurrent analysis runs: inserts take the write lock
//! (serialized appends), queries take a read snapshot and never observe a
//! half-inserted entry.
//!
//! # Algorithm
//!
//! 1. Normalize: lowercase, split on non-alphanumeric boundaries, drop
//!    tokens shorter than two characters and English stopwords.
//! 2. Vocabulary terms are unigrams plus bigrams of the filtered stream.
//! 3. Weight: `tf × (ln((1 + n) / (1 + df)) + 1)` (smoothed IDF), then
//!    L2-normalize, so cosine similarity reduces to a dot product.
//! 4. Appending an entry invalidates the IDF statistics: all entry vectors
//!    are rebuilt in one batch against the new snapshot, keeping scores
//!    comparable between entries added at different times.
//!
//! Query vectors are built with the same vocabulary and weighting as the
//! current snapshot, so vectorizing one text twice against one snapshot is
//! exactly reproducible (term maps are ordered, no hash iteration order
//! leaks into the arithmetic).
//!
//! A query never matches the query's own text: entries whose content hash
//! equals the query hash are excluded, and re-inserting an already-known
//! text is a no-op.

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::CorpusConfig;

/// Words carrying no topical signal, excluded from the vocabulary.
const STOPWORDS: &[&str] = &[
    "a", "about", "after", "again", "all", "also", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her",
    "here", "hers", "him", "his", "how", "if", "in", "into", "is", "it",
    "its", "itself", "just", "more", "most", "my", "no", "nor", "not", "now",
    "of", "off", "on", "once", "only", "or", "other", "our", "out", "over",
    "own", "same", "she", "should", "so", "some", "such", "than", "that",
    "the", "their", "them", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "until", "up", "very", "was", "we",
    "were", "what", "when", "where", "which", "while", "who", "why", "will",
    "with", "would", "you", "your",
];

/// Sparse term-weight vector. Ordered keys keep recomputation deterministic.
type TermVector = BTreeMap<String, f64>;

/// Raw term counts for one text, kept so vectors can be rebuilt when the
/// vocabulary snapshot changes without re-tokenizing.
type TermCounts = BTreeMap<String, f64>;

/// Metadata for an entry accepted into the index.
#[derive(Debug, Clone)]
pub struct CorpusEntryMeta {
    pub id: String,
    pub dedup_hash: String,
    pub vocab_version: u64,
    pub added_at: DateTime<Utc>,
}

/// Outcome of an insert attempt.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    /// The text was appended and all vectors were rebuilt.
    Added(CorpusEntryMeta),
    /// An entry with identical content already exists; nothing changed.
    Duplicate(String),
    /// The text is below the configured minimum length; not indexed.
    TooShort,
}

/// One ranked match from [`CorpusIndex::query_top_matches`].
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusMatch {
    pub entry_id: String,
    pub similarity: f64,
}

struct IndexedEntry {
    id: String,
    dedup_hash: String,
    counts: TermCounts,
    vector: TermVector,
}

struct IndexState {
    entries: Vec<IndexedEntry>,
    /// Number of entries containing each term, for the current snapshot.
    doc_freq: BTreeMap<String, usize>,
    vocab_version: u64,
}

/// Shared, append-only TF-IDF index over the reference corpus.
///
/// Writes are serialized through the inner lock; reads see a consistent
/// snapshot. An index that was never populated answers queries with an
/// empty match list — the absence of known sources is a valid outcome,
/// not an error.
pub struct CorpusIndex {
    min_text_chars: usize,
    similarity_floor: f64,
    inner: RwLock<IndexState>,
}

impl CorpusIndex {
    pub fn new(config: &CorpusConfig) -> Self {
        Self {
            min_text_chars: config.min_text_chars,
            similarity_floor: config.similarity_floor,
            inner: RwLock::new(IndexState {
                entries: Vec::new(),
                doc_freq: BTreeMap::new(),
                vocab_version: 0,
            }),
        }
    }

    /// Content hash used for duplicate suppression and self-match exclusion.
    pub fn dedup_hash(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.trim().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Append one text to the index, rebuilding every vector against the
    /// new vocabulary snapshot.
    pub fn insert(&self, text: &str) -> InsertOutcome {
        if text.trim().len() < self.min_text_chars {
            return InsertOutcome::TooShort;
        }
        let counts = term_counts(text);
        if counts.is_empty() {
            return InsertOutcome::TooShort;
        }

        let hash = Self::dedup_hash(text);
        let mut state = self.inner.write().unwrap();
        if let Some(existing) = state.entries.iter().find(|e| e.dedup_hash == hash) {
            return InsertOutcome::Duplicate(existing.id.clone());
        }

        let id = Uuid::new_v4().to_string();
        state.entries.push(IndexedEntry {
            id: id.clone(),
            dedup_hash: hash.clone(),
            counts,
            vector: TermVector::new(),
        });
        rebuild(&mut state);

        InsertOutcome::Added(CorpusEntryMeta {
            id,
            dedup_hash: hash,
            vocab_version: state.vocab_version,
            added_at: Utc::now(),
        })
    }

    /// Bulk-load persisted entries, rebuilding vectors once at the end.
    ///
    /// Recomputation from text is deterministic, so persisted vectors are
    /// never needed — only `(id, text)` pairs.
    pub fn load(&self, records: impl IntoIterator<Item = (String, String)>) {
        let mut state = self.inner.write().unwrap();
        for (id, text) in records {
            let counts = term_counts(&text);
            if counts.is_empty() {
                continue;
            }
            let hash = Self::dedup_hash(&text);
            if state.entries.iter().any(|e| e.dedup_hash == hash) {
                continue;
            }
            state.entries.push(IndexedEntry {
                id,
                dedup_hash: hash,
                counts,
                vector: TermVector::new(),
            });
        }
        rebuild(&mut state);
    }

    /// Return up to `k` entries with similarity strictly above the floor,
    /// ordered by descending similarity. Entries whose content equals the
    /// query text are excluded. An empty or never-populated index yields
    /// an empty list.
    pub fn query_top_matches(&self, text: &str, k: usize) -> Vec<CorpusMatch> {
        let state = self.inner.read().unwrap();
        if state.entries.is_empty() || k == 0 {
            return Vec::new();
        }
        let counts = term_counts(text);
        if counts.is_empty() {
            return Vec::new();
        }
        let query_hash = Self::dedup_hash(text);
        let query_vec = weigh(&counts, &state.doc_freq, state.entries.len());

        let mut matches: Vec<CorpusMatch> = state
            .entries
            .iter()
            .filter(|e| e.dedup_hash != query_hash)
            .map(|e| CorpusMatch {
                entry_id: e.id.clone(),
                similarity: dot(&query_vec, &e.vector),
            })
            .filter(|m| m.similarity > self.similarity_floor)
            .collect();

        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.entry_id.cmp(&b.entry_id))
        });
        matches.truncate(k);
        matches
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Monotonic counter bumped on every vocabulary rebuild.
    pub fn vocab_version(&self) -> u64 {
        self.inner.read().unwrap().vocab_version
    }

    /// Entry IDs in insertion order, for corpus-state snapshots.
    pub fn entry_ids(&self) -> Vec<String> {
        self.inner
            .read()
            .unwrap()
            .entries
            .iter()
            .map(|e| e.id.clone())
            .collect()
    }
}

/// Recompute document frequencies and every entry vector for the current
/// entry set, bumping the vocabulary version.
fn rebuild(state: &mut IndexState) {
    let mut doc_freq: BTreeMap<String, usize> = BTreeMap::new();
    for entry in &state.entries {
        for term in entry.counts.keys() {
            *doc_freq.entry(term.clone()).or_insert(0) += 1;
        }
    }
    let n = state.entries.len();
    let vectors: Vec<TermVector> = state
        .entries
        .iter()
        .map(|e| weigh(&e.counts, &doc_freq, n))
        .collect();
    for (entry, vector) in state.entries.iter_mut().zip(vectors) {
        entry.vector = vector;
    }
    state.doc_freq = doc_freq;
    state.vocab_version += 1;
}

/// Apply smoothed-IDF weighting and L2 normalization to raw term counts.
fn weigh(counts: &TermCounts, doc_freq: &BTreeMap<String, usize>, n_docs: usize) -> TermVector {
    let mut vector = TermVector::new();
    for (term, tf) in counts {
        let df = doc_freq.get(term).copied().unwrap_or(0);
        let idf = (((1 + n_docs) as f64) / ((1 + df) as f64)).ln() + 1.0;
        vector.insert(term.clone(), tf * idf);
    }
    let norm: f64 = vector.values().map(|w| w * w).sum::<f64>().sqrt();
    if norm > 0.0 {
        for w in vector.values_mut() {
            *w /= norm;
        }
    }
    vector
}

/// Dot product of two unit vectors, iterating the smaller side.
fn dot(a: &TermVector, b: &TermVector) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(term, wa)| large.get(term).map(|wb| wa * wb))
        .sum()
}

/// Unigram + bigram term counts over the normalized token stream.
fn term_counts(text: &str) -> TermCounts {
    let tokens = tokenize(text);
    let mut counts = TermCounts::new();
    for token in &tokens {
        *counts.entry(token.clone()).or_insert(0.0) += 1.0;
    }
    for pair in tokens.windows(2) {
        *counts
            .entry(format!("{} {}", pair[0], pair[1]))
            .or_insert(0.0) += 1.0;
    }
    counts
}

/// Lowercased alphanumeric tokens, at least two characters, stopwords removed.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2 && !STOPWORDS.contains(t))
        .map(|t| t.to_string())
        .collect()
}
