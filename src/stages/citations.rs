//! Citation extraction and validation stage.
//!
//! Finds the references section, splits it into individual citations, and
//! resolves each against an external works registry. A citation with no
//! parseable identifier is reported `Unverifiable` without any lookup; a
//! transient lookup failure is reported `LookupFailed`, never conflated
//! with `NotFound`. The stage as a whole fails only when every attempted
//! lookup failed transiently.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;

use crate::error::StageError;
use crate::lookup::{Lookup, LookupError};
use crate::models::{Citation, CitationStatus, Document, StageName, StagePayload};
use crate::stages::Stage;

static REFERENCES_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:references|bibliography|works\s+cited)\b").unwrap());
static NEW_CITATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d+\.|\[\d+\]|\(\d+\)|[A-Z][a-z]+,\s*[A-Z])").unwrap());
static LEADING_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d+\.|\[\d+\]|\(\d+\))\s*").unwrap());
static DOI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"10\.\d{4,9}/[-._;()/:A-Za-z0-9]+").unwrap());
static QUOTED_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""([^"]+)""#).unwrap());
static YEAR_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\(\d{4}\)|\d{4})\.?\s*").unwrap());

/// Words that mark a citation fragment as journal/venue boilerplate rather
/// than a title.
const JOURNAL_INDICATORS: &[&str] = &[
    "journal",
    "proceedings",
    "conference",
    "vol",
    "volume",
    "pp",
    "pages",
    "doi",
    "isbn",
    "issn",
    "retrieved",
];

pub struct CitationValidator {
    lookup: Arc<dyn Lookup>,
    max_citations: usize,
}

impl CitationValidator {
    pub fn new(lookup: Arc<dyn Lookup>, max_citations: usize) -> Self {
        Self {
            lookup,
            max_citations,
        }
    }
}

#[async_trait]
impl Stage for CitationValidator {
    fn name(&self) -> StageName {
        StageName::Citations
    }

    async fn run(&self, document: &Document) -> Result<StagePayload, StageError> {
        let Some(references) = extract_references_section(&document.raw_text) else {
            return Ok(StagePayload::Citations(Vec::new()));
        };
        let raws = parse_citations(references, self.max_citations);

        let mut seen: HashSet<String> = HashSet::new();
        let mut citations = Vec::new();
        let mut attempted = 0usize;
        let mut transient_failures = 0usize;

        for raw in raws {
            if !seen.insert(raw.to_lowercase()) {
                continue;
            }
            let Some(identifier) = parse_identifier(&raw) else {
                citations.push(Citation {
                    raw_text: raw,
                    parsed_identifier: None,
                    status: CitationStatus::Unverifiable,
                });
                continue;
            };

            attempted += 1;
            let status = match self.lookup.lookup(&identifier).await {
                Ok(value) => {
                    if crossref_has_match(&value) {
                        CitationStatus::Verified
                    } else {
                        CitationStatus::NotFound
                    }
                }
                Err(LookupError::NotFound(_)) => CitationStatus::NotFound,
                Err(LookupError::Transient(msg)) => {
                    transient_failures += 1;
                    eprintln!("Warning: citation lookup failed: {msg}");
                    CitationStatus::LookupFailed
                }
                Err(LookupError::Internal(msg)) => {
                    eprintln!("Warning: citation lookup rejected: {msg}");
                    CitationStatus::LookupFailed
                }
            };
            citations.push(Citation {
                raw_text: raw,
                parsed_identifier: Some(identifier),
                status,
            });
        }

        if attempted > 0 && transient_failures == attempted {
            return Err(StageError::transient(format!(
                "{}: all {} citation lookups failed",
                self.lookup.service_name(),
                attempted
            )));
        }
        Ok(StagePayload::Citations(citations))
    }
}

/// The document tail starting at the references header, or `None` when the
/// document carries no recognizable references section.
fn extract_references_section(text: &str) -> Option<&str> {
    REFERENCES_HEADER_RE
        .find(text)
        .map(|m| &text[m.start()..])
}

/// Split the references section into individual citation strings. A new
/// citation starts at a numbered/bracketed label or an author-surname
/// pattern; blank lines also terminate the current citation.
fn parse_citations(references: &str, max: usize) -> Vec<String> {
    let mut citations: Vec<String> = Vec::new();
    let mut current = String::new();

    // Skip the header line itself.
    for line in references.lines().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            push_citation(&mut citations, &mut current);
        } else if NEW_CITATION_RE.is_match(line) {
            push_citation(&mut citations, &mut current);
            current = line.to_string();
        } else if current.is_empty() {
            current = line.to_string();
        } else {
            current.push(' ');
            current.push_str(line);
        }
        if citations.len() >= max {
            return citations;
        }
    }
    push_citation(&mut citations, &mut current);
    citations
}

fn push_citation(citations: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    // Very short fragments are noise, not citations.
    if trimmed.len() >= 10 {
        citations.push(trimmed.to_string());
    }
    current.clear();
}

/// The identifier submitted to the resolver: a DOI when one is present,
/// otherwise a cleaned title candidate. `None` means no lookup can be
/// attempted and the citation is unverifiable.
fn parse_identifier(citation: &str) -> Option<String> {
    if let Some(doi) = DOI_RE.find(citation) {
        return Some(doi.as_str().trim_end_matches(['.', ';', ',']).to_string());
    }
    clean_citation_title(citation)
}

/// Extract a plausible title from a free-form citation string.
fn clean_citation_title(citation: &str) -> Option<String> {
    let citation = LEADING_LABEL_RE.replace(citation.trim(), "");

    if let Some(caps) = QUOTED_TITLE_RE.captures(&citation) {
        let title = caps[1].trim();
        if (6..160).contains(&title.len()) {
            return Some(title.to_string());
        }
    }

    // Author, A. (Year). Title. Venue… — try the period-separated parts
    // after the author segment.
    let parts: Vec<&str> = citation.split('.').collect();
    for part in parts.iter().skip(1) {
        let candidate = YEAR_PREFIX_RE.replace(part.trim(), "");
        let candidate = candidate.trim();
        if (6..160).contains(&candidate.len()) && !looks_like_journal_info(candidate) {
            return Some(candidate.to_string());
        }
    }

    let fallback: String = citation.chars().take(100).collect();
    let fallback = fallback.trim();
    if fallback.len() > 5 {
        Some(fallback.to_string())
    } else {
        None
    }
}

fn looks_like_journal_info(text: &str) -> bool {
    let lower = text.to_lowercase();
    JOURNAL_INDICATORS
        .iter()
        .any(|indicator| lower.contains(indicator))
}

/// A CrossRef works query answers with `message.items`; a non-empty list
/// means the registry knows a matching work.
fn crossref_has_match(value: &serde_json::Value) -> bool {
    value
        .get("message")
        .and_then(|m| m.get("items"))
        .and_then(|items| items.as_array())
        .map(|items| !items.is_empty())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    struct CannedLookup {
        response: Value,
        queries: Mutex<Vec<String>>,
    }

    impl CannedLookup {
        fn new(response: Value) -> Self {
            Self {
                response,
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Lookup for CannedLookup {
        fn service_name(&self) -> &str {
            "crossref"
        }

        async fn lookup(&self, query: &str) -> Result<Value, LookupError> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.response.clone())
        }
    }

    struct FailingLookup;

    #[async_trait]
    impl Lookup for FailingLookup {
        fn service_name(&self) -> &str {
            "crossref"
        }

        async fn lookup(&self, _query: &str) -> Result<Value, LookupError> {
            Err(LookupError::Transient("connection reset".to_string()))
        }
    }

    const PAPER: &str = "\
Introduction discusses prior work at length.

References
1. Smith, J. (2020). Deep learning for citation parsing. Journal of AI, 12(3), 45-67.
2. Doe, A. \"A survey of plagiarism detection methods\". Proceedings of TextConf.
[3] Brown, K. et al. Semantic similarity at scale. doi:10.1234/abcd.5678
";

    fn found() -> Value {
        json!({"message": {"items": [{"title": ["A matching work"], "DOI": "10.1/x"}]}})
    }

    fn not_found() -> Value {
        json!({"message": {"items": []}})
    }

    fn citations(payload: StagePayload) -> Vec<Citation> {
        match payload {
            StagePayload::Citations(citations) => citations,
            other => panic!("expected citations payload, got {:?}", other),
        }
    }

    #[test]
    fn references_section_is_located_case_insensitively() {
        assert!(extract_references_section("Body text.\nREFERENCES\n1. Entry.").is_some());
        assert!(extract_references_section("Body text.\nWorks Cited\n1. Entry.").is_some());
        assert!(extract_references_section("Body text with no list at all.").is_none());
    }

    #[test]
    fn numbered_and_bracketed_citations_are_split() {
        let refs = extract_references_section(PAPER).unwrap();
        let raws = parse_citations(refs, 50);
        assert_eq!(raws.len(), 3);
        assert!(raws[0].starts_with("1. Smith"));
        assert!(raws[2].starts_with("[3] Brown"));
    }

    #[test]
    fn continuation_lines_join_the_previous_citation() {
        let refs = "References\n1. Smith, J. A very long title that wraps\n   across two lines. Journal of Tests.";
        let raws = parse_citations(refs, 50);
        assert_eq!(raws.len(), 1);
        assert!(raws[0].contains("wraps across two lines"));
    }

    #[test]
    fn doi_token_wins_over_title() {
        let id = parse_identifier("[3] Brown, K. et al. Semantic similarity. doi:10.1234/abcd.5678").unwrap();
        assert_eq!(id, "10.1234/abcd.5678");
    }

    #[test]
    fn quoted_title_is_preferred() {
        let id = parse_identifier("2. Doe, A. \"A survey of plagiarism detection methods\". TextConf.");
        assert_eq!(id.unwrap(), "A survey of plagiarism detection methods");
    }

    #[tokio::test]
    async fn document_without_references_yields_empty_success() {
        let validator = CitationValidator::new(Arc::new(CannedLookup::new(found())), 50);
        let doc = Document::from_text("doc-1", "No reference list appears in this text.");
        assert!(citations(validator.run(&doc).await.unwrap()).is_empty());
    }

    #[tokio::test]
    async fn resolved_citations_are_verified() {
        let validator = CitationValidator::new(Arc::new(CannedLookup::new(found())), 50);
        let doc = Document::from_text("doc-1", PAPER);
        let results = citations(validator.run(&doc).await.unwrap());
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|c| c.status == CitationStatus::Verified));
        assert!(results.iter().all(|c| c.parsed_identifier.is_some()));
    }

    #[tokio::test]
    async fn empty_registry_answer_is_not_found() {
        let validator = CitationValidator::new(Arc::new(CannedLookup::new(not_found())), 50);
        let doc = Document::from_text("doc-1", PAPER);
        let results = citations(validator.run(&doc).await.unwrap());
        assert!(results.iter().all(|c| c.status == CitationStatus::NotFound));
    }

    #[tokio::test]
    async fn unreachable_resolver_fails_the_stage_transiently() {
        let validator = CitationValidator::new(Arc::new(FailingLookup), 50);
        let doc = Document::from_text("doc-1", PAPER);
        let err = validator.run(&doc).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn duplicate_citations_are_resolved_once() {
        let lookup = Arc::new(CannedLookup::new(found()));
        let validator = CitationValidator::new(lookup.clone(), 50);
        let text = "References\n1. Smith, J. (2020). Deep learning for citation parsing. Journal of AI.\n2. Smith, J. (2020). Deep learning for citation parsing. Journal of AI.\n";
        let doc = Document::from_text("doc-1", text);
        let results = citations(validator.run(&doc).await.unwrap());
        assert_eq!(results.len(), 1);
    }
}
