//! Claim fact-checking stage.
//!
//! Extracts candidate factual claims (declarative sentences above a length
//! threshold) and submits each to a published claim-review search. Textual
//! ratings map onto the verdict taxonomy; a claim the service has no review
//! for is `Unverified`, and a failed lookup is `LookupFailed`. The stage
//! fails only when the lookup mechanism is unavailable for every claim;
//! when no API key is configured, the stage reports itself disabled and the
//! executor records it as skipped.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StageError;
use crate::lookup::{Lookup, LookupError};
use crate::models::{Document, FactCheck, StageName, StagePayload, Verdict};
use crate::stages::{split_sentences, Stage};

/// Leading words that mark a sentence as a question, not a claim.
const INTERROGATIVE_LEADS: &[&str] = &["How", "What", "Why", "Where", "When"];

/// Leading words that mark structural lines, not claims.
const STRUCTURAL_LEADS: &[&str] = &["Figure", "Table", "References"];

pub struct FactChecker {
    lookup: Option<Arc<dyn Lookup>>,
    max_claims: usize,
    min_claim_chars: usize,
}

impl FactChecker {
    pub fn new(lookup: Option<Arc<dyn Lookup>>, max_claims: usize, min_claim_chars: usize) -> Self {
        Self {
            lookup,
            max_claims,
            min_claim_chars,
        }
    }

    /// Candidate claims in document order, capped at `max_claims`.
    fn extract_claims(&self, text: &str) -> Vec<String> {
        let mut claims = Vec::new();
        for sentence in split_sentences(text) {
            if sentence.len() < self.min_claim_chars {
                continue;
            }
            if sentence.ends_with('?')
                || INTERROGATIVE_LEADS
                    .iter()
                    .any(|lead| sentence.starts_with(lead))
            {
                continue;
            }
            if STRUCTURAL_LEADS.iter().any(|lead| sentence.starts_with(lead)) {
                continue;
            }
            // All-caps lines are headers.
            let has_alpha = sentence.chars().any(|c| c.is_alphabetic());
            if has_alpha
                && sentence
                    .chars()
                    .filter(|c| c.is_alphabetic())
                    .all(|c| c.is_uppercase())
            {
                continue;
            }
            claims.push(sentence);
            if claims.len() >= self.max_claims {
                break;
            }
        }
        claims
    }
}

#[async_trait]
impl Stage for FactChecker {
    fn name(&self) -> StageName {
        StageName::FactCheck
    }

    fn is_enabled(&self) -> bool {
        self.lookup.is_some()
    }

    async fn run(&self, document: &Document) -> Result<StagePayload, StageError> {
        let Some(lookup) = &self.lookup else {
            return Err(StageError::internal("fact-check lookup not configured"));
        };

        let claims = self.extract_claims(&document.raw_text);
        let mut results = Vec::with_capacity(claims.len());
        let mut transient_failures = 0usize;

        for claim in &claims {
            let (verdict, source_url) = match lookup.lookup(claim).await {
                Ok(value) => claim_verdict(&value),
                Err(LookupError::Transient(msg)) => {
                    transient_failures += 1;
                    eprintln!("Warning: fact-check lookup failed: {msg}");
                    (Verdict::LookupFailed, None)
                }
                Err(LookupError::NotFound(_)) => (Verdict::Unverified, None),
                Err(LookupError::Internal(msg)) => {
                    eprintln!("Warning: fact-check lookup rejected: {msg}");
                    (Verdict::LookupFailed, None)
                }
            };
            results.push(FactCheck {
                claim: claim.clone(),
                verdict,
                source_url,
            });
        }

        if !claims.is_empty() && transient_failures == claims.len() {
            return Err(StageError::transient(format!(
                "{}: all {} claim lookups failed",
                lookup.service_name(),
                claims.len()
            )));
        }
        Ok(StagePayload::FactChecks(results))
    }
}

/// Map a claim-review search response to a verdict. Reviews rate claims
/// with free-text labels; supportive wording wins over disputing wording
/// within one review, and the first decisive review settles the claim.
fn claim_verdict(value: &serde_json::Value) -> (Verdict, Option<String>) {
    let Some(found_claims) = value.get("claims").and_then(|c| c.as_array()) else {
        return (Verdict::Unverified, None);
    };

    let mut first_url: Option<String> = None;
    for found in found_claims {
        let Some(reviews) = found.get("claimReview").and_then(|r| r.as_array()) else {
            continue;
        };
        for review in reviews {
            let url = review
                .get("url")
                .and_then(|u| u.as_str())
                .map(|u| u.to_string());
            if first_url.is_none() {
                first_url = url.clone();
            }
            let rating = review
                .get("textualRating")
                .and_then(|r| r.as_str())
                .unwrap_or("")
                .to_lowercase();
            if ["true", "correct", "accurate"]
                .iter()
                .any(|w| rating.contains(w))
            {
                return (Verdict::Supported, url.or(first_url));
            }
            if ["false", "incorrect", "misleading"]
                .iter()
                .any(|w| rating.contains(w))
            {
                return (Verdict::Disputed, url.or(first_url));
            }
        }
    }
    (Verdict::Unverified, first_url)
}
