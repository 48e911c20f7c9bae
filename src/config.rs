use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    #[serde(default)]
    pub citations: CitationsConfig,
    #[serde(default)]
    pub factcheck: FactcheckConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/paperlens.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    /// Maximum number of matched sources reported per analysis.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Matches at or below this cosine similarity are dropped.
    #[serde(default = "default_similarity_floor")]
    pub similarity_floor: f64,
    /// Texts shorter than this are not indexed as reference entries.
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            similarity_floor: default_similarity_floor(),
            min_text_chars: default_min_text_chars(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_similarity_floor() -> f64 {
    0.0
}
fn default_min_text_chars() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExecutorConfig {
    /// Deadline applied to each stage except the summarizer.
    #[serde(default = "default_stage_deadline_secs")]
    pub stage_deadline_secs: u64,
    /// The summarizer may call a hosted model, so it gets a longer deadline.
    #[serde(default = "default_summarizer_deadline_secs")]
    pub summarizer_deadline_secs: u64,
    /// Attempts per stage for transient failures, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            stage_deadline_secs: default_stage_deadline_secs(),
            summarizer_deadline_secs: default_summarizer_deadline_secs(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

fn default_stage_deadline_secs() -> u64 {
    30
}
fn default_summarizer_deadline_secs() -> u64 {
    60
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummarizerConfig {
    /// `extractive` (local sentence scoring) or `remote` (hosted model with
    /// extractive fallback).
    #[serde(default = "default_summarizer_backend")]
    pub backend: String,
    #[serde(default = "default_summarizer_endpoint")]
    pub endpoint: String,
    /// Environment variable holding the bearer token for the remote backend.
    #[serde(default = "default_summarizer_api_key_env")]
    pub api_key_env: String,
    /// Input cap sent to the remote model, truncated at a sentence boundary.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,
    /// Word budget for the extractive summary.
    #[serde(default = "default_target_words")]
    pub target_words: usize,
    #[serde(default = "default_summarizer_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            backend: default_summarizer_backend(),
            endpoint: default_summarizer_endpoint(),
            api_key_env: default_summarizer_api_key_env(),
            max_input_chars: default_max_input_chars(),
            target_words: default_target_words(),
            request_timeout_secs: default_summarizer_timeout_secs(),
        }
    }
}

fn default_summarizer_backend() -> String {
    "extractive".to_string()
}
fn default_summarizer_endpoint() -> String {
    "https://api-inference.huggingface.co/models/facebook/bart-large-cnn".to_string()
}
fn default_summarizer_api_key_env() -> String {
    "PAPERLENS_HF_TOKEN".to_string()
}
fn default_max_input_chars() -> usize {
    1200
}
fn default_target_words() -> usize {
    200
}
fn default_summarizer_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CitationsConfig {
    #[serde(default = "default_citations_endpoint")]
    pub endpoint: String,
    /// Contact address sent in the User-Agent, per CrossRef API etiquette.
    #[serde(default)]
    pub mailto: Option<String>,
    /// Maximum citations extracted and validated per document.
    #[serde(default = "default_max_citations")]
    pub max_citations: usize,
    #[serde(default = "default_citations_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for CitationsConfig {
    fn default() -> Self {
        Self {
            endpoint: default_citations_endpoint(),
            mailto: None,
            max_citations: default_max_citations(),
            request_timeout_secs: default_citations_timeout_secs(),
        }
    }
}

fn default_citations_endpoint() -> String {
    "https://api.crossref.org/works".to_string()
}
fn default_max_citations() -> usize {
    50
}
fn default_citations_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct FactcheckConfig {
    #[serde(default = "default_factcheck_endpoint")]
    pub endpoint: String,
    /// Environment variable holding the API key. When the variable is unset
    /// the fact-check stage is disabled and recorded as skipped.
    #[serde(default = "default_factcheck_api_key_env")]
    pub api_key_env: String,
    /// Maximum candidate claims submitted per document.
    #[serde(default = "default_max_claims")]
    pub max_claims: usize,
    /// Sentences shorter than this are not treated as factual claims.
    #[serde(default = "default_min_claim_chars")]
    pub min_claim_chars: usize,
    #[serde(default = "default_factcheck_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for FactcheckConfig {
    fn default() -> Self {
        Self {
            endpoint: default_factcheck_endpoint(),
            api_key_env: default_factcheck_api_key_env(),
            max_claims: default_max_claims(),
            min_claim_chars: default_min_claim_chars(),
            request_timeout_secs: default_factcheck_timeout_secs(),
        }
    }
}

fn default_factcheck_endpoint() -> String {
    "https://factchecktools.googleapis.com/v1alpha1/claims:search".to_string()
}
fn default_factcheck_api_key_env() -> String {
    "PAPERLENS_FACTCHECK_KEY".to_string()
}
fn default_max_claims() -> usize {
    20
}
fn default_min_claim_chars() -> usize {
    40
}
fn default_factcheck_timeout_secs() -> u64 {
    8
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate corpus
    if config.corpus.top_k == 0 {
        anyhow::bail!("corpus.top_k must be >= 1");
    }
    if !(0.0..1.0).contains(&config.corpus.similarity_floor) {
        anyhow::bail!("corpus.similarity_floor must be in [0.0, 1.0)");
    }

    // Validate executor
    if config.executor.max_attempts == 0 {
        anyhow::bail!("executor.max_attempts must be >= 1");
    }
    if config.executor.stage_deadline_secs == 0 || config.executor.summarizer_deadline_secs == 0 {
        anyhow::bail!("executor deadlines must be > 0");
    }

    // Validate summarizer
    match config.summarizer.backend.as_str() {
        "extractive" | "remote" => {}
        other => anyhow::bail!(
            "Unknown summarizer backend: '{}'. Must be extractive or remote.",
            other
        ),
    }
    if config.summarizer.max_input_chars == 0 {
        anyhow::bail!("summarizer.max_input_chars must be > 0");
    }
    if config.summarizer.target_words == 0 {
        anyhow::bail!("summarizer.target_words must be > 0");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.corpus.top_k, 5);
        assert_eq!(config.corpus.min_text_chars, 100);
        assert_eq!(config.executor.max_attempts, 3);
        assert_eq!(config.summarizer.backend, "extractive");
        assert_eq!(config.factcheck.max_claims, 20);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [corpus]
            top_k = 3

            [summarizer]
            backend = "remote"
            "#,
        )
        .unwrap();
        assert_eq!(config.corpus.top_k, 3);
        assert_eq!(config.corpus.min_text_chars, 100);
        assert_eq!(config.summarizer.backend, "remote");
        assert_eq!(config.summarizer.target_words, 200);
    }
}
