//! # Paperlens CLI (`plens`)
//!
//! The `plens` binary is the command-line surface for the analysis engine.
//! It reads extracted paper text from files, drives the four-stage
//! analysis, and manages the reference corpus used for plagiarism scoring.
//!
//! ## Usage
//!
//! ```bash
//! plens --config ./config/paperlens.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `plens init` | Create the SQLite database and run schema migrations |
//! | `plens analyze <file>` | Run the four-stage analysis over a text file |
//! | `plens corpus add <file>` | Add a reference text to the plagiarism corpus |
//! | `plens corpus list` | List reference corpus entries |
//! | `plens stats` | Database overview: entries, analyses, size |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! plens init --config ./config/paperlens.toml
//!
//! # Seed the reference corpus
//! plens corpus add known-paper.txt
//!
//! # Analyze a paper and print the JSON result
//! plens analyze paper.txt --json
//!
//! # Analyze under an explicit document id
//! plens analyze paper.txt --id thesis-draft-3
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use paperlens::config::{self, Config};
use paperlens::corpus::{CorpusIndex, InsertOutcome};
use paperlens::db::{self, SqliteStore};
use paperlens::models::{AnalysisResult, Document, StageStatus};
use paperlens::orchestrator::AnalysisEngine;
use paperlens::store::{CorpusRecord, Store};

/// Paperlens — a research-paper analysis engine: summary, plagiarism
/// similarity, citation validation, and fact-check verdicts.
#[derive(Parser)]
#[command(
    name = "plens",
    about = "Paperlens — research-paper analysis: summary, plagiarism, citations, fact checks",
    version,
    long_about = "Paperlens runs four concurrent analysis stages over extracted paper text: \
    summarization, plagiarism similarity against a reference corpus, citation validation, and \
    claim fact-checking. Results are aggregated with per-stage statuses and persisted to SQLite."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/paperlens.toml`. Database, corpus, deadline,
    /// and per-stage settings are read from this file; a missing file means
    /// built-in defaults.
    #[arg(long, global = true, default_value = "./config/paperlens.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the corpus/analyses tables.
    /// This command is idempotent — running it multiple times is safe.
    Init,

    /// Analyze a text file through the four-stage pipeline.
    ///
    /// Reads extracted paper text, runs all stages concurrently, prints a
    /// report, and records the result. The analyzed document is also added
    /// to the reference corpus for future plagiarism comparisons.
    Analyze {
        /// Path to the extracted paper text (UTF-8).
        file: PathBuf,

        /// Document id recorded in the result. Defaults to the file stem.
        #[arg(long)]
        id: Option<String>,

        /// Print the full result as JSON instead of the report.
        #[arg(long)]
        json: bool,
    },

    /// Manage the plagiarism reference corpus.
    Corpus {
        #[command(subcommand)]
        action: CorpusAction,
    },

    /// Database overview: corpus entries, analyses, file size.
    Stats,
}

/// Reference corpus subcommands.
#[derive(Subcommand)]
enum CorpusAction {
    /// Add a reference text for future plagiarism comparisons.
    Add {
        /// Path to the reference text file (UTF-8).
        file: PathBuf,
    },
    /// List stored corpus entries.
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        Config::default()
    };

    match cli.command {
        Commands::Init => {
            db::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Analyze { file, id, json } => {
            run_analyze(&cfg, &file, id, json).await?;
        }
        Commands::Corpus { action } => match action {
            CorpusAction::Add { file } => {
                run_corpus_add(&cfg, &file).await?;
            }
            CorpusAction::List => {
                run_corpus_list(&cfg).await?;
            }
        },
        Commands::Stats => {
            run_stats(&cfg).await?;
        }
    }

    Ok(())
}

async fn run_analyze(cfg: &Config, file: &PathBuf, id: Option<String>, json: bool) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read input file: {}", file.display()))?;
    let document_id = id.unwrap_or_else(|| {
        file.file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    });
    let document = Document::from_text(document_id, text);

    let store = Arc::new(SqliteStore::connect(cfg).await?);
    let engine = AnalysisEngine::from_config(cfg, store).await?;
    let result = engine.analyze(&document).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_report(&result);
    }
    Ok(())
}

fn print_report(result: &AnalysisResult) {
    println!("Paperlens — Analysis Report");
    println!("===========================");
    println!();
    println!("  Document:    {}", result.document_id);
    println!("  Status:      {}", status_json(&result.overall_status));
    println!();

    match &result.summary {
        Some(summary) => {
            let display: String = summary.chars().take(300).collect();
            let ellipsis = if summary.chars().count() > 300 { "…" } else { "" };
            println!("  Summary:     {}{}", display, ellipsis);
        }
        None => println!("  Summary:     unavailable"),
    }

    match &result.plagiarism {
        Some(report) => {
            println!(
                "  Plagiarism:  {:.1}% ({} matched source{})",
                report.score * 100.0,
                report.matched_sources.len(),
                if report.matched_sources.len() == 1 { "" } else { "s" }
            );
            for source in &report.matched_sources {
                println!(
                    "               {:.3}  {}",
                    source.similarity, source.corpus_entry_id
                );
            }
        }
        None => println!("  Plagiarism:  unavailable"),
    }

    match &result.citations {
        Some(citations) => {
            let verified = citations
                .iter()
                .filter(|c| c.status == paperlens::models::CitationStatus::Verified)
                .count();
            println!(
                "  Citations:   {} checked, {} verified",
                citations.len(),
                verified
            );
        }
        None => println!("  Citations:   unavailable"),
    }

    match &result.fact_checks {
        Some(checks) => {
            let supported = checks
                .iter()
                .filter(|c| c.verdict == paperlens::models::Verdict::Supported)
                .count();
            let disputed = checks
                .iter()
                .filter(|c| c.verdict == paperlens::models::Verdict::Disputed)
                .count();
            println!(
                "  Fact checks: {} claims, {} supported, {} disputed",
                checks.len(),
                supported,
                disputed
            );
        }
        None => println!("  Fact checks: unavailable"),
    }

    println!();
    println!("  Stages:");
    for (name, status) in &result.stage_statuses {
        println!("    {:<12} {}", name.to_string(), stage_status_display(status));
    }
    println!();
}

fn status_json(status: &impl serde::Serialize) -> String {
    serde_json::to_value(status)
        .ok()
        .and_then(|v| v.as_str().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn stage_status_display(status: &StageStatus) -> String {
    match status {
        StageStatus::Success => "success".to_string(),
        StageStatus::Failed { kind, message } => {
            format!("failed ({}: {})", status_json(kind), message)
        }
        StageStatus::TimedOut => "timed_out".to_string(),
        StageStatus::Skipped => "skipped".to_string(),
    }
}

async fn run_corpus_add(cfg: &Config, file: &PathBuf) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read input file: {}", file.display()))?;

    let store = SqliteStore::connect(cfg).await?;
    let corpus = CorpusIndex::new(&cfg.corpus);
    corpus.load(store.load_corpus().await?.into_iter().map(|r| (r.id, r.text)));

    match corpus.insert(&text) {
        InsertOutcome::Added(meta) => {
            store
                .append_corpus_entry(&CorpusRecord {
                    id: meta.id.clone(),
                    text,
                    dedup_hash: meta.dedup_hash,
                    vocab_version: meta.vocab_version,
                    added_at: meta.added_at,
                })
                .await?;
            println!(
                "Added corpus entry {} ({} entries total).",
                meta.id,
                corpus.len()
            );
        }
        InsertOutcome::Duplicate(id) => {
            println!("Identical text already stored as corpus entry {}.", id);
        }
        InsertOutcome::TooShort => {
            println!(
                "Text too short to index (minimum {} characters).",
                cfg.corpus.min_text_chars
            );
        }
    }
    Ok(())
}

async fn run_corpus_list(cfg: &Config) -> Result<()> {
    let store = SqliteStore::connect(cfg).await?;
    let records = store.load_corpus().await?;

    if records.is_empty() {
        println!("Corpus is empty. Add reference texts with `plens corpus add <file>`.");
        return Ok(());
    }

    println!("  {:<38} {:>8}   {}", "ID", "CHARS", "ADDED");
    println!("  {}", "-".repeat(66));
    for record in &records {
        println!(
            "  {:<38} {:>8}   {}",
            record.id,
            record.text.chars().count(),
            record.added_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!();
    println!("  {} entries.", records.len());
    Ok(())
}

async fn run_stats(cfg: &Config) -> Result<()> {
    let store = SqliteStore::connect(cfg).await?;
    let pool = store.pool();

    let corpus_entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM corpus_entries")
        .fetch_one(pool)
        .await?;
    let analyses: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM analyses")
        .fetch_one(pool)
        .await?;
    let complete: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM analyses WHERE overall_status = 'complete'")
            .fetch_one(pool)
            .await?;

    let db_size = std::fs::metadata(&cfg.db.path).map(|m| m.len()).unwrap_or(0);

    println!("Paperlens — Database Stats");
    println!("==========================");
    println!();
    println!("  Database:       {}", cfg.db.path.display());
    println!("  Size:           {}", format_bytes(db_size));
    println!();
    println!("  Corpus entries: {}", corpus_entries);
    println!(
        "  Analyses:       {} ({} complete)",
        analyses, complete
    );
    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
