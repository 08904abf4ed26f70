//! Subcommand definitions and dispatch.

use crate::output::{print_many, print_one};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use engram_core::EngramConfig;
use engram_engine::{reconsolidate, EnergyMap, FileVectorStore, MetricsStore, ReconsolidationOutcome, ReconsolidationParams};
use engram_extractor::extract_sessions;
use engram_store::{AccessStore, RawResult};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "engram", about = "Access-driven memory reconsolidation engine", version)]
pub struct Cli {
    /// Directory holding engram.toml, the append logs, and the reference vector store.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
    /// Path to an engram.toml outside the data directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Raise the tracing filter to debug.
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log a single memory_search call.
    LogEvent {
        query: String,
        /// JSON array of `{file, lines, score}`-shaped results.
        results_json: Option<String>,
        #[arg(long)]
        session_id: Option<String>,
    },
    /// Extract a single transcript (file or stdin) into the Access Store.
    LogSession {
        /// Transcript path; reads stdin if omitted.
        transcript: Option<PathBuf>,
        session_id: Option<String>,
    },
    /// Access statistics: counts, hottest chunks, recent queries.
    Stats,
    /// Most recent access events, newest first.
    Dump {
        #[arg(default_value_t = 20)]
        limit: usize,
    },
    /// Scan the sessions directory for new transcripts.
    Extract {
        /// Reprocess sessions already marked processed.
        #[arg(long, alias = "backfill")]
        all: bool,
        /// Directory of *.jsonl transcripts (default: <data-dir>/sessions).
        #[arg(long)]
        sessions_dir: Option<PathBuf>,
    },
    /// Reconsolidation Engine commands.
    Engine {
        #[command(subcommand)]
        action: EngineAction,
    },
    /// Mirror Analyzer commands.
    Mirror {
        #[command(subcommand)]
        action: MirrorAction,
    },
    /// Write the default engram.toml without opening any store.
    Setup,
}

#[derive(Subcommand, Debug)]
pub enum EngineAction {
    /// Run one reconsolidation pass.
    Run {
        #[arg(long)]
        dry_run: bool,
    },
    /// Print recorded ReconsolidationRun rows.
    Metrics,
    /// Print the current normalized energy map.
    Energy,
}

#[derive(Subcommand, Debug)]
pub enum MirrorAction {
    /// Generate the mirror report.
    Generate {
        #[arg(long)]
        dry_run: bool,
        /// Directory of *.jsonl transcripts for tool-failure scanning.
        #[arg(long)]
        sessions_dir: Option<PathBuf>,
    },
}

pub fn run(command: Commands, data_dir: &Path, config_path: &Path) -> Result<()> {
    match command {
        Commands::Setup => cmd_setup(config_path),
        Commands::LogEvent { query, results_json, session_id } => cmd_log_event(data_dir, query, results_json, session_id),
        Commands::LogSession { transcript, session_id } => cmd_log_session(data_dir, transcript, session_id),
        Commands::Stats => cmd_stats(data_dir),
        Commands::Dump { limit } => cmd_dump(data_dir, limit),
        Commands::Extract { all, sessions_dir } => cmd_extract(data_dir, all, sessions_dir),
        Commands::Engine { action } => cmd_engine(data_dir, config_path, action),
        Commands::Mirror { action } => cmd_mirror(data_dir, config_path, action),
    }
}

fn load_config(config_path: &Path) -> Result<EngramConfig> {
    Ok(EngramConfig::load_or_default(config_path)?)
}

fn cmd_setup(config_path: &Path) -> Result<()> {
    EngramConfig::write_default_if_missing(config_path)?;
    print_one(&serde_json::json!({ "status": "ok", "config": config_path.display().to_string() }));
    Ok(())
}

fn cmd_log_event(data_dir: &Path, query: String, results_json: Option<String>, session_id: Option<String>) -> Result<()> {
    let mut store = AccessStore::open(data_dir)?;
    let results: Vec<RawResult> = match results_json {
        Some(raw) => serde_json::from_str(&raw).with_context(|| "results-json must be a JSON array of result objects")?,
        None => Vec::new(),
    };
    let event = store.log_event(query, results, session_id, None)?;
    print_one(&event);
    Ok(())
}

fn cmd_log_session(data_dir: &Path, transcript: Option<PathBuf>, session_id: Option<String>) -> Result<()> {
    let content = match &transcript {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?,
        None => {
            use std::io::Read;
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let session_id = session_id
        .or_else(|| transcript.as_ref().and_then(|p| p.file_stem()).and_then(|s| s.to_str()).map(String::from))
        .unwrap_or_else(|| "manual".to_string());

    let mut store = AccessStore::open(data_dir)?;
    let outcome = engram_extractor::structured::extract_session_text(&content);

    let mut extracted = 0usize;
    for call in outcome.calls {
        store.log_event(call.query, call.results, Some(session_id.clone()), Some(call.timestamp))?;
        extracted += 1;
    }
    store.mark_processed(&session_id, extracted)?;

    print_one(&serde_json::json!({
        "session_id": session_id,
        "events_extracted": extracted,
        "blocks_skipped": outcome.blocks_skipped,
    }));
    Ok(())
}

fn cmd_stats(data_dir: &Path) -> Result<()> {
    let store = AccessStore::open(data_dir)?;
    print_one(&store.stats());
    Ok(())
}

fn cmd_dump(data_dir: &Path, limit: usize) -> Result<()> {
    let store = AccessStore::open(data_dir)?;
    print_many(&store.dump(limit));
    Ok(())
}

fn default_sessions_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("sessions")
}

fn cmd_extract(data_dir: &Path, all: bool, sessions_dir: Option<PathBuf>) -> Result<()> {
    let sessions_dir = sessions_dir.unwrap_or_else(|| default_sessions_dir(data_dir));
    let mut store = AccessStore::open(data_dir)?;
    let summary = extract_sessions(&mut store, &sessions_dir, all)?;
    print_one(&summary);
    Ok(())
}

fn vectors_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("vectors")
}

fn now_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[derive(Serialize)]
#[serde(tag = "action")]
enum EngineReport {
    #[serde(rename = "none")]
    None { error: String },
    #[serde(rename = "reconsolidated")]
    Reconsolidated {
        #[serde(flatten)]
        run: engram_core::ReconsolidationRun,
    },
}

fn cmd_engine(data_dir: &Path, config_path: &Path, action: EngineAction) -> Result<()> {
    match action {
        EngineAction::Run { dry_run } => {
            let config = load_config(config_path)?;
            let store = AccessStore::open(data_dir)?;
            let mut vector_store = FileVectorStore::open(vectors_dir(data_dir), config.embedding_dim)?;
            let now = now_secs();
            let energy = EnergyMap::build(store.load_all_chunk_energy(), now, config.half_life_hours);
            let params = ReconsolidationParams {
                keep_ratio: config.keep_ratio,
                promotion_strength: config.promotion_strength,
                dry_run,
            };

            let outcome = reconsolidate(&mut vector_store, &energy, params, store.stats().total_access_events, now)?;
            match outcome {
                ReconsolidationOutcome::NoOp { reason } => {
                    print_one(&EngineReport::None { error: reason });
                }
                ReconsolidationOutcome::Applied { run } => {
                    if !dry_run {
                        MetricsStore::open(data_dir)?.record(&run)?;
                    }
                    print_one(&EngineReport::Reconsolidated { run });
                }
            }
            Ok(())
        }
        EngineAction::Metrics => {
            let metrics = MetricsStore::open(data_dir)?;
            print_many(&metrics.all_runs()?);
            Ok(())
        }
        EngineAction::Energy => {
            let config = load_config(config_path)?;
            let store = AccessStore::open(data_dir)?;
            let now = now_secs();
            let energy = EnergyMap::build(store.load_all_chunk_energy(), now, config.half_life_hours);
            let rows: Vec<serde_json::Value> = store
                .load_all_chunk_energy()
                .keys()
                .map(|k| serde_json::json!({ "chunk": k.as_str(), "energy": energy.get(k) }))
                .collect();
            print_many(&rows);
            Ok(())
        }
    }
}

fn cmd_mirror(data_dir: &Path, config_path: &Path, action: MirrorAction) -> Result<()> {
    let MirrorAction::Generate { dry_run, sessions_dir } = action;
    let config = load_config(config_path)?;
    let store = AccessStore::open(data_dir)?;

    let window_secs = config.mirror_window_days as f64 * 86400.0;
    let events = store.load_recent_events(window_secs);
    let sessions_dir = sessions_dir.unwrap_or_else(|| default_sessions_dir(data_dir));
    let sessions_dir = sessions_dir.exists().then_some(sessions_dir.as_path());

    let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
    let report = engram_mirror::generate(&events, store.load_all_chunk_energy(), sessions_dir, &config, &today)?;

    if dry_run {
        print!("{}", report.content);
    } else {
        engram_mirror::write_report(data_dir, &report.content, false)?;
        print!("{}", report.content);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_engine_run_with_dry_run_flag() {
        let cli = Cli::parse_from(["engram", "--data-dir", "/tmp/x", "engine", "run", "--dry-run"]);
        match cli.command {
            Commands::Engine { action: EngineAction::Run { dry_run } } => assert!(dry_run),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_parses_log_event_without_results() {
        let cli = Cli::parse_from(["engram", "log-event", "where are my notes"]);
        match cli.command {
            Commands::LogEvent { query, results_json, .. } => {
                assert_eq!(query, "where are my notes");
                assert!(results_json.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
