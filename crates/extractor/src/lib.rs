//! Transcript Extractor — turns session transcripts into access events.
//!
//! Two paths:
//! - [`structured`] parses the record-oriented JSONL transcript format
//!   (§4.2 of `SPEC_FULL.md`): `toolCall`/`toolResult` blocks paired by
//!   `parentId`, with the `sessions/` result-path filter applied.
//! - [`heuristic`] is the best-effort fallback for free-form transcript
//!   text, gated behind an explicit flag — its coverage is not
//!   contractual.
//!
//! Both hand their output to [`engram_store::AccessStore::log_event`]
//! through [`extract_sessions`], which also owns the processed-session
//! watermark so re-running without `reprocess` is a no-op.

pub mod heuristic;
pub mod structured;

use engram_core::Result;
use engram_store::AccessStore;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Summary of one Extractor run, mirrors the CLI's JSON output shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractSummary {
    /// Session files found in the directory.
    pub sessions_scanned: usize,
    /// Sessions that produced at least one new event this run.
    pub sessions_new: usize,
    /// Sessions skipped because they were already processed.
    pub sessions_skipped: usize,
    /// Total access events extracted this run.
    pub events_extracted: usize,
    /// Malformed blocks skipped across all sessions this run.
    pub blocks_skipped: usize,
}

/// Scan `sessions_dir` for `*.jsonl` transcripts and extract access
/// events into `store`.
///
/// Sessions already recorded in the processed-session watermark are
/// skipped unless `reprocess` is set. Each session is processed in
/// isolation: a malformed line or block increments `blocks_skipped` and
/// extraction continues with the rest of that session, and a file-level
/// read failure (unreadable file, non-UTF8 content, a race against
/// deletion) increments `blocks_skipped` and skips straight to the next
/// file rather than aborting the run.
pub fn extract_sessions(
    store: &mut AccessStore,
    sessions_dir: &Path,
    reprocess: bool,
) -> Result<ExtractSummary> {
    let mut summary = ExtractSummary::default();

    if !sessions_dir.exists() {
        return Err(engram_core::EngramError::MissingDependency(format!(
            "sessions directory not found: {}",
            sessions_dir.display()
        )));
    }

    let mut files: Vec<_> = std::fs::read_dir(sessions_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("jsonl"))
        .collect();
    files.sort();

    summary.sessions_scanned = files.len();

    for path in files {
        let session_id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        if !reprocess && store.is_processed(&session_id) {
            summary.sessions_skipped += 1;
            continue;
        }

        let outcome = match structured::extract_session_file(&path) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::debug!(session = %session_id, error = %err, "skipping unreadable session file");
                summary.blocks_skipped += 1;
                continue;
            }
        };
        summary.blocks_skipped += outcome.blocks_skipped;

        let mut extracted = 0usize;
        for call in outcome.calls {
            store.log_event(call.query, call.results, Some(session_id.clone()), Some(call.timestamp))?;
            extracted += 1;
        }

        store.mark_processed(&session_id, extracted)?;
        if extracted > 0 {
            summary.sessions_new += 1;
            summary.events_extracted += extracted;
        }
    }

    tracing::info!(
        sessions_scanned = summary.sessions_scanned,
        sessions_new = summary.sessions_new,
        events_extracted = summary.events_extracted,
        "extraction pass complete"
    );

    Ok(summary)
}
