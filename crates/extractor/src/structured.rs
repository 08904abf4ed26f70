//! Structured JSONL transcript parsing.
//!
//! Transcript format (§6 of `SPEC_FULL.md`): one JSON object per line,
//! each with `id`, optional `parentId`, an ISO-8601 `timestamp`, and a
//! `message` object carrying `role` and a `content` array of typed
//! blocks. We keep blocks as [`serde_json::Value`] rather than a closed
//! enum — producers vary in which fields they include, and a block we
//! don't recognize should be skipped, not reject the whole record.

use chrono::DateTime;
use engram_store::RawResult;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct Record {
    id: Option<String>,
    #[serde(rename = "parentId")]
    parent_id: Option<String>,
    timestamp: Option<String>,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    role: Option<String>,
    #[serde(default)]
    content: serde_json::Value,
}

/// One `memory_search` call paired with its (possibly empty) results.
#[derive(Debug, Clone)]
pub struct ExtractedCall {
    /// The query text.
    pub query: String,
    /// Canonicalized result records, `sessions/`-paths already filtered.
    pub results: Vec<RawResult>,
    /// Seconds since the Unix epoch; wall-clock time if unparseable.
    pub timestamp: f64,
}

/// Result of parsing one transcript file.
#[derive(Debug, Default)]
pub struct FileOutcome {
    /// Calls extracted, in file order.
    pub calls: Vec<ExtractedCall>,
    /// Lines or blocks that failed to parse and were skipped.
    pub blocks_skipped: usize,
}

/// Parse one `*.jsonl` transcript file into its `memory_search` calls.
pub fn extract_session_file(path: &Path) -> engram_core::Result<FileOutcome> {
    let content = std::fs::read_to_string(path)?;
    Ok(extract_session_text(&content))
}

/// Parse transcript text already read into memory (one JSON object per
/// non-empty line).
pub fn extract_session_text(content: &str) -> FileOutcome {
    let mut outcome = FileOutcome::default();
    let mut records = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Record>(line) {
            Ok(record) => records.push(record),
            Err(_) => outcome.blocks_skipped += 1,
        }
    }

    for record in &records {
        let Some(message) = &record.message else {
            continue;
        };
        let blocks = match message.content.as_array() {
            Some(blocks) => blocks,
            None => continue,
        };

        for block in blocks {
            if block.get("type").and_then(|v| v.as_str()) != Some("toolCall") {
                continue;
            }
            if block.get("name").and_then(|v| v.as_str()) != Some("memory_search") {
                continue;
            }
            let Some(query) = block
                .get("arguments")
                .and_then(|a| a.get("query"))
                .and_then(|q| q.as_str())
            else {
                outcome.blocks_skipped += 1;
                continue;
            };

            let timestamp = record
                .timestamp
                .as_deref()
                .and_then(parse_iso8601)
                .unwrap_or_else(now_secs);

            let results = record
                .id
                .as_deref()
                .and_then(|call_id| find_results(&records, call_id, &mut outcome.blocks_skipped))
                .unwrap_or_default();

            outcome.calls.push(ExtractedCall {
                query: query.to_string(),
                results,
                timestamp,
            });
        }
    }

    outcome
}

/// Find the `toolResult` record whose `parentId` matches `call_id` and
/// pull its results, filtering `sessions/`-prefixed paths.
fn find_results(records: &[Record], call_id: &str, blocks_skipped: &mut usize) -> Option<Vec<RawResult>> {
    let result_record = records.iter().find(|r| {
        r.parent_id.as_deref() == Some(call_id)
            && r.message.as_ref().and_then(|m| m.role.as_deref()) == Some("toolResult")
    })?;
    let message = result_record.message.as_ref()?;
    let blocks = message.content.as_array()?;

    for block in blocks {
        if block.get("type").and_then(|v| v.as_str()) != Some("text") {
            continue;
        }
        let Some(text) = block.get("text").and_then(|v| v.as_str()) else {
            continue;
        };
        let parsed: serde_json::Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(_) => {
                *blocks_skipped += 1;
                continue;
            }
        };
        let Some(results) = parsed.get("results").and_then(|v| v.as_array()) else {
            continue;
        };

        let mut out = Vec::new();
        for r in results {
            let path = r.get("path").and_then(|v| v.as_str()).unwrap_or("");
            if path.starts_with("sessions/") {
                continue;
            }
            let start_line = r
                .get("startLine")
                .map(|v| match v {
                    serde_json::Value::Number(n) => n.to_string(),
                    serde_json::Value::String(s) => s.clone(),
                    _ => String::new(),
                })
                .unwrap_or_default();
            let score = r.get("score").and_then(|v| v.as_f64());
            out.push(RawResult {
                file: Some(path.to_string()),
                lines: Some(start_line),
                score,
            });
        }
        return Some(out);
    }
    None
}

fn parse_iso8601(s: &str) -> Option<f64> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.timestamp() as f64 + dt.timestamp_subsec_nanos() as f64 / 1e9)
}

fn now_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
