//! Best-effort heuristic extraction for free-form transcript text.
//!
//! Not contractual: callers that want the structured extractor's
//! guarantees (exact pairing, `sessions/` filtering) should use
//! [`crate::structured`] instead. This path exists for transcripts that
//! never had the record-oriented JSONL shape to begin with, and is
//! gated behind an explicit flag at the call site.

use crate::structured::ExtractedCall;
use engram_store::RawResult;
use regex::Regex;
use std::sync::OnceLock;

fn query_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)memory_search.*?["']query["']\s*[:=]\s*["']([^"']+)["']"#).unwrap()
    })
}

fn results_block_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?is)(?:snippets|results|matches).*?(\[[\s\S]*?\])"#).unwrap())
}

/// Scan free-form text for `memory_search` mentions and `query` string
/// literals, pairing each with the nearest following results-looking
/// array block on a best-effort basis. Queries are logged even when no
/// results block can be parsed — the query itself is signal.
pub fn extract_heuristic(text: &str, timestamp: f64) -> Vec<ExtractedCall> {
    let queries: Vec<&str> = query_pattern()
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    let result_blocks: Vec<&str> = results_block_pattern()
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();

    let mut calls = Vec::new();
    for (i, query) in queries.into_iter().enumerate() {
        if query.is_empty() {
            continue;
        }
        let results = result_blocks
            .get(i)
            .and_then(|block| parse_result_array(block))
            .unwrap_or_default();
        calls.push(ExtractedCall {
            query: query.to_string(),
            results,
            timestamp,
        });
    }
    calls
}

/// Accepts either `{file|path, lines|line, score}` objects directly in
/// a JSON array, or the array itself under no wrapper — the original
/// implementation's `snippets` envelope and this system's `results`
/// envelope both reduce to "an array of loosely-shaped result objects"
/// by the time a heuristic match has isolated it.
fn parse_result_array(block: &str) -> Option<Vec<RawResult>> {
    let value: serde_json::Value = serde_json::from_str(block).ok()?;
    let array = value.as_array()?;
    let mut out = Vec::new();
    for item in array {
        if !item.is_object() {
            continue;
        }
        out.push(RawResult {
            file: item
                .get("file")
                .or_else(|| item.get("path"))
                .and_then(|v| v.as_str())
                .map(String::from),
            lines: item
                .get("lines")
                .or_else(|| item.get("line"))
                .map(|v| match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                }),
            score: item.get("score").and_then(|v| v.as_f64()),
        });
    }
    Some(out)
}
