//! Mirror Analyzer — turns the Access Store's recent history into a
//! compact, human-readable retrieval-pattern summary (`mirror.md`).
//!
//! Every section is independently optional: a window with no gaps, no
//! friction, or no resonance simply omits that line rather than
//! printing an empty one.

use engram_core::{AccessEvent, ChunkEnergy, ChunkKey, EngramConfig, Result};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::OnceLock;

const MIRROR_FILE: &str = "mirror.md";

/// A generated mirror report: the rendered text plus the pieces that
/// went into it, for callers that want structured access (the CLI's
/// `--dry-run` path prints `content` only).
#[derive(Debug, Clone)]
pub struct MirrorReport {
    pub content: String,
    pub total_events: usize,
    pub unique_queries: usize,
    pub sessions_with_search: usize,
}

/// Build the mirror report from `events` (already window-filtered by
/// the caller) and `energy` (the full chunk-energy map), plus an
/// optional scan of `sessions_dir` for tool failures.
///
/// `today` is `YYYY-MM-DD`, passed in rather than read from the clock
/// so output is reproducible given fixed inputs.
pub fn generate(
    events: &[&AccessEvent],
    energy: &HashMap<ChunkKey, ChunkEnergy>,
    sessions_dir: Option<&Path>,
    config: &EngramConfig,
    today: &str,
) -> Result<MirrorReport> {
    if events.is_empty() {
        return Ok(MirrorReport {
            content: "# mirror — no access data yet\n".to_string(),
            total_events: 0,
            unique_queries: 0,
            sessions_with_search: 0,
        });
    }

    let mut lines = vec![format!("# mirror [{today}]"), String::new()];

    if let Some(hot) = hot_list(energy) {
        lines.push(format!("hot: {hot}"));
    }
    if let Some(gaps) = gap_list(events) {
        lines.push(format!("gaps: {gaps}"));
    }
    if let Some(friction) = friction_list(events) {
        lines.push(format!("friction: {friction}"));
    }
    let resonance = resonance_pairs(events);
    if !resonance.is_empty() {
        lines.push("resonance:".to_string());
        for (a, b, sessions) in resonance.iter().take(5) {
            lines.push(format!("  {} ↔ {} ({sessions}s)", compress_key(a), compress_key(b)));
        }
    }
    if let Some(sessions_dir) = sessions_dir {
        if let Some(failures) = tool_failure_list(sessions_dir, config.mirror_window_days as f64)? {
            lines.push(format!("errors: {failures}"));
        }
    }
    if let Some(promote) = promotion_list(events, energy, &config.boot_context) {
        lines.push(format!("promote: {promote}"));
    }

    let unique_queries = events.iter().map(|e| e.query.as_str()).collect::<HashSet<_>>().len();
    let sessions_with_search = events
        .iter()
        .filter_map(|e| e.session_id.as_deref())
        .collect::<HashSet<_>>()
        .len();

    lines.push(String::new());
    lines.push(format!(
        "stats: {}ev/{}uq/{}sess/{}d",
        events.len(),
        unique_queries,
        sessions_with_search,
        config.mirror_window_days
    ));

    let mut content = lines.join("\n");
    content.push('\n');

    tracing::info!(
        total_events = events.len(),
        unique_queries,
        sessions_with_search,
        "mirror report generated"
    );

    Ok(MirrorReport {
        content,
        total_events: events.len(),
        unique_queries,
        sessions_with_search,
    })
}

/// Write `content` to `<dir>/mirror.md` unless `dry_run` is set.
pub fn write_report(dir: impl AsRef<Path>, content: &str, dry_run: bool) -> Result<()> {
    if dry_run {
        return Ok(());
    }
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    engram_core::framing::write_atomic(&dir.join(MIRROR_FILE), content.as_bytes())
}

fn hot_list(energy: &HashMap<ChunkKey, ChunkEnergy>) -> Option<String> {
    if energy.is_empty() {
        return None;
    }
    let mut rows: Vec<(&ChunkKey, &ChunkEnergy)> = energy.iter().collect();
    rows.sort_by(|a, b| b.1.total_accesses.cmp(&a.1.total_accesses));
    let strs: Vec<String> = rows
        .into_iter()
        .take(8)
        .map(|(key, e)| format!("{}({}x)", compress_key(key.as_str()), e.total_accesses))
        .collect();
    if strs.is_empty() {
        None
    } else {
        Some(strs.join(" "))
    }
}

/// Compress a chunk key for display: `MEMORY.md:51 -> M:51`,
/// `memory/2026-02-07.md:1 -> m/0207:1`.
fn compress_key(key: &str) -> String {
    if let Some(rest) = key.strip_prefix("MEMORY.md:") {
        return format!("M:{rest}");
    }
    if let Some(rest) = key.strip_prefix("memory/") {
        let mut parts = rest.splitn(2, ':');
        let file_part = parts.next().unwrap_or("");
        let line_part = parts.next();
        let date_part = file_part.replace("2026-", "").replace('-', "").replace(".md", "");
        return match line_part {
            Some(line) => format!("m/{date_part}:{line}"),
            None => format!("m/{date_part}"),
        };
    }
    let short = key.replace(".md", "").replace(':', "→");
    if short.chars().count() > 15 {
        short.chars().take(15).collect()
    } else {
        short
    }
}

fn gap_list(events: &[&AccessEvent]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for e in events {
        if e.n_results() == 0 || e.top_score() == 0.0 {
            *counts.entry(e.query.as_str()).or_insert(0) += 1;
        }
    }
    let mut rows: Vec<(&str, usize)> = counts.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1));
    if rows.is_empty() {
        return None;
    }
    let strs: Vec<String> = rows
        .into_iter()
        .take(5)
        .map(|(q, n)| {
            let truncated: String = q.chars().take(40).collect();
            format!("\"{truncated}\"({n}x)")
        })
        .collect();
    Some(strs.join(" | "))
}

fn friction_list(events: &[&AccessEvent]) -> Option<String> {
    let mut per_session: HashMap<&str, Vec<&str>> = HashMap::new();
    for e in events {
        let sid = e.session_id.as_deref().unwrap_or("unknown");
        per_session.entry(sid).or_default().push(e.query.as_str());
    }

    let mut pattern_totals: HashMap<String, usize> = HashMap::new();
    for queries in per_session.values() {
        let mut seen: HashMap<String, usize> = HashMap::new();
        for q in queries {
            let key = q
                .to_lowercase()
                .split_whitespace()
                .take(3)
                .collect::<Vec<_>>()
                .join(" ");
            *seen.entry(key).or_insert(0) += 1;
        }
        for (pattern, repeats) in seen {
            if repeats >= 2 {
                *pattern_totals.entry(pattern).or_insert(0) += repeats;
            }
        }
    }

    let mut rows: Vec<(String, usize)> = pattern_totals.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1));
    if rows.is_empty() {
        return None;
    }
    let strs: Vec<String> = rows
        .into_iter()
        .take(10)
        .map(|(pattern, total)| format!("{pattern}({total}x)"))
        .collect();
    Some(strs.join(" | "))
}

fn resonance_pairs(events: &[&AccessEvent]) -> Vec<(String, String, usize)> {
    let mut session_chunks: HashMap<&str, HashSet<String>> = HashMap::new();
    for e in events {
        let sid = e.session_id.as_deref().unwrap_or("unknown");
        let entry = session_chunks.entry(sid).or_default();
        for r in &e.results {
            entry.insert(format!("{}:{}", r.file, r.lines));
        }
    }

    let mut cooccur: HashMap<(String, String), usize> = HashMap::new();
    for chunks in session_chunks.values() {
        let mut sorted: Vec<&String> = chunks.iter().collect();
        sorted.sort();
        for i in 0..sorted.len() {
            for j in (i + 1)..sorted.len() {
                let key = (sorted[i].clone(), sorted[j].clone());
                *cooccur.entry(key).or_insert(0) += 1;
            }
        }
    }

    let mut rows: Vec<((String, String), usize)> = cooccur.into_iter().filter(|&(_, c)| c >= 2).collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1));
    rows.truncate(20);
    rows.into_iter().map(|((a, b), c)| (a, b, c)).collect()
}

fn exit_code_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:Process |Command )exited with code (\d+)").unwrap())
}

/// Scan transcripts under `sessions_dir` for failure markers, tallying
/// by kind; only kinds seen at least twice survive.
fn tool_failure_list(sessions_dir: &Path, _window_days: f64) -> Result<Option<String>> {
    if !sessions_dir.exists() {
        return Ok(None);
    }
    let mut counts: HashMap<String, usize> = HashMap::new();

    let mut files: Vec<_> = std::fs::read_dir(sessions_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("jsonl"))
        .collect();
    files.sort();

    for path in files {
        let Ok(content) = std::fs::read_to_string(&path) else { continue };
        for line in content.lines() {
            let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else { continue };
            let message = value.get("message");
            if message.and_then(|m| m.get("role")).and_then(|r| r.as_str()) != Some("toolResult") {
                continue;
            }
            let Some(blocks) = message.and_then(|m| m.get("content")).and_then(|c| c.as_array()) else {
                continue;
            };
            for block in blocks {
                if block.get("type").and_then(|t| t.as_str()) != Some("text") {
                    continue;
                }
                let Some(text) = block.get("text").and_then(|t| t.as_str()) else { continue };
                if let Some(cap) = exit_code_pattern().captures(text) {
                    if &cap[1] != "0" {
                        *counts.entry(format!("exit:{}", &cap[1])).or_insert(0) += 1;
                    }
                } else if text.contains("Command timed out") {
                    *counts.entry("timeout".to_string()).or_insert(0) += 1;
                } else if text.get(..100.min(text.len())).is_some_and(|head| head.contains("\"status\": \"error\"")) {
                    *counts.entry("tool-error".to_string()).or_insert(0) += 1;
                }
            }
        }
    }

    let mut rows: Vec<(String, usize)> = counts.into_iter().filter(|&(_, c)| c >= 2).collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1));
    if rows.is_empty() {
        return Ok(None);
    }
    let strs: Vec<String> = rows.into_iter().take(5).map(|(k, c)| format!("{k}({c}x)")).collect();
    Ok(Some(strs.join(" ")))
}

fn promotion_list(events: &[&AccessEvent], energy: &HashMap<ChunkKey, ChunkEnergy>, boot_context: &[String]) -> Option<String> {
    let mut session_chunks: HashMap<String, HashSet<&str>> = HashMap::new();
    for e in events {
        let sid = e.session_id.as_deref().unwrap_or("unknown");
        for r in &e.results {
            let key = format!("{}:{}", r.file, r.lines);
            session_chunks.entry(key).or_default().insert(sid);
        }
    }

    let mut rows: Vec<(String, u64, usize)> = session_chunks
        .into_iter()
        .filter_map(|(key, sessions)| {
            let chunk_key = ChunkKey::from(key.clone());
            if boot_context.iter().any(|f| f == chunk_key.file_part()) {
                return None;
            }
            let accesses = energy.get(&chunk_key).map(|e| e.total_accesses).unwrap_or(0);
            if accesses >= 5 && sessions.len() >= 3 {
                Some((key, accesses, sessions.len()))
            } else {
                None
            }
        })
        .collect();

    rows.sort_by(|a, b| b.1.cmp(&a.1));
    if rows.is_empty() {
        return None;
    }
    let strs: Vec<String> = rows
        .into_iter()
        .take(5)
        .map(|(key, accesses, sessions)| format!("{key}({accesses}x/{sessions}s)"))
        .collect();
    Some(strs.join(" | "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_core::ResultRecord;

    fn event(id: u64, session: &str, query: &str, timestamp: f64, results: Vec<ResultRecord>) -> AccessEvent {
        AccessEvent {
            id,
            timestamp,
            session_id: Some(session.to_string()),
            query: query.to_string(),
            results,
        }
    }

    #[test]
    fn compresses_memory_and_dated_keys() {
        assert_eq!(compress_key("MEMORY.md:51"), "M:51");
        assert_eq!(compress_key("memory/2026-02-07.md:1"), "m/0207:1");
    }

    #[test]
    fn no_events_yields_placeholder() {
        let config = EngramConfig::default();
        let report = generate(&[], &HashMap::new(), None, &config, "2026-02-20").unwrap();
        assert_eq!(report.content, "# mirror — no access data yet\n");
    }

    #[test]
    fn scenario_s4_friction_and_stats_line() {
        let events = vec![
            event(0, "s1", "alpha beta gamma", 1.0, vec![]),
            event(1, "s1", "alpha beta gamma delta", 2.0, vec![]),
            event(2, "s2", "alpha beta gamma", 3.0, vec![]),
            event(3, "s2", "alpha beta gamma epsilon", 4.0, vec![]),
        ];
        let refs: Vec<&AccessEvent> = events.iter().collect();
        let config = EngramConfig::default();
        let report = generate(&refs, &HashMap::new(), None, &config, "2026-02-20").unwrap();

        assert!(report.content.contains("friction: alpha beta gamma(4x)"), "{}", report.content);
        assert!(report.content.contains("stats: 4ev/1uq/2sess/14d"), "{}", report.content);
    }

    #[test]
    fn gaps_rank_by_miss_count() {
        let events = vec![
            event(0, "s1", "missing thing", 1.0, vec![]),
            event(1, "s1", "missing thing", 2.0, vec![]),
            event(2, "s1", "found thing", 3.0, vec![ResultRecord { file: "a.md".into(), lines: "1".into(), score: 0.9 }]),
        ];
        let refs: Vec<&AccessEvent> = events.iter().collect();
        let config = EngramConfig::default();
        let report = generate(&refs, &HashMap::new(), None, &config, "2026-02-20").unwrap();
        assert!(report.content.contains("gaps: \"missing thing\"(2x)"));
    }

    #[test]
    fn resonance_requires_two_sessions() {
        let result = |f: &str| ResultRecord { file: f.into(), lines: "1".into(), score: 0.9 };
        let events = vec![
            event(0, "s1", "q1", 1.0, vec![result("a.md"), result("b.md")]),
            event(1, "s2", "q2", 2.0, vec![result("a.md"), result("b.md")]),
        ];
        let refs: Vec<&AccessEvent> = events.iter().collect();
        let config = EngramConfig::default();
        let report = generate(&refs, &HashMap::new(), None, &config, "2026-02-20").unwrap();
        assert!(report.content.contains("a.md:1"));
        assert!(report.content.contains("↔"));
    }

    #[test]
    fn promotion_excludes_boot_context_files() {
        let result = |f: &str| ResultRecord { file: f.into(), lines: "1".into(), score: 0.9 };
        let mut energy = HashMap::new();
        energy.insert(
            ChunkKey::new("MEMORY.md", "1"),
            ChunkEnergy { total_accesses: 10, total_score: 9.0, first_accessed: 0.0, last_accessed: 10.0 },
        );
        energy.insert(
            ChunkKey::new("notes.md", "1"),
            ChunkEnergy { total_accesses: 10, total_score: 9.0, first_accessed: 0.0, last_accessed: 10.0 },
        );
        let events = vec![
            event(0, "s1", "q", 1.0, vec![result("MEMORY.md"), result("notes.md")]),
            event(1, "s2", "q", 2.0, vec![result("MEMORY.md"), result("notes.md")]),
            event(2, "s3", "q", 3.0, vec![result("MEMORY.md"), result("notes.md")]),
        ];
        let refs: Vec<&AccessEvent> = events.iter().collect();
        let config = EngramConfig::default();
        let report = generate(&refs, &energy, None, &config, "2026-02-20").unwrap();
        assert!(report.content.contains("notes.md:1"));
        assert!(!report.content.contains("promote: MEMORY.md"));
    }
}
