//! Access Store — the on-disk event log and chunk-energy accumulator.
//!
//! Every memory-retrieval call the agent makes is logged here exactly
//! once via [`AccessStore::log_event`]. The store derives per-chunk
//! energy as a pure fold over the event log rather than persisting it
//! separately, so a crash mid-write can never leave the energy
//! accumulator out of sync with the events that actually committed —
//! see `SPEC_FULL.md` §4.1 for the rationale.

use engram_core::framing::{append_record, open_append, replay_records};
use engram_core::{AccessEvent, ChunkEnergy, ChunkKey, ProcessedSession, Result, ResultRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

const EVENTS_LOG: &str = "events.log";
const SESSIONS_LOG: &str = "sessions.log";

/// A result record as it arrives over the wire, before defaults are
/// filled in. Mirrors the dynamic shape producers actually send: `file`
/// may be absent or spelled `path`, `lines` may be absent or spelled
/// `line`, `score` may be absent entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawResult {
    /// Source file, under either key.
    #[serde(alias = "path", default)]
    pub file: Option<String>,
    /// Start-line identifier, under either key.
    #[serde(alias = "line", default)]
    pub lines: Option<String>,
    /// Relevance score.
    #[serde(default)]
    pub score: Option<f64>,
}

impl RawResult {
    fn canonicalize(self) -> ResultRecord {
        ResultRecord {
            file: self.file.unwrap_or_else(|| "?".to_string()),
            lines: self.lines.unwrap_or_else(|| "?".to_string()),
            score: self.score.unwrap_or(0.5),
        }
    }
}

/// One hot chunk in [`AccessStats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotChunk {
    /// Canonical chunk key.
    pub chunk: String,
    /// Total accesses recorded for this chunk.
    pub accesses: u64,
    /// Total score accumulated for this chunk.
    pub total_score: f64,
    /// Most recent access timestamp.
    pub last_accessed: f64,
}

/// One recent query in [`AccessStats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentQuery {
    /// The query text.
    pub query: String,
    /// Number of results it returned.
    pub results: usize,
    /// Top score across those results.
    pub top_score: f64,
    /// When the query ran.
    pub timestamp: f64,
}

/// Snapshot of access statistics returned by [`AccessStore::stats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessStats {
    /// Total access events logged.
    pub total_access_events: usize,
    /// Distinct query strings.
    pub unique_queries: usize,
    /// Distinct chunk keys ever referenced.
    pub tracked_chunks: usize,
    /// Earliest event timestamp, if any events exist.
    pub earliest_event: Option<f64>,
    /// Latest event timestamp, if any events exist.
    pub latest_event: Option<f64>,
    /// Top 15 chunks by total accesses.
    pub hottest_chunks: Vec<HotChunk>,
    /// 10 most recent queries.
    pub recent_queries: Vec<RecentQuery>,
}

/// One entry returned by [`AccessStore::dump`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpEntry {
    /// Event timestamp.
    pub timestamp: f64,
    /// Session id, if any.
    pub session: Option<String>,
    /// Query text.
    pub query: String,
    /// Number of results.
    pub results: usize,
    /// Top score across results.
    pub top_score: f64,
}

/// The on-disk event log and chunk-energy accumulator.
///
/// Single-writer: concurrent `log_event` callers must be serialized by
/// the caller (§5). Readers may run freely against the in-memory state.
pub struct AccessStore {
    events_path: PathBuf,
    events_file: File,
    sessions_file: File,
    events: Vec<AccessEvent>,
    energy: HashMap<ChunkKey, ChunkEnergy>,
    processed: HashMap<String, ProcessedSession>,
    next_id: u64,
}

impl AccessStore {
    /// Open (or create) the Access Store rooted at `dir`.
    ///
    /// Replays `events.log` and `sessions.log` to rebuild in-memory
    /// state. A torn trailing record from an unclean shutdown is
    /// dropped by the replay and never surfaces to the caller.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let events_path = dir.join(EVENTS_LOG);
        let sessions_path = dir.join(SESSIONS_LOG);

        let events: Vec<AccessEvent> = replay_records(&events_path)?;
        let sessions: Vec<ProcessedSession> = replay_records(&sessions_path)?;

        let next_id = events.iter().map(|e| e.id).max().map_or(0, |m| m + 1);
        let energy = recompute_energy(&events);
        let mut processed = HashMap::new();
        for s in sessions {
            processed.insert(s.session_id.clone(), s);
        }

        tracing::info!(
            events = events.len(),
            chunks = energy.len(),
            sessions = processed.len(),
            "access store opened"
        );

        Ok(AccessStore {
            events_file: open_append(&events_path)?,
            sessions_file: open_append(&sessions_path)?,
            events_path,
            events,
            energy,
            processed,
            next_id,
        })
    }

    /// Append an access event and fold its results into chunk energy.
    ///
    /// Missing `score` defaults to `0.5`; missing `file`/`lines` default
    /// to `"?"`. `top_score` is the max score over results, or 0 if
    /// there are none.
    pub fn log_event(
        &mut self,
        query: impl Into<String>,
        results: Vec<RawResult>,
        session_id: Option<String>,
        timestamp: Option<f64>,
    ) -> Result<AccessEvent> {
        let ts = timestamp.unwrap_or_else(now_secs);
        let results: Vec<ResultRecord> = results.into_iter().map(RawResult::canonicalize).collect();

        let event = AccessEvent {
            id: self.next_id,
            timestamp: ts,
            session_id,
            query: query.into(),
            results,
        };

        append_record(&mut self.events_file, &event)?;
        self.next_id += 1;

        for r in &event.results {
            let key = r.chunk_key();
            self.energy
                .entry(key)
                .and_modify(|e| e.record(r.score, ts))
                .or_insert_with(|| ChunkEnergy::first(r.score, ts));
        }

        tracing::debug!(
            id = event.id,
            results = event.results.len(),
            "logged access event"
        );

        self.events.push(event.clone());
        Ok(event)
    }

    /// Has `session_id` already been processed by the Extractor?
    pub fn is_processed(&self, session_id: &str) -> bool {
        self.processed.contains_key(session_id)
    }

    /// Record that `session_id` has been processed, extracting
    /// `events_extracted` events.
    pub fn mark_processed(&mut self, session_id: impl Into<String>, events_extracted: usize) -> Result<()> {
        let row = ProcessedSession {
            session_id: session_id.into(),
            processed_at: now_secs(),
            events_extracted,
        };
        append_record(&mut self.sessions_file, &row)?;
        self.processed.insert(row.session_id.clone(), row);
        Ok(())
    }

    /// Access statistics: counts, top-15 hottest chunks, 10 most recent
    /// queries.
    pub fn stats(&self) -> AccessStats {
        let earliest_event = self.events.iter().map(|e| e.timestamp).fold(None, min_opt);
        let latest_event = self.events.iter().map(|e| e.timestamp).fold(None, max_opt);

        let unique_queries = self
            .events
            .iter()
            .map(|e| e.query.as_str())
            .collect::<std::collections::HashSet<_>>()
            .len();

        let mut hottest: Vec<(&ChunkKey, &ChunkEnergy)> = self.energy.iter().collect();
        hottest.sort_by(|a, b| b.1.total_accesses.cmp(&a.1.total_accesses));
        let hottest_chunks = hottest
            .into_iter()
            .take(15)
            .map(|(k, e)| HotChunk {
                chunk: k.as_str().to_string(),
                accesses: e.total_accesses,
                total_score: e.total_score,
                last_accessed: e.last_accessed,
            })
            .collect();

        let mut recent: Vec<&AccessEvent> = self.events.iter().collect();
        recent.sort_by(|a, b| b.timestamp.partial_cmp(&a.timestamp).unwrap_or(std::cmp::Ordering::Equal));
        let recent_queries = recent
            .into_iter()
            .take(10)
            .map(|e| RecentQuery {
                query: e.query.clone(),
                results: e.n_results(),
                top_score: e.top_score(),
                timestamp: e.timestamp,
            })
            .collect();

        AccessStats {
            total_access_events: self.events.len(),
            unique_queries,
            tracked_chunks: self.energy.len(),
            earliest_event,
            latest_event,
            hottest_chunks,
            recent_queries,
        }
    }

    /// Most recent `limit` events, newest first.
    pub fn dump(&self, limit: usize) -> Vec<DumpEntry> {
        let mut events: Vec<&AccessEvent> = self.events.iter().collect();
        events.sort_by(|a, b| b.timestamp.partial_cmp(&a.timestamp).unwrap_or(std::cmp::Ordering::Equal));
        events
            .into_iter()
            .take(limit)
            .map(|e| DumpEntry {
                timestamp: e.timestamp,
                session: e.session_id.clone(),
                query: e.query.clone(),
                results: e.n_results(),
                top_score: e.top_score(),
            })
            .collect()
    }

    /// Events with `timestamp > now - window_secs`, in file order.
    pub fn load_recent_events(&self, window_secs: f64) -> Vec<&AccessEvent> {
        let cutoff = now_secs() - window_secs;
        self.events.iter().filter(|e| e.timestamp > cutoff).collect()
    }

    /// All events ever logged, in file order. Used by components (the
    /// Mirror Analyzer) that need the full event list rather than a
    /// time-windowed slice.
    pub fn all_events(&self) -> &[AccessEvent] {
        &self.events
    }

    /// A snapshot of every tracked chunk's energy row.
    pub fn load_all_chunk_energy(&self) -> &HashMap<ChunkKey, ChunkEnergy> {
        &self.energy
    }

    /// Path to the underlying event log, for diagnostics.
    pub fn events_path(&self) -> &Path {
        &self.events_path
    }

    /// Force a full rebuild of the in-memory energy map from the event
    /// log on disk. Exposed for operators who want to recover from a
    /// suspected in-memory/on-disk divergence without restarting the
    /// process; not used on the normal read/write path.
    pub fn rebuild_energy(&mut self) {
        self.energy = recompute_energy(&self.events);
    }
}

fn recompute_energy(events: &[AccessEvent]) -> HashMap<ChunkKey, ChunkEnergy> {
    let mut energy: HashMap<ChunkKey, ChunkEnergy> = HashMap::new();
    for event in events {
        for r in &event.results {
            let key = r.chunk_key();
            energy
                .entry(key)
                .and_modify(|e| e.record(r.score, event.timestamp))
                .or_insert_with(|| ChunkEnergy::first(r.score, event.timestamp));
        }
    }
    energy
}

fn now_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

fn min_opt(acc: Option<f64>, x: f64) -> Option<f64> {
    Some(acc.map_or(x, |a| a.min(x)))
}

fn max_opt(acc: Option<f64>, x: f64) -> Option<f64> {
    Some(acc.map_or(x, |a| a.max(x)))
}
