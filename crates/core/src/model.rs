//! Data model shared by every Engram component.
//!
//! Types here are plain serde-derived structs with no behavior beyond
//! small constructors — the Access Store, Extractor, Engine and Mirror
//! each own the logic that produces or consumes them (see their
//! respective crates).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical chunk identifier: `"<file>:<line_start>"`.
///
/// The sole identifier linking access events to embedding rows. Wrapped
/// in a newtype so a raw file path can never be compared against a
/// chunk key by accident.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkKey(String);

impl ChunkKey {
    /// Build a chunk key from its canonical parts.
    pub fn new(file: impl AsRef<str>, lines: impl AsRef<str>) -> Self {
        ChunkKey(format!("{}:{}", file.as_ref(), lines.as_ref()))
    }

    /// The raw `"<file>:<line_start>"` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `file` portion of the key, if the key has the canonical shape.
    pub fn file_part(&self) -> &str {
        self.0.split(':').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ChunkKey {
    fn from(s: String) -> Self {
        ChunkKey(s)
    }
}

/// One retrieved result inside an [`AccessEvent`].
///
/// Already canonicalized to `{file, lines, score}` — producers vary
/// (`file`/`path`, `lines`/`line`); the Extractor maps at the boundary,
/// this shape is the only one the rest of the system ever sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Source file the chunk came from. Defaults to `"?"` if unknown.
    pub file: String,
    /// Start-line identifier, stringified. Defaults to `"?"` if unknown.
    pub lines: String,
    /// Unit-scale relevance signal, `>= 0`. Defaults to `0.5` if unknown.
    pub score: f64,
}

impl ResultRecord {
    /// The chunk key this result refers to.
    pub fn chunk_key(&self) -> ChunkKey {
        ChunkKey::new(&self.file, &self.lines)
    }
}

/// One observed retrieval call, immutable once inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessEvent {
    /// Monotonic insertion id, assigned by the Access Store.
    pub id: u64,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    /// Opaque session identifier, if the call happened inside a session.
    pub session_id: Option<String>,
    /// The query text that produced this event.
    pub query: String,
    /// Ordered result records.
    pub results: Vec<ResultRecord>,
}

impl AccessEvent {
    /// Cardinality of `results`.
    pub fn n_results(&self) -> usize {
        self.results.len()
    }

    /// Maximum score across results, or 0 if there are none.
    pub fn top_score(&self) -> f64 {
        self.results
            .iter()
            .map(|r| r.score)
            .fold(0.0_f64, f64::max)
    }
}

/// Per-chunk accumulated access energy.
///
/// Created on first reference to a [`ChunkKey`]; updated on every
/// subsequent reference; never deleted by the core.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkEnergy {
    /// Number of `ResultRecord`s naming this chunk, across all events.
    pub total_accesses: u64,
    /// Sum of the scores of those result records.
    pub total_score: f64,
    /// Timestamp of the first reference.
    pub first_accessed: f64,
    /// Timestamp of the most recent reference.
    pub last_accessed: f64,
}

impl ChunkEnergy {
    /// A fresh row for a chunk's first reference.
    pub fn first(score: f64, timestamp: f64) -> Self {
        ChunkEnergy {
            total_accesses: 1,
            total_score: score,
            first_accessed: timestamp,
            last_accessed: timestamp,
        }
    }

    /// Fold in one more reference.
    pub fn record(&mut self, score: f64, timestamp: f64) {
        self.total_accesses += 1;
        self.total_score += score;
        if timestamp < self.first_accessed {
            self.first_accessed = timestamp;
        }
        if timestamp > self.last_accessed {
            self.last_accessed = timestamp;
        }
    }

    /// Mean score across recorded accesses.
    pub fn avg_score(&self) -> f64 {
        self.total_score / (self.total_accesses.max(1) as f64)
    }
}

/// Watermark row: enforces extract-once-per-session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedSession {
    /// Stable session identifier, derived from the transcript filename.
    pub session_id: String,
    /// When this session was processed.
    pub processed_at: f64,
    /// Number of access events extracted from it.
    pub events_extracted: usize,
}

/// A single promoted or demoted row in a [`ReconsolidationRun`]'s detail
/// payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMover {
    /// The chunk's canonical key.
    pub chunk_key: String,
    /// Content preview, truncated to at most 80 characters.
    pub content_preview: String,
    /// The chunk's energy for this run.
    pub energy: f64,
    /// `sim_after - sim_before` for this chunk.
    pub delta: f64,
}

/// One row per invocation of the Reconsolidation Engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconsolidationRun {
    /// When the run executed.
    pub timestamp: f64,
    /// Total chunks in the vector store at run time.
    pub n_chunks: usize,
    /// Chunks with nonzero energy.
    pub n_with_energy: usize,
    /// Number of DCT coefficients retained.
    pub k_coefficients: usize,
    /// `keep_ratio` parameter used.
    pub keep_ratio: f64,
    /// `promotion_strength` parameter used.
    pub promotion_strength: f64,
    /// Mean cosine similarity, unweighted baseline.
    pub avg_sim_before: f64,
    /// Mean cosine similarity, promoted reconstruction.
    pub avg_sim_after: f64,
    /// Mean `sims_after - sims_before`.
    pub avg_delta: f64,
    /// Maximum per-row delta.
    pub max_promoted_delta: f64,
    /// Minimum per-row delta.
    pub max_demoted_delta: f64,
    /// Total access events feeding this run's energy map.
    pub total_access_events: usize,
    /// Top promoted rows (delta > 0.001), at most 10.
    pub promoted: Vec<ChunkMover>,
    /// Top demoted rows (delta < -0.001), at most 5.
    pub demoted: Vec<ChunkMover>,
    /// Rows where similarity math hit NaN/Inf and were clamped to delta=0.
    pub anomalies: Vec<String>,
}
