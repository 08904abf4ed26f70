//! Error types shared across the Engram workspace.
//!
//! Every fallible operation in `engram-store`, `engram-extractor`,
//! `engram-engine` and `engram-mirror` returns `engram_core::Result`.
//! Variants map onto the error taxonomy: `InputMalformed` and
//! `MissingDependency` are recoverable (callers log and continue or
//! return a structured no-op); `WriteBackInconsistent` aborts the
//! caller's operation; `NumericDegenerate` is recorded on a metrics row
//! rather than propagated.

use std::io;
use thiserror::Error;

/// Result type alias used throughout the Engram workspace.
pub type Result<T> = std::result::Result<T, EngramError>;

/// Unified error type for the Engram workspace.
#[derive(Debug, Error)]
pub enum EngramError {
    /// I/O failure reading or writing a store file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Encoding or decoding failure (bincode, serde_json, toml).
    #[error("serialization error: {0}")]
    Serde(String),

    /// A transcript or result block could not be parsed. Recoverable:
    /// the caller logs and skips the offending block.
    #[error("malformed input: {0}")]
    InputMalformed(String),

    /// An external collaborator the operation depends on is absent
    /// (e.g. the vector store has no chunks file yet). Recoverable:
    /// the caller returns a structured `{"action": "none"}` status.
    #[error("missing dependency: {0}")]
    MissingDependency(String),

    /// The operation has nothing to do (no access events, or no
    /// overlap between access energy and the current chunk set).
    #[error("empty state: {0}")]
    EmptyState(String),

    /// The vector store's chunk count changed between the read and the
    /// write-back step of a reconsolidation run. The run must abort
    /// without partial writes.
    #[error("write-back inconsistent: expected {expected} chunks, observed {observed}")]
    WriteBackInconsistent {
        /// Chunk count observed when the transform was computed.
        expected: usize,
        /// Chunk count observed at write-back time.
        observed: usize,
    },

    /// NaN or Inf appeared in a similarity computation. The offending
    /// row is clamped to delta = 0 by the caller; this variant only
    /// carries the message recorded in a run's `anomalies` field.
    #[error("numeric degeneracy: {0}")]
    NumericDegenerate(String),
}

impl From<bincode::Error> for EngramError {
    fn from(e: bincode::Error) -> Self {
        EngramError::Serde(e.to_string())
    }
}

impl From<serde_json::Error> for EngramError {
    fn from(e: serde_json::Error) -> Self {
        EngramError::Serde(e.to_string())
    }
}

impl From<toml::de::Error> for EngramError {
    fn from(e: toml::de::Error) -> Self {
        EngramError::Serde(e.to_string())
    }
}

impl From<toml::ser::Error> for EngramError {
    fn from(e: toml::ser::Error) -> Self {
        EngramError::Serde(e.to_string())
    }
}
