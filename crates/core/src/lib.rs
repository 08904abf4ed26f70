//! Core types shared across the Engram workspace.
//!
//! This crate defines the foundational pieces used by every other
//! crate in the workspace:
//! - the data model (`AccessEvent`, `ChunkKey`, `ChunkEnergy`, ...)
//! - the workspace error type (`EngramError`)
//! - the on-disk `engram.toml` configuration format
//! - the length-prefixed append-log primitive every on-disk store uses

pub mod config;
pub mod error;
pub mod framing;
pub mod model;

pub use config::EngramConfig;
pub use error::{EngramError, Result};
pub use model::{
    AccessEvent, ChunkEnergy, ChunkKey, ChunkMover, ProcessedSession, ReconsolidationRun,
    ResultRecord,
};
