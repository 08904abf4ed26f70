//! Reconsolidation Engine: builds an energy map from the Access Store,
//! reshapes the Vector Store's embeddings with a weighted DCT so
//! frequently-accessed chunks survive lossy low-pass truncation, and
//! records the outcome as a `ReconsolidationRun`.

pub mod dct;
pub mod energy_map;
pub mod reconsolidate;
pub mod vector_store;

pub use energy_map::EnergyMap;
pub use reconsolidate::{reconsolidate, ReconsolidationOutcome, ReconsolidationParams};
pub use vector_store::{Chunk, FileVectorStore, VectorStore};

use engram_core::{framing, ReconsolidationRun, Result};
use std::path::{Path, PathBuf};

const RUNS_LOG: &str = "runs.log";

/// Owns the Engine's metrics log (`runs.log`), appended to after every
/// non-dry-run, non-no-op reconsolidation — the only writer `SPEC_FULL.md`
/// §3 permits for this file.
pub struct MetricsStore {
    path: PathBuf,
}

impl MetricsStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(MetricsStore { path: dir.join(RUNS_LOG) })
    }

    /// Append one completed run to the metrics log.
    pub fn record(&self, run: &ReconsolidationRun) -> Result<()> {
        let mut file = framing::open_append(&self.path)?;
        framing::append_record(&mut file, run)?;
        tracing::info!(timestamp = run.timestamp, k = run.k_coefficients, "run recorded");
        Ok(())
    }

    /// All recorded runs, oldest first.
    pub fn all_runs(&self) -> Result<Vec<ReconsolidationRun>> {
        framing::replay_records(&self.path)
    }

    /// The most recently recorded run, if any.
    pub fn latest(&self) -> Result<Option<ReconsolidationRun>> {
        Ok(self.all_runs()?.into_iter().last())
    }
}
