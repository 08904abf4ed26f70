//! The Reconsolidation Engine's transform pipeline (§4.4): weight rows
//! by energy, DCT along the chunk axis, truncate, inverse, un-weight,
//! and compare against an unweighted baseline to report which chunks
//! gained or lost fidelity.

use crate::dct::DctBasis;
use crate::energy_map::EnergyMap;
use crate::vector_store::{Chunk, VectorStore};
use engram_core::{ChunkMover, EngramError, ReconsolidationRun, Result};

const SIM_EPSILON: f64 = 1e-10;
const PROMOTE_THRESHOLD: f64 = 0.001;
const DEMOTE_THRESHOLD: f64 = -0.001;
const MAX_PROMOTED_ROWS: usize = 10;
const MAX_DEMOTED_ROWS: usize = 5;

/// Outcome of one [`reconsolidate`] invocation.
#[derive(Debug, Clone)]
pub enum ReconsolidationOutcome {
    /// No chunks, no energy, or the energy map didn't match any
    /// current chunk key — nothing was written.
    NoOp { reason: String },
    /// A run completed; `run` carries its metrics and (unless
    /// `dry_run` was set) the write-back already happened.
    Applied { run: ReconsolidationRun },
}

/// Parameters controlling one reconsolidation pass.
#[derive(Debug, Clone, Copy)]
pub struct ReconsolidationParams {
    pub keep_ratio: f64,
    pub promotion_strength: f64,
    pub dry_run: bool,
}

/// Run the weighted-DCT reconsolidation pipeline against `store`,
/// using `energy` to weight chunks and `total_access_events` purely
/// for the metrics payload.
pub fn reconsolidate(
    store: &mut dyn VectorStore,
    energy: &EnergyMap,
    params: ReconsolidationParams,
    total_access_events: usize,
    now: f64,
) -> Result<ReconsolidationOutcome> {
    let chunks = store.list_chunks()?;
    let n = chunks.len();

    if n == 0 {
        tracing::debug!("reconsolidation skipped: vector store has no chunks");
        return Ok(ReconsolidationOutcome::NoOp {
            reason: "vector store has no chunks".to_string(),
        });
    }
    if energy.is_all_zero() {
        tracing::debug!("reconsolidation skipped: energy map is empty or all-zero");
        return Ok(ReconsolidationOutcome::NoOp {
            reason: "energy map is empty or all-zero".to_string(),
        });
    }

    let n_with_energy = chunks
        .iter()
        .filter(|c| energy.get(&c.chunk_key()) > 0.0)
        .count();
    if n_with_energy == 0 {
        return Ok(ReconsolidationOutcome::NoOp {
            reason: "energy map does not match any current chunk key".to_string(),
        });
    }

    let dim = store.dim();
    let embeddings = read_embeddings(store, &chunks, dim)?;
    let weights: Vec<f64> = chunks
        .iter()
        .map(|c| 1.0 + params.promotion_strength * energy.get(&c.chunk_key()))
        .collect();

    let k = (n as f64 * params.keep_ratio).floor().max(1.0) as usize;
    let basis = DctBasis::new(n);

    let weighted = row_scale(&embeddings, &weights);
    let reconstructed = un_row_scale(&transform_truncate_inverse(&basis, &weighted, k), &weights);
    let baseline = transform_truncate_inverse(&basis, &embeddings, k);

    let mut sims_before = Vec::with_capacity(n);
    let mut sims_after = Vec::with_capacity(n);
    let mut deltas = Vec::with_capacity(n);
    let mut anomalies = Vec::new();

    for i in 0..n {
        let sim_before = cosine_similarity(&embeddings[i], &baseline[i]);
        let sim_after = cosine_similarity(&embeddings[i], &reconstructed[i]);
        let (sim_before, sim_after, delta) = if sim_before.is_finite() && sim_after.is_finite() {
            (sim_before, sim_after, sim_after - sim_before)
        } else {
            anomalies.push(chunks[i].chunk_key().to_string());
            (0.0, 0.0, 0.0)
        };
        sims_before.push(sim_before);
        sims_after.push(sim_after);
        deltas.push(delta);
    }

    if !params.dry_run {
        write_back(store, &chunks, &reconstructed)?;
    }

    tracing::info!(
        n_chunks = n,
        n_with_energy,
        k,
        dry_run = params.dry_run,
        "reconsolidation pass complete"
    );

    let avg_sim_before = mean(&sims_before);
    let avg_sim_after = mean(&sims_after);
    let avg_delta = mean(&deltas);
    let max_promoted_delta = deltas.iter().copied().fold(f64::MIN, f64::max).max(0.0);
    let max_demoted_delta = deltas.iter().copied().fold(f64::MAX, f64::min).min(0.0);

    let promoted = top_movers(&chunks, &energy_for_chunks(&chunks, energy), &deltas, PROMOTE_THRESHOLD, true, MAX_PROMOTED_ROWS);
    let demoted = top_movers(&chunks, &energy_for_chunks(&chunks, energy), &deltas, DEMOTE_THRESHOLD, false, MAX_DEMOTED_ROWS);

    let run = ReconsolidationRun {
        timestamp: now,
        n_chunks: n,
        n_with_energy,
        k_coefficients: k,
        keep_ratio: params.keep_ratio,
        promotion_strength: params.promotion_strength,
        avg_sim_before,
        avg_sim_after,
        avg_delta,
        max_promoted_delta,
        max_demoted_delta,
        total_access_events,
        promoted,
        demoted,
        anomalies,
    };

    Ok(ReconsolidationOutcome::Applied { run })
}

fn read_embeddings(store: &dyn VectorStore, chunks: &[Chunk], dim: usize) -> Result<Vec<Vec<f64>>> {
    chunks
        .iter()
        .map(|c| {
            let row = store.read_embedding(c.id)?;
            if row.len() != dim {
                return Err(EngramError::InputMalformed(format!(
                    "chunk {} has {} dims, store expects {}",
                    c.id,
                    row.len(),
                    dim
                )));
            }
            Ok(row.into_iter().map(|v| v as f64).collect())
        })
        .collect()
}

fn write_back(store: &mut dyn VectorStore, chunks: &[Chunk], reconstructed: &[Vec<f64>]) -> Result<()> {
    let observed = store.list_chunks()?.len();
    if observed != chunks.len() {
        return Err(EngramError::WriteBackInconsistent {
            expected: chunks.len(),
            observed,
        });
    }
    for (chunk, row) in chunks.iter().zip(reconstructed.iter()) {
        let as_f32: Vec<f32> = row.iter().map(|&v| v as f32).collect();
        store.write_embedding(chunk.id, &as_f32)?;
    }
    Ok(())
}

fn row_scale(matrix: &[Vec<f64>], weights: &[f64]) -> Vec<Vec<f64>> {
    matrix
        .iter()
        .zip(weights.iter())
        .map(|(row, &w)| row.iter().map(|&v| v * w).collect())
        .collect()
}

fn un_row_scale(matrix: &[Vec<f64>], weights: &[f64]) -> Vec<Vec<f64>> {
    matrix
        .iter()
        .zip(weights.iter())
        .map(|(row, &w)| row.iter().map(|&v| v / w).collect())
        .collect()
}

fn transform_truncate_inverse(basis: &DctBasis, matrix: &[Vec<f64>], k: usize) -> Vec<Vec<f64>> {
    let mut coefficients = basis.forward(matrix);
    for row in coefficients.iter_mut().skip(k) {
        row.iter_mut().for_each(|v| *v = 0.0);
    }
    basis.inverse(&coefficients)
}

fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(&x, &y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|&x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|&x| x * x).sum::<f64>().sqrt();
    dot / (norm_a * norm_b + SIM_EPSILON)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn energy_for_chunks(chunks: &[Chunk], energy: &EnergyMap) -> Vec<f64> {
    chunks.iter().map(|c| energy.get(&c.chunk_key())).collect()
}

#[allow(clippy::too_many_arguments)]
fn top_movers(
    chunks: &[Chunk],
    energies: &[f64],
    deltas: &[f64],
    threshold: f64,
    promoted: bool,
    limit: usize,
) -> Vec<ChunkMover> {
    let mut rows: Vec<(usize, f64)> = deltas
        .iter()
        .enumerate()
        .filter(|&(_, &d)| if promoted { d > threshold } else { d < threshold })
        .map(|(i, &d)| (i, d))
        .collect();

    if promoted {
        rows.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    } else {
        rows.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    }
    rows.truncate(limit);

    rows.into_iter()
        .map(|(i, delta)| {
            let chunk = &chunks[i];
            let preview: String = chunk.content.chars().take(80).collect();
            ChunkMover {
                chunk_key: chunk.chunk_key().to_string(),
                content_preview: preview,
                energy: energies[i],
                delta,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::FileVectorStore;
    use engram_core::ChunkEnergy;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn make_store(dir: &TempDir, n: usize, dim: usize) -> FileVectorStore {
        let mut store = FileVectorStore::open(dir.path(), dim).unwrap();
        for i in 0..n {
            let embedding: Vec<f32> = (0..dim).map(|d| ((i * 7 + d) % 11) as f32 / 11.0).collect();
            store
                .insert(&format!("file{i}.md"), 1, 1, &format!("content for chunk {i}"), &embedding)
                .unwrap();
        }
        store
    }

    #[test]
    fn empty_store_is_noop() {
        let dir = TempDir::new().unwrap();
        let mut store = FileVectorStore::open(dir.path(), 4).unwrap();
        let energy = EnergyMap::build(&HashMap::new(), 0.0, 168.0);
        let params = ReconsolidationParams {
            keep_ratio: 0.15,
            promotion_strength: 1.5,
            dry_run: false,
        };
        let outcome = reconsolidate(&mut store, &energy, params, 0, 0.0).unwrap();
        assert!(matches!(outcome, ReconsolidationOutcome::NoOp { .. }));
    }

    #[test]
    fn all_zero_energy_is_noop() {
        let dir = TempDir::new().unwrap();
        let mut store = make_store(&dir, 5, 4);
        let energy = EnergyMap::build(&HashMap::new(), 0.0, 168.0);
        let params = ReconsolidationParams {
            keep_ratio: 0.5,
            promotion_strength: 1.5,
            dry_run: false,
        };
        let outcome = reconsolidate(&mut store, &energy, params, 0, 0.0).unwrap();
        assert!(matches!(outcome, ReconsolidationOutcome::NoOp { .. }));
    }

    #[test]
    fn applied_run_writes_back_and_reports_metrics() {
        let dir = TempDir::new().unwrap();
        let mut store = make_store(&dir, 10, 8);

        let mut rows = HashMap::new();
        rows.insert(
            engram_core::ChunkKey::new("file0.md", "1"),
            ChunkEnergy {
                total_accesses: 10,
                total_score: 9.0,
                first_accessed: 0.0,
                last_accessed: 100.0,
            },
        );
        let energy = EnergyMap::build(&rows, 100.0, 168.0);

        let params = ReconsolidationParams {
            keep_ratio: 0.5,
            promotion_strength: 1.5,
            dry_run: false,
        };
        let outcome = reconsolidate(&mut store, &energy, params, 3, 100.0).unwrap();
        match outcome {
            ReconsolidationOutcome::Applied { run } => {
                assert_eq!(run.n_chunks, 10);
                assert_eq!(run.k_coefficients, 5);
                assert_eq!(run.total_access_events, 3);
                assert!(run.avg_sim_before.is_finite());
                assert!(run.avg_sim_after.is_finite());
            }
            ReconsolidationOutcome::NoOp { reason } => panic!("unexpected no-op: {reason}"),
        }
    }

    #[test]
    fn dry_run_does_not_write_back() {
        let dir = TempDir::new().unwrap();
        let mut store = make_store(&dir, 6, 4);
        let original: Vec<Vec<f32>> = (0..6).map(|i| store.read_embedding(i).unwrap()).collect();

        let mut rows = HashMap::new();
        rows.insert(
            engram_core::ChunkKey::new("file0.md", "1"),
            ChunkEnergy {
                total_accesses: 5,
                total_score: 4.0,
                first_accessed: 0.0,
                last_accessed: 10.0,
            },
        );
        let energy = EnergyMap::build(&rows, 10.0, 168.0);
        let params = ReconsolidationParams {
            keep_ratio: 0.5,
            promotion_strength: 1.5,
            dry_run: true,
        };
        reconsolidate(&mut store, &energy, params, 1, 10.0).unwrap();

        for i in 0..6u64 {
            assert_eq!(store.read_embedding(i).unwrap(), original[i as usize]);
        }
    }
}
