//! Orthonormal DCT-II / IDCT-III along the chunk (row) axis.
//!
//! No FFT crate is pulled in for this — the embedding dimension (384)
//! and chunk counts (thousands) are small enough that a dense `N×N`
//! basis-matrix multiply is simple and fast enough, and it keeps the
//! transform trivially parallelizable across columns with `rayon`
//! since each column is an independent length-`N` transform.

use rayon::prelude::*;

/// Precomputed orthonormal DCT-II / IDCT-III basis for a fixed `N`.
///
/// Building the basis is `O(N^2)`; reuse one instance across a run
/// rather than rebuilding it per column.
pub struct DctBasis {
    n: usize,
    /// `forward[k][i] = basis coefficient for output k, input i`.
    forward: Vec<Vec<f64>>,
    /// `inverse[i][k] = basis coefficient for output i, input k`.
    inverse: Vec<Vec<f64>>,
}

impl DctBasis {
    /// Build the orthonormal DCT-II/IDCT-III basis matrices for length `n`.
    pub fn new(n: usize) -> Self {
        let mut forward = vec![vec![0.0; n]; n];
        let mut inverse = vec![vec![0.0; n]; n];

        for k in 0..n {
            let ck = if k == 0 { (1.0 / n as f64).sqrt() } else { (2.0 / n as f64).sqrt() };
            for i in 0..n {
                let angle = std::f64::consts::PI * (i as f64 + 0.5) * k as f64 / n as f64;
                forward[k][i] = ck * angle.cos();
                inverse[i][k] = ck * angle.cos();
            }
        }

        DctBasis { n, forward, inverse }
    }

    /// Forward DCT-II applied to each column of `matrix` (`N` rows,
    /// arbitrary column count), in parallel across columns.
    pub fn forward(&self, matrix: &[Vec<f64>]) -> Vec<Vec<f64>> {
        self.transform(matrix, &self.forward)
    }

    /// Inverse DCT-III (the orthonormal inverse of [`Self::forward`])
    /// applied to each column of `matrix`.
    pub fn inverse(&self, matrix: &[Vec<f64>]) -> Vec<Vec<f64>> {
        self.transform(matrix, &self.inverse)
    }

    fn transform(&self, matrix: &[Vec<f64>], basis: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let n = self.n;
        let d = matrix.first().map(|r| r.len()).unwrap_or(0);
        let columns: Vec<Vec<f64>> = (0..d)
            .into_par_iter()
            .map(|col| {
                let input: Vec<f64> = (0..n).map(|row| matrix[row][col]).collect();
                let mut out = vec![0.0; n];
                for (k, out_k) in out.iter_mut().enumerate() {
                    let mut acc = 0.0;
                    for (i, &v) in input.iter().enumerate() {
                        acc += basis[k][i] * v;
                    }
                    *out_k = acc;
                }
                out
            })
            .collect();

        let mut result = vec![vec![0.0; d]; n];
        for (col, values) in columns.into_iter().enumerate() {
            for (row, v) in values.into_iter().enumerate() {
                result[row][col] = v;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq_matrix(a: &[Vec<f64>], b: &[Vec<f64>], eps: f64) {
        assert_eq!(a.len(), b.len());
        for (ra, rb) in a.iter().zip(b.iter()) {
            assert_eq!(ra.len(), rb.len());
            for (&va, &vb) in ra.iter().zip(rb.iter()) {
                assert!((va - vb).abs() < eps, "{} vs {}", va, vb);
            }
        }
    }

    #[test]
    fn forward_then_inverse_round_trips() {
        let basis = DctBasis::new(8);
        let matrix: Vec<Vec<f64>> = (0..8).map(|i| vec![i as f64, (i * 2) as f64]).collect();
        let transformed = basis.forward(&matrix);
        let restored = basis.inverse(&transformed);
        approx_eq_matrix(&matrix, &restored, 1e-9);
    }

    #[test]
    fn dc_component_is_mean_times_sqrt_n() {
        let basis = DctBasis::new(4);
        let matrix = vec![vec![1.0], vec![1.0], vec![1.0], vec![1.0]];
        let transformed = basis.forward(&matrix);
        assert!((transformed[0][0] - 2.0).abs() < 1e-9);
        for row in &transformed[1..] {
            assert!(row[0].abs() < 1e-9);
        }
    }

    #[test]
    fn truncation_then_inverse_is_lossy_but_stable() {
        let basis = DctBasis::new(16);
        let matrix: Vec<Vec<f64>> = (0..16).map(|i| vec![(i as f64).sin()]).collect();
        let mut transformed = basis.forward(&matrix);
        for row in transformed.iter_mut().skip(4) {
            row[0] = 0.0;
        }
        let restored = basis.inverse(&transformed);
        assert_eq!(restored.len(), 16);
        assert!(restored.iter().all(|r| r[0].is_finite()));
    }
}
