//! Pairwise cosine distances.
//!
//! ```text
//! d(u, v) = 1 - (u · v) / (|u| |v|)        range [0, 2]
//! ```
//!
//! The matrix is kept in two forms:
//!
//! - **condensed**: the upper triangle, row-major, length N(N-1)/2. This is
//!   what agglomerative clustering consumes (SciPy `pdist` layout).
//! - **square**: the symmetric N×N expansion with a zero diagonal, used for
//!   nearest-item lookups by index.
//!
//! # Zero-norm policy
//!
//! Cosine distance to a zero vector is undefined. Rather than substituting an
//! epsilon (which would silently place such items at distance 1 from
//! everything), construction fails with [`Error::DegenerateEmbedding`] naming
//! the first offending index. Non-finite components are rejected the same way.

use ndarray::Array2;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{Error, Result};

/// Cosine distance between two vectors, or `None` if either has zero norm.
///
/// Accumulates in `f64` and clamps into `[0, 2]` to absorb rounding.
pub fn cosine_distance(u: &[f32], v: &[f32]) -> Option<f64> {
    let (dot, nu, nv) = u
        .iter()
        .zip(v.iter())
        .fold((0.0f64, 0.0f64, 0.0f64), |(dot, nu, nv), (&a, &b)| {
            let (a, b) = (f64::from(a), f64::from(b));
            (dot + a * b, nu + a * a, nv + b * b)
        });
    if nu == 0.0 || nv == 0.0 {
        return None;
    }
    Some((1.0 - dot / (nu.sqrt() * nv.sqrt())).clamp(0.0, 2.0))
}

/// Full pairwise cosine distance matrix over one run's embeddings.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    n_items: usize,
    condensed: Vec<f64>,
    square: Array2<f64>,
}

impl DistanceMatrix {
    /// Compute all pairwise cosine distances.
    ///
    /// Fails with [`Error::InsufficientData`] for fewer than two embeddings,
    /// [`Error::DimensionMismatch`] for ragged input, and
    /// [`Error::DegenerateEmbedding`] for zero-norm or non-finite vectors.
    pub fn cosine(embeddings: &[Vec<f32>]) -> Result<Self> {
        let n = embeddings.len();
        if n < 2 {
            return Err(Error::insufficient_data(2, n));
        }

        let d = embeddings[0].len();
        if let Some((index, v)) = embeddings.iter().enumerate().find(|(_, v)| v.len() != d) {
            return Err(Error::DimensionMismatch {
                index,
                expected: d,
                found: v.len(),
            });
        }
        if let Some(index) = embeddings
            .iter()
            .position(|v| v.iter().any(|x| !x.is_finite()) || v.iter().all(|x| *x == 0.0))
        {
            return Err(Error::DegenerateEmbedding { index });
        }

        let row = |i: usize| -> Vec<f64> {
            ((i + 1)..n)
                // Norms were checked above, so `None` cannot occur.
                .map(|j| cosine_distance(&embeddings[i], &embeddings[j]).unwrap_or(1.0))
                .collect()
        };

        #[cfg(feature = "parallel")]
        let rows: Vec<Vec<f64>> = (0..n - 1).into_par_iter().map(row).collect();
        #[cfg(not(feature = "parallel"))]
        let rows: Vec<Vec<f64>> = (0..n - 1).map(row).collect();

        let condensed: Vec<f64> = rows.into_iter().flatten().collect();
        Ok(Self::from_condensed_unchecked(condensed, n))
    }

    /// Build from an existing condensed vector.
    ///
    /// The vector must have length N(N-1)/2 and contain finite, non-negative
    /// values.
    pub fn from_condensed(condensed: Vec<f64>, n_items: usize) -> Result<Self> {
        if n_items < 2 {
            return Err(Error::insufficient_data(2, n_items));
        }
        let expected = n_items * (n_items - 1) / 2;
        if condensed.len() != expected {
            return Err(Error::invalid_config(
                "condensed",
                format!(
                    "length {} does not match {n_items} items (expected {expected})",
                    condensed.len()
                ),
            ));
        }
        if condensed.iter().any(|d| !d.is_finite() || *d < 0.0) {
            return Err(Error::invalid_config(
                "condensed",
                "distances must be finite and non-negative",
            ));
        }
        Ok(Self::from_condensed_unchecked(condensed, n_items))
    }

    fn from_condensed_unchecked(condensed: Vec<f64>, n: usize) -> Self {
        let mut square = Array2::<f64>::zeros((n, n));
        let mut k = 0;
        for i in 0..n {
            for j in (i + 1)..n {
                square[[i, j]] = condensed[k];
                square[[j, i]] = condensed[k];
                k += 1;
            }
        }
        Self {
            n_items: n,
            condensed,
            square,
        }
    }

    /// Position of pair `(i, j)`, `i < j`, in the condensed vector.
    #[inline]
    pub fn condensed_index(n: usize, i: usize, j: usize) -> usize {
        debug_assert!(i < j && j < n);
        n * i - i * (i + 1) / 2 + (j - i - 1)
    }

    /// Number of items.
    pub fn n_items(&self) -> usize {
        self.n_items
    }

    /// Condensed upper-triangle distances.
    pub fn condensed(&self) -> &[f64] {
        &self.condensed
    }

    /// Symmetric square matrix.
    pub fn square(&self) -> &Array2<f64> {
        &self.square
    }

    /// Distance between items `i` and `j`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.square[[i, j]]
    }
}
