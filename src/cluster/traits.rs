//! Clustering traits.

use crate::error::Result;

/// Trait for hard clustering algorithms over raw embeddings.
pub trait Clustering {
    /// Fit the model to data and return cluster assignments.
    ///
    /// Returns a vector of cluster labels, one per input point, in input
    /// order. Label values are opaque ids.
    fn fit_predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>>;
}
