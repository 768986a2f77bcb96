//! Post-hoc reassignment of undersized clusters.
//!
//! A threshold cut often leaves singletons and pairs around the edges.
//! With reassignment enabled, every item in a cluster smaller than
//! `min_cluster_size` moves to the cluster of its nearest item that sits in
//! a cluster of at least that size.
//!
//! This is a pure transform: decisions are made against the input labeling
//! only, so moved items never become targets for other moves. "Nearest" is
//! read from the full distance matrix by item index; labeling and matrix
//! must describe the same item order.

use super::labeling::ClusterLabeling;
use crate::distance::DistanceMatrix;
use crate::error::{Error, Result};

/// Merge items of undersized clusters into their nearest large cluster.
///
/// Returns the labeling unchanged when no cluster reaches
/// `min_cluster_size`. Ties go to the lowest item index.
pub fn reassign_small_clusters(
    labeling: &ClusterLabeling,
    distances: &DistanceMatrix,
    min_cluster_size: usize,
) -> Result<ClusterLabeling> {
    let n = labeling.n_items();
    if n != distances.n_items() {
        return Err(Error::invalid_config(
            "labeling",
            format!(
                "{n} labels for a distance matrix over {} items",
                distances.n_items()
            ),
        ));
    }

    let sizes = labeling.sizes();
    let is_large = |label: usize| sizes.get(&label).is_some_and(|&s| s >= min_cluster_size);

    let targets: Vec<usize> = (0..n).filter(|&j| is_large(labeling.label(j))).collect();
    let n_small = sizes.values().filter(|&&s| s < min_cluster_size).count();
    if targets.is_empty() || n_small == 0 {
        return Ok(labeling.clone());
    }

    let labels = (0..n)
        .map(|i| {
            let own = labeling.label(i);
            if is_large(own) {
                return own;
            }
            let mut best = own;
            let mut best_d = f64::INFINITY;
            for &j in &targets {
                let d = distances.get(i, j);
                if d < best_d {
                    best_d = d;
                    best = labeling.label(j);
                }
            }
            best
        })
        .collect();

    let reassigned = ClusterLabeling::new(labels);
    tracing::info!(
        small_clusters = n_small,
        clusters_before = sizes.len(),
        clusters_after = reassigned.n_clusters(),
        "reassigned small clusters"
    );
    Ok(reassigned)
}
