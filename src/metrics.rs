//! Clustering quality metrics.
//!
//! Internal measures: they score a labeling against the embeddings alone,
//! with no ground truth.
//!
//! # Metrics Overview
//!
//! | Metric | Range | Best | Measures |
//! |--------|-------|------|----------|
//! | [`silhouette_score`] | [-1, 1] | 1 | Per-item cohesion vs. nearest other cluster |
//! | [`calinski_harabasz_score`] | [0, ∞) | higher | Between- vs. within-cluster dispersion |
//!
//! Both are computed with Euclidean geometry on the raw embedding vectors.
//!
//! ## Silhouette
//!
//! For item `i` with mean distance `a(i)` to the rest of its own cluster and
//! smallest mean distance `b(i)` to any other cluster:
//!
//! ```text
//! s(i) = (b(i) - a(i)) / max(a(i), b(i))
//! ```
//!
//! Items in singleton clusters score 0. The score is the mean over items.
//!
//! ## Calinski–Harabasz
//!
//! ```text
//! CH = [Σ_k n_k ||μ_k - μ||² / (k - 1)] / [Σ_k Σ_{x∈C_k} ||x - μ_k||² / (n - k)]
//! ```
//!
//! Defined as 1 when every cluster has zero spread.
//!
//! # When Scores Are Undefined
//!
//! Both need `2 <= k <= n - 1` clusters. Outside that range they are `None`
//! and [`evaluate`] logs a warning; size statistics are always reported.
//!
//! # References
//!
//! - Rousseeuw (1987). "Silhouettes: a graphical aid to the interpretation
//!   and validation of cluster analysis"
//! - Caliński & Harabasz (1974). "A dendrite method for cluster analysis"

use std::collections::BTreeMap;

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::cluster::ClusterLabeling;
use crate::error::{Error, Result};

/// Quality indicators for one labeling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    /// Mean silhouette; absent when undefined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub silhouette_score: Option<f64>,
    /// Variance-ratio score; absent when undefined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calinski_harabasz_score: Option<f64>,
    /// Number of distinct clusters.
    pub n_clusters: usize,
    /// Smallest cluster size.
    pub min_cluster_size: usize,
    /// Largest cluster size.
    pub max_cluster_size: usize,
    /// Mean cluster size.
    pub avg_cluster_size: f64,
}

/// Stack embeddings into an `n × d` matrix of `f64`.
pub fn embedding_matrix(embeddings: &[Vec<f32>]) -> Result<Array2<f64>> {
    let n = embeddings.len();
    let d = embeddings.first().map_or(0, Vec::len);
    let mut flat = Vec::with_capacity(n * d);
    for (index, v) in embeddings.iter().enumerate() {
        if v.len() != d {
            return Err(Error::DimensionMismatch {
                index,
                expected: d,
                found: v.len(),
            });
        }
        flat.extend(v.iter().map(|&x| f64::from(x)));
    }
    Array2::from_shape_vec((n, d), flat).map_err(|e| Error::invalid_config("embeddings", e.to_string()))
}

/// Dense cluster index per item, plus cluster sizes in that index.
fn dense_labels(labeling: &ClusterLabeling) -> (Vec<usize>, Vec<usize>) {
    let index: BTreeMap<usize, usize> = labeling
        .cluster_ids()
        .into_iter()
        .enumerate()
        .map(|(dense, id)| (id, dense))
        .collect();
    let dense: Vec<usize> = labeling.labels().iter().map(|l| index[l]).collect();
    let mut sizes = vec![0usize; index.len()];
    for &c in &dense {
        sizes[c] += 1;
    }
    (dense, sizes)
}

fn scores_defined(n: usize, k: usize) -> bool {
    k >= 2 && k < n
}

#[inline]
fn euclidean(a: ndarray::ArrayView1<'_, f64>, b: ndarray::ArrayView1<'_, f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Mean silhouette coefficient (Euclidean).
///
/// `None` unless `2 <= k <= n - 1`, or if `x` and `labeling` disagree on `n`.
pub fn silhouette_score(x: &Array2<f64>, labeling: &ClusterLabeling) -> Option<f64> {
    let n = x.nrows();
    if labeling.n_items() != n {
        return None;
    }
    let (labels, sizes) = dense_labels(labeling);
    let k = sizes.len();
    if !scores_defined(n, k) {
        return None;
    }

    let item_score = |i: usize| -> f64 {
        let own = labels[i];
        if sizes[own] <= 1 {
            return 0.0;
        }
        let mut sums = vec![0.0f64; k];
        let xi = x.row(i);
        for j in 0..n {
            if j != i {
                sums[labels[j]] += euclidean(xi, x.row(j));
            }
        }
        let a = sums[own] / (sizes[own] - 1) as f64;
        let b = (0..k)
            .filter(|&c| c != own)
            .map(|c| sums[c] / sizes[c] as f64)
            .fold(f64::INFINITY, f64::min);
        let denom = a.max(b);
        if denom > 0.0 {
            (b - a) / denom
        } else {
            0.0
        }
    };

    #[cfg(feature = "parallel")]
    let total: f64 = (0..n).into_par_iter().map(item_score).sum();
    #[cfg(not(feature = "parallel"))]
    let total: f64 = (0..n).map(item_score).sum();

    Some(total / n as f64)
}

/// Calinski–Harabasz variance-ratio score.
///
/// `None` unless `2 <= k <= n - 1`, or if `x` and `labeling` disagree on `n`.
pub fn calinski_harabasz_score(x: &Array2<f64>, labeling: &ClusterLabeling) -> Option<f64> {
    let n = x.nrows();
    if labeling.n_items() != n {
        return None;
    }
    let (labels, sizes) = dense_labels(labeling);
    let k = sizes.len();
    if !scores_defined(n, k) {
        return None;
    }

    let mean = x.mean_axis(Axis(0))?;
    let mut centroids = Array2::<f64>::zeros((k, x.ncols()));
    for (i, &c) in labels.iter().enumerate() {
        let mut row = centroids.row_mut(c);
        row += &x.row(i);
    }
    for (c, &size) in sizes.iter().enumerate() {
        let mut row = centroids.row_mut(c);
        row /= size as f64;
    }

    let sq = |a: &Array1<f64>| a.iter().map(|v| v * v).sum::<f64>();
    let extra: f64 = (0..k)
        .map(|c| sizes[c] as f64 * sq(&(&centroids.row(c) - &mean)))
        .sum();
    let intra: f64 = (0..n)
        .map(|i| sq(&(&x.row(i) - &centroids.row(labels[i]))))
        .sum();

    if intra == 0.0 {
        return Some(1.0);
    }
    Some(extra * (n - k) as f64 / (intra * (k - 1) as f64))
}

/// Compute all quality metrics for a labeling.
///
/// Undefined scores are left out with a warning; this never fails on
/// cluster count alone.
pub fn evaluate(embeddings: &[Vec<f32>], labeling: &ClusterLabeling) -> Result<EvaluationMetrics> {
    let n = embeddings.len();
    if n == 0 {
        return Err(Error::insufficient_data(1, 0));
    }
    if labeling.n_items() != n {
        return Err(Error::invalid_config(
            "labeling",
            format!("{} labels for {n} embeddings", labeling.n_items()),
        ));
    }

    let x = embedding_matrix(embeddings)?;
    let sizes: Vec<usize> = labeling.sizes().into_values().collect();
    let k = sizes.len();

    let silhouette = silhouette_score(&x, labeling);
    let calinski_harabasz = calinski_harabasz_score(&x, labeling);
    if !scores_defined(n, k) {
        tracing::warn!(
            n_items = n,
            n_clusters = k,
            "quality scores undefined: need between 2 and n-1 clusters; reporting sizes only"
        );
    }

    let metrics = EvaluationMetrics {
        silhouette_score: silhouette,
        calinski_harabasz_score: calinski_harabasz,
        n_clusters: k,
        min_cluster_size: sizes.iter().copied().min().unwrap_or(0),
        max_cluster_size: sizes.iter().copied().max().unwrap_or(0),
        avg_cluster_size: n as f64 / k as f64,
    };
    tracing::info!(
        silhouette = ?metrics.silhouette_score,
        calinski_harabasz = ?metrics.calinski_harabasz_score,
        n_clusters = k,
        "evaluated clustering"
    );
    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> (Vec<Vec<f32>>, ClusterLabeling) {
        let data = vec![
            vec![0.0, 0.0],
            vec![0.0, 1.0],
            vec![10.0, 0.0],
            vec![10.0, 1.0],
        ];
        (data, ClusterLabeling::new(vec![1, 1, 2, 2]))
    }

    #[test]
    fn test_silhouette_hand_computed() {
        let (data, labels) = two_blobs();
        let x = embedding_matrix(&data).unwrap();
        // a = 1, b = (10 + sqrt(101)) / 2 for every point.
        let b = (10.0 + 101f64.sqrt()) / 2.0;
        let expected = (b - 1.0) / b;
        let s = silhouette_score(&x, &labels).unwrap();
        assert!((s - expected).abs() < 1e-12, "{s} vs {expected}");
    }

    #[test]
    fn test_calinski_harabasz_hand_computed() {
        let (data, labels) = two_blobs();
        let x = embedding_matrix(&data).unwrap();
        // Centroids (0, .5), (10, .5); mean (5, .5).
        // extra = 2*25 + 2*25 = 100, intra = 4 * 0.25 = 1.
        // CH = 100 * (4 - 2) / (1 * (2 - 1)) = 200.
        let ch = calinski_harabasz_score(&x, &labels).unwrap();
        assert!((ch - 200.0).abs() < 1e-9, "{ch}");
    }

    #[test]
    fn test_bad_labeling_scores_lower() {
        let (data, _) = two_blobs();
        let x = embedding_matrix(&data).unwrap();
        let good = ClusterLabeling::new(vec![1, 1, 2, 2]);
        let bad = ClusterLabeling::new(vec![1, 2, 1, 2]);
        assert!(silhouette_score(&x, &bad).unwrap() < 0.0);
        assert!(
            calinski_harabasz_score(&x, &bad).unwrap()
                < calinski_harabasz_score(&x, &good).unwrap()
        );
    }

    #[test]
    fn test_singleton_cluster_scores_zero() {
        let data = vec![vec![0.0, 0.0], vec![0.0, 0.2], vec![9.0, 9.0]];
        let x = embedding_matrix(&data).unwrap();
        let labels = ClusterLabeling::new(vec![5, 5, 8]);
        let s = silhouette_score(&x, &labels).unwrap();
        // Third item contributes 0; the other two are close to 1.
        assert!(s > 0.6 && s < 0.67, "{s}");
    }

    #[test]
    fn test_zero_spread_calinski_is_one() {
        let data = vec![vec![1.0], vec![1.0], vec![3.0], vec![3.0]];
        let x = embedding_matrix(&data).unwrap();
        let labels = ClusterLabeling::new(vec![0, 0, 1, 1]);
        assert_eq!(calinski_harabasz_score(&x, &labels), Some(1.0));
    }

    #[test]
    fn test_undefined_scores_keep_sizes() {
        let data = vec![vec![1.0, 0.0]; 5];
        let one = ClusterLabeling::new(vec![1; 5]);
        let m = evaluate(&data, &one).unwrap();
        assert_eq!(m.silhouette_score, None);
        assert_eq!(m.calinski_harabasz_score, None);
        assert_eq!(m.n_clusters, 1);
        assert_eq!((m.min_cluster_size, m.max_cluster_size), (5, 5));
        assert_eq!(m.avg_cluster_size, 5.0);

        let json = serde_json::to_value(&m).unwrap();
        assert!(json.get("silhouette_score").is_none());
        assert_eq!(json["n_clusters"], 1);

        let all_separate = ClusterLabeling::new(vec![1, 2, 3, 4, 5]);
        let m = evaluate(&data, &all_separate).unwrap();
        assert_eq!(m.silhouette_score, None);
        assert_eq!(m.n_clusters, 5);
    }

    #[test]
    fn test_undefined_scores_are_logged() {
        let data = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.6, 0.8]];
        let (m, logged) =
            crate::test_support::capture_warnings(|| evaluate(&data, &ClusterLabeling::new(vec![1; 3])));
        assert_eq!(m.unwrap().silhouette_score, None);
        assert!(logged.contains("WARN"), "{logged}");
        assert!(logged.contains("quality scores undefined"), "{logged}");
        assert!(logged.contains("n_clusters=1"), "{logged}");

        let (m, logged) = crate::test_support::capture_warnings(|| {
            evaluate(&data, &ClusterLabeling::new(vec![1, 1, 2]))
        });
        assert!(m.unwrap().silhouette_score.is_some());
        assert!(!logged.contains("quality scores undefined"), "{logged}");
    }

    #[test]
    fn test_evaluate_sizes() {
        let data: Vec<Vec<f32>> = (0..6).map(|i| vec![i as f32, 1.0]).collect();
        let labels = ClusterLabeling::new(vec![1, 1, 1, 2, 2, 3]);
        let m = evaluate(&data, &labels).unwrap();
        assert_eq!(m.n_clusters, 3);
        assert_eq!(m.min_cluster_size, 1);
        assert_eq!(m.max_cluster_size, 3);
        assert!((m.avg_cluster_size - 2.0).abs() < 1e-12);
        assert!(m.silhouette_score.is_some());
    }

    #[test]
    fn test_evaluate_length_mismatch() {
        let data = vec![vec![1.0], vec![2.0]];
        let labels = ClusterLabeling::new(vec![1]);
        assert!(evaluate(&data, &labels).is_err());
    }
}
