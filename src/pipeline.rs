//! End-to-end clustering run.
//!
//! ```text
//! items ──embed──▶ vectors ──cosine──▶ DistanceMatrix ──agglomerate──▶ Dendrogram
//!                     │                                                    │
//!                     │                                  cut at threshold ─┤
//!                     ▼                                                    ▼
//!                 evaluate ◀─────────────────────────────────────── ClusterLabeling
//!                     │                                                    │
//!                     └──────────▶ aggregate / export_dendrogram ◀─────────┘
//! ```
//!
//! Each stage is a plain function over values owned by the run; nothing is
//! shared between runs. Any stage error aborts the run.

use chrono::{DateTime, Utc};

use crate::cluster::{reassign_small_clusters, HierarchicalClustering, Linkage};
use crate::config::ClusteringConfig;
use crate::distance::DistanceMatrix;
use crate::embed::{embed_items, Embedder};
use crate::error::{Error, Result};
use crate::export::{aggregate, export_dendrogram, ClusterResult, DendrogramExport, RunSnapshot};
use crate::hierarchy::HealthCheck;
use crate::item::Item;
use crate::metrics::evaluate;

/// Both artifacts of a run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Flat clusters with metrics.
    pub result: ClusterResult,
    /// Nested merge tree.
    pub dendrogram: DendrogramExport,
}

/// Run the pipeline, stamping the outputs with the current time.
pub fn run(
    config: &ClusteringConfig,
    items: &[Item],
    embedder: &dyn Embedder,
) -> Result<PipelineOutput> {
    run_at(config, items, embedder, Utc::now())
}

/// Run the pipeline with a fixed timestamp.
///
/// Identical inputs give identical outputs.
pub fn run_at(
    config: &ClusteringConfig,
    items: &[Item],
    embedder: &dyn Embedder,
    timestamp: DateTime<Utc>,
) -> Result<PipelineOutput> {
    let linkage = config.validate()?;
    if items.len() < 2 {
        return Err(Error::insufficient_data(2, items.len()));
    }
    if let Some(expected) = &config.embedding_model_id {
        if expected != embedder.model_id() {
            return Err(Error::invalid_config(
                "embedding_model_id",
                format!(
                    "run expects model {expected:?} but the embedder is {:?}",
                    embedder.model_id()
                ),
            ));
        }
    }
    if linkage == Linkage::Ward {
        tracing::warn!(
            "ward linkage over cosine distances: merge heights are not variance increases"
        );
    }

    let snapshot = RunSnapshot {
        timestamp,
        model_id: embedder.model_id().to_string(),
        distance_threshold: config.distance_threshold,
        linkage_method: linkage,
        min_cluster_size: config.min_cluster_size,
        max_clusters: config.max_clusters,
    };
    tracing::info!(
        n_items = items.len(),
        model_id = %snapshot.model_id,
        %linkage,
        threshold = config.distance_threshold,
        "starting clustering run"
    );

    let embeddings = embed_items(embedder, items, config.embedding_batch_size)?;
    tracing::info!(n = embeddings.len(), "embeddings ready");

    let distances = DistanceMatrix::cosine(&embeddings)?;
    tracing::debug!(pairs = distances.condensed().len(), "distance matrix built");

    let clusterer = HierarchicalClustering::new(config.distance_threshold).with_linkage(linkage);
    let dendro = clusterer.fit_dendrogram(&distances)?;
    let report = dendro.health_check();
    if !report.is_healthy() {
        return Err(Error::MalformedTree(report.to_string()));
    }
    tracing::info!(
        merges = dendro.n_merges(),
        max_distance = dendro.max_distance(),
        "linkage tree built"
    );

    let mut labeling = dendro.cut_at_distance(config.distance_threshold);
    tracing::info!(n_clusters = labeling.n_clusters(), "cut at threshold");

    if config.reassign_small_clusters {
        labeling = reassign_small_clusters(&labeling, &distances, config.min_cluster_size)?;
    }

    let n_clusters = labeling.n_clusters();
    if n_clusters > config.max_clusters {
        tracing::warn!(
            n_clusters,
            max_clusters = config.max_clusters,
            threshold_for_max = ?dendro.threshold_for_k(config.max_clusters),
            "more clusters than max_clusters; raise distance_threshold to merge them"
        );
    }

    let metrics = evaluate(&embeddings, &labeling)?;
    let result = aggregate(items, &labeling, metrics, &snapshot)?;
    let dendrogram = export_dendrogram(&dendro, items, &labeling, &snapshot)?;

    tracing::info!(
        n_clusters = result.n_clusters(),
        silhouette = ?result.evaluation_metrics.silhouette_score,
        "clustering run complete"
    );
    Ok(PipelineOutput { result, dendrogram })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::HashingEmbedder;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn test_validates_config_before_embedding() {
        struct Panics;
        impl Embedder for Panics {
            fn model_id(&self) -> &str {
                "panics"
            }
            fn embed_batch(&self, _: &[&str]) -> Result<Vec<Vec<f32>>> {
                panic!("embedder must not be called");
            }
        }

        let config = ClusteringConfig {
            linkage_method: "median".to_string(),
            ..Default::default()
        };
        let items = vec![Item::from_text("a"), Item::from_text("b")];
        let err = run_at(&config, &items, &Panics, ts()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedLinkage { .. }));

        let err = run_at(&ClusteringConfig::default(), &items[..1], &Panics, ts()).unwrap_err();
        assert!(matches!(err, Error::InsufficientData { required: 2, actual: 1 }));
    }

    fn opinions() -> Vec<Item> {
        [
            "mutex guard held across await",
            "guard held across await point",
            "magic number in retry loop",
            "magic number for timeout",
            "unwrap on user input",
        ]
        .into_iter()
        .map(Item::from_text)
        .collect()
    }

    #[test]
    fn test_ward_is_logged() {
        let items = opinions();
        let embedder = HashingEmbedder::new(64);
        let ward = ClusteringConfig {
            linkage_method: "ward".to_string(),
            ..Default::default()
        };
        let (out, logged) =
            crate::test_support::capture_warnings(|| run_at(&ward, &items, &embedder, ts()));
        assert!(out.is_ok());
        assert!(logged.contains("ward linkage over cosine distances"), "{logged}");

        let (out, logged) = crate::test_support::capture_warnings(|| {
            run_at(&ClusteringConfig::default(), &items, &embedder, ts())
        });
        assert!(out.is_ok());
        assert!(!logged.contains("ward"), "{logged}");
    }

    #[test]
    fn test_exceeding_max_clusters_is_logged() {
        let items = opinions();
        let config = ClusteringConfig {
            distance_threshold: 0.0,
            max_clusters: 2,
            ..Default::default()
        };
        let (out, logged) = crate::test_support::capture_warnings(|| {
            run_at(&config, &items, &HashingEmbedder::new(64), ts())
        });
        // Advisory only: the cut itself is untouched.
        assert_eq!(out.unwrap().result.n_clusters(), 5);
        assert!(logged.contains("more clusters than max_clusters"), "{logged}");
        assert!(logged.contains("max_clusters=2"), "{logged}");
        assert!(logged.contains("threshold_for_max=Some("), "{logged}");
    }

    #[test]
    fn test_reports_the_embedder_that_ran() {
        let items = vec![
            Item::from_text("lock held across await"),
            Item::from_text("rename the variable"),
        ];
        let embedder = HashingEmbedder::new(64);

        let out = run_at(&ClusteringConfig::default(), &items, &embedder, ts()).unwrap();
        assert_eq!(out.result.clustering_info.model_id, "feature-hash-64");
        assert_eq!(out.dendrogram.dendrogram_info.model_id, "feature-hash-64");

        // A configured model path does not relabel whatever embedder is passed in.
        let config = ClusteringConfig {
            embedding_model_path: Some("models/all-MiniLM-L6-v2".into()),
            ..Default::default()
        };
        let out = run_at(&config, &items, &embedder, ts()).unwrap();
        assert_eq!(out.result.clustering_info.model_id, "feature-hash-64");

        let config = ClusteringConfig {
            embedding_model_id: Some("all-MiniLM-L6-v2".to_string()),
            ..Default::default()
        };
        let err = run_at(&config, &items, &embedder, ts()).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidConfig {
                name: "embedding_model_id",
                ..
            }
        ));

        let config = ClusteringConfig {
            embedding_model_id: Some("feature-hash-64".to_string()),
            ..Default::default()
        };
        assert!(run_at(&config, &items, &embedder, ts()).is_ok());
    }
}
