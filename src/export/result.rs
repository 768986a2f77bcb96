//! Flat clustering result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use super::RunSnapshot;
use crate::cluster::{ClusterLabeling, Linkage};
use crate::error::{Error, Result};
use crate::item::Item;
use crate::metrics::EvaluationMetrics;

/// Header of the result document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringInfo {
    /// When the run started (RFC 3339, UTC).
    pub timestamp: DateTime<Utc>,
    /// Id of the embedder that produced the vectors.
    pub model_id: String,
    /// Cut height used for the flat clusters.
    pub distance_threshold: f64,
    /// Linkage method of the tree.
    pub linkage_method: Linkage,
    /// Small-cluster bound from the config.
    pub min_cluster_size: usize,
    /// Advisory cluster-count bound from the config.
    pub max_clusters: usize,
    /// Number of input items.
    pub n_samples: usize,
    /// Number of flat clusters.
    pub n_clusters: usize,
    /// Distinct labels, ascending.
    pub cluster_ids: Vec<usize>,
}

/// One member of a cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterItem {
    /// Index of the item in the input.
    pub index: usize,
    /// Text that was embedded.
    pub text: String,
    /// The item's metadata, passed through unchanged.
    pub metadata: Value,
}

/// One flat cluster with its members in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterEntry {
    /// 1-based flat cluster label.
    pub cluster_id: usize,
    /// Number of members.
    pub size: usize,
    /// Members, ascending by input index.
    pub items: Vec<ClusterItem>,
}

/// The result document.
///
/// `clusters` serializes as an object keyed `cluster_<id>`, ascending by id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterResult {
    /// Run settings and counts.
    pub clustering_info: ClusteringInfo,
    /// Quality scores and size statistics.
    pub evaluation_metrics: EvaluationMetrics,
    /// Clusters ascending by id.
    #[serde(serialize_with = "clusters_as_map")]
    pub clusters: Vec<ClusterEntry>,
}

impl ClusterResult {
    /// Look up a cluster by label.
    pub fn cluster(&self, cluster_id: usize) -> Option<&ClusterEntry> {
        self.clusters.iter().find(|c| c.cluster_id == cluster_id)
    }

    /// Number of clusters.
    pub fn n_clusters(&self) -> usize {
        self.clusters.len()
    }
}

fn clusters_as_map<S: Serializer>(clusters: &[ClusterEntry], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_map(
        clusters
            .iter()
            .map(|c| (format!("cluster_{}", c.cluster_id), c)),
    )
}

/// Group items by label into the result document.
///
/// Every input index lands in exactly one cluster.
pub fn aggregate(
    items: &[Item],
    labeling: &ClusterLabeling,
    evaluation_metrics: EvaluationMetrics,
    snapshot: &RunSnapshot,
) -> Result<ClusterResult> {
    if items.len() != labeling.n_items() {
        return Err(Error::invalid_config(
            "labeling",
            format!(
                "{} labels for {} items",
                labeling.n_items(),
                items.len()
            ),
        ));
    }

    let cluster_ids = labeling.cluster_ids();
    let clusters: Vec<ClusterEntry> = cluster_ids
        .iter()
        .map(|&cluster_id| {
            let members: Vec<ClusterItem> = labeling
                .members(cluster_id)
                .into_iter()
                .map(|index| ClusterItem {
                    index,
                    text: items[index].text.clone(),
                    metadata: items[index].metadata.clone(),
                })
                .collect();
            ClusterEntry {
                cluster_id,
                size: members.len(),
                items: members,
            }
        })
        .collect();

    Ok(ClusterResult {
        clustering_info: ClusteringInfo {
            timestamp: snapshot.timestamp,
            model_id: snapshot.model_id.clone(),
            distance_threshold: snapshot.distance_threshold,
            linkage_method: snapshot.linkage_method,
            min_cluster_size: snapshot.min_cluster_size,
            max_clusters: snapshot.max_clusters,
            n_samples: items.len(),
            n_clusters: cluster_ids.len(),
            cluster_ids,
        },
        evaluation_metrics,
        clusters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn snapshot() -> RunSnapshot {
        RunSnapshot {
            timestamp: Utc.with_ymd_and_hms(2025, 9, 15, 12, 0, 0).unwrap(),
            model_id: "test-model".to_string(),
            distance_threshold: 0.4,
            linkage_method: Linkage::Complete,
            min_cluster_size: 2,
            max_clusters: 20,
        }
    }

    fn metrics() -> EvaluationMetrics {
        EvaluationMetrics {
            silhouette_score: Some(0.5),
            calinski_harabasz_score: Some(12.0),
            n_clusters: 2,
            min_cluster_size: 1,
            max_cluster_size: 3,
            avg_cluster_size: 2.0,
        }
    }

    fn items() -> Vec<Item> {
        vec![
            Item::new("alpha", json!({"card_id": "a"})),
            Item::from_text("beta"),
            Item::from_text("gamma"),
            Item::from_text("delta"),
        ]
    }

    #[test]
    fn test_every_index_once() {
        let labels = ClusterLabeling::new(vec![2, 1, 2, 2]);
        let result = aggregate(&items(), &labels, metrics(), &snapshot()).unwrap();

        let mut seen: Vec<usize> = result
            .clusters
            .iter()
            .flat_map(|c| c.items.iter().map(|i| i.index))
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);

        assert_eq!(result.n_clusters(), 2);
        assert_eq!(result.clustering_info.cluster_ids, vec![1, 2]);
        let two = result.cluster(2).unwrap();
        assert_eq!(two.size, 3);
        let order: Vec<usize> = two.items.iter().map(|i| i.index).collect();
        assert_eq!(order, vec![0, 2, 3]);
        assert_eq!(two.items[0].metadata["card_id"], "a");
    }

    #[test]
    fn test_json_layout() {
        let labels = ClusterLabeling::new(vec![2, 1, 2, 10]);
        let result = aggregate(&items(), &labels, metrics(), &snapshot()).unwrap();
        let json = serde_json::to_value(&result).unwrap();

        let info = &json["clustering_info"];
        assert_eq!(info["linkage_method"], "complete");
        assert_eq!(info["n_samples"], 4);
        assert_eq!(info["n_clusters"], 3);
        assert_eq!(info["cluster_ids"], json!([1, 2, 10]));

        let clusters = json["clusters"].as_object().unwrap();
        assert_eq!(clusters.len(), 3);
        assert_eq!(clusters["cluster_10"]["size"], 1);
        assert_eq!(clusters["cluster_10"]["items"][0]["text"], "delta");
        assert_eq!(json["evaluation_metrics"]["silhouette_score"], 0.5);

        // Serialized in ascending label order.
        let text = serde_json::to_string(&result).unwrap();
        let p1 = text.find("\"cluster_1\"").unwrap();
        let p2 = text.find("\"cluster_2\"").unwrap();
        let p10 = text.find("\"cluster_10\"").unwrap();
        assert!(p1 < p2 && p2 < p10);
    }

    #[test]
    fn test_label_count_mismatch() {
        let labels = ClusterLabeling::new(vec![1, 1]);
        let err = aggregate(&items(), &labels, metrics(), &snapshot()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }
}
