//! Exportable artifacts of a clustering run.
//!
//! Two independent documents come out of every run:
//!
//! | Artifact | Builder | Shape |
//! |----------|---------|-------|
//! | Flat result | [`aggregate`] | `{clustering_info, evaluation_metrics, clusters: {cluster_<id>: ..}}` |
//! | Dendrogram | [`export_dendrogram`] | `{dendrogram_info, tree: {type: leaf\|internal, ..}}` |
//!
//! Both hold only plain `f64`/`usize`/`String` values, so `serde_json`
//! output is ordinary JSON numbers and strings. Writing them anywhere is
//! up to the caller.

mod result;
mod tree;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cluster::Linkage;

pub use result::{aggregate, ClusterEntry, ClusterItem, ClusterResult, ClusteringInfo};
pub use tree::{export_dendrogram, DendrogramExport, DendrogramInfo, TreeNode};

/// Settings of one run, echoed into both artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// When the run started.
    pub timestamp: DateTime<Utc>,
    /// Embedding model identifier.
    pub model_id: String,
    /// Cut threshold.
    pub distance_threshold: f64,
    /// Linkage method.
    pub linkage_method: Linkage,
    /// Small-cluster size setting.
    pub min_cluster_size: usize,
    /// Advisory cluster cap.
    pub max_clusters: usize,
}
