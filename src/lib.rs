//! # sheaf
//!
//! Agglomerative clustering of short review-opinion texts: embeddings, cosine
//! distances, a linkage tree cut at a distance threshold, quality scores, and
//! two JSON-ready artifacts (flat clusters and the nested dendrogram).
//!
//! ```rust
//! use sheaf::{pipeline, ClusteringConfig, HashingEmbedder, Item};
//!
//! let items = vec![
//!     Item::from_text("Problem: lock held across await Suggestion: drop the guard first"),
//!     Item::from_text("Problem: lock held across await Suggestion: scope the guard"),
//!     Item::from_text("Problem: magic number Suggestion: name the constant"),
//! ];
//! let out = pipeline::run(&ClusteringConfig::default(), &items, &HashingEmbedder::default())
//!     .unwrap();
//! assert_eq!(out.result.clustering_info.n_samples, 3);
//! ```
//!
//! The default build includes the `sheaf` binary (`cli`) and rayon-backed
//! data parallelism (`parallel`). The `candle` feature adds
//! `SentenceEmbedder`, which runs a local sentence-transformer checkpoint.

pub mod cluster;
pub mod config;
pub mod distance;
pub mod embed;
/// Error types used across `sheaf`.
pub mod error;
pub mod export;
pub mod hierarchy;
pub mod item;
pub mod metrics;
pub mod pipeline;

#[cfg(test)]
mod test_support;

pub use cluster::{ClusterLabeling, Clustering, HierarchicalClustering, Linkage};
pub use config::ClusteringConfig;
pub use distance::DistanceMatrix;
pub use embed::{Embedder, HashingEmbedder};
#[cfg(feature = "candle")]
pub use embed::SentenceEmbedder;
pub use error::{Error, Result};
pub use export::{ClusterResult, DendrogramExport, RunSnapshot, TreeNode};
pub use hierarchy::{Dendrogram, HealthCheck};
pub use item::{load_items, Item};
pub use metrics::{evaluate, EvaluationMetrics};
pub use pipeline::PipelineOutput;
