//! Clustering algorithms for grouping similar texts.
//!
//! ## Hierarchical (Agglomerative) Clustering
//!
//! Bottom-up: start with each point as its own cluster, repeatedly merge
//! the two closest clusters until one remains. The merge history forms a
//! **dendrogram**, a binary tree you can cut at any height.
//!
//! **Linkage methods** determine "distance between clusters":
//!
//! | Linkage | Distance | Effect |
//! |---------|----------|--------|
//! | Single | min(pairwise) | Chaining; elongated clusters |
//! | Complete | max(pairwise) | Compact, spherical clusters |
//! | Average | mean(pairwise) | Balanced compromise |
//! | Ward | Variance increase | Minimizes within-cluster variance |
//!
//! Cutting at a **distance threshold** rather than a fixed k suits opinion
//! mining: the number of distinct design concerns in a review corpus is not
//! known up front, but "how similar is similar enough" is.
//!
//! ## Usage
//!
//! ```rust
//! use sheaf::cluster::{Clustering, HierarchicalClustering, Linkage};
//!
//! let data = vec![
//!     vec![1.0, 0.0],
//!     vec![0.98, 0.05],
//!     vec![0.0, 1.0],
//!     vec![0.05, 0.98],
//! ];
//!
//! let labels = HierarchicalClustering::new(0.4)
//!     .with_linkage(Linkage::Average)
//!     .fit_predict(&data)
//!     .unwrap();
//! assert_eq!(labels[0], labels[1]);
//! assert_ne!(labels[0], labels[2]);
//! ```

mod hierarchical;
mod labeling;
mod linkage;
mod reassign;
mod traits;

pub use hierarchical::HierarchicalClustering;
pub use labeling::ClusterLabeling;
pub use linkage::Linkage;
pub use reassign::reassign_small_clusters;
pub use traits::Clustering;
