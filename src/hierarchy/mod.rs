//! Merge trees produced by agglomerative clustering.
//!
//! # The Core Insight
//!
//! A threshold cut gives one flat grouping, but the dendrogram keeps every
//! grouping at once. Review opinions cluster at several scales:
//!
//! ```text
//! Height  │ Grouping
//! ────────┼──────────────────────────────────────
//! low     │ near-duplicate cards ("drop the lock before await")
//! medium  │ one design concern ("lock scope in async code")
//! high    │ broad theme ("concurrency")
//! ```
//!
//! ## [`Dendrogram`] - Agglomerative Clustering
//!
//! Records complete merge history from hierarchical clustering:
//!
//! ```text
//!         6 (height=1.0)
//!        / \
//!       4   5 (height=0.7)
//!      / \ / \
//!     0  1 2  3 (leaves)
//! ```
//!
//! Key property: "cut" at any height to get a flat clustering.
//!
//! ## Validation
//!
//! [`validate_dendrogram`] checks the structural invariants (n-1 merges,
//! children before parents, consistent sizes) before a tree is cut or
//! exported.

mod dendrogram;
mod validate;

pub use dendrogram::{Dendrogram, DendrogramNode, Merge};
pub use validate::{
    validate_dendrogram, HealthCheck, Severity, ValidationIssue, ValidationReport,
};
