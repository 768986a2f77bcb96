//! Run configuration.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. Files are TOML, YAML or JSON, picked by extension:
//!
//! ```toml
//! distance_threshold = 0.35
//! linkage_method = "complete"
//! min_cluster_size = 3
//! embedding_model_path = "models/all-MiniLM-L6-v2"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cluster::Linkage;
use crate::embed::DEFAULT_BATCH_SIZE;
use crate::error::{Error, Result};

/// Settings for one clustering run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Model the run expects. When set, a run whose embedder reports a
    /// different id fails before embedding.
    #[serde(default)]
    pub embedding_model_id: Option<String>,

    /// Local sentence-transformer directory. Unset selects the built-in
    /// hashing embedder. The outputs always report the id of the embedder
    /// that actually ran.
    #[serde(default)]
    pub embedding_model_path: Option<PathBuf>,

    /// Buckets of the hashing embedder (default: 384)
    #[serde(default = "default_hashing_dims")]
    pub hashing_dims: usize,

    /// Cut height for flat clusters (default: 0.4)
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: f64,

    /// One of "average", "complete", "single", "ward" (default: "average")
    #[serde(default = "default_linkage_method")]
    pub linkage_method: String,

    /// Clusters smaller than this count as small (default: 2)
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,

    /// Advisory upper bound on cluster count, warned about but never
    /// enforced (default: 20)
    #[serde(default = "default_max_clusters")]
    pub max_clusters: usize,

    /// Fold small clusters into their nearest large one (default: false)
    #[serde(default)]
    pub reassign_small_clusters: bool,

    /// Texts per embedding call (default: 32)
    #[serde(default = "default_embedding_batch_size")]
    pub embedding_batch_size: usize,
}

fn default_hashing_dims() -> usize {
    384
}

fn default_distance_threshold() -> f64 {
    0.4
}

fn default_linkage_method() -> String {
    Linkage::default().as_str().to_string()
}

fn default_min_cluster_size() -> usize {
    2
}

fn default_max_clusters() -> usize {
    20
}

fn default_embedding_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            embedding_model_id: None,
            embedding_model_path: None,
            hashing_dims: default_hashing_dims(),
            distance_threshold: default_distance_threshold(),
            linkage_method: default_linkage_method(),
            min_cluster_size: default_min_cluster_size(),
            max_clusters: default_max_clusters(),
            reassign_small_clusters: false,
            embedding_batch_size: default_embedding_batch_size(),
        }
    }
}

impl ClusteringConfig {
    /// Load from a `.toml`, `.yaml`/`.yml` or `.json` file.
    ///
    /// Missing keys take their defaults; a missing file is an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let config: Self = match ext.as_deref() {
            Some("toml") => toml::from_str(&std::fs::read_to_string(path)?)?,
            Some("yaml" | "yml") => serde_yaml::from_str(&std::fs::read_to_string(path)?)?,
            Some("json") => serde_json::from_str(&std::fs::read_to_string(path)?)?,
            _ => {
                return Err(Error::invalid_config(
                    "config",
                    format!("{}: expected a .toml, .yaml or .json file", path.display()),
                ))
            }
        };
        tracing::debug!(path = %path.display(), ?config, "loaded config");
        Ok(config)
    }

    /// Check every value and return the parsed linkage.
    pub fn validate(&self) -> Result<Linkage> {
        let linkage: Linkage = self.linkage_method.parse()?;
        if !self.distance_threshold.is_finite() {
            return Err(Error::invalid_config(
                "distance_threshold",
                format!("must be finite, got {}", self.distance_threshold),
            ));
        }
        for (name, value) in [
            ("min_cluster_size", self.min_cluster_size),
            ("max_clusters", self.max_clusters),
            ("embedding_batch_size", self.embedding_batch_size),
            ("hashing_dims", self.hashing_dims),
        ] {
            if value == 0 {
                return Err(Error::invalid_config(name, "must be at least 1"));
            }
        }
        Ok(linkage)
    }
}
