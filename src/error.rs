//! Error types for the clustering pipeline.

use thiserror::Error;

/// Result alias for `sheaf`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the clustering pipeline and its stages.
///
/// Every variant is fatal for the run that raised it. An undefined quality
/// score is not an error: the evaluator leaves the score out and logs a warning.
#[derive(Debug, Error)]
pub enum Error {
    /// Fewer items than the operation needs.
    #[error("insufficient data: required at least {required} items, got {actual}")]
    InsufficientData {
        /// Minimum number of items.
        required: usize,
        /// Number of items provided.
        actual: usize,
    },

    /// An embedding has zero norm (or non-finite components), so cosine
    /// distance to it is undefined.
    #[error("degenerate embedding at index {index}: zero norm or non-finite component")]
    DegenerateEmbedding {
        /// Index of the offending item.
        index: usize,
    },

    /// Unknown linkage method name.
    #[error("unsupported linkage method '{name}' (expected one of: average, complete, single, ward)")]
    UnsupportedLinkage {
        /// The name that failed to parse.
        name: String,
    },

    /// The embedding backend failed or returned a result that does not line
    /// up with its input.
    #[error("embedding backend error: {message}")]
    EmbeddingBackend {
        /// What went wrong.
        message: String,
    },

    /// An embedding's dimension differs from the first embedding of the run.
    #[error("embedding dimension mismatch at index {index}: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Index of the offending item.
        index: usize,
        /// Dimension of the first embedding.
        expected: usize,
        /// Dimension found.
        found: usize,
    },

    /// A configuration value is out of range.
    #[error("invalid config value '{name}': {message}")]
    InvalidConfig {
        /// Config key.
        name: &'static str,
        /// Why the value was rejected.
        message: String,
    },

    /// A linkage tree failed structural validation.
    #[error("malformed linkage tree: {0}")]
    MalformedTree(String),

    /// Reading an input or config file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON input or config could not be parsed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// TOML config could not be parsed.
    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    /// YAML config could not be parsed.
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// The sentence-transformer runtime failed (bad weights, shape errors).
    #[cfg(feature = "candle")]
    #[error("model runtime error: {0}")]
    Model(#[from] candle_core::Error),
}

impl Error {
    /// Create an `InsufficientData` error.
    pub fn insufficient_data(required: usize, actual: usize) -> Self {
        Self::InsufficientData { required, actual }
    }

    /// Create an `EmbeddingBackend` error.
    pub fn embedding_backend(message: impl Into<String>) -> Self {
        Self::EmbeddingBackend {
            message: message.into(),
        }
    }

    /// Create an `InvalidConfig` error.
    pub fn invalid_config(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            name,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let errors = vec![
            Error::insufficient_data(2, 1),
            Error::DegenerateEmbedding { index: 7 },
            Error::UnsupportedLinkage {
                name: "bogus".to_string(),
            },
            Error::embedding_backend("returned 3 vectors for 4 texts"),
            Error::DimensionMismatch {
                index: 2,
                expected: 384,
                found: 128,
            },
            Error::invalid_config("distance_threshold", "must be finite"),
        ];
        let expected = [
            "got 1",
            "index 7",
            "'bogus'",
            "3 vectors for 4 texts",
            "expected 384, found 128",
            "distance_threshold",
        ];

        for (err, needle) in errors.iter().zip(expected) {
            let msg = err.to_string();
            assert!(msg.contains(needle), "{msg:?} should contain {needle:?}");
        }
    }
}
