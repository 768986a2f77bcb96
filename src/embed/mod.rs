//! Text-to-vector embedding.
//!
//! The pipeline only needs `embed_batch(texts) -> vectors`, order-preserving
//! and with one fixed dimension per run. Two backends ship with the crate:
//!
//! | Backend | Feature | Model id |
//! |---------|---------|----------|
//! | [`HashingEmbedder`] | always | `feature-hash-<dims>` |
//! | `SentenceEmbedder` | `candle` | model directory name |
//!
//! `SentenceEmbedder` runs a BERT-family sentence-transformer (for example
//! `all-MiniLM-L6-v2`) from a local directory on the CPU with mean pooling.
//! [`from_config`] picks the backend a run asks for.
//!
//! [`embed_items`] is the only place the pipeline talks to a backend: it
//! batches, concatenates in input order, and checks that what came back lines
//! up with what went in. Failures are never retried here.

use crate::config::ClusteringConfig;
use crate::error::{Error, Result};
use crate::item::Item;

mod hashing;
#[cfg(feature = "candle")]
mod sentence;

pub use hashing::HashingEmbedder;
#[cfg(feature = "candle")]
pub use sentence::{BertConfig, SentenceEmbedder};

/// Default number of texts per backend call.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// A text embedding backend.
pub trait Embedder {
    /// Identifier of the underlying model, reported in the outputs.
    fn model_id(&self) -> &str;

    /// Embed a batch of texts, one vector per text, in input order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .pop()
            .ok_or_else(|| Error::embedding_backend("backend returned no vector"))
    }
}

/// Embed every item, in order, through `embedder`.
///
/// Returns one vector per item. A batch that comes back with the wrong number
/// of vectors is an [`Error::EmbeddingBackend`], and a vector whose length differs
/// from the first one is an [`Error::DimensionMismatch`].
pub fn embed_items(
    embedder: &dyn Embedder,
    items: &[Item],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    if batch_size == 0 {
        return Err(Error::invalid_config(
            "embedding_batch_size",
            "must be at least 1",
        ));
    }

    let mut embeddings = Vec::with_capacity(items.len());
    for (batch_no, chunk) in items.chunks(batch_size).enumerate() {
        let texts: Vec<&str> = chunk.iter().map(|item| item.text.as_str()).collect();
        let vectors = embedder.embed_batch(&texts)?;
        if vectors.len() != texts.len() {
            return Err(Error::embedding_backend(format!(
                "batch {batch_no} returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        embeddings.extend(vectors);
    }

    let dim = embeddings.first().map_or(0, Vec::len);
    if dim == 0 && !embeddings.is_empty() {
        return Err(Error::embedding_backend("backend returned empty vectors"));
    }
    if let Some((index, v)) = embeddings.iter().enumerate().find(|(_, v)| v.len() != dim) {
        return Err(Error::DimensionMismatch {
            index,
            expected: dim,
            found: v.len(),
        });
    }

    tracing::debug!(
        model_id = embedder.model_id(),
        n = embeddings.len(),
        dim,
        "embedded items"
    );
    Ok(embeddings)
}

/// Build the embedder a configuration selects.
///
/// No `embedding_model_path` means the hashing backend with `hashing_dims`
/// buckets. A model path needs the `candle` feature; without it the path is
/// rejected rather than silently replaced by hashing.
pub fn from_config(config: &ClusteringConfig) -> Result<Box<dyn Embedder>> {
    match &config.embedding_model_path {
        None => Ok(Box::new(HashingEmbedder::new(config.hashing_dims))),
        #[cfg(feature = "candle")]
        Some(dir) => Ok(Box::new(SentenceEmbedder::load(dir)?)),
        #[cfg(not(feature = "candle"))]
        Some(dir) => Err(Error::invalid_config(
            "embedding_model_path",
            format!(
                "{}: this build has no model runtime (enable the `candle` feature)",
                dir.display()
            ),
        )),
    }
}
