//! Sentence-transformer backend on candle.
//!
//! Loads a BERT-family checkpoint from a local directory laid out the way
//! `sentence-transformers` saves one:
//!
//! ```text
//! all-MiniLM-L6-v2/
//! ├── config.json                  hidden size, heads, layers, eps
//! ├── tokenizer.json               WordPiece tokenizer
//! ├── model.safetensors            weights
//! └── sentence_bert_config.json    optional, max_seq_length
//! ```
//!
//! Forward pass: word + position + token-type embeddings, LayerNorm, then
//! `num_hidden_layers` post-norm encoder layers (self-attention with the
//! padding mask, GELU feed-forward). The sentence vector is the mean of the
//! unpadded token states, L2-normalized.

use std::path::Path;

use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{embedding, layer_norm, linear, Embedding, LayerNorm, Linear, VarBuilder};
use serde::Deserialize;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

use super::Embedder;
use crate::error::{Error, Result};

/// Added to attention scores of padded positions before the softmax.
const MASKED_SCORE: f64 = -10_000.0;

/// Keeps the mean-pooling denominator away from zero.
const POOL_EPS: f64 = 1e-9;

/// Fields of a Hugging Face BERT `config.json` the encoder needs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BertConfig {
    /// Rows of the word-embedding table.
    pub vocab_size: usize,
    /// Width of every token state, and of the sentence vector.
    pub hidden_size: usize,
    /// Number of encoder layers.
    pub num_hidden_layers: usize,
    /// Must divide `hidden_size`.
    pub num_attention_heads: usize,
    /// Width of the feed-forward block.
    pub intermediate_size: usize,
    /// Longest input the position table covers.
    pub max_position_embeddings: usize,
    /// Segment types (default: 2)
    #[serde(default = "default_type_vocab_size")]
    pub type_vocab_size: usize,
    /// LayerNorm epsilon (default: 1e-12)
    #[serde(default = "default_layer_norm_eps")]
    pub layer_norm_eps: f64,
}

fn default_type_vocab_size() -> usize {
    2
}

fn default_layer_norm_eps() -> f64 {
    1e-12
}

#[derive(Debug, Deserialize)]
struct SentenceBertConfig {
    max_seq_length: usize,
}

struct BertEmbeddings {
    word: Embedding,
    position: Embedding,
    token_type: Embedding,
    norm: LayerNorm,
}

impl BertEmbeddings {
    fn load(config: &BertConfig, vb: VarBuilder) -> candle_core::Result<Self> {
        let h = config.hidden_size;
        Ok(Self {
            word: embedding(config.vocab_size, h, vb.pp("word_embeddings"))?,
            position: embedding(config.max_position_embeddings, h, vb.pp("position_embeddings"))?,
            token_type: embedding(config.type_vocab_size, h, vb.pp("token_type_embeddings"))?,
            norm: layer_norm(h, config.layer_norm_eps, vb.pp("LayerNorm"))?,
        })
    }

    fn forward(&self, input_ids: &Tensor) -> candle_core::Result<Tensor> {
        let (_, seq_len) = input_ids.dims2()?;
        let positions = Tensor::arange(0u32, seq_len as u32, input_ids.device())?.unsqueeze(0)?;
        let token_types = input_ids.zeros_like()?;
        let sum = self
            .word
            .forward(input_ids)?
            .broadcast_add(&self.position.forward(&positions)?)?
            .broadcast_add(&self.token_type.forward(&token_types)?)?;
        self.norm.forward(&sum)
    }
}

struct EncoderLayer {
    query: Linear,
    key: Linear,
    value: Linear,
    attention_out: Linear,
    attention_norm: LayerNorm,
    intermediate: Linear,
    output: Linear,
    output_norm: LayerNorm,
    num_heads: usize,
    head_dim: usize,
}

impl EncoderLayer {
    fn load(config: &BertConfig, vb: VarBuilder) -> candle_core::Result<Self> {
        let h = config.hidden_size;
        let eps = config.layer_norm_eps;
        let attention = vb.pp("attention");
        Ok(Self {
            query: linear(h, h, attention.pp("self").pp("query"))?,
            key: linear(h, h, attention.pp("self").pp("key"))?,
            value: linear(h, h, attention.pp("self").pp("value"))?,
            attention_out: linear(h, h, attention.pp("output").pp("dense"))?,
            attention_norm: layer_norm(h, eps, attention.pp("output").pp("LayerNorm"))?,
            intermediate: linear(h, config.intermediate_size, vb.pp("intermediate").pp("dense"))?,
            output: linear(config.intermediate_size, h, vb.pp("output").pp("dense"))?,
            output_norm: layer_norm(h, eps, vb.pp("output").pp("LayerNorm"))?,
            num_heads: config.num_attention_heads,
            head_dim: h / config.num_attention_heads,
        })
    }

    /// `(batch, seq, hidden) -> (batch, num_heads, seq, head_dim)`
    fn split_heads(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let (b, s, _) = x.dims3()?;
        x.reshape((b, s, self.num_heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()
    }

    /// `mask_bias` is `(batch, 1, 1, seq)`: 0 for tokens, `MASKED_SCORE`
    /// for padding.
    fn forward(&self, x: &Tensor, mask_bias: &Tensor) -> candle_core::Result<Tensor> {
        let (b, s, h) = x.dims3()?;
        let q = self.split_heads(&self.query.forward(x)?)?;
        let k = self.split_heads(&self.key.forward(x)?)?;
        let v = self.split_heads(&self.value.forward(x)?)?;

        let scores = (q.matmul(&k.t()?.contiguous()?)? / (self.head_dim as f64).sqrt())?;
        let probs = candle_nn::ops::softmax_last_dim(&scores.broadcast_add(mask_bias)?)?;
        let context = probs
            .matmul(&v)?
            .transpose(1, 2)?
            .contiguous()?
            .reshape((b, s, h))?;

        let x = self
            .attention_norm
            .forward(&(self.attention_out.forward(&context)? + x)?)?;
        let ff = self
            .output
            .forward(&self.intermediate.forward(&x)?.gelu_erf()?)?;
        self.output_norm.forward(&(ff + x)?)
    }
}

/// BERT encoder producing per-token hidden states.
pub(crate) struct BertEncoder {
    embeddings: BertEmbeddings,
    layers: Vec<EncoderLayer>,
}

impl BertEncoder {
    pub(crate) fn load(config: &BertConfig, vb: VarBuilder) -> Result<Self> {
        if config.num_attention_heads == 0 || config.hidden_size % config.num_attention_heads != 0
        {
            return Err(Error::embedding_backend(format!(
                "hidden_size {} is not divisible into {} attention heads",
                config.hidden_size, config.num_attention_heads
            )));
        }
        let embeddings = BertEmbeddings::load(config, vb.pp("embeddings"))?;
        let layers = (0..config.num_hidden_layers)
            .map(|i| EncoderLayer::load(config, vb.pp("encoder").pp("layer").pp(i)))
            .collect::<candle_core::Result<Vec<_>>>()?;
        Ok(Self { embeddings, layers })
    }

    /// `input_ids` and `attention_mask` are `(batch, seq)` u32 tensors.
    /// Returns `(batch, seq, hidden)`.
    pub(crate) fn forward(&self, input_ids: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
        let mask_bias = attention_mask
            .to_dtype(DType::F32)?
            .affine(-MASKED_SCORE, MASKED_SCORE)?
            .unsqueeze(1)?
            .unsqueeze(1)?;
        let mut hidden = self.embeddings.forward(input_ids)?;
        for layer in &self.layers {
            hidden = layer.forward(&hidden, &mask_bias)?;
        }
        Ok(hidden)
    }
}

/// Masked mean over the sequence axis, then L2 normalization.
///
/// `hidden` is `(batch, seq, hidden)`, `attention_mask` is `(batch, seq)`.
pub(crate) fn mean_pool_normalized(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let mask = attention_mask.to_dtype(DType::F32)?.unsqueeze(2)?;
    let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
    let counts = (mask.sum(1)? + POOL_EPS)?;
    let mean = summed.broadcast_div(&counts)?;
    let norms = mean.sqr()?.sum_keepdim(1)?.sqrt()?;
    Ok(mean.broadcast_div(&norms)?)
}

/// A sentence-transformer model loaded from a local directory.
pub struct SentenceEmbedder {
    model_id: String,
    config: BertConfig,
    tokenizer: Tokenizer,
    encoder: BertEncoder,
    device: Device,
}

impl std::fmt::Debug for SentenceEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentenceEmbedder")
            .field("model_id", &self.model_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SentenceEmbedder {
    /// Load `config.json`, `tokenizer.json` and `model.safetensors` from
    /// `dir` onto the CPU.
    ///
    /// The model id is the directory name. Inputs longer than
    /// `max_seq_length` (from `sentence_bert_config.json`, else the position
    /// table size) are truncated.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let config: BertConfig =
            serde_json::from_str(&std::fs::read_to_string(dir.join("config.json"))?)?;
        let max_len = match std::fs::read_to_string(dir.join("sentence_bert_config.json")) {
            Ok(text) => serde_json::from_str::<SentenceBertConfig>(&text)?
                .max_seq_length
                .min(config.max_position_embeddings),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => config.max_position_embeddings,
            Err(e) => return Err(e.into()),
        };

        let mut tokenizer = Tokenizer::from_file(dir.join("tokenizer.json"))
            .map_err(|e| Error::embedding_backend(format!("loading tokenizer: {e}")))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_len,
                ..Default::default()
            }))
            .map_err(|e| Error::embedding_backend(format!("configuring truncation: {e}")))?;

        let device = Device::Cpu;
        let weights = dir.join("model.safetensors");
        // SAFETY: the file is memory-mapped read-only and not modified while
        // the model is alive.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[&weights], DType::F32, &device)? };
        // Raw BertModel checkpoints prefix every tensor with `bert.`.
        let vb = if vb.contains_tensor("bert.embeddings.word_embeddings.weight") {
            vb.pp("bert")
        } else {
            vb
        };
        let encoder = BertEncoder::load(&config, vb)?;

        let model_id = dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("sentence-transformer")
            .to_string();
        tracing::info!(
            %model_id,
            hidden_size = config.hidden_size,
            layers = config.num_hidden_layers,
            max_len,
            "loaded sentence-transformer"
        );
        Ok(Self {
            model_id,
            config,
            tokenizer,
            encoder,
            device,
        })
    }

    /// Output dimension.
    pub fn dims(&self) -> usize {
        self.config.hidden_size
    }
}

impl Embedder for SentenceEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| Error::embedding_backend(format!("tokenizing: {e}")))?;
        let seq_len = encodings.first().map_or(0, |e| e.len());
        let mut ids = Vec::with_capacity(texts.len() * seq_len);
        let mut mask = Vec::with_capacity(texts.len() * seq_len);
        for encoding in &encodings {
            ids.extend_from_slice(encoding.get_ids());
            mask.extend_from_slice(encoding.get_attention_mask());
        }

        let shape = (texts.len(), seq_len);
        let input_ids = Tensor::from_vec(ids, shape, &self.device)?;
        let attention_mask = Tensor::from_vec(mask, shape, &self.device)?;
        let hidden = self.encoder.forward(&input_ids, &attention_mask)?;
        let pooled = mean_pool_normalized(&hidden, &attention_mask)?;
        tracing::trace!(batch = texts.len(), seq_len, "encoded batch");
        Ok(pooled.to_vec2::<f32>()?)
    }
}
