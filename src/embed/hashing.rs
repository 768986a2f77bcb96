use super::Embedder;
use crate::error::Result;

/// Deterministic bag-of-words embedder using the hashing trick.
///
/// Lowercased alphanumeric tokens and adjacent-token bigrams are hashed
/// (FNV-1a) into `dims` buckets, counted, then L2-normalized. Texts with no
/// tokens map to the zero vector.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dims: usize,
    model_id: String,
}

impl HashingEmbedder {
    /// Create an embedder producing `dims`-dimensional vectors.
    pub fn new(dims: usize) -> Self {
        Self {
            dims: dims.max(1),
            model_id: format!("feature-hash-{}", dims.max(1)),
        }
    }

    /// Output dimension.
    pub fn dims(&self) -> usize {
        self.dims
    }

    fn bucket(&self, token: &str) -> usize {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        for b in token.as_bytes() {
            h ^= u64::from(*b);
            h = h.wrapping_mul(0x0100_0000_01b3);
        }
        (h % self.dims as u64) as usize
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        let mut v = vec![0f32; self.dims];
        for token in &tokens {
            v[self.bucket(token)] += 1.0;
        }
        for pair in tokens.windows(2) {
            v[self.bucket(&format!("{} {}", pair[0], pair[1]))] += 0.5;
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

impl Embedder for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashing_embedder_properties() {
        let e = HashingEmbedder::new(64);
        assert_eq!(e.model_id(), "feature-hash-64");

        let a = e.embed("Lock held across await").unwrap();
        let b = e.embed("lock  HELD across await!").unwrap();
        assert_eq!(a.len(), 64);
        assert_eq!(a, b, "case and punctuation are ignored");

        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);

        let empty = e.embed("   ").unwrap();
        assert!(empty.iter().all(|x| *x == 0.0));
    }
}
