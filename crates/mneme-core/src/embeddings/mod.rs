//! Stage 3 of spec.md §4.C (inference + pooling), plus the `Embedder`
//! capability abstraction and its LRU cache.
//!
//! The embedder is modeled as an abstract capability
//! (`transform`/`transform_batch`/`dimension`/`ready`) per spec.md §9's
//! design note, with a [`NullEmbedder`] that returns zero vectors and
//! `certainty = 0` so the rest of the engine is testable without a
//! transformer model. The bundled model weights themselves are an
//! external collaborator (spec.md §1 scope) — [`TransformerEmbedder`]
//! loads them from a caller-supplied path, it does not ship them.

mod cache;
#[cfg(feature = "embeddings")]
mod transformer;

pub use cache::{EmbeddingCache, DEFAULT_CAPACITY};
#[cfg(feature = "embeddings")]
pub use transformer::TransformerEmbedder;

use crate::error::{MnemeError, Result};
use crate::tokenizer::{normalize, Vocabulary, WordPieceTokenizer};
use crate::vector::Vector;

/// How token outputs are pooled into a single sentence vector
/// (spec.md §4.C stage 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pooling {
    #[default]
    Mean,
    Cls,
    Max,
    MeanSqrt,
}

/// Result of embedding a piece of text: the vector, a confidence in
/// [0, 1] ("certainty" — 0 for the null backend), and where it came
/// from.
#[derive(Debug, Clone)]
pub struct Artha {
    pub vector: Vector,
    pub certainty: f32,
    pub source: EmbeddingSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingSource {
    Transformer,
    Null,
    Cached,
}

/// Embedder-as-a-capability (spec.md §9 design note).
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;
    fn ready(&self) -> bool;
    fn transform(&self, text: &str) -> Result<Artha>;
    fn transform_batch(&self, texts: &[&str]) -> Result<Vec<Artha>> {
        texts.iter().map(|t| self.transform(t)).collect()
    }
}

/// Always-ready fallback that produces a deterministic zero vector.
/// BM25 keyword search still works when this is the active embedder;
/// dense search degenerates to "everything equally (dis)similar".
pub struct NullEmbedder {
    dim: usize,
}

impl NullEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Embedder for NullEmbedder {
    fn dimension(&self) -> usize {
        self.dim
    }

    fn ready(&self) -> bool {
        false
    }

    fn transform(&self, _text: &str) -> Result<Artha> {
        Ok(Artha {
            vector: Vector::zeros(self.dim),
            certainty: 0.0,
            source: EmbeddingSource::Null,
        })
    }
}

/// Lets a boxed trait object stand in for `E: Embedder` everywhere a
/// concrete backend would, so [`crate::mind::Mind`] can hold whichever
/// backend a caller configured without a generic parameter of its own.
impl Embedder for Box<dyn Embedder> {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn ready(&self) -> bool {
        (**self).ready()
    }

    fn transform(&self, text: &str) -> Result<Artha> {
        (**self).transform(text)
    }

    fn transform_batch(&self, texts: &[&str]) -> Result<Vec<Artha>> {
        (**self).transform_batch(texts)
    }
}

/// Mean/CLS/Max/MeanSqrt pooling over a sequence of per-token vectors,
/// given the attention mask used to ignore padding (spec.md §4.C).
pub fn pool(
    token_vectors: &[Vec<f32>],
    attention_mask: &[u32],
    strategy: Pooling,
) -> Vec<f32> {
    if token_vectors.is_empty() {
        return Vec::new();
    }
    let dim = token_vectors[0].len();
    match strategy {
        Pooling::Cls => token_vectors[0].clone(),
        Pooling::Mean => {
            let mut sum = vec![0.0f32; dim];
            let mut count = 0.0f32;
            for (tok, &mask) in token_vectors.iter().zip(attention_mask.iter()) {
                if mask == 0 {
                    continue;
                }
                for (s, v) in sum.iter_mut().zip(tok.iter()) {
                    *s += v;
                }
                count += 1.0;
            }
            if count > 0.0 {
                for s in &mut sum {
                    *s /= count;
                }
            }
            sum
        }
        Pooling::MeanSqrt => {
            let mut sum = vec![0.0f32; dim];
            let mut count = 0.0f32;
            for (tok, &mask) in token_vectors.iter().zip(attention_mask.iter()) {
                if mask == 0 {
                    continue;
                }
                for (s, v) in sum.iter_mut().zip(tok.iter()) {
                    *s += v;
                }
                count += 1.0;
            }
            if count > 0.0 {
                let denom = count.sqrt();
                for s in &mut sum {
                    *s /= denom;
                }
            }
            sum
        }
        Pooling::Max => {
            let mut max = vec![f32::NEG_INFINITY; dim];
            for (tok, &mask) in token_vectors.iter().zip(attention_mask.iter()) {
                if mask == 0 {
                    continue;
                }
                for (m, v) in max.iter_mut().zip(tok.iter()) {
                    if *v > *m {
                        *m = *v;
                    }
                }
            }
            max
        }
    }
}

/// Ties normalize → WordPiece → (pool + L2-normalize) together over a
/// fixed vocabulary, independent of which inference backend is used.
/// A real backend overrides `embed_tokens`; this default path is what
/// [`NullEmbedder`]-adjacent tests exercise.
pub fn prepare_encoding<'a>(
    vocab: &'a Vocabulary,
    max_seq_len: usize,
    text: &str,
) -> Result<crate::tokenizer::Encoding> {
    if !vocab.has_special_tokens() {
        return Err(MnemeError::EmbedderUnavailable(
            "vocabulary missing required special tokens".into(),
        ));
    }
    let normalized = normalize(text);
    let tokenizer = WordPieceTokenizer::new(vocab, max_seq_len);
    Ok(tokenizer.encode(&normalized))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_embedder_is_never_ready_but_always_succeeds() {
        let e = NullEmbedder::new(16);
        assert!(!e.ready());
        let a = e.transform("anything").unwrap();
        assert_eq!(a.vector.dim(), 16);
        assert!(a.vector.as_slice().iter().all(|&x| x == 0.0));
        assert_eq!(a.certainty, 0.0);
    }

    #[test]
    fn mean_pooling_ignores_masked_tokens() {
        let toks = vec![vec![1.0, 1.0], vec![3.0, 3.0], vec![99.0, 99.0]];
        let mask = [1, 1, 0];
        let pooled = pool(&toks, &mask, Pooling::Mean);
        assert!((pooled[0] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn cls_pooling_takes_first_token() {
        let toks = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let mask = [1, 1];
        let pooled = pool(&toks, &mask, Pooling::Cls);
        assert_eq!(pooled, vec![1.0, 2.0]);
    }

    #[test]
    fn max_pooling_takes_elementwise_max_over_unmasked() {
        let toks = vec![vec![1.0, 5.0], vec![3.0, 2.0]];
        let mask = [1, 1];
        let pooled = pool(&toks, &mask, Pooling::Max);
        assert_eq!(pooled, vec![3.0, 5.0]);
    }

    #[test]
    fn prepare_encoding_rejects_vocab_missing_special_tokens() {
        let vocab = Vocabulary::from_tokens(vec!["only".to_string(), "words".to_string()]);
        let result = prepare_encoding(&vocab, 16, "hello");
        assert!(result.is_err());
    }
}
