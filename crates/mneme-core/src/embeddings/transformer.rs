//! Real inference backend: a BERT-family encoder run locally via
//! `candle`, fed by our own WordPiece tokenizer (stage 2) rather than
//! a bundled tokenizer/model combo. Model weights and vocabulary are
//! loaded from a caller-supplied directory — they are an external
//! collaborator (spec.md §1), not something this crate ships.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};

use super::{pool, prepare_encoding, Artha, Embedder, EmbeddingSource, Pooling};
use crate::error::{MnemeError, Result};
use crate::tokenizer::Vocabulary;
use crate::vector::Vector;

/// Where to load model weights and vocabulary from, and how to run
/// them. No field here has a compiled-in default path — the caller
/// (daemon/CLI config, spec.md §6 environment) decides where the
/// bundled weights live on disk.
pub struct TransformerConfig {
    pub model_dir: PathBuf,
    pub dimension: usize,
    pub max_seq_len: usize,
    pub pooling: Pooling,
}

struct Loaded {
    model: BertModel,
    vocab: Vocabulary,
    device: Device,
}

/// Candle-backed embedder. Lazily and fallibly loaded: construction
/// never panics even if `model_dir` is missing or malformed, matching
/// spec.md §4.C's "vocabulary missing → embedder reports not-ready"
/// failure mode.
pub struct TransformerEmbedder {
    config: TransformerConfig,
    loaded: Mutex<Option<Result<Loaded>>>,
}

impl TransformerEmbedder {
    pub fn new(config: TransformerConfig) -> Self {
        Self {
            config,
            loaded: Mutex::new(None),
        }
    }

    fn load_vocab(dir: &Path) -> Result<Vocabulary> {
        let vocab_path = dir.join("vocab.txt");
        let text = std::fs::read_to_string(&vocab_path).map_err(|e| {
            MnemeError::EmbedderUnavailable(format!(
                "could not read vocabulary at {}: {e}",
                vocab_path.display()
            ))
        })?;
        let tokens = text.lines().map(|l| l.to_string()).collect::<Vec<_>>();
        let vocab = Vocabulary::from_tokens(tokens);
        if !vocab.has_special_tokens() {
            return Err(MnemeError::EmbedderUnavailable(
                "vocabulary is missing one or more special tokens".into(),
            ));
        }
        Ok(vocab)
    }

    fn load(&self) -> Result<Loaded> {
        let device = Device::Cpu;
        let vocab = Self::load_vocab(&self.config.model_dir)?;

        let config_path = self.config.model_dir.join("config.json");
        let config_json = std::fs::read_to_string(&config_path).map_err(|e| {
            MnemeError::EmbedderUnavailable(format!(
                "could not read model config at {}: {e}",
                config_path.display()
            ))
        })?;
        let bert_config: BertConfig = serde_json::from_str(&config_json).map_err(|e| {
            MnemeError::EmbedderUnavailable(format!("invalid model config.json: {e}"))
        })?;

        let weights_path = self.config.model_dir.join("model.safetensors");
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path.clone()], DTYPE, &device)
                .map_err(|e| {
                    MnemeError::EmbedderUnavailable(format!(
                        "could not load weights at {}: {e}",
                        weights_path.display()
                    ))
                })?
        };

        let model = BertModel::load(vb, &bert_config)
            .map_err(|e| MnemeError::EmbedderUnavailable(format!("failed to build model: {e}")))?;

        Ok(Loaded {
            model,
            vocab,
            device,
        })
    }

    fn with_loaded<R>(&self, f: impl FnOnce(&Loaded) -> Result<R>) -> Result<R> {
        let mut guard = self.loaded.lock().unwrap();
        if guard.is_none() {
            *guard = Some(self.load());
        }
        match guard.as_ref().unwrap() {
            Ok(loaded) => f(loaded),
            Err(e) => Err(MnemeError::EmbedderUnavailable(e.to_string())),
        }
    }

    fn forward_one(&self, loaded: &Loaded, text: &str) -> Result<Artha> {
        let encoding = prepare_encoding(&loaded.vocab, self.config.max_seq_len, text)?;

        let input_ids = Tensor::new(encoding.input_ids.as_slice(), &loaded.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(|e| MnemeError::EmbedderUnavailable(e.to_string()))?;
        let token_type_ids = Tensor::new(encoding.token_type_ids.as_slice(), &loaded.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(|e| MnemeError::EmbedderUnavailable(e.to_string()))?;
        let attention_mask = Tensor::new(encoding.attention_mask.as_slice(), &loaded.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(|e| MnemeError::EmbedderUnavailable(e.to_string()))?;

        let output = loaded
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))
            .map_err(|e| MnemeError::EmbedderUnavailable(format!("forward pass failed: {e}")))?;

        // output: (1, seq_len, hidden) -> per-token Vec<f32>
        let (_, seq_len, hidden) = output
            .dims3()
            .map_err(|e| MnemeError::EmbedderUnavailable(e.to_string()))?;
        let flat: Vec<f32> = output
            .squeeze(0)
            .and_then(|t| t.flatten_all())
            .and_then(|t| t.to_vec1())
            .map_err(|e| MnemeError::EmbedderUnavailable(e.to_string()))?;

        let token_vectors: Vec<Vec<f32>> = flat
            .chunks(hidden)
            .take(seq_len)
            .map(|c| c.to_vec())
            .collect();

        let pooled = pool(&token_vectors, &encoding.attention_mask, self.config.pooling);
        let vector = Vector(pooled).fit_to_dim(self.config.dimension);

        Ok(Artha {
            vector,
            certainty: 1.0,
            source: EmbeddingSource::Transformer,
        })
    }
}

impl Embedder for TransformerEmbedder {
    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn ready(&self) -> bool {
        self.with_loaded(|_| Ok(())).is_ok()
    }

    fn transform(&self, text: &str) -> Result<Artha> {
        self.with_loaded(|loaded| self.forward_one(loaded, text))
    }
}
