// ============================================================
// Layer 6 — Pretrained Model Registry
// ============================================================
// Resolves `--pretrained-model-name` to an encoder architecture
// plus optional weights and tokenizer on disk.
//
// Lookup order:
//   1. models_dir/<name>/config.json  (EncoderConfig JSON)
//   2. the built-in table below
//
// Optional files next to the config:
//   models_dir/<name>/model.mpk.gz    ← TransformerEncoder record
//   models_dir/<name>/tokenizer.json  ← Hugging Face tokenizer
//
// Without weights the encoder is randomly initialised (with a
// warning); without a tokenizer one is built from the corpus.

use anyhow::{bail, Result};
use burn::prelude::*;
use std::path::{Path, PathBuf};

use crate::infra::checkpoint::{load_module, record_exists};
use crate::ml::encoder::{EncoderConfig, TransformerEncoder};

/// (name, vocab, d_model, heads, layers, d_ff, max_positions, layer_norm_eps)
const REGISTRY: &[(&str, usize, usize, usize, usize, usize, usize, f64)] = &[
    ("bert-base-uncased",       30522, 768, 12, 12, 3072, 512, 1e-12),
    ("distilbert-base-uncased", 30522, 768, 12,  6, 3072, 512, 1e-12),
    ("roberta-base",            50265, 768, 12, 12, 3072, 514, 1e-5),
    ("bert-tiny",               30522, 128,  2,  2,  512, 512, 1e-12),
];

pub fn builtin_config(name: &str) -> Option<EncoderConfig> {
    REGISTRY
        .iter()
        .find(|entry| entry.0 == name)
        .map(|&(_, vocab, d_model, heads, layers, d_ff, positions, eps)| {
            EncoderConfig::new(vocab, positions, d_model, heads, layers, d_ff)
                .with_layer_norm_eps(eps)
        })
}

#[derive(Debug, Clone)]
pub struct PretrainedModel {
    pub name:      String,
    pub config:    EncoderConfig,
    /// Extension-less record path, present only if the file exists
    pub weights:   Option<PathBuf>,
    pub tokenizer: Option<PathBuf>,
}

impl PretrainedModel {
    pub fn resolve(name: &str, models_dir: impl AsRef<Path>) -> Result<Self> {
        let model_dir = models_dir.as_ref().join(name);
        let config_path = model_dir.join("config.json");

        let config = if config_path.exists() {
            EncoderConfig::load(&config_path).map_err(|e| {
                anyhow::anyhow!("Cannot read encoder config '{}': {}", config_path.display(), e)
            })?
        } else {
            match builtin_config(name) {
                Some(config) => config,
                None => bail!(
                    "Unknown pretrained model '{}': not built in and no '{}' found",
                    name,
                    config_path.display()
                ),
            }
        };

        let weights = Some(model_dir.join("model")).filter(|p| record_exists(p));
        let tokenizer = Some(model_dir.join("tokenizer.json")).filter(|p| p.exists());

        tracing::info!(
            "Pretrained '{}': {} layers, d_model={}, weights={}, tokenizer={}",
            name,
            config.num_layers,
            config.d_model,
            if weights.is_some() { "yes" } else { "no" },
            if tokenizer.is_some() { "yes" } else { "no" },
        );

        Ok(Self { name: name.to_string(), config, weights, tokenizer })
    }

    /// Encoder with pretrained weights if available, else random.
    pub fn load_encoder<B: Backend>(&self, device: &B::Device) -> Result<TransformerEncoder<B>> {
        let encoder = self.config.init::<B>(device);
        match &self.weights {
            Some(path) => load_module::<B, _>(encoder, path, device),
            None => {
                tracing::warn!(
                    "No weights found for '{}'; the encoder is randomly initialised",
                    self.name
                );
                Ok(encoder)
            }
        }
    }
}
