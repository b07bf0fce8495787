// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Keeps the tokenizer of a run as `tokenizer.json` inside the
// run directory, so representations can later be extracted with
// exactly the vocabulary the model was trained with.
//
// Where the tokenizer comes from:
//   1. models_dir/<name>/tokenizer.json, if the pretrained model
//      ships one → copied into the run directory
//   2. otherwise a word-level vocabulary is built from the
//      training corpus of both domains
//
// The word-level tokenizer is written as Hugging Face JSON and
// loaded back with Tokenizer::from_file, which avoids the
// trainer / ModelWrapper type mismatch of tokenizers 0.15.
//
// Reference: Sennrich et al. (2016) BPE paper

use anyhow::{Context, Result};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};
use tokenizers::normalizers::bert::BertNormalizer;
use tokenizers::pre_tokenizers::whitespace::Whitespace;
use tokenizers::{
    NormalizedString, Normalizer, OffsetReferential, OffsetType, PreTokenizedString,
    PreTokenizer, Tokenizer,
};

/// Fixed ids of the special tokens in a built vocabulary.
const SPECIAL_TOKENS: [&str; 5] = ["[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]"];

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join("tokenizer.json")
    }

    /// Copy the pretrained tokenizer if there is one, else build a
    /// word-level tokenizer of at most `vocab_size` entries.
    pub fn resolve(
        &self,
        pretrained: Option<&Path>,
        corpus:     &[String],
        vocab_size: usize,
    ) -> Result<Tokenizer> {
        match pretrained {
            Some(src) => {
                tracing::info!("Using pretrained tokenizer '{}'", src.display());
                fs::create_dir_all(&self.dir)?;
                fs::copy(src, self.path())
                    .with_context(|| format!("Cannot copy tokenizer '{}'", src.display()))?;
                self.load()
            }
            None => {
                tracing::info!("Building word-level tokenizer (vocab_size={})", vocab_size);
                self.build_and_save(corpus, vocab_size)
            }
        }
    }

    /// Load a previously saved tokenizer from JSON file
    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.path();
        Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!(
                "Cannot load tokenizer from '{}': {}", path.display(), e
            ))
    }

    /// Build a word-level vocabulary from `texts` and write it as
    /// tokenizer JSON.
    pub fn build_and_save(&self, texts: &[String], vocab_size: usize) -> Result<Tokenizer> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        // ── Step 1: Count words ───────────────────────────────────────────────
        // Same normalizer and pre-tokenizer as the saved JSON, so every
        // counted word is a piece the tokenizer will look up.
        let mut freq: HashMap<String, usize> = HashMap::new();
        for text in texts {
            for word in pre_tokenize(text)? {
                *freq.entry(word).or_insert(0) += 1;
            }
        }

        // Most frequent first; ties broken alphabetically so the
        // vocabulary is identical across runs.
        let mut words: Vec<(String, usize)> = freq.into_iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        words.truncate(vocab_size.saturating_sub(SPECIAL_TOKENS.len()));

        // ── Step 2: Build vocab JSON ──────────────────────────────────────────
        let mut vocab = serde_json::Map::new();
        for (id, token) in SPECIAL_TOKENS.iter().enumerate() {
            vocab.insert(token.to_string(), serde_json::json!(id));
        }
        for (word, _) in &words {
            if !vocab.contains_key(word) {
                let id = vocab.len();
                vocab.insert(word.clone(), serde_json::json!(id));
            }
        }
        let size = vocab.len();

        let added_tokens: Vec<serde_json::Value> = SPECIAL_TOKENS
            .iter()
            .enumerate()
            .map(|(id, token)| serde_json::json!({
                "id": id, "content": token, "single_word": false, "lstrip": false,
                "rstrip": false, "normalized": false, "special": true
            }))
            .collect();

        // ── Step 3: Write tokenizer JSON in HuggingFace format ────────────────
        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": {
                "type": "BertNormalizer",
                "clean_text": true,
                "handle_chinese_chars": true,
                "strip_accents": null,
                "lowercase": true
            },
            "pre_tokenizer": {
                "type": "Whitespace"
            },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": "[UNK]"
            }
        });

        let tok_path = self.path();
        fs::write(&tok_path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| format!("Cannot write '{}'", tok_path.display()))?;

        tracing::info!("Tokenizer built with {} entries, saved to '{}'", size, tok_path.display());

        self.load()
    }
}

/// Split `text` the way the saved tokenizer does before the vocabulary
/// lookup: BERT normalisation with lowercasing, then `\w+|[^\w\s]+`.
fn pre_tokenize(text: &str) -> Result<Vec<String>> {
    let mut normalized = NormalizedString::from(text);
    BertNormalizer::new(true, true, None, true)
        .normalize(&mut normalized)
        .map_err(|e| anyhow::anyhow!("Cannot normalize text: {}", e))?;

    let mut pre = PreTokenizedString::from(normalized);
    Whitespace {}
        .pre_tokenize(&mut pre)
        .map_err(|e| anyhow::anyhow!("Cannot pre-tokenize text: {}", e))?;

    Ok(pre
        .get_splits(OffsetReferential::Original, OffsetType::Byte)
        .into_iter()
        .map(|(piece, _, _)| piece.to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<String> {
        vec!["The cat sat.".to_string(), "the dog, the cat!".to_string()]
    }

    #[test]
    fn test_special_ids_are_fixed() {
        let dir = tempfile::tempdir().unwrap();
        let tok = TokenizerStore::new(dir.path()).build_and_save(&corpus(), 100).unwrap();
        assert_eq!(tok.token_to_id("[PAD]"), Some(0));
        assert_eq!(tok.token_to_id("[CLS]"), Some(2));
        assert_eq!(tok.token_to_id("[SEP]"), Some(3));
        // most frequent word comes first
        assert_eq!(tok.token_to_id("the"), Some(5));
    }

    #[test]
    fn test_vocab_never_exceeds_requested_size() {
        let dir = tempfile::tempdir().unwrap();
        let tok = TokenizerStore::new(dir.path()).build_and_save(&corpus(), 7).unwrap();
        assert_eq!(tok.get_vocab_size(true), 7);
        // "dog" and "sat" did not fit
        let ids = tok.encode("dog", false).unwrap().get_ids().to_vec();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn test_punctuated_words_are_in_vocab() {
        let texts = vec![
            "don't stop".to_string(),
            "Don't go".to_string(),
            "a state-of-the-art model".to_string(),
        ];
        let dir = tempfile::tempdir().unwrap();
        let tok = TokenizerStore::new(dir.path()).build_and_save(&texts, 100).unwrap();

        let enc = tok.encode("Don't use a state-of-the-art model", false).unwrap();
        let unk: Vec<&str> = enc
            .get_tokens()
            .iter()
            .zip(enc.get_ids())
            .filter(|(_, &id)| id == 1)
            .map(|(t, _)| t.as_str())
            .collect();
        // only "use" is new
        assert_eq!(unk, vec!["[UNK]"]);
        assert_eq!(enc.get_ids().len(), 13);
        assert!(tok.token_to_id("'").is_some());
        assert!(tok.token_to_id("-").is_some());
    }

    #[test]
    fn test_pretrained_tokenizer_is_copied() {
        let src_dir = tempfile::tempdir().unwrap();
        TokenizerStore::new(src_dir.path()).build_and_save(&corpus(), 50).unwrap();

        let run_dir = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(run_dir.path());
        let src = src_dir.path().join("tokenizer.json");
        store.resolve(Some(&src), &[], 50).unwrap();
        assert!(store.path().exists());
        assert_eq!(store.load().unwrap().token_to_id("cat"), Some(6));
    }
}
