// ============================================================
// Layer 4 — Example Encoding
// ============================================================
// Turns a cleaned TextExample into token ids in BERT layout:
//
//   single:  [CLS] a [SEP]
//   pair:    [CLS] a [SEP] b [SEP]
//
// Sequences are truncated here but NOT padded: padding depends
// on the batch (see batcher.rs), so items stay variable-length.
//
// Pairs are truncated longest-first: one token at a time is
// removed from whichever segment is currently longer, so a long
// premise cannot squeeze a short hypothesis out entirely.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokenizers::Tokenizer;

use crate::data::preprocessor::Preprocessor;
use crate::domain::example::TextExample;

/// A tokenised, truncated, unpadded example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedText {
    pub input_ids:      Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub label:          i64,
}

impl EncodedText {
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

/// Ids of the special tokens, looked up in the tokenizer vocabulary.
/// BERT and RoBERTa spellings are both recognised; the BERT ids are
/// the fallback for vocabularies that define neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    pub cls: u32,
    pub sep: u32,
    pub pad: u32,
}

impl SpecialTokens {
    pub fn from_tokenizer(tokenizer: &Tokenizer) -> Self {
        let find = |names: &[&str], fallback: u32| {
            names
                .iter()
                .find_map(|n| tokenizer.token_to_id(n))
                .unwrap_or(fallback)
        };
        Self {
            cls: find(&["[CLS]", "<s>"], 101),
            sep: find(&["[SEP]", "</s>"], 102),
            pad: find(&["[PAD]", "<pad>"], 0),
        }
    }
}

pub struct ExampleEncoder {
    tokenizer:      Tokenizer,
    special:        SpecialTokens,
    max_seq_length: usize,
    preprocessor:   Preprocessor,
}

impl ExampleEncoder {
    pub fn new(tokenizer: Tokenizer, max_seq_length: usize) -> Self {
        let special = SpecialTokens::from_tokenizer(&tokenizer);
        Self { tokenizer, special, max_seq_length, preprocessor: Preprocessor::new() }
    }

    pub fn special_tokens(&self) -> SpecialTokens {
        self.special
    }

    pub fn encode(&self, example: &TextExample) -> Result<EncodedText> {
        let mut a = self.tokenize(&example.text_a)?;
        let mut b = match &example.text_b {
            Some(text) => Some(self.tokenize(text)?),
            None => None,
        };

        match b.as_mut() {
            Some(b) => truncate_pair(&mut a, b, self.max_seq_length.saturating_sub(3)),
            None => a.truncate(self.max_seq_length.saturating_sub(2)),
        }

        let mut input_ids = Vec::with_capacity(self.max_seq_length);
        input_ids.push(self.special.cls);
        input_ids.extend_from_slice(&a);
        input_ids.push(self.special.sep);
        if let Some(b) = b {
            input_ids.extend_from_slice(&b);
            input_ids.push(self.special.sep);
        }

        let attention_mask = vec![1u32; input_ids.len()];
        Ok(EncodedText { input_ids, attention_mask, label: example.label })
    }

    pub fn encode_all(&self, examples: &[TextExample]) -> Result<Vec<EncodedText>> {
        examples.iter().map(|e| self.encode(e)).collect()
    }

    fn tokenize(&self, text: &str) -> Result<Vec<u32>> {
        let clean = self.preprocessor.clean(text);
        let enc = self
            .tokenizer
            .encode(clean.as_str(), false)
            .map_err(|e| anyhow::anyhow!("Tokenisation error: {e}"))?;
        Ok(enc.get_ids().to_vec())
    }
}

fn truncate_pair(a: &mut Vec<u32>, b: &mut Vec<u32>, budget: usize) {
    while a.len() + b.len() > budget {
        if a.len() >= b.len() {
            a.pop();
        } else {
            b.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::tokenizer_store::TokenizerStore;

    fn encoder(max_len: usize) -> (tempfile::TempDir, ExampleEncoder) {
        let dir = tempfile::tempdir().unwrap();
        let corpus = vec!["the cat sat on the mat".to_string(), "a dog ran".to_string()];
        let tok = TokenizerStore::new(dir.path()).build_and_save(&corpus, 500).unwrap();
        (dir, ExampleEncoder::new(tok, max_len))
    }

    #[test]
    fn test_pair_layout() {
        let (_dir, enc) = encoder(32);
        let sp = enc.special_tokens();
        let out = enc.encode(&TextExample::pair("the cat", "a dog", 1)).unwrap();

        assert_eq!(out.len(), 7);
        assert_eq!(out.input_ids[0], sp.cls);
        assert_eq!(out.input_ids[3], sp.sep);
        assert_eq!(out.input_ids[6], sp.sep);
        assert!(out.attention_mask.iter().all(|&m| m == 1));
        assert_eq!(out.label, 1);
    }

    #[test]
    fn test_single_is_truncated_to_max_length() {
        let (_dir, enc) = encoder(5);
        let out = enc.encode(&TextExample::single("the cat sat on the mat", 0)).unwrap();
        assert_eq!(out.len(), 5);
        assert_eq!(*out.input_ids.last().unwrap(), enc.special_tokens().sep);
    }

    #[test]
    fn test_empty_text_still_has_specials() {
        let (_dir, enc) = encoder(8);
        let out = enc.encode(&TextExample::single("   ", 0)).unwrap();
        assert_eq!(out.input_ids, vec![enc.special_tokens().cls, enc.special_tokens().sep]);
    }

    #[test]
    fn test_longest_first_truncation() {
        let mut a = vec![1, 2, 3, 4, 5, 6];
        let mut b = vec![7, 8];
        truncate_pair(&mut a, &mut b, 6);
        assert_eq!(a, vec![1, 2, 3, 4]);
        assert_eq!(b, vec![7, 8]);

        let mut a = vec![1, 2, 3];
        let mut b = vec![4, 5, 6];
        truncate_pair(&mut a, &mut b, 4);
        assert_eq!(a.len() + b.len(), 4);
        assert_eq!(a.len(), 2);
    }
}
