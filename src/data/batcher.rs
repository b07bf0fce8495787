// ============================================================
// Layer 4 — Batchers
// ============================================================
// Implements Burn's Batcher trait to turn encoded examples into
// padded tensor batches.
//
// Items arrive unpadded (see encoding.rs). The padded length is
// chosen per batch:
//   Padding::MaxLength → always max_seq_length
//   Padding::Longest   → longest sequence in the batch
//
// For source/target batches the length is shared by BOTH sides,
// because the domain-adapter objective concatenates them along
// the batch dimension and runs a single forward pass.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::SourceTargetItem;
use crate::data::encoding::EncodedText;
use crate::domain::hparams::Padding;

// ─── TextBatch ────────────────────────────────────────────────────────────────
/// One domain's half of a batch.
#[derive(Debug, Clone)]
pub struct TextBatch<B: Backend> {
    /// [batch_size, seq_len]
    pub input_ids: Tensor<B, 2, Int>,
    /// [batch_size, seq_len], 1 = real token, 0 = padding
    pub attention_mask: Tensor<B, 2, Int>,
    /// [batch_size]
    pub labels: Tensor<B, 1, Int>,
}

impl<B: Backend> TextBatch<B> {
    pub fn batch_size(&self) -> usize {
        self.input_ids.dims()[0]
    }
}

/// Paired source and target halves with identical shapes.
#[derive(Debug, Clone)]
pub struct SourceTargetBatch<B: Backend> {
    pub source: TextBatch<B>,
    pub target: TextBatch<B>,
}

// ─── Padding rules ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy)]
pub struct PaddingRule {
    pub padding:        Padding,
    pub max_seq_length: usize,
    pub pad_id:         u32,
}

impl PaddingRule {
    /// Padded length for a set of sequences.
    pub fn target_len<'a>(&self, items: impl Iterator<Item = &'a EncodedText>) -> usize {
        match self.padding {
            Padding::MaxLength => self.max_seq_length,
            Padding::Longest   => items.map(|t| t.len()).max().unwrap_or(1).max(1),
        }
    }
}

fn stack<B: Backend>(
    items:  &[&EncodedText],
    len:    usize,
    pad_id: u32,
    device: &B::Device,
) -> TextBatch<B> {
    let batch_size = items.len();

    let mut ids  = Vec::with_capacity(batch_size * len);
    let mut mask = Vec::with_capacity(batch_size * len);
    for item in items {
        let n = item.len().min(len);
        ids.extend(item.input_ids[..n].iter().map(|&x| x as i32));
        ids.extend(std::iter::repeat(pad_id as i32).take(len - n));
        mask.extend(item.attention_mask[..n].iter().map(|&x| x as i32));
        mask.extend(std::iter::repeat(0).take(len - n));
    }
    let labels: Vec<i32> = items.iter().map(|t| t.label as i32).collect();

    let input_ids = Tensor::<B, 1, Int>::from_ints(ids.as_slice(), device)
        .reshape([batch_size, len]);
    let attention_mask = Tensor::<B, 1, Int>::from_ints(mask.as_slice(), device)
        .reshape([batch_size, len]);
    let labels = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), device);

    TextBatch { input_ids, attention_mask, labels }
}

// ─── SourceTargetBatcher ──────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct SourceTargetBatcher<B: Backend> {
    pub device: B::Device,
    pub rule:   PaddingRule,
}

impl<B: Backend> SourceTargetBatcher<B> {
    pub fn new(device: B::Device, rule: PaddingRule) -> Self {
        Self { device, rule }
    }
}

impl<B: Backend> Batcher<SourceTargetItem, SourceTargetBatch<B>> for SourceTargetBatcher<B> {
    fn batch(&self, items: Vec<SourceTargetItem>) -> SourceTargetBatch<B> {
        let len = self
            .rule
            .target_len(items.iter().flat_map(|i| [&i.source, &i.target]));

        let sources: Vec<&EncodedText> = items.iter().map(|i| &i.source).collect();
        let targets: Vec<&EncodedText> = items.iter().map(|i| &i.target).collect();

        SourceTargetBatch {
            source: stack(&sources, len, self.rule.pad_id, &self.device),
            target: stack(&targets, len, self.rule.pad_id, &self.device),
        }
    }
}

// ─── TextBatcher ──────────────────────────────────────────────────────────────
/// Single-domain batcher, used when extracting representations.
#[derive(Clone, Debug)]
pub struct TextBatcher<B: Backend> {
    pub device: B::Device,
    pub rule:   PaddingRule,
}

impl<B: Backend> TextBatcher<B> {
    pub fn new(device: B::Device, rule: PaddingRule) -> Self {
        Self { device, rule }
    }
}

impl<B: Backend> Batcher<EncodedText, TextBatch<B>> for TextBatcher<B> {
    fn batch(&self, items: Vec<EncodedText>) -> TextBatch<B> {
        let len = self.rule.target_len(items.iter());
        let refs: Vec<&EncodedText> = items.iter().collect();
        stack(&refs, len, self.rule.pad_id, &self.device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    fn text(ids: &[u32], label: i64) -> EncodedText {
        EncodedText { input_ids: ids.to_vec(), attention_mask: vec![1; ids.len()], label }
    }

    fn rule(padding: Padding) -> PaddingRule {
        PaddingRule { padding, max_seq_length: 6, pad_id: 0 }
    }

    #[test]
    fn test_longest_padding_is_shared_by_both_sides() {
        let batcher = SourceTargetBatcher::<TB>::new(Default::default(), rule(Padding::Longest));
        let batch = batcher.batch(vec![
            SourceTargetItem { source: text(&[101, 5, 102], 1), target: text(&[101, 102], 0) },
            SourceTargetItem { source: text(&[101, 102], 2), target: text(&[101, 7, 8, 9, 102], 0) },
        ]);

        assert_eq!(batch.source.input_ids.dims(), [2, 5]);
        assert_eq!(batch.target.input_ids.dims(), [2, 5]);

        let mask: Vec<i64> = batch.source.attention_mask.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(mask, vec![1, 1, 1, 0, 0, 1, 1, 0, 0, 0]);

        let labels: Vec<i64> = batch.source.labels.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(labels, vec![1, 2]);
    }

    #[test]
    fn test_max_length_padding() {
        let batcher = TextBatcher::<TB>::new(Default::default(), rule(Padding::MaxLength));
        let batch = batcher.batch(vec![text(&[101, 4, 102], 0)]);
        assert_eq!(batch.input_ids.dims(), [1, 6]);

        let ids: Vec<i64> = batch.input_ids.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(ids, vec![101, 4, 102, 0, 0, 0]);
    }
}
