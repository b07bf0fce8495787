use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::data::encoding::EncodedText;

/// One training item: a source example paired with a target example.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceTargetItem {
    pub source: EncodedText,
    pub target: EncodedText,
}

/// Pairs every source example with a target example.
///
/// The dataset is as long as the longer side. Indices wrap around on
/// the shorter side, so every row of both splits is visited once per
/// epoch.
pub struct SourceTargetDataset {
    source: Vec<EncodedText>,
    target: Vec<EncodedText>,
}

impl SourceTargetDataset {
    pub fn new(source: Vec<EncodedText>, target: Vec<EncodedText>) -> Self {
        Self { source, target }
    }

    pub fn source_count(&self) -> usize { self.source.len() }

    pub fn target_count(&self) -> usize { self.target.len() }
}

impl Dataset<SourceTargetItem> for SourceTargetDataset {
    fn get(&self, index: usize) -> Option<SourceTargetItem> {
        if index >= self.len() {
            return None;
        }
        let source = self.source[index % self.source.len()].clone();
        let target = self.target[index % self.target.len()].clone();
        Some(SourceTargetItem { source, target })
    }

    fn len(&self) -> usize {
        if self.source.is_empty() || self.target.is_empty() {
            0
        } else {
            self.source.len().max(self.target.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(id: u32, label: i64) -> EncodedText {
        EncodedText { input_ids: vec![id], attention_mask: vec![1], label }
    }

    #[test]
    fn test_target_wraps_around() {
        let ds = SourceTargetDataset::new(
            vec![text(1, 0), text(2, 1), text(3, 2)],
            vec![text(10, 0), text(20, 0)],
        );
        assert_eq!(ds.len(), 3);
        let item = ds.get(2).unwrap();
        assert_eq!(item.source.input_ids, vec![3]);
        assert_eq!(item.target.input_ids, vec![10]);
        assert!(ds.get(3).is_none());
    }

    #[test]
    fn test_longer_target_is_fully_visited() {
        let ds = SourceTargetDataset::new(
            vec![text(1, 0), text(2, 1)],
            (10..16).map(|id| text(id, 0)).collect(),
        );
        assert_eq!(ds.len(), 6);
        assert_eq!((ds.source_count(), ds.target_count()), (2, 6));

        let targets: Vec<u32> = ds.iter().map(|item| item.target.input_ids[0]).collect();
        assert_eq!(targets, vec![10, 11, 12, 13, 14, 15]);
        let sources: Vec<u32> = ds.iter().map(|item| item.source.input_ids[0]).collect();
        assert_eq!(sources, vec![1, 2, 1, 2, 1, 2]);
    }

    #[test]
    fn test_every_target_row_reaches_a_shuffled_loader() {
        use crate::data::batcher::{PaddingRule, SourceTargetBatcher};
        use crate::domain::hparams::Padding;
        use burn::backend::NdArray;
        use burn::data::dataloader::DataLoaderBuilder;
        use std::collections::BTreeSet;

        let ds = SourceTargetDataset::new(
            vec![text(1, 0), text(2, 1)],
            (10..16).map(|id| text(id, 0)).collect(),
        );
        let rule = PaddingRule { padding: Padding::Longest, max_seq_length: 4, pad_id: 0 };
        let loader = DataLoaderBuilder::new(SourceTargetBatcher::<NdArray>::new(Default::default(), rule))
            .batch_size(2)
            .shuffle(3)
            .build(ds);

        let mut seen = BTreeSet::new();
        for batch in loader.iter() {
            let ids: Vec<i64> = batch.target.input_ids.into_data().convert::<i64>().to_vec().unwrap();
            seen.extend(ids);
        }
        assert_eq!(seen, (10..16).collect::<BTreeSet<i64>>());
    }

    #[test]
    fn test_empty_side_gives_empty_dataset() {
        let ds = SourceTargetDataset::new(vec![text(1, 0)], Vec::new());
        assert_eq!(ds.len(), 0);
        assert!(ds.get(0).is_none());
        let ds = SourceTargetDataset::new(Vec::new(), vec![text(1, 0)]);
        assert_eq!(ds.len(), 0);
    }
}
