// ============================================================
// Layer 4 — Source/Target Data Module
// ============================================================
// Bundles the six CSV splits of a domain pair and turns them
// into Burn data loaders:
//
//   ExampleSource ──load──► RawSplits ──encode──► EncodedSplits
//                                                    │
//                               SourceTargetBatcher ─┤
//                                                    ▼
//                                                 Loaders<B>
//
// Training batches live on the autodiff backend; validation and
// test batches live on the inner backend, matching the model
// returned by `.valid()`.

use anyhow::{bail, Result};
use burn::{
    data::{
        dataloader::{DataLoader, DataLoaderBuilder},
        dataset::Dataset,
    },
    tensor::backend::AutodiffBackend,
};
use std::sync::Arc;

use crate::data::batcher::{PaddingRule, SourceTargetBatch, SourceTargetBatcher};
use crate::data::dataset::SourceTargetDataset;
use crate::data::encoding::ExampleEncoder;
use crate::data::sampling::num_batches;
use crate::domain::example::{Side, Split, TextExample};
use crate::domain::traits::ExampleSource;

/// Raw examples of one split, both domains.
pub struct SplitExamples {
    pub source: Vec<TextExample>,
    pub target: Vec<TextExample>,
}

pub struct RawSplits {
    pub train: SplitExamples,
    pub dev:   SplitExamples,
    pub test:  SplitExamples,
}

impl RawSplits {
    pub fn load(source: &dyn ExampleSource) -> Result<Self> {
        let load_split = |split: Split| -> Result<SplitExamples> {
            let s = source.load(split, Side::Source)?;
            let t = source.load(split, Side::Target)?;
            if s.is_empty() || t.is_empty() {
                bail!(
                    "{} split is empty ({} source / {} target examples)",
                    split.as_str(), s.len(), t.len()
                );
            }
            tracing::info!(
                "{} split: {} source, {} target examples",
                split.as_str(), s.len(), t.len()
            );
            Ok(SplitExamples { source: s, target: t })
        };

        Ok(Self {
            train: load_split(Split::Train)?,
            dev:   load_split(Split::Dev)?,
            test:  load_split(Split::Test)?,
        })
    }

    /// Every training sentence of both domains, for building a
    /// word-level vocabulary when no pretrained tokenizer exists.
    pub fn train_corpus(&self) -> Vec<String> {
        self.train
            .source
            .iter()
            .chain(self.train.target.iter())
            .flat_map(|e| e.texts().map(str::to_string).collect::<Vec<_>>())
            .collect()
    }

    pub fn encode(&self, encoder: &ExampleEncoder) -> Result<EncodedSplits> {
        let encode_split = |s: &SplitExamples| -> Result<SourceTargetDataset> {
            Ok(SourceTargetDataset::new(
                encoder.encode_all(&s.source)?,
                encoder.encode_all(&s.target)?,
            ))
        };
        Ok(EncodedSplits {
            train: encode_split(&self.train)?,
            dev:   encode_split(&self.dev)?,
            test:  encode_split(&self.test)?,
        })
    }
}

pub struct EncodedSplits {
    pub train: SourceTargetDataset,
    pub dev:   SourceTargetDataset,
    pub test:  SourceTargetDataset,
}

/// Data loaders plus the number of batches each one yields.
pub struct Loaders<B: AutodiffBackend> {
    pub train:         Arc<dyn DataLoader<SourceTargetBatch<B>>>,
    pub valid:         Arc<dyn DataLoader<SourceTargetBatch<B::InnerBackend>>>,
    pub test:          Arc<dyn DataLoader<SourceTargetBatch<B::InnerBackend>>>,
    pub train_batches: usize,
    pub valid_batches: usize,
    pub test_batches:  usize,
}

#[derive(Debug, Clone, Copy)]
pub struct LoaderOptions {
    pub batch_size:  usize,
    pub seed:        u64,
    pub num_workers: usize,
    pub rule:        PaddingRule,
}

impl EncodedSplits {
    pub fn into_loaders<B: AutodiffBackend>(
        self,
        opts:   LoaderOptions,
        device: &B::Device,
    ) -> Loaders<B> {
        for (name, split) in [("train", &self.train), ("dev", &self.dev), ("test", &self.test)] {
            tracing::debug!(
                "{} loader: {} pairs from {} source / {} target examples",
                name, split.len(), split.source_count(), split.target_count()
            );
        }

        let train_batches = num_batches(self.train.len(), opts.batch_size);
        let valid_batches = num_batches(self.dev.len(), opts.batch_size);
        let test_batches  = num_batches(self.test.len(), opts.batch_size);

        let train = DataLoaderBuilder::new(SourceTargetBatcher::<B>::new(device.clone(), opts.rule))
            .batch_size(opts.batch_size)
            .shuffle(opts.seed)
            .num_workers(opts.num_workers)
            .build(self.train);

        let valid = DataLoaderBuilder::new(
            SourceTargetBatcher::<B::InnerBackend>::new(device.clone(), opts.rule),
        )
        .batch_size(opts.batch_size)
        .num_workers(opts.num_workers)
        .build(self.dev);

        let test = DataLoaderBuilder::new(
            SourceTargetBatcher::<B::InnerBackend>::new(device.clone(), opts.rule),
        )
        .batch_size(opts.batch_size)
        .num_workers(opts.num_workers)
        .build(self.test);

        Loaders { train, valid, test, train_batches, valid_batches, test_batches }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct InMemory(HashMap<(&'static str, &'static str), Vec<TextExample>>);

    impl ExampleSource for InMemory {
        fn load(&self, split: Split, side: Side) -> Result<Vec<TextExample>> {
            Ok(self.0.get(&(split.as_str(), side.as_str())).cloned().unwrap_or_default())
        }
    }

    fn source_with(train_target: Vec<TextExample>) -> InMemory {
        let mut m = HashMap::new();
        for split in ["train", "dev", "test"] {
            m.insert((split, "source"), vec![TextExample::single("good", 1)]);
            m.insert((split, "target"), vec![TextExample::pair("x y", "z", 0)]);
        }
        m.insert(("train", "target"), train_target);
        InMemory(m)
    }

    #[test]
    fn test_corpus_covers_both_domains_and_segments() {
        let raw = RawSplits::load(&source_with(vec![TextExample::pair("p", "h", 2)])).unwrap();
        assert_eq!(raw.train_corpus(), vec!["good", "p", "h"]);
    }

    #[test]
    fn test_empty_split_is_rejected() {
        let err = RawSplits::load(&source_with(Vec::new())).err().unwrap();
        assert!(err.to_string().contains("train split is empty"));
    }
}
