// ============================================================
// Layer 2 — Shared Experiment Setup
// ============================================================
// Every training use case starts the same way:
//
//   Step 1: Validate hyperparameters        (Layer 3 - domain)
//   Step 2: Resolve the pretrained model    (Layer 6 - infra)
//   Step 3: Create the run dir, dump hparams (Layer 6 - infra)
//   Step 4: Load the six CSV splits         (Layer 4 - data)
//   Step 5: Resolve the tokenizer           (Layer 6 - infra)
//   Step 6: Encode + build data loaders     (Layer 4 - data)
//
// The objective-specific part (model, optimiser, monitor) is
// left to each use case.

use anyhow::{bail, Result};
use burn::{
    backend::{wgpu::WgpuDevice, Autodiff, Wgpu},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::path::PathBuf;

use crate::data::{
    batcher::PaddingRule,
    encoding::ExampleEncoder,
    loader::CsvDataSource,
    module::{LoaderOptions, Loaders, RawSplits},
};
use crate::domain::hparams::Hyperparameters;
use crate::domain::traits::{ExperimentTracker, Metrics};
use crate::infra::{
    checkpoint::CheckpointManager,
    pretrained::PretrainedModel,
    run_dir::RunDir,
    tokenizer_store::TokenizerStore,
    tracker::LocalTracker,
};
use crate::ml::trainer::{FitConfig, Monitor, PlateauSchedule};

/// Training runs on Autodiff<Wgpu>; model.valid() and inference
/// run on the inner Wgpu backend.
pub type TrainBackend = Autodiff<Wgpu>;
pub type InferBackend = Wgpu;

const NUM_WORKERS: usize = 1;

/// `--gpu N` picks discrete adapter N, otherwise wgpu's default.
pub fn select_device(gpu: Option<usize>) -> WgpuDevice {
    let device = match gpu {
        Some(index) => WgpuDevice::DiscreteGpu(index),
        None => WgpuDevice::default(),
    };
    tracing::info!("Using WGPU device: {:?}", device);
    device
}

/// What a finished training run leaves behind.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_dir:      PathBuf,
    pub test_metrics: Metrics,
}

/// Everything a use case needs before building its model.
pub struct Experiment<B: AutodiffBackend> {
    pub run_dir:     RunDir,
    pub pretrained:  PretrainedModel,
    pub loaders:     Loaders<B>,
    pub tracker:     LocalTracker,
    pub checkpoints: CheckpointManager,
}

impl<B: AutodiffBackend> Experiment<B> {
    pub fn prepare(hp: &Hyperparameters, device: &B::Device) -> Result<Self> {

        // ── Step 1: Validate before touching the filesystem ───────────────────
        hp.validate()?;

        // ── Step 2: Pretrained model ──────────────────────────────────────────
        let pretrained = PretrainedModel::resolve(&hp.pretrained_model_name, &hp.models_dir)?;
        hp.check_positions(pretrained.config.max_position_embeddings)?;
        B::seed(hp.seed);

        // ── Step 3: Run directory + hyperparameter dump ───────────────────────
        let run_dir = RunDir::create(hp)?;
        run_dir.save_hparams(hp)?;
        let mut tracker = LocalTracker::create(run_dir.path())?;
        tracker.log_hparams(hp)?;

        // ── Step 4: Load CSV splits ───────────────────────────────────────────
        tracing::info!(
            "Loading {} data for '{}' from '{}'",
            hp.data_module.as_str(), hp.source_target, hp.dataset_cache_dir
        );
        let source = CsvDataSource::new(
            &hp.dataset_cache_dir, &hp.source_target, hp.data_module, hp.num_classes,
        );
        let raw = RawSplits::load(&source)?;

        // ── Step 5: Tokenizer ─────────────────────────────────────────────────
        let tokenizer = TokenizerStore::new(run_dir.path()).resolve(
            pretrained.tokenizer.as_deref(),
            &raw.train_corpus(),
            pretrained.config.vocab_size,
        )?;
        let tokenizer_vocab = tokenizer.get_vocab_size(true);
        if tokenizer_vocab > pretrained.config.vocab_size {
            bail!(
                "Tokenizer has {} entries but '{}' only embeds {}",
                tokenizer_vocab, pretrained.name, pretrained.config.vocab_size
            );
        }

        // ── Step 6: Encode and build loaders ──────────────────────────────────
        let encoder = ExampleEncoder::new(tokenizer, hp.max_seq_length);
        let rule = PaddingRule {
            padding:        hp.padding,
            max_seq_length: hp.max_seq_length,
            pad_id:         encoder.special_tokens().pad,
        };
        let opts = LoaderOptions {
            batch_size:  hp.bsz,
            seed:        hp.seed,
            num_workers: NUM_WORKERS,
            rule,
        };
        let loaders = raw.encode(&encoder)?.into_loaders::<B>(opts, device);
        tracing::info!(
            "Batches per epoch: {} train, {} dev, {} test",
            loaders.train_batches, loaders.valid_batches, loaders.test_batches
        );

        let checkpoints = CheckpointManager::new(run_dir.checkpoints_dir())?;

        Ok(Self { run_dir, pretrained, loaders, tracker, checkpoints })
    }

    pub fn summary(&self, test_metrics: Metrics) -> RunSummary {
        RunSummary { run_dir: self.run_dir.path().to_path_buf(), test_metrics }
    }
}

pub fn fit_config(
    hp:      &Hyperparameters,
    monitor: Monitor,
    plateau: Option<PlateauSchedule>,
) -> FitConfig {
    FitConfig {
        epochs:           hp.epochs,
        learning_rate:    hp.learning_rate,
        train_proportion: hp.train_proportion,
        dev_proportion:   hp.dev_proportion,
        test_proportion:  hp.test_proportion,
        log_freq:         hp.log_freq,
        num_classes:      hp.num_classes,
        monitor,
        plateau,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::hparams::tests::sample_hparams;
    use crate::domain::hparams::{DataModuleKind, ObjectiveParams, Padding};
    use crate::ml::encoder::tests::tiny_config;
    use burn::backend::NdArray;
    use std::{fs, path::Path};

    pub(crate) type TestBackend = Autodiff<NdArray>;

    const SENTENCES: [(&str, i64); 6] = [
        ("a fine film", 1),
        ("a dull film", 0),
        ("great acting", 1),
        ("weak plot", 0),
        ("fine plot and great acting", 1),
        ("dull and weak", 0),
    ];

    /// Writes a tiny SA dataset and a `tiny` model config under
    /// `root`, returning hyperparameters pointing at them.
    pub(crate) fn fixture(root: &Path, objective: ObjectiveParams) -> Hyperparameters {
        let data = root.join("data").join("books_dvd");
        fs::create_dir_all(&data).unwrap();
        for split in ["train", "dev", "test"] {
            for side in ["source", "target"] {
                let mut csv = String::from("sentence,label\n");
                for (text, label) in SENTENCES {
                    csv.push_str(&format!("{side} {text},{label}\n"));
                }
                fs::write(data.join(format!("{split}_{side}.csv")), csv).unwrap();
            }
        }

        let model_dir = root.join("models").join("tiny");
        fs::create_dir_all(&model_dir).unwrap();
        tiny_config().save(model_dir.join("config.json")).unwrap();

        let mut hp = sample_hparams(objective);
        hp.source_target         = "books_dvd".parse().unwrap();
        hp.dataset_cache_dir     = root.join("data").to_string_lossy().into_owned();
        hp.exp_dir               = root.join("experiments").to_string_lossy().into_owned();
        hp.models_dir            = root.join("models").to_string_lossy().into_owned();
        hp.pretrained_model_name = "tiny".to_string();
        hp.data_module           = DataModuleKind::Sa;
        hp.padding               = Padding::Longest;
        hp.num_classes           = 2;
        hp.max_seq_length        = 16;
        hp.bsz                   = 3;
        hp.epochs                = 1;
        hp
    }

    #[test]
    fn test_prepare_creates_run_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let hp = fixture(dir.path(), crate::domain::hparams::tests::dsn_params());

        let exp = Experiment::<TestBackend>::prepare(&hp, &Default::default()).unwrap();
        assert!(exp.run_dir.path().join("hparams.json").exists());
        assert!(exp.run_dir.path().join("tokenizer.json").exists());
        assert!(exp.run_dir.path().join("metrics.jsonl").exists());
        assert_eq!(exp.loaders.train_batches, 2);
    }

    #[test]
    fn test_invalid_hparams_create_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut hp = fixture(dir.path(), crate::domain::hparams::tests::dsn_params());
        hp.bsz = 0;
        assert!(Experiment::<TestBackend>::prepare(&hp, &Default::default()).is_err());
        assert!(!dir.path().join("experiments").exists());
    }

    #[test]
    fn test_sequence_longer_than_positions_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut hp = fixture(dir.path(), crate::domain::hparams::tests::dsn_params());
        hp.max_seq_length = 64;
        let err = Experiment::<TestBackend>::prepare(&hp, &Default::default()).err().unwrap();
        assert!(err.to_string().contains("positions"));
    }

    #[test]
    fn test_labels_beyond_num_classes_fail_before_training() {
        let dir = tempfile::tempdir().unwrap();
        let hp = fixture(dir.path(), crate::domain::hparams::tests::dsn_params());
        fs::write(
            dir.path().join("data/books_dvd/train_source.csv"),
            "sentence,label\nsource a fine film,1\nsource a dull film,2\n",
        )
        .unwrap();
        let err = Experiment::<TestBackend>::prepare(&hp, &Default::default()).err().unwrap();
        let msg = format!("{err:#}");
        assert!(msg.contains("Label 2 in row 2"), "{msg}");
        assert!(msg.contains("train_source.csv"), "{msg}");
    }
}
