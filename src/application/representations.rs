// ============================================================
// Layer 2 — RepresentationsUseCase
// ============================================================
// Visualises what a trained domain adapter does to the encoder:
//
//   Step 1: Reload hparams, tokenizer, adapter record   (Layer 6 - infra)
//   Step 2: Read + encode the source and target CSVs    (Layer 4 - data)
//   Step 3: [CLS] features of every block               (Layer 5 - ml)
//   Step 4: PCA or t-SNE to 2-D, one layer_{i}.csv each (Layer 5 - ml)
//
// Well-aligned domains show up as overlapping point clouds in the
// later layers.

use anyhow::{bail, Context, Result};
use burn::{data::dataloader::batcher::Batcher, prelude::*};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::experiment::{select_device, InferBackend};
use crate::data::{
    batcher::{PaddingRule, TextBatcher},
    encoding::{EncodedText, ExampleEncoder},
    loader::read_examples,
};
use crate::domain::hparams::{Hyperparameters, ObjectiveParams};
use crate::domain::source_target::SourceTarget;
use crate::infra::{
    checkpoint::{load_module, record_exists},
    pretrained::PretrainedModel,
    run_dir::RunDir,
    tokenizer_store::TokenizerStore,
};
use crate::ml::encoder::TransformerEncoder;
use crate::ml::representations::{embed_layer, layer_features, project_layer, write_layer_csv};

/// Dimensionality reduction applied to each layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Reduction {
    #[default]
    Pca,
    Tsne,
}

pub struct RepresentationsUseCase {
    pub run_dir:    PathBuf,
    pub source:     PathBuf,
    pub target:     PathBuf,
    pub output_dir: PathBuf,
    pub reduction:  Reduction,
    pub bsz:        usize,
}

impl RepresentationsUseCase {
    /// Returns the written CSV paths, one per block.
    pub fn execute(&self, gpu: Option<usize>) -> Result<Vec<PathBuf>> {
        let device = select_device(gpu);
        self.execute_on::<InferBackend>(&device)
    }

    pub fn execute_on<B: Backend>(&self, device: &B::Device) -> Result<Vec<PathBuf>> {
        if self.bsz == 0 {
            bail!("bsz must be at least 1");
        }

        // ── Step 1: Reload the run ────────────────────────────────────────────
        let run = RunDir::open(&self.run_dir)?;
        let hp = run.load_hparams()?;
        let encoder_model = load_adapter_encoder::<B>(&run, &hp, device)?;
        let tokenizer = TokenizerStore::new(run.path()).load()?;
        let encoder = ExampleEncoder::new(tokenizer, hp.max_seq_length);
        let batcher = TextBatcher::<B>::new(
            device.clone(),
            PaddingRule {
                padding:        hp.padding,
                max_seq_length: hp.max_seq_length,
                pad_id:         encoder.special_tokens().pad,
            },
        );

        // ── Step 2: Encode both domains ───────────────────────────────────────
        let source = encoder.encode_all(&read_examples(&self.source, hp.data_module, hp.num_classes)?)?;
        let target = encoder.encode_all(&read_examples(&self.target, hp.data_module, hp.num_classes)?)?;
        if source.is_empty() || target.is_empty() {
            bail!("Both the source and the target CSV need at least one row");
        }
        let names = self.domain_names(&hp);
        tracing::info!(
            "Extracting representations: {} {} vs {} {} examples",
            source.len(), names.source, target.len(), names.target
        );

        // ── Step 3: Per-layer [CLS] features ──────────────────────────────────
        let batches = |items: &[EncodedText]| -> Vec<_> {
            items.chunks(self.bsz).map(|chunk| batcher.batch(chunk.to_vec())).collect()
        };
        let source_layers = layer_features(&encoder_model, batches(&source));
        let target_layers = layer_features(&encoder_model, batches(&target));

        let mut labels = vec![names.source.clone(); source.len()];
        labels.extend(vec![names.target.clone(); target.len()]);

        // ── Step 4: Project and write ─────────────────────────────────────────
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Cannot create '{}'", self.output_dir.display()))?;

        let mut written = Vec::new();
        for (i, (s, t)) in source_layers.into_iter().zip(target_layers).enumerate() {
            let features = Tensor::cat(vec![s, t], 0);
            let points = match self.reduction {
                Reduction::Pca => project_layer(features, &labels),
                Reduction::Tsne => embed_layer(features, &labels)
                    .with_context(|| format!("t-SNE failed on layer {}", i + 1))?,
            };
            let path = write_layer_csv(&self.output_dir, i + 1, &points)?;
            tracing::debug!("Wrote {}", path.display());
            written.push(path);
        }
        tracing::info!("Wrote {} layer plots to '{}'", written.len(), self.output_dir.display());
        Ok(written)
    }

    /// Domain names from the directory holding the source CSV
    /// (`.../<source>_<target>/test_source.csv`), else from the run.
    fn domain_names(&self, hp: &Hyperparameters) -> SourceTarget {
        self.source
            .parent()
            .and_then(Path::file_name)
            .and_then(|name| name.to_str())
            .and_then(|name| name.parse().ok())
            .unwrap_or_else(|| hp.source_target.clone())
    }
}

/// Pretrained encoder with the adapters exported by the run
/// (`adapter.mpk.gz`) installed.
fn load_adapter_encoder<B: Backend>(
    run:    &RunDir,
    hp:     &Hyperparameters,
    device: &B::Device,
) -> Result<TransformerEncoder<B>> {
    let reduction_factor = match &hp.objective {
        ObjectiveParams::DomainAdapter(p) => p.reduction_factor,
        _ => bail!("'{}' is not a domain adapter run", run.path().display()),
    };
    let path = run.adapter_path();
    if !record_exists(&path) {
        bail!("No adapter record at '{}.mpk.gz'", path.display());
    }

    let pretrained = PretrainedModel::resolve(&hp.pretrained_model_name, &hp.models_dir)?;
    // without pretrained weights, the base is re-drawn from the run's seed
    B::seed(hp.seed);
    let encoder = pretrained
        .load_encoder::<B>(device)?
        .with_new_adapters(reduction_factor, device);
    let adapters = load_module::<B, _>(encoder.adapters(), &path, device)?;
    tracing::info!("Loaded {} adapters from '{}'", adapters.len(), run.path().display());
    Ok(encoder.with_adapters(adapters))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::experiment::tests::{fixture, TestBackend};
    use crate::application::train_adapter::{tests::adapter_params, TrainAdapterUseCase};
    use crate::domain::hparams::tests::dsn_params;
    use burn::backend::NdArray;

    fn use_case(run_dir: PathBuf, data: &Path, output_dir: PathBuf) -> RepresentationsUseCase {
        RepresentationsUseCase {
            run_dir,
            source: data.join("test_source.csv"),
            target: data.join("test_target.csv"),
            output_dir,
            reduction: Reduction::Pca,
            bsz: 4,
        }
    }

    fn trained_adapter_run(root: &Path) -> PathBuf {
        TrainAdapterUseCase::new(fixture(root, adapter_params()))
            .execute_on::<TestBackend>(&Default::default())
            .unwrap()
            .run_dir
    }

    #[test]
    fn test_writes_one_csv_per_block() {
        let dir = tempfile::tempdir().unwrap();
        let run_dir = trained_adapter_run(dir.path());

        let out = dir.path().join("plots");
        let data = dir.path().join("data/books_dvd");
        let written = use_case(run_dir, &data, out.clone())
            .execute_on::<NdArray>(&Default::default())
            .unwrap();

        assert_eq!(written, vec![out.join("layer_1.csv"), out.join("layer_2.csv")]);
        let content = fs::read_to_string(&written[1]).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "x,y,label");
        assert_eq!(lines.len(), 1 + 6 + 6);
        assert!(lines[1].ends_with(",books"));
        assert!(lines[12].ends_with(",dvd"));
    }

    #[test]
    fn test_rejects_non_adapter_runs() {
        let dir = tempfile::tempdir().unwrap();
        let hp = fixture(dir.path(), dsn_params());
        let run = RunDir::create(&hp).unwrap();
        run.save_hparams(&hp).unwrap();

        let data = dir.path().join("data/books_dvd");
        let err = use_case(run.path().to_path_buf(), &data, dir.path().join("plots"))
            .execute_on::<NdArray>(&Default::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("not a domain adapter run"));
    }

    #[test]
    fn test_reads_the_exported_adapter_record() {
        let dir = tempfile::tempdir().unwrap();
        let run_dir = trained_adapter_run(dir.path());
        let data = dir.path().join("data/books_dvd");

        // checkpoints are not needed once the adapters are exported
        fs::remove_dir_all(run_dir.join("checkpoints")).unwrap();
        let written = use_case(run_dir.clone(), &data, dir.path().join("plots"))
            .execute_on::<NdArray>(&Default::default())
            .unwrap();
        assert_eq!(written.len(), 2);

        fs::remove_file(run_dir.join("adapter.mpk.gz")).unwrap();
        let err = use_case(run_dir, &data, dir.path().join("plots2"))
            .execute_on::<NdArray>(&Default::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("No adapter record"));
    }

    #[test]
    fn test_tsne_writes_every_point() {
        let dir = tempfile::tempdir().unwrap();
        let run_dir = trained_adapter_run(dir.path());
        let data = dir.path().join("data/books_dvd");

        let mut tsne = use_case(run_dir, &data, dir.path().join("tsne"));
        tsne.reduction = Reduction::Tsne;
        let written = tsne.execute_on::<NdArray>(&Default::default()).unwrap();

        assert_eq!(written.len(), 2);
        let content = fs::read_to_string(&written[0]).unwrap();
        assert_eq!(content.lines().count(), 1 + 6 + 6);
        assert_eq!(content.lines().filter(|l| l.ends_with(",dvd")).count(), 6);
    }
}
