// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the four subcommands and all their flags:
//
//   train-adapter    - CMD domain adapter
//   train-dsn        - domain separation network
//   train-ft         - fine-tuning baseline
//   representations  - per-layer PCA / t-SNE plots of a trained adapter
//
// Flags shared by the three training commands live in
// `CommonArgs` and are flattened into each of them.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::representations::Reduction;
use crate::domain::hparams::{
    AdapterParams, DataModuleKind, DsnParams, FineTuneParams, Hyperparameters, ObjectiveParams,
    Padding,
};
use crate::domain::source_target::SourceTarget;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train domain adapters that minimise CMD between source and target
    TrainAdapter(TrainAdapterArgs),

    /// Train a domain separation network on an adapter-equipped encoder
    TrainDsn(TrainDsnArgs),

    /// Fine-tune the whole encoder on labelled source data
    TrainFt(TrainFtArgs),

    /// Project each layer's [CLS] vectors of a trained adapter to 2-D
    Representations(RepresentationsArgs),
}

/// Flags every training command accepts.
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Domain pair, e.g. "slate_travel"
    #[arg(long)]
    pub source_target: SourceTarget,

    /// Directory holding one `<source>_<target>/` folder of CSV splits per pair
    #[arg(long, default_value = "data")]
    pub dataset_cache_dir: String,

    /// Runs are written below this directory
    #[arg(long, default_value = "experiments")]
    pub exp_dir: String,

    #[arg(long, value_enum, default_value_t = DataModuleKind::Mnli)]
    pub data_module: DataModuleKind,

    #[arg(long, default_value = "bert-base-uncased")]
    pub pretrained_model_name: String,

    /// Where `<name>/config.json`, `model.mpk.gz` and `tokenizer.json` are looked up
    #[arg(long, default_value = "models")]
    pub models_dir: String,

    #[arg(long, default_value_t = 128)]
    pub max_seq_length: usize,

    #[arg(long, value_enum, default_value_t = Padding::MaxLength)]
    pub padding: Padding,

    #[arg(long, default_value_t = 3)]
    pub num_classes: usize,

    #[arg(long, default_value_t = 32)]
    pub bsz: usize,

    /// Fraction of train batches used per epoch
    #[arg(long, default_value_t = 1.0)]
    pub train_proportion: f64,

    /// Fraction of dev batches used per validation
    #[arg(long, default_value_t = 1.0)]
    pub dev_proportion: f64,

    /// Fraction of test batches used in the final test
    #[arg(long, default_value_t = 1.0)]
    pub test_proportion: f64,

    #[arg(long, default_value_t = 1729)]
    pub seed: u64,

    #[arg(long = "lr", default_value_t = 1e-4)]
    pub learning_rate: f64,

    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    /// Discrete GPU index; the default wgpu device if omitted
    #[arg(long)]
    pub gpu: Option<usize>,

    /// Log step metrics every N optimiser steps
    #[arg(long, default_value_t = 20)]
    pub log_freq: usize,
}

impl CommonArgs {
    fn into_hparams(self, objective: ObjectiveParams) -> Hyperparameters {
        Hyperparameters {
            bsz:                   self.bsz,
            train_proportion:      self.train_proportion,
            dev_proportion:        self.dev_proportion,
            test_proportion:       self.test_proportion,
            source_target:         self.source_target,
            num_classes:           self.num_classes,
            dataset_cache_dir:     self.dataset_cache_dir,
            exp_dir:               self.exp_dir,
            seed:                  self.seed,
            learning_rate:         self.learning_rate,
            epochs:                self.epochs,
            gpu:                   self.gpu,
            pretrained_model_name: self.pretrained_model_name,
            models_dir:            self.models_dir,
            max_seq_length:        self.max_seq_length,
            padding:               self.padding,
            data_module:           self.data_module,
            log_freq:              self.log_freq,
            objective,
        }
    }
}

// ─── train-adapter ────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct TrainAdapterArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Name the adapter is saved under
    #[arg(long, default_value = "domain_adapter")]
    pub domain_adapter_name: String,

    /// Bottleneck size is d_model / reduction_factor
    #[arg(long, default_value_t = 32)]
    pub reduction_factor: usize,

    /// Highest central moment matched by CMD
    #[arg(long, default_value_t = 5)]
    pub n_moments: usize,

    #[arg(long, default_value_t = 0.9)]
    pub beta1: f32,

    #[arg(long, default_value_t = 0.999)]
    pub beta2: f32,

    /// AdamW epsilon
    #[arg(long, default_value_t = 1e-8)]
    pub eps: f32,

    #[arg(long, default_value_t = 0.0)]
    pub weight_decay: f32,

    /// LR is multiplied by this on a plateau
    #[arg(long, default_value_t = 0.1)]
    pub scheduler_factor: f64,

    #[arg(long, default_value_t = 2)]
    pub scheduler_patience: usize,

    #[arg(long, default_value_t = 1e-4)]
    pub scheduler_threshold: f64,

    #[arg(long, default_value_t = 0)]
    pub scheduler_cooldown: usize,

    /// LR changes smaller than this are ignored
    #[arg(long, default_value_t = 1e-8)]
    pub scheduler_eps: f64,
}

impl From<TrainAdapterArgs> for Hyperparameters {
    fn from(a: TrainAdapterArgs) -> Self {
        a.common.into_hparams(ObjectiveParams::DomainAdapter(AdapterParams {
            domain_adapter_name: a.domain_adapter_name,
            reduction_factor:    a.reduction_factor,
            n_moments:           a.n_moments,
            betas:               (a.beta1, a.beta2),
            eps:                 a.eps,
            weight_decay:        a.weight_decay,
            scheduler_factor:    a.scheduler_factor,
            scheduler_patience:  a.scheduler_patience,
            scheduler_threshold: a.scheduler_threshold,
            scheduler_cooldown:  a.scheduler_cooldown,
            scheduler_eps:       a.scheduler_eps,
        }))
    }
}

// ─── train-dsn ────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct TrainDsnArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Width of the shared and private encoders
    #[arg(long, default_value_t = 512)]
    pub hidden_size: usize,

    /// Used only when no --domain-adapter run is given
    #[arg(long, default_value_t = 32)]
    pub reduction_factor: usize,

    #[arg(long, default_value_t = 5)]
    pub n_moments: usize,

    #[arg(long, default_value_t = 0.3)]
    pub diff_weight: f64,

    #[arg(long, default_value_t = 1.0)]
    pub sim_weight: f64,

    #[arg(long, default_value_t = 1.0)]
    pub recon_weight: f64,

    /// Run directory of a train-adapter run whose adapters to start from
    #[arg(long)]
    pub domain_adapter: Option<PathBuf>,
}

impl From<TrainDsnArgs> for Hyperparameters {
    fn from(a: TrainDsnArgs) -> Self {
        a.common.into_hparams(ObjectiveParams::Dsn(DsnParams {
            hidden_size:      a.hidden_size,
            reduction_factor: a.reduction_factor,
            n_moments:        a.n_moments,
            diff_weight:      a.diff_weight,
            sim_weight:       a.sim_weight,
            recon_weight:     a.recon_weight,
        }))
    }
}

// ─── train-ft ─────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct TrainFtArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Gradients are rescaled to at most this L2 norm
    #[arg(long, default_value_t = 5.0)]
    pub gradient_clip_norm: f32,
}

impl From<TrainFtArgs> for Hyperparameters {
    fn from(a: TrainFtArgs) -> Self {
        a.common.into_hparams(ObjectiveParams::FineTune(FineTuneParams {
            gradient_clip_norm: a.gradient_clip_norm,
        }))
    }
}

// ─── representations ──────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct RepresentationsArgs {
    /// Run directory of a finished train-adapter run
    #[arg(long)]
    pub run_dir: PathBuf,

    /// Source-domain CSV, e.g. data/slate_travel/test_source.csv
    #[arg(long)]
    pub source: PathBuf,

    /// Target-domain CSV
    #[arg(long)]
    pub target: PathBuf,

    #[arg(long, default_value = "plots")]
    pub output_dir: PathBuf,

    /// pca or tsne
    #[arg(long, value_enum, default_value_t = Reduction::Pca)]
    pub reduction: Reduction,

    #[arg(long, default_value_t = 32)]
    pub bsz: usize,

    #[arg(long)]
    pub gpu: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_adapter_flags_become_hparams() {
        let cli = Cli::try_parse_from([
            "domadapter", "train-adapter",
            "--source-target", "slate_travel",
            "--lr", "0.001",
            "--padding", "longest",
            "--beta2", "0.99",
        ])
        .unwrap();

        let Commands::TrainAdapter(args) = cli.command else { panic!("wrong subcommand") };
        let hp: Hyperparameters = args.into();
        assert_eq!(hp.source_target, SourceTarget::new("slate", "travel"));
        assert_eq!(hp.learning_rate, 0.001);
        assert_eq!(hp.padding, Padding::Longest);
        match &hp.objective {
            ObjectiveParams::DomainAdapter(p) => assert_eq!(p.betas, (0.9, 0.99)),
            other => panic!("unexpected objective {other:?}"),
        }
        assert!(hp.validate().is_ok());
    }

    #[test]
    fn test_bad_source_target_is_a_parse_error() {
        let result = Cli::try_parse_from(["domadapter", "train-ft", "--source-target", "a_b_c"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_dsn_accepts_adapter_run() {
        let cli = Cli::try_parse_from([
            "domadapter", "train-dsn",
            "--source-target", "books_dvd",
            "--data-module", "sa",
            "--domain-adapter", "experiments/books_dvd/domain_adapter/abc12345",
        ])
        .unwrap();
        let Commands::TrainDsn(args) = cli.command else { panic!("wrong subcommand") };
        assert!(args.domain_adapter.is_some());
        assert_eq!(args.common.data_module, DataModuleKind::Sa);
    }
}
