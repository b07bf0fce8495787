// ============================================================
// Layer 2 — TrainDsnUseCase
// ============================================================
// Trains a domain separation network on an adapter-equipped
// encoder:
//
//   Step 1: Shared setup                               (experiment.rs)
//   Step 2: Encoder + adapters (fresh, or from a domain
//           adapter run via --domain-adapter)          (Layer 6 - infra)
//   Step 3: DSN heads on top of the frozen encoder     (Layer 5 - ml)
//   Step 4: Fit, keeping the best source_val/f1        (Layer 5 - ml)
//   Step 5: Test the best checkpoint

use anyhow::{bail, Result};
use burn::{optim::AdamConfig, tensor::backend::AutodiffBackend};
use std::path::{Path, PathBuf};

use crate::application::experiment::{
    fit_config, select_device, Experiment, RunSummary, TrainBackend,
};
use crate::domain::hparams::{DsnParams, Hyperparameters, ObjectiveParams};
use crate::infra::checkpoint::{load_module, record_exists};
use crate::infra::run_dir::RunDir;
use crate::ml::dsn::DsnConfig;
use crate::ml::encoder::TransformerEncoder;
use crate::ml::scheduler::Mode;
use crate::ml::trainer::{fit, test, Monitor};

pub struct TrainDsnUseCase {
    hparams:        Hyperparameters,
    /// Run directory of a finished train-adapter run
    domain_adapter: Option<PathBuf>,
}

impl TrainDsnUseCase {
    pub fn new(hparams: Hyperparameters, domain_adapter: Option<PathBuf>) -> Self {
        Self { hparams, domain_adapter }
    }

    pub fn execute(&self) -> Result<RunSummary> {
        let device = select_device(self.hparams.gpu);
        self.execute_on::<TrainBackend>(&device)
    }

    pub fn execute_on<B: AutodiffBackend>(&self, device: &B::Device) -> Result<RunSummary> {
        let hp = &self.hparams;
        let params = match &hp.objective {
            ObjectiveParams::Dsn(p) => p,
            _ => bail!("train-dsn needs DSN hyperparameters"),
        };

        // ── Step 1: Shared setup ──────────────────────────────────────────────
        let mut exp = Experiment::<B>::prepare(hp, device)?;

        // ── Step 2: Encoder + adapters ────────────────────────────────────────
        let encoder = exp.pretrained.load_encoder::<B>(device)?;
        let encoder = match &self.domain_adapter {
            Some(run) => load_trained_adapters(encoder, run, hp, device)?,
            None => encoder.with_new_adapters(params.reduction_factor, device),
        };

        // ── Step 3: DSN heads ─────────────────────────────────────────────────
        let d_model = encoder.d_model;
        let model = dsn_config(d_model, hp.num_classes, params).init(encoder.freeze_base(), device);
        tracing::info!(
            "DSN: hidden {}, weights sim={} diff={} recon={}",
            params.hidden_size, params.sim_weight, params.diff_weight, params.recon_weight
        );

        // ── Step 4: Fit ───────────────────────────────────────────────────────
        let optim = AdamConfig::new().init();
        let cfg = fit_config(hp, Monitor::new("source_val/f1", Mode::Max), None);
        let model = fit(model, optim, &exp.loaders, &cfg, &mut exp.tracker, &exp.checkpoints)?;

        // ── Step 5: Test ──────────────────────────────────────────────────────
        let metrics = test(model, &exp.loaders, &cfg, &mut exp.tracker, &exp.checkpoints, device)?;
        Ok(exp.summary(metrics))
    }
}

fn dsn_config(d_model: usize, num_classes: usize, p: &DsnParams) -> DsnConfig {
    DsnConfig::new(d_model, p.hidden_size, num_classes)
        .with_n_moments(p.n_moments)
        .with_diff_weight(p.diff_weight)
        .with_sim_weight(p.sim_weight)
        .with_recon_weight(p.recon_weight)
}

/// Installs the adapters exported by a domain adapter run. The run
/// must have used the same pretrained model; its reduction factor
/// decides the adapter shapes.
fn load_trained_adapters<B: AutodiffBackend>(
    encoder: TransformerEncoder<B>,
    run:     &Path,
    hp:      &Hyperparameters,
    device:  &B::Device,
) -> Result<TransformerEncoder<B>> {
    let run = RunDir::open(run)?;
    let adapter_hp = run.load_hparams()?;

    let reduction_factor = match &adapter_hp.objective {
        ObjectiveParams::DomainAdapter(p) => p.reduction_factor,
        _ => bail!("'{}' is not a domain adapter run", run.path().display()),
    };
    if adapter_hp.pretrained_model_name != hp.pretrained_model_name {
        bail!(
            "Adapter run used '{}' but this run uses '{}'",
            adapter_hp.pretrained_model_name,
            hp.pretrained_model_name
        );
    }
    let path = run.adapter_path();
    if !record_exists(&path) {
        bail!("No adapter record at '{}.mpk.gz'", path.display());
    }

    let encoder = encoder.with_new_adapters(reduction_factor, device);
    let adapters = load_module::<B, _>(encoder.adapters(), &path, device)?;
    tracing::info!(
        "Loaded {} adapters from '{}' (reduction factor {})",
        adapters.len(),
        run.path().display(),
        reduction_factor
    );
    Ok(encoder.with_adapters(adapters))
}
