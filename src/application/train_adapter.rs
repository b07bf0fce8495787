// ============================================================
// Layer 2 — TrainAdapterUseCase
// ============================================================
// Trains domain adapters with the layer-wise CMD objective:
//
//   Step 1: Shared setup (run dir, data, tokenizer)   (experiment.rs)
//   Step 2: Frozen encoder + fresh adapters           (Layer 5 - ml)
//   Step 3: AdamW + plateau schedule on train/divergence
//   Step 4: Fit, keeping the lowest val/divergence    (Layer 5 - ml)
//   Step 5: Export the best adapters → adapter.mpk.gz (Layer 6 - infra)
//   Step 6: Test the best checkpoint
//
// The exported adapters can initialise a DSN run (train-dsn
// --domain-adapter <run dir>).

use anyhow::{bail, Result};
use burn::{optim::AdamWConfig, tensor::backend::AutodiffBackend};

use crate::application::experiment::{
    fit_config, select_device, Experiment, RunSummary, TrainBackend,
};
use crate::domain::hparams::{AdapterParams, Hyperparameters, ObjectiveParams};
use crate::infra::checkpoint::save_module;
use crate::ml::domain_adapter::DomainAdapterModel;
use crate::ml::scheduler::{Mode, PlateauConfig};
use crate::ml::trainer::{fit, test, Monitor, PlateauSchedule};

pub struct TrainAdapterUseCase {
    hparams: Hyperparameters,
}

impl TrainAdapterUseCase {
    pub fn new(hparams: Hyperparameters) -> Self {
        Self { hparams }
    }

    pub fn execute(&self) -> Result<RunSummary> {
        let device = select_device(self.hparams.gpu);
        self.execute_on::<TrainBackend>(&device)
    }

    pub fn execute_on<B: AutodiffBackend>(&self, device: &B::Device) -> Result<RunSummary> {
        let hp = &self.hparams;
        let params = match &hp.objective {
            ObjectiveParams::DomainAdapter(p) => p,
            _ => bail!("train-adapter needs domain adapter hyperparameters"),
        };

        // ── Step 1: Shared setup ──────────────────────────────────────────────
        let mut exp = Experiment::<B>::prepare(hp, device)?;

        // ── Step 2: Model ─────────────────────────────────────────────────────
        let encoder = exp.pretrained.load_encoder::<B>(device)?;
        let model = DomainAdapterModel::new(encoder, params.reduction_factor, params.n_moments, device);
        tracing::info!(
            "Adapter '{}': {} blocks, reduction factor {}",
            params.domain_adapter_name,
            model.encoder.num_layers(),
            params.reduction_factor
        );

        // ── Step 3: Optimiser + schedule ──────────────────────────────────────
        let optim = AdamWConfig::new()
            .with_beta_1(params.betas.0)
            .with_beta_2(params.betas.1)
            .with_epsilon(params.eps)
            .with_weight_decay(params.weight_decay)
            .init();
        let cfg = fit_config(
            hp,
            Monitor::new("val/divergence", Mode::Min),
            Some(plateau_schedule(params)),
        );

        // ── Step 4: Fit ───────────────────────────────────────────────────────
        let model = fit(model, optim, &exp.loaders, &cfg, &mut exp.tracker, &exp.checkpoints)?;

        // ── Step 5: Export best adapters ──────────────────────────────────────
        let best = exp.checkpoints.load_best::<B, _>(model, device)?;
        save_module::<B, _>(&best.adapters(), &exp.run_dir.adapter_path())?;
        tracing::info!(
            "Saved adapter '{}' to '{}.mpk.gz'",
            params.domain_adapter_name,
            exp.run_dir.adapter_path().display()
        );

        // ── Step 6: Test ──────────────────────────────────────────────────────
        let metrics = test(best, &exp.loaders, &cfg, &mut exp.tracker, &exp.checkpoints, device)?;
        Ok(exp.summary(metrics))
    }
}

fn plateau_schedule(p: &AdapterParams) -> PlateauSchedule {
    PlateauSchedule {
        key: "train/divergence".to_string(),
        config: PlateauConfig {
            mode:      Mode::Min,
            factor:    p.scheduler_factor,
            patience:  p.scheduler_patience,
            threshold: p.scheduler_threshold,
            cooldown:  p.scheduler_cooldown,
            min_lr:    0.0,
            eps:       p.scheduler_eps,
        },
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::application::experiment::tests::{fixture, TestBackend};
    use crate::infra::checkpoint::record_exists;

    pub(crate) fn adapter_params() -> ObjectiveParams {
        ObjectiveParams::DomainAdapter(AdapterParams {
            domain_adapter_name: "dvd".to_string(),
            reduction_factor:    4,
            n_moments:           5,
            betas:               (0.9, 0.99),
            eps:                 1e-8,
            weight_decay:        0.0,
            scheduler_factor:    0.1,
            scheduler_patience:  2,
            scheduler_threshold: 1e-4,
            scheduler_cooldown:  0,
            scheduler_eps:       1e-8,
        })
    }

    #[test]
    fn test_adapter_run_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let hp = fixture(dir.path(), adapter_params());

        let summary = TrainAdapterUseCase::new(hp).execute_on::<TestBackend>(&Default::default()).unwrap();

        assert!(summary.test_metrics["test/divergence"].is_finite());
        assert!(summary.run_dir.starts_with(dir.path().join("experiments/books_dvd/domain_adapter")));
        assert!(record_exists(&summary.run_dir.join("adapter")));
        assert!(record_exists(&summary.run_dir.join("checkpoints/best")));
        assert!(summary.run_dir.join("epochs.csv").exists());
    }

    #[test]
    fn test_wrong_objective_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let hp = fixture(dir.path(), crate::domain::hparams::tests::dsn_params());
        assert!(TrainAdapterUseCase::new(hp).execute_on::<TestBackend>(&Default::default()).is_err());
    }
}
