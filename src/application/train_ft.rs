// ============================================================
// Layer 2 — TrainFineTuneUseCase
// ============================================================
// The no-adaptation baseline: fine-tune the whole encoder plus a
// classifier on labelled source data, then report source and
// target scores.
//
//   Step 1: Shared setup                          (experiment.rs)
//   Step 2: Encoder + classifier head             (Layer 5 - ml)
//   Step 3: AdamW with gradient-norm clipping
//   Step 4: Fit, keeping the lowest val/loss      (Layer 5 - ml)
//   Step 5: Export the best encoder → encoder.mpk.gz
//   Step 6: Test the best checkpoint

use anyhow::{bail, Result};
use burn::{
    grad_clipping::GradientClippingConfig, optim::AdamWConfig, tensor::backend::AutodiffBackend,
};

use crate::application::experiment::{
    fit_config, select_device, Experiment, RunSummary, TrainBackend,
};
use crate::domain::hparams::{Hyperparameters, ObjectiveParams};
use crate::infra::checkpoint::save_module;
use crate::ml::finetune::FineTuneConfig;
use crate::ml::scheduler::Mode;
use crate::ml::trainer::{fit, test, Monitor};

pub struct TrainFineTuneUseCase {
    hparams: Hyperparameters,
}

impl TrainFineTuneUseCase {
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
            ObjectiveParams::FineTune(p) => p,
            _ => bail!("train-ft needs fine-tuning hyperparameters"),
        };

        // ── Step 1: Shared setup ──────────────────────────────────────────────
        let mut exp = Experiment::<B>::prepare(hp, device)?;

        // ── Step 2: Model ─────────────────────────────────────────────────────
        let encoder = exp.pretrained.load_encoder::<B>(device)?;
        let model = FineTuneConfig::new(encoder.d_model, hp.num_classes).init(encoder, device);

        // ── Step 3: Optimiser ─────────────────────────────────────────────────
        let optim = AdamWConfig::new()
            .with_grad_clipping(Some(GradientClippingConfig::Norm(params.gradient_clip_norm)))
            .init();
        let cfg = fit_config(hp, Monitor::new("val/loss", Mode::Min), None);

        // ── Step 4: Fit ───────────────────────────────────────────────────────
        let model = fit(model, optim, &exp.loaders, &cfg, &mut exp.tracker, &exp.checkpoints)?;

        // ── Step 5: Export best encoder ───────────────────────────────────────
        let best = exp.checkpoints.load_best::<B, _>(model, device)?;
        save_module::<B, _>(&best.encoder, &exp.run_dir.encoder_path())?;
        tracing::info!("Saved encoder to '{}.mpk.gz'", exp.run_dir.encoder_path().display());

        // ── Step 6: Test ──────────────────────────────────────────────────────
        let metrics = test(best, &exp.loaders, &cfg, &mut exp.tracker, &exp.checkpoints, device)?;
        Ok(exp.summary(metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::experiment::tests::{fixture, TestBackend};
    use crate::domain::hparams::FineTuneParams;
    use crate::infra::checkpoint::record_exists;

    fn ft_params() -> ObjectiveParams {
        ObjectiveParams::FineTune(FineTuneParams { gradient_clip_norm: 5.0 })
    }

    #[test]
    fn test_ft_run_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let hp = fixture(dir.path(), ft_params());

        let summary = TrainFineTuneUseCase::new(hp)
            .execute_on::<TestBackend>(&Default::default())
            .unwrap();

        let accuracy = summary.test_metrics["test/accuracy"];
        assert!((0.0..=1.0).contains(&accuracy));
        assert!(summary.test_metrics.contains_key("target_test/f1"));
        assert!(summary.run_dir.starts_with(dir.path().join("experiments/sa_ft/books")));
        assert!(record_exists(&summary.run_dir.join("encoder")));
    }
}
