// ============================================================
// Layer 5 — Fit Loop
// ============================================================
// Train + validation + test loop shared by every objective.
//
//   for epoch in 1..=epochs:
//       train    ≤ limit_batches(n_train, train_proportion) batches
//                (NaN / inf loss aborts the run)
//       validate ≤ limit_batches(n_dev, dev_proportion) batches
//       monitor improved?  → overwrite the best checkpoint
//       plateau scheduler  → maybe lower the learning rate
//
//   test: reload best checkpoint, evaluate on the test split
//
// Burn notes:
//   - Training uses the autodiff backend for gradients
//   - model.valid() returns the model on the inner backend
//     (dropout disabled, no graph recorded)
//   - Validation/test loaders therefore yield inner-backend batches
//
// Reference: Burn Book §5 (Training)

use anyhow::{bail, Result};
use burn::{
    data::dataloader::DataLoader,
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::sync::Arc;

use crate::data::batcher::SourceTargetBatch;
use crate::data::module::Loaders;
use crate::data::sampling::limit_batches;
use crate::domain::traits::{ExperimentTracker, Metrics};
use crate::infra::checkpoint::{BestCheckpoint, CheckpointManager};
use crate::ml::scheduler::{Mode, PlateauConfig};
use crate::ml::step::{scalar, EvaluationStep, MetricAccumulator, Stage, TrainingStep};

/// Metric that decides which epoch is "best".
#[derive(Debug, Clone)]
pub struct Monitor {
    pub key:  String,
    pub mode: Mode,
}

impl Monitor {
    pub fn new(key: impl Into<String>, mode: Mode) -> Self {
        Self { key: key.into(), mode }
    }
}

/// Plateau scheduling driven by one metric key.
#[derive(Debug, Clone)]
pub struct PlateauSchedule {
    pub key:    String,
    pub config: PlateauConfig,
}

#[derive(Debug, Clone)]
pub struct FitConfig {
    pub epochs:           usize,
    pub learning_rate:    f64,
    pub train_proportion: f64,
    pub dev_proportion:   f64,
    pub test_proportion:  f64,
    pub log_freq:         usize,
    pub num_classes:      usize,
    pub monitor:          Monitor,
    pub plateau:          Option<PlateauSchedule>,
}

fn monitored(metrics: &Metrics, key: &str) -> Result<f64> {
    match metrics.get(key) {
        Some(v) => Ok(*v),
        None => bail!(
            "Monitored metric '{}' was not produced; available: {:?}",
            key,
            metrics.keys().collect::<Vec<_>>()
        ),
    }
}

fn summary_line(prefix: &str, metrics: &Metrics) -> String {
    let parts: Vec<String> = metrics.iter().map(|(k, v)| format!("{k}={v:.4}")).collect();
    format!("{prefix} | {}", parts.join(" | "))
}

/// Train `model` for `cfg.epochs` epochs and return the final model.
/// The best model (per `cfg.monitor`) is kept on disk by `checkpoints`.
pub fn fit<B, M, O>(
    mut model:   M,
    mut optim:   O,
    loaders:     &Loaders<B>,
    cfg:         &FitConfig,
    tracker:     &mut dyn ExperimentTracker,
    checkpoints: &CheckpointManager,
) -> Result<M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + TrainingStep<B>,
    M::InnerModule: EvaluationStep<B::InnerBackend>,
    O: Optimizer<M, B>,
{
    let train_limit = limit_batches(loaders.train_batches, cfg.train_proportion);
    let valid_limit = limit_batches(loaders.valid_batches, cfg.dev_proportion);
    tracing::info!(
        "Fitting for {} epochs: {}/{} train batches, {}/{} validation batches per epoch",
        cfg.epochs, train_limit, loaders.train_batches, valid_limit, loaders.valid_batches
    );

    let mut lr = cfg.learning_rate;
    let mut scheduler = cfg.plateau.as_ref().map(|p| p.config.init());
    let mut best = cfg.monitor.mode.worst();
    let mut global_step = 0usize;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_metrics = MetricAccumulator::new(cfg.num_classes);

        for batch in loaders.train.iter().take(train_limit) {
            let out = model.train_step(batch);

            let loss_val = scalar(&out.loss);
            if !loss_val.is_finite() {
                bail!("Loss became {loss_val} at epoch {epoch}, step {global_step}");
            }

            // Backward pass + optimiser update
            let grads = GradientsParams::from_grads(out.loss.backward(), &model);
            model = optim.step(lr, model, grads);
            global_step += 1;

            train_metrics.add_scalars(&out.metrics);
            if global_step % cfg.log_freq == 0 {
                let step_metrics: Metrics = out.metrics.into_iter().collect();
                tracker.log_step(global_step, &step_metrics)?;
            }
        }

        // ── Validation phase ──────────────────────────────────────────────────
        let mut metrics = train_metrics.finish();
        metrics.extend(evaluate(
            &model.valid(), &loaders.valid, valid_limit, Stage::Val, cfg.num_classes,
        ));
        metrics.insert("lr".to_string(), lr);

        // ── Best checkpoint ───────────────────────────────────────────────────
        let value = monitored(&metrics, &cfg.monitor.key)?;
        if cfg.monitor.mode.improves(value, best) {
            best = value;
            let info = BestCheckpoint { epoch, monitor: cfg.monitor.key.clone(), value };
            checkpoints.save_best::<B, M>(&model, &info)?;
            tracing::info!("New best {}={:.4} at epoch {}", cfg.monitor.key, value, epoch);
        }

        tracker.log_epoch(epoch, &metrics)?;
        println!("{}", summary_line(&format!("Epoch {:>3}/{}", epoch, cfg.epochs), &metrics));

        // ── Learning-rate schedule ────────────────────────────────────────────
        if let (Some(scheduler), Some(plateau)) = (scheduler.as_mut(), cfg.plateau.as_ref()) {
            lr = scheduler.step(monitored(&metrics, &plateau.key)?, lr);
        }
    }

    tracing::info!("Training complete after {} steps", global_step);
    Ok(model)
}

/// Evaluate on the test split, starting from the best checkpoint
/// when one was saved.
pub fn test<B, M>(
    model:       M,
    loaders:     &Loaders<B>,
    cfg:         &FitConfig,
    tracker:     &mut dyn ExperimentTracker,
    checkpoints: &CheckpointManager,
    device:      &B::Device,
) -> Result<Metrics>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    M::InnerModule: EvaluationStep<B::InnerBackend>,
{
    let model = match checkpoints.best_info()? {
        Some(info) => {
            tracing::info!("Testing best checkpoint from epoch {}", info.epoch);
            checkpoints.load_best::<B, M>(model, device)?
        }
        None => {
            tracing::warn!("No best checkpoint saved; testing the final model");
            model
        }
    };

    let limit = limit_batches(loaders.test_batches, cfg.test_proportion);
    let metrics = evaluate(&model.valid(), &loaders.test, limit, Stage::Test, cfg.num_classes);

    tracker.log_summary(&metrics)?;
    println!("{}", summary_line("Test", &metrics));
    Ok(metrics)
}

/// Run `model` over at most `limit` batches of `loader`.
pub fn evaluate<B, M>(
    model:       &M,
    loader:      &Arc<dyn DataLoader<SourceTargetBatch<B>>>,
    limit:       usize,
    stage:       Stage,
    num_classes: usize,
) -> Metrics
where
    B: Backend,
    M: EvaluationStep<B>,
{
    let mut acc = MetricAccumulator::new(num_classes);
    for batch in loader.iter().take(limit) {
        acc.add_eval(model.eval_step(batch, stage));
    }
    acc.finish()
}
