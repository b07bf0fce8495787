// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer talks to data sources and metric sinks
// only through these traits:
//   - CsvDataSource  implements ExampleSource
//   - LocalTracker   implements ExperimentTracker
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use std::collections::BTreeMap;

use crate::domain::example::{Side, Split, TextExample};
use crate::domain::hparams::Hyperparameters;

/// Scalar metrics keyed `stage/name`, e.g. `train/loss`, `source_val/f1`.
/// A BTreeMap keeps keys sorted so logs and CSV columns are stable.
pub type Metrics = BTreeMap<String, f64>;

// ─── ExampleSource ────────────────────────────────────────────────────────────
/// Anything that can produce the labelled examples of one split
/// of one domain.
pub trait ExampleSource {
    fn load(&self, split: Split, side: Side) -> Result<Vec<TextExample>>;
}

// ─── ExperimentTracker ────────────────────────────────────────────────────────
/// Receives hyperparameters once and metrics as training runs.
pub trait ExperimentTracker {
    /// Record the run configuration.
    fn log_hparams(&mut self, hparams: &Hyperparameters) -> Result<()>;

    /// Record metrics produced at a global optimisation step.
    fn log_step(&mut self, step: usize, metrics: &Metrics) -> Result<()>;

    /// Record the aggregated metrics of a finished epoch.
    fn log_epoch(&mut self, epoch: usize, metrics: &Metrics) -> Result<()>;

    /// Record the final test metrics of the run.
    fn log_summary(&mut self, metrics: &Metrics) -> Result<()>;
}
