// ============================================================
// Layer 5 — Training / Evaluation Step Contracts
// ============================================================
// Every objective (domain adapter, DSN, fine-tuning) plugs into
// the same fit loop through two traits:
//
//   TrainingStep<B: AutodiffBackend>
//       batch → scalar loss + named training metrics
//
//   EvaluationStep<B: Backend>
//       batch → named scalars + class predictions
//
// The fit loop averages scalars over batches and turns the
// collected predictions into accuracy / macro-F1 at the end of
// the pass (see MetricAccumulator).

use burn::{prelude::*, tensor::backend::AutodiffBackend};
use std::collections::BTreeMap;

use crate::data::batcher::SourceTargetBatch;
use crate::domain::traits::Metrics;
use crate::ml::scoring::{accuracy, macro_f1};

/// Which held-out pass is running; used as the metric key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Val,
    Test,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Val  => "val",
            Stage::Test => "test",
        }
    }
}

pub struct TrainOutput<B: Backend> {
    /// Scalar that gets back-propagated
    pub loss:    Tensor<B, 1>,
    /// Already-prefixed metrics, e.g. ("train/divergence", 0.42)
    pub metrics: Vec<(String, f64)>,
}

/// Predicted and gold labels of one batch, reported under `prefix`
/// (e.g. "source_val" → "source_val/accuracy", "source_val/f1").
pub struct Predictions {
    pub prefix:    String,
    pub predicted: Vec<i64>,
    pub labels:    Vec<i64>,
}

#[derive(Default)]
pub struct EvalOutput {
    pub scalars:     Vec<(String, f64)>,
    pub predictions: Vec<Predictions>,
}

pub trait TrainingStep<B: AutodiffBackend> {
    fn train_step(&self, batch: SourceTargetBatch<B>) -> TrainOutput<B>;
}

pub trait EvaluationStep<B: Backend> {
    fn eval_step(&self, batch: SourceTargetBatch<B>, stage: Stage) -> EvalOutput;
}

// ─── MetricAccumulator ────────────────────────────────────────────────────────
/// Collects per-batch outputs and reduces them to epoch metrics.
pub struct MetricAccumulator {
    num_classes: usize,
    sums:        BTreeMap<String, (f64, usize)>,
    predictions: BTreeMap<String, (Vec<i64>, Vec<i64>)>,
}

impl MetricAccumulator {
    pub fn new(num_classes: usize) -> Self {
        Self { num_classes, sums: BTreeMap::new(), predictions: BTreeMap::new() }
    }

    pub fn add_scalar(&mut self, key: &str, value: f64) {
        let entry = self.sums.entry(key.to_string()).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }

    pub fn add_scalars(&mut self, scalars: &[(String, f64)]) {
        for (key, value) in scalars {
            self.add_scalar(key, *value);
        }
    }

    pub fn add_predictions(&mut self, p: Predictions) {
        let entry = self.predictions.entry(p.prefix).or_default();
        entry.0.extend(p.predicted);
        entry.1.extend(p.labels);
    }

    pub fn add_eval(&mut self, out: EvalOutput) {
        self.add_scalars(&out.scalars);
        for p in out.predictions {
            self.add_predictions(p);
        }
    }

    /// Means of every scalar, plus `{prefix}/accuracy` and
    /// `{prefix}/f1` for every prediction stream.
    pub fn finish(self) -> Metrics {
        let mut metrics = Metrics::new();
        for (key, (sum, count)) in self.sums {
            if count > 0 {
                metrics.insert(key, sum / count as f64);
            }
        }
        for (prefix, (predicted, labels)) in self.predictions {
            metrics.insert(format!("{prefix}/accuracy"), accuracy(&predicted, &labels));
            metrics.insert(format!("{prefix}/f1"), macro_f1(&predicted, &labels, self.num_classes));
        }
        metrics
    }
}

/// Reads a 1-D integer tensor back to the host.
pub fn int_values<B: Backend>(t: Tensor<B, 1, Int>) -> Vec<i64> {
    t.into_data().iter::<i64>().collect()
}

pub fn scalar<B: Backend>(t: &Tensor<B, 1>) -> f64 {
    t.clone().into_scalar().elem::<f64>()
}

/// Arg-max class per row of `[batch, num_classes]` logits.
pub fn predict<B: Backend>(logits: Tensor<B, 2>) -> Vec<i64> {
    // argmax(1) returns [batch, 1]
    int_values(logits.argmax(1).flatten::<1>(0, 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    #[test]
    fn test_scalars_are_averaged() {
        let mut acc = MetricAccumulator::new(2);
        acc.add_scalar("val/loss", 1.0);
        acc.add_scalar("val/loss", 3.0);
        acc.add_scalar("val/divergence", 0.5);
        let m = acc.finish();
        assert_eq!(m["val/loss"], 2.0);
        assert_eq!(m["val/divergence"], 0.5);
    }

    #[test]
    fn test_predictions_span_batches() {
        let mut acc = MetricAccumulator::new(2);
        acc.add_predictions(Predictions {
            prefix: "source_val".into(), predicted: vec![1, 0], labels: vec![1, 0],
        });
        acc.add_predictions(Predictions {
            prefix: "source_val".into(), predicted: vec![1, 1], labels: vec![0, 1],
        });
        let m = acc.finish();
        assert_eq!(m["source_val/accuracy"], 0.75);
        assert!(m.contains_key("source_val/f1"));
    }

    #[test]
    fn test_predict_takes_row_argmax() {
        let device = Default::default();
        let logits = Tensor::<TB, 2>::from_floats([[0.1, 2.0, -1.0], [3.0, 0.0, 0.5]], &device);
        assert_eq!(predict(logits), vec![1, 0]);
    }

    #[test]
    fn test_stage_prefix() {
        assert_eq!(Stage::Val.as_str(), "val");
        assert_eq!(Stage::Test.as_str(), "test");
    }
}
