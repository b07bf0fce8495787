// ============================================================
// Layer 5 — Fine-Tuning Baseline
// ============================================================
// Whole encoder + linear classifier on the [CLS] vector, trained
// on labelled source data only. The target side of each batch is
// evaluated but never trained on, which gives the "no adaptation"
// reference point for the other objectives.
//
//   logits = W · dropout(cls(encoder(x)))

use burn::{
    nn::{loss::CrossEntropyLossConfig, Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::batcher::{SourceTargetBatch, TextBatch};
use crate::ml::encoder::TransformerEncoder;
use crate::ml::step::{
    int_values, predict, scalar, EvalOutput, EvaluationStep, Predictions, Stage, TrainOutput,
    TrainingStep,
};

#[derive(Config, Debug)]
pub struct FineTuneConfig {
    pub d_model:     usize,
    pub num_classes: usize,
    #[config(default = 0.1)]
    pub dropout:     f64,
}

impl FineTuneConfig {
    pub fn init<B: Backend>(&self, encoder: TransformerEncoder<B>, device: &B::Device) -> FineTuneModel<B> {
        FineTuneModel {
            encoder,
            dropout:    DropoutConfig::new(self.dropout).init(),
            classifier: LinearConfig::new(self.d_model, self.num_classes).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct FineTuneModel<B: Backend> {
    pub encoder:    TransformerEncoder<B>,
    pub dropout:    Dropout,
    pub classifier: Linear<B>,
}

impl<B: Backend> FineTuneModel<B> {
    pub fn forward(&self, batch: &TextBatch<B>) -> Tensor<B, 2> {
        let pooled = self
            .encoder
            .pooled(batch.input_ids.clone(), batch.attention_mask.clone());
        self.classifier.forward(self.dropout.forward(pooled))
    }

    fn loss(&self, logits: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> Tensor<B, 1> {
        CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits, labels)
    }
}

impl<B: AutodiffBackend> TrainingStep<B> for FineTuneModel<B> {
    fn train_step(&self, batch: SourceTargetBatch<B>) -> TrainOutput<B> {
        let logits = self.forward(&batch.source);
        let loss = self.loss(logits, batch.source.labels);
        let value = scalar(&loss);
        TrainOutput { loss, metrics: vec![("train/loss".to_string(), value)] }
    }
}

impl<B: Backend> EvaluationStep<B> for FineTuneModel<B> {
    fn eval_step(&self, batch: SourceTargetBatch<B>, stage: Stage) -> EvalOutput {
        let stage = stage.as_str();
        let source_logits = self.forward(&batch.source);
        let target_logits = self.forward(&batch.target);
        let loss = self.loss(source_logits.clone(), batch.source.labels.clone());

        EvalOutput {
            scalars: vec![(format!("{stage}/loss"), scalar(&loss))],
            predictions: vec![
                Predictions {
                    prefix:    stage.to_string(),
                    predicted: predict(source_logits),
                    labels:    int_values(batch.source.labels),
                },
                Predictions {
                    prefix:    format!("target_{stage}"),
                    predicted: predict(target_logits),
                    labels:    int_values(batch.target.labels),
                },
            ],
        }
    }
}
