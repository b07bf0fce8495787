// ============================================================
// Layer 5 — Domain Adapter Objective
// ============================================================
// Trains only the bottleneck adapters of a frozen encoder so that
// source and target [CLS] representations match in every layer.
//
// Per batch:
//   1. concat(source, target) along the batch dimension
//   2. one forward pass → num_layers + 1 hidden states
//   3. split every hidden state back at the source batch size
//   4. loss = Σ_layers CMD(source_cls, target_cls)
//
// The loss is the divergence itself; there is no task head.

use burn::{prelude::*, tensor::backend::AutodiffBackend};

use crate::data::batcher::SourceTargetBatch;
use crate::ml::adapter::BottleneckAdapter;
use crate::ml::cmd::layerwise_cmd;
use crate::ml::encoder::TransformerEncoder;
use crate::ml::step::{scalar, EvalOutput, EvaluationStep, Stage, TrainOutput, TrainingStep};

#[derive(Module, Debug)]
pub struct DomainAdapterModel<B: Backend> {
    pub encoder:   TransformerEncoder<B>,
    pub n_moments: usize,
}

impl<B: Backend> DomainAdapterModel<B> {
    /// Adds fresh adapters to `encoder` and freezes everything else.
    pub fn new(
        encoder:          TransformerEncoder<B>,
        reduction_factor: usize,
        n_moments:        usize,
        device:           &B::Device,
    ) -> Self {
        let encoder = encoder.with_new_adapters(reduction_factor, device).freeze_base();
        Self { encoder, n_moments }
    }

    pub fn divergence(&self, batch: &SourceTargetBatch<B>) -> Tensor<B, 1> {
        let n_source = batch.source.batch_size();
        let device = batch.source.input_ids.device();

        let input_ids = Tensor::cat(
            vec![batch.source.input_ids.clone(), batch.target.input_ids.clone()],
            0,
        );
        let attention_mask = Tensor::cat(
            vec![batch.source.attention_mask.clone(), batch.target.attention_mask.clone()],
            0,
        );

        let hidden_states = self.encoder.forward(input_ids, attention_mask);
        layerwise_cmd(hidden_states, n_source, self.n_moments, &device)
    }

    pub fn adapters(&self) -> Vec<BottleneckAdapter<B>> {
        self.encoder.adapters()
    }
}

impl<B: AutodiffBackend> TrainingStep<B> for DomainAdapterModel<B> {
    fn train_step(&self, batch: SourceTargetBatch<B>) -> TrainOutput<B> {
        let loss = self.divergence(&batch);
        let value = scalar(&loss);
        TrainOutput {
            loss,
            metrics: vec![
                ("train/loss".to_string(), value),
                ("train/divergence".to_string(), value),
            ],
        }
    }
}

impl<B: Backend> EvaluationStep<B> for DomainAdapterModel<B> {
    fn eval_step(&self, batch: SourceTargetBatch<B>, stage: Stage) -> EvalOutput {
        let value = scalar(&self.divergence(&batch));
        EvalOutput {
            scalars:     vec![(format!("{}/divergence", stage.as_str()), value)],
            predictions: Vec::new(),
        }
    }
}
