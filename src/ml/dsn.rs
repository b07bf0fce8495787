// ============================================================
// Layer 5 — Domain Separation Network
// ============================================================
// Bousmalis et al. (2016), on top of an adapter-equipped encoder.
//
//   pooled_d   = [CLS] of the last hidden state       d ∈ {src, trg}
//   shared_d   = relu(W_shared  · pooled_d)
//   private_d  = relu(W_private_d · pooled_d)
//   recon_d    = W_decoder · (shared_d + private_d)
//   logits_d   = W_classifier · shared_d
//
// Loss terms:
//   task  = CE(logits_src, labels_src)
//   sim   = CMD(shared_src, shared_trg)
//   diff  = Σ_d mean((‖shared_d‖ᵀ · ‖private_d‖)²)   (row-normalised)
//   recon = Σ_d MSE(recon_d, pooled_d)               (pooled detached)
//
//   loss  = task + sim_w · sim + diff_w · diff + recon_w · recon
//
// Target labels are never used for training; they are only read
// during evaluation to report target accuracy / F1.

use burn::{
    nn::{
        loss::{CrossEntropyLossConfig, MseLoss, Reduction},
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::{activation::relu, backend::AutodiffBackend},
};

use crate::data::batcher::{SourceTargetBatch, TextBatch};
use crate::ml::cmd::cmd;
use crate::ml::encoder::TransformerEncoder;
use crate::ml::step::{
    int_values, predict, scalar, EvalOutput, EvaluationStep, Predictions, Stage, TrainOutput,
    TrainingStep,
};

const NORM_EPS: f64 = 1e-12;

#[derive(Config, Debug)]
pub struct DsnConfig {
    pub d_model:      usize,
    pub hidden_size:  usize,
    pub num_classes:  usize,
    #[config(default = 5)]
    pub n_moments:    usize,
    #[config(default = 0.3)]
    pub diff_weight:  f64,
    #[config(default = 1.0)]
    pub sim_weight:   f64,
    #[config(default = 1.0)]
    pub recon_weight: f64,
}

impl DsnConfig {
    pub fn init<B: Backend>(&self, encoder: TransformerEncoder<B>, device: &B::Device) -> DsnModel<B> {
        let d = self.d_model;
        let h = self.hidden_size;
        DsnModel {
            encoder,
            shared_encoder: LinearConfig::new(d, h).init(device),
            private_source: LinearConfig::new(d, h).init(device),
            private_target: LinearConfig::new(d, h).init(device),
            decoder:        LinearConfig::new(h, d).init(device),
            classifier:     LinearConfig::new(h, self.num_classes).init(device),
            n_moments:      self.n_moments,
            diff_weight:    self.diff_weight,
            sim_weight:     self.sim_weight,
            recon_weight:   self.recon_weight,
        }
    }
}

#[derive(Module, Debug)]
pub struct DsnModel<B: Backend> {
    pub encoder:        TransformerEncoder<B>,
    pub shared_encoder: Linear<B>,
    pub private_source: Linear<B>,
    pub private_target: Linear<B>,
    pub decoder:        Linear<B>,
    pub classifier:     Linear<B>,
    pub n_moments:      usize,
    pub diff_weight:    f64,
    pub sim_weight:     f64,
    pub recon_weight:   f64,
}

/// Every loss term of one batch, plus the classifier logits.
pub struct DsnOutput<B: Backend> {
    pub loss:          Tensor<B, 1>,
    pub task:          Tensor<B, 1>,
    pub sim:           Tensor<B, 1>,
    pub diff:          Tensor<B, 1>,
    pub recon:         Tensor<B, 1>,
    pub source_logits: Tensor<B, 2>,
    pub target_logits: Tensor<B, 2>,
}

struct Branch<B: Backend> {
    pooled:  Tensor<B, 2>,
    shared:  Tensor<B, 2>,
    private: Tensor<B, 2>,
}

impl<B: Backend> DsnModel<B> {
    fn branch(&self, batch: &TextBatch<B>, private: &Linear<B>) -> Branch<B> {
        let pooled = self
            .encoder
            .pooled(batch.input_ids.clone(), batch.attention_mask.clone());
        Branch {
            shared:  relu(self.shared_encoder.forward(pooled.clone())),
            private: relu(private.forward(pooled.clone())),
            pooled,
        }
    }

    pub fn forward(&self, batch: &SourceTargetBatch<B>) -> DsnOutput<B> {
        let src = self.branch(&batch.source, &self.private_source);
        let trg = self.branch(&batch.target, &self.private_target);

        let source_logits = self.classifier.forward(src.shared.clone());
        let target_logits = self.classifier.forward(trg.shared.clone());

        let task = CrossEntropyLossConfig::new()
            .init(&source_logits.device())
            .forward(source_logits.clone(), batch.source.labels.clone());

        let sim = cmd(src.shared.clone(), trg.shared.clone(), self.n_moments);

        let diff = difference_loss(src.shared.clone(), src.private.clone())
            + difference_loss(trg.shared.clone(), trg.private.clone());

        let recon = self.reconstruction_loss(&src) + self.reconstruction_loss(&trg);

        let loss = task.clone()
            + sim.clone().mul_scalar(self.sim_weight)
            + diff.clone().mul_scalar(self.diff_weight)
            + recon.clone().mul_scalar(self.recon_weight);

        DsnOutput { loss, task, sim, diff, recon, source_logits, target_logits }
    }

    fn reconstruction_loss(&self, branch: &Branch<B>) -> Tensor<B, 1> {
        let recon = self.decoder.forward(branch.shared.clone() + branch.private.clone());
        MseLoss::new().forward(recon, branch.pooled.clone().detach(), Reduction::Mean)
    }
}

/// Soft orthogonality between shared and private features.
pub fn difference_loss<B: Backend>(shared: Tensor<B, 2>, private: Tensor<B, 2>) -> Tensor<B, 1> {
    let shared  = l2_normalize(shared);
    let private = l2_normalize(private);
    let correlation = shared.transpose().matmul(private);
    (correlation.clone() * correlation).mean()
}

fn l2_normalize<B: Backend>(x: Tensor<B, 2>) -> Tensor<B, 2> {
    let norm = (x.clone() * x.clone()).sum_dim(1).add_scalar(NORM_EPS).sqrt();
    x / norm
}

impl<B: AutodiffBackend> TrainingStep<B> for DsnModel<B> {
    fn train_step(&self, batch: SourceTargetBatch<B>) -> TrainOutput<B> {
        let out = self.forward(&batch);
        let metrics = vec![
            ("train/loss".to_string(),       scalar(&out.loss)),
            ("train/task_loss".to_string(),  scalar(&out.task)),
            ("train/sim_loss".to_string(),   scalar(&out.sim)),
            ("train/diff_loss".to_string(),  scalar(&out.diff)),
            ("train/recon_loss".to_string(), scalar(&out.recon)),
        ];
        TrainOutput { loss: out.loss, metrics }
    }
}

impl<B: Backend> EvaluationStep<B> for DsnModel<B> {
    fn eval_step(&self, batch: SourceTargetBatch<B>, stage: Stage) -> EvalOutput {
        let out = self.forward(&batch);
        let stage = stage.as_str();
        EvalOutput {
            scalars: vec![(format!("source_{stage}/loss"), scalar(&out.task))],
            predictions: vec![
                Predictions {
                    prefix:    format!("source_{stage}"),
                    predicted: predict(out.source_logits),
                    labels:    int_values(batch.source.labels),
                },
                Predictions {
                    prefix:    format!("target_{stage}"),
                    predicted: predict(out.target_logits),
                    labels:    int_values(batch.target.labels),
                },
            ],
        }
    }
}
