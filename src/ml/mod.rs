// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains the Burn-specific model and training code.
// The domain layer never imports burn; the data layer only uses
// its Dataset / Batcher traits.
//
// What's in this layer:
//
//   encoder.rs        - post-norm transformer encoder returning
//                       every hidden state, with optional adapters
//   adapter.rs        - bottleneck adapter (identity at init)
//   cmd.rs            - central moment discrepancy
//
//   domain_adapter.rs - adapters trained to minimise layer-wise CMD
//   dsn.rs            - domain separation network objective
//   finetune.rs       - full fine-tuning baseline
//
//   step.rs           - TrainingStep / EvaluationStep contracts
//   trainer.rs        - fit / validate / test loop
//   scheduler.rs      - reduce-LR-on-plateau
//   scoring.rs        - accuracy and macro-F1
//
//   pca.rs            - 2-D PCA by power iteration
//   tsne.rs           - 2-D Barnes-Hut t-SNE
//   representations.rs - per-layer [CLS] features for plotting
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            Houlsby et al. (2019) Parameter-Efficient Transfer Learning
//            Zellinger et al. (2017) Central Moment Discrepancy

pub mod encoder;
pub mod adapter;
pub mod cmd;

pub mod domain_adapter;
pub mod dsn;
pub mod finetune;

pub mod step;
pub mod trainer;
pub mod scheduler;
pub mod scoring;

pub mod pca;
pub mod tsne;
pub mod representations;
