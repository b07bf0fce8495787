// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem on behalf of a run:
//
//   checkpoint.rs      - best-checkpoint bookkeeping and record
//                        save/load via Burn's file recorder
//
//   run_dir.rs         - experiment directory layout, run ids,
//                        hparams.json
//
//   tokenizer_store.rs - tokenizer.json: copied from a pretrained
//                        model or built from the training corpus
//
//   pretrained.rs      - model name → encoder config, weights,
//                        tokenizer
//
//   tracker.rs         - metrics.jsonl + epochs.csv
//                        (implements ExperimentTracker)
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Best-checkpoint saving and loading
pub mod checkpoint;

/// Run directory layout
pub mod run_dir;

/// Tokenizer resolution, building, and loading
pub mod tokenizer_store;

/// Pretrained encoder registry
pub mod pretrained;

/// Local experiment tracker
pub mod tracker;
