// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to run one
// experiment end to end.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//   - No direct CSV or record handling (that's Layer 4 and 6)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Setup shared by the training use cases
pub mod experiment;

// CMD domain adapter training
pub mod train_adapter;

// Domain separation network training
pub mod train_dsn;

// Fine-tuning baseline
pub mod train_ft;

// Layer-wise PCA / t-SNE plots of a trained adapter
pub mod representations;
