// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits that describe an experiment:
// the hyperparameters, the source/target domain pair, and the
// labelled text examples read from the CSV splits.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Flat, immutable hyperparameter record shared by every layer
pub mod hparams;

// "<source>_<target>" domain pair
pub mod source_target;

// One labelled text example (single sentence or sentence pair)
pub mod example;

// Core abstractions (traits) that other layers implement
pub mod traits;
