// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from domain CSV files to tensor batches:
//
//   <split>_<side>.csv
//       │
//       ▼
//   CsvDataSource     → reads rows into TextExamples
//       │
//       ▼
//   Preprocessor      → normalises whitespace / invisible chars
//       │
//       ▼
//   ExampleEncoder    → [CLS] a [SEP] b [SEP], truncated
//       │
//       ▼
//   SourceTargetDataset → pairs source items with target items
//       │
//       ▼
//   SourceTargetBatcher → pads both halves to one length
//       │
//       ▼
//   DataLoader        → feeds batches to the fit loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads domain CSV splits
pub mod loader;

/// Cleans raw text before tokenisation
pub mod preprocessor;

/// Tokenises and truncates examples
pub mod encoding;

/// Implements Burn's Dataset trait for source/target pairs
pub mod dataset;

/// Implements Burn's Batcher trait with per-batch padding
pub mod batcher;

/// Batch counting and proportion limiting
pub mod sampling;

/// Loads all splits and builds the data loaders
pub mod module;
