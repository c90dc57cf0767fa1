// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// From a raw series file to device-ready section batches:
//
//   CSV file / synthetic generator
//       │
//       ▼
//   SeriesSource      → TimeSeries (features + per-step labels)
//       │
//       ▼
//   split_units       → train / validation / test unit ids
//       │
//       ▼
//   UnitDataset       → units, resampled section layouts, views
//       │
//       ▼
//   PreparedUnit      → section items seeded with hidden states
//       │
//       ▼
//   section_loader    → Burn DataLoader per unit; SectionBatcher
//                       stacks each mini-batch into tensors
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// CSV and synthetic series sources
pub mod loader;

/// Seeded unit-level train/validation/test assignment
pub mod splitter;

/// Disjoint fixed-length windows and their resampling
pub mod sections;

/// Unit-chunked dataset and its type-state views
pub mod dataset;

/// Stacks section items into tensors; per-unit DataLoaders
pub mod batcher;
