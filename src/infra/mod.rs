// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem on behalf of the
// training core:
//
//   checkpoint.rs  — Saving and loading model weights
//                    Uses Burn's CompactRecorder; also saves /
//                    loads the run's TrainConfig as JSON so
//                    `evaluate` can rebuild the model and split.
//
//   metrics.rs     — Per-epoch loss CSV; the ReportSink the
//                    trainer reports to.
//
//   evaluation.rs  — Confusion matrix, precision / recall,
//                    ROC curve and AUC; evaluation.json and
//                    roc.csv writers.
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;

/// Classification metrics and report files
pub mod evaluation;
