// ============================================================
// Layer 2 — EvaluateUseCase
// ============================================================
// Re-scores the test split of a finished run:
//
//   Step 1: Load train_config.json      (Layer 6 - infra)
//   Step 2: Rebuild series + split      (Layer 4 - data)
//   Step 3: Rebuild encoder, load wts   (Layers 5 + 6)
//   Step 4: Score the test units        (Layer 5 - ml)
//   Step 5: Write evaluation.json / roc (Layer 6 - infra)
//
// No autodiff here: the model lives on the plain backend.

use anyhow::Result;
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, NdArray, Wgpu},
    prelude::*,
};
use std::path::Path;

use crate::application::train_use_case::{build_dataset, DeviceKind, TrainConfig};
use crate::data::dataset::UnitDataset;
use crate::infra::{
    checkpoint::CheckpointManager,
    evaluation::{roc_curve, write_reports, ClassificationReport},
};
use crate::ml::{
    evaluator::predict,
    model::{Architecture, SequenceEncoder},
};

/// Score ≥ threshold counts as a predicted event.
pub const DECISION_THRESHOLD: f32 = 0.5;

/// Score the test view and write the report files. Returns `None`
/// when the test split is empty.
pub fn evaluate_and_report<B, M>(
    model:   &M,
    dataset: &UnitDataset,
    cfg:     &TrainConfig,
    device:  &B::Device,
) -> Result<Option<ClassificationReport>>
where
    B: Backend,
    M: SequenceEncoder<B>,
{
    let view = dataset.test_view();
    if view.unit_ids().is_empty() {
        tracing::warn!("Test split is empty; skipping evaluation");
        return Ok(None);
    }
    model.validate_shape(dataset.section_len(), dataset.input_size())?;

    let preds = predict::<B, M>(model, &view, cfg.batch_size, device)?;
    let report = ClassificationReport::from_scores(&preds.scores, &preds.labels, DECISION_THRESHOLD)?;
    let roc = roc_curve(&preds.scores, &preds.labels);
    write_reports(Path::new(&cfg.report_dir), &report, roc.as_deref())?;

    tracing::info!(
        "Test: accuracy={:.4} f1={:.4} auc={}",
        report.accuracy,
        report.f1_event,
        report.roc_auc.map_or("n/a".to_string(), |a| format!("{a:.4}"))
    );
    Ok(Some(report))
}

// ─── EvaluateUseCase ──────────────────────────────────────────────────────────
pub struct EvaluateUseCase {
    checkpoint_dir: String,
    report_dir:     Option<String>,
}

impl EvaluateUseCase {
    /// `report_dir` overrides the directory recorded at training time.
    pub fn new(checkpoint_dir: String, report_dir: Option<String>) -> Self {
        Self { checkpoint_dir, report_dir }
    }

    pub fn execute(&self) -> Result<Option<ClassificationReport>> {
        // ── Step 1: Run configuration ─────────────────────────────────────────
        let ckpt = CheckpointManager::new(&self.checkpoint_dir)?;
        let mut cfg = ckpt.load_config()?;
        if let Some(dir) = &self.report_dir {
            cfg.report_dir = dir.clone();
        }

        // ── Step 2: Same series, same split ───────────────────────────────────
        let dataset = build_dataset(&cfg)?;

        match cfg.device {
            DeviceKind::Cpu  => Self::run::<NdArray>(&cfg, &dataset, &ckpt, &NdArrayDevice::default()),
            DeviceKind::Wgpu => Self::run::<Wgpu>(&cfg, &dataset, &ckpt, &WgpuDevice::default()),
        }
    }

    /// Steps 3–5.
    fn run<B: Backend>(
        cfg:     &TrainConfig,
        dataset: &UnitDataset,
        ckpt:    &CheckpointManager,
        device:  &B::Device,
    ) -> Result<Option<ClassificationReport>> {
        let input_size = dataset.input_size();
        match cfg.architecture {
            Architecture::LocalTransformer => {
                let model = ckpt.load_model::<B, _>(cfg.transformer_config(input_size).init::<B>(device), device)?;
                evaluate_and_report::<B, _>(&model, dataset, cfg, device)
            }
            Architecture::RecurrentAttention | Architecture::RecurrentPlain => {
                let model = ckpt.load_model::<B, _>(cfg.recurrent_config(input_size).init::<B>(device), device)?;
                evaluate_and_report::<B, _>(&model, dataset, cfg, device)
            }
        }
    }
}
