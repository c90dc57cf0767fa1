// ============================================================
// Layer 5 — Evaluator
// ============================================================
// Runs a trained encoder over the test view and collects one
// (score, label) pair per predicted timestep.
//
//   for unit in test units
//     bridge(model, test view, unit)
//     for batch in unit loader (in order)
//       sigmoid(encode(batch)) → scores
//
// Labels are trimmed the same way as the logits, so the two
// vectors always line up.

use anyhow::{ensure, Result};
use burn::{prelude::*, tensor::activation::sigmoid};

use crate::data::{batcher::section_loader, dataset::SplitView};
use crate::ml::bridge::HiddenStateBridge;
use crate::ml::loss::trim_targets;
use crate::ml::model::SequenceEncoder;

/// Per-timestep probabilities and their ground truth.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predictions {
    pub scores: Vec<f32>,
    pub labels: Vec<f32>,
}

impl Predictions {
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Score every section of `view` with `model` (already in eval mode).
///
/// # Errors
/// Fails on shape mismatches or when a tensor cannot be read back.
pub fn predict<B, M>(
    model:      &M,
    view:       &SplitView<'_>,
    batch_size: usize,
    device:     &B::Device,
) -> Result<Predictions>
where
    B: Backend,
    M: SequenceEncoder<B>,
{
    ensure!(batch_size > 0, "batch_size must be at least 1");
    let mut bridge = HiddenStateBridge::new();
    let trim = model.edge_trim();
    let mut predictions = Predictions::default();

    for &unit in view.unit_ids() {
        let prepared = bridge.prepare::<B, M>(model, view, unit, device)?;
        let loader = section_loader::<B>(prepared, batch_size, None, device);
        for batch in loader.iter() {
            let probs = sigmoid(model.encode(batch.inputs, batch.seeds));
            let targets = trim_targets(batch.targets, trim);

            predictions.scores.extend(to_host(probs)?);
            predictions.labels.extend(to_host(targets)?);
        }
    }

    tracing::info!(
        "Scored {} timesteps over {} {:?} units",
        predictions.len(),
        view.unit_ids().len(),
        view.kind()
    );
    Ok(predictions)
}

fn to_host<B: Backend>(t: Tensor<B, 3>) -> Result<Vec<f32>> {
    t.into_data()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("reading predictions: {e:?}"))
}
