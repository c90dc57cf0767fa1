// ============================================================
// Layer 5 — Training Orchestrator
// ============================================================
// epoch → unit → mini-batch, with the hidden-state bridge at
// every unit transition:
//
//   for epoch in 0..epochs
//     for unit in 0..unit_count              (training phase)
//       bridge(model.valid(), train view, unit)
//       for batch in unit loader             (shuffled, seeded)
//         BCE-with-logits → backward → Adam step
//     random_subsample()                     (train windows only)
//     for unit in 0..unit_count              (validation phase)
//       bridge(model.valid(), validation view, unit)
//       for batch in unit loader             (in order)
//         BCE-with-logits, loss only
//     report epoch means to the sink
//
// Every unit id is bridged in both phases; units outside the
// phase's split come back with no sections, so the bridge runs
// exactly 2 · unit_count · epochs times.
//
// Each prepared unit gets its own DataLoader. The shuffle seed
// is derived from (seed, epoch, unit), so a run is reproducible.
//
// Epoch means divide by the number of steps actually executed.
//
// Key Burn 0.20 insight:
//   - Training uses the Autodiff backend B for gradients
//   - model.valid() returns the model on B::InnerBackend
//     (no graph, dropout off) for the bridge and validation
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{ensure, Result};
use burn::{
    data::dataset::Dataset,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::data::{batcher::section_loader, dataset::UnitDataset};
use crate::domain::traits::ReportSink;
use crate::ml::bridge::HiddenStateBridge;
use crate::ml::loss::{bce_with_logits, trim_targets};
use crate::ml::model::SequenceEncoder;

#[derive(Config, Debug)]
pub struct TrainerConfig {
    pub epochs:     usize,
    pub batch_size: usize,
    #[config(default = 1e-3)]
    pub learning_rate: f64,
    /// Shuffle training sections within each unit
    #[config(default = true)]
    pub shuffle: bool,
    #[config(default = 42)]
    pub seed: u64,
}

/// Loss history and bookkeeping of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainHistory {
    pub train_loss:         Vec<f64>,
    pub val_loss:           Vec<f64>,
    pub train_steps:        Vec<usize>,
    pub val_steps:          Vec<usize>,
    pub bridge_invocations: usize,
}

/// Train `model` on `dataset`, reporting each finished epoch to `sink`.
///
/// # Errors
/// Fails before the first step if the model cannot consume the
/// dataset's sections; afterwards any bridge, batching or sink
/// failure aborts the run.
pub fn train<B, M, S>(
    mut model: M,
    dataset:   &mut UnitDataset,
    cfg:       &TrainerConfig,
    sink:      &mut S,
    device:    &B::Device,
) -> Result<(M, TrainHistory)>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + SequenceEncoder<B>,
    M::InnerModule: SequenceEncoder<B::InnerBackend>,
    S: ReportSink + ?Sized,
{
    ensure!(cfg.batch_size > 0, "batch_size must be at least 1");
    model.validate_shape(dataset.section_len(), dataset.input_size())?;

    // m = β1*m + (1-β1)*g        (mean)
    // v = β2*v + (1-β2)*g²       (variance)
    // θ = θ - lr * m / (√v + ε)  (update)
    let mut optim = AdamConfig::new().with_epsilon(1e-8).init();

    let mut bridge  = HiddenStateBridge::new();
    let mut history = TrainHistory::default();
    let trim        = model.edge_trim();
    let units       = dataset.unit_count();

    for epoch in 1..=cfg.epochs {

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_loss_sum = 0.0f64;
        let mut train_steps    = 0usize;

        for unit in 0..units {
            let eval_model = model.valid();
            let prepared = bridge.prepare::<B::InnerBackend, _>(&eval_model, &dataset.train_view(), unit, device)?;
            if prepared.is_empty() {
                continue;
            }
            let shuffle = cfg
                .shuffle
                .then(|| cfg.seed.wrapping_add(((epoch - 1) * units + unit) as u64));
            let loader = section_loader::<B>(prepared, cfg.batch_size, shuffle, device);

            for batch in loader.iter() {
                let logits = model.encode(batch.inputs, batch.seeds);
                let loss = bce_with_logits(logits, trim_targets(batch.targets, trim));

                let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
                train_loss_sum += loss_val;
                train_steps    += 1;
                tracing::debug!("epoch {} unit {} step {}: loss={:.5}", epoch, unit, train_steps, loss_val);

                // Backward pass + Adam update
                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optim.step(cfg.learning_rate, model, grads);
            }
        }
        ensure!(train_steps > 0, "epoch {} executed no training steps", epoch);

        dataset.random_subsample();

        // ── Validation phase ──────────────────────────────────────────────────
        let eval_model = model.valid();
        let mut val_loss_sum = 0.0f64;
        let mut val_steps    = 0usize;

        for unit in 0..units {
            let prepared = bridge.prepare::<B::InnerBackend, _>(&eval_model, &dataset.validation_view(), unit, device)?;
            if prepared.is_empty() {
                continue;
            }
            let loader = section_loader::<B::InnerBackend>(prepared, cfg.batch_size, None, device);
            for batch in loader.iter() {
                let logits = eval_model.encode(batch.inputs, batch.seeds);
                let loss = bce_with_logits(logits, trim_targets(batch.targets, trim));
                val_loss_sum += loss.into_scalar().elem::<f64>();
                val_steps    += 1;
            }
        }

        let avg_train_loss = train_loss_sum / train_steps as f64;
        let avg_val_loss   = val_loss_sum / val_steps.max(1) as f64;

        tracing::info!(
            "Epoch {:>3}/{} | train_loss={:.4} ({} steps) | val_loss={:.4} ({} steps)",
            epoch, cfg.epochs, avg_train_loss, train_steps, avg_val_loss, val_steps,
        );

        history.train_loss.push(avg_train_loss);
        history.val_loss.push(avg_val_loss);
        history.train_steps.push(train_steps);
        history.val_steps.push(val_steps);
        sink.on_epoch_end(epoch, avg_train_loss, avg_val_loss)?;
    }

    history.bridge_invocations = bridge.invocations();
    tracing::info!("Training complete: {} bridge invocations", history.bridge_invocations);
    Ok((model, history))
}
