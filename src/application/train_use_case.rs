// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load the series             (Layer 4 - data)
//   Step 2: Assign units to splits      (Layer 4 - data)
//   Step 3: Build the unit dataset      (Layer 4 - data)
//   Step 4: Save config                 (Layer 6 - infra)
//   Step 5: Pick backend + encoder      (Layer 5 - ml)
//   Step 6: Run the training loop       (Layer 5 - ml)
//   Step 7: Save the checkpoint         (Layer 6 - infra)
//   Step 8: Evaluate on the test split  (Layers 5 + 6)
//
// Reference: Burn Book §5 (Training)

use anyhow::Result;
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu},
    module::AutodiffModule,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::application::evaluate_use_case::evaluate_and_report;
use crate::data::{
    dataset::UnitDataset,
    loader::{CsvSeriesLoader, SyntheticSeries},
    splitter::split_units,
};
use crate::domain::traits::SeriesSource;
use crate::infra::{
    checkpoint::CheckpointManager,
    evaluation::ClassificationReport,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::{
    model::{Architecture, RecurrentEncoderConfig, SequenceEncoder},
    trainer::{train, TrainHistory, TrainerConfig},
    transformer::LocalTransformerConfig,
};

// ─── Training Configuration ──────────────────────────────────────────────────
// All settings for a training run.
// Serialisable so it can be saved next to the checkpoint and
// reloaded by `evaluate` to rebuild the same model and split.

/// Where the series comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSource {
    Csv { path: String },
    Synthetic { timesteps: usize, channels: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Cpu,
    Wgpu,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data:             DataSource,
    pub units:            usize,
    pub test_split:       f64,
    pub val_split:        f64,
    pub section_len:      usize,
    pub batch_size:       usize,
    pub epochs:           usize,
    pub lr:               f64,
    pub device:           DeviceKind,
    pub pin_memory:       bool,
    pub checkpoint_dir:   String,
    pub report_dir:       String,
    pub architecture:     Architecture,
    pub hidden_size:      usize,
    pub num_layers:       usize,
    pub attention_window: usize,
    pub dropout:          f64,
    pub depth:            usize,
    pub heads:            usize,
    pub dim_head:         usize,
    pub slack:            usize,
    pub causal:           bool,
    pub dynamic_pos_bias: bool,
    pub seed:             u64,
    pub shuffle:          bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data:             DataSource::Synthetic { timesteps: 20_000, channels: 3 },
            units:            10,
            test_split:       0.2,
            val_split:        0.1,
            section_len:      200,
            batch_size:       32,
            epochs:           10,
            lr:               1e-3,
            device:           DeviceKind::Cpu,
            pin_memory:       false,
            checkpoint_dir:   "checkpoints".to_string(),
            report_dir:       "reports".to_string(),
            architecture:     Architecture::RecurrentAttention,
            hidden_size:      32,
            num_layers:       1,
            attention_window: 20,
            dropout:          0.1,
            depth:            2,
            heads:            1,
            dim_head:         32,
            slack:            50,
            causal:           true,
            dynamic_pos_bias: false,
            seed:             42,
            shuffle:          true,
        }
    }
}

impl TrainConfig {
    pub fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig::new(self.epochs, self.batch_size)
            .with_learning_rate(self.lr)
            .with_shuffle(self.shuffle)
            .with_seed(self.seed)
    }

    pub fn recurrent_config(&self, input_size: usize) -> RecurrentEncoderConfig {
        RecurrentEncoderConfig::new(self.section_len, input_size)
            .with_hidden_size(self.hidden_size)
            .with_num_layers(self.num_layers)
            .with_use_attention(self.architecture == Architecture::RecurrentAttention)
            .with_attention_window(self.attention_window)
            .with_dropout(self.dropout)
    }

    pub fn transformer_config(&self, input_size: usize) -> LocalTransformerConfig {
        LocalTransformerConfig::new(self.section_len, input_size, self.depth)
            .with_causal(self.causal)
            .with_window(self.attention_window)
            .with_dim_head(self.dim_head)
            .with_heads(self.heads)
            .with_use_dynamic_pos_bias(self.dynamic_pos_bias)
            .with_slack(self.slack)
    }
}

/// Steps 1–3: series → split → dataset. Deterministic in `cfg.seed`,
/// so `evaluate` rebuilds exactly the split training used.
pub fn build_dataset(cfg: &TrainConfig) -> Result<UnitDataset> {
    let source: Box<dyn SeriesSource> = match &cfg.data {
        DataSource::Csv { path } => {
            tracing::info!("Loading series from '{}'", path);
            Box::new(CsvSeriesLoader::new(path))
        }
        DataSource::Synthetic { timesteps, channels } => {
            tracing::info!("Generating synthetic series: {} steps × {} channels", timesteps, channels);
            Box::new(SyntheticSeries::new(*timesteps, *channels, cfg.seed))
        }
    };
    let series = source.load()?;

    let split = split_units(cfg.units, cfg.test_split, cfg.val_split, cfg.seed)?;
    tracing::info!(
        "Split: {} train, {} validation, {} test units",
        split.train.len(),
        split.validation.len(),
        split.test.len()
    );
    if split.validation.is_empty() {
        tracing::warn!("Validation split is empty; val_loss will be reported as 0");
    }

    UnitDataset::new(series, cfg.units, cfg.section_len, split, cfg.seed)
}

/// What a finished run hands back to the CLI.
#[derive(Debug, Clone)]
pub struct TrainSummary {
    pub history:    TrainHistory,
    pub best_epoch: Option<EpochMetrics>,
    pub report:     Option<ClassificationReport>,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainSummary> {
        let cfg = &self.config;

        // ── Steps 1–3: Series, split, dataset ─────────────────────────────────
        let dataset = build_dataset(cfg)?;

        // ── Step 4: Save config for evaluation ────────────────────────────────
        let ckpt = CheckpointManager::new(&cfg.checkpoint_dir)?;
        ckpt.save_config(cfg)?;

        if cfg.pin_memory {
            tracing::warn!("--pin-memory has no effect: the Burn backend manages host/device transfers");
        }

        // ── Step 5: Backend ───────────────────────────────────────────────────
        match cfg.device {
            DeviceKind::Cpu => {
                let device = NdArrayDevice::default();
                tracing::info!("Using NdArray device: {:?}", device);
                self.run::<Autodiff<NdArray>>(dataset, &ckpt, &device)
            }
            DeviceKind::Wgpu => {
                let device = WgpuDevice::default();
                tracing::info!("Using WGPU device: {:?}", device);
                self.run::<Autodiff<Wgpu>>(dataset, &ckpt, &device)
            }
        }
    }

    /// Step 5 continued: encoder variant.
    fn run<B: AutodiffBackend>(
        &self,
        dataset: UnitDataset,
        ckpt:    &CheckpointManager,
        device:  &B::Device,
    ) -> Result<TrainSummary> {
        let cfg = &self.config;
        let input_size = dataset.input_size();
        tracing::info!("Model: {} on {} input channels", cfg.architecture, input_size);

        match cfg.architecture {
            Architecture::LocalTransformer => {
                let model = cfg.transformer_config(input_size).init::<B>(device);
                self.fit(model, dataset, ckpt, device)
            }
            Architecture::RecurrentAttention | Architecture::RecurrentPlain => {
                let model = cfg.recurrent_config(input_size).init::<B>(device);
                self.fit(model, dataset, ckpt, device)
            }
        }
    }

    /// Steps 6–8.
    fn fit<B, M>(
        &self,
        model:       M,
        mut dataset: UnitDataset,
        ckpt:        &CheckpointManager,
        device:      &B::Device,
    ) -> Result<TrainSummary>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B> + SequenceEncoder<B>,
        M::InnerModule: SequenceEncoder<B::InnerBackend>,
    {
        let cfg = &self.config;

        // ── Step 6: Training loop (Layer 5) ───────────────────────────────────
        let mut logger = MetricsLogger::new(&cfg.report_dir)?;
        let (model, history) = train::<B, M, _>(model, &mut dataset, &cfg.trainer_config(), &mut logger, device)?;

        // ── Step 7: Checkpoint ────────────────────────────────────────────────
        let eval_model = model.valid();
        ckpt.save_model::<B::InnerBackend, _>(&eval_model, cfg.epochs)?;

        // ── Step 8: Test-split evaluation ─────────────────────────────────────
        let report = evaluate_and_report::<B::InnerBackend, _>(&eval_model, &dataset, cfg, device)?;

        Ok(TrainSummary {
            history,
            best_epoch: logger.best().cloned(),
            report,
        })
    }
}
