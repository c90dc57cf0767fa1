// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `evaluate`, and all
// their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, enums, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};

use crate::application::train_use_case::{DataSource, DeviceKind, TrainConfig};
use crate::ml::model::Architecture;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train an event classifier on a long time series
    Train(TrainArgs),

    /// Re-score the test split of a finished run
    Evaluate(EvaluateArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchitectureArg {
    /// Bidirectional GRU stack followed by local attention
    GruAttention,
    /// Bidirectional GRU stack only
    GruPlain,
    /// Stateless local-attention transformer
    LocalTransformer,
}

impl From<ArchitectureArg> for Architecture {
    fn from(a: ArchitectureArg) -> Self {
        match a {
            ArchitectureArg::GruAttention     => Architecture::RecurrentAttention,
            ArchitectureArg::GruPlain         => Architecture::RecurrentPlain,
            ArchitectureArg::LocalTransformer => Architecture::LocalTransformer,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceArg {
    Cpu,
    Wgpu,
}

impl From<DeviceArg> for DeviceKind {
    fn from(d: DeviceArg) -> Self {
        match d {
            DeviceArg::Cpu  => DeviceKind::Cpu,
            DeviceArg::Wgpu => DeviceKind::Wgpu,
        }
    }
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// CSV series: header row, feature columns, 0/1 label last
    #[arg(long, conflicts_with = "synthetic")]
    pub dataset: Option<String>,

    /// Generate a synthetic series of this many timesteps instead
    #[arg(long)]
    pub synthetic: Option<usize>,

    /// Channels of the synthetic series
    #[arg(long, default_value_t = 3)]
    pub channels: usize,

    /// Number of contiguous units the series is cut into
    #[arg(long, default_value_t = 10)]
    pub units: usize,

    /// Fraction of units held out for testing
    #[arg(long, default_value_t = 0.2)]
    pub test_split: f64,

    /// Fraction of units used for validation
    #[arg(long, default_value_t = 0.1)]
    pub val_split: f64,

    /// Timesteps per training section
    #[arg(long, default_value_t = 200)]
    pub section_len: usize,

    /// Sections per mini-batch
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Number of full passes over all units
    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    /// Adam learning rate (fixed for the whole run)
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    #[arg(long, value_enum, default_value_t = DeviceArg::Cpu)]
    pub device: DeviceArg,

    /// Accepted for compatibility; Burn manages host/device copies
    #[arg(long)]
    pub pin_memory: bool,

    /// Directory for model weights and the run config
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Directory for metrics.csv, evaluation.json and roc.csv
    #[arg(long, default_value = "reports")]
    pub report_dir: String,

    #[arg(long, value_enum, default_value_t = ArchitectureArg::GruAttention)]
    pub architecture: ArchitectureArg,

    /// GRU hidden width per direction
    #[arg(long, default_value_t = 32)]
    pub hidden_size: usize,

    /// Stacked bidirectional GRU layers
    #[arg(long, default_value_t = 1)]
    pub num_layers: usize,

    /// Local attention window (timesteps)
    #[arg(long, default_value_t = 20)]
    pub attention_window: usize,

    /// Attention dropout of the GRU variants
    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    /// Transformer blocks
    #[arg(long, default_value_t = 2)]
    pub depth: usize,

    /// Transformer attention heads
    #[arg(long, default_value_t = 1)]
    pub heads: usize,

    /// Width of one transformer head (even when using rotary)
    #[arg(long, default_value_t = 32)]
    pub dim_head: usize,

    /// Transformer output steps dropped at each section edge
    #[arg(long, default_value_t = 50)]
    pub slack: usize,

    /// Transformer attends to the past only
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub causal: bool,

    /// Dynamic position bias instead of rotary embeddings
    #[arg(long)]
    pub dynamic_pos_bias: bool,

    /// Seed for the split, section offsets and shuffling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Keep training sections in order
    #[arg(long)]
    pub no_shuffle: bool,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// This is the boundary between Layer 1 and Layer 2 —
/// the application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        let data = match a.dataset {
            Some(path) => DataSource::Csv { path },
            None => DataSource::Synthetic {
                timesteps: a.synthetic.unwrap_or(20_000),
                channels:  a.channels,
            },
        };
        TrainConfig {
            data,
            units:            a.units,
            test_split:       a.test_split,
            val_split:        a.val_split,
            section_len:      a.section_len,
            batch_size:       a.batch_size,
            epochs:           a.epochs,
            lr:               a.lr,
            device:           a.device.into(),
            pin_memory:       a.pin_memory,
            checkpoint_dir:   a.checkpoint_dir,
            report_dir:       a.report_dir,
            architecture:     a.architecture.into(),
            hidden_size:      a.hidden_size,
            num_layers:       a.num_layers,
            attention_window: a.attention_window,
            dropout:          a.dropout,
            depth:            a.depth,
            heads:            a.heads,
            dim_head:         a.dim_head,
            slack:            a.slack,
            causal:           a.causal,
            dynamic_pos_bias: a.dynamic_pos_bias,
            seed:             a.seed,
            shuffle:          !a.no_shuffle,
        }
    }
}

/// All arguments for the `evaluate` command
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Directory where the run's checkpoint and config were saved
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Write reports here instead of the run's report directory
    #[arg(long)]
    pub report_dir: Option<String>,
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn parse(args: &[&str]) -> TrainConfig {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Train(a) => a.into(),
            Commands::Evaluate(_) => panic!("expected train"),
        }
    }

    #[test]
    fn test_defaults_match_config_defaults() {
        assert_eq!(parse(&["transient-gru", "train"]), TrainConfig::default());
    }

    #[test]
    fn test_flags_reach_config() {
        let cfg = parse(&[
            "transient-gru", "train",
            "--dataset", "series.csv",
            "--architecture", "local-transformer",
            "--device", "wgpu",
            "--causal", "false",
            "--no-shuffle",
            "--section-len", "120",
        ]);
        assert_eq!(cfg.data, DataSource::Csv { path: "series.csv".into() });
        assert_eq!(cfg.architecture, Architecture::LocalTransformer);
        assert_eq!(cfg.device, DeviceKind::Wgpu);
        assert!(!cfg.causal);
        assert!(!cfg.shuffle);
        assert_eq!(cfg.section_len, 120);
    }

    #[test]
    fn test_dataset_and_synthetic_conflict() {
        let res = Cli::try_parse_from(["transient-gru", "train", "--dataset", "a.csv", "--synthetic", "100"]);
        assert!(res.is_err());
    }
}
