// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records the loss history to a CSV file after each epoch.
// It is the production ReportSink: the trainer reports each
// finished epoch here and knows nothing about files.
//
// Metrics recorded per epoch:
//   - epoch:      the epoch number (1, 2, 3, ...)
//   - train_loss: mean BCE over the executed training steps
//   - val_loss:   mean BCE over the executed validation steps
//
// Output file: <report_dir>/metrics.csv
//
// Example CSV output:
//   epoch,train_loss,val_loss
//   1,0.412300,0.398100
//   2,0.201900,0.215400
//   ...
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::traits::ReportSink;

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// The epoch number (starts at 1)
    pub epoch: usize,

    /// Mean loss over all training batches
    pub train_loss: f64,

    /// Mean loss on the validation split.
    /// Should track train_loss — divergence indicates overfitting
    pub val_loss: f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64, val_loss: f64) -> Self {
        Self { epoch, train_loss, val_loss }
    }

    /// Returns true if this epoch improved over the previous best val_loss
    pub fn is_improvement(&self, best_val_loss: f64) -> bool {
        self.val_loss < best_val_loss
    }
}

/// Logs epoch metrics to a CSV file and keeps them in memory.
pub struct MetricsLogger {
    csv_path: PathBuf,
    history:  Vec<EpochMetrics>,
}

impl MetricsLogger {
    /// Create a new MetricsLogger, starting a fresh metrics.csv.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create report directory '{}'", dir.display()))?;

        let csv_path = dir.join("metrics.csv");
        let mut f = fs::File::create(&csv_path)
            .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
        writeln!(f, "epoch,train_loss,val_loss")?;
        tracing::debug!("Created metrics CSV: '{}'", csv_path.display());

        Ok(Self { csv_path, history: Vec::new() })
    }

    /// Append one epoch's metrics as a new row in the CSV.
    pub fn log(&mut self, m: EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot append to '{}'", self.csv_path.display()))?;

        writeln!(f, "{},{:.6},{:.6}", m.epoch, m.train_loss, m.val_loss)?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.val_loss,
        );
        self.history.push(m);
        Ok(())
    }

    pub fn history(&self) -> &[EpochMetrics] {
        &self.history
    }

    /// Epoch with the lowest validation loss so far.
    pub fn best(&self) -> Option<&EpochMetrics> {
        let mut best: Option<&EpochMetrics> = None;
        for m in &self.history {
            if best.map_or(true, |b| m.is_improvement(b.val_loss)) {
                best = Some(m);
            }
        }
        best
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

impl ReportSink for MetricsLogger {
    fn on_epoch_end(&mut self, epoch: usize, train_loss: f64, val_loss: f64) -> Result<()> {
        self.log(EpochMetrics::new(epoch, train_loss, val_loss))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_improvement() {
        let m = EpochMetrics::new(2, 2.5, 2.3);
        assert!(m.is_improvement(3.0));
        assert!(!m.is_improvement(2.0));
    }

    #[test]
    fn test_sink_writes_csv_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = MetricsLogger::new(dir.path()).unwrap();
        logger.on_epoch_end(1, 0.5, 0.6).unwrap();
        logger.on_epoch_end(2, 0.25, 0.125).unwrap();

        let text = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["epoch,train_loss,val_loss", "1,0.500000,0.600000", "2,0.250000,0.125000"]);
        assert_eq!(logger.history().len(), 2);
    }

    #[test]
    fn test_best_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = MetricsLogger::new(dir.path()).unwrap();
        assert!(logger.best().is_none());
        for (epoch, val) in [(1, 0.9), (2, 0.4), (3, 0.7)] {
            logger.log(EpochMetrics::new(epoch, 1.0, val)).unwrap();
        }
        assert_eq!(logger.best().map(|m| m.epoch), Some(2));
    }

    #[test]
    fn test_new_run_truncates_old_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = MetricsLogger::new(dir.path()).unwrap();
        first.log(EpochMetrics::new(1, 1.0, 1.0)).unwrap();
        let second = MetricsLogger::new(dir.path()).unwrap();
        let text = fs::read_to_string(second.csv_path()).unwrap();
        assert_eq!(text.lines().count(), 1);
    }
}
