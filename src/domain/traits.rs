// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The seams between the training core and its collaborators.
//
//   SeriesSource — where the raw time series comes from
//                  (CSV file, synthetic generator, ...)
//   ReportSink   — who hears about finished epochs
//                  (CSV logger, in-memory recorder in tests)
//
// The orchestrator only ever talks to these traits, so it can be
// exercised in tests without touching the filesystem.

use anyhow::Result;

use crate::domain::series::TimeSeries;

// ─── SeriesSource ─────────────────────────────────────────────────────────────
/// Anything that can produce a labelled time series.
pub trait SeriesSource {
    fn load(&self) -> Result<TimeSeries>;
}

// ─── ReportSink ───────────────────────────────────────────────────────────────
/// Receives one event per finished epoch. `epoch` starts at 1.
pub trait ReportSink {
    fn on_epoch_end(&mut self, epoch: usize, train_loss: f64, val_loss: f64) -> Result<()>;
}

/// Sink that discards every event.
pub struct NullSink;

impl ReportSink for NullSink {
    fn on_epoch_end(&mut self, _epoch: usize, _train_loss: f64, _val_loss: f64) -> Result<()> {
        Ok(())
    }
}
