// ============================================================
// Layer 4 — Series Loaders
// ============================================================
// Two implementations of the SeriesSource trait:
//
//   CsvSeriesLoader  — reads a CSV file with a header row.
//                      Every column but the last is a feature
//                      channel; the last column is the 0/1 label.
//
//                        ch0,ch1,ch2,label
//                        0.12,0.40,-1.3,0
//                        0.15,0.38,-1.2,1
//
//   SyntheticSeries  — a seeded multi-channel signal (slow
//                      sinusoids + noise) with short transient
//                      bursts injected and labelled 1. Used for
//                      demos (`train --synthetic N`) and tests.

use anyhow::{bail, ensure, Context, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::path::PathBuf;

use crate::domain::series::TimeSeries;
use crate::domain::traits::SeriesSource;

// ─── CSV ──────────────────────────────────────────────────────────────────────
pub struct CsvSeriesLoader {
    path: PathBuf,
}

impl CsvSeriesLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SeriesSource for CsvSeriesLoader {
    fn load(&self) -> Result<TimeSeries> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .with_context(|| format!("Cannot open series file '{}'", self.path.display()))?;

        let width = reader
            .headers()
            .with_context(|| format!("Cannot read header of '{}'", self.path.display()))?
            .len();
        ensure!(
            width >= 2,
            "'{}' needs at least one feature column and a label column",
            self.path.display()
        );
        let input_size = width - 1;

        let mut features = Vec::new();
        let mut labels   = Vec::new();

        for (row, record) in reader.records().enumerate() {
            let record = record
                .with_context(|| format!("Malformed CSV row {} in '{}'", row + 1, self.path.display()))?;
            if record.len() != width {
                bail!(
                    "row {} of '{}' has {} columns, header declares {}",
                    row + 1,
                    self.path.display(),
                    record.len(),
                    width
                );
            }
            for (col, field) in record.iter().enumerate() {
                let value: f32 = field.parse().with_context(|| {
                    format!("row {} column {}: '{}' is not a number", row + 1, col, field)
                })?;
                if col < input_size {
                    features.push(value);
                } else {
                    labels.push(if value >= 0.5 { 1.0 } else { 0.0 });
                }
            }
        }

        tracing::info!(
            "Loaded {} timesteps × {} channels from '{}'",
            labels.len(),
            input_size,
            self.path.display()
        );
        TimeSeries::new(input_size, features, labels)
    }
}

// ─── Synthetic ────────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct SyntheticSeries {
    pub timesteps:  usize,
    pub input_size: usize,
    /// Probability that a transient burst starts at any timestep
    pub event_rate: f64,
    pub seed:       u64,
}

impl SyntheticSeries {
    pub fn new(timesteps: usize, input_size: usize, seed: u64) -> Self {
        Self { timesteps, input_size, event_rate: 0.01, seed }
    }
}

const BURST_LEN: usize = 6;

impl SeriesSource for SyntheticSeries {
    fn load(&self) -> Result<TimeSeries> {
        ensure!(self.timesteps > 0, "synthetic series needs at least one timestep");
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut labels = vec![0.0f32; self.timesteps];
        let mut t = 0;
        while t < self.timesteps {
            if rng.gen_bool(self.event_rate) {
                let end = (t + BURST_LEN).min(self.timesteps);
                labels[t..end].iter_mut().for_each(|l| *l = 1.0);
                t = end;
            } else {
                t += 1;
            }
        }

        let mut features = Vec::with_capacity(self.timesteps * self.input_size);
        for (t, &label) in labels.iter().enumerate() {
            for ch in 0..self.input_size {
                let period = 50.0 + 25.0 * ch as f32;
                let base  = (t as f32 * std::f32::consts::TAU / period).sin();
                let noise = rng.gen_range(-0.1f32..0.1);
                let burst = if label > 0.0 { 2.5 } else { 0.0 };
                features.push(base + noise + burst);
            }
        }

        tracing::debug!(
            "Generated synthetic series: {} timesteps, {} events",
            self.timesteps,
            labels.iter().filter(|&&l| l > 0.0).count()
        );
        TimeSeries::new(self.input_size, features, labels)
    }
}
