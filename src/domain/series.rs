// ============================================================
// Layer 3 — Time Series Domain Types
// ============================================================
// A long recording of multi-channel measurements with one
// binary label per timestep ("transient event" or not).
//
// The series is cut into contiguous UNITS once, at dataset
// construction. Units never change size afterwards. Inside a
// unit, fixed-length SECTIONS are the atomic training examples.
//
//   timesteps:  0 ........................................ T
//   units:      |   unit 0   |   unit 1   |   unit 2   |u3 |
//   sections:   | s | s | s  |  s | s | s |...
//
// Section offsets are relative to the start of their unit.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// An immutable multi-channel series with per-timestep labels.
/// Features are stored row-major: `[timesteps, input_size]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    input_size: usize,
    features:   Vec<f32>,
    labels:     Vec<f32>,
}

impl TimeSeries {
    /// Build a series, rejecting feature/label length mismatches.
    pub fn new(input_size: usize, features: Vec<f32>, labels: Vec<f32>) -> Result<Self> {
        ensure!(input_size > 0, "input_size must be at least 1");
        ensure!(
            features.len() == labels.len() * input_size,
            "feature buffer holds {} values but {} labels × {} channels were expected",
            features.len(),
            labels.len(),
            input_size
        );
        Ok(Self { input_size, features, labels })
    }

    pub fn input_size(&self) -> usize { self.input_size }

    pub fn timesteps(&self) -> usize { self.labels.len() }

    /// Feature rows `[start, start + len)` as one flat slice.
    pub fn feature_rows(&self, start: usize, len: usize) -> &[f32] {
        &self.features[start * self.input_size..(start + len) * self.input_size]
    }

    pub fn label_rows(&self, start: usize, len: usize) -> &[f32] {
        &self.labels[start..start + len]
    }

    /// Partition the series into `unit_count` contiguous units.
    /// Every unit gets `T / unit_count` timesteps; the remainder
    /// is appended to the last unit so no timestep is dropped.
    pub fn partition(&self, unit_count: usize) -> Result<Vec<UnitSpan>> {
        ensure!(unit_count > 0, "unit_count must be at least 1");
        let total = self.timesteps();
        ensure!(
            total >= unit_count,
            "cannot split {} timesteps into {} units",
            total,
            unit_count
        );

        let base = total / unit_count;
        let units = (0..unit_count)
            .map(|id| {
                let start = id * base;
                let len = if id + 1 == unit_count { total - start } else { base };
                UnitSpan { id, start, len }
            })
            .collect();
        Ok(units)
    }
}

/// A contiguous partition of the series. `start` is absolute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSpan {
    pub id:    usize,
    pub start: usize,
    pub len:   usize,
}

impl UnitSpan {
    pub fn end(&self) -> usize { self.start + self.len }
}

/// A fixed-length window inside a unit. `start` is unit-relative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Section {
    pub start: usize,
    pub len:   usize,
}

impl Section {
    pub fn end(&self) -> usize { self.start + self.len }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn series(timesteps: usize) -> TimeSeries {
        let features = (0..timesteps * 2).map(|v| v as f32).collect();
        TimeSeries::new(2, features, vec![0.0; timesteps]).unwrap()
    }

    #[test]
    fn test_partition_covers_every_timestep() {
        let units = series(103).partition(4).unwrap();
        assert_eq!(units.len(), 4);
        assert_eq!(units[0], UnitSpan { id: 0, start: 0, len: 25 });
        // Remainder of 3 lands on the last unit
        assert_eq!(units[3].len, 28);
        assert_eq!(units[3].end(), 103);
        for pair in units.windows(2) {
            assert_eq!(pair[0].end(), pair[1].start);
        }
    }

    #[test]
    fn test_mismatched_buffers_are_rejected() {
        assert!(TimeSeries::new(3, vec![0.0; 10], vec![0.0; 3]).is_err());
    }

    #[test]
    fn test_more_units_than_timesteps_is_rejected() {
        assert!(series(3).partition(4).is_err());
    }

    #[test]
    fn test_feature_rows_are_row_major() {
        let s = series(5);
        assert_eq!(s.feature_rows(1, 2), &[2.0, 3.0, 4.0, 5.0]);
    }
}
