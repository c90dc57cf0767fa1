// ============================================================
// Layer 3 — Hidden State Domain Types
// ============================================================
// A HiddenStateSet is the per-layer, per-direction hidden trace
// of one full unit, produced by the model in evaluation mode.
//
// Layout of one layer trace (row-major):
//   [timesteps, 2, hidden_size]
//          │    └── 0 = forward direction, 1 = backward direction
//          └── one row per timestep of the unit
//
// A section covering unit timesteps [s, e) is seeded with:
//   forward  ← forward state after timestep s-1   (zeros if s == 0)
//   backward ← backward state after timestep e    (zeros if e == T)
// so each direction resumes exactly where the full-unit pass
// would have been when it reached the section boundary.
//
// Every set is stamped with the TraceOrigin of the unit
// selection it was computed from. A selection hands out a fresh
// ticket each time, so a set from an earlier selection (older
// weights, older section windows) no longer matches.

use anyhow::{ensure, Result};

use crate::domain::series::Section;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    fn slot(self) -> usize {
        match self {
            Direction::Forward  => 0,
            Direction::Backward => 1,
        }
    }
}

/// Which unit selection a trace belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceOrigin {
    pub unit_id:       usize,
    pub timesteps:     usize,
    pub(crate) ticket: u64,
}

impl TraceOrigin {
    pub(crate) fn new(unit_id: usize, timesteps: usize, ticket: u64) -> Self {
        Self { unit_id, timesteps, ticket }
    }
}

/// Hidden trace of one recurrent layer over a full unit.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerTrace {
    pub layer_index: usize,
    values:          Vec<f32>,
}

/// Initial state for one layer of a section, host side.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSeed {
    pub forward:  Vec<f32>,
    pub backward: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HiddenStateSet {
    origin:      TraceOrigin,
    hidden_size: usize,
    layers:      Vec<LayerTrace>,
}

impl HiddenStateSet {
    /// Assemble a set from flat `[timesteps, 2, hidden_size]` traces.
    pub fn new(origin: TraceOrigin, hidden_size: usize, traces: Vec<Vec<f32>>) -> Result<Self> {
        let timesteps = origin.timesteps;
        let expected = timesteps * 2 * hidden_size;
        let mut layers = Vec::with_capacity(traces.len());
        for (layer_index, values) in traces.into_iter().enumerate() {
            ensure!(
                values.len() == expected,
                "layer {} trace has {} values, expected {} ({} × 2 × {})",
                layer_index,
                values.len(),
                expected,
                timesteps,
                hidden_size
            );
            layers.push(LayerTrace { layer_index, values });
        }
        Ok(Self { origin, hidden_size, layers })
    }

    /// A set for encoders that keep no state between calls.
    pub fn stateless(origin: TraceOrigin) -> Self {
        Self { origin, hidden_size: 0, layers: Vec::new() }
    }

    pub fn origin(&self) -> TraceOrigin { self.origin }

    pub fn unit_id(&self) -> usize { self.origin.unit_id }

    pub fn timesteps(&self) -> usize { self.origin.timesteps }

    pub fn num_layers(&self) -> usize { self.layers.len() }

    pub fn is_stateless(&self) -> bool { self.layers.is_empty() }

    /// Hidden state of `direction` in `layer` at unit timestep `t`.
    pub fn state(&self, layer: usize, direction: Direction, t: usize) -> &[f32] {
        let h = self.hidden_size;
        let offset = (t * 2 + direction.slot()) * h;
        &self.layers[layer].values[offset..offset + h]
    }

    /// Per-layer seeds for a section, following the boundary rule
    /// described at the top of this file.
    pub fn seeds_for(&self, section: &Section) -> Vec<LayerSeed> {
        let zeros = vec![0.0f32; self.hidden_size];
        (0..self.layers.len())
            .map(|layer| {
                let forward = match section.start {
                    0 => zeros.clone(),
                    s => self.state(layer, Direction::Forward, s - 1).to_vec(),
                };
                let backward = if section.end() >= self.origin.timesteps {
                    zeros.clone()
                } else {
                    self.state(layer, Direction::Backward, section.end()).to_vec()
                };
                LayerSeed { forward, backward }
            })
            .collect()
    }
}
