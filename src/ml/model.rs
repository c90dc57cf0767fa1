// ============================================================
// Layer 5 — Sequence Encoders
// ============================================================
// One trait, three model variants:
//
//   RecurrentAttention  BiGRU stack → local attention → head
//   RecurrentPlain      BiGRU stack → head
//   LocalTransformer    positional embedding → local MHA blocks
//                       → head (see transformer.rs)
//
// The recurrent variants also expose `hidden_trace`, the full
// per-layer hidden trace of one unit, which is what the
// hidden-state bridge feeds back into that unit's sections.
//
// Shapes:
//   encode:        [batch, seq, input] → [batch, seq - 2·trim, classes]
//   hidden_trace:  [timesteps, input]  → per layer [timesteps, 2, hidden]

use anyhow::{ensure, Result};
use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::ml::attention::{LocalAttention, LocalAttentionConfig};
use crate::ml::gru::{BiGru, BiGruConfig, LayerState};

// ─── SequenceEncoder ──────────────────────────────────────────────────────────
pub trait SequenceEncoder<B: Backend> {
    /// Channels expected per timestep.
    fn input_size(&self) -> usize;

    /// Timesteps dropped from each end of the output.
    fn edge_trim(&self) -> usize {
        0
    }

    /// Per-timestep logits for a batch of sections. `seeds` holds one
    /// initial state per recurrent layer; stateless encoders ignore it.
    fn encode(&self, inputs: Tensor<B, 3>, seeds: Option<Vec<LayerState<B>>>) -> Tensor<B, 3>;

    /// Per-layer `[timesteps, 2, hidden]` trace of one whole unit, or
    /// `None` for encoders without recurrent state.
    fn hidden_trace(&self, unit: Tensor<B, 2>) -> Option<Vec<Tensor<B, 3>>>;

    /// Number of bidirectional recurrent layers, i.e. how many traces
    /// `hidden_trace` returns. 0 for stateless encoders.
    fn recurrent_layers(&self) -> usize;

    /// # Errors
    /// Fails when sections of `section_len` timesteps with
    /// `input_size` channels cannot be fed to this encoder.
    fn validate_shape(&self, section_len: usize, input_size: usize) -> Result<()>;

    /// Unbatched `encode`: `[seq, input]` → `[seq - 2·trim, classes]`.
    fn encode_sequence(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let out = self.encode(input.unsqueeze::<3>(), None);
        let [_, seq, classes] = out.dims();
        out.reshape([seq, classes])
    }
}

// ─── Architecture ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Architecture {
    #[serde(rename = "gru-attention")]
    RecurrentAttention,
    #[serde(rename = "gru-plain")]
    RecurrentPlain,
    #[serde(rename = "local-transformer")]
    LocalTransformer,
}

impl Architecture {
    pub fn is_recurrent(self) -> bool {
        !matches!(self, Architecture::LocalTransformer)
    }
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Architecture::RecurrentAttention => "gru-attention",
            Architecture::RecurrentPlain     => "gru-plain",
            Architecture::LocalTransformer   => "local-transformer",
        };
        f.write_str(name)
    }
}

// ─── RecurrentEncoder ─────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct RecurrentEncoderConfig {
    pub sequence_len: usize,
    pub input_size:   usize,
    #[config(default = 32)]
    pub hidden_size: usize,
    #[config(default = 1)]
    pub num_layers: usize,
    #[config(default = 1)]
    pub classes: usize,
    #[config(default = true)]
    pub use_attention: bool,
    #[config(default = 20)]
    pub attention_window: usize,
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl RecurrentEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> RecurrentEncoder<B> {
        let layers = (0..self.num_layers)
            .map(|i| {
                let d_input = if i == 0 { self.input_size } else { 2 * self.hidden_size };
                BiGruConfig::new(d_input, self.hidden_size).init(device)
            })
            .collect();
        let attention = self.use_attention.then(|| {
            LocalAttentionConfig::new()
                .with_window(self.attention_window)
                .with_dropout(self.dropout)
                .init()
        });
        RecurrentEncoder {
            layers,
            attention,
            head:         LinearConfig::new(2 * self.hidden_size, self.classes).init(device),
            sequence_len: self.sequence_len,
            input_size:   self.input_size,
            hidden_size:  self.hidden_size,
        }
    }
}

#[derive(Module, Debug)]
pub struct RecurrentEncoder<B: Backend> {
    pub layers:       Vec<BiGru<B>>,
    pub attention:    Option<LocalAttention>,
    pub head:         Linear<B>,
    pub sequence_len: usize,
    pub input_size:   usize,
    pub hidden_size:  usize,
}

impl<B: Backend> RecurrentEncoder<B> {
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// `[batch, seq, input]` → `[batch, seq, classes]`.
    pub fn forward(&self, inputs: Tensor<B, 3>, seeds: Option<Vec<LayerState<B>>>) -> Tensor<B, 3> {
        let mut seeds = seeds.map(Vec::into_iter);
        let mut x = inputs;
        for layer in &self.layers {
            let seed = seeds.as_mut().and_then(Iterator::next);
            x = layer.forward(x, seed);
        }
        if let Some(attention) = &self.attention {
            x = attention.forward(x);
        }
        self.head.forward(x)
    }

    /// Full unit through the recurrent stack only (no attention, no
    /// head), zero initial state.
    pub fn forward_hidden(&self, unit: Tensor<B, 2>) -> Vec<Tensor<B, 3>> {
        let [timesteps, _] = unit.dims();
        let mut x = unit.unsqueeze::<3>();
        let mut traces = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            x = layer.forward(x, None);
            traces.push(x.clone().reshape([timesteps, 2, self.hidden_size]));
        }
        traces
    }
}

impl<B: Backend> SequenceEncoder<B> for RecurrentEncoder<B> {
    fn input_size(&self) -> usize {
        self.input_size
    }

    fn encode(&self, inputs: Tensor<B, 3>, seeds: Option<Vec<LayerState<B>>>) -> Tensor<B, 3> {
        self.forward(inputs, seeds)
    }

    fn hidden_trace(&self, unit: Tensor<B, 2>) -> Option<Vec<Tensor<B, 3>>> {
        Some(self.forward_hidden(unit))
    }

    fn recurrent_layers(&self) -> usize {
        self.num_layers()
    }

    fn validate_shape(&self, section_len: usize, input_size: usize) -> Result<()> {
        ensure!(section_len > 0, "section_len must be at least 1");
        ensure!(
            input_size == self.input_size,
            "series has {} channels but the model expects {}",
            input_size,
            self.input_size
        );
        if let Some(attention) = &self.attention {
            ensure!(attention.window > 0, "attention window must be at least 1");
        }
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray;

    fn encoder(use_attention: bool, num_layers: usize) -> RecurrentEncoder<TestBackend> {
        RecurrentEncoderConfig::new(20, 3)
            .with_hidden_size(8)
            .with_num_layers(num_layers)
            .with_use_attention(use_attention)
            .with_attention_window(5)
            .init(&Default::default())
    }

    #[test]
    fn test_forward_hidden_shape_per_layer() {
        let model = encoder(true, 2);
        let unit = Tensor::<TestBackend, 2>::random([37, 3], Distribution::Normal(0.0, 1.0), &Default::default());
        let traces = model.forward_hidden(unit);
        assert_eq!(traces.len(), 2);
        for trace in traces {
            assert_eq!(trace.dims(), [37, 2, 8]);
        }
    }

    #[test]
    fn test_batched_and_unbatched_encode() {
        let device = Default::default();
        for use_attention in [true, false] {
            let model = encoder(use_attention, 1);
            let batch = Tensor::<TestBackend, 3>::ones([4, 20, 3], &device);
            assert_eq!(model.encode(batch, None).dims(), [4, 20, 1]);

            let single = Tensor::<TestBackend, 2>::ones([13, 3], &device);
            assert_eq!(model.encode_sequence(single).dims(), [13, 1]);
        }
    }

    #[test]
    fn test_seeds_are_consumed_per_layer() {
        let device = Default::default();
        let model = encoder(false, 2);
        let inputs = Tensor::<TestBackend, 3>::ones([2, 6, 3], &device);
        let seeds = (0..2)
            .map(|_| LayerState {
                forward:  Tensor::ones([2, 8], &device),
                backward: Tensor::ones([2, 8], &device),
            })
            .collect();
        let seeded = model.encode(inputs.clone(), Some(seeds)).into_data().to_vec::<f32>().unwrap();
        let zeroed = model.encode(inputs, None).into_data().to_vec::<f32>().unwrap();
        assert_eq!(seeded.len(), zeroed.len());
        assert_ne!(seeded, zeroed);
    }

    #[test]
    fn test_plain_variant_has_no_attention() {
        assert!(encoder(false, 1).attention.is_none());
        assert!(encoder(true, 1).attention.is_some());
    }

    #[test]
    fn test_validate_shape_rejects_channel_mismatch() {
        let model = encoder(true, 1);
        assert!(model.validate_shape(20, 3).is_ok());
        assert!(model.validate_shape(20, 4).is_err());
        assert!(model.validate_shape(0, 3).is_err());
    }

    #[test]
    fn test_validate_shape_rejects_zero_attention_window() {
        let zero = RecurrentEncoderConfig::new(20, 3)
            .with_attention_window(0)
            .init::<TestBackend>(&Default::default());
        assert!(zero.validate_shape(20, 3).is_err());

        // Irrelevant when attention is off
        let plain = RecurrentEncoderConfig::new(20, 3)
            .with_use_attention(false)
            .with_attention_window(0)
            .init::<TestBackend>(&Default::default());
        assert!(plain.validate_shape(20, 3).is_ok());
    }

    #[test]
    fn test_recurrent_layers_matches_trace_count() {
        let model = encoder(false, 3);
        assert_eq!(model.recurrent_layers(), 3);
        let unit = Tensor::<TestBackend, 2>::ones([7, 3], &Default::default());
        assert_eq!(model.hidden_trace(unit).map(|t| t.len()), Some(3));
    }

    #[test]
    fn test_architecture_names() {
        assert_eq!(Architecture::RecurrentAttention.to_string(), "gru-attention");
        assert!(!Architecture::LocalTransformer.is_recurrent());
        let json = serde_json::to_string(&Architecture::RecurrentPlain).unwrap();
        assert_eq!(json, "\"gru-plain\"");
    }
}
