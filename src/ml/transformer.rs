// ============================================================
// Layer 5 — Local Transformer
// ============================================================
// Stateless encoder for numerical (non-tokenised) series:
//
//   x [batch, seq, dim]
//     + learned positional embedding
//     → depth × ( x + LocalMHA(norm(x))  then  x + FF(norm(x)) )
//     → LayerNorm → Linear(dim → 1, no bias)
//     → drop `slack` timesteps from each end
//
// The model width `dim` is the input channel count; there is no
// input projection. Position enters either as rotary embeddings
// on q/k or as a dynamic position bias added to the scores.
//
// Reference: Vaswani et al. (2017), Su et al. (2021) RoFormer,
//            Shazeer (2020) GLU Variants Improve Transformer

use anyhow::{ensure, Result};
use burn::{
    nn::{
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::gelu,
};

use crate::ml::attention::{
    apply_rotary, local_attend, DynamicPositionBias, DynamicPositionBiasConfig, WindowSpec,
};
use crate::ml::gru::LayerState;
use crate::ml::model::SequenceEncoder;

#[derive(Config, Debug)]
pub struct LocalTransformerConfig {
    pub max_seq_len: usize,
    /// Input channels, also the model width
    pub dim:         usize,
    pub depth:       usize,
    #[config(default = true)]
    pub causal: bool,
    #[config(default = 30)]
    pub window: usize,
    #[config(default = 32)]
    pub dim_head: usize,
    #[config(default = 1)]
    pub heads: usize,
    #[config(default = 2)]
    pub ff_mult: usize,
    #[config(default = 0.0)]
    pub attn_dropout: f64,
    #[config(default = 0.0)]
    pub ff_dropout: f64,
    #[config(default = false)]
    pub use_dynamic_pos_bias: bool,
    #[config(default = 50)]
    pub slack: usize,
}

impl LocalTransformerConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> LocalTransformer<B> {
        let blocks = (0..self.depth).map(|_| self.build_block(device)).collect();
        let dynamic_pos_bias = self.use_dynamic_pos_bias.then(|| {
            DynamicPositionBiasConfig::new((self.dim / 2).max(1), self.heads).init(device)
        });
        LocalTransformer {
            pos_emb:     EmbeddingConfig::new(self.max_seq_len, self.dim).init(device),
            blocks,
            dynamic_pos_bias,
            final_norm:  LayerNormConfig::new(self.dim).init(device),
            to_logits:   LinearConfig::new(self.dim, 1).with_bias(false).init(device),
            dim:         self.dim,
            max_seq_len: self.max_seq_len,
            window:      self.window,
            causal:      self.causal,
            heads:       self.heads,
            dim_head:    self.dim_head,
            slack:       self.slack,
        }
    }

    fn build_block<B: Backend>(&self, device: &B::Device) -> TransformerBlock<B> {
        let inner = self.heads * self.dim_head;
        let attn = LocalMha {
            norm:       LayerNormConfig::new(self.dim).init(device),
            to_qkv:     LinearConfig::new(self.dim, 3 * inner).with_bias(false).init(device),
            to_out:     LinearConfig::new(inner, self.dim).with_bias(false).init(device),
            dropout:    DropoutConfig::new(self.attn_dropout).init(),
            heads:      self.heads,
            dim_head:   self.dim_head,
            use_rotary: !self.use_dynamic_pos_bias,
        };
        let ff_inner = (self.dim * self.ff_mult * 2 / 3).max(1);
        let ff = FeedForward {
            norm:     LayerNormConfig::new(self.dim).init(device),
            proj_in:  LinearConfig::new(self.dim, 2 * ff_inner).init(device),
            proj_out: LinearConfig::new(ff_inner, self.dim).init(device),
            dropout:  DropoutConfig::new(self.ff_dropout).init(),
            inner:    ff_inner,
        };
        TransformerBlock { attn, ff }
    }
}

// ─── LocalMha ─────────────────────────────────────────────────────────────────
/// Pre-norm local multi-head attention.
#[derive(Module, Debug)]
pub struct LocalMha<B: Backend> {
    pub norm:       LayerNorm<B>,
    pub to_qkv:     Linear<B>,
    pub to_out:     Linear<B>,
    pub dropout:    Dropout,
    pub heads:      usize,
    pub dim_head:   usize,
    pub use_rotary: bool,
}

impl<B: Backend> LocalMha<B> {
    pub fn forward(&self, x: Tensor<B, 3>, spec: &WindowSpec, bias: Option<Tensor<B, 4>>) -> Tensor<B, 3> {
        let [batch, seq_len, _] = x.dims();
        let (h, d) = (self.heads, self.dim_head);
        let inner = h * d;

        let qkv = self.to_qkv.forward(self.norm.forward(x));
        // [batch, seq, h·d] → [batch·h, seq, d]
        let split_heads = |k: usize| {
            qkv.clone()
                .slice([0..batch, 0..seq_len, k * inner..(k + 1) * inner])
                .reshape([batch, seq_len, h, d])
                .swap_dims(1, 2)
                .reshape([batch * h, seq_len, d])
        };
        let (mut q, mut k, v) = (split_heads(0), split_heads(1), split_heads(2));
        if self.use_rotary {
            q = apply_rotary(q);
            k = apply_rotary(k);
        }

        let out = local_attend(q, k, v, spec, bias, &self.dropout)
            .reshape([batch, h, seq_len, d])
            .swap_dims(1, 2)
            .reshape([batch, seq_len, inner]);
        self.to_out.forward(out)
    }
}

// ─── FeedForward ──────────────────────────────────────────────────────────────
/// Pre-norm GEGLU feed-forward.
#[derive(Module, Debug)]
pub struct FeedForward<B: Backend> {
    pub norm:     LayerNorm<B>,
    pub proj_in:  Linear<B>,
    pub proj_out: Linear<B>,
    pub dropout:  Dropout,
    pub inner:    usize,
}

impl<B: Backend> FeedForward<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, seq_len, _] = x.dims();
        let projected = self.proj_in.forward(self.norm.forward(x));
        let value = projected.clone().slice([0..batch, 0..seq_len, 0..self.inner]);
        let gate = projected.slice([0..batch, 0..seq_len, self.inner..2 * self.inner]);
        self.proj_out.forward(self.dropout.forward(value * gelu(gate)))
    }
}

#[derive(Module, Debug)]
pub struct TransformerBlock<B: Backend> {
    pub attn: LocalMha<B>,
    pub ff:   FeedForward<B>,
}

// ─── LocalTransformer ─────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct LocalTransformer<B: Backend> {
    pub pos_emb:          Embedding<B>,
    pub blocks:           Vec<TransformerBlock<B>>,
    pub dynamic_pos_bias: Option<DynamicPositionBias<B>>,
    pub final_norm:       LayerNorm<B>,
    pub to_logits:        Linear<B>,
    pub dim:              usize,
    pub max_seq_len:      usize,
    pub window:           usize,
    pub causal:           bool,
    pub heads:            usize,
    pub dim_head:         usize,
    pub slack:            usize,
}

impl<B: Backend> LocalTransformer<B> {
    fn window_spec(&self) -> WindowSpec {
        WindowSpec {
            window:        self.window,
            look_backward: 1,
            look_forward:  if self.causal { 0 } else { 1 },
            causal:        self.causal,
        }
    }

    /// `[batch, seq, dim]` → `[batch, seq - 2·slack, 1]`.
    pub fn forward(&self, inputs: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch, seq_len, dim] = inputs.dims();
        let device = inputs.device();

        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device).unsqueeze::<2>();
        let pos = self.pos_emb.forward(positions).expand([batch, seq_len, dim]);
        let mut x = inputs + pos;

        let spec = self.window_spec();
        let bias = self
            .dynamic_pos_bias
            .as_ref()
            .map(|dpb| dpb.forward(&spec, batch, &device));

        for block in &self.blocks {
            x = x.clone() + block.attn.forward(x.clone(), &spec, bias.clone());
            x = x.clone() + block.ff.forward(x);
        }

        let logits = self.to_logits.forward(self.final_norm.forward(x));
        logits.slice([0..batch, self.slack..seq_len - self.slack, 0..1])
    }
}

impl<B: Backend> SequenceEncoder<B> for LocalTransformer<B> {
    fn input_size(&self) -> usize {
        self.dim
    }

    fn edge_trim(&self) -> usize {
        self.slack
    }

    fn encode(&self, inputs: Tensor<B, 3>, _seeds: Option<Vec<LayerState<B>>>) -> Tensor<B, 3> {
        self.forward(inputs)
    }

    fn hidden_trace(&self, _unit: Tensor<B, 2>) -> Option<Vec<Tensor<B, 3>>> {
        None
    }

    fn recurrent_layers(&self) -> usize {
        0
    }

    fn validate_shape(&self, section_len: usize, input_size: usize) -> Result<()> {
        ensure!(
            input_size == self.dim,
            "series has {} channels but the transformer width is {}",
            input_size,
            self.dim
        );
        ensure!(
            section_len > 2 * self.slack,
            "section_len {} leaves nothing after trimming {} steps from each end",
            section_len,
            self.slack
        );
        ensure!(
            section_len <= self.max_seq_len,
            "section_len {} exceeds max_seq_len {}",
            section_len,
            self.max_seq_len
        );
        ensure!(self.window > 0, "attention window must be at least 1");
        if self.dynamic_pos_bias.is_none() {
            ensure!(self.dim_head % 2 == 0, "rotary embedding needs an even dim_head, got {}", self.dim_head);
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

    fn config() -> LocalTransformerConfig {
        LocalTransformerConfig::new(64, 3, 2)
            .with_window(4)
            .with_dim_head(8)
            .with_heads(2)
            .with_slack(5)
    }

    #[test]
    fn test_slack_is_trimmed_from_both_ends() {
        let device = Default::default();
        let model = config().init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 3>::random([2, 30, 3], Distribution::Normal(0.0, 1.0), &device);
        assert_eq!(model.encode(x, None).dims(), [2, 20, 1]);
        assert_eq!(model.edge_trim(), 5);
    }

    #[test]
    fn test_dynamic_bias_variant_runs() {
        let device = Default::default();
        let model = config()
            .with_use_dynamic_pos_bias(true)
            .with_causal(false)
            .init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 3>::ones([1, 17, 3], &device);
        assert_eq!(model.encode(x, None).dims(), [1, 7, 1]);
    }

    #[test]
    fn test_stateless() {
        let device = Default::default();
        let model = config().init::<TestBackend>(&device);
        let unit = Tensor::<TestBackend, 2>::ones([40, 3], &device);
        assert!(model.hidden_trace(unit).is_none());
    }

    #[test]
    fn test_causal_output_ignores_future_inputs() {
        let device = Default::default();
        let model = config().with_slack(0).init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 3>::random([1, 12, 3], Distribution::Normal(0.0, 1.0), &device);
        let changed = x.clone().slice_assign([0..1, 11..12, 0..3], Tensor::ones([1, 1, 3], &device) * 9.0);

        let a = model.encode(x, None).slice([0..1, 0..11, 0..1]).into_data().to_vec::<f32>().unwrap();
        let b = model.encode(changed, None).slice([0..1, 0..11, 0..1]).into_data().to_vec::<f32>().unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-5);
        }
    }

    #[test]
    fn test_shape_validation() {
        let model = config().init::<TestBackend>(&Default::default());
        assert!(model.validate_shape(30, 3).is_ok());
        assert!(model.validate_shape(10, 3).is_err(), "10 <= 2 * slack");
        assert!(model.validate_shape(65, 3).is_err(), "longer than max_seq_len");
        assert!(model.validate_shape(30, 4).is_err(), "channel mismatch");

        let odd = config().with_dim_head(7).init::<TestBackend>(&Default::default());
        assert!(odd.validate_shape(30, 3).is_err());
    }
}
