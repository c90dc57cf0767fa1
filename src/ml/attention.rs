// ============================================================
// Layer 5 — Local (Windowed) Attention
// ============================================================
// Self-attention where each timestep only sees neighbours within
// a fixed window, so cost grows linearly with sequence length.
//
// How the windowing works:
//   1. Pad the sequence up to a multiple of `window`
//   2. Cut it into buckets of `window` timesteps
//   3. Each query bucket attends to its own bucket plus
//      `look_backward` buckets before and `look_forward` after
//   4. A mask removes padding keys, keys further than `window`
//      steps away, and (when causal) keys from the future
//   5. Un-pad the output back to the original length
//
//   window = 4, look_backward = look_forward = 1
//
//   buckets:   [ b0 ][ b1 ][ b2 ][ b3 ]
//   b1 sees:   [ b0 ][ b1 ][ b2 ]
//
// Heads are folded into the batch dimension so every tensor
// stays at rank ≤ 4: [batch * heads, buckets, window, dim].
//
// This file also holds the two positional schemes used by the
// local transformer: rotary embeddings and a dynamic position
// bias (a small MLP over relative distance).

use burn::{
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::{silu, softmax},
};

const MASK_VALUE: f32 = -1.0e9;

/// Shape of the attention neighbourhood.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpec {
    pub window:        usize,
    pub look_backward: usize,
    pub look_forward:  usize,
    pub causal:        bool,
}

impl WindowSpec {
    /// Keys visible to one query bucket.
    pub fn key_span(&self) -> usize {
        self.window * (self.look_backward + 1 + self.look_forward)
    }

    /// Distance (in timesteps) between a query at bucket position
    /// `i` and the key at look-around position `j`, relative to the
    /// same bucket origin. Positive means the key is in the past.
    fn distance(&self, i: usize, j: usize) -> isize {
        i as isize - (j as isize - (self.look_backward * self.window) as isize)
    }

    /// `[buckets, window, key_span]` — true where attention is forbidden.
    fn mask(&self, seq_len: usize, buckets: usize) -> Vec<bool> {
        let w = self.window;
        let span = self.key_span();
        let mut mask = Vec::with_capacity(buckets * w * span);
        for b in 0..buckets {
            for i in 0..w {
                let q_pos = (b * w + i) as isize;
                for j in 0..span {
                    let k_pos = q_pos - self.distance(i, j);
                    let blocked = k_pos < 0
                        || k_pos >= seq_len as isize
                        || (q_pos - k_pos).unsigned_abs() > w
                        || (self.causal && k_pos > q_pos);
                    mask.push(blocked);
                }
            }
        }
        mask
    }
}

/// Windowed attention over `[batch_heads, seq, dim]` tensors.
///
/// `bias`, when given, is added to the scores and must be
/// `[batch_heads, 1, window, key_span]` (broadcast over buckets).
pub fn local_attend<B: Backend>(
    q:       Tensor<B, 3>,
    k:       Tensor<B, 3>,
    v:       Tensor<B, 3>,
    spec:    &WindowSpec,
    bias:    Option<Tensor<B, 4>>,
    dropout: &Dropout,
) -> Tensor<B, 3> {
    let [bh, seq_len, dim] = q.dims();
    let device = q.device();
    let w = spec.window;
    let buckets = seq_len.div_ceil(w);
    let padded = buckets * w;

    let bucketize = |t: Tensor<B, 3>| pad_to(t, padded).reshape([bh, buckets, w, dim]);
    let qb = bucketize(q);
    let kb = look_around(bucketize(k), spec);
    let vb = look_around(bucketize(v), spec);

    let scale = (dim as f64).powf(-0.5);
    let mut scores = qb.matmul(kb.swap_dims(2, 3)) * scale; // [bh, buckets, w, span]
    let span = spec.key_span();
    if let Some(bias) = bias {
        scores = scores + bias.expand([bh, buckets, w, span]);
    }

    let mask = Tensor::<B, 3, Bool>::from_data(
        TensorData::new(spec.mask(seq_len, buckets), [buckets, w, span]),
        &device,
    )
    .unsqueeze::<4>()
    .expand([bh, buckets, w, span]);
    let scores = scores.mask_fill(mask, MASK_VALUE);

    let attn = dropout.forward(softmax(scores, 3));
    attn.matmul(vb)
        .reshape([bh, padded, dim])
        .slice([0..bh, 0..seq_len, 0..dim])
}

/// Zero-pad dim 1 up to `len`.
fn pad_to<B: Backend>(t: Tensor<B, 3>, len: usize) -> Tensor<B, 3> {
    let [b, n, d] = t.dims();
    if n == len {
        return t;
    }
    let zeros = Tensor::zeros([b, len - n, d], &t.device());
    Tensor::cat(vec![t, zeros], 1)
}

/// `[bh, buckets, w, d]` → `[bh, buckets, span, d]` where each bucket
/// is joined with its neighbours (zero buckets past either end).
fn look_around<B: Backend>(t: Tensor<B, 4>, spec: &WindowSpec) -> Tensor<B, 4> {
    let [bh, buckets, w, d] = t.dims();
    let device = t.device();
    let mut parts = Vec::with_capacity(3);
    if spec.look_backward > 0 {
        parts.push(Tensor::zeros([bh, spec.look_backward, w, d], &device));
    }
    parts.push(t);
    if spec.look_forward > 0 {
        parts.push(Tensor::zeros([bh, spec.look_forward, w, d], &device));
    }
    let extended = Tensor::cat(parts, 1);

    let windows = (0..=spec.look_backward + spec.look_forward)
        .map(|o| extended.clone().slice([0..bh, o..o + buckets, 0..w, 0..d]))
        .collect();
    Tensor::cat(windows, 2)
}

// ─── LocalAttention ───────────────────────────────────────────────────────────
// Parameter-free windowed self-attention over the recurrent
// output (q = k = v = x), with dropout on the attention weights.

#[derive(Config, Debug)]
pub struct LocalAttentionConfig {
    #[config(default = 20)]
    pub window: usize,
    #[config(default = 1)]
    pub look_backward: usize,
    #[config(default = 1)]
    pub look_forward: usize,
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl LocalAttentionConfig {
    pub fn init(&self) -> LocalAttention {
        LocalAttention {
            window:        self.window,
            look_backward: self.look_backward,
            look_forward:  self.look_forward,
            dropout:       DropoutConfig::new(self.dropout).init(),
        }
    }
}

#[derive(Module, Debug, Clone)]
pub struct LocalAttention {
    pub window:        usize,
    pub look_backward: usize,
    pub look_forward:  usize,
    pub dropout:       Dropout,
}

impl LocalAttention {
    fn spec(&self) -> WindowSpec {
        WindowSpec {
            window:        self.window,
            look_backward: self.look_backward,
            look_forward:  self.look_forward,
            causal:        false,
        }
    }

    /// `[batch, seq, dim]` → `[batch, seq, dim]`
    pub fn forward<B: Backend>(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        local_attend(x.clone(), x.clone(), x, &self.spec(), None, &self.dropout)
    }
}

// ─── Rotary embedding ─────────────────────────────────────────────────────────
/// Rotate pairs of channels by a position-dependent angle so that
/// q·k depends only on the distance between positions.
/// `x` is `[batch_heads, seq, dim]`, `dim` even.
pub fn apply_rotary<B: Backend>(x: Tensor<B, 3>) -> Tensor<B, 3> {
    let [bh, n, d] = x.dims();
    let half = d / 2;
    let device = x.device();

    let mut cos = Vec::with_capacity(n * d);
    let mut sin = Vec::with_capacity(n * d);
    for pos in 0..n {
        for c in 0..d {
            let freq = 10_000f32.powf(-((c % half) as f32 * 2.0) / d as f32);
            let angle = pos as f32 * freq;
            cos.push(angle.cos());
            sin.push(angle.sin());
        }
    }
    let table = |v: Vec<f32>| {
        Tensor::<B, 3>::from_data(TensorData::new(v, [1, n, d]), &device).expand([bh, n, d])
    };

    let x1 = x.clone().slice([0..bh, 0..n, 0..half]);
    let x2 = x.clone().slice([0..bh, 0..n, half..d]);
    let rotated = Tensor::cat(vec![x2.neg(), x1], 2);
    x * table(cos) + rotated * table(sin)
}

// ─── Dynamic position bias ────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct DynamicPositionBiasConfig {
    pub dim:   usize,
    pub heads: usize,
}

impl DynamicPositionBiasConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> DynamicPositionBias<B> {
        DynamicPositionBias {
            input:  LinearConfig::new(1, self.dim).init(device),
            hidden: LinearConfig::new(self.dim, self.dim).init(device),
            output: LinearConfig::new(self.dim, self.heads).init(device),
            heads:  self.heads,
        }
    }
}

/// MLP mapping relative distance → one bias per head.
#[derive(Module, Debug)]
pub struct DynamicPositionBias<B: Backend> {
    pub input:  Linear<B>,
    pub hidden: Linear<B>,
    pub output: Linear<B>,
    pub heads:  usize,
}

impl<B: Backend> DynamicPositionBias<B> {
    /// Bias shaped `[batch * heads, 1, window, key_span]` for `local_attend`.
    pub fn forward(&self, spec: &WindowSpec, batch: usize, device: &B::Device) -> Tensor<B, 4> {
        let w = spec.window;
        let span = spec.key_span();
        let distances: Vec<f32> = (0..w)
            .flat_map(|i| (0..span).map(move |j| (i, j)))
            .map(|(i, j)| spec.distance(i, j) as f32)
            .collect();

        let rel = Tensor::<B, 2>::from_data(TensorData::new(distances, [w * span, 1]), device);
        let x = silu(self.input.forward(rel));
        let x = silu(self.hidden.forward(x));
        let bias = self.output.forward(x); // [w * span, heads]

        let h = self.heads;
        bias.swap_dims(0, 1)
            .reshape([1, h, w * span])
            .expand([batch, h, w * span])
            .reshape([batch * h, 1, w, span])
    }
}
