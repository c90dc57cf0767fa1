// ============================================================
// Layer 5 — Bidirectional GRU Layer
// ============================================================
// One layer = two Burn `Gru` modules, one per direction.
//
//   forward:   x[0] → x[1] → ... → x[T-1]      seeded with state.forward
//   backward:  x[T-1] → ... → x[1] → x[0]      seeded with state.backward
//
// The backward module runs on the time-flipped input and its
// output is flipped back, so position t of both halves refers to
// the same timestep.
//
// Layers are stacked by the encoder rather than by a multi-layer
// module, so every layer's full per-direction trace is available
// to the hidden-state bridge.
//
// Layer output is [batch, seq, 2 * hidden] with the forward
// direction in the first half and the backward direction in
// the second, so reshaping one unbatched output to
// [seq, 2, hidden] splits it cleanly by direction.

use burn::{
    nn::gru::{Gru, GruConfig},
    prelude::*,
};

/// Initial state of one bidirectional layer, `[batch, hidden]` each.
#[derive(Debug, Clone)]
pub struct LayerState<B: Backend> {
    pub forward:  Tensor<B, 2>,
    pub backward: Tensor<B, 2>,
}

#[derive(Config, Debug)]
pub struct BiGruConfig {
    pub d_input:  usize,
    pub d_hidden: usize,
}

impl BiGruConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> BiGru<B> {
        let direction = GruConfig::new(self.d_input, self.d_hidden, true);
        BiGru {
            forward_dir:  direction.init(device),
            backward_dir: direction.init(device),
            d_hidden:     self.d_hidden,
        }
    }
}

#[derive(Module, Debug)]
pub struct BiGru<B: Backend> {
    pub forward_dir:  Gru<B>,
    pub backward_dir: Gru<B>,
    pub d_hidden:     usize,
}

impl<B: Backend> BiGru<B> {
    /// `[batch, seq, d_input]` → `[batch, seq, 2 * d_hidden]`.
    /// Missing state starts both directions from zeros.
    pub fn forward(&self, input: Tensor<B, 3>, state: Option<LayerState<B>>) -> Tensor<B, 3> {
        let (fwd_state, bwd_state) = match state {
            Some(LayerState { forward, backward }) => (Some(forward), Some(backward)),
            None => (None, None),
        };

        let fwd = self.forward_dir.forward(input.clone(), fwd_state);
        let bwd = self.backward_dir.forward(input.flip([1]), bwd_state).flip([1]);
        Tensor::cat(vec![fwd, bwd], 2)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn layer(d_input: usize, d_hidden: usize) -> BiGru<TestBackend> {
        BiGruConfig::new(d_input, d_hidden).init(&Default::default())
    }

    fn values(t: Tensor<TestBackend, 3>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_output_shape() {
        let gru = layer(3, 8);
        let input = Tensor::<TestBackend, 3>::ones([2, 11, 3], &Default::default());
        assert_eq!(gru.forward(input, None).dims(), [2, 11, 16]);
    }

    #[test]
    fn test_zero_state_matches_no_state() {
        let device = Default::default();
        let gru = layer(2, 4);
        let input = Tensor::<TestBackend, 3>::random(
            [1, 6, 2],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let zeros = LayerState {
            forward:  Tensor::zeros([1, 4], &device),
            backward: Tensor::zeros([1, 4], &device),
        };
        let a = values(gru.forward(input.clone(), None));
        let b = values(gru.forward(input, Some(zeros)));
        assert_eq!(a, b);
    }

    #[test]
    fn test_seed_changes_output() {
        let device = Default::default();
        let gru = layer(2, 4);
        let input = Tensor::<TestBackend, 3>::ones([1, 5, 2], &device);
        let seeded = LayerState {
            forward:  Tensor::ones([1, 4], &device),
            backward: Tensor::ones([1, 4], &device),
        };
        let a = values(gru.forward(input.clone(), None));
        let b = values(gru.forward(input, Some(seeded)));
        assert_ne!(a, b);
    }

    #[test]
    fn test_backward_half_runs_in_reverse_time() {
        // The last timestep of the backward half has only seen x[T-1],
        // so it must not change when earlier inputs do.
        let device = Default::default();
        let gru = layer(1, 3);
        let a = Tensor::<TestBackend, 3>::from_data(TensorData::new(vec![0.0f32, 0.0, 1.0], [1, 3, 1]), &device);
        let b = Tensor::<TestBackend, 3>::from_data(TensorData::new(vec![5.0f32, -5.0, 1.0], [1, 3, 1]), &device);
        let last_bwd = |x| values(gru.forward(x, None).slice([0..1, 2..3, 3..6]));
        let first_fwd = |x| values(gru.forward(x, None).slice([0..1, 0..1, 0..3]));
        assert_eq!(last_bwd(a.clone()), last_bwd(b.clone()));
        assert_ne!(first_fwd(a), first_fwd(b));
    }

    #[test]
    fn test_split_sequence_resumes_from_seed() {
        // Running [0, 6) at once must equal running [3, 6) seeded
        // with the forward state at t = 2 (forward half only).
        let device = Default::default();
        let gru = layer(2, 3);
        let input = Tensor::<TestBackend, 3>::random(
            [1, 6, 2],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let full = gru.forward(input.clone(), None);
        let fwd_full = full.clone().slice([0..1, 3..6, 0..3]);
        let carry = full.slice([0..1, 2..3, 0..3]).reshape([1, 3]);

        let tail = input.slice([0..1, 3..6, 0..2]);
        let resumed = gru.forward(
            tail,
            Some(LayerState { forward: carry, backward: Tensor::zeros([1, 3], &device) }),
        );
        let fwd_resumed = resumed.slice([0..1, 0..3, 0..3]);

        let a = values(fwd_full);
        let b = values(fwd_resumed);
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-5, "{x} vs {y}");
        }
    }
}
