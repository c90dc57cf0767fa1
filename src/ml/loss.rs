// ============================================================
// Layer 5 — Binary Cross-Entropy with Logits
// ============================================================
// Burn's BinaryCrossEntropyLoss in logits mode:
//
//   ℓ(x, y) = (1 − y)·x − log σ(x)
//
// averaged over every element. Logits come straight from the
// model head; no sigmoid is applied beforehand. Labels are 0/1
// floats in the batch and become Int targets here.

use burn::{nn::loss::BinaryCrossEntropyLossConfig, prelude::*};

/// Mean BCE over all elements of `logits` and `targets` (same shape).
pub fn bce_with_logits<B: Backend, const D: usize>(
    logits:  Tensor<B, D>,
    targets: Tensor<B, D>,
) -> Tensor<B, 1> {
    BinaryCrossEntropyLossConfig::new()
        .with_logits(true)
        .init(&logits.device())
        .forward(logits, targets.int())
}

/// Cut `trim` timesteps from each end of `[batch, seq, classes]`
/// targets so they line up with a trimming encoder's output.
pub fn trim_targets<B: Backend>(targets: Tensor<B, 3>, trim: usize) -> Tensor<B, 3> {
    if trim == 0 {
        return targets;
    }
    let [batch, seq_len, classes] = targets.dims();
    targets.slice([0..batch, trim..seq_len - trim, 0..classes])
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn reference(x: f32, y: f32) -> f32 {
        let p = 1.0 / (1.0 + (-x).exp());
        -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
    }

    #[test]
    fn test_matches_textbook_formula() {
        let device = Default::default();
        let xs = [-3.0f32, -0.5, 0.0, 0.7, 4.0, 2.0];
        let ys = [0.0f32, 1.0, 1.0, 0.0, 1.0, 0.0];
        let logits = Tensor::<TestBackend, 1>::from_floats(xs, &device);
        let targets = Tensor::<TestBackend, 1>::from_floats(ys, &device);

        let got = bce_with_logits(logits, targets).into_scalar();
        let expected = xs.iter().zip(&ys).map(|(&x, &y)| reference(x, y)).sum::<f32>() / xs.len() as f32;
        assert!((got - expected).abs() < 1e-5, "{got} vs {expected}");
    }

    #[test]
    fn test_large_logits_stay_finite() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 1>::from_floats([200.0, -200.0], &device);
        let targets = Tensor::<TestBackend, 1>::from_floats([0.0, 1.0], &device);
        let loss = bce_with_logits(logits, targets).into_scalar();
        assert!(loss.is_finite());
        assert!((loss - 200.0).abs() < 1e-3);
    }

    #[test]
    fn test_trim_targets() {
        let device = Default::default();
        let targets = Tensor::<TestBackend, 3>::ones([2, 10, 1], &device);
        assert_eq!(trim_targets(targets.clone(), 3).dims(), [2, 4, 1]);
        assert_eq!(trim_targets(targets, 0).dims(), [2, 10, 1]);
    }
}
