// ============================================================
// Layer 4 — Unit Split Assignment
// ============================================================
// Assigns every unit id to exactly one of three sets:
//   - train:      used to update model weights
//   - validation: loss tracked per epoch, no updates
//   - test:       held out until evaluation
//
// Whole units are assigned, never individual sections, so no
// section of a held-out unit can leak into training.
//
// Ids are shuffled with a seeded Fisher-Yates shuffle
// (rand::seq::SliceRandom) so the same seed always reproduces
// the same split. The `evaluate` command relies on this to
// rebuild the exact test set of a finished run.
//
// Counts: test = round(U * test_fraction), then
//         validation = round(U * val_fraction) (clamped to what
//         is left), everything else trains.
//
// Rounding both counts up can swallow every unit even though the
// fractions leave room for training (U = 4, 0.4 + 0.4). While the
// fractions sum below 1, units are given back to training one at
// a time, each from whichever count was rounded up the most.

use anyhow::{ensure, Result};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitAssignment {
    pub train:      Vec<usize>,
    pub validation: Vec<usize>,
    pub test:       Vec<usize>,
}

impl SplitAssignment {
    pub fn unit_count(&self) -> usize {
        self.train.len() + self.validation.len() + self.test.len()
    }
}

/// Shuffle unit ids `0..unit_count` with `seed` and split them.
///
/// # Errors
/// Fails when a fraction is outside `[0, 1]`, the fractions sum
/// above 1, or no unit is left for training.
pub fn split_units(
    unit_count:    usize,
    test_fraction: f64,
    val_fraction:  f64,
    seed:          u64,
) -> Result<SplitAssignment> {
    ensure!(
        (0.0..=1.0).contains(&test_fraction) && (0.0..=1.0).contains(&val_fraction),
        "split fractions must lie in [0, 1] (test={test_fraction}, val={val_fraction})"
    );
    ensure!(
        test_fraction + val_fraction <= 1.0,
        "test ({test_fraction}) + validation ({val_fraction}) fractions exceed 1"
    );

    let mut ids: Vec<usize> = (0..unit_count).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    ids.shuffle(&mut rng);

    let exact_test = unit_count as f64 * test_fraction;
    let exact_val  = unit_count as f64 * val_fraction;
    let mut test_count = (exact_test.round() as usize).min(unit_count);
    let mut val_count  = (exact_val.round() as usize).min(unit_count - test_count);

    if test_fraction + val_fraction < 1.0 {
        while test_count + val_count >= unit_count && test_count + val_count > 0 {
            let excess_test = test_count as f64 - exact_test;
            let excess_val  = val_count as f64 - exact_val;
            if test_count > 0 && (val_count == 0 || excess_test >= excess_val) {
                test_count -= 1;
            } else {
                val_count -= 1;
            }
        }
    }

    ensure!(
        test_count + val_count < unit_count,
        "no unit left for training: {} units, {} test, {} validation",
        unit_count,
        test_count,
        val_count
    );

    // split_off(n) leaves [0..n) in place and returns [n..)
    let mut train = ids.split_off(test_count + val_count);
    let mut validation = ids.split_off(test_count);
    let mut test = ids;

    train.sort_unstable();
    validation.sort_unstable();
    test.sort_unstable();

    tracing::debug!(
        "Unit split: {} train, {} validation, {} test",
        train.len(),
        validation.len(),
        test.len()
    );

    Ok(SplitAssignment { train, validation, test })
}
