// ============================================================
// Layer 5 — Hidden-State Bridge
// ============================================================
// One unit transition, always in this order:
//
//   1. select_unit      SplitView  → UnitCursor
//   2. current_sample   the whole unit, unbatched
//   3. hidden_trace     eval-mode model, no autodiff graph
//   4. attach           UnitCursor → PreparedUnit
//   5. batches          only a PreparedUnit hands out sections
//
// The order is enforced by the types: there is no way to draw a
// section from a view without first passing through `attach`,
// and `attach` refuses a set computed for another unit, for an
// earlier selection, or with the wrong number of layers.
//
// The model passed in is the inner-backend one (`model.valid()`),
// so no gradients are tracked and dropout is off.

use anyhow::{Context, Result};
use burn::prelude::*;

use crate::data::dataset::{PreparedUnit, SplitView};
use crate::domain::hidden::HiddenStateSet;
use crate::ml::model::SequenceEncoder;

#[derive(Debug, Default)]
pub struct HiddenStateBridge {
    invocations: usize,
}

impl HiddenStateBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unit transitions performed so far.
    pub fn invocations(&self) -> usize {
        self.invocations
    }

    /// Make `unit` active in `view` and bind freshly computed hidden
    /// states to it.
    ///
    /// # Errors
    /// Fails if `unit` is out of range, the model's input width does
    /// not match the series, or the trace cannot be read back.
    pub fn prepare<B, M>(
        &mut self,
        model:  &M,
        view:   &SplitView<'_>,
        unit:   usize,
        device: &B::Device,
    ) -> Result<PreparedUnit>
    where
        B: Backend,
        M: SequenceEncoder<B>,
    {
        let cursor = view.select_unit(unit)?;
        let sample = cursor.current_sample();
        anyhow::ensure!(
            sample.input_size == model.input_size(),
            "unit {} has {} channels but the model expects {}",
            sample.unit_id,
            sample.input_size,
            model.input_size()
        );

        let input = Tensor::<B, 2>::from_data(
            TensorData::new(sample.features.to_vec(), [sample.timesteps, sample.input_size]),
            device,
        );
        let hidden = match model.hidden_trace(input) {
            Some(traces) => {
                let hidden_size = traces.first().map(|t| t.dims()[2]).unwrap_or(0);
                let host = traces
                    .into_iter()
                    .map(|t| {
                        t.into_data()
                            .to_vec::<f32>()
                            .map_err(|e| anyhow::anyhow!("reading hidden trace: {e:?}"))
                    })
                    .collect::<Result<Vec<_>>>()
                    .with_context(|| format!("unit {}", sample.unit_id))?;
                HiddenStateSet::new(sample.origin, hidden_size, host)?
            }
            None => HiddenStateSet::stateless(sample.origin),
        };

        self.invocations += 1;
        tracing::debug!(
            "Bridge: {:?} unit {} ({} steps, {} layers)",
            view.kind(),
            sample.unit_id,
            sample.timesteps,
            hidden.num_layers()
        );
        cursor.attach(hidden, model.recurrent_layers())
    }
}
