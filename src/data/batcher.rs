// ============================================================
// Layer 4 — Section Batcher
// ============================================================
// Stacks a Vec<SectionItem> into device tensors.
//
//   Input:  N items, each `section_len` timesteps × `input_size`
//   Output: inputs  [N, section_len, input_size]
//           targets [N, section_len, 1]
//           seeds   per layer: forward [N, hidden], backward [N, hidden]
//
// Seeds are only present when the items carry them (recurrent
// encoders); a stateless encoder gets `None`.
//
// Every item of one PreparedUnit has the same section length and
// seed layout, so items are stacked without further checks.

use std::sync::Arc;

use burn::{
    data::{
        dataloader::{batcher::Batcher, DataLoader, DataLoaderBuilder},
        dataset::Dataset,
    },
    prelude::*,
};

use crate::data::dataset::{PreparedUnit, SectionItem};
use crate::ml::gru::LayerState;

#[derive(Debug, Clone)]
pub struct SectionBatch<B: Backend> {
    pub inputs:  Tensor<B, 3>,
    pub targets: Tensor<B, 3>,
    pub seeds:   Option<Vec<LayerState<B>>>,
}

#[derive(Clone, Debug, Default)]
pub struct SectionBatcher;

// ─── Burn Batcher Trait Implementation ────────────────────────────────────────
impl<B: Backend> Batcher<B, SectionItem, SectionBatch<B>> for SectionBatcher {
    fn batch(&self, items: Vec<SectionItem>, device: &B::Device) -> SectionBatch<B> {
        let batch_size = items.len();
        let seq_len    = items.first().map_or(0, |s| s.labels.len());
        let width      = items.first().map_or(0, |s| s.features.len() / seq_len.max(1));
        let num_layers = items.first().map_or(0, |s| s.seeds.len());

        let input_flat: Vec<f32> = items.iter().flat_map(|s| s.features.iter().copied()).collect();
        let label_flat: Vec<f32> = items.iter().flat_map(|s| s.labels.iter().copied()).collect();

        let inputs = Tensor::<B, 3>::from_data(
            TensorData::new(input_flat, [batch_size, seq_len, width]),
            device,
        );
        let targets = Tensor::<B, 3>::from_data(
            TensorData::new(label_flat, [batch_size, seq_len, 1]),
            device,
        );

        let seeds = (num_layers > 0).then(|| {
            (0..num_layers)
                .map(|layer| {
                    let hidden = items[0].seeds[layer].forward.len();
                    let stack = |flat: Vec<f32>| {
                        Tensor::<B, 2>::from_data(TensorData::new(flat, [batch_size, hidden]), device)
                    };
                    LayerState {
                        forward: stack(
                            items.iter().flat_map(|s| s.seeds[layer].forward.iter().copied()).collect(),
                        ),
                        backward: stack(
                            items.iter().flat_map(|s| s.seeds[layer].backward.iter().copied()).collect(),
                        ),
                    }
                })
                .collect()
        });

        SectionBatch { inputs, targets, seeds }
    }
}

/// Mini-batch loader over one prepared unit. `shuffle` carries the
/// seed for a shuffled pass; `None` keeps section order.
pub fn section_loader<B: Backend>(
    unit:       PreparedUnit,
    batch_size: usize,
    shuffle:    Option<u64>,
    device:     &B::Device,
) -> Arc<dyn DataLoader<B, SectionBatch<B>>> {
    tracing::trace!("Loader for unit {}: {} sections", unit.unit_id(), unit.len());
    let builder = DataLoaderBuilder::<B, _, _>::new(SectionBatcher)
        .batch_size(batch_size.max(1))
        .set_device(device.clone());
    match shuffle {
        Some(seed) => builder.shuffle(seed).build(unit),
        None => builder.build(unit),
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::UnitDataset;
    use crate::data::splitter::SplitAssignment;
    use crate::domain::hidden::{HiddenStateSet, LayerSeed};
    use crate::domain::series::TimeSeries;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn item(start: usize, seeds: Vec<LayerSeed>) -> SectionItem {
        SectionItem {
            unit_id:  0,
            start,
            features: (0..8).map(|v| (start * 10 + v) as f32).collect(),
            labels:   vec![0.0, 1.0, 0.0, 1.0],
            seeds,
        }
    }

    fn batch(items: Vec<SectionItem>) -> SectionBatch<TestBackend> {
        Batcher::<TestBackend, _, _>::batch(&SectionBatcher, items, &Default::default())
    }

    /// One unit of 100 timesteps cut into 5 sections; channel value = timestep.
    fn prepared() -> PreparedUnit {
        let series = TimeSeries::new(1, (0..100).map(|t| t as f32).collect(), vec![0.0; 100]).unwrap();
        let split = SplitAssignment { train: vec![0], validation: vec![], test: vec![] };
        let ds = UnitDataset::new(series, 1, 20, split, 0).unwrap();
        let cursor = ds.train_view().select_unit(0).unwrap();
        let origin = cursor.origin();
        cursor.attach(HiddenStateSet::stateless(origin), 0).unwrap()
    }

    fn first_values(loader: &Arc<dyn DataLoader<TestBackend, SectionBatch<TestBackend>>>) -> Vec<f32> {
        loader
            .iter()
            .flat_map(|b| {
                let [n, len, _] = b.inputs.dims();
                let v = b.inputs.into_data().to_vec::<f32>().unwrap();
                (0..n).map(move |i| v[i * len]).collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn test_batch_shapes() {
        let seed = LayerSeed { forward: vec![1.0; 3], backward: vec![2.0; 3] };
        let batch = batch(vec![item(0, vec![seed.clone()]), item(4, vec![seed])]);

        assert_eq!(batch.inputs.dims(), [2, 4, 2]);
        assert_eq!(batch.targets.dims(), [2, 4, 1]);
        let seeds = batch.seeds.unwrap();
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].forward.dims(), [2, 3]);
        assert_eq!(seeds[0].backward.clone().into_data().to_vec::<f32>().unwrap(), vec![2.0; 6]);
    }

    #[test]
    fn test_rows_keep_item_order() {
        let batch = batch(vec![item(4, vec![]), item(0, vec![])]);
        let values = batch.inputs.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values[0], 40.0);
        assert_eq!(values[8], 0.0);
        assert!(batch.seeds.is_none());
    }

    #[test]
    fn test_unshuffled_loader_keeps_section_order() {
        let loader = section_loader::<TestBackend>(prepared(), 2, None, &Default::default());
        let sizes: Vec<usize> = loader.iter().map(|b| b.inputs.dims()[0]).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(first_values(&loader), vec![0.0, 20.0, 40.0, 60.0, 80.0]);
    }

    #[test]
    fn test_shuffled_loader_covers_every_section_once() {
        let loader = section_loader::<TestBackend>(prepared(), 2, Some(3), &Default::default());
        let first = first_values(&loader);
        let mut starts = first.clone();
        starts.sort_by(f32::total_cmp);
        assert_eq!(starts, vec![0.0, 20.0, 40.0, 60.0, 80.0]);

        // Same seed, fresh loader: same first pass
        let again = section_loader::<TestBackend>(prepared(), 2, Some(3), &Default::default());
        assert_eq!(first_values(&again), first);
    }
}
