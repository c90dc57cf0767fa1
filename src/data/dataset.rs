// ============================================================
// Layer 4 — Unit-Chunked Dataset
// ============================================================
// One long series, cut into units, with three views over it:
//
//   UnitDataset ──► train_view()       resampled sections, train units
//               ──► validation_view()  tiled sections, validation units
//               ──► test_view()        tiled sections, test units
//
// All views share the same TimeSeries; nothing is copied until a
// section item is materialised.
//
// Drawing examples from a unit is a three-step type-state walk:
//
//   SplitView::select_unit(u)     → UnitCursor     (active unit chosen)
//   UnitCursor::current_sample()  → UnitSample     (full unit, unbatched)
//   UnitCursor::attach(hidden, n) → PreparedUnit   (hidden states bound)
//
// Only a PreparedUnit can hand out section items (and only a
// PreparedUnit can be turned into a DataLoader). attach() refuses
// hidden states computed for another unit, another length or an
// earlier selection, and a stateless set when the encoder has
// recurrent layers. A batch can therefore never be built from
// stale or missing hidden state.
//
// Units outside a view's split are still selectable (the training
// schedule walks every unit id) but their PreparedUnit is empty.

use anyhow::{ensure, Context, Result};
use burn::data::dataset::Dataset;
use rand::{rngs::StdRng, SeedableRng};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use crate::data::sections::SectionLayout;
use crate::data::splitter::SplitAssignment;
use crate::domain::hidden::{HiddenStateSet, LayerSeed, TraceOrigin};
use crate::domain::series::{Section, TimeSeries, UnitSpan};

// ─── SectionItem ──────────────────────────────────────────────────────────────
/// One training example: a section plus the seeds of every layer.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionItem {
    pub unit_id:  usize,
    /// Unit-relative start of the section
    pub start:    usize,
    /// Row-major `[section_len, input_size]`
    pub features: Vec<f32>,
    /// One 0/1 label per timestep
    pub labels:   Vec<f32>,
    /// Empty for stateless encoders
    pub seeds:    Vec<LayerSeed>,
}

// ─── UnitDataset ──────────────────────────────────────────────────────────────
pub struct UnitDataset {
    series:      Arc<TimeSeries>,
    units:       Vec<UnitSpan>,
    split:       SplitAssignment,
    section_len: usize,
    /// Training layouts, indexed by unit id
    layouts:     Vec<SectionLayout>,
    rng:         StdRng,
    /// Next selection ticket
    tickets:     AtomicU64,
}

impl UnitDataset {
    /// Partition `series` into `unit_count` units and prepare the
    /// initial (tiled) training layouts.
    ///
    /// # Errors
    /// Fails if any unit is shorter than one section or the split
    /// does not cover exactly `unit_count` units.
    pub fn new(
        series:      TimeSeries,
        unit_count:  usize,
        section_len: usize,
        split:       SplitAssignment,
        seed:        u64,
    ) -> Result<Self> {
        ensure!(section_len > 0, "section_len must be at least 1");
        let units = series.partition(unit_count)?;
        ensure!(
            split.unit_count() == unit_count,
            "split assigns {} units but the series has {}",
            split.unit_count(),
            unit_count
        );
        let shortest = units.iter().map(|u| u.len).min().unwrap_or(0);
        ensure!(
            shortest >= section_len,
            "section_len {} is longer than the shortest unit ({} timesteps)",
            section_len,
            shortest
        );

        let layouts = units
            .iter()
            .map(|u| SectionLayout::tiled(u.len, section_len))
            .collect();

        tracing::info!(
            "Dataset: {} timesteps, {} units of ~{} steps, section_len={}",
            series.timesteps(),
            unit_count,
            shortest,
            section_len
        );

        Ok(Self {
            series: Arc::new(series),
            units,
            split,
            section_len,
            layouts,
            rng: StdRng::seed_from_u64(seed),
            tickets: AtomicU64::new(0),
        })
    }

    pub fn unit_count(&self) -> usize { self.units.len() }

    pub fn input_size(&self) -> usize { self.series.input_size() }

    pub fn section_len(&self) -> usize { self.section_len }

    pub fn split(&self) -> &SplitAssignment { &self.split }

    /// Pick new section boundaries for every unit of the training view.
    /// Validation and test views are unaffected.
    pub fn random_subsample(&mut self) {
        for layout in &mut self.layouts {
            layout.resample(&mut self.rng);
        }
        tracing::debug!("Resampled section windows for {} units", self.layouts.len());
    }

    pub fn train_view(&self) -> SplitView<'_> {
        self.view(SplitKind::Train, &self.split.train, Some(&self.layouts))
    }

    pub fn validation_view(&self) -> SplitView<'_> {
        self.view(SplitKind::Validation, &self.split.validation, None)
    }

    pub fn test_view(&self) -> SplitView<'_> {
        self.view(SplitKind::Test, &self.split.test, None)
    }

    fn view<'a>(
        &'a self,
        kind:    SplitKind,
        members: &'a [usize],
        layouts: Option<&'a [SectionLayout]>,
    ) -> SplitView<'a> {
        SplitView {
            kind,
            series: &self.series,
            tickets: &self.tickets,
            units: &self.units,
            members,
            layouts,
            section_len: self.section_len,
        }
    }
}

// ─── SplitView ────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitKind {
    Train,
    Validation,
    Test,
}

#[derive(Clone, Copy)]
pub struct SplitView<'a> {
    kind:        SplitKind,
    series:      &'a Arc<TimeSeries>,
    tickets:     &'a AtomicU64,
    units:       &'a [UnitSpan],
    members:     &'a [usize],
    /// `None` means fixed tiling (validation / test)
    layouts:     Option<&'a [SectionLayout]>,
    section_len: usize,
}

impl<'a> SplitView<'a> {
    pub fn kind(&self) -> SplitKind { self.kind }

    /// Unit ids visible through this view, ascending.
    pub fn unit_ids(&self) -> &'a [usize] { self.members }

    pub fn contains(&self, unit: usize) -> bool {
        self.members.binary_search(&unit).is_ok()
    }

    /// Make `unit` the active unit. Every call is a new selection
    /// with its own ticket.
    pub fn select_unit(&self, unit: usize) -> Result<UnitCursor<'a>> {
        let span = *self
            .units
            .get(unit)
            .with_context(|| format!("unit {} out of range (0..{})", unit, self.units.len()))?;
        let ticket = self.tickets.fetch_add(1, Ordering::Relaxed);
        Ok(UnitCursor { view: *self, unit: span, ticket })
    }

    fn sections_of(&self, unit: &UnitSpan) -> Vec<Section> {
        if !self.contains(unit.id) {
            return Vec::new();
        }
        match self.layouts {
            Some(layouts) => layouts[unit.id].sections(),
            None => SectionLayout::tiled(unit.len, self.section_len).sections(),
        }
    }
}

// ─── UnitCursor ───────────────────────────────────────────────────────────────
/// A view with an active unit but no hidden state yet.
pub struct UnitCursor<'a> {
    view:   SplitView<'a>,
    unit:   UnitSpan,
    ticket: u64,
}

/// The entire active unit, unbatched: `[timesteps, input_size]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitSample<'a> {
    pub origin:     TraceOrigin,
    pub unit_id:    usize,
    pub timesteps:  usize,
    pub input_size: usize,
    pub features:   &'a [f32],
}

impl<'a> UnitCursor<'a> {
    pub fn unit(&self) -> UnitSpan { self.unit }

    /// Stamp for hidden states computed from this selection.
    pub fn origin(&self) -> TraceOrigin {
        TraceOrigin::new(self.unit.id, self.unit.len, self.ticket)
    }

    pub fn current_sample(&self) -> UnitSample<'a> {
        UnitSample {
            origin:     self.origin(),
            unit_id:    self.unit.id,
            timesteps:  self.unit.len,
            input_size: self.view.series.input_size(),
            features:   self.view.series.feature_rows(self.unit.start, self.unit.len),
        }
    }

    /// Bind the hidden states computed for this selection.
    /// `layers` is the encoder's recurrent depth (0 when stateless).
    ///
    /// # Errors
    /// Fails if `hidden` belongs to another unit, covers a different
    /// number of timesteps, was computed for an earlier selection, or
    /// does not carry one trace per recurrent layer.
    pub fn attach(self, hidden: HiddenStateSet, layers: usize) -> Result<PreparedUnit> {
        ensure!(
            hidden.unit_id() == self.unit.id,
            "hidden states were computed for unit {} but unit {} is active",
            hidden.unit_id(),
            self.unit.id
        );
        ensure!(
            hidden.timesteps() == self.unit.len,
            "hidden states cover {} timesteps, unit {} has {}",
            hidden.timesteps(),
            self.unit.id,
            self.unit.len
        );
        ensure!(
            hidden.origin() == self.origin(),
            "hidden states for unit {} come from an earlier selection",
            self.unit.id
        );
        ensure!(
            hidden.num_layers() == layers,
            "hidden states for unit {} hold {} layer traces, the encoder has {} recurrent layers",
            self.unit.id,
            hidden.num_layers(),
            layers
        );
        let sections = self.view.sections_of(&self.unit);
        Ok(PreparedUnit {
            series: Arc::clone(self.view.series),
            unit: self.unit,
            sections,
            hidden,
        })
    }
}

// ─── PreparedUnit ─────────────────────────────────────────────────────────────
/// An active unit with its hidden states bound; the only source
/// of section items. Owns what it needs, so it can be handed to a
/// DataLoader.
pub struct PreparedUnit {
    series:   Arc<TimeSeries>,
    unit:     UnitSpan,
    sections: Vec<Section>,
    hidden:   HiddenStateSet,
}

impl PreparedUnit {
    pub fn unit_id(&self) -> usize { self.unit.id }

    pub fn sections(&self) -> &[Section] { &self.sections }

    pub fn hidden(&self) -> &HiddenStateSet { &self.hidden }
}

impl Dataset<SectionItem> for PreparedUnit {
    fn get(&self, index: usize) -> Option<SectionItem> {
        let section = self.sections.get(index)?;
        let absolute = self.unit.start + section.start;
        Some(SectionItem {
            unit_id:  self.unit.id,
            start:    section.start,
            features: self.series.feature_rows(absolute, section.len).to_vec(),
            labels:   self.series.label_rows(absolute, section.len).to_vec(),
            seeds:    self.hidden.seeds_for(section),
        })
    }

    fn len(&self) -> usize {
        self.sections.len()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::splitter::split_units;

    /// 4 units × 100 timesteps, one channel whose value is the timestep index.
    fn dataset() -> UnitDataset {
        let features: Vec<f32> = (0..400).map(|t| t as f32).collect();
        let labels = (0..400).map(|t| if t % 50 == 0 { 1.0 } else { 0.0 }).collect();
        let series = TimeSeries::new(1, features, labels).unwrap();
        let split = SplitAssignment { train: vec![0, 2], validation: vec![1], test: vec![3] };
        UnitDataset::new(series, 4, 20, split, 5).unwrap()
    }

    fn trace_for(origin: TraceOrigin, hidden: usize) -> HiddenStateSet {
        let values = (0..origin.timesteps * 2 * hidden).map(|v| v as f32).collect();
        HiddenStateSet::new(origin, hidden, vec![values]).unwrap()
    }

    fn stateless(cursor: UnitCursor<'_>) -> PreparedUnit {
        let origin = cursor.origin();
        cursor.attach(HiddenStateSet::stateless(origin), 0).unwrap()
    }

    #[test]
    fn test_current_sample_is_the_whole_unit() {
        let ds = dataset();
        let cursor = ds.train_view().select_unit(2).unwrap();
        let sample = cursor.current_sample();
        assert_eq!(sample.timesteps, 100);
        assert_eq!(sample.features.len(), 100);
        assert_eq!(sample.features[0], 200.0);
        assert_eq!(sample.features[99], 299.0);
    }

    #[test]
    fn test_current_sample_is_idempotent() {
        let ds = dataset();
        let cursor = ds.train_view().select_unit(1).unwrap();
        let a = cursor.current_sample();
        let b = cursor.current_sample();
        assert_eq!(a, b);
        assert!(a.features.iter().zip(b.features).all(|(x, y)| x.to_bits() == y.to_bits()));
    }

    #[test]
    fn test_attach_rejects_foreign_hidden_states() {
        let ds = dataset();
        let view = ds.train_view();
        let other = view.select_unit(2).unwrap().origin();
        let cursor = view.select_unit(0).unwrap();
        assert!(cursor.attach(trace_for(other, 4), 1).is_err());
    }

    #[test]
    fn test_attach_rejects_wrong_length() {
        let ds = dataset();
        let cursor = ds.train_view().select_unit(0).unwrap();
        let short = TraceOrigin { timesteps: 99, ..cursor.origin() };
        assert!(cursor.attach(HiddenStateSet::stateless(short), 0).is_err());
    }

    #[test]
    fn test_attach_rejects_states_from_an_earlier_selection() {
        let mut ds = dataset();
        let old = trace_for(ds.train_view().select_unit(0).unwrap().origin(), 2);

        // Same unit, same length, but selected again: the old trace is stale
        let cursor = ds.train_view().select_unit(0).unwrap();
        assert_eq!(old.unit_id(), cursor.unit().id);
        assert!(cursor.attach(old.clone(), 1).is_err());

        // Also across a resample
        ds.random_subsample();
        assert!(ds.train_view().select_unit(0).unwrap().attach(old, 1).is_err());
    }

    #[test]
    fn test_attach_rejects_stateless_set_for_recurrent_encoder() {
        let ds = dataset();
        let cursor = ds.train_view().select_unit(0).unwrap();
        let origin = cursor.origin();
        assert!(cursor.attach(HiddenStateSet::stateless(origin), 1).is_err());

        // and a trace with the wrong number of layers
        let cursor = ds.train_view().select_unit(0).unwrap();
        let one_layer = trace_for(cursor.origin(), 3);
        assert!(cursor.attach(one_layer, 2).is_err());
    }

    #[test]
    fn test_items_carry_section_data_and_seeds() {
        let ds = dataset();
        let cursor = ds.train_view().select_unit(2).unwrap();
        let hidden = trace_for(cursor.origin(), 3);
        let prepared = cursor.attach(hidden.clone(), 1).unwrap();
        assert_eq!(prepared.len(), 5);

        let item = prepared.get(1).unwrap();
        assert_eq!(item.unit_id, 2);
        assert_eq!(item.start, 20);
        assert_eq!(item.features[0], 220.0);
        assert_eq!(item.labels.len(), 20);
        assert_eq!(item.seeds, hidden.seeds_for(&Section { start: 20, len: 20 }));
    }

    #[test]
    fn test_units_outside_the_split_are_empty() {
        let ds = dataset();
        let prepared = stateless(ds.train_view().select_unit(1).unwrap());
        assert!(prepared.is_empty());
        assert!(prepared.get(0).is_none());
    }

    #[test]
    fn test_out_of_range_unit_is_an_error() {
        let ds = dataset();
        assert!(ds.validation_view().select_unit(4).is_err());
    }

    #[test]
    fn test_prepared_unit_outlives_the_dataset() {
        let prepared = {
            let ds = dataset();
            let cursor = ds.validation_view().select_unit(1).unwrap();
            stateless(cursor)
        };
        assert_eq!(prepared.len(), 5);
        assert_eq!(prepared.get(4).unwrap().features[0], 180.0);
        assert!(prepared.get(5).is_none());
    }

    #[test]
    fn test_subsample_moves_train_windows_only() {
        let mut ds = dataset();
        let sections = |ds: &UnitDataset, view: SplitKind, unit: usize| {
            let v = match view {
                SplitKind::Train      => ds.train_view(),
                SplitKind::Validation => ds.validation_view(),
                SplitKind::Test       => ds.test_view(),
            };
            stateless(v.select_unit(unit).unwrap()).sections().to_vec()
        };

        let train_before = sections(&ds, SplitKind::Train, 0);
        let val_before   = sections(&ds, SplitKind::Validation, 1);
        ds.random_subsample();
        let train_after = sections(&ds, SplitKind::Train, 0);
        let val_after   = sections(&ds, SplitKind::Validation, 1);

        assert_ne!(train_before, train_after);
        assert_eq!(val_before, val_after);
        assert!(train_after.iter().map(|s| s.len).sum::<usize>() <= 100);
    }

    #[test]
    fn test_seeded_subsampling_is_reproducible_and_non_degenerate() {
        let run = || {
            let mut ds = dataset();
            let mut history = Vec::new();
            for _ in 0..2 {
                ds.random_subsample();
                let prepared = stateless(ds.train_view().select_unit(2).unwrap());
                history.push(prepared.sections().to_vec());
            }
            history
        };
        let first = run();
        assert_eq!(first, run());
        assert_ne!(first[0], first[1]);
    }

    #[test]
    fn test_views_share_storage() {
        let ds = dataset();
        let a = ds.train_view().select_unit(3).unwrap().current_sample();
        let b = ds.test_view().select_unit(3).unwrap().current_sample();
        assert!(std::ptr::eq(a.features.as_ptr(), b.features.as_ptr()));
    }

    #[test]
    fn test_section_longer_than_unit_is_fatal() {
        let series = TimeSeries::new(1, vec![0.0; 100], vec![0.0; 100]).unwrap();
        let split = split_units(4, 0.0, 0.0, 0).unwrap();
        assert!(UnitDataset::new(series, 4, 30, split, 0).is_err());
    }
}
