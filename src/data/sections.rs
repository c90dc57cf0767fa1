// ============================================================
// Layer 4 — Section Layout
// ============================================================
// Cuts a unit into disjoint fixed-length sections.
//
// Sections tile the unit from an OFFSET in [0, section_len):
//
//   unit_len = 23, section_len = 5
//   offset 0:  |s0   |s1   |s2   |s3   |...   (4 sections, 3 left over)
//   offset 2:  ..|s0   |s1   |s2   |s3   |.   (4 sections, 1 left over)
//
// Only whole sections are produced, so the summed length of a
// unit's sections can never exceed the unit length.
//
// Resampling picks a NEW offset, different from the current one
// whenever the unit has room for more than one, so consecutive
// epochs see different window boundaries over the same data.

use rand::Rng;

use crate::domain::series::Section;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionLayout {
    unit_len:    usize,
    section_len: usize,
    offset:      usize,
}

impl SectionLayout {
    /// Deterministic layout starting at the beginning of the unit.
    pub fn tiled(unit_len: usize, section_len: usize) -> Self {
        Self { unit_len, section_len, offset: 0 }
    }

    pub fn offset(&self) -> usize { self.offset }

    /// Number of distinct offsets that still fit at least one section.
    fn offset_choices(&self) -> usize {
        if self.section_len == 0 || self.unit_len < self.section_len {
            return 1;
        }
        self.section_len.min(self.unit_len - self.section_len + 1)
    }

    /// Move to a different random offset. No-op if only one fits.
    pub fn resample<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let choices = self.offset_choices();
        if choices <= 1 {
            return;
        }
        // Draw from the other `choices - 1` offsets, skipping the current one
        let draw = rng.gen_range(0..choices - 1);
        self.offset = if draw >= self.offset { draw + 1 } else { draw };
    }

    pub fn sections(&self) -> Vec<Section> {
        if self.section_len == 0 {
            return Vec::new();
        }
        (self.offset..)
            .step_by(self.section_len)
            .take_while(|start| start + self.section_len <= self.unit_len)
            .map(|start| Section { start, len: self.section_len })
            .collect()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn total_len(sections: &[Section]) -> usize {
        sections.iter().map(|s| s.len).sum()
    }

    #[test]
    fn test_tiled_layout_starts_at_zero() {
        let sections = SectionLayout::tiled(100, 20).sections();
        assert_eq!(sections.len(), 5);
        assert_eq!(sections[0], Section { start: 0, len: 20 });
        assert_eq!(sections[4].end(), 100);
    }

    #[test]
    fn test_sections_never_exceed_unit_length() {
        let mut rng = StdRng::seed_from_u64(3);
        for unit_len in [1usize, 7, 20, 21, 99, 100, 257] {
            for section_len in [1usize, 3, 20, 64, 300] {
                let mut layout = SectionLayout::tiled(unit_len, section_len);
                for _ in 0..10 {
                    let sections = layout.sections();
                    assert!(total_len(&sections) <= unit_len);
                    assert!(sections.iter().all(|s| s.end() <= unit_len));
                    // disjoint and ordered
                    assert!(sections.windows(2).all(|w| w[0].end() <= w[1].start));
                    layout.resample(&mut rng);
                }
            }
        }
    }

    #[test]
    fn test_resample_always_moves_the_boundaries() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut layout = SectionLayout::tiled(100, 20);
        for _ in 0..50 {
            let before = layout.sections();
            layout.resample(&mut rng);
            assert_ne!(before, layout.sections());
        }
    }

    #[test]
    fn test_exact_fit_cannot_move() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut layout = SectionLayout::tiled(20, 20);
        layout.resample(&mut rng);
        assert_eq!(layout.offset(), 0);
        assert_eq!(layout.sections().len(), 1);
    }

    #[test]
    fn test_unit_shorter_than_section_has_no_sections() {
        assert!(SectionLayout::tiled(10, 20).sections().is_empty());
    }
}
