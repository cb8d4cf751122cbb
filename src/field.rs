//! One-dimensional snow height field and its "avalanche" relaxation.
//!
//! The field holds one non-negative depth per pixel column. Each frame it
//! decays a little, then a fixed number of bidirectional sweeps move material
//! from any cell that stands more than `slope_threshold` above its neighbour.
//! This is a slope-capped explicit diffusion run to a fixed iteration budget,
//! not to convergence.

use crate::config::FieldConfig;

/// Why the pile was wiped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetCause {
    /// Motion score crossed the threshold.
    Motion,
    /// A sampled column reached the top margin.
    Overflow,
}

#[derive(Clone, Debug)]
pub struct HeightField {
    cells: Vec<f32>,
    surface_height: f32,
    decay_phase: usize,
}

impl HeightField {
    /// All-zero field for a surface `width` columns wide and `surface_height` tall.
    pub fn new(width: usize, surface_height: f32) -> Self {
        Self { cells: vec![0.0; width], surface_height, decay_phase: 0 }
    }

    pub fn width(&self) -> usize {
        self.cells.len()
    }

    pub fn surface_height(&self) -> f32 {
        self.surface_height
    }

    pub fn cells(&self) -> &[f32] {
        &self.cells
    }

    #[inline]
    pub fn get(&self, col: usize) -> f32 {
        self.cells.get(col).copied().unwrap_or(0.0)
    }

    /// Screen y of the pile top at `col` (`surface_height` when empty).
    #[inline]
    pub fn surface_y(&self, col: usize) -> f32 {
        self.surface_height - self.get(col)
    }

    /// Column index for a horizontal position, clamped to the field.
    #[inline]
    pub fn column(&self, x: f32) -> usize {
        let last = self.cells.len().saturating_sub(1);
        if x.is_finite() && x > 0.0 { (x as usize).min(last) } else { 0 }
    }

    pub fn total(&self) -> f32 {
        self.cells.iter().sum()
    }

    pub fn peak(&self) -> f32 {
        self.cells.iter().copied().fold(0.0, f32::max)
    }

    pub fn reset(&mut self) {
        self.cells.fill(0.0);
        self.decay_phase = 0;
    }

    /// Add height to a single column. Negative or non-finite amounts are ignored.
    pub fn add(&mut self, col: usize, amount: f32) {
        if let Some(c) = self.cells.get_mut(col) {
            if amount.is_finite() && amount > 0.0 {
                *c += amount;
            }
        }
    }

    /// Spread `amount` around `center` with a Gaussian falloff. The impact
    /// column receives the full `amount`; columns `radius` away get ~13% of it.
    pub fn deposit(&mut self, center: usize, amount: f32, radius: usize) {
        let sigma = (radius as f32 * 0.5).max(0.5);
        let denom = 2.0 * sigma * sigma;
        let r = radius as isize;
        for d in -r..=r {
            let col = center as isize + d;
            if col < 0 || col as usize >= self.cells.len() {
                continue;
            }
            let w = (-((d * d) as f32) / denom).exp();
            self.add(col as usize, amount * w);
        }
    }

    /// Every `decay_stride`-th cell above the threshold loses `decay_rate` of
    /// its height. The starting offset rotates so every cell is reached.
    pub fn decay(&mut self, cfg: &FieldConfig) {
        let stride = cfg.decay_stride.max(1);
        let keep = 1.0 - cfg.decay_rate.clamp(0.0, 1.0);
        for c in self.cells.iter_mut().skip(self.decay_phase).step_by(stride) {
            if *c > cfg.decay_threshold {
                *c = (*c * keep).max(0.0);
            }
        }
        self.decay_phase = (self.decay_phase + 1) % stride;
    }

    /// Fixed-budget avalanche smoothing. Each pass sweeps left-to-right then
    /// right-to-left; a single direction would make piles lean.
    /// Only moves height between neighbours, so the total is preserved.
    pub fn relax(&mut self, cfg: &FieldConfig) {
        let n = self.cells.len();
        if n < 2 {
            return;
        }
        for _ in 0..cfg.relax_passes {
            for i in 0..n - 1 {
                self.slide(i, i + 1, cfg);
            }
            for i in (1..n).rev() {
                self.slide(i, i - 1, cfg);
            }
        }
    }

    #[inline]
    fn slide(&mut self, from: usize, to: usize, cfg: &FieldConfig) {
        let diff = self.cells[from] - self.cells[to];
        if diff > cfg.slope_threshold {
            // Never overshoot: at most half the difference changes hands.
            let t = cfg.settle_amount.min(diff * 0.5);
            self.cells[from] -= t;
            self.cells[to] += t;
        }
    }

    /// True once any sampled column is within `overflow_margin` of the top.
    pub fn overflowed(&self, cfg: &FieldConfig) -> bool {
        let limit = self.surface_height - cfg.overflow_margin;
        self.cells.iter().step_by(cfg.overflow_stride.max(1)).any(|&c| c >= limit)
    }

    /// One frame of maintenance: decay, relax, then report overflow.
    pub fn settle(&mut self, cfg: &FieldConfig) -> bool {
        self.decay(cfg);
        self.relax(cfg);
        self.overflowed(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cfg() -> FieldConfig {
        FieldConfig::default()
    }

    #[test]
    fn deposit_peaks_at_center() {
        let mut f = HeightField::new(20, 100.0);
        f.deposit(10, 4.0, 3);
        assert_eq!(f.get(10), 4.0);
        assert!(f.get(9) < 4.0 && f.get(9) > f.get(8));
        assert!((f.get(9) - f.get(11)).abs() < 1e-6);
        assert_eq!(f.get(14), 0.0);
    }

    #[test]
    fn deposit_near_edge_is_clipped() {
        let mut f = HeightField::new(5, 100.0);
        f.deposit(0, 2.0, 4);
        assert_eq!(f.get(0), 2.0);
        assert_eq!(f.width(), 5);
    }

    #[test]
    fn relax_flattens_a_spike() {
        let mut f = HeightField::new(11, 100.0);
        f.add(5, 30.0);
        let before = f.total();
        for _ in 0..200 {
            f.relax(&cfg());
        }
        assert!((f.total() - before).abs() < 1e-3);
        for w in f.cells().windows(2) {
            assert!((w[0] - w[1]).abs() <= cfg().slope_threshold + 1e-4);
        }
    }

    #[test]
    fn relax_is_symmetric_for_centered_spike() {
        let mut f = HeightField::new(21, 100.0);
        f.add(10, 12.0);
        f.relax(&cfg());
        let c = f.cells();
        // Sweeps in both directions leave no lean beyond a single settle step.
        assert!((c[9] - c[11]).abs() <= cfg().settle_amount + 1e-5);
    }

    #[test]
    fn decay_leaves_small_cells_alone() {
        let mut f = HeightField::new(4, 100.0);
        f.add(0, 0.05);
        f.add(1, 10.0);
        let c = FieldConfig { decay_stride: 1, ..cfg() };
        f.decay(&c);
        assert_eq!(f.get(0), 0.05);
        assert!(f.get(1) < 10.0);
    }

    #[test]
    fn strided_decay_reaches_every_cell() {
        let mut f = HeightField::new(6, 100.0);
        for i in 0..6 {
            f.add(i, 5.0);
        }
        let c = FieldConfig { decay_stride: 3, ..cfg() };
        for _ in 0..3 {
            f.decay(&c);
        }
        assert!(f.cells().iter().all(|&v| v < 5.0));
    }

    #[test]
    fn overflow_uses_margin() {
        let mut f = HeightField::new(100, 200.0);
        f.add(50, 189.0);
        assert!(!f.overflowed(&cfg()));
        f.add(50, 1.0);
        assert!(f.overflowed(&cfg()));
        f.reset();
        assert_eq!(f.peak(), 0.0);
    }

    #[test]
    fn column_clamps() {
        let f = HeightField::new(10, 50.0);
        assert_eq!(f.column(-3.0), 0);
        assert_eq!(f.column(4.7), 4);
        assert_eq!(f.column(99.0), 9);
        assert_eq!(f.column(f32::NAN), 0);
    }

    proptest! {
        #[test]
        fn relax_preserves_mass(heights in prop::collection::vec(0.0f32..50.0, 2..64)) {
            let mut f = HeightField::new(heights.len(), 100.0);
            for (i, h) in heights.iter().enumerate() {
                f.add(i, *h);
            }
            let before = f.total();
            f.relax(&cfg());
            prop_assert!((f.total() - before).abs() <= 1e-3 * before.max(1.0));
            prop_assert!(f.cells().iter().all(|&c| c >= 0.0));
        }

        #[test]
        fn decay_never_increases(heights in prop::collection::vec(0.0f32..50.0, 1..64), frames in 1usize..40) {
            let mut f = HeightField::new(heights.len(), 100.0);
            for (i, h) in heights.iter().enumerate() {
                f.add(i, *h);
            }
            for _ in 0..frames {
                let prev = f.cells().to_vec();
                f.decay(&cfg());
                for (a, b) in prev.iter().zip(f.cells()) {
                    prop_assert!(*b <= *a);
                    prop_assert!(*b >= 0.0);
                }
            }
        }
    }
}
