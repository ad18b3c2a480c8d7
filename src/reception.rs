//! Transport parameters for one station arriving at the tuner.

use rand::rngs::SmallRng;
use rand::Rng;

use crate::geometry::GHOSTFIR_LEN;

/// How one InputSignal reaches the set: signal strength, a sample
/// offset into the frame, multipath ghosting and high-frequency loss.
/// `station` indexes the runner's station table.
#[derive(Clone, Debug)]
pub struct Reception {
    pub station: usize,
    pub ofs: f64,
    pub level: f64,
    pub multipath: f64,
    pub freqerr: f64,
    pub ghostfir: [f64; GHOSTFIR_LEN],
    pub ghostfir2: [f64; GHOSTFIR_LEN],
    pub hfloss: f64,
    pub hfloss2: f64,
}

impl Reception {
    pub fn new(station: usize) -> Self {
        Self {
            station,
            ofs: 0.0,
            level: 0.0,
            multipath: 0.0,
            freqerr: 0.0,
            ghostfir: [0.0; GHOSTFIR_LEN],
            ghostfir2: [0.0; GHOSTFIR_LEN],
            hfloss: 0.0,
            hfloss2: 0.0,
        }
    }

    /// Per-frame drift of the ghosting FIR. With multipath the taps do
    /// a slow random walk with the occasional impulse; without it the
    /// taps model a short fixed reflection, typical of RF monitor
    /// cables.
    pub fn update(&mut self, rng: &mut SmallRng) {
        if self.multipath > 0.0 {
            for g in self.ghostfir2.iter_mut() {
                *g += -(*g / 16.0) + self.multipath * rng.random_range(-0.01..0.01);
            }
            if rng.random_range(0..20u32) == 0 {
                let tap = rng.random_range(0..GHOSTFIR_LEN);
                self.ghostfir2[tap] = self.multipath * rng.random_range(-0.04..0.04);
            }
            for i in 0..GHOSTFIR_LEN {
                self.ghostfir[i] = 0.8 * self.ghostfir[i] + 0.2 * self.ghostfir2[i];
            }
        } else {
            for (i, g) in self.ghostfir.iter_mut().enumerate() {
                *g = if i >= GHOSTFIR_LEN / 2 {
                    (if i & 1 != 0 { 0.04 } else { -0.08 }) / GHOSTFIR_LEN as f64
                } else {
                    0.0
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn static_fir_without_multipath() {
        let mut rec = Reception::new(0);
        let mut rng = SmallRng::seed_from_u64(1);
        rec.update(&mut rng);
        assert_eq!(rec.ghostfir, [0.0, 0.0, -0.02, 0.01]);
        // Stable across frames.
        rec.update(&mut rng);
        assert_eq!(rec.ghostfir, [0.0, 0.0, -0.02, 0.01]);
    }

    #[test]
    fn multipath_fir_stays_bounded() {
        let mut rec = Reception::new(0);
        rec.multipath = 1.0;
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..1000 {
            rec.update(&mut rng);
        }
        for g in rec.ghostfir {
            assert!(g.abs() < 0.5, "tap drifted to {g}");
        }
    }
}
