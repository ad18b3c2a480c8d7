//! One channel's baseband composite signal.

use crate::geometry::*;

/// A `(V+1) x H` matrix of signed IRE samples. Row `V` duplicates row 0
/// so the mixer can read 4-sample groups past the end of the frame
/// without wrap checks; the engine refreshes it before every draw.
pub struct InputSignal {
    sig: Vec<i8>,
}

impl InputSignal {
    pub fn new() -> Self {
        Self { sig: vec![0; (V + 1) * H] }
    }

    pub fn row(&self, y: usize) -> &[i8] {
        &self.sig[y * H..(y + 1) * H]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [i8] {
        &mut self.sig[y * H..(y + 1) * H]
    }

    /// The whole matrix including the duplicate row.
    pub fn flat(&self) -> &[i8] {
        &self.sig
    }

    /// Refresh the wrap-around duplicate row.
    pub fn seal(&mut self) {
        let (head, tail) = self.sig.split_at_mut(V * H);
        tail.copy_from_slice(&head[..H]);
    }

    /// Write the sync scaffold: horizontal sync pulses, vertical sync on
    /// lines 3..7, black picture area, and optionally 9 cycles of
    /// colorburst on the back porch. `do_ssavi` inverts the sync level
    /// to white, imitating the SSAVI scrambling system.
    pub fn setup_sync(&mut self, do_cb: bool, do_ssavi: bool) {
        let sync_level = if do_ssavi { WHITE_LEVEL } else { SYNC_LEVEL } as i8;

        for lineno in 0..V {
            let vsync = lineno >= 3 && lineno < 7;
            let sig = self.row_mut(lineno);

            if vsync {
                sig[SYNC_START..BP_START].fill(BLANK_LEVEL as i8);
                sig[BP_START..H].fill(sync_level);
            } else {
                sig[SYNC_START..BP_START].fill(sync_level);
                sig[BP_START..PIC_START].fill(BLANK_LEVEL as i8);
                sig[PIC_START..FP_START].fill(BLACK_LEVEL as i8);
                sig[FP_START..H].fill(BLANK_LEVEL as i8);
            }

            if do_cb {
                // 9 cycles of colorburst
                let mut i = CB_START;
                while i < CB_START + 36 * SCALE {
                    sig[i + 1] += CB_LEVEL as i8;
                    sig[i + 3] -= CB_LEVEL as i8;
                    i += 4 * SCALE;
                }
            }
        }
    }

    /// Fill a sample rectangle with a repeating 4-sample pattern.
    /// `left` and `right` are sample positions, rounded to groups of 4.
    pub fn draw_solid(&mut self, left: usize, right: usize, top: usize, bot: usize, ntsc: [i8; 4]) {
        let left = left / 4;
        let right = (right / 4).max(left + 1).min(H / 4);
        let bot = bot.max(top + 1).min(V);

        for y in top..bot {
            let row = self.row_mut(y);
            for group in row[left * 4..right * 4].chunks_exact_mut(4) {
                group.copy_from_slice(&ntsc);
            }
        }
    }

    /// Fill a rectangle given relative to the visible window, with the
    /// color described as luma/chroma/phase.
    pub fn draw_solid_rel_lcp(&mut self, left: f64, right: f64, top: f64, bot: f64, luma: f64, chroma: f64, phase: f64) {
        let topi = (TOP as f64 + VISLINES as f64 * top) as usize;
        let boti = (TOP as f64 + VISLINES as f64 * bot) as usize;
        let lefti = (VIS_START as f64 + VIS_LEN as f64 * left) as usize;
        let righti = (VIS_START as f64 + VIS_LEN as f64 * right) as usize;

        self.draw_solid(lefti, righti, topi, boti, lcp_to_ntsc(luma, chroma, phase));
    }
}

impl Default for InputSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Luma/chroma/phase to the 4 samples of one subcarrier period.
pub fn lcp_to_ntsc(luma: f64, chroma: f64, phase: f64) -> [i8; 4] {
    let mut ntsc = [0i8; 4];
    for (i, n) in ntsc.iter_mut().enumerate() {
        let w = 90.0 * i as f64 + phase;
        let val = luma + chroma * (std::f64::consts::PI / 180.0 * w).cos();
        *n = val.clamp(0.0, 127.0) as i8;
    }
    ntsc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_pulse_is_one_contiguous_segment() {
        let mut input = InputSignal::new();
        input.setup_sync(false, false);

        for lineno in 0..V {
            let row = input.row(lineno);
            let vsync = lineno >= 3 && lineno < 7;
            let expected = if vsync { BP_START..H } else { SYNC_START..BP_START };

            let mut runs = Vec::new();
            let mut start = None;
            for (i, &s) in row.iter().enumerate() {
                match (s == SYNC_LEVEL as i8, start) {
                    (true, None) => start = Some(i),
                    (false, Some(st)) => {
                        runs.push(st..i);
                        start = None;
                    }
                    _ => {}
                }
            }
            if let Some(st) = start {
                runs.push(st..H);
            }
            assert_eq!(runs, vec![expected], "line {lineno}");
        }
    }

    #[test]
    fn colorburst_sums_to_zero_per_cycle() {
        let mut input = InputSignal::new();
        input.setup_sync(true, false);

        for lineno in 0..V {
            if lineno >= 3 && lineno < 7 {
                continue;
            }
            let row = input.row(lineno);
            let mut i = CB_START;
            while i < CB_START + 36 * SCALE {
                let sum: i32 = row[i..i + 4].iter().map(|&s| s as i32).sum();
                assert_eq!(sum, 0, "line {lineno} cycle at {i}");
                i += 4;
            }
        }
    }

    #[test]
    fn ssavi_uses_white_as_sync_level() {
        let mut input = InputSignal::new();
        input.setup_sync(false, true);
        assert_eq!(input.row(0)[SYNC_START], WHITE_LEVEL as i8);
        assert_eq!(input.row(4)[BP_START], WHITE_LEVEL as i8);
    }

    #[test]
    fn lcp_conversion_clamps() {
        assert_eq!(lcp_to_ntsc(200.0, 0.0, 0.0), [127; 4]);
        assert_eq!(lcp_to_ntsc(-10.0, 0.0, 0.0), [0; 4]);
        // Zero chroma is flat.
        let flat = lcp_to_ntsc(55.0, 0.0, 90.0);
        assert!(flat.iter().all(|&v| v == 55));
    }

    #[test]
    fn solid_fill_covers_requested_rect() {
        let mut input = InputSignal::new();
        input.setup_sync(true, false);
        input.draw_solid_rel_lcp(0.0, 1.0, 0.0, 1.0, 75.0, 0.0, 0.0);

        let row = input.row(TOP + VISLINES / 2);
        for x in VIS_START..VIS_END - 4 {
            assert_eq!(row[x], 75, "sample {x}");
        }
    }

    #[test]
    fn seal_duplicates_first_row() {
        let mut input = InputSignal::new();
        input.setup_sync(true, false);
        input.row_mut(0)[100] = 42;
        input.seal();
        assert_eq!(input.row(V)[100], 42);
        assert_eq!(input.row(V), input.row(0));
    }
}
