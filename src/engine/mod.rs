//! The television set itself: AGC, sync recovery, color demodulation
//! and the CRT raster scan.
//!
//! A maxim of technology is that failures reveal underlying mechanism;
//! to emulate realistic failures of a TV set the receiver has to work
//! like a TV set. So this is DSP-style emulation of the analog
//! circuitry: the signal path really is assembled, mixed with noise,
//! sync-followed and demodulated every frame.

mod demod;
mod render;
mod signal;
mod sync;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::geometry::*;
use crate::input::InputSignal;
use crate::raster::Raster;
use crate::reception::Reception;

#[derive(Clone, Copy, Default)]
pub(crate) struct LevelEntry {
    pub index: usize,
    pub value: f32,
}

/// One analog TV set, wired to an output raster of a fixed size.
///
/// The `*_control` fields are the front-panel knobs; the controller
/// writes them before each `draw`.
pub struct TvEngine {
    out_width: usize,
    out_height: usize,

    pub(crate) usewidth: usize,
    pub(crate) useheight: usize,
    pub(crate) xrepl: usize,
    pub(crate) subwidth: usize,
    image: Raster,

    pub tint_control: f32,
    pub color_control: f32,
    pub brightness_control: f32,
    pub contrast_control: f32,
    pub height_control: f32,
    pub width_control: f32,
    pub squish_control: f32,
    pub horiz_desync: f32,
    pub squeezebottom: f32,
    /// Seconds since power-on; >= 900 means fully warmed up.
    pub powerup: f32,

    pub flutter_horiz_desync: bool,
    pub hashnoise_on: bool,
    pub hashnoise_enable: bool,

    /// When non-zero, the next draw mixes a decaying noise burst over
    /// this many samples, as after turning the channel knob.
    pub channel_change_cycles: u32,
    shrinkpulse: i64,

    pub(crate) agclevel: f32,
    rx_signal_level: f64,
    pub(crate) rx_signal: Vec<f32>,

    pub(crate) tint_i: f32,
    pub(crate) tint_q: f32,

    pub(crate) cur_hsync: usize,
    pub(crate) cur_vsync: usize,
    pub(crate) line_hsync: Vec<usize>,
    pub(crate) cb_phase: [f64; 4],
    pub(crate) line_cb_phase: Vec<[f64; 4]>,

    pub(crate) crtload: Vec<f32>,
    pub(crate) intensity_values: [u8; CV_MAX],
    pub(crate) leveltable: [[LevelEntry; MAX_LINEHEIGHT + 1]; MAX_LINEHEIGHT + 1],
    pub(crate) puheight: f32,

    rng: SmallRng,
}

impl TvEngine {
    pub fn new(out_width: usize, out_height: usize, seed: u64) -> Self {
        let mut intensity_values = [0u8; CV_MAX];
        for (i, v) in intensity_values.iter_mut().enumerate() {
            let intensity = ((i as f64 / 256.0).powf(0.8) * 65535.0) as i32; /* gamma correction */
            *v = (intensity.min(65535) >> 8) as u8;
        }

        let mut engine = Self {
            out_width,
            out_height,
            usewidth: 0,
            useheight: 0,
            xrepl: 1,
            subwidth: 0,
            image: Raster::default(),
            tint_control: 0.0,
            color_control: 0.0,
            brightness_control: 0.0,
            contrast_control: 0.0,
            height_control: 0.0,
            width_control: 0.0,
            squish_control: 0.0,
            horiz_desync: 0.0,
            squeezebottom: 0.0,
            powerup: 0.0,
            flutter_horiz_desync: false,
            hashnoise_on: false,
            hashnoise_enable: false,
            channel_change_cycles: 0,
            shrinkpulse: -1,
            agclevel: 0.0,
            rx_signal_level: 0.0,
            rx_signal: vec![0.0; SIGNAL_LEN + 2 * H],
            tint_i: 0.0,
            tint_q: 0.0,
            cur_hsync: 0,
            cur_vsync: 0,
            line_hsync: vec![0; V],
            cb_phase: [0.0; 4],
            line_cb_phase: vec![[0.0; 4]; V],
            crtload: vec![0.0; V],
            intensity_values,
            leveltable: [[LevelEntry::default(); MAX_LINEHEIGHT + 1]; MAX_LINEHEIGHT + 1],
            puheight: 0.0,
            rng: SmallRng::seed_from_u64(seed),
        };
        engine.set_defaults();
        engine.configure();
        engine
    }

    /// Knob positions as the set leaves the factory.
    pub fn set_defaults(&mut self) {
        self.tint_control = 5.0;
        self.color_control = 70.0 / 100.0;
        self.brightness_control = 2.0 / 100.0;
        self.contrast_control = 150.0 / 100.0;
        self.height_control = 1.0;
        self.width_control = 1.0;
        self.squish_control = 0.0;
        self.powerup = 1000.0;

        self.hashnoise_on = false;
        self.hashnoise_enable = true;

        self.horiz_desync = self.rng.random_range(-5.0..5.0);
        self.squeezebottom = self.rng.random_range(-1.0..4.0);
    }

    fn configure(&mut self) {
        /* If the output is very small, don't let the image we draw get
           lower than the actual TV resolution (266x200).

           If the height is very close (2.5%) to a multiple of VISLINES,
           make it exact. For example, it maps 1024 => 1000. */
        let mut wlim = self.out_width;
        let mut hlim = self.out_height;

        if wlim < 266 || hlim < 200 {
            log::debug!("size: minimal: {wlim}x{hlim} in {}x{}", self.out_width, self.out_height);
            wlim = 266;
            hlim = 200;
        }

        let height_snap = 0.025;
        let height_diff = ((hlim + VISLINES / 2) % VISLINES) as i32 - (VISLINES / 2) as i32;
        if height_diff != 0 && (height_diff.unsigned_abs() as f64) < hlim as f64 * height_snap {
            log::debug!("size: snapping height {hlim} by {height_diff}");
            hlim = (hlim as i32 - height_diff) as usize;
        }

        wlim &= !1;
        hlim &= !1;

        /* Most times this doesn't change */
        if wlim != self.usewidth || hlim != self.useheight {
            self.usewidth = wlim;
            self.useheight = hlim;

            self.xrepl = (1 + self.usewidth / 640).min(2);
            self.subwidth = self.usewidth / self.xrepl;

            self.image = Raster::new(self.usewidth, self.useheight);
        }
    }

    /// The power-up ramp: `(1 - e^(-t/tc))^2 * over`, clamped to 1,
    /// starting `start` seconds after the power switch.
    pub(crate) fn puramp(&self, tc: f32, start: f32, over: f32) -> f32 {
        let pt = self.powerup - start;
        if pt < 0.0 {
            return 0.0;
        }
        if pt > 900.0 || pt / tc > 8.0 {
            return 1.0;
        }
        let ret = (1.0 - (-pt / tc).exp()) * over;
        if ret > 1.0 {
            return 1.0;
        }
        ret * ret
    }

    fn setup_frame(&mut self) {
        if self.flutter_horiz_desync {
            /* Horizontal sync during vertical sync instability. */
            let r1 = self.rng.random_range(-0x80..0x80i32) as f32;
            let r2 = self.rng.random_range(-0x80..0x80i32) as f32;
            let r3 = self.rng.random_range(-0x80..0x80i32) as f32;
            self.horiz_desync += -0.10 * (self.horiz_desync - 3.0) + r1 * r2 * r3 * 0.000001;
        }

        if self.hashnoise_enable && !self.hashnoise_on && self.rng.random_range(0..10_000u32) == 0 {
            self.hashnoise_on = true;
            self.shrinkpulse = self.rng.random_range(0..V as u32) as i64;
        }
        if self.rng.random_range(0..1_000u32) == 0 {
            self.hashnoise_on = false;
        }

        if self.rx_signal_level != 0.0 {
            self.agclevel = (1.0 / self.rx_signal_level) as f32;
            if !self.agclevel.is_finite() {
                self.agclevel = 0.0;
            }
        }
    }

    /*
      The point of the level table is that when useheight is not a
      multiple of VISLINES, so that TV scan lines map to different
      numbers of vertical screen pixels, the total brightness of each
      scan line remains the same.
    */
    pub(crate) fn setup_levels(&mut self, avgheight: f64) {
        const LEVELFAC: [f64; 3] = [-7.5, 5.5, 24.5];

        let ramp = self.puramp(3.0, 6.0, 1.0) as f64;

        let mut height = 0usize;
        while (height as f64) < avgheight + 2.0 && height <= MAX_LINEHEIGHT {
            for i in 0..height {
                self.leveltable[height][i].index = 2;
            }
            if avgheight >= 3.0 {
                self.leveltable[height][0].index = 0;
            }
            if avgheight >= 5.0 && height >= 1 {
                self.leveltable[height][height - 1].index = 0;
            }
            if avgheight >= 7.0 {
                self.leveltable[height][1].index = 1;
                if height >= 2 {
                    self.leveltable[height][height - 2].index = 1;
                }
            }
            for i in 0..height {
                let idx = self.leveltable[height][i].index;
                self.leveltable[height][i].value = ((40.0 + LEVELFAC[idx] * ramp) / 256.0) as f32;
            }
            height += 1;
        }
    }

    pub fn cur_hsync(&self) -> usize {
        self.cur_hsync
    }

    pub fn cur_vsync(&self) -> usize {
        self.cur_vsync
    }

    pub fn rx_signal(&self) -> &[f32] {
        &self.rx_signal
    }

    /// Receive and display one frame.
    ///
    /// `stations` is the full station table; each reception names its
    /// station by index. The rendered picture is blitted centered into
    /// `out`, clipped to its bounds.
    pub fn draw(&mut self, noise_level: f64, receptions: &[Reception], stations: &mut [InputSignal], out: &mut Raster) {
        if self.usewidth == 0 || self.useheight == 0 || out.width() == 0 || out.height() == 0 {
            return;
        }

        self.rx_signal_level = noise_level;
        for rec in receptions {
            let firsum: f64 = rec.ghostfir.iter().sum();
            let power = (rec.level * rec.level * (1.0 + 4.0 * firsum)).max(0.0);
            self.rx_signal_level = (self.rx_signal_level * self.rx_signal_level + power).sqrt();

            /* duplicate the first line into the last to ease wraparound */
            stations[rec.station].seal();
        }

        self.setup_frame();

        let random0: u32 = self.rng.random();
        let random1: u32 = self.rng.random();

        {
            let stations: &[InputSignal] = stations;
            let signals: Vec<&[i8]> = receptions.iter().map(|r| stations[r.station].flat()).collect();
            let change_cycles = self.channel_change_cycles as i64;

            let (active, _) = self.rx_signal.split_at_mut(SIGNAL_LEN);
            active
                .par_chunks_mut(signal::BLOCK)
                .enumerate()
                .for_each(|(block, chunk)| {
                    let start = block * signal::BLOCK;
                    signal::fill_noise(chunk, start as u32, noise_level, random0);

                    for (k, rec) in receptions.iter().enumerate() {
                        /* Only the primary reception carries the
                           channel-change burst. */
                        let ec = if k == 0 { change_cycles } else { 0 };
                        let end = (start + chunk.len()) as i64;
                        let skip = if start as i64 >= ec { 0 } else { (ec.min(end) - start as i64) as usize };

                        if skip > 0 {
                            signal::add_transition(chunk, start, skip, rec, signals[k], random1);
                        }
                        signal::mix_signal(chunk, start, skip, rec, signals[k]);
                    }
                });
        }
        self.channel_change_cycles = 0;

        /* rx_signal has an extra 2 lines at the end, where we copy the
           first 2 lines so we can index into it while only worrying
           about wraparound on a per-line level */
        let (head, tail) = self.rx_signal.split_at_mut(SIGNAL_LEN);
        tail.copy_from_slice(&head[..2 * H]);

        self.sync(); /* requires the signal assembly be complete */

        let mut baseload = 0.5f32;
        self.crtload[TOP - 1] = baseload;
        self.puheight = self.puramp(2.0, 1.0, 1.3) * self.height_control * (1.125 - 0.125 * self.puramp(2.0, 2.0, 1.1));

        self.setup_levels(self.puheight as f64 * self.useheight as f64 / VISLINES as f64);

        /* tint is calculated once per frame */
        let rad = (103.0 + self.tint_control as f64) * std::f64::consts::PI / 180.0;
        self.tint_i = -(rad.cos()) as f32;
        self.tint_q = rad.sin() as f32;

        /* CRT load smoothing is strictly serial: each line leans on the
           one above it. */
        for lineno in TOP..BOT {
            let Some(geom) = self.get_line(lineno) else { continue };

            if lineno as i64 == self.shrinkpulse {
                baseload += 0.4;
                self.shrinkpulse = -1;
            }

            let mut totsignal = 0f32;
            for &s in &self.rx_signal[geom.signal_offset..geom.signal_offset + PIC_LEN] {
                totsignal += s;
            }
            totsignal *= self.agclevel;

            let squeeze = if geom.slineno > 184 {
                (geom.slineno - 184) as f32 * (lineno as i32 - 184) as f32 * 0.001 * self.squeezebottom
            } else {
                0.0
            };
            self.crtload[lineno] =
                0.95 * self.crtload[lineno - 1] + 0.05 * (baseload + (totsignal - 30000.0) / 100000.0 + squeeze);
        }

        self.draw_lines();

        /* Anything outside the warmed-up band of the tube stays dark. */
        let overall_top = ((self.useheight as f32 * (1.0 - self.puheight) / 2.0) as i32).max(0);
        let overall_bot = ((self.useheight as f32 * (1.0 + self.puheight) / 2.0) as i32).min(self.useheight as i32);

        if overall_bot > overall_top {
            let screen_xo = (out.width() as i32 - self.usewidth as i32) / 2;
            let screen_yo = (out.height() as i32 - self.useheight as i32) / 2;
            out.blit(
                &self.image,
                0,
                overall_top,
                screen_xo,
                screen_yo + overall_top,
                self.usewidth as u32,
                (overall_bot - overall_top) as u32,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intensity_lut_is_monotone() {
        let tv = TvEngine::new(320, 240, 0);
        for w in tv.intensity_values.windows(2) {
            assert!(w[0] <= w[1]);
        }
        assert_eq!(tv.intensity_values[CV_MAX - 1], 255);
    }

    #[test]
    fn puramp_ramps_from_zero_to_one() {
        let mut tv = TvEngine::new(320, 240, 0);
        tv.powerup = 0.0;
        assert_eq!(tv.puramp(2.0, 1.0, 1.3), 0.0);
        tv.powerup = 1000.0;
        assert_eq!(tv.puramp(2.0, 1.0, 1.3), 1.0);
        tv.powerup = 2.0;
        let mid = tv.puramp(2.0, 1.0, 1.3);
        assert!(mid > 0.0 && mid < 1.0);
    }

    #[test]
    fn level_table_edges_are_symmetric() {
        let mut tv = TvEngine::new(320, 240, 0);
        tv.powerup = 1000.0;
        for avg in [5.0, 7.0, 9.0, 11.5] {
            tv.setup_levels(avg);
            let max_h = ((avg + 1.0) as usize).min(MAX_LINEHEIGHT);
            for h in 1..=max_h {
                for i in 0..h {
                    assert_eq!(
                        tv.leveltable[h][i].index,
                        tv.leveltable[h][h - 1 - i].index,
                        "avg={avg} h={h} i={i}"
                    );
                }
            }
        }
    }

    #[test]
    fn level_table_index_structure() {
        let mut tv = TvEngine::new(320, 240, 0);
        tv.powerup = 1000.0;
        tv.setup_levels(8.0);
        let h = 8;
        assert_eq!(tv.leveltable[h][0].index, 0);
        assert_eq!(tv.leveltable[h][h - 1].index, 0);
        assert_eq!(tv.leveltable[h][1].index, 1);
        assert_eq!(tv.leveltable[h][h - 2].index, 1);
        for i in 2..h - 2 {
            assert_eq!(tv.leveltable[h][i].index, 2);
        }
    }

    #[test]
    fn configure_keeps_even_dimensions_and_snaps_height() {
        let tv = TvEngine::new(1024, 1024, 0);
        // 1024 is within 2.5% of 1000 = 5 * VISLINES.
        assert_eq!(tv.useheight, 1000);
        assert_eq!(tv.usewidth % 2, 0);
        assert_eq!(tv.useheight % 2, 0);
        // xrepl kicks in beyond 640 wide.
        assert_eq!(tv.xrepl, 2);
        assert_eq!(tv.subwidth, tv.usewidth / 2);
    }

    #[test]
    fn tiny_output_clamps_to_tv_resolution() {
        let tv = TvEngine::new(66, 66, 0);
        assert_eq!(tv.usewidth, 266);
        assert_eq!(tv.useheight, 200);
    }
}
