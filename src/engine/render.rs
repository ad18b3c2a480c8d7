//! Scan-line rendering: resampling the demodulated line into screen
//! pixels and replicating it vertically with the level table.
//!
//! Two period artifacts live here. Bloom: the horizontal oscillator
//! also generated the high voltage, so a bright line loaded it down and
//! narrowed the scan. Squish: the scan got truncated and brightened on
//! the right as the flyback transformer saturated.

use rayon::prelude::*;

use crate::geometry::*;
use crate::raster::BYTES_PER_PIXEL;

use super::demod::Yiq;
use super::TvEngine;

pub(crate) struct LineGeom {
    pub lineno: usize,
    pub slineno: i32,
    pub ytop: i32,
    pub ybot: i32,
    pub signal_offset: usize,
}

impl TvEngine {
    /// Screen-row band and signal position for one scan line, or None
    /// if the line lands outside the tube face.
    pub(crate) fn get_line(&self, lineno: usize) -> Option<LineGeom> {
        let slineno = lineno as i32 - TOP as i32;
        let uh = self.useheight as i32;

        let ytop = ((slineno * uh / VISLINES as i32 - uh / 2) as f32 * self.puheight) as i32 + uh / 2;
        let ybot = (((slineno + 1) * uh / VISLINES as i32 - uh / 2) as f32 * self.puheight) as i32 + uh / 2;

        let signal_offset = ((lineno + self.cur_vsync) % V) * H + self.line_hsync[lineno];

        if ytop == ybot || ybot < 0 || ytop > uh {
            return None;
        }

        let ytop = ytop.max(0);
        let ybot = ybot.min(uh).min(ytop + MAX_LINEHEIGHT as i32);

        Some(LineGeom { lineno, slineno, ytop, ybot, signal_offset })
    }

    /// Render all visible lines into the CRT image, in parallel. Each
    /// line owns a disjoint band of image rows, carved out up front so
    /// the workers can write without coordination.
    pub(crate) fn draw_lines(&mut self) {
        let jobs: Vec<LineGeom> = (TOP..BOT)
            .filter_map(|l| self.get_line(l))
            .filter(|g| g.ybot > g.ytop)
            .collect();

        let mut image = std::mem::take(&mut self.image);
        let stride = image.stride();

        let mut tasks: Vec<(LineGeom, &mut [u8])> = Vec::with_capacity(jobs.len());
        let mut rest: &mut [u8] = image.data_mut();
        let mut row = 0usize;
        for job in jobs {
            let gap = (job.ytop as usize - row) * stride;
            let take = (job.ybot - job.ytop) as usize * stride;
            let tail = std::mem::take(&mut rest);
            let (_, tail) = tail.split_at_mut(gap);
            let (band, tail) = tail.split_at_mut(take);
            rest = tail;
            row = job.ybot as usize;
            tasks.push((job, band));
        }

        let this: &TvEngine = self;
        tasks
            .into_par_iter()
            .for_each(|(job, band)| this.render_line(&job, band, stride));

        self.image = image;
    }

    fn render_line(&self, job: &LineGeom, band: &mut [u8], stride: usize) {
        let lineno = job.lineno;
        let slineno = job.slineno;

        let bloom = (-10.0 * self.crtload[lineno]).clamp(-10.0, 2.0);
        let shift = if slineno < 16 {
            self.horiz_desync * ((-0.17 * slineno as f32).exp() * (0.7 + (slineno as f32 * 0.6).cos()))
        } else {
            0.0
        };

        let viswidth = PIC_LEN as f32 * 0.79 - 5.0 * bloom;
        let middle = (PIC_LEN / 2) as f32 - shift;

        let scanwidth = self.width_control * self.puramp(0.5, 0.3, 1.0);

        let scw = ((self.subwidth as f32 * scanwidth) as i32).min(self.subwidth as i32);
        let scl = self.subwidth as i32 / 2 - scw / 2;
        let scr = self.subwidth as i32 / 2 + scw / 2;

        let pixrate = ((viswidth * 65536.0 / self.subwidth as f32) as i32 as f32 / scanwidth) as i32;
        let scanstart_i = ((middle - viswidth * 0.5) * 65536.0) as i32;
        let scanend_i = (PIC_LEN as i32 - 1) * 65536;
        let squishright_i =
            ((middle + viswidth * (0.25 + 0.25 * self.puramp(2.0, 0.0, 1.1) - self.squish_control)) * 65536.0) as i32;
        let squishdiv = self.subwidth as i32 / 15;

        let mut yiq = vec![Yiq::default(); PIC_LEN + 10];
        let start = ((scanstart_i >> 16) - 10).max(0) as usize;
        let end = (((scanend_i >> 16) + 10) as usize).min(PIC_LEN + 10);
        self.ntsc_to_yiq(lineno, job.signal_offset, start, end, &mut yiq);

        let mut pixbright =
            self.contrast_control * self.puramp(1.0, 0.0, 1.0) / (0.5 + 0.5 * self.puheight) * 1024.0 / 100.0;
        let mut pixmultinc = pixrate;

        let mut raw_rgb = vec![0f32; self.subwidth * 3];
        let mut i = scanstart_i;
        let mut px = scl;

        while i < 0 && px != scr {
            i += pixmultinc;
            px += 1;
        }
        while i < scanend_i && px != scr {
            let pixfrac = (i & 0xffff) as f32 / 65536.0;
            let invpixfrac = 1.0 - pixfrac;
            let pati = (i >> 16) as usize;

            let interpy = yiq[pati].y * invpixfrac + yiq[pati + 1].y * pixfrac;
            let interpi = yiq[pati].i * invpixfrac + yiq[pati + 1].i * pixfrac;
            let interpq = yiq[pati].q * invpixfrac + yiq[pati + 1].q * pixfrac;

            /*
              According to the NTSC spec, Y,I,Q are generated as:

                y=0.30 r + 0.59 g + 0.11 b
                i=0.60 r - 0.28 g - 0.32 b
                q=0.21 r - 0.52 g + 0.31 b

              Invert the implied 3x3 matrix and you get what standard
              televisions implement with a bunch of resistors (or
              directly in the CRT):

                r = y + 0.948 i + 0.624 q
                g = y - 0.276 i - 0.639 q
                b = y - 1.105 i + 1.729 q
            */
            let r = ((interpy + 0.948 * interpi + 0.624 * interpq) * pixbright).max(0.0);
            let g = ((interpy - 0.276 * interpi - 0.639 * interpq) * pixbright).max(0.0);
            let b = ((interpy - 1.105 * interpi + 1.729 * interpq) * pixbright).max(0.0);

            let o = px as usize * 3;
            raw_rgb[o] = r;
            raw_rgb[o + 1] = g;
            raw_rgb[o + 2] = b;

            if i >= squishright_i {
                pixmultinc += pixmultinc / squishdiv;
                pixbright += pixbright / squishdiv as f32 / 2.0;
            }
            i += pixmultinc;
            px += 1;
        }

        self.blast_imagerow(&raw_rgb, job, band, stride);
    }

    /// Replicate one rendered line over its band of image rows. Rows
    /// sharing a level-table index are byte-identical, so the first one
    /// rendered per index is copied to the rest.
    fn blast_imagerow(&self, raw_rgb: &[f32], job: &LineGeom, band: &mut [u8], stride: usize) {
        let lineheight = ((job.ybot - job.ytop) as usize).min(MAX_LINEHEIGHT);
        let mut copy_from: [Option<usize>; 3] = [None; 3];

        for y in 0..(job.ybot - job.ytop) as usize {
            let entry = self.leveltable[lineheight][y];

            if let Some(src) = copy_from[entry.index] {
                band.copy_within(src * stride..(src + 1) * stride, y * stride);
                continue;
            }
            copy_from[entry.index] = Some(y);

            let row = &mut band[y * stride..(y + 1) * stride];
            for (px, rgb) in raw_rgb.chunks_exact(3).enumerate() {
                let mut out = [0u8; BYTES_PER_PIXEL];
                for c in 0..3 {
                    let v = (rgb[c] * entry.value).min((CV_MAX - 1) as f32) as usize;
                    out[c] = self.intensity_values[v];
                }

                let o = px * self.xrepl * BYTES_PER_PIXEL;
                row[o..o + BYTES_PER_PIXEL].copy_from_slice(&out);
                if self.xrepl >= 2 {
                    row[o + BYTES_PER_PIXEL..o + 2 * BYTES_PER_PIXEL].copy_from_slice(&out);
                }
            }
        }
    }
}
