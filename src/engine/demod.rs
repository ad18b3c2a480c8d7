//! Composite-to-YIQ demodulation.
//!
//! The set splits the signal into three: Y is the signal low-passed
//! below 3.57 MHz; I and Q are the in-phase and quadrature components
//! of the subcarrier, recovered by multiplying with the reference
//! carrier reconstructed from the colorburst and low-pass filtering.
//! The eye has less resolution in some colors than others, so I is
//! filtered at 1.5 MHz and Q at 0.5 MHz.

use crate::geometry::*;

use super::TvEngine;

#[derive(Clone, Copy, Default)]
pub(crate) struct Yiq {
    pub y: f32,
    pub i: f32,
    pub q: f32,
}

impl TvEngine {
    /// Demodulate `yiq[start..end]` of one scan line starting at
    /// `signal_offset` in the receiver buffer.
    pub(crate) fn ntsc_to_yiq(&self, lineno: usize, signal_offset: usize, start: usize, end: usize, yiq: &mut [Yiq]) {
        let signal = &self.rx_signal[signal_offset..];
        let phasecorr = signal_offset & 3;

        /* Reconstruct the demod reference from the tracked colorburst.
           The tint control adds a phase shift to it, the color control
           scales it. Without a believable burst the set falls back to
           monochrome, like on a text-mode signal with the burst
           disabled. */
        let lcb = &self.line_cb_phase[lineno];
        let cb_i = (lcb[(2 + phasecorr) & 3] - lcb[phasecorr & 3]) / 16.0;
        let cb_q = (lcb[(3 + phasecorr) & 3] - lcb[(1 + phasecorr) & 3]) / 16.0;
        let colormode = cb_i * cb_i + cb_q * cb_q > 2.8;

        let mut multiq2 = [0f32; 4];
        if colormode {
            let (tint_i, tint_q) = (self.tint_i as f64, self.tint_q as f64);
            multiq2[0] = ((cb_i * tint_i - cb_q * tint_q) * self.color_control as f64) as f32;
            multiq2[1] = ((cb_q * tint_i + cb_i * tint_q) * self.color_control as f64) as f32;
            multiq2[2] = -multiq2[0];
            multiq2[3] = -multiq2[1];
        }

        let agclevel = self.agclevel;
        let brightadd = self.brightness_control * 100.0 - BLACK_LEVEL as f32;

        /* These are infinite impulse response filters calculated by
           mkfilter (http://www-users.cs.york.ac.uk/~fisher/mkfilter).

           Y: 4-pole low-pass Butterworth at 3.5 MHz with an extra zero
           at 3.5 MHz, from
           mkfilter -Bu -Lp -o 4 -a 2.1428571429e-01 0 -Z 2.5e-01 -l
           Delay about 2. */
        let mut xy = [0f32; 7];
        let mut yy = [0f32; 5];
        for i in start..end {
            xy.copy_within(1.., 0);
            xy[6] = signal[i] * 0.046_990_425_725_193_5 * agclevel;
            yy.copy_within(1.., 0);
            let y = (xy[0] + xy[6]) + 4.0 * (xy[1] + xy[5]) + 7.0 * (xy[2] + xy[4]) + 8.0 * xy[3]
                - 0.017_664_8 * yy[0]
                - 0.486_028_8 * yy[2];
            yy[4] = y;
            yiq[i].y = y + brightadd;
        }

        if colormode {
            /* I and Q: 3-pole low-pass Butterworth at 1.5 MHz with an
               extra zero at 3.5 MHz, from
               mkfilter -Bu -Lp -o 3 -a 1.0714285714e-01 0 -Z 2.5000000000e-01 -l
               Delay about 3. */
            let mut xi = [0f32; 6];
            let mut yi = [0f32; 3];
            let mut xq = [0f32; 6];
            let mut yq = [0f32; 3];

            for i in start..end {
                let sig = signal[i];

                xi.copy_within(1.., 0);
                xi[5] = sig * multiq2[i & 3] * 0.083_333_333_333_3;
                yi.copy_within(1.., 0);
                let vi = (xi[0] + xi[5]) + 3.0 * (xi[1] + xi[4]) + 4.0 * (xi[2] + xi[3]) - 0.333_333_333_3 * yi[0];
                yi[2] = vi;
                yiq[i].i = vi;

                xq.copy_within(1.., 0);
                xq[5] = sig * multiq2[(i + 3) & 3] * 0.083_333_333_333_3;
                yq.copy_within(1.., 0);
                let vq = (xq[0] + xq[5]) + 3.0 * (xq[1] + xq[4]) + 4.0 * (xq[2] + xq[3]) - 0.333_333_333_3 * yq[0];
                yq[2] = vq;
                yiq[i].q = vq;
            }
        } else {
            for e in &mut yiq[start..end] {
                e.i = 0.0;
                e.q = 0.0;
            }
        }
    }
}
