//! Horizontal/vertical sync following and colorburst phase tracking.

use crate::geometry::*;

use super::TvEngine;

impl TvEngine {
    /// Track sync the way the set's oscillators do: free-run slightly
    /// slow and let the sync pulses pull the phase back. A weak or
    /// absent signal means late triggering, which is exactly how a real
    /// set loses hold of the picture.
    pub(crate) fn sync(&mut self) {
        let mut cur_hsync = self.cur_hsync as i32;
        let mut cur_vsync = self.cur_vsync as i32;

        /* Vertical: scan a window of lines around the current lock for
           the first one whose average drops enough to trigger. */
        let mut vi = 32 * SCALE as i32 - 1;
        for i in -(32 * SCALE as i32)..(32 * SCALE as i32) {
            let lineno = (cur_vsync + i).rem_euclid(V as i32) as usize;

            let mut filt = 0f32;
            let mut j = 0;
            while j < H {
                filt += self.rx_signal[lineno * H + j];
                j += H / (16 * SCALE);
            }
            filt *= self.agclevel;

            let osc = (V as i32 + i) as f32 / V as f32;
            vi = i;
            if osc >= 1.05 + 0.0002 * filt {
                break;
            }
        }
        cur_vsync = (cur_vsync + vi).rem_euclid(V as i32);

        for lineno in 0..V {
            if lineno > 5 * SCALE && lineno < V - 3 * SCALE {
                /* ignore the vsync interval */
                let mut lineno2 = (lineno as i32 + cur_vsync).rem_euclid(V as i32) as usize;
                if lineno2 == 0 {
                    /* line 0 would index before the buffer; its wrap
                       duplicate at V serves instead */
                    lineno2 = V;
                }

                let sidx = (lineno2 * H) as i32 + cur_hsync;
                let mut hi = 8 * SCALE as i32 - 1;
                for i in -(8 * SCALE as i32)..(8 * SCALE as i32) {
                    let osc = (H as i32 + i) as f32 / H as f32;
                    let base = (sidx + i) as usize;
                    let filt = (self.rx_signal[base - 3]
                        + self.rx_signal[base - 2]
                        + self.rx_signal[base - 1]
                        + self.rx_signal[base])
                        * self.agclevel;
                    hi = i;
                    if osc >= 1.005 + 0.0001 * filt {
                        break;
                    }
                }
                cur_hsync = (cur_hsync + hi).rem_euclid(H as i32);
            }

            self.line_hsync[lineno] = (cur_hsync as usize + PIC_START) % H;

            /* The colorburst is 9 cycles a little after the sync pulse;
               accumulate the phase of its middle 5 cycles. */
            if lineno > 15 * SCALE {
                let base = lineno * H + (cur_hsync as usize & !3);
                for i in CB_START + 8 * SCALE..CB_START + (36 - 8) * SCALE {
                    self.cb_phase[i & 3] = self.cb_phase[i & 3] * (1.0 - 1.0 / 128.0)
                        + self.rx_signal[base + i] as f64 * self.agclevel as f64 * (1.0 / 128.0);
                }
            }

            let mut tot = 0.1f64;
            for p in self.cb_phase {
                tot += p * p;
            }
            let cbgain = 32.0 / tot.sqrt();
            for k in 0..4 {
                self.line_cb_phase[lineno][k] = self.cb_phase[k] * cbgain;
            }
        }

        self.cur_hsync = cur_hsync as usize;
        self.cur_vsync = cur_vsync as usize;
    }
}
