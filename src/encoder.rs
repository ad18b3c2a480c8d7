//! Encodes a raster image into an InputSignal the way a video camera
//! would, including the bandwidth limiting and YIQ modulation.

use crate::geometry::*;
use crate::input::InputSignal;
use crate::raster::Raster;

/// Overscan this much top and bottom.
const Y_OVERSCAN: usize = 5 * SCALE;

/// 16-bit color channel, the upper byte replicated into the lower.
#[derive(Clone, Copy, Default)]
struct Color16 {
    red: i32,
    green: i32,
    blue: i32,
}

fn pix_to_color(px: [u8; 4]) -> Color16 {
    let (r, g, b) = (px[0] as i32, px[1] as i32, px[2] as i32);
    Color16 { red: r | (r << 8), green: g | (g << 8), blue: b | (b << 8) }
}

/// Render `pic` into the picture area of `input`.
///
/// `xoff`/`yoff` position the top-left corner and `target_w`/`target_h`
/// the rendered size, all in output-pixel space for an `out_w` x `out_h`
/// output. A mask pixel of all zeroes means "don't write", which
/// deliberately conflates black with transparency the way the old
/// X11 BlackPixel masking did.
#[allow(clippy::too_many_arguments)]
pub fn load_ximage(
    input: &mut InputSignal,
    pic: &Raster,
    mask: Option<&Raster>,
    xoff: i32,
    yoff: i32,
    target_w: usize,
    target_h: usize,
    out_w: usize,
    out_h: usize,
) {
    let mut x_length = PIC_LEN;
    let mut y_scanlength = VISLINES + 2 * Y_OVERSCAN;

    if target_w > 0 {
        x_length = (x_length * target_w / out_w).min(PIC_LEN);
    }
    if target_h > 0 {
        y_scanlength = y_scanlength * target_h / out_h;
    }

    let img_w = pic.width();
    let img_h = pic.height();
    if img_w == 0 || img_h == 0 || x_length == 0 || y_scanlength == 0 {
        return;
    }

    let xoff = PIC_LEN as i32 * xoff / out_w as i32;
    let yoff = VISLINES as i32 * yoff / out_w as i32;

    // Quadrature subcarrier reference, 4096 = unit amplitude.
    let mut multiq = vec![0i32; x_length + 4];
    for (i, m) in multiq.iter_mut().enumerate() {
        let phase = 90.0 - 90.0 * i as f64;
        *m = (-(std::f64::consts::PI / 180.0 * (phase - 303.0)).cos() * 4096.0) as i32;
    }

    let mut col1 = vec![Color16::default(); x_length];
    let mut col2 = vec![Color16::default(); x_length];
    let mut opaque = vec![true; x_length];

    for y in 0..y_scanlength {
        let sig_y = y as i32 - Y_OVERSCAN as i32 + TOP as i32 + yoff;
        if sig_y < 0 || sig_y >= V as i32 {
            continue;
        }

        // Two source rows half a scan apart give a cheap vertical
        // anti-alias.
        let picy1 = y * img_h / y_scanlength;
        let picy2 = ((y * img_h + y_scanlength / 2) / y_scanlength).min(img_h - 1);

        for x in 0..x_length {
            let picx = x * img_w / x_length;
            col1[x] = pix_to_color(pic.pixel(picx, picy1));
            col2[x] = pix_to_color(pic.pixel(picx, picy2));
            opaque[x] = match mask {
                Some(m) => m.pixel(picx, picy1) != [0, 0, 0, 0],
                None => true,
            };
        }

        let mut fyx = [0i32; 7];
        let mut fyy = [0i32; 7];
        let mut fix = [0i32; 4];
        let mut fiy = [0i32; 4];
        let mut fqx = [0i32; 4];
        let mut fqy = [0i32; 4];

        let sig_row = input.row_mut(sig_y as usize);
        for x in 0..x_length {
            if !opaque[x] {
                continue;
            }

            /* Compute YIQ as:
                 y=0.30 r + 0.59 g + 0.11 b
                 i=0.60 r - 0.28 g - 0.32 b
                 q=0.21 r - 0.52 g + 0.31 b
               The coefficients below are in .4 format */

            let rawy = (5 * col1[x].red + 11 * col1[x].green + 2 * col1[x].blue
                + 5 * col2[x].red + 11 * col2[x].green + 2 * col2[x].blue)
                >> 7;
            let rawi = (10 * col1[x].red - 4 * col1[x].green - 5 * col1[x].blue
                + 10 * col2[x].red - 4 * col2[x].green - 5 * col2[x].blue)
                >> 7;
            let rawq = (3 * col1[x].red - 8 * col1[x].green + 5 * col1[x].blue
                + 3 * col2[x].red - 8 * col2[x].green + 5 * col2[x].blue)
                >> 7;

            /* Filter Y with a 4-pole low-pass Butterworth at 3.5 MHz
               with an extra zero at 3.5 MHz, from
               mkfilter -Bu -Lp -o 4 -a 2.1428571429e-01 0 -Z 2.5e-01 -l */

            fyx.copy_within(1..7, 0);
            fyx[6] = (rawy * 1897) >> 16;
            fyy.copy_within(1..7, 0);
            fyy[6] = (fyx[0] + fyx[6]) + 4 * (fyx[1] + fyx[5]) + 7 * (fyx[2] + fyx[4]) + 8 * fyx[3]
                + ((-151 * fyy[2] + 8115 * fyy[3] - 38312 * fyy[4] + 36586 * fyy[5]) >> 16);
            let filty = fyy[6];

            /* Filter I at 1.5 MHz. 3 pole Butterworth from
               mkfilter -Bu -Lp -o 3 -a 1.0714285714e-01 0 */

            fix.copy_within(1..4, 0);
            fix[3] = (rawi * 1413) >> 16;
            fiy.copy_within(1..4, 0);
            fiy[3] = (fix[0] + fix[3]) + 3 * (fix[1] + fix[2])
                + ((16559 * fiy[0] - 72008 * fiy[1] + 109682 * fiy[2]) >> 16);
            let filti = fiy[3];

            /* Filter Q at 0.5 MHz. 3 pole Butterworth from
               mkfilter -Bu -Lp -o 3 -a 3.5714285714e-02 0 -l */

            fqx.copy_within(1..4, 0);
            fqx[3] = (rawq * 75) >> 16;
            fqy.copy_within(1..4, 0);
            fqy[3] = (fqx[0] + fqx[3]) + 3 * (fqx[1] + fqx[2])
                + ((2612 * fqy[0] - 9007 * fqy[1] + 10453 * fqy[2]) >> 12);
            let filtq = fqy[3];

            let sig_x = x as i32 + PIC_START as i32 + xoff;
            if sig_x < 0 || sig_x >= H as i32 {
                continue;
            }

            let mut composite = filty + ((multiq[x] * filti + multiq[x + 3] * filtq) >> 12);
            composite = ((composite * 100) >> 14) + BLACK_LEVEL;
            composite = composite.clamp(0, 125);

            sig_row[sig_x as usize] = composite as i8;
        }
    }
}

/*
   SMPTE is the society of motion picture and television engineers, and
   these are the standard color bars in the US. Following the partial spec
   at http://broadcastengineering.com/ar/broadcasting_inside_color_bars/
   These are luma, chroma, and phase numbers for each of the 7 bars.
*/
const TOP_CB_TABLE: [[f64; 3]; 7] = [
    [75.0, 0.0, 0.0],    /* gray */
    [69.0, 31.0, 167.0], /* yellow */
    [56.0, 44.0, 283.5], /* cyan */
    [48.0, 41.0, 240.5], /* green */
    [36.0, 41.0, 60.5],  /* magenta */
    [28.0, 44.0, 103.5], /* red */
    [15.0, 31.0, 347.0], /* blue */
];
const MID_CB_TABLE: [[f64; 3]; 7] = [
    [15.0, 31.0, 347.0], /* blue */
    [7.0, 0.0, 0.0],     /* black */
    [36.0, 41.0, 60.5],  /* magenta */
    [7.0, 0.0, 0.0],     /* black */
    [56.0, 44.0, 283.5], /* cyan */
    [7.0, 0.0, 0.0],     /* black */
    [75.0, 0.0, 0.0],    /* gray */
];

/// Draw the SMPTE color bar pattern, optionally compositing a logo
/// (with its alpha pulled out into a separate mask) over the top bars.
pub fn draw_smpte_bars(input: &mut InputSignal, logo: Option<(&Raster, &Raster)>, out_w: usize, out_h: usize) {
    input.setup_sync(true, false);

    for (col, (top, mid)) in TOP_CB_TABLE.iter().zip(MID_CB_TABLE.iter()).enumerate() {
        let l = col as f64 / 7.0;
        let r = (col + 1) as f64 / 7.0;
        input.draw_solid_rel_lcp(l, r, 0.00, 0.68, top[0], top[1], top[2]);
        input.draw_solid_rel_lcp(l, r, 0.68, 0.75, mid[0], mid[1], mid[2]);
    }

    input.draw_solid_rel_lcp(0.0, 1.0 / 6.0, 0.75, 1.00, 7.0, 40.0, 303.0); /* -I       */
    input.draw_solid_rel_lcp(1.0 / 6.0, 2.0 / 6.0, 0.75, 1.00, 100.0, 0.0, 0.0); /* white    */
    input.draw_solid_rel_lcp(2.0 / 6.0, 3.0 / 6.0, 0.75, 1.00, 7.0, 40.0, 33.0); /* +Q       */
    input.draw_solid_rel_lcp(3.0 / 6.0, 4.0 / 6.0, 0.75, 1.00, 7.0, 0.0, 0.0); /* black    */
    input.draw_solid_rel_lcp(12.0 / 18.0, 13.0 / 18.0, 0.75, 1.00, 3.0, 0.0, 0.0); /* black -4 */
    input.draw_solid_rel_lcp(13.0 / 18.0, 14.0 / 18.0, 0.75, 1.00, 7.0, 0.0, 0.0); /* black    */
    input.draw_solid_rel_lcp(14.0 / 18.0, 15.0 / 18.0, 0.75, 1.00, 11.0, 0.0, 0.0); /* black +4 */
    input.draw_solid_rel_lcp(5.0 / 6.0, 6.0 / 6.0, 0.75, 1.00, 7.0, 0.0, 0.0); /* black    */

    if let Some((logo_img, logo_mask)) = logo {
        let aspect = out_w as f64 / out_h as f64;
        let scale = if aspect > 1.0 { 0.35 } else { 0.6 };
        let w2 = (out_w as f64 * scale) as usize;
        let h2 = (out_h as f64 * scale * aspect) as usize;
        let xoff = (out_w.saturating_sub(w2)) as i32 / 2;
        let yoff = (out_h as f64 * 0.20) as i32;
        load_ximage(input, logo_img, Some(logo_mask), xoff, yoff, w2, h2, out_w, out_h);
    }
}
