//! End-to-end picture checks: bars through the whole receive path come
//! out as recognizable bars.

use analogtv::encoder;
use analogtv::engine::TvEngine;
use analogtv::input::InputSignal;
use analogtv::raster::Raster;
use analogtv::reception::Reception;

fn render_bars(frames: usize) -> Raster {
    let mut station = InputSignal::new();
    encoder::draw_smpte_bars(&mut station, None, 320, 240);
    let mut stations = [station];

    let mut tv = TvEngine::new(320, 240, 1);

    let mut rec = Reception::new(0);
    rec.level = 0.3;

    let mut out = Raster::new(320, 240);
    for _ in 0..frames {
        tv.draw(0.0, std::slice::from_ref(&rec), &mut stations, &mut out);
    }
    out
}

fn region_mean(out: &Raster, x0: usize, x1: usize, y0: usize, y1: usize) -> [f64; 3] {
    let mut sum = [0f64; 3];
    let mut n = 0f64;
    for y in y0..y1 {
        for x in x0..x1 {
            let px = out.pixel(x, y);
            for c in 0..3 {
                sum[c] += px[c] as f64;
            }
            n += 1.0;
        }
    }
    sum.map(|s| s / n)
}

#[test]
fn gray_bar_is_bright_and_neutral() {
    let out = render_bars(3);
    // Leftmost top bar, away from the edge artifacts.
    let [r, g, b] = region_mean(&out, 24, 36, 50, 70);
    assert!(r > 150.0 && g > 150.0 && b > 150.0, "gray bar too dark: {r} {g} {b}");
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    assert!(max - min < 0.35 * max, "gray bar not neutral: {r} {g} {b}");
}

#[test]
fn blue_bar_leans_blue() {
    let out = render_bars(3);
    // Rightmost top bar.
    let [r, _g, b] = region_mean(&out, 284, 296, 50, 70);
    assert!(b > r + 20.0, "blue bar not blue: r={r} b={b}");
}

#[test]
fn pluge_white_chip_beats_black_chip() {
    let out = render_bars(3);
    let white = region_mean(&out, 140, 172, 200, 220);
    let black = region_mean(&out, 192, 222, 200, 220);
    let wl = white.iter().sum::<f64>();
    let bl = black.iter().sum::<f64>();
    assert!(wl > 3.0 * bl, "white {wl} vs black {bl}");
}

#[test]
fn noise_burst_perturbs_the_frame() {
    let mut station = InputSignal::new();
    encoder::draw_smpte_bars(&mut station, None, 320, 240);
    let mut stations = [station];

    let mut tv = TvEngine::new(320, 240, 1);
    let mut rec = Reception::new(0);
    rec.level = 0.3;

    let mut clean = Raster::new(320, 240);
    for _ in 0..3 {
        tv.draw(0.0, std::slice::from_ref(&rec), &mut stations, &mut clean);
    }

    // The same set one frame later, mid channel change.
    tv.channel_change_cycles = 200_000;
    let mut burst = Raster::new(320, 240);
    tv.draw(0.0, std::slice::from_ref(&rec), &mut stations, &mut burst);

    let mut diff = 0u64;
    for (a, b) in clean.data().iter().zip(burst.data()) {
        diff += a.abs_diff(*b) as u64;
    }
    let per_pixel = diff as f64 / (320.0 * 240.0);
    assert!(per_pixel > 5.0, "burst changed too little: {per_pixel}");
}
