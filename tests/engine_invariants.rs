//! Receiver-level properties: the no-signal law, sync recovery and the
//! power ramp as seen from the outside.

use analogtv::encoder;
use analogtv::engine::TvEngine;
use analogtv::geometry::{H, SIGNAL_LEN, V};
use analogtv::input::InputSignal;
use analogtv::raster::Raster;
use analogtv::reception::Reception;

fn mean_luma(out: &Raster) -> f64 {
    let mut sum = 0f64;
    for px in out.data().chunks_exact(4) {
        sum += 0.299 * px[0] as f64 + 0.587 * px[1] as f64 + 0.114 * px[2] as f64;
    }
    sum / (out.width() * out.height()) as f64
}

#[test]
fn no_signal_no_noise_yields_black() {
    let mut tv = TvEngine::new(320, 240, 3);
    let mut out = Raster::new(320, 240);
    let mut stations: [InputSignal; 0] = [];

    for _ in 0..3 {
        tv.draw(0.0, &[], &mut stations, &mut out);
    }

    assert!(tv.rx_signal().iter().all(|&s| s == 0.0), "rx_signal not silent");
    assert!(
        out.data().chunks_exact(4).all(|px| px[0] == 0 && px[1] == 0 && px[2] == 0),
        "output raster not black"
    );
}

#[test]
fn powered_off_set_stays_dark() {
    let mut station = InputSignal::new();
    encoder::draw_smpte_bars(&mut station, None, 320, 240);
    let mut stations = [station];

    let mut tv = TvEngine::new(320, 240, 3);
    tv.powerup = 0.0;

    let mut rec = Reception::new(0);
    rec.level = 0.3;

    let mut out = Raster::new(320, 240);
    tv.draw(0.06, std::slice::from_ref(&rec), &mut stations, &mut out);

    assert!(mean_luma(&out) < 1.0, "got {}", mean_luma(&out));
}

#[test]
fn warm_set_shows_the_picture() {
    let mut station = InputSignal::new();
    encoder::draw_smpte_bars(&mut station, None, 320, 240);
    let mut stations = [station];

    let mut tv = TvEngine::new(320, 240, 3);

    let mut rec = Reception::new(0);
    rec.level = 0.3;

    let mut out = Raster::new(320, 240);
    for _ in 0..3 {
        tv.draw(0.06, std::slice::from_ref(&rec), &mut stations, &mut out);
    }

    let warm = mean_luma(&out);
    assert!(warm > 20.0, "picture too dark: {warm}");
}

#[test]
fn powerup_ramp_brightens_over_time() {
    let render_at = |powerup: f32| {
        let mut station = InputSignal::new();
        encoder::draw_smpte_bars(&mut station, None, 320, 240);
        let mut stations = [station];

        let mut tv = TvEngine::new(320, 240, 3);
        let mut rec = Reception::new(0);
        rec.level = 0.3;
        let mut out = Raster::new(320, 240);
        for _ in 0..3 {
            tv.powerup = powerup;
            tv.draw(0.06, std::slice::from_ref(&rec), &mut stations, &mut out);
        }
        mean_luma(&out)
    };

    let cold = render_at(0.0);
    let warming = render_at(2.0);
    let warm = render_at(7.0);

    assert!(cold <= warm * 0.01 + 1e-9, "cold {cold} vs warm {warm}");
    assert!(warming > cold && warming < warm, "cold {cold} warming {warming} warm {warm}");
}

/// Rotate a signal right by `k` samples across the whole frame.
fn rotate_signal(src: &InputSignal, k: usize) -> InputSignal {
    let mut dst = InputSignal::new();
    let flat = src.flat();
    for y in 0..V {
        for x in 0..H {
            let to = y * H + x;
            let from = (to + SIGNAL_LEN - k % SIGNAL_LEN) % SIGNAL_LEN;
            dst.row_mut(y)[x] = flat[from];
        }
    }
    dst
}

#[test]
fn hsync_tracks_a_rotated_signal() {
    let k = 64usize;

    let mut plain = InputSignal::new();
    encoder::draw_smpte_bars(&mut plain, None, 320, 240);
    let rotated = rotate_signal(&plain, k);

    let run = |station: InputSignal| {
        let mut stations = [station];
        let mut tv = TvEngine::new(320, 240, 3);
        let mut rec = Reception::new(0);
        rec.level = 1.0;
        let mut out = Raster::new(320, 240);
        for _ in 0..3 {
            tv.draw(0.0, std::slice::from_ref(&rec), &mut stations, &mut out);
        }
        tv.cur_hsync()
    };

    let base = run(plain);
    let shifted = run(rotated);

    let delta = (shifted + H - base) % H;
    let diff = (delta + H - k) % H;
    let err = diff.min(H - diff);
    assert!(err <= 12, "hsync lock off by {err} (base {base}, shifted {shifted})");
}
