//! Composes sources, controller, engine and sinks and drives the frame
//! loop.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::control::{self, Op};
use crate::engine::TvEngine;
use crate::input::InputSignal;
use crate::raster::Raster;
use crate::sink;
use crate::source;

pub struct RunConfig {
    pub sources: Vec<String>,
    pub outputs: Vec<String>,
    pub control: String,
    pub size: Option<(usize, usize)>,
    pub seed: u64,
}

pub fn run(cfg: &RunConfig) -> Result<()> {
    let seed = if cfg.seed != 0 {
        cfg.seed
    } else {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(1)
    };
    log::debug!("seed {seed}");
    let mut rng = SmallRng::seed_from_u64(seed);

    let mut sources = Vec::new();
    for desc in &cfg.sources {
        sources.push(source::create(desc)?);
    }

    /* Output size: as given, else the largest input. Odd sizes round
       down; codecs can't take them. */
    let (mut out_w, mut out_h) = match cfg.size {
        Some(size) => size,
        None => sources
            .iter()
            .map(|s| s.image_size())
            .fold((0, 0), |(mw, mh), (w, h)| (mw.max(w), mh.max(h))),
    };
    out_w &= !1;
    out_h &= !1;
    anyhow::ensure!(out_w > 0 && out_h > 0, "empty output size");
    log::info!("output size {out_w}x{out_h}");

    let mut stations: Vec<InputSignal> = Vec::new();
    for src in sources.iter_mut() {
        src.set_out_size(out_w, out_h);
        /* The occasional station runs SSAVI scrambling. */
        src.set_ssavi(rng.random_range(0..20u32) == 0);
        stations.push(InputSignal::new());
    }

    let mut control = control::create(&cfg.control)?;
    control.set_seed(seed);
    control.create_channels(sources.len());
    control.start();

    let mut tv = TvEngine::new(out_w, out_h, seed.wrapping_add(1));

    let mut sinks = Vec::new();
    for desc in &cfg.outputs {
        sinks.push(sink::create(desc, out_w, out_h)?);
    }

    let progress = match control.total_frames() {
        Some(total) if log::max_level() < log::LevelFilter::Info => {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::with_template("processing {bar:40} {pos}/{len} [{elapsed_precise}<{eta_precise}]")
                    .expect("static template")
                    .progress_chars("##-"),
            );
            Some(bar)
        }
        _ => None,
    };

    let mut out = Raster::new(out_w, out_h);
    let mut channel_changes = 0u64;

    'frames: loop {
        let op = control.next(&mut tv);

        match op.op {
            Op::Quit => break 'frames,
            Op::Switch => {
                channel_changes += 1;
                tv.channel_change_cycles = 200_000;
            }
            Op::Knobs | Op::None => {}
        }

        {
            let channel = &mut control.channels_mut()[op.channel];
            for rec in channel.receptions.iter_mut() {
                sources[rec.station].update(&mut stations[rec.station]);
                rec.ofs += rec.freqerr;
                rec.update(&mut rng);
            }
            tv.draw(channel.noise_level, &channel.receptions, &mut stations, &mut out);
        }

        for s in sinks.iter_mut() {
            if let Err(e) = s.send(&out) {
                log::warn!("output stopped: {e}");
                break 'frames;
            }
        }

        if let Some(bar) = &progress {
            bar.inc(1);
        }
    }

    if let Some(bar) = &progress {
        bar.finish_and_clear();
    }

    for s in sinks.iter_mut() {
        s.finish().context("closing output")?;
    }

    log::info!("channels shown: {channel_changes}");
    Ok(())
}
