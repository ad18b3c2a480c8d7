//! Per-frame scheduling: channel hopping, knob drift, power-up and the
//! fade to black at the end of the run.

use std::fs;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use crate::engine::TvEngine;
use crate::geometry::SIGNAL_LEN;
use crate::reception::Reception;
use crate::Error;

pub const MAX_MULTICHAN: usize = 2;

pub const POWERUP_DURATION: f64 = 6.0;
pub const POWERDOWN_DURATION: f64 = 1.0;

/// The tuner set to one channel: up to two receptions (the second one
/// is a ghost) plus the channel's noise floor.
pub struct ChannelSetting {
    pub receptions: Vec<Reception>,
    pub noise_level: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Quit,
    Switch,
    Knobs,
    None,
}

#[derive(Clone, Copy, Debug)]
pub struct Operation {
    pub op: Op,
    pub channel: usize,
}

pub trait Control {
    fn set_seed(&mut self, seed: u64);

    /// Build the channel table for `n_sources` stations.
    fn create_channels(&mut self, n_sources: usize);

    fn channels(&self) -> &[ChannelSetting];
    fn channels_mut(&mut self) -> &mut [ChannelSetting];

    /// Reset the frame counter and knobs; call once before the loop.
    fn start(&mut self);

    /// Advance one frame. Writes the knob values into the engine before
    /// returning.
    fn next(&mut self, tv: &mut TvEngine) -> Operation;

    /// Total frames a bounded run will produce, if known.
    fn total_frames(&self) -> Option<u64>;
}

/// Parse a control description: `:random[:key=val...]` or a path to a
/// JSON scenario file.
pub fn create(desc: &str) -> Result<Box<dyn Control>, Error> {
    let tokens: Vec<&str> = desc.split(':').collect();

    if !tokens[0].is_empty() {
        return ScriptedControl::from_file(desc).map(|c| Box::new(c) as Box<dyn Control>);
    }

    if tokens.len() < 2 {
        return Err(Error::InvalidArgs("control type not given".into()));
    }

    match tokens[1] {
        "random" => {
            let mut duration = 60i64;
            let mut fps = 30i64;
            let mut power_up_down = false;
            let mut fix_settings = false;

            for token in &tokens[2..] {
                if token.is_empty() {
                    continue;
                }
                let mut kv = token.splitn(2, '=');
                let key = kv.next().unwrap();
                let val = kv.next();
                match (key, val) {
                    ("duration", Some(v)) => {
                        duration = v
                            .parse()
                            .map_err(|_| Error::InvalidArgs(format!("bad duration {v:?}")))?;
                    }
                    ("fps", Some(v)) => {
                        fps = v.parse().map_err(|_| Error::InvalidArgs(format!("bad fps {v:?}")))?;
                    }
                    ("powerup", None) => power_up_down = true,
                    ("fixsettings", None) => fix_settings = true,
                    _ => {
                        return Err(Error::InvalidArgs(format!("unknown control parameter {token:?}")));
                    }
                }
            }

            if duration <= 0 || fps <= 0 {
                return Err(Error::InvalidArgs("duration and fps must be positive".into()));
            }

            Ok(Box::new(RandomControl::new(fix_settings, fps as f64, duration as f64, power_up_down)))
        }
        other => Err(Error::InvalidArgs(format!("unknown control type {other:?}"))),
    }
}

/// The knob positions a controller carries between frames.
#[derive(Clone, Copy)]
struct Knobs {
    tint: f64,
    color: f64,
    brightness: f64,
    contrast: f64,
    height: f64,
    width: f64,
    squish: f64,
    powerup: f64,
    horiz_desync: f64,
    squeeze_bottom: f64,
    use_hashnoise: bool,
    enable_hashnoise: bool,
    flutter_horiz_desync: bool,
}

impl Default for Knobs {
    fn default() -> Self {
        Self {
            tint: 5.0,
            color: 70.0 / 100.0,
            brightness: 2.0 / 100.0,
            contrast: 150.0 / 100.0,
            height: 1.0,
            width: 1.0,
            squish: 0.0,
            powerup: 1000.0,
            horiz_desync: 0.0,
            squeeze_bottom: 0.0,
            use_hashnoise: false,
            enable_hashnoise: true,
            flutter_horiz_desync: false,
        }
    }
}

impl Knobs {
    fn apply(&self, tv: &mut TvEngine) {
        tv.tint_control = self.tint as f32;
        tv.color_control = self.color as f32;
        tv.brightness_control = self.brightness as f32;
        tv.contrast_control = self.contrast as f32;
        tv.height_control = self.height as f32;
        tv.width_control = self.width as f32;
        tv.squish_control = self.squish as f32;

        tv.powerup = self.powerup as f32;

        tv.hashnoise_on = self.use_hashnoise;
        tv.hashnoise_enable = self.enable_hashnoise;

        tv.horiz_desync = self.horiz_desync as f32;
        tv.squeezebottom = self.squeeze_bottom as f32;

        tv.flutter_horiz_desync = self.flutter_horiz_desync;
    }
}

/// Channel-surfing couch potato: hops channels at random intervals,
/// nudges the knobs now and then, and optionally runs the power-up ramp
/// and the final fade-out.
pub struct RandomControl {
    rng: SmallRng,

    fix_settings: bool,
    duration: f64,
    fps: f64,
    power_up_down: bool,

    channels: Vec<ChannelSetting>,

    frame_counter: i64,
    channel: usize,
    last_frame: i64,
    channel_last_frame: i64,
    fade_out_first_frame: i64,
    power_up_last_frame: i64,

    last_brightness: f64,
    knobs: Knobs,
}

impl RandomControl {
    pub fn new(fix_settings: bool, fps: f64, duration: f64, power_up_down: bool) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(0),
            fix_settings,
            duration,
            fps,
            power_up_down,
            channels: Vec::new(),
            frame_counter: 0,
            channel: 0,
            last_frame: 0,
            channel_last_frame: 0,
            fade_out_first_frame: 0,
            power_up_last_frame: 0,
            last_brightness: f64::MIN,
            knobs: Knobs::default(),
        }
    }

    fn rotate_knobs_start(&mut self) {
        self.knobs = Knobs::default();
        self.knobs.horiz_desync = self.rng.random_range(-5.0..5.0);
        self.knobs.squeeze_bottom = self.rng.random_range(-1.0..4.0);

        if !self.fix_settings {
            if self.rng.random_range(0..4u32) == 0 {
                self.knobs.tint += self.rng.random_range(-1.0..1.0f64).powi(7) * 180.0;
            }
            let sign = if self.rng.random::<u32>() & 1 != 0 { 1.0 } else { -1.0 };
            self.knobs.color += self.rng.random_range(0.0..0.3) * sign;
        }
    }

    /// Turn the knobs every now and then on a channel change.
    fn rotate_knobs_switch(&mut self) {
        if self.fix_settings || self.rng.random_range(0..5u32) != 0 {
            return;
        }
        if self.rng.random_range(0..4u32) == 0 {
            let sign = if self.rng.random::<u32>() & 1 != 0 { 1.0 } else { -1.0 };
            self.knobs.tint += self.rng.random_range(-1.0..1.0f64).powi(7) * 180.0 * sign;
        }
        let sign = if self.rng.random::<u32>() & 1 != 0 { 1.0 } else { -1.0 };
        self.knobs.color += self.rng.random_range(0.0..0.3) * sign;
    }
}

impl Control for RandomControl {
    fn set_seed(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
    }

    fn create_channels(&mut self, n_sources: usize) {
        let n_channels = (n_sources * 2).max(6);

        self.channels.clear();
        for _ in 0..n_channels {
            let mut channel = ChannelSetting {
                receptions: Vec::new(),
                /* noise: 0 to 0.2 or 0 to 5.0 */
                noise_level: 0.06,
            };

            let mut last_station = usize::MAX;
            for stati in 0..MAX_MULTICHAN {
                let station = loop {
                    let station = self.rng.random_range(0..n_sources as u32) as usize;
                    /* don't do ghost reception with the same station...
                       at least too often */
                    if station != last_station || self.rng.random_range(0..10u32) == 0 {
                        break station;
                    }
                };
                last_station = station;

                let mut rec = Reception::new(station);
                if self.fix_settings {
                    rec.level = 0.3;
                } else {
                    rec.level = self.rng.random_range(0.0..1.0f64).powi(3) * 2.0 + 0.05;
                    rec.ofs = (self.rng.random::<u32>() as usize % SIGNAL_LEN) as f64;
                    if self.rng.random_range(0..3u32) != 0 {
                        rec.multipath = self.rng.random_range(0.0..1.0);
                    }
                    if stati > 0 {
                        /* Only ghosting stations get a frequency error;
                           it doesn't matter otherwise. */
                        rec.freqerr = self.rng.random_range(-1.0..1.0) * 3.0;
                    }
                }

                let level = rec.level;
                channel.receptions.push(rec);

                if level > 0.3 {
                    break;
                }
                if self.rng.random_range(0..4u32) != 0 {
                    break;
                }
            }

            self.channels.push(channel);
        }
    }

    fn channels(&self) -> &[ChannelSetting] {
        &self.channels
    }

    fn channels_mut(&mut self) -> &mut [ChannelSetting] {
        &mut self.channels
    }

    fn start(&mut self) {
        self.rotate_knobs_start();

        self.channel = self.rng.random_range(0..self.channels.len() as u32) as usize;
        self.last_brightness = f64::MIN;

        self.frame_counter = 0;
        self.last_frame = (self.fps * self.duration) as i64;
        self.power_up_last_frame = (POWERUP_DURATION * self.fps) as i64;
        self.fade_out_first_frame = ((self.duration - POWERDOWN_DURATION) * self.fps) as i64;
        self.channel_last_frame = 0;
    }

    fn next(&mut self, tv: &mut TvEngine) -> Operation {
        let mut op = Operation { op: Op::None, channel: self.channel };

        let cur_time = self.frame_counter as f64 / self.fps;

        /* power up -> switch channels -> power down */
        let mut can_switch = true;
        if self.power_up_down {
            if self.frame_counter < self.power_up_last_frame {
                self.knobs.powerup = cur_time;
                can_switch = false;
            } else if self.frame_counter >= self.fade_out_first_frame {
                /* Usable brightness range is something like -0.75 to 1.0 */
                const MIN_BRIGHTNESS: f64 = -1.5;

                if self.last_brightness <= -10.0 {
                    self.last_brightness = self.knobs.brightness;
                }

                /* Fade out, as there is no power-down animation. */
                let rate = (self.duration - cur_time) / POWERDOWN_DURATION;
                self.knobs.brightness = MIN_BRIGHTNESS * (1.0 - rate) + self.last_brightness * rate;

                can_switch = false;
            }
        }

        if can_switch && self.frame_counter >= self.channel_last_frame {
            /* 1 - 7 sec */
            self.channel_last_frame = self.frame_counter + (self.fps * (1.0 + self.rng.random_range(0.0..6.0))) as i64;

            self.channel = self.rng.random_range(0..self.channels.len() as u32) as usize;
            log::info!("{cur_time} sec: channel {}", self.channel);

            self.rotate_knobs_switch();

            op.op = Op::Switch;
        }

        if self.frame_counter >= self.last_frame {
            op.op = Op::Quit;
        }

        self.frame_counter += 1;

        op.channel = self.channel;
        self.knobs.apply(tv);
        op
    }

    fn total_frames(&self) -> Option<u64> {
        Some((self.fps * self.duration) as u64)
    }
}

#[derive(Clone, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
enum ScriptAction {
    Switch {
        channel: usize,
    },
    Knobs {
        tint: Option<f64>,
        color: Option<f64>,
        brightness: Option<f64>,
        contrast: Option<f64>,
        height: Option<f64>,
        width: Option<f64>,
        squish: Option<f64>,
    },
    Quit,
}

#[derive(Deserialize)]
struct ScriptEvent {
    frame: i64,
    #[serde(flatten)]
    action: ScriptAction,
}

/// Plays back a JSON schedule of `{frame, action, ...}` events instead
/// of rolling dice. Channels use fixed reception settings so the
/// schedule is the only source of variation.
pub struct ScriptedControl {
    events: Vec<ScriptEvent>,
    next_event: usize,
    channels: Vec<ChannelSetting>,
    frame_counter: i64,
    channel: usize,
    knobs: Knobs,
}

impl ScriptedControl {
    pub fn from_file(path: &str) -> Result<Self, Error> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::InvalidArgs(format!("cannot read scenario {path}: {e}")))?;
        let mut events: Vec<ScriptEvent> = serde_json::from_str(&text)
            .map_err(|e| Error::InvalidArgs(format!("bad scenario {path}: {e}")))?;
        events.sort_by_key(|e| e.frame);

        Ok(Self {
            events,
            next_event: 0,
            channels: Vec::new(),
            frame_counter: 0,
            channel: 0,
            knobs: Knobs::default(),
        })
    }
}

impl Control for ScriptedControl {
    fn set_seed(&mut self, _seed: u64) {}

    fn create_channels(&mut self, n_sources: usize) {
        let n_channels = (n_sources * 2).max(6);
        self.channels = (0..n_channels)
            .map(|i| {
                let mut rec = Reception::new(i % n_sources);
                rec.level = 0.3;
                ChannelSetting { receptions: vec![rec], noise_level: 0.06 }
            })
            .collect();
    }

    fn channels(&self) -> &[ChannelSetting] {
        &self.channels
    }

    fn channels_mut(&mut self) -> &mut [ChannelSetting] {
        &mut self.channels
    }

    fn start(&mut self) {
        self.frame_counter = 0;
        self.next_event = 0;
        self.channel = 0;
        self.knobs = Knobs::default();
    }

    fn next(&mut self, tv: &mut TvEngine) -> Operation {
        let mut op = Operation { op: Op::None, channel: self.channel };

        while self.next_event < self.events.len() && self.events[self.next_event].frame <= self.frame_counter {
            let action = self.events[self.next_event].action.clone();
            self.next_event += 1;

            match action {
                ScriptAction::Switch { channel } => {
                    self.channel = channel % self.channels.len().max(1);
                    op.op = Op::Switch;
                }
                ScriptAction::Knobs { tint, color, brightness, contrast, height, width, squish } => {
                    if let Some(v) = tint {
                        self.knobs.tint = v;
                    }
                    if let Some(v) = color {
                        self.knobs.color = v;
                    }
                    if let Some(v) = brightness {
                        self.knobs.brightness = v;
                    }
                    if let Some(v) = contrast {
                        self.knobs.contrast = v;
                    }
                    if let Some(v) = height {
                        self.knobs.height = v;
                    }
                    if let Some(v) = width {
                        self.knobs.width = v;
                    }
                    if let Some(v) = squish {
                        self.knobs.squish = v;
                    }
                    if op.op == Op::None {
                        op.op = Op::Knobs;
                    }
                }
                ScriptAction::Quit => op.op = Op::Quit,
            }
        }

        self.frame_counter += 1;
        op.channel = self.channel;
        self.knobs.apply(tv);
        op
    }

    fn total_frames(&self) -> Option<u64> {
        self.events
            .iter()
            .find(|e| matches!(e.action, ScriptAction::Quit))
            .map(|e| e.frame.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> TvEngine {
        TvEngine::new(320, 240, 0)
    }

    #[test]
    fn parses_random_control_tokens() {
        assert!(create(":random").is_ok());
        assert!(create(":random:duration=2:fixsettings").is_ok());
        assert!(create(":random:duration=10:powerup:fps=60").is_ok());
        assert!(create(":random:duration=x").is_err());
        assert!(create(":random:frobnicate=1").is_err());
        assert!(create(":bogus").is_err());
        assert!(create(":").is_err());
    }

    #[test]
    fn channel_table_has_minimum_size() {
        let mut c = RandomControl::new(true, 30.0, 2.0, false);
        c.set_seed(1);
        c.create_channels(1);
        assert_eq!(c.channels().len(), 6);
        c.create_channels(4);
        assert_eq!(c.channels().len(), 8);
        for ch in c.channels() {
            assert!(!ch.receptions.is_empty());
            assert!(ch.receptions.len() <= MAX_MULTICHAN);
            assert_eq!(ch.noise_level, 0.06);
        }
    }

    #[test]
    fn fixed_settings_produce_fixed_receptions() {
        let mut c = RandomControl::new(true, 30.0, 2.0, false);
        c.set_seed(3);
        c.create_channels(3);
        for ch in c.channels() {
            for rec in &ch.receptions {
                assert_eq!(rec.level, 0.3);
                assert_eq!(rec.ofs, 0.0);
                assert_eq!(rec.multipath, 0.0);
                assert_eq!(rec.freqerr, 0.0);
            }
        }
    }

    #[test]
    fn run_quits_after_duration() {
        let mut c = RandomControl::new(true, 30.0, 2.0, false);
        c.set_seed(1);
        c.create_channels(1);
        c.start();

        let mut tv = engine();
        let mut frames = 0;
        loop {
            let op = c.next(&mut tv);
            if op.op == Op::Quit {
                break;
            }
            frames += 1;
            assert!(frames <= 60, "never quit");
        }
        assert_eq!(frames, 60);
    }

    #[test]
    fn powerup_ramps_then_allows_switching() {
        let mut c = RandomControl::new(false, 30.0, 20.0, true);
        c.set_seed(5);
        c.create_channels(2);
        c.start();

        let mut tv = engine();
        for frame in 0..(POWERUP_DURATION * 30.0) as i64 {
            let op = c.next(&mut tv);
            assert_ne!(op.op, Op::Switch, "switched during powerup at {frame}");
            let expect = frame as f32 / 30.0;
            assert!((tv.powerup - expect).abs() < 1e-4);
        }
        // A switch fires as soon as the ramp ends.
        let op = c.next(&mut tv);
        assert_eq!(op.op, Op::Switch);
    }

    #[test]
    fn fade_out_drives_brightness_down() {
        let fps = 30.0;
        let mut c = RandomControl::new(true, fps, 10.0, true);
        c.set_seed(2);
        c.create_channels(1);
        c.start();

        let mut tv = engine();
        let mut last = f32::MAX;
        let mut fading = false;
        for frame in 0..(10.0 * fps) as i64 {
            c.next(&mut tv);
            if frame >= (9.0 * fps) as i64 {
                fading = true;
                assert!(tv.brightness_control <= last + 1e-6, "brightness rose at {frame}");
                last = tv.brightness_control;
            }
        }
        assert!(fading);
        // Near the end the tube is well below black.
        assert!(tv.brightness_control < -1.0, "got {}", tv.brightness_control);
    }

    #[test]
    fn scripted_control_plays_schedule() {
        let dir = std::env::temp_dir().join("analogtv-script-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("scenario.json");
        std::fs::write(
            &path,
            r#"[
                {"frame": 0, "action": "switch", "channel": 2},
                {"frame": 2, "action": "knobs", "color": 0.0},
                {"frame": 4, "action": "quit"}
            ]"#,
        )
        .unwrap();

        let mut c = ScriptedControl::from_file(path.to_str().unwrap()).unwrap();
        c.create_channels(2);
        c.start();

        let mut tv = engine();
        assert_eq!(c.next(&mut tv).op, Op::Switch);
        assert_eq!(c.next(&mut tv).op, Op::None);
        assert_eq!(c.next(&mut tv).op, Op::Knobs);
        assert_eq!(tv.color_control, 0.0);
        assert_eq!(c.next(&mut tv).op, Op::None);
        assert_eq!(c.next(&mut tv).op, Op::Quit);
        assert_eq!(c.total_frames(), Some(4));
    }
}
