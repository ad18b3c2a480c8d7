//! Simulation of a late-70s analog NTSC television set.
//!
//! Pictures go in as synthesized baseband composite signals, complete
//! with sync pulses and colorburst; a software receiver mixes them with
//! noise and ghosting, recovers sync, demodulates YIQ and scans the
//! result onto a CRT raster with all the period artifacts: color
//! bleed, bloom, right-edge squish, scan-line banding, warm-up and
//! fade-out.
//!
//! Based on the analogtv hack written by Trevor Blackwell for
//! XScreenSaver.

pub mod control;
pub mod encoder;
pub mod engine;
pub mod font;
pub mod geometry;
pub mod input;
pub mod raster;
pub mod reception;
pub mod rng;
pub mod runner;
pub mod sink;
pub mod source;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error("cannot open source {0}: {1}")]
    SourceOpen(String, String),
    #[error("cannot open output {0}: {1}")]
    SinkOpen(String, String),
}

pub use engine::TvEngine;
pub use input::InputSignal;
pub use raster::Raster;
pub use reception::Reception;
