//! NTSC raster geometry and IRE signal levels.
//!
//! The sampling rate is 4x the colorburst frequency, so one 63,500 ns
//! scan line comes out to 912 samples. Everything scales by `SCALE` to
//! simulate a CRT with more scan lines than a real NTSC set had.

/// Resolution multiplier. 1 is a period-correct set.
pub const SCALE: usize = 1;

/// Total lines per frame. No interlacing here.
pub const V: usize = 262 * SCALE;
/// First visible line.
pub const TOP: usize = 30 * SCALE;
/// Number of visible lines.
pub const VISLINES: usize = 200 * SCALE;
/// One past the last visible line.
pub const BOT: usize = TOP + VISLINES;

/// Samples per line, 4x colorburst.
pub const H: usize = 912 * SCALE;

/// Positions within a 63,500 ns line, in samples.
const fn ns_to_samples(ns: usize) -> usize {
    ns * H / 63_500
}

pub const SYNC_START: usize = 0;
pub const BP_START: usize = ns_to_samples(4_700);
pub const CB_START: usize = ns_to_samples(5_800);
/// `signal[line][PIC_START]` is the first displayed sample.
pub const PIC_START: usize = ns_to_samples(9_400);
pub const PIC_LEN: usize = ns_to_samples(52_600);
pub const FP_START: usize = ns_to_samples(62_000);
pub const PIC_END: usize = FP_START;

/// TVs scan past the edges of the picture tube, so only the middle 3/4
/// of the nominal scan line is really usable.
pub const VIS_START: usize = PIC_START + PIC_LEN / 8;
pub const VIS_END: usize = PIC_START + PIC_LEN * 7 / 8;
pub const VIS_LEN: usize = VIS_END - VIS_START;

pub const GHOSTFIR_LEN: usize = 4;

/// Signal levels in IRE units.
pub const WHITE_LEVEL: i32 = 100;
pub const GRAY50_LEVEL: i32 = 55;
pub const GRAY30_LEVEL: i32 = 35;
pub const BLACK_LEVEL: i32 = 10;
pub const BLANK_LEVEL: i32 = 0;
pub const SYNC_LEVEL: i32 = -40;
pub const CB_LEVEL: i32 = 20;

pub const SIGNAL_LEN: usize = V * H;

/// Number of intensity levels for gamma correction.
pub const CV_MAX: usize = 1024;

/// Corresponds to 2400 vertical pixels; beyond that extra black lines
/// are interpolated.
pub const MAX_LINEHEIGHT: usize = 12;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_positions_are_ordered() {
        assert!(SYNC_START < BP_START);
        assert!(BP_START < CB_START);
        assert!(CB_START < PIC_START);
        assert!(PIC_START < FP_START);
        assert!(FP_START < H);
        assert_eq!(PIC_END, FP_START);
        assert!(VIS_START > PIC_START && VIS_END < PIC_START + PIC_LEN);
    }

    #[test]
    fn signal_len_is_four_aligned() {
        // The ghost FIR and the mixer work in 4-sample groups.
        assert_eq!(SIGNAL_LEN % 4, 0);
        assert_eq!(H % 4, 0);
    }
}
