//! Pitch-driven resampling increments.
//!
//! Voices step through source frames with a 16.16 fixed-point cursor;
//! pitch acts as a rate multiplier on the cursor advance, combined with
//! the source-to-output frequency ratio.

/// Fractional bits of the playback cursor.
pub const FP_SHIFT: u32 = 16;

/// One source frame in cursor units.
pub const FP_ONE: u64 = 1 << FP_SHIFT;

/// Smallest effective pitch multiplier; setters clamp to this so the
/// cursor always moves forward.
pub const MIN_PITCH: f32 = 1.0e-4;

/// Compute the cursor increment for one output frame.
///
/// `increment = pitch * source_hz / output_hz` in 16.16 fixed point.
/// A zero frequency on either side yields 0 (the cursor holds still).
pub fn increment_for(pitch: f32, source_hz: u32, output_hz: u32) -> u64 {
    if source_hz == 0 || output_hz == 0 {
        return 0;
    }
    let ratio = pitch.max(MIN_PITCH) as f64 * source_hz as f64 / output_hz as f64;
    (ratio * FP_ONE as f64) as u64
}
