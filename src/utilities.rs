//! Internal timestamp helpers.

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// Microseconds per second (`AV_TIME_BASE`).
pub(crate) const MICROSECONDS_PER_SECOND: f64 = 1_000_000.0;

/// Returns `true` if the time base can convert timestamps to seconds.
pub(crate) fn is_valid_time_base(time_base: Rational) -> bool {
    time_base.numerator() > 0 && time_base.denominator() > 0
}

/// Convert seconds to a timestamp in `time_base` units.
///
/// Returns `None` when the result does not fit in an `i64`.
pub(crate) fn seconds_to_stream_timestamp(seconds: f64, time_base: Rational) -> Option<i64> {
    let numerator = time_base.numerator() as f64;
    let denominator = time_base.denominator() as f64;
    let timestamp = seconds * denominator / numerator;
    (timestamp.is_finite() && timestamp < i64::MAX as f64).then_some(timestamp as i64)
}

/// Convert seconds to `AV_TIME_BASE` units.
pub(crate) fn seconds_to_seek_timestamp(seconds: f64) -> Option<i64> {
    let timestamp = seconds * MICROSECONDS_PER_SECOND;
    (timestamp.is_finite() && timestamp < i64::MAX as f64).then_some(timestamp as i64)
}

/// Rescale a PTS value from stream time base to seconds.
pub(crate) fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Presentation time of a decoded frame in seconds.
///
/// Uses the PTS, falling back to the decoder's best-effort timestamp, and
/// to `0.0` when neither is known.
pub(crate) fn frame_time_seconds(frame: &VideoFrame, time_base: Rational) -> f64 {
    if !is_valid_time_base(time_base) {
        return 0.0;
    }
    frame
        .pts()
        .or_else(|| frame.timestamp())
        .map_or(0.0, |pts| pts_to_seconds(pts, time_base))
}
