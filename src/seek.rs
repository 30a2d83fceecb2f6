//! Seek planning.
//!
//! Before decoding, an extraction jumps close to the requested position.
//! [`plan_seek`] decides where and how; [`apply_seek`] performs the jump and
//! always flushes the decoder afterwards so no reference frame from before
//! the jump leaks into the output.

use ffmpeg_next::decoder::Video as VideoDecoder;

use crate::demux::{DemuxContext, StreamDescriptor};
use crate::error::ThumbnailError;
use crate::quality::SeekPolicy;
use crate::utilities::{is_valid_time_base, seconds_to_seek_timestamp, seconds_to_stream_timestamp};

/// How the demuxer is asked to land near the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeekStrategy {
    /// Land on the nearest frame, keyframe or not. Fastest; decoding may
    /// start from a frame that references missing data.
    Any,
    /// Land on the keyframe at or before the target. Most accurate.
    Backward,
}

impl SeekStrategy {
    fn flags(self) -> i32 {
        match self {
            SeekStrategy::Any => ffmpeg_sys_next::AVSEEK_FLAG_ANY as i32,
            SeekStrategy::Backward => ffmpeg_sys_next::AVSEEK_FLAG_BACKWARD as i32,
        }
    }
}

/// The outcome of seek planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekPlan {
    /// Decode from the start of the file.
    None,
    /// Seek before decoding.
    Seek {
        /// Stream the timestamp refers to; `None` means container-level
        /// `AV_TIME_BASE` units.
        stream_index: Option<usize>,
        /// Target timestamp.
        timestamp: i64,
        /// Seek strategy.
        strategy: SeekStrategy,
    },
}

impl SeekPlan {
    /// The chosen strategy, if a seek is planned.
    pub fn strategy(&self) -> Option<SeekStrategy> {
        match self {
            SeekPlan::None => None,
            SeekPlan::Seek { strategy, .. } => Some(*strategy),
        }
    }
}

/// Decide how to reach `position` seconds in `stream`.
///
/// Non-positive positions decode from the start. Otherwise the position is
/// expressed in the stream's time base (or in `AV_TIME_BASE` when the
/// stream's time base is unusable) and the strategy comes from `policy`.
/// Positions too large to express as a timestamp are not seeked to.
pub fn plan_seek(position: f64, policy: SeekPolicy, stream: &StreamDescriptor) -> SeekPlan {
    if position <= 0.0 {
        return SeekPlan::None;
    }

    let strategy = policy.strategy_for(position);
    let target = if is_valid_time_base(stream.time_base) {
        seconds_to_stream_timestamp(position, stream.time_base).map(|ts| (Some(stream.index), ts))
    } else {
        seconds_to_seek_timestamp(position).map(|ts| (None, ts))
    };

    match target {
        Some((stream_index, timestamp)) => SeekPlan::Seek {
            stream_index,
            timestamp,
            strategy,
        },
        None => {
            log::warn!("Position {position:.3}s is out of timestamp range, decoding from start");
            SeekPlan::None
        }
    }
}

/// Execute `plan`, then flush `decoder`.
///
/// If the demuxer rejects the seek, the input is rewound to its start so
/// decoding falls back to a sequential scan from the first frame. The flush
/// happens whether or not the seek succeeded.
///
/// # Errors
///
/// Returns [`ThumbnailError::SeekFailure`] if the demuxer rejected the seek.
/// The caller may keep decoding; the read position is then the start.
pub(crate) fn apply_seek(
    plan: &SeekPlan,
    position: f64,
    demux: &mut DemuxContext,
    decoder: &mut VideoDecoder,
) -> Result<(), ThumbnailError> {
    let SeekPlan::Seek {
        stream_index,
        timestamp,
        strategy,
    } = *plan
    else {
        return Ok(());
    };

    let stream_index = stream_index.map_or(-1, |index| index as i32);
    log::debug!(
        "Seeking stream {stream_index} to {timestamp} ({strategy:?}) for {position:.3}s"
    );

    let result = unsafe {
        ffmpeg_sys_next::av_seek_frame(
            demux.input_mut().as_mut_ptr(),
            stream_index,
            timestamp,
            strategy.flags(),
        )
    };

    if result < 0 {
        rewind(demux);
    }
    decoder.flush();

    if result < 0 {
        return Err(ThumbnailError::SeekFailure {
            position,
            reason: ffmpeg_next::Error::from(result).to_string(),
        });
    }
    Ok(())
}

/// Move the read position back to the start of the input.
///
/// A failed seek may already have read ahead while searching for its
/// target.
fn rewind(demux: &mut DemuxContext) {
    let result = unsafe {
        ffmpeg_sys_next::av_seek_frame(
            demux.input_mut().as_mut_ptr(),
            -1,
            0,
            ffmpeg_sys_next::AVSEEK_FLAG_BACKWARD as i32,
        )
    };
    if result < 0 {
        log::warn!(
            "Rewind after failed seek also failed: {}",
            ffmpeg_next::Error::from(result)
        );
    }
}
