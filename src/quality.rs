//! Quality tiers and the parameter bundle each tier carries.
//!
//! Every tier-dependent knob in the pipeline (probe budget, seek strategy,
//! frame-acceptance tolerances, frame budget, resampling algorithm and
//! decoder shortcuts) lives in one [`QualityProfile`]. Components never
//! branch on the tier themselves; they read the profile. Adding a tier means
//! adding a profile constant.
//!
//! # Example
//!
//! ```
//! use thumbgrab::{Quality, SeekStrategy};
//!
//! let quality = Quality::from_raw(7); // out of range, coerced
//! assert_eq!(quality, Quality::Normal);
//!
//! let profile = quality.profile();
//! assert_eq!(profile.seek_policy.strategy_for(2.0), SeekStrategy::Any);
//! assert_eq!(profile.seek_policy.strategy_for(12.0), SeekStrategy::Backward);
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::Duration;

use ffmpeg_next::codec::discard::Discard;
use ffmpeg_next::software::scaling::Flags as ScalingFlags;

use crate::seek::SeekStrategy;

/// Extraction quality tier.
///
/// The raw integer encoding (`0`, `1`, `2`) is what host bindings usually
/// pass; use [`Quality::from_raw`] to convert it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Quality {
    /// Fastest: small probe budget, loose tolerances, decoder shortcuts,
    /// nearest-neighbour scaling.
    Fast,
    /// Balanced. This is the default.
    #[default]
    Normal,
    /// Highest fidelity: keyframe-accurate seeks, tight tolerances, full
    /// decoding and bicubic scaling.
    Hq,
}

impl Quality {
    /// All tiers, fastest first.
    pub const ALL: [Quality; 3] = [Quality::Fast, Quality::Normal, Quality::Hq];

    /// Convert a raw tier value.
    ///
    /// `0` is [`Fast`](Quality::Fast), `1` is [`Normal`](Quality::Normal),
    /// `2` is [`Hq`](Quality::Hq). Anything else is coerced to `Normal` and
    /// a warning is logged; it is never rejected.
    pub fn from_raw(value: i32) -> Self {
        match value {
            0 => Quality::Fast,
            1 => Quality::Normal,
            2 => Quality::Hq,
            other => {
                log::warn!("Unknown quality tier {other}, using NORMAL");
                Quality::Normal
            }
        }
    }

    /// The raw integer encoding of this tier.
    pub fn as_raw(self) -> i32 {
        match self {
            Quality::Fast => 0,
            Quality::Normal => 1,
            Quality::Hq => 2,
        }
    }

    /// The parameter bundle for this tier.
    pub fn profile(self) -> &'static QualityProfile {
        match self {
            Quality::Fast => &FAST_PROFILE,
            Quality::Normal => &NORMAL_PROFILE,
            Quality::Hq => &HQ_PROFILE,
        }
    }
}

impl Display for Quality {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Quality::Fast => "FAST",
            Quality::Normal => "NORMAL",
            Quality::Hq => "HQ",
        };
        f.write_str(name)
    }
}

/// Limits applied while probing the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeLimits {
    /// Maximum stream analysis duration.
    pub max_analyze_duration: Duration,
    /// Maximum number of bytes read while probing.
    pub probe_size: u64,
    /// Number of frames used to estimate the frame rate.
    pub fps_probe_frames: u32,
}

/// How the seek strategy is chosen for a position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekPolicy {
    /// Always land on whatever frame is nearest, keyframe or not.
    AlwaysAny,
    /// Always seek back to the preceding keyframe.
    AlwaysBackward,
    /// [`Any`](SeekStrategy::Any) for positions below the threshold (in
    /// seconds), [`Backward`](SeekStrategy::Backward) from it onwards.
    AnyBelow(f64),
}

impl SeekPolicy {
    /// Pick the strategy for a positive `position` in seconds.
    pub fn strategy_for(self, position: f64) -> SeekStrategy {
        match self {
            SeekPolicy::AlwaysAny => SeekStrategy::Any,
            SeekPolicy::AlwaysBackward => SeekStrategy::Backward,
            SeekPolicy::AnyBelow(threshold) if position < threshold => SeekStrategy::Any,
            SeekPolicy::AnyBelow(_) => SeekStrategy::Backward,
        }
    }
}

/// Frame-acceptance windows, in seconds before the requested position.
///
/// Frames earlier than `position - skip` are discarded without conversion;
/// frames at or after `position - accept` are taken. These are tuning
/// values, not guarantees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTolerances {
    /// Frames earlier than this window are skipped outright.
    pub skip: f64,
    /// Frames inside this window are accepted.
    pub accept: f64,
}

/// Resampling algorithm used by the converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleAlgorithm {
    /// Nearest neighbour.
    Point,
    /// Fast bilinear.
    FastBilinear,
    /// Bicubic.
    Bicubic,
}

impl ScaleAlgorithm {
    pub(crate) fn to_flags(self) -> ScalingFlags {
        match self {
            ScaleAlgorithm::Point => ScalingFlags::POINT,
            ScaleAlgorithm::FastBilinear => ScalingFlags::FAST_BILINEAR,
            ScaleAlgorithm::Bicubic => ScalingFlags::BICUBIC,
        }
    }
}

/// Decoder threading and shortcut settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderProfile {
    /// Decoder thread count; `0` lets FFmpeg pick one per core.
    pub thread_count: usize,
    /// Enable frame-level threading. libavcodec ignores it when
    /// `low_delay` is set.
    pub frame_threads: bool,
    /// Enable slice-level threading.
    pub slice_threads: bool,
    /// Request low-delay output (`AV_CODEC_FLAG_LOW_DELAY`).
    pub low_delay: bool,
    /// Allow non-conforming speedups (`AV_CODEC_FLAG2_FAST`).
    pub fast: bool,
    /// Frames on which the in-loop deblocking filter is skipped.
    pub skip_loop_filter: Discard,
    /// Frames on which part of the inverse transform is skipped.
    pub skip_idct: Discard,
    /// Frames that are not decoded at all.
    pub skip_frame: Discard,
}

/// Everything one quality tier decides.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityProfile {
    /// Container probe budget.
    pub probe: ProbeLimits,
    /// Seek strategy selection.
    pub seek_policy: SeekPolicy,
    /// Frame-acceptance windows.
    pub tolerances: FrameTolerances,
    /// Maximum number of frames decoded per extraction.
    pub frame_budget: u32,
    /// Resampling used when scaling to the output size.
    pub scale: ScaleAlgorithm,
    /// Decoder threading and shortcuts.
    pub decoder: DecoderProfile,
}

const FPS_PROBE_FRAMES: u32 = 3;

/// Below this position NORMAL seeks to any frame; a backward keyframe seek
/// near the start gains little.
pub const NORMAL_BACKWARD_SEEK_THRESHOLD: f64 = 5.0;

const FAST_PROFILE: QualityProfile = QualityProfile {
    probe: ProbeLimits {
        max_analyze_duration: Duration::from_millis(500),
        probe_size: 2_000_000,
        fps_probe_frames: FPS_PROBE_FRAMES,
    },
    seek_policy: SeekPolicy::AlwaysAny,
    tolerances: FrameTolerances {
        skip: 3.0,
        accept: 2.0,
    },
    frame_budget: 100,
    scale: ScaleAlgorithm::Point,
    decoder: DecoderProfile {
        thread_count: 0,
        frame_threads: false,
        slice_threads: true,
        low_delay: true,
        fast: true,
        skip_loop_filter: Discard::All,
        skip_idct: Discard::Bidirectional,
        skip_frame: Discard::NonReference,
    },
};

const NORMAL_PROFILE: QualityProfile = QualityProfile {
    probe: ProbeLimits {
        max_analyze_duration: Duration::from_secs(1),
        probe_size: 5_000_000,
        fps_probe_frames: FPS_PROBE_FRAMES,
    },
    seek_policy: SeekPolicy::AnyBelow(NORMAL_BACKWARD_SEEK_THRESHOLD),
    tolerances: FrameTolerances {
        skip: 1.5,
        accept: 1.0,
    },
    frame_budget: 200,
    scale: ScaleAlgorithm::FastBilinear,
    decoder: DecoderProfile {
        thread_count: 2,
        frame_threads: false,
        slice_threads: true,
        low_delay: true,
        fast: true,
        skip_loop_filter: Discard::Bidirectional,
        skip_idct: Discard::Default,
        skip_frame: Discard::Default,
    },
};

const HQ_PROFILE: QualityProfile = QualityProfile {
    probe: ProbeLimits {
        max_analyze_duration: Duration::from_secs(5),
        probe_size: 10_000_000,
        fps_probe_frames: FPS_PROBE_FRAMES,
    },
    seek_policy: SeekPolicy::AlwaysBackward,
    tolerances: FrameTolerances {
        skip: 0.5,
        accept: 0.5,
    },
    frame_budget: 300,
    scale: ScaleAlgorithm::Bicubic,
    decoder: DecoderProfile {
        thread_count: 0,
        frame_threads: true,
        slice_threads: true,
        low_delay: false,
        fast: false,
        skip_loop_filter: Discard::Default,
        skip_idct: Discard::Default,
        skip_frame: Discard::Default,
    },
};
