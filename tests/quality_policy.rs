//! Quality tiers, seek planning and frame-acceptance policy.
//!
//! Pure policy tests; no fixture media needed.

use ffmpeg_next::{Rational, codec::Id};
use thumbgrab::{
    CodecKey, FrameTolerances, FrameVerdict, NORMAL_BACKWARD_SEEK_THRESHOLD, Quality,
    ScaleAlgorithm, SeekPlan, SeekPolicy, SeekStrategy, StreamDescriptor, classify_frame,
    plan_seek,
};

fn h264_stream(time_base: Rational) -> StreamDescriptor {
    StreamDescriptor {
        index: 0,
        time_base,
        codec: CodecKey::from(Id::H264),
        width: 1280,
        height: 720,
    }
}

// ── Quality coercion ─────────────────────────────────────────────

#[test]
fn raw_tiers_map_to_variants() {
    assert_eq!(Quality::from_raw(0), Quality::Fast);
    assert_eq!(Quality::from_raw(1), Quality::Normal);
    assert_eq!(Quality::from_raw(2), Quality::Hq);
}

#[test]
fn unknown_raw_tiers_become_normal() {
    for raw in [-1, 3, 42, i32::MIN, i32::MAX] {
        assert_eq!(Quality::from_raw(raw), Quality::Normal, "raw tier {raw}");
    }
}

#[test]
fn raw_encoding_round_trips() {
    for quality in Quality::ALL {
        assert_eq!(Quality::from_raw(quality.as_raw()), quality);
    }
    assert_eq!(Quality::default(), Quality::Normal);
    assert_eq!(Quality::Hq.to_string(), "HQ");
}

// ── Tier profiles ────────────────────────────────────────────────

#[test]
fn probe_budgets_per_tier() {
    let fast = Quality::Fast.profile().probe;
    assert_eq!(fast.max_analyze_duration.as_millis(), 500);
    assert_eq!(fast.probe_size, 2_000_000);

    let normal = Quality::Normal.profile().probe;
    assert_eq!(normal.max_analyze_duration.as_millis(), 1000);
    assert_eq!(normal.probe_size, 5_000_000);

    let hq = Quality::Hq.profile().probe;
    assert_eq!(hq.max_analyze_duration.as_millis(), 5000);
    assert_eq!(hq.probe_size, 10_000_000);

    for quality in Quality::ALL {
        assert_eq!(quality.profile().probe.fps_probe_frames, 3);
    }
}

#[test]
fn tolerances_tighten_with_quality() {
    let fast = Quality::Fast.profile().tolerances;
    let normal = Quality::Normal.profile().tolerances;
    let hq = Quality::Hq.profile().tolerances;

    assert_eq!((fast.skip, fast.accept), (3.0, 2.0));
    assert_eq!((normal.skip, normal.accept), (1.5, 1.0));
    assert_eq!((hq.skip, hq.accept), (0.5, 0.5));
}

#[test]
fn scaling_per_tier() {
    assert_eq!(Quality::Fast.profile().scale, ScaleAlgorithm::Point);
    assert_eq!(Quality::Normal.profile().scale, ScaleAlgorithm::FastBilinear);
    assert_eq!(Quality::Hq.profile().scale, ScaleAlgorithm::Bicubic);
}

#[test]
fn only_hq_decodes_without_shortcuts() {
    let hq = Quality::Hq.profile().decoder;
    assert!(!hq.low_delay);
    assert!(!hq.fast);

    for quality in [Quality::Fast, Quality::Normal] {
        let decoder = quality.profile().decoder;
        assert!(decoder.low_delay, "{quality} should request low delay");
        assert!(decoder.fast, "{quality} should allow fast decoding");
    }
}

#[test]
fn low_delay_tiers_use_slice_threads_only() {
    for quality in Quality::ALL {
        let decoder = quality.profile().decoder;
        assert!(
            !(decoder.frame_threads && decoder.low_delay),
            "{quality} combines frame threading with low delay"
        );
        assert!(decoder.slice_threads, "{quality} should use slice threads");
    }
    assert!(Quality::Hq.profile().decoder.frame_threads);
}

// ── Seek policy ──────────────────────────────────────────────────

#[test]
fn normal_switches_strategy_at_threshold() {
    let policy = Quality::Normal.profile().seek_policy;
    assert_eq!(policy, SeekPolicy::AnyBelow(NORMAL_BACKWARD_SEEK_THRESHOLD));
    assert_eq!(policy.strategy_for(0.5), SeekStrategy::Any);
    assert_eq!(policy.strategy_for(4.999), SeekStrategy::Any);
    assert_eq!(policy.strategy_for(5.0), SeekStrategy::Backward);
    assert_eq!(policy.strategy_for(120.0), SeekStrategy::Backward);
}

#[test]
fn fast_and_hq_use_fixed_strategies() {
    for position in [0.1, 4.0, 5.0, 600.0] {
        assert_eq!(
            Quality::Fast.profile().seek_policy.strategy_for(position),
            SeekStrategy::Any
        );
        assert_eq!(
            Quality::Hq.profile().seek_policy.strategy_for(position),
            SeekStrategy::Backward
        );
    }
}

// ── Seek planning ────────────────────────────────────────────────

#[test]
fn position_zero_is_not_seeked() {
    let stream = h264_stream(Rational(1, 15_360));
    for quality in Quality::ALL {
        assert_eq!(plan_seek(0.0, quality.profile().seek_policy, &stream), SeekPlan::None);
    }
}

#[test]
fn plan_uses_stream_time_base() {
    let stream = h264_stream(Rational(1, 15_360));
    let plan = plan_seek(2.0, Quality::Normal.profile().seek_policy, &stream);
    assert_eq!(
        plan,
        SeekPlan::Seek {
            stream_index: Some(0),
            timestamp: 30_720,
            strategy: SeekStrategy::Any,
        }
    );

    let plan = plan_seek(10.0, Quality::Normal.profile().seek_policy, &stream);
    assert_eq!(plan.strategy(), Some(SeekStrategy::Backward));
}

#[test]
fn invalid_time_base_falls_back_to_container_units() {
    let stream = h264_stream(Rational(0, 1));
    let plan = plan_seek(2.5, SeekPolicy::AlwaysBackward, &stream);
    assert_eq!(
        plan,
        SeekPlan::Seek {
            stream_index: None,
            timestamp: 2_500_000,
            strategy: SeekStrategy::Backward,
        }
    );
}

#[test]
fn unrepresentable_position_is_not_seeked() {
    let stream = h264_stream(Rational(1, 90_000));
    assert_eq!(plan_seek(1e300, SeekPolicy::AlwaysAny, &stream), SeekPlan::None);
}

// ── Frame acceptance ─────────────────────────────────────────────

#[test]
fn position_zero_accepts_first_frame() {
    for quality in Quality::ALL {
        let tolerances = quality.profile().tolerances;
        assert_eq!(classify_frame(0.0, 0.0, tolerances), FrameVerdict::Accept);
        assert_eq!(classify_frame(3.7, 0.0, tolerances), FrameVerdict::Accept);
    }
}

#[test]
fn frames_are_classified_against_windows() {
    let tolerances = FrameTolerances { skip: 1.5, accept: 1.0 };

    assert_eq!(classify_frame(0.0, 10.0, tolerances), FrameVerdict::Skip);
    assert_eq!(classify_frame(8.49, 10.0, tolerances), FrameVerdict::Skip);
    assert_eq!(classify_frame(8.5, 10.0, tolerances), FrameVerdict::Reject);
    assert_eq!(classify_frame(8.99, 10.0, tolerances), FrameVerdict::Reject);
    assert_eq!(classify_frame(9.0, 10.0, tolerances), FrameVerdict::Accept);
    assert_eq!(classify_frame(10.0, 10.0, tolerances), FrameVerdict::Accept);
    assert_eq!(classify_frame(14.0, 10.0, tolerances), FrameVerdict::Accept);
}

#[test]
fn equal_windows_never_reject() {
    let tolerances = Quality::Hq.profile().tolerances;
    assert_eq!(classify_frame(4.49, 5.0, tolerances), FrameVerdict::Skip);
    assert_eq!(classify_frame(4.5, 5.0, tolerances), FrameVerdict::Accept);
}
