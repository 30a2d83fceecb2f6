//! Codec cache, hardware context, extraction pool and configuration tests.
//!
//! These exercise the long-lived state with injected lookups and device
//! factories, so no fixture media or hardware is needed.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use ffmpeg_next::codec::Id;
use thumbgrab::{
    CodecCache, CodecKey, ExtractionPool, FrameTolerances, HardwareContextManager,
    HardwareDeviceType, MAX_FRAME_BUDGET, PlatformContext, Quality, ThumbnailError,
    Thumbnailer, ThumbnailerConfig,
};

// ── Codec cache ──────────────────────────────────────────────────

#[test]
fn cache_holds_one_entry_per_codec() {
    let cache: CodecCache<&'static str> = CodecCache::new();
    let lookups = AtomicUsize::new(0);
    let lookup = |key: CodecKey| {
        lookups.fetch_add(1, Ordering::SeqCst);
        Some(key.name())
    };

    for _ in 0..5 {
        for id in [Id::H264, Id::HEVC, Id::VP9] {
            assert!(cache.resolve_with(CodecKey::from(id), lookup).is_some());
        }
    }

    assert_eq!(cache.len(), 3);
    assert_eq!(lookups.load(Ordering::SeqCst), 3);
    assert!(cache.contains(CodecKey::from(Id::HEVC)));
    assert!(!cache.contains(CodecKey::from(Id::AV1)));
}

#[test]
fn failed_lookup_caches_nothing() {
    let cache: CodecCache<u32> = CodecCache::new();
    let key = CodecKey::from(Id::AV1);

    assert_eq!(cache.resolve_with(key, |_| None), None);
    assert!(cache.is_empty());
    assert_eq!(cache.resolve_with(key, |_| Some(7)), Some(7));
    assert_eq!(cache.len(), 1);
}

#[test]
fn hit_refreshes_last_used() {
    let cache: CodecCache<u8> = CodecCache::new();
    let key = CodecKey::from(Id::H264);

    cache.resolve_with(key, |_| Some(1));
    let first = cache.last_used(key).expect("entry should exist");
    thread::sleep(Duration::from_millis(5));
    cache.resolve_with(key, |_| panic!("lookup must not run on a hit"));
    let second = cache.last_used(key).expect("entry should exist");

    assert!(second > first);
}

#[test]
fn clear_then_resolve_repopulates() {
    let cache: CodecCache<u8> = CodecCache::new();
    cache.resolve_with(CodecKey::from(Id::H264), |_| Some(1));
    cache.resolve_with(CodecKey::from(Id::VP9), |_| Some(2));
    assert_eq!(cache.len(), 2);

    cache.clear();
    assert_eq!(cache.len(), 0);

    cache.resolve_with(CodecKey::from(Id::H264), |_| Some(1));
    assert_eq!(cache.len(), 1);
}

#[test]
fn clear_races_resolve_safely() {
    let cache: Arc<CodecCache<u32>> = Arc::new(CodecCache::new());

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for round in 0..200 {
                    if worker == 0 && round % 10 == 0 {
                        cache.clear();
                    } else {
                        let id = if round % 2 == 0 { Id::H264 } else { Id::HEVC };
                        assert!(cache.resolve_with(CodecKey::from(id), |_| Some(round)).is_some());
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("worker panicked");
    }
    assert!(cache.len() <= 2);
}

#[test]
fn production_cache_finds_builtin_decoders() {
    let cache = CodecCache::new();
    let descriptor = cache
        .resolve(CodecKey::from(Id::MPEG4))
        .expect("libavcodec should ship an MPEG-4 part 2 decoder");
    assert!(!descriptor.name().is_empty());
    assert_eq!(cache.len(), 1);
}

// ── Hardware context ─────────────────────────────────────────────

#[test]
fn device_is_created_once_and_shared() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let manager = HardwareContextManager::with_factory("fake", move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(String::from("device"))
    });

    assert!(!manager.is_initialized());
    let first = manager.acquire().expect("device should be available");
    let second = manager.acquire().expect("device should be available");

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert!(manager.is_initialized());
    assert!(manager.is_available());
}

#[test]
fn unavailable_device_is_not_retried_until_clear() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let manager = HardwareContextManager::<u8>::with_factory("fake", move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(ThumbnailError::Ffmpeg("no device".into()))
    });

    for _ in 0..3 {
        assert!(manager.acquire().is_none());
    }
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert!(manager.is_initialized());
    assert!(!manager.is_available());

    manager.clear();
    assert!(!manager.is_initialized());
    assert!(!manager.ensure_available());
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn clear_keeps_borrowed_device_alive() {
    let manager = HardwareContextManager::with_factory("fake", || Ok(vec![1_u8, 2, 3]));
    let held = manager.acquire().expect("device should be available");

    manager.clear();
    assert!(!manager.is_available());
    assert_eq!(*held, vec![1, 2, 3]);

    let fresh = manager.acquire().expect("device should be recreated");
    assert!(!Arc::ptr_eq(&held, &fresh));
}

#[test]
fn device_names_round_trip() {
    for name in ["cuda", "vaapi", "dxva2", "d3d11va", "videotoolbox", "qsv", "mediacodec"] {
        let device = HardwareDeviceType::from_name(name).expect("known device name");
        assert_eq!(device.name(), name);
    }
    assert!(HardwareDeviceType::from_name("voodoo").is_none());
}

#[test]
fn platform_default_matches_target() {
    let expected = if cfg!(target_os = "android") {
        HardwareDeviceType::MediaCodec
    } else if cfg!(any(target_os = "macos", target_os = "ios")) {
        HardwareDeviceType::VideoToolbox
    } else if cfg!(windows) {
        HardwareDeviceType::D3d11va
    } else {
        HardwareDeviceType::Vaapi
    };
    assert_eq!(HardwareDeviceType::platform_default(), expected);
}

// ── Extraction pool ──────────────────────────────────────────────

#[test]
fn pool_size_is_at_least_one() {
    assert_eq!(ExtractionPool::new(0).size(), 1);
    assert_eq!(ExtractionPool::new(3).size(), 3);
    assert_eq!(ExtractionPool::default().size(), 1);
}

#[test]
fn permit_is_released_on_drop() {
    let pool = ExtractionPool::new(1);
    {
        let _permit = pool.acquire();
        assert_eq!(pool.in_use(), 1);
        assert!(pool.try_acquire().is_none());
    }
    assert_eq!(pool.in_use(), 0);
    assert!(pool.try_acquire().is_some());
}

#[test]
fn size_one_pool_serializes_holders() {
    let pool = Arc::new(ExtractionPool::new(1));
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..6)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            thread::spawn(move || {
                let _permit = pool.acquire();
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
                active.fetch_sub(1, Ordering::SeqCst);
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("worker panicked");
    }
    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert_eq!(pool.in_use(), 0);
}

#[test]
fn thumbnailers_sharing_hardware_share_one_gate() {
    let first = Thumbnailer::new();
    let second = Thumbnailer::with_parts(
        ThumbnailerConfig::new().with_pool_size(4),
        Arc::clone(first.codec_cache()),
        Arc::clone(first.hardware()),
        Arc::clone(first.pool()),
    );
    assert!(Arc::ptr_eq(first.pool(), second.pool()));
    assert_eq!(second.pool().size(), 1);

    {
        let _permit = first.pool().acquire();
        assert!(second.pool().try_acquire().is_none());
    }
    assert!(second.pool().try_acquire().is_some());
}

#[test]
fn shared_gate_serializes_across_thumbnailers() {
    let first = Arc::new(Thumbnailer::new());
    let second = Arc::new(Thumbnailer::with_parts(
        ThumbnailerConfig::new(),
        Arc::clone(first.codec_cache()),
        Arc::clone(first.hardware()),
        Arc::clone(first.pool()),
    ));
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..6)
        .map(|worker| {
            let thumbnailer = if worker % 2 == 0 {
                Arc::clone(&first)
            } else {
                Arc::clone(&second)
            };
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            thread::spawn(move || {
                let _permit = thumbnailer.pool().acquire();
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
                active.fetch_sub(1, Ordering::SeqCst);
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("worker panicked");
    }
    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert_eq!(first.pool().in_use(), 0);
}

// ── Initialization ───────────────────────────────────────────────

#[test]
fn initialize_accepts_a_replacement_platform_context() {
    let thumbnailer = Thumbnailer::new();
    assert!(!thumbnailer.is_initialized());

    thumbnailer
        .initialize(PlatformContext::none())
        .expect("Failed to initialize");
    assert!(thumbnailer.is_initialized());

    thumbnailer
        .initialize(PlatformContext::default())
        .expect("Re-initializing should install the new context");
    assert!(thumbnailer.is_initialized());
}

// ── ThumbnailerConfig ────────────────────────────────────────────

#[test]
fn config_defaults() {
    let config = ThumbnailerConfig::new();
    assert_eq!(config.pool_size(), 1);
    assert_eq!(config.hardware_device(), HardwareDeviceType::platform_default());
    for quality in Quality::ALL {
        assert_eq!(config.profile_for(quality), *quality.profile());
    }

    let debug = format!("{config:?}");
    assert!(debug.contains("ThumbnailerConfig"));
    assert!(debug.contains("pool_size: 1"));
}

#[test]
fn config_clamps_values() {
    let config = ThumbnailerConfig::new()
        .with_pool_size(0)
        .with_frame_budget(Quality::Fast, 0)
        .with_frame_budget(Quality::Hq, u32::MAX);

    assert_eq!(config.pool_size(), 1);
    assert_eq!(config.profile_for(Quality::Fast).frame_budget, 1);
    assert_eq!(config.profile_for(Quality::Hq).frame_budget, MAX_FRAME_BUDGET);
}

#[test]
fn tolerance_override_touches_one_tier() {
    let config = ThumbnailerConfig::new().with_tolerances(
        Quality::Normal,
        FrameTolerances {
            skip: 0.75,
            accept: 2.0,
        },
    );

    let normal = config.profile_for(Quality::Normal).tolerances;
    assert_eq!(normal.skip, 0.75);
    assert_eq!(normal.accept, 0.75);
    assert_eq!(config.profile_for(Quality::Fast), *Quality::Fast.profile());

    let sanitized = ThumbnailerConfig::new()
        .with_tolerances(
            Quality::Hq,
            FrameTolerances {
                skip: f64::NAN,
                accept: -1.0,
            },
        )
        .profile_for(Quality::Hq)
        .tolerances;
    assert_eq!((sanitized.skip, sanitized.accept), (0.0, 0.0));
}
