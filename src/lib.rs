//! # thumbgrab
//!
//! Fast single-frame thumbnails from local video files.
//!
//! Given a path, a position in seconds, a target size and a quality tier,
//! `thumbgrab` opens the container under a tight probe budget, seeks near
//! the position, decodes the first acceptable frame and returns it scaled
//! so its longest side matches the requested size, packed as `ARGB_8888`
//! pixels ready for a platform bitmap.
//!
//! ## Quick Start
//!
//! ```no_run
//! use thumbgrab::{PlatformContext, Quality, Thumbnailer};
//!
//! let thumbnailer = Thumbnailer::global();
//! thumbnailer.initialize(PlatformContext::none()).unwrap();
//!
//! let image = thumbnailer
//!     .extract("input.mp4", 30.0, 320, false, Quality::Fast)
//!     .unwrap();
//! println!("{}x{}", image.width(), image.height());
//! ```
//!
//! ## Quality tiers
//!
//! | Tier | Probe budget | Seek | Acceptance window | Scaling |
//! |------|--------------|------|-------------------|---------|
//! | `Fast` | 0.5 s / 2 MB | any frame | 2 s | point |
//! | `Normal` | 1 s / 5 MB | any frame below 5 s, keyframe after | 1 s | fast bilinear |
//! | `Hq` | 5 s / 10 MB | keyframe | 0.5 s | bicubic |
//!
//! Raw integer tiers from foreign callers go through [`Quality::from_raw`],
//! which maps unknown values to `Normal`.
//!
//! ## Shared state
//!
//! Decoder lookups are cached per codec in a [`CodecCache`] and one hardware
//! device is kept by a [`HardwareContextManager`]. Both outlive individual
//! calls and are cleared with [`Thumbnailer::clear_cache`]. Extractions on
//! one [`Thumbnailer`] run one at a time unless a larger pool is configured
//! through [`ThumbnailerConfig::with_pool_size`].
//!
//! ## Requirements
//!
//! FFmpeg development libraries (libavformat, libavcodec, libswscale,
//! libavutil) must be installed, version 8 or compatible.

pub mod bitmap;
pub mod codec_cache;
pub mod config;
pub mod convert;
pub mod decode;
pub mod demux;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod pool;
pub mod quality;
pub mod request;
pub mod seek;
pub mod snapshot;
pub mod thumbnailer;
mod utilities;

pub use bitmap::{BitmapFactory, RgbaImageFactory};
pub use codec_cache::{CodecCache, CodecKey, DecoderDescriptor};
pub use config::{MAX_FRAME_BUDGET, ThumbnailerConfig};
pub use convert::{OutputImage, convert_frame, convert_frame_into, fit_dimensions};
pub use decode::{DecodedFrame, FrameVerdict, classify_frame};
pub use demux::{DemuxContext, StreamDescriptor};
pub use error::{FailureKind, ThumbnailError};
pub use hardware::{
    HardwareContextManager, HardwareDevice, HardwareDeviceType, PlatformContext,
    available_hardware_devices,
};
pub use logging::{FfmpegLogLevel, ffmpeg_log_level, set_ffmpeg_log_level};
pub use pool::{ExtractionPool, PoolPermit};
pub use quality::{
    DecoderProfile, FrameTolerances, NORMAL_BACKWARD_SEEK_THRESHOLD, ProbeLimits, Quality,
    QualityProfile, ScaleAlgorithm, SeekPolicy,
};
pub use request::{DecodeRequest, MAX_DIMENSION};
pub use seek::{SeekPlan, SeekStrategy, plan_seek};
pub use snapshot::{RawSnapshot, SnapshotSource, snapshot_thumbnail};
pub use thumbnailer::Thumbnailer;
