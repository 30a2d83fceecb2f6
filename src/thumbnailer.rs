//! The extraction entry point.
//!
//! A [`Thumbnailer`] owns the long-lived state shared between calls (codec
//! cache, hardware context, extraction pool) and runs the per-call
//! pipeline: open, probe, select stream, open decoder, seek, decode,
//! convert. Every native resource acquired along the way is an owned value
//! dropped when the call returns, whichever step failed.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crate::bitmap::BitmapFactory;
use crate::codec_cache::CodecCache;
use crate::config::ThumbnailerConfig;
use crate::convert::{OutputImage, convert_frame};
use crate::decode::{FrameSearch, open_decoder};
use crate::demux::DemuxContext;
use crate::error::ThumbnailError;
use crate::hardware::{HardwareContextManager, HardwareDevice, PlatformContext};
use crate::pool::ExtractionPool;
use crate::quality::Quality;
use crate::request::DecodeRequest;
use crate::seek::{apply_seek, plan_seek};

static GLOBAL: OnceLock<Thumbnailer> = OnceLock::new();

/// Fast single-frame thumbnail extractor.
///
/// # Example
///
/// ```no_run
/// use thumbgrab::{PlatformContext, Quality, Thumbnailer};
///
/// let thumbnailer = Thumbnailer::new();
/// thumbnailer.initialize(PlatformContext::none()).unwrap();
///
/// let image = thumbnailer
///     .extract("input.mp4", 12.5, 256, false, Quality::Normal)
///     .unwrap();
/// assert_eq!(image.width().max(image.height()), 256);
/// image.save("thumbnail.png").unwrap();
/// ```
pub struct Thumbnailer {
    codec_cache: Arc<CodecCache>,
    hardware: Arc<HardwareContextManager>,
    pool: Arc<ExtractionPool>,
    config: ThumbnailerConfig,
    initialized: AtomicBool,
}

impl Debug for Thumbnailer {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Thumbnailer")
            .field("cached_codecs", &self.codec_cache.len())
            .field("hardware", &self.hardware)
            .field("pool", &self.pool)
            .field("config", &self.config)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl Default for Thumbnailer {
    fn default() -> Self {
        Self::new()
    }
}

impl Thumbnailer {
    /// Create a thumbnailer with default settings and fresh caches.
    pub fn new() -> Self {
        Self::with_config(ThumbnailerConfig::new())
    }

    /// Create a thumbnailer with fresh caches and the given settings.
    pub fn with_config(config: ThumbnailerConfig) -> Self {
        let hardware = Arc::new(HardwareContextManager::new(config.hardware_device()));
        let pool = Arc::new(ExtractionPool::new(config.pool_size()));
        Self::with_parts(config, Arc::new(CodecCache::new()), hardware, pool)
    }

    /// Create a thumbnailer around existing caches, possibly shared with
    /// other thumbnailers.
    ///
    /// Thumbnailers sharing a hardware manager must also share `pool`, since
    /// one hardware context must not serve two decode sessions at once. The
    /// pool's own size wins over `config.pool_size()`.
    pub fn with_parts(
        config: ThumbnailerConfig,
        codec_cache: Arc<CodecCache>,
        hardware: Arc<HardwareContextManager>,
        pool: Arc<ExtractionPool>,
    ) -> Self {
        Self {
            codec_cache,
            hardware,
            pool,
            config,
            initialized: AtomicBool::new(false),
        }
    }

    /// The process-wide instance, created with default settings on first use.
    pub fn global() -> &'static Thumbnailer {
        GLOBAL.get_or_init(Thumbnailer::new)
    }

    /// Platform wiring.
    ///
    /// Registers FFmpeg and hands host handles (the `JavaVM` on Android) to
    /// libavcodec. Hardware requests made before this succeeds are served in
    /// software. Calling it again installs the new handles, so a replaced
    /// host context takes effect; FFmpeg registration itself runs once.
    ///
    /// # Errors
    ///
    /// Returns [`ThumbnailError::Ffmpeg`] if FFmpeg fails to initialize or
    /// rejects the platform handles.
    pub fn initialize(&self, platform: PlatformContext) -> Result<(), ThumbnailError> {
        if !self.is_initialized() {
            ffmpeg_next::init()?;
        }
        platform.install()?;
        if self.initialized.swap(true, Ordering::AcqRel) {
            log::debug!("Platform context replaced ({platform:?})");
        } else {
            log::debug!("Thumbnailer initialized ({platform:?})");
        }
        Ok(())
    }

    /// Whether [`initialize`](Self::initialize) has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Extract one frame near `position` seconds as a thumbnail whose
    /// longest side is `dimension`.
    ///
    /// # Errors
    ///
    /// - [`ThumbnailError::InvalidParameter`] if `dimension` is outside
    ///   `1..=4096` or `position` is negative or not finite. Nothing is
    ///   opened in that case.
    /// - [`ThumbnailError::OpenFailure`] / [`ThumbnailError::StreamInfoFailure`]
    ///   if the container cannot be read.
    /// - [`ThumbnailError::NoVideoStream`] for files without video.
    /// - [`ThumbnailError::CodecUnavailable`] / [`ThumbnailError::CodecOpenFailure`]
    ///   if the stream cannot be decoded.
    /// - [`ThumbnailError::NoFrameFound`] if no frame is accepted before the
    ///   frame budget or the input runs out.
    /// - [`ThumbnailError::ConversionFailure`] if scaling fails.
    pub fn extract<P: AsRef<Path>>(
        &self,
        path: P,
        position: f64,
        dimension: u32,
        use_hardware: bool,
        quality: Quality,
    ) -> Result<OutputImage, ThumbnailError> {
        let request = DecodeRequest::new(position, dimension, use_hardware, quality)?;
        self.extract_request(path, &request)
    }

    /// Like [`extract`](Self::extract) with a pre-validated request.
    ///
    /// # Errors
    ///
    /// See [`extract`](Self::extract).
    pub fn extract_request<P: AsRef<Path>>(
        &self,
        path: P,
        request: &DecodeRequest,
    ) -> Result<OutputImage, ThumbnailError> {
        let path = path.as_ref();
        let _permit = self.pool.acquire();

        let profile = self.config.profile_for(request.quality());
        let position = request.position();
        log::debug!(
            "Extracting {} at {position:.3}s, {}px, {} quality",
            path.display(),
            request.dimension(),
            request.quality()
        );

        let mut demux = DemuxContext::open(path, profile.probe)?;
        let stream = demux.select_video_stream()?;

        let descriptor = self
            .codec_cache
            .resolve(stream.codec)
            .ok_or_else(|| ThumbnailError::CodecUnavailable(stream.codec.name().to_string()))?;

        let device = self.hardware_for(request);
        let mut decoder = match open_decoder(
            &demux,
            &stream,
            descriptor,
            &profile.decoder,
            device.as_deref(),
        ) {
            Ok(decoder) => decoder,
            Err(error) if device.is_some() => {
                log::warn!("Hardware decoder failed to open, retrying in software: {error}");
                open_decoder(&demux, &stream, descriptor, &profile.decoder, None)?
            }
            Err(error) => return Err(error),
        };

        let plan = plan_seek(position, profile.seek_policy, &stream);
        if let Err(error) = apply_seek(&plan, position, &mut demux, &mut decoder) {
            log::warn!("{error}; decoding from the current position");
        }

        let found =
            FrameSearch::new(position, &stream, &profile).run(&mut demux, stream.index, &mut decoder)?;

        convert_frame(found.frame(), request.dimension(), profile.scale)
    }

    /// Extract a thumbnail and hand it to `factory`.
    ///
    /// # Errors
    ///
    /// See [`extract`](Self::extract), plus whatever `factory` reports.
    pub fn extract_bitmap<F, P>(
        &self,
        factory: &F,
        path: P,
        position: f64,
        dimension: u32,
        use_hardware: bool,
        quality: Quality,
    ) -> Result<F::Bitmap, ThumbnailError>
    where
        F: BitmapFactory,
        P: AsRef<Path>,
    {
        let image = self.extract(path, position, dimension, use_hardware, quality)?;
        factory.create_bitmap(image)
    }

    /// Drop every cached decoder and the hardware context.
    ///
    /// Safe to call while other threads extract; in-flight calls keep the
    /// handles they already hold.
    pub fn clear_cache(&self) {
        let codecs = self.codec_cache.len();
        self.codec_cache.clear();
        self.hardware.clear();
        log::debug!("Cleared {codecs} cached codecs and the hardware context");
    }

    /// The codec cache.
    pub fn codec_cache(&self) -> &Arc<CodecCache> {
        &self.codec_cache
    }

    /// The hardware context manager.
    pub fn hardware(&self) -> &Arc<HardwareContextManager> {
        &self.hardware
    }

    /// The settings this thumbnailer was built with.
    pub fn config(&self) -> &ThumbnailerConfig {
        &self.config
    }

    /// The extraction pool.
    pub fn pool(&self) -> &Arc<ExtractionPool> {
        &self.pool
    }

    fn hardware_for(&self, request: &DecodeRequest) -> Option<Arc<HardwareDevice>> {
        if !request.use_hardware() {
            return None;
        }
        if !self.is_initialized() {
            log::warn!("Hardware decoding requested before initialize(); using software");
            return None;
        }
        self.hardware.acquire()
    }
}
