//! Container probing and video stream selection.
//!
//! [`DemuxContext`] owns the open FFmpeg input for the duration of one
//! extraction. Probing is bounded by the tier's [`ProbeLimits`] so that a
//! large or oddly muxed file cannot stall a thumbnail request in stream
//! analysis.

use std::{
    ffi::CString,
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    ptr,
    time::Duration,
};

use ffmpeg_next::{Rational, format::context::Input, media::Type};

use crate::codec_cache::CodecKey;
use crate::error::ThumbnailError;
use crate::quality::ProbeLimits;

/// The video stream an extraction decodes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamDescriptor {
    /// Index of the stream within the container.
    pub index: usize,
    /// Unit of the stream's timestamps.
    pub time_base: Rational,
    /// Codec of the stream.
    pub codec: CodecKey,
    /// Coded width in pixels (0 if the container does not say).
    pub width: u32,
    /// Coded height in pixels (0 if the container does not say).
    pub height: u32,
}

/// An open, probed container.
///
/// Dropping it closes the input.
pub struct DemuxContext {
    input: Input,
    limits: ProbeLimits,
    path: PathBuf,
}

impl Debug for DemuxContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DemuxContext")
            .field("path", &self.path)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl DemuxContext {
    /// Open `path` and read its stream information within `limits`.
    ///
    /// # Errors
    ///
    /// - [`ThumbnailError::OpenFailure`] if the source cannot be opened.
    /// - [`ThumbnailError::StreamInfoFailure`] if its streams cannot be
    ///   analysed.
    pub fn open(path: &Path, limits: ProbeLimits) -> Result<Self, ThumbnailError> {
        let path_buf = path.to_path_buf();
        let open_failure = |reason: String| ThumbnailError::OpenFailure {
            path: path_buf.clone(),
            reason,
        };

        ffmpeg_next::init()
            .map_err(|error| open_failure(format!("FFmpeg initialisation failed: {error}")))?;

        let path_str = path
            .to_str()
            .ok_or_else(|| open_failure("path is not valid UTF-8".to_string()))?;
        let c_path = CString::new(path_str)
            .map_err(|_| open_failure("path contains a NUL byte".to_string()))?;

        log::debug!(
            "Opening {} (probe {} bytes, analyse {:?})",
            path.display(),
            limits.probe_size,
            limits.max_analyze_duration
        );

        let mut input = unsafe {
            let mut context = ffmpeg_sys_next::avformat_alloc_context();
            if context.is_null() {
                return Err(open_failure(
                    "could not allocate format context".to_string(),
                ));
            }

            (*context).probesize = i64::try_from(limits.probe_size).unwrap_or(i64::MAX);
            (*context).max_analyze_duration =
                i64::try_from(limits.max_analyze_duration.as_micros()).unwrap_or(i64::MAX);
            (*context).fps_probe_size = i32::try_from(limits.fps_probe_frames).unwrap_or(i32::MAX);

            // On failure avformat_open_input frees the context itself.
            let result = ffmpeg_sys_next::avformat_open_input(
                &mut context,
                c_path.as_ptr(),
                ptr::null(),
                ptr::null_mut(),
            );
            if result < 0 {
                return Err(open_failure(ffmpeg_next::Error::from(result).to_string()));
            }

            Input::wrap(context)
        };

        let result =
            unsafe { ffmpeg_sys_next::avformat_find_stream_info(input.as_mut_ptr(), ptr::null_mut()) };
        if result < 0 {
            return Err(ThumbnailError::StreamInfoFailure {
                path: path_buf,
                reason: ffmpeg_next::Error::from(result).to_string(),
            });
        }

        Ok(Self {
            input,
            limits,
            path: path_buf,
        })
    }

    /// Select the first video stream in container order.
    ///
    /// # Errors
    ///
    /// Returns [`ThumbnailError::NoVideoStream`] if there is none.
    pub fn select_video_stream(&self) -> Result<StreamDescriptor, ThumbnailError> {
        let stream = self
            .input
            .streams()
            .find(|stream| stream.parameters().medium() == Type::Video)
            .ok_or(ThumbnailError::NoVideoStream)?;

        let parameters = stream.parameters();
        let (width, height) = unsafe {
            let raw = parameters.as_ptr();
            ((*raw).width.max(0) as u32, (*raw).height.max(0) as u32)
        };

        let descriptor = StreamDescriptor {
            index: stream.index(),
            time_base: stream.time_base(),
            codec: CodecKey::from(parameters.id()),
            width,
            height,
        };
        log::debug!(
            "Selected video stream {} ({} {}x{})",
            descriptor.index,
            descriptor.codec.name(),
            width,
            height
        );
        Ok(descriptor)
    }

    /// Container duration, if known.
    pub fn duration(&self) -> Option<Duration> {
        let microseconds = self.input.duration();
        (microseconds > 0).then(|| Duration::from_micros(microseconds as u64))
    }

    /// Path of the opened source.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn input(&self) -> &Input {
        &self.input
    }

    pub(crate) fn input_mut(&mut self) -> &mut Input {
        &mut self.input
    }
}
