//! Error types for the `thumbgrab` crate.
//!
//! This module defines [`ThumbnailError`], the single error type returned by
//! every fallible operation in the crate. Each pipeline step maps to exactly
//! one variant, so a caller can tell *where* an extraction stopped without
//! parsing messages. [`FailureKind`] is the fieldless projection of the same
//! taxonomy.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `thumbgrab` operations.
///
/// No variant ever carries a partial image: an extraction either produces a
/// complete [`OutputImage`](crate::OutputImage) or one of these.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ThumbnailError {
    /// A request parameter was out of range. Nothing was opened.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The media source could not be opened.
    #[error("Failed to open media source at {path}: {reason}")]
    OpenFailure {
        /// Path passed to the extraction call.
        path: PathBuf,
        /// Underlying reason reported by the demuxer.
        reason: String,
    },

    /// The container opened but its streams could not be analysed within the
    /// probe budget.
    #[error("Failed to read stream information from {path}: {reason}")]
    StreamInfoFailure {
        /// Path passed to the extraction call.
        path: PathBuf,
        /// Underlying reason reported by the demuxer.
        reason: String,
    },

    /// The container has no video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// No decoder is available for the stream's codec.
    #[error("No decoder available for codec {0}")]
    CodecUnavailable(String),

    /// A decoder was found but could not be opened.
    #[error("Failed to open decoder: {0}")]
    CodecOpenFailure(String),

    /// Seeking failed. Extraction recovers from this by decoding from the
    /// current read position, so it is only ever logged.
    #[error("Seek to {position:.3}s failed: {reason}")]
    SeekFailure {
        /// Requested position in seconds.
        position: f64,
        /// Underlying reason reported by the demuxer.
        reason: String,
    },

    /// The frame budget or the input ran out before an acceptable frame was
    /// decoded.
    #[error("No frame found near {position:.3}s after decoding {frames_decoded} frames")]
    NoFrameFound {
        /// Requested position in seconds.
        position: f64,
        /// Number of frames decoded before giving up.
        frames_decoded: u32,
    },

    /// Scaling or pixel-format conversion failed.
    #[error("Failed to convert frame: {0}")]
    ConversionFailure(String),

    /// An error originating from FFmpeg outside the steps above (library
    /// initialisation, platform wiring).
    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    /// An I/O error occurred while writing an output file.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// An error from the `image` crate while building or saving a bitmap.
    #[error("Image processing error: {0}")]
    Image(#[from] ImageError),
}

/// Fieldless classification of a [`ThumbnailError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum FailureKind {
    InvalidParameter,
    OpenFailure,
    StreamInfoFailure,
    NoVideoStream,
    CodecUnavailable,
    CodecOpenFailure,
    SeekFailure,
    NoFrameFound,
    ConversionFailure,
    Ffmpeg,
    Io,
    Image,
}

impl ThumbnailError {
    /// Return the taxonomy entry for this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            ThumbnailError::InvalidParameter(_) => FailureKind::InvalidParameter,
            ThumbnailError::OpenFailure { .. } => FailureKind::OpenFailure,
            ThumbnailError::StreamInfoFailure { .. } => FailureKind::StreamInfoFailure,
            ThumbnailError::NoVideoStream => FailureKind::NoVideoStream,
            ThumbnailError::CodecUnavailable(_) => FailureKind::CodecUnavailable,
            ThumbnailError::CodecOpenFailure(_) => FailureKind::CodecOpenFailure,
            ThumbnailError::SeekFailure { .. } => FailureKind::SeekFailure,
            ThumbnailError::NoFrameFound { .. } => FailureKind::NoFrameFound,
            ThumbnailError::ConversionFailure(_) => FailureKind::ConversionFailure,
            ThumbnailError::Ffmpeg(_) => FailureKind::Ffmpeg,
            ThumbnailError::Io(_) => FailureKind::Io,
            ThumbnailError::Image(_) => FailureKind::Image,
        }
    }
}

impl From<FfmpegError> for ThumbnailError {
    fn from(error: FfmpegError) -> Self {
        ThumbnailError::Ffmpeg(error.to_string())
    }
}
