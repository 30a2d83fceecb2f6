//! Thumbnails from live playback snapshots.
//!
//! A player that can hand out its current picture as a raw `BGR0` buffer
//! implements [`SnapshotSource`]; [`snapshot_thumbnail`] turns such a
//! buffer into a square thumbnail without touching the demux/decode path.

use std::fmt::{Debug, Formatter, Result as FmtResult};

use ffmpeg_next::{
    format::Pixel,
    frame::Video as VideoFrame,
    software::scaling::Context as ScalingContext,
};

use crate::convert::{OutputImage, allocate_pixels, pack_bgra_rows};
use crate::error::ThumbnailError;
use crate::quality::ScaleAlgorithm;
use crate::request::MAX_DIMENSION;

const BYTES_PER_PIXEL: usize = 4;

/// One uncompressed picture in `BGR0` layout (blue, green, red, padding).
#[derive(Clone, PartialEq, Eq)]
pub struct RawSnapshot {
    width: u32,
    height: u32,
    stride: usize,
    data: Vec<u8>,
}

impl RawSnapshot {
    /// Wrap a `BGR0` buffer of `height` rows, each `stride` bytes apart.
    ///
    /// # Errors
    ///
    /// Returns [`ThumbnailError::InvalidParameter`] if a side is zero, the
    /// stride is shorter than a row, or the buffer is too small.
    pub fn new(width: u32, height: u32, stride: usize, data: Vec<u8>) -> Result<Self, ThumbnailError> {
        if width == 0 || height == 0 {
            return Err(ThumbnailError::InvalidParameter(format!(
                "snapshot dimensions {width}x{height} must be non-zero"
            )));
        }
        let row_bytes = width as usize * BYTES_PER_PIXEL;
        if stride < row_bytes {
            return Err(ThumbnailError::InvalidParameter(format!(
                "snapshot stride {stride} is shorter than a {width}-pixel row"
            )));
        }
        let required = stride * (height as usize - 1) + row_bytes;
        if data.len() < required {
            return Err(ThumbnailError::InvalidParameter(format!(
                "snapshot buffer holds {} bytes, {width}x{height} needs {required}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            stride,
            data,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes between the starts of consecutive rows.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Raw pixel bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Offset and side of the centered square crop.
    fn square_crop(&self) -> (u32, u32, u32) {
        if self.width > self.height {
            ((self.width - self.height) / 2, 0, self.height)
        } else {
            (0, (self.height - self.width) / 2, self.width)
        }
    }
}

impl Debug for RawSnapshot {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("RawSnapshot")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Something that can capture its current picture, such as a media player.
pub trait SnapshotSource {
    /// Capture the picture currently on screen.
    ///
    /// # Errors
    ///
    /// Implementations report capture failures as [`ThumbnailError`]s.
    fn capture(&mut self) -> Result<RawSnapshot, ThumbnailError>;

    /// Capture and convert to a `dimension`-sided square thumbnail.
    ///
    /// # Errors
    ///
    /// See [`capture`](SnapshotSource::capture) and [`snapshot_thumbnail`].
    fn grab_thumbnail(&mut self, dimension: u32) -> Result<OutputImage, ThumbnailError> {
        let snapshot = self.capture()?;
        snapshot_thumbnail(&snapshot, dimension)
    }
}

/// Center-crop `snapshot` to a square and scale it to
/// `dimension`x`dimension` with bicubic resampling.
///
/// # Errors
///
/// - [`ThumbnailError::InvalidParameter`] if `dimension` is outside
///   `1..=MAX_DIMENSION`.
/// - [`ThumbnailError::ConversionFailure`] if allocation or scaling fails.
pub fn snapshot_thumbnail(snapshot: &RawSnapshot, dimension: u32) -> Result<OutputImage, ThumbnailError> {
    if dimension == 0 || dimension > MAX_DIMENSION {
        return Err(ThumbnailError::InvalidParameter(format!(
            "dimension {dimension} is outside 1..={MAX_DIMENSION}"
        )));
    }

    let (left, top, side) = snapshot.square_crop();
    log::debug!(
        "Snapshot {}x{} cropped to {side}x{side} at ({left}, {top})",
        snapshot.width,
        snapshot.height
    );

    let mut cropped = VideoFrame::new(Pixel::BGRZ, side, side);
    let target_stride = cropped.stride(0);
    let row_bytes = side as usize * BYTES_PER_PIXEL;
    let source_start = top as usize * snapshot.stride + left as usize * BYTES_PER_PIXEL;
    {
        let target = cropped.data_mut(0);
        for row in 0..side as usize {
            let from = source_start + row * snapshot.stride;
            let to = row * target_stride;
            target[to..to + row_bytes].copy_from_slice(&snapshot.data[from..from + row_bytes]);
        }
    }

    let mut scaler = ScalingContext::get(
        Pixel::BGRZ,
        side,
        side,
        Pixel::BGRA,
        dimension,
        dimension,
        ScaleAlgorithm::Bicubic.to_flags(),
    )
    .map_err(|error| ThumbnailError::ConversionFailure(format!("scaler setup: {error}")))?;

    let mut scaled = VideoFrame::empty();
    scaler
        .run(&cropped, &mut scaled)
        .map_err(|error| ThumbnailError::ConversionFailure(format!("scaling: {error}")))?;

    let mut pixels = allocate_pixels(dimension, dimension)?;
    pack_bgra_rows(&scaled, dimension, dimension, &mut pixels)?;
    OutputImage::from_pixels(dimension, dimension, pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_is_centered_on_the_long_axis() {
        let wide = RawSnapshot::new(8, 4, 32, vec![0; 128]).unwrap();
        assert_eq!(wide.square_crop(), (2, 0, 4));

        let tall = RawSnapshot::new(3, 9, 12, vec![0; 108]).unwrap();
        assert_eq!(tall.square_crop(), (0, 3, 3));
    }

    #[test]
    fn short_buffers_are_rejected() {
        assert!(RawSnapshot::new(4, 4, 16, vec![0; 63]).is_err());
        assert!(RawSnapshot::new(4, 4, 12, vec![0; 64]).is_err());
        assert!(RawSnapshot::new(0, 4, 16, vec![0; 64]).is_err());
    }
}
