//! Frame-to-image conversion.
//!
//! Decoded frames arrive in whatever pixel format the decoder produces
//! (usually planar YUV). The converter scales them so the longest side
//! matches the requested dimension and repacks them as 32-bit `ARGB_8888`
//! words, the layout platform bitmap objects take directly.

use std::path::Path;

use ffmpeg_next::{
    format::Pixel,
    frame::Video as VideoFrame,
    software::scaling::Context as ScalingContext,
};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use crate::error::ThumbnailError;
use crate::quality::ScaleAlgorithm;

/// A finished thumbnail.
///
/// Each pixel is one `u32` in `0xAARRGGBB` order, which is `BGRA` byte order
/// in memory on little-endian hosts. `pixels.len() == width * height`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct OutputImage {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl OutputImage {
    /// Wrap an existing pixel buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ThumbnailError::ConversionFailure`] if either side is zero
    /// or the buffer length is not `width * height`.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<u32>) -> Result<Self, ThumbnailError> {
        if width == 0 || height == 0 {
            return Err(ThumbnailError::ConversionFailure(format!(
                "image dimensions {width}x{height} must be non-zero"
            )));
        }
        if pixels.len() != pixel_count(width, height) {
            return Err(ThumbnailError::ConversionFailure(format!(
                "buffer holds {} pixels, {width}x{height} needs {}",
                pixels.len(),
                pixel_count(width, height)
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
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

    /// Packed `0xAARRGGBB` pixels, row-major.
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Convert to an RGBA [`image`] buffer.
    pub fn to_rgba_image(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            let index = (y as usize) * (self.width as usize) + x as usize;
            let [blue, green, red, alpha] = self.pixels[index].to_le_bytes();
            Rgba([red, green, blue, alpha])
        })
    }

    /// Save as an image file; the format follows the extension.
    ///
    /// # Errors
    ///
    /// Returns [`ThumbnailError::Image`] if encoding or writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ThumbnailError> {
        let path = path.as_ref();
        let rgba = self.to_rgba_image();
        match ImageFormat::from_path(path) {
            // JPEG has no alpha channel.
            Ok(ImageFormat::Jpeg) => DynamicImage::ImageRgba8(rgba).to_rgb8().save(path)?,
            _ => rgba.save(path)?,
        }
        Ok(())
    }
}

/// Output size for a `width`x`height` source scaled to `dimension` on its
/// longest side.
///
/// The longer side becomes exactly `dimension`; the other is scaled
/// proportionally and rounded. Neither side drops below 1. A degenerate
/// source maps to a `dimension`-sided square.
///
/// ```
/// use thumbgrab::fit_dimensions;
///
/// assert_eq!(fit_dimensions(1280, 720, 256), (256, 144));
/// assert_eq!(fit_dimensions(720, 1280, 256), (144, 256));
/// assert_eq!(fit_dimensions(10_000, 10, 100), (100, 1));
/// ```
pub fn fit_dimensions(width: u32, height: u32, dimension: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (dimension, dimension);
    }
    let scale = dimension as f64 / width.max(height) as f64;
    if width >= height {
        let scaled = ((height as f64) * scale).round() as u32;
        (dimension, scaled.max(1))
    } else {
        let scaled = ((width as f64) * scale).round() as u32;
        (scaled.max(1), dimension)
    }
}

/// Scale and convert `frame` into a new [`OutputImage`] whose longest side
/// is `dimension`.
///
/// # Errors
///
/// Returns [`ThumbnailError::ConversionFailure`] if the frame is empty, the
/// output buffer cannot be allocated, or the scaler fails.
pub fn convert_frame(
    frame: &VideoFrame,
    dimension: u32,
    algorithm: ScaleAlgorithm,
) -> Result<OutputImage, ThumbnailError> {
    let (width, height) = fit_dimensions(frame.width(), frame.height(), dimension);
    let mut pixels = allocate_pixels(width, height)?;
    convert_frame_into(frame, width, height, algorithm, &mut pixels)?;
    OutputImage::from_pixels(width, height, pixels)
}

/// Scale and convert `frame` into a caller-owned buffer of
/// `width * height` pixels.
///
/// # Errors
///
/// Returns [`ThumbnailError::ConversionFailure`] if the frame is empty, the
/// buffer has the wrong length, or the scaler fails.
pub fn convert_frame_into(
    frame: &VideoFrame,
    width: u32,
    height: u32,
    algorithm: ScaleAlgorithm,
    output: &mut [u32],
) -> Result<(), ThumbnailError> {
    if frame.width() == 0 || frame.height() == 0 || frame.format() == Pixel::None {
        return Err(ThumbnailError::ConversionFailure(
            "decoded frame has no picture data".to_string(),
        ));
    }
    if width == 0 || height == 0 || output.len() != pixel_count(width, height) {
        return Err(ThumbnailError::ConversionFailure(format!(
            "output buffer of {} pixels does not match {width}x{height}",
            output.len()
        )));
    }

    let mut scaler = ScalingContext::get(
        frame.format(),
        frame.width(),
        frame.height(),
        Pixel::BGRA,
        width,
        height,
        algorithm.to_flags(),
    )
    .map_err(|error| ThumbnailError::ConversionFailure(format!("scaler setup: {error}")))?;

    let mut scaled = VideoFrame::empty();
    scaler
        .run(frame, &mut scaled)
        .map_err(|error| ThumbnailError::ConversionFailure(format!("scaling: {error}")))?;

    pack_bgra_rows(&scaled, width, height, output)
}

/// Allocate a zeroed pixel buffer, reporting allocation failure as a
/// conversion error.
pub(crate) fn allocate_pixels(width: u32, height: u32) -> Result<Vec<u32>, ThumbnailError> {
    let count = pixel_count(width, height);
    let mut pixels = Vec::new();
    pixels.try_reserve_exact(count).map_err(|error| {
        ThumbnailError::ConversionFailure(format!("cannot allocate {width}x{height} image: {error}"))
    })?;
    pixels.resize(count, 0);
    Ok(pixels)
}

/// Copy a scaled `BGRA` frame into packed `u32` pixels, dropping row padding.
pub(crate) fn pack_bgra_rows(
    scaled: &VideoFrame,
    width: u32,
    height: u32,
    output: &mut [u32],
) -> Result<(), ThumbnailError> {
    let stride = scaled.stride(0);
    let row_bytes = (width as usize) * 4;
    let data = scaled.data(0);

    if stride < row_bytes || data.len() < stride * (height as usize - 1) + row_bytes {
        return Err(ThumbnailError::ConversionFailure(
            "scaled frame is smaller than requested".to_string(),
        ));
    }

    for (row, target) in output.chunks_exact_mut(width as usize).enumerate() {
        let start = row * stride;
        let source = &data[start..start + row_bytes];
        for (pixel, bytes) in target.iter_mut().zip(source.chunks_exact(4)) {
            *pixel = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }
    }
    Ok(())
}

fn pixel_count(width: u32, height: u32) -> usize {
    (width as usize) * (height as usize)
}
