//! Handing finished thumbnails to a host bitmap type.

use image::RgbaImage;

use crate::convert::OutputImage;
use crate::error::ThumbnailError;

/// Builds a host bitmap object from a finished thumbnail.
///
/// The pixels are `0xAARRGGBB` words, which is what Android's
/// `Bitmap.createBitmap(int[], w, h, ARGB_8888)` takes directly. Desktop
/// callers can use [`RgbaImageFactory`].
pub trait BitmapFactory {
    /// The bitmap type produced.
    type Bitmap;

    /// Wrap `image` in a host bitmap.
    ///
    /// # Errors
    ///
    /// Implementations report host-side failures as [`ThumbnailError`]s.
    fn create_bitmap(&self, image: OutputImage) -> Result<Self::Bitmap, ThumbnailError>;
}

/// Produces [`image::RgbaImage`] buffers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RgbaImageFactory;

impl BitmapFactory for RgbaImageFactory {
    type Bitmap = RgbaImage;

    fn create_bitmap(&self, image: OutputImage) -> Result<RgbaImage, ThumbnailError> {
        Ok(image.to_rgba_image())
    }
}
