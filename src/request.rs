//! Per-call extraction parameters.

use crate::error::ThumbnailError;
use crate::quality::Quality;

/// Largest accepted output dimension, in pixels.
pub const MAX_DIMENSION: u32 = 4096;

/// A validated extraction request.
///
/// Construct with [`DecodeRequest::new`]; an instance always satisfies
/// `position >= 0` (finite) and `1 <= dimension <= MAX_DIMENSION`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeRequest {
    position: f64,
    dimension: u32,
    use_hardware: bool,
    quality: Quality,
}

impl DecodeRequest {
    /// Validate and build a request.
    ///
    /// # Errors
    ///
    /// Returns [`ThumbnailError::InvalidParameter`] if `dimension` is outside
    /// `1..=4096` or `position` is negative or not finite.
    pub fn new(
        position: f64,
        dimension: u32,
        use_hardware: bool,
        quality: Quality,
    ) -> Result<Self, ThumbnailError> {
        if dimension == 0 || dimension > MAX_DIMENSION {
            return Err(ThumbnailError::InvalidParameter(format!(
                "dimension {dimension} must be within 1-{MAX_DIMENSION}"
            )));
        }
        if !position.is_finite() || position < 0.0 {
            return Err(ThumbnailError::InvalidParameter(format!(
                "position {position} must be a finite value >= 0"
            )));
        }

        Ok(Self {
            position,
            dimension,
            use_hardware,
            quality,
        })
    }

    /// Build a request from the raw values a host binding receives.
    ///
    /// `dimension` arrives signed and `quality` as an integer tier; the
    /// tier is coerced by [`Quality::from_raw`].
    ///
    /// # Errors
    ///
    /// Same as [`new`](DecodeRequest::new).
    pub fn from_raw(
        position: f64,
        dimension: i32,
        use_hardware: bool,
        quality: i32,
    ) -> Result<Self, ThumbnailError> {
        let dimension = u32::try_from(dimension).map_err(|_| {
            ThumbnailError::InvalidParameter(format!(
                "dimension {dimension} must be within 1-{MAX_DIMENSION}"
            ))
        })?;
        Self::new(position, dimension, use_hardware, Quality::from_raw(quality))
    }

    /// Requested position in seconds.
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Requested length of the longest output side.
    pub fn dimension(&self) -> u32 {
        self.dimension
    }

    /// Whether hardware decoding was requested.
    pub fn use_hardware(&self) -> bool {
        self.use_hardware
    }

    /// Quality tier.
    pub fn quality(&self) -> Quality {
        self.quality
    }
}
