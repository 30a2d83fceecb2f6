//! Thumbnailer configuration.
//!
//! [`ThumbnailerConfig`] is a builder for the settings that outlive a single
//! call: how many extractions may run at once, which hardware device type
//! to try, and per-tier overrides of the frame-acceptance policy.
//!
//! # Example
//!
//! ```
//! use thumbgrab::{FrameTolerances, Quality, ThumbnailerConfig};
//!
//! let config = ThumbnailerConfig::new()
//!     .with_pool_size(2)
//!     .with_tolerances(Quality::Hq, FrameTolerances { skip: 0.25, accept: 0.25 })
//!     .with_frame_budget(Quality::Fast, 50);
//!
//! assert_eq!(config.pool_size(), 2);
//! assert_eq!(config.profile_for(Quality::Fast).frame_budget, 50);
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};

use crate::hardware::HardwareDeviceType;
use crate::quality::{FrameTolerances, Quality, QualityProfile};

/// Upper bound for the frame budget override.
pub const MAX_FRAME_BUDGET: u32 = 10_000;

/// Long-lived settings for a [`Thumbnailer`](crate::Thumbnailer).
///
/// A default config serializes all extractions, uses the platform's
/// preferred hardware device and the stock tier profiles.
#[derive(Clone, PartialEq)]
pub struct ThumbnailerConfig {
    pub(crate) pool_size: usize,
    pub(crate) hardware_device: HardwareDeviceType,
    tolerances: [Option<FrameTolerances>; 3],
    frame_budgets: [Option<u32>; 3],
}

impl Debug for ThumbnailerConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ThumbnailerConfig")
            .field("pool_size", &self.pool_size)
            .field("hardware_device", &self.hardware_device.name())
            .field(
                "overridden_tiers",
                &Quality::ALL
                    .iter()
                    .filter(|quality| self.is_overridden(**quality))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Default for ThumbnailerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ThumbnailerConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self {
            pool_size: 1,
            hardware_device: HardwareDeviceType::platform_default(),
            tolerances: [None; 3],
            frame_budgets: [None; 3],
        }
    }

    /// Set how many extractions may run at once. Clamped to a minimum of 1.
    ///
    /// Sizes above 1 share the cached hardware device between concurrent
    /// decode sessions.
    #[must_use]
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size.max(1);
        self
    }

    /// Choose the hardware device type used for hardware requests.
    #[must_use]
    pub fn with_hardware_device(mut self, device_type: HardwareDeviceType) -> Self {
        self.hardware_device = device_type;
        self
    }

    /// Override the acceptance windows of one tier.
    ///
    /// Negative or non-finite windows are replaced by zero, and `accept` is
    /// clamped to at most `skip` so accepted frames are never also skipped.
    #[must_use]
    pub fn with_tolerances(mut self, quality: Quality, tolerances: FrameTolerances) -> Self {
        let skip = sanitize_window(tolerances.skip);
        let accept = sanitize_window(tolerances.accept).min(skip);
        self.tolerances[tier_index(quality)] = Some(FrameTolerances { skip, accept });
        self
    }

    /// Override the frame budget of one tier. Clamped to `1..=MAX_FRAME_BUDGET`.
    #[must_use]
    pub fn with_frame_budget(mut self, quality: Quality, budget: u32) -> Self {
        self.frame_budgets[tier_index(quality)] = Some(budget.clamp(1, MAX_FRAME_BUDGET));
        self
    }

    /// Configured pool size.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Configured hardware device type.
    pub fn hardware_device(&self) -> HardwareDeviceType {
        self.hardware_device
    }

    /// The tier profile with this config's overrides applied.
    pub fn profile_for(&self, quality: Quality) -> QualityProfile {
        let index = tier_index(quality);
        let mut profile = *quality.profile();
        if let Some(tolerances) = self.tolerances[index] {
            profile.tolerances = tolerances;
        }
        if let Some(budget) = self.frame_budgets[index] {
            profile.frame_budget = budget;
        }
        profile
    }

    fn is_overridden(&self, quality: Quality) -> bool {
        let index = tier_index(quality);
        self.tolerances[index].is_some() || self.frame_budgets[index].is_some()
    }
}

fn tier_index(quality: Quality) -> usize {
    quality.as_raw() as usize
}

fn sanitize_window(seconds: f64) -> f64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        0.0
    }
}
