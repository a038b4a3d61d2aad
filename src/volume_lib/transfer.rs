// src/volume_lib/transfer.rs

use super::config::Configuration;
use super::error::ConfigError;

/// Linear window mapping raw intensities to 8-bit shades.
///
/// `[min, min + width)` is stretched over `[0, 255]`; anything outside is
/// clamped. The width is validated on construction, so [`map`](Self::map)
/// never divides by zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransferFunction {
    min: f32,
    width: f32,
}

impl TransferFunction {
    pub fn new(min: f32, width: f32) -> Result<Self, ConfigError> {
        if !min.is_finite() || !width.is_finite() || width <= 0.0 {
            return Err(ConfigError::InvalidWindow { min, width });
        }
        Ok(Self { min, width })
    }

    pub fn from_config(config: &Configuration) -> Result<Self, ConfigError> {
        Self::new(config.window_min, config.window_width)
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    #[inline]
    pub fn map(&self, sample: i16) -> u8 {
        map_sample(sample, self.min, self.width)
    }
}

/// `clamp(round((sample - min) * 255 / width), 0, 255)`.
///
/// `width` must be positive; [`TransferFunction::new`] is the checked entry point.
#[inline]
pub fn map_sample(sample: i16, min: f32, width: f32) -> u8 {
    debug_assert!(width > 0.0);
    let shade = ((sample as f32 - min) * 255.0 / width).round();
    shade.clamp(0.0, 255.0) as u8
}
