// src/volume_lib/config.rs

use super::error::ConfigError;
use super::volume::Volume;

/// Individual fields of a [`Configuration`], used to describe which changes
/// force a renderer to recompute its cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConfigField {
    Layer,
    WindowMin,
    WindowWidth,
}

impl ConfigField {
    pub const ALL: [ConfigField; 3] = [ConfigField::Layer, ConfigField::WindowMin, ConfigField::WindowWidth];
}

/// The configuration fields whose change invalidates a strategy's cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TriggerSet(&'static [ConfigField]);

impl TriggerSet {
    /// Only the intensity window; the layer is read at render time.
    pub const WINDOW: TriggerSet = TriggerSet(&[ConfigField::WindowMin, ConfigField::WindowWidth]);
    /// Window and layer; the uploaded data depends on the selected layer.
    pub const WINDOW_AND_LAYER: TriggerSet =
        TriggerSet(&[ConfigField::WindowMin, ConfigField::WindowWidth, ConfigField::Layer]);

    pub fn contains(&self, field: ConfigField) -> bool {
        self.0.contains(&field)
    }

    pub fn fields(&self) -> &'static [ConfigField] {
        self.0
    }
}

/// Snapshot of the caller's view settings. Passed by value so a renderer's
/// stored copy can never be changed behind its back.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Configuration {
    pub layer: u32,
    pub window_min: f32,
    pub window_width: f32,
}

impl Default for Configuration {
    fn default() -> Self {
        Self { layer: 0, window_min: 0.0, window_width: 128.0 }
    }
}

impl Configuration {
    pub fn new(layer: u32, window_min: f32, window_width: f32) -> Self {
        Self { layer, window_min, window_width }
    }

    /// Builds the window from its bounds instead of its width.
    pub fn from_window_bounds(layer: u32, window_min: f32, window_max: f32) -> Self {
        Self::new(layer, window_min, window_max - window_min)
    }

    pub fn window_max(&self) -> f32 {
        self.window_min + self.window_width
    }

    pub fn differs_in(&self, other: &Configuration, field: ConfigField) -> bool {
        match field {
            ConfigField::Layer => self.layer != other.layer,
            ConfigField::WindowMin => self.window_min != other.window_min,
            ConfigField::WindowWidth => self.window_width != other.window_width,
        }
    }

    pub fn changed_fields(&self, other: &Configuration) -> Vec<ConfigField> {
        ConfigField::ALL.into_iter().filter(|field| self.differs_in(other, *field)).collect()
    }

    /// Checks the window and the layer against `volume`.
    pub fn validate(&self, volume: &Volume) -> Result<(), ConfigError> {
        if volume.is_empty() {
            return Err(ConfigError::EmptyVolume);
        }
        if !self.window_min.is_finite() || !self.window_width.is_finite() || self.window_width <= 0.0 {
            return Err(ConfigError::InvalidWindow { min: self.window_min, width: self.window_width });
        }
        let depth = volume.dims().z;
        if self.layer >= depth {
            return Err(ConfigError::LayerOutOfRange { layer: self.layer, depth });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume_lib::volume::Dimensions;

    fn volume(z: u32) -> Volume {
        Volume::new(Dimensions::new(1, 1, z), vec![0; z as usize]).unwrap()
    }

    #[test]
    fn window_bounds_round_trip() {
        let config = Configuration::from_window_bounds(2, -100.0, 300.0);
        assert_eq!(config.window_width, 400.0);
        assert_eq!(config.window_max(), 300.0);
    }

    #[test]
    fn reports_changed_fields() {
        let a = Configuration::new(0, 10.0, 50.0);
        let b = Configuration::new(3, 10.0, 60.0);
        assert_eq!(a.changed_fields(&b), vec![ConfigField::Layer, ConfigField::WindowWidth]);
        assert!(a.changed_fields(&a).is_empty());
    }

    #[test]
    fn rejects_zero_and_negative_width() {
        let v = volume(2);
        for width in [0.0, -5.0, f32::NAN, f32::INFINITY] {
            let err = Configuration::new(0, 0.0, width).validate(&v).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidWindow { .. }), "width {width}");
        }
    }

    #[test]
    fn rejects_layer_past_depth() {
        let err = Configuration::new(4, 0.0, 1.0).validate(&volume(4)).unwrap_err();
        assert_eq!(err, ConfigError::LayerOutOfRange { layer: 4, depth: 4 });
        assert!(Configuration::new(3, 0.0, 1.0).validate(&volume(4)).is_ok());
    }

    #[test]
    fn trigger_sets() {
        assert!(!TriggerSet::WINDOW.contains(ConfigField::Layer));
        assert!(TriggerSet::WINDOW_AND_LAYER.contains(ConfigField::Layer));
        assert!(TriggerSet::WINDOW.contains(ConfigField::WindowWidth));
    }
}
