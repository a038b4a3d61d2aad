// src/rendering_lib/settings.rs

/// Tunables for the rendering context and its strategies.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RendererSettings {
    pub clear_color: [f32; 4],
    pub atlas: AtlasSettings,
    pub volume: VolumeViewSettings,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            clear_color: [0.05, 0.05, 0.1, 1.0],
            atlas: AtlasSettings::default(),
            volume: VolumeViewSettings::default(),
        }
    }
}

/// The visible layer window baked into the pseudo-3D atlas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AtlasSettings {
    /// Upper bound on layers tiled into the atlas; capped by the volume depth.
    pub visible_layers: u32,
    /// Alpha given to every atlas texel.
    pub slice_alpha: u8,
}

impl Default for AtlasSettings {
    fn default() -> Self {
        Self { visible_layers: 32, slice_alpha: 128 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VolumeViewSettings {
    pub fov_y_deg: f32,
    pub znear: f32,
    pub zfar: f32,
    pub camera_distance: f32,
    /// Radians the texture-space rotation advances per rendered frame.
    pub rotation_per_frame: f32,
}

impl Default for VolumeViewSettings {
    fn default() -> Self {
        Self { fov_y_deg: 45.0, znear: 0.1, zfar: 64.0, camera_distance: 3.5, rotation_per_frame: 0.01 }
    }
}
