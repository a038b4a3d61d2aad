// src/rendering_lib/camera.rs

use glam::{Mat4, Vec3};

use super::settings::VolumeViewSettings;

/// Fixed perspective camera looking at the volume's centre, plus the yaw
/// applied to texture coordinates so cross-sections cut the volume at a
/// changing angle.
#[derive(Debug, Clone)]
pub struct Camera {
    pub fov_y_rad: f32,
    pub znear: f32,
    pub zfar: f32,
    pub distance: f32,
    yaw: f32,
}

impl Camera {
    pub fn new(settings: &VolumeViewSettings) -> Self {
        Self {
            fov_y_rad: settings.fov_y_deg.to_radians(),
            znear: settings.znear,
            zfar: settings.zfar,
            distance: settings.camera_distance,
            yaw: 0.0,
        }
    }

    pub fn projection_matrix(&self, viewport: (u32, u32)) -> Mat4 {
        let (width, height) = viewport;
        let aspect = if height == 0 { 1.0 } else { width as f32 / height as f32 };
        Mat4::perspective_rh(self.fov_y_rad, aspect, self.znear, self.zfar)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(Vec3::new(0.0, 0.0, self.distance), Vec3::ZERO, Vec3::Y)
    }

    /// Rotation about the texture's vertical centre line.
    pub fn texture_matrix(&self) -> Mat4 {
        let centre = Vec3::new(0.5, 0.5, 0.5);
        Mat4::from_translation(centre) * Mat4::from_rotation_y(self.yaw) * Mat4::from_translation(-centre)
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn rotate(&mut self, radians: f32) {
        self.yaw = (self.yaw + radians) % std::f32::consts::TAU;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_matrix_keeps_centre_fixed() {
        let mut camera = Camera::new(&VolumeViewSettings::default());
        camera.rotate(0.7);
        let centre = camera.texture_matrix().transform_point3(Vec3::splat(0.5));
        assert!((centre - Vec3::splat(0.5)).length() < 1e-5);
    }

    #[test]
    fn unrotated_texture_matrix_is_identity() {
        let camera = Camera::new(&VolumeViewSettings::default());
        let p = Vec3::new(0.1, 0.9, 0.3);
        assert!((camera.texture_matrix().transform_point3(p) - p).length() < 1e-5);
    }
}
