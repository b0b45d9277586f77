//! Orbit camera around the tree.
//!
//! No panning. Distance and polar angle are clamped so the tree stays framed
//! and the camera never dips under the ground plane or over the apex.

use std::f32::consts::PI;

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{ensure_positive, ConfigError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Initial distance from the target.
    pub distance: f32,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Polar angle limits, radians from +Y.
    pub min_polar: f32,
    pub max_polar: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            distance: 25.0,
            fov: 45.0,
            near: 0.1,
            far: 200.0,
            min_distance: 10.0,
            max_distance: 40.0,
            min_polar: PI / 3.0,
            max_polar: PI / 1.8,
        }
    }
}

impl CameraConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("camera.fov", self.fov)?;
        ensure_positive("camera.near", self.near)?;
        ensure_positive("camera.min_distance", self.min_distance)?;
        if self.far <= self.near || self.max_distance < self.min_distance || self.max_polar < self.min_polar {
            return Err(ConfigError::NonPositive {
                field: "camera range",
                value: self.max_distance - self.min_distance,
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct OrbitCamera {
    config: CameraConfig,
    target: Vec3,
    azimuth: f32,
    polar: f32,
    distance: f32,
}

impl OrbitCamera {
    /// Starts on +Z looking at the origin.
    pub fn new(config: CameraConfig) -> Self {
        let distance = config.distance.clamp(config.min_distance, config.max_distance);
        let polar = (PI / 2.0).clamp(config.min_polar, config.max_polar);
        Self {
            config,
            target: Vec3::ZERO,
            azimuth: 0.0,
            polar,
            distance,
        }
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn polar(&self) -> f32 {
        self.polar
    }

    /// Rotate around the target. Polar motion is clamped.
    pub fn orbit(&mut self, delta_azimuth: f32, delta_polar: f32) {
        self.azimuth = (self.azimuth + delta_azimuth).rem_euclid(std::f32::consts::TAU);
        self.polar = (self.polar + delta_polar).clamp(self.config.min_polar, self.config.max_polar);
    }

    /// Scale the distance by `factor`, clamped.
    pub fn zoom(&mut self, factor: f32) {
        if factor.is_finite() && factor > 0.0 {
            self.distance = (self.distance * factor).clamp(self.config.min_distance, self.config.max_distance);
        }
    }

    pub fn position(&self) -> Vec3 {
        let (sin_p, cos_p) = self.polar.sin_cos();
        let (sin_a, cos_a) = self.azimuth.sin_cos();
        self.target + Vec3::new(sin_p * sin_a, cos_p, sin_p * cos_a) * self.distance
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.config.fov.to_radians(), aspect, self.config.near, self.config.far)
    }

    pub fn view_projection_matrix(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_camera_position() {
        let camera = OrbitCamera::new(CameraConfig::default());
        let p = camera.position();
        assert!((p - Vec3::new(0.0, 0.0, 25.0)).length() < 1e-4);
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut camera = OrbitCamera::new(CameraConfig::default());
        camera.zoom(100.0);
        assert_eq!(camera.distance(), 40.0);
        camera.zoom(0.001);
        assert_eq!(camera.distance(), 10.0);
        camera.zoom(-1.0);
        assert_eq!(camera.distance(), 10.0);
    }

    #[test]
    fn test_polar_is_clamped() {
        let mut camera = OrbitCamera::new(CameraConfig::default());
        camera.orbit(0.0, -10.0);
        assert!((camera.polar() - PI / 3.0).abs() < 1e-6);
        camera.orbit(0.0, 10.0);
        assert!((camera.polar() - PI / 1.8).abs() < 1e-6);
    }

    #[test]
    fn test_view_depth_of_origin() {
        let camera = OrbitCamera::new(CameraConfig::default());
        let depth = -camera.view_matrix().transform_point3(Vec3::ZERO).z;
        assert!((depth - 25.0).abs() < 1e-3);
    }
}
