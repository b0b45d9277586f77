//! Instanced ornament groups.
//!
//! Every frame each group recomputes the full transform of every instance on
//! the CPU, stages the results, and publishes the staged buffer once when the
//! whole pass succeeded. There is no per-instance dirty tracking.

use std::f32::consts::{PI, TAU};

use glam::{EulerRot, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{ensure_positive, ConfigError, GroupUpdateError};
use crate::layout::{LayoutParams, LayoutSet};
use crate::palette::parse_hex_color;
use crate::sampler::LayoutSampler;
use crate::transition::{smoothing_step, Mode, TransitionState};
use crate::visualiser::FrameContext;

/// Vertical bob of scattered ornaments.
pub const FLOAT_AMPLITUDE: f32 = 0.5;
/// Phase spread of the bob across instances.
pub const FLOAT_PHASE_SCALE: f32 = 10.0;
/// Spin of scattered ornaments, radians per second.
pub const SPIN_RATE: f32 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrnamentShape {
    Box,
    Sphere,
}

impl OrnamentShape {
    /// Boxes settle slower than spheres.
    pub fn default_speed(self) -> f32 {
        match self {
            OrnamentShape::Box => 1.0,
            OrnamentShape::Sphere => 1.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrnamentConfig {
    pub label: String,
    pub count: usize,
    pub shape: OrnamentShape,
    pub color: String,
    pub scale_range: [f32; 2],
    /// Smoothing speed; defaults by shape when absent.
    pub speed: Option<f32>,
    pub layout: LayoutParams,
}

impl Default for OrnamentConfig {
    fn default() -> Self {
        Self {
            label: "gold".to_string(),
            count: 200,
            shape: OrnamentShape::Box,
            color: "#d4af37".to_string(),
            scale_range: [0.2, 0.4],
            speed: None,
            // Tighter tree, wider scatter than the foliage.
            layout: LayoutParams::new(20.0, 11.0, 4.5),
        }
    }
}

impl OrnamentConfig {
    pub fn speed(&self) -> f32 {
        self.speed.unwrap_or_else(|| self.shape.default_speed())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.layout.validate()?;
        ensure_positive("ornament.speed", self.speed())?;
        let [min, max] = self.scale_range;
        if !(min.is_finite() && max.is_finite() && min >= 0.0 && min <= max) {
            return Err(ConfigError::InvalidScaleRange { min, max });
        }
        parse_hex_color(&self.color)?;
        Ok(())
    }

    /// The three box groups of the default scene.
    pub fn default_groups() -> Vec<OrnamentConfig> {
        vec![
            OrnamentConfig::default(),
            OrnamentConfig {
                label: "red".to_string(),
                count: 100,
                color: "#ef4444".to_string(),
                ..Default::default()
            },
            OrnamentConfig {
                label: "green".to_string(),
                count: 50,
                color: "#10b981".to_string(),
                scale_range: [0.4, 0.7],
                ..Default::default()
            },
        ]
    }
}

/// Rigid transform of one instance for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InstanceTransform {
    pub position: Vec3,
    /// Euler angles, applied X then Y then Z.
    pub rotation: Vec3,
    pub scale: f32,
}

impl InstanceTransform {
    pub fn to_matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(EulerRot::XYZ, self.rotation.x, self.rotation.y, self.rotation.z);
        Mat4::from_scale_rotation_translation(Vec3::splat(self.scale), rotation, self.position)
    }
}

/// GPU instance record: world matrix plus color, `color[3]` is emissive strength.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuOrnamentInstance {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl GpuOrnamentInstance {
    pub fn new(model: Mat4, color: [f32; 3], emissive: f32) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            color: [color[0], color[1], color[2], emissive],
        }
    }

    /// Returns the vertex buffer layout for instanced rendering.
    /// This should be used as the second vertex buffer (slot 1) with step_mode::Instance.
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<GpuOrnamentInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                // model matrix columns
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 3, // After mesh vertex attributes (0, 1, 2)
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: 16,
                    shader_location: 4,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: 32,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: 48,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                // color: vec4<f32>
                wgpu::VertexAttribute {
                    offset: 64,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

/// Wrap an angle into `(-PI, PI]`.
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped == -PI {
        PI
    } else {
        wrapped
    }
}

/// Advance the group spin accumulator.
///
/// The spin rate is damped by `1 - progress`. While assembling, the
/// accumulator is also smoothed toward zero at the group's speed, so it
/// reaches zero together with `progress` reaching one.
pub fn spin_step(spin: f32, delta: f32, transition: &TransitionState) -> f32 {
    let delta = delta.max(0.0);
    let mut next = wrap_angle(spin + delta * SPIN_RATE * (1.0 - transition.progress()));
    if transition.target() >= 1.0 {
        next = smoothing_step(next, 0.0, delta, transition.speed());
    }
    next
}

/// One ornament group with its own layout, transition and instance buffer.
pub struct OrnamentGroup {
    label: String,
    shape: OrnamentShape,
    color: [f32; 3],
    layout: LayoutSet,
    scales: Vec<f32>,
    transition: TransitionState,
    spin: f32,
    time: f32,
    instances: Vec<GpuOrnamentInstance>,
    staging: Vec<GpuOrnamentInstance>,
    pending_upload: bool,
    frames_published: u64,
}

impl OrnamentGroup {
    pub fn new<S: LayoutSampler + ?Sized>(
        config: &OrnamentConfig,
        initial: Mode,
        sampler: &mut S,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let layout = LayoutSet::generate(config.count, &config.layout, sampler)?;
        let [min, max] = config.scale_range;
        let scales = layout.randoms().iter().map(|r| min + r * (max - min)).collect();

        let mut group = Self {
            label: config.label.clone(),
            shape: config.shape,
            color: parse_hex_color(&config.color)?,
            layout,
            scales,
            transition: TransitionState::new(initial, config.speed())?,
            spin: 0.0,
            time: 0.0,
            instances: Vec::with_capacity(config.count),
            staging: Vec::with_capacity(config.count),
            pending_upload: true,
            frames_published: 0,
        };
        let transition = group.transition;
        group.instances = group.compute_pass(0.0, &transition, 0.0).unwrap_or_default();

        log::info!(
            "Ornament group '{}' created: {} {:?} instances",
            group.label,
            group.layout.len(),
            group.shape
        );
        Ok(group)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn shape(&self) -> OrnamentShape {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.layout.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layout.is_empty()
    }

    pub fn layout(&self) -> &LayoutSet {
        &self.layout
    }

    pub fn transition(&self) -> &TransitionState {
        &self.transition
    }

    pub fn spin(&self) -> f32 {
        self.spin
    }

    pub fn scale(&self, index: usize) -> f32 {
        self.scales[index]
    }

    /// Number of completed publish passes.
    pub fn frames_published(&self) -> u64 {
        self.frames_published
    }

    /// Transform of instance `index` at the current committed state.
    pub fn instance_transform(&self, index: usize) -> InstanceTransform {
        self.transform_at(index, self.time, self.transition.progress(), self.spin)
    }

    fn transform_at(&self, index: usize, time: f32, progress: f32, spin: f32) -> InstanceTransform {
        let random = self.layout.random(index);

        let mut scatter = self.layout.scatter_position(index);
        scatter.y += (time + random * FLOAT_PHASE_SCALE).sin() * FLOAT_AMPLITUDE;
        let tree = self.layout.tree_position(index);
        let position = scatter * (1.0 - progress) + tree * progress;

        let angle = random * TAU + spin;

        InstanceTransform {
            position,
            rotation: Vec3::splat(angle),
            scale: self.scales[index],
        }
    }

    /// Compute every instance into the staging buffer; `None` if any is non-finite.
    fn compute_pass(
        &mut self,
        time: f32,
        transition: &TransitionState,
        spin: f32,
    ) -> Option<Vec<GpuOrnamentInstance>> {
        let mut staging = std::mem::take(&mut self.staging);
        staging.clear();
        for i in 0..self.layout.len() {
            let model = self.transform_at(i, time, transition.progress(), spin).to_matrix();
            if !model.is_finite() {
                self.staging = staging;
                return None;
            }
            staging.push(GpuOrnamentInstance::new(model, self.color, 0.0));
        }
        Some(staging)
    }

    /// Recompute and publish all instances for this frame.
    ///
    /// On failure nothing is committed: the previously published buffer and
    /// state stay in place.
    pub fn update(&mut self, ctx: &FrameContext) -> Result<(), GroupUpdateError> {
        let transition = self.transition.stepped(ctx.delta, ctx.mode);
        let spin = spin_step(self.spin, ctx.delta, &transition);

        let staged = match self.compute_pass(ctx.elapsed, &transition, spin) {
            Some(staged) => staged,
            None => {
                let index = (0..self.layout.len())
                    .find(|&i| !self.transform_at(i, ctx.elapsed, transition.progress(), spin).to_matrix().is_finite())
                    .unwrap_or(0);
                return Err(GroupUpdateError::NonFiniteTransform {
                    group: self.label.clone(),
                    index,
                });
            }
        };

        self.transition = transition;
        self.spin = spin;
        self.time = ctx.elapsed;
        self.staging = std::mem::replace(&mut self.instances, staged);
        self.pending_upload = true;
        self.frames_published += 1;
        Ok(())
    }

    /// Published instance buffer.
    pub fn instances(&self) -> &[GpuOrnamentInstance] {
        &self.instances
    }

    /// The published buffer if it changed since the last call.
    pub fn take_upload(&mut self) -> Option<&[GpuOrnamentInstance]> {
        if !self.pending_upload {
            return None;
        }
        self.pending_upload = false;
        Some(&self.instances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::{RandomSampler, ScriptedSampler};

    fn config(count: usize) -> OrnamentConfig {
        OrnamentConfig {
            count,
            ..Default::default()
        }
    }

    fn frame(mode: Mode, elapsed: f32, delta: f32) -> FrameContext {
        FrameContext { mode, elapsed, delta }
    }

    #[test]
    fn test_scale_derived_from_random() {
        let mut sampler = ScriptedSampler::new(vec![Vec3::ZERO], vec![Vec3::ZERO], vec![0.0, 0.5, 1.0]);
        let group = OrnamentGroup::new(&config(3), Mode::Scattered, &mut sampler).unwrap();
        assert!((group.scale(0) - 0.2).abs() < 1e-6);
        assert!((group.scale(1) - 0.3).abs() < 1e-6);
        assert!((group.scale(2) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_bad_scale_range() {
        let bad = OrnamentConfig {
            scale_range: [0.5, 0.2],
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(ConfigError::InvalidScaleRange { .. })));
    }

    #[test]
    fn test_default_speed_by_shape() {
        let sphere = OrnamentConfig {
            shape: OrnamentShape::Sphere,
            ..Default::default()
        };
        assert_eq!(sphere.speed(), 1.5);
        assert_eq!(OrnamentConfig::default().speed(), 1.0);
    }

    #[test]
    fn test_every_frame_publishes_once() {
        let mut group = OrnamentGroup::new(&config(20), Mode::Scattered, &mut RandomSampler::seeded(4)).unwrap();
        assert!(group.take_upload().is_some());
        assert!(group.take_upload().is_none());

        for i in 1..=5 {
            group.update(&frame(Mode::Scattered, i as f32 * 0.016, 0.016)).unwrap();
            assert_eq!(group.frames_published(), i);
            assert_eq!(group.take_upload().map(|b| b.len()), Some(20));
            assert!(group.take_upload().is_none());
        }
    }

    #[test]
    fn test_scattered_floats_vertically() {
        let scatter = Vec3::new(2.0, 1.0, -3.0);
        let mut sampler = ScriptedSampler::new(vec![scatter], vec![Vec3::ZERO], vec![0.0]);
        let mut group = OrnamentGroup::new(&config(1), Mode::Scattered, &mut sampler).unwrap();
        group.update(&frame(Mode::Scattered, 1.0, 0.016)).unwrap();
        let t = group.instance_transform(0);
        assert_eq!(t.position.x, scatter.x);
        assert_eq!(t.position.z, scatter.z);
        assert!((t.position.y - (scatter.y + 1.0f32.sin() * FLOAT_AMPLITUDE)).abs() < 1e-6);
    }

    #[test]
    fn test_spin_fades_while_assembled() {
        let mut group = OrnamentGroup::new(&config(5), Mode::Scattered, &mut RandomSampler::seeded(6)).unwrap();
        let mut elapsed = 0.0;
        for _ in 0..60 {
            elapsed += 0.05;
            group.update(&frame(Mode::Scattered, elapsed, 0.05)).unwrap();
        }
        assert!(group.spin().abs() > 0.1);

        for _ in 0..400 {
            elapsed += 0.05;
            group.update(&frame(Mode::Assembled, elapsed, 0.05)).unwrap();
        }
        assert!(group.spin().abs() < 1e-4);
        let t = group.instance_transform(2);
        let settled = group.layout().random(2) * TAU;
        assert!((t.rotation.x - settled).abs() < 1e-3);
    }

    #[test]
    fn test_spin_is_continuous_across_retarget() {
        let mut group = OrnamentGroup::new(&config(1), Mode::Scattered, &mut RandomSampler::seeded(12)).unwrap();
        let mut elapsed = 0.0;
        let mut prev = group.instance_transform(0).rotation.x;
        for i in 0..200 {
            elapsed += 0.02;
            let mode = if i < 100 { Mode::Scattered } else { Mode::Assembled };
            group.update(&frame(mode, elapsed, 0.02)).unwrap();
            let angle = group.instance_transform(0).rotation.x;
            let jump = wrap_angle(angle - prev).abs();
            assert!(jump < 0.05, "rotation jumped by {} at frame {}", jump, i);
            prev = angle;
        }
    }

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle(3.0 * PI) - PI).abs() < 1e-5);
        assert!((wrap_angle(-0.5) + 0.5).abs() < 1e-6);
        assert!((wrap_angle(TAU + 0.25) - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_matrix_translation_is_position() {
        let t = InstanceTransform {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Vec3::splat(0.7),
            scale: 0.3,
        };
        let m = t.to_matrix();
        assert_eq!(m.w_axis.truncate(), t.position);
        let (scale, _, _) = m.to_scale_rotation_translation();
        assert!((scale - Vec3::splat(0.3)).length() < 1e-5);
    }

    #[test]
    fn test_zero_count_group() {
        let mut group = OrnamentGroup::new(&config(0), Mode::Scattered, &mut RandomSampler::seeded(1)).unwrap();
        group.update(&frame(Mode::Assembled, 0.1, 0.1)).unwrap();
        assert!(group.instances().is_empty());
    }

    #[test]
    fn test_instance_stride() {
        assert_eq!(std::mem::size_of::<GpuOrnamentInstance>(), 80);
    }
}
