//! Foliage particle group.
//!
//! Particle attributes are uploaded once; the blend between layouts runs per
//! vertex in `gpu/shader_foliage.wgsl`. The functions here are the same math
//! on the CPU, used for headless simulation and for testing the shader's
//! behaviour without a device.

use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{ensure_positive, ConfigError, GroupUpdateError};
use crate::layout::{LayoutParams, LayoutSet};
use crate::palette::parse_hex_color;
use crate::sampler::LayoutSampler;
use crate::transition::{ease_out_cubic, Mode, TransitionState};
use crate::visualiser::FrameContext;

/// Drift amplitude when fully scattered.
pub const DRIFT_AMPLITUDE: f32 = 2.0;
/// Eased progress above which the assembled tree starts breathing.
pub const BREATH_THRESHOLD: f32 = 0.8;
pub const BREATH_AMPLITUDE: f32 = 0.05;
/// Point size numerator: `SIZE_BASE + SIZE_RANDOM * random`.
pub const SIZE_BASE: f32 = 20.0;
pub const SIZE_RANDOM: f32 = 40.0;
/// Floor for view-space depth in size attenuation.
pub const MIN_VIEW_DEPTH: f32 = 0.1;
/// Random scalar above which a particle joins the shimmering accent subset.
pub const SPARKLE_THRESHOLD: f32 = 0.9;
pub const MAX_ALPHA: f32 = 0.8;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoliageConfig {
    pub count: usize,
    pub layout: LayoutParams,
    pub speed: f32,
    pub color_low: String,
    pub color_high: String,
    pub color_accent: String,
}

impl Default for FoliageConfig {
    fn default() -> Self {
        Self {
            count: 15_000,
            layout: LayoutParams::default(),
            speed: 1.5,
            color_low: "#0f5940".to_string(),
            color_high: "#2eff95".to_string(),
            color_accent: "#fbbf24".to_string(),
        }
    }
}

impl FoliageConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.layout.validate()?;
        ensure_positive("foliage.speed", self.speed)?;
        self.palette()?;
        Ok(())
    }

    pub fn palette(&self) -> Result<FoliagePalette, ConfigError> {
        Ok(FoliagePalette {
            low: parse_hex_color(&self.color_low)?,
            high: parse_hex_color(&self.color_high)?,
            accent: parse_hex_color(&self.color_accent)?,
        })
    }
}

/// Linear RGB colors of the foliage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FoliagePalette {
    pub low: [f32; 3],
    pub high: [f32; 3],
    pub accent: [f32; 3],
}

/// Time- and identity-driven wander, fully present at `eased = 0`, gone at 1.
pub fn drift_offset(random: f32, time: f32, eased: f32) -> Vec3 {
    Vec3::new(
        (time * 0.5 + random * 10.0).sin(),
        (time * 0.3 + random * 20.0).cos(),
        (time * 0.7 + random * 30.0).sin(),
    ) * (1.0 - eased)
        * DRIFT_AMPLITUDE
}

/// Blend of one particle between its layouts at eased progress `eased`.
pub fn blend_position(scatter: Vec3, tree: Vec3, random: f32, time: f32, eased: f32) -> Vec3 {
    let from = scatter + drift_offset(random, time, eased);
    let mut pos = from * (1.0 - eased) + tree * eased;

    if eased > BREATH_THRESHOLD {
        let breath = (time * 2.0 + pos.y).sin() * BREATH_AMPLITUDE;
        pos += pos.normalize_or_zero() * breath;
    }
    pos
}

/// Perspective-attenuated point size in pixels for view-space depth `depth`.
pub fn point_size(random: f32, depth: f32) -> f32 {
    (SIZE_RANDOM * random + SIZE_BASE) / depth.max(MIN_VIEW_DEPTH)
}

/// Shimmer phase in `[0, 1]`.
pub fn shimmer(random: f32, time: f32) -> f32 {
    (time * 3.0 + random * 10.0).sin() * 0.5 + 0.5
}

/// Base color of a particle; the sparse high-random subset twinkles toward the accent.
pub fn particle_color(random: f32, time: f32, palette: &FoliagePalette) -> [f32; 3] {
    let base = mix3(palette.low, palette.high, random);
    if random > SPARKLE_THRESHOLD {
        mix3(base, palette.accent, shimmer(random, time))
    } else {
        base
    }
}

/// Alpha of the soft round sprite at `point_coord` in `[0, 1]^2`, `None` outside the disc.
pub fn sprite_alpha(point_coord: Vec2) -> Option<f32> {
    let r = (point_coord - Vec2::splat(0.5)).length();
    if r > 0.5 {
        return None;
    }
    let glow = 1.0 - r * 2.0;
    Some(glow * glow * MAX_ALPHA)
}

fn mix3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        a[0] * (1.0 - t) + b[0] * t,
        a[1] * (1.0 - t) + b[1] * t,
        a[2] * (1.0 - t) + b[2] * t,
    ]
}

/// Per-particle static attributes, uploaded once.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuFoliageInstance {
    pub scatter_position: [f32; 3],
    pub random: f32,
    pub tree_position: [f32; 3],
    pub _padding: f32,
}

impl GpuFoliageInstance {
    /// Slot 1 layout; slot 0 carries the quad corner.
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<GpuFoliageInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                // scatter_position: vec3<f32>
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // random: f32
                wgpu::VertexAttribute {
                    offset: 12,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32,
                },
                // tree_position: vec3<f32>
                wgpu::VertexAttribute {
                    offset: 16,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Uniforms for `shader_foliage.wgsl`. 256 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FoliageUniforms {
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    pub color_low: [f32; 4],
    pub color_high: [f32; 4],
    pub color_accent: [f32; 4],
    pub time: f32,
    pub eased_progress: f32,
    pub viewport: [f32; 2],
}

/// CPU evaluation of one particle for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FoliageSample {
    pub position: Vec3,
    pub size: f32,
    pub color: [f32; 3],
}

/// The foliage particle group.
pub struct FoliageGroup {
    layout: LayoutSet,
    transition: TransitionState,
    palette: FoliagePalette,
    time: f32,
}

impl FoliageGroup {
    pub fn new<S: LayoutSampler + ?Sized>(
        config: &FoliageConfig,
        initial: Mode,
        sampler: &mut S,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let layout = LayoutSet::generate(config.count, &config.layout, sampler)?;
        let transition = TransitionState::new(initial, config.speed)?;
        log::info!("Foliage group created: {} particles", layout.len());

        Ok(Self {
            layout,
            transition,
            palette: config.palette()?,
            time: 0.0,
        })
    }

    pub fn layout(&self) -> &LayoutSet {
        &self.layout
    }

    pub fn transition(&self) -> &TransitionState {
        &self.transition
    }

    pub fn palette(&self) -> &FoliagePalette {
        &self.palette
    }

    pub fn len(&self) -> usize {
        self.layout.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layout.is_empty()
    }

    pub fn eased_progress(&self) -> f32 {
        ease_out_cubic(self.transition.progress())
    }

    /// Advance progress. All per-vertex work happens later, on the GPU or in `evaluate_batch`.
    pub fn update(&mut self, ctx: &FrameContext) -> Result<(), GroupUpdateError> {
        let next = self.transition.stepped(ctx.delta, ctx.mode);
        if !next.progress().is_finite() {
            return Err(GroupUpdateError::NonFiniteTransform {
                group: "foliage".to_string(),
                index: 0,
            });
        }
        self.transition = next;
        self.time = ctx.elapsed;
        Ok(())
    }

    /// Static attribute buffer contents.
    pub fn instance_data(&self) -> Vec<GpuFoliageInstance> {
        (0..self.layout.len())
            .map(|i| GpuFoliageInstance {
                scatter_position: self.layout.scatter_position(i).to_array(),
                random: self.layout.random(i),
                tree_position: self.layout.tree_position(i).to_array(),
                _padding: 0.0,
            })
            .collect()
    }

    pub fn uniforms(&self, view: Mat4, proj: Mat4, model: Mat4, viewport: [f32; 2]) -> FoliageUniforms {
        let rgba = |c: [f32; 3]| [c[0], c[1], c[2], 1.0];
        FoliageUniforms {
            view: view.to_cols_array_2d(),
            proj: proj.to_cols_array_2d(),
            model: model.to_cols_array_2d(),
            color_low: rgba(self.palette.low),
            color_high: rgba(self.palette.high),
            color_accent: rgba(self.palette.accent),
            time: self.time,
            eased_progress: self.eased_progress(),
            viewport,
        }
    }

    /// Evaluate every particle on the CPU, in index order, into `out`.
    ///
    /// `model_view` maps layout space to view space; its depth drives size attenuation.
    pub fn evaluate_batch(&self, model_view: Mat4, out: &mut Vec<FoliageSample>) {
        let eased = self.eased_progress();
        out.clear();
        out.reserve(self.layout.len());

        for i in 0..self.layout.len() {
            let random = self.layout.random(i);
            let position = blend_position(
                self.layout.scatter_position(i),
                self.layout.tree_position(i),
                random,
                self.time,
                eased,
            );
            let depth = -model_view.transform_point3(position).z;
            out.push(FoliageSample {
                position,
                size: point_size(random, depth),
                color: particle_color(random, self.time, &self.palette),
            });
        }
    }
}
