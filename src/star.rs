//! Star topper: shown only while assembled, grows and shrinks smoothly.

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{ensure_positive, ConfigError};
use crate::ornament::GpuOrnamentInstance;
use crate::palette::parse_hex_color;
use crate::transition::{Mode, TransitionState};
use crate::visualiser::FrameContext;

pub const SPIN_RATE: f32 = 0.5;
pub const PULSE_RATE: f32 = 3.0;
pub const BOB_RATE: f32 = 0.5;
pub const BOB_AMPLITUDE: f32 = 0.02;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StarConfig {
    pub enabled: bool,
    pub height: f32,
    pub color: String,
    /// Scale smoothing speed.
    pub speed: f32,
}

impl Default for StarConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            height: 6.2,
            color: "#fbbf24".to_string(),
            speed: 6.0,
        }
    }
}

impl StarConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("star.speed", self.speed)?;
        parse_hex_color(&self.color)?;
        Ok(())
    }
}

pub struct StarTopper {
    height: f32,
    color: [f32; 3],
    scale: TransitionState,
    time: f32,
}

impl StarTopper {
    pub fn new(config: &StarConfig, initial: Mode) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            height: config.height,
            color: parse_hex_color(&config.color)?,
            scale: TransitionState::new(initial, config.speed)?,
            time: 0.0,
        })
    }

    pub fn scale(&self) -> f32 {
        self.scale.progress()
    }

    pub fn is_visible(&self) -> bool {
        self.scale() > 0.0
    }

    /// Emissive strength, `0.5 +/- 0.3`.
    pub fn emissive(&self) -> f32 {
        0.5 + (self.time * PULSE_RATE).sin() * 0.3
    }

    pub fn update(&mut self, ctx: &FrameContext) {
        self.scale = self.scale.stepped(ctx.delta, ctx.mode);
        self.time = ctx.elapsed;
    }

    pub fn model_matrix(&self) -> Mat4 {
        let bob = (self.time * BOB_RATE).sin() * BOB_AMPLITUDE;
        Mat4::from_scale_rotation_translation(
            Vec3::splat(self.scale()),
            Quat::from_rotation_y(self.time * SPIN_RATE),
            Vec3::new(0.0, self.height + bob, 0.0),
        )
    }

    pub fn instance(&self) -> GpuOrnamentInstance {
        GpuOrnamentInstance::new(self.model_matrix(), self.color, self.emissive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_shrinks_when_scattered() {
        let mut star = StarTopper::new(&StarConfig::default(), Mode::Assembled).unwrap();
        assert_eq!(star.scale(), 1.0);
        let mut elapsed = 0.0;
        for _ in 0..120 {
            elapsed += 1.0 / 60.0;
            star.update(&FrameContext {
                mode: Mode::Scattered,
                elapsed,
                delta: 1.0 / 60.0,
            });
        }
        assert!(star.scale() < 1e-4);
    }

    #[test]
    fn test_star_grows_when_assembled() {
        let mut star = StarTopper::new(&StarConfig::default(), Mode::Scattered).unwrap();
        assert!(!star.is_visible());
        star.update(&FrameContext {
            mode: Mode::Assembled,
            elapsed: 0.1,
            delta: 0.1,
        });
        assert!(star.scale() > 0.5 && star.scale() < 1.0);
    }

    #[test]
    fn test_emissive_pulse_range() {
        let mut star = StarTopper::new(&StarConfig::default(), Mode::Assembled).unwrap();
        for i in 0..100 {
            star.update(&FrameContext {
                mode: Mode::Assembled,
                elapsed: i as f32 * 0.05,
                delta: 0.05,
            });
            let e = star.emissive();
            assert!((0.2 - 1e-6..=0.8 + 1e-6).contains(&e));
        }
        assert_eq!(star.instance().color[3], star.emissive());
    }
}
