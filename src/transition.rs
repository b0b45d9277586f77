//! Scatter/assemble mode and the smoothed progress every visual group follows.

use serde::{Deserialize, Serialize};

use crate::error::{ensure_positive, ConfigError};

/// Global arrangement requested by the user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Scattered,
    #[default]
    Assembled,
}

impl Mode {
    /// Progress value this mode converges to.
    pub fn target(self) -> f32 {
        match self {
            Mode::Scattered => 0.0,
            Mode::Assembled => 1.0,
        }
    }

    pub fn toggled(self) -> Mode {
        match self {
            Mode::Scattered => Mode::Assembled,
            Mode::Assembled => Mode::Scattered,
        }
    }
}

/// One exponential smoothing step of `progress` toward `target`.
///
/// The step factor `delta * speed` is clamped to `[0, 1]`, so a long frame
/// lands exactly on the target instead of overshooting it.
pub fn smoothing_step(progress: f32, target: f32, delta: f32, speed: f32) -> f32 {
    let factor = (delta * speed).clamp(0.0, 1.0);
    if factor >= 1.0 {
        return target;
    }
    progress + (target - progress) * factor
}

/// Cubic ease-out: fast start, decelerating into place.
pub fn ease_out_cubic(x: f32) -> f32 {
    let inv = 1.0 - x.clamp(0.0, 1.0);
    1.0 - inv * inv * inv
}

/// Smoothed transition progress of a single visual group.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransitionState {
    progress: f32,
    target: f32,
    speed: f32,
}

impl TransitionState {
    /// Start settled at `initial`.
    pub fn new(initial: Mode, speed: f32) -> Result<Self, ConfigError> {
        let speed = ensure_positive("speed", speed)?;
        Ok(Self {
            progress: initial.target(),
            target: initial.target(),
            speed,
        })
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Point the transition at `mode`. Progress only moves on the next `step`.
    pub fn set_target_mode(&mut self, mode: Mode) {
        self.target = mode.target();
    }

    /// Advance by `delta` seconds.
    pub fn step(&mut self, delta: f32) {
        let next = smoothing_step(self.progress, self.target, delta, self.speed);
        self.progress = next.clamp(0.0, 1.0);
    }

    /// Pure form of `set_target_mode` followed by `step`.
    pub fn stepped(mut self, delta: f32, mode: Mode) -> Self {
        self.set_target_mode(mode);
        self.step(delta);
        self
    }

    pub fn is_settled(&self) -> bool {
        self.progress == self.target
    }
}
