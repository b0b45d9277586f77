//! Error types for scene configuration and per-frame group updates.

use thiserror::Error;

/// Rejected configuration. Raised at construction time so that nothing
/// degenerate ever reaches the frame loop.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{field} must be a positive finite number, got {value}")]
    NonPositive { field: &'static str, value: f32 },
    #[error("scale range is inverted or non-finite: [{min}, {max}]")]
    InvalidScaleRange { min: f32, max: f32 },
    #[error("invalid color '{0}', expected #rrggbb")]
    InvalidColor(String),
    #[error("failed to parse scene config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure of a single visual group during a frame tick.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GroupUpdateError {
    #[error("group '{group}' produced a non-finite transform at index {index}")]
    NonFiniteTransform { group: String, index: usize },
}

/// Check that a configuration value is strictly positive and finite.
pub fn ensure_positive(field: &'static str, value: f32) -> Result<f32, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}
