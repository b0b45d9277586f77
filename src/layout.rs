//! Dual-layout generation: one scattered position, one tree position and one
//! random scalar per element.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{ensure_positive, ConfigError};
use crate::sampler::{LayoutSampler, RandomSampler};

/// Geometry of the two target layouts.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutParams {
    pub scatter_radius: f32,
    pub tree_height: f32,
    pub tree_base_radius: f32,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            scatter_radius: 15.0,
            tree_height: 12.0,
            tree_base_radius: 5.0,
        }
    }
}

impl LayoutParams {
    pub fn new(scatter_radius: f32, tree_height: f32, tree_base_radius: f32) -> Self {
        Self {
            scatter_radius,
            tree_height,
            tree_base_radius,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("scatter_radius", self.scatter_radius)?;
        ensure_positive("tree_height", self.tree_height)?;
        ensure_positive("tree_base_radius", self.tree_base_radius)?;
        Ok(())
    }
}

/// Precomputed target layouts for one visual group.
///
/// Index `i` names the same logical element in all three buffers for the
/// lifetime of the set. The set is never mutated after generation.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutSet {
    scatter_positions: Vec<f32>,
    tree_positions: Vec<f32>,
    randoms: Vec<f32>,
}

impl LayoutSet {
    /// Generate `count` elements through `sampler`.
    pub fn generate<S: LayoutSampler + ?Sized>(
        count: usize,
        params: &LayoutParams,
        sampler: &mut S,
    ) -> Result<Self, ConfigError> {
        params.validate()?;

        let mut scatter_positions = vec![0.0; count * 3];
        let mut tree_positions = vec![0.0; count * 3];
        let mut randoms = vec![0.0; count];

        for i in 0..count {
            let i3 = i * 3;

            let s = sampler.scatter_point(params.scatter_radius);
            scatter_positions[i3..i3 + 3].copy_from_slice(&s.to_array());

            let t = sampler.tree_point(params.tree_height, params.tree_base_radius);
            tree_positions[i3..i3 + 3].copy_from_slice(&t.to_array());

            randoms[i] = sampler.random();
        }

        Ok(Self {
            scatter_positions,
            tree_positions,
            randoms,
        })
    }

    pub fn len(&self) -> usize {
        self.randoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.randoms.is_empty()
    }

    pub fn scatter_position(&self, index: usize) -> Vec3 {
        Vec3::from_slice(&self.scatter_positions[index * 3..index * 3 + 3])
    }

    pub fn tree_position(&self, index: usize) -> Vec3 {
        Vec3::from_slice(&self.tree_positions[index * 3..index * 3 + 3])
    }

    pub fn random(&self, index: usize) -> f32 {
        self.randoms[index]
    }

    /// Flat `[x, y, z, ...]` scatter buffer of length `3 * len()`.
    pub fn scatter_positions(&self) -> &[f32] {
        &self.scatter_positions
    }

    /// Flat `[x, y, z, ...]` tree buffer of length `3 * len()`.
    pub fn tree_positions(&self) -> &[f32] {
        &self.tree_positions
    }

    pub fn randoms(&self) -> &[f32] {
        &self.randoms
    }
}

/// Generate a layout set from the thread-local generator.
pub fn generate_layout_set(
    count: usize,
    scatter_radius: f32,
    tree_height: f32,
    tree_base_radius: f32,
) -> Result<LayoutSet, ConfigError> {
    let params = LayoutParams::new(scatter_radius, tree_height, tree_base_radius);
    LayoutSet::generate(count, &params, &mut RandomSampler::from_thread_rng())
}
