//! Randomized spatial sampling for the two target layouts.
//!
//! - Uniform-by-volume points inside a sphere (the scattered cloud)
//! - Points inside a cone, weighted toward its surface (the tree silhouette)
//!
//! Both samplers are free functions over any `rand::Rng`, so they can be
//! checked statistically with a seeded generator.

use std::f32::consts::TAU;

use glam::Vec3;
use rand::rngs::{StdRng, ThreadRng};
use rand::{Rng, SeedableRng};

/// Sample a point uniformly distributed by volume inside a sphere.
///
/// The radial parameter uses a cube root so density does not bunch up
/// toward the center.
pub fn sample_uniform_sphere_point<R: Rng + ?Sized>(rng: &mut R, radius: f32) -> Vec3 {
    let theta = TAU * rng.gen::<f32>();
    let phi = (2.0 * rng.gen::<f32>() - 1.0).clamp(-1.0, 1.0).acos();
    let r = rng.gen::<f32>().cbrt() * radius;

    Vec3::new(
        r * phi.sin() * theta.cos(),
        r * phi.sin() * theta.sin(),
        r * phi.cos(),
    )
}

/// Radius of the tree cone at height `y`, where `y` spans `[-height/2, height/2]`.
///
/// Decreases linearly from `base_radius` at the bottom to zero at the apex.
pub fn cone_radius_at(y: f32, height: f32, base_radius: f32) -> f32 {
    let normalized = ((y + height / 2.0) / height).clamp(0.0, 1.0);
    base_radius * (1.0 - normalized)
}

/// Sample a point inside the tree cone.
///
/// Radial distance is `cone_radius * sqrt(u)`, which favours the outer
/// shell while still filling some volume.
pub fn sample_tree_surface_point<R: Rng + ?Sized>(rng: &mut R, height: f32, base_radius: f32) -> Vec3 {
    let y = (rng.gen::<f32>() - 0.5) * height;
    let current_radius = cone_radius_at(y, height, base_radius);

    let angle = rng.gen::<f32>() * TAU;
    let r = current_radius * rng.gen::<f32>().sqrt();

    Vec3::new(r * angle.cos(), y, r * angle.sin())
}

/// Source of layout points and per-element random scalars.
///
/// Layout generation draws through this trait so that tests can substitute
/// known points for the stochastic samplers.
pub trait LayoutSampler {
    /// A point for the scattered layout.
    fn scatter_point(&mut self, radius: f32) -> Vec3;
    /// A point for the tree layout.
    fn tree_point(&mut self, height: f32, base_radius: f32) -> Vec3;
    /// A uniform scalar in `[0, 1)`.
    fn random(&mut self) -> f32;
}

/// `LayoutSampler` backed by a `rand` generator.
pub struct RandomSampler<R: Rng> {
    rng: R,
}

impl<R: Rng> RandomSampler<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RandomSampler<ThreadRng> {
    /// Sampler over the thread-local generator. Output differs between runs.
    pub fn from_thread_rng() -> Self {
        Self::new(rand::thread_rng())
    }
}

impl RandomSampler<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> LayoutSampler for RandomSampler<R> {
    fn scatter_point(&mut self, radius: f32) -> Vec3 {
        sample_uniform_sphere_point(&mut self.rng, radius)
    }

    fn tree_point(&mut self, height: f32, base_radius: f32) -> Vec3 {
        sample_tree_surface_point(&mut self.rng, height, base_radius)
    }

    fn random(&mut self) -> f32 {
        self.rng.gen::<f32>()
    }
}

/// Replays fixed points in order, cycling when exhausted.
///
/// Useful wherever exact layouts are needed (scenario tests, reproducible
/// diagnostics). An empty list yields the origin and zero.
#[derive(Clone, Debug, Default)]
pub struct ScriptedSampler {
    scatter: Vec<Vec3>,
    tree: Vec<Vec3>,
    randoms: Vec<f32>,
    cursor: [usize; 3],
}

impl ScriptedSampler {
    pub fn new(scatter: Vec<Vec3>, tree: Vec<Vec3>, randoms: Vec<f32>) -> Self {
        Self {
            scatter,
            tree,
            randoms,
            cursor: [0; 3],
        }
    }

    fn next<T: Copy + Default>(values: &[T], cursor: &mut usize) -> T {
        if values.is_empty() {
            return T::default();
        }
        let value = values[*cursor % values.len()];
        *cursor += 1;
        value
    }
}

impl LayoutSampler for ScriptedSampler {
    fn scatter_point(&mut self, _radius: f32) -> Vec3 {
        Self::next(&self.scatter, &mut self.cursor[0])
    }

    fn tree_point(&mut self, _height: f32, _base_radius: f32) -> Vec3 {
        Self::next(&self.tree, &mut self.cursor[1])
    }

    fn random(&mut self) -> f32 {
        Self::next(&self.randoms, &mut self.cursor[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: usize = 20_000;

    #[test]
    fn test_sphere_points_within_radius() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..SAMPLES {
            let p = sample_uniform_sphere_point(&mut rng, 15.0);
            assert!(p.length() <= 15.0 + 1e-4, "point outside sphere: {:?}", p);
        }
    }

    #[test]
    fn test_sphere_volume_uniformity() {
        // For a volume-uniform distribution (|p|/R)^3 is uniform on [0, 1].
        let radius = 4.0;
        let mut rng = StdRng::seed_from_u64(11);
        let mut buckets = [0usize; 10];
        for _ in 0..SAMPLES {
            let p = sample_uniform_sphere_point(&mut rng, radius);
            let u = (p.length() / radius).powi(3);
            let bucket = ((u * 10.0) as usize).min(9);
            buckets[bucket] += 1;
        }
        let expected = SAMPLES as f32 / 10.0;
        for (i, &n) in buckets.iter().enumerate() {
            let deviation = (n as f32 - expected).abs() / expected;
            assert!(deviation < 0.1, "bucket {} has {} samples (expected ~{})", i, n, expected);
        }
    }

    #[test]
    fn test_sphere_mean_is_centered() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut sum = Vec3::ZERO;
        for _ in 0..SAMPLES {
            sum += sample_uniform_sphere_point(&mut rng, 1.0);
        }
        let mean = sum / SAMPLES as f32;
        assert!(mean.length() < 0.03, "mean drifted: {:?}", mean);
    }

    #[test]
    fn test_tree_points_within_cone() {
        let (height, base) = (12.0, 5.0);
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..SAMPLES {
            let p = sample_tree_surface_point(&mut rng, height, base);
            assert!(p.y.abs() <= height / 2.0 + 1e-4);
            let radial = Vec3::new(p.x, 0.0, p.z).length();
            assert!(
                radial <= cone_radius_at(p.y, height, base) + 1e-4,
                "point {:?} outside cone",
                p
            );
        }
    }

    #[test]
    fn test_tree_mean_radius_shrinks_with_height() {
        let (height, base) = (12.0, 5.0);
        let mut rng = StdRng::seed_from_u64(9);
        let mut lower = (0.0f32, 0usize);
        let mut upper = (0.0f32, 0usize);
        for _ in 0..SAMPLES {
            let p = sample_tree_surface_point(&mut rng, height, base);
            let radial = Vec3::new(p.x, 0.0, p.z).length();
            if p.y < 0.0 {
                lower = (lower.0 + radial, lower.1 + 1);
            } else {
                upper = (upper.0 + radial, upper.1 + 1);
            }
        }
        let lower_mean = lower.0 / lower.1 as f32;
        let upper_mean = upper.0 / upper.1 as f32;
        assert!(lower_mean > upper_mean * 2.0, "lower {} upper {}", lower_mean, upper_mean);
    }

    #[test]
    fn test_tree_points_favour_surface() {
        // sqrt(u) puts the median radial fraction at sqrt(0.5) ~ 0.707.
        let (height, base) = (10.0, 4.0);
        let mut rng = StdRng::seed_from_u64(21);
        let mut outer = 0usize;
        let mut counted = 0usize;
        for _ in 0..SAMPLES {
            let p = sample_tree_surface_point(&mut rng, height, base);
            let cone = cone_radius_at(p.y, height, base);
            if cone < 1e-3 {
                continue;
            }
            counted += 1;
            if Vec3::new(p.x, 0.0, p.z).length() / cone > 0.5 {
                outer += 1;
            }
        }
        let fraction = outer as f32 / counted as f32;
        assert!((fraction - 0.75).abs() < 0.03, "outer fraction {}", fraction);
    }

    #[test]
    fn test_cone_radius_endpoints() {
        assert!((cone_radius_at(-6.0, 12.0, 5.0) - 5.0).abs() < 1e-6);
        assert!(cone_radius_at(6.0, 12.0, 5.0).abs() < 1e-6);
        assert!((cone_radius_at(0.0, 12.0, 5.0) - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_scripted_sampler_replays_in_order() {
        let mut sampler = ScriptedSampler::new(
            vec![Vec3::X, Vec3::Y],
            vec![Vec3::Z],
            vec![0.25, 0.75],
        );
        assert_eq!(sampler.scatter_point(1.0), Vec3::X);
        assert_eq!(sampler.scatter_point(1.0), Vec3::Y);
        assert_eq!(sampler.scatter_point(1.0), Vec3::X);
        assert_eq!(sampler.tree_point(1.0, 1.0), Vec3::Z);
        assert_eq!(sampler.random(), 0.25);
        assert_eq!(sampler.random(), 0.75);
    }
}
