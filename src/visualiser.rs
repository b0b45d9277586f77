use glam::{Mat4, Vec3};

use crate::camera::OrbitCamera;
use crate::config::SceneConfig;
use crate::error::{ConfigError, GroupUpdateError};
use crate::foliage::FoliageGroup;
use crate::ornament::OrnamentGroup;
use crate::profiling;
use crate::sampler::{LayoutSampler, RandomSampler};
use crate::star::StarTopper;
use crate::transition::Mode;

/// Per-frame input handed to every visual group.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameContext {
    pub mode: Mode,
    /// Seconds since the visualiser started.
    pub elapsed: f32,
    /// Seconds since the previous frame.
    pub delta: f32,
}

/// Outcome of one frame tick.
#[derive(Debug, Default)]
pub struct FrameReport {
    pub frame: u64,
    /// Groups that failed this frame; they kept their previous output.
    pub failures: Vec<GroupUpdateError>,
}

/// Owns the global mode and every visual group.
pub struct VisualiserState {
    pub time: f32,
    frame: u64,
    mode: Mode,
    scene_rotation_speed: f32,
    scene_offset_y: f32,
    foliage: FoliageGroup,
    ornaments: Vec<OrnamentGroup>,
    star: Option<StarTopper>,
    camera: OrbitCamera,
}

impl VisualiserState {
    pub fn new(config: &SceneConfig) -> Result<Self, ConfigError> {
        Self::with_sampler(config, &mut RandomSampler::from_thread_rng())
    }

    /// Build every group, drawing layouts through `sampler`.
    pub fn with_sampler<S: LayoutSampler + ?Sized>(config: &SceneConfig, sampler: &mut S) -> Result<Self, ConfigError> {
        config.validate()?;
        let mode = config.initial_mode;

        let foliage = FoliageGroup::new(&config.foliage, mode, sampler)?;
        let ornaments = config
            .ornaments
            .iter()
            .map(|c| OrnamentGroup::new(c, mode, sampler))
            .collect::<Result<Vec<_>, _>>()?;
        let star = if config.star.enabled {
            Some(StarTopper::new(&config.star, mode)?)
        } else {
            None
        };

        Ok(Self {
            time: 0.0,
            frame: 0,
            mode,
            scene_rotation_speed: config.scene_rotation_speed,
            scene_offset_y: config.scene_offset_y,
            foliage,
            ornaments,
            star,
            camera: OrbitCamera::new(config.camera.clone()),
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Request a mode. Groups pick it up on the next `update`.
    pub fn set_mode(&mut self, mode: Mode) {
        if mode != self.mode {
            log::info!("Mode {:?} -> {:?}", self.mode, mode);
            self.mode = mode;
        }
    }

    pub fn toggle_mode(&mut self) -> Mode {
        self.set_mode(self.mode.toggled());
        self.mode
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn foliage(&self) -> &FoliageGroup {
        &self.foliage
    }

    pub fn ornaments(&self) -> &[OrnamentGroup] {
        &self.ornaments
    }

    pub fn ornaments_mut(&mut self) -> &mut [OrnamentGroup] {
        &mut self.ornaments
    }

    pub fn star(&self) -> Option<&StarTopper> {
        self.star.as_ref()
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut OrbitCamera {
        &mut self.camera
    }

    /// Model matrix of the whole assembly: slow spin about Y, lowered onto the floor.
    pub fn scene_matrix(&self) -> Mat4 {
        Mat4::from_translation(Vec3::new(0.0, self.scene_offset_y, 0.0))
            * Mat4::from_rotation_y(self.time * self.scene_rotation_speed)
    }

    /// Advance one frame. A failing group is logged and skipped; the rest still update.
    pub fn update(&mut self, dt: f32) -> FrameReport {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.time += dt;
        self.frame += 1;

        let ctx = FrameContext {
            mode: self.mode,
            elapsed: self.time,
            delta: dt,
        };
        let mut report = FrameReport {
            frame: self.frame,
            failures: Vec::new(),
        };

        if let Err(e) = profiling::timed("foliage update", || self.foliage.update(&ctx)) {
            log::warn!("{}", e);
            report.failures.push(e);
        }

        for group in self.ornaments.iter_mut() {
            if let Err(e) = profiling::timed("ornament update", || group.update(&ctx)) {
                log::warn!("{}", e);
                report.failures.push(e);
            }
        }

        if let Some(star) = self.star.as_mut() {
            star.update(&ctx);
        }

        if profiling::should_log_summary() {
            let instances: usize = self.ornaments.iter().map(|g| g.len()).sum();
            log::info!(
                "[PERF] frame {}: {} particles, {} ornaments in {} groups",
                self.frame,
                self.foliage.len(),
                instances,
                self.ornaments.len()
            );
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foliage::FoliageConfig;

    fn small_config() -> SceneConfig {
        SceneConfig {
            foliage: FoliageConfig {
                count: 50,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_new_builds_all_groups() {
        let state = VisualiserState::with_sampler(&small_config(), &mut RandomSampler::seeded(1)).unwrap();
        assert_eq!(state.foliage().len(), 50);
        assert_eq!(state.ornaments().len(), 3);
        assert_eq!(state.ornaments()[1].len(), 100);
        assert!(state.star().is_some());
        assert_eq!(state.mode(), Mode::Assembled);
    }

    #[test]
    fn test_toggle_mode() {
        let mut state = VisualiserState::with_sampler(&small_config(), &mut RandomSampler::seeded(2)).unwrap();
        assert_eq!(state.toggle_mode(), Mode::Scattered);
        assert_eq!(state.toggle_mode(), Mode::Assembled);
    }

    #[test]
    fn test_groups_move_at_different_speeds() {
        let mut config = small_config();
        config.initial_mode = Mode::Scattered;
        let mut state = VisualiserState::with_sampler(&config, &mut RandomSampler::seeded(3)).unwrap();
        state.set_mode(Mode::Assembled);
        state.update(0.1);
        let foliage = state.foliage().transition().progress();
        let boxes = state.ornaments()[0].transition().progress();
        assert!(foliage > boxes);
    }

    #[test]
    fn test_update_ignores_bad_delta() {
        let mut state = VisualiserState::with_sampler(&small_config(), &mut RandomSampler::seeded(4)).unwrap();
        let report = state.update(f32::NAN);
        assert!(report.failures.is_empty());
        assert_eq!(state.time, 0.0);
        state.update(-1.0);
        assert_eq!(state.time, 0.0);
        assert_eq!(state.frame(), 2);
    }

    #[test]
    fn test_scene_matrix_rotates_slowly() {
        let mut state = VisualiserState::with_sampler(&small_config(), &mut RandomSampler::seeded(5)).unwrap();
        state.update(10.0);
        let m = state.scene_matrix();
        assert!((m.w_axis.y + 5.0).abs() < 1e-6);
        let x = m.transform_vector3(Vec3::X);
        assert!((x.z + 0.5f32.sin()).abs() < 1e-5);
    }
}
