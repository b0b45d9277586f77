//! Scene configuration, loaded from JSON. Every field has a default, so a
//! partial file (or none at all) yields the stock scene.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::camera::CameraConfig;
use crate::error::ConfigError;
use crate::foliage::FoliageConfig;
use crate::ornament::OrnamentConfig;
use crate::star::StarConfig;
use crate::transition::Mode;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub initial_mode: Mode,
    pub foliage: FoliageConfig,
    pub ornaments: Vec<OrnamentConfig>,
    pub star: StarConfig,
    /// Rotation of the whole assembly about Y, radians per second.
    pub scene_rotation_speed: f32,
    /// Vertical offset of the whole assembly.
    pub scene_offset_y: f32,
    pub camera: CameraConfig,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            initial_mode: Mode::Assembled,
            foliage: FoliageConfig::default(),
            ornaments: OrnamentConfig::default_groups(),
            star: StarConfig::default(),
            scene_rotation_speed: 0.05,
            scene_offset_y: -5.0,
            camera: CameraConfig::default(),
        }
    }
}

impl SceneConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.foliage.validate()?;
        for ornament in &self.ornaments {
            ornament.validate()?;
        }
        self.star.validate()?;
        self.camera.validate()?;
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SceneConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_json(&contents)?;
        log::info!("Loaded scene config from {}", path.display());
        Ok(config)
    }

    /// Load `path` if given, otherwise use the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}
