//! Configuration system
//!
//! File-backed configuration for the culling core: the tree volume, the LOD
//! angle and the freeze-frustum debug toggle. Types implementing [`Config`]
//! load and save through TOML or RON based on the file extension.

pub use serde::{Deserialize, Serialize};

use crate::cull::FetchSpatialTree;
use crate::foundation::math::Vec3;
use crate::scene::filter::ItemFilter;
use crate::spatial::item_tree::ItemSpatialTree;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        // Pick the format from the extension
        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Semantically invalid configuration value
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration of the spatial culling core
///
/// The tree origin and size are fixed for the lifetime of the tree built
/// from them; the LOD angle and freeze toggle feed the per-frame fetch job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CullingConfig {
    /// Minimum corner of the tree volume
    pub tree_origin: Vec3,
    /// Edge length of the tree volume
    pub tree_size: f32,
    /// LOD solid angle in degrees; the traversal clamps it to
    /// [1/60, 45] degrees
    pub lod_angle_deg: f32,
    /// Keep querying with the first frustum seen (debugging aid)
    pub freeze_frustum: bool,
}

impl Default for CullingConfig {
    fn default() -> Self {
        Self {
            tree_origin: Vec3::new(-16384.0, -16384.0, -16384.0),
            tree_size: 32768.0,
            lod_angle_deg: 2.0,
            freeze_frustum: false,
        }
    }
}

impl Config for CullingConfig {}

impl CullingConfig {
    /// Check the configuration for values no tree can be built from
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.tree_size.is_finite() || self.tree_size <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "tree_size must be positive and finite, got {}",
                self.tree_size
            )));
        }
        if !self.lod_angle_deg.is_finite() || self.lod_angle_deg <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "lod_angle_deg must be positive, got {}",
                self.lod_angle_deg
            )));
        }
        Ok(())
    }

    /// Build the spatial tree this configuration describes
    pub fn build_tree(&self) -> Result<ItemSpatialTree, ConfigError> {
        self.validate()?;
        Ok(ItemSpatialTree::new(self.tree_origin, self.tree_size))
    }

    /// Build a fetch job carrying this configuration's LOD and freeze settings
    pub fn build_fetch(&self, filter: ItemFilter) -> FetchSpatialTree {
        let mut fetch = FetchSpatialTree::new(filter);
        fetch.lod_angle_deg = self.lod_angle_deg;
        fetch.freeze_frustum = self.freeze_frustum;
        fetch
    }
}
