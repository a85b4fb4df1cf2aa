//! Scene description and runtime settings
//!
//! A scene is described by a RON file listing the Wavefront files to import,
//! the physics bodies to attach to named transform nodes, and camera, loop and
//! render settings. Every field has a default, so a minimal file only needs
//! the parts it changes:
//!
//! ```ron
//! (
//!     wavefront_files: ["falling_cubes.obj"],
//!     physics: [
//!         (node: "Plane", mass: 0.0, shape: Box(width: 50.0, height: 50.0, length: 50.0, offset: (0.0, -50.0, 0.0))),
//!         (node: "Cube.000", mass: 1.0, shape: Box(width: 0.5, height: 0.5, length: 0.5)),
//!     ],
//! )
//! ```

use std::path::{Path, PathBuf};

pub use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gfx::rendering::{BackendVariant, TransformComposition};

/// Serializable configuration loaded from disk.
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from a `.ron` file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.extension().and_then(|e| e.to_str()) != Some("ron") {
            return Err(ConfigError::UnsupportedFormat(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    fn from_ron_str(contents: &str) -> Result<Self, ConfigError> {
        ron::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save configuration to a `.ron` file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if path.extension().and_then(|e| e.to_str()) != Some("ron") {
            return Err(ConfigError::UnsupportedFormat(path.display().to_string()));
        }
        let contents = ron::ser::to_string_pretty(self, Default::default())
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Collision shape requested for a named node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PhysicsShape {
    /// Axis-aligned box; the dimensions are half-extents.
    Box {
        width: f32,
        height: f32,
        length: f32,
        #[serde(default)]
        offset: [f32; 3],
    },
    /// Convex hull of every geometry vertex below the node.
    ConvexHull,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsEntry {
    /// Name of the transform node the body drives.
    pub node: String,
    /// Zero makes the body static.
    #[serde(default)]
    pub mass: f32,
    pub shape: PhysicsShape,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Starting height of the eye.
    pub height: f32,
    /// Distance moved backward from the origin before the first frame.
    pub distance: f32,
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// Units moved per key press.
    pub move_step: f32,
    /// Radians turned per key press.
    pub aim_step: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            height: 4.0,
            distance: 28.0,
            fov_y_degrees: 45.0,
            near: 0.1,
            far: 10000.0,
            move_step: 1.0,
            aim_step: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverSettings {
    /// Fixed simulation step in seconds.
    pub timestep: f32,
    /// Ticks run back to back before a frame is forced.
    pub max_sequential_updates: u32,
}

impl DriverSettings {
    pub const RELEASE_MAX_SEQUENTIAL_UPDATES: u32 = 60;
    pub const DEBUG_MAX_SEQUENTIAL_UPDATES: u32 = 10;
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            timestep: 1.0 / 60.0,
            max_sequential_updates: if cfg!(debug_assertions) {
                Self::DEBUG_MAX_SEQUENTIAL_UPDATES
            } else {
                Self::RELEASE_MAX_SEQUENTIAL_UPDATES
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub backend: BackendVariant,
    pub composition: TransformComposition,
    pub clear_color: [f64; 4],
    pub window_size: [u32; 2],
    pub vsync: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            backend: BackendVariant::default(),
            composition: TransformComposition::default(),
            clear_color: [0.1, 0.2, 0.3, 1.0],
            window_size: [1200, 800],
            vsync: true,
        }
    }
}

/// Everything needed to build an [`Application`](crate::application::Application).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneDescription {
    /// OBJ files, relative to the description file.
    pub wavefront_files: Vec<PathBuf>,
    pub physics: Vec<PhysicsEntry>,
    pub gravity: [f32; 3],
    pub camera: CameraSettings,
    pub driver: DriverSettings,
    pub render: RenderSettings,
}

impl Default for SceneDescription {
    fn default() -> Self {
        Self {
            wavefront_files: Vec::new(),
            physics: Vec::new(),
            gravity: [0.0, -10.0, 0.0],
            camera: CameraSettings::default(),
            driver: DriverSettings::default(),
            render: RenderSettings::default(),
        }
    }
}

impl Config for SceneDescription {}

impl SceneDescription {
    /// Loads a description and returns it with the directory its relative
    /// asset paths resolve against.
    pub fn load(path: impl AsRef<Path>) -> Result<(Self, PathBuf), ConfigError> {
        let path = path.as_ref();
        let description = Self::load_from_file(path)?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        log::info!(
            "Loaded scene description '{}' ({} files, {} bodies)",
            path.display(),
            description.wavefront_files.len(),
            description.physics.len()
        );
        Ok((description, base_dir))
    }
}
