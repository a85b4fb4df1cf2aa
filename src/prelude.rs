//! # Prelude
//!
//! Commonly used types for building and driving a scene without a window:
//!
//! ```no_run
//! use simscene::prelude::*;
//!
//! let (description, base_dir) = SceneDescription::load("demos/falling_cubes/scene.ron").unwrap();
//! let mut application = Application::load(&description, &base_dir).unwrap();
//! for _ in 0..60 {
//!     application.step();
//! }
//! ```

pub use crate::application::{Application, ApplicationError};
pub use crate::config::{Config, PhysicsEntry, PhysicsShape, SceneDescription};
pub use crate::driver::{FrameClock, FrameDriver, FrameReport, FrameTarget};

pub use crate::gfx::camera::{CameraController, FlyCamera};
pub use crate::gfx::rendering::{
    BackendVariant, RenderBackend, SceneRenderer, SceneTraversal, TransformComposition,
};
pub use crate::gfx::scene::{Node, NodeId, NodeKind, SceneGraph, WavefrontImport};

pub use crate::simulation::{BoxExtents, Simulation};
