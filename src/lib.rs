// src/lib.rs
//! simscene
//!
//! A scene graph imported from Wavefront files, rigid-body physics bound to
//! named transform nodes, and a fixed-timestep loop that renders the graph
//! with wgpu.

pub mod app;
pub mod application;
pub mod config;
pub mod driver;
pub mod gfx;
pub mod prelude;
pub mod simulation;
pub mod wgpu_utils;

// Re-export main types for convenience
pub use app::SimsceneApp;
pub use application::{Application, ApplicationError};
pub use config::SceneDescription;
