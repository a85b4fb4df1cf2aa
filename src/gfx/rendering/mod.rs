// src/gfx/rendering/mod.rs
//! Core rendering functionality
//!
//! The backend-independent scene walk lives in [`traversal`]; the wgpu side is
//! split between the per-draw recording backend and the engine that owns the
//! surface and submits frames.

pub mod pipeline_manager;
pub mod render_engine;
pub mod traversal;
pub mod wgpu_backend;

// Re-export main types
pub use pipeline_manager::{PipelineConfig, PipelineError, PipelineManager};
pub use render_engine::{RenderEngine, RenderError, SceneRenderer};
pub use traversal::{DrawStats, RenderBackend, SceneTraversal, TransformComposition, TraversalState};
pub use wgpu_backend::{BackendVariant, WgpuBackend};
