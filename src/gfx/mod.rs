//! # Graphics Module
//!
//! Scene graph, camera, GPU resources and the renderer that walks the graph.
//!
//! ## Architecture Overview
//!
//! - **Scene Graph** ([`scene`]) - Typed node arena and the Wavefront importer
//! - **Camera System** ([`camera`]) - Keyboard-steered fly camera
//! - **Rendering** ([`rendering`]) - Backend-independent traversal and its wgpu backend
//! - **Resources** ([`resources`]) - Decoded images and GPU textures
//!
//! The renderer only reads the graph. Physics writes transform matrices into it
//! between frames.

pub mod camera;
pub mod rendering;
pub mod resources;
pub mod scene;

// Re-export commonly used types
pub use camera::FlyCamera;
pub use rendering::render_engine::RenderEngine;
