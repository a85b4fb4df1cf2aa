// src/gfx/resources/mod.rs
//! GPU resource management
//!
//! Decoded images and the textures created from them.

pub mod image_data;
pub mod texture_resource;

// Re-export main types
pub use image_data::{ImageData, ImageDataError};
pub use texture_resource::TextureResource;
