//! WGPU-based rendering engine
//!
//! Owns the surface, device and depth buffer, and drives a [`SceneTraversal`]
//! over the [`WgpuBackend`] once per rendered frame.

use std::{collections::BTreeMap, sync::Arc};

use anyhow::Context;
use thiserror::Error;
use wgpu::TextureFormat;

use super::traversal::{DrawStats, SceneTraversal};
use super::wgpu_backend::WgpuBackend;
use crate::config::RenderSettings;
use crate::gfx::{
    camera::FlyCamera,
    resources::{ImageData, TextureResource},
    scene::{NodeId, SceneGraph},
};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

/// Anything that can draw a scene graph as seen from a camera.
pub trait SceneRenderer {
    fn render(
        &mut self,
        graph: &SceneGraph,
        root: NodeId,
        camera: &FlyCamera,
    ) -> Result<(), RenderError>;
}

/// Core rendering engine managing GPU resources and draw calls
pub struct RenderEngine {
    surface: wgpu::Surface<'static>,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    config: wgpu::SurfaceConfiguration,
    depth_texture: TextureResource,
    format: TextureFormat,
    traversal: SceneTraversal<WgpuBackend>,
    clear_color: wgpu::Color,
    last_stats: DrawStats,
}

impl RenderEngine {
    /// Creates a new render engine for the given window
    ///
    /// # Arguments
    /// * `window` - Window surface target for rendering
    /// * `width` - Initial surface width in pixels
    /// * `height` - Initial surface height in pixels
    /// * `settings` - Backend variant, transform composition, clear colour and vsync
    /// * `images` - Decoded textures keyed by the name material nodes use
    pub async fn new(
        window: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        settings: &RenderSettings,
        images: &BTreeMap<String, ImageData>,
    ) -> anyhow::Result<RenderEngine> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window)
            .context("Failed to create surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("Failed to request adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("WGPU Device"),
                required_features: wgpu::Features::default(),
                required_limits: wgpu::Limits {
                    max_texture_dimension_2d: 4096,
                    ..wgpu::Limits::downlevel_defaults()
                },
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("Failed to request a device")?;
        let device = Arc::new(device);
        let queue = Arc::new(queue);

        let surface_capabilities = surface.get_capabilities(&adapter);
        let format = surface_capabilities
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_capabilities.formats.first().copied())
            .context("Surface reports no texture formats")?;
        let alpha_mode = surface_capabilities
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: present_mode(settings.vsync),
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_texture =
            TextureResource::create_depth_texture(&device, &config, "depth_texture");

        let mut backend = WgpuBackend::new(device.clone(), queue.clone(), format, settings.backend)
            .context("Failed to build scene pipeline")?;
        for (name, image) in images {
            backend.register_texture(name, image);
        }

        let [r, g, b, a] = settings.clear_color;
        log::info!(
            "Render engine ready: {:?}, {}x{}, {} texture(s)",
            format,
            config.width,
            config.height,
            images.len()
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            depth_texture,
            format,
            traversal: SceneTraversal::new(backend, settings.composition),
            clear_color: wgpu::Color { r, g, b, a },
            last_stats: DrawStats::default(),
        })
    }

    /// Resizes the surface and depth buffer. Zero sizes (minimised windows) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth_texture =
            TextureResource::create_depth_texture(&self.device, &self.config, "depth_texture");
    }

    pub fn surface_format(&self) -> TextureFormat {
        self.format
    }

    pub fn traversal(&self) -> &SceneTraversal<WgpuBackend> {
        &self.traversal
    }

    /// Counters from the most recent rendered frame.
    pub fn last_stats(&self) -> DrawStats {
        self.last_stats
    }
}

impl SceneRenderer for RenderEngine {
    fn render(
        &mut self,
        graph: &SceneGraph,
        root: NodeId,
        camera: &FlyCamera,
    ) -> Result<(), RenderError> {
        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("Surface lost or outdated, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Surface timed out, skipping frame");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let mut camera = *camera;
        camera.resize_projection(self.config.width, self.config.height);
        camera.update_view_proj();

        let uploaded = self.traversal.materialize(graph, root);
        if uploaded > 0 {
            log::debug!("Uploaded {} geometry node(s)", uploaded);
        }
        self.traversal.backend_mut().begin_frame(&camera.uniform);
        self.last_stats = self.traversal.draw(graph, root);
        self.traversal.backend_mut().prepare();

        let surface_texture_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &surface_texture_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            self.traversal.backend().encode(&mut render_pass);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();
        Ok(())
    }
}

fn present_mode(vsync: bool) -> wgpu::PresentMode {
    if vsync {
        wgpu::PresentMode::AutoVsync
    } else {
        wgpu::PresentMode::AutoNoVsync
    }
}
