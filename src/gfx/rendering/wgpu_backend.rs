//! wgpu implementation of [`RenderBackend`]
//!
//! Draw calls reported by the traversal are recorded, then [`WgpuBackend::prepare`]
//! uploads one uniform slot per call and [`WgpuBackend::encode`] replays them into
//! a single render pass using dynamic offsets.

use std::{collections::HashMap, sync::Arc};

use cgmath::Matrix4;
use serde::{Deserialize, Serialize};

use super::pipeline_manager::{PipelineConfig, PipelineError, PipelineManager};
use super::traversal::{RenderBackend, TraversalState};
use crate::gfx::{
    camera::{camera_utils::convert_matrix4_to_array, CameraUniform},
    resources::{ImageData, TextureResource},
    scene::GeometryNode,
};
use crate::wgpu_utils::{
    binding_types, uniform_buffer::DynamicUniformBuffer, uniform_buffer::UniformBuffer,
};

const SCENE_PIPELINE: &str = "scene";
const INITIAL_DRAW_SLOTS: usize = 64;

/// Index of the white texture used while no material is active.
pub const DEFAULT_TEXTURE: usize = 0;

/// Shader interface used by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendVariant {
    /// Per-draw block holds `projection * view * model` and `model`.
    #[default]
    Direct,
    /// Camera block uploaded once per frame, per-draw block holds `model`.
    UniformBlock,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DirectDrawUniform {
    pub mvp: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
}

impl DirectDrawUniform {
    pub fn new(view_proj: Matrix4<f32>, model: Matrix4<f32>) -> Self {
        Self {
            mvp: convert_matrix4_to_array(view_proj * model),
            model: convert_matrix4_to_array(model),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelUniform {
    pub model: [[f32; 4]; 4],
}

/// Handle into the backend's geometry table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryHandle(usize);

struct GpuGeometry {
    vertex_buffer: wgpu::Buffer,
    vertex_count: u32,
}

struct GpuTexture {
    _resource: TextureResource,
    bind_group: wgpu::BindGroup,
}

#[derive(Debug, Clone, Copy)]
struct DrawCommand {
    geometry: usize,
    texture: usize,
    model: Matrix4<f32>,
}

enum DrawBlock {
    Direct {
        uniforms: DynamicUniformBuffer<DirectDrawUniform>,
    },
    UniformBlock {
        camera: UniformBuffer<CameraUniform>,
        camera_bind_group: wgpu::BindGroup,
        uniforms: DynamicUniformBuffer<ModelUniform>,
    },
}

impl DrawBlock {
    fn binding_resource(&self) -> wgpu::BindingResource {
        match self {
            DrawBlock::Direct { uniforms } => uniforms.binding_resource(),
            DrawBlock::UniformBlock { uniforms, .. } => uniforms.binding_resource(),
        }
    }

    fn offset(&self, index: usize) -> wgpu::DynamicOffset {
        match self {
            DrawBlock::Direct { uniforms } => uniforms.offset(index),
            DrawBlock::UniformBlock { uniforms, .. } => uniforms.offset(index),
        }
    }

    /// Bind group index of the per-draw block.
    fn draw_group(&self) -> u32 {
        match self {
            DrawBlock::Direct { .. } => 0,
            DrawBlock::UniformBlock { .. } => 1,
        }
    }
}

pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    variant: BackendVariant,
    pipelines: PipelineManager,
    draw_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    draw_block: DrawBlock,
    draw_bind_group: wgpu::BindGroup,
    geometries: Vec<Option<GpuGeometry>>,
    textures: Vec<GpuTexture>,
    texture_names: HashMap<String, usize>,
    camera_uniform: CameraUniform,
    frame: Vec<DrawCommand>,
}

impl WgpuBackend {
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        surface_format: wgpu::TextureFormat,
        variant: BackendVariant,
    ) -> Result<Self, PipelineError> {
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Diffuse Texture Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: binding_types::texture_2d(),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: binding_types::sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let draw_block_size = match variant {
            BackendVariant::Direct => std::mem::size_of::<DirectDrawUniform>(),
            BackendVariant::UniformBlock => std::mem::size_of::<ModelUniform>(),
        } as u64;
        let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Draw Uniform Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: binding_types::uniform_dynamic(draw_block_size),
                count: None,
            }],
        });

        let mut pipelines = PipelineManager::new(device.clone());
        let (draw_block, layouts, shader) = match variant {
            BackendVariant::Direct => {
                pipelines.load_shader("direct", include_str!("shaders/direct.wgsl"));
                (
                    DrawBlock::Direct {
                        uniforms: DynamicUniformBuffer::new(&device, INITIAL_DRAW_SLOTS),
                    },
                    vec![draw_layout.clone(), texture_layout.clone()],
                    "direct",
                )
            }
            BackendVariant::UniformBlock => {
                pipelines.load_shader("uniform_block", include_str!("shaders/uniform_block.wgsl"));
                let camera_layout =
                    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                        label: Some("Camera Layout"),
                        entries: &[wgpu::BindGroupLayoutEntry {
                            binding: 0,
                            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                            ty: binding_types::uniform(),
                            count: None,
                        }],
                    });
                let camera = UniformBuffer::new_with_data(&device, &CameraUniform::default());
                let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Camera Bind Group"),
                    layout: &camera_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: camera.binding_resource(),
                    }],
                });
                (
                    DrawBlock::UniformBlock {
                        camera,
                        camera_bind_group,
                        uniforms: DynamicUniformBuffer::new(&device, INITIAL_DRAW_SLOTS),
                    },
                    vec![camera_layout, draw_layout.clone(), texture_layout.clone()],
                    "uniform_block",
                )
            }
        };

        pipelines.register_pipeline(
            SCENE_PIPELINE,
            PipelineConfig::default()
                .with_label("Scene Pipeline")
                .with_shader(shader)
                .with_bind_group_layouts(layouts)
                .with_depth_stencil(TextureResource::DEPTH_FORMAT)
                .with_cull_mode(None)
                .with_color_targets(vec![Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })]),
        );
        pipelines.create_all_pipelines()?;

        let draw_bind_group = Self::create_draw_bind_group(&device, &draw_layout, &draw_block);

        let mut backend = Self {
            device,
            queue,
            variant,
            pipelines,
            draw_layout,
            texture_layout,
            draw_block,
            draw_bind_group,
            geometries: Vec::new(),
            textures: Vec::new(),
            texture_names: HashMap::new(),
            camera_uniform: CameraUniform::default(),
            frame: Vec::new(),
        };
        backend.push_texture(&ImageData::solid_color(1, 1, [255; 4]), "Default Texture");
        log::info!("Created {:?} render backend", variant);
        Ok(backend)
    }

    fn create_draw_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        draw_block: &DrawBlock,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw Uniform Bind Group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: draw_block.binding_resource(),
            }],
        })
    }

    fn push_texture(&mut self, image: &ImageData, label: &str) -> usize {
        let resource = TextureResource::from_image(&self.device, &self.queue, image, label);
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} Bind Group", label)),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&resource.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&resource.sampler),
                },
            ],
        });
        self.textures.push(GpuTexture {
            _resource: resource,
            bind_group,
        });
        self.textures.len() - 1
    }

    /// Uploads `image` under the name material nodes refer to it by.
    pub fn register_texture(&mut self, name: &str, image: &ImageData) -> usize {
        if let Some(&index) = self.texture_names.get(name) {
            return index;
        }
        let index = self.push_texture(image, name);
        self.texture_names.insert(name.to_string(), index);
        log::debug!("Registered texture '{}' ({}x{})", name, image.width, image.height);
        index
    }

    pub fn variant(&self) -> BackendVariant {
        self.variant
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn geometry_count(&self) -> usize {
        self.geometries.iter().filter(|g| g.is_some()).count()
    }

    /// Starts recording a frame seen through `camera`.
    pub fn begin_frame(&mut self, camera: &CameraUniform) {
        self.camera_uniform = *camera;
        self.frame.clear();
    }

    pub fn recorded_draws(&self) -> usize {
        self.frame.len()
    }

    /// Writes the uniform slot of every recorded draw.
    pub fn prepare(&mut self) {
        let view_proj = Matrix4::from(self.camera_uniform.view_proj);
        let grown = match &mut self.draw_block {
            DrawBlock::Direct { uniforms } => {
                let contents: Vec<DirectDrawUniform> = self
                    .frame
                    .iter()
                    .map(|draw| DirectDrawUniform::new(view_proj, draw.model))
                    .collect();
                uniforms.write(&self.device, &self.queue, &contents)
            }
            DrawBlock::UniformBlock {
                camera, uniforms, ..
            } => {
                camera.update_content(&self.queue, self.camera_uniform);
                let contents: Vec<ModelUniform> = self
                    .frame
                    .iter()
                    .map(|draw| ModelUniform {
                        model: convert_matrix4_to_array(draw.model),
                    })
                    .collect();
                uniforms.write(&self.device, &self.queue, &contents)
            }
        };
        if grown {
            self.draw_bind_group =
                Self::create_draw_bind_group(&self.device, &self.draw_layout, &self.draw_block);
        }
    }

    /// Replays the recorded draws into `pass`. Call [`Self::prepare`] first.
    pub fn encode(&self, pass: &mut wgpu::RenderPass<'_>) {
        let Some(pipeline) = self.pipelines.get_pipeline(SCENE_PIPELINE) else {
            log::error!("Scene pipeline missing, nothing drawn");
            return;
        };
        pass.set_pipeline(pipeline);

        if let DrawBlock::UniformBlock {
            camera_bind_group, ..
        } = &self.draw_block
        {
            pass.set_bind_group(0, camera_bind_group, &[]);
        }
        let draw_group = self.draw_block.draw_group();

        for (slot, draw) in self.frame.iter().enumerate() {
            let Some(geometry) = self.geometries.get(draw.geometry).and_then(Option::as_ref) else {
                continue;
            };
            let Some(texture) = self
                .textures
                .get(draw.texture)
                .or_else(|| self.textures.get(DEFAULT_TEXTURE))
            else {
                continue;
            };

            pass.set_bind_group(
                draw_group,
                &self.draw_bind_group,
                &[self.draw_block.offset(slot)],
            );
            pass.set_bind_group(draw_group + 1, &texture.bind_group, &[]);
            pass.set_vertex_buffer(0, geometry.vertex_buffer.slice(..));
            pass.draw(0..geometry.vertex_count, 0..1);
        }
    }
}

impl RenderBackend for WgpuBackend {
    type Geometry = GeometryHandle;
    type Texture = usize;

    fn upload_geometry(&mut self, geometry: &GeometryNode) -> GeometryHandle {
        let vertex_buffer = wgpu::util::DeviceExt::create_buffer_init(
            self.device.as_ref(),
            &wgpu::util::BufferInitDescriptor {
                label: Some("Vertex Buffer"),
                contents: bytemuck::cast_slice(geometry.vertices()),
                usage: wgpu::BufferUsages::VERTEX,
            },
        );
        let gpu = GpuGeometry {
            vertex_buffer,
            vertex_count: geometry.vertex_count() as u32,
        };

        let index = match self.geometries.iter().position(Option::is_none) {
            Some(free) => {
                self.geometries[free] = Some(gpu);
                free
            }
            None => {
                self.geometries.push(Some(gpu));
                self.geometries.len() - 1
            }
        };
        GeometryHandle(index)
    }

    fn release_geometry(&mut self, geometry: GeometryHandle) {
        if let Some(slot) = self.geometries.get_mut(geometry.0) {
            *slot = None;
        }
    }

    fn resolve_texture(&mut self, name: &str) -> Option<usize> {
        self.texture_names.get(name).copied()
    }

    fn draw(&mut self, geometry: &GeometryHandle, state: &TraversalState<usize>) {
        self.frame.push(DrawCommand {
            geometry: geometry.0,
            texture: state.texture.unwrap_or(DEFAULT_TEXTURE),
            model: state.transform,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{SquareMatrix, Vector3};

    #[test]
    fn test_direct_uniform_bakes_camera() {
        let view_proj = Matrix4::from_nonuniform_scale(2.0, 2.0, 1.0);
        let model = Matrix4::from_translation(Vector3::new(1.0, 2.0, 3.0));
        let uniform = DirectDrawUniform::new(view_proj, model);

        assert_eq!(uniform.model[3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(uniform.mvp[3], [2.0, 4.0, 3.0, 1.0]);
    }

    #[test]
    fn test_uniform_sizes_match_shaders() {
        assert_eq!(std::mem::size_of::<DirectDrawUniform>(), 128);
        assert_eq!(std::mem::size_of::<ModelUniform>(), 64);
    }

    #[test]
    fn test_identity_camera_leaves_model_unchanged() {
        let model = Matrix4::from_translation(Vector3::new(0.0, 0.5, 0.0));
        let uniform = DirectDrawUniform::new(Matrix4::identity(), model);
        assert_eq!(uniform.mvp, uniform.model);
    }

    #[test]
    fn test_variant_parses_from_ron() {
        let variant: BackendVariant = ron::from_str("UniformBlock").unwrap();
        assert_eq!(variant, BackendVariant::UniformBlock);
        assert_eq!(BackendVariant::default(), BackendVariant::Direct);
    }
}
