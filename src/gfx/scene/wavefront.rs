//! Wavefront OBJ/MTL import
//!
//! Turns `tobj` models into scene graph nodes:
//!
//! ```text
//! Group "<stem>[<path>]"
//! ├── Material "<mtl name>"
//! │   └── Transform "<shape>"          (translation to the shape centre)
//! │       └── Geometry "<shape>_Geometry"
//! └── Material "default"               (only when a shape has no valid material)
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use cgmath::{InnerSpace, Vector3};
use thiserror::Error;

use super::node::{GeometryNode, MaterialNode, Node, NodeId};
use super::scene::{SceneGraph, SceneGraphError};
use super::vertex::Vertex3D;

pub const DEFAULT_MATERIAL_NAME: &str = "default";

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("failed to load '{path}': {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },

    #[error("'{0}' does not contain any geometry")]
    NoGeometry(String),

    #[error(transparent)]
    Graph(#[from] SceneGraphError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedMaterial {
    pub name: String,
    pub diffuse_texture: String,
}

#[derive(Debug, Clone)]
pub struct ImportedShape {
    pub name: String,
    pub geometry: GeometryNode,
    /// Index into [`WavefrontImport::materials`].
    pub material: usize,
}

/// Geometry and materials read from one OBJ file, ready to be built into a graph.
#[derive(Debug, Clone)]
pub struct WavefrontImport {
    pub name: String,
    pub materials: Vec<ImportedMaterial>,
    pub shapes: Vec<ImportedShape>,
    /// Every distinct diffuse texture name referenced by the materials.
    pub textures: BTreeSet<String>,
}

impl WavefrontImport {
    /// Loads an OBJ file and its material libraries from disk.
    ///
    /// A missing or broken MTL file is not fatal; every shape then falls back
    /// to the default material.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ImportError> {
        let path = path.as_ref();
        let (models, materials) =
            tobj::load_obj(path, &load_options()).map_err(|source| ImportError::Load {
                path: path.to_path_buf(),
                source,
            })?;

        let materials = materials.unwrap_or_else(|err| {
            log::warn!("No usable MTL for '{}': {err}", path.display());
            Vec::new()
        });

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = format!("{}[{}]", stem, path.display());

        Self::from_models(name, &models, &materials)
    }

    /// Converts already-parsed `tobj` data.
    pub fn from_models(
        name: impl Into<String>,
        models: &[tobj::Model],
        materials: &[tobj::Material],
    ) -> Result<Self, ImportError> {
        let name = name.into();
        let mut textures = BTreeSet::new();

        let mut imported_materials: Vec<ImportedMaterial> = materials
            .iter()
            .enumerate()
            .map(|(i, mtl)| {
                let diffuse_texture = mtl
                    .diffuse_texture
                    .as_deref()
                    .map(normalize_texture_path)
                    .unwrap_or_default();
                if !diffuse_texture.is_empty() {
                    textures.insert(diffuse_texture.clone());
                }
                ImportedMaterial {
                    name: if mtl.name.is_empty() {
                        format!("material_{i}")
                    } else {
                        mtl.name.clone()
                    },
                    diffuse_texture,
                }
            })
            .collect();

        let mut default_material = None;
        let mut shapes = Vec::new();

        for model in models {
            let vertices = expand_triangles(&model.mesh);
            if vertices.is_empty() {
                log::warn!("Shape '{}' has no geometry, skipping", model.name);
                continue;
            }

            let material = match model.mesh.material_id {
                Some(id) if id < materials.len() => id,
                invalid => {
                    log::warn!(
                        "Invalid material index {:?} on '{}', using default material",
                        invalid,
                        model.name
                    );
                    *default_material.get_or_insert_with(|| {
                        imported_materials.push(ImportedMaterial {
                            name: DEFAULT_MATERIAL_NAME.to_string(),
                            diffuse_texture: String::new(),
                        });
                        imported_materials.len() - 1
                    })
                }
            };

            shapes.push(ImportedShape {
                name: model.name.clone(),
                geometry: GeometryNode::from_vertices(vertices),
                material,
            });
        }

        if shapes.is_empty() {
            return Err(ImportError::NoGeometry(name));
        }

        log::info!(
            "Imported '{}': {} shapes, {} materials, {} textures",
            name,
            shapes.len(),
            imported_materials.len(),
            textures.len()
        );

        Ok(Self {
            name,
            materials: imported_materials,
            shapes,
            textures,
        })
    }

    /// Builds the imported nodes under `parent` and returns the new group node.
    pub fn build(self, graph: &mut SceneGraph, parent: NodeId) -> Result<NodeId, ImportError> {
        let group = graph.insert_child(parent, Node::group(self.name))?;

        let mut material_nodes = Vec::with_capacity(self.materials.len());
        for material in self.materials {
            let id = graph.insert_child(
                group,
                Node::material(material.name, MaterialNode::new(material.diffuse_texture)),
            )?;
            material_nodes.push(id);
        }

        for shape in self.shapes {
            let Some(&material) = material_nodes.get(shape.material) else {
                log::warn!(
                    "Shape '{}' refers to material {} which does not exist, skipping",
                    shape.name,
                    shape.material
                );
                continue;
            };
            let transform = graph.insert_child(
                material,
                Node::transform(
                    shape.name.clone(),
                    cgmath::Matrix4::from_translation(shape.geometry.center()),
                ),
            )?;
            graph.insert_child(
                transform,
                Node::geometry(format!("{}_Geometry", shape.name), shape.geometry),
            )?;
        }

        Ok(group)
    }
}

fn load_options() -> tobj::LoadOptions {
    tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    }
}

fn normalize_texture_path(name: &str) -> String {
    name.replace("\\\\", "/").replace('\\', "/")
}

/// Expands indexed triangles into a flat vertex list.
///
/// Missing normals are replaced by the face normal, missing texture
/// coordinates by zero. The V coordinate is flipped.
fn expand_triangles(mesh: &tobj::Mesh) -> Vec<Vertex3D> {
    let position = |i: usize| -> Option<[f32; 3]> {
        mesh.positions.get(3 * i..3 * i + 3).map(|p| [p[0], p[1], p[2]])
    };
    let normal = |i: usize| -> Option<[f32; 3]> {
        mesh.normals.get(3 * i..3 * i + 3).map(|n| [n[0], n[1], n[2]])
    };
    let tex_coord = |i: usize| -> [f32; 2] {
        mesh.texcoords
            .get(2 * i..2 * i + 2)
            .map(|t| [t[0], 1.0 - t[1]])
            .unwrap_or([0.0, 0.0])
    };

    let mut vertices = Vec::with_capacity(mesh.indices.len());
    for triangle in mesh.indices.chunks_exact(3) {
        let idx = [
            triangle[0] as usize,
            triangle[1] as usize,
            triangle[2] as usize,
        ];
        let (Some(p0), Some(p1), Some(p2)) = (position(idx[0]), position(idx[1]), position(idx[2]))
        else {
            log::warn!("Triangle {:?} references a missing position, skipping", idx);
            continue;
        };
        let positions = [p0, p1, p2];

        let face_normal = face_normal(p0, p1, p2);
        for (k, &i) in idx.iter().enumerate() {
            vertices.push(Vertex3D::new(
                positions[k],
                normal(i).unwrap_or(face_normal),
                tex_coord(i),
            ));
        }
    }
    vertices
}

fn face_normal(p0: [f32; 3], p1: [f32; 3], p2: [f32; 3]) -> [f32; 3] {
    let v0 = Vector3::from(p0);
    let n = (Vector3::from(p1) - v0).cross(Vector3::from(p2) - v0);
    if n.magnitude2() > 0.0 {
        n.normalize().into()
    } else {
        [0.0, 0.0, 0.0]
    }
}
