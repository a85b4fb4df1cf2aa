//! # Scene Graph Module
//!
//! Typed node hierarchy that the physics binding mutates and the renderer
//! walks every frame.
//!
//! ## Key Components
//!
//! - [`SceneGraph`] - Arena owning every node, with name and type-qualified lookup
//! - [`Node`] / [`NodeKind`] - Named node and its closed set of payloads
//! - [`NodeId`] - Versioned, non-owning node handle
//! - [`Vertex3D`] - Vertex layout shared with the GPU
//! - [`WavefrontImport`] - Builds subgraphs from Wavefront OBJ/MTL files
//!
//! ## Usage
//!
//! ```no_run
//! use cgmath::{Matrix4, SquareMatrix};
//! use simscene::gfx::scene::{Node, SceneGraph};
//!
//! let mut graph = SceneGraph::new();
//! let root = graph.insert(Node::group("root"));
//! let cube = graph
//!     .insert_child(root, Node::transform("Cube", Matrix4::identity()))
//!     .unwrap();
//! assert_eq!(graph.find_transform_node(root, "Cube"), Some(cube));
//! ```

pub mod node;
pub mod scene;
pub mod vertex;
pub mod wavefront;

// Re-export main types
pub use node::{
    GeometryNode, MaterialNode, Node, NodeId, NodeKind, NodeType, SwitchNode, TransformNode,
};
pub use scene::{SceneGraph, SceneGraphError};
pub use vertex::Vertex3D;
pub use wavefront::{ImportError, ImportedMaterial, ImportedShape, WavefrontImport};
