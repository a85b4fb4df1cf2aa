//! Backend-independent scene traversal
//!
//! Rendering a scene graph is two depth-first walks:
//!
//! 1. [`SceneTraversal::materialize`] uploads every geometry node that has no
//!    GPU resource yet. It is idempotent and also visits disabled switches.
//! 2. [`SceneTraversal::draw`] walks the graph in pre-order carrying a
//!    [`TraversalState`] by value. Material nodes set the active texture and
//!    transform nodes set the active matrix for their subtree only; geometry
//!    nodes are drawn with whatever state is active when they are reached.
//!
//! The GPU side lives behind [`RenderBackend`], so the walk itself can be
//! exercised without a device.

use std::collections::{HashMap, HashSet};

use cgmath::{Matrix4, SquareMatrix};
use serde::{Deserialize, Serialize};

use crate::gfx::scene::{GeometryNode, NodeId, NodeKind, SceneGraph};

/// How a transform node combines with the transform inherited from above.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformComposition {
    /// The node's matrix replaces the inherited one.
    #[default]
    Absolute,
    /// The node's matrix is multiplied onto the inherited one.
    Cumulative,
}

/// State active while drawing a subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct TraversalState<T> {
    pub transform: Matrix4<f32>,
    /// `None` means the backend's default texture.
    pub texture: Option<T>,
}

impl<T> Default for TraversalState<T> {
    fn default() -> Self {
        Self {
            transform: Matrix4::identity(),
            texture: None,
        }
    }
}

/// GPU side of the traversal.
pub trait RenderBackend {
    /// Handle to an uploaded geometry.
    type Geometry;
    /// Handle to a loaded texture.
    type Texture: Clone;

    fn upload_geometry(&mut self, geometry: &GeometryNode) -> Self::Geometry;

    /// Frees a geometry whose node no longer exists.
    fn release_geometry(&mut self, _geometry: Self::Geometry) {}

    /// Looks up a texture by the name a material node refers to.
    fn resolve_texture(&mut self, name: &str) -> Option<Self::Texture>;

    fn draw(&mut self, geometry: &Self::Geometry, state: &TraversalState<Self::Texture>);
}

/// Counters for one draw walk.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrawStats {
    pub draw_calls: usize,
    pub disabled_switches: usize,
    pub unmaterialized: usize,
}

/// Stateful walker owning the backend and the per-node geometry cache.
pub struct SceneTraversal<B: RenderBackend> {
    backend: B,
    geometry_cache: HashMap<NodeId, B::Geometry>,
    composition: TransformComposition,
    reported_textures: HashSet<String>,
}

impl<B: RenderBackend> SceneTraversal<B> {
    pub fn new(backend: B, composition: TransformComposition) -> Self {
        Self {
            backend,
            geometry_cache: HashMap::new(),
            composition,
            reported_textures: HashSet::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn composition(&self) -> TransformComposition {
        self.composition
    }

    pub fn set_composition(&mut self, composition: TransformComposition) {
        self.composition = composition;
    }

    pub fn is_materialized(&self, id: NodeId) -> bool {
        self.geometry_cache.contains_key(&id)
    }

    pub fn cached_geometry_count(&self) -> usize {
        self.geometry_cache.len()
    }

    /// Uploads every geometry node below `root` that has no cached handle.
    ///
    /// Handles for nodes that no longer exist are released first. Returns the
    /// number of new uploads, which is zero on an unchanged graph.
    pub fn materialize(&mut self, graph: &SceneGraph, root: NodeId) -> usize {
        let stale: Vec<NodeId> = self
            .geometry_cache
            .keys()
            .filter(|&&id| graph.geometry(id).is_none())
            .copied()
            .collect();
        for id in stale {
            if let Some(geometry) = self.geometry_cache.remove(&id) {
                self.backend.release_geometry(geometry);
            }
        }

        let mut uploaded = 0;
        for id in graph.preorder(root) {
            if self.geometry_cache.contains_key(&id) {
                continue;
            }
            if let Some(geometry) = graph.geometry(id) {
                let handle = self.backend.upload_geometry(geometry);
                self.geometry_cache.insert(id, handle);
                uploaded += 1;
            }
        }

        if uploaded > 0 {
            log::debug!("Materialized {uploaded} geometry nodes");
        }
        uploaded
    }

    /// Draws the subtree rooted at `root`.
    pub fn draw(&mut self, graph: &SceneGraph, root: NodeId) -> DrawStats {
        let mut stats = DrawStats::default();
        self.draw_node(graph, root, TraversalState::default(), &mut stats);
        stats
    }

    fn draw_node(
        &mut self,
        graph: &SceneGraph,
        id: NodeId,
        mut state: TraversalState<B::Texture>,
        stats: &mut DrawStats,
    ) {
        let Some(node) = graph.get(id) else {
            return;
        };

        match &node.kind {
            NodeKind::Group => {}
            NodeKind::Switch(switch) => {
                if !switch.enabled {
                    stats.disabled_switches += 1;
                    return;
                }
            }
            NodeKind::Material(material) => {
                match self.backend.resolve_texture(&material.diffuse_texture) {
                    Some(texture) => state.texture = Some(texture),
                    None => {
                        if !material.diffuse_texture.is_empty()
                            && self
                                .reported_textures
                                .insert(material.diffuse_texture.clone())
                        {
                            log::warn!(
                                "Texture '{}' for material '{}' is not loaded",
                                material.diffuse_texture,
                                node.name
                            );
                        }
                    }
                }
            }
            NodeKind::Transform(transform) => {
                state.transform = match self.composition {
                    TransformComposition::Absolute => transform.matrix,
                    TransformComposition::Cumulative => state.transform * transform.matrix,
                };
            }
            NodeKind::Geometry(_) => match self.geometry_cache.get(&id) {
                Some(geometry) => {
                    self.backend.draw(geometry, &state);
                    stats.draw_calls += 1;
                }
                None => {
                    log::debug!("Geometry '{}' is not materialized, skipping", node.name);
                    stats.unmaterialized += 1;
                }
            },
        }

        for &child in node.children() {
            self.draw_node(graph, child, state.clone(), stats);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::gfx::scene::{MaterialNode, Node, Vertex3D};
    use cgmath::Vector3;

    /// Records every backend call instead of touching a GPU.
    #[derive(Default)]
    pub(crate) struct RecordingBackend {
        pub uploads: usize,
        pub released: Vec<usize>,
        pub textures: Vec<String>,
        pub draws: Vec<(usize, Matrix4<f32>, Option<String>)>,
    }

    impl RenderBackend for RecordingBackend {
        type Geometry = usize;
        type Texture = String;

        fn upload_geometry(&mut self, geometry: &GeometryNode) -> usize {
            self.uploads += 1;
            geometry.vertex_count()
        }

        fn release_geometry(&mut self, geometry: usize) {
            self.released.push(geometry);
        }

        fn resolve_texture(&mut self, name: &str) -> Option<String> {
            self.textures.iter().find(|t| *t == name).cloned()
        }

        fn draw(&mut self, geometry: &usize, state: &TraversalState<String>) {
            self.draws
                .push((*geometry, state.transform, state.texture.clone()));
        }
    }

    fn triangle(vertex_count: usize) -> GeometryNode {
        GeometryNode::from_vertices(
            (0..vertex_count)
                .map(|i| Vertex3D::new([i as f32, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0]))
                .collect(),
        )
    }

    fn translation(x: f32) -> Matrix4<f32> {
        Matrix4::from_translation(Vector3::new(x, 0.0, 0.0))
    }

    /// root
    /// ├── Material "brick"
    /// │   └── Transform A (x=1)
    /// │       ├── Geometry (3 verts)
    /// │       └── Transform B (x=2)
    /// │           └── Geometry (6 verts)
    /// ├── Switch "hidden" (disabled)
    /// │   └── Geometry (9 verts)
    /// └── Geometry (12 verts)
    fn sample() -> (SceneGraph, NodeId) {
        let mut graph = SceneGraph::new();
        let root = graph.insert(Node::group("root"));
        let material = graph
            .insert_child(root, Node::material("brick", MaterialNode::new("brick.png")))
            .unwrap();
        let a = graph
            .insert_child(material, Node::transform("A", translation(1.0)))
            .unwrap();
        graph.insert_child(a, Node::geometry("g3", triangle(3))).unwrap();
        let b = graph
            .insert_child(a, Node::transform("B", translation(2.0)))
            .unwrap();
        graph.insert_child(b, Node::geometry("g6", triangle(6))).unwrap();
        let switch = graph.insert_child(root, Node::switch("hidden", false)).unwrap();
        graph
            .insert_child(switch, Node::geometry("g9", triangle(9)))
            .unwrap();
        graph
            .insert_child(root, Node::geometry("g12", triangle(12)))
            .unwrap();
        (graph, root)
    }

    fn traversal(composition: TransformComposition) -> SceneTraversal<RecordingBackend> {
        let backend = RecordingBackend {
            textures: vec!["brick.png".into()],
            ..Default::default()
        };
        SceneTraversal::new(backend, composition)
    }

    #[test]
    fn test_materialize_is_idempotent() {
        let (graph, root) = sample();
        let mut traversal = traversal(TransformComposition::Absolute);

        // disabled switches are still materialized
        assert_eq!(traversal.materialize(&graph, root), 4);
        assert_eq!(traversal.materialize(&graph, root), 0);
        assert_eq!(traversal.backend().uploads, 4);
    }

    #[test]
    fn test_materialize_releases_destroyed_nodes() {
        let (mut graph, root) = sample();
        let mut traversal = traversal(TransformComposition::Absolute);
        traversal.materialize(&graph, root);

        let hidden = graph.find(root, "hidden").unwrap();
        graph.destroy(hidden);
        assert_eq!(traversal.materialize(&graph, root), 0);
        assert_eq!(traversal.backend().released, vec![9]);
        assert_eq!(traversal.cached_geometry_count(), 3);
    }

    #[test]
    fn test_draw_uses_absolute_transforms_by_default() {
        let (graph, root) = sample();
        let mut traversal = traversal(TransformComposition::Absolute);
        traversal.materialize(&graph, root);
        let stats = traversal.draw(&graph, root);

        assert_eq!(stats.draw_calls, 3);
        assert_eq!(stats.disabled_switches, 1);
        let draws = &traversal.backend().draws;
        assert_eq!(draws[0], (3, translation(1.0), Some("brick.png".into())));
        assert_eq!(draws[1], (6, translation(2.0), Some("brick.png".into())));
    }

    #[test]
    fn test_state_is_scoped_to_subtree() {
        let (graph, root) = sample();
        let mut traversal = traversal(TransformComposition::Absolute);
        traversal.materialize(&graph, root);
        traversal.draw(&graph, root);

        // the sibling after the material subtree sees neither its texture nor its transform
        let last = traversal.backend().draws.last().unwrap();
        assert_eq!(*last, (12, Matrix4::identity(), None));
    }

    #[test]
    fn test_cumulative_composition_multiplies() {
        let (graph, root) = sample();
        let mut traversal = traversal(TransformComposition::Cumulative);
        traversal.materialize(&graph, root);
        traversal.draw(&graph, root);
        assert_eq!(traversal.backend().draws[1].1, translation(3.0));
    }

    #[test]
    fn test_missing_texture_keeps_inherited_state() {
        let mut graph = SceneGraph::new();
        let root = graph.insert(Node::group("root"));
        let outer = graph
            .insert_child(root, Node::material("outer", MaterialNode::new("brick.png")))
            .unwrap();
        let inner = graph
            .insert_child(outer, Node::material("inner", MaterialNode::new("missing.png")))
            .unwrap();
        graph.insert_child(inner, Node::geometry("g", triangle(3))).unwrap();

        let mut traversal = traversal(TransformComposition::Absolute);
        traversal.materialize(&graph, root);
        traversal.draw(&graph, root);
        traversal.draw(&graph, root);
        assert_eq!(traversal.backend().draws[0].2, Some("brick.png".into()));
        assert_eq!(traversal.reported_textures.len(), 1);
    }

    #[test]
    fn test_unmaterialized_geometry_is_skipped() {
        let (graph, root) = sample();
        let mut traversal = traversal(TransformComposition::Absolute);
        let stats = traversal.draw(&graph, root);
        assert_eq!(stats.draw_calls, 0);
        assert_eq!(stats.unmaterialized, 3);
    }

    #[test]
    fn test_enabling_switch_draws_cached_geometry() {
        let (mut graph, root) = sample();
        let mut traversal = traversal(TransformComposition::Absolute);
        traversal.materialize(&graph, root);

        let hidden = graph.find(root, "hidden").unwrap();
        graph.set_switch(hidden, true);
        assert_eq!(traversal.materialize(&graph, root), 0);
        assert_eq!(traversal.draw(&graph, root).draw_calls, 4);
    }
}
