//! Rigid-body simulation bound to the scene graph
//!
//! Wraps a rapier world. Bodies are attached to named transform nodes; after
//! every [`Simulation::step`] the dynamic bodies' poses are copied back into
//! those nodes by [`Simulation::write_transforms`].

use std::collections::HashMap;
use std::num::NonZeroUsize;

use cgmath::{Matrix4, Quaternion, SquareMatrix, Vector3, Vector4};
use rapier3d::prelude::*;
use thiserror::Error;

use crate::gfx::scene::{NodeId, NodeKind, SceneGraph};

use super::physics_node::{CollisionShape, PhysicsNode};

/// Duration of one simulation tick in seconds.
pub const TICK: f32 = 1.0 / 60.0;
/// Solver iterations per tick.
pub const SOLVER_ITERATIONS: usize = 10;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhysicsError {
    #[error("node {0:?} is not a transform node in the scene graph")]
    NotATransform(NodeId),

    #[error("mass {mass} for '{name}' is negative")]
    NegativeMass { name: String, mass: f32 },

    #[error("box for '{name}' has non-positive half-extents {half_extents:?}")]
    InvalidExtents { name: String, half_extents: [f32; 3] },

    #[error("convex hull for '{name}' is degenerate ({points} points)")]
    DegenerateHull { name: String, points: usize },
}

/// Box dimensions, as half-extents along x, y and z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxExtents {
    pub width: f32,
    pub height: f32,
    pub length: f32,
}

impl BoxExtents {
    pub fn new(width: f32, height: f32, length: f32) -> Self {
        Self {
            width,
            height,
            length,
        }
    }

    pub fn cube(half_extent: f32) -> Self {
        Self::new(half_extent, half_extent, half_extent)
    }
}

/// Rigid-body world plus the bindings to scene nodes.
pub struct Simulation {
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,

    physics_nodes: Vec<PhysicsNode>,
    by_name: HashMap<String, usize>,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new([0.0, -10.0, 0.0])
    }
}

impl Simulation {
    pub fn new(gravity: [f32; 3]) -> Self {
        let mut integration_parameters = IntegrationParameters {
            dt: TICK,
            ..Default::default()
        };
        if let Some(iterations) = NonZeroUsize::new(SOLVER_ITERATIONS) {
            integration_parameters.num_solver_iterations = iterations;
        }

        Self {
            gravity: vector![gravity[0], gravity[1], gravity[2]],
            integration_parameters,
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            physics_nodes: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Attaches a box body to `node` with no offset.
    pub fn add_physics_box_node(
        &mut self,
        graph: &SceneGraph,
        node: NodeId,
        mass: f32,
        extents: BoxExtents,
    ) -> Result<&PhysicsNode, PhysicsError> {
        self.add_physics_box_node_with_offset(graph, node, mass, extents, [0.0; 3])
    }

    /// Attaches a box body to `node`.
    ///
    /// The body starts at the node's transformed origin plus `offset`. Zero
    /// mass makes the body static.
    pub fn add_physics_box_node_with_offset(
        &mut self,
        graph: &SceneGraph,
        node: NodeId,
        mass: f32,
        extents: BoxExtents,
        offset: [f32; 3],
    ) -> Result<&PhysicsNode, PhysicsError> {
        let half_extents = [extents.width, extents.height, extents.length];
        if half_extents.iter().any(|&e| e <= 0.0) {
            return Err(PhysicsError::InvalidExtents {
                name: node_name(graph, node),
                half_extents,
            });
        }

        let collider = ColliderBuilder::cuboid(extents.width, extents.height, extents.length);
        self.add_physics_node(
            graph,
            node,
            collider,
            CollisionShape::Box { half_extents },
            mass,
            offset,
        )
    }

    /// Attaches a convex hull body built from every geometry vertex below `node`.
    ///
    /// Transform nodes below `node` are composed on the way down, so the hull
    /// points are expressed in the body's local frame. Other node kinds are
    /// not supported and their subtrees are ignored.
    pub fn add_physics_convex_hull_node(
        &mut self,
        graph: &SceneGraph,
        node: NodeId,
        mass: f32,
    ) -> Result<&PhysicsNode, PhysicsError> {
        if graph.transform(node).is_none() {
            return Err(PhysicsError::NotATransform(node));
        }

        let mut points = Vec::new();
        for &child in graph.children(node) {
            collect_hull_points(graph, child, Matrix4::identity(), &mut points);
        }
        // Expanded triangle lists repeat every corner
        points.sort_by(|a, b| {
            a.coords
                .as_slice()
                .partial_cmp(b.coords.as_slice())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        points.dedup();

        let collider = ColliderBuilder::convex_hull(&points).ok_or_else(|| {
            PhysicsError::DegenerateHull {
                name: node_name(graph, node),
                points: points.len(),
            }
        })?;

        self.add_physics_node(
            graph,
            node,
            collider,
            CollisionShape::ConvexHull {
                point_count: points.len(),
            },
            mass,
            [0.0; 3],
        )
    }

    fn add_physics_node(
        &mut self,
        graph: &SceneGraph,
        node: NodeId,
        collider: ColliderBuilder,
        shape: CollisionShape,
        mass: f32,
        offset: [f32; 3],
    ) -> Result<&PhysicsNode, PhysicsError> {
        let transform = graph.transform(node).ok_or(PhysicsError::NotATransform(node))?;
        let name = node_name(graph, node);
        if mass < 0.0 {
            return Err(PhysicsError::NegativeMass { name, mass });
        }

        let origin = transform.matrix * Vector4::new(0.0, 0.0, 0.0, 1.0);
        let translation = vector![
            origin.x + offset[0],
            origin.y + offset[1],
            origin.z + offset[2]
        ];

        let (body, collider) = if mass > 0.0 {
            (
                RigidBodyBuilder::dynamic().translation(translation).build(),
                collider.mass(mass).build(),
            )
        } else {
            (
                RigidBodyBuilder::fixed().translation(translation).build(),
                collider.build(),
            )
        };

        let body = self.bodies.insert(body);
        let collider = self
            .colliders
            .insert_with_parent(collider, body, &mut self.bodies);

        log::debug!(
            "Physics node '{}' ({:?}, mass {}) at {:?}",
            name,
            shape,
            mass,
            translation
        );

        let index = self.physics_nodes.len();
        self.by_name.entry(name.clone()).or_insert(index);
        self.physics_nodes.push(PhysicsNode {
            name,
            transform_node: node,
            shape,
            mass,
            body,
            collider,
        });
        Ok(&self.physics_nodes[index])
    }

    /// Advances the world by one fixed tick.
    ///
    /// Forces applied since the previous tick act for this tick only.
    pub fn step(&mut self) {
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None,
            &(),
            &(),
        );

        for physics_node in self.physics_nodes.iter() {
            if let Some(body) = self.bodies.get_mut(physics_node.body) {
                body.reset_forces(false);
            }
        }
    }

    /// Copies every dynamic body's pose into its transform node.
    ///
    /// Static bodies are left alone. Returns the number of nodes written.
    pub fn write_transforms(&self, graph: &mut SceneGraph) -> usize {
        let mut written = 0;
        for physics_node in self.physics_nodes.iter().filter(|n| n.is_dynamic()) {
            let Some(body) = self.bodies.get(physics_node.body) else {
                continue;
            };
            let Some(transform) = graph.transform_mut(physics_node.transform_node) else {
                log::warn!(
                    "Transform node for '{}' no longer exists, skipping",
                    physics_node.name
                );
                continue;
            };
            transform.matrix = body_matrix(body);
            written += 1;
        }
        written
    }

    /// Applies `force` at `relative_position` from the body's centre of mass
    /// for the next tick.
    ///
    /// Returns `false` if no body is bound to a node called `name`.
    pub fn apply_force(&mut self, name: &str, force: [f32; 3], relative_position: [f32; 3]) -> bool {
        let Some(physics_node) = self.physics_node(name) else {
            log::warn!("No physics node named '{name}', ignoring force");
            return false;
        };
        let handle = physics_node.body;
        let Some(body) = self.bodies.get_mut(handle) else {
            return false;
        };

        let point = *body.center_of_mass()
            + vector![
                relative_position[0],
                relative_position[1],
                relative_position[2]
            ];
        body.add_force_at_point(vector![force[0], force[1], force[2]], point, true);
        true
    }

    pub fn physics_node(&self, name: &str) -> Option<&PhysicsNode> {
        self.by_name.get(name).map(|&i| &self.physics_nodes[i])
    }

    pub fn physics_nodes(&self) -> &[PhysicsNode] {
        &self.physics_nodes
    }

    pub fn len(&self) -> usize {
        self.physics_nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.physics_nodes.is_empty()
    }

    /// World position of the body bound to `name`.
    pub fn body_position(&self, name: &str) -> Option<Vector3<f32>> {
        let body = self.bodies.get(self.physics_node(name)?.body)?;
        let t = body.translation();
        Some(Vector3::new(t.x, t.y, t.z))
    }

    pub fn gravity(&self) -> [f32; 3] {
        [self.gravity.x, self.gravity.y, self.gravity.z]
    }
}

fn node_name(graph: &SceneGraph, node: NodeId) -> String {
    graph
        .get(node)
        .map(|n| n.name.clone())
        .unwrap_or_else(|| format!("{node:?}"))
}

fn body_matrix(body: &RigidBody) -> Matrix4<f32> {
    let t = body.translation();
    let q = body.rotation().quaternion();
    Matrix4::from_translation(Vector3::new(t.x, t.y, t.z))
        * Matrix4::from(Quaternion::new(q.w, q.i, q.j, q.k))
}

fn collect_hull_points(
    graph: &SceneGraph,
    id: NodeId,
    matrix: Matrix4<f32>,
    points: &mut Vec<Point<Real>>,
) {
    let Some(node) = graph.get(id) else {
        return;
    };
    match &node.kind {
        NodeKind::Transform(transform) => {
            let matrix = matrix * transform.matrix;
            for &child in node.children() {
                collect_hull_points(graph, child, matrix, points);
            }
        }
        NodeKind::Geometry(geometry) => {
            points.extend(geometry.vertices().iter().map(|v| {
                let p = matrix * Vector4::new(v.position[0], v.position[1], v.position[2], 1.0);
                point![p.x, p.y, p.z]
            }));
        }
        other => {
            log::debug!(
                "Convex hull: {} node '{}' is not supported, skipping",
                other.node_type(),
                node.name
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::scene::{GeometryNode, Node, Vertex3D};
    use approx::assert_relative_eq;

    fn graph_with(nodes: &[(&str, [f32; 3])]) -> (SceneGraph, NodeId) {
        let mut graph = SceneGraph::new();
        let root = graph.insert(Node::group("root"));
        for (name, position) in nodes {
            graph
                .insert_child(
                    root,
                    Node::transform(*name, Matrix4::from_translation(Vector3::from(*position))),
                )
                .unwrap();
        }
        (graph, root)
    }

    #[test]
    fn test_dynamic_body_falls_monotonically() {
        let (mut graph, root) = graph_with(&[("Ball", [0.0, 10.0, 0.0])]);
        let ball = graph.find_transform_node(root, "Ball").unwrap();
        let mut simulation = Simulation::default();
        simulation
            .add_physics_box_node(&graph, ball, 1.0, BoxExtents::cube(0.5))
            .unwrap();

        let mut last_y = 10.0;
        for _ in 0..30 {
            simulation.step();
            assert_eq!(simulation.write_transforms(&mut graph), 1);
            let y = graph.transform(ball).unwrap().matrix.w.y;
            assert!(y < last_y, "{y} should be below {last_y}");
            last_y = y;
        }
    }

    #[test]
    fn test_static_body_is_never_written() {
        let (mut graph, root) = graph_with(&[("Floor", [1.0, 2.0, 3.0])]);
        let floor = graph.find_transform_node(root, "Floor").unwrap();
        let before = graph.transform(floor).unwrap().matrix;

        let mut simulation = Simulation::default();
        simulation
            .add_physics_box_node_with_offset(
                &graph,
                floor,
                0.0,
                BoxExtents::new(50.0, 50.0, 50.0),
                [0.0, -50.0, 0.0],
            )
            .unwrap();
        for _ in 0..10 {
            simulation.step();
            assert_eq!(simulation.write_transforms(&mut graph), 0);
        }
        assert_eq!(graph.transform(floor).unwrap().matrix, before);

        let position = simulation.body_position("Floor").unwrap();
        assert_relative_eq!(position.y, -48.0);
    }

    #[test]
    fn test_box_comes_to_rest_on_floor() {
        let (mut graph, root) = graph_with(&[("Floor", [0.0, 0.0, 0.0]), ("Cube", [0.0, 3.0, 0.0])]);
        let floor = graph.find_transform_node(root, "Floor").unwrap();
        let cube = graph.find_transform_node(root, "Cube").unwrap();

        let mut simulation = Simulation::default();
        simulation
            .add_physics_box_node_with_offset(
                &graph,
                floor,
                0.0,
                BoxExtents::cube(50.0),
                [0.0, -50.0, 0.0],
            )
            .unwrap();
        simulation
            .add_physics_box_node(&graph, cube, 1.0, BoxExtents::cube(0.5))
            .unwrap();

        for _ in 0..120 {
            simulation.step();
            simulation.write_transforms(&mut graph);
        }
        assert_relative_eq!(graph.transform(cube).unwrap().matrix.w.y, 0.5, epsilon = 0.05);
    }

    #[test]
    fn test_stale_transform_node_is_skipped() {
        let (mut graph, root) = graph_with(&[("Cube", [0.0, 3.0, 0.0])]);
        let cube = graph.find_transform_node(root, "Cube").unwrap();
        let mut simulation = Simulation::default();
        simulation
            .add_physics_box_node(&graph, cube, 1.0, BoxExtents::cube(0.5))
            .unwrap();

        graph.destroy(cube);
        simulation.step();
        assert_eq!(simulation.write_transforms(&mut graph), 0);
    }

    #[test]
    fn test_rejects_non_transform_and_bad_input() {
        let (graph, root) = graph_with(&[("Cube", [0.0, 0.0, 0.0])]);
        let cube = graph.find_transform_node(root, "Cube").unwrap();
        let mut simulation = Simulation::default();

        assert!(matches!(
            simulation.add_physics_box_node(&graph, root, 1.0, BoxExtents::cube(0.5)),
            Err(PhysicsError::NotATransform(_))
        ));
        assert!(matches!(
            simulation.add_physics_box_node(&graph, cube, -1.0, BoxExtents::cube(0.5)),
            Err(PhysicsError::NegativeMass { .. })
        ));
        assert!(matches!(
            simulation.add_physics_box_node(&graph, cube, 1.0, BoxExtents::new(1.0, 0.0, 1.0)),
            Err(PhysicsError::InvalidExtents { .. })
        ));
        assert!(simulation.is_empty());
    }

    #[test]
    fn test_apply_force_to_unknown_node_is_ignored() {
        let mut simulation = Simulation::default();
        assert!(!simulation.apply_force("Nobody", [0.0, 100.0, 0.0], [0.0; 3]));
    }

    #[test]
    fn test_force_acts_for_one_tick() {
        let (graph, root) = graph_with(&[("Cube", [0.0, 0.0, 0.0])]);
        let cube = graph.find_transform_node(root, "Cube").unwrap();
        let mut simulation = Simulation::new([0.0, 0.0, 0.0]);
        simulation
            .add_physics_box_node(&graph, cube, 1.0, BoxExtents::cube(0.5))
            .unwrap();

        assert!(simulation.apply_force("Cube", [60.0, 0.0, 0.0], [0.0; 3]));
        simulation.step();
        let after_push = simulation.body_position("Cube").unwrap().x;
        simulation.step();
        let second = simulation.body_position("Cube").unwrap().x - after_push;
        simulation.step();
        let third = simulation.body_position("Cube").unwrap().x - after_push - second;

        assert!(second > 0.0);
        // constant velocity once the force is gone
        assert_relative_eq!(second, third, epsilon = 1e-4);
    }

    #[test]
    fn test_convex_hull_composes_nested_transforms() {
        let mut graph = SceneGraph::new();
        let root = graph.insert(Node::group("root"));
        let body = graph
            .insert_child(root, Node::transform("Hull", Matrix4::from_translation(Vector3::new(0.0, 5.0, 0.0))))
            .unwrap();
        let inner = graph
            .insert_child(body, Node::transform("Inner", Matrix4::from_scale(2.0)))
            .unwrap();
        let vertices = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ]
        .map(|p| Vertex3D::new(p, [0.0, 1.0, 0.0], [0.0, 0.0]));
        graph
            .insert_child(inner, Node::geometry("Tetra", GeometryNode::from_vertices(vertices.to_vec())))
            .unwrap();
        graph.insert_child(body, Node::group("Ignored")).unwrap();

        let mut simulation = Simulation::default();
        let physics_node = simulation
            .add_physics_convex_hull_node(&graph, body, 1.0)
            .unwrap();
        assert_eq!(physics_node.shape, CollisionShape::ConvexHull { point_count: 4 });
        assert_relative_eq!(simulation.body_position("Hull").unwrap().y, 5.0);
    }

    #[test]
    fn test_convex_hull_without_geometry_is_degenerate() {
        let (graph, root) = graph_with(&[("Empty", [0.0, 0.0, 0.0])]);
        let empty = graph.find_transform_node(root, "Empty").unwrap();
        let mut simulation = Simulation::default();
        assert!(matches!(
            simulation.add_physics_convex_hull_node(&graph, empty, 1.0),
            Err(PhysicsError::DegenerateHull { points: 0, .. })
        ));
    }
}
