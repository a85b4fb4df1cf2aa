//! Scene graph node kinds
//!
//! Every node carries a name and one [`NodeKind`] payload. The kind set is
//! closed, so traversals pattern-match instead of downcasting.

use cgmath::{InnerSpace, Matrix4, SquareMatrix, Vector3};

use super::vertex::Vertex3D;

slotmap::new_key_type! {
    /// Versioned handle into a [`SceneGraph`](super::scene::SceneGraph).
    ///
    /// A `NodeId` is a non-owning reference: once the node is destroyed the
    /// id goes stale and every lookup through it returns `None`.
    pub struct NodeId;
}

/// Smallest bounding radius a geometry node reports.
pub const MIN_GEOMETRY_RADIUS: f32 = 0.1;

/// Plain type tag used for type-qualified lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Geometry,
    Group,
    Material,
    Switch,
    Transform,
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NodeType::Geometry => "geometry",
            NodeType::Group => "group",
            NodeType::Material => "material",
            NodeType::Switch => "switch",
            NodeType::Transform => "transform",
        };
        f.write_str(name)
    }
}

/// Triangle soup re-centred around the origin.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryNode {
    vertices: Vec<Vertex3D>,
    center: Vector3<f32>,
    radius: f32,
}

impl GeometryNode {
    /// Builds a geometry node from world-space vertices.
    ///
    /// The centre is the mean vertex position; vertices are translated so the
    /// centre sits at the origin. The radius is the largest distance from the
    /// centre, floored at [`MIN_GEOMETRY_RADIUS`] when it comes out as zero.
    pub fn from_vertices(mut vertices: Vec<Vertex3D>) -> Self {
        let center = if vertices.is_empty() {
            Vector3::new(0.0, 0.0, 0.0)
        } else {
            let sum = vertices
                .iter()
                .fold(Vector3::new(0.0, 0.0, 0.0), |acc, v| {
                    acc + Vector3::from(v.position)
                });
            sum / vertices.len() as f32
        };

        let mut radius: f32 = 0.0;
        for vertex in vertices.iter_mut() {
            let local = Vector3::from(vertex.position) - center;
            radius = radius.max(local.magnitude());
            vertex.position = local.into();
        }

        if radius <= 0.0 {
            log::warn!("Geometry radius is {radius}, using {MIN_GEOMETRY_RADIUS}");
            radius = MIN_GEOMETRY_RADIUS;
        }

        Self {
            vertices,
            center,
            radius,
        }
    }

    pub fn vertices(&self) -> &[Vertex3D] {
        &self.vertices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Mean position of the vertices before re-centring.
    pub fn center(&self) -> Vector3<f32> {
        self.center
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }
}

/// Appearance state applied to the subtree below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialNode {
    /// Logical texture name, resolved against the loaded images at draw time.
    pub diffuse_texture: String,
}

impl MaterialNode {
    pub fn new(diffuse_texture: impl Into<String>) -> Self {
        Self {
            diffuse_texture: diffuse_texture.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchNode {
    pub enabled: bool,
}

impl Default for SwitchNode {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Affine transform for the subtree below it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformNode {
    pub matrix: Matrix4<f32>,
}

impl TransformNode {
    pub fn from_translation(translation: Vector3<f32>) -> Self {
        Self {
            matrix: Matrix4::from_translation(translation),
        }
    }
}

impl Default for TransformNode {
    fn default() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }
}

/// Payload of a scene node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Group,
    Geometry(GeometryNode),
    Material(MaterialNode),
    Switch(SwitchNode),
    Transform(TransformNode),
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Group => NodeType::Group,
            NodeKind::Geometry(_) => NodeType::Geometry,
            NodeKind::Material(_) => NodeType::Material,
            NodeKind::Switch(_) => NodeType::Switch,
            NodeKind::Transform(_) => NodeType::Transform,
        }
    }
}

/// A named node in the scene tree.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Group)
    }

    pub fn geometry(name: impl Into<String>, geometry: GeometryNode) -> Self {
        Self::new(name, NodeKind::Geometry(geometry))
    }

    pub fn material(name: impl Into<String>, material: MaterialNode) -> Self {
        Self::new(name, NodeKind::Material(material))
    }

    pub fn switch(name: impl Into<String>, enabled: bool) -> Self {
        Self::new(name, NodeKind::Switch(SwitchNode { enabled }))
    }

    pub fn transform(name: impl Into<String>, matrix: Matrix4<f32>) -> Self {
        Self::new(name, NodeKind::Transform(TransformNode { matrix }))
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in draw order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn vertex(x: f32, y: f32, z: f32) -> Vertex3D {
        Vertex3D::new([x, y, z], [0.0, 1.0, 0.0], [0.0, 0.0])
    }

    #[test]
    fn test_geometry_is_recentred_around_mean() {
        let geometry = GeometryNode::from_vertices(vec![
            vertex(2.0, 4.0, 0.0),
            vertex(4.0, 4.0, 0.0),
            vertex(3.0, 7.0, 0.0),
        ]);

        assert_relative_eq!(geometry.center().x, 3.0);
        assert_relative_eq!(geometry.center().y, 5.0);
        assert_relative_eq!(geometry.vertices()[0].position[0], -1.0);
        assert_relative_eq!(geometry.vertices()[2].position[1], 2.0);
        assert_relative_eq!(geometry.radius(), 2.0);
    }

    #[test]
    fn test_degenerate_geometry_radius_is_floored() {
        let geometry = GeometryNode::from_vertices(vec![vertex(1.0, 1.0, 1.0); 3]);
        assert_relative_eq!(geometry.radius(), MIN_GEOMETRY_RADIUS);
        assert_eq!(geometry.vertices()[0].position, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_transform_defaults_to_identity() {
        assert_eq!(TransformNode::default().matrix, Matrix4::identity());
        assert!(SwitchNode::default().enabled);
    }

    #[test]
    fn test_kind_reports_type_tag() {
        assert_eq!(Node::group("g").node_type(), NodeType::Group);
        assert_eq!(
            Node::material("m", MaterialNode::new("tex.png")).node_type(),
            NodeType::Material
        );
        assert_eq!(Node::switch("s", false).node_type(), NodeType::Switch);
    }
}
