//! Binding between a rigid body and a scene transform node

use rapier3d::prelude::{ColliderHandle, RigidBodyHandle};

use crate::gfx::scene::NodeId;

/// Collision shape a physics node was created with.
#[derive(Debug, Clone, PartialEq)]
pub enum CollisionShape {
    /// Box with the given half-extents.
    Box { half_extents: [f32; 3] },
    /// Convex hull over the given number of body-local points.
    ConvexHull { point_count: usize },
}

/// One rigid body driving one transform node.
///
/// `transform_node` is a non-owning reference into the scene graph; it is
/// checked on every write-back and a stale id is skipped.
#[derive(Debug, Clone)]
pub struct PhysicsNode {
    pub name: String,
    pub transform_node: NodeId,
    pub shape: CollisionShape,
    pub mass: f32,
    pub(crate) body: RigidBodyHandle,
    pub(crate) collider: ColliderHandle,
}

impl PhysicsNode {
    /// Only bodies with positive mass move and get written back.
    pub fn is_dynamic(&self) -> bool {
        self.mass > 0.0
    }

    pub fn body_handle(&self) -> RigidBodyHandle {
        self.body
    }

    pub fn collider_handle(&self) -> ColliderHandle {
        self.collider
    }
}
