//! Scene graph arena
//!
//! Nodes live in a [`SlotMap`] and reference each other through [`NodeId`]
//! keys. The graph owns every node; parents own their children through the
//! tree shape, and anything else (physics bindings, render caches) holds a
//! plain `NodeId` that goes stale once the node is destroyed.

use slotmap::SlotMap;
use thiserror::Error;

use super::node::{GeometryNode, Node, NodeId, NodeKind, NodeType, TransformNode};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneGraphError {
    #[error("node {0:?} does not exist")]
    MissingNode(NodeId),

    #[error("node '{0}' already has a parent")]
    AlreadyParented(String),

    #[error("attaching '{child}' under '{parent}' would create a cycle")]
    Cycle { parent: String, child: String },
}

/// Hierarchical collection of named, typed nodes.
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: SlotMap<NodeId, Node>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a detached node and returns its id.
    pub fn insert(&mut self, node: Node) -> NodeId {
        let mut node = node;
        node.parent = None;
        node.children.clear();
        self.nodes.insert(node)
    }

    /// Appends `child` to the children of `parent`.
    ///
    /// The graph stays a tree: a child may only have one parent and may not be
    /// an ancestor of `parent`.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneGraphError> {
        if !self.nodes.contains_key(parent) {
            return Err(SceneGraphError::MissingNode(parent));
        }
        let child_node = self
            .nodes
            .get(child)
            .ok_or(SceneGraphError::MissingNode(child))?;
        if child_node.parent.is_some() {
            return Err(SceneGraphError::AlreadyParented(child_node.name.clone()));
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(SceneGraphError::Cycle {
                parent: self.nodes[parent].name.clone(),
                child: child_node.name.clone(),
            });
        }

        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
        Ok(())
    }

    /// Inserts `node` and attaches it under `parent` in one step.
    pub fn insert_child(&mut self, parent: NodeId, node: Node) -> Result<NodeId, SceneGraphError> {
        if !self.nodes.contains_key(parent) {
            return Err(SceneGraphError::MissingNode(parent));
        }
        let id = self.insert(node);
        self.add_child(parent, id)?;
        Ok(id)
    }

    fn is_ancestor_or_self(&self, candidate: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == candidate {
                return true;
            }
            match self.nodes.get(node).and_then(|n| n.parent) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    /// Children of `id` in order, or an empty slice for a stale id.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id).map(|n| n.children()).unwrap_or(&[])
    }

    /// Depth-first pre-order iterator over the subtree rooted at `start`.
    pub fn preorder(&self, start: NodeId) -> Preorder<'_> {
        let stack = if self.nodes.contains_key(start) {
            vec![start]
        } else {
            Vec::new()
        };
        Preorder { graph: self, stack }
    }

    /// First node named `name` in a pre-order walk from `start` (inclusive).
    pub fn find(&self, start: NodeId, name: &str) -> Option<NodeId> {
        self.preorder(start)
            .find(|&id| self.nodes[id].name == name)
    }

    /// Like [`find`](Self::find) but also requires the node type to match.
    ///
    /// A same-named node of a different type earlier in the walk does not
    /// stop the search.
    pub fn find_typed(&self, start: NodeId, name: &str, node_type: NodeType) -> Option<NodeId> {
        self.preorder(start).find(|&id| {
            let node = &self.nodes[id];
            node.name == name && node.node_type() == node_type
        })
    }

    pub fn find_transform_node(&self, start: NodeId, name: &str) -> Option<NodeId> {
        self.find_typed(start, name, NodeType::Transform)
    }

    pub fn transform(&self, id: NodeId) -> Option<&TransformNode> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Transform(transform) => Some(transform),
            _ => None,
        }
    }

    pub fn transform_mut(&mut self, id: NodeId) -> Option<&mut TransformNode> {
        match &mut self.nodes.get_mut(id)?.kind {
            NodeKind::Transform(transform) => Some(transform),
            _ => None,
        }
    }

    pub fn geometry(&self, id: NodeId) -> Option<&GeometryNode> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Geometry(geometry) => Some(geometry),
            _ => None,
        }
    }

    /// Enables or disables a switch node. Returns `false` if `id` is not a switch.
    pub fn set_switch(&mut self, id: NodeId, enabled: bool) -> bool {
        match self.nodes.get_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Switch(switch)) => {
                switch.enabled = enabled;
                true
            }
            _ => false,
        }
    }

    /// Destroys the subtree rooted at `id`, children before parents.
    ///
    /// The root of the subtree is detached from its parent first. Returns the
    /// number of nodes freed; a stale id frees nothing.
    pub fn destroy(&mut self, id: NodeId) -> usize {
        let Some(parent) = self.nodes.get(id).map(|n| n.parent) else {
            return 0;
        };
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(p)) {
            parent.children.retain(|&c| c != id);
        }

        let mut freed = 0;
        self.destroy_postorder(id, &mut freed);
        freed
    }

    fn destroy_postorder(&mut self, id: NodeId, freed: &mut usize) {
        let children = match self.nodes.get_mut(id) {
            Some(node) => std::mem::take(&mut node.children),
            None => return,
        };
        for child in children {
            self.destroy_postorder(child, freed);
        }
        if let Some(node) = self.nodes.remove(id) {
            log::trace!("Destroyed {} node '{}'", node.node_type(), node.name);
            *freed += 1;
        }
    }

    /// True when every node reachable from `root` is reached exactly once and
    /// each child points back at the parent that lists it.
    ///
    /// `root` may itself have a parent, so an imported subtree can be checked
    /// in place.
    pub fn is_tree(&self, root: NodeId) -> bool {
        if !self.nodes.contains_key(root) {
            return false;
        }

        let mut seen = std::collections::HashSet::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                return false;
            }
            let Some(node) = self.nodes.get(id) else {
                return false;
            };
            for &child in node.children.iter() {
                if self.parent(child) != Some(id) {
                    return false;
                }
                stack.push(child);
            }
        }
        true
    }
}

/// Pre-order iterator returned by [`SceneGraph::preorder`].
pub struct Preorder<'a> {
    graph: &'a SceneGraph,
    stack: Vec<NodeId>,
}

impl Iterator for Preorder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        if let Some(node) = self.graph.nodes.get(id) {
            self.stack.extend(node.children.iter().rev().copied());
        }
        Some(id)
    }
}
