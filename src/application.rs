//! A loaded scene: graph, physics world and camera
//!
//! [`Application`] is everything that survives between frames except the GPU.
//! It can be built and stepped without a window, which is how the integration
//! tests drive it.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use thiserror::Error;
use winit::keyboard::KeyCode;

use crate::config::{PhysicsEntry, PhysicsShape, RenderSettings, SceneDescription};
use crate::gfx::{
    camera::{CameraController, FlyCamera},
    rendering::{RenderError, SceneRenderer},
    resources::ImageData,
    scene::{ImportError, Node, NodeId, SceneGraph, SceneGraphError, WavefrontImport},
};
use crate::simulation::{BoxExtents, PhysicsError, Simulation};

/// Name of the group every imported file hangs off.
pub const ROOT_NODE_NAME: &str = "scene node";

#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("import failed: {0}")]
    Import(#[from] ImportError),

    #[error("physics setup failed: {0}")]
    Physics(#[from] PhysicsError),

    #[error("scene graph error: {0}")]
    Graph(#[from] SceneGraphError),
}

pub struct Application {
    graph: SceneGraph,
    root: NodeId,
    simulation: Simulation,
    camera: FlyCamera,
    controller: CameraController,
    images: BTreeMap<String, ImageData>,
    render_settings: RenderSettings,
}

impl Application {
    /// Imports every Wavefront file of `description` and binds its physics entries.
    ///
    /// Relative paths resolve against `base_dir`; texture names resolve against
    /// the directory of the OBJ file that references them.
    pub fn load(description: &SceneDescription, base_dir: &Path) -> Result<Self, ApplicationError> {
        let mut graph = SceneGraph::new();
        let root = graph.insert(Node::group(ROOT_NODE_NAME));
        let mut images = BTreeMap::new();

        for file in &description.wavefront_files {
            let path = base_dir.join(file);
            let import = WavefrontImport::load(&path)?;
            let texture_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            for texture in &import.textures {
                if !images.contains_key(texture) {
                    let image = ImageData::load(texture_dir.join(texture));
                    images.insert(texture.clone(), image);
                }
            }
            let group = import.build(&mut graph, root)?;
            log::info!(
                "Imported '{}' ({} nodes so far)",
                graph.get(group).map(|n| n.name.as_str()).unwrap_or_default(),
                graph.len()
            );
        }

        let mut simulation = Simulation::new(description.gravity);
        for entry in &description.physics {
            bind_physics_entry(&mut simulation, &graph, root, entry)?;
        }
        log::info!("Bound {} physics bodies", simulation.len());

        Ok(Self {
            graph,
            root,
            simulation,
            camera: FlyCamera::from_settings(&description.camera),
            controller: CameraController::from_settings(&description.camera),
            images,
            render_settings: description.render,
        })
    }

    /// Loads a `.ron` scene description from disk.
    pub fn from_description_file(path: impl AsRef<Path>) -> anyhow::Result<(Self, SceneDescription, PathBuf)> {
        let (description, base_dir) = SceneDescription::load(path)?;
        let application = Self::load(&description, &base_dir)?;
        Ok((application, description, base_dir))
    }

    /// Advances physics by one tick and writes the new poses into the graph.
    pub fn step(&mut self) -> usize {
        self.simulation.step();
        self.simulation.write_transforms(&mut self.graph)
    }

    pub fn render(&self, renderer: &mut impl SceneRenderer) -> Result<(), RenderError> {
        renderer.render(&self.graph, self.root, &self.camera)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.camera.resize_projection(width, height);
    }

    /// Camera keys. Returns `true` if the key was used.
    pub fn handle_key(&mut self, key: KeyCode) -> bool {
        self.controller.process_key(key, &mut self.camera)
    }

    pub fn apply_force(&mut self, name: &str, force: [f32; 3], relative_position: [f32; 3]) -> bool {
        self.simulation.apply_force(name, force, relative_position)
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    pub fn camera(&self) -> &FlyCamera {
        &self.camera
    }

    /// Decoded textures keyed by the name material nodes use.
    pub fn images(&self) -> &BTreeMap<String, ImageData> {
        &self.images
    }

    pub fn render_settings(&self) -> &RenderSettings {
        &self.render_settings
    }
}

fn bind_physics_entry(
    simulation: &mut Simulation,
    graph: &SceneGraph,
    root: NodeId,
    entry: &PhysicsEntry,
) -> Result<(), PhysicsError> {
    let Some(node) = graph.find_transform_node(root, &entry.node) else {
        log::warn!("No transform node named '{}', physics entry skipped", entry.node);
        return Ok(());
    };

    let result = match entry.shape {
        PhysicsShape::Box {
            width,
            height,
            length,
            offset,
        } => simulation.add_physics_box_node_with_offset(
            graph,
            node,
            entry.mass,
            BoxExtents::new(width, height, length),
            offset,
        ),
        PhysicsShape::ConvexHull => simulation.add_physics_convex_hull_node(graph, node, entry.mass),
    };

    match result {
        Ok(physics_node) => {
            log::debug!(
                "Bound '{}' as {} body",
                physics_node.name,
                if physics_node.is_dynamic() { "dynamic" } else { "static" }
            );
            Ok(())
        }
        Err(
            err @ (PhysicsError::DegenerateHull { .. }
            | PhysicsError::InvalidExtents { .. }
            | PhysicsError::NegativeMass { .. }),
        ) => {
            log::warn!("{err}, physics entry skipped");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CameraSettings;

    fn fixture_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data")
    }

    fn fixture_description(physics: Vec<PhysicsEntry>) -> SceneDescription {
        SceneDescription {
            wavefront_files: vec![PathBuf::from("falling_cubes.obj")],
            physics,
            ..Default::default()
        }
    }

    fn cube_entry(node: &str) -> PhysicsEntry {
        PhysicsEntry {
            node: node.to_string(),
            mass: 1.0,
            shape: PhysicsShape::Box {
                width: 0.5,
                height: 0.5,
                length: 0.5,
                offset: [0.0; 3],
            },
        }
    }

    #[derive(Default)]
    struct MockRenderer {
        frames: usize,
        last_root: Option<NodeId>,
    }

    impl SceneRenderer for MockRenderer {
        fn render(
            &mut self,
            graph: &SceneGraph,
            root: NodeId,
            _camera: &FlyCamera,
        ) -> Result<(), RenderError> {
            assert!(graph.contains(root));
            self.frames += 1;
            self.last_root = Some(root);
            Ok(())
        }
    }

    #[test]
    fn test_load_builds_graph_and_bodies() {
        let description = fixture_description(vec![cube_entry("Cube.000")]);
        let app = Application::load(&description, &fixture_dir()).unwrap();

        assert_eq!(app.graph().get(app.root()).unwrap().name, ROOT_NODE_NAME);
        assert!(app.graph().find_transform_node(app.root(), "Plane").is_some());
        assert_eq!(app.simulation().len(), 1);
    }

    #[test]
    fn test_unknown_physics_node_is_skipped() {
        let description = fixture_description(vec![cube_entry("Nope"), cube_entry("Cube.001")]);
        let app = Application::load(&description, &fixture_dir()).unwrap();
        assert_eq!(app.simulation().len(), 1);
        assert!(app.simulation().physics_node("Cube.001").is_some());
    }

    #[test]
    fn test_negative_mass_entry_is_skipped() {
        let mut entry = cube_entry("Cube.000");
        entry.mass = -1.0;
        let description = fixture_description(vec![entry, cube_entry("Cube.001")]);
        let app = Application::load(&description, &fixture_dir()).unwrap();
        assert_eq!(app.simulation().len(), 1);
        assert!(app.simulation().physics_node("Cube.000").is_none());
    }

    #[test]
    fn test_zero_sized_box_entry_is_skipped() {
        let mut flat = cube_entry("Cube.000");
        flat.shape = PhysicsShape::Box {
            width: 0.0,
            height: 0.5,
            length: 0.5,
            offset: [0.0; 3],
        };
        let description = fixture_description(vec![flat, cube_entry("Cube.001")]);
        let app = Application::load(&description, &fixture_dir()).unwrap();
        assert_eq!(app.simulation().len(), 1);
        assert!(app.simulation().physics_node("Cube.000").is_none());
        assert!(app.simulation().physics_node("Cube.001").is_some());
    }

    #[test]
    fn test_missing_file_is_an_import_error() {
        let description = SceneDescription {
            wavefront_files: vec![PathBuf::from("missing.obj")],
            ..Default::default()
        };
        assert!(matches!(
            Application::load(&description, &fixture_dir()),
            Err(ApplicationError::Import(_))
        ));
    }

    #[test]
    fn test_missing_texture_gets_placeholder() {
        let app = Application::load(&fixture_description(Vec::new()), &fixture_dir()).unwrap();
        let image = app.images().get("textures/crate.png").unwrap();
        assert_eq!(*image, ImageData::placeholder());
    }

    #[test]
    fn test_step_moves_dynamic_bodies_only() {
        let description = fixture_description(vec![cube_entry("Cube.000")]);
        let mut app = Application::load(&description, &fixture_dir()).unwrap();
        let plane = app.graph().find_transform_node(app.root(), "Plane").unwrap();
        let plane_before = app.graph().transform(plane).unwrap().matrix;

        assert_eq!(app.step(), 1);
        assert_eq!(app.graph().transform(plane).unwrap().matrix, plane_before);
    }

    #[test]
    fn test_render_hands_root_to_renderer() {
        let app = Application::load(&fixture_description(Vec::new()), &fixture_dir()).unwrap();
        let mut renderer = MockRenderer::default();
        app.render(&mut renderer).unwrap();
        assert_eq!(renderer.frames, 1);
        assert_eq!(renderer.last_root, Some(app.root()));
    }

    #[test]
    fn test_camera_starts_from_settings() {
        let mut app = Application::load(&fixture_description(Vec::new()), &fixture_dir()).unwrap();
        let settings = CameraSettings::default();
        assert!((app.camera().position.y - settings.height).abs() < 1e-5);
        assert!(app.handle_key(KeyCode::KeyW));
        assert!((app.camera().position.y - settings.height - 1.0).abs() < 1e-5);
        assert!(!app.handle_key(KeyCode::KeyX));
    }
}
