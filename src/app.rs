use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowAttributes},
};

use crate::application::Application;
use crate::config::SceneDescription;
use crate::driver::{FrameClock, FrameDriver, FrameTarget};
use crate::gfx::rendering::RenderEngine;

/// Windowed host: one [`Application`] and one [`RenderEngine`] driven at a fixed timestep.
///
/// | Key          | Action                                  |
/// |--------------|-----------------------------------------|
/// | Enter        | reload the scene description from disk  |
/// | Q / Escape   | quit                                    |
/// | others       | camera, see [`CameraController`](crate::gfx::camera::CameraController) |
pub struct SimsceneApp {
    event_loop: Option<EventLoop<()>>,
    app_state: AppState,
}

struct AppState {
    window: Option<Arc<Window>>,
    description_path: PathBuf,
    description: SceneDescription,
    base_dir: PathBuf,
    application: Option<Application>,
    render_engine: Option<RenderEngine>,
    driver: FrameDriver,
    clock: FrameClock,
    fatal: Option<anyhow::Error>,
}

impl SimsceneApp {
    /// Loads the scene described at `description_path`. The window is created
    /// once the event loop starts.
    pub fn new(description_path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let description_path = description_path.into();
        let event_loop = EventLoop::new().context("Failed to create event loop")?;

        let (application, description, base_dir) =
            Application::from_description_file(&description_path).with_context(|| {
                format!("Failed to load scene '{}'", description_path.display())
            })?;

        Ok(Self {
            event_loop: Some(event_loop),
            app_state: AppState {
                window: None,
                driver: FrameDriver::from_settings(&description.driver),
                description_path,
                description,
                base_dir,
                application: Some(application),
                render_engine: None,
                clock: FrameClock::new(),
                fatal: None,
            },
        })
    }

    /// Run the application (consumes self and starts the event loop)
    pub fn run(mut self) -> anyhow::Result<()> {
        let event_loop = self
            .event_loop
            .take()
            .context("Event loop already consumed")?;
        event_loop.set_control_flow(ControlFlow::Poll);

        event_loop
            .run_app(&mut self.app_state)
            .context("Event loop failed")?;

        match self.app_state.fatal.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl AppState {
    fn create_renderer(&self, window: Arc<Window>) -> anyhow::Result<RenderEngine> {
        let application = self
            .application
            .as_ref()
            .context("No scene loaded")?;
        let (width, height) = window.inner_size().into();
        pollster::block_on(RenderEngine::new(
            window,
            width,
            height,
            application.render_settings(),
            application.images(),
        ))
    }

    /// Drops the current application and renderer and builds a fresh pair.
    fn reload(&mut self) -> anyhow::Result<()> {
        log::info!("Reloading '{}'", self.description_path.display());
        self.render_engine = None;
        self.application = None;

        match SceneDescription::load(&self.description_path) {
            Ok((description, base_dir)) => {
                self.description = description;
                self.base_dir = base_dir;
            }
            Err(err) => log::warn!("{err}; reloading the previous description"),
        }

        let mut application = Application::load(&self.description, &self.base_dir)?;
        if let Some(window) = self.window.clone() {
            let (width, height) = window.inner_size().into();
            application.resize(width, height);
            self.application = Some(application);
            self.render_engine = Some(self.create_renderer(window)?);
        } else {
            self.application = Some(application);
        }

        self.driver = FrameDriver::from_settings(&self.description.driver);
        self.clock.restart();
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.fatal = Some(err);
        event_loop.exit();
    }
}

/// Adapts one frame of the host to the driver.
struct Frame<'a> {
    application: &'a mut Application,
    renderer: &'a mut RenderEngine,
    event_loop: &'a ActiveEventLoop,
}

impl FrameTarget for Frame<'_> {
    fn step(&mut self) {
        self.application.step();
    }

    fn render(&mut self) {
        if let Err(err) = self.application.render(&mut *self.renderer) {
            log::error!("Render failed: {err}");
            self.event_loop.exit();
        }
    }

    fn close_requested(&self) -> bool {
        self.event_loop.exiting()
    }
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let [width, height] = self.description.render.window_size;
        let window = match event_loop.create_window(
            WindowAttributes::default()
                .with_title("simscene")
                .with_inner_size(winit::dpi::LogicalSize::new(width, height)),
        ) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                self.fail(event_loop, anyhow::Error::new(err).context("Failed to create window"));
                return;
            }
        };
        self.window = Some(window.clone());

        let (width, height) = window.inner_size().into();
        if let Some(application) = self.application.as_mut() {
            application.resize(width, height);
        }

        match self.create_renderer(window) {
            Ok(renderer) => self.render_engine = Some(renderer),
            Err(err) => {
                self.fail(event_loop, err);
                return;
            }
        }
        self.clock.restart();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key_code),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => match key_code {
                KeyCode::Escape | KeyCode::KeyQ => event_loop.exit(),
                KeyCode::Enter => {
                    if let Err(err) = self.reload() {
                        self.fail(event_loop, err);
                    }
                }
                _ => {
                    if let Some(application) = self.application.as_mut() {
                        application.handle_key(key_code);
                    }
                }
            },
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                if let Some(application) = self.application.as_mut() {
                    application.resize(width, height);
                }
                if let Some(render_engine) = self.render_engine.as_mut() {
                    render_engine.resize(width, height);
                }
            }
            WindowEvent::RedrawRequested => {
                let (Some(application), Some(renderer)) =
                    (self.application.as_mut(), self.render_engine.as_mut())
                else {
                    return;
                };

                let elapsed = self.clock.tick();
                let mut frame = Frame {
                    application,
                    renderer,
                    event_loop,
                };
                let report = self.driver.advance(elapsed, &mut frame);
                if report.forced_renders > 0 {
                    log::debug!(
                        "Frame ran {} ticks with {} forced renders",
                        report.steps,
                        report.forced_renders
                    );
                }
            }
            _ => (),
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}
