use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use glam::Vec2;
use log::{debug, error, info};
use winit::{
    dpi::LogicalSize,
    event::{ElementState, Event, KeyEvent, MouseScrollDelta, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

use crate::assets::TextureCache;
use crate::factory::{NodeDefinition, NodeFactory};
use crate::gamepad::GamepadPoller;
use crate::input::InputState;
use crate::render::{DrawList, GpuRenderer, SpriteBatch};
use crate::scene::Scene;

/// Configuration values for the engine window and runtime behavior.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    /// Frames per second; the physics step is derived from it.
    pub target_fps: u32,
    /// Directory texture and map paths are resolved against.
    pub content_root: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            title: "Kinetic2D".into(),
            width: 1280,
            height: 720,
            vsync: true,
            target_fps: 60,
            content_root: PathBuf::from("content"),
        }
    }
}

/// Main entrypoint for running a kinetic2d game in a window.
pub struct Engine {
    config: EngineConfig,
    factory: NodeFactory,
}

impl Engine {
    /// Create a new engine instance with default configuration.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            factory: NodeFactory::new(),
        }
    }

    /// Override the window title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.config.title = title.into();
        self
    }

    /// Override the initial window size in logical pixels.
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.config.width = width;
        self.config.height = height;
        self
    }

    /// Enable or disable vertical sync.
    #[must_use]
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.config.vsync = vsync;
        self
    }

    #[must_use]
    pub fn with_frame_rate(mut self, fps: u32) -> Self {
        self.config.target_fps = fps.max(1);
        self
    }

    #[must_use]
    pub fn with_content_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.content_root = root.into();
        self
    }

    /// Register a node definition for map objects of `type_name`.
    #[must_use]
    pub fn register_definition(
        mut self,
        type_name: &str,
        definition: impl NodeDefinition + 'static,
    ) -> Self {
        self.factory.register_definition(type_name, definition);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build the headless application driver without opening a window.
    pub fn into_app(self) -> App {
        App::new(EngineContext::new(self.config).with_factory(self.factory))
    }

    /// Run `scene` until the window is closed or the game requests exit.
    pub fn run(self, scene: Scene) -> Result<()> {
        let config = self.config.clone();

        let event_loop = EventLoop::new()?;
        let mut window_attributes = Window::default_attributes();
        window_attributes.title = config.title.clone();
        window_attributes.inner_size = Some(LogicalSize::new(config.width, config.height).into());
        let window = event_loop.create_window(window_attributes)?;

        // The window lives for the rest of the process.
        let window: &'static Window = Box::leak(Box::new(window));

        let mut renderer = GpuRenderer::new(window, config.vsync)?;
        let mut gamepads = GamepadPoller::new();
        let mut app = self.into_app();
        app.change_scene(scene);

        let step = app.engine().fixed_timestep();
        let mut frame = DrawList::new();
        let mut next_frame = Instant::now();
        info!(
            "running '{}' at {}x{}, {} fps",
            config.title, config.width, config.height, config.target_fps
        );

        event_loop.run(move |event, elwt| match event {
            Event::WindowEvent { event, .. } => {
                app.engine_mut().handle_window_event(&event);

                match event {
                    WindowEvent::CloseRequested => elwt.exit(),
                    WindowEvent::KeyboardInput { event, .. } => {
                        if is_escape_pressed(&event) {
                            elwt.exit();
                        }
                    }
                    WindowEvent::Resized(new_size) => renderer.resize(new_size),
                    WindowEvent::RedrawRequested => {
                        if let Err(err) = app.draw(&mut frame) {
                            error!("draw failed: {err:?}");
                            elwt.exit();
                            return;
                        }
                        if let Err(err) = renderer.present(frame.commands(), app.engine().textures()) {
                            error!("present failed: {err:?}");
                            elwt.exit();
                        }
                        frame.reset();
                    }
                    _ => {}
                }
            }
            Event::AboutToWait => {
                let now = Instant::now();
                if now >= next_frame {
                    gamepads.poll(app.engine_mut().input_mut());
                    if let Err(err) = app.update() {
                        error!("update failed: {err:?}");
                        elwt.exit();
                        return;
                    }
                    if app.engine().exit_requested() {
                        elwt.exit();
                        return;
                    }
                    window.request_redraw();

                    next_frame += step;
                    if next_frame < now {
                        next_frame = now + step;
                    }
                }
                elwt.set_control_flow(ControlFlow::WaitUntil(next_frame));
            }
            Event::LoopExiting => app.shutdown(),
            _ => {}
        })?;

        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

fn is_escape_pressed(event: &KeyEvent) -> bool {
    event.state == ElementState::Pressed
        && matches!(event.physical_key, PhysicalKey::Code(KeyCode::Escape))
}

/// Process-wide state shared by every scene: configuration, the input
/// snapshot, the texture cache and the node factory.
pub struct EngineContext {
    config: EngineConfig,
    input: InputState,
    textures: TextureCache,
    factory: NodeFactory,
    pending_scene: Option<Scene>,
    exit_requested: bool,
    frame_count: u64,
    elapsed_time: Duration,
}

impl EngineContext {
    pub fn new(config: EngineConfig) -> Self {
        let textures = TextureCache::new(config.content_root.clone());
        Self {
            config,
            input: InputState::new(),
            textures,
            factory: NodeFactory::new(),
            pending_scene: None,
            exit_requested: false,
            frame_count: 0,
            elapsed_time: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn with_factory(mut self, factory: NodeFactory) -> Self {
        self.factory = factory;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Access the current input state.
    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }

    pub fn textures(&self) -> &TextureCache {
        &self.textures
    }

    pub fn textures_mut(&mut self) -> &mut TextureCache {
        &mut self.textures
    }

    pub fn factory(&self) -> &NodeFactory {
        &self.factory
    }

    pub fn register_definition(
        &mut self,
        type_name: &str,
        definition: impl NodeDefinition + 'static,
    ) -> bool {
        self.factory.register_definition(type_name, definition)
    }

    /// Replace the active scene at the start of the next frame. A later
    /// request in the same frame wins.
    pub fn change_scene(&mut self, scene: Scene) {
        if self.pending_scene.is_some() {
            debug!("replacing an already pending scene change");
        }
        self.pending_scene = Some(scene);
    }

    pub fn has_pending_scene(&self) -> bool {
        self.pending_scene.is_some()
    }

    pub(crate) fn take_pending_scene(&mut self) -> Option<Scene> {
        self.pending_scene.take()
    }

    /// Request that the engine exit after the current frame.
    pub fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// Duration of one frame at the target frame rate.
    pub fn fixed_timestep(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.config.target_fps.max(1)))
    }

    pub fn viewport(&self) -> Vec2 {
        Vec2::new(self.config.width as f32, self.config.height as f32)
    }

    pub fn content_root(&self) -> &Path {
        &self.config.content_root
    }

    pub fn content_path(&self, relative: &str) -> PathBuf {
        self.config.content_root.join(relative)
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Simulated time: frames run times the fixed timestep.
    pub fn elapsed_time(&self) -> Duration {
        self.elapsed_time
    }

    pub fn handle_window_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    self.input.handle_key(code, event.state);
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.input.handle_mouse_button(*button, *state)
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.input.handle_cursor_moved(position.x, position.y)
            }
            WindowEvent::MouseWheel { delta, .. } => match delta {
                MouseScrollDelta::LineDelta(_, y) => self.input.handle_wheel(*y),
                MouseScrollDelta::PixelDelta(position) => {
                    self.input.handle_wheel(position.y as f32 / 120.0)
                }
            },
            WindowEvent::Resized(size) => {
                self.config.width = size.width;
                self.config.height = size.height;
            }
            _ => {}
        }
    }

    fn advance_frame(&mut self) {
        self.frame_count += 1;
        self.elapsed_time += self.fixed_timestep();
    }
}

/// Drives the active scene: applies deferred scene changes, then runs one
/// update and one draw per frame. The window runner wraps it; tests and
/// tools can drive it directly.
pub struct App {
    engine: EngineContext,
    scene: Option<Scene>,
}

impl App {
    pub fn new(engine: EngineContext) -> Self {
        Self {
            engine,
            scene: None,
        }
    }

    pub fn engine(&self) -> &EngineContext {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut EngineContext {
        &mut self.engine
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    pub fn scene_mut(&mut self) -> Option<&mut Scene> {
        self.scene.as_mut()
    }

    pub fn change_scene(&mut self, scene: Scene) {
        self.engine.change_scene(scene);
    }

    /// Promote the frame's input, swap in a pending scene, then step and
    /// update the active one.
    pub fn update(&mut self) -> Result<()> {
        self.engine.input.refresh();
        self.apply_pending_scene()?;

        if let Some(scene) = self.scene.as_mut() {
            scene.update(&mut self.engine)?;
        }
        self.engine.advance_frame();
        Ok(())
    }

    pub fn draw(&mut self, batch: &mut dyn SpriteBatch) -> Result<()> {
        match self.scene.as_mut() {
            Some(scene) => scene.draw(&mut self.engine, batch),
            None => Ok(()),
        }
    }

    /// One complete frame: update, then draw into `batch`.
    pub fn run_frame(&mut self, batch: &mut dyn SpriteBatch) -> Result<()> {
        self.update()?;
        self.draw(batch)
    }

    /// Destroy the active scene, if any.
    pub fn shutdown(&mut self) {
        if let Some(mut scene) = self.scene.take() {
            scene.destroy(&mut self.engine);
        }
    }

    fn apply_pending_scene(&mut self) -> Result<()> {
        let Some(mut next) = self.engine.take_pending_scene() else {
            return Ok(());
        };

        if let Some(mut previous) = self.scene.take() {
            previous.destroy(&mut self.engine);
        }
        next.initialize(&mut self.engine)
            .context("failed to initialize scene")?;
        self.scene = Some(next);
        Ok(())
    }
}
