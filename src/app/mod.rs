mod input;
mod timing;

use input::{key_action, InputAction, PointerState};
use timing::{FrameTiming, TitleInfo};

use scenepick::assets::{AssetLoader, LoadedAsset};
use scenepick::consolidate::{ConsolidateOptions, Consolidator};
use scenepick::render::{Camera, CameraController, Renderer};
use scenepick::scene::builders::{box_grid, debug_sphere};
use scenepick::scene::{SceneError, SceneGraph};

use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

const WINDOW_TITLE: &str = "scenepick";
/// Radians of orbit per pixel of drag.
const ORBIT_SPEED: f32 = 0.005;
/// Pixel-scroll distance that counts as one wheel notch.
const PIXELS_PER_LINE: f32 = 40.0;
const LOADER_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DemoScene {
    /// 20 x 20 grid of unit boxes.
    Grid,
    /// One large UV sphere.
    Sphere,
}

impl DemoScene {
    pub fn label(self) -> &'static str {
        match self {
            DemoScene::Grid => "demo grid",
            DemoScene::Sphere => "demo sphere",
        }
    }

    pub fn build(self) -> Result<SceneGraph, SceneError> {
        match self {
            DemoScene::Grid => box_grid(20, 1.2),
            DemoScene::Sphere => debug_sphere([0.0, 0.0, 0.0], 100.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InitialScene {
    Asset(PathBuf),
    Demo(DemoScene),
}

#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub initial: Option<InitialScene>,
    pub consolidate: ConsolidateOptions,
    pub window_size: (u32, u32),
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            initial: None,
            consolidate: ConsolidateOptions::default(),
            window_size: (1280, 720),
        }
    }
}

struct App {
    config: ViewerConfig,
    consolidator: Consolidator,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    loader: AssetLoader,
    pointer: PointerState,
    camera: Camera,
    controller: CameraController,
    timing: FrameTiming,
    fatal: Option<anyhow::Error>,
}

impl App {
    fn new(config: ViewerConfig) -> anyhow::Result<Self> {
        let consolidator =
            Consolidator::new(config.consolidate).context("invalid consolidation options")?;
        let camera = Camera::default();
        Ok(Self {
            config,
            consolidator,
            window: None,
            renderer: None,
            loader: AssetLoader::new(),
            pointer: PointerState::default(),
            controller: CameraController::new(camera.eye, camera.target),
            camera,
            timing: FrameTiming::new(WINDOW_TITLE.to_string()),
            fatal: None,
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.fatal = Some(err);
        event_loop.exit();
    }

    fn init_renderer(&mut self, window: Arc<Window>) -> anyhow::Result<()> {
        let size = window.inner_size();
        let renderer = Renderer::new(window, size.width, size.height)?;
        let options = self
            .config
            .consolidate
            .with_buffer_limit(renderer.max_buffer_size());
        self.consolidator = Consolidator::new(options).context("invalid consolidation options")?;
        self.camera.set_viewport(size.width, size.height);
        self.renderer = Some(renderer);
        Ok(())
    }

    fn load_initial_scene(&mut self) {
        match self.config.initial.clone() {
            Some(InitialScene::Asset(path)) => self.start_load(path),
            Some(InitialScene::Demo(demo)) => match demo.build() {
                Ok(graph) => self.install_graph(demo.label(), &graph),
                Err(err) => log::error!("Failed to build {}: {err}", demo.label()),
            },
            None => log::info!("Drop a .gltf or .glb file onto the window to load it"),
        }
    }

    fn start_load(&mut self, path: PathBuf) {
        if let Err(err) = self.loader.spawn(path) {
            log::error!("{err}");
        }
        self.request_redraw();
    }

    fn finish_load(&mut self, asset: LoadedAsset) {
        self.install_graph(&asset.name, &asset.graph);
    }

    /// Consolidates on this thread, then swaps the result into the renderer.
    fn install_graph(&mut self, name: &str, graph: &SceneGraph) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        let start = Instant::now();
        let scene = match self.consolidator.run(graph) {
            Ok(scene) => scene,
            Err(err) => {
                log::error!("Failed to consolidate '{name}': {err}");
                return;
            }
        };
        let bounds = scene.bounds();
        if let Err(err) = renderer.install_scene(scene) {
            log::error!("Failed to install '{name}': {err}");
            return;
        }
        log::info!(
            "'{}' ready in {:.1} ms",
            name,
            start.elapsed().as_secs_f32() * 1000.0
        );

        if let Some(bounds) = bounds {
            self.controller = CameraController::from_bounds(&bounds);
        }
        self.request_redraw();
    }

    fn handle_action(&mut self, event_loop: &ActiveEventLoop, action: InputAction) {
        match action {
            InputAction::Quit => event_loop.exit(),
            InputAction::ClearModel => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.clear_scene();
                }
            }
            InputAction::ToggleTint => {
                if let Some(renderer) = self.renderer.as_mut() {
                    let enabled = !renderer.tint_enabled();
                    renderer.set_tint_enabled(enabled);
                    log::info!("Tint {}", if enabled { "on" } else { "off" });
                }
            }
            InputAction::FrameScene => {
                let bounds = self
                    .renderer
                    .as_ref()
                    .and_then(|renderer| renderer.scene())
                    .and_then(|scene| scene.bounds());
                if let Some(bounds) = bounds {
                    self.controller.frame_bounds_preserve_orientation(&bounds);
                }
            }
            InputAction::None => return,
        }
        self.request_redraw();
    }

    fn request_redraw(&self) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn title_info(&self) -> TitleInfo {
        let Some(renderer) = &self.renderer else {
            return TitleInfo::default();
        };
        TitleInfo {
            draw_calls: renderer.draw_calls(),
            objects: renderer.scene().map_or(0, |scene| scene.lookup().len()),
            selected: renderer
                .selected_object()
                .map(|info| format!("{} ({})", info.name, info.original_id)),
            loading: self.loader.is_loading(),
        }
    }

    fn render(&mut self, event_loop: &ActiveEventLoop) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        let frame_start = Instant::now();
        self.controller.apply(&mut self.camera);
        if let Err(err) = renderer.render_frame(&self.camera) {
            self.fail(event_loop, anyhow::Error::new(err).context("rendering frame"));
            return;
        }
        if renderer.take_redraw_request() {
            match renderer.take_pick_hit() {
                Some(hit) => log::info!(
                    "Selected {} '{}' ({}, {} tier)",
                    hit.index,
                    hit.info.name,
                    hit.info.original_id,
                    hit.info.tier
                ),
                None => log::debug!("Selection cleared"),
            }
        }
        self.timing
            .set_render_ms(frame_start.elapsed().as_secs_f32() * 1000.0);
        let info = self.title_info();
        self.timing
            .update(self.window.as_deref(), Instant::now(), &info);
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let (width, height) = self.config.window_size;
        let window_attrs = WindowAttributes::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(true);
        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                self.fail(event_loop, anyhow::Error::new(err).context("creating window"));
                return;
            }
        };

        if let Err(err) = self.init_renderer(window.clone()) {
            self.fail(event_loop, err.context("initializing renderer"));
            return;
        }
        self.window = Some(window);
        self.load_initial_scene();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(size.width, size.height);
                }
                self.camera.set_viewport(size.width, size.height);
                self.request_redraw();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && !event.repeat {
                    self.handle_action(event_loop, key_action(event.physical_key));
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let Some((dx, dy)) = self.pointer.moved(position.x as f32, position.y as f32) {
                    self.controller
                        .orbit(dx * ORBIT_SPEED, -dy * ORBIT_SPEED);
                    self.request_redraw();
                }
            }
            WindowEvent::CursorLeft { .. } => self.pointer.left(),
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => self.pointer.pressed(),
                ElementState::Released => {
                    if let Some((x, y)) = self.pointer.released() {
                        if let Some(renderer) = self.renderer.as_mut() {
                            renderer.request_pick(x, y);
                        }
                        self.request_redraw();
                    }
                }
            },
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / PIXELS_PER_LINE,
                };
                self.controller.zoom(steps);
                self.request_redraw();
            }
            WindowEvent::DroppedFile(path) => self.start_load(path),
            WindowEvent::RedrawRequested => self.render(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        match self.loader.poll() {
            Some(Ok(asset)) => self.finish_load(asset),
            Some(Err(err)) => {
                log::error!("{err}");
                self.request_redraw();
            }
            None => {}
        }

        if self.loader.is_loading() {
            event_loop.set_control_flow(ControlFlow::WaitUntil(
                Instant::now() + LOADER_POLL_INTERVAL,
            ));
        } else {
            event_loop.set_control_flow(ControlFlow::Wait);
        }
    }
}

pub fn run(config: ViewerConfig) -> anyhow::Result<()> {
    log::info!("scenepick viewer");
    log::info!("   Drop a glTF/GLB file to load it; click to pick, drag to orbit");
    log::info!("   Keys: Esc quit, C clear, T toggle tint, F frame scene");

    let event_loop = EventLoop::new().context("creating event loop")?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config)?;
    event_loop.run_app(&mut app).context("running event loop")?;

    match app.fatal.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
