mod egui_host;
mod input;
mod timing;

pub use egui_host::EguiFrameOutput;

use crate::assets::{AssetLoader, LoadEvent, LoadedModel};
use crate::config::ViewerConfig;
use crate::environment::{EnvironmentController, EnvironmentMode, SwitchOutcome};
use crate::render::{OrbitControls, RenderContext, RenderError};
use crate::scene::{MaterialOverride, ModelData, ObjectId, SceneObjectKind, SceneState, Transform};
use crate::ui::{TweakPanel, UiAction};
use egui_host::EguiHost;
use glam::Vec3;
use input::{DoubleClickDetector, DragMode, KeyCommand, PointerState};
use timing::FrameTiming;

use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Fullscreen, Window, WindowAttributes, WindowId};

const CAMERA_POSITION: Vec3 = Vec3::new(-0.5, 1.0, 2.0);
const CAMERA_TARGET: Vec3 = Vec3::new(0.0, 0.4, 0.0);
const MODEL_SCALE: f32 = 0.1;
const MODEL_MATERIAL: MaterialOverride = MaterialOverride {
    roughness: 1.0,
    metalness: 0.25,
};
const PIXELS_PER_WHEEL_LINE: f32 = 50.0;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("event loop failed: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}

pub struct App {
    config: ViewerConfig,
    window: Option<Arc<Window>>,
    render: Option<RenderContext>,
    egui: Option<EguiHost>,
    scene: SceneState,
    controller: EnvironmentController,
    loader: AssetLoader,
    panel: TweakPanel,
    camera: OrbitControls,
    pointer: PointerState,
    double_click: DoubleClickDetector,
    timing: FrameTiming,
    model: Option<ObjectId>,
    target_frame_duration: Duration,
    next_frame_time: Instant,
}

impl App {
    fn new(config: ViewerConfig) -> Self {
        let now = Instant::now();
        let mut controller = EnvironmentController::new(config.initial_mode);
        for mode in EnvironmentMode::ALL {
            controller = controller.with_env_map_path(mode, config.env_map(mode));
        }

        let mut app = Self {
            window: None,
            render: None,
            egui: None,
            scene: SceneState::new(),
            controller,
            loader: AssetLoader::new(config.asset_root.clone()),
            panel: TweakPanel::new(),
            camera: OrbitControls::new(CAMERA_POSITION, CAMERA_TARGET),
            pointer: PointerState::default(),
            double_click: DoubleClickDetector::default(),
            timing: FrameTiming::new(config.window.title.clone(), now),
            model: None,
            target_frame_duration: Duration::from_millis(16),
            next_frame_time: now,
            config,
        };

        app.loader.request_model(&app.config.model);
        app.controller
            .set_mode(app.config.initial_mode, &mut app.scene, &mut app.loader);
        app
    }

    fn init_renderer(&mut self, window: Arc<Window>) -> Result<(), RenderError> {
        let render = RenderContext::new(window.clone())?;
        self.egui = Some(EguiHost::new(&window));
        self.render = Some(render);
        Ok(())
    }

    fn update_target_frame_duration(&mut self, window: &Window) {
        let mut target = Duration::from_millis(16);
        if let Some(monitor) = window.current_monitor() {
            if let Some(millihz) = monitor.refresh_rate_millihertz() {
                let hz = millihz as f32 / 1000.0;
                if hz > 1.0 {
                    target = Duration::from_secs_f32(1.0 / hz);
                }
            }
        }
        self.target_frame_duration = target;
        self.next_frame_time = Instant::now() + self.target_frame_duration;
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        if let Some(render) = &mut self.render {
            render.resize(new_size);
        }
    }

    fn toggle_fullscreen(&self) {
        let Some(window) = &self.window else {
            return;
        };
        if window.fullscreen().is_some() {
            window.set_fullscreen(None);
        } else {
            window.set_fullscreen(Some(Fullscreen::Borderless(None)));
        }
    }

    fn handle_key(&mut self, command: KeyCommand, event_loop: &ActiveEventLoop) {
        match command {
            KeyCommand::ToggleFullscreen => self.toggle_fullscreen(),
            KeyCommand::TogglePanel => self.panel.toggle(),
            KeyCommand::Close => {
                log::info!("Escape pressed, shutting down...");
                event_loop.exit();
            }
        }
    }

    fn viewport_height(&self) -> f32 {
        self.render
            .as_ref()
            .map_or(1.0, RenderContext::viewport_height)
    }

    fn handle_drag(&mut self, drag: DragMode, delta: [f32; 2]) {
        let height = self.viewport_height();
        match drag {
            DragMode::Rotate => self.camera.rotate(delta[0], delta[1], height),
            DragMode::Pan => self.camera.pan(delta[0], delta[1], height),
        }
    }

    /// Apply every asset load that finished since the last frame.
    fn drain_loads(&mut self) {
        for event in self.loader.poll() {
            match event {
                LoadEvent::EnvMap { ticket, result } => {
                    match self.controller.complete_load(ticket, result, &mut self.scene) {
                        Ok(SwitchOutcome::Applied(mode)) => {
                            log::debug!(
                                "{} allocated {:?}",
                                mode.label(),
                                self.controller.resources()
                            );
                            self.panel.clear_error();
                        }
                        Ok(SwitchOutcome::Stale) => {}
                        Err(err) => {
                            log::error!("{err}");
                            self.panel.set_error(err.to_string());
                        }
                    }
                }
                LoadEvent::Model { path, result } => match result {
                    Ok(model) => self.attach_model(model),
                    Err(err) => {
                        log::error!("Failed to load model {}: {err}", path.display());
                        self.panel.set_error(format!("model {}: {err}", path.display()));
                    }
                },
            }
        }
    }

    fn attach_model(&mut self, model: Arc<LoadedModel>) {
        if let Some(previous) = self.model.take() {
            self.scene.remove(previous);
        }
        log::info!(
            "Model {} ready ({} primitives)",
            model.name,
            model.primitives.len()
        );
        let id = self.scene.add(
            SceneObjectKind::Model(ModelData {
                model,
                material: MODEL_MATERIAL,
            }),
            Transform::default().with_uniform_scale(MODEL_SCALE),
        );
        self.model = Some(id);
    }

    fn apply_ui_actions(&mut self, actions: Vec<UiAction>) {
        for action in actions {
            match action {
                UiAction::SelectMode(mode) => {
                    log::info!("Switching environment to {}", mode.label());
                    self.panel.clear_error();
                    self.controller
                        .set_mode(mode, &mut self.scene, &mut self.loader);
                }
                UiAction::SetWireframe(wireframe) => {
                    self.controller.set_wireframe(&mut self.scene, wireframe);
                }
            }
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(window) = self.window.clone() else {
            return;
        };
        self.timing.update(Some(&window), Instant::now());

        self.drain_loads();
        let capture = self
            .controller
            .frame_hook()
            .run(&mut self.scene, self.timing.elapsed());

        self.camera.max_polar_angle = self.controller.affordances().polar_limit.max_polar_angle();
        self.camera.update();

        let mut actions = Vec::new();
        let ui_output = self.egui.as_mut().map(|egui| {
            egui.run_ui(&window, |ctx| {
                actions = self.panel.show(ctx, &mut self.scene, &self.controller);
            })
        });
        self.apply_ui_actions(actions);

        let Some(render) = &mut self.render else {
            return;
        };
        if let Err(err) = render.render(&mut self.scene, &self.camera, capture, ui_output.as_ref()) {
            log::error!("Render failed: {err}");
            event_loop.exit();
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = WindowAttributes::default()
            .with_title(self.config.window.title.clone())
            .with_inner_size(PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ))
            .with_resizable(true);

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Failed to create window: {err}");
                event_loop.exit();
                return;
            }
        };

        if let Err(err) = self.init_renderer(window.clone()) {
            log::error!("Failed to initialize renderer: {err}");
            event_loop.exit();
            return;
        }
        self.update_target_frame_duration(&window);
        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let consumed = match (&mut self.egui, &self.window) {
            (Some(egui), Some(window)) => egui.on_window_event(window, &event),
            _ => false,
        };
        let egui_wants_pointer = self
            .egui
            .as_ref()
            .is_some_and(EguiHost::wants_pointer_input);
        let egui_wants_keyboard = self
            .egui
            .as_ref()
            .is_some_and(EguiHost::wants_keyboard_input);

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat || egui_wants_keyboard {
                    return;
                }
                if let Some(command) = KeyCommand::from_key(&event.logical_key) {
                    self.handle_key(command, event_loop);
                }
            }
            WindowEvent::Resized(new_size) => {
                log::debug!("Window resized to {}x{}", new_size.width, new_size.height);
                self.handle_resize(new_size);
                if let Some(window) = self.window.clone() {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(size) = self.window.as_ref().map(|window| window.inner_size()) {
                    self.handle_resize(size);
                }
            }
            WindowEvent::Moved(_) => {
                if let Some(window) = self.window.clone() {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let Some((drag, delta)) =
                    self.pointer.move_to([position.x as f32, position.y as f32])
                {
                    self.handle_drag(drag, delta);
                }
            }
            WindowEvent::CursorLeft { .. } | WindowEvent::Focused(false) => {
                self.pointer.leave();
            }
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed if !consumed && !egui_wants_pointer => {
                    self.pointer.begin_drag(button);
                    if button == MouseButton::Left {
                        if let Some(position) = self.pointer.position {
                            if self.double_click.press(Instant::now(), position) {
                                self.toggle_fullscreen();
                            }
                        }
                    }
                }
                ElementState::Pressed => {}
                ElementState::Released => self.pointer.end_drag(button),
            },
            WindowEvent::MouseWheel { delta, .. } => {
                if consumed || egui_wants_pointer {
                    return;
                }
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / PIXELS_PER_WHEEL_LINE,
                };
                self.camera.zoom(steps);
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        if now >= self.next_frame_time {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
            self.next_frame_time = now + self.target_frame_duration;
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame_time));
    }
}

pub fn run(config: ViewerConfig) -> Result<(), AppError> {
    log::info!(
        "Starting {} in {} mode (assets from {})",
        config.window.title,
        config.initial_mode.label(),
        config.asset_root.display()
    );
    log::info!("   F: fullscreen, H: toggle panel, ESC: exit");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    log::info!("Goodbye!");
    Ok(())
}
