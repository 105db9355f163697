mod state;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use egui::Context as EguiContext;
use glam::Vec3;
use lumen_input::Action;
use lumen_render_wgpu::{CameraRig, ProgramSource, SkyImage, StartupError, WgpuRenderer};
use lumen_scene::{SceneFile, SceneStore};
use lumen_sync::{DeviceSync, HostArrays};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::{CursorGrabMode, Window, WindowId};

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "lumen-desktop", about = "Progressive ray tracer with a live scene editor")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Scene file (JSON or YAML). Defaults to the built-in demo scene.
    /// F5 writes the edited scene back here, or to scene.yaml.
    #[arg(long)]
    scene: Option<PathBuf>,

    /// Equirectangular skybox image. Defaults to a procedural sky.
    #[arg(long)]
    skybox: Option<PathBuf>,

    /// WGSL tracing program. Defaults to the built-in tracer; R reloads it.
    #[arg(long)]
    shader: Option<PathBuf>,

    #[arg(long, default_value_t = 1280)]
    width: u32,

    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Mouse look sensitivity in radians per pixel
    #[arg(long, default_value_t = 0.002)]
    sensitivity: f32,

    /// Camera speed in units per second
    #[arg(long, default_value_t = 3.0)]
    speed: f32,
}

/// GPU resources that exist once the window does.
struct Gpu {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    renderer: WgpuRenderer,
    egui_winit: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl Gpu {
    fn aspect_ratio(&self) -> f32 {
        self.config.width as f32 / self.config.height.max(1) as f32
    }
}

struct GpuApp {
    state: AppState,
    gpu: Option<Gpu>,
    egui_ctx: EguiContext,
    program_source: ProgramSource,
    sky: SkyImage,
    skybox_path: Option<PathBuf>,
    size: PhysicalSize<u32>,
    startup_error: Option<anyhow::Error>,
}

impl GpuApp {
    fn init_gpu(&mut self, event_loop: &ActiveEventLoop) -> Result<Gpu> {
        let attrs = Window::default_attributes()
            .with_title("lumen")
            .with_inner_size(self.size);
        let window = Arc::new(event_loop.create_window(attrs).context("creating window")?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .map_err(StartupError::from)?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or(StartupError::NoAdapter)?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("lumen_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .map_err(StartupError::from)?;
        device.on_uncaptured_error(Box::new(|e| tracing::error!("uncaptured GPU error: {e}")));

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or(surface_caps.formats.first())
            .copied()
            .ok_or(StartupError::SurfaceUnsupported)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let renderer = WgpuRenderer::new(
            &adapter,
            &device,
            &queue,
            surface_format,
            config.width,
            config.height,
            self.program_source.clone(),
            &self.sky,
        )?;
        self.state.sync.bind_program(renderer.program_id());

        let egui_winit = egui_winit::State::new(
            self.egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        tracing::info!(
            "GPU initialized with {} backend, surface {surface_format:?}",
            adapter.get_info().backend.to_str()
        );

        Ok(Gpu {
            window,
            surface,
            device,
            queue,
            config,
            renderer,
            egui_winit,
            egui_renderer,
        })
    }

    fn handle_action(&mut self, action: Action) {
        let Some(gpu) = &mut self.gpu else {
            return;
        };
        match action {
            Action::ToggleCursorCapture => {
                let captured = self.state.input.cursor_captured();
                let grab = if captured {
                    gpu.window
                        .set_cursor_grab(CursorGrabMode::Locked)
                        .or_else(|_| gpu.window.set_cursor_grab(CursorGrabMode::Confined))
                } else {
                    gpu.window.set_cursor_grab(CursorGrabMode::None)
                };
                if let Err(e) = grab {
                    tracing::warn!("cursor grab failed: {e}");
                }
                gpu.window.set_cursor_visible(!captured);
            }
            Action::SaveScene => {
                if let Err(e) = self.state.save_scene() {
                    tracing::warn!("saving {} failed: {e}", self.state.scene_path().display());
                }
            }
            Action::ReloadShader => {
                if let Some(id) = gpu.renderer.reload_program(&gpu.device) {
                    tracing::info!("reloaded {}", gpu.renderer.program_label());
                    self.state.sync.bind_program(id);
                    self.state.request_reset();
                }
                if let Some(path) = &self.skybox_path {
                    match SkyImage::load(path) {
                        Ok(sky) => {
                            gpu.renderer.set_skybox(&gpu.device, &gpu.queue, &sky);
                            self.sky = sky;
                            self.state.request_reset();
                        }
                        Err(e) => tracing::warn!("skybox reload failed, keeping current: {e}"),
                    }
                }
            }
            _ => {}
        }
    }

    fn redraw(&mut self) {
        self.state.update_camera();
        let Some(gpu) = &mut self.gpu else {
            return;
        };

        let output = match gpu.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.surface.configure(&gpu.device, &gpu.config);
                return;
            }
            Err(e) => {
                tracing::error!("surface error: {e}");
                return;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        // Editor edits land before the frame that renders them.
        let raw_input = gpu.egui_winit.take_egui_input(&gpu.window);
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            ui::draw(&mut self.state, ctx);
        });
        gpu.egui_winit
            .handle_platform_output(&gpu.window, full_output.platform_output);

        let inputs = self.state.frame_inputs(gpu.aspect_ratio());
        let mut frame = gpu.renderer.frame(&gpu.device, &gpu.queue, &view);
        let report = self.state.driver.run_frame(
            &mut frame,
            &mut self.state.scene,
            &mut self.state.sync,
            &inputs,
        );
        self.state.last_report = Some(report);

        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [gpu.config.width, gpu.config.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        for (id, image_delta) in &full_output.textures_delta.set {
            gpu.egui_renderer
                .update_texture(&gpu.device, &gpu.queue, *id, image_delta);
        }
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("egui_encoder"),
            });
        gpu.egui_renderer.update_buffers(
            &gpu.device,
            &gpu.queue,
            &mut encoder,
            &paint_jobs,
            &screen_descriptor,
        );
        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    ..Default::default()
                })
                .forget_lifetime();
            gpu.egui_renderer
                .render(&mut pass, &paint_jobs, &screen_descriptor);
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));
        for id in &full_output.textures_delta.free {
            gpu.egui_renderer.free_texture(id);
        }

        output.present();
        gpu.window.request_redraw();
    }
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }
        match self.init_gpu(event_loop) {
            Ok(gpu) => self.gpu = Some(gpu),
            Err(e) => {
                tracing::error!("startup failed: {e:#}");
                self.startup_error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(gpu) = &mut self.gpu else {
            return;
        };
        if !self.state.input.cursor_captured() {
            let response = gpu.egui_winit.on_window_event(&gpu.window, &event);
            if response.consumed {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                gpu.config.width = new_size.width.max(1);
                gpu.config.height = new_size.height.max(1);
                gpu.surface.configure(&gpu.device, &gpu.config);
                gpu.renderer
                    .resize(&gpu.device, gpu.config.width, gpu.config.height);
                self.state.request_reset();
            }
            WindowEvent::Focused(false) => {
                self.state.input.release_all();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: key_state,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                if let Some(action) = self
                    .state
                    .handle_key(key, key_state == ElementState::Pressed)
                {
                    self.handle_action(action);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.state.input.handle(Action::Look {
                dx: delta.0 as f32,
                dy: delta.1 as f32,
            });
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(gpu) = &self.gpu {
            gpu.window.request_redraw();
        }
    }
}

fn load_scene(path: Option<&PathBuf>) -> Result<SceneStore> {
    let file = match path {
        Some(path) => {
            SceneFile::load(path).with_context(|| format!("loading scene {}", path.display()))?
        }
        None => SceneFile::demo(),
    };
    Ok(file.into_store()?)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    tracing::info!("lumen-desktop starting");

    let scene = load_scene(cli.scene.as_ref())?;
    let scene_path = cli
        .scene
        .clone()
        .unwrap_or_else(|| PathBuf::from("scene.yaml"));
    DeviceSync::new()
        .validate_capacity(&scene, &HostArrays::new())
        .map_err(StartupError::from)?;
    tracing::info!("{}", scene.summary());

    let sky = SkyImage::load_or_procedural(cli.skybox.as_deref())?;
    let mut camera = CameraRig::new(Vec3::new(0.0, 1.0, -4.0));
    camera.sensitivity = cli.sensitivity;
    camera.speed = cli.speed;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GpuApp {
        state: AppState::new(scene, camera, scene_path),
        gpu: None,
        egui_ctx: EguiContext::default(),
        program_source: ProgramSource::from_option(cli.shader.as_deref()),
        sky,
        skybox_path: cli.skybox.clone(),
        size: PhysicalSize::new(cli.width, cli.height),
        startup_error: None,
    };
    event_loop.run_app(&mut app)?;

    match app.startup_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
