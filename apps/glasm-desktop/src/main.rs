use anyhow::{Context, Result};
use clap::Parser;
use glasm_host::{
    FileFetcher, FrameLoop, Host, HostConfig, HostManifest, HostRef, LoopState, Manager,
    MonotonicClock, WasmModule,
};
use glasm_render_wgpu::WgpuGraphics;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

#[derive(Parser)]
#[command(name = "glasm-desktop", about = "Run a glasm manifest in a window")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Host manifest (JSON or YAML); resources resolve relative to it
    #[arg(default_value = "assets/glasm.json")]
    manifest: PathBuf,

    /// Frames between stats log lines
    #[arg(long, default_value = "300")]
    stats_every: u64,
}

/// Clears every frame and periodically reports the dot cloud.
struct DotStats {
    every: u64,
}

impl Manager for DotStats {
    fn init(&mut self, host: &mut HostRef<'_>) {
        let programs = host.programs().len();
        tracing::info!(programs, "manager attached to {}", host.graphics().backend_name());
    }

    fn tick(&mut self, host: &mut HostRef<'_>, now: f64) {
        host.graphics().clear();
        if self.every == 0 || host.frame() % self.every != 0 {
            return;
        }
        match host.vertices() {
            Ok(vertices) => match glasm_render::point_bounds(vertices) {
                Some(bounds) => tracing::info!(
                    frame = host.frame(),
                    now,
                    fps = format_args!("{:.1}", host.stats().fps()),
                    points = bounds.count,
                    "dot cloud spans {} .. {}",
                    bounds.min,
                    bounds.max
                ),
                None => tracing::info!(frame = host.frame(), "no dots published"),
            },
            Err(e) => tracing::warn!("vertex array unreadable: {e}"),
        }
    }
}

struct GpuApp {
    manifest: HostManifest,
    root: PathBuf,
    stats_every: u64,
    window: Option<Arc<Window>>,
    frame_loop: Option<FrameLoop<WasmModule, WgpuGraphics>>,
    error: Option<anyhow::Error>,
}

impl GpuApp {
    fn new(manifest: HostManifest, root: PathBuf, stats_every: u64) -> Self {
        Self {
            manifest,
            root,
            stats_every,
            window: None,
            frame_loop: None,
            error: None,
        }
    }

    fn boot(&self, window: Arc<Window>) -> Result<FrameLoop<WasmModule, WgpuGraphics>> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .context("create surface")?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("find adapter")?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("glasm_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .context("create device")?;

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no formats")?;

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
        tracing::info!(
            "GPU initialized with {} backend",
            adapter.get_info().backend.to_str()
        );

        let graphics = WgpuGraphics::with_surface(device, queue, surface, config);
        let config = HostConfig::from_manifest(&self.manifest)
            .with_surface(graphics)
            .with_manager(DotStats {
                every: self.stats_every,
            });
        let host = Host::new(config)?;
        let fetcher = FileFetcher::new(&self.root);
        let frame_loop = pollster::block_on(
            host.load::<WasmModule>(&fetcher, Box::new(MonotonicClock::new())),
        )?;
        Ok(frame_loop)
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        tracing::error!("{error:#}");
        self.error = Some(error);
        event_loop.exit();
    }
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title("glasm")
            .with_inner_size(PhysicalSize::new(1280u32, 720));
        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, e.into()),
        };

        match self.boot(window.clone()) {
            Ok(frame_loop) => {
                self.frame_loop = Some(frame_loop);
                window.request_redraw();
                self.window = Some(window);
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                if let Some(frame_loop) = &mut self.frame_loop {
                    frame_loop.stop();
                }
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(frame_loop) = &mut self.frame_loop {
                    frame_loop
                        .graphics_mut()
                        .resize(new_size.width, new_size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                let Some(frame_loop) = &mut self.frame_loop else {
                    return;
                };
                match frame_loop.tick() {
                    Ok(LoopState::Running) => {
                        if let Some(window) = &self.window {
                            window.request_redraw();
                        }
                    }
                    Ok(_) => event_loop.exit(),
                    Err(e) => self.fail(event_loop, e.into()),
                }
            }
            _ => {}
        }
    }
}

fn manifest_root(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    tracing::info!("glasm-desktop starting");

    let manifest = HostManifest::load(&cli.manifest)
        .with_context(|| format!("loading {}", cli.manifest.display()))?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = GpuApp::new(manifest, manifest_root(&cli.manifest), cli.stats_every);
    event_loop.run_app(&mut app)?;

    match app.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
