use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use glasm_host::{
    FileFetcher, FixedRateScheduler, FrameLoop, GuestModule, Host, HostConfig, HostManifest,
    MonotonicClock, NoopManager, WasmModule,
};
use glasm_render::HeadlessGraphics;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "glasm-cli", about = "CLI tool for glasm manifests")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Load a manifest, compile its shaders, and run frame zero headlessly
    Check {
        /// Host manifest (JSON or YAML)
        manifest: PathBuf,
    },
    /// Run a manifest headlessly for a number of frames
    Run {
        /// Host manifest (JSON or YAML)
        manifest: PathBuf,
        /// Frames to run after frame zero
        #[arg(short, long, default_value = "60")]
        frames: u64,
        /// Target refresh rate; 0 runs unpaced
        #[arg(long, default_value = "60")]
        fps: f64,
    },
}

fn boot(manifest_path: &Path) -> Result<FrameLoop<WasmModule, HeadlessGraphics>> {
    let manifest = HostManifest::load(manifest_path)
        .with_context(|| format!("loading {}", manifest_path.display()))?;
    let root = manifest_path.parent().unwrap_or(Path::new("."));

    let config = HostConfig::from_manifest(&manifest)
        .with_surface(HeadlessGraphics::new())
        .with_manager(NoopManager);
    let host = Host::new(config)?;
    println!(
        "Manifest: module={}, fetches={}",
        host.module_location(),
        host.resources().request_count()
    );

    let fetcher = FileFetcher::new(root);
    let frame_loop = pollster::block_on(
        host.load::<WasmModule>(&fetcher, Box::new(MonotonicClock::new())),
    )?;
    Ok(frame_loop)
}

fn report(frame_loop: &FrameLoop<WasmModule, HeadlessGraphics>) -> Result<()> {
    let view = frame_loop.view();
    let memory = frame_loop.module().memory();
    let timing = frame_loop.timing()?;
    println!(
        "Header: base={:#x}, start={:.3}ms, current={:.3}ms, delta={:.3}ms",
        view.base(),
        timing.start,
        timing.current,
        timing.delta
    );
    println!(
        "Vertices: count={}, dynamic={:#x}",
        view.vertex_count(memory)?,
        view.dynamic_pointer(memory)?
    );
    match glasm_render::point_bounds(view.vertices(memory)?) {
        Some(b) => println!("Dots: {} spanning {} .. {}", b.count, b.min, b.max),
        None => println!("Dots: none"),
    }
    let shim = frame_loop.module().shim();
    println!(
        "Shim: bytes_written={}, exit_code={:?}",
        shim.bytes_written(),
        shim.exit_code()
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("glasm-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", glasm_common::crate_info());
            println!("memory: {}", glasm_memory::crate_info());
            println!("shim: {}", glasm_shim::crate_info());
            println!("render: {}", glasm_render::crate_info());
            println!("host: {}", glasm_host::crate_info());
        }
        Commands::Check { manifest } => {
            let frame_loop = boot(&manifest)?;
            for program in frame_loop.programs() {
                println!("Program {:?}: {}", program.handle(), program.pair().label());
            }
            report(&frame_loop)?;
            println!("Check: OK");
        }
        Commands::Run {
            manifest,
            frames,
            fps,
        } => {
            let mut frame_loop = boot(&manifest)?;
            let mut scheduler = FixedRateScheduler::new(fps).with_frame_limit(frames);
            let ran = frame_loop.run(&mut scheduler)?;
            let stats = frame_loop.stats();
            println!(
                "Ran {ran} frames: avg={:.3}ms, min={:.3}ms, max={:.3}ms, fps={:.1}",
                stats.average(),
                stats.min(),
                stats.max(),
                stats.fps()
            );
            report(&frame_loop)?;
        }
    }

    Ok(())
}
