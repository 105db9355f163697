use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use lumen_render::{CameraView, FrameDriver, FrameInputs, HeadlessBackend};
use lumen_scene::{SceneFile, SceneStore};
use lumen_sync::{DeviceSync, MAX_LIGHTS, MAX_OBJECTS};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lumen-cli", about = "CLI tool for lumen scene files")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and device array capacities
    Info,
    /// Load a scene and check it fits the device arrays
    Validate { scene: PathBuf },
    /// Sync a scene into host-side device arrays and print every live slot
    Dump { scene: PathBuf },
    /// Write the built-in demo scene (JSON or YAML by extension)
    Demo { out: PathBuf },
}

fn load(path: &Path) -> anyhow::Result<SceneStore> {
    let file = SceneFile::load(path).with_context(|| format!("loading {}", path.display()))?;
    Ok(file.into_store()?)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("lumen-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("object capacity: {MAX_OBJECTS}");
            println!("light capacity: {MAX_LIGHTS}");
        }
        Commands::Validate { scene } => {
            let store = load(&scene)?;
            let backend = HeadlessBackend::new();
            DeviceSync::new().validate_capacity(&store, &backend)?;
            println!("{}", store.summary());
            println!("OK: fits {MAX_OBJECTS} object and {MAX_LIGHTS} light slots");
        }
        Commands::Dump { scene } => {
            let mut store = load(&scene)?;
            let mut sync = DeviceSync::new();
            let mut backend = HeadlessBackend::new();
            sync.validate_capacity(&store, &backend)?;

            let inputs = FrameInputs {
                camera: CameraView::default(),
                aspect_ratio: 1.0,
                time: 0.0,
                invalidate: true,
            };
            let report = FrameDriver::new().run_frame(&mut backend, &mut store, &mut sync, &inputs);
            tracing::debug!(?report, "headless frame");
            print!("{}", backend.arrays);
        }
        Commands::Demo { out } => {
            SceneFile::demo()
                .save(&out)
                .with_context(|| format!("writing {}", out.display()))?;
            println!("wrote demo scene to {}", out.display());
        }
    }

    Ok(())
}
