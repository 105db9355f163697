use std::path::PathBuf;

use lumen_sync::SyncError;

/// Failures that stop the renderer before the frame loop starts.
///
/// Each variant names the stage and the resource involved.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("surface creation failed: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("no graphics adapter compatible with the window surface")]
    NoAdapter,
    #[error("device request failed: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("surface reports no supported formats on this adapter")]
    SurfaceUnsupported,
    #[error("reading shader {path}: {source}")]
    ShaderRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("shader {label} has no entry point `{entry_point}`")]
    MissingEntryPoint {
        label: String,
        entry_point: &'static str,
    },
    #[error("compiling shader {label}: {message}")]
    ShaderCompile { label: String, message: String },
    #[error("offscreen target {format:?} is incomplete on this adapter: {missing}")]
    TargetIncomplete {
        format: wgpu::TextureFormat,
        missing: String,
    },
    #[error("loading skybox {path}: {source}")]
    Skybox {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error(transparent)]
    Capacity(#[from] SyncError),
}
