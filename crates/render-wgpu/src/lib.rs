//! wgpu backend for the progressive tracer.
//!
//! Runs the two-pass frame on the GPU: a direct pass traces one fresh sample
//! into an offscreen float target, and a composite pass averages it into a
//! ping-ponged history and presents the result. Camera motion lives here too
//! since it only feeds the tracing program.
//!
//! # Invariants
//! - The offscreen target is never read and written by the same pass.
//! - Startup failures (adapter, device, shader, target completeness, skybox)
//!   surface as [`StartupError`] before the frame loop runs.
//! - A shader reload that fails leaves the previous program running.

mod camera;
mod error;
mod gpu;
pub mod program;
mod shaders;
mod skybox;
mod targets;

pub use camera::CameraRig;
pub use error::StartupError;
pub use gpu::{FrameContext, WgpuRenderer};
pub use program::ProgramSource;
pub use skybox::SkyImage;
pub use targets::{ACCUM_FORMAT, check_completeness};
