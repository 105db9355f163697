//! Device synchronization: scene slots mirrored into fixed-capacity shader arrays.
//!
//! # Invariants
//! - Device slot `i` holds scene slot `i` after a flush; slots past the live
//!   count are zeroed (shape kind `None`).
//! - Only [`DeviceSync`] writes the arrays.
//! - Writing past an array's capacity is an error, never a silent truncation.

mod arrays;
mod device;
pub mod layout;

pub use arrays::{DeviceArrays, HostArrays};
pub use device::{ArrayKind, DeviceSync, ProgramId, SyncError, SyncStats};
pub use layout::{GpuFrame, GpuLight, GpuMaterial, GpuObject, GpuSceneParams, MAX_LIGHTS, MAX_OBJECTS};
