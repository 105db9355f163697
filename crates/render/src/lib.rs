//! Progressive accumulation loop, independent of any graphics API.
//!
//! # Invariants
//! - Every frame runs the same five steps in the same order (see [`FrameDriver`]).
//! - The pass index resets to zero on any frame whose inputs invalidate the
//!   image, and otherwise increases by exactly one.
//! - A failed pass is logged and skipped; the loop keeps going.

mod accumulation;
mod frame;

pub use accumulation::{AccumulationState, Accumulator};
pub use frame::{
    BackendCall, CameraView, FrameBackend, FrameDriver, FrameInputs, FrameReport,
    HeadlessBackend, PassError, PassKind,
};
