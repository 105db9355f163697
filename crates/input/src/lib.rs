//! Desktop input mapped to high-level actions.
//!
//! # Invariants
//! - The camera and application consume [`Action`]s, never raw window events.
//! - Look deltas accumulate between frames and are consumed once per frame.

pub mod action;

pub use action::{Action, InputState, MoveAxes, MoveAxis};
