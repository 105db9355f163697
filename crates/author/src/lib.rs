//! Scene authoring: edits applied through commands.
//!
//! # Invariants
//! - Every edit that changes a field, adds, or removes raises the frame's
//!   invalidate flag. Edits that leave a value unchanged do not.
//! - Adds never grow the scene past what the device arrays can hold.

pub mod editor;

pub use editor::{EditCommand, EditError, EditOutcome, Editor};
