//! Scene store: the authoritative, owned description of what is rendered.
//!
//! # Invariants
//! - Collections are dense and insertion-ordered; slot == position.
//! - Removing an entity shifts every later slot down by one.
//! - An object's material key always names a live material.
//! - Every mutation appends a [`SceneChange`] to the change log.

pub mod file;
pub mod store;
pub mod types;

pub use file::{SceneError, SceneFile};
pub use store::{SceneChange, SceneStore, SceneSummary};
pub use types::{
    LightKey, Material, MaterialKey, Object, ObjectKey, PointLight, RenderParams, ShapeKind,
};
