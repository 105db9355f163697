use lumen_scene::{
    LightKey, Material, MaterialKey, Object, ObjectKey, PointLight, RenderParams, SceneStore,
};
use lumen_sync::{ArrayKind, MAX_LIGHTS, MAX_OBJECTS};

/// One authoring operation on the scene.
///
/// Entities are named by key so that a command stays valid while other
/// entities are added or removed around it.
#[derive(Debug, Clone, PartialEq)]
pub enum EditCommand {
    AddObject(Object),
    RemoveObject(ObjectKey),
    SetObject { key: ObjectKey, value: Object },
    AddLight(PointLight),
    RemoveLight(LightKey),
    SetLight { key: LightKey, value: PointLight },
    AddMaterial(Material),
    SetMaterial { key: MaterialKey, value: Material },
    SetParams(RenderParams),
}

/// What an applied command did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    ObjectAdded(ObjectKey),
    LightAdded(LightKey),
    MaterialAdded(MaterialKey),
    Removed,
    /// The new value differed from the old one.
    Changed,
    /// The new value equalled the old one; the scene was left alone.
    Unchanged,
}

impl EditOutcome {
    /// Whether the rendered image is now stale.
    pub fn invalidates(&self) -> bool {
        !matches!(self, EditOutcome::Unchanged)
    }
}

/// Errors from edit operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("object {0:?} not found")]
    ObjectNotFound(ObjectKey),
    #[error("light {0:?} not found")]
    LightNotFound(LightKey),
    #[error("material {0:?} not found")]
    MaterialNotFound(MaterialKey),
    #[error("cannot add another {kind}: limit is {limit}")]
    CapacityReached { kind: ArrayKind, limit: usize },
}

/// Applies edit commands and aggregates their effect on the image.
///
/// Each command snapshots the affected value, applies the change, and
/// compares. The invalidate flag collects across every command applied
/// during a frame and is consumed once per frame by [`Editor::take_invalidate`].
#[derive(Debug)]
pub struct Editor {
    max_objects: usize,
    max_lights: usize,
    invalidate: bool,
    applied: u64,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

impl Editor {
    /// An editor limited to the shader's array capacities.
    pub fn new() -> Self {
        Self::with_limits(MAX_OBJECTS, MAX_LIGHTS)
    }

    pub fn with_limits(max_objects: usize, max_lights: usize) -> Self {
        Self {
            max_objects,
            max_lights,
            invalidate: false,
            applied: 0,
        }
    }

    pub fn max_objects(&self) -> usize {
        self.max_objects
    }

    pub fn max_lights(&self) -> usize {
        self.max_lights
    }

    /// Commands that changed the scene since startup.
    pub fn applied_count(&self) -> u64 {
        self.applied
    }

    /// Whether an edit is waiting to invalidate the next frame.
    pub fn is_invalidated(&self) -> bool {
        self.invalidate
    }

    /// Consume the aggregated invalidate flag.
    pub fn take_invalidate(&mut self) -> bool {
        std::mem::take(&mut self.invalidate)
    }

    pub fn apply(
        &mut self,
        scene: &mut SceneStore,
        command: EditCommand,
    ) -> Result<EditOutcome, EditError> {
        let outcome = match command {
            EditCommand::AddObject(object) => {
                self.ensure_room(ArrayKind::Objects, scene.object_count(), self.max_objects)?;
                check_material(scene, object.material)?;
                EditOutcome::ObjectAdded(scene.add_object(object))
            }
            EditCommand::RemoveObject(key) => {
                let slot = scene.object_slot(key).ok_or(EditError::ObjectNotFound(key))?;
                scene.remove_object(slot);
                EditOutcome::Removed
            }
            EditCommand::SetObject { key, value } => {
                let before = *scene.object_by_key(key).ok_or(EditError::ObjectNotFound(key))?;
                check_material(scene, value.material)?;
                if before == value {
                    EditOutcome::Unchanged
                } else {
                    scene.set_object(key, value);
                    EditOutcome::Changed
                }
            }
            EditCommand::AddLight(light) => {
                self.ensure_room(ArrayKind::Lights, scene.light_count(), self.max_lights)?;
                EditOutcome::LightAdded(scene.add_light(light))
            }
            EditCommand::RemoveLight(key) => {
                let slot = scene.light_slot(key).ok_or(EditError::LightNotFound(key))?;
                scene.remove_light(slot);
                EditOutcome::Removed
            }
            EditCommand::SetLight { key, value } => {
                let before = *scene.light_by_key(key).ok_or(EditError::LightNotFound(key))?;
                if before == value {
                    EditOutcome::Unchanged
                } else {
                    scene.set_light(key, value);
                    EditOutcome::Changed
                }
            }
            EditCommand::AddMaterial(material) => {
                EditOutcome::MaterialAdded(scene.add_material(material))
            }
            EditCommand::SetMaterial { key, value } => {
                let before = *scene
                    .material_by_key(key)
                    .ok_or(EditError::MaterialNotFound(key))?;
                if before == value {
                    EditOutcome::Unchanged
                } else {
                    scene.set_material(key, value);
                    EditOutcome::Changed
                }
            }
            EditCommand::SetParams(params) => {
                check_material(scene, params.plane_material)?;
                if *scene.params() == params {
                    EditOutcome::Unchanged
                } else {
                    scene.set_params(params);
                    EditOutcome::Changed
                }
            }
        };

        if outcome.invalidates() {
            tracing::debug!(?outcome, "edit applied");
            self.invalidate = true;
            self.applied += 1;
        }
        Ok(outcome)
    }

    fn ensure_room(&self, kind: ArrayKind, count: usize, limit: usize) -> Result<(), EditError> {
        if count < limit {
            return Ok(());
        }
        let err = EditError::CapacityReached { kind, limit };
        tracing::warn!("{err}");
        Err(err)
    }
}

fn check_material(scene: &SceneStore, key: MaterialKey) -> Result<(), EditError> {
    match scene.material_by_key(key) {
        Some(_) => Ok(()),
        None => Err(EditError::MaterialNotFound(key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use lumen_scene::ShapeKind;

    fn scene_with_sphere() -> (SceneStore, ObjectKey) {
        let mut scene = SceneStore::new();
        let mat = scene.default_material();
        let key = scene.add_object(Object::sphere(Vec3::new(0.0, 0.0, 3.0), 1.0, mat));
        scene.drain_changes();
        (scene, key)
    }

    #[test]
    fn add_object_invalidates_and_returns_key() {
        let mut scene = SceneStore::new();
        let mut editor = Editor::new();
        let mat = scene.default_material();

        let outcome = editor
            .apply(&mut scene, EditCommand::AddObject(Object::sphere(Vec3::ZERO, 1.0, mat)))
            .unwrap();
        let EditOutcome::ObjectAdded(key) = outcome else {
            panic!("expected ObjectAdded, got {outcome:?}");
        };
        assert_eq!(scene.object_slot(key), Some(0));
        assert!(editor.take_invalidate());
    }

    #[test]
    fn take_invalidate_consumes_flag() {
        let (mut scene, _) = scene_with_sphere();
        let mut editor = Editor::new();
        editor
            .apply(&mut scene, EditCommand::AddLight(PointLight::default()))
            .unwrap();
        assert!(editor.take_invalidate());
        assert!(!editor.take_invalidate());
    }

    #[test]
    fn changed_field_invalidates() {
        let (mut scene, key) = scene_with_sphere();
        let mut editor = Editor::new();
        let mut value = *scene.object_by_key(key).unwrap();
        value.kind = ShapeKind::Cube;

        let outcome = editor
            .apply(&mut scene, EditCommand::SetObject { key, value })
            .unwrap();
        assert_eq!(outcome, EditOutcome::Changed);
        assert_eq!(scene.object(0).kind, ShapeKind::Cube);
        assert!(editor.is_invalidated());
    }

    #[test]
    fn equal_value_leaves_scene_and_flag_alone() {
        let (mut scene, key) = scene_with_sphere();
        let mut editor = Editor::new();
        let value = *scene.object_by_key(key).unwrap();

        let outcome = editor
            .apply(&mut scene, EditCommand::SetObject { key, value })
            .unwrap();
        assert_eq!(outcome, EditOutcome::Unchanged);
        assert!(scene.changes().is_empty());
        assert!(!editor.take_invalidate());
        assert_eq!(editor.applied_count(), 0);
    }

    #[test]
    fn remove_by_key_resolves_current_slot() {
        let mut scene = SceneStore::new();
        let mat = scene.default_material();
        let first = scene.add_object(Object::sphere(Vec3::ZERO, 1.0, mat));
        let second = scene.add_object(Object::sphere(Vec3::X, 1.0, mat));
        let mut editor = Editor::new();

        editor.apply(&mut scene, EditCommand::RemoveObject(first)).unwrap();
        assert_eq!(scene.object_slot(second), Some(0));
        assert_eq!(
            editor.apply(&mut scene, EditCommand::RemoveObject(first)),
            Err(EditError::ObjectNotFound(first))
        );
    }

    #[test]
    fn add_past_limit_is_refused() {
        let mut scene = SceneStore::new();
        let mut editor = Editor::with_limits(1, 1);
        let mat = scene.default_material();
        editor
            .apply(&mut scene, EditCommand::AddObject(Object::sphere(Vec3::ZERO, 1.0, mat)))
            .unwrap();
        editor.take_invalidate();

        let err = editor
            .apply(&mut scene, EditCommand::AddObject(Object::sphere(Vec3::X, 1.0, mat)))
            .unwrap_err();
        assert_eq!(
            err,
            EditError::CapacityReached {
                kind: ArrayKind::Objects,
                limit: 1
            }
        );
        assert_eq!(scene.object_count(), 1);
        assert!(!editor.is_invalidated());
    }

    #[test]
    fn set_object_rejects_unknown_material() {
        let (mut scene, key) = scene_with_sphere();
        let mut other = SceneStore::new();
        let foreign = other.add_material(Material::default());
        let mut editor = Editor::new();
        let mut value = *scene.object_by_key(key).unwrap();
        value.material = foreign;

        let result = editor.apply(&mut scene, EditCommand::SetObject { key, value });
        assert!(matches!(result, Err(EditError::MaterialNotFound(_))));
    }

    #[test]
    fn material_edit_and_params_edit_invalidate() {
        let (mut scene, _) = scene_with_sphere();
        let mut editor = Editor::new();
        let key = scene.default_material();
        let mut value = *scene.material_by_key(key).unwrap();
        value.transparent = true;
        editor
            .apply(&mut scene, EditCommand::SetMaterial { key, value })
            .unwrap();
        assert!(editor.take_invalidate());

        let mut params = *scene.params();
        params.plane_visible = !params.plane_visible;
        editor.apply(&mut scene, EditCommand::SetParams(params)).unwrap();
        assert!(editor.take_invalidate());
    }
}
