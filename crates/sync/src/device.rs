use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use bytemuck::Zeroable;
use lumen_scene::{SceneChange, SceneStore};

use crate::arrays::DeviceArrays;
use crate::layout::{GpuLight, GpuObject, GpuSceneParams};

/// Identity of a compiled tracing program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u64);

impl ProgramId {
    /// Allocate an id no other program in this process has.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    Objects,
    Lights,
}

impl fmt::Display for ArrayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayKind::Objects => f.write_str("object"),
            ArrayKind::Lights => f.write_str("light"),
        }
    }
}

/// Errors from device synchronization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// The scene outgrew the shader's static array bound.
    #[error("scene needs {required} {kind} slots but the shader array holds {capacity}")]
    CapacityExceeded {
        kind: ArrayKind,
        required: usize,
        capacity: usize,
    },
}

/// What a push or flush wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub objects_written: usize,
    pub objects_cleared: usize,
    pub lights_written: usize,
    pub lights_cleared: usize,
    pub params_written: bool,
}

impl SyncStats {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Mirrors scene slots into the device arrays.
///
/// Writes are lazy: scene mutations only become visible to the renderer once
/// the affected slots are pushed, normally by [`DeviceSync::flush`] at the
/// start of a frame. The sync also remembers how many device slots currently
/// hold a live entity so that a removal can zero the slots past the new end.
#[derive(Debug)]
pub struct DeviceSync {
    program: Option<ProgramId>,
    live_objects: usize,
    live_lights: usize,
    full_resync: bool,
}

impl Default for DeviceSync {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceSync {
    /// A sync whose first flush writes everything.
    pub fn new() -> Self {
        Self {
            program: None,
            live_objects: 0,
            live_lights: 0,
            full_resync: true,
        }
    }

    /// Program the arrays currently belong to.
    pub fn program(&self) -> Option<ProgramId> {
        self.program
    }

    /// Retarget to `program`. A different program schedules a full resync.
    pub fn bind_program(&mut self, program: ProgramId) -> bool {
        if self.program == Some(program) {
            return false;
        }
        tracing::debug!("device sync bound to program {}", program.0);
        self.program = Some(program);
        self.full_resync = true;
        true
    }

    /// Check the scene fits the arrays. Run before the frame loop starts.
    pub fn validate_capacity<A: DeviceArrays + ?Sized>(
        &self,
        scene: &SceneStore,
        arrays: &A,
    ) -> Result<(), SyncError> {
        ensure_fits(ArrayKind::Objects, scene.object_count(), arrays.object_capacity())?;
        ensure_fits(ArrayKind::Lights, scene.light_count(), arrays.light_capacity())
    }

    /// Write the object at `slot`, with its material resolved and flattened.
    pub fn push_object<A: DeviceArrays + ?Sized>(
        &mut self,
        scene: &SceneStore,
        slot: usize,
        arrays: &mut A,
    ) -> Result<(), SyncError> {
        ensure_fits(ArrayKind::Objects, slot + 1, arrays.object_capacity())?;
        let object = scene.object(slot);
        let material = scene.resolve_material(object.material);
        arrays.write_object(slot, &GpuObject::new(object, material));
        self.live_objects = self.live_objects.max(slot + 1);
        Ok(())
    }

    pub fn push_light<A: DeviceArrays + ?Sized>(
        &mut self,
        scene: &SceneStore,
        slot: usize,
        arrays: &mut A,
    ) -> Result<(), SyncError> {
        ensure_fits(ArrayKind::Lights, slot + 1, arrays.light_capacity())?;
        arrays.write_light(slot, &GpuLight::from(scene.light(slot)));
        self.live_lights = self.live_lights.max(slot + 1);
        Ok(())
    }

    /// Write the scalar block: render parameters, live counts, plane material.
    pub fn push_global_parameters<A: DeviceArrays + ?Sized>(
        &mut self,
        scene: &SceneStore,
        arrays: &mut A,
    ) {
        let params = scene.params();
        let plane = scene.resolve_material(params.plane_material);
        arrays.write_params(&GpuSceneParams::new(
            params,
            plane,
            scene.object_count(),
            scene.light_count(),
        ));
    }

    /// Rewrite object slots `from..count` and zero every slot between the new
    /// count and the previous high-water mark.
    pub fn sync_objects_from<A: DeviceArrays + ?Sized>(
        &mut self,
        scene: &SceneStore,
        from: usize,
        arrays: &mut A,
    ) -> Result<SyncStats, SyncError> {
        let count = scene.object_count();
        ensure_fits(ArrayKind::Objects, count, arrays.object_capacity())?;
        let mut stats = SyncStats::default();
        for slot in from..count {
            self.push_object(scene, slot, arrays)?;
            stats.objects_written += 1;
        }
        for slot in count.max(from)..self.live_objects {
            arrays.write_object(slot, &GpuObject::zeroed());
            stats.objects_cleared += 1;
        }
        self.live_objects = count;
        Ok(stats)
    }

    /// Light counterpart of [`DeviceSync::sync_objects_from`].
    pub fn sync_lights_from<A: DeviceArrays + ?Sized>(
        &mut self,
        scene: &SceneStore,
        from: usize,
        arrays: &mut A,
    ) -> Result<SyncStats, SyncError> {
        let count = scene.light_count();
        ensure_fits(ArrayKind::Lights, count, arrays.light_capacity())?;
        let mut stats = SyncStats::default();
        for slot in from..count {
            self.push_light(scene, slot, arrays)?;
            stats.lights_written += 1;
        }
        for slot in count.max(from)..self.live_lights {
            arrays.write_light(slot, &GpuLight::zeroed());
            stats.lights_cleared += 1;
        }
        self.live_lights = count;
        Ok(stats)
    }

    /// Rewrite every slot and the parameter block.
    pub fn push_all<A: DeviceArrays + ?Sized>(
        &mut self,
        scene: &SceneStore,
        arrays: &mut A,
    ) -> Result<SyncStats, SyncError> {
        let objects = self.sync_objects_from(scene, 0, arrays)?;
        let lights = self.sync_lights_from(scene, 0, arrays)?;
        self.push_global_parameters(scene, arrays);
        self.full_resync = false;
        Ok(SyncStats {
            lights_written: lights.lights_written,
            lights_cleared: lights.lights_cleared,
            params_written: true,
            ..objects
        })
    }

    /// Drain the scene's change log and push what it names.
    ///
    /// Structural changes rewrite from the lowest affected slot to the end;
    /// field changes rewrite one slot; a material change rewrites every
    /// object that references it (and the parameter block if the ground
    /// plane does). On error the next flush falls back to a full resync.
    pub fn flush<A: DeviceArrays + ?Sized>(
        &mut self,
        scene: &mut SceneStore,
        arrays: &mut A,
    ) -> Result<SyncStats, SyncError> {
        let changes = scene.drain_changes();
        let result = if self.full_resync {
            self.push_all(scene, arrays)
        } else {
            self.apply_changes(scene, &changes, arrays)
        };
        match &result {
            Ok(stats) if !stats.is_empty() => tracing::debug!(?stats, "device sync flushed"),
            Ok(_) => {}
            Err(_) => self.full_resync = true,
        }
        result
    }

    fn apply_changes<A: DeviceArrays + ?Sized>(
        &mut self,
        scene: &SceneStore,
        changes: &[SceneChange],
        arrays: &mut A,
    ) -> Result<SyncStats, SyncError> {
        let mut objects_from: Option<usize> = None;
        let mut lights_from: Option<usize> = None;
        let mut object_slots = BTreeSet::new();
        let mut light_slots = BTreeSet::new();
        let mut params_dirty = false;

        for change in changes {
            match *change {
                SceneChange::ObjectAdded { slot } | SceneChange::ObjectRemoved { slot } => {
                    objects_from = Some(objects_from.map_or(slot, |s| s.min(slot)));
                    params_dirty = true;
                }
                SceneChange::LightAdded { slot } | SceneChange::LightRemoved { slot } => {
                    lights_from = Some(lights_from.map_or(slot, |s| s.min(slot)));
                    params_dirty = true;
                }
                SceneChange::ObjectChanged(key) => {
                    object_slots.extend(scene.object_slot(key));
                }
                SceneChange::LightChanged(key) => {
                    light_slots.extend(scene.light_slot(key));
                }
                SceneChange::MaterialChanged(key) => {
                    object_slots.extend(scene.objects_using(key));
                    params_dirty |= scene.params().plane_material == key;
                }
                SceneChange::MaterialAdded(_) => {}
                SceneChange::ParamsChanged => params_dirty = true,
            }
        }

        let mut stats = SyncStats::default();
        if let Some(from) = objects_from {
            let s = self.sync_objects_from(scene, from, arrays)?;
            stats.objects_written += s.objects_written;
            stats.objects_cleared += s.objects_cleared;
        }
        for slot in object_slots {
            if objects_from.is_none_or(|from| slot < from) {
                self.push_object(scene, slot, arrays)?;
                stats.objects_written += 1;
            }
        }
        if let Some(from) = lights_from {
            let s = self.sync_lights_from(scene, from, arrays)?;
            stats.lights_written += s.lights_written;
            stats.lights_cleared += s.lights_cleared;
        }
        for slot in light_slots {
            if lights_from.is_none_or(|from| slot < from) {
                self.push_light(scene, slot, arrays)?;
                stats.lights_written += 1;
            }
        }
        if params_dirty {
            self.push_global_parameters(scene, arrays);
            stats.params_written = true;
        }
        Ok(stats)
    }
}

fn ensure_fits(kind: ArrayKind, required: usize, capacity: usize) -> Result<(), SyncError> {
    if required > capacity {
        return Err(SyncError::CapacityExceeded {
            kind,
            required,
            capacity,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::HostArrays;
    use glam::Vec3;
    use lumen_scene::{Material, Object, PointLight, ShapeKind};

    fn scene_with_spheres(n: usize) -> SceneStore {
        let mut scene = SceneStore::new();
        let mat = scene.default_material();
        for i in 0..n {
            scene.add_object(Object::sphere(Vec3::new(i as f32, 0.0, 0.0), 1.0, mat));
        }
        scene
    }

    fn synced(scene: &mut SceneStore) -> (DeviceSync, HostArrays) {
        let mut sync = DeviceSync::new();
        let mut arrays = HostArrays::new();
        sync.flush(scene, &mut arrays).unwrap();
        (sync, arrays)
    }

    #[test]
    fn first_flush_writes_everything() {
        let mut scene = scene_with_spheres(3);
        scene.add_light(PointLight::default());
        let (_, arrays) = synced(&mut scene);
        assert_eq!(arrays.params().object_count, 3);
        assert_eq!(arrays.params().light_count, 1);
        for slot in 0..3 {
            assert_eq!(arrays.object(slot).position[0], slot as f32);
        }
    }

    #[test]
    fn add_sphere_lands_in_slot_zero() {
        let mut scene = SceneStore::new();
        let (mut sync, mut arrays) = synced(&mut scene);
        let mat = scene.default_material();
        scene.add_object(Object::sphere(Vec3::new(0.0, 0.0, 2.0), 1.0, mat));
        assert_eq!(scene.object_count(), 1);
        // not visible until pushed
        assert_eq!(arrays.object(0).kind, ShapeKind::None as u32);

        sync.flush(&mut scene, &mut arrays).unwrap();
        assert_eq!(arrays.object(0).kind, ShapeKind::Sphere as u32);
        assert_eq!(arrays.object(0).position, [0.0, 0.0, 2.0]);
        assert_eq!(arrays.params().object_count, 1);
    }

    #[test]
    fn removing_slot_zero_shifts_and_clears_tail() {
        let mut scene = scene_with_spheres(3);
        let (mut sync, mut arrays) = synced(&mut scene);
        scene.remove_object(0);
        let stats = sync.flush(&mut scene, &mut arrays).unwrap();

        assert_eq!(arrays.object(0).position[0], 1.0);
        assert_eq!(arrays.object(1).position[0], 2.0);
        assert_eq!(*arrays.object(2), GpuObject::zeroed());
        assert_eq!(stats.objects_written, 2);
        assert_eq!(stats.objects_cleared, 1);
        assert_eq!(arrays.params().object_count, 2);
    }

    #[test]
    fn removed_content_is_not_observable_anywhere() {
        let mut scene = scene_with_spheres(5);
        let (mut sync, mut arrays) = synced(&mut scene);
        let gone = *arrays.object(2);
        scene.remove_object(2);
        sync.flush(&mut scene, &mut arrays).unwrap();
        for slot in 0..arrays.object_capacity() {
            assert_ne!(*arrays.object(slot), gone);
        }
    }

    #[test]
    fn batched_removals_clear_every_vacated_slot() {
        let mut scene = scene_with_spheres(4);
        let (mut sync, mut arrays) = synced(&mut scene);
        scene.remove_object(3);
        scene.remove_object(1);
        sync.flush(&mut scene, &mut arrays).unwrap();
        assert_eq!(arrays.object(0).position[0], 0.0);
        assert_eq!(arrays.object(1).position[0], 2.0);
        assert_eq!(*arrays.object(2), GpuObject::zeroed());
        assert_eq!(*arrays.object(3), GpuObject::zeroed());
    }

    #[test]
    fn light_removal_clears_tail() {
        let mut scene = SceneStore::new();
        for i in 0..2 {
            scene.add_light(PointLight {
                power: i as f32 + 1.0,
                ..PointLight::default()
            });
        }
        let (mut sync, mut arrays) = synced(&mut scene);
        scene.remove_light(0);
        sync.flush(&mut scene, &mut arrays).unwrap();
        assert_eq!(arrays.light(0).power, 2.0);
        assert_eq!(*arrays.light(1), GpuLight::zeroed());
    }

    #[test]
    fn shared_material_edit_updates_every_user() {
        let mut scene = SceneStore::new();
        let shared = scene.add_material(Material::default());
        scene.add_object(Object::sphere(Vec3::ZERO, 1.0, shared));
        scene.add_object(Object::cube(Vec3::ONE, Vec3::ONE, shared));
        let (mut sync, mut arrays) = synced(&mut scene);

        scene.material_mut(shared).unwrap().albedo = Vec3::new(0.2, 0.4, 0.6);
        let stats = sync.flush(&mut scene, &mut arrays).unwrap();

        assert_eq!(stats.objects_written, 2);
        assert_eq!(arrays.object(0).material.albedo, [0.2, 0.4, 0.6]);
        assert_eq!(arrays.object(1).material.albedo, [0.2, 0.4, 0.6]);
    }

    #[test]
    fn plane_material_edit_rewrites_params() {
        let mut scene = SceneStore::new();
        let (mut sync, mut arrays) = synced(&mut scene);
        let plane = scene.params().plane_material;
        scene.material_mut(plane).unwrap().roughness = 0.25;
        let stats = sync.flush(&mut scene, &mut arrays).unwrap();
        assert!(stats.params_written);
        assert_eq!(arrays.params().plane_material.roughness, 0.25);
    }

    #[test]
    fn field_edit_pushes_single_slot() {
        let mut scene = scene_with_spheres(3);
        let (mut sync, mut arrays) = synced(&mut scene);
        let key = scene.object_key(1);
        scene.object_mut(key).unwrap().position.y = 9.0;
        let stats = sync.flush(&mut scene, &mut arrays).unwrap();
        assert_eq!(stats.objects_written, 1);
        assert!(!stats.params_written);
        assert_eq!(arrays.object(1).position[1], 9.0);
    }

    #[test]
    fn light_field_edit_pushes_single_slot() {
        let mut scene = SceneStore::new();
        let keys: Vec<_> = (0..3)
            .map(|_| scene.add_light(PointLight::default()))
            .collect();
        let (mut sync, mut arrays) = synced(&mut scene);
        scene.light_mut(keys[2]).unwrap().reach = 12.0;
        let stats = sync.flush(&mut scene, &mut arrays).unwrap();
        assert_eq!(stats.lights_written, 1);
        assert_eq!(stats.objects_written, 0);
        assert_eq!(arrays.light(2).reach, 12.0);
    }

    #[test]
    fn quiet_flush_writes_nothing() {
        let mut scene = scene_with_spheres(2);
        let (mut sync, mut arrays) = synced(&mut scene);
        let before = arrays.write_count();
        let stats = sync.flush(&mut scene, &mut arrays).unwrap();
        assert!(stats.is_empty());
        assert_eq!(arrays.write_count(), before);
    }

    #[test]
    fn capacity_is_checked_before_rendering() {
        let scene = scene_with_spheres(3);
        let sync = DeviceSync::new();
        let arrays = HostArrays::with_capacity(2, 4);
        let err = sync.validate_capacity(&scene, &arrays).unwrap_err();
        assert_eq!(
            err,
            SyncError::CapacityExceeded {
                kind: ArrayKind::Objects,
                required: 3,
                capacity: 2,
            }
        );
        assert!(err.to_string().contains("object"));
    }

    #[test]
    fn push_past_capacity_is_an_error_not_a_truncation() {
        let mut scene = scene_with_spheres(3);
        let mut sync = DeviceSync::new();
        let mut arrays = HostArrays::with_capacity(2, 4);
        assert!(sync.push_object(&scene, 2, &mut arrays).is_err());
        assert!(sync.flush(&mut scene, &mut arrays).is_err());
        // a failed flush schedules a full resync once the scene fits again
        scene.remove_object(0);
        let stats = sync.flush(&mut scene, &mut arrays).unwrap();
        assert_eq!(stats.objects_written, 2);
        assert!(stats.params_written);
    }

    #[test]
    fn new_program_forces_full_resync() {
        let mut scene = scene_with_spheres(2);
        let (mut sync, mut arrays) = synced(&mut scene);
        let program = ProgramId::next();
        assert!(sync.bind_program(program));
        assert!(!sync.bind_program(program));
        assert_eq!(sync.program(), Some(program));
        let stats = sync.flush(&mut scene, &mut arrays).unwrap();
        assert_eq!(stats.objects_written, 2);
    }

    #[test]
    fn program_ids_are_unique() {
        assert_ne!(ProgramId::next(), ProgramId::next());
    }
}
