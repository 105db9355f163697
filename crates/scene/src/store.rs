use slotmap::SlotMap;

use crate::types::{LightKey, Material, MaterialKey, Object, ObjectKey, PointLight, RenderParams};

/// A record produced by every mutation of the store.
///
/// The change log is what the device mirror consumes: nothing reaches the GPU
/// arrays until the log is drained and the affected slots are pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneChange {
    /// Object appended at `slot`.
    ObjectAdded { slot: usize },
    /// Object erased from `slot`; every later object moved down by one.
    ObjectRemoved { slot: usize },
    ObjectChanged(ObjectKey),
    LightAdded { slot: usize },
    LightRemoved { slot: usize },
    LightChanged(LightKey),
    MaterialAdded(MaterialKey),
    MaterialChanged(MaterialKey),
    ParamsChanged,
}

/// Entity counts for tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneSummary {
    pub objects: usize,
    pub lights: usize,
    pub materials: usize,
}

impl std::fmt::Display for SceneSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Scene: objects={} lights={} materials={}",
            self.objects, self.lights, self.materials
        )
    }
}

/// The authoritative scene.
///
/// Entities live in generation-tagged arenas so a held key can never alias a
/// different entity. Each collection also keeps a dense insertion-ordered
/// list of keys: an entity's slot is its position in that list, and it moves
/// down by one whenever an earlier entity is removed. Slots are what the
/// device arrays are indexed by; keys are what callers should hold on to.
///
/// Slot accessors treat an out-of-range slot as a broken invariant and panic.
#[derive(Debug, Clone)]
pub struct SceneStore {
    objects: SlotMap<ObjectKey, Object>,
    object_order: Vec<ObjectKey>,
    lights: SlotMap<LightKey, PointLight>,
    light_order: Vec<LightKey>,
    materials: SlotMap<MaterialKey, Material>,
    material_order: Vec<MaterialKey>,
    default_material: MaterialKey,
    params: RenderParams,
    changes: Vec<SceneChange>,
}

impl Default for SceneStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneStore {
    /// Empty scene holding only the default material at slot 0.
    pub fn new() -> Self {
        let mut materials = SlotMap::with_key();
        let default_material = materials.insert(Material::default());
        Self {
            objects: SlotMap::with_key(),
            object_order: Vec::new(),
            lights: SlotMap::with_key(),
            light_order: Vec::new(),
            materials,
            material_order: vec![default_material],
            default_material,
            params: RenderParams::new(default_material),
            changes: vec![
                SceneChange::MaterialAdded(default_material),
                SceneChange::ParamsChanged,
            ],
        }
    }

    pub fn summary(&self) -> SceneSummary {
        SceneSummary {
            objects: self.object_count(),
            lights: self.light_count(),
            materials: self.material_count(),
        }
    }

    /// Drain the change log.
    pub fn drain_changes(&mut self) -> Vec<SceneChange> {
        std::mem::take(&mut self.changes)
    }

    /// Pending, undrained changes.
    pub fn changes(&self) -> &[SceneChange] {
        &self.changes
    }

    // --- Objects ---

    pub fn object_count(&self) -> usize {
        self.object_order.len()
    }

    /// Append an object. Its slot is the previous object count.
    pub fn add_object(&mut self, object: Object) -> ObjectKey {
        self.assert_material(object.material);
        let key = self.objects.insert(object);
        let slot = self.object_order.len();
        self.object_order.push(key);
        self.changes.push(SceneChange::ObjectAdded { slot });
        key
    }

    /// Erase the object at `slot`, shifting every later object down by one.
    pub fn remove_object(&mut self, slot: usize) -> (ObjectKey, Object) {
        check_slot("object", slot, self.object_order.len());
        let key = self.object_order.remove(slot);
        let object = self
            .objects
            .remove(key)
            .unwrap_or_else(|| panic!("object order references dead key at slot {slot}"));
        self.changes.push(SceneChange::ObjectRemoved { slot });
        (key, object)
    }

    pub fn object(&self, slot: usize) -> &Object {
        &self.objects[self.object_key(slot)]
    }

    pub fn object_key(&self, slot: usize) -> ObjectKey {
        check_slot("object", slot, self.object_order.len());
        self.object_order[slot]
    }

    pub fn object_slot(&self, key: ObjectKey) -> Option<usize> {
        self.object_order.iter().position(|k| *k == key)
    }

    pub fn object_by_key(&self, key: ObjectKey) -> Option<&Object> {
        self.objects.get(key)
    }

    /// Mutable access for in-place field edits. The object is logged as
    /// changed whether or not the caller ends up writing to it.
    pub fn object_mut(&mut self, key: ObjectKey) -> Option<&mut Object> {
        let object = self.objects.get_mut(key)?;
        self.changes.push(SceneChange::ObjectChanged(key));
        Some(object)
    }

    /// Replace an object's value. Returns false if the key is dead.
    pub fn set_object(&mut self, key: ObjectKey, object: Object) -> bool {
        self.assert_material(object.material);
        let Some(slot) = self.objects.get_mut(key) else {
            return false;
        };
        *slot = object;
        self.changes.push(SceneChange::ObjectChanged(key));
        true
    }

    /// Objects in slot order.
    pub fn objects(&self) -> impl Iterator<Item = (ObjectKey, &Object)> + '_ {
        self.object_order.iter().map(|k| (*k, &self.objects[*k]))
    }

    /// Slots of every object referencing `material`.
    pub fn objects_using(&self, material: MaterialKey) -> impl Iterator<Item = usize> + '_ {
        self.object_order
            .iter()
            .enumerate()
            .filter(move |(_, k)| self.objects[**k].material == material)
            .map(|(slot, _)| slot)
    }

    // --- Lights ---

    pub fn light_count(&self) -> usize {
        self.light_order.len()
    }

    pub fn add_light(&mut self, light: PointLight) -> LightKey {
        let key = self.lights.insert(light);
        let slot = self.light_order.len();
        self.light_order.push(key);
        self.changes.push(SceneChange::LightAdded { slot });
        key
    }

    /// Erase the light at `slot`, shifting every later light down by one.
    pub fn remove_light(&mut self, slot: usize) -> (LightKey, PointLight) {
        check_slot("light", slot, self.light_order.len());
        let key = self.light_order.remove(slot);
        let light = self
            .lights
            .remove(key)
            .unwrap_or_else(|| panic!("light order references dead key at slot {slot}"));
        self.changes.push(SceneChange::LightRemoved { slot });
        (key, light)
    }

    pub fn light(&self, slot: usize) -> &PointLight {
        &self.lights[self.light_key(slot)]
    }

    pub fn light_key(&self, slot: usize) -> LightKey {
        check_slot("light", slot, self.light_order.len());
        self.light_order[slot]
    }

    pub fn light_slot(&self, key: LightKey) -> Option<usize> {
        self.light_order.iter().position(|k| *k == key)
    }

    pub fn light_by_key(&self, key: LightKey) -> Option<&PointLight> {
        self.lights.get(key)
    }

    pub fn light_mut(&mut self, key: LightKey) -> Option<&mut PointLight> {
        let light = self.lights.get_mut(key)?;
        self.changes.push(SceneChange::LightChanged(key));
        Some(light)
    }

    pub fn set_light(&mut self, key: LightKey, light: PointLight) -> bool {
        let Some(slot) = self.lights.get_mut(key) else {
            return false;
        };
        *slot = light;
        self.changes.push(SceneChange::LightChanged(key));
        true
    }

    pub fn lights(&self) -> impl Iterator<Item = (LightKey, &PointLight)> + '_ {
        self.light_order.iter().map(|k| (*k, &self.lights[*k]))
    }

    // --- Materials ---

    pub fn material_count(&self) -> usize {
        self.material_order.len()
    }

    /// The material every new scene starts with (slot 0).
    pub fn default_material(&self) -> MaterialKey {
        self.default_material
    }

    pub fn add_material(&mut self, material: Material) -> MaterialKey {
        let key = self.materials.insert(material);
        self.material_order.push(key);
        self.changes.push(SceneChange::MaterialAdded(key));
        key
    }

    pub fn material(&self, slot: usize) -> &Material {
        &self.materials[self.material_key(slot)]
    }

    pub fn material_key(&self, slot: usize) -> MaterialKey {
        check_slot("material", slot, self.material_order.len());
        self.material_order[slot]
    }

    pub fn material_slot(&self, key: MaterialKey) -> Option<usize> {
        self.material_order.iter().position(|k| *k == key)
    }

    pub fn material_by_key(&self, key: MaterialKey) -> Option<&Material> {
        self.materials.get(key)
    }

    /// Resolve a reference held by an object or the ground plane.
    ///
    /// # Panics
    /// If the key is dead. References are checked on every write, so this
    /// only fires on a broken invariant.
    pub fn resolve_material(&self, key: MaterialKey) -> &Material {
        self.materials
            .get(key)
            .unwrap_or_else(|| panic!("dangling material reference {key:?}"))
    }

    pub fn material_mut(&mut self, key: MaterialKey) -> Option<&mut Material> {
        let material = self.materials.get_mut(key)?;
        self.changes.push(SceneChange::MaterialChanged(key));
        Some(material)
    }

    pub fn set_material(&mut self, key: MaterialKey, material: Material) -> bool {
        let Some(slot) = self.materials.get_mut(key) else {
            return false;
        };
        *slot = material;
        self.changes.push(SceneChange::MaterialChanged(key));
        true
    }

    pub fn materials(&self) -> impl Iterator<Item = (MaterialKey, &Material)> + '_ {
        self.material_order.iter().map(|k| (*k, &self.materials[*k]))
    }

    // --- Global parameters ---

    pub fn params(&self) -> &RenderParams {
        &self.params
    }

    pub fn set_params(&mut self, params: RenderParams) {
        self.assert_material(params.plane_material);
        self.params = params;
        self.changes.push(SceneChange::ParamsChanged);
    }

    fn assert_material(&self, key: MaterialKey) {
        assert!(
            self.materials.contains_key(key),
            "material reference {key:?} does not name a live material"
        );
    }
}

fn check_slot(kind: &str, slot: usize, len: usize) {
    assert!(slot < len, "{kind} slot {slot} out of range (count {len})");
}
