//! Scene documents on disk.
//!
//! A scene file is a serde document (JSON or YAML, picked by extension) in
//! which objects and the ground plane refer to materials by their index in
//! the file's `materials` list. The list may be empty, in which case index 0
//! names the store's default material.
//!
//! ```yaml
//! materials:
//!   - albedo: [0.9, 0.2, 0.2]
//!     roughness: 0.4
//! objects:
//!   - kind: sphere
//!     position: [0.0, 1.0, 4.0]
//!     scale: [1.0, 1.0, 1.0]
//!     material: 0
//! lights:
//!   - position: [2.0, 5.0, 2.0]
//!     radius: 0.3
//!     power: 40.0
//!     reach: 30.0
//! ```

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::store::SceneStore;
use crate::types::{Material, Object, PointLight, RenderParams, ShapeKind};

/// Errors from scene file operations.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("unsupported scene file extension: {0:?}")]
    UnsupportedFormat(String),
    #[error("{owner} references material {index}, but the file defines {count}")]
    UnknownMaterial {
        owner: String,
        index: usize,
        count: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectEntry {
    #[serde(default)]
    pub kind: ShapeKind,
    #[serde(default)]
    pub position: Vec3,
    #[serde(default = "unit_scale")]
    pub scale: Vec3,
    #[serde(default)]
    pub material: usize,
}

fn unit_scale() -> Vec3 {
    Vec3::ONE
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamsEntry {
    pub shadow_resolution: u32,
    pub max_bounces: u32,
    pub sky_gamma: f32,
    pub sky_strength: f32,
    pub plane_visible: bool,
    pub plane_material: usize,
}

impl Default for ParamsEntry {
    fn default() -> Self {
        let defaults = RenderParams::new(Default::default());
        Self {
            shadow_resolution: defaults.shadow_resolution,
            max_bounces: defaults.max_bounces,
            sky_gamma: defaults.sky_gamma,
            sky_strength: defaults.sky_strength,
            plane_visible: defaults.plane_visible,
            plane_material: 0,
        }
    }
}

/// Serializable scene description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneFile {
    pub params: ParamsEntry,
    pub materials: Vec<Material>,
    pub objects: Vec<ObjectEntry>,
    pub lights: Vec<PointLight>,
}

#[derive(Clone, Copy)]
enum Format {
    Json,
    Yaml,
}

fn format_of(path: &Path) -> Result<Format, SceneError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("yaml" | "yml") => Ok(Format::Yaml),
        other => Err(SceneError::UnsupportedFormat(
            other.unwrap_or_default().to_string(),
        )),
    }
}

impl SceneFile {
    /// Read a scene document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let path = path.as_ref();
        let format = format_of(path)?;
        let data = std::fs::read_to_string(path)?;
        let file = match format {
            Format::Json => serde_json::from_str(&data)?,
            Format::Yaml => serde_yaml::from_str(&data)?,
        };
        tracing::info!("loaded scene file {}", path.display());
        Ok(file)
    }

    /// Write this document to disk.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SceneError> {
        let path = path.as_ref();
        match format_of(path)? {
            Format::Json => serde_json::to_writer_pretty(std::fs::File::create(path)?, self)?,
            Format::Yaml => serde_yaml::to_writer(std::fs::File::create(path)?, self)?,
        }
        Ok(())
    }

    /// Build a store. File materials occupy slots 0..n, replacing the default
    /// material at slot 0 when the file defines any.
    pub fn into_store(self) -> Result<SceneStore, SceneError> {
        let mut store = SceneStore::new();
        let mut keys = vec![store.default_material()];
        if let Some((first, rest)) = self.materials.split_first() {
            store.set_material(keys[0], *first);
            keys.extend(rest.iter().map(|m| store.add_material(*m)));
        }

        let lookup = |owner: String, index: usize| {
            keys.get(index).copied().ok_or(SceneError::UnknownMaterial {
                owner,
                index,
                count: keys.len(),
            })
        };

        let mut params = RenderParams::new(lookup("plane".into(), self.params.plane_material)?);
        params.shadow_resolution = self.params.shadow_resolution;
        params.max_bounces = self.params.max_bounces;
        params.sky_gamma = self.params.sky_gamma;
        params.sky_strength = self.params.sky_strength;
        params.plane_visible = self.params.plane_visible;

        let mut objects = Vec::with_capacity(self.objects.len());
        for (i, entry) in self.objects.iter().enumerate() {
            let material = lookup(format!("object {i}"), entry.material)?;
            objects.push(Object::new(entry.kind, entry.position, entry.scale, material));
        }

        store.set_params(params);
        for object in objects {
            store.add_object(object);
        }
        for light in self.lights {
            store.add_light(light);
        }
        Ok(store)
    }

    /// Capture a store, translating keys to material indices.
    pub fn from_store(store: &SceneStore) -> Self {
        let index_of = |key| store.material_slot(key).unwrap_or_default();
        let p = store.params();
        Self {
            params: ParamsEntry {
                shadow_resolution: p.shadow_resolution,
                max_bounces: p.max_bounces,
                sky_gamma: p.sky_gamma,
                sky_strength: p.sky_strength,
                plane_visible: p.plane_visible,
                plane_material: index_of(p.plane_material),
            },
            materials: store.materials().map(|(_, m)| *m).collect(),
            objects: store
                .objects()
                .map(|(_, o)| ObjectEntry {
                    kind: o.kind,
                    position: o.position,
                    scale: o.scale,
                    material: index_of(o.material),
                })
                .collect(),
            lights: store.lights().map(|(_, l)| *l).collect(),
        }
    }

    /// The scene shown when no file is given.
    pub fn demo() -> Self {
        let floor = Material {
            albedo: Vec3::splat(0.75),
            roughness: 0.9,
            ..Material::default()
        };
        let red = Material {
            albedo: Vec3::new(0.9, 0.2, 0.2),
            roughness: 0.5,
            specular: Vec3::ONE,
            specular_highlight: 0.4,
            ..Material::default()
        };
        let mirror = Material {
            albedo: Vec3::splat(0.95),
            roughness: 0.0,
            specular: Vec3::ONE,
            specular_highlight: 1.0,
            specular_exponent: 256.0,
            ..Material::default()
        };
        let glass = Material {
            albedo: Vec3::ONE,
            roughness: 0.0,
            transparent: true,
            refractive_index: 1.5,
            ..Material::default()
        };
        let lamp = Material {
            emission: Vec3::new(1.0, 0.85, 0.6),
            emission_strength: 4.0,
            ..Material::default()
        };

        Self {
            params: ParamsEntry::default(),
            materials: vec![floor, red, mirror, glass, lamp],
            objects: vec![
                ObjectEntry {
                    kind: ShapeKind::Sphere,
                    position: Vec3::new(0.0, 1.0, 5.0),
                    scale: Vec3::ONE,
                    material: 1,
                },
                ObjectEntry {
                    kind: ShapeKind::Sphere,
                    position: Vec3::new(-2.2, 0.8, 6.0),
                    scale: Vec3::splat(0.8),
                    material: 2,
                },
                ObjectEntry {
                    kind: ShapeKind::Sphere,
                    position: Vec3::new(2.0, 0.7, 4.5),
                    scale: Vec3::splat(0.7),
                    material: 3,
                },
                ObjectEntry {
                    kind: ShapeKind::Cube,
                    position: Vec3::new(0.0, 0.5, 8.0),
                    scale: Vec3::new(6.0, 1.0, 0.5),
                    material: 0,
                },
                ObjectEntry {
                    kind: ShapeKind::Sphere,
                    position: Vec3::new(-1.0, 3.5, 7.0),
                    scale: Vec3::splat(0.3),
                    material: 4,
                },
            ],
            lights: vec![PointLight {
                position: Vec3::new(2.0, 5.0, 3.0),
                radius: 0.4,
                color: Vec3::ONE,
                power: 30.0,
                reach: 40.0,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_builds_a_consistent_store() {
        let store = SceneFile::demo().into_store().unwrap();
        assert_eq!(store.object_count(), 5);
        assert_eq!(store.light_count(), 1);
        assert_eq!(store.material_count(), 5);
        // first file material replaces the default at slot 0
        assert_eq!(store.material_key(0), store.default_material());
        assert_eq!(store.material(0).roughness, 0.9);
    }

    #[test]
    fn empty_file_yields_empty_scene() {
        let store = SceneFile::default().into_store().unwrap();
        assert_eq!(store.object_count(), 0);
        assert_eq!(store.material_count(), 1);
    }

    #[test]
    fn unknown_material_index_is_rejected() {
        let file = SceneFile {
            objects: vec![ObjectEntry {
                kind: ShapeKind::Sphere,
                position: Vec3::ZERO,
                scale: Vec3::ONE,
                material: 3,
            }],
            ..SceneFile::default()
        };
        let err = file.into_store().unwrap_err();
        assert!(matches!(err, SceneError::UnknownMaterial { index: 3, count: 1, .. }));
    }

    #[test]
    fn yaml_defaults_fill_missing_fields() {
        let yaml = "objects:\n  - kind: cube\n    position: [1.0, 2.0, 3.0]\n";
        let file: SceneFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.objects[0].scale, Vec3::ONE);
        assert_eq!(file.objects[0].material, 0);
        assert_eq!(file.params.shadow_resolution, 50);
    }

    #[test]
    fn save_and_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.json");
        let original = SceneFile::demo();
        original.save(&path).unwrap();
        let loaded = SceneFile::load(&path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn from_store_preserves_material_sharing() {
        let store = SceneFile::demo().into_store().unwrap();
        let file = SceneFile::from_store(&store);
        assert_eq!(file.objects[3].material, 0);
        assert_eq!(file.objects[0].material, 1);
        assert_eq!(file.materials.len(), 5);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = SceneFile::load("scene.toml").unwrap_err();
        assert!(matches!(err, SceneError::UnsupportedFormat(_)));
    }
}
