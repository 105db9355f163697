use glam::Vec3;
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Stable handle to an object. Survives removal of other objects.
    pub struct ObjectKey;
    /// Stable handle to a point light.
    pub struct LightKey;
    /// Stable handle to a material. Materials are never removed.
    pub struct MaterialKey;
}

/// Shape tag understood by the tracing program.
///
/// Discriminants are part of the shader contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum ShapeKind {
    #[default]
    None = 0,
    Sphere = 1,
    Cube = 2,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 3] = [ShapeKind::None, ShapeKind::Sphere, ShapeKind::Cube];

    pub fn label(self) -> &'static str {
        match self {
            ShapeKind::None => "None",
            ShapeKind::Sphere => "Sphere",
            ShapeKind::Cube => "Cube",
        }
    }
}

/// Surface description shared by any number of objects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub albedo: Vec3,
    pub emission: Vec3,
    pub emission_strength: f32,
    pub specular: Vec3,
    /// In `[0, 1]`.
    pub roughness: f32,
    /// Sharpness of the specular highlight.
    pub specular_highlight: f32,
    pub specular_exponent: f32,
    pub transparent: bool,
    pub refractive_index: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: Vec3::ONE,
            emission: Vec3::ZERO,
            emission_strength: 0.0,
            specular: Vec3::ZERO,
            roughness: 1.0,
            specular_highlight: 0.0,
            specular_exponent: 32.0,
            transparent: false,
            refractive_index: 1.5,
        }
    }
}

impl Material {
    /// Diffuse material with the given albedo.
    pub fn diffuse(albedo: Vec3) -> Self {
        Self {
            albedo,
            ..Self::default()
        }
    }
}

/// A traced primitive. For spheres only `scale.x` is used, as the radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Object {
    pub kind: ShapeKind,
    pub position: Vec3,
    pub scale: Vec3,
    pub material: MaterialKey,
}

impl Object {
    pub fn new(kind: ShapeKind, position: Vec3, scale: Vec3, material: MaterialKey) -> Self {
        Self {
            kind,
            position,
            scale,
            material,
        }
    }

    pub fn sphere(position: Vec3, radius: f32, material: MaterialKey) -> Self {
        Self::new(ShapeKind::Sphere, position, Vec3::splat(radius), material)
    }

    pub fn cube(position: Vec3, scale: Vec3, material: MaterialKey) -> Self {
        Self::new(ShapeKind::Cube, position, scale, material)
    }

    pub fn radius(&self) -> f32 {
        self.scale.x
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointLight {
    pub position: Vec3,
    pub radius: f32,
    pub color: Vec3,
    pub power: f32,
    pub reach: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            radius: 0.0,
            color: Vec3::ONE,
            power: 0.0,
            reach: 0.0,
        }
    }
}

/// Process-wide render configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderParams {
    /// Soft shadow samples taken per light.
    pub shadow_resolution: u32,
    pub max_bounces: u32,
    pub sky_gamma: f32,
    pub sky_strength: f32,
    pub plane_visible: bool,
    pub plane_material: MaterialKey,
}

impl RenderParams {
    pub fn new(plane_material: MaterialKey) -> Self {
        Self {
            shadow_resolution: 50,
            max_bounces: 4,
            sky_gamma: 2.2,
            sky_strength: 1.0,
            plane_visible: true,
            plane_material,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn material_default_is_white_rough() {
        let m = Material::default();
        assert_eq!(m.albedo, Vec3::ONE);
        assert_eq!(m.emission, Vec3::ZERO);
        assert_eq!(m.roughness, 1.0);
        assert!(!m.transparent);
    }

    #[test]
    fn equality_is_fieldwise() {
        let a = Material::default();
        let mut b = a;
        assert_eq!(a, b);
        b.roughness = 0.5;
        assert_ne!(a, b);
    }

    #[test]
    fn shape_discriminants_match_shader() {
        assert_eq!(ShapeKind::None as u32, 0);
        assert_eq!(ShapeKind::Sphere as u32, 1);
        assert_eq!(ShapeKind::Cube as u32, 2);
    }

    #[test]
    fn sphere_radius_is_first_scale_component() {
        let key = MaterialKey::default();
        let o = Object::sphere(Vec3::ZERO, 2.5, key);
        assert_eq!(o.radius(), 2.5);
    }
}
