//! Shader-visible data layouts.
//!
//! Every struct here mirrors a WGSL struct in the uniform address space:
//! members are packed as `vec3<f32>` + scalar pairs so each row is 16 bytes,
//! and array element sizes are multiples of 16.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use lumen_scene::{Material, Object, PointLight, RenderParams};

/// Object array length compiled into the tracing program.
pub const MAX_OBJECTS: usize = 64;
/// Light array length compiled into the tracing program.
pub const MAX_LIGHTS: usize = 16;

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct GpuMaterial {
    pub albedo: [f32; 3],
    pub roughness: f32,
    pub emission: [f32; 3],
    pub emission_strength: f32,
    pub specular: [f32; 3],
    pub specular_highlight: f32,
    pub specular_exponent: f32,
    pub transparent: u32,
    pub refractive_index: f32,
    pub _pad: f32,
}

impl From<&Material> for GpuMaterial {
    fn from(m: &Material) -> Self {
        Self {
            albedo: m.albedo.to_array(),
            roughness: m.roughness,
            emission: m.emission.to_array(),
            emission_strength: m.emission_strength,
            specular: m.specular.to_array(),
            specular_highlight: m.specular_highlight,
            specular_exponent: m.specular_exponent,
            transparent: m.transparent as u32,
            refractive_index: m.refractive_index,
            _pad: 0.0,
        }
    }
}

/// One slot of the object array. The material is flattened in by value.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct GpuObject {
    pub position: [f32; 3],
    pub kind: u32,
    pub scale: [f32; 3],
    pub _pad: f32,
    pub material: GpuMaterial,
}

impl GpuObject {
    pub fn new(object: &Object, material: &Material) -> Self {
        Self {
            position: object.position.to_array(),
            kind: object.kind as u32,
            scale: object.scale.to_array(),
            _pad: 0.0,
            material: material.into(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct GpuLight {
    pub position: [f32; 3],
    pub radius: f32,
    pub color: [f32; 3],
    pub power: f32,
    pub reach: f32,
    pub _pad: [f32; 3],
}

impl From<&PointLight> for GpuLight {
    fn from(l: &PointLight) -> Self {
        Self {
            position: l.position.to_array(),
            radius: l.radius,
            color: l.color.to_array(),
            power: l.power,
            reach: l.reach,
            _pad: [0.0; 3],
        }
    }
}

/// Global render parameters plus the live array lengths.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct GpuSceneParams {
    pub object_count: u32,
    pub light_count: u32,
    pub shadow_resolution: u32,
    pub max_bounces: u32,
    pub sky_gamma: f32,
    pub sky_strength: f32,
    pub plane_visible: u32,
    pub _pad: u32,
    pub plane_material: GpuMaterial,
}

impl GpuSceneParams {
    pub fn new(
        params: &RenderParams,
        plane_material: &Material,
        object_count: usize,
        light_count: usize,
    ) -> Self {
        Self {
            object_count: object_count as u32,
            light_count: light_count as u32,
            shadow_resolution: params.shadow_resolution,
            max_bounces: params.max_bounces,
            sky_gamma: params.sky_gamma,
            sky_strength: params.sky_strength,
            plane_visible: params.plane_visible as u32,
            _pad: 0,
            plane_material: plane_material.into(),
        }
    }
}

/// Time-varying per-pass uniforms.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct GpuFrame {
    pub camera_rotation: [[f32; 4]; 4],
    pub camera_position: [f32; 3],
    pub aspect_ratio: f32,
    pub time: f32,
    pub pass_index: u32,
    /// 1 while the direct pass runs, 0 for the composite pass.
    pub direct_mode: u32,
    pub _pad: u32,
}

impl Default for GpuFrame {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Mat4::IDENTITY, 1.0, 0.0, 0, true)
    }
}

impl GpuFrame {
    pub fn new(
        camera_position: Vec3,
        camera_rotation: Mat4,
        aspect_ratio: f32,
        time: f32,
        pass_index: u32,
        direct: bool,
    ) -> Self {
        Self {
            camera_rotation: camera_rotation.to_cols_array_2d(),
            camera_position: camera_position.to_array(),
            aspect_ratio,
            time,
            pass_index,
            direct_mode: direct as u32,
            _pad: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_scene::{SceneStore, ShapeKind};
    use std::mem::size_of;

    #[test]
    fn sizes_match_wgsl_layout() {
        assert_eq!(size_of::<GpuMaterial>(), 64);
        assert_eq!(size_of::<GpuObject>(), 96);
        assert_eq!(size_of::<GpuLight>(), 48);
        assert_eq!(size_of::<GpuSceneParams>(), 96);
        assert_eq!(size_of::<GpuFrame>(), 96);
    }

    #[test]
    fn array_strides_are_16_aligned() {
        assert_eq!(size_of::<GpuObject>() % 16, 0);
        assert_eq!(size_of::<GpuLight>() % 16, 0);
    }

    #[test]
    fn object_flattens_material() {
        let store = SceneStore::new();
        let mat = Material::diffuse(Vec3::new(0.1, 0.2, 0.3));
        let obj = Object::sphere(Vec3::new(0.0, 0.0, 2.0), 1.5, store.default_material());
        let gpu = GpuObject::new(&obj, &mat);
        assert_eq!(gpu.kind, ShapeKind::Sphere as u32);
        assert_eq!(gpu.position, [0.0, 0.0, 2.0]);
        assert_eq!(gpu.scale[0], 1.5);
        assert_eq!(gpu.material.albedo, [0.1, 0.2, 0.3]);
    }

    #[test]
    fn zeroed_object_is_kind_none() {
        assert_eq!(GpuObject::zeroed().kind, ShapeKind::None as u32);
        assert_eq!(GpuObject::zeroed(), GpuObject::default());
    }

    #[test]
    fn frame_mode_flag() {
        let f = GpuFrame::new(Vec3::ONE, Mat4::IDENTITY, 1.5, 2.0, 7, false);
        assert_eq!(f.direct_mode, 0);
        assert_eq!(f.pass_index, 7);
        assert_eq!(f.camera_rotation[3][3], 1.0);
    }
}
