use std::fmt;

use crate::layout::{GpuLight, GpuObject, GpuSceneParams, MAX_LIGHTS, MAX_OBJECTS};
use bytemuck::Zeroable;

/// Destination of slot writes: the shader-visible arrays-of-structs.
///
/// Implemented over GPU buffers by the render backend and over plain vectors
/// by [`HostArrays`]. Callers never write at or past the capacities.
pub trait DeviceArrays {
    fn object_capacity(&self) -> usize;
    fn light_capacity(&self) -> usize;
    fn write_object(&mut self, slot: usize, value: &GpuObject);
    fn write_light(&mut self, slot: usize, value: &GpuLight);
    fn write_params(&mut self, value: &GpuSceneParams);
}

/// CPU-side copy of the device arrays.
#[derive(Debug, Clone)]
pub struct HostArrays {
    objects: Vec<GpuObject>,
    lights: Vec<GpuLight>,
    params: GpuSceneParams,
    writes: usize,
}

impl Default for HostArrays {
    fn default() -> Self {
        Self::with_capacity(MAX_OBJECTS, MAX_LIGHTS)
    }
}

impl HostArrays {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(objects: usize, lights: usize) -> Self {
        Self {
            objects: vec![GpuObject::zeroed(); objects],
            lights: vec![GpuLight::zeroed(); lights],
            params: GpuSceneParams::zeroed(),
            writes: 0,
        }
    }

    pub fn object(&self, slot: usize) -> &GpuObject {
        &self.objects[slot]
    }

    pub fn light(&self, slot: usize) -> &GpuLight {
        &self.lights[slot]
    }

    pub fn params(&self) -> &GpuSceneParams {
        &self.params
    }

    /// Total slot and parameter writes received.
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl DeviceArrays for HostArrays {
    fn object_capacity(&self) -> usize {
        self.objects.len()
    }

    fn light_capacity(&self) -> usize {
        self.lights.len()
    }

    fn write_object(&mut self, slot: usize, value: &GpuObject) {
        self.objects[slot] = *value;
        self.writes += 1;
    }

    fn write_light(&mut self, slot: usize, value: &GpuLight) {
        self.lights[slot] = *value;
        self.writes += 1;
    }

    fn write_params(&mut self, value: &GpuSceneParams) {
        self.params = *value;
        self.writes += 1;
    }
}

impl fmt::Display for HostArrays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.params;
        writeln!(
            f,
            "=== Device arrays (objects={}/{}, lights={}/{}) ===",
            p.object_count,
            self.objects.len(),
            p.light_count,
            self.lights.len()
        )?;
        writeln!(
            f,
            "params: shadow_resolution={} max_bounces={} sky_gamma={:.2} sky_strength={:.2} plane={}",
            p.shadow_resolution,
            p.max_bounces,
            p.sky_gamma,
            p.sky_strength,
            if p.plane_visible != 0 { "on" } else { "off" }
        )?;
        for (slot, o) in self.objects.iter().enumerate().take(p.object_count as usize) {
            writeln!(
                f,
                "  object[{slot}] kind={} pos=({:.2}, {:.2}, {:.2}) scale=({:.2}, {:.2}, {:.2}) albedo=({:.2}, {:.2}, {:.2})",
                o.kind,
                o.position[0],
                o.position[1],
                o.position[2],
                o.scale[0],
                o.scale[1],
                o.scale[2],
                o.material.albedo[0],
                o.material.albedo[1],
                o.material.albedo[2],
            )?;
        }
        for (slot, l) in self.lights.iter().enumerate().take(p.light_count as usize) {
            writeln!(
                f,
                "  light[{slot}] pos=({:.2}, {:.2}, {:.2}) radius={:.2} power={:.2} reach={:.2}",
                l.position[0], l.position[1], l.position[2], l.radius, l.power, l.reach,
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_zeroed_at_shader_capacity() {
        let arrays = HostArrays::new();
        assert_eq!(arrays.object_capacity(), MAX_OBJECTS);
        assert_eq!(arrays.light_capacity(), MAX_LIGHTS);
        assert_eq!(*arrays.object(0), GpuObject::zeroed());
        assert_eq!(arrays.write_count(), 0);
    }

    #[test]
    fn writes_land_in_slot() {
        let mut arrays = HostArrays::with_capacity(2, 1);
        let value = GpuObject {
            kind: 2,
            ..GpuObject::zeroed()
        };
        arrays.write_object(1, &value);
        assert_eq!(arrays.object(1).kind, 2);
        assert_eq!(arrays.object(0).kind, 0);
        assert_eq!(arrays.write_count(), 1);
    }

    #[test]
    fn dump_lists_live_slots_only() {
        let mut arrays = HostArrays::with_capacity(4, 1);
        arrays.write_object(0, &GpuObject::zeroed());
        arrays.write_params(&GpuSceneParams {
            object_count: 1,
            ..GpuSceneParams::zeroed()
        });
        let text = arrays.to_string();
        assert!(text.contains("object[0]"));
        assert!(!text.contains("object[1]"));
    }
}
