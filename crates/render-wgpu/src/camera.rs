use std::f32::consts::FRAC_PI_2;

use glam::{Mat4, Vec3};
use lumen_render::CameraView;

/// Fly camera driven by look deltas and movement axes.
///
/// Camera space is +X right, +Y up, +Z forward; the tracing program casts
/// each primary ray as `rotation * (u * aspect, v, 1)`.
#[derive(Debug, Clone)]
pub struct CameraRig {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    /// World units per second.
    pub speed: f32,
    /// Radians per pixel of look delta.
    pub sensitivity: f32,
    rotation: Mat4,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 1.0, -4.0))
    }
}

impl CameraRig {
    pub fn new(position: Vec3) -> Self {
        let mut rig = Self {
            position,
            yaw: 0.0,
            pitch: 0.0,
            speed: 3.0,
            sensitivity: 0.002,
            rotation: Mat4::IDENTITY,
        };
        rig.recompute();
        rig
    }

    pub fn rotation(&self) -> Mat4 {
        self.rotation
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation.transform_vector3(Vec3::Z)
    }

    pub fn right(&self) -> Vec3 {
        self.rotation.transform_vector3(Vec3::X)
    }

    /// Turn by a pointer delta in pixels. Pitch stops at straight up and
    /// straight down. Returns whether the orientation changed.
    pub fn apply_look_delta(&mut self, dx: f32, dy: f32) -> bool {
        let yaw = self.yaw + dx * self.sensitivity;
        let pitch = (self.pitch + dy * self.sensitivity).clamp(-FRAC_PI_2, FRAC_PI_2);
        if yaw == self.yaw && pitch == self.pitch {
            return false;
        }
        self.yaw = yaw;
        self.pitch = pitch;
        self.recompute();
        true
    }

    /// Move along camera forward/right and world up. Axis values are in
    /// `-1..=1`; diagonal motion is not faster than straight motion.
    /// Returns whether the position changed.
    pub fn apply_move_input(&mut self, forward: f32, right: f32, up: f32, dt: f32) -> bool {
        let direction = self.forward() * forward + self.right() * right + Vec3::Y * up;
        if direction == Vec3::ZERO || dt <= 0.0 {
            return false;
        }
        self.position += direction.normalize() * self.speed * dt;
        true
    }

    pub fn view(&self) -> CameraView {
        CameraView {
            position: self.position,
            rotation: self.rotation,
        }
    }

    fn recompute(&mut self) {
        self.rotation = Mat4::from_rotation_y(self.yaw) * Mat4::from_rotation_x(self.pitch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn default_looks_down_positive_z() {
        let cam = CameraRig::default();
        assert!(close(cam.forward(), Vec3::Z));
        assert!(close(cam.right(), Vec3::X));
        assert_eq!(cam.view().rotation, Mat4::IDENTITY);
    }

    #[test]
    fn pitch_clamps_exactly_at_poles() {
        let mut cam = CameraRig::default();
        assert!(cam.apply_look_delta(0.0, 1.0e6));
        assert_eq!(cam.pitch, FRAC_PI_2);
        assert!(cam.apply_look_delta(0.0, -1.0e7));
        assert_eq!(cam.pitch, -FRAC_PI_2);
    }

    #[test]
    fn repeated_small_deltas_settle_on_the_pole() {
        let mut cam = CameraRig::default();
        for _ in 0..2000 {
            cam.apply_look_delta(0.0, 7.0);
            assert!(cam.pitch <= FRAC_PI_2);
        }
        assert_eq!(cam.pitch, FRAC_PI_2);

        for _ in 0..4000 {
            cam.apply_look_delta(0.0, -7.0);
            assert!(cam.pitch >= -FRAC_PI_2);
        }
        assert_eq!(cam.pitch, -FRAC_PI_2);
    }

    #[test]
    fn look_at_pole_without_yaw_reports_no_change() {
        let mut cam = CameraRig::default();
        cam.apply_look_delta(0.0, 1.0e6);
        assert!(!cam.apply_look_delta(0.0, 50.0));
    }

    #[test]
    fn zero_delta_is_not_a_change() {
        let mut cam = CameraRig::default();
        assert!(!cam.apply_look_delta(0.0, 0.0));
        assert!(!cam.apply_move_input(0.0, 0.0, 0.0, 0.016));
    }

    #[test]
    fn yaw_turns_forward_toward_right() {
        let mut cam = CameraRig::default();
        cam.sensitivity = 1.0;
        cam.apply_look_delta(FRAC_PI_2, 0.0);
        assert!(close(cam.forward(), Vec3::X));
        assert!(close(cam.right(), -Vec3::Z));
    }

    #[test]
    fn diagonal_move_is_normalized() {
        let mut cam = CameraRig::new(Vec3::ZERO);
        cam.speed = 2.0;
        assert!(cam.apply_move_input(1.0, 1.0, 0.0, 0.5));
        assert!((cam.position.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn up_is_world_up_even_when_pitched() {
        let mut cam = CameraRig::new(Vec3::ZERO);
        cam.apply_look_delta(0.0, 300.0);
        cam.apply_move_input(0.0, 0.0, 1.0, 1.0);
        assert!(close(cam.position, Vec3::new(0.0, cam.speed, 0.0)));
    }
}
