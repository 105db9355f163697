use glam::{Mat4, Vec3};
use lumen_scene::SceneStore;
use lumen_sync::{DeviceArrays, DeviceSync, GpuFrame, GpuLight, GpuObject, GpuSceneParams, HostArrays, SyncStats};

use crate::accumulation::{AccumulationState, Accumulator};

/// Camera state the tracing program needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    pub position: Vec3,
    pub rotation: Mat4,
}

impl Default for CameraView {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Mat4::IDENTITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Direct,
    Composite,
}

impl std::fmt::Display for PassKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PassKind::Direct => f.write_str("direct"),
            PassKind::Composite => f.write_str("composite"),
        }
    }
}

/// A draw that failed this frame. Logged and skipped, never fatal.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{pass} pass failed: {message}")]
pub struct PassError {
    pub pass: PassKind,
    pub message: String,
}

/// What a graphics backend must provide to run the two-pass frame.
///
/// The backend owns the offscreen target and the device arrays; the frame
/// driver decides what happens in which order.
pub trait FrameBackend: DeviceArrays {
    /// Stage the time-varying uniforms for the next pass.
    fn write_frame_uniforms(&mut self, frame: &GpuFrame);

    /// Render one fresh sample into the offscreen target.
    fn direct_pass(&mut self) -> Result<(), PassError>;

    /// Blend the offscreen sample into the accumulation and present it.
    fn composite_pass(&mut self) -> Result<(), PassError>;
}

/// Per-frame inputs gathered by the application.
#[derive(Debug, Clone, Copy)]
pub struct FrameInputs {
    pub camera: CameraView,
    pub aspect_ratio: f32,
    /// Seconds since startup.
    pub time: f32,
    /// Camera moved or the scene changed this frame.
    pub invalidate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub pass_index: u32,
    pub state: AccumulationState,
    pub sync: SyncStats,
    /// Passes or syncs that failed and were skipped.
    pub failures: u32,
}

/// Runs the per-frame protocol in its fixed order:
///
/// 1. stage time-varying uniforms,
/// 2. flush pending scene changes to the device arrays,
/// 3. direct pass into the offscreen target,
/// 4. advance or reset the pass counter,
/// 5. composite pass onto the visible surface.
#[derive(Debug, Default)]
pub struct FrameDriver {
    accumulator: Accumulator,
    frames: u64,
    failures: u64,
}

impl FrameDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accumulator(&self) -> &Accumulator {
        &self.accumulator
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Failures logged since startup.
    pub fn failure_count(&self) -> u64 {
        self.failures
    }

    pub fn run_frame<B: FrameBackend>(
        &mut self,
        backend: &mut B,
        scene: &mut SceneStore,
        sync: &mut DeviceSync,
        inputs: &FrameInputs,
    ) -> FrameReport {
        let mut failures = 0;
        let uniforms = |pass_index, direct| {
            GpuFrame::new(
                inputs.camera.position,
                inputs.camera.rotation,
                inputs.aspect_ratio,
                inputs.time,
                pass_index,
                direct,
            )
        };

        backend.write_frame_uniforms(&uniforms(self.accumulator.pass_index(), true));

        let sync_stats = match sync.flush(scene, backend) {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!("device sync skipped: {e}");
                failures += 1;
                SyncStats::default()
            }
        };

        if let Err(e) = backend.direct_pass() {
            tracing::warn!("{e}");
            failures += 1;
        }

        let pass_index = self.accumulator.advance(inputs.invalidate);

        backend.write_frame_uniforms(&uniforms(pass_index, false));
        if let Err(e) = backend.composite_pass() {
            tracing::warn!("{e}");
            failures += 1;
        }

        self.frames += 1;
        self.failures += u64::from(failures);
        FrameReport {
            pass_index,
            state: self.accumulator.state(),
            sync: sync_stats,
            failures,
        }
    }
}

/// One call a [`HeadlessBackend`] received.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackendCall {
    FrameUniforms(GpuFrame),
    Direct,
    Composite,
}

/// GPU-less backend: device arrays live in host memory and passes are
/// recorded instead of drawn.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    pub arrays: HostArrays,
    pub calls: Vec<BackendCall>,
    /// Makes the next direct pass fail.
    pub fail_direct: bool,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// The uniforms staged before the most recent composite pass.
    pub fn last_composite_uniforms(&self) -> Option<&GpuFrame> {
        let composite = self
            .calls
            .iter()
            .rposition(|c| *c == BackendCall::Composite)?;
        self.calls[..composite].iter().rev().find_map(|c| match c {
            BackendCall::FrameUniforms(f) => Some(f),
            _ => None,
        })
    }
}

impl DeviceArrays for HeadlessBackend {
    fn object_capacity(&self) -> usize {
        self.arrays.object_capacity()
    }

    fn light_capacity(&self) -> usize {
        self.arrays.light_capacity()
    }

    fn write_object(&mut self, slot: usize, value: &GpuObject) {
        self.arrays.write_object(slot, value);
    }

    fn write_light(&mut self, slot: usize, value: &GpuLight) {
        self.arrays.write_light(slot, value);
    }

    fn write_params(&mut self, value: &GpuSceneParams) {
        self.arrays.write_params(value);
    }
}

impl FrameBackend for HeadlessBackend {
    fn write_frame_uniforms(&mut self, frame: &GpuFrame) {
        self.calls.push(BackendCall::FrameUniforms(*frame));
    }

    fn direct_pass(&mut self) -> Result<(), PassError> {
        if std::mem::take(&mut self.fail_direct) {
            return Err(PassError {
                pass: PassKind::Direct,
                message: "injected failure".into(),
            });
        }
        self.calls.push(BackendCall::Direct);
        Ok(())
    }

    fn composite_pass(&mut self) -> Result<(), PassError> {
        self.calls.push(BackendCall::Composite);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_author::{EditCommand, Editor};
    use lumen_scene::{Material, Object, PointLight, ShapeKind};

    struct Rig {
        driver: FrameDriver,
        backend: HeadlessBackend,
        scene: SceneStore,
        sync: DeviceSync,
        editor: Editor,
    }

    impl Rig {
        fn new(scene: SceneStore) -> Self {
            Self {
                driver: FrameDriver::new(),
                backend: HeadlessBackend::new(),
                scene,
                sync: DeviceSync::new(),
                editor: Editor::new(),
            }
        }

        fn frame(&mut self, camera_moved: bool) -> FrameReport {
            let invalidate = camera_moved | self.editor.take_invalidate();
            let inputs = FrameInputs {
                camera: CameraView::default(),
                aspect_ratio: 16.0 / 9.0,
                time: self.driver.frame_count() as f32 / 60.0,
                invalidate,
            };
            self.driver
                .run_frame(&mut self.backend, &mut self.scene, &mut self.sync, &inputs)
        }

        fn edit(&mut self, command: EditCommand) {
            self.editor.apply(&mut self.scene, command).unwrap();
        }
    }

    fn demo_rig() -> Rig {
        let mut scene = SceneStore::new();
        let mat = scene.default_material();
        scene.add_object(Object::sphere(Vec3::new(0.0, 1.0, 4.0), 1.0, mat));
        scene.add_light(PointLight::default());
        let mut rig = Rig::new(scene);
        rig.frame(false);
        rig
    }

    #[test]
    fn frame_steps_run_in_protocol_order() {
        let mut rig = demo_rig();
        rig.backend.calls.clear();
        rig.frame(false);
        let calls = &rig.backend.calls;
        assert_eq!(calls.len(), 4);
        assert!(matches!(calls[0], BackendCall::FrameUniforms(f) if f.direct_mode == 1));
        assert_eq!(calls[1], BackendCall::Direct);
        assert!(matches!(calls[2], BackendCall::FrameUniforms(f) if f.direct_mode == 0));
        assert_eq!(calls[3], BackendCall::Composite);
    }

    #[test]
    fn quiet_frames_advance_by_one() {
        let mut rig = demo_rig();
        let mut previous = rig.frame(false).pass_index;
        for _ in 0..20 {
            let report = rig.frame(false);
            assert_eq!(report.pass_index, previous + 1);
            assert_eq!(report.state, AccumulationState::Accumulating);
            previous = report.pass_index;
        }
        let composite = rig.backend.last_composite_uniforms().unwrap();
        assert_eq!(composite.pass_index, previous);
    }

    #[test]
    fn camera_motion_resets() {
        let mut rig = demo_rig();
        rig.frame(false);
        rig.frame(false);
        let report = rig.frame(true);
        assert_eq!(report.pass_index, 0);
        assert_eq!(report.state, AccumulationState::JustReset);
    }

    #[test]
    fn every_kind_of_field_edit_resets() {
        let mut rig = demo_rig();
        let object = rig.scene.object_key(0);
        let light = rig.scene.light_key(0);
        let material = rig.scene.default_material();

        let mut moved = *rig.scene.object(0);
        moved.position.x += 1.0;
        let mut brighter = *rig.scene.light(0);
        brighter.power += 1.0;
        let mut rougher = *rig.scene.material(0);
        rougher.roughness = 0.3;
        let mut params = *rig.scene.params();
        params.max_bounces += 1;

        let edits = [
            EditCommand::SetObject { key: object, value: moved },
            EditCommand::SetLight { key: light, value: brighter },
            EditCommand::SetMaterial { key: material, value: rougher },
            EditCommand::SetParams(params),
        ];
        for edit in edits {
            for _ in 0..3 {
                rig.frame(false);
            }
            rig.edit(edit.clone());
            let report = rig.frame(false);
            assert_eq!(report.pass_index, 0, "{edit:?} did not reset");
            assert_eq!(report.state, AccumulationState::JustReset);
        }
    }

    #[test]
    fn unchanged_set_does_not_reset() {
        let mut rig = demo_rig();
        rig.frame(false);
        let key = rig.scene.object_key(0);
        let same = *rig.scene.object(0);
        rig.edit(EditCommand::SetObject { key, value: same });
        let report = rig.frame(false);
        assert_eq!(report.state, AccumulationState::Accumulating);
    }

    #[test]
    fn add_sphere_scenario() {
        let mut rig = Rig::new(SceneStore::new());
        rig.frame(false);
        rig.frame(false);
        let material = rig.scene.default_material();
        rig.edit(EditCommand::AddObject(Object::sphere(
            Vec3::new(0.0, 0.0, 2.0),
            1.0,
            material,
        )));
        let report = rig.frame(false);

        assert_eq!(rig.scene.object_count(), 1);
        assert_eq!(report.pass_index, 0);
        let slot = rig.backend.arrays.object(0);
        assert_eq!(slot.kind, ShapeKind::Sphere as u32);
        assert_eq!(slot.position, [0.0, 0.0, 2.0]);
    }

    #[test]
    fn remove_first_of_three_scenario() {
        let mut scene = SceneStore::new();
        let mat = scene.default_material();
        for x in [10.0, 20.0, 30.0] {
            scene.add_object(Object::cube(Vec3::new(x, 0.0, 0.0), Vec3::ONE, mat));
        }
        let mut rig = Rig::new(scene);
        rig.frame(false);
        let first = rig.scene.object_key(0);
        rig.edit(EditCommand::RemoveObject(first));
        let report = rig.frame(false);

        assert_eq!(report.pass_index, 0);
        assert_eq!(rig.backend.arrays.object(0).position[0], 20.0);
        assert_eq!(rig.backend.arrays.object(1).position[0], 30.0);
        assert_eq!(*rig.backend.arrays.object(2), GpuObject::default());
    }

    #[test]
    fn shared_material_single_edit_single_push() {
        let mut scene = SceneStore::new();
        let shared = scene.add_material(Material::default());
        scene.add_object(Object::sphere(Vec3::ZERO, 1.0, shared));
        scene.add_object(Object::sphere(Vec3::X, 1.0, shared));
        let mut rig = Rig::new(scene);
        rig.frame(false);

        let mut tinted = *rig.scene.material_by_key(shared).unwrap();
        tinted.albedo = Vec3::new(0.1, 0.9, 0.1);
        rig.edit(EditCommand::SetMaterial { key: shared, value: tinted });
        let report = rig.frame(false);

        assert_eq!(report.sync.objects_written, 2);
        assert_eq!(rig.backend.arrays.object(0).material.albedo, [0.1, 0.9, 0.1]);
        assert_eq!(rig.backend.arrays.object(1).material.albedo, [0.1, 0.9, 0.1]);
    }

    #[test]
    fn failed_pass_is_logged_and_loop_continues() {
        let mut rig = demo_rig();
        rig.backend.fail_direct = true;
        let report = rig.frame(false);
        assert_eq!(report.failures, 1);
        assert_eq!(rig.driver.failure_count(), 1);
        assert_eq!(rig.backend.calls.last(), Some(&BackendCall::Composite));
        let next = rig.frame(false);
        assert_eq!(next.failures, 0);
        assert_eq!(next.pass_index, report.pass_index + 1);
    }
}
