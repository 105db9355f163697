use std::path::{Path, PathBuf};
use std::time::Instant;

use lumen_author::{EditCommand, EditOutcome, Editor};
use lumen_input::{Action, InputState, MoveAxis};
use lumen_render::{FrameDriver, FrameInputs, FrameReport};
use lumen_render_wgpu::CameraRig;
use lumen_scene::{LightKey, MaterialKey, ObjectKey, SceneError, SceneFile, SceneStore};
use lumen_sync::DeviceSync;
use winit::keyboard::KeyCode;

/// What the editor panel is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Object(ObjectKey),
    Light(LightKey),
    Material(MaterialKey),
    Params,
}

/// Everything the frame loop owns apart from the GPU.
pub struct AppState {
    pub scene: SceneStore,
    pub sync: DeviceSync,
    pub editor: Editor,
    pub driver: FrameDriver,
    pub camera: CameraRig,
    pub input: InputState,
    pub selection: Option<Selection>,
    pub show_editor: bool,
    pub last_report: Option<FrameReport>,
    /// Smoothed frame time in seconds.
    pub frame_time: f32,
    started: Instant,
    last_frame: Instant,
    /// Resize, reload, or skybox swap since the last frame.
    reset_requested: bool,
    /// Camera motion not yet handed to a rendered frame.
    camera_moved: bool,
    /// Where `save_scene` writes.
    scene_path: PathBuf,
}

impl AppState {
    pub fn new(scene: SceneStore, camera: CameraRig, scene_path: PathBuf) -> Self {
        let now = Instant::now();
        Self {
            scene,
            sync: DeviceSync::new(),
            editor: Editor::new(),
            driver: FrameDriver::new(),
            camera,
            input: InputState::new(),
            selection: None,
            show_editor: true,
            last_report: None,
            frame_time: 0.0,
            started: now,
            last_frame: now,
            reset_requested: false,
            camera_moved: false,
            scene_path,
        }
    }

    /// Force the next frame to restart accumulation.
    pub fn request_reset(&mut self) {
        self.reset_requested = true;
    }

    /// Route a key press or release. Returns the application-level action
    /// the caller must carry out (cursor capture, editor toggle, reload).
    pub fn handle_key(&mut self, key: KeyCode, pressed: bool) -> Option<Action> {
        let action = map_key(key, pressed)?;
        let action = self.input.handle(action)?;
        if action == Action::ToggleEditor {
            self.show_editor = !self.show_editor;
        }
        Some(action)
    }

    /// Apply held keys and pointer motion to the camera. Motion stays
    /// pending until `frame_inputs` hands it to a rendered frame.
    pub fn update_camera(&mut self) {
        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32().min(0.1);
        self.last_frame = now;
        self.frame_time = if self.frame_time == 0.0 {
            dt
        } else {
            self.frame_time * 0.9 + dt * 0.1
        };
        self.step_camera(dt);
    }

    fn step_camera(&mut self, dt: f32) -> bool {
        let look = self.input.take_look();
        let turned = self.camera.apply_look_delta(look.x, look.y);
        let (forward, right, up) = self.input.moves.axes();
        let moved = self.camera.apply_move_input(forward, right, up, dt);
        self.camera_moved |= turned | moved;
        turned | moved
    }

    /// Gather this frame's inputs, consuming every pending invalidation.
    pub fn frame_inputs(&mut self, aspect_ratio: f32) -> FrameInputs {
        let edited = self.editor.take_invalidate();
        let reset = std::mem::take(&mut self.reset_requested);
        let camera_changed = std::mem::take(&mut self.camera_moved);
        FrameInputs {
            camera: self.camera.view(),
            aspect_ratio,
            time: self.started.elapsed().as_secs_f32(),
            invalidate: camera_changed | edited | reset,
        }
    }

    /// Apply an edit, logging refusals. Returns the outcome on success.
    pub fn apply(&mut self, command: EditCommand) -> Option<EditOutcome> {
        match self.editor.apply(&mut self.scene, command) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::warn!("edit refused: {e}");
                None
            }
        }
    }

    pub fn scene_path(&self) -> &Path {
        &self.scene_path
    }

    /// Write the scene to its file. Materials are stored by slot.
    pub fn save_scene(&self) -> Result<(), SceneError> {
        SceneFile::from_store(&self.scene).save(&self.scene_path)?;
        tracing::info!("saved scene to {}", self.scene_path.display());
        Ok(())
    }

    /// Drop a selection whose entity no longer exists.
    pub fn validate_selection(&mut self) {
        let live = match self.selection {
            Some(Selection::Object(key)) => self.scene.object_by_key(key).is_some(),
            Some(Selection::Light(key)) => self.scene.light_by_key(key).is_some(),
            Some(Selection::Material(key)) => self.scene.material_by_key(key).is_some(),
            Some(Selection::Params) | None => true,
        };
        if !live {
            self.selection = None;
        }
    }
}

/// Desktop key bindings.
pub fn map_key(key: KeyCode, pressed: bool) -> Option<Action> {
    let axis = match key {
        KeyCode::KeyW => Some(MoveAxis::Forward),
        KeyCode::KeyS => Some(MoveAxis::Back),
        KeyCode::KeyA => Some(MoveAxis::Left),
        KeyCode::KeyD => Some(MoveAxis::Right),
        KeyCode::Space => Some(MoveAxis::Up),
        KeyCode::ShiftLeft | KeyCode::ShiftRight => Some(MoveAxis::Down),
        _ => None,
    };
    if let Some(axis) = axis {
        return Some(Action::Move { axis, pressed });
    }
    if !pressed {
        return None;
    }
    match key {
        KeyCode::Tab => Some(Action::ToggleCursorCapture),
        KeyCode::F1 => Some(Action::ToggleEditor),
        KeyCode::KeyR => Some(Action::ReloadShader),
        KeyCode::F5 => Some(Action::SaveScene),
        _ => None,
    }
}
