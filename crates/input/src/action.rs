use glam::Vec2;

/// A high-level action produced from desktop input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// Raw pointer motion, in pixels.
    Look { dx: f32, dy: f32 },
    /// A movement key was pressed or released.
    Move { axis: MoveAxis, pressed: bool },
    /// Capture or release the cursor for mouse look.
    ToggleCursorCapture,
    /// Show or hide the editor panels.
    ToggleEditor,
    /// Recompile the tracing program from disk.
    ReloadShader,
    /// Write the current scene back to its file.
    SaveScene,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveAxis {
    Forward,
    Back,
    Left,
    Right,
    Up,
    Down,
}

/// Held movement keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveAxes {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
}

impl MoveAxes {
    pub fn set(&mut self, axis: MoveAxis, pressed: bool) {
        let flag = match axis {
            MoveAxis::Forward => &mut self.forward,
            MoveAxis::Back => &mut self.back,
            MoveAxis::Left => &mut self.left,
            MoveAxis::Right => &mut self.right,
            MoveAxis::Up => &mut self.up,
            MoveAxis::Down => &mut self.down,
        };
        *flag = pressed;
    }

    /// Forward, right and up axis values, each in `-1..=1`.
    pub fn axes(&self) -> (f32, f32, f32) {
        (
            axis(self.forward, self.back),
            axis(self.right, self.left),
            axis(self.up, self.down),
        )
    }

    pub fn is_idle(&self) -> bool {
        self.axes() == (0.0, 0.0, 0.0)
    }
}

fn axis(positive: bool, negative: bool) -> f32 {
    (positive as i8 - negative as i8) as f32
}

/// Input collected between two frames.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    pub moves: MoveAxes,
    look: Vec2,
    cursor_captured: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold an action into the state. Returns the actions the application
    /// must handle itself (toggles, reloads and saves).
    pub fn handle(&mut self, action: Action) -> Option<Action> {
        match action {
            Action::Look { dx, dy } => {
                if self.cursor_captured {
                    self.look += Vec2::new(dx, dy);
                }
                None
            }
            Action::Move { axis, pressed } => {
                self.moves.set(axis, pressed);
                None
            }
            Action::ToggleCursorCapture => {
                self.cursor_captured = !self.cursor_captured;
                tracing::debug!(captured = self.cursor_captured, "cursor capture toggled");
                if !self.cursor_captured {
                    self.look = Vec2::ZERO;
                }
                Some(action)
            }
            Action::ToggleEditor | Action::ReloadShader | Action::SaveScene => Some(action),
        }
    }

    pub fn cursor_captured(&self) -> bool {
        self.cursor_captured
    }

    /// Consume the look delta gathered since the last call.
    pub fn take_look(&mut self) -> Vec2 {
        std::mem::take(&mut self.look)
    }

    /// Release every held key, e.g. when the window loses focus.
    pub fn release_all(&mut self) {
        self.moves = MoveAxes::default();
        self.look = Vec2::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_keys_cancel() {
        let mut axes = MoveAxes::default();
        axes.set(MoveAxis::Forward, true);
        axes.set(MoveAxis::Back, true);
        axes.set(MoveAxis::Up, true);
        assert_eq!(axes.axes(), (0.0, 0.0, 1.0));
    }

    #[test]
    fn left_is_negative_right() {
        let mut axes = MoveAxes::default();
        axes.set(MoveAxis::Left, true);
        assert_eq!(axes.axes(), (0.0, -1.0, 0.0));
        assert!(!axes.is_idle());
        axes.set(MoveAxis::Left, false);
        assert!(axes.is_idle());
    }

    #[test]
    fn look_ignored_until_captured() {
        let mut input = InputState::new();
        input.handle(Action::Look { dx: 5.0, dy: 1.0 });
        assert_eq!(input.take_look(), Vec2::ZERO);

        input.handle(Action::ToggleCursorCapture);
        input.handle(Action::Look { dx: 5.0, dy: 1.0 });
        input.handle(Action::Look { dx: -2.0, dy: 1.0 });
        assert_eq!(input.take_look(), Vec2::new(3.0, 2.0));
        assert_eq!(input.take_look(), Vec2::ZERO);
    }

    #[test]
    fn toggles_are_passed_back() {
        let mut input = InputState::new();
        assert_eq!(input.handle(Action::ReloadShader), Some(Action::ReloadShader));
        assert_eq!(input.handle(Action::ToggleEditor), Some(Action::ToggleEditor));
        assert_eq!(input.handle(Action::SaveScene), Some(Action::SaveScene));
        assert_eq!(
            input.handle(Action::Move { axis: MoveAxis::Down, pressed: true }),
            None
        );
        assert_eq!(input.moves.axes(), (0.0, 0.0, -1.0));
    }

    #[test]
    fn release_all_clears_held_keys() {
        let mut input = InputState::new();
        input.handle(Action::Move { axis: MoveAxis::Forward, pressed: true });
        input.release_all();
        assert!(input.moves.is_idle());
    }
}
