/// Where the progressive image stands this frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulationState {
    /// The pass counter was forced to zero this frame; the composite pass
    /// starts a fresh average.
    JustReset,
    /// The counter advanced by one; the new sample joins the running average.
    Accumulating,
}

/// Pass counter and reset state machine.
///
/// Fed one aggregated invalidate signal per frame. It never looks at scene
/// contents itself.
#[derive(Debug, Clone)]
pub struct Accumulator {
    state: AccumulationState,
    pass: u32,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator {
    /// Starts reset: the first frame composites pass 0.
    pub fn new() -> Self {
        Self {
            state: AccumulationState::JustReset,
            pass: 0,
        }
    }

    pub fn state(&self) -> AccumulationState {
        self.state
    }

    /// Passes accumulated since the last reset, minus one.
    pub fn pass_index(&self) -> u32 {
        self.pass
    }

    /// Step the machine for a new frame and return the pass index to
    /// composite with.
    pub fn advance(&mut self, invalidate: bool) -> u32 {
        if invalidate {
            self.state = AccumulationState::JustReset;
            self.pass = 0;
        } else {
            self.state = AccumulationState::Accumulating;
            self.pass = self.pass.saturating_add(1);
        }
        self.pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_reset_at_zero() {
        let acc = Accumulator::new();
        assert_eq!(acc.state(), AccumulationState::JustReset);
        assert_eq!(acc.pass_index(), 0);
    }

    #[test]
    fn quiet_frames_increment_by_exactly_one() {
        let mut acc = Accumulator::new();
        let mut previous = acc.pass_index();
        for _ in 0..50 {
            let pass = acc.advance(false);
            assert_eq!(pass, previous + 1);
            assert_eq!(acc.state(), AccumulationState::Accumulating);
            previous = pass;
        }
    }

    #[test]
    fn invalidate_resets_regardless_of_history() {
        let mut acc = Accumulator::new();
        for _ in 0..10 {
            acc.advance(false);
        }
        assert_eq!(acc.advance(true), 0);
        assert_eq!(acc.state(), AccumulationState::JustReset);
    }

    #[test]
    fn just_reset_lasts_one_frame() {
        let mut acc = Accumulator::new();
        acc.advance(true);
        assert_eq!(acc.advance(false), 1);
        assert_eq!(acc.state(), AccumulationState::Accumulating);
    }

    #[test]
    fn consecutive_invalidations_stay_at_zero() {
        let mut acc = Accumulator::new();
        assert_eq!(acc.advance(true), 0);
        assert_eq!(acc.advance(true), 0);
        assert_eq!(acc.state(), AccumulationState::JustReset);
    }
}
