/// The step-control state machine (component F, §4.6). Each probe asks
/// the controller: pause or pass through?
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    Continue,
    StepIn,
    /// Pause once `frame <= baseline`.
    StepOver(u64),
    /// Pause once `frame < target`.
    StepOut(u64),
}

#[derive(Debug)]
pub struct StepController {
    mode: StepMode,
}

impl Default for StepController {
    fn default() -> Self {
        StepController {
            mode: StepMode::Continue,
        }
    }
}

impl StepController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&mut self, mode: StepMode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> StepMode {
        self.mode
    }

    /// The decision table from §4.6.
    pub fn should_pause(&self, breakpoint_hit: bool, frame: u64) -> bool {
        match self.mode {
            StepMode::Continue => breakpoint_hit,
            StepMode::StepIn => true,
            StepMode::StepOver(baseline) => frame <= baseline || breakpoint_hit,
            StepMode::StepOut(target) => frame < target || breakpoint_hit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continue_only_pauses_on_breakpoint() {
        let c = StepController::new();
        assert!(!c.should_pause(false, 3));
        assert!(c.should_pause(true, 3));
    }

    #[test]
    fn step_in_always_pauses() {
        let mut c = StepController::new();
        c.set_mode(StepMode::StepIn);
        assert!(c.should_pause(false, 99));
    }

    #[test]
    fn step_over_bounds_to_baseline_or_below() {
        let mut c = StepController::new();
        c.set_mode(StepMode::StepOver(2));
        assert!(!c.should_pause(false, 3));
        assert!(c.should_pause(false, 2));
        assert!(c.should_pause(false, 1));
    }

    #[test]
    fn step_out_requires_strictly_lower_frame() {
        let mut c = StepController::new();
        c.set_mode(StepMode::StepOut(2));
        assert!(!c.should_pause(false, 2));
        assert!(c.should_pause(false, 1));
    }
}
