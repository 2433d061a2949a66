// Pause/resume overlay for a position-held actuator
//
// Used while autonomous waits for the lift to reach its target. One press of
// the pause button cuts the lift's power but keeps its target; the next press
// puts holding power back on. The coordinator lives only as long as the wait
// it guards.

use tracing::{info, warn};

use super::hold::{tick_all, HoldMode, PositionHold};
use super::sequencer::Outcome;
use crate::hal::{Actuators, HardwareFault};
use crate::input::EdgeDetector;
use crate::messages::Gamepads;
use crate::opmode::OpMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseState {
    Running,
    Paused,
}

#[derive(Debug, Default)]
pub struct PauseCoordinator {
    paused: bool,
    edge: EdgeDetector,
}

impl PauseCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PauseState {
        if self.paused {
            PauseState::Paused
        } else {
            PauseState::Running
        }
    }

    /// Feed this cycle's pause button level. Returns the new state on a toggle.
    pub fn update<H: Actuators>(
        &mut self,
        hw: &mut H,
        actuator: &mut PositionHold,
        level: bool,
    ) -> Result<Option<PauseState>, HardwareFault> {
        if !self.edge.rising(level) {
            return Ok(None);
        }

        self.paused = !self.paused;
        if self.paused {
            info!("{}: paused at target {}", actuator.id(), actuator.target());
            actuator.release(hw)?;
        } else {
            info!("{}: resumed toward target {}", actuator.id(), actuator.target());
            actuator.restore(hw)?;
        }
        Ok(Some(self.state()))
    }
}

/// Hold `actuator` until it settles on its target, with pause/resume
///
/// Ends with `Completed` on the cycle after a clean tick finds the actuator
/// running and no longer busy, or `Cancelled` when `is_cancelled` fires or the
/// op mode stops. While paused the wait continues regardless of what the
/// hardware reports. `held` is ticked alongside `actuator` on every cycle.
pub async fn hold_until_settled<O: OpMode>(
    op: &mut O,
    actuator: &mut PositionHold,
    held: &mut [&mut PositionHold],
    pause_signal: impl Fn(&Gamepads) -> bool,
    mut is_cancelled: impl FnMut(&Gamepads) -> bool,
) -> Outcome {
    let mut coordinator = PauseCoordinator::new();
    let mut settled = false;

    loop {
        let pads = op.gamepads();
        if !op.is_active() || is_cancelled(&pads) {
            return Outcome::Cancelled;
        }

        match coordinator.update(op.hardware(), actuator, pause_signal(&pads)) {
            Ok(Some(PauseState::Paused)) => op.telemetry().add_data("Autonomous", "Paused"),
            Ok(Some(PauseState::Running)) => op.telemetry().add_data("Autonomous", "Resumed"),
            Ok(None) => {}
            Err(e) => {
                warn!("Pause/resume command failed: {}", e);
                op.telemetry().add_data("Fault", &e);
            }
        }

        // returns before ticking, so the caller's next step owns this cycle
        if settled && coordinator.state() == PauseState::Running {
            return Outcome::Completed;
        }

        let ticked = actuator.tick(op.hardware());
        tick_all(op.hardware(), held);
        let state = actuator.state();
        op.telemetry().add_data("Linear Motor Position", state.current_position);

        settled = match ticked {
            Ok(()) => state.mode == HoldMode::Hold,
            Err(e) => {
                op.telemetry().add_data("Fault", &e);
                false
            }
        };

        op.idle().await;
    }
}
