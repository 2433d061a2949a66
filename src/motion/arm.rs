// Arm control: half-hold preset or manual jogging, on a position-hold controller
use std::fmt;

use tracing::info;

use super::hold::PositionHold;
use crate::config::ArmConfig;
use crate::hal::{ActuatorId, Actuators, HardwareFault};
use crate::input::EdgeDetector;
use crate::messages::Gamepad;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmMode {
    /// Target pinned to the safe half-up position
    HalfHold,
    /// D-pad moves the target while held
    Manual,
}

impl fmt::Display for ArmMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArmMode::HalfHold => f.write_str("Half Mode"),
            ArmMode::Manual => f.write_str("Manual Mode"),
        }
    }
}

pub struct ArmControl {
    hold: PositionHold,
    mode: ArmMode,
    half_position: i32,
    toggle: EdgeDetector,
}

impl ArmControl {
    pub fn new(config: ArmConfig) -> Self {
        Self {
            hold: PositionHold::new(ActuatorId::Arm, config.hold),
            mode: ArmMode::HalfHold,
            half_position: config.half_position,
            toggle: EdgeDetector::new(),
        }
    }

    /// Start in half-hold at the half position
    pub fn initialize<H: Actuators>(&mut self, hw: &mut H) -> Result<(), HardwareFault> {
        self.mode = ArmMode::HalfHold;
        self.hold.initialize_at(hw, self.half_position)
    }

    /// Operator d-pad: left toggles the mode, up/down jog in manual mode
    pub fn update<H: Actuators>(&mut self, hw: &mut H, pad: &Gamepad) -> Result<(), HardwareFault> {
        let mut result = Ok(());

        if self.toggle.rising(pad.dpad_left) {
            self.mode = match self.mode {
                ArmMode::HalfHold => ArmMode::Manual,
                ArmMode::Manual => ArmMode::HalfHold,
            };
            info!("Arm mode: {}", self.mode);
            if self.mode == ArmMode::HalfHold {
                result = self.hold.set_target_absolute(hw, self.half_position);
            }
        }

        if self.mode == ArmMode::Manual {
            if pad.dpad_up {
                result = result.and(self.hold.jog(hw, 1));
            }
            if pad.dpad_down {
                result = result.and(self.hold.jog(hw, -1));
            }
        }
        result
    }

    pub fn mode(&self) -> ArmMode {
        self.mode
    }

    pub fn hold(&self) -> &PositionHold {
        &self.hold
    }

    pub fn hold_mut(&mut self) -> &mut PositionHold {
        &mut self.hold
    }
}
