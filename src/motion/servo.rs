// Servo controls: bucket presets with a timed dump, continuous wrist
use tracing::{debug, info};

use super::hold::{tick_all, PositionHold};
use crate::config::{BucketConfig, WristConfig};
use crate::hal::{Actuators, HardwareFault, ServoId};
use crate::input::EdgeDetector;
use crate::messages::Gamepad;
use crate::opmode::{wait_for, OpMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketPreset {
    Neutral,
    Tilt,
    /// Drop, wait, then back to neutral
    Dump,
}

impl BucketPreset {
    /// Operator buttons checked in the fixed order X, Y, B; the first pressed wins
    pub fn from_gamepad(pad: &Gamepad) -> Option<Self> {
        if pad.x {
            Some(BucketPreset::Neutral)
        } else if pad.y {
            Some(BucketPreset::Tilt)
        } else if pad.b {
            Some(BucketPreset::Dump)
        } else {
            None
        }
    }
}

/// Servo that jumps between named positions
pub struct PresetServo {
    id: ServoId,
    config: BucketConfig,
    position: f32,
    dump_button: EdgeDetector,
}

impl PresetServo {
    pub fn new(id: ServoId, config: BucketConfig) -> Self {
        Self {
            id,
            config,
            position: config.neutral,
            dump_button: EdgeDetector::new(),
        }
    }

    pub fn initialize<H: Actuators>(&mut self, hw: &mut H) -> Result<(), HardwareFault> {
        self.set_position(hw, self.config.neutral)
    }

    pub fn set_position<H: Actuators>(
        &mut self,
        hw: &mut H,
        position: f32,
    ) -> Result<(), HardwareFault> {
        let position = position.clamp(0.0, 1.0);
        self.position = position;
        hw.set_servo_position(self.id, position)
    }

    /// Position for a preset; a dump starts at the drop position
    pub fn preset_position(&self, preset: BucketPreset) -> f32 {
        match preset {
            BucketPreset::Neutral => self.config.neutral,
            BucketPreset::Tilt => self.config.tilt,
            BucketPreset::Dump => self.config.drop,
        }
    }

    /// Apply the operator's preset buttons for this cycle
    ///
    /// A dump only starts on a fresh B press and holds the control loop for the
    /// dump delay, ticking `held` on each of those cycles.
    pub async fn update<O: OpMode>(
        &mut self,
        op: &mut O,
        pad: &Gamepad,
        held: &mut [&mut PositionHold],
    ) -> Result<(), HardwareFault> {
        let dump_pressed = self.dump_button.rising(pad.b);
        match BucketPreset::from_gamepad(pad) {
            Some(BucketPreset::Dump) if dump_pressed => self.dump(op, held).await,
            Some(BucketPreset::Dump) | None => Ok(()),
            Some(preset) => {
                let position = self.preset_position(preset);
                self.set_position(op.hardware(), position)
            }
        }
    }

    /// Drop, wait for the dump delay, return to neutral
    ///
    /// This pauses the control loop for the whole delay; `held` is ticked on
    /// every cycle of it. The return to neutral is sent even if the op mode
    /// stops during the wait.
    pub async fn dump<O: OpMode>(
        &mut self,
        op: &mut O,
        held: &mut [&mut PositionHold],
    ) -> Result<(), HardwareFault> {
        info!("Dumping bucket");
        let dropped = self.set_position(op.hardware(), self.config.drop);
        let waited = wait_for(op, self.config.dump_delay(), |op| {
            tick_all(op.hardware(), held)
        })
        .await;
        if !waited {
            debug!("Dump wait cut short");
        }
        let neutral = self.set_position(op.hardware(), self.config.neutral);
        dropped.and(neutral)
    }

    pub fn position(&self) -> f32 {
        self.position
    }
}

/// Servo nudged by a fixed step per cycle while an input is held
pub struct AdjustServo {
    id: ServoId,
    position: f32,
    step: f32,
}

impl AdjustServo {
    pub fn new(id: ServoId, config: WristConfig) -> Self {
        Self {
            id,
            position: config.initial.clamp(0.0, 1.0),
            step: config.step,
        }
    }

    pub fn initialize<H: Actuators>(&mut self, hw: &mut H) -> Result<(), HardwareFault> {
        hw.set_servo_position(self.id, self.position)
    }

    /// Move one step in the sign of `direction`, clamped to [0, 1]. Nothing is
    /// sent for a zero direction.
    pub fn adjust<H: Actuators>(&mut self, hw: &mut H, direction: i32) -> Result<(), HardwareFault> {
        if direction == 0 {
            return Ok(());
        }
        self.position = (self.position + direction.signum() as f32 * self.step).clamp(0.0, 1.0);
        hw.set_servo_position(self.id, self.position)
    }

    pub fn position(&self) -> f32 {
        self.position
    }
}
