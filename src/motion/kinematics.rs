// Mecanum mixing for the four-wheel base
// Converts drive intent (forward, strafe, rotate) into individual wheel powers.

use super::InvalidCommand;
use crate::messages::Gamepad;

/// Largest power a wheel accepts
pub const MAX_POWER: f32 = 1.0;

/// Operator drive request, each axis in [-1, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriveIntent {
    pub forward: f32,
    pub strafe: f32,
    pub rotate: f32,
}

impl DriveIntent {
    /// Build an intent, clamping each axis. Non-finite axes are rejected.
    pub fn new(forward: f32, strafe: f32, rotate: f32) -> Result<Self, InvalidCommand> {
        for (axis, value) in [("forward", forward), ("strafe", strafe), ("rotate", rotate)] {
            if !value.is_finite() {
                return Err(InvalidCommand::new(format!("drive {axis} is {value}")));
            }
        }
        Ok(Self {
            forward: forward.clamp(-1.0, 1.0),
            strafe: strafe.clamp(-1.0, 1.0),
            rotate: rotate.clamp(-1.0, 1.0),
        })
    }

    /// Driver stick mapping: left stick drives and strafes, right stick x turns.
    /// Stick y is positive toward the operator, so forward is its negation.
    pub fn from_gamepad(pad: &Gamepad) -> Result<Self, InvalidCommand> {
        Self::new(-pad.left_stick_y, pad.left_stick_x, -pad.right_stick_x)
    }

    pub fn mix(&self) -> WheelPowers {
        mix(self.forward, self.strafe, self.rotate)
    }
}

/// Power command for each wheel
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelPowers {
    pub front_left: f32,
    pub back_left: f32,
    pub front_right: f32,
    pub back_right: f32,
}

impl WheelPowers {
    pub const fn new(front_left: f32, back_left: f32, front_right: f32, back_right: f32) -> Self {
        Self {
            front_left,
            back_left,
            front_right,
            back_right,
        }
    }

    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    /// Returns powers as array [front_left, back_left, front_right, back_right]
    pub fn as_array(&self) -> [f32; 4] {
        [self.front_left, self.back_left, self.front_right, self.back_right]
    }

    pub fn max_abs(&self) -> f32 {
        self.as_array().iter().map(|p| p.abs()).fold(0.0, f32::max)
    }
}

/// Mix forward / strafe / rotate into wheel powers
///
/// If any wheel would exceed `MAX_POWER`, all four are scaled down by the same
/// factor so the direction of travel is kept. Otherwise the raw mix is
/// returned untouched.
pub fn mix(forward: f32, strafe: f32, rotate: f32) -> WheelPowers {
    let raw = WheelPowers {
        front_left: forward + strafe + rotate,
        back_left: forward - strafe + rotate,
        front_right: forward - strafe - rotate,
        back_right: forward + strafe - rotate,
    };

    let max = raw.max_abs();
    if max > MAX_POWER {
        let scale = MAX_POWER / max;
        WheelPowers {
            front_left: raw.front_left * scale,
            back_left: raw.back_left * scale,
            front_right: raw.front_right * scale,
            back_right: raw.back_right * scale,
        }
    } else {
        raw
    }
}
