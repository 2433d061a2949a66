// Message types exchanged with the teleop station and the hardware bridge

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::hal::{ActuatorId, RunMode, ServoId};

// One gamepad sample from teleop -> runtime
// Missing fields deserialize as released / centered
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Gamepad {
    // Sticks in [-1, 1], y axis positive = pulled toward the operator
    pub left_stick_x: f32,
    pub left_stick_y: f32,
    pub right_stick_x: f32,
    pub right_stick_y: f32,
    // Triggers in [0, 1]
    pub left_trigger: f32,
    pub right_trigger: f32,
    pub dpad_up: bool,
    pub dpad_down: bool,
    pub dpad_left: bool,
    pub dpad_right: bool,
    pub a: bool,
    pub b: bool,
    pub x: bool,
    pub y: bool,
    pub left_bumper: bool,
    pub right_bumper: bool,
    pub back: bool,
}

impl Gamepad {
    /// Clamp analog axes into their ranges; non-finite values read as centered
    pub fn sanitized(mut self) -> Self {
        self.left_stick_x = axis(self.left_stick_x, -1.0);
        self.left_stick_y = axis(self.left_stick_y, -1.0);
        self.right_stick_x = axis(self.right_stick_x, -1.0);
        self.right_stick_y = axis(self.right_stick_y, -1.0);
        self.left_trigger = axis(self.left_trigger, 0.0);
        self.right_trigger = axis(self.right_trigger, 0.0);
        self
    }
}

fn axis(value: f32, min: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, 1.0)
    } else {
        0.0
    }
}

/// Both pads: `driver` moves the base, `operator` runs the mechanisms
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Gamepads {
    pub driver: Gamepad,
    pub operator: Gamepad,
}

impl Gamepads {
    pub fn sanitized(self) -> Self {
        Self {
            driver: self.driver.sanitized(),
            operator: self.operator.sanitized(),
        }
    }
}

/// Latest command for one motor channel
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct MotorCommand {
    pub mode: RunMode,
    pub power: f32,
    pub target: Option<i32>,
}

// Actuation output from runtime -> hardware bridge
// Commands are levels: the whole frame is re-sent every cycle
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ActuatorFrame {
    pub motors: BTreeMap<ActuatorId, MotorCommand>,
    pub servos: BTreeMap<ServoId, f32>,
}

// State reported by the hardware bridge -> runtime
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ActuatorFeedback {
    // Raw encoder readings (wider than ticks so bad readings can be detected)
    pub positions: BTreeMap<ActuatorId, i64>,
    pub busy: BTreeMap<ActuatorId, bool>,
    pub faults: Vec<ActuatorId>,
    pub servo_faults: Vec<ServoId>,
}

/// One cycle of caption/value telemetry lines
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TelemetryFrame {
    pub lines: Vec<(String, String)>,
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
    FeedbackStale,
}
