// Hardware abstraction boundary
//
// The control core only talks to actuators through the `Actuators` trait.
// Provides:
// - `BridgeHardware`: buffers commands into frames published over zenoh
// - `SimHardware`: in-process motion model, also the test double

pub mod bridge;
pub mod sim;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use bridge::BridgeHardware;
pub use sim::{SimHardware, SimOpMode};

/// Motor channels on the robot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorId {
    FrontLeft,
    BackLeft,
    FrontRight,
    BackRight,
    Sweep,
    Linear,
    Arm,
}

impl ActuatorId {
    pub const ALL: [ActuatorId; 7] = [
        ActuatorId::FrontLeft,
        ActuatorId::BackLeft,
        ActuatorId::FrontRight,
        ActuatorId::BackRight,
        ActuatorId::Sweep,
        ActuatorId::Linear,
        ActuatorId::Arm,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ActuatorId::FrontLeft => "front_left",
            ActuatorId::BackLeft => "back_left",
            ActuatorId::FrontRight => "front_right",
            ActuatorId::BackRight => "back_right",
            ActuatorId::Sweep => "sweep",
            ActuatorId::Linear => "linear",
            ActuatorId::Arm => "arm",
        }
    }
}

impl fmt::Display for ActuatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Positional servo channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServoId {
    Bucket,
    Wrist,
}

impl fmt::Display for ServoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServoId::Bucket => f.write_str("bucket"),
            ServoId::Wrist => f.write_str("wrist"),
        }
    }
}

/// Motor run modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Internal position controller drives toward the target
    Hold,
    /// Open-loop power
    #[default]
    Free,
}

/// Errors reported by the hardware layer
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HardwareFault {
    #[error("Actuator {id} is not responding")]
    Unresponsive { id: ActuatorId },

    #[error("Servo {id} is not responding")]
    ServoUnresponsive { id: ServoId },

    #[error("Actuator {id} reported out-of-range position {position}")]
    OutOfRange { id: ActuatorId, position: i64 },

    #[error("No fresh feedback for actuator {id}")]
    NoFeedback { id: ActuatorId },
}

impl HardwareFault {
    /// Actuator the fault belongs to, if it is a motor fault
    pub fn actuator(&self) -> Option<ActuatorId> {
        match self {
            HardwareFault::Unresponsive { id }
            | HardwareFault::OutOfRange { id, .. }
            | HardwareFault::NoFeedback { id } => Some(*id),
            HardwareFault::ServoUnresponsive { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, HardwareFault>;

/// Capability interface the control core needs from the hardware layer
pub trait Actuators {
    /// Current encoder position in ticks
    fn read_position(&mut self, id: ActuatorId) -> Result<i32>;

    /// Motor power in [-1, 1] (Free) or the power budget in [0, 1] (Hold)
    fn set_power(&mut self, id: ActuatorId, power: f32) -> Result<()>;

    fn set_target_position(&mut self, id: ActuatorId, ticks: i32) -> Result<()>;

    fn set_mode(&mut self, id: ActuatorId, mode: RunMode) -> Result<()>;

    /// True while a Hold-mode actuator is still travelling toward its target
    fn is_busy(&mut self, id: ActuatorId) -> Result<bool>;

    /// Servo position in [0, 1]
    fn set_servo_position(&mut self, id: ServoId, position: f32) -> Result<()>;
}

/// Convert a raw encoder reading into ticks, rejecting values that do not fit
pub(crate) fn checked_position(id: ActuatorId, raw: i64) -> Result<i32> {
    i32::try_from(raw).map_err(|_| HardwareFault::OutOfRange { id, position: raw })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actuator_ids_serialize_snake_case() {
        let json = serde_json::to_string(&ActuatorId::FrontLeft).unwrap();
        assert_eq!(json, "\"front_left\"");
        let back: ActuatorId = serde_json::from_str("\"linear\"").unwrap();
        assert_eq!(back, ActuatorId::Linear);
    }

    #[test]
    fn test_checked_position_rejects_overflow() {
        assert_eq!(checked_position(ActuatorId::Arm, 120), Ok(120));
        let err = checked_position(ActuatorId::Arm, i64::MAX).unwrap_err();
        assert_eq!(err.actuator(), Some(ActuatorId::Arm));
        assert!(matches!(err, HardwareFault::OutOfRange { .. }));
    }
}
