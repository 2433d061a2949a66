// Motion control for the mecanum base and its mechanisms
//
// Provides:
// - Mecanum mixing (drive intent -> wheel powers)
// - Drive train output with timed autonomous sequences
// - Position-hold controller shared by the lift and the arm
// - Pause/resume overlay for long autonomous waits
// - Sweep and servo controls

pub mod arm;
pub mod drive;
pub mod hold;
pub mod kinematics;
pub mod pause;
pub mod sequencer;
pub mod servo;
pub mod sweep;

pub use arm::{ArmControl, ArmMode};
pub use drive::DriveTrain;
pub use hold::{tick_all, ActuatorState, HoldMode, PositionHold};
pub use kinematics::{mix, DriveIntent, WheelPowers};
pub use pause::{hold_until_settled, PauseCoordinator, PauseState};
pub use sequencer::{MotionStep, Outcome, TimedSequencer};
pub use servo::{AdjustServo, BucketPreset, PresetServo};
pub use sweep::Sweep;

/// Operator or plan input that cannot be turned into a command
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid command: {reason}")]
pub struct InvalidCommand {
    pub reason: String,
}

impl InvalidCommand {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
