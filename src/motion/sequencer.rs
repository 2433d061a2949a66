// Timed motion sequencer for autonomous driving
//
// Each step drives the wheels at fixed powers for a fixed time, then zeroes
// them before the next step starts. Cancellation is checked once per control
// cycle; a cancelled run ends the whole sequence. Held actuators handed to
// `run` are ticked on every cycle the sequence spends waiting.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::drive::DriveTrain;
use super::hold::{tick_all, PositionHold};
use super::kinematics::WheelPowers;
use crate::messages::Gamepads;
use crate::opmode::OpMode;

/// One fixed-duration wheel command
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionStep {
    pub powers: WheelPowers,
    pub duration: Duration,
}

impl MotionStep {
    pub const fn new(
        front_left: f32,
        back_left: f32,
        front_right: f32,
        back_right: f32,
        duration: Duration,
    ) -> Self {
        Self {
            powers: WheelPowers::new(front_left, back_left, front_right, back_right),
            duration,
        }
    }
}

/// How a sequence or wait ended. Both are normal terminations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Cancelled,
}

pub struct TimedSequencer<'a> {
    drive: &'a mut DriveTrain,
}

impl<'a> TimedSequencer<'a> {
    pub fn new(drive: &'a mut DriveTrain) -> Self {
        Self { drive }
    }

    /// Run `steps` in order, keeping `held` asserted every cycle
    ///
    /// Returns `Cancelled` as soon as `is_cancelled` fires or the op mode stops;
    /// the wheels are stopped in either case.
    pub async fn run<O: OpMode>(
        &mut self,
        op: &mut O,
        steps: &[MotionStep],
        held: &mut [&mut PositionHold],
        mut is_cancelled: impl FnMut(&Gamepads) -> bool,
    ) -> Outcome {
        info!("Running {} timed steps", steps.len());

        for (index, step) in steps.iter().enumerate() {
            if !op.is_active() || is_cancelled(&op.gamepads()) {
                info!("Sequence cancelled before step {}", index);
                return Outcome::Cancelled;
            }

            debug!("Step {}: {:?} for {:?}", index, step.powers, step.duration);
            if let Err(e) = self.drive.set_wheel_powers(op.hardware(), step.powers) {
                warn!("Step {}: {}", index, e);
                op.telemetry().add_data("Fault", &e);
            }

            let started = Instant::now();
            let mut cancelled = false;
            while started.elapsed() < step.duration {
                if !op.is_active() || is_cancelled(&op.gamepads()) {
                    cancelled = true;
                    break;
                }
                op.telemetry().add_data("Autonomous", "Driving...");
                tick_all(op.hardware(), held);
                op.idle().await;
            }

            self.stop_wheels(op);
            if cancelled {
                info!("Sequence cancelled during step {}", index);
                return Outcome::Cancelled;
            }
        }

        Outcome::Completed
    }

    fn stop_wheels<O: OpMode>(&mut self, op: &mut O) {
        if let Err(e) = self.drive.stop(op.hardware()) {
            warn!("Failed to stop wheels: {}", e);
            op.telemetry().add_data("Fault", &e);
        }
    }
}
