// Frame-buffered hardware bridge
//
// Commands are collected into an `ActuatorFrame` that the runtime publishes
// once per cycle. Reads are answered from the latest `ActuatorFeedback`
// published by the hardware node.

use std::time::{Duration, Instant};

use tracing::debug;

use super::{checked_position, ActuatorId, Actuators, HardwareFault, Result, RunMode, ServoId};
use crate::messages::{ActuatorFeedback, ActuatorFrame};

pub struct BridgeHardware {
    frame: ActuatorFrame,
    feedback: Option<(ActuatorFeedback, Instant)>,
    feedback_timeout: Duration,
}

impl BridgeHardware {
    pub fn new(feedback_timeout: Duration) -> Self {
        Self {
            frame: ActuatorFrame::default(),
            feedback: None,
            feedback_timeout,
        }
    }

    /// Store the latest feedback sample
    pub fn on_feedback(&mut self, feedback: ActuatorFeedback) {
        debug!("Feedback: {:?}", feedback.positions);
        self.feedback = Some((feedback, Instant::now()));
    }

    /// True when feedback has arrived within the timeout
    pub fn feedback_fresh(&self) -> bool {
        self.fresh_feedback().is_some()
    }

    /// Commands accumulated so far (levels, kept across cycles)
    pub fn frame(&self) -> &ActuatorFrame {
        &self.frame
    }

    fn fresh_feedback(&self) -> Option<&ActuatorFeedback> {
        match &self.feedback {
            Some((feedback, at)) if at.elapsed() < self.feedback_timeout => Some(feedback),
            _ => None,
        }
    }

    // Fails when the actuator is listed as faulted. Missing feedback is not an
    // error for writes: commands are buffered until the hardware node shows up.
    fn check_motor(&self, id: ActuatorId) -> Result<()> {
        match self.fresh_feedback() {
            Some(feedback) if feedback.faults.contains(&id) => {
                Err(HardwareFault::Unresponsive { id })
            }
            _ => Ok(()),
        }
    }
}

impl Actuators for BridgeHardware {
    fn read_position(&mut self, id: ActuatorId) -> Result<i32> {
        let feedback = self
            .fresh_feedback()
            .ok_or(HardwareFault::NoFeedback { id })?;
        if feedback.faults.contains(&id) {
            return Err(HardwareFault::Unresponsive { id });
        }
        let raw = *feedback
            .positions
            .get(&id)
            .ok_or(HardwareFault::NoFeedback { id })?;
        checked_position(id, raw)
    }

    fn set_power(&mut self, id: ActuatorId, power: f32) -> Result<()> {
        self.frame.motors.entry(id).or_default().power = power;
        self.check_motor(id)
    }

    fn set_target_position(&mut self, id: ActuatorId, ticks: i32) -> Result<()> {
        self.frame.motors.entry(id).or_default().target = Some(ticks);
        self.check_motor(id)
    }

    fn set_mode(&mut self, id: ActuatorId, mode: RunMode) -> Result<()> {
        self.frame.motors.entry(id).or_default().mode = mode;
        self.check_motor(id)
    }

    fn is_busy(&mut self, id: ActuatorId) -> Result<bool> {
        let feedback = self
            .fresh_feedback()
            .ok_or(HardwareFault::NoFeedback { id })?;
        if feedback.faults.contains(&id) {
            return Err(HardwareFault::Unresponsive { id });
        }
        Ok(feedback.busy.get(&id).copied().unwrap_or(false))
    }

    fn set_servo_position(&mut self, id: ServoId, position: f32) -> Result<()> {
        self.frame.servos.insert(id, position);
        match self.fresh_feedback() {
            Some(feedback) if feedback.servo_faults.contains(&id) => {
                Err(HardwareFault::ServoUnresponsive { id })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feedback_with(id: ActuatorId, position: i64) -> ActuatorFeedback {
        let mut feedback = ActuatorFeedback::default();
        feedback.positions.insert(id, position);
        feedback.busy.insert(id, true);
        feedback
    }

    #[test]
    fn test_commands_buffer_into_frame() {
        let mut hw = BridgeHardware::new(Duration::from_millis(500));
        hw.set_mode(ActuatorId::Linear, RunMode::Hold).unwrap();
        hw.set_target_position(ActuatorId::Linear, 105).unwrap();
        hw.set_power(ActuatorId::Linear, 1.0).unwrap();
        hw.set_servo_position(ServoId::Bucket, 0.3).unwrap();

        let cmd = hw.frame().motors[&ActuatorId::Linear];
        assert_eq!(cmd.mode, RunMode::Hold);
        assert_eq!(cmd.target, Some(105));
        assert_eq!(cmd.power, 1.0);
        assert_eq!(hw.frame().servos[&ServoId::Bucket], 0.3);
    }

    #[test]
    fn test_reads_need_feedback() {
        let mut hw = BridgeHardware::new(Duration::from_millis(500));
        assert_eq!(
            hw.read_position(ActuatorId::Arm),
            Err(HardwareFault::NoFeedback { id: ActuatorId::Arm })
        );

        hw.on_feedback(feedback_with(ActuatorId::Arm, 42));
        assert_eq!(hw.read_position(ActuatorId::Arm), Ok(42));
        assert_eq!(hw.is_busy(ActuatorId::Arm), Ok(true));
    }

    #[test]
    fn test_stale_feedback_is_a_fault() {
        let mut hw = BridgeHardware::new(Duration::ZERO);
        hw.on_feedback(feedback_with(ActuatorId::Arm, 42));
        assert!(!hw.feedback_fresh());
        assert!(hw.read_position(ActuatorId::Arm).is_err());
    }

    #[test]
    fn test_faulted_actuator_still_records_command() {
        let mut hw = BridgeHardware::new(Duration::from_millis(500));
        let mut feedback = feedback_with(ActuatorId::Linear, 0);
        feedback.faults.push(ActuatorId::Linear);
        hw.on_feedback(feedback);

        let err = hw.set_target_position(ActuatorId::Linear, 200).unwrap_err();
        assert_eq!(err, HardwareFault::Unresponsive { id: ActuatorId::Linear });
        assert_eq!(hw.frame().motors[&ActuatorId::Linear].target, Some(200));
    }

    #[test]
    fn test_out_of_range_reading() {
        let mut hw = BridgeHardware::new(Duration::from_millis(500));
        hw.on_feedback(feedback_with(ActuatorId::Linear, i64::from(i32::MAX) + 1));
        assert!(matches!(
            hw.read_position(ActuatorId::Linear),
            Err(HardwareFault::OutOfRange { .. })
        ));
    }
}
