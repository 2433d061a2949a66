// Drive train output for the mecanum base
//
// Owns the four wheel channels. Every write goes to all four wheels even if
// one of them faults, so a dead motor never leaves the others running on a
// stale command.

use tracing::{debug, info};

use super::kinematics::{DriveIntent, WheelPowers};
use crate::config::DriveConfig;
use crate::hal::{ActuatorId, Actuators, HardwareFault, RunMode};

/// Wheel channels in [front_left, back_left, front_right, back_right] order
pub const WHEEL_IDS: [ActuatorId; 4] = [
    ActuatorId::FrontLeft,
    ActuatorId::BackLeft,
    ActuatorId::FrontRight,
    ActuatorId::BackRight,
];

pub struct DriveTrain {
    invert_right: bool,
}

impl DriveTrain {
    pub fn new(config: DriveConfig) -> Self {
        Self {
            invert_right: config.invert_right,
        }
    }

    /// Put the wheels in open-loop mode and stop them
    pub fn initialize<H: Actuators>(&mut self, hw: &mut H) -> Result<(), HardwareFault> {
        info!("Initializing drive train");
        let mut result = Ok(());
        for id in WHEEL_IDS {
            if let Err(e) = hw.set_mode(id, RunMode::Free) {
                result = result.and(Err(e));
            }
        }
        result.and(self.stop(hw))
    }

    /// Mix and apply an operator intent
    pub fn drive<H: Actuators>(
        &mut self,
        hw: &mut H,
        intent: DriveIntent,
    ) -> Result<(), HardwareFault> {
        self.set_wheel_powers(hw, intent.mix())
    }

    /// Send raw wheel powers
    pub fn set_wheel_powers<H: Actuators>(
        &mut self,
        hw: &mut H,
        powers: WheelPowers,
    ) -> Result<(), HardwareFault> {
        debug!(
            "Setting wheel powers: fl={:.2}, bl={:.2}, fr={:.2}, br={:.2}",
            powers.front_left, powers.back_left, powers.front_right, powers.back_right
        );

        let sign = if self.invert_right { -1.0 } else { 1.0 };
        let outputs = [
            powers.front_left,
            powers.back_left,
            powers.front_right * sign,
            powers.back_right * sign,
        ];

        // keep the first fault, still write every wheel
        let mut result = Ok(());
        for (id, power) in WHEEL_IDS.into_iter().zip(outputs) {
            if let Err(e) = hw.set_power(id, power) {
                result = result.and(Err(e));
            }
        }
        result
    }

    /// Zero power on the four wheels only
    pub fn stop<H: Actuators>(&mut self, hw: &mut H) -> Result<(), HardwareFault> {
        self.set_wheel_powers(hw, WheelPowers::zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::SimHardware;

    #[test]
    fn test_right_side_inverted_at_output() {
        let mut hw = SimHardware::new();
        let mut drive = DriveTrain::new(DriveConfig { invert_right: true });
        drive
            .set_wheel_powers(&mut hw, WheelPowers::new(0.5, 0.4, 0.3, 0.2))
            .unwrap();

        assert_eq!(hw.power(ActuatorId::FrontLeft), 0.5);
        assert_eq!(hw.power(ActuatorId::BackLeft), 0.4);
        assert_eq!(hw.power(ActuatorId::FrontRight), -0.3);
        assert_eq!(hw.power(ActuatorId::BackRight), -0.2);
    }

    #[test]
    fn test_fault_does_not_skip_other_wheels() {
        let mut hw = SimHardware::new();
        hw.inject_fault(ActuatorId::BackLeft);
        let mut drive = DriveTrain::new(DriveConfig { invert_right: false });

        let err = drive
            .drive(&mut hw, DriveIntent::new(1.0, 0.0, 0.0).unwrap())
            .unwrap_err();
        assert_eq!(err, HardwareFault::Unresponsive { id: ActuatorId::BackLeft });
        assert_eq!(hw.power(ActuatorId::FrontLeft), 1.0);
        assert_eq!(hw.power(ActuatorId::FrontRight), 1.0);
        assert_eq!(hw.power(ActuatorId::BackRight), 1.0);
    }

    #[test]
    fn test_initialize_sets_free_mode_and_stops() {
        let mut hw = SimHardware::new();
        let mut drive = DriveTrain::new(DriveConfig::default());
        drive.initialize(&mut hw).unwrap();
        for id in WHEEL_IDS {
            assert_eq!(hw.mode(id), RunMode::Free);
            assert_eq!(hw.power(id), 0.0);
        }
        // sweep and held actuators are not touched
        assert!(hw.calls().iter().all(|c| !matches!(
            c,
            crate::hal::sim::HwCall::Power(ActuatorId::Linear | ActuatorId::Arm | ActuatorId::Sweep, _)
        )));
    }
}
