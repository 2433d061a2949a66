// Continuous sweep mechanism, open-loop power from the operator's triggers
use crate::config::SweepConfig;
use crate::hal::{ActuatorId, Actuators, HardwareFault, RunMode};
use crate::messages::Gamepad;

pub struct Sweep {
    power: f32,
    commanded: f32,
}

impl Sweep {
    pub fn new(config: SweepConfig) -> Self {
        Self {
            power: config.power,
            commanded: 0.0,
        }
    }

    pub fn initialize<H: Actuators>(&mut self, hw: &mut H) -> Result<(), HardwareFault> {
        hw.set_mode(ActuatorId::Sweep, RunMode::Free)?;
        self.stop(hw)
    }

    /// Right trigger sweeps in, left trigger sweeps out; right wins if both are pulled
    pub fn power_for(&self, pad: &Gamepad) -> f32 {
        if pad.right_trigger > 0.0 {
            self.power
        } else if pad.left_trigger > 0.0 {
            -self.power
        } else {
            0.0
        }
    }

    pub fn update<H: Actuators>(&mut self, hw: &mut H, pad: &Gamepad) -> Result<(), HardwareFault> {
        self.commanded = self.power_for(pad);
        hw.set_power(ActuatorId::Sweep, self.commanded)
    }

    pub fn stop<H: Actuators>(&mut self, hw: &mut H) -> Result<(), HardwareFault> {
        self.commanded = 0.0;
        hw.set_power(ActuatorId::Sweep, 0.0)
    }

    pub fn commanded(&self) -> f32 {
        self.commanded
    }
}
