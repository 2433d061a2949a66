// Position-hold controller for run-to-position actuators (lift, arm)
//
// The controller owns the actuator's target. Every cycle `tick()` re-sends the
// target and the holding power unless a command already went out this cycle:
// without that, an actuator working against gravity sags as soon as the
// operator lets go of the controls.

use tracing::{debug, info, warn};

use crate::config::HoldConfig;
use crate::hal::{ActuatorId, Actuators, HardwareFault, RunMode};
use crate::telemetry::Telemetry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldMode {
    /// At target, holding power applied
    Hold,
    /// Travelling toward the target
    Moving,
    /// Power released on purpose (pause or shutdown), target kept
    Released,
}

/// Snapshot of a held actuator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActuatorState {
    pub current_position: i32,
    pub target_position: i32,
    pub commanded_power: f32,
    pub mode: HoldMode,
}

pub struct PositionHold {
    id: ActuatorId,
    config: HoldConfig,
    state: ActuatorState,
    // Last target the hardware accepted
    acknowledged: i32,
    // Hold mode still has to reach the hardware
    mode_pending: bool,
    commanded_this_cycle: bool,
    fault: Option<HardwareFault>,
}

impl PositionHold {
    /// Controller for `id`; nothing is sent until `initialize`
    pub fn new(id: ActuatorId, config: HoldConfig) -> Self {
        Self {
            id,
            config,
            state: ActuatorState {
                current_position: 0,
                target_position: 0,
                commanded_power: 0.0,
                mode: HoldMode::Released,
            },
            acknowledged: 0,
            mode_pending: true,
            commanded_this_cycle: false,
            fault: None,
        }
    }

    /// Start holding wherever the actuator is now
    ///
    /// If the position cannot be read, the actuator is held at the nearest
    /// in-range position to zero and the fault is returned.
    pub fn initialize<H: Actuators>(&mut self, hw: &mut H) -> Result<(), HardwareFault> {
        match hw.read_position(self.id) {
            Ok(position) => {
                self.state.current_position = position;
                self.initialize_at(hw, position)
            }
            Err(e) => {
                let fallback = self.config.clamp(0);
                warn!("{}: cannot read position ({}), holding at {}", self.id, e, fallback);
                self.record_fault(&e);
                // the read fault is the one returned
                if let Err(write) = self.initialize_at(hw, fallback) {
                    warn!("{}: fallback hold at {} not sent: {}", self.id, fallback, write);
                }
                Err(e)
            }
        }
    }

    /// Start holding at an absolute target
    pub fn initialize_at<H: Actuators>(
        &mut self,
        hw: &mut H,
        target: i32,
    ) -> Result<(), HardwareFault> {
        let target = self.config.clamp(target);
        info!(
            "{}: holding at {} with power {}",
            self.id, target, self.config.holding_power
        );
        self.state.target_position = target;
        self.acknowledged = target;
        self.state.mode = HoldMode::Moving;
        self.mode_pending = true;
        self.commanded_this_cycle = true;
        self.assert_target(hw)
    }

    /// Move the target by `delta` ticks
    pub fn set_target_delta<H: Actuators>(
        &mut self,
        hw: &mut H,
        delta: i32,
    ) -> Result<(), HardwareFault> {
        let target = self.state.target_position.saturating_add(delta);
        self.set_target_absolute(hw, target)
    }

    /// Replace the target. Out-of-range targets are clamped, not rejected.
    pub fn set_target_absolute<H: Actuators>(
        &mut self,
        hw: &mut H,
        position: i32,
    ) -> Result<(), HardwareFault> {
        let clamped = self.config.clamp(position);
        if clamped != position {
            debug!("{}: target {} clamped to {}", self.id, position, clamped);
        }
        self.state.target_position = clamped;
        if self.state.mode == HoldMode::Hold {
            self.state.mode = HoldMode::Moving;
        }
        self.commanded_this_cycle = true;
        self.assert_target(hw)
    }

    /// One configured increment in the sign of `direction`
    pub fn jog<H: Actuators>(&mut self, hw: &mut H, direction: i32) -> Result<(), HardwareFault> {
        self.set_target_delta(hw, direction.signum() * self.config.increment_per_tick)
    }

    /// Once per control cycle, after any commands
    pub fn tick<H: Actuators>(&mut self, hw: &mut H) -> Result<(), HardwareFault> {
        let commanded = std::mem::take(&mut self.commanded_this_cycle);
        let asserted = if commanded || self.state.mode == HoldMode::Released {
            Ok(())
        } else {
            self.assert_target(hw)
        };
        let refreshed = self.refresh(hw);

        let result = asserted.and(refreshed);
        if result.is_ok() {
            if let Some(fault) = self.fault.take() {
                info!("{}: recovered from {}", self.id, fault);
            }
        }
        result
    }

    /// Cut power but keep the target so `restore` can pick it up again
    pub fn release<H: Actuators>(&mut self, hw: &mut H) -> Result<(), HardwareFault> {
        debug!("{}: releasing at target {}", self.id, self.state.target_position);
        self.state.mode = HoldMode::Released;
        self.state.commanded_power = 0.0;
        hw.set_power(self.id, 0.0).inspect_err(|e| self.record_fault(e))
    }

    /// Re-apply holding power against the kept target
    pub fn restore<H: Actuators>(&mut self, hw: &mut H) -> Result<(), HardwareFault> {
        debug!("{}: restoring at target {}", self.id, self.state.target_position);
        self.state.mode = HoldMode::Moving;
        self.commanded_this_cycle = true;
        self.assert_target(hw)
    }

    /// Power down for shutdown
    pub fn stop<H: Actuators>(&mut self, hw: &mut H) -> Result<(), HardwareFault> {
        info!("{}: powering down", self.id);
        self.release(hw)
    }

    pub fn is_busy<H: Actuators>(&mut self, hw: &mut H) -> Result<bool, HardwareFault> {
        hw.is_busy(self.id).inspect_err(|e| self.record_fault(e))
    }

    pub fn id(&self) -> ActuatorId {
        self.id
    }

    pub fn config(&self) -> &HoldConfig {
        &self.config
    }

    pub fn state(&self) -> ActuatorState {
        self.state
    }

    pub fn target(&self) -> i32 {
        self.state.target_position
    }

    pub fn is_released(&self) -> bool {
        self.state.mode == HoldMode::Released
    }

    /// Fault seen since the last clean tick
    pub fn fault(&self) -> Option<&HardwareFault> {
        self.fault.as_ref()
    }

    /// Write target/current lines under `label`
    pub fn report(&self, telemetry: &mut Telemetry, label: &str) {
        telemetry.add_data(&format!("{label} Target"), self.state.target_position);
        telemetry.add_data(&format!("{label} Current"), self.state.current_position);
        if let Some(fault) = &self.fault {
            telemetry.add_data(&format!("{label} Fault"), fault);
        }
    }

    // Send target (and mode if pending) plus the power for the current mode.
    // A target the hardware did not take is rolled back to the last
    // acknowledged one, and the next tick sends it again.
    fn assert_target<H: Actuators>(&mut self, hw: &mut H) -> Result<(), HardwareFault> {
        let id = self.id;
        let with_mode = self.mode_pending;
        let target = self.state.target_position;
        let power = match self.state.mode {
            HoldMode::Released => 0.0,
            HoldMode::Hold | HoldMode::Moving => self.config.holding_power,
        };

        let sent = hw
            .set_target_position(id, target)
            .and_then(|()| {
                if with_mode {
                    hw.set_mode(id, RunMode::Hold)
                } else {
                    Ok(())
                }
            })
            .and_then(|()| hw.set_power(id, power));

        match sent {
            Ok(()) => {
                self.acknowledged = target;
                self.mode_pending = false;
                self.state.commanded_power = power;
                Ok(())
            }
            Err(e) => {
                self.state.target_position = self.acknowledged;
                self.commanded_this_cycle = false;
                self.record_fault(&e);
                Err(e)
            }
        }
    }

    fn refresh<H: Actuators>(&mut self, hw: &mut H) -> Result<(), HardwareFault> {
        let position = hw.read_position(self.id).inspect_err(|e| self.record_fault(e))?;
        self.state.current_position = position;
        if self.state.mode != HoldMode::Released {
            let busy = self.is_busy(hw)?;
            self.state.mode = if busy { HoldMode::Moving } else { HoldMode::Hold };
        }
        Ok(())
    }

    fn record_fault(&mut self, fault: &HardwareFault) {
        if self.fault.as_ref() != Some(fault) {
            warn!("{}: {}", self.id, fault);
        }
        self.fault = Some(fault.clone());
    }
}

/// Tick every actuator in `held` for the current cycle
///
/// Loops that own the control cycle for a while (timed drive steps, the dump
/// delay, the lift wait) call this before each `idle()`. Faults stay on each
/// controller and show up in its report.
pub fn tick_all<H: Actuators>(hw: &mut H, held: &mut [&mut PositionHold]) {
    for hold in held.iter_mut() {
        if let Err(e) = hold.tick(hw) {
            debug!("{} tick: {}", hold.id(), e);
        }
    }
}
