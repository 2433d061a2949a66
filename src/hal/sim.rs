// Simulated hardware and op mode
//
// `SimHardware` records every call made through `Actuators` and runs a
// first-order motion model so held actuators travel toward their targets.
// `SimOpMode` drives the control core with scripted gamepad input on tokio
// time, so tests can run with a paused clock.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::Duration;

use super::{ActuatorId, Actuators, HardwareFault, Result, RunMode, ServoId};
use crate::messages::{ActuatorFeedback, ActuatorFrame, Gamepads, TelemetryFrame};
use crate::opmode::OpMode;
use crate::telemetry::Telemetry;

/// Travel speed at full power
pub const SIM_TICKS_PER_SEC: f64 = 2500.0;

/// Distance from target still reported as busy
pub const SIM_BUSY_TOLERANCE: f64 = 10.0;

/// One call received through the `Actuators` trait
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HwCall {
    Power(ActuatorId, f32),
    Target(ActuatorId, i32),
    Mode(ActuatorId, RunMode),
    Servo(ServoId, f32),
}

#[derive(Debug, Clone, Copy, Default)]
struct SimMotor {
    position: f64,
    target: Option<i32>,
    power: f32,
    mode: RunMode,
}

#[derive(Debug, Default)]
pub struct SimHardware {
    motors: BTreeMap<ActuatorId, SimMotor>,
    servos: BTreeMap<ServoId, f32>,
    calls: Vec<HwCall>,
    faults: BTreeSet<ActuatorId>,
}

impl SimHardware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an actuator already at a position
    pub fn with_position(mut self, id: ActuatorId, ticks: i32) -> Self {
        self.set_position(id, ticks);
        self
    }

    /// Move an actuator externally (load, hand push)
    pub fn set_position(&mut self, id: ActuatorId, ticks: i32) {
        self.motors.entry(id).or_default().position = f64::from(ticks);
    }

    /// Make an actuator stop answering
    pub fn inject_fault(&mut self, id: ActuatorId) {
        self.faults.insert(id);
    }

    pub fn clear_fault(&mut self, id: ActuatorId) {
        self.faults.remove(&id);
    }

    /// Calls received so far, oldest first
    pub fn calls(&self) -> &[HwCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn power(&self, id: ActuatorId) -> f32 {
        self.motors.get(&id).map_or(0.0, |m| m.power)
    }

    pub fn target(&self, id: ActuatorId) -> Option<i32> {
        self.motors.get(&id).and_then(|m| m.target)
    }

    pub fn mode(&self, id: ActuatorId) -> RunMode {
        self.motors.get(&id).map_or(RunMode::Free, |m| m.mode)
    }

    pub fn position(&self, id: ActuatorId) -> i32 {
        self.motors
            .get(&id)
            .map_or(0, |m| m.position.round() as i32)
    }

    pub fn servo(&self, id: ServoId) -> Option<f32> {
        self.servos.get(&id).copied()
    }

    /// Step the motion model forward
    pub fn advance(&mut self, dt: Duration) {
        let dt = dt.as_secs_f64();
        for motor in self.motors.values_mut() {
            let travel = f64::from(motor.power) * SIM_TICKS_PER_SEC * dt;
            match (motor.mode, motor.target) {
                (RunMode::Hold, Some(target)) => {
                    let error = f64::from(target) - motor.position;
                    let step = travel.abs().min(error.abs());
                    motor.position += step.copysign(error);
                }
                (RunMode::Hold, None) => {}
                (RunMode::Free, _) => motor.position += travel,
            }
        }
    }

    /// Apply a published frame without recording calls
    pub fn apply_frame(&mut self, frame: &ActuatorFrame) {
        for (id, cmd) in &frame.motors {
            if self.faults.contains(id) {
                continue;
            }
            let motor = self.motors.entry(*id).or_default();
            motor.mode = cmd.mode;
            motor.power = cmd.power;
            if cmd.target.is_some() {
                motor.target = cmd.target;
            }
        }
        for (id, position) in &frame.servos {
            self.servos.insert(*id, *position);
        }
    }

    /// State as the hardware node would publish it
    pub fn feedback(&self) -> ActuatorFeedback {
        let mut feedback = ActuatorFeedback::default();
        for id in ActuatorId::ALL {
            feedback.positions.insert(id, i64::from(self.position(id)));
            feedback.busy.insert(id, self.busy(id));
        }
        feedback.faults = self.faults.iter().copied().collect();
        feedback
    }

    fn busy(&self, id: ActuatorId) -> bool {
        match self.motors.get(&id) {
            Some(SimMotor {
                mode: RunMode::Hold,
                target: Some(target),
                position,
                ..
            }) => (f64::from(*target) - position).abs() > SIM_BUSY_TOLERANCE,
            _ => false,
        }
    }

    fn check(&self, id: ActuatorId) -> Result<()> {
        if self.faults.contains(&id) {
            Err(HardwareFault::Unresponsive { id })
        } else {
            Ok(())
        }
    }
}

impl Actuators for SimHardware {
    fn read_position(&mut self, id: ActuatorId) -> Result<i32> {
        self.check(id)?;
        Ok(self.position(id))
    }

    fn set_power(&mut self, id: ActuatorId, power: f32) -> Result<()> {
        self.check(id)?;
        self.motors.entry(id).or_default().power = power;
        self.calls.push(HwCall::Power(id, power));
        Ok(())
    }

    fn set_target_position(&mut self, id: ActuatorId, ticks: i32) -> Result<()> {
        self.check(id)?;
        self.motors.entry(id).or_default().target = Some(ticks);
        self.calls.push(HwCall::Target(id, ticks));
        Ok(())
    }

    fn set_mode(&mut self, id: ActuatorId, mode: RunMode) -> Result<()> {
        self.check(id)?;
        self.motors.entry(id).or_default().mode = mode;
        self.calls.push(HwCall::Mode(id, mode));
        Ok(())
    }

    fn is_busy(&mut self, id: ActuatorId) -> Result<bool> {
        self.check(id)?;
        Ok(self.busy(id))
    }

    fn set_servo_position(&mut self, id: ServoId, position: f32) -> Result<()> {
        self.servos.insert(id, position);
        self.calls.push(HwCall::Servo(id, position));
        Ok(())
    }
}

/// Op mode backed by `SimHardware` and a queue of gamepad samples
pub struct SimOpMode {
    hardware: SimHardware,
    gamepads: Gamepads,
    script: VecDeque<Gamepads>,
    telemetry: Telemetry,
    frames: Vec<TelemetryFrame>,
    period: Duration,
    cycles: u64,
    max_cycles: Option<u64>,
    active: bool,
}

impl SimOpMode {
    pub fn new(hardware: SimHardware, period: Duration) -> Self {
        Self {
            hardware,
            gamepads: Gamepads::default(),
            script: VecDeque::new(),
            telemetry: Telemetry::new(),
            frames: Vec::new(),
            period,
            cycles: 0,
            max_cycles: None,
            active: true,
        }
    }

    /// Become inactive after this many cycles
    pub fn with_max_cycles(mut self, max_cycles: u64) -> Self {
        self.max_cycles = Some(max_cycles);
        self
    }

    /// Input for the current cycle
    pub fn set_gamepads(&mut self, gamepads: Gamepads) {
        self.gamepads = gamepads;
    }

    /// Queue input for upcoming cycles, one sample per cycle. The last sample
    /// stays in effect once the queue runs dry.
    pub fn push_input(&mut self, gamepads: Gamepads) {
        self.script.push_back(gamepads);
    }

    pub fn push_repeated(&mut self, gamepads: Gamepads, cycles: usize) {
        for _ in 0..cycles {
            self.script.push_back(gamepads);
        }
    }

    pub fn sim(&self) -> &SimHardware {
        &self.hardware
    }

    pub fn sim_mut(&mut self) -> &mut SimHardware {
        &mut self.hardware
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Telemetry frames flushed so far
    pub fn frames(&self) -> &[TelemetryFrame] {
        &self.frames
    }

    /// Every value a caption took, in order, skipping repeats
    pub fn telemetry_history(&self, caption: &str) -> Vec<String> {
        let mut history: Vec<String> = Vec::new();
        let pending = self.telemetry.get(caption);
        let values = self
            .frames
            .iter()
            .filter_map(|f| f.get(caption))
            .chain(pending);
        for value in values {
            if history.last().map(String::as_str) != Some(value) {
                history.push(value.to_string());
            }
        }
        history
    }
}

impl OpMode for SimOpMode {
    type Hardware = SimHardware;

    fn hardware(&mut self) -> &mut SimHardware {
        &mut self.hardware
    }

    fn gamepads(&self) -> Gamepads {
        self.gamepads
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn telemetry(&mut self) -> &mut Telemetry {
        &mut self.telemetry
    }

    async fn idle(&mut self) {
        let frame = self.telemetry.take_frame();
        self.frames.push(frame);

        tokio::time::sleep(self.period).await;
        self.hardware.advance(self.period);
        self.cycles += 1;

        if let Some(next) = self.script.pop_front() {
            self.gamepads = next;
        }
        if self.max_cycles.is_some_and(|max| self.cycles >= max) {
            self.active = false;
        }
    }
}
