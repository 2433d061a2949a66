// Teleop control cycle
//
// `run_teleop_cycle` handles one cycle of operator input in a fixed order:
// drive, lift, arm, sweep, servos, then the autonomous trigger. Lift and arm
// are re-asserted once per cycle after the servos; a dump ticks them on the
// cycles it spends waiting. A fault on one mechanism is reported and the rest
// of the cycle still runs.

use tracing::{debug, info, warn};

use crate::arbiter::ModeArbiter;
use crate::autonomous::{run_autonomous, AutonomousHandles};
use crate::config::{AutonomousConfig, RobotConfig};
use crate::hal::{ActuatorId, HardwareFault, ServoId};
use crate::input::EdgeDetector;
use crate::motion::{
    tick_all, AdjustServo, ArmControl, DriveIntent, DriveTrain, PositionHold, PresetServo, Sweep,
};
use crate::opmode::OpMode;

pub struct Robot {
    drive: DriveTrain,
    lift: PositionHold,
    lift_up: EdgeDetector,
    lift_down: EdgeDetector,
    arm: ArmControl,
    sweep: Sweep,
    bucket: PresetServo,
    wrist: AdjustServo,
    arbiter: ModeArbiter,
    autonomous: AutonomousConfig,
    last_fault: Option<HardwareFault>,
}

impl Robot {
    pub fn new(config: &RobotConfig) -> Self {
        Self {
            drive: DriveTrain::new(config.drive),
            lift: PositionHold::new(ActuatorId::Linear, config.lift),
            lift_up: EdgeDetector::new(),
            lift_down: EdgeDetector::new(),
            arm: ArmControl::new(config.arm),
            sweep: Sweep::new(config.sweep),
            bucket: PresetServo::new(ServoId::Bucket, config.bucket),
            wrist: AdjustServo::new(ServoId::Wrist, config.wrist),
            arbiter: ModeArbiter::new(),
            autonomous: config.autonomous,
            last_fault: None,
        }
    }

    /// Put every mechanism in its starting state. Faults are reported, not fatal.
    pub fn initialize<O: OpMode>(&mut self, op: &mut O) {
        info!("Initializing mechanisms");
        let hw = op.hardware();
        let results = [
            self.drive.initialize(hw),
            self.lift.initialize(hw),
            self.arm.initialize(hw),
            self.sweep.initialize(hw),
            self.bucket.initialize(hw),
            self.wrist.initialize(hw),
        ];
        let faults: Vec<HardwareFault> = results.into_iter().filter_map(Result::err).collect();
        self.note_faults(op, faults);
    }

    pub async fn run_teleop_cycle<O: OpMode>(&mut self, op: &mut O) {
        if self.arbiter.autonomous_active() {
            debug!("Autonomous owns the actuators, skipping teleop handlers");
            return;
        }

        let pads = op.gamepads();
        let mut faults = Vec::new();

        // drive
        let driven = match DriveIntent::from_gamepad(&pads.driver) {
            Ok(intent) => self.drive.drive(op.hardware(), intent),
            Err(e) => {
                warn!("{}, stopping wheels", e);
                self.drive.stop(op.hardware())
            }
        };
        faults.extend(driven.err());

        // lift: one increment per d-pad press
        if self.lift_up.rising(pads.driver.dpad_up) {
            faults.extend(self.lift.jog(op.hardware(), 1).err());
        }
        if self.lift_down.rising(pads.driver.dpad_down) {
            faults.extend(self.lift.jog(op.hardware(), -1).err());
        }

        // arm
        faults.extend(self.arm.update(op.hardware(), &pads.operator).err());

        // sweep
        faults.extend(self.sweep.update(op.hardware(), &pads.operator).err());

        // servos
        let dumped = self
            .bucket
            .update(op, &pads.operator, &mut [&mut self.lift, self.arm.hold_mut()])
            .await;
        faults.extend(dumped.err());
        let wrist = i32::from(pads.driver.right_bumper) - i32::from(pads.driver.left_bumper);
        faults.extend(self.wrist.adjust(op.hardware(), wrist).err());

        // held-actuator faults are logged by the controller and shown in its report
        tick_all(op.hardware(), &mut [&mut self.lift, self.arm.hold_mut()]);

        self.note_faults(op, faults);

        if self
            .arbiter
            .request_autonomous(pads.operator.left_bumper)
        {
            op.telemetry().add_data("Mode", "Autonomous");
            let handles = AutonomousHandles {
                drive: &mut self.drive,
                lift: &mut self.lift,
                arm: &mut self.arm,
                sweep: &mut self.sweep,
                bucket: &mut self.bucket,
            };
            run_autonomous(op, handles, &self.autonomous).await;
            self.arbiter.complete();
        }

        self.report(op);
    }

    /// Cycle until the op mode stops, then power everything down
    pub async fn run<O: OpMode>(&mut self, op: &mut O) {
        self.initialize(op);
        info!("Teleop running");
        while op.is_active() {
            self.run_teleop_cycle(op).await;
            op.idle().await;
        }
        self.shutdown(op);
    }

    /// Wheels and sweep to zero, held actuators powered down
    pub fn shutdown<O: OpMode>(&mut self, op: &mut O) {
        info!("Shutting down: stopping all actuators");
        let hw = op.hardware();
        let results = [
            self.drive.stop(hw),
            self.sweep.stop(hw),
            self.lift.stop(hw),
            self.arm.hold_mut().stop(hw),
        ];
        for e in results.into_iter().filter_map(Result::err) {
            warn!("Shutdown: {}", e);
        }
    }

    pub fn lift(&self) -> &PositionHold {
        &self.lift
    }

    pub fn arm(&self) -> &ArmControl {
        &self.arm
    }

    pub fn arbiter(&self) -> &ModeArbiter {
        &self.arbiter
    }

    fn report<O: OpMode>(&self, op: &mut O) {
        let telemetry = op.telemetry();
        telemetry.add_data("Mode", "Teleop");
        telemetry.add_data("Bucket Position", self.bucket.position());
        telemetry.add_data("Wrist Position", self.wrist.position());
        self.lift.report(telemetry, "Linear Motor");
        self.arm.hold().report(telemetry, "Arm Motor");
        telemetry.add_data("Arm Mode", self.arm.mode());
    }

    // Warn on a new fault only; repeats of the same fault go to telemetry
    fn note_faults<O: OpMode>(&mut self, op: &mut O, faults: Vec<HardwareFault>) {
        for fault in &faults {
            if self.last_fault.as_ref() != Some(fault) {
                warn!("{}", fault);
            }
            op.telemetry().add_data("Fault", fault);
        }
        match faults.into_iter().last() {
            Some(fault) => self.last_fault = Some(fault),
            None => {
                if let Some(fault) = self.last_fault.take() {
                    info!("Cleared: {}", fault);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::sim::HwCall;
    use crate::hal::{SimHardware, SimOpMode};
    use crate::messages::Gamepads;
    use crate::motion::drive::WHEEL_IDS;
    use std::time::Duration;

    const PERIOD: Duration = Duration::from_millis(20);

    fn setup(hw: SimHardware) -> (SimOpMode, Robot) {
        let mut op = SimOpMode::new(hw, PERIOD).with_max_cycles(2000);
        let mut robot = Robot::new(&RobotConfig::default());
        robot.initialize(&mut op);
        (op, robot)
    }

    #[tokio::test(start_paused = true)]
    async fn test_drive_forward_with_right_side_inverted() {
        let (mut op, mut robot) = setup(SimHardware::new());
        let mut pads = Gamepads::default();
        pads.driver.left_stick_y = -1.0;
        op.set_gamepads(pads);

        robot.run_teleop_cycle(&mut op).await;
        assert_eq!(op.sim().power(ActuatorId::FrontLeft), 1.0);
        assert_eq!(op.sim().power(ActuatorId::BackLeft), 1.0);
        assert_eq!(op.sim().power(ActuatorId::FrontRight), -1.0);
        assert_eq!(op.sim().power(ActuatorId::BackRight), -1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lift_moves_once_per_press() {
        let (mut op, mut robot) = setup(SimHardware::new().with_position(ActuatorId::Linear, 5));
        assert_eq!(robot.lift().target(), 5);

        let mut pads = Gamepads::default();
        pads.driver.dpad_up = true;
        op.set_gamepads(pads);
        for _ in 0..3 {
            robot.run_teleop_cycle(&mut op).await;
            op.idle().await;
        }
        assert_eq!(robot.lift().target(), 105);

        op.set_gamepads(Gamepads::default());
        robot.run_teleop_cycle(&mut op).await;
        pads.driver.dpad_up = false;
        pads.driver.dpad_down = true;
        op.set_gamepads(pads);
        robot.run_teleop_cycle(&mut op).await;
        assert_eq!(robot.lift().target(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_cycles_keep_reasserting_lift() {
        let (mut op, mut robot) = setup(SimHardware::new().with_position(ActuatorId::Linear, 5));
        robot.run_teleop_cycle(&mut op).await;
        op.sim_mut().clear_calls();

        for _ in 0..10 {
            op.idle().await;
            robot.run_teleop_cycle(&mut op).await;
        }
        let lift: Vec<HwCall> = op
            .sim()
            .calls()
            .iter()
            .copied()
            .filter(|c| {
                matches!(
                    c,
                    HwCall::Target(ActuatorId::Linear, _) | HwCall::Power(ActuatorId::Linear, _)
                )
            })
            .collect();
        assert_eq!(lift.len(), 20);
        for pair in lift.chunks(2) {
            assert_eq!(
                pair,
                [
                    HwCall::Target(ActuatorId::Linear, 5),
                    HwCall::Power(ActuatorId::Linear, 1.0)
                ]
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_autonomous_runs_once_and_teleop_resumes_from_last_hold() {
        let (mut op, mut robot) = setup(SimHardware::new());
        let mut pads = Gamepads::default();
        pads.operator.left_bumper = true;
        op.set_gamepads(pads);

        robot.run_teleop_cycle(&mut op).await;
        assert!(!robot.arbiter().autonomous_active());
        assert_eq!(robot.lift().target(), 13400);
        assert_eq!(robot.arm().hold().target(), 70);
        assert_eq!(op.telemetry().get("Autonomous"), Some("Completed"));
        let after_first = op.cycles();
        assert!(after_first > 250);

        // bumper still held: no second run
        robot.run_teleop_cycle(&mut op).await;
        assert_eq!(op.cycles(), after_first);

        // teleop picks up from the autonomous targets
        pads.operator.left_bumper = false;
        pads.driver.dpad_up = true;
        op.set_gamepads(pads);
        robot.run_teleop_cycle(&mut op).await;
        assert_eq!(robot.lift().target(), 13500);
        assert_eq!(op.sim().target(ActuatorId::Arm), Some(70));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handlers_skipped_while_autonomous_active() {
        let (mut op, mut robot) = setup(SimHardware::new().with_position(ActuatorId::Linear, 5));
        assert!(robot.arbiter.request_autonomous(true));

        let mut pads = Gamepads::default();
        pads.driver.left_stick_y = -1.0;
        pads.driver.dpad_up = true;
        pads.operator.right_trigger = 1.0;
        pads.operator.b = true;
        op.set_gamepads(pads);
        op.sim_mut().clear_calls();

        robot.run_teleop_cycle(&mut op).await;
        assert!(op.sim().calls().is_empty(), "calls: {:?}", op.sim().calls());
        assert_eq!(robot.lift().target(), 5);
        assert_eq!(op.cycles(), 0);

        // handlers run again once the run is reported complete
        robot.arbiter.complete();
        robot.run_teleop_cycle(&mut op).await;
        assert_eq!(op.sim().power(ActuatorId::FrontLeft), 1.0);
        assert_eq!(robot.lift().target(), 105);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dump_keeps_lift_and_arm_held() {
        let (mut op, mut robot) = setup(SimHardware::new().with_position(ActuatorId::Linear, 5));
        robot.run_teleop_cycle(&mut op).await;
        op.idle().await;
        op.sim_mut().clear_calls();

        let mut pads = Gamepads::default();
        pads.operator.b = true;
        op.set_gamepads(pads);
        let before = op.cycles();
        robot.run_teleop_cycle(&mut op).await;
        let spent = op.cycles() - before;
        assert!(spent >= 25, "spent = {}", spent);

        let count = |id: ActuatorId| {
            op.sim()
                .calls()
                .iter()
                .filter(|c| matches!(c, HwCall::Target(target, _) if *target == id))
                .count() as u64
        };
        // once for every cycle the dump waited, plus the cycle it returned on
        assert_eq!(count(ActuatorId::Linear), spent + 1);
        assert_eq!(count(ActuatorId::Arm), spent + 1);
        assert_eq!(op.sim().servo(ServoId::Bucket), Some(0.42));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fault_is_reported_and_cycle_continues() {
        let (mut op, mut robot) = setup(SimHardware::new());
        op.sim_mut().inject_fault(ActuatorId::FrontLeft);
        let mut pads = Gamepads::default();
        pads.driver.left_stick_y = -0.5;
        pads.operator.right_trigger = 1.0;
        op.set_gamepads(pads);

        robot.run_teleop_cycle(&mut op).await;
        assert_eq!(op.sim().power(ActuatorId::BackLeft), 0.5);
        assert_eq!(op.sim().power(ActuatorId::Sweep), 0.4);
        assert_eq!(op.sim().power(ActuatorId::Linear), 1.0);
        assert_eq!(
            op.telemetry().get("Fault"),
            Some("Actuator front_left is not responding")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_everything_on_exit() {
        let mut op = SimOpMode::new(SimHardware::new(), PERIOD).with_max_cycles(10);
        let mut pads = Gamepads::default();
        pads.driver.left_stick_y = -1.0;
        pads.operator.left_trigger = 1.0;
        op.set_gamepads(pads);

        let mut robot = Robot::new(&RobotConfig::default());
        robot.run(&mut op).await;

        assert_eq!(op.cycles(), 10);
        for id in WHEEL_IDS {
            assert_eq!(op.sim().power(id), 0.0);
        }
        assert_eq!(op.sim().power(ActuatorId::Sweep), 0.0);
        assert_eq!(op.sim().power(ActuatorId::Linear), 0.0);
        assert_eq!(op.sim().power(ActuatorId::Arm), 0.0);
        assert!(robot.lift().is_released());
    }
}
