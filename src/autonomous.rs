// Scripted autonomous routine
//
// Raise the lift and pose the arm, drive a fixed timed plan, wait for the lift
// to reach its height (pausable from the operator pad), dump the bucket.
// Lift and arm are ticked on every cycle the routine spends, and keep holding
// their targets afterwards so teleop resumes from there.

use std::time::Duration;

use tracing::{info, warn};

use crate::config::AutonomousConfig;
use crate::hal::HardwareFault;
use crate::messages::Gamepads;
use crate::motion::{
    hold_until_settled, tick_all, ArmControl, BucketPreset, DriveTrain, MotionStep, Outcome,
    PositionHold, PresetServo, Sweep, TimedSequencer,
};
use crate::opmode::OpMode;

/// Drive plan as (fl, bl, fr, br) wheel powers
pub const PLAN: [MotionStep; 5] = [
    // strafe right
    MotionStep::new(0.4, -0.4, -0.4, 0.4, Duration::from_millis(500)),
    // forward
    MotionStep::new(0.5, 0.5, 0.5, 0.5, Duration::from_millis(2500)),
    // rotate counter-clockwise
    MotionStep::new(-0.4, -0.4, 0.4, 0.4, Duration::from_millis(1000)),
    // strafe right
    MotionStep::new(0.4, -0.4, -0.4, 0.4, Duration::from_millis(1000)),
    // forward
    MotionStep::new(0.5, 0.5, 0.5, 0.5, Duration::from_millis(500)),
];

/// `back` on either pad aborts the routine
pub fn cancel_requested(pads: &Gamepads) -> bool {
    pads.driver.back || pads.operator.back
}

/// Operator right bumper toggles pause during the lift wait
pub fn pause_requested(pads: &Gamepads) -> bool {
    pads.operator.right_bumper
}

/// Mechanisms the routine takes over for its duration
pub struct AutonomousHandles<'a> {
    pub drive: &'a mut DriveTrain,
    pub lift: &'a mut PositionHold,
    pub arm: &'a mut ArmControl,
    pub sweep: &'a mut Sweep,
    pub bucket: &'a mut PresetServo,
}

pub async fn run_autonomous<O: OpMode>(
    op: &mut O,
    handles: AutonomousHandles<'_>,
    config: &AutonomousConfig,
) -> Outcome {
    let AutonomousHandles {
        drive,
        lift,
        arm,
        sweep,
        bucket,
    } = handles;
    info!(
        "Autonomous start: lift -> {}, arm -> {}",
        config.lift_target, config.arm_target
    );

    let tilt = bucket.preset_position(BucketPreset::Tilt);
    let started = [
        lift.set_target_absolute(op.hardware(), config.lift_target),
        arm.hold_mut()
            .set_target_absolute(op.hardware(), config.arm_target),
        bucket.set_position(op.hardware(), tilt),
    ];
    for result in started {
        report(op, result);
    }

    let mut outcome = TimedSequencer::new(&mut *drive)
        .run(op, &PLAN, &mut [&mut *lift, arm.hold_mut()], cancel_requested)
        .await;

    if outcome == Outcome::Completed {
        outcome = hold_until_settled(
            op,
            lift,
            &mut [arm.hold_mut()],
            pause_requested,
            cancel_requested,
        )
        .await;
        if lift.is_released() {
            // cancelled while paused: put the hold back before teleop takes over
            let restored = lift.restore(op.hardware());
            report(op, restored);
        }
    }

    if outcome == Outcome::Completed {
        let dumped = bucket.dump(op, &mut [&mut *lift, arm.hold_mut()]).await;
        report(op, dumped);
    }

    let stopped = drive.stop(op.hardware()).and(sweep.stop(op.hardware()));
    report(op, stopped);
    // the cycle the routine ends on has not been ticked yet
    tick_all(op.hardware(), &mut [&mut *lift, arm.hold_mut()]);

    let status = match outcome {
        Outcome::Completed => "Completed",
        Outcome::Cancelled => "Cancelled",
    };
    info!("Autonomous {}", status.to_lowercase());
    op.telemetry().add_data("Autonomous", status);
    outcome
}

fn report<O: OpMode>(op: &mut O, result: Result<(), HardwareFault>) {
    if let Err(e) = result {
        warn!("Autonomous: {}", e);
        op.telemetry().add_data("Fault", &e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RobotConfig;
    use crate::hal::sim::HwCall;
    use crate::hal::{ActuatorId, Actuators, ServoId, SimHardware, SimOpMode};
    use crate::motion::drive::WHEEL_IDS;
    use tokio::time::Instant;

    const PERIOD: Duration = Duration::from_millis(20);

    struct Rig {
        drive: DriveTrain,
        lift: PositionHold,
        arm: ArmControl,
        sweep: Sweep,
        bucket: PresetServo,
    }

    impl Rig {
        fn new(op: &mut SimOpMode) -> Self {
            let config = RobotConfig::default();
            let mut rig = Rig {
                drive: DriveTrain::new(config.drive),
                lift: PositionHold::new(ActuatorId::Linear, config.lift),
                arm: ArmControl::new(config.arm),
                sweep: Sweep::new(config.sweep),
                bucket: PresetServo::new(ServoId::Bucket, config.bucket),
            };
            let hw = op.hardware();
            rig.drive.initialize(hw).unwrap();
            rig.lift.initialize(hw).unwrap();
            rig.arm.initialize(hw).unwrap();
            rig.sweep.initialize(hw).unwrap();
            rig.bucket.initialize(hw).unwrap();
            rig
        }

        fn handles(&mut self) -> AutonomousHandles<'_> {
            AutonomousHandles {
                drive: &mut self.drive,
                lift: &mut self.lift,
                arm: &mut self.arm,
                sweep: &mut self.sweep,
                bucket: &mut self.bucket,
            }
        }
    }

    fn cancel() -> Gamepads {
        let mut pads = Gamepads::default();
        pads.driver.back = true;
        pads
    }

    fn pause(pressed: bool) -> Gamepads {
        let mut pads = Gamepads::default();
        pads.operator.right_bumper = pressed;
        pads
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_routine() {
        let mut op = SimOpMode::new(SimHardware::new(), PERIOD).with_max_cycles(2000);
        let mut rig = Rig::new(&mut op);
        op.sim_mut().set_power(ActuatorId::Sweep, 0.4).unwrap();

        let started = Instant::now();
        let outcome = run_autonomous(&mut op, rig.handles(), &AutonomousConfig::default()).await;

        assert_eq!(outcome, Outcome::Completed);
        // drive plan plus the dump delay
        assert!(started.elapsed() >= Duration::from_millis(6000));
        assert_eq!(op.telemetry_history("Autonomous"), ["Driving...", "Completed"]);

        for id in WHEEL_IDS {
            assert_eq!(op.sim().power(id), 0.0);
        }
        assert_eq!(op.sim().power(ActuatorId::Sweep), 0.0);
        // lift and arm still holding
        assert_eq!(op.sim().position(ActuatorId::Linear), 13400);
        assert_eq!(op.sim().power(ActuatorId::Linear), 1.0);
        assert_eq!(rig.arm.hold().target(), 70);
        assert_eq!(op.sim().power(ActuatorId::Arm), 0.3);

        let bucket: Vec<f32> = op
            .sim()
            .calls()
            .iter()
            .filter_map(|c| match c {
                HwCall::Servo(ServoId::Bucket, p) => Some(*p),
                _ => None,
            })
            .collect();
        assert_eq!(bucket, [0.42f32, 0.3, 1.0, 0.42]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_driving() {
        let mut op = SimOpMode::new(SimHardware::new(), PERIOD).with_max_cycles(2000);
        let mut rig = Rig::new(&mut op);
        op.push_repeated(Gamepads::default(), 60);
        op.push_input(cancel());

        let outcome = run_autonomous(&mut op, rig.handles(), &AutonomousConfig::default()).await;

        assert_eq!(outcome, Outcome::Cancelled);
        assert_eq!(op.cycles(), 61);
        assert_eq!(op.telemetry_history("Autonomous").last().map(String::as_str), Some("Cancelled"));
        for id in WHEEL_IDS {
            assert_eq!(op.sim().power(id), 0.0);
        }
        // no dump
        assert!(!op.sim().calls().contains(&HwCall::Servo(ServoId::Bucket, 1.0)));
        // lift keeps its target and power
        assert_eq!(rig.lift.target(), 13400);
        assert_eq!(op.sim().power(ActuatorId::Linear), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_and_resume_during_lift_wait() {
        let mut op = SimOpMode::new(SimHardware::new(), PERIOD).with_max_cycles(2000);
        let mut rig = Rig::new(&mut op);
        // 12 s of travel, longer than the drive plan
        let config = AutonomousConfig {
            lift_target: 30000,
            arm_target: 70,
        };
        // each press held for several cycles
        op.push_repeated(Gamepads::default(), 300);
        op.push_repeated(pause(true), 10);
        op.push_repeated(pause(false), 20);
        op.push_repeated(pause(true), 5);
        op.push_input(pause(false));

        let outcome = run_autonomous(&mut op, rig.handles(), &config).await;

        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(
            op.telemetry_history("Autonomous"),
            ["Driving...", "Paused", "Resumed", "Completed"]
        );
        assert_eq!(op.sim().position(ActuatorId::Linear), 30000);
        assert_eq!(op.sim().power(ActuatorId::Linear), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_paused_restores_hold() {
        let mut op = SimOpMode::new(SimHardware::new(), PERIOD).with_max_cycles(2000);
        let mut rig = Rig::new(&mut op);
        let config = AutonomousConfig {
            lift_target: 30000,
            arm_target: 70,
        };
        op.push_repeated(Gamepads::default(), 300);
        op.push_input(pause(true));
        op.push_repeated(pause(false), 10);
        op.push_input(cancel());

        let outcome = run_autonomous(&mut op, rig.handles(), &config).await;

        assert_eq!(outcome, Outcome::Cancelled);
        assert!(!rig.lift.is_released());
        assert_eq!(rig.lift.target(), 30000);
        assert_eq!(op.sim().power(ActuatorId::Linear), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_request_ends_routine() {
        let mut op = SimOpMode::new(SimHardware::new(), PERIOD).with_max_cycles(100);
        let mut rig = Rig::new(&mut op);
        let outcome = run_autonomous(&mut op, rig.handles(), &AutonomousConfig::default()).await;
        assert_eq!(outcome, Outcome::Cancelled);
        assert_eq!(op.cycles(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lift_and_arm_reasserted_every_cycle() {
        let mut op = SimOpMode::new(SimHardware::new(), PERIOD).with_max_cycles(2000);
        let mut rig = Rig::new(&mut op);
        op.sim_mut().clear_calls();

        let outcome = run_autonomous(&mut op, rig.handles(), &AutonomousConfig::default()).await;
        assert_eq!(outcome, Outcome::Completed);

        let count = |id: ActuatorId| {
            op.sim()
                .calls()
                .iter()
                .filter(|c| matches!(c, HwCall::Target(target, _) if *target == id))
                .count() as u64
        };
        // the start command, then one re-assert for every later cycle
        // including the one the routine ends on
        let cycles = op.cycles();
        assert!(cycles > 275, "cycles = {}", cycles);
        assert_eq!(count(ActuatorId::Arm), cycles + 1);
        assert_eq!(count(ActuatorId::Linear), cycles + 1);
        assert_eq!(op.sim().target(ActuatorId::Arm), Some(70));
        assert_eq!(op.sim().power(ActuatorId::Arm), 0.3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_keeps_holds_asserted() {
        let mut op = SimOpMode::new(SimHardware::new(), PERIOD).with_max_cycles(2000);
        let mut rig = Rig::new(&mut op);
        op.push_repeated(Gamepads::default(), 30);
        op.push_input(cancel());
        op.sim_mut().clear_calls();

        let outcome = run_autonomous(&mut op, rig.handles(), &AutonomousConfig::default()).await;
        assert_eq!(outcome, Outcome::Cancelled);

        let arm_targets = op
            .sim()
            .calls()
            .iter()
            .filter(|c| matches!(c, HwCall::Target(ActuatorId::Arm, 70)))
            .count() as u64;
        assert_eq!(arm_targets, op.cycles() + 1);
    }

    #[test]
    fn test_plan_duration() {
        let total: Duration = PLAN.iter().map(|s| s.duration).sum();
        assert_eq!(total, Duration::from_millis(5500));
    }
}
