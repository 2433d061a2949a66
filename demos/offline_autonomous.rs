// Run the autonomous routine against simulated hardware, no network needed.
// Time is simulated too, so the run finishes instantly.
//
//   cargo run --example offline_autonomous -- --pause-at 300
use clap::Parser;
use mecanum_zenoh_runtime::config::{RobotConfig, LOOP_HZ};
use mecanum_zenoh_runtime::hal::{ActuatorId, SimHardware, SimOpMode};
use mecanum_zenoh_runtime::messages::Gamepads;
use mecanum_zenoh_runtime::teleop::Robot;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
struct Args {
    /// Press the pause button at this cycle, and again 25 cycles later
    #[arg(long)]
    pause_at: Option<usize>,

    /// Press cancel at this cycle
    #[arg(long)]
    cancel_at: Option<usize>,

    /// Lift target for the routine
    #[arg(long, default_value_t = 13400)]
    lift_target: i32,
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    // paused clock: sleeps complete as soon as the runtime is idle
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()?;
    runtime.block_on(run(args));
    Ok(())
}

async fn run(args: Args) {
    let mut config = RobotConfig::default();
    config.autonomous.lift_target = args.lift_target;

    let period = Duration::from_millis(1000 / LOOP_HZ);
    let mut op = SimOpMode::new(SimHardware::new(), period).with_max_cycles(3000);

    // cycle 0 invokes autonomous, then a scripted operator
    let mut invoke = Gamepads::default();
    invoke.operator.left_bumper = true;
    op.set_gamepads(invoke);
    let mut script = vec![Gamepads::default(); 2000];
    if let Some(at) = args.pause_at {
        for offset in [0, 25] {
            if let Some(pads) = script.get_mut(at + offset) {
                pads.operator.right_bumper = true;
            }
        }
    }
    if let Some(at) = args.cancel_at {
        if let Some(pads) = script.get_mut(at) {
            pads.operator.back = true;
        }
    }
    for pads in script {
        op.push_input(pads);
    }

    let mut robot = Robot::new(&config);
    robot.initialize(&mut op);
    robot.run_teleop_cycle(&mut op).await;
    robot.shutdown(&mut op);

    for (cycle, frame) in op.frames().iter().enumerate() {
        if let Some(position) = frame.get("Linear Motor Position") {
            if cycle % 25 == 0 {
                info!("cycle {:4}: lift at {}", cycle, position);
            }
        }
    }
    info!(
        "Autonomous states: {}",
        op.telemetry_history("Autonomous").join(" -> ")
    );
    info!(
        "Finished after {} cycles, lift at {} ticks, arm at {} ticks",
        op.cycles(),
        op.sim().position(ActuatorId::Linear),
        op.sim().position(ActuatorId::Arm)
    );
}
