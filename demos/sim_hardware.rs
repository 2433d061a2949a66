// Simulated hardware node: applies actuator frames to SimHardware and
// publishes feedback, so the runtime can be driven without a robot.
//
//   cargo run --example sim_hardware -- --fault arm
use clap::Parser;
use mecanum_zenoh_runtime::config::{LOOP_HZ, TOPIC_RT_ACTUATORS, TOPIC_STATE_ACTUATORS};
use mecanum_zenoh_runtime::hal::{ActuatorId, SimHardware};
use mecanum_zenoh_runtime::messages::ActuatorFrame;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
struct Args {
    /// Actuators that never respond (front_left, linear, arm, ...)
    #[arg(long, value_parser = parse_actuator)]
    fault: Vec<ActuatorId>,

    /// Starting lift position in ticks
    #[arg(long, default_value_t = 0)]
    lift_start: i32,
}

fn parse_actuator(name: &str) -> Result<ActuatorId, String> {
    ActuatorId::ALL
        .into_iter()
        .find(|id| id.name() == name)
        .ok_or_else(|| format!("unknown actuator '{name}'"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let mut hardware = SimHardware::new().with_position(ActuatorId::Linear, args.lift_start);
    for id in &args.fault {
        info!("Injecting fault on {}", id);
        hardware.inject_fault(*id);
    }

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let subscriber = session.declare_subscriber(TOPIC_RT_ACTUATORS).await?;
    let publisher = session.declare_publisher(TOPIC_STATE_ACTUATORS).await?;
    info!("Subscribed to: {}", TOPIC_RT_ACTUATORS);
    info!("Publishing to: {}", TOPIC_STATE_ACTUATORS);

    let period = Duration::from_millis(1000 / LOOP_HZ);
    let mut interval = tokio::time::interval(period);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Shutdown requested");
                break;
            }
            _ = interval.tick() => {
                // keep only the newest frame
                let mut latest = None;
                while let Ok(Some(sample)) = subscriber.try_recv() {
                    let payload = sample.payload().to_bytes();
                    match serde_json::from_slice::<ActuatorFrame>(&payload) {
                        Ok(frame) => latest = Some(frame),
                        Err(e) => warn!("Failed to parse actuator frame: {}", e),
                    }
                }
                if let Some(frame) = latest {
                    hardware.apply_frame(&frame);
                }

                hardware.advance(period);
                publisher.put(serde_json::to_string(&hardware.feedback())?).await?;
            }
        }
    }

    session.close().await?;
    Ok(())
}
