use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mecanum_zenoh_runtime::config::{RobotConfig, LOOP_HZ};

/// Mecanum robot control runtime over zenoh
#[derive(Parser, Debug)]
#[command(name = "mecanum-zenoh-runtime")]
struct Args {
    /// JSON file with actuator tuning; defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Control loop rate in Hz
    #[arg(long, default_value_t = LOOP_HZ)]
    loop_hz: u64,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init(); // installs the subscriber globally

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match RobotConfig::load(path) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                eprintln!("Config error ({}): {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => RobotConfig::default(),
    };

    if let Err(e) = mecanum_zenoh_runtime::runtime::run(config, args.loop_hz).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
