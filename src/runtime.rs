// Fixed-rate control loop over zenoh, with input and feedback watchdogs
// Note: a watchdog replaces stale input with a safe default. Without it, if the
// teleop station drops off the network, the robot keeps acting on the last
// gamepad sample it received.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, Instant, Interval};
use tracing::{debug, info, warn};
use zenoh::handlers::FifoChannelHandler;
use zenoh::pubsub::{Publisher, Subscriber};
use zenoh::sample::Sample;

// local imports
use crate::config::{
    RobotConfig, CMD_TIMEOUT, FEEDBACK_TIMEOUT, TOPIC_CMD_GAMEPADS, TOPIC_HEALTH,
    TOPIC_RT_ACTUATORS, TOPIC_STATE_ACTUATORS, TOPIC_TELEMETRY,
};
use crate::hal::BridgeHardware;
use crate::messages::{ActuatorFeedback, Gamepads, RuntimeHealth};
use crate::opmode::OpMode;
use crate::teleop::Robot;
use crate::telemetry::Telemetry;

/// Gamepad input with a staleness cutoff
pub struct InputWatchdog {
    latest: Option<Gamepads>,
    received_at: Instant,
    timeout: Duration,
    health: RuntimeHealth,
}

impl InputWatchdog {
    pub fn new(timeout: Duration) -> Self {
        Self {
            latest: None,
            received_at: Instant::now(),
            timeout,
            health: RuntimeHealth::CmdStale, // Start stale until first input
        }
    }

    /// Store an incoming sample
    pub fn on_gamepads(&mut self, gamepads: Gamepads) {
        debug!("Received gamepads: {:?}", &gamepads);
        self.latest = Some(gamepads.sanitized());
        self.received_at = Instant::now();
    }

    /// Input to act on this cycle: the latest sample, or neutral pads once it
    /// has gone stale. Missing hardware feedback outranks stale input in the
    /// reported health.
    pub fn evaluate(&mut self, feedback_fresh: bool) -> Gamepads {
        let age = self.received_at.elapsed();
        let (gamepads, cmd_health) = match self.latest {
            Some(gamepads) if age <= self.timeout => (gamepads, RuntimeHealth::Ok),
            Some(_) => {
                if self.health == RuntimeHealth::Ok {
                    warn!("Gamepads stale ({:?} old), releasing all inputs", age);
                }
                (Gamepads::default(), RuntimeHealth::CmdStale)
            }
            // No input ever received
            None => (Gamepads::default(), RuntimeHealth::CmdStale),
        };

        let health = if feedback_fresh {
            cmd_health
        } else {
            RuntimeHealth::FeedbackStale
        };
        if health != self.health {
            info!("Runtime health: {:?} -> {:?}", self.health, health);
        }
        self.health = health;
        gamepads
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }
}

/// Op mode backed by a zenoh session
///
/// `idle()` publishes the cycle's actuator frame, telemetry and health, waits
/// for the next tick, then drains incoming gamepads and hardware feedback.
pub struct ZenohOpMode {
    hardware: BridgeHardware,
    watchdog: InputWatchdog,
    gamepads: Gamepads,
    telemetry: Telemetry,
    active: Arc<AtomicBool>,
    tick: Interval,
    sub_gamepads: Subscriber<FifoChannelHandler<Sample>>,
    sub_feedback: Subscriber<FifoChannelHandler<Sample>>,
    pub_actuators: Publisher<'static>,
    pub_telemetry: Publisher<'static>,
    pub_health: Publisher<'static>,
}

impl ZenohOpMode {
    pub async fn open(
        session: &zenoh::Session,
        period: Duration,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        info!("Setting up publishers and subscribers...");
        let sub_gamepads = session.declare_subscriber(TOPIC_CMD_GAMEPADS).await?;
        let sub_feedback = session.declare_subscriber(TOPIC_STATE_ACTUATORS).await?;
        let pub_actuators = session.declare_publisher(TOPIC_RT_ACTUATORS).await?;
        let pub_telemetry = session.declare_publisher(TOPIC_TELEMETRY).await?;
        let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

        info!("Subscribed to: {}, {}", TOPIC_CMD_GAMEPADS, TOPIC_STATE_ACTUATORS);
        info!(
            "Publishing to: {}, {}, {}",
            TOPIC_RT_ACTUATORS, TOPIC_TELEMETRY, TOPIC_HEALTH
        );

        Ok(Self {
            hardware: BridgeHardware::new(FEEDBACK_TIMEOUT),
            watchdog: InputWatchdog::new(CMD_TIMEOUT),
            gamepads: Gamepads::default(),
            telemetry: Telemetry::new(),
            active: Arc::new(AtomicBool::new(true)),
            tick: interval(period),
            sub_gamepads,
            sub_feedback,
            pub_actuators,
            pub_telemetry,
            pub_health,
        })
    }

    /// Flag cleared on Ctrl-C
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.active.clone()
    }

    /// Idle until the hardware node reports in (or a stop is requested)
    pub async fn wait_for_hardware(&mut self) {
        if !self.hardware.feedback_fresh() {
            info!("Waiting for hardware feedback on {}...", TOPIC_STATE_ACTUATORS);
        }
        while self.is_active() && !self.hardware.feedback_fresh() {
            self.idle().await;
        }
        if self.is_active() {
            info!("Hardware feedback received");
        }
    }

    /// Send the current actuator frame, telemetry and health
    pub async fn publish(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let frame_json = serde_json::to_string(self.hardware.frame())?;
        self.pub_actuators.put(frame_json).await?;

        let telemetry_json = serde_json::to_string(&self.telemetry.take_frame())?;
        self.pub_telemetry.put(telemetry_json).await?;

        let health_json = serde_json::to_string(&self.watchdog.health())?;
        self.pub_health.put(health_json).await?;
        Ok(())
    }

    fn drain(&mut self) {
        // Drain all pending samples (non-blocking), keep latest
        while let Ok(Some(sample)) = self.sub_gamepads.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<Gamepads>(&payload) {
                Ok(gamepads) => self.watchdog.on_gamepads(gamepads),
                Err(e) => warn!("Failed to parse gamepads: {}", e),
            }
        }
        while let Ok(Some(sample)) = self.sub_feedback.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<ActuatorFeedback>(&payload) {
                Ok(feedback) => self.hardware.on_feedback(feedback),
                Err(e) => warn!("Failed to parse actuator feedback: {}", e),
            }
        }
    }
}

impl OpMode for ZenohOpMode {
    type Hardware = BridgeHardware;

    fn hardware(&mut self) -> &mut BridgeHardware {
        &mut self.hardware
    }

    fn gamepads(&self) -> Gamepads {
        self.gamepads
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn telemetry(&mut self) -> &mut Telemetry {
        &mut self.telemetry
    }

    async fn idle(&mut self) {
        if let Err(e) = self.publish().await {
            warn!("Publish failed: {}", e);
        }
        self.tick.tick().await;
        self.drain();
        self.gamepads = self.watchdog.evaluate(self.hardware.feedback_fresh());
    }
}

pub async fn run(
    config: RobotConfig,
    loop_hz: u64,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if !(1..=1000).contains(&loop_hz) {
        return Err(format!("loop rate must be 1-1000 Hz, got {loop_hz}").into());
    }

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    let mut op = ZenohOpMode::open(&session, Duration::from_millis(1000 / loop_hz)).await?;

    let active = op.stop_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
        }
        active.store(false, Ordering::SeqCst);
    });

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout",
        loop_hz,
        CMD_TIMEOUT.as_millis()
    );

    op.wait_for_hardware().await;
    if op.is_active() {
        let mut robot = Robot::new(&config);
        robot.run(&mut op).await;
    }

    // last frame carries the shutdown commands
    op.publish().await?;
    session.close().await?;
    info!("Runtime stopped");
    Ok(())
}
