// Keyboard stand-in for the two gamepads
//
// Driver:   WASD move, Z/X rotate, Up/Down lift, [ ] wrist, R/F speed
// Operator: T/G arm jog, H arm mode, I/O sweep in/out, 1/2/3 bucket
//           neutral/tilt/dump, Space autonomous, P pause, Backspace cancel
// Q or Esc quits.
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use mecanum_zenoh_runtime::config::TOPIC_CMD_GAMEPADS;
use mecanum_zenoh_runtime::messages::Gamepads;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::info;

const SPEEDS: [f32; 3] = [0.3, 0.6, 1.0]; // stick deflection
const INPUT_TIMEOUT_MS: u64 = 100; // A key counts as released this long after its last press/repeat

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_GAMEPADS).await?;

    info!("Driver: WASD=move, Z/X=rotate, Up/Down=lift, [/]=wrist, R/F=speed");
    info!("Operator: T/G=arm, H=arm mode, I/O=sweep, 1/2/3=bucket, Space=auto, P=pause, Backspace=cancel");
    info!("Speed: LOW");

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    result
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut speed_idx: usize = 0;
    let timeout = Duration::from_millis(INPUT_TIMEOUT_MS);

    // Last press (or auto-repeat) of every key still considered held
    let mut held: HashMap<KeyCode, Instant> = HashMap::new();

    loop {
        // Poll for key with 20ms timeout (50Hz effective rate)
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                match kind {
                    KeyEventKind::Press | KeyEventKind::Repeat => {}
                    // terminals that report releases drop the key right away
                    KeyEventKind::Release => {
                        held.remove(&code);
                        continue;
                    }
                }

                match code {
                    // Speed control
                    KeyCode::Char('r') => {
                        speed_idx = (speed_idx + 1).min(2);
                        print_speed(speed_idx);
                    }
                    KeyCode::Char('f') => {
                        speed_idx = speed_idx.saturating_sub(1);
                        print_speed(speed_idx);
                    }

                    // Quit
                    KeyCode::Char('q') | KeyCode::Esc => break,

                    _ => {
                        held.insert(code, Instant::now());
                    }
                }
            }
        }

        // Each key times out on its own, so a repeating key never keeps
        // another one latched
        held.retain(|_, pressed_at| pressed_at.elapsed() <= timeout);
        let pads = pads_from_keys(held.keys(), SPEEDS[speed_idx]);

        // Always publish at ~50Hz
        publisher.put(serde_json::to_string(&pads)?).await?;
    }

    Ok(())
}

/// Build both pads from scratch out of the keys currently held
fn pads_from_keys<'a>(keys: impl Iterator<Item = &'a KeyCode>, speed: f32) -> Gamepads {
    let mut pads = Gamepads::default();
    let driver = &mut pads.driver;
    let operator = &mut pads.operator;

    for code in keys {
        match code {
            // Driver sticks (y axis is positive toward the operator)
            KeyCode::Char('w') => driver.left_stick_y = -speed,
            KeyCode::Char('s') => driver.left_stick_y = speed,
            KeyCode::Char('a') => driver.left_stick_x = -speed,
            KeyCode::Char('d') => driver.left_stick_x = speed,
            KeyCode::Char('z') => driver.right_stick_x = -speed,
            KeyCode::Char('x') => driver.right_stick_x = speed,

            // Driver buttons
            KeyCode::Up => driver.dpad_up = true,
            KeyCode::Down => driver.dpad_down = true,
            KeyCode::Char('[') => driver.left_bumper = true,
            KeyCode::Char(']') => driver.right_bumper = true,

            // Operator
            KeyCode::Char('t') => operator.dpad_up = true,
            KeyCode::Char('g') => operator.dpad_down = true,
            KeyCode::Char('h') => operator.dpad_left = true,
            KeyCode::Char('i') => operator.right_trigger = 1.0,
            KeyCode::Char('o') => operator.left_trigger = 1.0,
            KeyCode::Char('1') => operator.x = true,
            KeyCode::Char('2') => operator.y = true,
            KeyCode::Char('3') => operator.b = true,
            KeyCode::Char(' ') => operator.left_bumper = true,
            KeyCode::Char('p') => operator.right_bumper = true,
            KeyCode::Backspace => operator.back = true,

            _ => {}
        }
    }
    pads
}

fn print_speed(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Speed: {}", label);
}
