// Loop timing, topics, actuator tuning
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Gamepad watchdog: older input is replaced by a neutral pad
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Hardware feedback older than this makes reads fail
pub const FEEDBACK_TIMEOUT: Duration = Duration::from_millis(500);

// Zenoh topics
pub const TOPIC_CMD_GAMEPADS: &str = "robot/cmd/gamepads"; // operator input
pub const TOPIC_STATE_ACTUATORS: &str = "robot/state/actuators"; // hardware feedback
pub const TOPIC_RT_ACTUATORS: &str = "robot/rt/actuators"; // actuation
pub const TOPIC_TELEMETRY: &str = "robot/state/telemetry";
pub const TOPIC_HEALTH: &str = "robot/state/health";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Tuning for one position-held actuator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoldConfig {
    /// Power budget kept on the actuator while it holds, in [0, 1]
    pub holding_power: f32,
    /// Ticks moved per jog command
    pub increment_per_tick: i32,
    pub min_position: Option<i32>,
    pub max_position: Option<i32>,
}

impl HoldConfig {
    pub const fn new(holding_power: f32, increment_per_tick: i32) -> Self {
        Self {
            holding_power,
            increment_per_tick,
            min_position: None,
            max_position: None,
        }
    }

    pub const fn with_limits(mut self, min_position: i32, max_position: i32) -> Self {
        self.min_position = Some(min_position);
        self.max_position = Some(max_position);
        self
    }

    /// Clamp a target into the configured travel
    pub fn clamp(&self, position: i32) -> i32 {
        let position = self.min_position.map_or(position, |min| position.max(min));
        self.max_position.map_or(position, |max| position.min(max))
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        // zero power would let a held actuator sag
        if !self.holding_power.is_finite() || self.holding_power <= 0.0 || self.holding_power > 1.0 {
            return Err(ConfigError::Invalid(format!(
                "{name}.holding_power must be in (0, 1], got {}",
                self.holding_power
            )));
        }
        if self.increment_per_tick < 0 {
            return Err(ConfigError::Invalid(format!(
                "{name}.increment_per_tick must not be negative, got {}",
                self.increment_per_tick
            )));
        }
        if let (Some(min), Some(max)) = (self.min_position, self.max_position) {
            if min > max {
                return Err(ConfigError::Invalid(format!(
                    "{name}: min_position {min} exceeds max_position {max}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for HoldConfig {
    fn default() -> Self {
        Self::new(1.0, 100)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Right-side motors are mounted mirrored
    pub invert_right: bool,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self { invert_right: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmConfig {
    pub hold: HoldConfig,
    /// Safe half-up target used by the half-hold mode
    pub half_position: i32,
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self {
            hold: HoldConfig::new(0.3, 10),
            half_position: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub power: f32,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self { power: 0.4 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketConfig {
    pub neutral: f32,
    pub tilt: f32,
    pub drop: f32,
    pub dump_delay_ms: u64,
}

impl BucketConfig {
    pub fn dump_delay(&self) -> Duration {
        Duration::from_millis(self.dump_delay_ms)
    }
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            neutral: 0.42,
            tilt: 0.3,
            drop: 1.0,
            dump_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WristConfig {
    pub initial: f32,
    /// Position change per cycle while a bumper is held
    pub step: f32,
}

impl Default for WristConfig {
    fn default() -> Self {
        Self {
            initial: 0.5,
            step: 0.02,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutonomousConfig {
    /// Lift height to raise to before the dump
    pub lift_target: i32,
    /// Arm posture held during the routine
    pub arm_target: i32,
}

impl Default for AutonomousConfig {
    fn default() -> Self {
        Self {
            lift_target: 13400,
            arm_target: 70,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    pub drive: DriveConfig,
    pub lift: HoldConfig,
    pub arm: ArmConfig,
    pub sweep: SweepConfig,
    pub bucket: BucketConfig,
    pub wrist: WristConfig,
    pub autonomous: AutonomousConfig,
}

impl RobotConfig {
    /// Load from a JSON file; missing fields keep their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: RobotConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.lift.validate("lift")?;
        self.arm.hold.validate("arm.hold")?;

        let unit = [
            ("bucket.neutral", self.bucket.neutral),
            ("bucket.tilt", self.bucket.tilt),
            ("bucket.drop", self.bucket.drop),
            ("wrist.initial", self.wrist.initial),
            ("sweep.power", self.sweep.power),
        ];
        for (name, value) in unit {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }
        if !self.wrist.step.is_finite() || self.wrist.step <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "wrist.step must be positive, got {}",
                self.wrist.step
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RobotConfig::default();
        config.validate().unwrap();
        assert_eq!(config.lift.holding_power, 1.0);
        assert_eq!(config.arm.hold.holding_power, 0.3);
        assert_eq!(config.bucket.dump_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = RobotConfig::from_json(r#"{"lift":{"max_position":14000},"sweep":{"power":0.6}}"#)
            .unwrap();
        assert_eq!(config.lift.max_position, Some(14000));
        assert_eq!(config.lift.holding_power, 1.0);
        assert_eq!(config.sweep.power, 0.6);
        assert_eq!(config.arm.half_position, 100);
    }

    #[test]
    fn test_rejects_bad_holding_power() {
        let err = RobotConfig::from_json(r#"{"arm":{"hold":{"holding_power":1.5}}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_zero_holding_power() {
        let err = RobotConfig::from_json(r#"{"lift":{"holding_power":0.0}}"#).unwrap_err();
        assert!(err.to_string().contains("lift.holding_power"));
    }

    #[test]
    fn test_rejects_negative_increment() {
        let err = RobotConfig::from_json(r#"{"arm":{"hold":{"increment_per_tick":-10}}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("arm.hold.increment_per_tick"));
    }

    #[test]
    fn test_rejects_inverted_limits() {
        let err = RobotConfig::from_json(r#"{"lift":{"min_position":10,"max_position":0}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("min_position"));
    }

    #[test]
    fn test_clamp() {
        let hold = HoldConfig::new(1.0, 100).with_limits(0, 1000);
        assert_eq!(hold.clamp(-50), 0);
        assert_eq!(hold.clamp(500), 500);
        assert_eq!(hold.clamp(5000), 1000);
        assert_eq!(HoldConfig::default().clamp(-50), -50);
    }
}
