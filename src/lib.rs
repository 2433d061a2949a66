// Motion-control core for a mecanum base with a lift, an arm, a sweep and servos

pub mod arbiter;
pub mod autonomous;
pub mod config;
pub mod hal;
pub mod input;
pub mod messages;
pub mod motion;
pub mod opmode;
pub mod runtime;
pub mod teleop;
pub mod telemetry;
