// Mode arbitration between teleop and the autonomous routine
//
// Autonomous owns every actuator while it runs; teleop handlers are skipped
// for those cycles and resume from whatever the actuators were last holding.

use tracing::{debug, info};

use crate::input::EdgeDetector;

#[derive(Debug, Default)]
pub struct ModeArbiter {
    autonomous_active: bool,
    invoke: EdgeDetector,
}

impl ModeArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the invoke button level. Returns true when a new autonomous run is
    /// authorized; the caller must report back through `complete()`.
    pub fn request_autonomous(&mut self, level: bool) -> bool {
        if !self.invoke.rising(level) {
            return false;
        }
        if self.autonomous_active {
            debug!("Autonomous already running, ignoring invoke");
            return false;
        }
        info!("Autonomous authorized");
        self.autonomous_active = true;
        true
    }

    pub fn complete(&mut self) {
        if self.autonomous_active {
            info!("Autonomous finished, teleop resumes");
        }
        self.autonomous_active = false;
    }

    /// Teleop handlers must not touch actuators while this is true
    pub fn autonomous_active(&self) -> bool {
        self.autonomous_active
    }
}
