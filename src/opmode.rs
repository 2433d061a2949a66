// Control-cycle contract between the control core and the surrounding application
//
// One logical thread: the core runs a cycle, then calls `idle()` which flushes
// commands, waits for the next period and samples fresh input. Blocking
// operations (timed drive steps, the dump delay, the lift wait) are loops of
// `idle()` calls, so a stop request is seen at every cycle boundary.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::hal::Actuators;
use crate::messages::Gamepads;
use crate::telemetry::Telemetry;

pub trait OpMode {
    type Hardware: Actuators;

    fn hardware(&mut self) -> &mut Self::Hardware;

    /// Input sampled at the start of the current cycle
    fn gamepads(&self) -> Gamepads;

    /// False once the process has been asked to stop
    fn is_active(&self) -> bool;

    fn telemetry(&mut self) -> &mut Telemetry;

    /// End the current cycle and wait for the next one
    fn idle(&mut self) -> impl Future<Output = ()>;
}

/// Spend `duration` in idle cycles, running `each_cycle` right before every
/// `idle()`. Returns false if a stop request cut it short.
pub async fn wait_for<O: OpMode>(
    op: &mut O,
    duration: Duration,
    mut each_cycle: impl FnMut(&mut O),
) -> bool {
    let started = Instant::now();
    while started.elapsed() < duration {
        if !op.is_active() {
            return false;
        }
        each_cycle(op);
        op.idle().await;
    }
    true
}
