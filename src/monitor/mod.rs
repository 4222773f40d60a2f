pub mod monitor_loop;
pub mod state;
pub mod status;
pub mod tick;

#[cfg(test)]
pub(crate) mod testing;

pub use monitor_loop::{MonitorLoop, MonitorLoopBuilder};
pub use state::MonitorState;
pub use status::MonitorStatus;
pub use tick::{TickEngine, TickOutcome};
