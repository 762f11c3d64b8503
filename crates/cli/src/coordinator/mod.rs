//! Coordinator - operator commands in, packets out.

mod command;
mod orchestrator;
mod stats;

pub use command::{OperatorCommand, ShowCommand};
pub use orchestrator::{Coordinator, Transport};
pub use stats::CoordinatorStats;
