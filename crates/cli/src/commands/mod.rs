//! Command implementations.

mod encode;
mod info;
mod run;
mod validate;

pub use encode::run_encode;
pub use info::run_info;
pub use run::run_coordinator;
pub use validate::run_validate;
