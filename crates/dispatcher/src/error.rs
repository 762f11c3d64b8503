//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// The batch worker has exited (dispatcher shut down)
    #[error("dispatcher worker stopped")]
    WorkerStopped,

    /// Radio or validation error (from contract)
    #[error("device error: {0}")]
    Contract(#[from] contracts::ContractError),
}
