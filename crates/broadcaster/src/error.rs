//! Broadcaster error types

use contracts::ContractError;
use thiserror::Error;

/// Broadcaster-specific errors
#[derive(Debug, Error)]
pub enum BroadcastError {
    /// Rejected before any state change (bad identifier length)
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// The radio refused to start advertising; the broadcaster is back in `Idle`
    #[error("start advertising failed (generation {generation}): {source}")]
    StartFailed {
        generation: u64,
        #[source]
        source: ContractError,
    },
}

impl BroadcastError {
    /// True for the fail-fast validation case
    pub fn is_invalid_length(&self) -> bool {
        matches!(self, Self::Contract(ContractError::InvalidLength { .. }))
    }
}
