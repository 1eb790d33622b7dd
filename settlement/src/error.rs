//! Error types for the settlement engine

use thiserror::Error;

/// Result type for settlement operations
pub type Result<T> = std::result::Result<T, Error>;

/// Settlement errors
#[derive(Error, Debug)]
pub enum Error {
    /// Validation failure (rejected before any write)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Ledger/storage error
    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger_core::Error),

    /// Contention retries exhausted; the trip remains unsettled
    #[error("Settlement retries exhausted after {attempts} attempts for trip {trip_id}")]
    RetryExhausted {
        /// Trip that could not be settled
        trip_id: String,
        /// Attempts made
        attempts: u32,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether a later retry may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::RetryExhausted { .. } => true,
            Error::Ledger(e) => e.is_retryable(),
            _ => false,
        }
    }
}
