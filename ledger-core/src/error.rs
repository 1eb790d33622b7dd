//! Error types for the ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Trip not found
    #[error("Trip not found: {0}")]
    TripNotFound(String),

    /// Invalid trip data or lifecycle transition
    #[error("Invalid trip: {0}")]
    InvalidTrip(String),

    /// Settlement commit refused: the trip already carries settled_at
    #[error("Trip already settled: {0}")]
    AlreadySettled(String),

    /// Ledger snapshot version mismatch (concurrent writer)
    #[error("Ledger conflict for driver {driver_id}: expected version {expected}, found {found}")]
    LedgerConflict {
        /// Driver whose ledger was contended
        driver_id: String,
        /// Version the writer read
        expected: u64,
        /// Version found at commit time
        found: u64,
    },

    /// Invariant violation (negative balance/debt, replay mismatch)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Invalid payout request
    #[error("Invalid payout: {0}")]
    InvalidPayout(String),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the operation is safe to retry from a fresh read
    ///
    /// `AlreadySettled` is retryable in the same sense as a conflict: the
    /// caller's next read observes the committed settlement and resolves
    /// the duplicate as a no-op.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::LedgerConflict { .. } | Error::AlreadySettled(_)
        )
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
