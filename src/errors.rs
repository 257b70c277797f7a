//! Coordination Layer Error Hierarchy
//!
//! Defines error types for the distributed coordination primitives,
//! categorized by subsystem and operational concerns.

use std::time::Duration;

use config::ConfigError;

use crate::LeaseId;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Backing-store failures (transport, lease bookkeeping, watch streams)
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Ring rotation failures and control-flow signals
    #[error(transparent)]
    Ring(#[from] RingError),

    /// Lease-monitor lifecycle failures
    #[error(transparent)]
    Monitor(#[from] MonitorError),

    /// Configuration validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The caller's cancellation token fired before the operation completed
    #[error("operation cancelled")]
    Cancelled,

    /// Unrecoverable failures requiring caller intervention
    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl Error {
    /// `true` for outcomes that are normal control flow rather than faults.
    pub fn is_empty_ring(&self) -> bool {
        matches!(self, Error::Ring(RingError::Empty))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Keep-alive or revoke issued against a lease the store does not know
    #[error("lease {0} not found")]
    LeaseNotFound(LeaseId),

    /// The raw watch stream closed before the caller cancelled it
    #[error("watch subscription closed")]
    WatchClosed,

    /// Malformed key submitted to the store
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The store cannot currently serve requests
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RingError {
    /// No live entries under the ring's prefix. Expected whenever no work is
    /// queued; callers treat this as "nothing to do", not as a fault.
    #[error("ring contains no entries")]
    Empty,

    /// A ring entry's payload could not be decoded
    #[error("malformed ring entry: {0}")]
    InvalidEntry(String),
}

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Requested TTL is below the configured minimum
    #[error("monitor ttl {0:?} is below the configured minimum")]
    InvalidTtl(Duration),

    /// The marker key's recorded TTL could not be decoded
    #[error("corrupt monitor marker: {0}")]
    MarkerCorrupt(String),
}
