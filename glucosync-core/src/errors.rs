//! Error Types for the Reconciliation Pipeline
//!
//! ## Error Categories
//!
//! Remote collaborators fail in four distinct ways, and the pipeline treats
//! each one as a degraded-but-defined state change rather than an abort:
//!
//! ### Remote Failures (`RemoteError`)
//! - `Transport`: service unreachable, timeout, connection reset
//! - `Decode`: the payload does not match the expected schema
//! - `Unauthorized`: explicit 401 from the service
//! - `DataQuality`: the service answered but flagged an error inside the body
//!
//! ### Input Failures (`SnapshotError`)
//! - Identifier fields with a length other than zero or the fixed size
//! - A trend series with no entries (there is no "latest" reading)
//!
//! ### Pipeline Failures (`PipelineError`)
//! - The state owner task has shut down. This is the only condition under
//!   which a cycle returns `Err`.
//!
//! ## Handling Strategy
//!
//! ```rust
//! use glucosync_core::RemoteError;
//!
//! fn describe(err: &RemoteError) -> &'static str {
//!     match err {
//!         RemoteError::Transport(_) => "connection failed",
//!         RemoteError::Decode(_) => "unexpected response",
//!         RemoteError::Unauthorized => "not authorized",
//!         RemoteError::DataQuality(_) => "server reported an error",
//!     }
//! }
//! # assert_eq!(describe(&RemoteError::Unauthorized), "not authorized");
//! ```

use thiserror_no_std::Error;

/// Result type for remote collaborator calls
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Failures reported by a remote collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Remote unreachable, timed out, or the connection dropped
    #[error("transport failure: {0}")]
    Transport(String),

    /// Response body does not match the expected schema
    #[error("decode failure: {0}")]
    Decode(String),

    /// Explicit 401 response
    #[error("not authorized")]
    Unauthorized,

    /// Successful response carrying an error indicator in the payload
    #[error("server error: {0}")]
    DataQuality(String),
}

impl RemoteError {
    /// Short label used in logs and notices
    pub const fn kind(&self) -> &'static str {
        match self {
            RemoteError::Transport(_) => "connection failed",
            RemoteError::Decode(_) => "decoding failed",
            RemoteError::Unauthorized => "not authorized",
            RemoteError::DataQuality(_) => "server error",
        }
    }
}

/// Malformed transport input
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotError {
    /// Identifier present but not of the fixed length
    #[error("{field} must be empty or {expected} bytes, got {actual}")]
    IdentifierLength {
        /// Which identifier field was rejected
        field: &'static str,
        /// Fixed length the sensor class reports
        expected: usize,
        /// Length actually received
        actual: usize,
    },

    /// The trend series has no latest entry
    #[error("trend series is empty")]
    EmptyTrend,
}

/// Configuration rejected by validation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Low threshold must sit strictly below the high one
    #[error("alarm low threshold {low} must be below high threshold {high}")]
    ThresholdOrder {
        /// Configured low threshold
        low: i32,
        /// Configured high threshold
        high: i32,
    },

    /// A capacity or count that must be positive is zero
    #[error("{0} must be greater than zero")]
    ZeroCount(&'static str),

    /// A tag used to identify pipeline-originated entries is empty
    #[error("{0} must not be empty")]
    EmptyTag(&'static str),
}

/// Failures that abort a reconciliation cycle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The task owning the canonical state has stopped
    #[error("state owner is no longer running")]
    StateOwnerGone,

    /// The sensor read handed in by the transport is malformed
    #[error("invalid sensor read: {0}")]
    InvalidSnapshot(#[from] SnapshotError),
}
