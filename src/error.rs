//! Crate-wide error type.
//!
//! Mirrors the flat, named-variant style of the teacher's `DbError`: one
//! variant per error surface in the durability spine rather than a generic
//! catch-all, so callers can match on the kind that matters to them.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// WAL buffer admission waited longer than the reject threshold.
    #[error("buffer exhausted while registering WAL node {0:?}")]
    BufferExhausted(String),

    /// WAL force-sync or close failed for a single node; callers log and
    /// continue the sweep rather than propagate.
    #[error("WAL IO failure on node {node:?}: {source}")]
    IoFailure {
        node: String,
        #[source]
        source: std::io::Error,
    },

    /// A heartbeat or vote RPC failed to send.
    #[error("transport failure to {0:?}: {1}")]
    TransportFailure(String, String),

    /// An interruptible sleep was woken by cancellation.
    #[error("interrupted")]
    Interrupted,

    #[error("index out of range: {index} (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("required collaborator unavailable at startup: {0}")]
    StartupFailure(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, DbError>;
