//! Error types

use std::io;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// docwire errors
#[derive(Debug, Error)]
pub enum Error {
    /// Transport I/O failure (socket write/read, broken framing)
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The session factory could not produce a usable session
    #[error("failed to establish session: {0}")]
    Establish(String),

    /// Operation attempted on a handle that holds no session
    #[error("connection {connection_id} to {descriptor} is closed")]
    ConnectionClosed {
        /// Connection handle id
        connection_id: u64,
        /// Password-free connection descriptor
        descriptor: String,
    },

    /// `open()` called on a handle that already holds a session
    #[error("connection {connection_id} to {descriptor} is already open")]
    AlreadyOpen {
        /// Connection handle id
        connection_id: u64,
        /// Password-free connection descriptor
        descriptor: String,
    },

    /// Handle has been disposed and cannot be reopened
    #[error("connection {connection_id} has been disposed")]
    Disposed {
        /// Connection handle id
        connection_id: u64,
    },

    /// Invalid configuration or connection string
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Protocol violation that leaves the stream framing intact
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Document could not be built or deserialized
    #[error("document error: {0}")]
    Document(#[from] serde_json::Error),

    /// Server reported a query failure
    #[error("server error {code}: {message}")]
    Server {
        /// Server error code
        code: i32,
        /// Server error message
        message: String,
    },
}

impl Error {
    /// Whether this error came from the transport itself.
    ///
    /// These are the failures after which the session can no longer be
    /// trusted, and the ones that make a [`Connection`](crate::Connection)
    /// replace its session.
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Error::Io(_))
    }

    /// Whether retrying the same operation on the same handle may succeed
    pub fn is_retriable(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Establish(_))
    }

    /// Get error category for metrics labels
    pub fn category(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Establish(_) => "establish",
            Error::ConnectionClosed { .. } => "connection_closed",
            Error::AlreadyOpen { .. } => "already_open",
            Error::Disposed { .. } => "disposed",
            Error::Config(_) => "config",
            Error::Protocol(_) => "protocol",
            Error::Document(_) => "document",
            Error::Server { .. } => "server",
        }
    }
}
