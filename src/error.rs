use std::io;

use thiserror::Error;

use crate::protocol::ProtocolStatus;

/// Errors that can occur while executing a script on a FastCGI responder.
///
/// Every variant is produced at the session boundary: by the time a caller
/// sees one of these, the socket has already been closed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FpmError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Failed to connect to {target}: {source}")]
    Connection {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write to FastCGI stream: {0}")]
    TransportWrite(#[source] io::Error),

    #[error("Failed to read from FastCGI stream: {0}")]
    TransportRead(#[source] io::Error),

    #[error(
        "FastCGI stream ended mid-record: expected {expected} bytes, got {got}"
    )]
    ProtocolTruncated { expected: usize, got: usize },

    #[error("FastCGI payload too large to encode: {0} bytes")]
    ProtocolEncoding(usize),

    #[error("Malformed FastCGI record: {0}")]
    MalformedRecord(String),

    #[error("FastCGI responder rejected the request: {0}")]
    Rejected(ProtocolStatus),

    #[error("Session operation not valid in state {0}")]
    InvalidState(&'static str),

    #[error("Worker pool has been shut down")]
    PoolShutdown,

    #[error("Worker dropped the request before completing it")]
    WorkerLost,
}

impl FpmError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// True for failures that happened before or while connecting.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// True for wire-format violations in either direction.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Self::ProtocolTruncated { .. }
                | Self::ProtocolEncoding(_)
                | Self::MalformedRecord(_)
                | Self::Rejected(_)
        )
    }
}
