use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

/// Failures surfaced by graph backends and by backend resolution.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The transport could not establish or keep the connection
    /// (refused, timed out, reset).
    #[error("graph RPC connection error: {0}")]
    Connection(#[source] io::Error),

    /// The peer closed the stream before a response line arrived.
    #[error("graph RPC connection closed")]
    ConnectionClosed,

    /// The peer answered `ok: false`; the message is the peer's verbatim.
    #[error("{0}")]
    Remote(String),

    /// The peer answered with something that is not a valid response envelope,
    /// or with a result of the wrong shape.
    #[error("malformed graph RPC response: {0}")]
    Protocol(String),

    #[error("invalid graph RPC endpoint '{0}': expected host:port")]
    InvalidEndpoint(String),

    /// A serialized snapshot could not be reconstructed.
    #[error("snapshot {}: {message}", path.display())]
    Snapshot { path: PathBuf, message: String },

    /// Building a local index failed.
    #[error(transparent)]
    Index(#[from] anyhow::Error),
}

impl GraphError {
    pub fn snapshot(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Snapshot {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Availability failures: the remote side could not be reached or went away.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::ConnectionClosed)
    }
}
