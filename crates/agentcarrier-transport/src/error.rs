use std::path::PathBuf;

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The port descriptor is not of the form `<backend>:<address>`.
    #[error("invalid port descriptor '{port}': {reason}")]
    InvalidPort { port: String, reason: &'static str },

    /// The address is malformed for its backend.
    #[error("invalid {backend} address '{address}': {reason}")]
    InvalidAddress {
        backend: &'static str,
        address: String,
        reason: String,
    },

    /// The backend tag is unknown, or the backend lacks the requested side.
    #[error("unsupported backend '{backend}' for {operation}")]
    Unsupported {
        backend: String,
        operation: &'static str,
    },

    /// Failed to bind the receive endpoint.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to open or connect the send endpoint.
    #[error("failed to connect to {target}: {source}")]
    Connect {
        target: String,
        source: std::io::Error,
    },

    /// Writing a frame to an open transport failed.
    #[error("failed to send to {target}: {source}")]
    Send {
        target: String,
        source: std::io::Error,
    },

    /// A received message exceeds the endpoint capacity.
    #[error("message too large ({size} bytes, capacity {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// An I/O error occurred on the transport.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },
}

impl TransportError {
    /// True for descriptor or address parse failures.
    pub fn is_parse(&self) -> bool {
        matches!(
            self,
            TransportError::InvalidPort { .. } | TransportError::InvalidAddress { .. }
        )
    }
}

pub(crate) fn frame_to_io(err: agentcarrier_frame::FrameError) -> std::io::Error {
    match err {
        agentcarrier_frame::FrameError::Io(io) => io,
        other => std::io::Error::other(other.to_string()),
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
