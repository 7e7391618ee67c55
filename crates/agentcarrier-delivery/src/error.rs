/// Errors that can occur in delivery operations.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] agentcarrier_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] agentcarrier_frame::FrameError),

    /// The command router could not be read or updated.
    #[error("command router unavailable: {0}")]
    Router(String),

    /// The reception server is already running.
    #[error("reception server for '{0}' is already running")]
    AlreadyRunning(String),

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker: {0}")]
    Spawn(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DeliveryError>;
