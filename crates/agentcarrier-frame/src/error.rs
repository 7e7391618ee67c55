/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The buffer is shorter than a frame header.
    #[error("truncated frame ({len} bytes, header needs {need})")]
    Truncated { len: usize, need: usize },

    /// The frame header contains an invalid magic number.
    #[error("invalid frame magic (expected 0x4143 \"AC\")")]
    InvalidMagic,

    /// The frame was written by an incompatible format version.
    #[error("unsupported frame version {0}")]
    UnsupportedVersion(u8),

    /// The kind tag is not one of log, segment, yaml or command.
    #[error("unknown frame kind tag {0}")]
    UnknownKind(u8),

    /// The declared payload length disagrees with the bytes received.
    #[error("payload length mismatch (header declares {declared} bytes, got {actual})")]
    LengthMismatch { declared: usize, actual: usize },

    /// The provider id does not fit the header field or is not valid text.
    #[error("invalid provider id: {0}")]
    InvalidProviderId(String),

    /// The payload was expected to be text but is not valid UTF-8.
    #[error("payload is not valid UTF-8: {0}")]
    InvalidText(#[from] std::str::Utf8Error),

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// True for errors caused by malformed or truncated frame content.
    pub fn is_decoding(&self) -> bool {
        matches!(
            self,
            FrameError::Truncated { .. }
                | FrameError::InvalidMagic
                | FrameError::UnsupportedVersion(_)
                | FrameError::UnknownKind(_)
                | FrameError::LengthMismatch { .. }
                | FrameError::InvalidProviderId(_)
                | FrameError::InvalidText(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
