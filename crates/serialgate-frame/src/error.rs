/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Pending input grew past the configured limit without a frame boundary.
    #[error("no frame boundary within {max} buffered bytes ({size} discarded)")]
    BufferOverflow { size: usize, max: usize },

    /// The frame configuration cannot produce frames.
    #[error("invalid frame configuration: {0}")]
    InvalidConfig(String),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link was closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// The outbound queue no longer has a writer.
    #[error("outbound queue closed")]
    QueueClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
