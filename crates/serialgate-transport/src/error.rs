/// Errors that can occur while discovering or talking to serial ports.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to enumerate serial ports on this host.
    #[error("failed to enumerate serial ports: {0}")]
    Enumerate(String),

    /// Failed to open the named port.
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        source: std::io::Error,
    },

    /// The named port is not among the available ports.
    #[error("serial port not found: {0}")]
    NotFound(String),

    /// An I/O error occurred on the serial stream.
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
