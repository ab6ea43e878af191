use std::time::Duration;

/// Errors that can occur while supervising the serial link.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] serialgate_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] serialgate_frame::FrameError),

    /// Routing configuration error.
    #[error("route error: {0}")]
    Route(#[from] serialgate_route::RouteError),

    /// A link setting that can never work.
    #[error("invalid link config: {0}")]
    InvalidConfig(String),

    /// Every candidate port failed to open or validate.
    #[error("no serial port available after {attempts} failed attempts")]
    NoPortsAvailable { attempts: usize },

    /// The device did not acknowledge the challenge in time.
    #[error("handshake on {port} timed out after {after:?}")]
    HandshakeTimeout { port: String, after: Duration },

    /// The link dropped after it was established.
    #[error("link disconnected: {0}")]
    Disconnected(String),

    /// The gateway worker has exited.
    #[error("gateway is not running")]
    GatewayStopped,
}

pub type Result<T> = std::result::Result<T, LinkError>;
