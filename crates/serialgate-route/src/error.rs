/// Errors raised while configuring routing.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("invalid router config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, RouteError>;

/// A sink failed to accept a publish.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The backend is unreachable.
    #[error("sink unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl SinkError {
    /// Connectivity failures are the ones subject to log muting.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Io(_))
    }
}
