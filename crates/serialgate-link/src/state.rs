use std::fmt;

/// Lifecycle of the serial link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// Port opened, challenge not yet sent.
    Connecting,
    AwaitingChallengeResponse,
    Connected,
    /// Heartbeat responses stopped arriving. Advisory only.
    Suspect,
}

impl ConnectionState {
    /// Handshake completed and the link has not dropped since.
    pub fn is_established(self) -> bool {
        matches!(self, Self::Connected | Self::Suspect)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingChallengeResponse => "awaiting-challenge-response",
            Self::Connected => "connected",
            Self::Suspect => "suspect",
        };
        f.write_str(name)
    }
}
