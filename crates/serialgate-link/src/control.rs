use std::time::Duration;

/// Default challenge sent when a port is opened.
pub const DEFAULT_CHALLENGE: &str = "hello";
/// Default prefix identifying the device's challenge response.
pub const DEFAULT_ACK_PREFIX: &str = "ack";
/// Default heartbeat probe payload.
pub const DEFAULT_PROBE: &str = "ping";
/// Default prefix identifying a heartbeat response.
pub const DEFAULT_PROBE_ACK_PREFIX: &str = "pong";

/// Default window for the challenge response.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(3000);

/// Protocol payloads exchanged with the device outside the data path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeConfig {
    pub challenge: String,
    pub ack_prefix: String,
    pub probe: String,
    pub probe_ack_prefix: String,
    pub timeout: Duration,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            challenge: DEFAULT_CHALLENGE.to_string(),
            ack_prefix: DEFAULT_ACK_PREFIX.to_string(),
            probe: DEFAULT_PROBE.to_string(),
            probe_ack_prefix: DEFAULT_PROBE_ACK_PREFIX.to_string(),
            timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

/// A protocol frame consumed by the link instead of the decode pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFrame {
    ChallengeAck,
    ProbeAck,
}

impl ControlFrame {
    /// Classify an inbound payload. Data frames yield `None`.
    ///
    /// A prefix only matches as a whole word: it must end the payload or be
    /// followed by a byte that cannot continue a field name, so `ack:7` is a
    /// control frame and `ackCount:3` is data.
    pub fn classify(payload: &[u8], config: &HandshakeConfig) -> Option<Self> {
        if matches_prefix(payload, &config.probe_ack_prefix) {
            Some(Self::ProbeAck)
        } else if matches_prefix(payload, &config.ack_prefix) {
            Some(Self::ChallengeAck)
        } else {
            None
        }
    }
}

fn matches_prefix(payload: &[u8], prefix: &str) -> bool {
    if prefix.is_empty() {
        return false;
    }
    match payload.strip_prefix(prefix.as_bytes()) {
        Some([]) => true,
        Some([next, ..]) => !(next.is_ascii_alphanumeric() || *next == b'_' || *next == b'-'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_defaults() {
        let config = HandshakeConfig::default();
        assert_eq!(
            ControlFrame::classify(b"ack:node-7", &config),
            Some(ControlFrame::ChallengeAck)
        );
        assert_eq!(
            ControlFrame::classify(b"pong", &config),
            Some(ControlFrame::ProbeAck)
        );
        assert_eq!(ControlFrame::classify(b"temp:21", &config), None);
        assert_eq!(ControlFrame::classify(b"ac", &config), None);
    }

    #[test]
    fn data_fields_sharing_a_prefix_are_not_control() {
        let config = HandshakeConfig::default();
        assert_eq!(ControlFrame::classify(b"ackCount:3", &config), None);
        assert_eq!(ControlFrame::classify(b"pongs:1", &config), None);
        assert_eq!(ControlFrame::classify(b"ack_id:4", &config), None);
        assert_eq!(
            ControlFrame::classify(b"ack\0\0\0", &config),
            Some(ControlFrame::ChallengeAck)
        );
        assert_eq!(
            ControlFrame::classify(b"pong;id:01A2", &config),
            Some(ControlFrame::ProbeAck)
        );
    }

    #[test]
    fn empty_prefix_never_matches() {
        let config = HandshakeConfig {
            probe_ack_prefix: String::new(),
            ..HandshakeConfig::default()
        };
        assert_eq!(ControlFrame::classify(b"pong", &config), None);
    }
}
