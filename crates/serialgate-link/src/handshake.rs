use std::time::{Duration, Instant};

use crate::control::{ControlFrame, HandshakeConfig};

/// Challenge-response state for one freshly opened port.
///
/// Rebuilt from scratch on every connection.
#[derive(Debug, Clone)]
pub struct Handshake {
    started: Instant,
    timeout: Duration,
    responded: bool,
}

impl Handshake {
    /// Arm the response window. The challenge goes out at `now`.
    pub fn start(now: Instant, timeout: Duration) -> Self {
        Self {
            started: now,
            timeout,
            responded: false,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.started + self.timeout
    }

    /// Feed an inbound payload. Returns true on the frame that completes the
    /// handshake; later acknowledgements and late arrivals are ignored.
    pub fn observe(&mut self, payload: &[u8], now: Instant, config: &HandshakeConfig) -> bool {
        if self.responded || self.is_expired(now) {
            return false;
        }
        if ControlFrame::classify(payload, config) == Some(ControlFrame::ChallengeAck) {
            self.responded = true;
            return true;
        }
        false
    }

    /// Deadline passed without a response.
    pub fn is_expired(&self, now: Instant) -> bool {
        !self.responded && now >= self.deadline()
    }

    pub fn responded(&self) -> bool {
        self.responded
    }
}
