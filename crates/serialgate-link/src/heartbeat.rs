use std::time::{Duration, Instant};

use crate::error::{LinkError, Result};

/// Default spacing between heartbeat probes.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(15_000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatConfig {
    pub interval: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

impl HeartbeatConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(LinkError::InvalidConfig(
                "heartbeatInterval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// True when `elapsed` lies strictly between 1.5x and 2.5x `interval`.
pub fn is_suspect(elapsed: Duration, interval: Duration) -> bool {
    let lower = interval.saturating_mul(3) / 2;
    let upper = interval.saturating_mul(5) / 2;
    elapsed > lower && elapsed < upper
}

/// Outcome of a scheduled probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeCheck {
    Healthy,
    /// The window was hit on this probe.
    Suspect { elapsed: Duration },
}

/// Liveness watchdog for an established link.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    interval: Duration,
    last_ack: Instant,
    next_probe: Instant,
    suspect: bool,
}

impl Heartbeat {
    /// Start watching at the moment the link became connected.
    pub fn start(now: Instant, interval: Duration) -> Self {
        Self {
            interval,
            last_ack: now,
            next_probe: now + interval,
            suspect: false,
        }
    }

    pub fn next_probe(&self) -> Instant {
        self.next_probe
    }

    /// Called when a probe is due. Checks the elapsed time since the last
    /// acknowledgement, then schedules the next probe.
    pub fn on_probe(&mut self, now: Instant) -> ProbeCheck {
        self.next_probe = now + self.interval;
        let elapsed = now.saturating_duration_since(self.last_ack);
        if is_suspect(elapsed, self.interval) {
            self.suspect = true;
            return ProbeCheck::Suspect { elapsed };
        }
        ProbeCheck::Healthy
    }

    /// Record a probe acknowledgement. Returns true if this cleared a
    /// suspect flag.
    pub fn on_ack(&mut self, now: Instant) -> bool {
        self.last_ack = now;
        std::mem::replace(&mut self.suspect, false)
    }

    pub fn is_suspect(&self) -> bool {
        self.suspect
    }

    pub fn last_ack(&self) -> Instant {
        self.last_ack
    }
}
