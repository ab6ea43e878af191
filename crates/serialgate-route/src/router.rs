use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::{Map, Value};
use serialgate_schema::{DecodedFrame, SessionSignal};
use tracing::{debug, trace};

use crate::error::{Result, RouteError};

/// Internal pseudo-topic for gateway commands. Never published.
pub const COMMAND_TOPIC: &str = "_command";

/// Session routing configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Cap on counted rows per session.
    pub max_session_rows: usize,
    /// Topics allowed to reach the dispatcher. `None` activates every topic.
    pub active_topics: Option<BTreeSet<String>>,
    /// Key sessions by device address instead of a single shared session.
    pub multiplexed: bool,
    /// Identical replies from one address inside this window publish once.
    pub duplicate_window: Duration,
    /// Sessions idle longer than this are dropped by [`Router::expire`].
    pub address_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_session_rows: 64,
            active_topics: None,
            multiplexed: false,
            duplicate_window: Duration::from_millis(10_000),
            address_timeout: Duration::from_millis(60_000),
        }
    }
}

impl RouterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_session_rows == 0 {
            return Err(RouteError::InvalidConfig(
                "maxSessionRows must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether a topic may be published.
    pub fn is_active(&self, topic: &str) -> bool {
        if topic == COMMAND_TOPIC {
            return false;
        }
        match &self.active_topics {
            Some(active) => active.contains(topic),
            None => true,
        }
    }
}

/// One merged record bound for one topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishAction {
    pub topic: String,
    /// Device address, absent on a non-multiplexed link.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub record: Map<String, Value>,
}

impl PublishAction {
    pub fn new(topic: impl Into<String>, address: Option<String>, record: Map<String, Value>) -> Self {
        Self {
            topic: topic.into(),
            address,
            record,
        }
    }

    /// Payload handed to sinks: the record, tagged with the address when known.
    pub fn payload(&self) -> Value {
        let mut payload = self.record.clone();
        if let Some(address) = &self.address {
            payload
                .entry("address")
                .or_insert_with(|| Value::String(address.clone()));
        }
        Value::Object(payload)
    }
}

#[derive(Debug)]
struct DeviceSession {
    record: Map<String, Value>,
    topics: BTreeSet<String>,
    rows: usize,
    active: bool,
    last_seen: Instant,
}

impl DeviceSession {
    fn new(now: Instant) -> Self {
        Self {
            record: Map::new(),
            topics: BTreeSet::new(),
            rows: 0,
            active: false,
            last_seen: now,
        }
    }

    fn take(&mut self) -> (Map<String, Value>, BTreeSet<String>) {
        self.rows = 0;
        (
            std::mem::take(&mut self.record),
            std::mem::take(&mut self.topics),
        )
    }
}

/// Per-device accumulation and flush policy.
///
/// Owned by the single gateway worker; nothing here is shared.
#[derive(Debug)]
pub struct Router {
    config: RouterConfig,
    sessions: HashMap<String, DeviceSession>,
    recent: HashMap<(String, String), Instant>,
}

impl Router {
    pub fn new(config: RouterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            sessions: HashMap::new(),
            recent: HashMap::new(),
        })
    }

    /// Session key for a decoded frame.
    ///
    /// Non-multiplexed links share one session under the empty key.
    pub fn address_key(&self, decoded: &DecodedFrame) -> String {
        if self.config.multiplexed {
            decoded.address.clone().unwrap_or_default()
        } else {
            String::new()
        }
    }

    /// Merge a decoded frame into its session and return the flushes it caused.
    ///
    /// Frames carrying a session signal are never suppressed as duplicates,
    /// and a session start forgets the address's recent replies.
    pub fn ingest(&mut self, address: &str, decoded: &DecodedFrame, now: Instant) -> Vec<PublishAction> {
        if decoded.is_empty() {
            return Vec::new();
        }
        if self.config.multiplexed {
            if decoded.session == Some(SessionSignal::Start) {
                self.recent.retain(|(seen_address, _), _| seen_address.as_str() != address);
            }
            if decoded.session.is_none() && self.is_duplicate(address, decoded, now) {
                trace!(address, "duplicate reply suppressed");
                return Vec::new();
            }
        }

        let max_rows = self.config.max_session_rows;
        let session = self
            .sessions
            .entry(address.to_string())
            .or_insert_with(|| DeviceSession::new(now));
        session.last_seen = now;

        if decoded.session == Some(SessionSignal::Start) {
            if !session.record.is_empty() {
                debug!(address, fields = session.record.len(), "session restarted, stale fields dropped");
            }
            session.take();
            session.active = true;
        }

        let mut forced = false;
        for field in &decoded.fields {
            let topics: Vec<&String> = field
                .topics
                .iter()
                .filter(|t| self.config.is_active(t))
                .collect();
            if topics.is_empty() {
                trace!(address, field = %field.target_name, "no active topic, field dropped");
                continue;
            }

            session
                .record
                .insert(field.target_name.clone(), field.value.clone());
            session.topics.extend(topics.into_iter().cloned());
            if session.rows < max_rows {
                session.rows += 1;
            } else {
                trace!(address, rows = session.rows, "session row cap reached, field merged uncounted");
            }
            forced |= field.force_send;
        }

        let mut actions = Vec::new();
        let ended = decoded.session == Some(SessionSignal::End);
        if forced || ended {
            let (record, topics) = session.take();
            if !record.is_empty() {
                let address = (!address.is_empty()).then(|| address.to_string());
                actions.extend(
                    topics
                        .into_iter()
                        .map(|topic| PublishAction::new(topic, address.clone(), record.clone())),
                );
            }
        }
        if ended {
            self.sessions.remove(address);
            debug!(address, flushed = actions.len(), "session ended");
        }

        actions
    }

    fn is_duplicate(&mut self, address: &str, decoded: &DecodedFrame, now: Instant) -> bool {
        let signature = Value::Object(decoded.to_record()).to_string();
        let key = (address.to_string(), signature);
        let window = self.config.duplicate_window;

        if let Some(seen) = self.recent.get(&key) {
            if now.saturating_duration_since(*seen) < window {
                return true;
            }
        }
        self.recent.insert(key, now);
        if self.recent.len() > 1024 {
            self.recent
                .retain(|_, seen| now.saturating_duration_since(*seen) < window);
        }
        false
    }

    /// Drop sessions idle past the address timeout without flushing them.
    ///
    /// Returns the number of sessions removed.
    pub fn expire(&mut self, now: Instant) -> usize {
        let timeout = self.config.address_timeout;
        let before = self.sessions.len();
        self.sessions.retain(|address, session| {
            let keep = now.saturating_duration_since(session.last_seen) <= timeout;
            if !keep {
                debug!(address = %address, fields = session.record.len(), "session expired");
            }
            keep
        });

        let window = self.config.duplicate_window;
        self.recent
            .retain(|_, seen| now.saturating_duration_since(*seen) < window);
        before - self.sessions.len()
    }

    /// Forget every session, e.g. after the link was lost.
    pub fn reset(&mut self) {
        self.sessions.clear();
        self.recent.clear();
    }

    /// Counted rows for an address, if it has a session.
    pub fn session_rows(&self, address: &str) -> Option<usize> {
        self.sessions.get(address).map(|s| s.rows)
    }

    /// Whether the address saw a session start that has not ended yet.
    pub fn session_active(&self, address: &str) -> bool {
        self.sessions.get(address).is_some_and(|s| s.active)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }
}
