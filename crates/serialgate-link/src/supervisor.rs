use std::collections::HashSet;
use std::sync::Arc;

use serialgate_transport::{PortProvider, SerialStream, TransportError};
use tracing::{debug, info, warn};

use crate::error::{LinkError, Result};

/// Port selection policy.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Probe every enumerated port instead of only `port`.
    pub autofind: bool,
    /// Statically configured port, used when autofind is off.
    pub port: Option<String>,
    /// Consecutive failures tolerated before giving up.
    pub max_tries: usize,
    /// Only autofind ports whose name contains this substring.
    pub filter: Option<String>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            autofind: true,
            port: None,
            max_tries: 5,
            filter: None,
        }
    }
}

/// A successfully opened port, not yet validated by the handshake.
pub struct OpenedPort {
    pub name: String,
    pub stream: Box<dyn SerialStream>,
}

impl std::fmt::Debug for OpenedPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedPort")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Opens, blacklists and retries serial ports.
pub struct PortSupervisor {
    provider: Arc<dyn PortProvider>,
    config: SupervisorConfig,
    blacklist: HashSet<String>,
    failures: usize,
}

impl PortSupervisor {
    pub fn new(provider: Arc<dyn PortProvider>, config: SupervisorConfig) -> Self {
        Self {
            provider,
            config,
            blacklist: HashSet::new(),
            failures: 0,
        }
    }

    /// Open the next usable port.
    ///
    /// Candidates are tried in enumeration order, skipping blacklisted ones.
    /// Each open failure blacklists the candidate. Gives up with
    /// `NoPortsAvailable` once `max_tries` consecutive failures accumulate or
    /// no candidate is left.
    pub fn acquire(&mut self) -> Result<OpenedPort> {
        if !self.config.autofind {
            return self.acquire_static();
        }

        let candidates = self.candidates()?;
        for name in candidates {
            if self.exhausted() {
                break;
            }
            match self.provider.open(&name) {
                Ok(stream) => {
                    info!(port = %name, "port opened");
                    return Ok(OpenedPort { name, stream });
                }
                Err(err) => {
                    warn!(port = %name, error = %err, "port open failed");
                    self.record_failure(&name);
                }
            }
        }

        Err(LinkError::NoPortsAvailable {
            attempts: self.failures,
        })
    }

    fn acquire_static(&mut self) -> Result<OpenedPort> {
        let Some(name) = self.config.port.clone() else {
            return Err(TransportError::NotFound("no port configured and autofind disabled".to_string()).into());
        };
        if self.exhausted() {
            return Err(LinkError::NoPortsAvailable {
                attempts: self.failures,
            });
        }

        match self.provider.open(&name) {
            Ok(stream) => {
                info!(port = %name, "configured port opened");
                Ok(OpenedPort { name, stream })
            }
            Err(err) => {
                warn!(port = %name, error = %err, "configured port unavailable");
                self.record_failure(&name);
                Err(LinkError::NoPortsAvailable {
                    attempts: self.failures,
                })
            }
        }
    }

    /// Enumerated ports that pass the filter and are not blacklisted.
    pub fn candidates(&self) -> Result<Vec<String>> {
        let ports = self.provider.list_ports()?;
        let candidates: Vec<String> = ports
            .into_iter()
            .map(|port| port.name)
            .filter(|name| match &self.config.filter {
                Some(filter) => name.contains(filter.as_str()),
                None => true,
            })
            .filter(|name| !self.blacklist.contains(name))
            .collect();
        debug!(count = candidates.len(), blacklisted = self.blacklist.len(), "port candidates");
        Ok(candidates)
    }

    /// A port opened but failed validation (handshake timeout).
    pub fn report_failure(&mut self, name: &str) {
        self.record_failure(name);
    }

    fn record_failure(&mut self, name: &str) {
        self.failures = self.failures.saturating_add(1);
        if self.config.autofind {
            self.blacklist.insert(name.to_string());
        }
        debug!(port = %name, failures = self.failures, "port failure recorded");
    }

    /// A device answered the handshake: forget every past failure.
    pub fn confirm(&mut self) {
        if !self.blacklist.is_empty() {
            info!(cleared = self.blacklist.len(), "port blacklist cleared");
        }
        self.blacklist.clear();
        self.failures = 0;
    }

    fn exhausted(&self) -> bool {
        self.failures >= self.config.max_tries
    }

    pub fn blacklist(&self) -> &HashSet<String> {
        &self.blacklist
    }

    pub fn consecutive_failures(&self) -> usize {
        self.failures
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }
}
