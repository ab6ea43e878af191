use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serialgate_frame::{FrameConfig, PipeMode, DEFAULT_MAX_BUFFER, DEFAULT_TX_INTERVAL};
use serialgate_link::{
    GatewayConfig, HandshakeConfig, HeartbeatConfig, SupervisorConfig, DEFAULT_ACK_PREFIX,
    DEFAULT_CHALLENGE, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_PROBE,
    DEFAULT_PROBE_ACK_PREFIX,
};
use serialgate_route::{DispatchConfig, RouterConfig};
use serialgate_schema::{SchemaRegistry, SchemaSpec};
use serialgate_transport::{SystemPorts, DEFAULT_BAUD_RATE};

use crate::exit::{io_error, CliError, CliResult, DATA_INVALID};

/// Largest configuration file accepted.
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Inbound framing selector as written in the configuration file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pipe {
    #[default]
    Delimiter,
    Length,
}

impl From<Pipe> for PipeMode {
    fn from(pipe: Pipe) -> Self {
        match pipe {
            Pipe::Delimiter => PipeMode::Delimiter,
            Pipe::Length => PipeMode::Length,
        }
    }
}

/// `uart.*` keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UartSettings {
    pub pipe: Pipe,
    pub delim: u8,
    pub rxlength: usize,
    pub txlength: usize,
    pub baud_rate: u32,
    /// Milliseconds between outbound writes.
    pub tx_interval: u64,
    pub max_buffer: usize,
}

impl Default for UartSettings {
    fn default() -> Self {
        let frame = FrameConfig::default();
        Self {
            pipe: Pipe::Delimiter,
            delim: frame.delimiter,
            rxlength: frame.rx_length,
            txlength: frame.tx_length,
            baud_rate: DEFAULT_BAUD_RATE,
            tx_interval: millis(DEFAULT_TX_INTERVAL),
            max_buffer: DEFAULT_MAX_BUFFER,
        }
    }
}

/// `ports.*` keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PortSettings {
    pub autofind: bool,
    pub port: Option<String>,
    pub max_tries: usize,
    pub filter: Option<String>,
}

impl Default for PortSettings {
    fn default() -> Self {
        let supervisor = SupervisorConfig::default();
        Self {
            autofind: supervisor.autofind,
            port: supervisor.port,
            max_tries: supervisor.max_tries,
            filter: supervisor.filter,
        }
    }
}

/// `handshake.*` keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HandshakeSettings {
    pub challenge: String,
    pub ack_prefix: String,
    pub probe: String,
    pub probe_ack_prefix: String,
    /// Milliseconds to wait for the challenge acknowledgement.
    pub timeout: u64,
}

impl Default for HandshakeSettings {
    fn default() -> Self {
        Self {
            challenge: DEFAULT_CHALLENGE.to_string(),
            ack_prefix: DEFAULT_ACK_PREFIX.to_string(),
            probe: DEFAULT_PROBE.to_string(),
            probe_ack_prefix: DEFAULT_PROBE_ACK_PREFIX.to_string(),
            timeout: millis(DEFAULT_HANDSHAKE_TIMEOUT),
        }
    }
}

/// The gateway configuration file. Durations are in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub uart: UartSettings,
    pub ports: PortSettings,
    pub handshake: HandshakeSettings,
    pub heartbeat_interval: u64,
    pub connected_address_timeout: u64,
    pub max_session_rows: usize,
    /// Hub mode: outbound address prefix and per-address sessions.
    pub is_server: bool,
    pub debug_mode: bool,
    pub mute_connection_error: bool,
    pub duplicate_window: u64,
    pub reconnect_delay: u64,
    /// Active topics. Absent means every topic.
    pub topics: Option<Vec<String>>,
    pub schema: SchemaSpec,
}

impl Default for Settings {
    fn default() -> Self {
        let router = RouterConfig::default();
        let gateway = GatewayConfig::default();
        Self {
            uart: UartSettings::default(),
            ports: PortSettings::default(),
            handshake: HandshakeSettings::default(),
            heartbeat_interval: millis(DEFAULT_HEARTBEAT_INTERVAL),
            connected_address_timeout: millis(router.address_timeout),
            max_session_rows: router.max_session_rows,
            is_server: false,
            debug_mode: false,
            mute_connection_error: false,
            duplicate_window: millis(router.duplicate_window),
            reconnect_delay: millis(gateway.reconnect_delay),
            topics: None,
            schema: SchemaSpec::default(),
        }
    }
}

impl Settings {
    /// Read and parse a configuration file.
    pub fn from_file(path: &Path) -> CliResult<Self> {
        let context = format!("config {}", path.display());
        let metadata = std::fs::metadata(path).map_err(|err| io_error(&context, err))?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(CliError::new(
                DATA_INVALID,
                format!(
                    "{context}: file too large ({} bytes, max {MAX_CONFIG_FILE_SIZE})",
                    metadata.len()
                ),
            ));
        }
        let raw = std::fs::read_to_string(path).map_err(|err| io_error(&context, err))?;
        Self::from_json(&raw).map_err(|err| CliError::new(DATA_INVALID, format!("{context}: {}", err.message)))
    }

    pub fn from_json(raw: &str) -> CliResult<Self> {
        serde_json::from_str(raw)
            .map_err(|err| CliError::new(DATA_INVALID, format!("invalid configuration: {err}")))
    }

    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            pipe: self.uart.pipe.into(),
            delimiter: self.uart.delim,
            rx_length: self.uart.rxlength,
            tx_length: self.uart.txlength,
            multiplexed: self.is_server,
            max_buffer: self.uart.max_buffer,
            tx_interval: Duration::from_millis(self.uart.tx_interval),
            ..FrameConfig::default()
        }
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            max_session_rows: self.max_session_rows,
            active_topics: self
                .topics
                .as_ref()
                .map(|topics| topics.iter().cloned().collect::<BTreeSet<_>>()),
            multiplexed: self.is_server,
            duplicate_window: Duration::from_millis(self.duplicate_window),
            address_timeout: Duration::from_millis(self.connected_address_timeout),
        }
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            mute_connection_errors: self.mute_connection_error,
        }
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            frame: self.frame_config(),
            handshake: HandshakeConfig {
                challenge: self.handshake.challenge.clone(),
                ack_prefix: self.handshake.ack_prefix.clone(),
                probe: self.handshake.probe.clone(),
                probe_ack_prefix: self.handshake.probe_ack_prefix.clone(),
                timeout: Duration::from_millis(self.handshake.timeout),
            },
            heartbeat: HeartbeatConfig {
                interval: Duration::from_millis(self.heartbeat_interval),
            },
            supervisor: SupervisorConfig {
                autofind: self.ports.autofind,
                port: self.ports.port.clone(),
                max_tries: self.ports.max_tries,
                filter: self.ports.filter.clone(),
            },
            router: self.router_config(),
            reconnect_delay: Duration::from_millis(self.reconnect_delay),
            debug_mode: self.debug_mode,
            ..GatewayConfig::default()
        }
    }

    pub fn registry(&self) -> CliResult<SchemaRegistry> {
        SchemaRegistry::from_spec(&self.schema)
            .map_err(|err| CliError::new(DATA_INVALID, format!("schema rejected: {err}")))
    }

    pub fn port_provider(&self) -> SystemPorts {
        SystemPorts::new(self.uart.baud_rate).with_read_timeout(self.frame_config().read_timeout)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
