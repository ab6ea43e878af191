//! Serial link supervision and the gateway worker.
//!
//! This is the layer that ties serialgate together: the [`PortSupervisor`]
//! picks and blacklists ports, the [`Handshake`] and [`Heartbeat`] gate and
//! watch the connection, and the [`Gateway`] runs the single sequential
//! worker that feeds frames through decode, routing and dispatch.

pub mod control;
pub mod error;
pub mod gateway;
pub mod handshake;
pub mod heartbeat;
pub mod pump;
pub mod state;
pub mod supervisor;

pub use control::{
    ControlFrame, HandshakeConfig, DEFAULT_ACK_PREFIX, DEFAULT_CHALLENGE,
    DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_PROBE, DEFAULT_PROBE_ACK_PREFIX,
};
pub use error::{LinkError, Result};
pub use gateway::{Gateway, GatewayConfig, GatewayHandle, EVENT_TOPIC};
pub use handshake::Handshake;
pub use heartbeat::{
    is_suspect, Heartbeat, HeartbeatConfig, ProbeCheck, DEFAULT_HEARTBEAT_INTERVAL,
};
pub use pump::{spawn_reader, LinkEvent, ReaderHandle};
pub use state::ConnectionState;
pub use supervisor::{OpenedPort, PortSupervisor, SupervisorConfig};
