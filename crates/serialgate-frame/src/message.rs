use std::fmt;

use bytes::Bytes;

/// Address value that every device on a multiplexed link accepts.
pub const BROADCAST_ADDRESS: u16 = 0xFFFF;

/// Where an outbound message goes on a multiplexed link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    Broadcast,
    Device(u16),
}

impl Destination {
    /// Wire value for the two-byte address prefix.
    pub fn wire_address(self) -> u16 {
        match self {
            Destination::Broadcast => BROADCAST_ADDRESS,
            Destination::Device(address) => address,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Broadcast => f.write_str("broadcast"),
            Destination::Device(address) => write!(f, "{address:04X}"),
        }
    }
}

/// A message queued for the hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub payload: Bytes,
    pub destination: Destination,
    /// Mirror the message to the publish sink once written.
    pub notify: bool,
}

impl OutboundMessage {
    /// A broadcast message that is not mirrored.
    pub fn broadcast(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            destination: Destination::Broadcast,
            notify: false,
        }
    }

    /// A message addressed to one device.
    pub fn to_device(address: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            destination: Destination::Device(address),
            notify: false,
        }
    }

    /// Mark the message for mirroring to the publish sink.
    pub fn notifying(mut self) -> Self {
        self.notify = true;
        self
    }
}
