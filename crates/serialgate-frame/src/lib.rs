//! Framing for serial sensor links.
//!
//! Inbound bytes are sliced into frames either at a delimiter byte or in
//! fixed `rxlength` chunks. Outbound messages are serialized into a fixed
//! `txlength` transmit buffer, optionally prefixed with a little-endian
//! device address, and drained one per tick by a paced writer thread.

pub mod codec;
pub mod error;
pub mod message;
pub mod queue;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_frame, encode_outbound, Frame, FrameConfig, PipeMode, ADDRESS_SIZE,
    DEFAULT_MAX_BUFFER, DEFAULT_TX_INTERVAL,
};
pub use error::{FrameError, Result};
pub use message::{Destination, OutboundMessage, BROADCAST_ADDRESS};
pub use queue::{spawn_writer, OutboundQueue, WriterHandle};
pub use reader::{is_timeout, FrameReader};
pub use writer::FrameWriter;
