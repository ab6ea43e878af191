//! Serial port discovery and duplex stream abstraction.
//!
//! This is the lowest layer of serialgate. The gateway never talks to a
//! serial driver directly; it goes through two seams defined here:
//! - [`PortProvider`] enumerates candidate ports and opens them
//! - [`SerialStream`] is an opened duplex byte stream (Read + Write)
//!
//! [`SystemPorts`] implements the provider on top of the `serialport` crate.

pub mod error;
pub mod serial;
pub mod traits;

pub use error::{Result, TransportError};
pub use serial::{SystemPorts, DEFAULT_BAUD_RATE};
pub use traits::{PortInfo, PortKind, PortProvider, SerialStream};
