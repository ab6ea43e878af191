//! Serial sensor hubs in, publish/subscribe topics out.
//!
//! serialgate supervises a serial link to a microcontroller hub, validates
//! the device with a challenge/response handshake, decodes the `name:value`
//! frames it sends through a schema registry, merges them into per-device
//! sessions and publishes the resulting records.
//!
//! # Crate Structure
//!
//! - [`transport`]: port discovery and the duplex stream seam
//! - [`frame`]: inbound framing and the paced outbound writer
//! - [`schema`]: field descriptors, tokenizer and decoder
//! - [`route`]: session routing and publish sinks
//! - [`link`]: port supervision, handshake, heartbeat and the gateway worker

/// Re-export transport types.
pub mod transport {
    pub use serialgate_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use serialgate_frame::*;
}

/// Re-export schema types.
pub mod schema {
    pub use serialgate_schema::*;
}

/// Re-export routing types.
pub mod route {
    pub use serialgate_route::*;
}

/// Re-export gateway types.
pub mod link {
    pub use serialgate_link::*;
}
