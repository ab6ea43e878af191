use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::message::OutboundMessage;

/// Size of the little-endian address prefix on multiplexed links.
pub const ADDRESS_SIZE: usize = 2;

/// Default cap on undelimited pending input.
pub const DEFAULT_MAX_BUFFER: usize = 4096;

/// Default spacing between outbound writes.
pub const DEFAULT_TX_INTERVAL: Duration = Duration::from_millis(50);

/// How inbound bytes are sliced into frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeMode {
    /// A frame ends at the configured delimiter byte.
    Delimiter,
    /// Every `rx_length` bytes form a frame.
    Length,
}

/// A frame received from the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub payload: Bytes,
}

impl Frame {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Payload as text, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

/// Configuration for the serial framing codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    pub pipe: PipeMode,
    /// Frame terminator in delimiter mode.
    pub delimiter: u8,
    /// Inbound frame size in length mode.
    pub rx_length: usize,
    /// Outbound transmit buffer size.
    pub tx_length: usize,
    /// Prefix outbound buffers with a device address.
    pub multiplexed: bool,
    /// Maximum pending input before it is discarded.
    pub max_buffer: usize,
    /// Spacing between outbound writes.
    pub tx_interval: Duration,
    /// Read timeout on the link, bounds reader shutdown latency.
    pub read_timeout: Duration,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            pipe: PipeMode::Delimiter,
            delimiter: 0x00,
            rx_length: 32,
            tx_length: 32,
            multiplexed: false,
            max_buffer: DEFAULT_MAX_BUFFER,
            tx_interval: DEFAULT_TX_INTERVAL,
            read_timeout: Duration::from_millis(100),
        }
    }
}

impl FrameConfig {
    /// Reject configurations that can never produce or carry a frame.
    pub fn validate(&self) -> Result<()> {
        if self.pipe == PipeMode::Length && self.rx_length == 0 {
            return Err(FrameError::InvalidConfig(
                "rxlength must be non-zero in length mode".to_string(),
            ));
        }
        if self.tx_length <= self.payload_offset() {
            return Err(FrameError::InvalidConfig(format!(
                "txlength {} leaves no room for payload",
                self.tx_length
            )));
        }
        if self.tx_interval.is_zero() {
            return Err(FrameError::InvalidConfig(
                "txInterval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// First payload byte in the transmit buffer.
    pub fn payload_offset(&self) -> usize {
        if self.multiplexed {
            ADDRESS_SIZE
        } else {
            0
        }
    }

    /// Longest payload that still leaves a zero terminator.
    pub fn max_tx_payload(&self) -> usize {
        self.tx_length
            .saturating_sub(self.payload_offset())
            .saturating_sub(1)
    }
}

/// Serialize an outbound message into a `tx_length` transmit buffer.
///
/// Wire format (multiplexed):
/// ```text
/// ┌──────────────┬──────────────────────────┬──────────────┐
/// │ Address (2B) │ Payload (truncated)      │ Zero padding │
/// │ LE, FFFF=all │                          │ >= 1 byte    │
/// └──────────────┴──────────────────────────┴──────────────┘
/// ```
/// Without multiplexing the payload starts at byte 0. Returns the number of
/// payload bytes that made it into the buffer.
pub fn encode_outbound(
    message: &OutboundMessage,
    config: &FrameConfig,
    dst: &mut BytesMut,
) -> Result<usize> {
    config.validate()?;

    let start = dst.len();
    dst.reserve(config.tx_length);
    if config.multiplexed {
        dst.put_u16_le(message.destination.wire_address());
    }

    let take = message.payload.len().min(config.max_tx_payload());
    dst.put_slice(&message.payload[..take]);
    dst.resize(start + config.tx_length, 0);
    Ok(take)
}

/// Decode the next frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// Empty delimiter frames are skipped. In length mode trailing zero padding
/// is trimmed from the payload. When pending input exceeds `max_buffer`
/// without a boundary, the buffer is discarded and `BufferOverflow` returned.
pub fn decode_frame(src: &mut BytesMut, config: &FrameConfig) -> Result<Option<Frame>> {
    match config.pipe {
        PipeMode::Delimiter => loop {
            let Some(end) = src.iter().position(|&b| b == config.delimiter) else {
                return check_overflow(src, config.max_buffer);
            };
            let payload = src.split_to(end).freeze();
            src.advance(1);
            if !payload.is_empty() {
                return Ok(Some(Frame { payload }));
            }
        },
        PipeMode::Length => {
            if config.rx_length == 0 {
                return Err(FrameError::InvalidConfig(
                    "rxlength must be non-zero in length mode".to_string(),
                ));
            }
            if src.len() < config.rx_length {
                return Ok(None);
            }
            let mut chunk = src.split_to(config.rx_length);
            let used = chunk.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
            chunk.truncate(used);
            Ok(Some(Frame {
                payload: chunk.freeze(),
            }))
        }
    }
}

fn check_overflow(src: &mut BytesMut, max: usize) -> Result<Option<Frame>> {
    if src.len() > max {
        let size = src.len();
        src.clear();
        return Err(FrameError::BufferOverflow { size, max });
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Destination;

    fn delimiter_config() -> FrameConfig {
        FrameConfig::default()
    }

    fn length_config(rx_length: usize) -> FrameConfig {
        FrameConfig {
            pipe: PipeMode::Length,
            rx_length,
            ..FrameConfig::default()
        }
    }

    #[test]
    fn delimiter_splits_and_discards_terminator() {
        let mut buf = BytesMut::from(&b"temp:21.5\0hum:40\0"[..]);
        let cfg = delimiter_config();

        let f1 = decode_frame(&mut buf, &cfg).unwrap().unwrap();
        let f2 = decode_frame(&mut buf, &cfg).unwrap().unwrap();

        assert_eq!(f1.payload.as_ref(), b"temp:21.5");
        assert_eq!(f2.payload.as_ref(), b"hum:40");
        assert!(buf.is_empty());
    }

    #[test]
    fn delimiter_waits_for_terminator() {
        let mut buf = BytesMut::from(&b"temp:2"[..]);
        assert!(decode_frame(&mut buf, &delimiter_config()).unwrap().is_none());
        assert_eq!(buf.len(), 6);
    }

    #[test]
    fn custom_delimiter_and_empty_frames() {
        let cfg = FrameConfig {
            delimiter: b'\n',
            ..FrameConfig::default()
        };
        let mut buf = BytesMut::from(&b"\n\nping\n"[..]);
        let frame = decode_frame(&mut buf, &cfg).unwrap().unwrap();
        assert_eq!(frame.as_str(), Some("ping"));
        assert!(decode_frame(&mut buf, &cfg).unwrap().is_none());
    }

    #[test]
    fn runaway_input_is_discarded() {
        let cfg = FrameConfig {
            max_buffer: 8,
            ..FrameConfig::default()
        };
        let mut buf = BytesMut::from(&b"0123456789"[..]);
        let err = decode_frame(&mut buf, &cfg).unwrap_err();
        assert!(matches!(err, FrameError::BufferOverflow { size: 10, max: 8 }));
        assert!(buf.is_empty());
    }

    #[test]
    fn length_mode_emits_fixed_chunks() {
        let cfg = length_config(4);
        let mut buf = BytesMut::from(&b"abcdefg"[..]);

        let frame = decode_frame(&mut buf, &cfg).unwrap().unwrap();
        assert_eq!(frame.payload.as_ref(), b"abcd");
        assert!(decode_frame(&mut buf, &cfg).unwrap().is_none());
        assert_eq!(buf.as_ref(), b"efg");
    }

    #[test]
    fn length_mode_trims_zero_padding() {
        let cfg = length_config(6);
        let mut buf = BytesMut::from(&b"ok\0\0\0\0"[..]);
        let frame = decode_frame(&mut buf, &cfg).unwrap().unwrap();
        assert_eq!(frame.payload.as_ref(), b"ok");
    }

    #[test]
    fn length_mode_keeps_delimiter_bytes() {
        let cfg = length_config(3);
        let mut buf = BytesMut::from(&b"a\0b"[..]);
        let frame = decode_frame(&mut buf, &cfg).unwrap().unwrap();
        assert_eq!(frame.payload.as_ref(), b"a\0b");
    }

    #[test]
    fn encode_plain_buffer() {
        let cfg = FrameConfig {
            tx_length: 8,
            ..FrameConfig::default()
        };
        let mut buf = BytesMut::new();
        let written = encode_outbound(&OutboundMessage::broadcast("ping"), &cfg, &mut buf).unwrap();

        assert_eq!(written, 4);
        assert_eq!(buf.as_ref(), b"ping\0\0\0\0");
    }

    #[test]
    fn encode_multiplexed_prefixes_little_endian_address() {
        let cfg = FrameConfig {
            tx_length: 8,
            multiplexed: true,
            ..FrameConfig::default()
        };
        let mut buf = BytesMut::new();
        encode_outbound(&OutboundMessage::to_device(0x01A2, "hi"), &cfg, &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0xA2, 0x01, b'h', b'i', 0, 0, 0, 0]);

        buf.clear();
        encode_outbound(&OutboundMessage::broadcast("hi"), &cfg, &mut buf).unwrap();
        assert_eq!(&buf[..2], &[0xFF, 0xFF]);
        assert_eq!(buf.len(), 8);
    }

    #[test]
    fn encode_truncates_and_keeps_terminator() {
        let cfg = FrameConfig {
            tx_length: 6,
            multiplexed: true,
            ..FrameConfig::default()
        };
        let message = OutboundMessage {
            payload: Bytes::from_static(b"abcdefgh"),
            destination: Destination::Device(1),
            notify: false,
        };
        let mut buf = BytesMut::new();
        let written = encode_outbound(&message, &cfg, &mut buf).unwrap();

        assert_eq!(written, 3);
        assert_eq!(buf.as_ref(), &[0x01, 0x00, b'a', b'b', b'c', 0]);
    }

    #[test]
    fn encode_appends_after_existing_bytes() {
        let cfg = FrameConfig {
            tx_length: 4,
            ..FrameConfig::default()
        };
        let mut buf = BytesMut::from(&b"xx"[..]);
        encode_outbound(&OutboundMessage::broadcast("a"), &cfg, &mut buf).unwrap();
        assert_eq!(buf.as_ref(), b"xxa\0\0\0");
    }

    #[test]
    fn invalid_configs_rejected() {
        let tiny = FrameConfig {
            tx_length: 2,
            multiplexed: true,
            ..FrameConfig::default()
        };
        assert!(matches!(tiny.validate(), Err(FrameError::InvalidConfig(_))));
        assert!(matches!(
            length_config(0).validate(),
            Err(FrameError::InvalidConfig(_))
        ));
        assert!(FrameConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_write_spacing_rejected() {
        let unpaced = FrameConfig {
            tx_interval: Duration::ZERO,
            ..FrameConfig::default()
        };
        assert!(matches!(unpaced.validate(), Err(FrameError::InvalidConfig(_))));
    }
}
