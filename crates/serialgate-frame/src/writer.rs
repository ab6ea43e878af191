use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_outbound, FrameConfig};
use crate::error::{FrameError, Result};
use crate::message::OutboundMessage;

/// Writes fixed-size transmit buffers to the serial stream.
///
/// Every call produces exactly `tx_length` bytes on the wire.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(config.tx_length),
            config,
        }
    }

    /// Encode and write one message (blocking).
    pub fn send(&mut self, message: &OutboundMessage) -> Result<()> {
        self.buf.clear();
        let written = encode_outbound(message, &self.config, &mut self.buf)?;
        if written < message.payload.len() {
            tracing::debug!(
                len = message.payload.len(),
                kept = written,
                "outbound payload truncated to transmit buffer"
            );
        }

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;

    fn small_config(multiplexed: bool) -> FrameConfig {
        FrameConfig {
            tx_length: 8,
            multiplexed,
            ..FrameConfig::default()
        }
    }

    #[test]
    fn plain_link_pads_payload_to_tx_length() {
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::new()), small_config(false));
        writer.send(&OutboundMessage::broadcast("hello")).unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(wire, b"hello\0\0\0");
    }

    #[test]
    fn multiplexed_buffers_carry_address_prefix() {
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::new()), small_config(true));
        writer.send(&OutboundMessage::to_device(1, "a")).unwrap();
        writer.send(&OutboundMessage::broadcast("b")).unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(wire.len(), 16);
        assert_eq!(&wire[..3], &[0x01, 0x00, b'a']);
        assert_eq!(&wire[8..11], &[0xFF, 0xFF, b'b']);
    }

    #[test]
    fn invalid_config_rejected_before_writing() {
        let cfg = FrameConfig {
            tx_length: 1,
            multiplexed: true,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::new()), cfg);
        let err = writer.send(&OutboundMessage::broadcast("x")).unwrap_err();
        assert!(matches!(err, FrameError::InvalidConfig(_)));
        assert!(writer.into_inner().into_inner().is_empty());
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = FrameWriter::new(sink);

        writer.send(&OutboundMessage::broadcast("x")).unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn interrupted_write_and_flush_are_retried() {
        let writer_impl = InterruptedWriteThenFlush {
            wrote_once: false,
            flush_interrupted: false,
            data: Vec::new(),
        };

        let mut writer = FrameWriter::with_config(writer_impl, small_config(false));
        writer.send(&OutboundMessage::broadcast("retry")).unwrap();

        let inner = writer.into_inner();
        assert_eq!(inner.data.len(), 8);
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.send(&OutboundMessage::broadcast("x")).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn broken_pipe_surfaces_as_io() {
        let mut writer = FrameWriter::new(BrokenWriter);
        let err = writer.send(&OutboundMessage::broadcast("x")).unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct InterruptedWriteThenFlush {
        wrote_once: bool,
        flush_interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedWriteThenFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.wrote_once {
                self.wrote_once = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flush_interrupted {
                self.flush_interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
