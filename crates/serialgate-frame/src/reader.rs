use std::io::{ErrorKind, Read};

use bytes::BytesMut;

use crate::codec::{decode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};

const READ_CHUNK_SIZE: usize = 1024;

/// Slices a serial byte stream into frames.
///
/// Serial drivers hand out bytes in whatever chunks the UART produced; the
/// reader buffers them until the configured boundary is seen.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(config.max_buffer.min(READ_CHUNK_SIZE * 4)),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    /// Read timeouts surface as `FrameError::Io` with the buffered partial
    /// frame kept, so the call can simply be repeated.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf, &self.config)? {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Number of bytes waiting for a frame boundary.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

/// True for the error kinds a read timeout produces.
pub fn is_timeout(err: &FrameError) -> bool {
    matches!(err, FrameError::Io(io) if matches!(io.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::codec::PipeMode;

    #[test]
    fn read_single_frame() {
        let mut reader = FrameReader::new(Cursor::new(b"temp:20\0".to_vec()));
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.payload.as_ref(), b"temp:20");
    }

    #[test]
    fn read_multiple_frames() {
        let mut reader = FrameReader::new(Cursor::new(b"one\0two\0three\0".to_vec()));

        let f1 = reader.read_frame().unwrap();
        let f2 = reader.read_frame().unwrap();
        let f3 = reader.read_frame().unwrap();

        assert_eq!(f1.payload.as_ref(), b"one");
        assert_eq!(f2.payload.as_ref(), b"two");
        assert_eq!(f3.payload.as_ref(), b"three");
    }

    #[test]
    fn frame_assembled_from_single_bytes() {
        let byte_reader = TrickleReader {
            bytes: b"slow:1\0".to_vec(),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.payload.as_ref(), b"slow:1");
    }

    #[test]
    fn length_mode_over_partial_reads() {
        let byte_reader = TrickleReader {
            bytes: b"abcd\0\0ef".to_vec(),
            pos: 0,
        };
        let cfg = FrameConfig {
            pipe: PipeMode::Length,
            rx_length: 6,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(byte_reader, cfg);

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.payload.as_ref(), b"abcd");
        assert!(matches!(
            reader.read_frame(),
            Err(FrameError::ConnectionClosed)
        ));
        assert_eq!(reader.pending(), 2);
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut reader = FrameReader::new(Cursor::new(b"only-part".to_vec()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn overflow_surfaces_and_reader_recovers() {
        let cfg = FrameConfig {
            max_buffer: 4,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(b"garbage".to_vec()), cfg);
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::BufferOverflow { .. }));
        assert_eq!(reader.pending(), 0);
    }

    #[test]
    fn read_would_block_keeps_partial_frame() {
        let reader = WouldBlockBetween {
            chunks: vec![b"te".to_vec(), b"mp:1\0".to_vec()],
            blocked: false,
        };
        let mut framed = FrameReader::new(reader);

        let err = framed.read_frame().unwrap_err();
        assert!(is_timeout(&err));
        assert_eq!(framed.pending(), 2);

        let frame = framed.read_frame().unwrap();
        assert_eq!(frame.payload.as_ref(), b"temp:1");
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            state: 0,
            bytes: b"ok\0".to_vec(),
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);
        let frame = framed.read_frame().unwrap();
        assert_eq!(frame.payload.as_ref(), b"ok");
    }

    #[test]
    fn custom_delimiter_and_empty_frames() {
        let cfg = FrameConfig {
            delimiter: b'\n',
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(b"\n\ntemp:1\n".to_vec()), cfg);
        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"temp:1");
        assert_eq!(reader.config().delimiter, b'\n');
    }

    #[test]
    #[cfg(unix)]
    fn frames_over_socket_pair() {
        use std::io::Write;

        let (mut left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut reader = FrameReader::new(right);

        left.write_all(b"ack\0pong\0").unwrap();
        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"ack");
        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"pong");
    }

    #[derive(Debug)]
    struct TrickleReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for TrickleReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }

            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct WouldBlockBetween {
        chunks: Vec<Vec<u8>>,
        blocked: bool,
    }

    impl Read for WouldBlockBetween {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.chunks.is_empty() {
                return Ok(0);
            }
            if self.blocked {
                self.blocked = false;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            let chunk = self.chunks.remove(0);
            buf[..chunk.len()].copy_from_slice(&chunk);
            self.blocked = true;
            Ok(chunk.len())
        }
    }

    struct InterruptedThenData {
        state: u8,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.state == 0 {
                self.state = 1;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            let remaining = self.bytes.len() - self.pos;
            let n = remaining.min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }
}
