use std::fmt;
use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// An opened serial link: a duplex byte stream.
///
/// The gateway reads from one handle on a dedicated thread and writes from
/// another, so implementations must be able to hand out an independent
/// handle to the same underlying device.
pub trait SerialStream: Read + Write + Send {
    /// Create a second handle to the same stream.
    fn try_clone_stream(&self) -> Result<Box<dyn SerialStream>>;

    /// Bound how long a single `read` may block.
    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()>;
}

/// Enumerates and opens serial ports.
pub trait PortProvider: Send + Sync {
    /// Candidate ports, in enumeration order.
    fn list_ports(&self) -> Result<Vec<PortInfo>>;

    /// Open a port by name.
    fn open(&self, name: &str) -> Result<Box<dyn SerialStream>>;
}

/// Hardware class of a discovered port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortKind {
    Usb {
        vid: u16,
        pid: u16,
        product: Option<String>,
    },
    Pci,
    Bluetooth,
    Unknown,
}

/// A discovered serial port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// OS-level identifier (`/dev/ttyUSB0`, `COM3`).
    pub name: String,
    pub kind: PortKind,
}

impl PortInfo {
    /// A port with unknown hardware class.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: PortKind::Unknown,
        }
    }
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortKind::Usb { vid, pid, product } => {
                write!(f, "usb {vid:04x}:{pid:04x}")?;
                if let Some(product) = product {
                    write!(f, " ({product})")?;
                }
                Ok(())
            }
            PortKind::Pci => f.write_str("pci"),
            PortKind::Bluetooth => f.write_str("bluetooth"),
            PortKind::Unknown => f.write_str("unknown"),
        }
    }
}

#[cfg(unix)]
impl SerialStream for std::os::unix::net::UnixStream {
    fn try_clone_stream(&self) -> Result<Box<dyn SerialStream>> {
        Ok(Box::new(self.try_clone()?))
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        std::os::unix::net::UnixStream::set_read_timeout(self, Some(timeout))?;
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::{Read, Write};
    use std::os::unix::net::UnixStream;

    use super::*;

    #[test]
    fn cloned_handles_share_the_stream() {
        let (left, mut right) = UnixStream::pair().unwrap();
        let mut writer: Box<dyn SerialStream> = Box::new(left);
        let mut reader = writer.try_clone_stream().unwrap();

        writer.write_all(b"abc").unwrap();
        let mut buf = [0u8; 3];
        right.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"abc");

        right.write_all(b"xyz").unwrap();
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"xyz");
    }

    #[test]
    fn read_timeout_applies() {
        let (left, _right) = UnixStream::pair().unwrap();
        let mut stream: Box<dyn SerialStream> = Box::new(left);
        stream.set_read_timeout(Duration::from_millis(5)).unwrap();

        let mut buf = [0u8; 1];
        let err = stream.read(&mut buf).unwrap_err();
        assert!(matches!(
            err.kind(),
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
        ));
    }

    #[test]
    fn port_kind_display() {
        let usb = PortKind::Usb {
            vid: 0x10c4,
            pid: 0xea60,
            product: Some("CP2102".to_string()),
        };
        assert_eq!(usb.to_string(), "usb 10c4:ea60 (CP2102)");
        assert_eq!(PortInfo::named("/dev/ttyS0").kind.to_string(), "unknown");
    }
}
