use std::io::{Read, Write};
use std::time::Duration;

use serialport::{SerialPort, SerialPortType};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{PortInfo, PortKind, PortProvider, SerialStream};

/// Default line rate for sensor hubs.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Host serial ports, backed by the `serialport` crate.
#[derive(Debug, Clone)]
pub struct SystemPorts {
    baud_rate: u32,
    read_timeout: Duration,
}

impl SystemPorts {
    pub fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Override the initial read timeout applied on open.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

impl Default for SystemPorts {
    fn default() -> Self {
        Self::new(DEFAULT_BAUD_RATE)
    }
}

impl PortProvider for SystemPorts {
    fn list_ports(&self) -> Result<Vec<PortInfo>> {
        let ports =
            serialport::available_ports().map_err(|err| TransportError::Enumerate(err.to_string()))?;
        Ok(ports
            .into_iter()
            .map(|port| PortInfo {
                kind: port_kind(&port.port_type),
                name: port.port_name,
            })
            .collect())
    }

    fn open(&self, name: &str) -> Result<Box<dyn SerialStream>> {
        let mut builder = serialport::new(name, self.baud_rate).timeout(self.read_timeout);
        #[cfg(unix)]
        {
            builder = builder
                .data_bits(serialport::DataBits::Eight)
                .stop_bits(serialport::StopBits::One)
                .parity(serialport::Parity::None);
        }

        let port = builder.open().map_err(|err| TransportError::Open {
            port: name.to_string(),
            source: err.into(),
        })?;
        info!(port = name, baud_rate = self.baud_rate, "opened serial port");
        Ok(Box::new(SystemStream { port }))
    }
}

fn port_kind(port_type: &SerialPortType) -> PortKind {
    match port_type {
        SerialPortType::UsbPort(usb) => PortKind::Usb {
            vid: usb.vid,
            pid: usb.pid,
            product: usb.product.clone(),
        },
        SerialPortType::PciPort => PortKind::Pci,
        SerialPortType::BluetoothPort => PortKind::Bluetooth,
        SerialPortType::Unknown => PortKind::Unknown,
    }
}

/// An opened host serial port.
struct SystemStream {
    port: Box<dyn SerialPort>,
}

impl Read for SystemStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SystemStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.port.flush()
    }
}

impl SerialStream for SystemStream {
    fn try_clone_stream(&self) -> Result<Box<dyn SerialStream>> {
        let port = self
            .port
            .try_clone()
            .map_err(|err| TransportError::Io(err.into()))?;
        debug!(port = ?self.port.name(), "cloned serial handle");
        Ok(Box::new(SystemStream { port }))
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.port
            .set_timeout(timeout)
            .map_err(|err| TransportError::Io(err.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let ports = SystemPorts::default();
        assert_eq!(ports.baud_rate(), DEFAULT_BAUD_RATE);
        assert_eq!(ports.read_timeout, DEFAULT_READ_TIMEOUT);
    }

    #[test]
    fn opening_missing_port_reports_name() {
        let ports = SystemPorts::new(9600);
        match ports.open("/dev/serialgate-does-not-exist") {
            Err(TransportError::Open { port, .. }) => {
                assert_eq!(port, "/dev/serialgate-does-not-exist")
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("missing port should not open"),
        }
    }
}
