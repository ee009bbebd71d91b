//! Serial-port transport (`serialport` crate).

use std::time::Duration;

use crate::channel::{Halves, Transport};
use crate::error::TransportError;

/// The actuator firmware listens at 115200 baud.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Read timeout; also bounds how long the read loop takes to notice a stop.
const READ_TIMEOUT: Duration = Duration::from_millis(200);

/// A serial port to open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerialTransport {
    pub path: String,
    pub baud: u32,
}

impl SerialTransport {
    pub fn new(path: impl Into<String>, baud: u32) -> Self {
        SerialTransport { path: path.into(), baud }
    }
}

impl Transport for SerialTransport {
    fn name(&self) -> String { self.path.clone() }

    fn open(self: Box<Self>) -> Result<Halves, TransportError> {
        let open_err = |source: serialport::Error| TransportError::Open { port: self.path.clone(), source };

        let port = serialport::new(&self.path, self.baud)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(open_err)?;
        let reader = port.try_clone().map_err(open_err)?;

        Ok(Halves {
            reader: Box::new(reader),
            writer: Box::new(port),
        })
    }
}

/// One entry of [`list_ports`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortSummary {
    pub path: String,
    pub kind: String,
}

/// Enumerate the serial ports visible to this host.
pub fn list_ports() -> Result<Vec<PortSummary>, TransportError> {
    let ports = serialport::available_ports().map_err(TransportError::Enumerate)?;
    Ok(ports.into_iter()
        .map(|p| PortSummary {
            kind: describe(&p.port_type),
            path: p.port_name,
        })
        .collect())
}

fn describe(kind: &serialport::SerialPortType) -> String {
    use serialport::SerialPortType::*;
    match kind {
        UsbPort(info) => match (&info.manufacturer, &info.product) {
            (Some(m), Some(p)) => format!("USB {} {}", m, p),
            (None,    Some(p)) => format!("USB {}", p),
            _                  => format!("USB {:04x}:{:04x}", info.vid, info.pid),
        },
        BluetoothPort => "Bluetooth".to_string(),
        PciPort       => "PCI".to_string(),
        Unknown       => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_is_named_after_its_path() {
        let t = SerialTransport::new("/dev/ttyACM0", DEFAULT_BAUD);
        assert_eq!(t.name(), "/dev/ttyACM0");
        assert_eq!(t.baud, 115_200);
    }

    #[test]
    fn opening_a_missing_port_reports_the_path() {
        let t = Box::new(SerialTransport::new("/dev/definitely-not-a-door", DEFAULT_BAUD));
        match t.open() {
            Err(TransportError::Open { port, .. }) => assert_eq!(port, "/dev/definitely-not-a-door"),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_)      => panic!("opened a port that does not exist"),
        }
    }
}
