use crate::session::{InstrumentSession, PrologixSession, SessionConfig, SessionError};
use serialport::SerialPortType;

/// A GPIB-USB controller found on the host.
#[derive(Debug, Clone)]
pub struct GpibAdapter {
    pub name: String,
    pub port: String,
}

impl GpibAdapter {
    pub fn new(name: String, port: String) -> Self {
        Self { name, port }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    #[error("Port {port} is not a GPIB controller")]
    InvalidPort { port: String },

    #[error("No GPIB controller found. Please connect one or specify the port manually")]
    DeviceNotFound,

    #[error("Device did not identify as an HP3458A: {response:?}")]
    DeviceValidationFailed { response: String },
}

/// USB vendor/product pairs of supported GPIB-USB controllers.
const VALID_VENDOR_PRODUCT_VARIANTS: [(u16, u16); 2] = [
    (0x0403, 0x6001), // Prologix GPIB-USB (FTDI)
    (0x0403, 0x6015), // Prologix GPIB-USB rev. 6 (FTDI X-series)
];

pub struct Hp3458aConnector;

impl Hp3458aConnector {
    /// Open a controller and check that the addressed device is an HP3458A.
    ///
    /// Without an explicit `port` the first controller found is used.
    pub fn connect(
        port: Option<&str>,
        config: SessionConfig,
    ) -> Result<PrologixSession, ConnectorError> {
        let port = match port {
            Some(port) => {
                log::debug!("Connecting to GPIB controller on port {}", port);
                Self::validate_port(port)?;
                port.to_string()
            }
            None => Self::get_controller_port()?,
        };

        let mut session = PrologixSession::new(&port, config)?;
        session.initialize()?;
        Self::validate_device(&mut session)?;
        Ok(session)
    }

    fn validate_port(port: &str) -> Result<(), ConnectorError> {
        let adapters = Self::get_available_adapters()?;

        if !adapters.iter().any(|a| a.port == port) {
            return Err(ConnectorError::InvalidPort {
                port: port.to_string(),
            });
        }

        Ok(())
    }

    /// Ask the device for its identity and make sure it is an HP3458A.
    pub fn validate_device<S: InstrumentSession + ?Sized>(
        session: &mut S,
    ) -> Result<String, ConnectorError> {
        let response = session.query("ID?")?;
        if !response.contains("3458") {
            return Err(ConnectorError::DeviceValidationFailed { response });
        }
        log::debug!("Found {}", response);
        Ok(response)
    }

    fn is_valid_port_type(port_type: &SerialPortType) -> Option<String> {
        match port_type {
            SerialPortType::UsbPort(info) => {
                let is_valid_variant = VALID_VENDOR_PRODUCT_VARIANTS
                    .iter()
                    .any(|&(vid, pid)| info.vid == vid && info.pid == pid);
                if is_valid_variant {
                    Some(
                        info.product
                            .clone()
                            .unwrap_or_else(|| "GPIB-USB".to_string()),
                    )
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Get all GPIB-USB controllers attached to this host.
    pub fn get_available_adapters() -> Result<Vec<GpibAdapter>, ConnectorError> {
        let adapters = serialport::available_ports()?
            .into_iter()
            .filter_map(|p| {
                Self::is_valid_port_type(&p.port_type).map(|name| GpibAdapter::new(name, p.port_name))
            })
            .collect();

        Ok(adapters)
    }

    fn get_controller_port() -> Result<String, ConnectorError> {
        log::debug!("Searching for a GPIB controller");

        Self::get_available_adapters()?
            .into_iter()
            .next()
            .map(|adapter| adapter.port)
            .ok_or(ConnectorError::DeviceNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::mock::MockSession;
    use serialport::UsbPortInfo;

    fn usb(vid: u16, pid: u16, product: Option<&str>) -> SerialPortType {
        SerialPortType::UsbPort(UsbPortInfo {
            vid,
            pid,
            serial_number: None,
            manufacturer: None,
            product: product.map(str::to_string),
        })
    }

    #[test]
    fn test_get_available_adapters() {
        // Depends on what is actually plugged in.
        match Hp3458aConnector::get_available_adapters() {
            Ok(adapters) => {
                for adapter in adapters {
                    assert!(!adapter.name.is_empty());
                    assert!(!adapter.port.is_empty());
                }
            }
            Err(ConnectorError::SerialPort(_)) => {
                // Expected if port enumeration is not available
            }
            Err(e) => {
                panic!("Unexpected error: {:?}", e);
            }
        }
    }

    #[test]
    fn test_port_type_filter() {
        assert_eq!(
            Hp3458aConnector::is_valid_port_type(&usb(0x0403, 0x6001, Some("Prologix"))),
            Some("Prologix".to_string())
        );
        assert_eq!(
            Hp3458aConnector::is_valid_port_type(&usb(0x0403, 0x6015, None)),
            Some("GPIB-USB".to_string())
        );
        assert_eq!(
            Hp3458aConnector::is_valid_port_type(&usb(0x1b4f, 0xa660, None)),
            None
        );
        assert_eq!(
            Hp3458aConnector::is_valid_port_type(&SerialPortType::Unknown),
            None
        );
    }

    #[test]
    fn test_validate_device() {
        let mut session = MockSession::new().respond("ID?", "HP3458A");
        assert_eq!(
            Hp3458aConnector::validate_device(&mut session).unwrap(),
            "HP3458A"
        );

        let mut session = MockSession::new().respond("ID?", "HP34401A");
        assert!(matches!(
            Hp3458aConnector::validate_device(&mut session),
            Err(ConnectorError::DeviceValidationFailed { .. })
        ));
    }
}
