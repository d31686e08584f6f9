//! Serial port discovery

use serialport::{available_ports, SerialPortType};
use tracing::{info, warn};

/// A serial port present on this machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub port: String,
    /// USB vendor and product ids
    pub usb: Option<(u16, u16)>,
    pub product: Option<String>,
}

impl PortInfo {
    fn from_serialport(name: String, port_type: &SerialPortType) -> Self {
        match port_type {
            SerialPortType::UsbPort(usb) => Self {
                port: name,
                usb: Some((usb.vid, usb.pid)),
                product: usb.product.clone(),
            },
            _ => Self {
                port: name,
                usb: None,
                product: None,
            },
        }
    }

    /// One-line description for the console
    pub fn label(&self) -> String {
        match (&self.product, self.usb) {
            (Some(product), Some((vid, pid))) => {
                format!("{} ({}, {:04x}:{:04x})", self.port, product, vid, pid)
            }
            (None, Some((vid, pid))) => format!("{} ({:04x}:{:04x})", self.port, vid, pid),
            (Some(product), None) => format!("{} ({})", self.port, product),
            (None, None) => self.port.clone(),
        }
    }
}

/// Enumerate the serial ports of this machine
pub fn list_ports() -> Vec<PortInfo> {
    match available_ports() {
        Ok(ports) => ports
            .into_iter()
            .map(|p| PortInfo::from_serialport(p.port_name, &p.port_type))
            .collect(),
        Err(e) => {
            warn!("Failed to enumerate serial ports: {}", e);
            Vec::new()
        }
    }
}

/// Check the configured port and log the alternatives when it is missing
///
/// Returns false when the port was not found. Enumeration can miss ports on
/// some platforms, so callers still try to open it.
pub fn check_configured_port(configured: &str) -> bool {
    let ports = list_ports();
    if ports.iter().any(|p| p.port == configured) {
        return true;
    }

    warn!("Serial port {} not found", configured);
    if ports.is_empty() {
        info!("No serial ports found");
    } else {
        info!("Found {} serial port(s):", ports.len());
        for port in &ports {
            info!("  {}", port.label());
        }
    }
    false
}
