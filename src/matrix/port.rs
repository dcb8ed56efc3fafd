/*
 *  matrix/port.rs
 *
 *  LyMatrix - metrics in lights
 *  (c) 2020-26 Stuart Hunter
 *
 *  Serial port discovery and the link abstraction used by the client
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::io::{self, Read, Write};
use std::time::Duration;

use log::debug;
use serialport::{SerialPort, SerialPortType};

use crate::matrix::error::MatrixError;

/// USB vendor ID reported by the LED matrix modules
pub const MATRIX_VENDOR_ID: u16 = 0x32AC;

/// A USB serial port as seen by discovery
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct UsbPortInfo {
    pub name: String,
    pub vendor_id: u16,
    pub product_id: u16,
}

/// An open serial connection.
///
/// Kept narrow so the client can run against real hardware or the
/// in-memory link in `matrix::mock`.
pub trait SerialLink: Send {
    /// Single write call, may return fewer bytes than given
    fn write(&mut self, frame: &[u8]) -> io::Result<usize>;

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Flush and release the port
    fn close(self: Box<Self>) -> io::Result<()>;
}

/// Where ports come from
pub trait PortBackend: Send + Sync {
    fn list_usb_ports(&self) -> Result<Vec<UsbPortInfo>, MatrixError>;

    fn open(&self, port: &str, baud_rate: u32, timeout: Duration) -> Result<Box<dyn SerialLink>, MatrixError>;
}

/// Prefer a matrix module by vendor ID, otherwise the first USB port.
pub fn find_matrix_port(ports: &[UsbPortInfo]) -> Option<&UsbPortInfo> {
    ports
        .iter()
        .find(|p| p.vendor_id == MATRIX_VENDOR_ID)
        .or_else(|| ports.first())
}

/// Ports from the operating system via the `serialport` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPorts;

impl PortBackend for SystemPorts {
    fn list_usb_ports(&self) -> Result<Vec<UsbPortInfo>, MatrixError> {
        let ports = serialport::available_ports()?;
        let usb = ports
            .into_iter()
            .filter_map(|p| match p.port_type {
                SerialPortType::UsbPort(info) => Some(UsbPortInfo {
                    name: p.port_name,
                    vendor_id: info.vid,
                    product_id: info.pid,
                }),
                _ => None,
            })
            .collect::<Vec<_>>();
        debug!("found {} USB serial port(s)", usb.len());
        Ok(usb)
    }

    fn open(&self, port: &str, baud_rate: u32, timeout: Duration) -> Result<Box<dyn SerialLink>, MatrixError> {
        let handle = serialport::new(port, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(|e| MatrixError::Open { port: port.to_string(), source: e.into() })?;
        Ok(Box::new(SystemLink { port: handle }))
    }
}

struct SystemLink {
    port: Box<dyn SerialPort>,
}

impl SerialLink for SystemLink {
    fn write(&mut self, frame: &[u8]) -> io::Result<usize> {
        Write::write(&mut self.port, frame)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(&mut self.port, buf)
    }

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.port.set_timeout(timeout).map_err(io::Error::from)
    }

    fn close(mut self: Box<Self>) -> io::Result<()> {
        // the handle is released on drop
        self.port.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(name: &str, vid: u16) -> UsbPortInfo {
        UsbPortInfo { name: name.to_string(), vendor_id: vid, product_id: 0x0020 }
    }

    #[test]
    fn test_prefers_matrix_vendor() {
        let ports = vec![port("/dev/ttyACM0", 0x2341), port("/dev/ttyACM1", MATRIX_VENDOR_ID)];
        assert_eq!(find_matrix_port(&ports).map(|p| p.name.as_str()), Some("/dev/ttyACM1"));
    }

    #[test]
    fn test_falls_back_to_first_port() {
        let ports = vec![port("/dev/ttyUSB0", 0x0403), port("/dev/ttyUSB1", 0x10C4)];
        assert_eq!(find_matrix_port(&ports).map(|p| p.name.as_str()), Some("/dev/ttyUSB0"));
    }

    #[test]
    fn test_no_ports() {
        assert!(find_matrix_port(&[]).is_none());
    }
}
