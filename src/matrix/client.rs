/*
 *  matrix/client.rs
 *
 *  LyMatrix - metrics in lights
 *  (c) 2020-26 Stuart Hunter
 *
 *  Serial client for a single LED matrix module
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

use std::fmt;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, trace};

use crate::matrix::command::{Command, Pattern, BITMAP_LEN, COLUMN_LEN, VERSION_RESPONSE_LEN};
use crate::matrix::error::MatrixError;
use crate::matrix::port::{find_matrix_port, PortBackend, SerialLink};

pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Read timeout applied before every response read
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// A client behind its single owner lock. All commands for one module go
/// through this handle so they stay ordered.
pub type SharedClient = Arc<Mutex<DeviceClient>>;

/// Firmware version as reported by the module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
    pub pre_release: bool,
}

impl FirmwareVersion {
    /// Decode the 3 byte version reply
    pub fn from_response(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < VERSION_RESPONSE_LEN {
            return None;
        }
        Some(Self {
            major: bytes[0],
            minor: bytes[1] >> 4,
            patch: bytes[1] & 0x0F,
            pre_release: bytes[2] != 0,
        })
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if self.pre_release {
            write!(f, "-pre")?;
        }
        Ok(())
    }
}

/// Owns the serial connection to one matrix module.
///
/// Starts disconnected. There is no reconnect logic, a failed open leaves
/// the client disconnected and the error goes back to the caller. The
/// client does no locking of its own, share it as a [`SharedClient`].
pub struct DeviceClient {
    backend: Arc<dyn PortBackend>,
    baud_rate: u32,
    read_timeout: Duration,
    port_name: String,
    link: Option<Box<dyn SerialLink>>,
}

impl fmt::Debug for DeviceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceClient")
            .field("port_name", &self.port_name)
            .field("baud_rate", &self.baud_rate)
            .field("connected", &self.link.is_some())
            .finish()
    }
}

impl DeviceClient {
    pub fn new(backend: Arc<dyn PortBackend>, baud_rate: u32) -> Self {
        Self {
            backend,
            baud_rate,
            read_timeout: DEFAULT_READ_TIMEOUT,
            port_name: String::new(),
            link: None,
        }
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Wrap into the shared single-owner handle
    pub fn into_shared(self) -> SharedClient {
        Arc::new(Mutex::new(self))
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Port of the current (or last) connection, empty before first connect
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Open `port_name`, or discover a port when it is empty.
    pub fn connect(&mut self, port_name: &str) -> Result<(), MatrixError> {
        if self.link.is_some() {
            self.disconnect()?;
        }

        let port = if port_name.is_empty() {
            let ports = self.backend.list_usb_ports()?;
            let found = find_matrix_port(&ports).ok_or(MatrixError::NoPortFound)?;
            debug!("auto-selected {} ({:04x}:{:04x})", found.name, found.vendor_id, found.product_id);
            found.name.clone()
        } else {
            port_name.to_string()
        };

        let link = self.backend.open(&port, self.baud_rate, self.read_timeout)?;
        info!("connected to matrix on {} at {} baud", port, self.baud_rate);
        self.link = Some(link);
        self.port_name = port;
        Ok(())
    }

    /// Write one command. Nothing is read back.
    pub fn send_command(&mut self, cmd: &Command) -> Result<(), MatrixError> {
        let link = self.link.as_mut().ok_or(MatrixError::NotConnected)?;
        let frame = cmd.encode();
        trace!("{} <- {:02X?}", self.port_name, frame);

        let written = link.write(&frame).map_err(MatrixError::Write)?;
        if written != frame.len() {
            return Err(MatrixError::ShortWrite { expected: frame.len(), written });
        }
        Ok(())
    }

    /// Read up to `expected` bytes. Fewer bytes may come back, there is no
    /// retry until full.
    pub fn read_response(&mut self, expected: usize) -> Result<Vec<u8>, MatrixError> {
        let link = self.link.as_mut().ok_or(MatrixError::NotConnected)?;
        link.set_timeout(self.read_timeout).map_err(MatrixError::Read)?;

        let mut buf = vec![0u8; expected];
        let n = link.read(&mut buf).map_err(MatrixError::Read)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Close the port. Does nothing when already disconnected.
    pub fn disconnect(&mut self) -> Result<(), MatrixError> {
        match self.link.take() {
            None => Ok(()),
            Some(link) => {
                debug!("closing {}", self.port_name);
                link.close().map_err(|source| MatrixError::Close {
                    port: self.port_name.clone(),
                    source,
                })
            }
        }
    }

    pub fn set_brightness(&mut self, level: u8) -> Result<(), MatrixError> {
        self.send_command(&Command::brightness(level))
    }

    /// Percentage bar, `percent` is expected to be 0..=100
    pub fn set_percentage(&mut self, percent: u8) -> Result<(), MatrixError> {
        self.send_command(&Command::percentage(percent))
    }

    pub fn set_pattern(&mut self, pattern: Pattern) -> Result<(), MatrixError> {
        self.send_command(&Command::pattern(pattern))
    }

    pub fn set_animate(&mut self, enabled: bool) -> Result<(), MatrixError> {
        self.send_command(&Command::animate(enabled))
    }

    pub fn draw_bitmap(&mut self, bitmap: &[u8; BITMAP_LEN]) -> Result<(), MatrixError> {
        self.send_command(&Command::draw_bitmap(bitmap))
    }

    pub fn stage_column(&mut self, column: u8, pixels: &[u8; COLUMN_LEN]) -> Result<(), MatrixError> {
        self.send_command(&Command::stage_column(column, pixels))
    }

    pub fn flush_columns(&mut self) -> Result<(), MatrixError> {
        self.send_command(&Command::flush_columns())
    }

    /// Query the firmware version
    pub fn version(&mut self) -> Result<FirmwareVersion, MatrixError> {
        self.send_command(&Command::version())?;
        let reply = self.read_response(VERSION_RESPONSE_LEN)?;
        FirmwareVersion::from_response(&reply).ok_or_else(|| {
            MatrixError::Read(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("version reply was {} of {} bytes", reply.len(), VERSION_RESPONSE_LEN),
            ))
        })
    }
}

impl Drop for DeviceClient {
    fn drop(&mut self) {
        if let Some(link) = self.link.take() {
            let _ = link.close();
        }
    }
}
