/*
 *  matrix/mod.rs
 *
 *  LyMatrix - metrics in lights
 *  (c) 2020-26 Stuart Hunter
 *
 *  Serial protocol, device clients and the device registry
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

pub mod command;
pub mod error;
pub mod port;
pub mod client;
pub mod registry;

// In-memory backend for unit and integration tests
pub mod mock;

pub use command::{encode, Command, Pattern};
pub use error::{DisconnectFailures, MatrixError};
pub use port::{find_matrix_port, PortBackend, SerialLink, SystemPorts, UsbPortInfo, MATRIX_VENDOR_ID};
pub use client::{DeviceClient, FirmwareVersion, SharedClient, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT};
pub use registry::DeviceRegistry;
