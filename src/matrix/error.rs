/*
 *  matrix/error.rs
 *
 *  LyMatrix - metrics in lights
 *  (c) 2020-26 Stuart Hunter
 *
 *  Error types for the serial matrix layer
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
use thiserror::Error;

/// Errors raised while talking to a matrix module
#[derive(Debug, Error)]
pub enum MatrixError {
    /// Port enumeration worked but nothing usable was found
    #[error("no USB serial port found")]
    NoPortFound,

    /// The platform could not enumerate serial ports
    #[error("serial port enumeration failed: {0}")]
    Enumeration(String),

    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: io::Error,
    },

    #[error("device not connected")]
    NotConnected,

    #[error("serial write failed: {0}")]
    Write(#[source] io::Error),

    #[error("short serial write: {written} of {expected} bytes")]
    ShortWrite { expected: usize, written: usize },

    #[error("serial read failed: {0}")]
    Read(#[source] io::Error),

    #[error("failed to close {port}: {source}")]
    Close {
        port: String,
        #[source]
        source: io::Error,
    },

    /// Every configured device was skipped or failed to open
    #[error("no matrix devices could be connected")]
    NoDevicesConnected,

    /// One or more devices failed to disconnect
    #[error("disconnect failed: {0}")]
    Disconnect(DisconnectFailures),
}

impl From<serialport::Error> for MatrixError {
    fn from(err: serialport::Error) -> Self {
        MatrixError::Enumeration(err.to_string())
    }
}

/// Per-device disconnect failures, collected without stopping early
#[derive(Debug, Default)]
pub struct DisconnectFailures(pub Vec<(String, MatrixError)>);

impl DisconnectFailures {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn push(&mut self, device: &str, err: MatrixError) {
        self.0.push((device.to_string(), err));
    }

    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }
}

impl fmt::Display for DisconnectFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (device, err)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", device, err)?;
        }
        Ok(())
    }
}
