/*
 *  display/traits.rs
 *
 *  LyMatrix - metrics in lights
 *  (c) 2020-26 Stuart Hunter
 *
 *  Capability trait between the display managers and the matrix clients
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
use std::str::FromStr;

use crate::display::error::DisplayError;
use crate::matrix::{MatrixError, Pattern, SharedClient};

/// Coarse system state shown as a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixStatus {
    /// Gradient
    Normal,
    /// Zig-zag
    Warning,
    /// Full bright
    Critical,
    /// Brightness zero, used to blank on shutdown
    Off,
}

impl MatrixStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatrixStatus::Normal => "normal",
            MatrixStatus::Warning => "warning",
            MatrixStatus::Critical => "critical",
            MatrixStatus::Off => "off",
        }
    }
}

impl fmt::Display for MatrixStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatrixStatus {
    type Err = DisplayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(MatrixStatus::Normal),
            "warning" => Ok(MatrixStatus::Warning),
            "critical" => Ok(MatrixStatus::Critical),
            "off" => Ok(MatrixStatus::Off),
            other => Err(DisplayError::UnknownStatus(other.to_string())),
        }
    }
}

/// The handful of operations a display manager needs from a module.
///
/// Methods take `&self`, implementations that own a serial port serialise
/// access internally so one module only ever sees one writer.
pub trait MatrixDriver: Send + Sync {
    /// Percentage bar, 0..=100
    fn set_percentage(&self, percent: u8) -> Result<(), MatrixError>;

    /// Animated pattern when busy, still gradient when idle
    fn set_activity_pattern(&self, active: bool) -> Result<(), MatrixError>;

    fn set_status_pattern(&self, status: MatrixStatus) -> Result<(), MatrixError>;

    fn set_brightness(&self, level: u8) -> Result<(), MatrixError>;
}

pub type BoxedMatrix = Box<dyn MatrixDriver>;

impl MatrixDriver for SharedClient {
    fn set_percentage(&self, percent: u8) -> Result<(), MatrixError> {
        self.lock().unwrap_or_else(|e| e.into_inner()).set_percentage(percent)
    }

    fn set_activity_pattern(&self, active: bool) -> Result<(), MatrixError> {
        let mut client = self.lock().unwrap_or_else(|e| e.into_inner());
        client.set_animate(active)?;
        client.set_pattern(if active { Pattern::ZigZag } else { Pattern::Gradient })
    }

    fn set_status_pattern(&self, status: MatrixStatus) -> Result<(), MatrixError> {
        let mut client = self.lock().unwrap_or_else(|e| e.into_inner());
        match status {
            MatrixStatus::Normal => client.set_pattern(Pattern::Gradient),
            MatrixStatus::Warning => client.set_pattern(Pattern::ZigZag),
            MatrixStatus::Critical => client.set_pattern(Pattern::FullBright),
            MatrixStatus::Off => client.set_brightness(0),
        }
    }

    fn set_brightness(&self, level: u8) -> Result<(), MatrixError> {
        self.lock().unwrap_or_else(|e| e.into_inner()).set_brightness(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::mock::MockBackend;
    use crate::matrix::{DeviceClient, DEFAULT_BAUD_RATE};
    use std::sync::Arc;

    const PORT: &str = "/dev/ttyACM0";

    fn connected(backend: &MockBackend) -> SharedClient {
        let mut client = DeviceClient::new(Arc::new(backend.clone()), DEFAULT_BAUD_RATE);
        client.connect(PORT).unwrap();
        client.into_shared()
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("warning".parse::<MatrixStatus>().unwrap(), MatrixStatus::Warning);
        assert_eq!("off".parse::<MatrixStatus>().unwrap(), MatrixStatus::Off);
        assert!(matches!("purple".parse::<MatrixStatus>(), Err(DisplayError::UnknownStatus(s)) if s == "purple"));
    }

    #[test]
    fn test_status_patterns_on_wire() {
        let backend = MockBackend::new();
        let client = connected(&backend);

        client.set_status_pattern(MatrixStatus::Normal).unwrap();
        client.set_status_pattern(MatrixStatus::Warning).unwrap();
        client.set_status_pattern(MatrixStatus::Critical).unwrap();
        client.set_status_pattern(MatrixStatus::Off).unwrap();

        assert_eq!(
            backend.frames(PORT),
            vec![
                vec![0x32, 0xAC, 0x01, 0x01],
                vec![0x32, 0xAC, 0x01, 0x04],
                vec![0x32, 0xAC, 0x01, 0x05],
                vec![0x32, 0xAC, 0x00, 0x00],
            ]
        );
    }

    #[test]
    fn test_activity_pattern_on_wire() {
        let backend = MockBackend::new();
        let client = connected(&backend);

        client.set_activity_pattern(true).unwrap();
        client.set_activity_pattern(false).unwrap();

        assert_eq!(
            backend.frames(PORT),
            vec![
                vec![0x32, 0xAC, 0x04, 0x01],
                vec![0x32, 0xAC, 0x01, 0x04],
                vec![0x32, 0xAC, 0x04, 0x00],
                vec![0x32, 0xAC, 0x01, 0x01],
            ]
        );
    }
}
