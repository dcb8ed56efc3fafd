/*
 *  display/error.rs
 *
 *  LyMatrix - metrics in lights
 *  (c) 2020-26 Stuart Hunter
 *
 *  Unified error types for the display subsystem
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
use std::error::Error;

use crate::matrix::MatrixError;

/// Unified error type for all display operations
#[derive(Debug)]
pub enum DisplayError {
    /// The matrix module rejected or never received a command
    Device(MatrixError),

    /// Status string outside normal/warning/critical/off
    UnknownStatus(String),

    /// Metric name the visualizer cannot resolve
    UnknownMetric(String),

    /// Display mode that has no implementation yet
    NotImplemented(String),
}

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayError::Device(err) =>
                write!(f, "Matrix device error: {}", err),
            DisplayError::UnknownStatus(status) =>
                write!(f, "Unknown status '{}' (must be normal, warning, critical or off)", status),
            DisplayError::UnknownMetric(metric) =>
                write!(f, "Unknown metric '{}'", metric),
            DisplayError::NotImplemented(what) =>
                write!(f, "Not implemented: {}", what),
        }
    }
}

impl Error for DisplayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DisplayError::Device(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MatrixError> for DisplayError {
    fn from(err: MatrixError) -> Self {
        DisplayError::Device(err)
    }
}
