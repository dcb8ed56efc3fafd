/*
 *  display/mock.rs
 *
 *  LyMatrix - metrics in lights
 *  (c) 2020-26 Stuart Hunter
 *
 *  Mock matrix for testing the display layer without a serial port
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

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::display::traits::{MatrixDriver, MatrixStatus};
use crate::matrix::MatrixError;

/// One recorded capability call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixCall {
    Percentage(u8),
    Activity(bool),
    Status(MatrixStatus),
    Brightness(u8),
}

/// Mock matrix
///
/// Records every call and can be told to fail. Clones share state so a
/// test can keep one copy for inspection after boxing the other.
#[derive(Debug, Clone, Default)]
pub struct MockMatrix {
    state: Arc<Mutex<MockMatrixState>>,
}

#[derive(Debug, Default)]
pub struct MockMatrixState {
    /// Calls in order
    pub calls: Vec<MatrixCall>,

    /// Simulate a dead serial link
    pub simulate_failure: bool,
}

impl MockMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockMatrixState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn calls(&self) -> Vec<MatrixCall> {
        self.lock().calls.clone()
    }

    /// Percentages written, in order
    pub fn percentages(&self) -> Vec<u8> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                MatrixCall::Percentage(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    pub fn set_failing(&self, failing: bool) {
        self.lock().simulate_failure = failing;
    }

    pub fn reset(&self) {
        *self.lock() = MockMatrixState::default();
    }

    fn record(&self, call: MatrixCall) -> Result<(), MatrixError> {
        let mut state = self.lock();
        if state.simulate_failure {
            return Err(MatrixError::Write(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "simulated matrix failure",
            )));
        }
        state.calls.push(call);
        Ok(())
    }
}

impl MatrixDriver for MockMatrix {
    fn set_percentage(&self, percent: u8) -> Result<(), MatrixError> {
        self.record(MatrixCall::Percentage(percent))
    }

    fn set_activity_pattern(&self, active: bool) -> Result<(), MatrixError> {
        self.record(MatrixCall::Activity(active))
    }

    fn set_status_pattern(&self, status: MatrixStatus) -> Result<(), MatrixError> {
        self.record(MatrixCall::Status(status))
    }

    fn set_brightness(&self, level: u8) -> Result<(), MatrixError> {
        self.record(MatrixCall::Brightness(level))
    }
}
