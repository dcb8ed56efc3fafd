/*
 *  matrix/mock.rs
 *
 *  LyMatrix - metrics in lights
 *  (c) 2020-26 Stuart Hunter
 *
 *  In-memory serial backend for testing without hardware
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

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::matrix::error::MatrixError;
use crate::matrix::port::{PortBackend, SerialLink, UsbPortInfo};

/// Mock port backend
///
/// Simulates a set of USB serial ports. Every opened port gets a shared
/// [`MockLinkState`] that records the frames written to it, so tests can
/// check exactly what would have gone over the wire. Link state can be
/// fetched (and failures armed) before the port is opened.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockBackendState>>,
}

#[derive(Debug, Default)]
pub struct MockBackendState {
    /// Ports returned by enumeration, in order
    pub ports: Vec<UsbPortInfo>,

    /// Link state per port name
    pub links: HashMap<String, Arc<Mutex<MockLinkState>>>,

    /// Ports that refuse to open
    pub fail_open: HashSet<String>,

    pub simulate_enumeration_failure: bool,

    /// Number of successful opens
    pub open_count: usize,
}

/// Recorded traffic and failure switches for one port
#[derive(Debug, Default)]
pub struct MockLinkState {
    /// Every frame written, in order
    pub frames: Vec<Vec<u8>>,

    /// Bytes handed out by read()
    pub response: VecDeque<u8>,

    /// Last timeout set on the link
    pub timeout: Option<Duration>,

    pub is_open: bool,
    pub close_count: usize,

    pub simulate_write_failure: bool,
    pub simulate_short_write: bool,
    pub simulate_read_timeout: bool,
    pub simulate_close_failure: bool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend listing the given `(name, vendor_id)` ports
    pub fn with_ports(ports: &[(&str, u16)]) -> Self {
        let backend = Self::new();
        for (name, vid) in ports {
            backend.add_port(name, *vid);
        }
        backend
    }

    pub fn add_port(&self, name: &str, vendor_id: u16) {
        lock(&self.state).ports.push(UsbPortInfo {
            name: name.to_string(),
            vendor_id,
            product_id: 0x0020,
        });
    }

    /// Make opening `port` fail
    pub fn fail_open(&self, port: &str) {
        lock(&self.state).fail_open.insert(port.to_string());
    }

    pub fn fail_enumeration(&self) {
        lock(&self.state).simulate_enumeration_failure = true;
    }

    /// Shared state of the link for `port`, created on first use
    pub fn link(&self, port: &str) -> Arc<Mutex<MockLinkState>> {
        let mut state = lock(&self.state);
        Arc::clone(
            state
                .links
                .entry(port.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(MockLinkState::default()))),
        )
    }

    /// Copy of the frames written to `port`
    pub fn frames(&self, port: &str) -> Vec<Vec<u8>> {
        let link = self.link(port);
        let frames = lock(&link).frames.clone();
        frames
    }

    /// Forget recorded frames on every port
    pub fn clear_frames(&self) {
        let state = lock(&self.state);
        for link in state.links.values() {
            lock(link).frames.clear();
        }
    }

    /// Queue bytes to be returned by reads on `port`
    pub fn queue_response(&self, port: &str, bytes: &[u8]) {
        let link = self.link(port);
        lock(&link).response.extend(bytes.iter().copied());
    }

    pub fn open_count(&self) -> usize {
        lock(&self.state).open_count
    }
}

impl PortBackend for MockBackend {
    fn list_usb_ports(&self) -> Result<Vec<UsbPortInfo>, MatrixError> {
        let state = lock(&self.state);
        if state.simulate_enumeration_failure {
            return Err(MatrixError::Enumeration("simulated enumeration failure".to_string()));
        }
        Ok(state.ports.clone())
    }

    fn open(&self, port: &str, _baud_rate: u32, timeout: Duration) -> Result<Box<dyn SerialLink>, MatrixError> {
        if lock(&self.state).fail_open.contains(port) {
            return Err(MatrixError::Open {
                port: port.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "simulated open failure"),
            });
        }

        let link = self.link(port);
        {
            let mut link_state = lock(&link);
            link_state.is_open = true;
            link_state.timeout = Some(timeout);
        }
        lock(&self.state).open_count += 1;

        Ok(Box::new(MockLink { state: link }))
    }
}

/// Link handed out by [`MockBackend::open`]
#[derive(Debug)]
pub struct MockLink {
    state: Arc<Mutex<MockLinkState>>,
}

impl SerialLink for MockLink {
    fn write(&mut self, frame: &[u8]) -> io::Result<usize> {
        let mut state = lock(&self.state);
        if state.simulate_write_failure {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "simulated write failure"));
        }
        if state.simulate_short_write {
            let written = frame.len().saturating_sub(1);
            state.frames.push(frame[..written].to_vec());
            return Ok(written);
        }
        state.frames.push(frame.to_vec());
        Ok(frame.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = lock(&self.state);
        if state.simulate_read_timeout || state.response.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "simulated read timeout"));
        }
        let mut n = 0;
        while n < buf.len() {
            match state.response.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        lock(&self.state).timeout = Some(timeout);
        Ok(())
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        let mut state = lock(&self.state);
        state.close_count += 1;
        state.is_open = false;
        if state.simulate_close_failure {
            return Err(io::Error::new(io::ErrorKind::Other, "simulated close failure"));
        }
        Ok(())
    }
}
