/*
 *  app.rs
 *
 *  LyMatrix - metrics in lights
 *	(c) 2020-26 Stuart Hunter
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */
//! Startup and shutdown of the matrix modules, independent of the runtime.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::Settings;
use crate::display::{DisplayError, DisplayManager, MultiDisplayManager};
use crate::matrix::{DeviceClient, DeviceRegistry, MatrixError, PortBackend, SharedClient};
use crate::metrics::StatsSummary;
use crate::visualizer::{MultiVisualizer, Visualizer};

/// Whatever startup managed to bring up
pub enum Matrices {
    Single { viz: Visualizer, client: SharedClient },
    Multi(MultiVisualizer),
}

impl Matrices {
    pub fn is_multi(&self) -> bool {
        matches!(self, Matrices::Multi(_))
    }

    pub fn update(&mut self, stats: &StatsSummary) -> Result<(), DisplayError> {
        match self {
            Matrices::Single { viz, .. } => viz.update(stats),
            Matrices::Multi(viz) => viz.update(stats),
        }
    }

    /// Blank every module, log what was last shown, then let go of the ports.
    ///
    /// A failed blank is only logged, the ports are closed regardless.
    pub fn shutdown(&self) -> Result<(), MatrixError> {
        match self {
            Matrices::Single { viz, client } => {
                let manager = viz.manager();
                if let Err(e) = manager.show_status("off") {
                    warn!("failed to blank matrix: {}", e);
                }
                log_state(&manager.current_state());
                client.lock().unwrap_or_else(|e| e.into_inner()).disconnect()
            }
            Matrices::Multi(viz) => {
                let display = viz.display();
                if let Err(e) = display.update_status("off") {
                    warn!("failed to blank every matrix: {}", e);
                }
                log_state(&display.current_states());
                display.registry().disconnect()
            }
        }
    }
}

fn log_state<T: serde::Serialize>(state: &T) {
    match serde_json::to_string(state) {
        Ok(json) => info!("final display state: {}", json),
        Err(e) => warn!("cannot serialise display state: {}", e),
    }
}

/// Single module on the configured (or discovered) port
pub fn setup_single(backend: Arc<dyn PortBackend>, settings: &Settings) -> Result<Matrices, MatrixError> {
    // a lone device entry still supplies its port and brightness
    let (port, brightness) = match settings.devices.as_slice() {
        [only] => (only.port.clone(), only.brightness),
        _ => (settings.port.clone(), settings.brightness),
    };

    let mut client = DeviceClient::new(backend, settings.baud_rate);
    client.connect(&port)?;
    client.set_brightness(brightness)?;

    match client.version() {
        Ok(v) => info!("matrix firmware {} on {}", v, client.port_name()),
        Err(e) => debug!("no firmware version from {}: {}", client.port_name(), e),
    }

    let client = client.into_shared();
    let manager = Arc::new(DisplayManager::new("matrix", Box::new(client.clone()), settings.update_rate));
    let viz = Visualizer::new(manager, settings.display_mode, &settings.primary_metric, settings.update_rate);
    Ok(Matrices::Single { viz, client })
}

/// Every configured module
pub fn setup_multi(backend: Arc<dyn PortBackend>, settings: &Settings) -> Result<Matrices, MatrixError> {
    let registry = Arc::new(DeviceRegistry::new(backend));
    registry.discover_and_connect(&settings.devices, settings.baud_rate)?;

    let display = Arc::new(MultiDisplayManager::new(registry, settings.dual_mode, settings.update_rate));
    Ok(Matrices::Multi(MultiVisualizer::new(
        display,
        settings.display_mode,
        &settings.primary_metric,
        settings.update_rate,
        settings.warning_threshold,
        settings.critical_threshold,
    )))
}

/// Multi-module setup when configured, falling back to a single module
/// when not one of the configured modules connects.
pub fn setup(backend: Arc<dyn PortBackend>, settings: &Settings) -> Result<Matrices, MatrixError> {
    if !settings.is_multi_device() {
        return setup_single(backend, settings);
    }
    match setup_multi(Arc::clone(&backend), settings) {
        Ok(m) => Ok(m),
        Err(e) => {
            warn!("multi-device setup failed ({}), falling back to single device mode", e);
            setup_single(backend, settings)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DeviceConfig, DeviceRole};
    use crate::matrix::mock::MockBackend;

    const ACM0: &str = "/dev/ttyACM0";
    const ACM1: &str = "/dev/ttyACM1";
    const OFF: [u8; 4] = [0x32, 0xAC, 0x00, 0x00];

    fn device(name: &str, port: &str) -> DeviceConfig {
        DeviceConfig {
            name: name.to_string(),
            port: port.to_string(),
            role: DeviceRole::None,
            brightness: 100,
            metrics: Vec::new(),
        }
    }

    fn settings(devices: Vec<DeviceConfig>) -> Settings {
        let mut s = Config::default().settings();
        s.devices = devices;
        s
    }

    #[test]
    fn test_single_when_one_device() {
        let backend = MockBackend::with_ports(&[(ACM0, 0x32AC)]);
        let m = setup(Arc::new(backend.clone()), &settings(Vec::new())).unwrap();
        assert!(!m.is_multi());
        // configured brightness, then the version query
        assert_eq!(backend.frames(ACM0)[0], vec![0x32, 0xAC, 0x00, 128]);
    }

    #[test]
    fn test_multi_when_devices_connect() {
        let backend = MockBackend::with_ports(&[(ACM0, 0x32AC), (ACM1, 0x32AC)]);
        let m = setup(Arc::new(backend), &settings(vec![device("a", ""), device("b", "")])).unwrap();
        assert!(m.is_multi());
    }

    #[test]
    fn test_falls_back_to_single_when_every_device_fails() {
        let backend = MockBackend::with_ports(&[(ACM0, 0x32AC)]);
        backend.fail_open("/dev/ttyUSB8");
        backend.fail_open("/dev/ttyUSB9");
        let s = settings(vec![device("a", "/dev/ttyUSB8"), device("b", "/dev/ttyUSB9")]);

        let m = setup(Arc::new(backend.clone()), &s).unwrap();
        assert!(!m.is_multi());
        assert!(backend.link(ACM0).lock().unwrap().is_open);
    }

    #[test]
    fn test_fallback_error_when_nothing_connects() {
        let backend = MockBackend::new();
        backend.fail_open("/dev/ttyUSB8");
        let s = settings(vec![device("a", "/dev/ttyUSB8"), device("b", "/dev/ttyUSB8")]);
        assert!(matches!(setup(Arc::new(backend), &s), Err(MatrixError::NoPortFound)));
    }

    #[test]
    fn test_single_shutdown_blanks_and_closes() {
        let backend = MockBackend::with_ports(&[(ACM0, 0x32AC)]);
        let m = setup(Arc::new(backend.clone()), &settings(Vec::new())).unwrap();
        backend.clear_frames();

        m.shutdown().unwrap();

        assert_eq!(backend.frames(ACM0), vec![OFF.to_vec()]);
        let link = backend.link(ACM0);
        let state = link.lock().unwrap();
        assert!(!state.is_open);
        assert_eq!(state.close_count, 1);
    }

    #[test]
    fn test_multi_shutdown_blanks_and_closes_every_device() {
        let backend = MockBackend::with_ports(&[(ACM0, 0x32AC), (ACM1, 0x32AC)]);
        let m = setup(Arc::new(backend.clone()), &settings(vec![device("a", ""), device("b", "")])).unwrap();
        backend.clear_frames();

        m.shutdown().unwrap();

        for port in [ACM0, ACM1] {
            assert_eq!(backend.frames(port), vec![OFF.to_vec()]);
            let link = backend.link(port);
            let state = link.lock().unwrap();
            assert!(!state.is_open);
            assert_eq!(state.close_count, 1);
        }
    }

    #[test]
    fn test_shutdown_closes_even_when_blank_fails() {
        let backend = MockBackend::with_ports(&[(ACM0, 0x32AC), (ACM1, 0x32AC)]);
        let m = setup(Arc::new(backend.clone()), &settings(vec![device("a", ""), device("b", "")])).unwrap();
        backend.link(ACM0).lock().unwrap().simulate_write_failure = true;

        m.shutdown().unwrap();

        assert!(!backend.link(ACM0).lock().unwrap().is_open);
        assert!(!backend.link(ACM1).lock().unwrap().is_open);
    }
}
