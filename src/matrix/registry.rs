/*
 *  matrix/registry.rs
 *
 *  LyMatrix - metrics in lights
 *  (c) 2020-26 Stuart Hunter
 *
 *  Named collection of matrix clients and their configuration
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

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use log::{info, warn};

use crate::config::{DeviceConfig, DeviceRole};
use crate::matrix::client::{DeviceClient, SharedClient};
use crate::matrix::error::{DisconnectFailures, MatrixError};
use crate::matrix::port::PortBackend;

/// Every connected matrix module by name.
///
/// Both maps are only handed out as copies. The clients inside are shared
/// handles, so a copy of the map still reaches the same serial ports.
pub struct DeviceRegistry {
    backend: Arc<dyn PortBackend>,
    clients: RwLock<HashMap<String, SharedClient>>,
    configs: RwLock<HashMap<String, DeviceConfig>>,
}

impl DeviceRegistry {
    pub fn new(backend: Arc<dyn PortBackend>) -> Self {
        Self {
            backend,
            clients: RwLock::new(HashMap::new()),
            configs: RwLock::new(HashMap::new()),
        }
    }

    /// Connect every configured device that can be reached.
    ///
    /// Ports are enumerated once. A device with an explicit port uses it,
    /// otherwise it takes the next unclaimed discovered port. Devices without
    /// a port or that fail to open are skipped. Only when nothing connects is
    /// this an error. Returns the number of connected devices.
    pub fn discover_and_connect(&self, configs: &[DeviceConfig], baud_rate: u32) -> Result<usize, MatrixError> {
        let discovered = match self.backend.list_usb_ports() {
            Ok(ports) => ports,
            Err(e) => {
                warn!("port discovery failed, only explicit ports will be used: {}", e);
                Vec::new()
            }
        };

        let claimed: HashSet<&str> = configs
            .iter()
            .filter(|c| !c.port.is_empty())
            .map(|c| c.port.as_str())
            .collect();
        let mut free_ports = discovered
            .iter()
            .map(|p| p.name.as_str())
            .filter(|name| !claimed.contains(name));

        let mut clients = HashMap::new();
        let mut connected = HashMap::new();

        for cfg in configs {
            if connected.contains_key(&cfg.name) {
                warn!("duplicate matrix name '{}' ignored", cfg.name);
                continue;
            }

            let port = if cfg.port.is_empty() {
                match free_ports.next() {
                    Some(p) => p.to_string(),
                    None => {
                        warn!("no port available for matrix '{}', skipping", cfg.name);
                        continue;
                    }
                }
            } else {
                cfg.port.clone()
            };

            let mut client = DeviceClient::new(Arc::clone(&self.backend), baud_rate);
            if let Err(e) = client.connect(&port) {
                warn!("matrix '{}' on {} failed to connect: {}", cfg.name, port, e);
                continue;
            }

            if let Err(e) = client.set_brightness(cfg.brightness) {
                warn!("matrix '{}' rejected brightness {}: {}", cfg.name, cfg.brightness, e);
            }

            info!("matrix '{}' ready on {} (role {:?}, metrics {:?})", cfg.name, port, cfg.role, cfg.metrics);

            let mut resolved = cfg.clone();
            resolved.port = port;
            clients.insert(cfg.name.clone(), client.into_shared());
            connected.insert(cfg.name.clone(), resolved);
        }

        if clients.is_empty() {
            return Err(MatrixError::NoDevicesConnected);
        }

        let count = clients.len();
        info!("{} of {} matrix module(s) connected", count, configs.len());

        self.clients.write().unwrap_or_else(|e| e.into_inner()).extend(clients);
        self.configs.write().unwrap_or_else(|e| e.into_inner()).extend(connected);
        Ok(count)
    }

    /// Copy of the client map
    pub fn clients(&self) -> HashMap<String, SharedClient> {
        self.clients.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Copy of the configuration map
    pub fn configs(&self) -> HashMap<String, DeviceConfig> {
        self.configs.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn client(&self, name: &str) -> Option<SharedClient> {
        self.clients.read().unwrap_or_else(|e| e.into_inner()).get(name).cloned()
    }

    pub fn config(&self, name: &str) -> Option<DeviceConfig> {
        self.configs.read().unwrap_or_else(|e| e.into_inner()).get(name).cloned()
    }

    /// Metrics assigned to a device, empty when none or unknown
    pub fn metrics_for(&self, name: &str) -> Vec<String> {
        self.configs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .map(|c| c.metrics.clone())
            .unwrap_or_default()
    }

    pub fn device_count(&self) -> usize {
        self.clients.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn has_multiple_devices(&self) -> bool {
        self.device_count() > 1
    }

    /// Name of the primary device, else the first name in sort order
    pub fn primary(&self) -> Option<String> {
        let configs = self.configs.read().unwrap_or_else(|e| e.into_inner());
        configs
            .values()
            .find(|c| c.role == DeviceRole::Primary)
            .map(|c| c.name.clone())
            .or_else(|| configs.keys().min().cloned())
    }

    /// Disconnect every device, collecting all failures.
    pub fn disconnect(&self) -> Result<(), MatrixError> {
        let mut failures = DisconnectFailures::default();

        for (name, client) in self.clients() {
            let mut client = client.lock().unwrap_or_else(|e| e.into_inner());
            if let Err(e) = client.disconnect() {
                warn!("matrix '{}' failed to disconnect: {}", name, e);
                failures.push(&name, e);
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(MatrixError::Disconnect(failures))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::client::DEFAULT_BAUD_RATE;
    use crate::matrix::mock::MockBackend;

    fn device(name: &str, port: &str, metrics: &[&str]) -> DeviceConfig {
        DeviceConfig {
            name: name.to_string(),
            port: port.to_string(),
            role: DeviceRole::None,
            brightness: 100,
            metrics: metrics.iter().map(|m| m.to_string()).collect(),
        }
    }

    fn registry(backend: &MockBackend) -> DeviceRegistry {
        DeviceRegistry::new(Arc::new(backend.clone()))
    }

    #[test]
    fn test_auto_assigns_ports_by_position() {
        let backend = MockBackend::with_ports(&[("/dev/ttyACM0", 0x32AC), ("/dev/ttyACM1", 0x32AC)]);
        let reg = registry(&backend);

        let n = reg
            .discover_and_connect(&[device("left", "", &["cpu"]), device("right", "", &["memory"])], DEFAULT_BAUD_RATE)
            .unwrap();

        assert_eq!(n, 2);
        assert_eq!(reg.config("left").unwrap().port, "/dev/ttyACM0");
        assert_eq!(reg.config("right").unwrap().port, "/dev/ttyACM1");
        assert!(reg.has_multiple_devices());
    }

    #[test]
    fn test_explicit_port_not_reassigned() {
        let backend = MockBackend::with_ports(&[("/dev/ttyACM0", 0x32AC), ("/dev/ttyACM1", 0x32AC)]);
        let reg = registry(&backend);

        reg.discover_and_connect(
            &[device("auto", "", &[]), device("fixed", "/dev/ttyACM0", &[])],
            DEFAULT_BAUD_RATE,
        )
        .unwrap();

        assert_eq!(reg.config("auto").unwrap().port, "/dev/ttyACM1");
        assert_eq!(reg.config("fixed").unwrap().port, "/dev/ttyACM0");
    }

    #[test]
    fn test_brightness_applied_on_connect() {
        let backend = MockBackend::with_ports(&[("/dev/ttyACM0", 0x32AC)]);
        let reg = registry(&backend);
        reg.discover_and_connect(&[device("solo", "", &[])], DEFAULT_BAUD_RATE).unwrap();
        assert_eq!(backend.frames("/dev/ttyACM0"), vec![vec![0x32, 0xAC, 0x00, 100]]);
    }

    #[test]
    fn test_device_without_port_is_skipped() {
        let backend = MockBackend::with_ports(&[("/dev/ttyACM0", 0x32AC)]);
        let reg = registry(&backend);

        let n = reg
            .discover_and_connect(&[device("a", "", &[]), device("b", "", &[])], DEFAULT_BAUD_RATE)
            .unwrap();
        assert_eq!(n, 1);
        assert!(reg.client("a").is_some());
        assert!(reg.client("b").is_none());
        assert!(!reg.has_multiple_devices());
    }

    #[test]
    fn test_enumeration_failure_still_uses_explicit_ports() {
        let backend = MockBackend::new();
        backend.fail_enumeration();
        let reg = registry(&backend);
        let n = reg.discover_and_connect(&[device("a", "/dev/ttyUSB0", &[])], DEFAULT_BAUD_RATE).unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn test_primary_role_lookup() {
        let backend = MockBackend::with_ports(&[("/dev/ttyACM0", 0x32AC), ("/dev/ttyACM1", 0x32AC)]);
        let reg = registry(&backend);
        let mut b = device("b", "", &[]);
        b.role = DeviceRole::Primary;
        reg.discover_and_connect(&[device("a", "", &[]), b], DEFAULT_BAUD_RATE).unwrap();
        assert_eq!(reg.primary().as_deref(), Some("b"));
    }

    #[test]
    fn test_snapshots_are_copies() {
        let backend = MockBackend::with_ports(&[("/dev/ttyACM0", 0x32AC)]);
        let reg = registry(&backend);
        reg.discover_and_connect(&[device("a", "", &["cpu"])], DEFAULT_BAUD_RATE).unwrap();

        let mut configs = reg.configs();
        configs.clear();
        let mut clients = reg.clients();
        clients.clear();

        assert_eq!(reg.device_count(), 1);
        assert_eq!(reg.metrics_for("a"), vec!["cpu".to_string()]);
    }
}
