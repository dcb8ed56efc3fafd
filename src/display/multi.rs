/*
 *  display/multi.rs
 *
 *  LyMatrix - metrics in lights
 *  (c) 2020-26 Stuart Hunter
 *
 *  Routes metric updates across two or more matrix modules
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

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{info, trace, warn};

use super::DualMode;
use crate::display::error::DisplayError;
use crate::display::manager::{DisplayManager, DisplayState};
use crate::matrix::DeviceRegistry;

/// Metric an unassigned module falls back to in split mode
pub const FALLBACK_METRIC: &str = "cpu";

/// Split-mode routing rule for one module
pub fn wants_metric(assigned: &[String], metric: &str) -> bool {
    if assigned.is_empty() {
        return metric == FALLBACK_METRIC;
    }
    assigned.iter().any(|m| m == metric)
}

/// One display manager per registered module plus the dual mode policy.
///
/// Fan-out has no defined order. Every module is attempted even after
/// a failure and the last error is returned.
pub struct MultiDisplayManager {
    registry: Arc<DeviceRegistry>,
    managers: HashMap<String, Arc<DisplayManager>>,
    mode: DualMode,
}

impl MultiDisplayManager {
    pub fn new(registry: Arc<DeviceRegistry>, mode: DualMode, update_rate: Duration) -> Self {
        let managers = registry
            .clients()
            .into_iter()
            .map(|(name, client)| {
                let manager = DisplayManager::new(&name, Box::new(client), update_rate);
                (name, Arc::new(manager))
            })
            .collect::<HashMap<_, _>>();

        if matches!(mode, DualMode::Extended | DualMode::Independent) {
            // no dedicated behaviour yet, these route exactly like split
            info!("dual mode {:?} currently behaves like split", mode);
        }
        info!("multi display over {} module(s), mode {:?}", managers.len(), mode);

        Self { registry, managers, mode }
    }

    pub fn mode(&self) -> DualMode {
        self.mode
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn manager(&self, name: &str) -> Option<Arc<DisplayManager>> {
        self.managers.get(name).cloned()
    }

    pub fn device_count(&self) -> usize {
        self.managers.len()
    }

    pub fn has_multiple_devices(&self) -> bool {
        self.managers.len() > 1
    }

    /// Route one metric update according to the dual mode.
    ///
    /// `current` holds this tick's value of every metric, used for tracing
    /// what a skipped module is assigned instead.
    pub fn update_metric(&self, metric: &str, value: f64, current: &HashMap<String, f64>) -> Result<(), DisplayError> {
        match self.mode {
            DualMode::Mirror => self.broadcast(|dm| dm.update_percentage(metric, value)),
            DualMode::Split | DualMode::Extended | DualMode::Independent => {
                self.update_split(metric, value, current)
            }
        }
    }

    fn update_split(&self, metric: &str, value: f64, current: &HashMap<String, f64>) -> Result<(), DisplayError> {
        let mut last_err = None;

        for (name, dm) in &self.managers {
            let assigned = self.registry.metrics_for(name);
            if !wants_metric(&assigned, metric) {
                trace!(
                    "[{}] skips {} (shows {:?})",
                    name,
                    metric,
                    assigned.iter().map(|m| (m.as_str(), current.get(m).copied())).collect::<Vec<_>>()
                );
                continue;
            }
            if let Err(e) = dm.update_percentage(metric, value) {
                warn!("[{}] {} update failed: {}", name, metric, e);
                last_err = Some(e);
            }
        }

        last_err.map_or(Ok(()), Err)
    }

    pub fn update_activity(&self, active: bool) -> Result<(), DisplayError> {
        self.broadcast(|dm| dm.show_activity(active))
    }

    pub fn update_status(&self, status: &str) -> Result<(), DisplayError> {
        self.broadcast(|dm| dm.show_status(status))
    }

    pub fn set_brightness(&self, level: u8) -> Result<(), DisplayError> {
        self.broadcast(|dm| dm.set_brightness(level))
    }

    /// State snapshot of every module
    pub fn current_states(&self) -> HashMap<String, DisplayState> {
        self.managers
            .iter()
            .map(|(name, dm)| (name.clone(), dm.current_state()))
            .collect()
    }

    fn broadcast<F>(&self, op: F) -> Result<(), DisplayError>
    where
        F: Fn(&DisplayManager) -> Result<(), DisplayError>,
    {
        let mut last_err = None;
        for (name, dm) in &self.managers {
            if let Err(e) = op(dm) {
                warn!("[{}] update failed: {}", name, e);
                last_err = Some(e);
            }
        }
        last_err.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeviceConfig, DeviceRole};
    use crate::matrix::mock::MockBackend;
    use crate::matrix::DEFAULT_BAUD_RATE;

    const LEFT: &str = "/dev/ttyACM0";
    const RIGHT: &str = "/dev/ttyACM1";

    fn device(name: &str, metrics: &[&str]) -> DeviceConfig {
        DeviceConfig {
            name: name.to_string(),
            port: String::new(),
            role: DeviceRole::None,
            brightness: 100,
            metrics: metrics.iter().map(|m| m.to_string()).collect(),
        }
    }

    fn setup(mode: DualMode, left: &[&str], right: &[&str]) -> (MultiDisplayManager, MockBackend) {
        let backend = MockBackend::with_ports(&[(LEFT, 0x32AC), (RIGHT, 0x32AC)]);
        let registry = Arc::new(DeviceRegistry::new(Arc::new(backend.clone())));
        registry
            .discover_and_connect(&[device("left", left), device("right", right)], DEFAULT_BAUD_RATE)
            .unwrap();
        backend.clear_frames();
        (MultiDisplayManager::new(registry, mode, Duration::ZERO), backend)
    }

    fn percent_frames(backend: &MockBackend, port: &str) -> Vec<u8> {
        backend
            .frames(port)
            .into_iter()
            .filter(|f| f[2] == 0x01 && f[3] == 0x00)
            .map(|f| f[4])
            .collect()
    }

    #[test]
    fn test_wants_metric() {
        assert!(wants_metric(&[], "cpu"));
        assert!(!wants_metric(&[], "memory"));
        assert!(wants_metric(&["memory".into()], "memory"));
        assert!(!wants_metric(&["memory".into()], "cpu"));
    }

    #[test]
    fn test_mirror_writes_every_module() {
        let (multi, backend) = setup(DualMode::Mirror, &["memory"], &["disk"]);
        multi.update_metric("cpu", 50.0, &HashMap::new()).unwrap();
        assert_eq!(percent_frames(&backend, LEFT), vec![50]);
        assert_eq!(percent_frames(&backend, RIGHT), vec![50]);
    }

    #[test]
    fn test_split_routes_by_assignment() {
        let (multi, backend) = setup(DualMode::Split, &["memory"], &["cpu", "disk"]);
        multi.update_metric("cpu", 30.0, &HashMap::new()).unwrap();
        multi.update_metric("memory", 60.0, &HashMap::new()).unwrap();
        assert_eq!(percent_frames(&backend, LEFT), vec![60]);
        assert_eq!(percent_frames(&backend, RIGHT), vec![30]);
    }

    #[test]
    fn test_split_unassigned_module_falls_back_to_cpu() {
        let (multi, backend) = setup(DualMode::Split, &[], &["memory"]);
        multi.update_metric("cpu", 42.0, &HashMap::new()).unwrap();
        multi.update_metric("network", 10.0, &HashMap::new()).unwrap();
        assert_eq!(percent_frames(&backend, LEFT), vec![42]);
        assert!(percent_frames(&backend, RIGHT).is_empty());
    }

    #[test]
    fn test_extended_and_independent_route_like_split() {
        for mode in [DualMode::Extended, DualMode::Independent] {
            let (multi, backend) = setup(mode, &["memory"], &["cpu"]);
            multi.update_metric("cpu", 70.0, &HashMap::new()).unwrap();
            assert!(percent_frames(&backend, LEFT).is_empty());
            assert_eq!(percent_frames(&backend, RIGHT), vec![70]);
        }
    }

    #[test]
    fn test_failure_does_not_stop_fan_out() {
        let (multi, backend) = setup(DualMode::Mirror, &[], &[]);
        backend.link(LEFT).lock().unwrap().simulate_write_failure = true;

        let result = multi.update_metric("cpu", 55.0, &HashMap::new());
        assert!(matches!(result, Err(DisplayError::Device(_))));
        assert_eq!(percent_frames(&backend, RIGHT), vec![55]);
    }

    #[test]
    fn test_status_broadcast() {
        let (multi, backend) = setup(DualMode::Split, &["memory"], &["disk"]);
        multi.update_status("warning").unwrap();
        assert_eq!(backend.frames(LEFT), vec![vec![0x32, 0xAC, 0x01, 0x04]]);
        assert_eq!(backend.frames(RIGHT), vec![vec![0x32, 0xAC, 0x01, 0x04]]);
        assert!(matches!(multi.update_status("bogus"), Err(DisplayError::UnknownStatus(_))));
    }

    #[test]
    fn test_current_states_per_module() {
        let (multi, _backend) = setup(DualMode::Mirror, &[], &[]);
        multi.update_activity(true).unwrap();
        let states = multi.current_states();
        assert_eq!(states.len(), 2);
        assert!(states.values().all(|s| s.contains_key("activity")));
        assert!(multi.has_multiple_devices());
    }
}
