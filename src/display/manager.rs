/*
 *  display/manager.rs
 *
 *  LyMatrix - metrics in lights
 *  (c) 2020-26 Stuart Hunter
 *
 *  Display manager - throttles and de-duplicates updates for one module
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
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use log::{debug, trace};
use serde::Serialize;

use crate::display::error::DisplayError;
use crate::display::traits::{BoxedMatrix, MatrixStatus};
use crate::pacer::Pacer;

/// Changes smaller than this are not worth a serial write
pub const MIN_PERCENT_CHANGE: f64 = 1.0;

pub const STATE_ACTIVITY: &str = "activity";
pub const STATE_STATUS: &str = "status";
pub const STATE_BRIGHTNESS: &str = "brightness";

/// Last value written on one logical channel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StateValue {
    Percent(f64),
    Flag(bool),
    Level(u8),
    Text(String),
}

/// Channel name to last written value
pub type DisplayState = HashMap<String, StateValue>;

/// Clamp to 0..=100 and drop the fraction
pub fn percent_byte(value: f64) -> u8 {
    value.clamp(0.0, 100.0) as u8
}

/// Display manager for a single matrix module
///
/// Sits between the visualizers and one module. Percentage and activity
/// updates are rate limited to `update_rate` and percentage updates that
/// barely move are dropped. Status and brightness always go through.
///
/// The state map is behind a read/write lock so it can be inspected while
/// the update loop is writing.
pub struct DisplayManager {
    name: String,
    driver: BoxedMatrix,
    pacer: Mutex<Pacer>,
    state: RwLock<DisplayState>,
}

impl DisplayManager {
    pub fn new(name: &str, driver: BoxedMatrix, update_rate: Duration) -> Self {
        Self {
            name: name.to_string(),
            driver,
            pacer: Mutex::new(Pacer::new(update_rate)),
            state: RwLock::new(DisplayState::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn update_rate(&self) -> Duration {
        self.pacer.lock().unwrap_or_else(|e| e.into_inner()).interval()
    }

    fn stored(&self, key: &str) -> Option<StateValue> {
        self.state.read().unwrap_or_else(|e| e.into_inner()).get(key).cloned()
    }

    fn record(&self, key: &str, value: StateValue) {
        self.state
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value);
    }

    /// Show `value` as a percentage bar under channel `key`.
    pub fn update_percentage(&self, key: &str, value: f64) -> Result<(), DisplayError> {
        let mut pacer = self.pacer.lock().unwrap_or_else(|e| e.into_inner());
        if !pacer.is_due() {
            trace!("[{}] {} throttled", self.name, key);
            return Ok(());
        }

        if let Some(StateValue::Percent(last)) = self.stored(key) {
            if (last - value).abs() < MIN_PERCENT_CHANGE {
                trace!("[{}] {} unchanged ({:.1} -> {:.1})", self.name, key, last, value);
                return Ok(());
            }
        }

        let percent = percent_byte(value);
        self.driver.set_percentage(percent)?;
        debug!("[{}] {} = {}%", self.name, key, percent);

        self.record(key, StateValue::Percent(value));
        pacer.mark();
        Ok(())
    }

    /// Animated pattern while the system is busy.
    pub fn show_activity(&self, active: bool) -> Result<(), DisplayError> {
        let mut pacer = self.pacer.lock().unwrap_or_else(|e| e.into_inner());
        if !pacer.is_due() {
            trace!("[{}] activity throttled", self.name);
            return Ok(());
        }

        self.driver.set_activity_pattern(active)?;
        self.record(STATE_ACTIVITY, StateValue::Flag(active));
        pacer.mark();
        Ok(())
    }

    /// Status pattern, never throttled.
    pub fn show_status(&self, status: &str) -> Result<(), DisplayError> {
        let status: MatrixStatus = status.parse()?;

        self.driver.set_status_pattern(status)?;
        debug!("[{}] status {}", self.name, status);

        self.record(STATE_STATUS, StateValue::Text(status.as_str().to_string()));
        if status == MatrixStatus::Off {
            self.record(STATE_BRIGHTNESS, StateValue::Level(0));
        }
        Ok(())
    }

    /// Brightness changes are rare and go out immediately.
    pub fn set_brightness(&self, level: u8) -> Result<(), DisplayError> {
        self.driver.set_brightness(level)?;
        self.record(STATE_BRIGHTNESS, StateValue::Level(level));
        Ok(())
    }

    /// Copy of the last written values
    pub fn current_state(&self) -> DisplayState {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::mock::{MatrixCall, MockMatrix};

    fn manager(rate: Duration) -> (DisplayManager, MockMatrix) {
        let mock = MockMatrix::new();
        let dm = DisplayManager::new("test", Box::new(mock.clone()), rate);
        (dm, mock)
    }

    #[test]
    fn test_percent_byte_clamps() {
        assert_eq!(percent_byte(150.0), 100);
        assert_eq!(percent_byte(-5.0), 0);
        assert_eq!(percent_byte(75.9), 75);
    }

    #[test]
    fn test_clamps_on_write() {
        let (dm, mock) = manager(Duration::ZERO);
        dm.update_percentage("cpu", 150.0).unwrap();
        dm.update_percentage("memory", -5.0).unwrap();
        assert_eq!(mock.percentages(), vec![100, 0]);
    }

    #[test]
    fn test_throttle_drops_second_update() {
        let (dm, mock) = manager(Duration::from_secs(3600));
        dm.update_percentage("cpu", 10.0).unwrap();
        dm.update_percentage("cpu", 90.0).unwrap();
        dm.update_percentage("memory", 50.0).unwrap();
        assert_eq!(mock.percentages(), vec![10]);
        assert_eq!(dm.current_state().get("cpu"), Some(&StateValue::Percent(10.0)));
    }

    #[test]
    fn test_small_change_suppressed() {
        let (dm, mock) = manager(Duration::ZERO);
        dm.update_percentage("cpu", 50.0).unwrap();
        dm.update_percentage("cpu", 50.9).unwrap();
        dm.update_percentage("cpu", 49.2).unwrap();
        dm.update_percentage("cpu", 51.0).unwrap();
        assert_eq!(mock.percentages(), vec![50, 51]);
    }

    #[test]
    fn test_status_bypasses_throttle() {
        let (dm, mock) = manager(Duration::from_secs(3600));
        dm.update_percentage("cpu", 20.0).unwrap();
        dm.show_status("critical").unwrap();
        dm.show_status("normal").unwrap();
        assert_eq!(
            mock.calls(),
            vec![
                MatrixCall::Percentage(20),
                MatrixCall::Status(MatrixStatus::Critical),
                MatrixCall::Status(MatrixStatus::Normal),
            ]
        );
    }

    #[test]
    fn test_activity_is_throttled() {
        let (dm, mock) = manager(Duration::from_secs(3600));
        dm.show_activity(true).unwrap();
        dm.show_activity(false).unwrap();
        assert_eq!(mock.calls(), vec![MatrixCall::Activity(true)]);
        assert_eq!(dm.current_state().get(STATE_ACTIVITY), Some(&StateValue::Flag(true)));
    }

    #[test]
    fn test_unknown_status() {
        let (dm, mock) = manager(Duration::ZERO);
        assert!(matches!(dm.show_status("meltdown"), Err(DisplayError::UnknownStatus(_))));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_off_records_zero_brightness() {
        let (dm, _mock) = manager(Duration::ZERO);
        dm.set_brightness(200).unwrap();
        dm.show_status("off").unwrap();
        let state = dm.current_state();
        assert_eq!(state.get(STATE_BRIGHTNESS), Some(&StateValue::Level(0)));
        assert_eq!(state.get(STATE_STATUS), Some(&StateValue::Text("off".to_string())));
    }

    #[test]
    fn test_brightness_bypasses_throttle() {
        let (dm, mock) = manager(Duration::from_secs(3600));
        dm.update_percentage("cpu", 20.0).unwrap();
        dm.set_brightness(40).unwrap();
        assert_eq!(mock.calls(), vec![MatrixCall::Percentage(20), MatrixCall::Brightness(40)]);
    }

    #[test]
    fn test_failure_is_wrapped_and_not_recorded() {
        let (dm, mock) = manager(Duration::from_secs(3600));
        mock.set_failing(true);
        assert!(matches!(dm.update_percentage("cpu", 30.0), Err(DisplayError::Device(_))));
        assert!(dm.current_state().is_empty());

        // failed write does not start the throttle window
        mock.set_failing(false);
        dm.update_percentage("cpu", 30.0).unwrap();
        assert_eq!(mock.percentages(), vec![30]);
    }

    #[test]
    fn test_state_snapshot_is_a_copy() {
        let (dm, _mock) = manager(Duration::ZERO);
        dm.update_percentage("cpu", 62.0).unwrap();
        let mut snapshot = dm.current_state();
        snapshot.insert("cpu".into(), StateValue::Percent(0.0));
        assert_eq!(dm.current_state().get("cpu"), Some(&StateValue::Percent(62.0)));
    }
}
