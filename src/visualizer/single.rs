/*
 *  visualizer/single.rs
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

use std::sync::Arc;
use std::time::Duration;

use log::trace;

use super::{is_active, metric_value, SINGLE_ACTIVITY_CEILING};
use crate::display::{DisplayError, DisplayManager, DisplayMode};
use crate::metrics::StatsSummary;
use crate::pacer::Pacer;

/// Drives one module from the stats summary.
///
/// Status mode shows the status already computed in the summary.
pub struct Visualizer {
    manager: Arc<DisplayManager>,
    mode: DisplayMode,
    primary_metric: String,
    pacer: Pacer,
}

impl Visualizer {
    pub fn new(manager: Arc<DisplayManager>, mode: DisplayMode, primary_metric: &str, update_rate: Duration) -> Self {
        Self {
            manager,
            mode,
            primary_metric: primary_metric.to_string(),
            pacer: Pacer::new(update_rate),
        }
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn manager(&self) -> &Arc<DisplayManager> {
        &self.manager
    }

    pub fn update(&mut self, stats: &StatsSummary) -> Result<(), DisplayError> {
        if !self.pacer.should_update() {
            trace!("visualizer throttled");
            return Ok(());
        }

        match self.mode {
            DisplayMode::Percentage => {
                let value = metric_value(stats, &self.primary_metric, SINGLE_ACTIVITY_CEILING)?;
                self.manager.update_percentage(&self.primary_metric, value)
            }
            DisplayMode::Gradient => self.manager.show_status("normal"),
            DisplayMode::Activity => self.manager.show_activity(is_active(stats)),
            DisplayMode::Status => self.manager.show_status(stats.status.as_str()),
            DisplayMode::Custom => Err(DisplayError::NotImplemented("custom display mode".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::mock::{MatrixCall, MockMatrix};
    use crate::display::MatrixStatus;
    use crate::matrix::mock::MockBackend;
    use crate::matrix::{DeviceClient, DEFAULT_BAUD_RATE};
    use crate::metrics::SystemStatus;

    fn visualizer(mode: DisplayMode, primary: &str, rate: Duration) -> (Visualizer, MockMatrix) {
        let mock = MockMatrix::new();
        let dm = Arc::new(DisplayManager::new("solo", Box::new(mock.clone()), Duration::ZERO));
        (Visualizer::new(dm, mode, primary, rate), mock)
    }

    fn summary(cpu: f64, memory: f64, status: SystemStatus) -> StatsSummary {
        StatsSummary::new(cpu, memory, 0.0, 0.0, status)
    }

    #[test]
    fn test_percentage_end_to_end_frame() {
        let backend = MockBackend::with_ports(&[("/dev/ttyACM0", 0x32AC)]);
        let mut client = DeviceClient::new(Arc::new(backend.clone()), DEFAULT_BAUD_RATE);
        client.connect("").unwrap();
        let dm = Arc::new(DisplayManager::new("solo", Box::new(client.into_shared()), Duration::ZERO));
        let mut viz = Visualizer::new(dm, DisplayMode::Percentage, "cpu", Duration::ZERO);

        viz.update(&summary(75.5, 60.0, SystemStatus::Normal)).unwrap();

        assert_eq!(backend.frames("/dev/ttyACM0"), vec![vec![0x32, 0xAC, 0x01, 0x00, 0x4B]]);
    }

    #[test]
    fn test_percentage_disk_uses_single_ceiling() {
        let (mut viz, mock) = visualizer(DisplayMode::Percentage, "disk", Duration::ZERO);
        let stats = StatsSummary::new(0.0, 0.0, 5.0 * 1024.0 * 1024.0, 0.0, SystemStatus::Normal);
        viz.update(&stats).unwrap();
        assert_eq!(mock.percentages(), vec![50]);
    }

    #[test]
    fn test_gradient_ignores_values() {
        let (mut viz, mock) = visualizer(DisplayMode::Gradient, "cpu", Duration::ZERO);
        viz.update(&summary(99.0, 99.0, SystemStatus::Critical)).unwrap();
        assert_eq!(mock.calls(), vec![MatrixCall::Status(MatrixStatus::Normal)]);
    }

    #[test]
    fn test_status_uses_summary_status() {
        let (mut viz, mock) = visualizer(DisplayMode::Status, "cpu", Duration::ZERO);
        // values say normal, the summary says warning
        viz.update(&summary(5.0, 5.0, SystemStatus::Warning)).unwrap();
        assert_eq!(mock.calls(), vec![MatrixCall::Status(MatrixStatus::Warning)]);
    }

    #[test]
    fn test_activity_mode() {
        let (mut viz, mock) = visualizer(DisplayMode::Activity, "cpu", Duration::ZERO);
        viz.update(&summary(50.0, 0.0, SystemStatus::Normal)).unwrap();
        viz.update(&summary(1.0, 0.0, SystemStatus::Normal)).unwrap();
        assert_eq!(mock.calls(), vec![MatrixCall::Activity(true), MatrixCall::Activity(false)]);
    }

    #[test]
    fn test_custom_not_implemented() {
        let (mut viz, mock) = visualizer(DisplayMode::Custom, "cpu", Duration::ZERO);
        assert!(matches!(viz.update(&StatsSummary::default()), Err(DisplayError::NotImplemented(_))));
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_own_throttle() {
        let (mut viz, mock) = visualizer(DisplayMode::Percentage, "cpu", Duration::from_secs(3600));
        viz.update(&summary(20.0, 0.0, SystemStatus::Normal)).unwrap();
        viz.update(&summary(80.0, 0.0, SystemStatus::Normal)).unwrap();
        assert_eq!(mock.percentages(), vec![20]);
    }

    #[test]
    fn test_unknown_primary_metric() {
        let (mut viz, _mock) = visualizer(DisplayMode::Percentage, "gpu", Duration::ZERO);
        assert!(matches!(viz.update(&StatsSummary::default()), Err(DisplayError::UnknownMetric(_))));
    }
}
