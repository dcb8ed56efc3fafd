/*
 *  visualizer/multi.rs
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

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{trace, warn};

use super::{is_active, metric_value, MULTI_ACTIVITY_CEILING};
use crate::display::{DisplayError, DisplayMode, DualMode, MultiDisplayManager};
use crate::metrics::{status_for, StatsSummary, METRIC_NAMES};
use crate::pacer::Pacer;

/// Drives every module through the multi display manager.
///
/// Unlike the single visualizer, status mode recomputes the status from
/// its own warning/critical thresholds instead of trusting the summary.
pub struct MultiVisualizer {
    display: Arc<MultiDisplayManager>,
    mode: DisplayMode,
    primary_metric: String,
    warning: f64,
    critical: f64,
    pacer: Pacer,
}

impl MultiVisualizer {
    pub fn new(
        display: Arc<MultiDisplayManager>,
        mode: DisplayMode,
        primary_metric: &str,
        update_rate: Duration,
        warning: f64,
        critical: f64,
    ) -> Self {
        Self {
            display,
            mode,
            primary_metric: primary_metric.to_string(),
            warning,
            critical,
            pacer: Pacer::new(update_rate),
        }
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn display(&self) -> &Arc<MultiDisplayManager> {
        &self.display
    }

    pub fn update(&mut self, stats: &StatsSummary) -> Result<(), DisplayError> {
        if !self.pacer.should_update() {
            trace!("multi visualizer throttled");
            return Ok(());
        }

        match self.mode {
            DisplayMode::Percentage => self.update_percentages(stats),
            DisplayMode::Gradient => self.display.update_status("normal"),
            DisplayMode::Activity => self.display.update_activity(is_active(stats)),
            DisplayMode::Status => {
                let status = status_for(stats.cpu_usage, stats.memory_usage, self.warning, self.critical);
                self.display.update_status(status.as_str())
            }
            DisplayMode::Custom => Err(DisplayError::NotImplemented("custom display mode".to_string())),
        }
    }

    fn update_percentages(&self, stats: &StatsSummary) -> Result<(), DisplayError> {
        let current = METRIC_NAMES
            .iter()
            .map(|m| Ok((m.to_string(), metric_value(stats, m, MULTI_ACTIVITY_CEILING)?)))
            .collect::<Result<HashMap<_, _>, DisplayError>>()?;

        if self.display.mode() == DualMode::Mirror {
            let value = metric_value(stats, &self.primary_metric, MULTI_ACTIVITY_CEILING)?;
            return self.display.update_metric(&self.primary_metric, value, &current);
        }

        // every metric goes out, each module picks up the ones assigned to it
        let mut last_err = None;
        for metric in METRIC_NAMES {
            let value = current.get(metric).copied().unwrap_or_default();
            if let Err(e) = self.display.update_metric(metric, value, &current) {
                warn!("{} update failed: {}", metric, e);
                last_err = Some(e);
            }
        }
        last_err.map_or(Ok(()), Err)
    }
}
