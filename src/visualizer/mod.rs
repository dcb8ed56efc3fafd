/*
 *  visualizer/mod.rs
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
//! metric visualizations - turn a stats summary into matrix updates
//!

pub mod single;
pub mod multi;

pub use multi::MultiVisualizer;
pub use single::Visualizer;

use crate::display::DisplayError;
use crate::metrics::StatsSummary;

const MIB: f64 = 1024.0 * 1024.0;

/// Disk/network rate shown as a full bar by the single-module visualizer
pub const SINGLE_ACTIVITY_CEILING: f64 = 10.0 * MIB;
/// Disk/network rate shown as a full bar when driving several modules
pub const MULTI_ACTIVITY_CEILING: f64 = 100.0 * MIB;

/// Disk or network bytes per second that count as busy
pub const ACTIVITY_BYTES_THRESHOLD: f64 = 1024.0;
/// CPU percentage that counts as busy
pub const ACTIVITY_CPU_THRESHOLD: f64 = 10.0;

/// Bytes per second as a percentage of `ceiling`, capped at 100
pub fn normalize_rate(bytes_per_sec: f64, ceiling: f64) -> f64 {
    (bytes_per_sec / ceiling * 100.0).min(100.0)
}

/// Display value of a metric. Rates are normalized against `ceiling`.
pub fn metric_value(stats: &StatsSummary, metric: &str, ceiling: f64) -> Result<f64, DisplayError> {
    match metric {
        "cpu" => Ok(stats.cpu_usage),
        "memory" => Ok(stats.memory_usage),
        "disk" => Ok(normalize_rate(stats.disk_activity, ceiling)),
        "network" => Ok(normalize_rate(stats.network_activity, ceiling)),
        other => Err(DisplayError::UnknownMetric(other.to_string())),
    }
}

/// Busy when the cpu or either byte rate is over its threshold
pub fn is_active(stats: &StatsSummary) -> bool {
    stats.cpu_usage > ACTIVITY_CPU_THRESHOLD
        || stats.disk_activity > ACTIVITY_BYTES_THRESHOLD
        || stats.network_activity > ACTIVITY_BYTES_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::SystemStatus;

    fn stats(cpu: f64, disk: f64, net: f64) -> StatsSummary {
        StatsSummary::new(cpu, 40.0, disk, net, SystemStatus::Normal)
    }

    #[test]
    fn test_normalize_rate() {
        assert_eq!(normalize_rate(5.0 * MIB, SINGLE_ACTIVITY_CEILING), 50.0);
        assert_eq!(normalize_rate(50.0 * MIB, SINGLE_ACTIVITY_CEILING), 100.0);
        assert_eq!(normalize_rate(50.0 * MIB, MULTI_ACTIVITY_CEILING), 50.0);
    }

    #[test]
    fn test_metric_value() {
        let s = stats(33.0, 1.0 * MIB, 0.0);
        assert_eq!(metric_value(&s, "cpu", SINGLE_ACTIVITY_CEILING).unwrap(), 33.0);
        assert_eq!(metric_value(&s, "memory", SINGLE_ACTIVITY_CEILING).unwrap(), 40.0);
        assert_eq!(metric_value(&s, "disk", SINGLE_ACTIVITY_CEILING).unwrap(), 10.0);
        assert!(matches!(
            metric_value(&s, "gpu", SINGLE_ACTIVITY_CEILING),
            Err(DisplayError::UnknownMetric(m)) if m == "gpu"
        ));
    }

    #[test]
    fn test_is_active() {
        assert!(!is_active(&stats(5.0, 100.0, 100.0)));
        assert!(is_active(&stats(10.5, 0.0, 0.0)));
        assert!(is_active(&stats(0.0, 2048.0, 0.0)));
        assert!(is_active(&stats(0.0, 0.0, 1025.0)));
        assert!(!is_active(&stats(10.0, 1024.0, 1024.0)));
    }
}
