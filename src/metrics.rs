/*
 *  metrics.rs
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
//! System metrics gathered from /proc, summarised once per tick.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Local};
use log::{debug, warn};
use serde::Serialize;

/// Metric names a module can be assigned
pub const METRIC_NAMES: [&str; 4] = ["cpu", "memory", "disk", "network"];

const SECTOR_BYTES: u64 = 512;

/// Coarse health derived from cpu and memory against the thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemStatus {
    #[default]
    Normal,
    Warning,
    Critical,
}

impl SystemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemStatus::Normal => "normal",
            SystemStatus::Warning => "warning",
            SystemStatus::Critical => "critical",
        }
    }
}

impl fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status for the busier of cpu and memory.
pub fn status_for(cpu: f64, memory: f64, warning: f64, critical: f64) -> SystemStatus {
    let load = cpu.max(memory);
    if load >= critical {
        SystemStatus::Critical
    } else if load >= warning {
        SystemStatus::Warning
    } else {
        SystemStatus::Normal
    }
}

/// One tick's worth of system metrics.
///
/// cpu and memory are percentages, disk and network are bytes per second.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSummary {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub disk_activity: f64,
    pub network_activity: f64,
    pub status: SystemStatus,
    pub timestamp: DateTime<Local>,
}

impl StatsSummary {
    pub fn new(cpu_usage: f64, memory_usage: f64, disk_activity: f64, network_activity: f64, status: SystemStatus) -> Self {
        Self {
            cpu_usage,
            memory_usage,
            disk_activity,
            network_activity,
            status,
            timestamp: Local::now(),
        }
    }

    /// Raw value of a named metric
    pub fn metric(&self, name: &str) -> Option<f64> {
        match name {
            "cpu" => Some(self.cpu_usage),
            "memory" => Some(self.memory_usage),
            "disk" => Some(self.disk_activity),
            "network" => Some(self.network_activity),
            _ => None,
        }
    }
}

impl Default for StatsSummary {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0, SystemStatus::Normal)
    }
}

/// Aggregate jiffies from the first line of /proc/stat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuTimes {
    pub busy: u64,
    pub total: u64,
}

impl CpuTimes {
    /// Busy percentage between two readings
    pub fn usage_since(&self, earlier: &CpuTimes) -> f64 {
        let total = self.total.saturating_sub(earlier.total);
        if total == 0 {
            return 0.0;
        }
        let busy = self.busy.saturating_sub(earlier.busy);
        100.0 * busy as f64 / total as f64
    }
}

pub fn parse_cpu_times(stat: &str) -> Option<CpuTimes> {
    let line = stat.lines().find(|l| l.starts_with("cpu "))?;
    // user through steal; guest and guest_nice are already inside user/nice
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .filter_map(|f| f.parse().ok())
        .collect();
    if fields.len() < 4 {
        return None;
    }
    // idle + iowait
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    let total: u64 = fields.iter().sum();
    Some(CpuTimes {
        busy: total.saturating_sub(idle),
        total,
    })
}

/// Used memory percentage from /proc/meminfo
pub fn parse_meminfo(meminfo: &str) -> Option<f64> {
    let mut total = None;
    let mut available = None;
    for line in meminfo.lines() {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("MemTotal:") => total = parts.next().and_then(|v| v.parse::<f64>().ok()),
            Some("MemAvailable:") => available = parts.next().and_then(|v| v.parse::<f64>().ok()),
            _ => {}
        }
    }
    let (total, available) = (total?, available?);
    if total <= 0.0 {
        return None;
    }
    Some(100.0 * (total - available) / total)
}

fn is_whole_disk(name: &str) -> bool {
    for prefix in ["sd", "hd", "vd", "xvd"] {
        if let Some(rest) = name.strip_prefix(prefix) {
            return !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphabetic());
        }
    }
    for prefix in ["nvme", "mmcblk"] {
        if let Some(rest) = name.strip_prefix(prefix) {
            return !rest.contains('p');
        }
    }
    false
}

/// Total bytes read and written on whole disks, from /proc/diskstats
pub fn parse_diskstats(diskstats: &str) -> u64 {
    diskstats
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 10 || !is_whole_disk(fields[2]) {
                return None;
            }
            let read: u64 = fields[5].parse().ok()?;
            let written: u64 = fields[9].parse().ok()?;
            Some((read + written) * SECTOR_BYTES)
        })
        .sum()
}

/// Total rx + tx bytes on every interface but loopback, from /proc/net/dev
pub fn parse_net_dev(net_dev: &str) -> u64 {
    net_dev
        .lines()
        .skip(2)
        .filter_map(|line| {
            let (iface, counters) = line.split_once(':')?;
            if iface.trim() == "lo" {
                return None;
            }
            let fields: Vec<u64> = counters
                .split_whitespace()
                .filter_map(|f| f.parse().ok())
                .collect();
            if fields.len() < 9 {
                return None;
            }
            Some(fields[0] + fields[8])
        })
        .sum()
}

/// Samples /proc and turns counter deltas into a [`StatsSummary`].
///
/// Unreadable files count as zero.
pub struct SystemSampler {
    proc_root: PathBuf,
    warning: f64,
    critical: f64,
    last_cpu: Option<CpuTimes>,
    last_io: Option<(Instant, u64, u64)>,
}

impl SystemSampler {
    pub fn new(warning: f64, critical: f64) -> Self {
        Self::with_root("/proc", warning, critical)
    }

    /// Read from another proc tree, used by tests
    pub fn with_root<P: AsRef<Path>>(root: P, warning: f64, critical: f64) -> Self {
        Self {
            proc_root: root.as_ref().to_path_buf(),
            warning,
            critical,
            last_cpu: None,
            last_io: None,
        }
    }

    fn read(&self, file: &str) -> String {
        let path = self.proc_root.join(file);
        match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) => {
                debug!("cannot read {}: {}", path.display(), e);
                String::new()
            }
        }
    }

    fn cpu_usage(&mut self) -> f64 {
        let Some(now) = parse_cpu_times(&self.read("stat")) else {
            return 0.0;
        };
        let earlier = self.last_cpu.replace(now).unwrap_or_default();
        now.usage_since(&earlier)
    }

    /// Take one sample. Disk and network rates are zero on the first call.
    pub fn sample(&mut self) -> StatsSummary {
        let cpu = self.cpu_usage();
        let memory = parse_meminfo(&self.read("meminfo")).unwrap_or(0.0);

        let now = Instant::now();
        let disk_total = parse_diskstats(&self.read("diskstats"));
        let net_total = parse_net_dev(&self.read("net/dev"));

        let (disk, network) = match self.last_io.replace((now, disk_total, net_total)) {
            Some((then, last_disk, last_net)) => {
                let secs = now.duration_since(then).as_secs_f64();
                if secs > 0.0 {
                    (
                        disk_total.saturating_sub(last_disk) as f64 / secs,
                        net_total.saturating_sub(last_net) as f64 / secs,
                    )
                } else {
                    (0.0, 0.0)
                }
            }
            None => (0.0, 0.0),
        };

        let status = status_for(cpu, memory, self.warning, self.critical);
        if status == SystemStatus::Critical {
            warn!("system critical: cpu {:.1}% memory {:.1}%", cpu, memory);
        }

        StatsSummary::new(cpu, memory, disk, network, status)
    }
}
