use serde::{Deserialize, Serialize};
use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use std::{collections::HashSet, fs, path::{Path, PathBuf}, time::Duration};
use thiserror::Error;

use crate::display::{DisplayMode, DualMode};
use crate::matrix::DEFAULT_BAUD_RATE;
use crate::metrics::METRIC_NAMES;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_UPDATE_RATE_MS: u64 = 100;
pub const DEFAULT_BRIGHTNESS: u8 = 128;
pub const DEFAULT_WARNING_THRESHOLD: f64 = 70.0;
pub const DEFAULT_CRITICAL_THRESHOLD: f64 = 90.0;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration as read from YAML.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub log_level: Option<String>,       // e.g., "info" | "debug"
    pub poll_interval_ms: Option<u64>,   // one update cycle per interval
    pub matrix: Option<MatrixConfig>,
    pub thresholds: Option<Thresholds>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MatrixConfig {
    pub baud_rate: Option<u32>,
    /// Single device port, empty = auto
    pub port: Option<String>,
    pub brightness: Option<u8>,          // 0-255
    /// Minimum time between accepted display updates
    pub update_rate_ms: Option<u64>,
    pub display_mode: Option<DisplayMode>,
    pub primary_metric: Option<String>,
    pub dual_mode: Option<DualMode>,
    /// Two or more entries switch on multi-device mode
    pub devices: Option<Vec<DeviceConfig>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Thresholds {
    pub warning: Option<f64>,
    pub critical: Option<f64>,
}

/// Role of a module in a two-module setup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceRole {
    Primary,
    Secondary,
    #[default]
    #[serde(rename = "", alias = "none")]
    None,
}

/// One matrix module in a multi-device setup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
    /// Empty = take the next discovered port
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub role: DeviceRole,
    #[serde(default = "default_brightness")]
    pub brightness: u8,
    /// Metrics this module shows in split mode, in order
    #[serde(default)]
    pub metrics: Vec<String>,
}

fn default_brightness() -> u8 {
    DEFAULT_BRIGHTNESS
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone, Default)]
#[command(name = "LyMatrix", about = "LyMatrix LED matrix system monitor", disable_help_flag = false)]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    /// Serial port of a single module (empty = auto detect)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub port: Option<String>,
    #[arg(long)]
    pub brightness: Option<u8>,
    #[arg(long, value_enum)]
    pub display_mode: Option<DisplayMode>,
    #[arg(long, value_enum)]
    pub dual_mode: Option<DualMode>,
    #[arg(long)]
    pub primary_metric: Option<String>,
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
    /// list USB serial ports and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub list_ports: bool,
}

/// Validated, fully defaulted settings. Built once at startup and not
/// changed afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub log_level: String,
    pub poll_interval: Duration,
    pub baud_rate: u32,
    pub port: String,
    pub brightness: u8,
    pub update_rate: Duration,
    pub display_mode: DisplayMode,
    pub primary_metric: String,
    pub dual_mode: DualMode,
    pub devices: Vec<DeviceConfig>,
    pub warning_threshold: f64,
    pub critical_threshold: f64,
}

impl Settings {
    /// More than one module configured
    pub fn is_multi_device(&self) -> bool {
        self.devices.len() > 1
    }
}

impl Config {
    /// Apply defaults. Call after `validate`.
    pub fn settings(&self) -> Settings {
        let matrix = self.matrix.clone().unwrap_or_default();
        let thresholds = self.thresholds.clone().unwrap_or_default();
        Settings {
            log_level: self.log_level.clone().unwrap_or_else(|| "info".to_string()),
            poll_interval: Duration::from_millis(self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS)),
            baud_rate: matrix.baud_rate.unwrap_or(DEFAULT_BAUD_RATE),
            port: matrix.port.unwrap_or_default(),
            brightness: matrix.brightness.unwrap_or(DEFAULT_BRIGHTNESS),
            update_rate: Duration::from_millis(matrix.update_rate_ms.unwrap_or(DEFAULT_UPDATE_RATE_MS)),
            display_mode: matrix.display_mode.unwrap_or_default(),
            primary_metric: matrix.primary_metric.unwrap_or_else(|| "cpu".to_string()),
            dual_mode: matrix.dual_mode.unwrap_or_default(),
            devices: matrix.devices.unwrap_or_default(),
            warning_threshold: thresholds.warning.unwrap_or(DEFAULT_WARNING_THRESHOLD),
            critical_threshold: thresholds.critical.unwrap_or(DEFAULT_CRITICAL_THRESHOLD),
        }
    }
}

/// Public entry point: read YAML, merge CLI, validate.
pub fn load(cli: &Cli) -> Result<Config, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli);

    // 4) Validate
    validate(&cfg)?;

    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/lymatrix/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/lymatrix/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/lymatrix.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["lymatrix.yaml", "config.yaml", "config/lymatrix.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    parse_yaml(&s)
}

pub fn parse_yaml(s: &str) -> Result<Config, ConfigError> {
    let cfg: Config = serde_yaml::from_str(s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    if src.log_level.is_some()         { dst.log_level = src.log_level; }
    if src.poll_interval_ms.is_some()  { dst.poll_interval_ms = src.poll_interval_ms; }
    match (&mut dst.matrix, src.matrix) {
        (None, Some(m)) => dst.matrix = Some(m),
        (Some(d), Some(s)) => merge_matrix(d, s),
        _ => {}
    }
    match (&mut dst.thresholds, src.thresholds) {
        (None, Some(t)) => dst.thresholds = Some(t),
        (Some(d), Some(s)) => {
            if s.warning.is_some()  { d.warning = s.warning; }
            if s.critical.is_some() { d.critical = s.critical; }
        }
        _ => {}
    }
}

fn merge_matrix(dst: &mut MatrixConfig, src: MatrixConfig) {
    if src.baud_rate.is_some()       { dst.baud_rate = src.baud_rate; }
    if src.port.is_some()            { dst.port = src.port; }
    if src.brightness.is_some()      { dst.brightness = src.brightness; }
    if src.update_rate_ms.is_some()  { dst.update_rate_ms = src.update_rate_ms; }
    if src.display_mode.is_some()    { dst.display_mode = src.display_mode; }
    if src.primary_metric.is_some()  { dst.primary_metric = src.primary_metric; }
    if src.dual_mode.is_some()       { dst.dual_mode = src.dual_mode; }
    // device lists are replaced whole, never merged entry by entry
    if src.devices.is_some()         { dst.devices = src.devices; }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some()        { cfg.log_level = cli.log_level.clone(); }
    if cli.poll_interval_ms.is_some() { cfg.poll_interval_ms = cli.poll_interval_ms; }

    let any_matrix = cli.port.is_some()
        || cli.brightness.is_some()
        || cli.display_mode.is_some()
        || cli.dual_mode.is_some()
        || cli.primary_metric.is_some();

    if any_matrix && cfg.matrix.is_none() {
        cfg.matrix = Some(MatrixConfig::default());
    }
    if let Some(matrix) = cfg.matrix.as_mut() {
        if cli.port.is_some()           { matrix.port = cli.port.clone(); }
        if cli.brightness.is_some()     { matrix.brightness = cli.brightness; }
        if cli.display_mode.is_some()   { matrix.display_mode = cli.display_mode; }
        if cli.dual_mode.is_some()      { matrix.dual_mode = cli.dual_mode; }
        if cli.primary_metric.is_some() { matrix.primary_metric = cli.primary_metric.clone(); }
    }
}

fn check_metric(name: &str, context: &str) -> Result<(), ConfigError> {
    if METRIC_NAMES.contains(&name) {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "{}: unknown metric '{}' (expected one of {})",
            context,
            name,
            METRIC_NAMES.join(", ")
        )))
    }
}

/// Put any invariants here (required fields, ranges, etc.)
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.poll_interval_ms == Some(0) {
        return Err(ConfigError::Validation("poll_interval_ms must be > 0".into()));
    }

    if let Some(matrix) = cfg.matrix.as_ref() {
        if matrix.baud_rate == Some(0) {
            return Err(ConfigError::Validation("matrix baud_rate must be > 0".into()));
        }
        if let Some(metric) = matrix.primary_metric.as_deref() {
            check_metric(metric, "matrix primary_metric")?;
        }
        if let Some(devices) = matrix.devices.as_ref() {
            let mut names = HashSet::new();
            for device in devices {
                if device.name.trim().is_empty() {
                    return Err(ConfigError::Validation("matrix device name must not be empty".into()));
                }
                if !names.insert(device.name.as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "matrix device name '{}' is used more than once",
                        device.name
                    )));
                }
                for metric in &device.metrics {
                    check_metric(metric, &format!("matrix device '{}'", device.name))?;
                }
            }
        }
    }

    if let Some(t) = cfg.thresholds.as_ref() {
        let warning = t.warning.unwrap_or(DEFAULT_WARNING_THRESHOLD);
        let critical = t.critical.unwrap_or(DEFAULT_CRITICAL_THRESHOLD);
        if !(0.0..=100.0).contains(&warning) || !(0.0..=100.0).contains(&critical) {
            return Err(ConfigError::Validation("thresholds must be within 0..=100".into()));
        }
        if warning >= critical {
            return Err(ConfigError::Validation("warning threshold must be below critical".into()));
        }
    }
    Ok(())
}
