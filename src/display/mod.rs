/*
 *  display/mod.rs
 *
 *  LyMatrix - metrics in lights
 *  (c) 2020-26 Stuart Hunter
 *
 *  Display subsystem - throttled state managers over matrix modules
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

// Core trait definitions
pub mod traits;
pub mod error;

// Display managers
pub mod manager;
pub mod multi;

// Mock matrix for testing
pub mod mock;

use serde::{Deserialize, Serialize};

/// How one metric update is routed over two or more modules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DualMode {
    /// Every module shows the same metric
    #[default]
    Mirror,
    /// Each module shows its assigned metrics
    Split,
    // extended and independent have no behaviour of their own yet and
    // route exactly like split
    Extended,
    Independent,
}

/// What the visualizers put on the modules each tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// Bar of the primary metric
    #[default]
    Percentage,
    /// Static normal-status gradient
    Gradient,
    /// Animated while the system is busy
    Activity,
    /// Pattern per system status
    Status,
    /// Reserved, not implemented
    Custom,
}

impl DisplayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayMode::Percentage => "percentage",
            DisplayMode::Gradient => "gradient",
            DisplayMode::Activity => "activity",
            DisplayMode::Status => "status",
            DisplayMode::Custom => "custom",
        }
    }
}

// Re-export commonly used types
pub use error::DisplayError;
pub use manager::{percent_byte, DisplayManager, DisplayState, StateValue, MIN_PERCENT_CHANGE};
pub use multi::{wants_metric, MultiDisplayManager, FALLBACK_METRIC};
pub use traits::{BoxedMatrix, MatrixDriver, MatrixStatus};
