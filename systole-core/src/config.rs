//! Configuration type definitions
//!
//! Fixed operating parameters of the monitor, gathered into plain structs
//! so callers and tests can inject alternatives. There is no config file
//! or CLI surface; the `Default` impls carry the shipped values.

use crate::monitor::HeartRateBounds;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Reporting loop configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MonitorConfig {
    /// Minimum spacing between status emissions (ms)
    pub reporting_interval_ms: u32,
    /// How long a successful reading is held on the display before the
    /// prompt returns (ms)
    pub dwell_ms: u32,
    /// Heart-rate acceptance band
    pub accept: HeartRateBounds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            reporting_interval_ms: 1000,
            dwell_ms: 3000,
            accept: HeartRateBounds::default(),
        }
    }
}

/// Sensor front-end configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorConfig {
    /// IR LED drive current (mA), rounded to the nearest hardware step
    pub ir_led_current_ma: u16,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            ir_led_current_ma: 24,
        }
    }
}
