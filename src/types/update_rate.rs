//! Update rate control for telemetry streams handed to UI widgets

use serde::{Deserialize, Serialize};

/// Rate at which rendered-frame telemetry is delivered to a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum UpdateRate {
    /// One sample per rendered frame
    Native,

    /// At most this many samples per second, latest sample wins.
    /// If the requested rate reaches the render refresh rate, Native is used
    Max(u32),
}

impl UpdateRate {
    /// Normalize against the render refresh rate
    pub fn normalize(self, refresh_hz: f64) -> Self {
        match self {
            UpdateRate::Native => UpdateRate::Native,
            UpdateRate::Max(0) => UpdateRate::Max(1),
            UpdateRate::Max(hz) if hz as f64 >= refresh_hz => UpdateRate::Native,
            UpdateRate::Max(hz) => UpdateRate::Max(hz),
        }
    }

    /// Throttle interval, if throttling is needed at this refresh rate
    pub fn throttle_interval(self, refresh_hz: f64) -> Option<std::time::Duration> {
        match self.normalize(refresh_hz) {
            UpdateRate::Native => None,
            UpdateRate::Max(hz) => Some(std::time::Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}
