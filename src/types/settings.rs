//! Server-side push settings for one stream

use serde::{Deserialize, Serialize};

/// Tunables exposed by the per-stream settings endpoint.
///
/// These only change what the server decides to push; the client never
/// skips or paces frames based on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct StreamSettings {
    /// Source frames between two pushed frames
    pub push_interval: u32,
    /// Source frames between two server-side detection passes
    pub detection_interval: u32,
    /// Push every frame; overrides `push_interval`
    pub full_frame_rate: bool,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self { push_interval: 1, detection_interval: 1, full_frame_rate: false }
    }
}

impl StreamSettings {
    /// Apply the server's rules before submitting an update.
    ///
    /// Full frame rate forces `push_interval` to 1, and neither interval
    /// may be zero.
    pub fn normalized(self) -> Self {
        let push_interval = if self.full_frame_rate { 1 } else { self.push_interval.max(1) };
        Self { push_interval, detection_interval: self.detection_interval.max(1), ..self }
    }

    /// Effective push interval as the server will apply it
    pub fn effective_push_interval(&self) -> u32 {
        self.normalized().push_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_frame_rate_forces_push_interval() {
        let settings =
            StreamSettings { push_interval: 5, detection_interval: 10, full_frame_rate: true };
        assert_eq!(settings.normalized().push_interval, 1);
        assert_eq!(settings.normalized().detection_interval, 10);
        assert_eq!(settings.effective_push_interval(), 1);
    }

    #[test]
    fn zero_intervals_are_raised() {
        let settings = StreamSettings { push_interval: 0, detection_interval: 0, full_frame_rate: false };
        let normalized = settings.normalized();
        assert_eq!(normalized.push_interval, 1);
        assert_eq!(normalized.detection_interval, 1);
    }

    #[test]
    fn plain_settings_are_untouched() {
        let settings = StreamSettings { push_interval: 3, detection_interval: 6, full_frame_rate: false };
        assert_eq!(settings.normalized(), settings);
    }
}
