use std::time::Duration;

use emcee_transport::IntervalBounds;
use serde::{Deserialize, Serialize};

/// What a drop onto an occupied stretch of a track does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Overlapping segments may coexist and play together.
    #[default]
    Allow,
    Reject,
}

/// Where the cursor lands when playback runs past the project duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndOfTimeline {
    #[default]
    Rewind,
    Hold,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tick_interval_ms: u64,
    pub start_debounce_ms: u64,
    pub boundary: IntervalBounds,
    pub overlap: OverlapPolicy,
    pub end_of_timeline: EndOfTimeline,
    pub snap_seconds: f64,
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn start_debounce_secs(&self) -> f64 {
        self.start_debounce_ms as f64 / 1000.0
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
            start_debounce_ms: 300,
            boundary: IntervalBounds::HalfOpen,
            overlap: OverlapPolicy::Allow,
            end_of_timeline: EndOfTimeline::Rewind,
            snap_seconds: 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: SchedulerConfig = toml::from_str(
            r#"
            boundary = "inclusive"
            overlap = "reject"
            "#,
        )
        .expect("parse");

        assert_eq!(config.boundary, IntervalBounds::Inclusive);
        assert_eq!(config.overlap, OverlapPolicy::Reject);
        assert_eq!(config.tick_interval_ms, 50);
        assert_eq!(config.end_of_timeline, EndOfTimeline::Rewind);
    }

    #[test]
    fn test_zero_tick_interval_is_clamped() {
        let config = SchedulerConfig {
            tick_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.tick_interval(), Duration::from_millis(1));
        assert!((SchedulerConfig::default().start_debounce_secs() - 0.3).abs() < 1e-12);
    }
}
