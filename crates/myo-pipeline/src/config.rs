//! Pipeline configuration surface
//!
//! Immutable after construction; every stage receives its parameters from
//! one validated instance.

use myo_core::{config_error, MyoResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the whole streaming pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Channel count expected from the sample source
    pub channels: usize,
    /// Nominal sampling rate in Hz
    pub sampling_rate_hz: f32,
    /// Samples per inference window
    pub window_samples: usize,
    /// Short-frame duration in milliseconds (onset path)
    pub short_frame_ms: f32,
    /// Resting RMS values accumulated before the threshold is computed
    pub baseline_samples: usize,
    /// Threshold multiplier k in `mean + k * std`
    pub onset_factor: f32,
    /// Vote-hold duration in milliseconds
    pub hold_ms: f32,
    /// Capacity of every stage-to-stage queue
    pub queue_capacity: usize,
    /// Number of gesture classes each ensemble member scores
    pub class_count: usize,
    /// Stage sleep when its input queue is empty, in milliseconds
    pub idle_backoff_ms: u64,
    /// Consecutive malformed records tolerated before acquisition fails
    pub discard_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channels: 10,
            sampling_rate_hz: 1000.0,
            window_samples: 700,
            short_frame_ms: 50.0,
            baseline_samples: 1000,
            onset_factor: 3.0,
            hold_ms: 30.0,
            queue_capacity: 500,
            class_count: 9,
            idle_backoff_ms: 1,
            discard_limit: 10_000,
        }
    }
}

impl PipelineConfig {
    /// Samples per short frame, derived from duration and sampling rate
    pub fn frame_samples(&self) -> usize {
        ((self.short_frame_ms / 1000.0) * self.sampling_rate_hz) as usize
    }

    /// Vote ring length, derived from hold duration and sampling rate
    pub fn hold_samples(&self) -> usize {
        ((self.hold_ms / 1000.0) * self.sampling_rate_hz) as usize
    }

    /// Short frames emitted per acquisition cycle (one window per cycle)
    pub fn frames_per_window(&self) -> usize {
        let frame = self.frame_samples().max(1);
        (self.window_samples + frame - 1) / frame
    }

    /// Stage sleep between polls of an empty input queue
    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms.max(1))
    }

    /// Validate the configuration
    pub fn validate(&self) -> MyoResult<()> {
        if self.channels == 0 {
            return Err(config_error!("channel count must be positive"));
        }
        if self.sampling_rate_hz <= 0.0 {
            return Err(config_error!(
                "sampling rate must be positive, got {}",
                self.sampling_rate_hz
            ));
        }
        if self.window_samples == 0 {
            return Err(config_error!("window length must be positive"));
        }
        if self.frame_samples() == 0 {
            return Err(config_error!(
                "short frame of {}ms holds no samples at {}Hz",
                self.short_frame_ms,
                self.sampling_rate_hz
            ));
        }
        if self.frame_samples() >= self.window_samples {
            return Err(config_error!(
                "short frame ({} samples) must be shorter than the window ({} samples)",
                self.frame_samples(),
                self.window_samples
            ));
        }
        if self.baseline_samples == 0 {
            return Err(config_error!("baseline sample count must be positive"));
        }
        if self.onset_factor <= 0.0 {
            return Err(config_error!(
                "onset factor must be positive, got {}",
                self.onset_factor
            ));
        }
        if self.hold_samples() == 0 {
            return Err(config_error!(
                "vote hold of {}ms holds no samples at {}Hz",
                self.hold_ms,
                self.sampling_rate_hz
            ));
        }
        if self.queue_capacity == 0 {
            return Err(config_error!("queue capacity must be positive"));
        }
        if self.class_count == 0 {
            return Err(config_error!("class count must be positive"));
        }
        if self.discard_limit == 0 {
            return Err(config_error!("discard limit must be positive"));
        }
        Ok(())
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> MyoResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| config_error!("failed to serialize configuration: {}", e))
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> MyoResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| config_error!("failed to parse configuration: {}", e))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_derived_quantities() {
        let config = PipelineConfig::default();
        assert_eq!(config.frame_samples(), 50); // 50ms at 1kHz
        assert_eq!(config.hold_samples(), 30); // 30ms at 1kHz
        assert_eq!(config.frames_per_window(), 14); // ceil(700 / 50)
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = PipelineConfig::default();
        config.channels = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.queue_capacity = 0;
        assert!(config.validate().is_err());

        // Frame at least as long as the window
        let mut config = PipelineConfig::default();
        config.short_frame_ms = 700.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.onset_factor = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let config = PipelineConfig::default();
        let json = config.to_json().unwrap();
        let parsed = PipelineConfig::from_json(&json).unwrap();

        assert_eq!(parsed.channels, config.channels);
        assert_eq!(parsed.window_samples, config.window_samples);
        assert_eq!(parsed.queue_capacity, config.queue_capacity);
    }

    #[test]
    fn test_from_json_validates() {
        let json = r#"{
            "channels": 0,
            "sampling_rate_hz": 1000.0,
            "window_samples": 700,
            "short_frame_ms": 50.0,
            "baseline_samples": 1000,
            "onset_factor": 3.0,
            "hold_ms": 30.0,
            "queue_capacity": 500,
            "class_count": 9,
            "idle_backoff_ms": 1,
            "discard_limit": 10000
        }"#;
        assert!(PipelineConfig::from_json(json).is_err());
    }
}
