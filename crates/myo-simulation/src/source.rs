//! Synthetic EMG sample source
//!
//! Produces one channel vector per `read()` call the way a serial or
//! ethernet acquisition front-end would, including optional real-time
//! pacing and malformed-record injection for robustness testing.

use crate::signal_patterns::ActivationPattern;
use myo_core::{MyoError, MyoResult};
use myo_pipeline::SampleSource;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Configuration for the simulated source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmgSourceConfig {
    /// Channels per record
    pub channels: usize,
    /// Sampling rate in Hz
    pub sampling_rate_hz: f32,
    /// Muscle activation over time
    pub pattern: ActivationPattern,
    /// Gaussian electrode noise standard deviation
    pub noise_std: f32,
    /// Power line interference frequency (None to disable)
    pub powerline_hz: Option<f32>,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
    /// Sleep one sample period per read to mimic hardware cadence
    pub paced: bool,
    /// Emit a wrong-arity record every N reads (robustness testing)
    pub malformed_every: Option<u64>,
}

impl Default for EmgSourceConfig {
    fn default() -> Self {
        Self {
            channels: 10,
            sampling_rate_hz: 1000.0,
            pattern: ActivationPattern::demo_cycle(),
            noise_std: 0.05,
            powerline_hz: Some(50.0),
            seed: None,
            paced: false,
            malformed_every: None,
        }
    }
}

/// Simulated acquisition front-end implementing [`SampleSource`]
pub struct SimulatedEmgSource {
    config: EmgSourceConfig,
    rng: rand::rngs::StdRng,
    normal_dist: Normal<f32>,
    tick: u64,
}

impl SimulatedEmgSource {
    /// Create a source from configuration
    pub fn new(config: EmgSourceConfig) -> MyoResult<Self> {
        if config.channels == 0 {
            return Err(MyoError::ConfigurationError {
                message: "simulated source needs at least one channel".to_string(),
            });
        }
        if config.sampling_rate_hz <= 0.0 {
            return Err(MyoError::ConfigurationError {
                message: format!(
                    "simulated source sampling rate must be positive, got {}",
                    config.sampling_rate_hz
                ),
            });
        }

        let seed = config.seed.unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs()
        });

        let rng = rand::rngs::StdRng::seed_from_u64(seed);
        let normal_dist = Normal::new(0.0, config.noise_std.max(f32::EPSILON)).map_err(|e| {
            MyoError::ConfigurationError {
                message: format!("failed to create noise distribution: {}", e),
            }
        })?;

        Ok(SimulatedEmgSource {
            config,
            rng,
            normal_dist,
            tick: 0,
        })
    }

    /// Samples generated so far
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// One channel's value at the given time and activation level
    fn channel_value(&mut self, time: f32, channel: usize, activation: f32) -> f32 {
        // Slight firing-frequency variation per channel
        let base_frequency = 80.0 + channel as f32 * 10.0;
        let amplitude = activation * 2.0;

        let mut value = amplitude * (2.0 * PI * base_frequency * time).sin();
        value += amplitude * 0.3 * (2.0 * PI * base_frequency * 2.0 * time).sin();
        value += amplitude * 0.1 * (2.0 * PI * base_frequency * 3.0 * time).sin();

        // Motor unit recruitment jitter scales with activation
        if activation > 0.0 {
            value += activation * self.rng.gen_range(-0.2..0.2);
        }

        value += self.normal_dist.sample(&mut self.rng);

        if let Some(powerline) = self.config.powerline_hz {
            value += 0.05 * (2.0 * PI * powerline * time).sin();
        }

        value.clamp(-5.0, 5.0)
    }
}

impl SampleSource for SimulatedEmgSource {
    fn read(&mut self) -> MyoResult<Vec<f32>> {
        if self.config.paced {
            std::thread::sleep(std::time::Duration::from_secs_f32(
                1.0 / self.config.sampling_rate_hz,
            ));
        }

        let time = self.tick as f32 / self.config.sampling_rate_hz;
        self.tick += 1;

        if let Some(every) = self.config.malformed_every {
            if every > 0 && self.tick % every == 0 {
                // One extra channel: the caller must discard this record
                return Ok(vec![0.0; self.config.channels + 1]);
            }
        }

        let activation = self.config.pattern.activation_at(time);
        let record = (0..self.config.channels)
            .map(|channel| self.channel_value(time, channel, activation))
            .collect();

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use myo_core::flat_rms;

    fn quiet_config() -> EmgSourceConfig {
        EmgSourceConfig {
            channels: 4,
            pattern: ActivationPattern::rest(),
            noise_std: 0.02,
            powerline_hz: None,
            seed: Some(7),
            ..EmgSourceConfig::default()
        }
    }

    #[test]
    fn test_record_arity_matches_config() {
        let mut source = SimulatedEmgSource::new(quiet_config()).unwrap();
        for _ in 0..100 {
            assert_eq!(source.read().unwrap().len(), 4);
        }
        assert_eq!(source.tick(), 100);
    }

    #[test]
    fn test_seeded_sources_are_reproducible() {
        let mut a = SimulatedEmgSource::new(quiet_config()).unwrap();
        let mut b = SimulatedEmgSource::new(quiet_config()).unwrap();

        for _ in 0..50 {
            assert_eq!(a.read().unwrap(), b.read().unwrap());
        }
    }

    #[test]
    fn test_contraction_is_louder_than_rest() {
        let mut config = quiet_config();
        config.pattern = ActivationPattern::Contraction {
            rest_duration: 0.5,
            contraction_duration: 0.5,
            level: 0.9,
        };
        let mut source = SimulatedEmgSource::new(config).unwrap();

        let mut rest = Vec::new();
        let mut active = Vec::new();
        for i in 0..1000 {
            let record = source.read().unwrap();
            if i < 500 {
                rest.extend(record);
            } else {
                active.extend(record);
            }
        }

        assert!(flat_rms(&active) > 3.0 * flat_rms(&rest));
    }

    #[test]
    fn test_malformed_injection() {
        let mut config = quiet_config();
        config.malformed_every = Some(10);
        let mut source = SimulatedEmgSource::new(config).unwrap();

        let mut malformed = 0;
        for _ in 0..100 {
            if source.read().unwrap().len() != 4 {
                malformed += 1;
            }
        }
        assert_eq!(malformed, 10);
    }

    #[test]
    fn test_rejects_zero_channels() {
        let mut config = quiet_config();
        config.channels = 0;
        assert!(SimulatedEmgSource::new(config).is_err());
    }
}
