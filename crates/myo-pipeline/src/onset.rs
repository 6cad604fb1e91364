//! Adaptive onset detection
//!
//! Learns a resting baseline from short-frame RMS values, then reports
//! muscle contraction onset once a supermajority of recent frames exceed
//! the learned threshold. RMS smooths instantaneous noise, the k-sigma
//! threshold adapts to the subject's resting signal, and voting over a
//! short hold window debounces flicker.

use crate::config::PipelineConfig;
use crate::ring::RingBuffer;
use myo_core::ShortFrame;
use tracing::info;

/// Fraction of vote-ring flags that must be active before onset is
/// reported. Strict inequality: exactly this fraction is still inactive.
pub const SUPERMAJORITY: f32 = 0.6;

/// Detector lifecycle. Transitions are one-way; recalibration requires a
/// fresh detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Accumulating resting RMS values; threshold undefined
    Calibrating,
    /// Threshold defined, vote ring not yet full
    Active,
    /// Vote ring full; votes are evaluated on every call
    Monitoring,
}

/// Rolling resting-RMS estimate that yields the activity threshold.
///
/// Collects up to `baseline_samples` values; the threshold
/// `mean + onset_factor * std` is computed once, on the call that stores
/// the final value, and is immutable afterwards.
#[derive(Debug)]
pub struct BaselineEstimate {
    values: RingBuffer<f32>,
    onset_factor: f32,
    threshold: Option<f32>,
}

impl BaselineEstimate {
    /// Create an empty estimate
    pub fn new(baseline_samples: usize, onset_factor: f32) -> Self {
        BaselineEstimate {
            values: RingBuffer::with_capacity(baseline_samples),
            onset_factor,
            threshold: None,
        }
    }

    /// Record one resting RMS value. No-op once calibrated.
    pub fn push(&mut self, rms: f32) {
        if self.threshold.is_some() {
            return;
        }

        self.values.push(rms);
        if self.values.is_full() {
            let n = self.values.len() as f32;
            let mean: f32 = self.values.iter().sum::<f32>() / n;
            let variance: f32 =
                self.values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
            let threshold = mean + self.onset_factor * variance.sqrt();

            info!(
                baseline_mean = mean,
                threshold, "baseline calibration complete"
            );
            self.threshold = Some(threshold);
        }
    }

    /// Activity threshold, defined once calibration completes
    pub fn threshold(&self) -> Option<f32> {
        self.threshold
    }

    /// Resting values collected so far
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True before any value was collected
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True once the threshold is defined
    pub fn is_calibrated(&self) -> bool {
        self.threshold.is_some()
    }
}

/// Onset detector combining baseline calibration, RMS thresholding and
/// majority-vote debouncing. Owns its state exclusively; never shared
/// across threads.
pub struct OnsetDetector {
    baseline: BaselineEstimate,
    votes: RingBuffer<bool>,
}

impl OnsetDetector {
    /// Create a detector from the pipeline configuration
    pub fn new(config: &PipelineConfig) -> Self {
        Self::with_parameters(
            config.baseline_samples,
            config.onset_factor,
            config.hold_samples(),
        )
    }

    /// Create a detector from explicit parameters
    pub fn with_parameters(
        baseline_samples: usize,
        onset_factor: f32,
        hold_samples: usize,
    ) -> Self {
        OnsetDetector {
            baseline: BaselineEstimate::new(baseline_samples, onset_factor),
            votes: RingBuffer::with_capacity(hold_samples),
        }
    }

    /// Current lifecycle state, derived from calibration and ring fill
    pub fn state(&self) -> DetectorState {
        if !self.baseline.is_calibrated() {
            DetectorState::Calibrating
        } else if !self.votes.is_full() {
            DetectorState::Active
        } else {
            DetectorState::Monitoring
        }
    }

    /// Evaluate one short frame.
    ///
    /// While calibrating, the frame's RMS feeds the baseline and the
    /// result is `false` regardless of content. Afterwards the
    /// instantaneous activity flag is pushed into the vote ring and the
    /// result is `true` only once the ring is full and more than
    /// [`SUPERMAJORITY`] of its flags are active.
    pub fn detect(&mut self, frame: &ShortFrame) -> bool {
        let rms = frame.mean_rms();

        let threshold = match self.baseline.threshold() {
            Some(threshold) => threshold,
            None => {
                self.baseline.push(rms);
                return false;
            }
        };

        let active = rms > threshold;
        self.votes.push(active);

        if !self.votes.is_full() {
            return false;
        }

        let active_votes = self.votes.iter().filter(|vote| **vote).count();
        active_votes as f32 / self.votes.len() as f32 > SUPERMAJORITY
    }

    /// Clear the vote ring. Baseline and threshold persist; the detector
    /// reads as `Active` until the ring refills.
    pub fn reset(&mut self) {
        self.votes.clear();
    }

    /// Learned threshold, if calibrated
    pub fn threshold(&self) -> Option<f32> {
        self.baseline.threshold()
    }

    /// Resting values collected so far
    pub fn baseline_len(&self) -> usize {
        self.baseline.len()
    }
}
