//! Signal segments: inference windows and short onset frames
//!
//! Both segment kinds store sample-major interleaved channel data
//! (`[s0c0, s0c1, ..., s1c0, ...]`), the layout the acquisition path
//! produces and hardware classifiers consume.

use crate::error::{MyoError, MyoResult};
use crate::timestamp::unix_millis;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use uuid::Uuid;

/// Interleaved multi-channel sample block backing both segment kinds
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBlock {
    data: Vec<f32>,
    channel_count: usize,
}

impl SampleBlock {
    /// Create a block, validating the interleaved layout
    pub fn new(data: Vec<f32>, channel_count: usize, samples_per_channel: usize) -> MyoResult<Self> {
        if channel_count == 0 {
            return Err(MyoError::InvalidSignalData {
                reason: "channel count must be positive".to_string(),
            });
        }

        let expected = channel_count * samples_per_channel;
        if data.len() != expected {
            return Err(MyoError::InvalidSignalData {
                reason: format!(
                    "data length {} doesn't match {} samples x {} channels",
                    data.len(),
                    samples_per_channel,
                    channel_count
                ),
            });
        }

        Ok(SampleBlock { data, channel_count })
    }

    /// Total number of values across all channels
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the block is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of samples per channel
    pub fn samples_per_channel(&self) -> usize {
        self.data.len() / self.channel_count
    }

    /// Channel count
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Raw interleaved data
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Extract the data for one channel
    pub fn channel_data(&self, channel_index: usize) -> MyoResult<Vec<f32>> {
        if channel_index >= self.channel_count {
            return Err(MyoError::InvalidSignalData {
                reason: format!(
                    "channel index {} out of bounds (0-{})",
                    channel_index,
                    self.channel_count - 1
                ),
            });
        }

        Ok(self
            .data
            .iter()
            .skip(channel_index)
            .step_by(self.channel_count)
            .copied()
            .collect())
    }

    /// All channels as separate vectors
    pub fn all_channels(&self) -> MyoResult<Vec<Vec<f32>>> {
        (0..self.channel_count).map(|ch| self.channel_data(ch)).collect()
    }

    /// Mean over channels of the per-channel RMS.
    ///
    /// For a single channel this equals the flat RMS over all values.
    /// Always non-negative.
    pub fn mean_rms(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }

        if self.channel_count <= 1 {
            return flat_rms(&self.data);
        }

        let samples = self.samples_per_channel() as f32;
        let mut acc = vec![0.0f32; self.channel_count];
        for (i, value) in self.data.iter().enumerate() {
            acc[i % self.channel_count] += value * value;
        }

        let rms_sum: f32 = acc.iter().map(|sq| (sq / samples).sqrt()).sum();
        rms_sum / self.channel_count as f32
    }

    /// Statistics for one channel
    pub fn channel_stats(&self, channel_index: usize) -> MyoResult<ChannelStats> {
        let data = self.channel_data(channel_index)?;
        Ok(ChannelStats::calculate(&data))
    }
}

/// Flat RMS over a value slice, used for degenerate (non 2-D) shapes
pub fn flat_rms(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = values.iter().map(|x| x * x).sum();
    (sum_sq / values.len() as f32).sqrt()
}

/// Fixed-length inference window, the unit of classification
#[derive(Debug, Clone)]
pub struct Window {
    /// Unique identifier, carried through to the ensemble decision
    pub id: Uuid,
    block: SampleBlock,
    /// Creation timestamp (ms since epoch)
    pub created_at: u64,
}

impl Window {
    /// Create a window of exactly `samples_per_channel` x `channel_count` values
    pub fn new(data: Vec<f32>, channel_count: usize, samples_per_channel: usize) -> MyoResult<Self> {
        Ok(Window {
            id: Uuid::new_v4(),
            block: SampleBlock::new(data, channel_count, samples_per_channel)?,
            created_at: unix_millis(),
        })
    }

    /// Quantized representation for hardware-accelerated classifiers.
    ///
    /// Values are scaled then saturated into the int8 range.
    pub fn quantized(&self, scale: f32) -> Vec<i8> {
        self.block
            .data()
            .iter()
            .map(|v| (v * scale).round().clamp(-128.0, 127.0) as i8)
            .collect()
    }
}

impl Deref for Window {
    type Target = SampleBlock;

    fn deref(&self) -> &SampleBlock {
        &self.block
    }
}

/// Short fixed-length frame, the unit of onset detection
#[derive(Debug, Clone, PartialEq)]
pub struct ShortFrame {
    block: SampleBlock,
}

impl ShortFrame {
    /// Create a frame of exactly `samples_per_channel` x `channel_count` values
    pub fn new(data: Vec<f32>, channel_count: usize, samples_per_channel: usize) -> MyoResult<Self> {
        Ok(ShortFrame {
            block: SampleBlock::new(data, channel_count, samples_per_channel)?,
        })
    }
}

impl Deref for ShortFrame {
    type Target = SampleBlock;

    fn deref(&self) -> &SampleBlock {
        &self.block
    }
}

/// Basic statistics for a signal channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelStats {
    pub mean: f32,
    pub rms: f32,
    pub std_dev: f32,
    pub min: f32,
    pub max: f32,
    pub peak_to_peak: f32,
}

impl ChannelStats {
    pub fn calculate(data: &[f32]) -> Self {
        if data.is_empty() {
            return Self {
                mean: 0.0,
                rms: 0.0,
                std_dev: 0.0,
                min: 0.0,
                max: 0.0,
                peak_to_peak: 0.0,
            };
        }

        let sum: f32 = data.iter().sum();
        let mean = sum / data.len() as f32;

        let rms = flat_rms(data);

        let variance: f32 = data.iter()
            .map(|x| (x - mean).powi(2))
            .sum::<f32>() / data.len() as f32;
        let std_dev = variance.sqrt();

        let min = data.iter().fold(f32::INFINITY, |a, &b| a.min(b));
        let max = data.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        let peak_to_peak = max - min;

        Self {
            mean,
            rms,
            std_dev,
            min,
            max,
            peak_to_peak,
        }
    }
}
