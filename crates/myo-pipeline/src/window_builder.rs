//! Sample accumulation into inference windows and onset frames

use crate::config::PipelineConfig;
use myo_core::{MyoError, MyoResult, ShortFrame, Window};
use tracing::debug;

/// Capability supplying one multi-channel sample per call.
///
/// `read()` may suspend for as long as the physical source needs; malformed
/// records (wrong channel arity) are the caller's problem, not an error
/// from the source.
pub trait SampleSource: Send {
    /// Read the next channel vector
    fn read(&mut self) -> MyoResult<Vec<f32>>;
}

/// Accumulates source samples into full windows and short frames.
///
/// Each call starts fresh accumulation; partial windows are never exposed.
pub struct WindowBuilder {
    source: Box<dyn SampleSource>,
    channel_count: usize,
    window_samples: usize,
    frame_samples: usize,
    discard_limit: usize,
    discarded_total: u64,
}

impl WindowBuilder {
    /// Create a builder that owns the sample source
    pub fn new(source: Box<dyn SampleSource>, config: &PipelineConfig) -> Self {
        WindowBuilder {
            source,
            channel_count: config.channels,
            window_samples: config.window_samples,
            frame_samples: config.frame_samples(),
            discard_limit: config.discard_limit,
            discarded_total: 0,
        }
    }

    /// Block on the source until a full inference window is assembled
    pub fn next_window(&mut self) -> MyoResult<Window> {
        let data = self.accumulate(self.window_samples)?;
        Window::new(data, self.channel_count, self.window_samples)
    }

    /// Block on the source until a full onset frame is assembled
    pub fn next_frame(&mut self) -> MyoResult<ShortFrame> {
        let data = self.accumulate(self.frame_samples)?;
        ShortFrame::new(data, self.channel_count, self.frame_samples)
    }

    /// Malformed records discarded over the builder's lifetime
    pub fn discarded_total(&self) -> u64 {
        self.discarded_total
    }

    fn accumulate(&mut self, samples: usize) -> MyoResult<Vec<f32>> {
        let mut data = Vec::with_capacity(samples * self.channel_count);
        let mut collected = 0;
        let mut consecutive_discards = 0;

        while collected < samples {
            let record = self.source.read()?;
            if record.len() != self.channel_count {
                consecutive_discards += 1;
                self.discarded_total += 1;
                debug!(
                    arity = record.len(),
                    expected = self.channel_count,
                    "discarding malformed sample record"
                );
                if consecutive_discards >= self.discard_limit {
                    return Err(MyoError::ChannelLayoutError {
                        expected: self.channel_count,
                        discarded: consecutive_discards,
                    });
                }
                continue;
            }

            consecutive_discards = 0;
            data.extend_from_slice(&record);
            collected += 1;
        }

        Ok(data)
    }
}
