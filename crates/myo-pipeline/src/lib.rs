//! Myo-Pipeline: concurrent streaming pipeline for EMG inference
//!
//! Windowing, adaptive onset detection and ensemble classification run as
//! independent stages over bounded queues with drop-newest backpressure.

pub mod config;
pub mod window_builder;
pub mod ring;
pub mod onset;
pub mod ensemble;
pub mod queue;
pub mod orchestrator;

pub use config::PipelineConfig;
pub use window_builder::{SampleSource, WindowBuilder};
pub use ring::RingBuffer;
pub use onset::{BaselineEstimate, DetectorState, OnsetDetector, SUPERMAJORITY};
pub use ensemble::{Classifier, ClassifierEnsemble};
pub use queue::{
    bounded, register, LatestReader, LatestWriter, PushResult, QueueConsumer, QueueProducer,
};
pub use orchestrator::{CancelToken, Pipeline, PipelineHandle, PipelineStats, StatsSnapshot};
