//! Myo-Core: Foundation types for the real-time EMG inference pipeline
//!
//! Data containers shared by acquisition, onset detection and ensemble
//! classification: windows, short frames, decisions and errors.

pub mod segment;
pub mod decision;
pub mod timestamp;
pub mod error;

pub use segment::*;
pub use decision::*;
pub use timestamp::unix_millis;
pub use error::{MyoError, MyoResult};
