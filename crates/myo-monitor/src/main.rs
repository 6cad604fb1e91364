//! Myo-Monitor - Headless console consumer for the live EMG pipeline
//!
//! Wires the simulated acquisition front-end and a bank of simulated DPU
//! classifiers into the concurrent pipeline, then polls the latest
//! window, onset flag and decision on its own 100 ms cadence.

use anyhow::Context;
use myo_core::Window;
use myo_pipeline::{Classifier, Pipeline, PipelineConfig};
use myo_simulation::{ActivationPattern, EmgSourceConfig, SimulatedDpuClassifier, SimulatedEmgSource};
use std::time::Duration;
use tracing::{error, info};

const ENSEMBLE_MEMBERS: usize = 3;
const DISPLAY_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    println!("Starting Myo-Monitor...");
    println!("Signal Flow: EMG Simulator → Windowing → {{Onset Detector, DPU Ensemble}} → Console");

    let config = load_config()?;
    println!(
        "Configuration: {} channels @ {:.0}Hz, window {} samples, frame {} samples, {} classes",
        config.channels,
        config.sampling_rate_hz,
        config.window_samples,
        config.frame_samples(),
        config.class_count
    );

    let source = SimulatedEmgSource::new(EmgSourceConfig {
        channels: config.channels,
        sampling_rate_hz: config.sampling_rate_hz,
        pattern: ActivationPattern::demo_cycle(),
        paced: true,
        ..EmgSourceConfig::default()
    })?;

    let classifiers: Vec<Box<dyn Classifier>> = (0..ENSEMBLE_MEMBERS)
        .map(|i| {
            Box::new(SimulatedDpuClassifier::new(
                &format!("dpu-{}", i),
                config.class_count,
                config.channels,
                i as u64 + 1,
            )) as Box<dyn Classifier>
        })
        .collect();

    let handle = Pipeline::spawn(config, Box::new(source), classifiers)?;
    let token = handle.token();

    let mut ticker = tokio::time::interval(DISPLAY_INTERVAL);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(fault) = handle.fault() {
                    error!("pipeline fault: {}", fault);
                    break;
                }

                let signal = handle
                    .latest_window()
                    .map(|window| signal_summary(&window))
                    .unwrap_or_else(|| "-".to_string());
                let class = handle
                    .latest_decision()
                    .map(|decision| decision.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let onset = if handle.latest_onset_flag() { "ACTIVE" } else { "rest" };

                println!("signal {} | onset {} | {}", signal, onset, class);
            }
            _ = &mut ctrl_c => {
                println!("Shutting down...");
                break;
            }
        }
    }

    token.cancel();
    let stats = handle.stats();
    if let Some(fault) = handle.shutdown() {
        error!("pipeline stopped on fault: {}", fault);
    }
    info!(
        windows = stats.windows_built,
        frames = stats.frames_built,
        decisions = stats.decisions,
        dropped_windows = stats.windows_dropped,
        dropped_frames = stats.frames_dropped,
        failed_cycles = stats.failed_cycles,
        "final pipeline statistics"
    );

    Ok(())
}

/// One-line energy summary of the most recent window
fn signal_summary(window: &Window) -> String {
    format!(
        "rms {:.3} over {}ch x {}",
        window.mean_rms(),
        window.channel_count(),
        window.samples_per_channel()
    )
}

/// Load the pipeline configuration from an optional JSON file argument
fn load_config() -> anyhow::Result<PipelineConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read configuration file {}", path))?;
            let config = PipelineConfig::from_json(&json)
                .with_context(|| format!("invalid configuration in {}", path))?;
            Ok(config)
        }
        None => Ok(PipelineConfig::default()),
    }
}
