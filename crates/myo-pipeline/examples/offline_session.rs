//! Offline walkthrough of the pipeline building blocks
//!
//! Exercises windowing, onset detection and ensemble classification
//! directly, without spawning the concurrent stages.

use myo_core::{MyoResult, ShortFrame, Window};
use myo_pipeline::{
    Classifier, ClassifierEnsemble, DetectorState, OnsetDetector, PipelineConfig,
};

fn main() -> MyoResult<()> {
    println!("=== Myo-Pipeline Offline Session ===\n");

    let config = PipelineConfig {
        channels: 4,
        window_samples: 64,
        short_frame_ms: 16.0,
        baseline_samples: 50,
        hold_ms: 4.0,
        class_count: 5,
        ..PipelineConfig::default()
    };
    config.validate()?;

    onset_example(&config)?;
    ensemble_example(&config)?;

    println!("\n=== Session complete ===");
    Ok(())
}

/// Calibrate a detector on resting frames, then drive it into onset
fn onset_example(config: &PipelineConfig) -> MyoResult<()> {
    println!("1. Onset Detection");

    let mut detector = OnsetDetector::new(config);
    let frame_samples = config.frame_samples();

    // Resting frames: low-level sinusoid standing in for electrode noise
    for i in 0..config.baseline_samples {
        let frame = synthetic_frame(0.05, i as f32, config.channels, frame_samples)?;
        detector.detect(&frame);
    }

    let threshold = detector.threshold().expect("calibration completed");
    println!("   calibrated after {} frames, threshold {:.4}", config.baseline_samples, threshold);
    assert_eq!(detector.state(), DetectorState::Active);

    // Contraction frames: amplitude well above the learned threshold
    let hold = config.hold_samples();
    for i in 0..hold {
        let frame = synthetic_frame(threshold * 4.0, i as f32, config.channels, frame_samples)?;
        let active = detector.detect(&frame);
        println!("   frame {:>2}: onset = {}", i + 1, active);
    }

    Ok(())
}

/// Average two deterministic members into one decision
fn ensemble_example(config: &PipelineConfig) -> MyoResult<()> {
    println!("\n2. Ensemble Classification");

    struct BiasedMember {
        name: String,
        favorite: usize,
        class_count: usize,
    }

    impl Classifier for BiasedMember {
        fn name(&self) -> &str {
            &self.name
        }

        fn predict(&mut self, window: &Window) -> MyoResult<Vec<f32>> {
            let energy = window.mean_rms();
            let mut scores = vec![energy * 0.1; self.class_count];
            scores[self.favorite] = energy;
            Ok(scores)
        }
    }

    let members: Vec<Box<dyn Classifier>> = vec![
        Box::new(BiasedMember {
            name: "member-a".to_string(),
            favorite: 2,
            class_count: config.class_count,
        }),
        Box::new(BiasedMember {
            name: "member-b".to_string(),
            favorite: 2,
            class_count: config.class_count,
        }),
    ];
    let mut ensemble = ClassifierEnsemble::new(members, config.class_count)?;

    let data: Vec<f32> = (0..config.channels * config.window_samples)
        .map(|i| (i as f32 * 0.11).sin())
        .collect();
    let window = Window::new(data, config.channels, config.window_samples)?;

    let decision = ensemble.classify(&window)?;
    println!("   window {} -> {}", window.id, decision);
    assert_eq!(decision.class_index, 2);

    Ok(())
}

fn synthetic_frame(
    amplitude: f32,
    phase: f32,
    channels: usize,
    samples: usize,
) -> MyoResult<ShortFrame> {
    let data: Vec<f32> = (0..channels * samples)
        .map(|i| amplitude * (i as f32 * 0.5 + phase).sin())
        .collect();
    ShortFrame::new(data, channels, samples)
}
