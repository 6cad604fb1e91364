//! End-to-end tests: simulated source and classifiers through the full
//! concurrent pipeline, plus detector behavior on realistic baselines.

use myo_core::ShortFrame;
use myo_pipeline::{Classifier, DetectorState, OnsetDetector, Pipeline, PipelineConfig};
use myo_simulation::{
    ActivationPattern, EmgSourceConfig, FaultyClassifier, SimulatedDpuClassifier,
    SimulatedEmgSource,
};
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::time::{Duration, Instant};

fn fast_config() -> PipelineConfig {
    PipelineConfig {
        channels: 4,
        sampling_rate_hz: 1000.0,
        window_samples: 64,
        short_frame_ms: 16.0, // 16 samples
        baseline_samples: 20,
        onset_factor: 3.0,
        hold_ms: 4.0, // 4 votes
        queue_capacity: 16,
        class_count: 5,
        idle_backoff_ms: 1,
        discard_limit: 1000,
    }
}

fn dpu_bank(config: &PipelineConfig, members: usize) -> Vec<Box<dyn Classifier>> {
    (0..members)
        .map(|i| {
            Box::new(SimulatedDpuClassifier::new(
                &format!("dpu-{}", i),
                config.class_count,
                config.channels,
                i as u64 + 1,
            )) as Box<dyn Classifier>
        })
        .collect()
}

fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn live_pipeline_reaches_steady_state() {
    let config = fast_config();
    let source = SimulatedEmgSource::new(EmgSourceConfig {
        channels: config.channels,
        sampling_rate_hz: config.sampling_rate_hz,
        pattern: ActivationPattern::demo_cycle(),
        seed: Some(11),
        ..EmgSourceConfig::default()
    })
    .unwrap();

    let handle = Pipeline::spawn(config.clone(), Box::new(source), dpu_bank(&config, 3)).unwrap();

    assert!(wait_until(Duration::from_secs(10), || {
        let stats = handle.stats();
        stats.windows_built >= 5 && stats.decisions >= 3 && stats.onset_evaluations >= 10
    }));

    let window = handle.latest_window().expect("window published");
    assert_eq!(window.channel_count(), config.channels);
    assert_eq!(window.samples_per_channel(), config.window_samples);

    let decision = handle.latest_decision().expect("decision published");
    assert!(decision.class_index < config.class_count);
    assert_eq!(decision.class_count(), config.class_count);

    let stats = handle.stats();
    assert_eq!(stats.failed_cycles, 0);
    assert!(handle.shutdown().is_none());
}

#[test]
fn malformed_records_do_not_stall_the_pipeline() {
    let config = fast_config();
    let source = SimulatedEmgSource::new(EmgSourceConfig {
        channels: config.channels,
        sampling_rate_hz: config.sampling_rate_hz,
        pattern: ActivationPattern::rest(),
        seed: Some(3),
        malformed_every: Some(5), // every 5th record has the wrong arity
        ..EmgSourceConfig::default()
    })
    .unwrap();

    let handle = Pipeline::spawn(config.clone(), Box::new(source), dpu_bank(&config, 2)).unwrap();

    assert!(wait_until(Duration::from_secs(10), || {
        handle.stats().windows_built >= 3
    }));

    assert!(handle.fault().is_none());
    assert!(handle.shutdown().is_none());
}

#[test]
fn faulty_member_suppresses_decisions_without_stopping_stages() {
    let config = fast_config();
    let source = SimulatedEmgSource::new(EmgSourceConfig {
        channels: config.channels,
        sampling_rate_hz: config.sampling_rate_hz,
        pattern: ActivationPattern::rest(),
        seed: Some(5),
        ..EmgSourceConfig::default()
    })
    .unwrap();

    // Healthy for two cycles, then every cycle fails
    let members: Vec<Box<dyn Classifier>> = vec![
        Box::new(SimulatedDpuClassifier::new(
            "dpu-0",
            config.class_count,
            config.channels,
            1,
        )),
        Box::new(FaultyClassifier::new("flaky", config.class_count, 2)),
    ];

    let handle = Pipeline::spawn(config, Box::new(source), members).unwrap();

    assert!(wait_until(Duration::from_secs(10), || {
        handle.stats().failed_cycles >= 2
    }));

    let stats = handle.stats();
    // The two healthy cycles may have produced decisions, but nothing after
    assert!(stats.decisions <= 2);
    // Acquisition and onset keep running through inference failures
    assert!(handle.is_running());
    handle.shutdown();
}

#[test]
fn detector_calibrates_on_gaussian_baseline_then_fires_on_hold_th_frame() {
    // 1000 resting frames with RMS ~ N(0.1, 0.01), then identical frames
    // just above the learned threshold
    let baseline_samples = 1000;
    let hold = 30;
    let mut detector = OnsetDetector::with_parameters(baseline_samples, 3.0, hold);

    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    let rest_rms = Normal::new(0.1f32, 0.01).unwrap();

    for _ in 0..baseline_samples {
        let level = rest_rms.sample(&mut rng).abs();
        let frame = ShortFrame::new(vec![level; 8], 2, 4).unwrap();
        assert!(!detector.detect(&frame));
    }

    assert_eq!(detector.state(), DetectorState::Active);
    let threshold = detector.threshold().expect("calibrated");
    // mean + 3 std of N(0.1, 0.01) lands near 0.13
    assert!(threshold > 0.1 && threshold < 0.2);

    let active_frame = ShortFrame::new(vec![threshold + 1.0; 8], 2, 4).unwrap();
    for _ in 0..hold - 1 {
        assert!(!detector.detect(&active_frame));
    }
    assert!(detector.detect(&active_frame));
}
