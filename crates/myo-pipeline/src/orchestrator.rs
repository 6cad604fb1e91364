//! Pipeline orchestration
//!
//! Three stages (acquisition + windowing, onset detection, ensemble
//! inference) run as worker threads connected by bounded queues. No stage
//! ever blocks on another: enqueue drops the newest item when full,
//! dequeue skips the iteration when empty, and shutdown is cooperative
//! through a cancellation token checked once per iteration.

use crate::config::PipelineConfig;
use crate::ensemble::{Classifier, ClassifierEnsemble};
use crate::onset::OnsetDetector;
use crate::queue::{
    bounded, register, LatestReader, LatestWriter, PushResult, QueueConsumer, QueueProducer,
};
use crate::window_builder::{SampleSource, WindowBuilder};
use myo_core::{EnsembleDecision, MyoError, MyoResult, ShortFrame, Window};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cooperative cancellation token, checked at the top of every stage
/// iteration. Clearing it lets each loop exit after its current
/// iteration; in-flight source reads and classifier calls are never
/// interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every loop holding this token
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Monotonic throughput counters shared by all stages
#[derive(Debug, Default)]
pub struct PipelineStats {
    frames_built: AtomicU64,
    frames_dropped: AtomicU64,
    windows_built: AtomicU64,
    windows_dropped: AtomicU64,
    onset_evaluations: AtomicU64,
    decisions: AtomicU64,
    decisions_dropped: AtomicU64,
    failed_cycles: AtomicU64,
}

impl PipelineStats {
    /// Consistent-enough copy of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_built: self.frames_built.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            windows_built: self.windows_built.load(Ordering::Relaxed),
            windows_dropped: self.windows_dropped.load(Ordering::Relaxed),
            onset_evaluations: self.onset_evaluations.load(Ordering::Relaxed),
            decisions: self.decisions.load(Ordering::Relaxed),
            decisions_dropped: self.decisions_dropped.load(Ordering::Relaxed),
            failed_cycles: self.failed_cycles.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the pipeline counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub frames_built: u64,
    pub frames_dropped: u64,
    pub windows_built: u64,
    pub windows_dropped: u64,
    pub onset_evaluations: u64,
    pub decisions: u64,
    pub decisions_dropped: u64,
    pub failed_cycles: u64,
}

/// The concurrent streaming pipeline
pub struct Pipeline;

impl Pipeline {
    /// Validate the configuration, construct all stage state, and launch
    /// the acquisition, onset and inference worker threads.
    ///
    /// Fatal configuration problems (zero classifiers, invalid parameters)
    /// surface here; a source that can never assemble a window surfaces
    /// through [`PipelineHandle::fault`] at first use.
    pub fn spawn(
        config: PipelineConfig,
        source: Box<dyn SampleSource>,
        classifiers: Vec<Box<dyn Classifier>>,
    ) -> MyoResult<PipelineHandle> {
        config.validate()?;

        let ensemble = ClassifierEnsemble::new(classifiers, config.class_count)?;
        let detector = OnsetDetector::new(&config);
        let builder = WindowBuilder::new(source, &config);

        let token = CancelToken::new();
        let stats = Arc::new(PipelineStats::default());

        let (frame_tx, frame_rx) = bounded::<ShortFrame>(config.queue_capacity);
        let (window_tx, window_rx) = bounded::<Window>(config.queue_capacity);
        let (decision_tx, decision_rx) = bounded::<EnsembleDecision>(config.queue_capacity);

        let (window_writer, latest_window) = register::<Option<Window>>(None);
        let (onset_writer, latest_onset) = register(false);
        let (decision_writer, latest_decision) = register::<Option<EnsembleDecision>>(None);
        let (fault_writer, fault) = register::<Option<MyoError>>(None);

        let idle = config.idle_backoff();
        let frames_per_window = config.frames_per_window();

        let mut workers = Vec::with_capacity(3);

        let acquisition = {
            let token = token.clone();
            let stats = stats.clone();
            spawn_stage("acquisition", move || {
                acquisition_loop(
                    builder,
                    frames_per_window,
                    frame_tx,
                    window_tx,
                    window_writer,
                    fault_writer,
                    token,
                    stats,
                )
            })
        };
        workers.push(abort_on_error(acquisition, &token)?);

        let onset = {
            let token = token.clone();
            let stats = stats.clone();
            spawn_stage("onset", move || {
                onset_loop(detector, frame_rx, onset_writer, idle, token, stats)
            })
        };
        workers.push(abort_on_error(onset, &token)?);

        let inference = {
            let token = token.clone();
            let stats = stats.clone();
            spawn_stage("inference", move || {
                inference_loop(ensemble, window_rx, decision_tx, decision_writer, idle, token, stats)
            })
        };
        workers.push(abort_on_error(inference, &token)?);

        info!(
            queue_capacity = config.queue_capacity,
            frames_per_window, "pipeline started with 3 stages"
        );

        Ok(PipelineHandle {
            token,
            stats,
            latest_window,
            latest_onset,
            latest_decision,
            fault,
            decisions: decision_rx,
            workers,
        })
    }
}

/// Handle to a running pipeline: snapshot reads, decision drain, stats
/// and shutdown.
pub struct PipelineHandle {
    token: CancelToken,
    stats: Arc<PipelineStats>,
    latest_window: LatestReader<Option<Window>>,
    latest_onset: LatestReader<bool>,
    latest_decision: LatestReader<Option<EnsembleDecision>>,
    fault: LatestReader<Option<MyoError>>,
    decisions: QueueConsumer<EnsembleDecision>,
    workers: Vec<JoinHandle<()>>,
}

impl PipelineHandle {
    /// Most recent fully assembled window, if any
    pub fn latest_window(&self) -> Option<Window> {
        self.latest_window.get()
    }

    /// Most recent onset evaluation (false until the detector monitors)
    pub fn latest_onset_flag(&self) -> bool {
        self.latest_onset.get()
    }

    /// Most recent ensemble decision, if any
    pub fn latest_decision(&self) -> Option<EnsembleDecision> {
        self.latest_decision.get()
    }

    /// Drain the next decision from the handoff FIFO, if any
    pub fn try_next_decision(&mut self) -> Option<EnsembleDecision> {
        self.decisions.poll()
    }

    /// Fatal stage error, if one stopped the pipeline
    pub fn fault(&self) -> Option<MyoError> {
        self.fault.get()
    }

    /// Additional independent reader for the latest-window register
    pub fn latest_window_reader(&self) -> LatestReader<Option<Window>> {
        self.latest_window.clone()
    }

    /// Additional independent reader for the latest-onset register
    pub fn latest_onset_reader(&self) -> LatestReader<bool> {
        self.latest_onset.clone()
    }

    /// Additional independent reader for the latest-decision register
    pub fn latest_decision_reader(&self) -> LatestReader<Option<EnsembleDecision>> {
        self.latest_decision.clone()
    }

    /// Counter snapshot
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Clone of the cancellation token (e.g. for a signal handler)
    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// True until cancellation was requested or a stage hit a fatal error
    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Cancel and join all stages.
    ///
    /// Blocks until each stage finishes its current iteration; a stage
    /// sitting in a blocking source read or classifier call finishes that
    /// call first. Returns the fatal error if one stopped the pipeline.
    pub fn shutdown(mut self) -> Option<MyoError> {
        self.token.cancel();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("stage thread panicked during shutdown");
            }
        }
        info!("pipeline stopped");
        self.fault.get()
    }
}

fn spawn_stage<F>(name: &str, body: F) -> MyoResult<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(body)
        .map_err(|e| MyoError::OrchestrationError {
            reason: format!("failed to spawn {} stage: {}", name, e),
        })
}

/// Cancel already-running stages if a later spawn failed
fn abort_on_error(
    result: MyoResult<JoinHandle<()>>,
    token: &CancelToken,
) -> MyoResult<JoinHandle<()>> {
    if result.is_err() {
        token.cancel();
    }
    result
}

fn count(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

fn offer<T>(queue: &QueueProducer<T>, item: T, dropped: &AtomicU64, what: &str) {
    match queue.push(item) {
        PushResult::Delivered => {}
        PushResult::DroppedNewest => {
            count(dropped);
            debug!("{} queue full, dropped newest item", what);
        }
        PushResult::Disconnected => debug!("{} queue consumer is gone", what),
    }
}

#[allow(clippy::too_many_arguments)]
fn acquisition_loop(
    mut builder: WindowBuilder,
    frames_per_window: usize,
    frames: QueueProducer<ShortFrame>,
    windows: QueueProducer<Window>,
    latest_window: LatestWriter<Option<Window>>,
    fault: LatestWriter<Option<MyoError>>,
    token: CancelToken,
    stats: Arc<PipelineStats>,
) {
    info!("acquisition stage running");

    'running: while !token.is_cancelled() {
        for _ in 0..frames_per_window {
            if token.is_cancelled() {
                break 'running;
            }
            match builder.next_frame() {
                Ok(frame) => {
                    count(&stats.frames_built);
                    offer(&frames, frame, &stats.frames_dropped, "frame");
                }
                Err(error) => {
                    warn!("acquisition failed: {}", error);
                    fault.publish(Some(error));
                    token.cancel();
                    break 'running;
                }
            }
        }

        if token.is_cancelled() {
            break;
        }
        match builder.next_window() {
            Ok(window) => {
                count(&stats.windows_built);
                latest_window.publish(Some(window.clone()));
                offer(&windows, window, &stats.windows_dropped, "window");
            }
            Err(error) => {
                warn!("acquisition failed: {}", error);
                fault.publish(Some(error));
                token.cancel();
                break;
            }
        }
    }

    debug!(
        discarded = builder.discarded_total(),
        "acquisition stage stopped"
    );
}

fn onset_loop(
    mut detector: OnsetDetector,
    mut frames: QueueConsumer<ShortFrame>,
    latest_onset: LatestWriter<bool>,
    idle: Duration,
    token: CancelToken,
    stats: Arc<PipelineStats>,
) {
    info!("onset stage running");

    while !token.is_cancelled() {
        let frame = match frames.poll() {
            Some(frame) => frame,
            None => {
                thread::sleep(idle);
                continue;
            }
        };

        let active = detector.detect(&frame);
        count(&stats.onset_evaluations);
        latest_onset.publish(active);
    }

    debug!(state = ?detector.state(), "onset stage stopped");
}

fn inference_loop(
    mut ensemble: ClassifierEnsemble,
    mut windows: QueueConsumer<Window>,
    decisions: QueueProducer<EnsembleDecision>,
    latest_decision: LatestWriter<Option<EnsembleDecision>>,
    idle: Duration,
    token: CancelToken,
    stats: Arc<PipelineStats>,
) {
    info!(members = ensemble.member_count(), "inference stage running");

    while !token.is_cancelled() {
        let window = match windows.poll() {
            Some(window) => window,
            None => {
                thread::sleep(idle);
                continue;
            }
        };

        match ensemble.classify(&window) {
            Ok(decision) => {
                count(&stats.decisions);
                latest_decision.publish(Some(decision.clone()));
                offer(&decisions, decision, &stats.decisions_dropped, "decision");
            }
            Err(error) => {
                // No partial means: the whole cycle yields no decision
                count(&stats.failed_cycles);
                warn!(window = %window.id, "ensemble cycle failed: {}", error);
            }
        }
    }

    debug!("inference stage stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::Classifier;
    use std::time::Instant;

    /// Deterministic source: channel c of sample i carries `i + c/10`
    struct CountingSource {
        channels: usize,
        tick: u64,
    }

    impl SampleSource for CountingSource {
        fn read(&mut self) -> MyoResult<Vec<f32>> {
            let base = self.tick as f32;
            self.tick += 1;
            Ok((0..self.channels)
                .map(|c| base + c as f32 / 10.0)
                .collect())
        }
    }

    struct ConstClassifier {
        name: String,
        scores: Vec<f32>,
    }

    impl Classifier for ConstClassifier {
        fn name(&self) -> &str {
            &self.name
        }

        fn predict(&mut self, _window: &Window) -> MyoResult<Vec<f32>> {
            Ok(self.scores.clone())
        }
    }

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            channels: 2,
            sampling_rate_hz: 1000.0,
            window_samples: 16,
            short_frame_ms: 4.0, // 4 samples
            baseline_samples: 3,
            onset_factor: 3.0,
            hold_ms: 2.0, // 2 votes
            queue_capacity: 8,
            class_count: 3,
            idle_backoff_ms: 1,
            discard_limit: 100,
        }
    }

    fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_pipeline_produces_windows_and_decisions() {
        let source = CountingSource { channels: 2, tick: 0 };
        let classifiers: Vec<Box<dyn Classifier>> = vec![
            Box::new(ConstClassifier {
                name: "a".to_string(),
                scores: vec![0.1, 0.8, 0.1],
            }),
            Box::new(ConstClassifier {
                name: "b".to_string(),
                scores: vec![0.2, 0.6, 0.2],
            }),
        ];

        let handle = Pipeline::spawn(test_config(), Box::new(source), classifiers).unwrap();

        assert!(wait_until(Duration::from_secs(5), || {
            handle.latest_window().is_some() && handle.latest_decision().is_some()
        }));

        let window = handle.latest_window().unwrap();
        assert_eq!(window.samples_per_channel(), 16);
        assert_eq!(window.channel_count(), 2);

        let decision = handle.latest_decision().unwrap();
        assert_eq!(decision.class_index, 1);
        assert_eq!(decision.scores.len(), 3);

        let stats = handle.stats();
        assert!(stats.frames_built > 0);
        assert!(stats.windows_built > 0);
        assert!(stats.decisions > 0);
        assert_eq!(stats.failed_cycles, 0);

        assert!(handle.shutdown().is_none());
    }

    #[test]
    fn test_decision_fifo_drains_in_order() {
        let source = CountingSource { channels: 2, tick: 0 };
        let classifiers: Vec<Box<dyn Classifier>> = vec![Box::new(ConstClassifier {
            name: "only".to_string(),
            scores: vec![1.0, 0.0, 0.0],
        })];

        let mut handle = Pipeline::spawn(test_config(), Box::new(source), classifiers).unwrap();

        assert!(wait_until(Duration::from_secs(5), || {
            handle.stats().decisions >= 3
        }));
        handle.token().cancel();

        let mut drained = Vec::new();
        while let Some(decision) = handle.try_next_decision() {
            drained.push(decision);
        }
        assert!(drained.len() >= 3);
        // FIFO order by creation time
        for pair in drained.windows(2) {
            assert!(pair[0].created_at <= pair[1].created_at);
        }

        handle.shutdown();
    }

    #[test]
    fn test_failing_classifier_produces_no_decisions() {
        struct AlwaysBroken;
        impl Classifier for AlwaysBroken {
            fn name(&self) -> &str {
                "always-broken"
            }
            fn predict(&mut self, _window: &Window) -> MyoResult<Vec<f32>> {
                Err(MyoError::SourceError {
                    reason: "dpu offline".to_string(),
                })
            }
        }

        let source = CountingSource { channels: 2, tick: 0 };
        let handle =
            Pipeline::spawn(test_config(), Box::new(source), vec![Box::new(AlwaysBroken)])
                .unwrap();

        assert!(wait_until(Duration::from_secs(5), || {
            handle.stats().failed_cycles >= 2
        }));

        assert!(handle.latest_decision().is_none());
        assert_eq!(handle.stats().decisions, 0);
        handle.shutdown();
    }

    #[test]
    fn test_empty_ensemble_rejected_at_spawn() {
        let source = CountingSource { channels: 2, tick: 0 };
        let result = Pipeline::spawn(test_config(), Box::new(source), Vec::new());
        assert!(matches!(result, Err(MyoError::EmptyEnsemble)));
    }

    #[test]
    fn test_persistent_channel_mismatch_faults_pipeline() {
        // Source arity disagrees with the configured channel count
        let source = CountingSource { channels: 3, tick: 0 };
        let classifiers: Vec<Box<dyn Classifier>> = vec![Box::new(ConstClassifier {
            name: "only".to_string(),
            scores: vec![1.0, 0.0, 0.0],
        })];

        let handle = Pipeline::spawn(test_config(), Box::new(source), classifiers).unwrap();

        assert!(wait_until(Duration::from_secs(5), || !handle.is_running()));
        let fault = handle.shutdown();
        assert!(matches!(fault, Some(MyoError::ChannelLayoutError { .. })));
    }

    #[test]
    fn test_cancellation_is_cooperative() {
        let source = CountingSource { channels: 2, tick: 0 };
        let classifiers: Vec<Box<dyn Classifier>> = vec![Box::new(ConstClassifier {
            name: "only".to_string(),
            scores: vec![0.0, 1.0, 0.0],
        })];

        let handle = Pipeline::spawn(test_config(), Box::new(source), classifiers).unwrap();
        let token = handle.token();

        assert!(handle.is_running());
        token.cancel();
        assert!(!handle.is_running());
        // Joins promptly because every loop re-checks the token
        assert!(handle.shutdown().is_none());
    }
}
