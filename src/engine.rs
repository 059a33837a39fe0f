// src/engine.rs
use crate::calibration::{CalibrationProfile, Calibrator};
use crate::config::DetectorConfig;
use crate::drivers::{
    BlinkPipeline, ProcessingError, Pump, PumpError, SampleSource, SourceError, WindowStat,
};
use crate::gate::EventGate;
use crate::types::{Shared, StatusSnapshot};
use log::{debug, error, info, warn};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Processing(#[from] ProcessingError),
}

/// Outcome of a single acquisition cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Step {
    NotReady { available: usize },
    Processed { stat: WindowStat, fired: bool },
    /// The window could not be processed; the cycle was dropped.
    Skipped,
}

/// Owns the transport and releases it on every exit path.
struct SessionGuard<S: SampleSource> {
    source: S,
}

impl<S: SampleSource> Deref for SessionGuard<S> {
    type Target = S;
    fn deref(&self) -> &S {
        &self.source
    }
}

impl<S: SampleSource> DerefMut for SessionGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

impl<S: SampleSource> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        match self.source.release() {
            Ok(()) => info!("acquisition session released"),
            Err(e) => warn!("failed to release acquisition session: {e}"),
        }
    }
}

/// Clears the calibrating flag however calibration ends.
struct CalibratingFlag<'a>(&'a Shared);

impl Drop for CalibratingFlag<'_> {
    fn drop(&mut self) {
        self.0.set_calibrating(false);
    }
}

/// The live pipeline: transport -> preprocess -> feature -> window -> gate.
pub struct AcquisitionLoop<S: SampleSource> {
    config: DetectorConfig,
    pipeline: BlinkPipeline,
    gate: EventGate,
    threshold: f64,
    profile: Option<CalibrationProfile>,
    shared: Arc<Shared>,
    ready_status: String,
    degraded: bool,
    last_beat: Instant,
    source: SessionGuard<S>,
}

impl<S: SampleSource> AcquisitionLoop<S> {
    pub fn new(config: DetectorConfig, source: S, shared: Arc<Shared>) -> Result<Self, EngineError> {
        let source = SessionGuard { source };
        let pipeline = BlinkPipeline::new(&config, source.sample_rate_hz())?;
        let now = Instant::now();
        let threshold = shared.threshold();
        Ok(Self {
            gate: EventGate::new(config.gate.clone(), now),
            config,
            pipeline,
            threshold,
            profile: None,
            shared,
            ready_status: format!("ready (thresh={threshold:.1})"),
            degraded: false,
            last_beat: now,
            source,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn profile(&self) -> Option<&CalibrationProfile> {
        self.profile.as_ref()
    }

    pub fn gate(&self) -> &EventGate {
        &self.gate
    }

    /// Runs a full calibration. Returns whether a new profile was applied; an
    /// aborted run leaves the previous threshold in place.
    pub fn calibrate(&mut self) -> Result<bool, EngineError> {
        self.shared.count_calibration();
        self.shared.set_calibrating(true);
        let _calibrating = CalibratingFlag(&self.shared);
        self.gate.reset(Instant::now());
        self.shared.set_armed(false);

        let outcome = Calibrator::new(&self.config, &self.pipeline, &self.shared)
            .run(&mut *self.source)?;
        let Some(profile) = outcome else {
            info!("calibration aborted; keeping threshold {:.1}", self.threshold);
            return Ok(false);
        };

        self.threshold = profile.threshold;
        self.shared.set_threshold(profile.threshold);
        self.ready_status = format!("ready (thresh={:.1})", profile.threshold);
        self.shared.set_status(self.ready_status.clone());
        self.degraded = false;
        self.profile = Some(profile);

        // re-arm after calibration
        self.gate.arm(Instant::now());
        self.shared.set_armed(true);
        Ok(true)
    }

    pub fn step(&mut self) -> Result<Step, EngineError> {
        // ============================================================
        // 1. on-demand retrain
        // ============================================================
        if self.shared.retrain.take() {
            info!("retrain requested");
            self.calibrate()?;
            self.shared.event.take();
        }

        // ============================================================
        // 2. newest window through the pipeline
        // ============================================================
        let min_ready = self.config.acquisition.min_ready_samples;
        let stat = match self.pipeline.pump(&mut *self.source, min_ready) {
            Ok(Pump::Ready(stat)) => stat,
            Ok(Pump::NotReady { available }) => {
                self.degraded = true;
                self.shared.set_status(format!(
                    "not ready: waiting for samples ({available}/{min_ready})"
                ));
                return Ok(Step::NotReady { available });
            }
            Err(PumpError::Source(e)) => return Err(e.into()),
            Err(PumpError::Processing(e)) => {
                warn!("cycle skipped: {e}");
                self.degraded = true;
                self.shared.set_status(format!("processing error: {e}"));
                return Ok(Step::Skipped);
            }
        };
        if self.degraded {
            self.degraded = false;
            self.shared.set_status(self.ready_status.clone());
        }
        self.shared.set_live(stat.peak, stat.ratio);

        // ============================================================
        // 3. gate
        // ============================================================
        let now = Instant::now();
        let fired = self
            .gate
            .update(stat, self.threshold, self.shared.is_calibrating(), now);
        if fired {
            self.shared.event.set();
            info!(
                "BLINK! peak={:.1} ratio={:.2}  thresh={:.1}",
                stat.peak, stat.ratio, self.threshold
            );
        }
        self.shared.set_armed(self.gate.is_armed());

        if now.duration_since(self.last_beat).as_secs_f64() > self.config.acquisition.status_interval_s {
            info!(
                "EEG: peak={:.1} ratio={:.2} thresh={:.1} armed={} dt={:.2} status={}",
                stat.peak,
                stat.ratio,
                self.threshold,
                self.gate.is_armed(),
                self.gate.since_trigger(now).as_secs_f64(),
                self.shared.status_text()
            );
            if let Ok(json) = serde_json::to_string(&self.shared.snapshot()) {
                debug!("status {json}");
            }
            self.last_beat = now;
        }
        Ok(Step::Processed { stat, fired })
    }

    /// Startup calibration followed by the live loop until shutdown or a
    /// transport failure. The session is released when `self` drops.
    pub fn run(mut self) -> Result<(), EngineError> {
        info!("STREAM STARTED (sr={})", self.pipeline.sample_rate_hz());
        self.calibrate()?;
        let cycle = Duration::from_millis(self.config.acquisition.cycle_interval_ms);
        let backoff = Duration::from_millis(self.config.acquisition.not_ready_backoff_ms);
        while self.shared.is_running() {
            match self.step()? {
                Step::NotReady { .. } => thread::sleep(backoff),
                _ => thread::sleep(cycle),
            }
        }
        Ok(())
    }
}

/// Marks the engine stopped however the acquisition thread exits.
struct StoppedFlag(Arc<Shared>);

impl Drop for StoppedFlag {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("acquisition thread panicked");
            self.0.set_status("error: acquisition thread panicked");
        }
        self.0.set_armed(false);
        self.0.mark_stopped();
    }
}

fn acquisition_thread<S, F>(config: DetectorConfig, connect: F, shared: Arc<Shared>)
where
    S: SampleSource + 'static,
    F: FnOnce() -> Result<S, SourceError>,
{
    let _stopped = StoppedFlag(shared.clone());
    shared.set_status("connecting...");
    let outcome = connect()
        .map_err(EngineError::from)
        .and_then(|source| AcquisitionLoop::new(config, source, shared.clone()))
        .and_then(AcquisitionLoop::run);
    match outcome {
        Ok(()) => {
            info!("acquisition stopped");
            shared.set_status("stopped");
        }
        Err(e) => {
            error!("BlinkDetector error: {e}");
            shared.set_status(format!("error: {e}"));
        }
    }
}

/// Consumer-side handle to the background acquisition thread.
///
/// Every accessor is non-blocking. Dropping the handle requests shutdown and
/// waits a bounded time for the thread to release the board.
pub struct BlinkEngine {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl BlinkEngine {
    /// Spawns the acquisition thread. `connect` runs on that thread and must
    /// return a streaming source.
    pub fn spawn<S, F>(config: DetectorConfig, connect: F) -> Self
    where
        S: SampleSource + 'static,
        F: FnOnce() -> Result<S, SourceError> + Send + 'static,
    {
        let shared = Arc::new(Shared::new(config.threshold.initial));
        let thread_shared = shared.clone();
        let thread = thread::spawn(move || acquisition_thread(config, connect, thread_shared));
        Self {
            shared,
            thread: Some(thread),
        }
    }

    /// `true` once per detected blink; at most one event is ever pending.
    pub fn poll_event(&self) -> bool {
        self.shared.event.take()
    }

    /// Idempotent while pending.
    pub fn request_retrain(&self) {
        self.shared.retrain.set();
    }

    pub fn shutdown(&self) {
        self.shared.request_stop();
    }

    /// Waits until the acquisition thread has released its resources.
    pub fn wait_stopped(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.shared.is_stopped() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                debug!("acquisition thread joined after a panic");
            }
        }
        true
    }

    pub fn is_running(&self) -> bool {
        !self.shared.is_stopped()
    }

    pub fn status(&self) -> StatusSnapshot {
        self.shared.snapshot()
    }
    pub fn status_text(&self) -> String {
        self.shared.status_text()
    }
    pub fn peak(&self) -> f64 {
        self.shared.peak()
    }
    pub fn ratio(&self) -> f64 {
        self.shared.ratio()
    }
    pub fn threshold(&self) -> f64 {
        self.shared.threshold()
    }
    pub fn is_armed(&self) -> bool {
        self.shared.is_armed()
    }
    pub fn is_calibrating(&self) -> bool {
        self.shared.is_calibrating()
    }
}

impl Drop for BlinkEngine {
    fn drop(&mut self) {
        self.shutdown();
        if !self.wait_stopped(Duration::from_secs(2)) {
            warn!("acquisition thread did not stop in time");
        }
    }
}
