//! Two-stage calibration:
//! 1) Baseline: typical window peaks while the user relaxes (no blinks).
//! 2) Training: a handful of prompted, deliberate blinks.
//!
//! The threshold combines blink strength (`blink_median * blink_fraction`) with a
//! scaled noise floor that is capped so it cannot overpower the blink term.

use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};
use serde::Serialize;

use crate::config::{CalibrationConfig, DetectorConfig, ThresholdConfig};
use crate::drivers::window::{median, percentile};
use crate::drivers::{BlinkPipeline, Pump, PumpError, SampleSource, SourceError};
use crate::types::Shared;

/// Longest single sleep, so a shutdown request is noticed quickly.
const SLEEP_SLICE: Duration = Duration::from_millis(10);

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CalibrationProfile {
    pub baseline_floor: f64,
    pub blink_median: f64,
    pub threshold: f64,
    /// Per-trial maxima the median was taken from.
    pub blink_peaks: Vec<f64>,
}

impl CalibrationProfile {
    pub fn from_peaks(
        baseline_peaks: &[f64],
        blink_peaks: Vec<f64>,
        calibration: &CalibrationConfig,
        threshold: &ThresholdConfig,
    ) -> Self {
        let baseline_floor = baseline_floor(baseline_peaks, calibration);
        let blink_median = median(&mut blink_peaks.clone());
        Self {
            baseline_floor,
            blink_median,
            threshold: derive_threshold(baseline_floor, blink_median, threshold),
            blink_peaks,
        }
    }
}

/// High percentile of resting peaks, floored so a dead capture cannot yield ~0.
pub fn baseline_floor(peaks: &[f64], config: &CalibrationConfig) -> f64 {
    if peaks.is_empty() {
        return config.baseline_floor_min;
    }
    percentile(&mut peaks.to_vec(), config.baseline_floor_pct).max(config.baseline_floor_min)
}

pub fn derive_threshold(baseline_floor: f64, blink_median: f64, config: &ThresholdConfig) -> f64 {
    let t_blink = if blink_median > 0.0 {
        blink_median * config.blink_fraction
    } else {
        config.min_threshold
    };
    let t_noise_floor = baseline_floor * config.noise_floor_mult;
    let t_noise_capped = t_noise_floor.min(t_blink * config.max_noise_boost);
    config
        .min_threshold
        .max(t_blink)
        .max(t_noise_capped)
        .clamp(config.clamp_min, config.clamp_max)
}

/// Blocking calibration run against a live source.
pub struct Calibrator<'a> {
    config: &'a DetectorConfig,
    pipeline: &'a BlinkPipeline,
    shared: &'a Shared,
}

impl<'a> Calibrator<'a> {
    pub fn new(config: &'a DetectorConfig, pipeline: &'a BlinkPipeline, shared: &'a Shared) -> Self {
        Self {
            config,
            pipeline,
            shared,
        }
    }

    /// Returns `Ok(None)` when shutdown was requested before the run finished.
    /// Transport failures are returned as errors; nothing is applied in either case.
    pub fn run<S: SampleSource + ?Sized>(
        &self,
        source: &mut S,
    ) -> Result<Option<CalibrationProfile>, SourceError> {
        let cal = &self.config.calibration;

        self.shared
            .set_status(format!("baseline {:.1}s: relax (no blinks)", cal.baseline_s));
        info!("calibration: baseline {:.1}s, relax (no blinks)", cal.baseline_s);
        let Some(base_peaks) = self.capture_peaks(source, cal.baseline_s, cal.baseline_poll_s)?
        else {
            return Ok(None);
        };

        self.shared
            .set_status(format!("training: blink {}x when prompted", cal.train_blinks));
        info!("TRAINING: blink when you see 'BLINK NOW' (quick blink)");

        let mut blink_peaks = Vec::with_capacity(cal.train_blinks);
        for i in 0..cal.train_blinks {
            if !self.shared.is_running() {
                return Ok(None);
            }
            let prompt = format!("BLINK NOW ({}/{})", i + 1, cal.train_blinks);
            info!("{prompt}");
            self.shared.set_status(prompt);

            let Some(local_peaks) =
                self.capture_peaks(source, cal.blink_capture_s, cal.trial_poll_s)?
            else {
                return Ok(None);
            };
            if let Some(max) = local_peaks.into_iter().reduce(f64::max) {
                blink_peaks.push(max);
            }
            if !sleep_while_running(self.shared, Duration::from_secs_f64(cal.trial_pause_s)) {
                return Ok(None);
            }
        }

        let profile =
            CalibrationProfile::from_peaks(&base_peaks, blink_peaks, cal, &self.config.threshold);
        info!(
            "CAL DONE: baseline_floor≈{:.1}, blink_peaks={:.1?}, blink_med≈{:.1}, threshold={:.1}",
            profile.baseline_floor, profile.blink_peaks, profile.blink_median, profile.threshold
        );
        Ok(Some(profile))
    }

    fn capture_peaks<S: SampleSource + ?Sized>(
        &self,
        source: &mut S,
        duration_s: f64,
        poll_s: f64,
    ) -> Result<Option<Vec<f64>>, SourceError> {
        let deadline = Instant::now() + Duration::from_secs_f64(duration_s);
        let poll = Duration::from_secs_f64(poll_s);
        let mut peaks = Vec::new();
        while Instant::now() < deadline {
            if !self.shared.is_running() {
                return Ok(None);
            }
            match self.pipeline.pump(source, 1) {
                Ok(Pump::Ready(stat)) => peaks.push(stat.peak),
                Ok(Pump::NotReady { .. }) => {}
                Err(PumpError::Source(e)) => return Err(e),
                Err(PumpError::Processing(e)) => debug!("calibration sample skipped: {e}"),
            }
            if !sleep_while_running(self.shared, poll) {
                return Ok(None);
            }
        }
        Ok(Some(peaks))
    }
}

/// Sleeps in short slices; returns `false` as soon as shutdown is requested.
pub(crate) fn sleep_while_running(shared: &Shared, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if !shared.is_running() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(SLEEP_SLICE));
    }
}
