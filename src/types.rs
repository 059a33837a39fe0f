// src/types.rs
// State shared between the acquisition thread and whoever consumes blinks.
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Single-slot boolean handoff: `set` is idempotent, `take` reads and clears.
#[derive(Debug, Default)]
pub struct Latch(AtomicBool);

impl Latch {
    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// `f64` stored as its bit pattern.
#[derive(Debug, Default)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub fn new(v: f64) -> Self {
        Self(AtomicU64::new(v.to_bits()))
    }
    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
    pub fn store(&self, v: f64) {
        self.0.store(v.to_bits(), Ordering::Relaxed)
    }
}

/// Point-in-time copy of the engine's display fields.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub status: String,
    pub peak: f64,
    pub ratio: f64,
    pub threshold: f64,
    pub armed: bool,
    pub calibrating: bool,
    pub calibrations: usize,
    pub running: bool,
}

/// Everything the engine thread publishes, plus the two request flags.
///
/// Display fields are eventually consistent. Only `event` and `retrain` carry
/// control meaning, and both are single-slot latches.
#[derive(Debug)]
pub struct Shared {
    pub event: Latch,
    pub retrain: Latch,
    running: AtomicBool,
    stopped: AtomicBool,
    calibrating: AtomicBool,
    armed: AtomicBool,
    calibrations: AtomicUsize,
    peak: AtomicF64,
    ratio: AtomicF64,
    threshold: AtomicF64,
    status: Mutex<String>,
}

impl Shared {
    pub fn new(initial_threshold: f64) -> Self {
        Self {
            event: Latch::default(),
            retrain: Latch::default(),
            running: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
            calibrating: AtomicBool::new(false),
            armed: AtomicBool::new(false),
            calibrations: AtomicUsize::new(0),
            peak: AtomicF64::new(0.0),
            ratio: AtomicF64::new(0.0),
            threshold: AtomicF64::new(initial_threshold),
            status: Mutex::new("starting...".to_owned()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
    pub fn mark_stopped(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibrating.load(Ordering::SeqCst)
    }
    pub fn set_calibrating(&self, on: bool) {
        self.calibrating.store(on, Ordering::SeqCst);
    }
    pub fn calibrations(&self) -> usize {
        self.calibrations.load(Ordering::SeqCst)
    }
    pub fn count_calibration(&self) {
        self.calibrations.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Relaxed)
    }
    pub fn set_armed(&self, armed: bool) {
        self.armed.store(armed, Ordering::Relaxed);
    }
    pub fn peak(&self) -> f64 {
        self.peak.load()
    }
    pub fn ratio(&self) -> f64 {
        self.ratio.load()
    }
    pub fn set_live(&self, peak: f64, ratio: f64) {
        self.peak.store(peak);
        self.ratio.store(ratio);
    }
    pub fn threshold(&self) -> f64 {
        self.threshold.load()
    }
    pub fn set_threshold(&self, threshold: f64) {
        self.threshold.store(threshold);
    }

    pub fn status_text(&self) -> String {
        match self.status.lock() {
            Ok(s) => s.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
    pub fn set_status(&self, text: impl Into<String>) {
        let text = text.into();
        match self.status.lock() {
            Ok(mut s) => *s = text,
            Err(poisoned) => *poisoned.into_inner() = text,
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            status: self.status_text(),
            peak: self.peak(),
            ratio: self.ratio(),
            threshold: self.threshold(),
            armed: self.is_armed(),
            calibrating: self.is_calibrating(),
            calibrations: self.calibrations(),
            running: self.is_running() && !self.is_stopped(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latch_is_consumed_once() {
        let latch = Latch::default();
        assert!(!latch.take());
        latch.set();
        latch.set();
        assert!(latch.is_set());
        assert!(latch.take());
        assert!(!latch.take());
    }

    #[test]
    fn atomic_f64_round_trips() {
        let v = AtomicF64::new(22.5);
        assert_eq!(v.load(), 22.5);
        v.store(-0.125);
        assert_eq!(v.load(), -0.125);
    }

    #[test]
    fn snapshot_reflects_updates() {
        let shared = Shared::new(20.0);
        shared.set_live(12.0, 3.5);
        shared.set_armed(true);
        shared.set_status("ready (thresh=20.0)");
        let snap = shared.snapshot();
        assert_eq!(snap.status, "ready (thresh=20.0)");
        assert_eq!(snap.peak, 12.0);
        assert_eq!(snap.threshold, 20.0);
        assert!(snap.armed && snap.running);
        shared.request_stop();
        assert!(!shared.snapshot().running);
    }
}
