// src/lib.rs
//! Real-time eye-blink detection on a 4-channel OpenBCI stream.
//!
//! [`BlinkEngine`] runs acquisition, calibration and gating on a background
//! thread; consumers poll [`BlinkEngine::poll_event`] and read display state
//! without ever blocking on the detector.
pub mod calibration;
pub mod config;
pub mod drivers;
pub mod engine;
pub mod gate;
pub mod openbci;
pub mod types;

pub use calibration::{CalibrationProfile, Calibrator};
pub use config::{ConfigError, DetectorConfig};
pub use engine::{AcquisitionLoop, BlinkEngine, EngineError, Step};
pub use gate::{EventGate, GateState};
pub use openbci::OpenBciSession;
pub use types::{Shared, StatusSnapshot};
