//! Tunables for the blink detector.
//!
//! Everything is gathered in one immutable [`DetectorConfig`] built once at
//! startup (defaults, optionally overridden by a JSON file) and passed by
//! reference into each component.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Main configuration for the detector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub board: BoardConfig,
    pub channels: ChannelMap,
    pub filter: FilterConfig,
    pub features: FeatureWeights,
    pub window: WindowConfig,
    pub gate: GateConfig,
    pub calibration: CalibrationConfig,
    pub threshold: ThresholdConfig,
    pub acquisition: LoopConfig,
}

impl DetectorConfig {
    /// Load and validate a JSON config. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: DetectorConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_owned()));
        if !(self.filter.low_hz > 0.0 && self.filter.high_hz > self.filter.low_hz) {
            return invalid("filter band must satisfy 0 < low_hz < high_hz");
        }
        if !(self.window.peak_window_s > 0.0) {
            return invalid("window.peak_window_s must be positive");
        }
        if self.acquisition.window_samples == 0
            || self.acquisition.min_ready_samples > self.acquisition.window_samples
        {
            return invalid("acquisition.min_ready_samples must not exceed window_samples");
        }
        if !(self.gate.rearm_ratio > 0.0 && self.gate.rearm_ratio < 1.0) {
            return invalid("gate.rearm_ratio must lie in (0, 1)");
        }
        if !(self.gate.cooldown_s >= 0.0 && self.gate.rearm_min_s >= 0.0)
            || !self.gate.cooldown_s.is_finite()
            || !self.gate.rearm_min_s.is_finite()
        {
            return invalid("gate durations must be finite and not negative");
        }
        let cal = &self.calibration;
        let durations = [
            cal.baseline_s,
            cal.baseline_poll_s,
            cal.blink_capture_s,
            cal.trial_poll_s,
            cal.trial_pause_s,
        ];
        if !durations.iter().all(|d| d.is_finite() && *d >= 0.0) {
            return invalid("calibration durations must be finite and not negative");
        }
        if !(0.0..=100.0).contains(&self.calibration.baseline_floor_pct) {
            return invalid("calibration.baseline_floor_pct must lie in [0, 100]");
        }
        if self.threshold.clamp_min > self.threshold.clamp_max {
            return invalid("threshold.clamp_min must not exceed clamp_max");
        }
        Ok(())
    }
}

/// BrainFlow board selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub serial_port: String,
    /// BrainFlow board id; 2 is Cyton + Daisy.
    pub board_id: i32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            serial_port: "COM3".to_owned(),
            board_id: 2,
        }
    }
}

/// Logical electrode roles mapped to 0-based positions in the board's EEG channel list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelMap {
    pub fp1: usize,
    pub fp2: usize,
    pub left_temple: usize,
    pub right_temple: usize,
}

impl Default for ChannelMap {
    fn default() -> Self {
        // GUI channels 1-4
        Self {
            fp1: 0,
            fp2: 1,
            left_temple: 2,
            right_temple: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MainsFrequency {
    Fifty,
    Sixty,
}

impl MainsFrequency {
    pub fn hz(self) -> f64 {
        match self {
            MainsFrequency::Fifty => 50.0,
            MainsFrequency::Sixty => 60.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub low_hz: f64,
    pub high_hz: f64,
    pub order: usize,
    /// `None` disables line-noise removal.
    pub mains: Option<MainsFrequency>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            low_hz: 1.0,
            high_hz: 14.0,
            order: 4,
            mains: Some(MainsFrequency::Sixty),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureWeights {
    pub side: f64,
    pub symmetric: f64,
}

impl Default for FeatureWeights {
    fn default() -> Self {
        Self {
            side: 0.5,
            symmetric: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Lookback for the peak/ratio statistic.
    pub peak_window_s: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            peak_window_s: 0.22,
        }
    }
}

/// Trigger gating; prevents double fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub cooldown_s: f64,
    pub rearm_min_s: f64,
    pub rearm_ratio: f64,
    pub spike_ratio_min: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            cooldown_s: 0.25,
            rearm_min_s: 0.02,
            rearm_ratio: 0.95,
            spike_ratio_min: 1.25,
        }
    }
}

impl GateConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.cooldown_s)
    }
    pub fn rearm_min(&self) -> Duration {
        Duration::from_secs_f64(self.rearm_min_s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub baseline_s: f64,
    pub baseline_poll_s: f64,
    pub baseline_floor_pct: f64,
    pub baseline_floor_min: f64,
    pub train_blinks: usize,
    pub blink_capture_s: f64,
    pub trial_poll_s: f64,
    pub trial_pause_s: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            baseline_s: 3.0,
            baseline_poll_s: 0.03,
            baseline_floor_pct: 60.0,
            baseline_floor_min: 1.0,
            train_blinks: 6,
            blink_capture_s: 1.0,
            trial_poll_s: 0.02,
            trial_pause_s: 0.35,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Active until the first calibration finishes.
    pub initial: f64,
    pub min_threshold: f64,
    pub blink_fraction: f64,
    pub noise_floor_mult: f64,
    pub max_noise_boost: f64,
    pub clamp_min: f64,
    pub clamp_max: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            initial: 20.0,
            min_threshold: 6.0,
            blink_fraction: 0.45,
            noise_floor_mult: 1.5,
            max_noise_boost: 1.35,
            clamp_min: 5.0,
            clamp_max: 400.0,
        }
    }
}

/// Timing of the acquisition loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Samples requested from the board each cycle.
    pub window_samples: usize,
    /// Fewer samples than this means the stream is not ready yet.
    pub min_ready_samples: usize,
    pub cycle_interval_ms: u64,
    pub not_ready_backoff_ms: u64,
    pub status_interval_s: f64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_samples: 256,
            min_ready_samples: 64,
            cycle_interval_ms: 10,
            not_ready_backoff_ms: 10,
            status_interval_s: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(DetectorConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{ "board": { "serial_port": "/dev/ttyUSB0" }, "gate": { "cooldown_s": 0.4 } }"#;
        let config: DetectorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.board.serial_port, "/dev/ttyUSB0");
        assert_eq!(config.board.board_id, 2);
        assert_eq!(config.gate.cooldown_s, 0.4);
        assert_eq!(config.gate.rearm_ratio, 0.95);
        assert_eq!(config.calibration.train_blinks, 6);
    }

    #[test]
    fn mains_can_be_disabled() {
        let config: DetectorConfig =
            serde_json::from_str(r#"{ "filter": { "mains": null } }"#).unwrap();
        assert_eq!(config.filter.mains, None);
        let config: DetectorConfig =
            serde_json::from_str(r#"{ "filter": { "mains": "Fifty" } }"#).unwrap();
        assert_eq!(config.filter.mains, Some(MainsFrequency::Fifty));
    }

    #[test]
    fn rejects_inconsistent_values() {
        let mut config = DetectorConfig::default();
        config.gate.rearm_ratio = 1.2;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = DetectorConfig::default();
        config.acquisition.min_ready_samples = 512;
        assert!(config.validate().is_err());

        let mut config = DetectorConfig::default();
        config.filter.high_hz = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_calibration_durations() {
        let json = r#"{ "calibration": { "trial_pause_s": -0.35 } }"#;
        let config: DetectorConfig = serde_json::from_str(json).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = DetectorConfig::default();
        config.calibration.baseline_s = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = DetectorConfig::default();
        config.calibration.blink_capture_s = f64::INFINITY;
        assert!(config.validate().is_err());

        let mut config = DetectorConfig::default();
        config.calibration.trial_pause_s = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_rejects_negative_poll_interval() {
        let path = std::env::temp_dir().join(format!(
            "blinkstick-bad-config-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{ "calibration": { "baseline_poll_s": -0.03 } }"#).unwrap();
        let result = DetectorConfig::load(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn load_reads_file() {
        let path = std::env::temp_dir().join(format!("blinkstick-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "calibration": { "train_blinks": 3 } }"#).unwrap();
        let config = DetectorConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(config.calibration.train_blinks, 3);
        assert!(matches!(
            DetectorConfig::load(Path::new("/definitely/not/here.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
