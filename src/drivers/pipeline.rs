use crate::config::{ChannelMap, DetectorConfig, FeatureWeights};
use crate::drivers::features::blink_activity;
use crate::drivers::preprocess::Preprocessor;
use crate::drivers::source::{SampleSource, SampleWindow};
use crate::drivers::window::{peak_and_ratio, WindowStat};
use crate::drivers::{ProcessingError, SourceError};
/// Outcome of pulling one raw window through the pipeline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Pump {
    /// Fewer samples than the caller's minimum were available.
    NotReady { available: usize },
    Ready(WindowStat),
}
#[derive(Debug, thiserror::Error)]
pub enum PumpError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Processing(#[from] ProcessingError),
}
/// Raw window -> preprocessed channels -> blink activity -> (peak, ratio).
///
/// Shared by the live loop and the calibrator so both see the same statistic.
pub struct BlinkPipeline {
    preprocessor: Preprocessor,
    channels: ChannelMap,
    weights: FeatureWeights,
    peak_window_s: f64,
    window_samples: usize,
}
impl BlinkPipeline {
    pub fn new(config: &DetectorConfig, sample_rate_hz: f64) -> Result<Self, ProcessingError> {
        Ok(Self {
            preprocessor: Preprocessor::new(&config.filter, sample_rate_hz)?,
            channels: config.channels,
            weights: config.features.clone(),
            peak_window_s: config.window.peak_window_s,
            window_samples: config.acquisition.window_samples,
        })
    }
    pub fn sample_rate_hz(&self) -> f64 {
        self.preprocessor.sample_rate_hz()
    }
    pub fn activity(&self, window: &SampleWindow) -> Vec<f64> {
        let filtered = window.map_channels(|x| self.preprocessor.process(x));
        blink_activity(&filtered, &self.weights)
    }
    pub fn analyze(&self, window: &SampleWindow) -> WindowStat {
        peak_and_ratio(&self.activity(window), self.sample_rate_hz(), self.peak_window_s)
    }
    /// Pulls the newest raw window from `source` and analyzes it once at least
    /// `min_samples` samples are available.
    pub fn pump<S: SampleSource + ?Sized>(
        &self,
        source: &mut S,
        min_samples: usize,
    ) -> Result<Pump, PumpError> {
        let raw = source.latest(self.window_samples)?;
        let available = raw.len();
        if available == 0 || available < min_samples {
            return Ok(Pump::NotReady { available });
        }
        let window = raw.select(&self.channels)?;
        Ok(Pump::Ready(self.analyze(&window)))
    }
}
