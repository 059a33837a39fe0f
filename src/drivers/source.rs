use std::collections::VecDeque;
use crate::config::ChannelMap;
use crate::drivers::{ProcessingError, SourceError};
/// Most recent samples for every EEG channel of a board.
#[derive(Clone, Debug, Default)]
pub struct RawWindow {
    pub sample_rate_hz: f64,
    pub samples: Vec<Vec<f64>>, // channels x samples
}
impl RawWindow {
    /// Samples available in every channel.
    pub fn len(&self) -> usize {
        self.samples.iter().map(|c| c.len()).min().unwrap_or(0)
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Picks the four logical channels out of the board's EEG rows.
    pub fn select(&self, map: &ChannelMap) -> Result<SampleWindow, ProcessingError> {
        let n = self.len();
        let pick = |index: usize| -> Result<Vec<f64>, ProcessingError> {
            self.samples
                .get(index)
                .map(|c| c[c.len() - n..].to_vec())
                .ok_or(ProcessingError::ChannelOutOfRange {
                    index,
                    available: self.samples.len(),
                })
        };
        SampleWindow::new(
            pick(map.fp1)?,
            pick(map.fp2)?,
            pick(map.left_temple)?,
            pick(map.right_temple)?,
        )
    }
}
/// The four synchronized channels the blink feature is built from.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleWindow {
    pub fp1: Vec<f64>,
    pub fp2: Vec<f64>,
    pub left_temple: Vec<f64>,
    pub right_temple: Vec<f64>,
}
impl SampleWindow {
    pub fn new(
        fp1: Vec<f64>,
        fp2: Vec<f64>,
        left_temple: Vec<f64>,
        right_temple: Vec<f64>,
    ) -> Result<Self, ProcessingError> {
        let expected = fp1.len();
        for actual in [fp2.len(), left_temple.len(), right_temple.len()] {
            if actual != expected {
                return Err(ProcessingError::ChannelMismatch { expected, actual });
            }
        }
        Ok(Self {
            fp1,
            fp2,
            left_temple,
            right_temple,
        })
    }
    pub fn len(&self) -> usize {
        self.fp1.len()
    }
    pub fn is_empty(&self) -> bool {
        self.fp1.is_empty()
    }
    pub fn map_channels(&self, mut f: impl FnMut(&[f64]) -> Vec<f64>) -> Self {
        Self {
            fp1: f(&self.fp1),
            fp2: f(&self.fp2),
            left_temple: f(&self.left_temple),
            right_temple: f(&self.right_temple),
        }
    }
}
/// Pull-style access to a running sample stream.
///
/// `latest` may return fewer samples than requested, e.g. right after the stream
/// started; callers decide when a window is large enough to use.
pub trait SampleSource {
    fn sample_rate_hz(&self) -> f64;
    fn latest(&mut self, max_samples: usize) -> Result<RawWindow, SourceError>;
    /// Stops the stream and frees the session. Must be safe to call more than once.
    fn release(&mut self) -> Result<(), SourceError> {
        Ok(())
    }
}
impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn sample_rate_hz(&self) -> f64 {
        (**self).sample_rate_hz()
    }
    fn latest(&mut self, max_samples: usize) -> Result<RawWindow, SourceError> {
        (**self).latest(max_samples)
    }
    fn release(&mut self) -> Result<(), SourceError> {
        (**self).release()
    }
}
/// In-memory source useful for tests and deterministic playback.
///
/// Scripted responses are served in order; once exhausted the last window is
/// repeated. A scripted `Err` is returned once.
pub struct ManualSource {
    sample_rate_hz: f64,
    queue: VecDeque<Result<RawWindow, SourceError>>,
    last: RawWindow,
    released: usize,
}
impl ManualSource {
    pub fn new(sample_rate_hz: f64, windows: impl IntoIterator<Item = RawWindow>) -> Self {
        Self::scripted(sample_rate_hz, windows.into_iter().map(Ok))
    }
    pub fn scripted(
        sample_rate_hz: f64,
        responses: impl IntoIterator<Item = Result<RawWindow, SourceError>>,
    ) -> Self {
        Self {
            sample_rate_hz,
            queue: responses.into_iter().collect(),
            last: RawWindow {
                sample_rate_hz,
                samples: Vec::new(),
            },
            released: 0,
        }
    }
    /// Number of times `release` has been called.
    pub fn release_count(&self) -> usize {
        self.released
    }
}
impl SampleSource for ManualSource {
    fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }
    fn latest(&mut self, max_samples: usize) -> Result<RawWindow, SourceError> {
        if let Some(next) = self.queue.pop_front() {
            self.last = next?;
        }
        let mut window = self.last.clone();
        for channel in &mut window.samples {
            if channel.len() > max_samples {
                channel.drain(..channel.len() - max_samples);
            }
        }
        Ok(window)
    }
    fn release(&mut self) -> Result<(), SourceError> {
        self.released += 1;
        Ok(())
    }
}
