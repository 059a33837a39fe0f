use std::collections::VecDeque;
use crate::drivers::RawWindow;
/// Rolling buffer that stores recent samples per channel.
pub struct RingBuffer {
    per_channel: Vec<VecDeque<f64>>, // channel -> samples
    sample_rate_hz: f64,
    capacity: usize,
}
impl RingBuffer {
    pub fn with_history_seconds(channels: usize, sample_rate_hz: f64, history_seconds: f64) -> Self {
        let capacity = ((sample_rate_hz * history_seconds).ceil() as usize).max(1);
        let per_channel = (0..channels)
            .map(|_| VecDeque::with_capacity(capacity))
            .collect();
        Self {
            per_channel,
            sample_rate_hz,
            capacity,
        }
    }
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    pub fn len(&self) -> usize {
        self.per_channel.first().map(|c| c.len()).unwrap_or(0)
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Appends one multi-channel frame; extra values are ignored, missing ones read as zero.
    pub fn push_frame(&mut self, frame: &[f64]) {
        for (idx, channel_queue) in self.per_channel.iter_mut().enumerate() {
            if channel_queue.len() == self.capacity {
                channel_queue.pop_front();
            }
            channel_queue.push_back(frame.get(idx).copied().unwrap_or(0.0));
        }
    }
    /// Copies out the newest `max_samples` samples of every channel.
    pub fn latest(&self, max_samples: usize) -> RawWindow {
        let samples = self
            .per_channel
            .iter()
            .map(|channel| {
                let skip = channel.len().saturating_sub(max_samples);
                channel.iter().skip(skip).copied().collect()
            })
            .collect();
        RawWindow {
            sample_rate_hz: self.sample_rate_hz,
            samples,
        }
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn keeps_only_capacity_newest_samples() {
        let mut buf = RingBuffer::with_history_seconds(2, 10.0, 0.5);
        assert_eq!(buf.capacity(), 5);
        for i in 0..8 {
            buf.push_frame(&[i as f64, -(i as f64)]);
        }
        assert_eq!(buf.len(), 5);
        let w = buf.latest(3);
        assert_eq!(w.samples[0], vec![5.0, 6.0, 7.0]);
        assert_eq!(w.samples[1], vec![-5.0, -6.0, -7.0]);
    }
    #[test]
    fn latest_returns_what_is_available() {
        let mut buf = RingBuffer::with_history_seconds(4, 250.0, 2.0);
        buf.push_frame(&[1.0]);
        let w = buf.latest(256);
        assert_eq!(w.len(), 1);
        assert_eq!(w.samples[3], vec![0.0]);
    }
}
