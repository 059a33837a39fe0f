use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::drivers::buffer::RingBuffer;
use crate::drivers::source::{RawWindow, SampleSource};
use crate::drivers::SourceError;
/// Parameters of the synthetic board.
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    pub sample_rate_hz: f64,
    pub channels: usize,
    pub noise_uv: f64,
    pub drift_uv: f64,
    pub mains_uv: f64,
    pub mains_hz: f64,
    pub blink_uv: f64,
    pub blink_duration_s: f64,
    /// Random spontaneous blinks every `min..max` seconds; `None` = only on demand.
    pub auto_blink_s: Option<(f64, f64)>,
    pub seed: Option<u64>,
}
impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            // Cyton + Daisy streams at 125 Hz
            sample_rate_hz: 125.0,
            channels: 16,
            noise_uv: 3.0,
            drift_uv: 40.0,
            mains_uv: 8.0,
            mains_hz: 60.0,
            blink_uv: 180.0,
            blink_duration_s: 0.3,
            auto_blink_s: None,
            seed: None,
        }
    }
}
/// Software stand-in for an OpenBCI board.
///
/// Samples are generated in wall-clock time, so `latest` behaves like a real
/// stream: empty right after start, then filling up to the buffer history.
pub struct SimulatedBoard {
    config: SimulationConfig,
    buffer: RingBuffer,
    rng: StdRng,
    started_at: Instant,
    generated: u64,
    blink_trigger: Arc<AtomicBool>,
    blink_remaining: usize,
    next_auto_blink: Option<u64>,
}
impl SimulatedBoard {
    pub fn new(config: SimulationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let buffer = RingBuffer::with_history_seconds(config.channels, config.sample_rate_hz, 4.0);
        let mut board = Self {
            config,
            buffer,
            rng,
            started_at: Instant::now(),
            generated: 0,
            blink_trigger: Arc::new(AtomicBool::new(false)),
            blink_remaining: 0,
            next_auto_blink: None,
        };
        board.next_auto_blink = board.schedule_auto_blink();
        info!(
            "simulated board started ({} ch @ {} Hz)",
            board.config.channels, board.config.sample_rate_hz
        );
        board
    }
    /// Setting the returned flag makes the board emit one blink.
    pub fn blink_trigger(&self) -> Arc<AtomicBool> {
        self.blink_trigger.clone()
    }
    fn blink_len(&self) -> usize {
        ((self.config.blink_duration_s * self.config.sample_rate_hz).round() as usize).max(1)
    }
    fn schedule_auto_blink(&mut self) -> Option<u64> {
        let (min_s, max_s) = self.config.auto_blink_s?;
        let wait_s = if max_s > min_s {
            self.rng.gen_range(min_s..max_s)
        } else {
            min_s
        };
        Some(self.generated + (wait_s * self.config.sample_rate_hz) as u64)
    }
    fn catch_up(&mut self) {
        let due = (self.started_at.elapsed().as_secs_f64() * self.config.sample_rate_hz) as u64;
        // never synthesize more than the buffer can hold
        let backlog = due.saturating_sub(self.generated);
        if backlog > self.buffer.capacity() as u64 {
            self.generated = due - self.buffer.capacity() as u64;
        }
        while self.generated < due {
            let frame = self.next_frame();
            self.buffer.push_frame(&frame);
            self.generated += 1;
        }
    }
    fn next_frame(&mut self) -> Vec<f64> {
        let cfg = &self.config;
        let t = self.generated as f64 / cfg.sample_rate_hz;
        if self.blink_remaining == 0 {
            let requested = self.blink_trigger.swap(false, Ordering::SeqCst);
            let scheduled = self.next_auto_blink.is_some_and(|at| self.generated >= at);
            if requested || scheduled {
                self.blink_remaining = self.blink_len();
                if scheduled {
                    self.next_auto_blink = self.schedule_auto_blink();
                }
            }
        }
        let cfg = &self.config;
        let blink = if self.blink_remaining > 0 {
            let len = self.blink_len();
            let phase = (len - self.blink_remaining) as f64 / len as f64;
            self.blink_remaining -= 1;
            cfg.blink_uv * (PI * phase).sin()
        } else {
            0.0
        };
        let hum = cfg.mains_uv * (2.0 * PI * cfg.mains_hz * t).sin();
        (0..cfg.channels)
            .map(|ch| {
                let drift = cfg.drift_uv * (2.0 * PI * 0.05 * t + ch as f64).sin();
                let noise = self.rng.gen_range(-cfg.noise_uv..=cfg.noise_uv);
                // forehead channels carry most of the blink, temples a little
                let blink_gain = match ch {
                    0 | 1 => 1.0,
                    2 | 3 => 0.2,
                    _ => 0.05,
                };
                drift + hum + noise + blink_gain * blink
            })
            .collect()
    }
}
impl SampleSource for SimulatedBoard {
    fn sample_rate_hz(&self) -> f64 {
        self.config.sample_rate_hz
    }
    fn latest(&mut self, max_samples: usize) -> Result<RawWindow, SourceError> {
        self.catch_up();
        Ok(self.buffer.latest(max_samples))
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    fn board() -> SimulatedBoard {
        SimulatedBoard::new(SimulationConfig {
            seed: Some(7),
            ..SimulationConfig::default()
        })
    }
    #[test]
    fn frames_have_every_channel() {
        let mut b = board();
        assert_eq!(b.next_frame().len(), 16);
    }
    #[test]
    fn triggered_blink_deflects_forehead_channels() {
        let mut b = board();
        b.config.noise_uv = 0.0;
        b.config.drift_uv = 0.0;
        b.config.mains_uv = 0.0;
        b.blink_trigger().store(true, Ordering::SeqCst);
        let frames: Vec<Vec<f64>> = (0..b.blink_len()).map(|_| b.next_frame()).collect();
        let fp1_peak = frames.iter().map(|f| f[0]).fold(0.0f64, f64::max);
        let temple_peak = frames.iter().map(|f| f[2]).fold(0.0f64, f64::max);
        assert!(fp1_peak > 150.0);
        assert!(temple_peak < 0.5 * fp1_peak);
        assert!(!b.blink_trigger().load(Ordering::SeqCst));
    }
    #[test]
    fn auto_blinks_are_scheduled() {
        let mut b = SimulatedBoard::new(SimulationConfig {
            seed: Some(1),
            noise_uv: 0.0,
            drift_uv: 0.0,
            mains_uv: 0.0,
            auto_blink_s: Some((0.1, 0.2)),
            ..SimulationConfig::default()
        });
        let mut saw_blink = false;
        for _ in 0..125 {
            let f = b.next_frame();
            b.generated += 1;
            saw_blink |= f[0] > 50.0;
        }
        assert!(saw_blink);
    }
}
