//! Debounce state machine that turns the continuous `(peak, ratio)` stream
//! into at most one event per physiological blink.

use std::time::{Duration, Instant};

use crate::config::GateConfig;
use crate::drivers::WindowStat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Armed,
    /// Disarmed after a trigger (or a reset), waiting for the signal to settle.
    Cooldown,
}

#[derive(Debug, Clone)]
pub struct EventGate {
    config: GateConfig,
    state: GateState,
    last_trigger: Instant,
}

impl EventGate {
    /// Starts disarmed with the trigger timer at `now`, so the re-arm delay has
    /// to pass before anything can fire.
    pub fn new(config: GateConfig, now: Instant) -> Self {
        Self {
            config,
            state: GateState::Cooldown,
            last_trigger: now,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        self.state == GateState::Armed
    }

    pub fn since_trigger(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_trigger)
    }

    /// Disarm and restart the trigger timer.
    pub fn reset(&mut self, now: Instant) {
        self.state = GateState::Cooldown;
        self.last_trigger = now;
    }

    /// Restart the trigger timer and arm immediately; used after calibration.
    pub fn arm(&mut self, now: Instant) {
        self.state = GateState::Armed;
        self.last_trigger = now;
    }

    /// Feeds one cycle. Returns `true` when this cycle fires an event.
    pub fn update(&mut self, stat: WindowStat, threshold: f64, calibrating: bool, now: Instant) -> bool {
        let since = self.since_trigger(now);

        if self.state == GateState::Cooldown
            && since > self.config.rearm_min()
            && stat.peak < threshold * self.config.rearm_ratio
        {
            self.state = GateState::Armed;
        }

        if !calibrating
            && self.state == GateState::Armed
            && since > self.config.cooldown()
            && stat.peak > threshold
            && stat.ratio >= self.config.spike_ratio_min
        {
            self.last_trigger = now;
            self.state = GateState::Cooldown;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::peak_and_ratio;

    fn stat(peak: f64, ratio: f64) -> WindowStat {
        WindowStat { peak, ratio }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn starts_in_cooldown_and_rearms_once_quiet() {
        let t0 = Instant::now();
        let mut gate = EventGate::new(GateConfig::default(), t0);
        assert_eq!(gate.state(), GateState::Cooldown);
        // too early to re-arm
        assert!(!gate.update(stat(1.0, 1.0), 20.0, false, t0 + ms(10)));
        assert!(!gate.is_armed());
        assert!(!gate.update(stat(1.0, 1.0), 20.0, false, t0 + ms(30)));
        assert!(gate.is_armed());
    }

    #[test]
    fn loud_signal_keeps_gate_disarmed() {
        let t0 = Instant::now();
        let mut gate = EventGate::new(GateConfig::default(), t0);
        // 19.5 is above 20 * 0.95
        for i in 1..100 {
            assert!(!gate.update(stat(19.5, 5.0), 20.0, false, t0 + ms(10 * i)));
        }
        assert!(!gate.is_armed());
    }

    #[test]
    fn fires_on_sharp_peak_after_cooldown() {
        let t0 = Instant::now();
        let mut gate = EventGate::new(GateConfig::default(), t0);
        gate.arm(t0);
        assert!(!gate.update(stat(40.0, 3.0), 20.0, false, t0 + ms(200)));
        assert!(gate.update(stat(40.0, 3.0), 20.0, false, t0 + ms(260)));
        assert_eq!(gate.state(), GateState::Cooldown);
    }

    #[test]
    fn slow_drift_does_not_fire() {
        let t0 = Instant::now();
        let mut gate = EventGate::new(GateConfig::default(), t0);
        gate.arm(t0);
        assert!(!gate.update(stat(40.0, 1.1), 20.0, false, t0 + ms(500)));
        assert!(gate.update(stat(40.0, 1.25), 20.0, false, t0 + ms(510)));
    }

    #[test]
    fn never_fires_while_calibrating() {
        let t0 = Instant::now();
        let mut gate = EventGate::new(GateConfig::default(), t0);
        gate.arm(t0);
        for i in 0..200 {
            let fired = gate.update(stat(1e6, 1e6), 20.0, true, t0 + ms(300 + 10 * i));
            assert!(!fired);
        }
    }

    #[test]
    fn never_fires_twice_within_cooldown() {
        let t0 = Instant::now();
        let mut gate = EventGate::new(GateConfig::default(), t0);
        gate.arm(t0);
        let mut fired_at: Vec<Duration> = Vec::new();
        // alternate huge spikes and silence every 5 ms for three seconds
        for i in 0..600u64 {
            let peak = if i % 2 == 0 { 100.0 } else { 0.0 };
            let now = t0 + ms(5 * i);
            if gate.update(stat(peak, 10.0), 20.0, false, now) {
                fired_at.push(now - t0);
            }
        }
        assert!(fired_at.len() > 1);
        for pair in fired_at.windows(2) {
            assert!(pair[1] - pair[0] > ms(250));
        }
    }

    #[test]
    fn single_spike_fires_exactly_once() {
        // flat 2.0 activity with one 10-sample spike of 40, fed at 250 Hz,
        // one gate cycle per incoming sample
        let sr = 250.0;
        let lookback = 0.22;
        let mut activity = vec![2.0; 200];
        activity.extend(vec![40.0; 10]);
        activity.extend(vec![2.0; 200]);

        let t0 = Instant::now();
        let mut gate = EventGate::new(GateConfig::default(), t0);
        gate.arm(t0);
        let start = Instant::now() + ms(1000);
        let mut fired_at = Vec::new();
        for end in 1..=activity.len() {
            let now = start + Duration::from_secs_f64(end as f64 / sr);
            let s = peak_and_ratio(&activity[..end], sr, lookback);
            if gate.update(s, 20.0, false, now) {
                fired_at.push(end);
            }
        }
        assert_eq!(fired_at, vec![201]);
    }

    #[test]
    fn persistent_spike_is_not_refired_during_cooldown() {
        let t0 = Instant::now();
        let mut gate = EventGate::new(GateConfig::default(), t0);
        gate.arm(t0);
        let start = t0 + ms(1000);
        assert!(gate.update(stat(40.0, 20.0), 20.0, false, start));
        for i in 1..=25 {
            assert!(!gate.update(stat(40.0, 20.0), 20.0, false, start + ms(10 * i)));
        }
    }
}
