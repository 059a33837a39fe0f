use serde::Serialize;
/// Added to the window median so a silent window yields a ratio of zero.
pub const RATIO_EPSILON: f64 = 1e-9;
/// Peak amplitude and spike sharpness of the most recent activity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct WindowStat {
    pub peak: f64,
    pub ratio: f64,
}
/// Number of trailing samples covered by `lookback_s` (never less than one).
pub fn lookback_len(sample_rate_hz: f64, lookback_s: f64) -> usize {
    ((sample_rate_hz * lookback_s).floor().max(0.0) as usize).max(1)
}
/// Peak of `|activity|` over the lookback window and its ratio to the window median.
pub fn peak_and_ratio(activity: &[f64], sample_rate_hz: f64, lookback_s: f64) -> WindowStat {
    if activity.is_empty() {
        return WindowStat::default();
    }
    let win_n = lookback_len(sample_rate_hz, lookback_s).min(activity.len());
    let mut abs_win: Vec<f64> = activity[activity.len() - win_n..]
        .iter()
        .map(|v| v.abs())
        .collect();
    let peak = abs_win.iter().copied().fold(0.0f64, f64::max);
    let med = median(&mut abs_win) + RATIO_EPSILON;
    WindowStat {
        peak,
        ratio: peak / med,
    }
}
/// Median with the usual midpoint rule for even lengths. Reorders `values`.
pub fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) * 0.5
    } else {
        values[mid]
    }
}
/// Percentile (0..=100) with linear interpolation between order statistics.
pub fn percentile(values: &mut [f64], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let rank = pct.clamp(0.0, 100.0) / 100.0 * (values.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    values[lo] + (values[hi] - values[lo]) * frac
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn empty_activity_is_zero() {
        assert_eq!(peak_and_ratio(&[], 250.0, 0.22), WindowStat::default());
    }
    #[test]
    fn silent_window_is_finite_zero() {
        let stat = peak_and_ratio(&[0.0; 100], 250.0, 0.22);
        assert_eq!(stat.peak, 0.0);
        assert_eq!(stat.ratio, 0.0);
    }
    #[test]
    fn lookback_is_floor_of_rate_times_seconds() {
        assert_eq!(lookback_len(250.0, 0.22), 55);
        assert_eq!(lookback_len(125.0, 0.22), 27);
        assert_eq!(lookback_len(250.0, 0.0), 1);
    }
    #[test]
    fn history_beyond_lookback_is_ignored() {
        let recent: Vec<f64> = (0..55).map(|i| 2.0 + (i % 7) as f64).collect();
        let mut long = vec![500.0; 300];
        long.extend_from_slice(&recent);
        assert_eq!(
            peak_and_ratio(&long, 250.0, 0.22),
            peak_and_ratio(&recent, 250.0, 0.22)
        );
    }
    #[test]
    fn spike_over_flat_baseline() {
        let mut x = vec![2.0; 45];
        x.extend(vec![-40.0; 10]);
        let stat = peak_and_ratio(&x, 250.0, 0.22);
        assert_eq!(stat.peak, 40.0);
        assert!((stat.ratio - 20.0).abs() < 1e-6);
    }
    #[test]
    fn short_series_uses_everything() {
        let stat = peak_and_ratio(&[1.0, 3.0, 2.0], 250.0, 0.22);
        assert_eq!(stat.peak, 3.0);
        assert!((stat.ratio - 1.5).abs() < 1e-6);
    }
    #[test]
    fn order_statistics() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&mut [4.0, 1.0, 2.0, 3.0]), 2.5);
        assert!((percentile(&mut [1.0, 2.0, 3.0, 4.0, 5.0], 60.0) - 3.4).abs() < 1e-12);
        assert_eq!(percentile(&mut [7.0], 60.0), 7.0);
        assert_eq!(percentile(&mut [], 60.0), 0.0);
    }
}
