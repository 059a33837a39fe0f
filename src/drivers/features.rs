use crate::config::FeatureWeights;
use crate::drivers::SampleWindow;
/// Builds the per-sample blink activity from the four logical channels.
///
/// Each forehead channel is referenced to its same-side temple, which cancels
/// common-mode drift. Absolute values make the result independent of electrode
/// polarity, and the `symmetric` term keeps bilateral energy that the per-side
/// differences can partly cancel.
pub fn blink_activity(window: &SampleWindow, weights: &FeatureWeights) -> Vec<f64> {
    if window.is_empty() {
        return Vec::new();
    }
    window
        .fp1
        .iter()
        .zip(&window.fp2)
        .zip(window.left_temple.iter().zip(&window.right_temple))
        .map(|((fp1, fp2), (lt, rt))| {
            let left = fp1 - lt;
            let right = fp2 - rt;
            weights.side * left.abs() + weights.side * right.abs() + weights.symmetric * (left + right).abs()
        })
        .collect()
}
#[cfg(test)]
mod tests {
    use super::*;
    fn window(fp1: Vec<f64>, fp2: Vec<f64>, lt: Vec<f64>, rt: Vec<f64>) -> SampleWindow {
        SampleWindow::new(fp1, fp2, lt, rt).unwrap()
    }
    #[test]
    fn output_length_matches_input() {
        let w = window(vec![1.0; 37], vec![2.0; 37], vec![0.5; 37], vec![0.0; 37]);
        assert_eq!(blink_activity(&w, &FeatureWeights::default()).len(), 37);
    }
    #[test]
    fn empty_channels_give_empty_activity() {
        let w = window(vec![], vec![], vec![], vec![]);
        assert!(blink_activity(&w, &FeatureWeights::default()).is_empty());
    }
    #[test]
    fn combines_sides_and_symmetric_term() {
        // left = 3, right = -1
        let w = window(vec![4.0], vec![1.0], vec![1.0], vec![2.0]);
        let a = blink_activity(&w, &FeatureWeights::default());
        let expected = 0.5 * 3.0 + 0.5 * 1.0 + 0.15 * 2.0;
        assert!((a[0] - expected).abs() < 1e-12);
    }
    #[test]
    fn common_mode_is_cancelled() {
        let drift: Vec<f64> = (0..50).map(|i| i as f64 * 3.0).collect();
        let w = window(drift.clone(), drift.clone(), drift.clone(), drift);
        assert!(blink_activity(&w, &FeatureWeights::default())
            .iter()
            .all(|v| *v == 0.0));
    }
    #[test]
    fn insensitive_to_polarity() {
        let w = window(vec![5.0, -2.0], vec![3.0, 1.0], vec![0.0; 2], vec![0.0; 2]);
        let flipped = window(vec![-5.0, 2.0], vec![-3.0, -1.0], vec![0.0; 2], vec![0.0; 2]);
        let weights = FeatureWeights::default();
        assert_eq!(blink_activity(&w, &weights), blink_activity(&flipped, &weights));
    }
}
