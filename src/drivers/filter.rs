use std::f64::consts::PI;
use crate::drivers::ProcessingError;
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FilterKind {
    Notch { freq_hz: f64, q: f64 },
    Highpass { cutoff_hz: f64, q: f64 },
    Lowpass { cutoff_hz: f64, q: f64 },
}
#[derive(Clone, Copy, Debug)]
struct BiquadCoeffs {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}
#[derive(Clone, Copy, Debug, Default)]
struct BiquadState {
    z1: f64,
    z2: f64,
}
#[derive(Clone, Copy, Debug)]
struct BiquadFilter {
    coeffs: BiquadCoeffs,
    state: BiquadState,
}
impl BiquadFilter {
    fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            state: BiquadState::default(),
        }
    }
    fn process(&mut self, input: f64) -> f64 {
        // Transposed direct form II
        let y = self.coeffs.b0 * input + self.state.z1;
        self.state.z1 = self.coeffs.b1 * input - self.coeffs.a1 * y + self.state.z2;
        self.state.z2 = self.coeffs.b2 * input - self.coeffs.a2 * y;
        y
    }
}
/// Cascade of biquad sections. Cloning yields an independent copy with the same
/// state, so a freshly designed chain can be cloned per block to start from rest.
#[derive(Clone, Default, Debug)]
pub struct FilterChain {
    sections: Vec<BiquadFilter>,
}
impl FilterChain {
    pub fn from_kinds(sample_rate_hz: f64, kinds: &[FilterKind]) -> Self {
        let sections = kinds
            .iter()
            .map(|kind| BiquadFilter::new(design_section(sample_rate_hz, *kind)))
            .collect();
        Self { sections }
    }
    /// Butterworth band-pass of the given order, built as a high-pass cascade
    /// followed by a low-pass cascade. Odd orders are rounded up to the next even one.
    pub fn butterworth_bandpass(
        sample_rate_hz: f64,
        low_hz: f64,
        high_hz: f64,
        order: usize,
    ) -> Result<Self, ProcessingError> {
        if !(sample_rate_hz > 0.0) {
            return Err(ProcessingError::InvalidSampleRate);
        }
        let nyquist = sample_rate_hz * 0.5;
        if !(low_hz > 0.0) || !(high_hz > low_hz) || low_hz >= nyquist {
            return Err(ProcessingError::InvalidBand { low_hz, high_hz });
        }
        let qs = butterworth_qs(order);
        let mut kinds = Vec::with_capacity(qs.len() * 2);
        kinds.extend(qs.iter().map(|&q| FilterKind::Highpass { cutoff_hz: low_hz, q }));
        kinds.extend(qs.iter().map(|&q| FilterKind::Lowpass { cutoff_hz: high_hz, q }));
        Ok(Self::from_kinds(sample_rate_hz, &kinds))
    }
    pub fn process_sample(&mut self, mut value: f64) -> f64 {
        for section in &mut self.sections {
            value = section.process(value);
        }
        value
    }
    pub fn process_in_place(&mut self, samples: &mut [f64]) {
        for sample in samples.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }
}
/// Per-section Q factors of an even-order Butterworth prototype.
fn butterworth_qs(order: usize) -> Vec<f64> {
    let order = (order.max(2) + 1) / 2 * 2;
    (0..order / 2)
        .map(|k| {
            let theta = (2 * k + 1) as f64 * PI / (2 * order) as f64;
            1.0 / (2.0 * theta.cos())
        })
        .collect()
}
fn design_section(sample_rate_hz: f64, kind: FilterKind) -> BiquadCoeffs {
    let nyquist = sample_rate_hz * 0.5;
    match kind {
        FilterKind::Notch { freq_hz, q } => notch(nyquist_clamp(freq_hz, nyquist), sample_rate_hz, q),
        FilterKind::Highpass { cutoff_hz, q } => {
            highpass(nyquist_clamp(cutoff_hz, nyquist), sample_rate_hz, q)
        }
        FilterKind::Lowpass { cutoff_hz, q } => {
            lowpass(nyquist_clamp(cutoff_hz, nyquist), sample_rate_hz, q)
        }
    }
}
fn nyquist_clamp(freq_hz: f64, nyquist: f64) -> f64 {
    freq_hz.clamp(0.01, nyquist - 0.01)
}
fn lowpass(freq_hz: f64, sample_rate_hz: f64, q: f64) -> BiquadCoeffs {
    let w0 = 2.0 * PI * freq_hz / sample_rate_hz;
    let alpha = w0.sin() / (2.0 * q);
    let cos_w0 = w0.cos();
    let b0 = (1.0 - cos_w0) * 0.5;
    let b1 = 1.0 - cos_w0;
    let b2 = b0;
    let a0 = 1.0 + alpha;
    let a1 = -2.0 * cos_w0;
    let a2 = 1.0 - alpha;
    normalize(b0, b1, b2, a0, a1, a2)
}
fn highpass(freq_hz: f64, sample_rate_hz: f64, q: f64) -> BiquadCoeffs {
    let w0 = 2.0 * PI * freq_hz / sample_rate_hz;
    let alpha = w0.sin() / (2.0 * q);
    let cos_w0 = w0.cos();
    let b0 = (1.0 + cos_w0) * 0.5;
    let b1 = -(1.0 + cos_w0);
    let b2 = b0;
    let a0 = 1.0 + alpha;
    let a1 = -2.0 * cos_w0;
    let a2 = 1.0 - alpha;
    normalize(b0, b1, b2, a0, a1, a2)
}
fn notch(center_hz: f64, sample_rate_hz: f64, q: f64) -> BiquadCoeffs {
    let w0 = 2.0 * PI * center_hz / sample_rate_hz;
    let alpha = w0.sin() / (2.0 * q);
    let cos_w0 = w0.cos();
    let b0 = 1.0;
    let b1 = -2.0 * cos_w0;
    let b2 = 1.0;
    let a0 = 1.0 + alpha;
    let a1 = -2.0 * cos_w0;
    let a2 = 1.0 - alpha;
    normalize(b0, b1, b2, a0, a1, a2)
}
fn normalize(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> BiquadCoeffs {
    let a0_inv = 1.0 / a0;
    BiquadCoeffs {
        b0: b0 * a0_inv,
        b1: b1 * a0_inv,
        b2: b2 * a0_inv,
        a1: a1 * a0_inv,
        a2: a2 * a0_inv,
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    fn sine(freq_hz: f64, sample_rate_hz: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| (2.0 * PI * freq_hz * i as f64 / sample_rate_hz).sin())
            .collect()
    }
    fn tail_amplitude(x: &[f64]) -> f64 {
        x[x.len() / 2..].iter().fold(0.0f64, |a, &b| a.max(b.abs()))
    }
    #[test]
    fn butterworth_qs_match_fourth_order_prototype() {
        let qs = butterworth_qs(4);
        assert_eq!(qs.len(), 2);
        assert!((qs[0] - 0.5412).abs() < 1e-3);
        assert!((qs[1] - 1.3066).abs() < 1e-3);
        assert_eq!(butterworth_qs(3).len(), 2);
    }
    #[test]
    fn bandpass_keeps_in_band_and_rejects_out_of_band() {
        let sr = 250.0;
        let mut chain = FilterChain::butterworth_bandpass(sr, 1.0, 14.0, 4).unwrap();
        let mut in_band = sine(5.0, sr, 1000);
        chain.clone().process_in_place(&mut in_band);
        let mut hum = sine(60.0, sr, 1000);
        chain.process_in_place(&mut hum);
        assert!(tail_amplitude(&in_band) > 0.8);
        assert!(tail_amplitude(&hum) < 0.05);
    }
    #[test]
    fn notch_suppresses_center_frequency() {
        let sr = 250.0;
        let mut chain = FilterChain::from_kinds(sr, &[FilterKind::Notch { freq_hz: 60.0, q: 15.0 }]);
        let mut hum = sine(60.0, sr, 2000);
        chain.process_in_place(&mut hum);
        assert!(tail_amplitude(&hum) < 0.05);
    }
    #[test]
    fn bandpass_rejects_bad_parameters() {
        assert!(matches!(
            FilterChain::butterworth_bandpass(0.0, 1.0, 14.0, 4),
            Err(ProcessingError::InvalidSampleRate)
        ));
        assert!(matches!(
            FilterChain::butterworth_bandpass(250.0, 14.0, 1.0, 4),
            Err(ProcessingError::InvalidBand { .. })
        ));
    }
}
