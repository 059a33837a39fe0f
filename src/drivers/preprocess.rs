use log::debug;
use crate::config::FilterConfig;
use crate::drivers::filter::{FilterChain, FilterKind};
use crate::drivers::ProcessingError;
/// Quality factor of the mains notch (about 4 Hz wide at 60 Hz).
const LINE_NOISE_Q: f64 = 15.0;
/// Optional mains suppression, resolved once when the preprocessor is built.
#[derive(Clone, Debug)]
enum LineNoise {
    Notch(FilterChain),
    Unavailable,
}
/// Offset removal, blink-band filtering and optional mains suppression for one
/// raw channel at a time.
#[derive(Clone, Debug)]
pub struct Preprocessor {
    sample_rate_hz: f64,
    bandpass: FilterChain,
    line_noise: LineNoise,
}
impl Preprocessor {
    pub fn new(config: &FilterConfig, sample_rate_hz: f64) -> Result<Self, ProcessingError> {
        let bandpass = FilterChain::butterworth_bandpass(
            sample_rate_hz,
            config.low_hz,
            config.high_hz,
            config.order,
        )?;
        let line_noise = match config.mains {
            Some(mains) if mains.hz() < sample_rate_hz * 0.5 => {
                LineNoise::Notch(FilterChain::from_kinds(
                    sample_rate_hz,
                    &[FilterKind::Notch {
                        freq_hz: mains.hz(),
                        q: LINE_NOISE_Q,
                    }],
                ))
            }
            Some(mains) => {
                debug!(
                    "line-noise removal skipped: {} Hz is above Nyquist for {} Hz sampling",
                    mains.hz(),
                    sample_rate_hz
                );
                LineNoise::Unavailable
            }
            None => LineNoise::Unavailable,
        };
        Ok(Self {
            sample_rate_hz,
            bandpass,
            line_noise,
        })
    }
    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }
    pub fn removes_line_noise(&self) -> bool {
        matches!(self.line_noise, LineNoise::Notch(_))
    }
    /// Returns a filtered copy of `raw`; the input is never touched.
    pub fn process(&self, raw: &[f64]) -> Vec<f64> {
        let mut x = raw.to_vec();
        remove_offset(&mut x);
        self.bandpass.clone().process_in_place(&mut x);
        if let LineNoise::Notch(chain) = &self.line_noise {
            chain.clone().process_in_place(&mut x);
        }
        x
    }
}
/// Subtracts the mean of the block from every sample.
pub fn remove_offset(x: &mut [f64]) {
    if x.is_empty() {
        return;
    }
    let mean = x.iter().sum::<f64>() / x.len() as f64;
    for v in x.iter_mut() {
        *v -= mean;
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MainsFrequency;
    use std::f64::consts::PI;
    fn config(mains: Option<MainsFrequency>) -> FilterConfig {
        FilterConfig {
            mains,
            ..FilterConfig::default()
        }
    }
    #[test]
    fn offset_is_removed() {
        let mut x = vec![10.0, 12.0, 8.0, 10.0];
        remove_offset(&mut x);
        assert_eq!(x, vec![0.0, 2.0, -2.0, 0.0]);
    }
    #[test]
    fn output_has_input_length_and_input_is_untouched() {
        let pre = Preprocessor::new(&config(Some(MainsFrequency::Sixty)), 250.0).unwrap();
        let raw: Vec<f64> = (0..256).map(|i| 500.0 + (i as f64 * 0.1).sin()).collect();
        let copy = raw.clone();
        let out = pre.process(&raw);
        assert_eq!(out.len(), raw.len());
        assert_eq!(raw, copy);
        assert!(pre.process(&[]).is_empty());
    }
    #[test]
    fn constant_input_becomes_silent() {
        let pre = Preprocessor::new(&config(None), 250.0).unwrap();
        let out = pre.process(&[1234.5; 128]);
        assert!(out.iter().all(|v| v.abs() < 1e-9));
    }
    #[test]
    fn line_noise_capability_depends_on_nyquist() {
        assert!(Preprocessor::new(&config(Some(MainsFrequency::Sixty)), 250.0)
            .unwrap()
            .removes_line_noise());
        // 60 Hz cannot be represented at 100 Hz sampling; this degrades silently
        let low_rate = Preprocessor::new(&config(Some(MainsFrequency::Sixty)), 100.0).unwrap();
        assert!(!low_rate.removes_line_noise());
        assert!(!Preprocessor::new(&config(None), 250.0).unwrap().removes_line_noise());
    }
    #[test]
    fn invalid_sample_rate_is_an_error() {
        assert!(Preprocessor::new(&config(None), 0.0).is_err());
    }
    #[test]
    fn notch_attenuates_mains_hum() {
        let sr = 250.0;
        // 10 Hz sits in the blink band, 60 Hz is the hum
        let raw: Vec<f64> = (0..1000)
            .map(|i| {
                let t = i as f64 / sr;
                20.0 * (2.0 * PI * 10.0 * t).sin() + 20.0 * (2.0 * PI * 60.0 * t).sin()
            })
            .collect();
        let energy = |x: &[f64]| x[500..].iter().map(|v| v * v).sum::<f64>();
        let with_notch = Preprocessor::new(&config(Some(MainsFrequency::Sixty)), sr).unwrap();
        let without = Preprocessor::new(&config(None), sr).unwrap();
        let notched = with_notch.process(&raw);
        let plain = without.process(&raw);
        assert!(energy(&notched) < energy(&plain));
        assert!(notched.iter().all(|v| v.is_finite()));
    }
}
