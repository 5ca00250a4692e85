//! Zero-phase Butterworth band-limiting filters
//!
//! Coefficients come from biquad's RBJ designs; two sections with the
//! Butterworth pole Q values give a true 4th-order response per edge. The
//! cascade is run forward and then backward over an odd-extended copy of the
//! signal, so there is no group delay and the output length equals the input.

use biquad::{Coefficients, ToHertz, Type};

use super::Conditioner;
use crate::error::ConditionError;
use crate::language::{self, FrequencyBand};

/// Pole Q values of the two second-order sections of a 4th-order Butterworth.
const BUTTERWORTH_4_Q: [f64; 2] = [0.541_196_100_146_197, 1.306_562_964_876_377];

#[derive(Debug, Clone, Copy)]
enum Response {
    HighPass,
    LowPass,
}

#[derive(Debug, Clone, Copy)]
struct Section {
    coeffs: Coefficients<f64>,
}

impl Section {
    fn dc_gain(&self) -> f64 {
        let c = &self.coeffs;
        (c.b0 + c.b1 + c.b2) / (1.0 + c.a1 + c.a2)
    }

    /// Transposed direct form II, with state primed to the steady state of a
    /// constant input equal to `initial`.
    fn run(&self, data: &mut [f64], initial: f64) {
        let c = &self.coeffs;
        let settled = self.dc_gain() * initial;
        let mut s2 = c.b2 * initial - c.a2 * settled;
        let mut s1 = c.b1 * initial - c.a1 * settled + s2;

        for x in data.iter_mut() {
            let input = *x;
            let y = c.b0 * input + s1;
            s1 = c.b1 * input - c.a1 * y + s2;
            s2 = c.b2 * input - c.a2 * y;
            *x = y;
        }
    }
}

/// Cascade of second-order sections.
#[derive(Debug, Clone)]
struct ButterworthCascade {
    sections: Vec<Section>,
}

impl ButterworthCascade {
    fn design(
        response: Response,
        sample_rate: f64,
        cutoff_hz: f64,
    ) -> Result<Vec<Section>, ConditionError> {
        BUTTERWORTH_4_Q
            .iter()
            .map(|&q| {
                let kind = match response {
                    Response::HighPass => Type::HighPass,
                    Response::LowPass => Type::LowPass,
                };
                Coefficients::<f64>::from_params(kind, sample_rate.hz(), cutoff_hz.hz(), q)
                    .map(|coeffs| Section { coeffs })
                    .map_err(|e| {
                        ConditionError::FilterDesign(format!(
                            "{:?} at {} Hz: {:?}",
                            response, cutoff_hz, e
                        ))
                    })
            })
            .collect()
    }

    fn highpass(sample_rate: u32, cutoff_hz: f32) -> Result<Self, ConditionError> {
        let sections = Self::design(Response::HighPass, sample_rate as f64, cutoff_hz as f64)?;
        Ok(Self { sections })
    }

    fn bandpass(sample_rate: u32, band: FrequencyBand) -> Result<Self, ConditionError> {
        let mut sections =
            Self::design(Response::HighPass, sample_rate as f64, band.low_hz as f64)?;
        sections.extend(Self::design(
            Response::LowPass,
            sample_rate as f64,
            band.high_hz as f64,
        )?);
        Ok(Self { sections })
    }

    fn order(&self) -> usize {
        self.sections.len() * 2
    }

    fn filter(&self, data: &mut [f64]) {
        let mut initial = data.first().copied().unwrap_or(0.0);
        for section in &self.sections {
            section.run(data, initial);
            initial *= section.dc_gain();
        }
    }

    /// Forward-backward filtering over an odd extension of `3 * (order + 1)`
    /// samples at each end.
    fn filtfilt(&self, samples: &[f32]) -> Result<Vec<f32>, ConditionError> {
        let pad = 3 * (self.order() + 1);
        let n = samples.len();
        if n <= pad {
            return Err(ConditionError::SignalTooShort {
                needed: pad + 1,
                got: n,
            });
        }

        let first = samples[0] as f64;
        let last = samples[n - 1] as f64;

        let mut extended: Vec<f64> = Vec::with_capacity(n + 2 * pad);
        extended.extend((1..=pad).rev().map(|i| 2.0 * first - samples[i] as f64));
        extended.extend(samples.iter().map(|&s| s as f64));
        extended.extend((1..=pad).map(|i| 2.0 * last - samples[n - 1 - i] as f64));

        self.filter(&mut extended);
        extended.reverse();
        self.filter(&mut extended);
        extended.reverse();

        let output: Vec<f32> = extended[pad..pad + n].iter().map(|&v| v as f32).collect();
        if output.iter().any(|v| !v.is_finite()) {
            return Err(ConditionError::NonFinite("butterworth filter output"));
        }
        Ok(output)
    }
}

/// 4th-order Butterworth band-pass, zero phase.
#[derive(Debug, Clone)]
pub struct BandpassFilter {
    pub band: FrequencyBand,
}

impl BandpassFilter {
    pub fn new(band: FrequencyBand) -> Self {
        Self { band }
    }
}

impl Conditioner for BandpassFilter {
    fn name(&self) -> &'static str {
        "bandpass"
    }

    fn apply(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<f32>, ConditionError> {
        if !self.band.is_valid_for(sample_rate) {
            return Err(ConditionError::InvalidBand {
                low_hz: self.band.low_hz,
                high_hz: self.band.high_hz,
                nyquist_hz: sample_rate as f32 / 2.0,
            });
        }
        ButterworthCascade::bandpass(sample_rate, self.band)?.filtfilt(samples)
    }
}

/// 4th-order Butterworth high-pass, zero phase.
#[derive(Debug, Clone)]
pub struct HighpassFilter {
    pub cutoff_hz: f32,
}

impl HighpassFilter {
    pub fn new(cutoff_hz: f32) -> Self {
        Self { cutoff_hz }
    }
}

impl Conditioner for HighpassFilter {
    fn name(&self) -> &'static str {
        "highpass"
    }

    fn apply(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<f32>, ConditionError> {
        let nyquist_hz = sample_rate as f32 / 2.0;
        if !(self.cutoff_hz > 0.0 && self.cutoff_hz < nyquist_hz) {
            return Err(ConditionError::InvalidCutoff {
                cutoff_hz: self.cutoff_hz,
                nyquist_hz,
            });
        }
        ButterworthCascade::highpass(sample_rate, self.cutoff_hz)?.filtfilt(samples)
    }
}

/// Band-pass on the passband of a language, falling back to `fallback` when
/// the language band cannot be applied.
#[derive(Debug, Clone)]
pub struct LanguageBandpass {
    pub language: String,
    pub fallback: FrequencyBand,
}

impl LanguageBandpass {
    pub fn new(language: impl Into<String>, fallback: FrequencyBand) -> Self {
        Self {
            language: language.into(),
            fallback,
        }
    }
}

impl Conditioner for LanguageBandpass {
    fn name(&self) -> &'static str {
        "language_bandpass"
    }

    fn apply(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<f32>, ConditionError> {
        let band = language::band_for(Some(&self.language)).clamped_to(sample_rate);
        log::debug!(
            "Language {:?} band: {:.0}-{:.0} Hz",
            self.language,
            band.low_hz,
            band.high_hz
        );

        match BandpassFilter::new(band).apply(samples, sample_rate) {
            Ok(filtered) => Ok(filtered),
            Err(e) => {
                log::warn!(
                    "Language-specific band for {:?} failed: {}, using default",
                    self.language,
                    e
                );
                BandpassFilter::new(self.fallback.clamped_to(sample_rate)).apply(samples, sample_rate)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_util::rms;

    const SR: u32 = 16000;

    fn sine(freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / SR as f32).sin())
            .collect()
    }

    #[test]
    fn test_bandpass_preserves_length() {
        let filter = BandpassFilter::new(FrequencyBand::DEFAULT.clamped_to(SR));
        let out = filter.condition(sine(440.0, 4000), SR);
        assert_eq!(out.len(), 4000);
    }

    #[test]
    fn test_bandpass_passes_speech_and_rejects_rumble() {
        let filter = BandpassFilter::new(FrequencyBand::new(200.0, 4000.0));

        let voice = filter.apply(&sine(1000.0, 8000), SR).unwrap();
        let rumble = filter.apply(&sine(20.0, 8000), SR).unwrap();

        // Zero-phase: passband amplitude is kept without delay
        assert!((rms(&voice) / rms(&sine(1000.0, 8000)) - 1.0).abs() < 0.05);
        assert!(rms(&rumble) < 0.01, "rumble rms {}", rms(&rumble));
    }

    #[test]
    fn test_zero_phase_keeps_alignment() {
        let input = sine(1000.0, 8000);
        let out = BandpassFilter::new(FrequencyBand::new(200.0, 4000.0))
            .apply(&input, SR)
            .unwrap();
        // Mid-signal samples line up with the input
        for i in 4000..4016 {
            assert!((out[i] - input[i]).abs() < 0.03);
        }
    }

    #[test]
    fn test_highpass_removes_dc() {
        let samples: Vec<f32> = sine(1000.0, 8000).iter().map(|s| s + 0.2).collect();
        let out = HighpassFilter::new(80.0).apply(&samples, SR).unwrap();
        assert_eq!(out.len(), samples.len());
        assert!(crate::audio_util::mean(&out[1000..7000]).abs() < 0.01);
    }

    #[test]
    fn test_invalid_band_is_rejected() {
        let samples = sine(440.0, 1000);
        let at_nyquist = BandpassFilter::new(FrequencyBand::new(80.0, 8000.0));
        assert!(matches!(
            at_nyquist.apply(&samples, SR),
            Err(ConditionError::InvalidBand { .. })
        ));
        let inverted = BandpassFilter::new(FrequencyBand::new(3000.0, 300.0));
        assert!(inverted.apply(&samples, SR).is_err());
        assert!(HighpassFilter::new(0.0).apply(&samples, SR).is_err());
        assert!(HighpassFilter::new(9000.0).apply(&samples, SR).is_err());
    }

    #[test]
    fn test_fail_soft_on_short_input() {
        let filter = BandpassFilter::new(FrequencyBand::new(200.0, 4000.0));
        assert!(matches!(
            filter.apply(&[0.1; 10], SR),
            Err(ConditionError::SignalTooShort { .. })
        ));
        assert_eq!(filter.condition(vec![0.1; 10], SR), vec![0.1; 10]);
        assert_eq!(filter.condition(vec![0.7], SR), vec![0.7]);
        assert!(filter.condition(Vec::new(), SR).is_empty());
        assert_eq!(HighpassFilter::new(80.0).condition(vec![0.0; 5], SR), vec![0.0; 5]);
    }

    #[test]
    fn test_language_band_falls_back_on_bad_rate() {
        // At 150 Hz both the language band and the default band collapse
        // (low edge above the clamped high edge), so the stage fails soft.
        let stage = LanguageBandpass::new("en", FrequencyBand::DEFAULT);
        let samples = vec![0.25f32; 500];
        assert!(stage.apply(&samples, 150).is_err());
        assert_eq!(stage.condition(samples.clone(), 150), samples);

        // At 300 Hz the English band is empty but the default band survives
        let fallback = stage.apply(&samples, 300).unwrap();
        assert_eq!(fallback.len(), samples.len());
        assert!(fallback.iter().all(|s| s.abs() < 0.05));

        // Normal rate works
        assert_eq!(stage.condition(sine(440.0, 2000), SR).len(), 2000);
    }
}
