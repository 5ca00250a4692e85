//! Pre-emphasis: first-order difference filter `y[n] = x[n] - coeff * x[n-1]`.
//!
//! Lifts energy above a few hundred Hz (~6 dB/octave), which sharpens
//! consonants ahead of transcription. The first sample passes through.

use super::Conditioner;
use crate::error::ConditionError;

pub const DEFAULT_PRE_EMPHASIS: f32 = 0.97;

#[derive(Debug, Clone)]
pub struct PreEmphasis {
    pub coefficient: f32,
}

impl PreEmphasis {
    pub fn new(coefficient: f32) -> Self {
        Self { coefficient }
    }
}

impl Default for PreEmphasis {
    fn default() -> Self {
        Self::new(DEFAULT_PRE_EMPHASIS)
    }
}

impl Conditioner for PreEmphasis {
    fn name(&self) -> &'static str {
        "pre_emphasis"
    }

    fn apply(&self, samples: &[f32], _sample_rate: u32) -> Result<Vec<f32>, ConditionError> {
        let mut output = Vec::with_capacity(samples.len());
        let mut prev = None;
        for &sample in samples {
            output.push(match prev {
                Some(p) => sample - self.coefficient * p,
                None => sample,
            });
            prev = Some(sample);
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dc_is_attenuated() {
        let out = PreEmphasis::default().condition(vec![1.0f32; 100], 16000);
        assert!((out[0] - 1.0).abs() < 1e-6);
        assert!((out[50] - 0.03).abs() < 1e-6);
    }

    #[test]
    fn test_high_freq_boosted() {
        let samples: Vec<f32> = (0..100).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }).collect();
        let out = PreEmphasis::default().condition(samples, 16000);
        // 0.5 - 0.97 * -0.5
        assert!((out[1] + 0.985).abs() < 1e-6);
        assert!((out[2] - 0.985).abs() < 1e-6);
    }

    #[test]
    fn test_length_and_degenerate_inputs() {
        assert_eq!(PreEmphasis::default().condition(vec![0.4], 16000), vec![0.4]);
        assert!(PreEmphasis::default().condition(Vec::new(), 16000).is_empty());
        assert_eq!(PreEmphasis::default().condition(vec![0.1; 777], 16000).len(), 777);
    }
}
