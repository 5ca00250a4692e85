//! Speech conditioning pipeline module
//!
//! Provides the sample-sequence transforms applied ahead of transcription:
//! 1. Level normalization and DC-offset removal
//! 2. Band-limiting filters (zero-phase Butterworth)
//! 3. Spectral noise suppression (STFT gain)
//! 4. Adaptive Wiener gain
//! 5. Silence trimming
//! 6. Pre-emphasis
//!
//! Every stage implements [`Conditioner`]; `condition` never fails and hands
//! back its input when the stage cannot run.

pub mod emphasis;
pub mod filters;
pub mod level;
pub mod pipeline;
pub mod spectral;
pub mod trim;
pub mod wiener;

pub use emphasis::PreEmphasis;
pub use filters::{BandpassFilter, HighpassFilter, LanguageBandpass};
pub use level::{Normalize, PeakNormalize, RemoveDcOffset};
pub use pipeline::{
    preprocess_audio, PipelineOptions, PreprocessOutcome, PreprocessStatus, PreprocessingProfile,
    Preprocessor, QualityComparison,
};
pub use spectral::SpectralNoiseSuppressor;
pub use trim::TrimSilence;
pub use wiener::AdaptiveWienerFilter;

use crate::error::ConditionError;

/// A single stage of the conditioning chain.
pub trait Conditioner: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run the transform. Implementations must not mutate shared state.
    fn apply(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<f32>, ConditionError>;

    /// Fail-soft wrapper around [`Conditioner::apply`]: errors and non-finite
    /// output are logged and the input comes back unchanged.
    fn condition(&self, samples: Vec<f32>, sample_rate: u32) -> Vec<f32> {
        match self.apply(&samples, sample_rate) {
            Ok(output) if output.iter().all(|s| s.is_finite()) => output,
            Ok(_) => {
                log::warn!(
                    "{} produced non-finite samples, returning original audio",
                    self.name()
                );
                samples
            }
            Err(e) => {
                log::warn!("{} failed: {}, returning original audio", self.name(), e);
                samples
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl Conditioner for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn apply(&self, samples: &[f32], _sample_rate: u32) -> Result<Vec<f32>, ConditionError> {
            if samples.len() > 2 {
                Ok(vec![f32::NAN; samples.len()])
            } else {
                Err(ConditionError::InvalidParameter("always".to_string()))
            }
        }
    }

    #[test]
    fn test_condition_returns_input_on_error() {
        assert_eq!(Broken.condition(vec![0.1, 0.2], 16000), vec![0.1, 0.2]);
    }

    #[test]
    fn test_condition_rejects_non_finite_output() {
        assert_eq!(Broken.condition(vec![0.1, 0.2, 0.3], 16000), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_every_stage_survives_pathological_input() {
        let stages: Vec<Box<dyn Conditioner>> = vec![
            Box::new(Normalize::default()),
            Box::new(PeakNormalize::default()),
            Box::new(RemoveDcOffset),
            Box::new(BandpassFilter::new(crate::language::FrequencyBand::new(80.0, 7600.0))),
            Box::new(HighpassFilter::new(80.0)),
            Box::new(SpectralNoiseSuppressor::with_reduction(0.7)),
            Box::new(AdaptiveWienerFilter::default()),
            Box::new(TrimSilence::default()),
            Box::new(PreEmphasis::default()),
        ];

        // Empty and all-zero buffers have nothing to transform
        for stage in &stages {
            assert_eq!(stage.condition(Vec::new(), 16000), Vec::<f32>::new(), "{}", stage.name());
            assert_eq!(stage.condition(vec![0.0; 8], 16000), vec![0.0; 8], "{}", stage.name());
            let single = stage.condition(vec![0.25], 16000);
            assert!(single.len() <= 1, "{}", stage.name());
            assert!(single.iter().all(|s| s.is_finite()), "{}", stage.name());
        }
    }
}
