//! Level conditioners: RMS normalization, peak normalization, DC removal.

use super::Conditioner;
use crate::audio_util::{db_to_linear, linear_to_db, mean, peak, rms};
use crate::error::ConditionError;

/// Scales the signal so its RMS level sits at `target_db`, then backs the
/// gain off if the peak would exceed `clip_ceiling`.
#[derive(Debug, Clone)]
pub struct Normalize {
    pub target_db: f32,
    pub clip_ceiling: f32,
}

impl Normalize {
    pub fn new(target_db: f32, clip_ceiling: f32) -> Self {
        Self {
            target_db,
            clip_ceiling,
        }
    }
}

impl Default for Normalize {
    fn default() -> Self {
        Self::new(-20.0, 0.95)
    }
}

impl Conditioner for Normalize {
    fn name(&self) -> &'static str {
        "normalize"
    }

    fn apply(&self, samples: &[f32], _sample_rate: u32) -> Result<Vec<f32>, ConditionError> {
        if self.clip_ceiling <= 0.0 {
            return Err(ConditionError::InvalidParameter(format!(
                "clip ceiling must be positive, got {}",
                self.clip_ceiling
            )));
        }

        let level = rms(samples);
        if level == 0.0 {
            return Ok(samples.to_vec());
        }

        let gain_db = self.target_db - linear_to_db(level);
        let mut gain = db_to_linear(gain_db);

        let scaled_peak = peak(samples) * gain;
        if scaled_peak > self.clip_ceiling {
            gain *= self.clip_ceiling / scaled_peak;
        }

        if !gain.is_finite() {
            return Err(ConditionError::NonFinite("normalize gain"));
        }

        Ok(samples.iter().map(|s| s * gain).collect())
    }
}

/// Scales the signal so its absolute peak equals `target_peak`.
#[derive(Debug, Clone)]
pub struct PeakNormalize {
    pub target_peak: f32,
}

impl PeakNormalize {
    pub fn new(target_peak: f32) -> Self {
        Self { target_peak }
    }
}

impl Default for PeakNormalize {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Conditioner for PeakNormalize {
    fn name(&self) -> &'static str {
        "peak_normalize"
    }

    fn apply(&self, samples: &[f32], _sample_rate: u32) -> Result<Vec<f32>, ConditionError> {
        let current = peak(samples);
        if current == 0.0 {
            return Ok(samples.to_vec());
        }
        let gain = self.target_peak / current;
        Ok(samples.iter().map(|s| s * gain).collect())
    }
}

/// Subtracts the arithmetic mean from every sample.
#[derive(Debug, Clone, Default)]
pub struct RemoveDcOffset;

impl Conditioner for RemoveDcOffset {
    fn name(&self) -> &'static str {
        "remove_dc_offset"
    }

    fn apply(&self, samples: &[f32], _sample_rate: u32) -> Result<Vec<f32>, ConditionError> {
        let offset = mean(samples);
        Ok(samples.iter().map(|s| s - offset).collect())
    }
}
