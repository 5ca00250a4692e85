//! Leading/trailing silence trimming
//!
//! Frames are centered on hop boundaries (zero padded by half a frame at
//! each end). A frame is silent when its mean power is more than `top_db`
//! below the loudest frame; everything before the first and after the last
//! non-silent frame is dropped.

use super::Conditioner;
use crate::error::ConditionError;

/// Power floor before taking logs.
const POWER_FLOOR: f64 = 1e-10;

#[derive(Debug, Clone)]
pub struct TrimSilence {
    pub top_db: f32,
    pub frame_length: usize,
    pub hop_size: usize,
}

impl TrimSilence {
    pub fn new(top_db: f32, frame_length: usize, hop_size: usize) -> Self {
        Self {
            top_db,
            frame_length,
            hop_size,
        }
    }

    pub fn with_top_db(top_db: f32) -> Self {
        Self::new(top_db, 2048, 512)
    }

    /// Mean power of each centered frame.
    fn frame_powers(&self, samples: &[f32]) -> Vec<f64> {
        let n = samples.len();
        let mut prefix = Vec::with_capacity(n + 1);
        prefix.push(0.0f64);
        let mut acc = 0.0f64;
        for &s in samples {
            acc += (s as f64) * (s as f64);
            prefix.push(acc);
        }

        let half = (self.frame_length / 2) as isize;
        let frame_count = 1 + n / self.hop_size;
        (0..frame_count)
            .map(|t| {
                let start = (t * self.hop_size) as isize - half;
                let end = start + self.frame_length as isize;
                let lo = start.clamp(0, n as isize) as usize;
                let hi = end.clamp(0, n as isize) as usize;
                (prefix[hi] - prefix[lo]) / self.frame_length as f64
            })
            .collect()
    }
}

impl Default for TrimSilence {
    fn default() -> Self {
        Self::with_top_db(20.0)
    }
}

impl Conditioner for TrimSilence {
    fn name(&self) -> &'static str {
        "trim_silence"
    }

    fn apply(&self, samples: &[f32], _sample_rate: u32) -> Result<Vec<f32>, ConditionError> {
        if self.frame_length == 0 || self.hop_size == 0 {
            return Err(ConditionError::InvalidParameter(format!(
                "frame length and hop must be positive, got {}/{}",
                self.frame_length, self.hop_size
            )));
        }
        if samples.is_empty() {
            return Ok(Vec::new());
        }

        let powers = self.frame_powers(samples);
        let reference = powers.iter().copied().fold(0.0f64, f64::max);
        let reference_db = 10.0 * reference.max(POWER_FLOOR).log10();
        let threshold = -(self.top_db as f64);

        let loud = |p: &f64| 10.0 * p.max(POWER_FLOOR).log10() - reference_db > threshold;
        let first = powers.iter().position(loud);
        let last = powers.iter().rposition(loud);

        match (first, last) {
            (Some(first), Some(last)) => {
                let start = (first * self.hop_size).min(samples.len());
                let end = ((last + 1) * self.hop_size).min(samples.len());
                log::debug!(
                    "Trimmed {} leading and {} trailing samples",
                    start,
                    samples.len() - end
                );
                Ok(samples[start..end].to_vec())
            }
            _ => Ok(Vec::new()),
        }
    }
}
