//! Adaptive Wiener-style gain
//!
//! Noise variance comes from the quietest samples (below the given
//! percentile of magnitudes). The gain `signal_var / (signal_var + noise_var)`
//! is laid out as a per-sample curve, smoothed with a 5-point quadratic
//! Savitzky-Golay kernel, and multiplied in.

use super::Conditioner;
use crate::audio_util::{abs_percentile, variance};
use crate::error::ConditionError;

/// Savitzky-Golay window 5, polyorder 2.
const SAVGOL_5: [f32; 5] = [-3.0 / 35.0, 12.0 / 35.0, 17.0 / 35.0, 12.0 / 35.0, -3.0 / 35.0];

#[derive(Debug, Clone)]
pub struct AdaptiveWienerFilter {
    pub noise_variance_fallback: f32,
    pub quiet_percentile: f32,
}

impl AdaptiveWienerFilter {
    pub fn new(noise_variance_fallback: f32, quiet_percentile: f32) -> Self {
        Self {
            noise_variance_fallback,
            quiet_percentile,
        }
    }

    fn estimate_noise_variance(&self, samples: &[f32]) -> f32 {
        let threshold = match abs_percentile(samples, self.quiet_percentile) {
            Some(t) => t,
            None => return self.noise_variance_fallback,
        };
        let quiet: Vec<f32> = samples
            .iter()
            .copied()
            .filter(|s| s.abs() < threshold)
            .collect();
        if quiet.is_empty() {
            log::debug!("No samples below quiet threshold, using fallback noise variance");
            self.noise_variance_fallback
        } else {
            variance(&quiet)
        }
    }
}

impl Default for AdaptiveWienerFilter {
    fn default() -> Self {
        Self::new(0.01, 10.0)
    }
}

/// Symmetric smoothing with mirrored edges. Curves shorter than the kernel
/// come back unchanged.
fn savgol_smooth(curve: &[f32]) -> Vec<f32> {
    let n = curve.len();
    if n < SAVGOL_5.len() {
        return curve.to_vec();
    }
    let reach = (SAVGOL_5.len() / 2) as isize;
    let mirror = |i: isize| -> f32 {
        let idx = if i < 0 {
            -i
        } else if i >= n as isize {
            2 * (n as isize - 1) - i
        } else {
            i
        };
        curve[idx as usize]
    };

    (0..n as isize)
        .map(|i| {
            SAVGOL_5
                .iter()
                .enumerate()
                .map(|(k, w)| w * mirror(i + k as isize - reach))
                .sum()
        })
        .collect()
}

impl Conditioner for AdaptiveWienerFilter {
    fn name(&self) -> &'static str {
        "adaptive_wiener"
    }

    fn apply(&self, samples: &[f32], _sample_rate: u32) -> Result<Vec<f32>, ConditionError> {
        if self.noise_variance_fallback < 0.0 {
            return Err(ConditionError::InvalidParameter(format!(
                "noise variance fallback must be non-negative, got {}",
                self.noise_variance_fallback
            )));
        }

        let signal_variance = variance(samples);
        if signal_variance == 0.0 {
            // Empty or constant: nothing to separate
            return Ok(samples.to_vec());
        }

        let noise_variance = self.estimate_noise_variance(samples);
        let gain = signal_variance / (signal_variance + noise_variance);
        if !gain.is_finite() {
            return Err(ConditionError::NonFinite("wiener gain"));
        }
        log::debug!(
            "Wiener gain {:.4} (signal var {:.6}, noise var {:.6})",
            gain,
            signal_variance,
            noise_variance
        );

        let smoothed = savgol_smooth(&vec![gain; samples.len()]);
        Ok(samples.iter().zip(&smoothed).map(|(s, g)| s * g).collect())
    }
}
