//! Objective before/after quality metrics.
//!
//! None of these gate the pipeline output. A metric that cannot be computed
//! is left out of the record, and comparisons fail open.

use std::fmt;
use std::sync::Arc;

use realfft::{RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

use crate::audio_util::{abs_percentile, hann_window, peak};

const EPSILON: f64 = 1e-10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snr_estimate_db: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic_range_db: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zero_crossing_rate: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spectral_centroid_hz: Option<f32>,
}

impl QualityMetrics {
    pub fn is_empty(&self) -> bool {
        self.snr_estimate_db.is_none()
            && self.dynamic_range_db.is_none()
            && self.zero_crossing_rate.is_none()
            && self.spectral_centroid_hz.is_none()
    }
}

fn finite(value: f64) -> Option<f32> {
    let value = value as f32;
    value.is_finite().then_some(value)
}

pub struct QualityAssessor {
    fft_size: usize,
    hop_size: usize,
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
}

impl fmt::Debug for QualityAssessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QualityAssessor")
            .field("fft_size", &self.fft_size)
            .field("hop_size", &self.hop_size)
            .finish()
    }
}

impl Default for QualityAssessor {
    fn default() -> Self {
        Self::new(2048, 512)
    }
}

impl QualityAssessor {
    pub fn new(fft_size: usize, hop_size: usize) -> Self {
        let fft_size = fft_size.max(2);
        let fft = RealFftPlanner::<f32>::new().plan_fft_forward(fft_size);
        Self {
            fft_size,
            hop_size: hop_size.max(1),
            fft,
            window: hann_window(fft_size),
        }
    }

    /// Compute every metric that is defined for `samples`. Empty and all-zero
    /// input yields an empty record.
    pub fn assess(&self, samples: &[f32], sample_rate: u32) -> QualityMetrics {
        if samples.is_empty() || samples.iter().all(|&s| s == 0.0) {
            return QualityMetrics::default();
        }

        QualityMetrics {
            snr_estimate_db: snr_estimate_db(samples),
            dynamic_range_db: dynamic_range_db(samples),
            zero_crossing_rate: zero_crossing_rate(samples),
            spectral_centroid_hz: self.spectral_centroid_hz(samples, sample_rate),
        }
    }

    /// True when SNR went up and the zero-crossing rate went down. Missing
    /// values read as SNR 0 and ZCR 1; a non-finite value means the
    /// comparison cannot be made and the answer is `true`.
    pub fn is_improvement(before: &QualityMetrics, after: &QualityMetrics) -> bool {
        let snr_before = before.snr_estimate_db.unwrap_or(0.0);
        let snr_after = after.snr_estimate_db.unwrap_or(0.0);
        let zcr_before = before.zero_crossing_rate.unwrap_or(1.0);
        let zcr_after = after.zero_crossing_rate.unwrap_or(1.0);

        if ![snr_before, snr_after, zcr_before, zcr_after]
            .iter()
            .all(|v| v.is_finite())
        {
            log::warn!("Quality comparison has non-finite metrics, assuming improvement");
            return true;
        }

        snr_after > snr_before && zcr_after < zcr_before
    }

    /// Assess both signals and compare them.
    pub fn validate(&self, original: &[f32], processed: &[f32], sample_rate: u32) -> bool {
        let before = self.assess(original, sample_rate);
        let after = self.assess(processed, sample_rate);
        Self::is_improvement(&before, &after)
    }

    /// Mean over centered STFT frames of the magnitude-weighted mean
    /// frequency. Silent frames count as 0 Hz.
    fn spectral_centroid_hz(&self, samples: &[f32], sample_rate: u32) -> Option<f32> {
        if sample_rate == 0 {
            return None;
        }

        let half = self.fft_size / 2;
        let mut padded = vec![0.0f32; samples.len() + self.fft_size];
        padded[half..half + samples.len()].copy_from_slice(samples);
        let frame_count = 1 + samples.len() / self.hop_size;

        let bin_hz = sample_rate as f64 / self.fft_size as f64;
        let mut input = self.fft.make_input_vec();
        let mut spectrum = self.fft.make_output_vec();
        let mut total = 0.0f64;

        for t in 0..frame_count {
            let start = t * self.hop_size;
            for (i, (slot, w)) in input.iter_mut().zip(&self.window).enumerate() {
                *slot = padded.get(start + i).copied().unwrap_or(0.0) * w;
            }
            if let Err(e) = self.fft.process(&mut input, &mut spectrum) {
                log::warn!("Spectral centroid FFT failed: {}", e);
                return None;
            }

            let (weighted, energy) = spectrum.iter().enumerate().fold(
                (0.0f64, 0.0f64),
                |(weighted, energy), (k, c)| {
                    let mag = c.norm() as f64;
                    (weighted + mag * k as f64 * bin_hz, energy + mag)
                },
            );
            if energy > EPSILON {
                total += weighted / energy;
            }
        }

        finite(total / frame_count as f64)
    }
}

/// `20·log10(mean power / (noise floor² + ε))`, noise floor being the 10th
/// percentile of absolute sample values.
fn snr_estimate_db(samples: &[f32]) -> Option<f32> {
    let power =
        samples.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>() / samples.len() as f64;
    let noise_floor = abs_percentile(samples, 10.0)? as f64;
    finite(20.0 * (power / (noise_floor * noise_floor + EPSILON)).log10())
}

fn dynamic_range_db(samples: &[f32]) -> Option<f32> {
    let min_non_zero = samples
        .iter()
        .map(|s| s.abs())
        .filter(|&m| m > 0.0)
        .min_by(|a, b| a.total_cmp(b))?;
    finite(20.0 * (peak(samples) as f64 / (min_non_zero as f64 + EPSILON)).log10())
}

/// Fraction of adjacent sample pairs that change sign.
fn zero_crossing_rate(samples: &[f32]) -> Option<f32> {
    if samples.len() < 2 {
        return Some(0.0);
    }
    let crossings = samples
        .windows(2)
        .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
        .count();
    Some(crossings as f32 / (samples.len() - 1) as f32)
}
