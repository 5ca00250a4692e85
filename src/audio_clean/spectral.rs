//! Spectral noise suppression
//!
//! Centered STFT, noise magnitude estimated from the lead-in frames, a
//! per-bin gain `max(1 - reduction * noise / mag, floor)`, then weighted
//! overlap-add resynthesis with the original phase.

use std::fmt;
use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use super::Conditioner;
use crate::audio_util::hann_window;
use crate::error::ConditionError;

const MAGNITUDE_EPSILON: f32 = 1e-10;
const WINDOW_SUM_TINY: f32 = 1e-8;

pub struct SpectralNoiseSuppressor {
    fft_size: usize,
    hop_size: usize,
    noise_frames: usize,
    reduction_factor: f32,
    gain_floor: f32,
    forward_fft: Arc<dyn RealToComplex<f32>>,
    inverse_fft: Arc<dyn ComplexToReal<f32>>,
    window: Vec<f32>,
}

impl fmt::Debug for SpectralNoiseSuppressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralNoiseSuppressor")
            .field("fft_size", &self.fft_size)
            .field("hop_size", &self.hop_size)
            .field("noise_frames", &self.noise_frames)
            .field("reduction_factor", &self.reduction_factor)
            .field("gain_floor", &self.gain_floor)
            .finish()
    }
}

impl SpectralNoiseSuppressor {
    /// # Arguments
    /// * `fft_size` - STFT window length (2048)
    /// * `hop_size` - Frame advance (512)
    /// * `noise_frames` - Lead-in frames assumed to be noise only (5)
    /// * `reduction_factor` - Over-subtraction amount, 0-1
    /// * `gain_floor` - Minimum per-bin gain (0.1)
    pub fn new(
        fft_size: usize,
        hop_size: usize,
        noise_frames: usize,
        reduction_factor: f32,
        gain_floor: f32,
    ) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let size = fft_size.max(2);
        let forward_fft = planner.plan_fft_forward(size);
        let inverse_fft = planner.plan_fft_inverse(size);

        Self {
            fft_size,
            hop_size,
            noise_frames,
            reduction_factor,
            gain_floor,
            forward_fft,
            inverse_fft,
            window: hann_window(size),
        }
    }

    pub fn with_reduction(reduction_factor: f32) -> Self {
        Self::new(2048, 512, 5, reduction_factor, 0.1)
    }

    fn check_params(&self) -> Result<(), ConditionError> {
        if self.fft_size < 2 || self.fft_size % 2 != 0 {
            return Err(ConditionError::InvalidParameter(format!(
                "fft size must be even and >= 2, got {}",
                self.fft_size
            )));
        }
        if self.hop_size == 0 || self.hop_size > self.fft_size {
            return Err(ConditionError::InvalidParameter(format!(
                "hop size must be in 1..={}, got {}",
                self.fft_size, self.hop_size
            )));
        }
        if !(0.0..=1.0).contains(&self.reduction_factor) {
            return Err(ConditionError::InvalidParameter(format!(
                "reduction factor must be within 0-1, got {}",
                self.reduction_factor
            )));
        }
        Ok(())
    }

    fn analyze(&self, padded: &[f32], frame_count: usize) -> Result<Vec<Vec<Complex<f32>>>, ConditionError> {
        let mut frames = Vec::with_capacity(frame_count);
        let mut buffer = self.forward_fft.make_input_vec();

        for t in 0..frame_count {
            let start = t * self.hop_size;
            for (i, (slot, w)) in buffer.iter_mut().zip(&self.window).enumerate() {
                *slot = padded[start + i] * w;
            }
            let mut spectrum = self.forward_fft.make_output_vec();
            self.forward_fft
                .process(&mut buffer, &mut spectrum)
                .map_err(|e| ConditionError::Fft(e.to_string()))?;
            frames.push(spectrum);
        }

        Ok(frames)
    }

    /// Mean magnitude per bin over the first `noise_frames` frames.
    fn noise_profile(&self, frames: &[Vec<Complex<f32>>]) -> Vec<f32> {
        let bins = self.fft_size / 2 + 1;
        let count = self.noise_frames.clamp(1, frames.len().max(1));
        let mut profile = vec![0.0f32; bins];

        for frame in frames.iter().take(count) {
            for (p, c) in profile.iter_mut().zip(frame) {
                *p += c.norm();
            }
        }
        for p in profile.iter_mut() {
            *p /= count as f32;
        }
        profile
    }
}

impl Conditioner for SpectralNoiseSuppressor {
    fn name(&self) -> &'static str {
        "spectral_noise_suppress"
    }

    fn apply(&self, samples: &[f32], _sample_rate: u32) -> Result<Vec<f32>, ConditionError> {
        self.check_params()?;
        if samples.len() < self.fft_size {
            return Err(ConditionError::SignalTooShort {
                needed: self.fft_size,
                got: samples.len(),
            });
        }

        // Center frames on hop boundaries: fft/2 zeros either side
        let half = self.fft_size / 2;
        let mut padded = vec![0.0f32; samples.len() + self.fft_size];
        padded[half..half + samples.len()].copy_from_slice(samples);
        let frame_count = 1 + (padded.len() - self.fft_size) / self.hop_size;

        let mut frames = self.analyze(&padded, frame_count)?;
        let noise = self.noise_profile(&frames);

        for spectrum in frames.iter_mut() {
            for (c, &noise_mag) in spectrum.iter_mut().zip(&noise) {
                let gain = (1.0 - self.reduction_factor * noise_mag / (c.norm() + MAGNITUDE_EPSILON))
                    .max(self.gain_floor);
                *c = *c * gain;
            }
        }

        // Weighted overlap-add
        let mut output = vec![0.0f32; padded.len()];
        let mut window_sum = vec![0.0f32; padded.len()];
        let mut time_buffer = self.inverse_fft.make_output_vec();
        let norm = 1.0 / self.fft_size as f32;
        let last_bin = self.fft_size / 2;

        for (t, spectrum) in frames.iter_mut().enumerate() {
            // Real input: DC and Nyquist bins carry no imaginary part
            spectrum[0].im = 0.0;
            spectrum[last_bin].im = 0.0;
            self.inverse_fft
                .process(spectrum, &mut time_buffer)
                .map_err(|e| ConditionError::Fft(e.to_string()))?;

            let start = t * self.hop_size;
            for (i, (&sample, &w)) in time_buffer.iter().zip(&self.window).enumerate() {
                output[start + i] += sample * norm * w;
                window_sum[start + i] += w * w;
            }
        }

        for (sample, &wsum) in output.iter_mut().zip(&window_sum) {
            if wsum > WINDOW_SUM_TINY {
                *sample /= wsum;
            }
        }

        let expected_len = self.hop_size * (frame_count - 1);
        let cleaned = output[half..half + expected_len].to_vec();
        if cleaned.iter().any(|v| !v.is_finite()) {
            return Err(ConditionError::NonFinite("spectral suppression output"));
        }
        Ok(cleaned)
    }
}
