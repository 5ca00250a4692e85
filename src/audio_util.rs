//! Numeric helpers shared by the conditioners and the quality assessor.

/// Root-mean-square level. Accumulates in f64 so long buffers keep precision.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}

pub fn mean(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| s as f64).sum();
    (sum / samples.len() as f64) as f32
}

/// Population variance (divides by `n`).
pub fn variance(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let m = mean(samples) as f64;
    let sum: f64 = samples
        .iter()
        .map(|&s| {
            let d = s as f64 - m;
            d * d
        })
        .sum();
    (sum / samples.len() as f64) as f32
}

/// Largest absolute sample value.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
}

/// Percentile with linear interpolation between closest ranks.
///
/// `p` is in percent (0-100). Sorts `values` in place. Returns `None` for an
/// empty slice.
pub fn percentile(values: &mut [f32], p: f32) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let pos = (p.clamp(0.0, 100.0) / 100.0) * (values.len() - 1) as f32;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        Some(values[lo])
    } else {
        let d = pos - lo as f32;
        Some(values[lo] * (1.0 - d) + values[hi] * d)
    }
}

/// Percentile of the absolute sample values.
pub fn abs_percentile(samples: &[f32], p: f32) -> Option<f32> {
    let mut magnitudes: Vec<f32> = samples.iter().map(|s| s.abs()).collect();
    percentile(&mut magnitudes, p)
}

pub fn db_to_linear(db: f32) -> f32 {
    10_f32.powf(db / 20.0)
}

pub fn linear_to_db(linear: f32) -> f32 {
    20.0 * linear.log10()
}

/// Periodic Hann window, as used for STFT analysis/synthesis.
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos()))
        .collect()
}
