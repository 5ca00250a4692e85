use std::path::PathBuf;

/// Failures at the byte-buffer boundary (decode on the way in, encode on the way out).
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("No audio tracks found")]
    NoAudioTrack,
    #[error("Decoded stream contained no samples")]
    EmptyAudio,
    #[error("Resample failed: {0}")]
    Resample(String),
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Per-stage conditioner failures. The pipeline never propagates these; the
/// stage is skipped and its input is passed through.
#[derive(Debug, thiserror::Error)]
pub enum ConditionError {
    #[error("Invalid band {low_hz}-{high_hz} Hz (nyquist {nyquist_hz} Hz)")]
    InvalidBand {
        low_hz: f32,
        high_hz: f32,
        nyquist_hz: f32,
    },
    #[error("Invalid cutoff {cutoff_hz} Hz (nyquist {nyquist_hz} Hz)")]
    InvalidCutoff { cutoff_hz: f32, nyquist_hz: f32 },
    #[error("Signal too short: need {needed} samples, got {got}")]
    SignalTooShort { needed: usize, got: usize },
    #[error("Filter design failed: {0}")]
    FilterDesign(String),
    #[error("FFT failed: {0}")]
    Fft(String),
    #[error("Non-finite value in {0}")]
    NonFinite(&'static str),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse configuration file: {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
