//! Speech audio preprocessing ahead of transcription.
//!
//! Raw upload bytes are decoded to mono samples, run through one of three
//! conditioning profiles and re-encoded as 16-bit PCM WAV. Any failure hands
//! the original bytes back.

pub mod audio_clean;
pub mod audio_util;
pub mod codec;
pub mod commands;
pub mod config;
pub mod error;
pub mod language;
pub mod quality;

pub use audio_clean::{
    preprocess_audio, Conditioner, PipelineOptions, PreprocessOutcome, PreprocessStatus,
    PreprocessingProfile, Preprocessor,
};
pub use config::AppConfig;
pub use error::{CodecError, ConditionError, ConfigError};
pub use language::FrequencyBand;
pub use quality::{QualityAssessor, QualityMetrics};

/// Rate the pipeline decodes to and encodes at.
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;
