use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::audio_clean::{PipelineOptions, PreprocessingProfile, Preprocessor};
use crate::error::ConfigError;
use crate::DEFAULT_SAMPLE_RATE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub target_sample_rate: u32,
    pub profile: String,
    pub language: Option<String>,
    pub assess_quality: bool,
    /// Concurrent files in `clean`; 0 means one per CPU.
    pub workers: usize,
    pub pipeline: PipelineOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: DEFAULT_SAMPLE_RATE,
            profile: PreprocessingProfile::default().as_str().to_string(),
            language: None,
            assess_quality: false,
            workers: 0,
            pipeline: PipelineOptions::default(),
        }
    }
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.pipeline;

        if self.target_sample_rate == 0 {
            return Err(ConfigError::Invalid("target_sample_rate must be positive".into()));
        }

        if p.fft_size < 2 || p.fft_size % 2 != 0 {
            return Err(ConfigError::Invalid(format!(
                "pipeline.fft_size must be even and at least 2, got {}",
                p.fft_size
            )));
        }

        if p.hop_size == 0 || p.hop_size > p.fft_size {
            return Err(ConfigError::Invalid(format!(
                "pipeline.hop_size must be in 1..={}, got {}",
                p.fft_size, p.hop_size
            )));
        }

        if p.trim_frame_length == 0 || p.trim_hop_size == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.trim_frame_length and trim_hop_size must be positive".into(),
            ));
        }

        for (name, value) in [
            ("standard_reduction", p.standard_reduction),
            ("aggressive_reduction", p.aggressive_reduction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "pipeline.{} must be within 0-1, got {}",
                    name, value
                )));
            }
        }

        if p.clip_ceiling <= 0.0 || p.final_peak <= 0.0 {
            return Err(ConfigError::Invalid(
                "pipeline.clip_ceiling and final_peak must be positive".into(),
            ));
        }

        if !(p.default_low_hz > 0.0 && p.default_low_hz < p.default_high_hz) {
            return Err(ConfigError::Invalid(format!(
                "pipeline default band {}-{} Hz is not ordered",
                p.default_low_hz, p.default_high_hz
            )));
        }

        if p.wiener_noise_variance < 0.0 {
            return Err(ConfigError::Invalid(
                "pipeline.wiener_noise_variance must be non-negative".into(),
            ));
        }

        Ok(())
    }

    pub fn profile(&self) -> PreprocessingProfile {
        PreprocessingProfile::from_name(&self.profile)
    }

    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    pub fn preprocessor(&self) -> Preprocessor {
        Preprocessor::new(self.pipeline.clone(), self.target_sample_rate)
            .with_quality_assessment(self.assess_quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.target_sample_rate, 16000);
        assert_eq!(config.profile(), PreprocessingProfile::Standard);
        assert!(config.worker_count() >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
profile = "aggressive"
language = "ja"
workers = 3

[pipeline]
aggressive_reduction = 0.8
trim_top_db = 25.0
"#
        )
        .unwrap();

        let config = AppConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.profile(), PreprocessingProfile::Aggressive);
        assert_eq!(config.language.as_deref(), Some("ja"));
        assert_eq!(config.worker_count(), 3);
        assert_eq!(config.pipeline.aggressive_reduction, 0.8);
        assert_eq!(config.pipeline.trim_top_db, 25.0);
        assert_eq!(config.pipeline.hop_size, 512);
        assert_eq!(config.target_sample_rate, 16000);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load_from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = AppConfig::from_toml_str("profile = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        for bad in [
            "target_sample_rate = 0",
            "[pipeline]\nhop_size = 4096",
            "[pipeline]\nfft_size = 1023",
            "[pipeline]\nstandard_reduction = 1.5",
            "[pipeline]\ndefault_low_hz = 9000.0",
            "[pipeline]\ntrim_hop_size = 0",
        ] {
            assert!(
                matches!(AppConfig::from_toml_str(bad), Err(ConfigError::Invalid(_))),
                "{}",
                bad
            );
        }
    }

    #[test]
    fn test_unknown_profile_name_falls_back() {
        let config = AppConfig::from_toml_str("profile = \"turbo\"").unwrap();
        assert_eq!(config.profile(), PreprocessingProfile::Standard);
    }

    #[test]
    fn test_round_trips_through_toml() {
        let config = AppConfig {
            language: Some("fr".into()),
            ..Default::default()
        };
        let text = toml::to_string(&config).unwrap();
        assert_eq!(AppConfig::from_toml_str(&text).unwrap(), config);
    }
}
