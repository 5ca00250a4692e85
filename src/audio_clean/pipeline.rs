//! Preprocessing pipeline orchestration
//!
//! Selects the ordered stage list for a profile, runs it fail-soft, and
//! wraps decode/encode so a caller always gets a playable buffer back.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};

use super::{
    AdaptiveWienerFilter, BandpassFilter, Conditioner, LanguageBandpass, Normalize, PeakNormalize,
    PreEmphasis, RemoveDcOffset, SpectralNoiseSuppressor, TrimSilence,
};
use crate::codec;
use crate::language::FrequencyBand;
use crate::quality::{QualityAssessor, QualityMetrics};

/// Processing intensity. A run picks exactly one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreprocessingProfile {
    /// Normalize, DC removal, trim. For already-clean input.
    Minimal,
    #[default]
    Standard,
    /// Standard plus stronger suppression, Wiener gain and a tighter trim.
    Aggressive,
}

impl PreprocessingProfile {
    pub const ALL: [PreprocessingProfile; 3] = [Self::Minimal, Self::Standard, Self::Aggressive];

    /// Parse a profile name, falling back to `Standard` for anything unknown.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "minimal" => Self::Minimal,
            "standard" => Self::Standard,
            "aggressive" => Self::Aggressive,
            _ => {
                log::warn!("Unknown preprocessing profile: {:?}, using standard", name);
                Self::Standard
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Standard => "standard",
            Self::Aggressive => "aggressive",
        }
    }
}

impl fmt::Display for PreprocessingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage parameters. Every field has a default, so a partial `[pipeline]`
/// table only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    pub normalize_target_db: f32,
    pub clip_ceiling: f32,

    pub fft_size: usize,
    pub hop_size: usize,
    pub noise_estimate_frames: usize,
    pub standard_reduction: f32,
    pub aggressive_reduction: f32,
    pub gain_floor: f32,

    pub trim_top_db: f32,
    pub aggressive_trim_top_db: f32,
    pub trim_frame_length: usize,
    pub trim_hop_size: usize,

    pub wiener_noise_variance: f32,
    pub wiener_quiet_percentile: f32,

    pub pre_emphasis: f32,

    pub default_low_hz: f32,
    pub default_high_hz: f32,

    /// Peak level of the closing normalization
    pub final_peak: f32,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            normalize_target_db: -20.0,
            clip_ceiling: 0.95,
            fft_size: 2048,
            hop_size: 512,
            noise_estimate_frames: 5,
            standard_reduction: 0.7,
            aggressive_reduction: 0.9,
            gain_floor: 0.1,
            trim_top_db: 20.0,
            aggressive_trim_top_db: 15.0,
            trim_frame_length: 2048,
            trim_hop_size: 512,
            wiener_noise_variance: 0.01,
            wiener_quiet_percentile: 10.0,
            pre_emphasis: super::emphasis::DEFAULT_PRE_EMPHASIS,
            default_low_hz: FrequencyBand::DEFAULT.low_hz,
            default_high_hz: FrequencyBand::DEFAULT.high_hz,
            final_peak: 1.0,
        }
    }
}

impl PipelineOptions {
    pub fn default_band(&self) -> FrequencyBand {
        FrequencyBand::new(self.default_low_hz, self.default_high_hz)
    }

    fn spectral(&self, reduction: f32) -> SpectralNoiseSuppressor {
        SpectralNoiseSuppressor::new(
            self.fft_size,
            self.hop_size,
            self.noise_estimate_frames,
            reduction,
            self.gain_floor,
        )
    }

    fn trim(&self, top_db: f32) -> TrimSilence {
        TrimSilence::new(top_db, self.trim_frame_length, self.trim_hop_size)
    }

    /// Band-limiting stage: the language band when a hint is given, the
    /// default band otherwise. Bands are clamped to what `sample_rate` can
    /// represent.
    fn band_stage(&self, language: Option<&str>, sample_rate: u32) -> Box<dyn Conditioner> {
        match language.map(str::trim).filter(|l| !l.is_empty()) {
            Some(language) => Box::new(LanguageBandpass::new(language, self.default_band())),
            None => Box::new(BandpassFilter::new(self.default_band().clamped_to(sample_rate))),
        }
    }

    /// The ordered stage list for `profile`.
    pub fn stages(
        &self,
        profile: PreprocessingProfile,
        language: Option<&str>,
        sample_rate: u32,
    ) -> Vec<Box<dyn Conditioner>> {
        let mut stages: Vec<Box<dyn Conditioner>> = vec![
            Box::new(Normalize::new(self.normalize_target_db, self.clip_ceiling)),
            Box::new(RemoveDcOffset),
        ];

        match profile {
            PreprocessingProfile::Minimal => {
                stages.push(Box::new(self.trim(self.trim_top_db)));
                return stages;
            }
            PreprocessingProfile::Standard => {
                stages.push(self.band_stage(language, sample_rate));
                stages.push(Box::new(self.spectral(self.standard_reduction)));
                stages.push(Box::new(self.trim(self.trim_top_db)));
            }
            PreprocessingProfile::Aggressive => {
                stages.push(self.band_stage(language, sample_rate));
                stages.push(Box::new(self.spectral(self.aggressive_reduction)));
                stages.push(Box::new(AdaptiveWienerFilter::new(
                    self.wiener_noise_variance,
                    self.wiener_quiet_percentile,
                )));
                stages.push(Box::new(self.trim(self.aggressive_trim_top_db)));
            }
        }

        stages.push(Box::new(PreEmphasis::new(self.pre_emphasis)));
        stages.push(Box::new(PeakNormalize::new(self.final_peak)));
        stages
    }
}

/// Before/after metrics and the improvement verdict.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityComparison {
    pub before: QualityMetrics,
    pub after: QualityMetrics,
    pub improved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum PreprocessStatus {
    Processed,
    /// Original bytes were returned untouched.
    Skipped { reason: String },
}

/// Result of one pipeline run: the bytes to hand downstream plus metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreprocessOutcome {
    #[serde(skip)]
    pub audio: Vec<u8>,
    pub status: PreprocessStatus,
    pub profile: PreprocessingProfile,
    pub sample_rate: u32,
    pub input_samples: usize,
    pub output_samples: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityComparison>,
}

impl PreprocessOutcome {
    fn skipped(raw: &[u8], profile: PreprocessingProfile, sample_rate: u32, reason: String) -> Self {
        log::error!("Audio preprocessing failed: {}, returning original audio", reason);
        Self {
            audio: raw.to_vec(),
            status: PreprocessStatus::Skipped { reason },
            profile,
            sample_rate,
            input_samples: 0,
            output_samples: 0,
            quality: None,
        }
    }

    pub fn is_processed(&self) -> bool {
        self.status == PreprocessStatus::Processed
    }
}

#[derive(Debug, Clone)]
pub struct Preprocessor {
    options: PipelineOptions,
    target_sample_rate: u32,
    assess_quality: bool,
}

impl Preprocessor {
    pub fn new(options: PipelineOptions, target_sample_rate: u32) -> Self {
        Self {
            options,
            target_sample_rate,
            assess_quality: false,
        }
    }

    pub fn with_quality_assessment(mut self, enabled: bool) -> Self {
        self.assess_quality = enabled;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    /// Run the profile's stage list over decoded samples. Each stage is
    /// fail-soft, so this never errors.
    pub fn process_samples(
        &self,
        samples: Vec<f32>,
        sample_rate: u32,
        profile: PreprocessingProfile,
        language: Option<&str>,
    ) -> Vec<f32> {
        let stages = self.options.stages(profile, language, sample_rate);
        apply_stages(&stages, samples, sample_rate)
    }

    /// Decode, condition and re-encode `raw`. Returns the original bytes on
    /// any failure.
    pub fn run(&self, raw: &[u8], language: Option<&str>, profile: PreprocessingProfile) -> Vec<u8> {
        self.run_detailed(raw, language, profile).audio
    }

    pub fn run_detailed(
        &self,
        raw: &[u8],
        language: Option<&str>,
        profile: PreprocessingProfile,
    ) -> PreprocessOutcome {
        let stages = self.options.stages(profile, language, self.target_sample_rate);
        self.run_stages(raw, profile, &stages)
    }

    /// Decode, run `stages` with panics caught, encode. `profile` is only
    /// recorded in the outcome.
    pub(crate) fn run_stages(
        &self,
        raw: &[u8],
        profile: PreprocessingProfile,
        stages: &[Box<dyn Conditioner>],
    ) -> PreprocessOutcome {
        let sample_rate = self.target_sample_rate;

        let decoded = match codec::decode(raw, sample_rate) {
            Ok(decoded) => decoded,
            Err(e) => return PreprocessOutcome::skipped(raw, profile, sample_rate, e.to_string()),
        };
        let input_samples = decoded.samples.len();

        log::debug!(
            "Preprocessing {} samples ({} Hz source, {} ch) with {} profile",
            input_samples,
            decoded.source_sample_rate,
            decoded.source_channels,
            profile
        );

        let assessor = self.assess_quality.then(QualityAssessor::default);
        let before = assessor
            .as_ref()
            .map(|a| a.assess(&decoded.samples, sample_rate));

        let processed = match panic::catch_unwind(AssertUnwindSafe(|| {
            apply_stages(stages, decoded.samples, sample_rate)
        })) {
            Ok(processed) => processed,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                return PreprocessOutcome::skipped(
                    raw,
                    profile,
                    sample_rate,
                    format!("conditioning panicked: {}", message),
                );
            }
        };

        let audio = match codec::encode(&processed, sample_rate) {
            Ok(audio) => audio,
            Err(e) => return PreprocessOutcome::skipped(raw, profile, sample_rate, e.to_string()),
        };

        let quality = assessor.zip(before).map(|(assessor, before)| {
            let after = assessor.assess(&processed, sample_rate);
            let improved = QualityAssessor::is_improvement(&before, &after);
            if !improved {
                log::info!("Preprocessing did not improve measured quality");
            }
            QualityComparison {
                before,
                after,
                improved,
            }
        });

        PreprocessOutcome {
            audio,
            status: PreprocessStatus::Processed,
            profile,
            sample_rate,
            input_samples,
            output_samples: processed.len(),
            quality,
        }
    }
}

fn apply_stages(stages: &[Box<dyn Conditioner>], samples: Vec<f32>, sample_rate: u32) -> Vec<f32> {
    stages.iter().fold(samples, |samples, stage| {
        let before = samples.len();
        let out = stage.condition(samples, sample_rate);
        log::debug!("{}: {} -> {} samples", stage.name(), before, out.len());
        out
    })
}

/// One-shot entry point with default options. `profile_name` falls back to
/// standard when unrecognized.
pub fn preprocess_audio(
    raw: &[u8],
    target_sample_rate: u32,
    language_hint: Option<&str>,
    profile_name: &str,
) -> Vec<u8> {
    Preprocessor::new(PipelineOptions::default(), target_sample_rate).run(
        raw,
        language_hint,
        PreprocessingProfile::from_name(profile_name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_util::{linear_to_db, mean, rms};
    use crate::error::ConditionError;

    const SR: u32 = 16000;

    fn sine_440(offset: f32) -> Vec<f32> {
        (0..SR as usize)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / SR as f32).sin() + offset)
            .collect()
    }

    fn wav(samples: &[f32]) -> Vec<u8> {
        codec::encode(samples, SR).unwrap()
    }

    fn decode(bytes: &[u8]) -> Vec<f32> {
        codec::decode(bytes, SR).unwrap().samples
    }

    fn stage_names(profile: PreprocessingProfile, language: Option<&str>) -> Vec<&'static str> {
        PipelineOptions::default()
            .stages(profile, language, SR)
            .iter()
            .map(|s| s.name())
            .collect()
    }

    #[test]
    fn test_profile_from_name() {
        assert_eq!(PreprocessingProfile::from_name("minimal"), PreprocessingProfile::Minimal);
        assert_eq!(PreprocessingProfile::from_name("Aggressive"), PreprocessingProfile::Aggressive);
        assert_eq!(PreprocessingProfile::from_name("bogus"), PreprocessingProfile::Standard);
        assert_eq!(PreprocessingProfile::from_name(""), PreprocessingProfile::Standard);
        for profile in PreprocessingProfile::ALL {
            assert_eq!(PreprocessingProfile::from_name(profile.as_str()), profile);
        }
    }

    #[test]
    fn test_stage_order_per_profile() {
        assert_eq!(
            stage_names(PreprocessingProfile::Minimal, Some("en")),
            vec!["normalize", "remove_dc_offset", "trim_silence"]
        );
        assert_eq!(
            stage_names(PreprocessingProfile::Standard, None),
            vec![
                "normalize",
                "remove_dc_offset",
                "bandpass",
                "spectral_noise_suppress",
                "trim_silence",
                "pre_emphasis",
                "peak_normalize"
            ]
        );
        assert_eq!(
            stage_names(PreprocessingProfile::Aggressive, Some("hi")),
            vec![
                "normalize",
                "remove_dc_offset",
                "language_bandpass",
                "spectral_noise_suppress",
                "adaptive_wiener",
                "trim_silence",
                "pre_emphasis",
                "peak_normalize"
            ]
        );
        // Blank hint is no hint
        assert_eq!(stage_names(PreprocessingProfile::Standard, Some(" "))[2], "bandpass");
    }

    #[test]
    fn test_minimal_sine_lands_on_target_rms() {
        let input = sine_440(0.0);
        let output = decode(&preprocess_audio(&wav(&input), SR, None, "minimal"));
        assert!(!output.is_empty());
        assert!(output.len() <= input.len());
        let level = linear_to_db(rms(&output));
        assert!((-21.0..=-19.0).contains(&level), "rms {} dB", level);
    }

    #[test]
    fn test_standard_removes_dc_bias() {
        let output = decode(&preprocess_audio(&wav(&sine_440(0.1)), SR, None, "standard"));
        assert!(!output.is_empty());
        assert!(mean(&output).abs() < 0.01, "mean {}", mean(&output));
    }

    #[test]
    fn test_bogus_profile_matches_standard() {
        let raw = wav(&sine_440(0.05));
        assert_eq!(
            preprocess_audio(&raw, SR, Some("en"), "bogus"),
            preprocess_audio(&raw, SR, Some("en"), "standard")
        );
    }

    #[test]
    fn test_undecodable_input_is_returned_verbatim() {
        let raw = b"RIFF-but-not-really-a-wave-file".to_vec();
        assert_eq!(preprocess_audio(&raw, SR, None, "aggressive"), raw);

        let outcome = Preprocessor::new(PipelineOptions::default(), SR).run_detailed(
            &raw,
            None,
            PreprocessingProfile::Standard,
        );
        assert_eq!(outcome.audio, raw);
        assert!(matches!(outcome.status, PreprocessStatus::Skipped { .. }));
        assert!(!outcome.is_processed());
    }

    struct Exploding;

    impl Conditioner for Exploding {
        fn name(&self) -> &'static str {
            "exploding"
        }

        fn apply(&self, _samples: &[f32], _sample_rate: u32) -> Result<Vec<f32>, ConditionError> {
            panic!("stage blew up");
        }
    }

    #[test]
    fn test_panicking_stage_returns_original_bytes() {
        let raw = wav(&sine_440(0.0));
        let stages: Vec<Box<dyn Conditioner>> =
            vec![Box::new(Normalize::default()), Box::new(Exploding)];

        let outcome = Preprocessor::new(PipelineOptions::default(), SR)
            .with_quality_assessment(true)
            .run_stages(&raw, PreprocessingProfile::Standard, &stages);

        assert_eq!(outcome.audio, raw);
        assert!(outcome.quality.is_none());
        match outcome.status {
            PreprocessStatus::Skipped { reason } => assert!(reason.contains("stage blew up")),
            PreprocessStatus::Processed => panic!("panic was not caught"),
        }
    }

    #[test]
    fn test_run_stages_with_profile_list_matches_run() {
        let raw = wav(&sine_440(0.0));
        let preprocessor = Preprocessor::new(PipelineOptions::default(), SR);
        let stages = preprocessor
            .options()
            .stages(PreprocessingProfile::Minimal, None, SR);
        assert_eq!(
            preprocessor
                .run_stages(&raw, PreprocessingProfile::Minimal, &stages)
                .audio,
            preprocessor.run(&raw, None, PreprocessingProfile::Minimal)
        );
    }

    #[test]
    fn test_empty_wav_is_returned_verbatim() {
        let raw = wav(&[]);
        assert_eq!(preprocess_audio(&raw, SR, None, "standard"), raw);
    }

    #[test]
    fn test_silence_survives_every_profile() {
        let raw = wav(&[0.0; 1000]);
        for profile in PreprocessingProfile::ALL {
            let outcome = Preprocessor::new(PipelineOptions::default(), SR).run_detailed(
                &raw,
                None,
                profile,
            );
            assert!(outcome.is_processed(), "{}", profile);
            assert!(outcome.output_samples <= 1000);
            assert!(decode(&outcome.audio).iter().all(|&s| s == 0.0));
        }
    }

    #[test]
    fn test_aggressive_with_language_and_quality() {
        let mut input = sine_440(0.0);
        for (i, s) in input.iter_mut().enumerate() {
            *s += if i % 3 == 0 { 0.02 } else { -0.01 };
        }
        let outcome = Preprocessor::new(PipelineOptions::default(), SR)
            .with_quality_assessment(true)
            .run_detailed(&wav(&input), Some("ta"), PreprocessingProfile::Aggressive);

        assert!(outcome.is_processed());
        assert_eq!(outcome.profile, PreprocessingProfile::Aggressive);
        assert_eq!(outcome.input_samples, input.len());
        assert!(outcome.output_samples <= input.len());

        let quality = outcome.quality.expect("quality requested");
        assert!(!quality.before.is_empty());
        assert!(!quality.after.is_empty());
    }

    #[test]
    fn test_outcome_serializes_without_audio() {
        let outcome = Preprocessor::new(PipelineOptions::default(), SR).run_detailed(
            b"nope",
            None,
            PreprocessingProfile::Minimal,
        );
        let json = serde_json::to_value(&outcome).unwrap();
        assert!(json.get("audio").is_none());
        assert_eq!(json["profile"], "minimal");
        assert_eq!(json["status"]["state"], "skipped");
        assert_eq!(json["sampleRate"], 16000);
    }

    #[test]
    fn test_partial_options_from_toml() {
        let options: PipelineOptions = toml::from_str("standard_reduction = 0.5").unwrap();
        assert_eq!(options.standard_reduction, 0.5);
        assert_eq!(options.fft_size, 2048);
        assert_eq!(options.default_band(), FrequencyBand::DEFAULT);
    }
}
