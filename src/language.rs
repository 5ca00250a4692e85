//! Language-specific passbands for speech band-limiting.
//!
//! Tonal/Indian languages keep more low-end energy, European languages are
//! cut higher, East Asian languages sit in between. The high edge is the same
//! everywhere.

use serde::{Deserialize, Serialize};

/// Fraction of Nyquist the upper band edge is clamped to before filter design.
const NYQUIST_MARGIN: f32 = 0.95;

/// Lowest usable low edge after clamping.
const MIN_LOW_HZ: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrequencyBand {
    pub low_hz: f32,
    pub high_hz: f32,
}

impl FrequencyBand {
    /// Band used when no language is given or the language is unknown.
    pub const DEFAULT: FrequencyBand = FrequencyBand {
        low_hz: 80.0,
        high_hz: 8000.0,
    };

    pub const fn new(low_hz: f32, high_hz: f32) -> Self {
        Self { low_hz, high_hz }
    }

    /// Pull the band inside `(0, nyquist)` for the given sample rate.
    ///
    /// At 16 kHz the nominal 8000 Hz edge sits exactly on Nyquist, which no
    /// digital Butterworth design accepts, so the upper edge is pulled below
    /// it. The result may still be empty (`low >= high`) for very low rates;
    /// the filter rejects that and the stage is skipped.
    pub fn clamped_to(self, sample_rate: u32) -> Self {
        let nyquist = sample_rate as f32 / 2.0;
        Self {
            low_hz: self.low_hz.max(MIN_LOW_HZ),
            high_hz: self.high_hz.min(nyquist * NYQUIST_MARGIN),
        }
    }

    pub fn is_valid_for(&self, sample_rate: u32) -> bool {
        let nyquist = sample_rate as f32 / 2.0;
        self.low_hz > 0.0 && self.low_hz < self.high_hz && self.high_hz < nyquist
    }
}

impl Default for FrequencyBand {
    fn default() -> Self {
        Self::DEFAULT
    }
}

const LANGUAGE_BANDS: &[(&str, FrequencyBand)] = &[
    ("en", FrequencyBand::new(200.0, 8000.0)),
    ("es", FrequencyBand::new(200.0, 8000.0)),
    ("fr", FrequencyBand::new(200.0, 8000.0)),
    ("de", FrequencyBand::new(200.0, 8000.0)),
    ("hi", FrequencyBand::new(100.0, 8000.0)),
    ("ta", FrequencyBand::new(100.0, 8000.0)),
    ("te", FrequencyBand::new(100.0, 8000.0)),
    ("bn", FrequencyBand::new(100.0, 8000.0)),
    ("zh", FrequencyBand::new(150.0, 8000.0)),
    ("ja", FrequencyBand::new(150.0, 8000.0)),
    ("ko", FrequencyBand::new(150.0, 8000.0)),
];

/// Primary subtag, lowercased: `"en-US"` and `"EN_us"` both become `"en"`.
fn primary_subtag(code: &str) -> String {
    code.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

fn lookup(code: &str) -> Option<FrequencyBand> {
    let key = primary_subtag(code);
    LANGUAGE_BANDS
        .iter()
        .find(|(lang, _)| *lang == key)
        .map(|(_, band)| *band)
}

/// Passband for a language code. Unknown, empty or missing codes get
/// [`FrequencyBand::DEFAULT`].
pub fn band_for(language: Option<&str>) -> FrequencyBand {
    language.and_then(lookup).unwrap_or_default()
}

pub fn supported_languages() -> Vec<&'static str> {
    LANGUAGE_BANDS.iter().map(|(lang, _)| *lang).collect()
}

pub fn is_supported(language: &str) -> bool {
    lookup(language).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_language_gets_default_band() {
        assert_eq!(band_for(Some("xyz")), FrequencyBand::new(80.0, 8000.0));
        assert_eq!(band_for(Some("")), FrequencyBand::DEFAULT);
        assert_eq!(band_for(None), FrequencyBand::DEFAULT);
    }

    #[test]
    fn test_language_families() {
        assert_eq!(band_for(Some("en")).low_hz, 200.0);
        assert_eq!(band_for(Some("hi")).low_hz, 100.0);
        assert_eq!(band_for(Some("ja")).low_hz, 150.0);
        for lang in supported_languages() {
            assert_eq!(band_for(Some(lang)).high_hz, 8000.0);
        }
    }

    #[test]
    fn test_region_subtags_and_case() {
        assert_eq!(band_for(Some("en-US")), band_for(Some("en")));
        assert_eq!(band_for(Some(" ZH_cn ")), band_for(Some("zh")));
        assert!(is_supported("Ta"));
        assert!(!is_supported("xyz"));
    }

    #[test]
    fn test_clamp_pulls_high_edge_below_nyquist() {
        let band = FrequencyBand::DEFAULT;
        assert!(!band.is_valid_for(16000));

        let clamped = band.clamped_to(16000);
        assert_eq!(clamped.low_hz, 80.0);
        assert!(clamped.high_hz < 8000.0);
        assert!(clamped.is_valid_for(16000));

        // Wide enough rate leaves the band untouched
        assert_eq!(band.clamped_to(48000), band);
    }
}
