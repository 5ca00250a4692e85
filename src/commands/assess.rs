//! Quality metrics for a single file

use std::fs;
use std::path::PathBuf;

use serde::Serialize;

use crate::codec;
use crate::quality::{QualityAssessor, QualityMetrics};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessReport {
    pub path: String,
    pub duration: f64,
    pub sample_rate: u32,
    pub source_sample_rate: u32,
    pub source_channels: u16,
    pub metrics: QualityMetrics,
}

/// Decode `path` at `sample_rate` and compute its quality metrics.
pub async fn assess_file(path: PathBuf, sample_rate: u32) -> Result<AssessReport, String> {
    tokio::task::spawn_blocking(move || {
        let raw = fs::read(&path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        let decoded = codec::decode(&raw, sample_rate).map_err(|e| e.to_string())?;
        let metrics = QualityAssessor::default().assess(&decoded.samples, decoded.sample_rate);

        Ok(AssessReport {
            path: path.to_string_lossy().to_string(),
            duration: decoded.duration_secs(),
            sample_rate: decoded.sample_rate,
            source_sample_rate: decoded.source_sample_rate,
            source_channels: decoded.source_channels,
            metrics,
        })
    })
    .await
    .map_err(|e| format!("Assess task failed: {}", e))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_assess_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let samples: Vec<f32> = (0..8000)
            .map(|i| 0.4 * (2.0 * std::f32::consts::PI * 500.0 * i as f32 / 16000.0).sin())
            .collect();
        fs::write(&path, codec::encode(&samples, 16000).unwrap()).unwrap();

        let report = assess_file(path, 16000).await.unwrap();
        assert_eq!(report.sample_rate, 16000);
        assert!((report.duration - 0.5).abs() < 1e-9);
        assert!(report.metrics.zero_crossing_rate.is_some());
        assert!(report.metrics.spectral_centroid_hz.is_some());
    }

    #[tokio::test]
    async fn test_assess_silent_file_has_empty_metrics() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("silence.wav");
        fs::write(&path, codec::encode(&[0.0; 500], 16000).unwrap()).unwrap();

        let report = assess_file(path, 16000).await.unwrap();
        assert!(report.metrics.is_empty());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["metrics"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_assess_rejects_non_audio() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.wav");
        fs::write(&path, b"garbage").unwrap();
        assert!(assess_file(path, 16000).await.is_err());
    }
}
