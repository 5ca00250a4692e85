//! Batch preprocessing of audio files

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;

use crate::audio_clean::{PreprocessOutcome, PreprocessingProfile, Preprocessor};

/// One input file and where its cleaned copy goes.
#[derive(Debug, Clone)]
pub struct CleanJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl CleanJob {
    pub fn new(input: impl Into<PathBuf>, output_dir: Option<&Path>) -> Self {
        let input = input.into();
        let output = output_path_for(&input, output_dir);
        Self { input, output }
    }
}

/// Result of cleaning one file
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanResult {
    pub input_path: String,
    pub output_path: String,
    pub duration: f64,
    #[serde(flatten)]
    pub outcome: PreprocessOutcome,
}

/// `<dir>/<stem>.clean.wav`, `dir` defaulting to the input's own directory.
pub fn output_path_for(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "audio".to_string());
    let dir = output_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(format!("{}.clean.wav", stem))
}

/// Preprocess one file. The output file always receives playable bytes: the
/// cleaned WAV, or the untouched input when preprocessing was skipped. A
/// skipped file is written as `<stem>.clean.<input extension>`.
pub fn clean_file(
    preprocessor: &Preprocessor,
    job: &CleanJob,
    profile: PreprocessingProfile,
    language: Option<&str>,
) -> Result<CleanResult, String> {
    let raw = fs::read(&job.input)
        .map_err(|e| format!("Failed to read {}: {}", job.input.display(), e))?;

    let outcome = preprocessor.run_detailed(&raw, language, profile);

    // Untouched input keeps its own container extension
    let output = if outcome.is_processed() {
        job.output.clone()
    } else {
        job.output
            .with_extension(job.input.extension().unwrap_or_default())
    };

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
    }
    fs::write(&output, &outcome.audio)
        .map_err(|e| format!("Failed to write {}: {}", output.display(), e))?;

    let duration = if outcome.is_processed() && outcome.sample_rate > 0 {
        outcome.output_samples as f64 / outcome.sample_rate as f64
    } else {
        0.0
    };

    log::info!(
        "{} -> {} ({}, {:.2}s)",
        job.input.display(),
        output.display(),
        outcome.profile,
        duration
    );

    Ok(CleanResult {
        input_path: job.input.to_string_lossy().to_string(),
        output_path: output.to_string_lossy().to_string(),
        duration,
        outcome,
    })
}

/// Clean every job on the blocking pool, at most `workers` at a time.
/// Results come back in job order.
pub async fn clean_files(
    preprocessor: Arc<Preprocessor>,
    jobs: Vec<CleanJob>,
    profile: PreprocessingProfile,
    language: Option<String>,
    workers: usize,
) -> Vec<Result<CleanResult, String>> {
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut handles = Vec::with_capacity(jobs.len());

    for job in jobs {
        let semaphore = semaphore.clone();
        let preprocessor = preprocessor.clone();
        let language = language.clone();

        handles.push(tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| format!("Worker pool closed: {}", e))?;
            tokio::task::spawn_blocking(move || {
                clean_file(&preprocessor, &job, profile, language.as_deref())
            })
            .await
            .map_err(|e| format!("Clean task failed: {}", e))?
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(match handle.await {
            Ok(result) => result,
            Err(e) => Err(format!("Clean task failed: {}", e)),
        });
    }
    results
}
