use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use speechprep::commands::{self, CleanJob};
use speechprep::{AppConfig, PreprocessingProfile};

#[derive(Parser)]
#[command(name = "speechprep", version, about = "Condition speech recordings for transcription")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Preprocess audio files into `<stem>.clean.wav`. Files that cannot be
    /// processed are copied as `<stem>.clean.<ext>`
    Clean {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output directory (default: next to each input)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// minimal, standard or aggressive
        #[arg(short, long)]
        profile: Option<String>,
        /// Language hint, e.g. "en" or "hi"
        #[arg(short, long)]
        language: Option<String>,
        #[arg(long)]
        sample_rate: Option<u32>,
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Print a JSON report line per file
        #[arg(long)]
        report: bool,
    },
    /// Print quality metrics for one file as JSON
    Assess {
        input: PathBuf,
        #[arg(long, default_value_t = speechprep::DEFAULT_SAMPLE_RATE)]
        sample_rate: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Clean {
            inputs,
            output_dir,
            profile,
            language,
            sample_rate,
            config,
            report,
        } => {
            let mut app_config = match config {
                Some(path) => AppConfig::load_from_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => AppConfig::default(),
            };
            if let Some(rate) = sample_rate {
                app_config.target_sample_rate = rate;
            }
            if report {
                app_config.assess_quality = true;
            }
            app_config.validate()?;

            let profile = profile
                .as_deref()
                .map(PreprocessingProfile::from_name)
                .unwrap_or_else(|| app_config.profile());
            let language = language.or_else(|| app_config.language.clone());
            let workers = app_config.worker_count();

            let jobs: Vec<CleanJob> = inputs
                .into_iter()
                .map(|input| CleanJob::new(input, output_dir.as_deref()))
                .collect();
            log::info!(
                "Cleaning {} file(s) with {} profile on {} worker(s)",
                jobs.len(),
                profile,
                workers
            );

            let preprocessor = Arc::new(app_config.preprocessor());
            let results = commands::clean_files(preprocessor, jobs, profile, language, workers).await;

            let mut failures = 0;
            for result in results {
                match result {
                    Ok(result) => {
                        if report {
                            println!("{}", serde_json::to_string(&result)?);
                        }
                    }
                    Err(e) => {
                        log::error!("{}", e);
                        failures += 1;
                    }
                }
            }
            if failures > 0 {
                anyhow::bail!("{} file(s) could not be cleaned", failures);
            }
        }
        Command::Assess { input, sample_rate } => {
            let report = commands::assess_file(input, sample_rate)
                .await
                .map_err(anyhow::Error::msg)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
