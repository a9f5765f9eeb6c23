//! kprop CLI
//!
//! Commands:
//! - `kprop predict` - Score one subject with one model
//! - `kprop ensemble` - Score one subject with the configured ensemble
//! - `kprop batch` - Score a slate from a request file or a feature export directory
//! - `kprop schema` - Show the feature schema a model expects

pub mod output;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::AppConfig;
use crate::domain::{EnsembleResult, FeatureSet, PredictionRequest, PredictionResult};
use crate::features::JsonDirFeatureProvider;
use crate::service::{PredictionService, SlateEntry};
use output::{print_items, print_results, schema_rows, EnsembleRow, OutputMode, PredictionRow};

/// Strikeout prop prediction CLI
#[derive(Parser, Debug)]
#[command(name = "kprop")]
#[command(author, version, about = "Pitcher strikeout prop predictions with red-flag overrides")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path (defaults to config/default.toml + KPROP_* env)
    #[arg(short, long, global = true, env = "KPROP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "table")]
    pub output: OutputMode,

    /// Directory for daily rolling log files
    #[arg(long, global = true, env = "KPROP_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Score one subject with one model
    Predict {
        /// Model id (defaults to `default_model`)
        #[arg(short, long)]
        model: Option<String>,
        #[command(flatten)]
        subject: SubjectArgs,
    },

    /// Score one subject with the configured ensemble
    Ensemble {
        #[command(flatten)]
        subject: SubjectArgs,
    },

    /// Score many subjects
    Batch {
        /// JSON array of prediction requests
        #[arg(long, conflicts_with_all = ["slate", "features_dir"])]
        requests: Option<PathBuf>,
        /// JSON array of slate entries (subject_id, subject_name, line)
        #[arg(long, requires = "features_dir")]
        slate: Option<PathBuf>,
        /// Feature export root laid out as <dir>/<YYYY-MM-DD>/<subject_id>.json
        #[arg(long)]
        features_dir: Option<PathBuf>,
        /// Slate date (defaults to today, UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Model id (defaults to `default_model`)
        #[arg(short, long, conflicts_with = "ensemble")]
        model: Option<String>,
        /// Use the configured ensemble instead of a single model
        #[arg(long)]
        ensemble: bool,
    },

    /// Show the feature schema a model expects
    Schema {
        /// Model id (defaults to `default_model`)
        #[arg(short, long)]
        model: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct SubjectArgs {
    /// Subject (pitcher) id
    #[arg(short, long)]
    pub subject: String,
    /// Display name used for roster checks
    #[arg(short, long)]
    pub name: Option<String>,
    /// Over/under line
    #[arg(short, long)]
    pub line: Option<f64>,
    /// JSON object of features for this subject
    #[arg(short, long)]
    pub features: PathBuf,
}

impl SubjectArgs {
    fn into_request(self) -> Result<PredictionRequest> {
        let features: FeatureSet = read_json(&self.features)?;
        let mut request = PredictionRequest::new(&self.subject, features, self.line);
        if let Some(name) = self.name.as_deref() {
            request = request.with_name(name);
        }
        Ok(request)
    }
}

pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => AppConfig::load_file(p)
            .with_context(|| format!("failed to load config from {}", p.display()))?,
        None => AppConfig::load().context("failed to load config")?,
    };
    Ok(config)
}

/// Execute a parsed command against a ready service
pub async fn run(command: Commands, service: &PredictionService, mode: OutputMode) -> Result<()> {
    match command {
        Commands::Predict { model, subject } => {
            let request = subject.into_request()?;
            let result = service.predict(model.as_deref(), &request).await;
            print_results::<PredictionResult, PredictionRow>(&[result], mode)?;
        }
        Commands::Ensemble { subject } => {
            let request = subject.into_request()?;
            let result = service.predict_ensemble(&request).await;
            print_results::<EnsembleResult, EnsembleRow>(&[result], mode)?;
        }
        Commands::Batch {
            requests,
            slate,
            features_dir,
            date,
            model,
            ensemble,
        } => {
            let requests = match (requests, slate, features_dir) {
                (Some(path), _, _) => read_json::<Vec<PredictionRequest>>(&path)?,
                (None, Some(slate), Some(dir)) => {
                    let as_of = date.unwrap_or_else(|| Utc::now().date_naive());
                    let entries: Vec<SlateEntry> = read_json(&slate)?;
                    let provider = JsonDirFeatureProvider::new(dir);
                    if ensemble {
                        let results = service
                            .predict_ensemble_from_provider(&provider, &entries, as_of)
                            .await;
                        return print_results::<EnsembleResult, EnsembleRow>(&results, mode);
                    }
                    let results = service
                        .predict_from_provider(&provider, model.as_deref(), &entries, as_of)
                        .await;
                    summarize(&results);
                    return print_results::<PredictionResult, PredictionRow>(&results, mode);
                }
                _ => bail!("batch needs --requests, or --slate with --features-dir"),
            };

            if ensemble {
                let results = service.predict_ensemble_batch(requests).await;
                print_results::<EnsembleResult, EnsembleRow>(&results, mode)?;
            } else {
                let results = service.predict_batch(model.as_deref(), requests).await;
                summarize(&results);
                print_results::<PredictionResult, PredictionRow>(&results, mode)?;
            }
        }
        Commands::Schema { model } => {
            let model_id = model.unwrap_or_else(|| service.config().default_model.clone());
            let schema = service.schema(&model_id).await?;
            print_items(&schema_rows(&schema), mode)?;
        }
    }
    Ok(())
}

fn summarize(results: &[PredictionResult]) {
    let actionable = results.iter().filter(|r| r.recommendation.is_actionable()).count();
    let skipped = results.iter().filter(|r| r.is_skip()).count();
    let errored = results.iter().filter(|r| r.is_error()).count();
    info!(
        total = results.len(),
        actionable, skipped, errored, "batch finished"
    );
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_predict_with_global_flags() {
        let cli = Cli::try_parse_from([
            "kprop", "predict", "-s", "592450", "-l", "6.5", "-f", "f.json", "--output", "json",
        ])
        .unwrap();
        assert_eq!(cli.output, OutputMode::Json);
        match cli.command {
            Commands::Predict { model, subject } => {
                assert_eq!(model, None);
                assert_eq!(subject.subject, "592450");
                assert_eq!(subject.line, Some(6.5));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn batch_model_conflicts_with_ensemble() {
        let parsed = Cli::try_parse_from([
            "kprop", "batch", "--requests", "r.json", "--model", "m", "--ensemble",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn batch_slate_requires_feature_dir() {
        let parsed = Cli::try_parse_from(["kprop", "batch", "--slate", "s.json"]);
        assert!(parsed.is_err());
    }
}
