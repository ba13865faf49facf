use crate::config::load_config;
use crate::errors::{RiskError, RiskResult};
use crate::feature_encoder::{encode, FEATURE_NAMES};
use crate::guidance;
use crate::input_record::{InputRecord, RawAnswers};
use crate::risk_engine::RiskEngine;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::fs;

/// Top-level CLI interface
#[derive(Parser)]
#[command(
    name = "stroke_risk",
    version,
    about = "Stroke risk scoring and attribution"
)]
pub struct Cli {
    /// Configuration file (defaults to stroke_risk.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Score a questionnaire and print the result record as JSON
    Score {
        /// JSON file with the eight answers
        #[arg(short, long)]
        input: String,
        /// Include band guidance in the output
        #[arg(long)]
        guidance: bool,
    },

    /// Validate a questionnaire and print its encoded feature vector
    Validate {
        #[arg(short, long)]
        input: String,
    },

    /// Load the configured model and print its metadata
    Inspect,
}

fn read_answers(path: &str) -> RiskResult<RawAnswers> {
    let content =
        fs::read_to_string(path).map_err(|e| RiskError::io(format!("reading {path}"), e))?;
    serde_json::from_str(&content)
        .map_err(|e| RiskError::serialization(format!("parsing {path}"), e))
}

/// Execute a parsed command and return what should be printed.
pub fn run(cli: Cli) -> RiskResult<serde_json::Value> {
    match cli.command {
        Commands::Score { input, guidance } => {
            let config = load_config(cli.config.as_deref())?;
            let engine = RiskEngine::from_config(&config)?;
            let record = engine.compute_risk_from_answers(read_answers(&input)?)?;

            let mut output = serde_json::to_value(&record)?;
            if guidance {
                output["guidance"] = json!({
                    "summary": guidance::summary_for(record.band),
                    "tips": guidance::tips_for(record.band),
                    "general": guidance::GENERAL_TIPS,
                });
            }
            Ok(output)
        }
        Commands::Validate { input } => {
            let record = InputRecord::try_from(read_answers(&input)?)?;
            let features = encode(&record)?;
            let named: serde_json::Map<String, serde_json::Value> = features
                .named()
                .into_iter()
                .map(|(name, value)| (name.to_string(), json!(value)))
                .collect();
            Ok(json!({ "input": record, "features": named }))
        }
        Commands::Inspect => {
            let config = load_config(cli.config.as_deref())?;
            let engine = RiskEngine::from_config(&config)?;
            let model = engine.warm_up()?;
            let importances: serde_json::Map<String, serde_json::Value> = FEATURE_NAMES
                .iter()
                .zip(model.feature_importances())
                .map(|(name, weight)| (name.to_string(), json!(weight)))
                .collect();
            Ok(json!({
                "metadata": model.metadata(),
                "explainer": config.explainer.strategy,
                "threshold": engine.threshold(),
                "feature_importances": importances,
            }))
        }
    }
}
