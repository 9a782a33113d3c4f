//! trainbench command line interface
//!
//! Drives a remote model training service headlessly: upload a dataset,
//! train a model against its session, request predictions.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use trainbench_client::{
    ModelType, PredictRequest, SessionId, TrainRequest, TrainerClient, DEFAULT_SERVER_URL,
};

#[derive(Parser)]
#[command(name = "trainbench")]
#[command(about = "Command line front-end for a trainbench model service", long_about = None)]
#[command(version)]
struct Cli {
    /// Model service base URL
    #[arg(long, alias = "server", default_value = DEFAULT_SERVER_URL)]
    server_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe the service root and print its reply
    Ping,
    /// Upload a dataset and print its columns and session id
    Upload {
        /// Path to the dataset file (CSV or XLSX)
        file: PathBuf,
    },
    /// Train a model on an uploaded dataset
    Train(TrainCommand),
    /// Request a prediction from a trained session
    Predict(PredictCommand),
}

#[derive(Args)]
struct TrainCommand {
    /// Session id returned by `upload`
    #[arg(long)]
    session: String,
    /// Feature columns, comma separated; importances are reported in this order
    #[arg(long, required = true, value_delimiter = ',')]
    features: Vec<String>,
    /// Target column
    #[arg(long)]
    target: String,
    /// Model family to fit
    #[arg(long, value_enum, default_value_t = ModelKind::Regression)]
    model_type: ModelKind,
}

#[derive(Args)]
struct PredictCommand {
    /// Session id returned by `upload`
    #[arg(long)]
    session: String,
    /// Feature columns the model was trained with, comma separated
    #[arg(long, required = true, value_delimiter = ',')]
    features: Vec<String>,
    /// Per-feature input value as name=value (repeatable)
    #[arg(long = "set", value_name = "NAME=VALUE", required = true)]
    values: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModelKind {
    Regression,
    Classification,
}

impl From<ModelKind> for ModelType {
    fn from(kind: ModelKind) -> Self {
        match kind {
            ModelKind::Regression => ModelType::Regression,
            ModelKind::Classification => ModelType::Classification,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let client = TrainerClient::new(&cli.server_url)
        .with_context(|| format!("invalid server URL {}", cli.server_url))?;

    match cli.command {
        Commands::Ping => handle_ping(&client).await,
        Commands::Upload { file } => handle_upload(&client, file).await,
        Commands::Train(cmd) => handle_train(&client, cmd).await,
        Commands::Predict(cmd) => handle_predict(&client, cmd).await,
    }
}

async fn handle_ping(client: &TrainerClient) -> Result<()> {
    let reply = client.ping().await?;
    println!("{}", reply.trim_end());
    Ok(())
}

async fn handle_upload(client: &TrainerClient, file: PathBuf) -> Result<()> {
    let bytes =
        fs::read(&file).with_context(|| format!("failed to read {}", file.display()))?;
    let name = file
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset")
        .to_string();

    let receipt = client.upload(&name, bytes).await?;
    println!("Session: {}", receipt.session_id);
    println!("Columns: {}", receipt.columns.join(", "));
    Ok(())
}

async fn handle_train(client: &TrainerClient, cmd: TrainCommand) -> Result<()> {
    let request = TrainRequest {
        session_id: SessionId(cmd.session),
        features: cmd.features,
        target: cmd.target,
        model_type: cmd.model_type.into(),
    };

    let report = client.train(&request).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    let pairs = report.importance_pairs(&request.features);
    if !pairs.is_empty() {
        println!("Feature importances:");
        for (name, score) in pairs {
            println!("  {name}: {score:.4}");
        }
    }
    Ok(())
}

async fn handle_predict(client: &TrainerClient, cmd: PredictCommand) -> Result<()> {
    let mut data = BTreeMap::new();
    for pair in &cmd.values {
        let Some((name, value)) = pair.split_once('=') else {
            bail!("--set expects name=value, got `{pair}`");
        };
        data.insert(name.to_string(), value.to_string());
    }

    let request = PredictRequest {
        session_id: SessionId(cmd.session),
        features: cmd.features,
        data,
    };

    let prediction = client.predict(&request).await?;
    println!("{}", serde_json::to_string_pretty(&prediction)?);
    Ok(())
}
