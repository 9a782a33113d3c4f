//! trainbench studio: interactive desktop front-end for a remote model
//! training service.

mod app;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use trainbench_client::{TrainerClient, DEFAULT_SERVER_URL};

#[derive(Parser)]
#[command(name = "trainbench-studio")]
#[command(about = "Desktop front-end for a trainbench model service", long_about = None)]
#[command(version)]
struct Args {
    /// Model service base URL
    #[arg(long, alias = "server", default_value = DEFAULT_SERVER_URL)]
    server_url: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let client = TrainerClient::new(&args.server_url)
        .with_context(|| format!("invalid server URL {}", args.server_url))?;

    // Requests run on this runtime; the UI thread only polls promises.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let handle = runtime.handle().clone();

    eframe::run_native(
        "trainbench studio",
        eframe::NativeOptions::default(),
        Box::new(move |_cc| Ok(Box::new(app::StudioApp::new(client, handle)))),
    )
    .map_err(|err| anyhow!("failed to launch UI: {err}"))
}
