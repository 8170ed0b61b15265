mod cli;
mod framing;
mod server;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use directories::ProjectDirs;
use learnflow_core::agents::{CompletionClient, Orchestrator};
use learnflow_core::api::v1::ApiState;
use learnflow_core::db::init_db;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

fn workspace_dir() -> PathBuf {
    if let Some(proj) = ProjectDirs::from("com", "LearnFlow", "LearnFlow") {
        proj.data_dir().to_path_buf()
    } else {
        std::env::temp_dir().join("LearnFlow")
    }
}

/// stdout carries the protocol, so every log line goes to stderr. `log`
/// records from the core are bridged into the same subscriber.
fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let data_dir = cli.data_dir.unwrap_or_else(workspace_dir);
    log::info!(
        "starting LearnFlow host (data dir {}, caller {:?})",
        data_dir.display(),
        cli.caller.first()
    );

    let db = init_db(data_dir).context("failed to open settings database")?;
    let client = CompletionClient::new()?;
    let orchestrator = Orchestrator::new(db.clone(), Arc::new(client));
    let state = ApiState::new(db, orchestrator);

    server::serve(state, tokio::io::stdin(), tokio::io::stdout()).await
}
