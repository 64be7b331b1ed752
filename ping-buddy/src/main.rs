//! Ping Buddy
//!
//! Pings an address, stores the parsed results as JSON and answers
//! questions about them through a retrieval-augmented chat.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pb_chat::{SessionConfig, SessionController};
use pb_core::config::{load_environment, try_load_env_file};
use pb_core::AppConfig;
use pb_llm::OpenAiClient;
use pb_probe::PingCommand;

mod ui;

#[derive(Parser, Debug)]
#[command(name = "ping-buddy")]
#[command(about = "Ping an address, then chat with the results")]
struct Args {
    /// Where the JSON results are written
    #[arg(long)]
    results_path: Option<PathBuf>,

    /// Completion model
    #[arg(long)]
    chat_model: Option<String>,

    /// Number of chunks retrieved per question
    #[arg(long)]
    top_k: Option<usize>,

    /// Environment file to load instead of the default search
    #[arg(long)]
    env_file: Option<String>,

    /// Log more (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(path) = &self.results_path {
            config.results_path = path.clone();
        }
        if let Some(model) = &self.chat_model {
            config.chat_model = model.clone();
        }
        if let Some(k) = self.top_k {
            config.top_k = k;
        }
    }
}

/// Load `--env-file`, or search the default locations.
fn load_env(env_file: Option<&str>) -> Option<String> {
    match env_file {
        Some(path) => try_load_env_file(path),
        None => load_environment(),
    }
}

fn env_filter(verbose: u8) -> Result<EnvFilter> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(level)?),
    }
}

fn init_tracing(verbose: u8) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose)?)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG may come from the environment file
    let loaded = load_env(args.env_file.as_deref());
    init_tracing(args.verbose)?;
    match (&args.env_file, &loaded) {
        (_, Some(path)) => info!("Environment loaded from {}", path),
        (Some(path), None) => warn!("Environment file {} not found", path),
        (None, None) => {}
    }

    let mut config = AppConfig::from_env()?;
    args.apply(&mut config);
    config.validate()?;
    info!(
        results_path = %config.results_path.display(),
        model = %config.chat_model,
        top_k = config.top_k,
        "Configuration loaded"
    );

    let client = Arc::new(
        OpenAiClient::from_env()?
            .with_base_url(config.openai_base_url.clone())
            .with_embedding_model(config.embedding_model.clone()),
    );
    let runner = Arc::new(PingCommand::new(
        config.ping_program.clone(),
        config.ping_count,
    ));

    let mut controller = SessionController::new(
        SessionConfig::from_app_config(&config),
        runner,
        client.clone(),
        client,
    )?;

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    ui::run(&mut controller, stdin, &mut stdout).await?;

    controller.end();
    Ok(())
}
