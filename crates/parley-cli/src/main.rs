//! parley - terminal chat client for OpenAI-compatible APIs

mod config;
mod plain;
mod ui;

use clap::Parser;
use parley_ai::{ApiClient, OpenAIClient, providers::get_api_key};
use parley_core::{Executor, ProviderSettings, Settings};
use serde_json::json;
use std::io::IsTerminal;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "parley=debug,parley_core=debug,parley_ai=debug";

/// parley - chat, image generation, vision and transcription from the terminal
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Chat model (overrides chat_settings.model)
    #[arg(short, long)]
    model: Option<String>,

    /// Provider: openai, groq or openrouter
    #[arg(short, long)]
    provider: Option<String>,

    /// Submit one line, wait for its result, and exit
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Write a debug log to the data directory
    #[arg(short, long)]
    verbose: bool,

    /// Disable TUI mode (read lines from stdin)
    #[arg(long)]
    no_tui: bool,

    /// Create the config file and print an example
    #[arg(long)]
    init_config: bool,
}

/// The TUI owns the terminal, so traces go to a file
fn init_logging() -> anyhow::Result<()> {
    let path = config::log_path();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)?;
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
    tracing::info!("parley {} starting", env!("CARGO_PKG_VERSION"));
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.init_config {
        match config::init() {
            Ok(path) => {
                println!("Config file at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    if args.verbose {
        init_logging()?;
    }

    // CLI flags win over the file
    let mut settings = config::load();
    if let Some(model) = &args.model {
        settings.set(&["chat_settings", "model"], json!(model));
    }
    if let Some(provider) = &args.provider {
        settings.set(&["api_settings", "current_provider"], json!(provider));
    }

    let Some(provider) = ProviderSettings::read(&settings) else {
        let name = settings
            .get(&["api_settings", "current_provider"])
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        eprintln!("Error: provider `{}` is not configured", name);
        eprintln!("Known providers: openai, groq, openrouter (see parley --init-config)");
        std::process::exit(1);
    };

    let Ok(api_key) = get_api_key(None, &provider.api_key_env) else {
        eprintln!("Error: no API key for {}", provider.name);
        eprintln!("Set it with: export {}=your-key", provider.api_key_env);
        std::process::exit(1);
    };
    tracing::debug!(provider = %provider.name, base_url = %provider.base_url, "using provider");

    let client: Arc<dyn ApiClient> = Arc::new(OpenAIClient::new(api_key, provider.base_url));
    let model = parley_core::settings::ChatSettings::read(&settings).model;
    let settings: Arc<dyn Settings> = Arc::new(settings);
    let executor = Arc::new(Executor::new()?);

    if let Some(command) = args.command {
        let ok = plain::run_once(settings, client, executor, &command).await?;
        if !ok {
            std::process::exit(1);
        }
        return Ok(());
    }

    if !args.no_tui && std::io::stdout().is_terminal() {
        return ui::run(settings, client, executor, &model).await;
    }

    plain::run(settings, client, executor, &model).await
}
