mod cli;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

use fileagent::agent::AgentSession;
use fileagent::config::AppConfig;
use fileagent::llm::{create_adapter, HttpModelClient};
use fileagent::tools::{create_default_registry, ToolExecutor};

#[derive(Parser, Debug)]
#[command(
    name = "fileagent",
    version,
    about = "File agent that talks to OpenAI-style or Anthropic-style models"
)]
struct Cli {
    /// Provider family: openai or anthropic
    #[arg(long)]
    provider: Option<String>,
    #[arg(long)]
    model: Option<String>,
    /// Config file (default: ~/.fileagent/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the system prompt
    #[arg(long)]
    system: Option<String>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; keys may come from the environment or config.
    let _ = dotenvy::dotenv();
    init_tracing();
    let cli = Cli::parse();
    debug!(?cli, "CLI arguments parsed");

    // Auto-generate config file on first run
    if cli.config.is_none() {
        let config_path = AppConfig::config_path()?;
        if !config_path.exists() {
            let path = AppConfig::save_default()?;
            println!("[Config] Created default config: {}", path.display());
        }
    }

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(provider) = cli.provider {
        config.set_provider(provider);
    }
    if let Some(model) = cli.model {
        config.llm.model = model;
    }
    if let Some(system) = cli.system {
        config.agent.system_prompt = system;
    }

    let adapter = create_adapter(&config.llm)?;
    let api_key = config.api_key()?;
    let client = HttpModelClient::from_config(&config.llm, api_key)?;
    let registry = create_default_registry(&config.tools);
    info!(
        provider = %config.llm.provider,
        model = %config.llm.model,
        tools = registry.descriptors().len(),
        "Session configured"
    );

    let session = AgentSession::new(adapter, Box::new(client), Box::new(registry), &config.agent);
    println!(
        "🤖 File Agent (using {}, model {}) - Ready to help!",
        session.provider_name(),
        config.llm.model
    );

    cli::run_chat_loop(session)
        .await
        .context("Chat loop ended with an error")
}
