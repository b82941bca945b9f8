//! CLI entry point for chat-relay

mod client;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chat_relay_core::config::{Config, ConfigLoader, RelayMode};
use chat_relay_core::config::validate::validate_config;
use chat_relay_core::logging::init_logging;
use chat_relay_core::session::SessionStore;
use chat_relay_providers::OllamaClient;
use chat_relay_server::{run_server, AppState, ChatRelay, RelaySettings};
use clap::{Parser, Subcommand};
use console::style;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::client::ApiClient;

#[derive(Parser)]
#[command(name = "chat-relay")]
#[command(about = "HTTP relay between chat clients and a local Ollama server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay server
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
        /// Deployment mode: full (history) or fast (stateless prompt)
        #[arg(long)]
        mode: Option<RelayMode>,
        /// Model for /api/chat
        #[arg(short, long)]
        model: Option<String>,
        /// Base URL of the Ollama server
        #[arg(long)]
        ollama_url: Option<String>,
    },
    /// Show the resolved configuration
    Status,
    /// Send a message to a running relay
    Chat {
        /// Message to send
        #[arg(short, long)]
        message: String,
        /// Session key for conversation continuity
        #[arg(short, long)]
        session: Option<String>,
        /// Use the stateless quick endpoint
        #[arg(long)]
        quick: bool,
        /// Relay base URL
        #[arg(long)]
        url: Option<String>,
    },
    /// Clear a session's history on a running relay
    Clear {
        /// Session key
        #[arg(short, long)]
        session: Option<String>,
        /// Relay base URL
        #[arg(long)]
        url: Option<String>,
    },
    /// Ask a running relay whether Ollama is reachable
    Health {
        /// Relay base URL
        #[arg(long)]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_loader = if let Some(dir) = cli.config_dir {
        ConfigLoader::with_dir(dir)
    } else {
        ConfigLoader::new()
    };

    match cli.command {
        Commands::Serve {
            host,
            port,
            mode,
            model,
            ollama_url,
        } => {
            let mut config = config_loader.load()?;
            apply_serve_overrides(&mut config, host, port, mode, model, ollama_url);
            validate_config(&config)?;
            run_serve(config).await?;
        }
        Commands::Status => {
            init_cli_logging();
            run_status(&config_loader)?;
        }
        Commands::Chat {
            message,
            session,
            quick,
            url,
        } => {
            init_cli_logging();
            run_chat(ApiClient::new(url), &message, session.as_deref(), quick).await?;
        }
        Commands::Clear { session, url } => {
            init_cli_logging();
            let resp = ApiClient::new(url).clear(session.as_deref()).await?;
            println!("{}", style(resp.message).green());
        }
        Commands::Health { url } => {
            init_cli_logging();
            run_health(ApiClient::new(url)).await?;
        }
    }

    Ok(())
}

/// Client commands only need warnings on stderr unless RUST_LOG says otherwise
fn init_cli_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn apply_serve_overrides(
    config: &mut Config,
    host: Option<String>,
    port: Option<u16>,
    mode: Option<RelayMode>,
    model: Option<String>,
    ollama_url: Option<String>,
) {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(mode) = mode {
        config.relay.mode = mode;
    }
    if let Some(model) = model {
        match config.relay.mode {
            RelayMode::Full => config.inference.model = model,
            RelayMode::Fast => config.inference.fast_model = model,
        }
    }
    if let Some(url) = ollama_url {
        config.inference.api_base = url;
    }
}

async fn run_serve(config: Config) -> Result<()> {
    let _log_guard = init_logging(&config.logging);

    let addr: SocketAddr =
        tokio::net::lookup_host((config.server.host.as_str(), config.server.port))
            .await?
            .next()
            .with_context(|| {
                format!(
                    "cannot resolve listen address {}:{}",
                    config.server.host, config.server.port
                )
            })?;

    let settings = RelaySettings::from(&config);
    info!(
        mode = %settings.mode,
        model = settings.chat_model(),
        "Relaying to Ollama at {}",
        config.inference.api_base
    );

    let backend = Arc::new(OllamaClient::new(config.inference.api_base.clone()));
    let relay = ChatRelay::new(Arc::new(SessionStore::new()), backend, settings);
    let state = AppState::new(relay);

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        let _ = shutdown_tx.send(());
    });

    println!(
        "{}",
        style(format!("chat-relay listening on http://{} (Ctrl+C to stop)", addr)).green()
    );
    run_server(state, addr, shutdown_rx).await?;
    println!("{}", style("chat-relay stopped.").yellow());
    Ok(())
}

fn run_status(loader: &ConfigLoader) -> Result<()> {
    let config = loader.load()?;

    println!("{}", style("chat-relay status").bold().cyan());
    println!("Version: {}\n", env!("CARGO_PKG_VERSION"));

    println!("{}", style("Configuration:").bold());
    let source = if loader.config_path().exists() {
        style("file").green()
    } else {
        style("defaults").dim()
    };
    println!("  Config file: {} ({})", loader.config_path().display(), source);
    println!("  Listen: {}:{}", config.server.host, config.server.port);
    println!("  Mode: {}", config.relay.mode);
    println!();

    println!("{}", style("Inference server:").bold());
    println!("  Base URL: {}", config.inference.api_base);
    println!("  Model: {}", config.inference.model);
    println!("  Fast model: {}", config.inference.fast_model);
    println!();

    println!("{}", style("Timeouts (s):").bold());
    println!(
        "  chat {} / fast {} / quick {} / health {}",
        config.relay.chat_timeout_secs,
        config.relay.fast_timeout_secs,
        config.relay.quick_timeout_secs,
        config.relay.health_timeout_secs
    );

    Ok(())
}

async fn run_chat(
    client: ApiClient,
    message: &str,
    session: Option<&str>,
    quick: bool,
) -> Result<()> {
    let (success, response, error) = if quick {
        let resp = client.quick(message).await?;
        (resp.success, resp.response, resp.error)
    } else {
        let resp = client.chat(message, session).await?;
        (resp.success, resp.response, resp.error)
    };

    if success {
        println!("{}", response.unwrap_or_default());
        Ok(())
    } else {
        anyhow::bail!(
            "relay reported failure: {}",
            error.unwrap_or_else(|| "unknown error".to_string())
        )
    }
}

async fn run_health(client: ApiClient) -> Result<()> {
    let resp = client.health().await?;
    let status = if resp.success {
        style(resp.ollama_status).green()
    } else {
        style(resp.ollama_status).red()
    };
    println!("Ollama: {}", status);

    if let Some(models) = resp.models {
        println!("{}", serde_json::to_string_pretty(&models)?);
    }
    Ok(())
}
