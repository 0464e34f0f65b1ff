//! streamchain demo server
//!
//! Serves a conversation chain backed by an OpenAI-compatible LLM at /chat
//! (SSE) and /chat/ws (WebSocket), configured from a YAML file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};

use streamchain::chain::ConversationChain;
use streamchain::{run_server, AppConfig, ChainRouter, ChatClient, ResponseCache};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Parser)]
#[command(name = "streamchain")]
#[command(version = "0.1.0")]
#[command(about = "Serve LLM chains over HTTP with SSE token streaming")]
#[command(long_about = "
streamchain serves a conversation chain backed by an OpenAI-compatible LLM:
  - POST /chat        chain endpoint (SSE or JSON per the streaming config)
  - GET  /chat/ws     WebSocket chat
  - GET  /health      health check

Example usage:
  streamchain run --config config.yaml
  streamchain check-config
  streamchain test-backend
")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    /// Set logging level (trace, debug, info, warn, error)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run {
        /// Override listen port
        #[arg(short, long)]
        port: Option<u16>,
        /// Override LLM backend URL (e.g. "http://localhost:8080")
        #[arg(long)]
        llm_url: Option<String>,
    },

    /// Validate configuration file
    CheckConfig,

    /// Test connection to the LLM backend
    TestBackend,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level_filter = if let Some(level) = cli.log_level {
        level.to_string()
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
            .to_string()
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&level_filter))
        .init();

    match cli.command {
        Commands::Run { port, llm_url } => {
            run(cli.config, port, llm_url).await?;
        }
        Commands::CheckConfig => {
            check_config(cli.config)?;
        }
        Commands::TestBackend => {
            test_backend(cli.config).await?;
        }
    }

    Ok(())
}

/// Run the demo server
async fn run(
    config_path: PathBuf,
    port_override: Option<u16>,
    llm_url_override: Option<String>,
) -> anyhow::Result<()> {
    let mut config = load_config_or_exit(&config_path);

    if let Some(port) = port_override {
        config.server.port = port;
    }
    if let Some(url) = llm_url_override {
        config.llm.url = url;
    }

    tracing::info!("Loading configuration from {:?}", config_path);

    let client = ChatClient::from_config(&config.llm).context("failed to build LLM client")?;

    let mut chain = ConversationChain::new(client);
    if let Some(ref system_prompt) = config.llm.system_prompt {
        chain = chain.with_system_prompt(system_prompt);
    }
    let chain = Arc::new(chain);

    let mut router = match ResponseCache::from_config(&config.cache) {
        Some(cache) => {
            tracing::info!(
                max_capacity = config.cache.max_capacity,
                ttl_seconds = config.cache.ttl_seconds,
                "Response cache enabled"
            );
            ChainRouter::with_cache(cache)
        }
        None => ChainRouter::new(),
    };

    router = router
        .chain_route("/chat", chain.clone(), config.streaming)
        .websocket_route("/chat/ws", chain);

    run_server(&config, router.into_router())
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))
}

/// Validate configuration file
fn check_config(config_path: PathBuf) -> anyhow::Result<()> {
    match AppConfig::from_file(&config_path) {
        Ok(config) => {
            println!("✓ Configuration file is valid\n");
            println!("Server:");
            println!("  Listen: {}:{}", config.server.host, config.server.port);
            println!("\nLLM backend:");
            println!("  URL: {}", config.llm.url);
            println!("  Model: {}", config.llm.model);
            println!(
                "  TLS: {}",
                if config.llm.is_tls() { "enabled" } else { "disabled" }
            );
            if let Some(ref tls) = config.llm.tls {
                if tls.accept_invalid_certs {
                    println!("  TLS: Accepting invalid certificates");
                }
                if let Some(ref ca) = tls.ca_cert_path {
                    println!("  TLS CA: {}", ca);
                }
                if let Some(ref cert) = tls.client_cert_path {
                    println!("  TLS Client Cert: {}", cert);
                }
            }
            println!("  Timeout: {}s", config.llm.timeout_seconds);
            println!("\nStreaming: {:?}", config.streaming);
            println!("\nCache:");
            println!("  Enabled: {}", config.cache.enabled);
            if config.cache.enabled {
                println!("  Capacity: {}", config.cache.max_capacity);
                println!("  TTL: {}s", config.cache.ttl_seconds);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Test connection to the LLM backend
async fn test_backend(config_path: PathBuf) -> anyhow::Result<()> {
    let config = load_config_or_exit(&config_path);
    let client = ChatClient::from_config(&config.llm).context("failed to build LLM client")?;

    println!(
        "Testing connection to backend: {}/v1/models",
        config.llm.base_url()
    );

    match client.models().await {
        Ok(models) => {
            println!("✓ Backend is reachable");
            println!("  Available models: {}", models.len());
            for model in models.iter().take(5) {
                println!("    - {}", model);
            }
            if !models.is_empty() && !models.iter().any(|m| m == &config.llm.model) {
                println!(
                    "  Warning: configured model '{}' not advertised by the backend",
                    config.llm.model
                );
            }
        }
        Err(e) => {
            println!("✗ Failed to connect to backend: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Load configuration or exit with error
fn load_config_or_exit(config_path: &PathBuf) -> AppConfig {
    match AppConfig::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            eprintln!("\nMake sure you have a config.yaml file.");
            eprintln!("You can copy config.yaml.default and modify it:");
            eprintln!("  cp config.yaml.default config.yaml");
            std::process::exit(1);
        }
    }
}
