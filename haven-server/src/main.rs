use std::sync::Arc;

use clap::Parser;
use haven_core::HavenConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use haven_server::http::{self, HttpState};
use haven_server::subsystems::{backends, chat::ChatService};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "haven.toml")]
    config: String,

    /// Build the model backends, report them and exit
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (HF_API_TOKEN, RUST_LOG, HAVEN__* overrides)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match HavenConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging — RUST_LOG wins over [service] log_level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    let classifier = match backends::create_classifier(&config.emotion) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to create emotion backend: {}", e);
            std::process::exit(1);
        }
    };

    let generator = match backends::create_generator(&config.generation) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Failed to create generation backend: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        println!("✅ Emotion backend: {} ({})", classifier.name(), config.emotion.model);
        println!("✅ Generation backend: {} ({})", generator.name(), config.generation.model);
        println!(
            "✅ Context window: {} turns, {} input tokens",
            config.conversation.context_window_turns, config.conversation.max_input_tokens
        );
        return Ok(());
    }

    let chat = ChatService::from_config(&config, classifier, generator)?;
    let state = Arc::new(HttpState { chat, config });

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    http::start_http_server(state, tx.subscribe()).await?;

    Ok(())
}
