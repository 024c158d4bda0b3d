//! imaged - prompt-to-image web form daemon

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use imaged::config::{CONFIG_FILE, SECRETS_FILE};
use imaged::{Config, Server};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Prompt-to-image web form server
#[derive(Parser, Debug)]
#[command(name = "imaged", version, about = "Serve the image generation form")]
struct Args {
    /// TOML config file (optional)
    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// TOML secrets file holding `api_key` (optional)
    #[arg(long, default_value = SECRETS_FILE)]
    secrets: PathBuf,

    /// Address to listen on
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Directory for generated images
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "imaged=info,tower_http=debug".into());
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let mut config = Config::load(&args.config, &args.secrets)?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }
    info!("Loaded configuration: {:?}", config);

    // Create and run server
    let server = Arc::new(Server::new(config).await?);

    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, shutting down");
            signal_server.shutdown();
        }
    });

    server.run().await?;

    Ok(())
}
