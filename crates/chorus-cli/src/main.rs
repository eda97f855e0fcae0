use chorus_cli::{wait_for_shutdown_signal, ServiceContainer};
use chorus_common::config::SystemConfig;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "chorus")]
#[command(about = "Concurrency and messaging core for a multi-agent chat platform")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, default_value = "chorus.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let code = run().await;
    std::process::exit(code);
}

async fn run() -> i32 {
    let cli = Cli::parse();

    let config = match SystemConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load config from {}: {e}", cli.config.display());
            return 1;
        }
    };

    let container = match ServiceContainer::start(&config).await {
        Ok(container) => container,
        Err(e) => {
            error!("fatal startup error: {e}");
            return 1;
        }
    };

    let addr: SocketAddr = match config.api.bind_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("invalid api.bind_addr {:?}: {e}", config.api.bind_addr);
            container.stop().await;
            return 1;
        }
    };

    let bridge = container.bridge.clone();
    let server = tokio::spawn(async move { chorus_api::server::serve(addr, bridge).await });

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, stopping");

    server.abort();
    container.stop().await;
    0
}
