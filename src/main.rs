use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mediawarp::{config::Config, gateway::Gateway, web::WebServer};

#[derive(Parser)]
#[command(name = "mediawarp")]
#[command(version)]
#[command(about = "Emby/Jellyfin gateway that redirects STRM entries and forces direct play")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("mediawarp={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting MediaWarp v{}", env!("CARGO_PKG_VERSION"));

    std::env::set_var("CONFIG_FILE", &cli.config);
    let mut config = Config::load()?;
    info!("Configuration loaded from: {}", cli.config);

    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let gateway = Arc::new(Gateway::from_config(&config)?);
    let web_server = WebServer::new(&config, gateway)?;

    info!(
        "Listening on {}:{}, proxying {} at {}",
        web_server.host(),
        web_server.port(),
        config.media_server.kind.as_str(),
        config.media_server.addr
    );
    web_server.serve().await?;

    info!("MediaWarp stopped");
    Ok(())
}
