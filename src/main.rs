use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ticket_booth::{
    config::ServerConfig,
    server::{Server, ShutdownReason},
};

#[derive(Parser)]
#[command(about = "Sells the seats of a single venue to concurrent clients")]
struct Args {
    /// TOML file with the server configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Maximum number of simultaneous clients
    #[arg(short, long)]
    max_connections: Option<usize>,

    /// Disconnect clients that stay silent for this many seconds
    #[arg(long)]
    idle_timeout: Option<u64>,

    /// Number of seat rows (0 for the default)
    rows: Option<usize>,

    /// Number of seats per row (0 for the default)
    cols: Option<usize>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ServerConfig::default(),
        };

        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(max_connections) = self.max_connections {
            config.max_connections = max_connections;
        }
        if let Some(idle_timeout) = self.idle_timeout {
            config.idle_timeout_secs = Some(idle_timeout);
        }
        if let Some(rows) = self.rows {
            config.rows = rows;
        }
        if let Some(cols) = self.cols {
            config.cols = cols;
        }

        Ok(config.normalize()?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Args::parse().into_config()?;
    let server = Server::bind(&config).await?;

    let shutdown = server.shutdown();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("interrupted, shutting down");
                shutdown.trigger(ShutdownReason::Operator);
            }
            Err(err) => tracing::warn!("unable to listen for ctrl-c: {}", err),
        }
    });

    server.run().await.context("server stopped abnormally")
}
