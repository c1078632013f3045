use std::{path::PathBuf, time::Duration};

use clap::Parser;
use rand::{rngs::StdRng, SeedableRng};
use tracing::Instrument;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ticket_booth::{
    client::{run_automatic, run_manual, Client, DEFAULT_INTERVAL},
    config::ClientSettings,
};

#[derive(Parser)]
#[command(about = "Buys seats from a ticket-booth server")]
struct Args {
    /// TOML file with the server ip, port and connection retries
    settings: Option<PathBuf>,

    /// Pick every request from a menu (the default)
    #[arg(long, conflicts_with = "automatic")]
    manual: bool,

    /// Buy random seats until the server sends us away
    #[arg(long)]
    automatic: bool,

    /// Delay between automatic purchases, in milliseconds
    #[arg(long, default_value_t = DEFAULT_INTERVAL.as_millis() as u64)]
    interval_ms: u64,
}

async fn run(args: Args) -> anyhow::Result<()> {
    let settings = match &args.settings {
        Some(path) => ClientSettings::load_or_default(path),
        None => ClientSettings::default(),
    };

    let mut client = Client::connect(&settings).await?;

    if args.automatic && !args.manual {
        let mut rng = StdRng::from_entropy();
        let interval = Duration::from_millis(args.interval_ms);
        let report = run_automatic(&mut client, interval, &mut rng).await?;
        tracing::info!(
            "bought {} seats in {} attempts, {} failed",
            report.purchased,
            report.attempts,
            report.failed
        );
    } else {
        run_manual(&mut client).await?;
    }

    if let Err(err) = client.close().await {
        tracing::debug!("failed to close the connection: {}", err);
    }

    Ok(())
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

    let span = tracing::info_span!("client");
    run(Args::parse()).instrument(span).await
}
