//! Tablet server binary

use clap::Parser;
use ksck::common::TabletServerConfig;
use ksck::tserver::TabletServer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ksck-tserver")]
#[command(about = "Tablet server hosting replicated tablets")]
struct Cli {
    /// Node ID (random if omitted)
    #[arg(long)]
    id: Option<String>,

    /// Bind address
    #[arg(long, default_value = "127.0.0.1:7050")]
    bind: String,

    /// Master address
    #[arg(long, default_value = "127.0.0.1:7051")]
    master: String,

    /// Heartbeat and safe-time interval (ms)
    #[arg(long, default_value = "1000")]
    heartbeat_interval_ms: u64,

    /// Delay before a new replica finishes its election (ms)
    #[arg(long, default_value = "1500")]
    election_delay_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let node_id = cli
        .id
        .unwrap_or_else(|| format!("ts-{}", uuid::Uuid::new_v4().simple()));
    let config = TabletServerConfig {
        bind_addr: cli.bind.parse()?,
        master_address: cli.master,
        heartbeat_interval_ms: cli.heartbeat_interval_ms,
        election_delay_ms: cli.election_delay_ms,
    };
    TabletServer::serve(node_id, config).await?;
    Ok(())
}
