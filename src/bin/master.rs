//! Master binary

use clap::Parser;
use ksck::common::MasterConfig;
use ksck::master::Master;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ksck-master")]
#[command(about = "Cluster master: table catalog and tablet placement")]
struct Cli {
    /// Bind address
    #[arg(long, default_value = "0.0.0.0:7051")]
    bind: String,

    /// Replication factor for tables that do not name one
    #[arg(long, default_value = "3")]
    replicas: usize,

    /// Consider a tablet server dead after this long without a heartbeat (ms)
    #[arg(long, default_value = "3000")]
    unresponsive_timeout_ms: u64,
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
    let config = MasterConfig {
        bind_addr: cli.bind.parse()?,
        default_num_replicas: cli.replicas,
        tserver_unresponsive_timeout_ms: cli.unresponsive_timeout_ms,
    };
    Master::new(config).serve().await?;
    Ok(())
}
