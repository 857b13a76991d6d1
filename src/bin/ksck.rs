//! ksck: check the health and data consistency of a cluster

use clap::Parser;
use ksck::common::{parse_duration, KsckConfig};
use ksck::{ChecksumReport, Error, Ksck};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ksck")]
#[command(about = "Cluster consistency checker")]
#[command(version)]
struct Cli {
    /// Config file (default: ./ksck.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Master address
    #[arg(long)]
    master: Option<String>,

    /// Checksum every replica after the consistency checks
    #[arg(long)]
    checksum_scan: bool,

    /// Scan all replicas at one snapshot timestamp
    #[arg(long)]
    checksum_snapshot: Option<bool>,

    /// Snapshot timestamp, or "current" for the latest observed one
    #[arg(long)]
    snapshot_timestamp: Option<String>,

    /// Overall checksum deadline (e.g. "30s", "1h")
    #[arg(long)]
    checksum_timeout: Option<String>,

    /// Max checksum scans in flight cluster-wide
    #[arg(long)]
    checksum_scan_concurrency: Option<usize>,

    /// Only check these tables (comma-separated)
    #[arg(long, value_delimiter = ',')]
    tables: Vec<String>,

    /// Only check these tablets (comma-separated)
    #[arg(long, value_delimiter = ',')]
    tablets: Vec<String>,

    /// Print the checksum report as JSON
    #[arg(long)]
    json: bool,
}

fn render_report(report: &ChecksumReport, json: bool) -> anyhow::Result<String> {
    if json {
        Ok(serde_json::to_string_pretty(report)?)
    } else {
        Ok(report.to_string())
    }
}

fn apply_overrides(cli: Cli, mut config: KsckConfig) -> ksck::Result<KsckConfig> {
    if let Some(master) = cli.master {
        config.master_address = master;
    }
    if cli.checksum_scan {
        config.checksum.enabled = true;
    }
    if let Some(snapshot) = cli.checksum_snapshot {
        config.checksum.use_snapshot = snapshot;
    }
    match cli.snapshot_timestamp.as_deref() {
        None => {}
        Some("current") => config.checksum.snapshot_timestamp = None,
        Some(ts) => {
            let ts = ts
                .parse()
                .map_err(|_| Error::InvalidConfig(format!("invalid snapshot timestamp: {}", ts)))?;
            config.checksum.snapshot_timestamp = Some(ts);
        }
    }
    if let Some(timeout) = cli.checksum_timeout {
        config.checksum.set_timeout(parse_duration(&timeout)?)?;
    }
    if let Some(concurrency) = cli.checksum_scan_concurrency {
        config.checksum.scan_concurrency = concurrency;
    }
    if !cli.tables.is_empty() {
        config.tables = cli.tables;
    }
    if !cli.tablets.is_empty() {
        config.tablets = cli.tablets;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let json = cli.json;
    let config = KsckConfig::load(cli.config.as_deref())?;
    let config = apply_overrides(cli, config)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let ksck = Ksck::connect(&config.master_address, config.rpc_timeout()).await?;
    let tables: BTreeSet<String> = config.tables.iter().cloned().collect();
    let tablets: BTreeSet<String> = config.tablets.iter().cloned().collect();
    let checksum = config
        .checksum
        .enabled
        .then(|| config.checksum_options());

    match ksck.run(&tables, &tablets, checksum).await {
        Ok(report) => {
            if let Some(report) = report {
                println!("{}", render_report(&report, json)?);
            }
            println!("OK");
            Ok(())
        }
        Err(Error::ChecksumFailed(report)) => {
            eprintln!("{}", render_report(&report, json)?);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
