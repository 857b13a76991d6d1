//! Configuration for ksck components

use crate::common::{Error, Result};
use crate::ksck::checksum::{ChecksumOptions, SnapshotTimestamp};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix (`KSCK_MASTER_ADDRESS`, `KSCK_CHECKSUM__TIMEOUT_MS`, ...)
const ENV_PREFIX: &str = "KSCK";

/// Checker configuration, loaded from `ksck.toml` and the environment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KsckConfig {
    /// Master RPC address (host:port or URL)
    pub master_address: String,

    /// Timeout for single master / tablet server RPCs
    pub rpc_timeout_ms: u64,

    /// Only check these tables (empty = all)
    pub tables: Vec<String>,

    /// Only check these tablets (empty = all)
    pub tablets: Vec<String>,

    pub checksum: ChecksumConfig,

    /// Logging level
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecksumConfig {
    /// Run the checksum scan after the consistency checks
    pub enabled: bool,

    /// Overall deadline for the checksum operation
    pub timeout_ms: u64,

    /// Max checksum scans in flight cluster-wide
    pub scan_concurrency: usize,

    /// Scan all replicas at one snapshot timestamp
    pub use_snapshot: bool,

    /// Fixed snapshot timestamp; unset means the latest observed timestamp
    pub snapshot_timestamp: Option<u64>,
}

impl Default for KsckConfig {
    fn default() -> Self {
        Self {
            master_address: "127.0.0.1:7051".to_string(),
            rpc_timeout_ms: 10_000,
            tables: vec![],
            tablets: vec![],
            checksum: ChecksumConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl ChecksumConfig {
    pub fn options(&self) -> ChecksumOptions {
        let timestamp = match self.snapshot_timestamp {
            Some(ts) => SnapshotTimestamp::Fixed(ts),
            None => SnapshotTimestamp::LatestObserved,
        };
        ChecksumOptions::new(
            Duration::from_millis(self.timeout_ms),
            self.scan_concurrency,
            self.use_snapshot,
            timestamp,
        )
    }

    /// Set the overall deadline; it must be a whole number of milliseconds
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        if timeout.subsec_nanos() % 1_000_000 != 0 {
            return Err(Error::InvalidConfig(format!(
                "checksum timeout {:?} is not a whole number of milliseconds",
                timeout
            )));
        }
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        Ok(())
    }
}

impl Default for ChecksumConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_ms: 3_600_000,
            scan_concurrency: 4,
            use_snapshot: true,
            snapshot_timestamp: None,
        }
    }
}

impl KsckConfig {
    /// Load from an optional TOML file, then `KSCK_*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        } else {
            builder = builder.add_source(config::File::with_name("ksck").required(false));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("tables")
                    .with_list_parse_key("tablets")
                    .try_parsing(true),
            )
            .build()?;

        let config: KsckConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.master_address.trim().is_empty() {
            return Err(Error::InvalidConfig("master_address is empty".into()));
        }
        if self.checksum.scan_concurrency == 0 {
            return Err(Error::InvalidConfig(
                "checksum.scan_concurrency must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    /// Checksum options for this configuration
    pub fn checksum_options(&self) -> ChecksumOptions {
        self.checksum.options()
    }
}

/// Master server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterConfig {
    /// Bind address for the RPC endpoint
    pub bind_addr: SocketAddr,

    /// Replication factor when a create request does not name one
    #[serde(default = "default_num_replicas")]
    pub default_num_replicas: usize,

    /// A tablet server is considered dead after this long without a heartbeat
    #[serde(default = "default_unresponsive_timeout")]
    pub tserver_unresponsive_timeout_ms: u64,
}

fn default_num_replicas() -> usize {
    3
}
fn default_unresponsive_timeout() -> u64 {
    3_000
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            bind_addr: ([127, 0, 0, 1], 7051).into(),
            default_num_replicas: default_num_replicas(),
            tserver_unresponsive_timeout_ms: default_unresponsive_timeout(),
        }
    }
}

/// Tablet server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabletServerConfig {
    /// Bind address for the RPC endpoint
    pub bind_addr: SocketAddr,

    /// Master address to heartbeat to
    pub master_address: String,

    /// Interval between heartbeats (and leader safe-time pushes)
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,

    /// Delay before a new replica finishes its leader election
    #[serde(default = "default_election_delay")]
    pub election_delay_ms: u64,
}

fn default_heartbeat_interval() -> u64 {
    1_000
}
fn default_election_delay() -> u64 {
    1_500
}

impl Default for TabletServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: ([127, 0, 0, 1], 7050).into(),
            master_address: "127.0.0.1:7051".to_string(),
            heartbeat_interval_ms: default_heartbeat_interval(),
            election_delay_ms: default_election_delay(),
        }
    }
}

impl TabletServerConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn election_delay(&self) -> Duration {
        Duration::from_millis(self.election_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = KsckConfig::default();
        assert!(config.validate().is_ok());
        let opts = config.checksum_options();
        assert_eq!(opts.scan_concurrency(), 4);
        assert!(opts.use_snapshot());
        assert_eq!(opts.snapshot_timestamp(), SnapshotTimestamp::LatestObserved);

        let fallback = ChecksumOptions::default();
        assert_eq!(fallback.timeout(), opts.timeout());
        assert_eq!(fallback.scan_concurrency(), opts.scan_concurrency());
        assert_eq!(fallback.use_snapshot(), opts.use_snapshot());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
master_address = "10.0.0.1:7051"
tables = ["orders"]

[checksum]
enabled = true
timeout_ms = 1000
scan_concurrency = 16
use_snapshot = false
snapshot_timestamp = 42
"#
        )
        .unwrap();

        let config = KsckConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.master_address, "10.0.0.1:7051");
        assert_eq!(config.tables, vec!["orders".to_string()]);
        assert!(config.checksum.enabled);

        let opts = config.checksum_options();
        assert_eq!(opts.timeout(), Duration::from_secs(1));
        assert_eq!(opts.scan_concurrency(), 16);
        assert!(!opts.use_snapshot());
        assert_eq!(opts.snapshot_timestamp(), SnapshotTimestamp::Fixed(42));
    }

    #[test]
    fn test_checksum_timeout_keeps_precision() {
        let mut checksum = ChecksumConfig::default();
        checksum.set_timeout(Duration::from_millis(1500)).unwrap();
        assert_eq!(checksum.options().timeout(), Duration::from_millis(1500));

        checksum.set_timeout(Duration::ZERO).unwrap();
        assert_eq!(checksum.options().timeout(), Duration::ZERO);

        assert!(checksum.set_timeout(Duration::from_micros(500)).is_err());
        assert!(checksum.set_timeout(Duration::from_micros(1500)).is_err());
        assert_eq!(checksum.timeout_ms, 0);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = KsckConfig::default();
        config.checksum.scan_concurrency = 0;
        assert!(config.validate().is_err());
    }
}
