//! The RPC surface ksck needs from the cluster.
//!
//! The checks only talk to these traits; `remote` implements them over HTTP
//! and the unit tests implement them in memory.

use crate::common::clock::Timestamp;
use crate::common::wire::{
    ChecksumResponse, ReplicaStatus, TableDescriptor, TabletDescriptor, TabletServerDescriptor,
};
use crate::common::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Connection to the metadata authority
#[async_trait]
pub trait MasterProxy: Send + Sync {
    fn address(&self) -> &str;

    async fn ping(&self) -> Result<()>;

    async fn list_tables(&self) -> Result<Vec<TableDescriptor>>;

    async fn list_tablets(&self, table: &str) -> Result<Vec<TabletDescriptor>>;

    async fn list_tablet_servers(&self) -> Result<Vec<TabletServerDescriptor>>;
}

/// Connection to one serving node
#[async_trait]
pub trait TabletServerProxy: Send + Sync {
    fn node_id(&self) -> &str;

    async fn ping(&self) -> Result<()>;

    async fn replica_status(&self, tablet_id: &str) -> Result<ReplicaStatus>;

    /// Checksum one replica, optionally at a snapshot timestamp. `timeout`
    /// bounds the remote side's wait for its safe time.
    async fn checksum_scan(
        &self,
        tablet_id: &str,
        snapshot: Option<Timestamp>,
        timeout: Duration,
    ) -> Result<ChecksumResponse>;
}

/// Builds proxies for the tablet servers listed in a view
pub trait ProxyFactory: Send + Sync {
    fn tablet_server(&self, server: &TabletServerDescriptor) -> Arc<dyn TabletServerProxy>;
}

/// The checker's own view of time
pub trait TimestampOracle: Send + Sync {
    /// Latest timestamp observed by this client, if any
    fn latest_observed_timestamp(&self) -> Option<Timestamp>;
}
