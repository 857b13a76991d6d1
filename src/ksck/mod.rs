//! Cluster consistency checker
//!
//! `Ksck` runs the individual checks against a `ClusterHandle`:
//! - master liveness
//! - topology fetch (tables, tablets, replica placement)
//! - tablet server liveness
//! - replica-set consistency (leadership, membership, replication factor)
//! - replica checksums, optionally at a snapshot timestamp
//!
//! Each step is callable on its own. None of them retry; waiting for a
//! cluster to converge is up to the caller.

pub mod checksum;
pub mod cluster;
pub mod consistency;
pub mod liveness;
pub mod model;
pub mod remote;
pub mod rpc;

#[cfg(test)]
mod fake;

pub use checksum::{
    ChecksumOptions, ChecksumReport, ReplicaOutcome, SnapshotTimestamp, TabletChecksum,
    TabletChecksumStatus,
};
pub use cluster::ClusterHandle;
pub use consistency::ConsistencyIssue;
pub use model::{ClusterView, Replica, ReplicaHealth, Table, Tablet};

use crate::common::Result;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::info;

pub struct Ksck {
    cluster: ClusterHandle,
    probe_concurrency: usize,
}

impl Ksck {
    pub fn new(cluster: ClusterHandle) -> Self {
        Self {
            cluster,
            probe_concurrency: liveness::DEFAULT_PROBE_CONCURRENCY,
        }
    }

    /// Connect to a live cluster through its master
    pub async fn connect(master_address: &str, rpc_timeout: Duration) -> Result<Self> {
        Ok(Self::new(
            ClusterHandle::connect(master_address, rpc_timeout).await?,
        ))
    }

    /// Bound on simultaneous liveness and status probes
    pub fn with_probe_concurrency(mut self, concurrency: usize) -> Self {
        self.probe_concurrency = concurrency.max(1);
        self
    }

    pub fn cluster(&self) -> &ClusterHandle {
        &self.cluster
    }

    pub async fn check_master_running(&self) -> Result<()> {
        liveness::check_master_running(self.cluster.master()).await
    }

    pub async fn fetch_table_and_tablet_info(&self) -> Result<ClusterView> {
        self.cluster.fetch_topology().await
    }

    pub async fn check_tablet_servers_running(&self, view: &ClusterView) -> Result<()> {
        liveness::check_tablet_servers_running(view, self.cluster.proxies(), self.probe_concurrency)
            .await
    }

    pub async fn check_tables_consistency(&self, view: &ClusterView) -> Result<()> {
        consistency::check_tables_consistency(view, self.cluster.proxies(), self.probe_concurrency)
            .await
    }

    /// Checksum the selected tables and tablets (empty sets select everything)
    pub async fn checksum_data(
        &self,
        view: &ClusterView,
        tables: &BTreeSet<String>,
        tablets: &BTreeSet<String>,
        options: ChecksumOptions,
    ) -> Result<ChecksumReport> {
        checksum::checksum_data(
            view,
            self.cluster.proxies(),
            self.cluster.oracle(),
            tables,
            tablets,
            options,
        )
        .await
    }

    /// Run every check in order and stop at the first failure.
    ///
    /// The checksum step only runs when `checksum` is given.
    pub async fn run(
        &self,
        tables: &BTreeSet<String>,
        tablets: &BTreeSet<String>,
        checksum: Option<ChecksumOptions>,
    ) -> Result<Option<ChecksumReport>> {
        self.check_master_running().await?;
        let view = self.fetch_table_and_tablet_info().await?;
        self.check_tablet_servers_running(&view).await?;
        self.check_tables_consistency(&view).await?;

        let report = match checksum {
            Some(options) => Some(self.checksum_data(&view, tables, tablets, options).await?),
            None => None,
        };
        info!("All checks passed");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Error;
    use crate::ksck::fake::FakeCluster;

    fn cluster() -> FakeCluster {
        FakeCluster::builder()
            .tablet_servers(&["ts-1", "ts-2", "ts-3"])
            .table("t", 3)
            .tablet("t", "t-1", &["ts-1", "ts-2", "ts-3"])
            .tablet("t", "t-2", &["ts-2", "ts-3", "ts-1"])
            .build()
    }

    fn checksum_options() -> ChecksumOptions {
        ChecksumOptions::new(Duration::from_secs(5), 4, false, SnapshotTimestamp::Fixed(0))
    }

    #[tokio::test]
    async fn test_run_all_checks() {
        let cluster = cluster();
        let ksck = Ksck::new(cluster.handle().clone());
        let report = ksck
            .run(&BTreeSet::new(), &BTreeSet::new(), Some(checksum_options()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.count(TabletChecksumStatus::Ok), 2);

        let skipped = ksck
            .run(&BTreeSet::new(), &BTreeSet::new(), None)
            .await
            .unwrap();
        assert!(skipped.is_none());
        assert_eq!(cluster.total_scan_calls(), 6);
    }

    #[tokio::test]
    async fn test_run_stops_at_first_failure() {
        let cluster = cluster();
        cluster.server("ts-2").set_down(true);
        let ksck = Ksck::new(cluster.handle().clone()).with_probe_concurrency(1);

        let err = ksck
            .run(&BTreeSet::new(), &BTreeSet::new(), Some(checksum_options()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unavailable { ref node, .. } if node == "ts-2"));
        assert_eq!(cluster.total_scan_calls(), 0);
    }

    #[tokio::test]
    async fn test_steps_callable_individually() {
        let cluster = cluster();
        let ksck = Ksck::new(cluster.handle().clone());
        ksck.check_master_running().await.unwrap();
        let view = ksck.fetch_table_and_tablet_info().await.unwrap();
        ksck.check_tables_consistency(&view).await.unwrap();

        let tablets: BTreeSet<String> = ["t-2".to_string()].into();
        let report = ksck
            .checksum_data(&view, &BTreeSet::new(), &tablets, checksum_options())
            .await
            .unwrap();
        assert_eq!(report.tablets.len(), 1);
    }
}
