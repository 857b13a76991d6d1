//! Replica checksum verification.
//!
//! Every replica of every tablet in scope is asked to checksum its data,
//! optionally at one snapshot timestamp fixed for the whole operation. At
//! most `scan_concurrency` scans are in flight cluster-wide. Results are
//! grouped by tablet; the operation succeeds only if every tablet's replicas
//! agree.
//!
//! On timeout the scans already dispatched are left to finish on their own
//! and their results are dropped.

use crate::common::clock::Timestamp;
use crate::common::config::ChecksumConfig;
use crate::common::{Error, Result};
use crate::ksck::model::{ClusterView, Table, Tablet};
use crate::ksck::rpc::{ProxyFactory, TabletServerProxy, TimestampOracle};
use futures_util::future::join_all;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// How often progress is logged while waiting for scans
const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Snapshot timestamp choice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotTimestamp {
    Fixed(Timestamp),
    /// Latest timestamp observed by the checker's own client at dispatch time
    LatestObserved,
}

/// Options for one checksum run
#[derive(Debug, Clone, Copy)]
pub struct ChecksumOptions {
    timeout: Duration,
    scan_concurrency: usize,
    use_snapshot: bool,
    snapshot_timestamp: SnapshotTimestamp,
}

impl ChecksumOptions {
    pub fn new(
        timeout: Duration,
        scan_concurrency: usize,
        use_snapshot: bool,
        snapshot_timestamp: SnapshotTimestamp,
    ) -> Self {
        Self {
            timeout,
            scan_concurrency,
            use_snapshot,
            snapshot_timestamp,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn scan_concurrency(&self) -> usize {
        self.scan_concurrency
    }

    pub fn use_snapshot(&self) -> bool {
        self.use_snapshot
    }

    pub fn snapshot_timestamp(&self) -> SnapshotTimestamp {
        self.snapshot_timestamp
    }
}

impl Default for ChecksumOptions {
    fn default() -> Self {
        ChecksumConfig::default().options()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TabletChecksumStatus {
    Ok,
    Mismatch,
    Error,
    TimedOut,
}

impl fmt::Display for TabletChecksumStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TabletChecksumStatus::Ok => write!(f, "OK"),
            TabletChecksumStatus::Mismatch => write!(f, "MISMATCH"),
            TabletChecksumStatus::Error => write!(f, "ERROR"),
            TabletChecksumStatus::TimedOut => write!(f, "TIMED_OUT"),
        }
    }
}

/// Outcome of scanning one replica
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ReplicaOutcome {
    Checksum { checksum: u64, rows: u64 },
    TimedOut(String),
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct TabletChecksum {
    pub table_name: String,
    pub tablet_id: String,
    pub status: TabletChecksumStatus,
    /// Keyed by node id
    pub replicas: BTreeMap<String, ReplicaOutcome>,
}

impl TabletChecksum {
    fn classify(table_name: &str, tablet_id: &str, replicas: BTreeMap<String, ReplicaOutcome>) -> Self {
        let checksums: BTreeSet<u64> = replicas
            .values()
            .filter_map(|r| match r {
                ReplicaOutcome::Checksum { checksum, .. } => Some(*checksum),
                _ => None,
            })
            .collect();
        let failed = replicas
            .values()
            .any(|r| matches!(r, ReplicaOutcome::Failed(_)));
        let timed_out = replicas
            .values()
            .any(|r| matches!(r, ReplicaOutcome::TimedOut(_)));

        let status = if checksums.len() > 1 {
            TabletChecksumStatus::Mismatch
        } else if failed || replicas.is_empty() {
            TabletChecksumStatus::Error
        } else if timed_out {
            TabletChecksumStatus::TimedOut
        } else {
            TabletChecksumStatus::Ok
        };

        Self {
            table_name: table_name.to_string(),
            tablet_id: tablet_id.to_string(),
            status,
            replicas,
        }
    }

    /// Checksum value shared by all replicas, when they agree
    pub fn agreed_checksum(&self) -> Option<u64> {
        if self.status != TabletChecksumStatus::Ok {
            return None;
        }
        self.replicas.values().find_map(|r| match r {
            ReplicaOutcome::Checksum { checksum, .. } => Some(*checksum),
            _ => None,
        })
    }
}

/// Per-tablet results of one checksum run
#[derive(Debug, Clone, Serialize)]
pub struct ChecksumReport {
    pub snapshot_timestamp: Option<Timestamp>,
    /// Keyed by tablet id
    pub tablets: BTreeMap<String, TabletChecksum>,
    pub elapsed: Duration,
}

impl ChecksumReport {
    pub fn is_ok(&self) -> bool {
        self.tablets
            .values()
            .all(|t| t.status == TabletChecksumStatus::Ok)
    }

    pub fn count(&self, status: TabletChecksumStatus) -> usize {
        self.tablets.values().filter(|t| t.status == status).count()
    }

    /// Tablets that did not check out
    pub fn failures(&self) -> impl Iterator<Item = &TabletChecksum> {
        self.tablets
            .values()
            .filter(|t| t.status != TabletChecksumStatus::Ok)
    }

    pub fn tablet(&self, tablet_id: &str) -> Option<&TabletChecksum> {
        self.tablets.get(tablet_id)
    }
}

impl fmt::Display for ChecksumReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "checksum of {} tablet(s): {} ok, {} mismatched, {} errored, {} timed out",
            self.tablets.len(),
            self.count(TabletChecksumStatus::Ok),
            self.count(TabletChecksumStatus::Mismatch),
            self.count(TabletChecksumStatus::Error),
            self.count(TabletChecksumStatus::TimedOut),
        )?;
        for tablet in self.failures() {
            write!(
                f,
                "\n  {} tablet {} of {}:",
                tablet.status, tablet.tablet_id, tablet.table_name
            )?;
            for (node, outcome) in &tablet.replicas {
                match outcome {
                    ReplicaOutcome::Checksum { checksum, rows } => {
                        write!(f, " {}={} ({} rows)", node, checksum, rows)?
                    }
                    ReplicaOutcome::TimedOut(reason) | ReplicaOutcome::Failed(reason) => {
                        write!(f, " {}: {}", node, reason)?
                    }
                }
            }
        }
        Ok(())
    }
}

struct ScanResult {
    tablet_id: String,
    node_id: String,
    outcome: ReplicaOutcome,
}

/// Pick the tablets to checksum. Named tables and tablets must exist.
fn resolve_scope<'a>(
    view: &'a ClusterView,
    tables: &BTreeSet<String>,
    tablets: &BTreeSet<String>,
) -> Result<Vec<(&'a Table, &'a Tablet)>> {
    for name in tables {
        if view.table(name).is_none() {
            return Err(Error::NotFound(format!("table {}", name)));
        }
    }

    let scope: Vec<(&Table, &Tablet)> = view
        .tablets()
        .filter(|(table, _)| tables.is_empty() || tables.contains(&table.name))
        .filter(|(_, tablet)| tablets.is_empty() || tablets.contains(&tablet.id))
        .collect();

    for id in tablets {
        if !scope.iter().any(|(_, tablet)| &tablet.id == id) {
            return Err(Error::NotFound(format!("tablet {}", id)));
        }
    }
    Ok(scope)
}

async fn resolve_snapshot(
    scope: &[(&Table, &Tablet)],
    view: &ClusterView,
    proxies: &dyn ProxyFactory,
    oracle: &dyn TimestampOracle,
    options: &ChecksumOptions,
) -> Result<Option<Timestamp>> {
    if !options.use_snapshot {
        return Ok(None);
    }
    if let SnapshotTimestamp::Fixed(ts) = options.snapshot_timestamp {
        return Ok(Some(ts));
    }
    if let Some(ts) = oracle.latest_observed_timestamp() {
        return Ok(Some(ts));
    }

    // Nothing observed yet: ping the servers in scope so their clocks are seen
    let nodes: BTreeSet<&str> = scope
        .iter()
        .flat_map(|(_, tablet)| tablet.replicas.iter().map(|r| r.node_id.as_str()))
        .collect();
    let pings = nodes
        .into_iter()
        .filter_map(|node| view.tablet_servers.get(node))
        .map(|ts| async move { proxies.tablet_server(ts).ping().await });
    for result in join_all(pings).await {
        if let Err(e) = result {
            debug!("Timestamp probe failed: {}", e);
        }
    }

    oracle.latest_observed_timestamp().map(Some).ok_or_else(|| {
        Error::InvalidArgument("no timestamp observed yet; pass a fixed snapshot timestamp".into())
    })
}

/// Checksum every replica of the tablets selected by `tables` / `tablets`
/// (empty = everything in the view).
pub async fn checksum_data(
    view: &ClusterView,
    proxies: &dyn ProxyFactory,
    oracle: &dyn TimestampOracle,
    tables: &BTreeSet<String>,
    tablets: &BTreeSet<String>,
    options: ChecksumOptions,
) -> Result<ChecksumReport> {
    let started = Instant::now();
    if options.timeout.is_zero() {
        return Err(Error::TimedOut(
            "checksum timeout expired before any scan was issued".into(),
        ));
    }
    if options.scan_concurrency == 0 {
        return Err(Error::InvalidArgument(
            "scan concurrency must be positive".into(),
        ));
    }
    let deadline = started + options.timeout;

    let scope = resolve_scope(view, tables, tablets)?;
    let snapshot = resolve_snapshot(&scope, view, proxies, oracle, &options).await?;
    if Instant::now() >= deadline {
        return Err(Error::TimedOut(
            "checksum timeout expired before any scan was issued".into(),
        ));
    }

    match snapshot {
        Some(ts) => info!(
            "Checksumming {} tablet(s) at snapshot {} ({} scan(s) at a time)",
            scope.len(),
            ts,
            options.scan_concurrency
        ),
        None => info!(
            "Checksumming {} tablet(s) without a snapshot ({} scan(s) at a time)",
            scope.len(),
            options.scan_concurrency
        ),
    }

    let mut results: BTreeMap<String, BTreeMap<String, ReplicaOutcome>> = BTreeMap::new();
    let mut pending: Vec<(Arc<dyn TabletServerProxy>, String)> = Vec::new();
    for (_, tablet) in &scope {
        let replicas = results.entry(tablet.id.clone()).or_default();
        for replica in &tablet.replicas {
            match view.tablet_servers.get(&replica.node_id) {
                Some(descriptor) => {
                    pending.push((proxies.tablet_server(descriptor), tablet.id.clone()))
                }
                None => {
                    replicas.insert(
                        replica.node_id.clone(),
                        ReplicaOutcome::Failed("not registered with the master".into()),
                    );
                }
            }
        }
    }

    let total = pending.len();
    let semaphore = Arc::new(Semaphore::new(options.scan_concurrency));
    let (tx, mut rx) = mpsc::channel::<ScanResult>(total.max(1));
    for (proxy, tablet_id) in pending {
        let semaphore = semaphore.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let outcome = scan_replica(proxy.as_ref(), &tablet_id, snapshot, &semaphore, deadline).await;
            // The receiver is gone after a timeout; nothing to report to.
            let _ = tx
                .send(ScanResult {
                    tablet_id,
                    node_id: proxy.node_id().to_string(),
                    outcome,
                })
                .await;
        });
    }
    drop(tx);

    let mut received = 0;
    let mut next_progress = Instant::now() + PROGRESS_INTERVAL;
    while received < total {
        tokio::select! {
            result = rx.recv() => {
                let Some(result) = result else { break };
                received += 1;
                debug!("Tablet {} on {}: {:?}", result.tablet_id, result.node_id, result.outcome);
                results
                    .entry(result.tablet_id)
                    .or_default()
                    .insert(result.node_id, result.outcome);
            }
            _ = tokio::time::sleep_until(deadline) => {
                warn!("Checksum timed out with {}/{} replica scan(s) finished", received, total);
                return Err(Error::TimedOut(format!(
                    "checksum did not finish within {:?}: {}/{} replica scan(s) done",
                    options.timeout, received, total
                )));
            }
            _ = tokio::time::sleep_until(next_progress) => {
                info!("Checksum in progress: {}/{} replica scan(s) finished", received, total);
                next_progress += PROGRESS_INTERVAL;
            }
        }
    }

    let table_of: BTreeMap<&str, &str> = scope
        .iter()
        .map(|(table, tablet)| (tablet.id.as_str(), table.name.as_str()))
        .collect();
    let tablets: BTreeMap<String, TabletChecksum> = results
        .into_iter()
        .map(|(tablet_id, replicas)| {
            let table = table_of.get(tablet_id.as_str()).copied().unwrap_or_default();
            let checksum = TabletChecksum::classify(table, &tablet_id, replicas);
            (tablet_id, checksum)
        })
        .collect();

    let report = ChecksumReport {
        snapshot_timestamp: snapshot,
        tablets,
        elapsed: started.elapsed(),
    };

    if report.is_ok() {
        let rows: u64 = report
            .tablets
            .values()
            .flat_map(|t| t.replicas.values())
            .map(|r| match r {
                ReplicaOutcome::Checksum { rows, .. } => *rows,
                _ => 0,
            })
            .sum();
        info!(
            "Checksum OK for {} tablet(s), {} replica row(s) scanned in {:?}",
            report.tablets.len(),
            rows,
            report.elapsed
        );
        Ok(report)
    } else {
        for tablet in report.failures() {
            warn!("Tablet {} of {}: {}", tablet.tablet_id, tablet.table_name, tablet.status);
        }
        Err(Error::ChecksumFailed(Box::new(report)))
    }
}

async fn scan_replica(
    proxy: &dyn TabletServerProxy,
    tablet_id: &str,
    snapshot: Option<Timestamp>,
    semaphore: &Semaphore,
    deadline: Instant,
) -> ReplicaOutcome {
    let _permit = match semaphore.acquire().await {
        Ok(permit) => permit,
        Err(_) => return ReplicaOutcome::Failed("scan dispatcher closed".into()),
    };
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return ReplicaOutcome::TimedOut("deadline passed before dispatch".into());
    }

    match proxy.checksum_scan(tablet_id, snapshot, remaining).await {
        Ok(response) => ReplicaOutcome::Checksum {
            checksum: response.checksum,
            rows: response.rows,
        },
        Err(Error::TimedOut(reason)) => ReplicaOutcome::TimedOut(reason),
        Err(e) => ReplicaOutcome::Failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ksck::fake::{FakeCluster, DEFAULT_CHECKSUM};

    fn cluster() -> FakeCluster {
        FakeCluster::builder()
            .tablet_servers(&["ts-1", "ts-2", "ts-3"])
            .table("t", 3)
            .tablet("t", "t-1", &["ts-1", "ts-2", "ts-3"])
            .tablet("t", "t-2", &["ts-2", "ts-3", "ts-1"])
            .tablet("t", "t-3", &["ts-3", "ts-1", "ts-2"])
            .table("other", 1)
            .tablet("other", "o-1", &["ts-1"])
            .build()
    }

    fn opts(timeout: Duration, concurrency: usize) -> ChecksumOptions {
        ChecksumOptions::new(timeout, concurrency, false, SnapshotTimestamp::Fixed(0))
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    async fn run(
        cluster: &FakeCluster,
        tables: &[&str],
        tablets: &[&str],
        options: ChecksumOptions,
    ) -> Result<ChecksumReport> {
        let view = cluster.handle().fetch_topology().await.unwrap();
        checksum_data(
            &view,
            cluster.handle().proxies(),
            cluster.handle().oracle(),
            &set(tables),
            &set(tablets),
            options,
        )
        .await
    }

    fn failed_report(result: Result<ChecksumReport>) -> ChecksumReport {
        match result {
            Err(Error::ChecksumFailed(report)) => *report,
            other => panic!("expected checksum failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_all_replicas_agree() {
        let cluster = cluster();
        let report = run(&cluster, &[], &[], opts(Duration::from_secs(5), 16))
            .await
            .unwrap();
        assert_eq!(report.tablets.len(), 4);
        assert_eq!(report.count(TabletChecksumStatus::Ok), 4);
        assert_eq!(report.snapshot_timestamp, None);
        assert_eq!(
            report.tablet("t-2").unwrap().agreed_checksum(),
            Some(DEFAULT_CHECKSUM)
        );
        assert_eq!(cluster.total_scan_calls(), 10);
    }

    #[tokio::test]
    async fn test_repeat_run_is_idempotent() {
        let cluster = cluster();
        let first = run(&cluster, &[], &[], opts(Duration::from_secs(5), 4))
            .await
            .unwrap();
        let second = run(&cluster, &[], &[], opts(Duration::from_secs(5), 4))
            .await
            .unwrap();
        for (id, tablet) in &first.tablets {
            assert_eq!(
                tablet.agreed_checksum(),
                second.tablet(id).unwrap().agreed_checksum()
            );
        }
    }

    #[tokio::test]
    async fn test_mismatch_reported_with_values() {
        let cluster = cluster();
        cluster.server("ts-3").set_checksum("t-1", 42);

        let report = failed_report(run(&cluster, &[], &[], opts(Duration::from_secs(5), 16)).await);
        let tablet = report.tablet("t-1").unwrap();
        assert_eq!(tablet.status, TabletChecksumStatus::Mismatch);
        assert_eq!(
            tablet.replicas["ts-3"],
            ReplicaOutcome::Checksum {
                checksum: 42,
                rows: 10
            }
        );
        // Unrelated tablets are still verified
        assert_eq!(report.count(TabletChecksumStatus::Ok), 3);
        assert!(report.to_string().contains("MISMATCH tablet t-1"));
    }

    #[tokio::test]
    async fn test_scan_error_isolated_to_tablet() {
        let cluster = cluster();
        cluster.server("ts-2").fail_scan("t-2");

        let report = failed_report(run(&cluster, &[], &[], opts(Duration::from_secs(5), 16)).await);
        assert_eq!(report.tablet("t-2").unwrap().status, TabletChecksumStatus::Error);
        assert_eq!(report.count(TabletChecksumStatus::Ok), 3);
    }

    #[tokio::test]
    async fn test_replica_timeout_classified() {
        let cluster = cluster();
        cluster.server("ts-1").time_out_scan("t-3");

        let report = failed_report(run(&cluster, &[], &[], opts(Duration::from_secs(5), 16)).await);
        assert_eq!(
            report.tablet("t-3").unwrap().status,
            TabletChecksumStatus::TimedOut
        );
    }

    #[tokio::test]
    async fn test_zero_timeout_fails_without_scanning() {
        let cluster = cluster();
        let err = run(&cluster, &[], &[], opts(Duration::ZERO, 16))
            .await
            .unwrap_err();
        assert!(err.is_timed_out());
        assert_eq!(cluster.total_scan_calls(), 0);
    }

    #[tokio::test]
    async fn test_global_timeout() {
        let cluster = cluster();
        cluster.server("ts-1").set_scan_delay(Duration::from_secs(30));

        let started = std::time::Instant::now();
        let err = run(&cluster, &[], &[], opts(Duration::from_millis(100), 16))
            .await
            .unwrap_err();
        assert!(err.is_timed_out());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_concurrency_bound_is_global() {
        let cluster = cluster();
        for node in ["ts-1", "ts-2", "ts-3"] {
            cluster.server(node).set_scan_delay(Duration::from_millis(20));
        }

        run(&cluster, &[], &[], opts(Duration::from_secs(10), 2))
            .await
            .unwrap();
        assert_eq!(cluster.max_in_flight_scans(), 2);
        assert_eq!(cluster.total_scan_calls(), 10);
    }

    #[tokio::test]
    async fn test_filters_restrict_scope() {
        let cluster = cluster();
        let report = run(&cluster, &["other"], &[], opts(Duration::from_secs(5), 4))
            .await
            .unwrap();
        assert_eq!(report.tablets.len(), 1);
        assert!(report.tablet("o-1").is_some());

        let report = run(&cluster, &[], &["t-1", "t-3"], opts(Duration::from_secs(5), 4))
            .await
            .unwrap();
        assert_eq!(
            report.tablets.keys().cloned().collect::<Vec<_>>(),
            vec!["t-1".to_string(), "t-3".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unknown_names_not_found() {
        let cluster = cluster();
        let err = run(&cluster, &["nope"], &[], opts(Duration::from_secs(5), 4))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = run(&cluster, &[], &["nope"], opts(Duration::from_secs(5), 4))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        // Tablet exists, but not in the selected table
        let err = run(&cluster, &["other"], &["t-1"], opts(Duration::from_secs(5), 4))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_unreachable_replica_outside_scope_is_skipped() {
        let cluster = FakeCluster::builder()
            .tablet_servers(&["ts-1", "ts-2"])
            .table("a", 1)
            .tablet("a", "a-1", &["ts-1"])
            .table("b", 1)
            .tablet("b", "b-1", &["ts-2"])
            .build();
        cluster.server("ts-2").set_down(true);

        let report = run(&cluster, &["a"], &[], opts(Duration::from_secs(5), 4))
            .await
            .unwrap();
        assert_eq!(report.tablets.len(), 1);
        let report = run(&cluster, &[], &["a-1"], opts(Duration::from_secs(5), 4))
            .await
            .unwrap();
        assert_eq!(report.tablets.len(), 1);

        // In scope, the same node fails its tablet
        let report = failed_report(run(&cluster, &["b"], &[], opts(Duration::from_secs(5), 4)).await);
        assert_eq!(report.tablet("b-1").unwrap().status, TabletChecksumStatus::Error);
    }

    #[tokio::test]
    async fn test_fixed_snapshot_sent_to_every_replica() {
        let cluster = cluster();
        let options = ChecksumOptions::new(
            Duration::from_secs(5),
            8,
            true,
            SnapshotTimestamp::Fixed(1234),
        );
        let report = run(&cluster, &["t"], &[], options).await.unwrap();
        assert_eq!(report.snapshot_timestamp, Some(1234));
        for node in ["ts-1", "ts-2", "ts-3"] {
            assert!(cluster
                .server(node)
                .snapshots()
                .iter()
                .all(|s| *s == Some(1234)));
        }
    }

    #[tokio::test]
    async fn test_latest_observed_snapshot() {
        let cluster = cluster();
        cluster.oracle().set(Some(777));
        let options = ChecksumOptions::new(
            Duration::from_secs(5),
            8,
            true,
            SnapshotTimestamp::LatestObserved,
        );
        let report = run(&cluster, &[], &[], options).await.unwrap();
        assert_eq!(report.snapshot_timestamp, Some(777));
        assert!(cluster.server("ts-2").snapshots().iter().all(|s| *s == Some(777)));
    }

    #[tokio::test]
    async fn test_latest_observed_without_any_timestamp() {
        let cluster = cluster();
        let options = ChecksumOptions::new(
            Duration::from_secs(5),
            8,
            true,
            SnapshotTimestamp::LatestObserved,
        );
        let err = run(&cluster, &[], &[], options).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_tablet_without_replicas_is_error() {
        let cluster = FakeCluster::builder()
            .tablet_servers(&["ts-1"])
            .table("t", 1)
            .tablet("t", "t-1", &[])
            .build();
        let report = failed_report(run(&cluster, &[], &[], opts(Duration::from_secs(5), 4)).await);
        assert_eq!(report.tablet("t-1").unwrap().status, TabletChecksumStatus::Error);
    }
}
