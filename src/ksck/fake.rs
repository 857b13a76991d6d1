//! In-memory master and tablet servers for exercising the checks

use crate::common::clock::Timestamp;
use crate::common::schema::{ColumnSchema, ColumnType, KeyRange, Schema};
use crate::common::wire::{
    ChecksumResponse, ReplicaDescriptor, ReplicaRole, ReplicaStatus, TableDescriptor,
    TabletDescriptor, TabletServerDescriptor,
};
use crate::common::{Error, Result};
use crate::ksck::cluster::ClusterHandle;
use crate::ksck::rpc::{MasterProxy, ProxyFactory, TabletServerProxy, TimestampOracle};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const DEFAULT_CHECKSUM: u64 = 0xC0FFEE;

fn schema() -> Schema {
    Schema {
        columns: vec![
            ColumnSchema::new("key", ColumnType::Int32),
            ColumnSchema::new("int_val", ColumnType::Int32),
        ],
        num_key_columns: 1,
    }
}

pub struct FakeMaster {
    tables: Vec<TableDescriptor>,
    tablets: Mutex<BTreeMap<String, Vec<TabletDescriptor>>>,
    servers: Vec<TabletServerDescriptor>,
    down: AtomicBool,
}

impl FakeMaster {
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Change the role the master reports for one replica
    pub fn set_role(&self, tablet_id: &str, node_id: &str, role: ReplicaRole) {
        let mut tablets = self.tablets.lock().unwrap();
        for tablet in tablets.values_mut().flatten() {
            if tablet.tablet_id == tablet_id {
                for replica in &mut tablet.replicas {
                    if replica.node_id == node_id {
                        replica.role = role;
                    }
                }
            }
        }
    }

    fn check_up(&self) -> Result<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(Error::Unavailable {
                node: "master".into(),
                reason: "down".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MasterProxy for FakeMaster {
    fn address(&self) -> &str {
        "fake-master"
    }

    async fn ping(&self) -> Result<()> {
        self.check_up()
    }

    async fn list_tables(&self) -> Result<Vec<TableDescriptor>> {
        self.check_up()?;
        Ok(self.tables.clone())
    }

    async fn list_tablets(&self, table: &str) -> Result<Vec<TabletDescriptor>> {
        self.check_up()?;
        self.tablets
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .ok_or_else(|| Error::NotFound(table.to_string()))
    }

    async fn list_tablet_servers(&self) -> Result<Vec<TabletServerDescriptor>> {
        self.check_up()?;
        Ok(self.servers.clone())
    }
}

#[derive(Clone)]
enum ScanBehavior {
    Checksum(u64),
    Fail,
    TimeOut,
}

pub struct FakeTabletServer {
    node_id: String,
    down: AtomicBool,
    statuses: Mutex<HashMap<String, (ReplicaRole, Vec<String>)>>,
    scans: Mutex<HashMap<String, ScanBehavior>>,
    scan_delay: Mutex<Duration>,
    ping_delay: Mutex<Duration>,
    pings_completed: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    scan_calls: AtomicUsize,
    snapshots: Mutex<Vec<Option<Timestamp>>>,
}

impl FakeTabletServer {
    fn new(node_id: &str, in_flight: Arc<AtomicUsize>, max_in_flight: Arc<AtomicUsize>) -> Self {
        Self {
            node_id: node_id.to_string(),
            down: AtomicBool::new(false),
            statuses: Mutex::new(HashMap::new()),
            scans: Mutex::new(HashMap::new()),
            scan_delay: Mutex::new(Duration::ZERO),
            ping_delay: Mutex::new(Duration::ZERO),
            pings_completed: AtomicUsize::new(0),
            in_flight,
            max_in_flight,
            scan_calls: AtomicUsize::new(0),
            snapshots: Mutex::new(Vec::new()),
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn set_status(&self, tablet_id: &str, role: ReplicaRole, configured: &[&str]) {
        self.statuses.lock().unwrap().insert(
            tablet_id.to_string(),
            (role, configured.iter().map(|s| s.to_string()).collect()),
        );
    }

    pub fn set_checksum(&self, tablet_id: &str, checksum: u64) {
        self.scans
            .lock()
            .unwrap()
            .insert(tablet_id.to_string(), ScanBehavior::Checksum(checksum));
    }

    pub fn fail_scan(&self, tablet_id: &str) {
        self.scans
            .lock()
            .unwrap()
            .insert(tablet_id.to_string(), ScanBehavior::Fail);
    }

    pub fn time_out_scan(&self, tablet_id: &str) {
        self.scans
            .lock()
            .unwrap()
            .insert(tablet_id.to_string(), ScanBehavior::TimeOut);
    }

    pub fn set_scan_delay(&self, delay: Duration) {
        *self.scan_delay.lock().unwrap() = delay;
    }

    pub fn set_ping_delay(&self, delay: Duration) {
        *self.ping_delay.lock().unwrap() = delay;
    }

    /// Pings that ran to completion, successful or not
    pub fn pings_completed(&self) -> usize {
        self.pings_completed.load(Ordering::SeqCst)
    }

    pub fn scan_calls(&self) -> usize {
        self.scan_calls.load(Ordering::SeqCst)
    }

    pub fn snapshots(&self) -> Vec<Option<Timestamp>> {
        self.snapshots.lock().unwrap().clone()
    }

    fn check_up(&self) -> Result<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(Error::Unavailable {
                node: self.node_id.clone(),
                reason: "connection refused".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TabletServerProxy for FakeTabletServer {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    async fn ping(&self) -> Result<()> {
        let delay = *self.ping_delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        let result = self.check_up();
        self.pings_completed.fetch_add(1, Ordering::SeqCst);
        result
    }

    async fn replica_status(&self, tablet_id: &str) -> Result<ReplicaStatus> {
        self.check_up()?;
        let statuses = self.statuses.lock().unwrap();
        let (role, configured) = statuses
            .get(tablet_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("tablet {}", tablet_id)))?;
        Ok(ReplicaStatus {
            tablet_id: tablet_id.to_string(),
            node_id: self.node_id.clone(),
            role,
            configured_replicas: configured,
        })
    }

    async fn checksum_scan(
        &self,
        tablet_id: &str,
        snapshot: Option<Timestamp>,
        _timeout: Duration,
    ) -> Result<ChecksumResponse> {
        self.check_up()?;
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        self.snapshots.lock().unwrap().push(snapshot);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.scan_delay.lock().unwrap();
        tokio::time::sleep(delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let behavior = self
            .scans
            .lock()
            .unwrap()
            .get(tablet_id)
            .cloned()
            .unwrap_or(ScanBehavior::Checksum(DEFAULT_CHECKSUM));
        match behavior {
            ScanBehavior::Checksum(checksum) => Ok(ChecksumResponse { checksum, rows: 10 }),
            ScanBehavior::Fail => Err(Error::ScanError(format!("corrupt block in {}", tablet_id))),
            ScanBehavior::TimeOut => Err(Error::TimedOut("scan deadline exceeded".into())),
        }
    }
}

struct FakeFactory {
    servers: BTreeMap<String, Arc<FakeTabletServer>>,
}

impl ProxyFactory for FakeFactory {
    fn tablet_server(&self, server: &TabletServerDescriptor) -> Arc<dyn TabletServerProxy> {
        match self.servers.get(&server.node_id) {
            Some(ts) => ts.clone(),
            None => {
                let ghost = FakeTabletServer::new(
                    &server.node_id,
                    Arc::new(AtomicUsize::new(0)),
                    Arc::new(AtomicUsize::new(0)),
                );
                ghost.set_down(true);
                Arc::new(ghost)
            }
        }
    }
}

#[derive(Default)]
pub struct FakeOracle {
    latest: Mutex<Option<Timestamp>>,
}

impl FakeOracle {
    pub fn set(&self, ts: Option<Timestamp>) {
        *self.latest.lock().unwrap() = ts;
    }
}

impl TimestampOracle for FakeOracle {
    fn latest_observed_timestamp(&self) -> Option<Timestamp> {
        *self.latest.lock().unwrap()
    }
}

pub struct FakeCluster {
    master: Arc<FakeMaster>,
    servers: BTreeMap<String, Arc<FakeTabletServer>>,
    oracle: Arc<FakeOracle>,
    max_in_flight: Arc<AtomicUsize>,
    handle: ClusterHandle,
}

impl FakeCluster {
    pub fn builder() -> FakeClusterBuilder {
        FakeClusterBuilder::default()
    }

    pub fn handle(&self) -> &ClusterHandle {
        &self.handle
    }

    pub fn master(&self) -> &FakeMaster {
        &self.master
    }

    pub fn server(&self, node_id: &str) -> &FakeTabletServer {
        &self.servers[node_id]
    }

    pub fn oracle(&self) -> &FakeOracle {
        &self.oracle
    }

    /// Highest number of checksum scans observed in flight at once
    pub fn max_in_flight_scans(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn total_scan_calls(&self) -> usize {
        self.servers.values().map(|s| s.scan_calls()).sum()
    }
}

#[derive(Default)]
pub struct FakeClusterBuilder {
    servers: Vec<String>,
    tables: Vec<(String, usize)>,
    tablets: Vec<(String, String, Vec<String>)>,
}

impl FakeClusterBuilder {
    pub fn tablet_servers(mut self, nodes: &[&str]) -> Self {
        self.servers = nodes.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn table(mut self, name: &str, num_replicas: usize) -> Self {
        self.tables.push((name.to_string(), num_replicas));
        self
    }

    /// Add a tablet; the first node listed is the leader.
    pub fn tablet(mut self, table: &str, tablet_id: &str, nodes: &[&str]) -> Self {
        self.tablets.push((
            table.to_string(),
            tablet_id.to_string(),
            nodes.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    pub fn build(self) -> FakeCluster {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));

        let servers: BTreeMap<String, Arc<FakeTabletServer>> = self
            .servers
            .iter()
            .map(|id| {
                (
                    id.clone(),
                    Arc::new(FakeTabletServer::new(
                        id,
                        in_flight.clone(),
                        max_in_flight.clone(),
                    )),
                )
            })
            .collect();

        let mut tablets: BTreeMap<String, Vec<TabletDescriptor>> = BTreeMap::new();
        for (table, _) in &self.tables {
            tablets.insert(table.clone(), Vec::new());
        }
        for (i, (table, tablet_id, nodes)) in self.tablets.iter().enumerate() {
            let replicas: Vec<ReplicaDescriptor> = nodes
                .iter()
                .enumerate()
                .map(|(pos, node)| ReplicaDescriptor {
                    node_id: node.clone(),
                    role: if pos == 0 {
                        ReplicaRole::Leader
                    } else {
                        ReplicaRole::Follower
                    },
                })
                .collect();
            for replica in &replicas {
                if let Some(server) = servers.get(&replica.node_id) {
                    let configured: Vec<&str> = nodes.iter().map(|s| s.as_str()).collect();
                    server.set_status(tablet_id, replica.role, &configured);
                }
            }
            tablets.entry(table.clone()).or_default().push(TabletDescriptor {
                tablet_id: tablet_id.clone(),
                table_name: table.clone(),
                key_range: KeyRange {
                    start: Some(i as i64 * 100),
                    end: Some(i as i64 * 100 + 100),
                },
                replicas,
            });
        }

        let master = Arc::new(FakeMaster {
            tables: self
                .tables
                .iter()
                .map(|(name, num_replicas)| TableDescriptor {
                    name: name.clone(),
                    schema: schema(),
                    num_replicas: *num_replicas,
                })
                .collect(),
            tablets: Mutex::new(tablets),
            servers: self
                .servers
                .iter()
                .map(|id| TabletServerDescriptor {
                    node_id: id.clone(),
                    address: format!("fake://{}", id),
                    live: true,
                })
                .collect(),
            down: AtomicBool::new(false),
        });

        let oracle = Arc::new(FakeOracle::default());
        let factory = Arc::new(FakeFactory {
            servers: servers.clone(),
        });
        let handle = ClusterHandle::new(master.clone(), factory, oracle.clone());

        FakeCluster {
            master,
            servers,
            oracle,
            max_in_flight,
            handle,
        }
    }
}
