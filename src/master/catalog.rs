//! Master catalog: tables, tablets, replica placement and the tablet server
//! registry fed by heartbeats.

use crate::common::hash::select_replicas;
use crate::common::schema::KeyRange;
use crate::common::wire::{
    CreateTableRequest, HeartbeatRequest, PeerInfo, ReplicaDescriptor, ReplicaRole,
    TableDescriptor, TabletDescriptor, TabletServerDescriptor,
};
use crate::common::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// A tablet the master has decided to create, with its replica placement
#[derive(Debug, Clone)]
pub struct TabletPlan {
    pub tablet_id: String,
    pub key_range: KeyRange,
    pub peers: Vec<PeerInfo>,
    /// First placed replica; expected to win the first election
    pub leader: String,
}

#[derive(Debug, Clone)]
pub struct TablePlan {
    pub table: TableDescriptor,
    pub tablets: Vec<TabletPlan>,
}

#[derive(Debug)]
struct TabletEntry {
    table_name: String,
    key_range: KeyRange,
    replicas: Vec<String>,
}

#[derive(Debug)]
struct TabletServerEntry {
    address: String,
    last_heartbeat: Instant,
    roles: HashMap<String, ReplicaRole>,
}

#[derive(Debug, Default)]
struct CatalogState {
    tables: BTreeMap<String, TableDescriptor>,
    /// Tablet ids of each table, ordered by key range
    table_tablets: BTreeMap<String, Vec<String>>,
    tablets: HashMap<String, TabletEntry>,
    tservers: BTreeMap<String, TabletServerEntry>,
}

pub struct Catalog {
    state: Mutex<CatalogState>,
    default_num_replicas: usize,
    unresponsive_timeout: Duration,
}

impl Catalog {
    pub fn new(default_num_replicas: usize, unresponsive_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(CatalogState::default()),
            default_num_replicas,
            unresponsive_timeout,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, CatalogState>> {
        self.state
            .lock()
            .map_err(|_| Error::Internal("catalog lock poisoned".into()))
    }

    /// Record a heartbeat; the first one registers the server.
    pub fn heartbeat(&self, request: HeartbeatRequest) -> Result<()> {
        let mut state = self.lock()?;
        let roles = request
            .reports
            .into_iter()
            .map(|r| (r.tablet_id, r.role))
            .collect();
        match state.tservers.get_mut(&request.node_id) {
            Some(entry) => {
                entry.address = request.address;
                entry.last_heartbeat = Instant::now();
                entry.roles = roles;
            }
            None => {
                info!(
                    "Registered tablet server {} at {}",
                    request.node_id, request.address
                );
                state.tservers.insert(
                    request.node_id,
                    TabletServerEntry {
                        address: request.address,
                        last_heartbeat: Instant::now(),
                        roles,
                    },
                );
            }
        }
        Ok(())
    }

    pub fn list_tablet_servers(&self) -> Result<Vec<TabletServerDescriptor>> {
        let state = self.lock()?;
        Ok(state
            .tservers
            .iter()
            .map(|(node_id, entry)| TabletServerDescriptor {
                node_id: node_id.clone(),
                address: entry.address.clone(),
                live: entry.last_heartbeat.elapsed() < self.unresponsive_timeout,
            })
            .collect())
    }

    pub fn list_tables(&self) -> Result<Vec<TableDescriptor>> {
        Ok(self.lock()?.tables.values().cloned().collect())
    }

    pub fn table(&self, name: &str) -> Result<TableDescriptor> {
        self.lock()?
            .tables
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("table {}", name)))
    }

    /// Tablets of `table` with replica roles as last reported by each server
    pub fn list_tablets(&self, table: &str) -> Result<Vec<TabletDescriptor>> {
        let state = self.lock()?;
        let ids = state
            .table_tablets
            .get(table)
            .ok_or_else(|| Error::NotFound(format!("table {}", table)))?;

        let mut tablets = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(entry) = state.tablets.get(id) else {
                continue;
            };
            let replicas = entry
                .replicas
                .iter()
                .map(|node_id| ReplicaDescriptor {
                    node_id: node_id.clone(),
                    role: state
                        .tservers
                        .get(node_id)
                        .and_then(|ts| ts.roles.get(id))
                        .copied()
                        .unwrap_or(ReplicaRole::Unknown),
                })
                .collect();
            tablets.push(TabletDescriptor {
                tablet_id: id.clone(),
                table_name: entry.table_name.clone(),
                key_range: entry.key_range,
                replicas,
            });
        }
        Ok(tablets)
    }

    /// Validate a create request and place its tablets on live servers.
    ///
    /// Nothing is recorded until `commit_table`.
    pub fn plan_table(&self, request: &CreateTableRequest) -> Result<TablePlan> {
        if request.name.is_empty() {
            return Err(Error::InvalidArgument("table name must not be empty".into()));
        }
        request.schema.validate()?;
        let num_replicas = request.num_replicas.unwrap_or(self.default_num_replicas);
        if num_replicas == 0 {
            return Err(Error::InvalidArgument(
                "replication factor must be positive".into(),
            ));
        }

        let state = self.lock()?;
        if state.tables.contains_key(&request.name) {
            return Err(Error::AlreadyPresent(format!("table {}", request.name)));
        }

        let live: Vec<(&String, &TabletServerEntry)> = state
            .tservers
            .iter()
            .filter(|(_, ts)| ts.last_heartbeat.elapsed() < self.unresponsive_timeout)
            .collect();
        if live.len() < num_replicas {
            return Err(Error::InvalidArgument(format!(
                "replication factor {} exceeds {} live tablet server(s)",
                num_replicas,
                live.len()
            )));
        }

        let mut load: HashMap<String, usize> = live.iter().map(|(id, _)| ((*id).clone(), 0)).collect();
        for entry in state.tablets.values() {
            for node in &entry.replicas {
                if let Some(count) = load.get_mut(node) {
                    *count += 1;
                }
            }
        }
        let addresses: HashMap<&str, &str> = live
            .iter()
            .map(|(id, ts)| (id.as_str(), ts.address.as_str()))
            .collect();

        let ranges = KeyRange::partition(&request.split_keys)?;
        let mut tablets = Vec::with_capacity(ranges.len());
        for key_range in ranges {
            let tablet_id = uuid::Uuid::new_v4().simple().to_string();
            let mut candidates: Vec<(String, usize)> =
                load.iter().map(|(id, n)| (id.clone(), *n)).collect();
            candidates.sort();
            let nodes = select_replicas(&tablet_id, &candidates, num_replicas);
            for node in &nodes {
                if let Some(count) = load.get_mut(node) {
                    *count += 1;
                }
            }

            let peers: Vec<PeerInfo> = nodes
                .iter()
                .map(|node| PeerInfo {
                    node_id: node.clone(),
                    address: addresses.get(node.as_str()).copied().unwrap_or_default().to_string(),
                })
                .collect();
            debug!("Tablet {} [{}] placed on {:?}", tablet_id, key_range, nodes);
            tablets.push(TabletPlan {
                leader: nodes[0].clone(),
                tablet_id,
                key_range,
                peers,
            });
        }

        Ok(TablePlan {
            table: TableDescriptor {
                name: request.name.clone(),
                schema: request.schema.clone(),
                num_replicas,
            },
            tablets,
        })
    }

    pub fn commit_table(&self, plan: &TablePlan) -> Result<()> {
        let mut state = self.lock()?;
        if state.tables.contains_key(&plan.table.name) {
            return Err(Error::AlreadyPresent(format!("table {}", plan.table.name)));
        }
        for tablet in &plan.tablets {
            state.tablets.insert(
                tablet.tablet_id.clone(),
                TabletEntry {
                    table_name: plan.table.name.clone(),
                    key_range: tablet.key_range,
                    replicas: tablet.peers.iter().map(|p| p.node_id.clone()).collect(),
                },
            );
        }
        state.table_tablets.insert(
            plan.table.name.clone(),
            plan.tablets.iter().map(|t| t.tablet_id.clone()).collect(),
        );
        state.tables.insert(plan.table.name.clone(), plan.table.clone());
        info!(
            "Created table {} with {} tablet(s), {} replica(s) each",
            plan.table.name,
            plan.tablets.len(),
            plan.table.num_replicas
        );
        Ok(())
    }
}
