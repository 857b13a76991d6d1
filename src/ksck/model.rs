//! Point-in-time view of the cluster: tables, tablets and replica placement.
//!
//! A `ClusterView` is never refreshed in place. Callers fetch a new one
//! before every check that depends on current topology.

use crate::common::schema::{KeyRange, Schema};
use crate::common::wire::{ReplicaRole, TabletServerDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Last-known health of a replica's node, as seen by the master
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicaHealth {
    Online,
    Unreachable,
}

impl fmt::Display for ReplicaHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicaHealth::Online => write!(f, "ONLINE"),
            ReplicaHealth::Unreachable => write!(f, "UNREACHABLE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replica {
    /// Serving node hosting this replica (key into `ClusterView::tablet_servers`)
    pub node_id: String,
    pub role: ReplicaRole,
    pub health: ReplicaHealth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tablet {
    pub id: String,
    pub table_name: String,
    pub key_range: KeyRange,
    pub replicas: Vec<Replica>,
}

impl Tablet {
    /// Node ids of the replicas reporting LEADER
    pub fn leaders(&self) -> Vec<&str> {
        self.replicas
            .iter()
            .filter(|r| r.role == ReplicaRole::Leader)
            .map(|r| r.node_id.as_str())
            .collect()
    }

    pub fn replica_nodes(&self) -> BTreeSet<&str> {
        self.replicas.iter().map(|r| r.node_id.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub schema: Schema,
    /// Configured replication factor
    pub num_replicas: usize,
    /// Ordered by key range start
    pub tablets: Vec<Tablet>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterView {
    pub tables: Vec<Table>,
    pub tablet_servers: BTreeMap<String, TabletServerDescriptor>,
}

impl ClusterView {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn tablets(&self) -> impl Iterator<Item = (&Table, &Tablet)> {
        self.tables
            .iter()
            .flat_map(|table| table.tablets.iter().map(move |tablet| (table, tablet)))
    }

    pub fn tablet(&self, tablet_id: &str) -> Option<(&Table, &Tablet)> {
        self.tablets().find(|(_, tablet)| tablet.id == tablet_id)
    }

    /// Every node the view knows about: registered tablet servers plus any
    /// node referenced by a replica.
    pub fn referenced_nodes(&self) -> BTreeSet<String> {
        let mut nodes: BTreeSet<String> = self.tablet_servers.keys().cloned().collect();
        for (_, tablet) in self.tablets() {
            for replica in &tablet.replicas {
                nodes.insert(replica.node_id.clone());
            }
        }
        nodes
    }

    pub fn num_tablets(&self) -> usize {
        self.tables.iter().map(|t| t.tablets.len()).sum()
    }
}
