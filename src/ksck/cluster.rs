//! Cluster discovery: connect to the master and fetch a `ClusterView`

use crate::common::wire::{TableDescriptor, TabletDescriptor};
use crate::common::{Error, Result};
use crate::ksck::model::{ClusterView, Replica, ReplicaHealth, Table, Tablet};
use crate::ksck::remote::RemoteCluster;
use crate::ksck::rpc::{MasterProxy, ProxyFactory, TimestampOracle};
use futures_util::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Handle on a cluster: the master connection plus the means to reach
/// tablet servers and read the checker's own clock.
#[derive(Clone)]
pub struct ClusterHandle {
    master: Arc<dyn MasterProxy>,
    proxies: Arc<dyn ProxyFactory>,
    oracle: Arc<dyn TimestampOracle>,
}

impl ClusterHandle {
    pub fn new(
        master: Arc<dyn MasterProxy>,
        proxies: Arc<dyn ProxyFactory>,
        oracle: Arc<dyn TimestampOracle>,
    ) -> Self {
        Self {
            master,
            proxies,
            oracle,
        }
    }

    /// Connect to the master at `master_address` over HTTP
    pub async fn connect(master_address: &str, rpc_timeout: Duration) -> Result<Self> {
        let handle = RemoteCluster::new(master_address, rpc_timeout)?.into_handle();
        handle.master.ping().await.map_err(|e| {
            Error::ConnectionFailed(format!("master {}: {}", master_address, e))
        })?;
        info!("Connected to master {}", master_address);
        Ok(handle)
    }

    pub fn master(&self) -> &dyn MasterProxy {
        self.master.as_ref()
    }

    pub fn proxies(&self) -> &dyn ProxyFactory {
        self.proxies.as_ref()
    }

    pub fn oracle(&self) -> &dyn TimestampOracle {
        self.oracle.as_ref()
    }

    /// Enumerate tablet servers, tables, tablets and replicas.
    ///
    /// A table dropped between listing and fetching its tablets is skipped;
    /// tablets with no known replicas are kept with an empty replica set.
    pub async fn fetch_topology(&self) -> Result<ClusterView> {
        let tablet_servers: BTreeMap<_, _> = self
            .master
            .list_tablet_servers()
            .await?
            .into_iter()
            .map(|ts| (ts.node_id.clone(), ts))
            .collect();

        let descriptors = self.master.list_tables().await?;
        let tablet_lists =
            join_all(descriptors.iter().map(|t| self.master.list_tablets(&t.name))).await;

        let mut tables = Vec::with_capacity(descriptors.len());
        for (descriptor, tablets) in descriptors.into_iter().zip(tablet_lists) {
            match tablets {
                Ok(tablets) => tables.push(build_table(descriptor, tablets, &tablet_servers)),
                Err(Error::NotFound(_)) => {
                    warn!("Table {} disappeared during fetch, skipping", descriptor.name);
                }
                Err(e) => return Err(e),
            }
        }

        let view = ClusterView {
            tables,
            tablet_servers,
        };
        info!(
            "Fetched {} table(s), {} tablet(s), {} tablet server(s)",
            view.tables.len(),
            view.num_tablets(),
            view.tablet_servers.len()
        );
        Ok(view)
    }
}

fn build_table(
    descriptor: TableDescriptor,
    tablets: Vec<TabletDescriptor>,
    servers: &BTreeMap<String, crate::common::wire::TabletServerDescriptor>,
) -> Table {
    let mut tablets: Vec<Tablet> = tablets
        .into_iter()
        .map(|t| {
            if t.replicas.is_empty() {
                warn!("Tablet {} of {} has no known replicas", t.tablet_id, t.table_name);
            }
            let replicas = t
                .replicas
                .into_iter()
                .map(|r| {
                    let health = match servers.get(&r.node_id) {
                        Some(ts) if ts.live => ReplicaHealth::Online,
                        _ => ReplicaHealth::Unreachable,
                    };
                    Replica {
                        node_id: r.node_id,
                        role: r.role,
                        health,
                    }
                })
                .collect();
            Tablet {
                id: t.tablet_id,
                table_name: t.table_name,
                key_range: t.key_range,
                replicas,
            }
        })
        .collect();
    // Unbounded start (None) sorts first
    tablets.sort_by_key(|t| t.key_range.start);

    debug!("Table {}: {} tablet(s)", descriptor.name, tablets.len());
    Table {
        name: descriptor.name,
        schema: descriptor.schema,
        num_replicas: descriptor.num_replicas,
        tablets,
    }
}
