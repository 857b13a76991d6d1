//! HTTP implementations of the ksck RPC traits

use crate::common::clock::{ObservedTimestamp, Timestamp};
use crate::common::http::RpcClient;
use crate::common::utils::{encode_segment, http_url};
use crate::common::wire::{
    ChecksumRequest, ChecksumResponse, PingResponse, ReplicaStatus, TableDescriptor,
    TabletDescriptor, TabletServerDescriptor,
};
use crate::common::Result;
use crate::ksck::cluster::ClusterHandle;
use crate::ksck::rpc::{MasterProxy, ProxyFactory, TabletServerProxy, TimestampOracle};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Slack added on top of a scan's server-side wait so the server's own
/// TimedOut answer arrives before the HTTP request gives up.
const SCAN_RPC_SLACK: Duration = Duration::from_secs(1);

/// Everything needed to talk to a live cluster, sharing one RPC client so
/// every response feeds the same observed timestamp.
pub struct RemoteCluster {
    rpc: RpcClient,
    master_address: String,
}

impl RemoteCluster {
    pub fn new(master_address: &str, rpc_timeout: Duration) -> Result<Self> {
        Ok(Self {
            rpc: RpcClient::new(rpc_timeout)?,
            master_address: master_address.to_string(),
        })
    }

    pub fn into_handle(self) -> ClusterHandle {
        let master = Arc::new(RemoteMaster {
            base: http_url(&self.master_address),
            address: self.master_address,
            rpc: self.rpc.clone(),
        });
        let factory = Arc::new(RemoteProxyFactory {
            rpc: self.rpc.clone(),
        });
        let oracle = Arc::new(RemoteOracle {
            observed: self.rpc.observed().clone(),
        });
        ClusterHandle::new(master, factory, oracle)
    }
}

pub struct RemoteMaster {
    address: String,
    base: String,
    rpc: RpcClient,
}

#[async_trait]
impl MasterProxy for RemoteMaster {
    fn address(&self) -> &str {
        &self.address
    }

    async fn ping(&self) -> Result<()> {
        let _: PingResponse = self
            .rpc
            .get(&self.address, &format!("{}/ping", self.base))
            .await?;
        Ok(())
    }

    async fn list_tables(&self) -> Result<Vec<TableDescriptor>> {
        self.rpc
            .get(&self.address, &format!("{}/tables", self.base))
            .await
    }

    async fn list_tablets(&self, table: &str) -> Result<Vec<TabletDescriptor>> {
        let url = format!("{}/tables/{}/tablets", self.base, encode_segment(table));
        self.rpc.get(&self.address, &url).await
    }

    async fn list_tablet_servers(&self) -> Result<Vec<TabletServerDescriptor>> {
        self.rpc
            .get(&self.address, &format!("{}/tablet-servers", self.base))
            .await
    }
}

pub struct RemoteTabletServer {
    node_id: String,
    base: String,
    rpc: RpcClient,
}

impl RemoteTabletServer {
    fn tablet_url(&self, tablet_id: &str, op: &str) -> String {
        format!("{}/tablets/{}/{}", self.base, encode_segment(tablet_id), op)
    }
}

#[async_trait]
impl TabletServerProxy for RemoteTabletServer {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    async fn ping(&self) -> Result<()> {
        let _: PingResponse = self
            .rpc
            .get(&self.node_id, &format!("{}/ping", self.base))
            .await?;
        Ok(())
    }

    async fn replica_status(&self, tablet_id: &str) -> Result<ReplicaStatus> {
        self.rpc
            .get(&self.node_id, &self.tablet_url(tablet_id, "status"))
            .await
    }

    async fn checksum_scan(
        &self,
        tablet_id: &str,
        snapshot: Option<Timestamp>,
        timeout: Duration,
    ) -> Result<ChecksumResponse> {
        let request = ChecksumRequest {
            snapshot_timestamp: snapshot,
            timeout_ms: timeout.as_millis() as u64,
        };
        self.rpc
            .post_with_timeout(
                &self.node_id,
                &self.tablet_url(tablet_id, "checksum"),
                &request,
                timeout + SCAN_RPC_SLACK,
            )
            .await
    }
}

pub struct RemoteProxyFactory {
    rpc: RpcClient,
}

impl ProxyFactory for RemoteProxyFactory {
    fn tablet_server(&self, server: &TabletServerDescriptor) -> Arc<dyn TabletServerProxy> {
        Arc::new(RemoteTabletServer {
            node_id: server.node_id.clone(),
            base: http_url(&server.address),
            rpc: self.rpc.clone(),
        })
    }
}

struct RemoteOracle {
    observed: Arc<ObservedTimestamp>,
}

impl TimestampOracle for RemoteOracle {
    fn latest_observed_timestamp(&self) -> Option<Timestamp> {
        self.observed.latest()
    }
}
