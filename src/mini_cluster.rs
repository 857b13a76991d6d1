//! In-process cluster for tests: one master and N tablet servers on
//! loopback ports.

use crate::client::Client;
use crate::common::{Error, MasterConfig, Result, TabletServerConfig};
use crate::master::{Master, MasterHandle};
use crate::tserver::{TabletServer, TabletServerHandle};
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// How long `start` waits for every tablet server to register
const REGISTRATION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct MiniClusterOptions {
    pub num_tablet_servers: usize,
    pub heartbeat_interval: Duration,
    pub election_delay: Duration,
    pub tserver_unresponsive_timeout: Duration,
    pub default_num_replicas: usize,
}

impl Default for MiniClusterOptions {
    fn default() -> Self {
        Self {
            num_tablet_servers: 3,
            heartbeat_interval: Duration::from_millis(10),
            election_delay: Duration::from_millis(50),
            tserver_unresponsive_timeout: Duration::from_secs(3),
            default_num_replicas: 3,
        }
    }
}

pub struct MiniCluster {
    master: Option<MasterHandle>,
    tservers: Vec<Option<TabletServerHandle>>,
    master_address: String,
}

impl MiniCluster {
    pub async fn start(options: MiniClusterOptions) -> Result<Self> {
        let master = Master::new(MasterConfig {
            bind_addr: ([127, 0, 0, 1], 0).into(),
            default_num_replicas: options.default_num_replicas,
            tserver_unresponsive_timeout_ms: options.tserver_unresponsive_timeout.as_millis()
                as u64,
        })
        .start()
        .await?;
        let master_address = master.address().to_string();

        let mut tservers = Vec::with_capacity(options.num_tablet_servers);
        for i in 0..options.num_tablet_servers {
            let config = TabletServerConfig {
                bind_addr: ([127, 0, 0, 1], 0).into(),
                master_address: master_address.clone(),
                heartbeat_interval_ms: options.heartbeat_interval.as_millis() as u64,
                election_delay_ms: options.election_delay.as_millis() as u64,
            };
            tservers.push(Some(TabletServer::start(format!("ts-{}", i), config).await?));
        }

        let cluster = Self {
            master: Some(master),
            tservers,
            master_address,
        };
        cluster
            .wait_for_tablet_servers(options.num_tablet_servers, REGISTRATION_TIMEOUT)
            .await?;
        info!(
            "Mini cluster up: master {}, {} tablet server(s)",
            cluster.master_address, options.num_tablet_servers
        );
        Ok(cluster)
    }

    pub fn master_address(&self) -> &str {
        &self.master_address
    }

    pub fn num_tablet_servers(&self) -> usize {
        self.tservers.len()
    }

    /// Handle of tablet server `idx`, unless it was shut down
    pub fn tablet_server(&self, idx: usize) -> Option<&TabletServerHandle> {
        self.tservers.get(idx).and_then(|ts| ts.as_ref())
    }

    /// Index of the tablet server with `node_id`
    pub fn tablet_server_index(&self, node_id: &str) -> Option<usize> {
        self.tservers
            .iter()
            .position(|ts| ts.as_ref().is_some_and(|ts| ts.node_id() == node_id))
    }

    pub async fn shutdown_tablet_server(&mut self, idx: usize) -> Result<()> {
        let handle = self
            .tservers
            .get_mut(idx)
            .and_then(|ts| ts.take())
            .ok_or_else(|| Error::NotFound(format!("running tablet server {}", idx)))?;
        handle.shutdown().await;
        Ok(())
    }

    pub async fn connect_client(&self) -> Result<Client> {
        Client::connect(&self.master_address).await
    }

    /// Wait until at least `count` tablet servers have registered
    pub async fn wait_for_tablet_servers(&self, count: usize, timeout: Duration) -> Result<()> {
        let master = self
            .master
            .as_ref()
            .ok_or_else(|| Error::Unavailable {
                node: "master".into(),
                reason: "shut down".into(),
            })?;
        let deadline = Instant::now() + timeout;
        loop {
            let registered = master.catalog().list_tablet_servers()?.len();
            if registered >= count {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::TimedOut(format!(
                    "{}/{} tablet server(s) registered",
                    registered, count
                )));
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub async fn shutdown(mut self) {
        for handle in self.tservers.iter_mut().filter_map(|ts| ts.take()) {
            handle.shutdown().await;
        }
        if let Some(master) = self.master.take() {
            master.shutdown().await;
        }
    }
}
