//! Tablet server: hosts tablet replicas, replicates leader writes and
//! heartbeats to the master.

use crate::common::clock::{HybridClock, Timestamp};
use crate::common::http::RpcClient;
use crate::common::utils::{encode_segment, http_url};
use crate::common::wire::{
    AckResponse, ChecksumRequest, ChecksumResponse, CreateReplicaRequest, HeartbeatRequest,
    ReplicaReport, ReplicaRole, ReplicaStatus, ReplicateRequest, SafeTimeRequest, WriteRequest,
    WriteResponse,
};
use crate::common::{Error, Result, TabletServerConfig};
use crate::tserver::tablet::TabletReplica;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Timeout for replication and heartbeat RPCs
const PEER_RPC_TIMEOUT: Duration = Duration::from_secs(5);

/// How far ahead of the local clock a timestamp from a caller may be
const MAX_CLOCK_SKEW_MICROS: Timestamp = 1_000_000;

/// How long shutdown waits for in-flight requests
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct TabletServer {
    node_id: String,
    address: String,
    master_address: String,
    election_delay: Duration,
    clock: HybridClock,
    tablets: RwLock<HashMap<String, Arc<TabletReplica>>>,
    rpc: RpcClient,
    stopped: AtomicBool,
}

impl TabletServer {
    pub fn new(node_id: String, address: SocketAddr, config: &TabletServerConfig) -> Result<Self> {
        Ok(Self {
            node_id,
            address: address.to_string(),
            master_address: config.master_address.clone(),
            election_delay: config.election_delay(),
            clock: HybridClock::new(),
            tablets: RwLock::new(HashMap::new()),
            rpc: RpcClient::new(PEER_RPC_TIMEOUT)?,
            stopped: AtomicBool::new(false),
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn clock(&self) -> &HybridClock {
        &self.clock
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Reject a caller-supplied timestamp too far ahead of the local clock
    fn check_clock_skew(&self, ts: Timestamp) -> Result<()> {
        let bound = self.clock.now().saturating_add(MAX_CLOCK_SKEW_MICROS);
        if ts > bound {
            return Err(Error::InvalidArgument(format!(
                "timestamp {} is ahead of the clock on {} (max {})",
                ts, self.node_id, bound
            )));
        }
        Ok(())
    }

    pub fn tablet(&self, tablet_id: &str) -> Result<Arc<TabletReplica>> {
        self.tablets
            .read()
            .map_err(|_| Error::Internal("tablet map poisoned".into()))?
            .get(tablet_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("tablet {} on {}", tablet_id, self.node_id)))
    }

    fn replicas(&self) -> Result<Vec<Arc<TabletReplica>>> {
        Ok(self
            .tablets
            .read()
            .map_err(|_| Error::Internal("tablet map poisoned".into()))?
            .values()
            .cloned()
            .collect())
    }

    /// Create a replica; it finishes its election after the election delay.
    pub fn create_replica(self: &Arc<Self>, request: CreateReplicaRequest) -> Result<()> {
        let replica = {
            let mut tablets = self
                .tablets
                .write()
                .map_err(|_| Error::Internal("tablet map poisoned".into()))?;
            if tablets.contains_key(&request.tablet_id) {
                return Err(Error::AlreadyPresent(format!("tablet {}", request.tablet_id)));
            }
            let replica = Arc::new(TabletReplica::new(
                request.tablet_id.clone(),
                request.table_name,
                request.schema,
                request.key_range,
                self.node_id.clone(),
                request.peers,
            ));
            tablets.insert(request.tablet_id.clone(), replica.clone());
            replica
        };
        info!(
            "Created replica of tablet {} ({}) on {}",
            replica.tablet_id(),
            replica.table_name(),
            self.node_id
        );

        let role = if request.leader == self.node_id {
            ReplicaRole::Leader
        } else {
            ReplicaRole::Follower
        };
        let delay = self.election_delay;
        let node_id = self.node_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match replica.set_role(role) {
                Ok(()) => info!("Tablet {} on {} is now {}", replica.tablet_id(), node_id, role),
                Err(e) => warn!("Election for tablet {} failed: {}", replica.tablet_id(), e),
            }
        });
        Ok(())
    }

    pub fn replica_status(&self, tablet_id: &str) -> Result<ReplicaStatus> {
        self.tablet(tablet_id)?.status()
    }

    /// Leader write path: assign a timestamp, apply locally and replicate
    /// synchronously to every follower.
    pub async fn write(&self, tablet_id: &str, request: WriteRequest) -> Result<WriteResponse> {
        let replica = self.tablet(tablet_id)?;
        let _guard = replica.lock_writes().await;
        if replica.role()? != ReplicaRole::Leader {
            return Err(Error::NotLeader(format!(
                "tablet {} on {}",
                tablet_id, self.node_id
            )));
        }
        if let Some(ts) = request.propagated_timestamp {
            self.check_clock_skew(ts)?;
            self.clock.update(ts);
        }
        replica.check_insert(&request.rows)?;

        let timestamp = self.clock.now();
        replica.apply(&request.rows, timestamp)?;

        let body = ReplicateRequest {
            leader: self.node_id.clone(),
            timestamp,
            rows: request.rows,
        };
        let url_tail = format!("/tablets/{}/replicate", encode_segment(tablet_id));
        let sends = replica.followers().map(|peer| {
            let url = format!("{}{}", http_url(&peer.address), url_tail);
            let body = &body;
            async move {
                let result: Result<AckResponse> = self.rpc.post(&peer.node_id, &url, body).await;
                (peer.node_id.as_str(), result)
            }
        });
        for (node, result) in join_all(sends).await {
            if let Err(e) = result {
                warn!("Replicating tablet {} write to {} failed: {}", tablet_id, node, e);
                return Err(e);
            }
        }
        replica.advance_safe_time(timestamp)?;

        debug!(
            "Wrote {} row(s) to tablet {} at {}",
            body.rows.len(),
            tablet_id,
            timestamp
        );
        Ok(WriteResponse { timestamp })
    }

    /// Follower side of replication
    pub fn replicate(&self, tablet_id: &str, request: ReplicateRequest) -> Result<()> {
        let replica = self.tablet(tablet_id)?;
        self.clock.update(request.timestamp);
        replica.apply(&request.rows, request.timestamp)?;
        replica.advance_safe_time(request.timestamp)
    }

    pub fn update_safe_time(&self, tablet_id: &str, request: SafeTimeRequest) -> Result<()> {
        let replica = self.tablet(tablet_id)?;
        self.clock.update(request.safe_time);
        replica.advance_safe_time(request.safe_time)
    }

    /// Checksum one replica. With a snapshot timestamp, the leader first
    /// pushes its clock past it so no later write can land at or below it;
    /// other replicas wait for their safe time to reach it.
    pub async fn checksum(&self, tablet_id: &str, request: ChecksumRequest) -> Result<ChecksumResponse> {
        let replica = self.tablet(tablet_id)?;
        let Some(snapshot) = request.snapshot_timestamp else {
            return replica.checksum(None);
        };

        if replica.role()? == ReplicaRole::Leader {
            self.check_clock_skew(snapshot)?;
            let _guard = replica.lock_writes().await;
            self.clock.update(snapshot);
            return replica.checksum(Some(snapshot));
        }

        replica
            .wait_for_safe_time(snapshot, Duration::from_millis(request.timeout_ms))
            .await?;
        replica.checksum(Some(snapshot))
    }

    fn reports(&self) -> Result<Vec<ReplicaReport>> {
        self.replicas()?
            .iter()
            .map(|replica| {
                Ok(ReplicaReport {
                    tablet_id: replica.tablet_id().to_string(),
                    role: replica.role()?,
                    configured_replicas: replica.configured_replicas(),
                })
            })
            .collect()
    }

    async fn send_heartbeat(&self) -> Result<()> {
        let request = HeartbeatRequest {
            node_id: self.node_id.clone(),
            address: self.address.clone(),
            reports: self.reports()?,
        };
        let url = format!("{}/heartbeat", http_url(&self.master_address));
        let _: AckResponse = self.rpc.post("master", &url, &request).await?;
        Ok(())
    }

    /// For every tablet this server leads, promise followers that no write
    /// at or below the current time is still pending.
    async fn push_safe_times(&self) -> Result<()> {
        let led: Vec<Arc<TabletReplica>> = self
            .replicas()?
            .into_iter()
            .filter(|r| matches!(r.role(), Ok(ReplicaRole::Leader)))
            .collect();

        let pushes = led.iter().map(|replica| async move {
            let _guard = replica.lock_writes().await;
            let safe_time: Timestamp = self.clock.now();
            replica.advance_safe_time(safe_time)?;
            let body = SafeTimeRequest {
                leader: self.node_id.clone(),
                safe_time,
            };
            for peer in replica.followers() {
                let url = format!(
                    "{}/tablets/{}/safe_time",
                    http_url(&peer.address),
                    encode_segment(replica.tablet_id())
                );
                let result: Result<AckResponse> = self.rpc.post(&peer.node_id, &url, &body).await;
                if let Err(e) = result {
                    debug!(
                        "Safe time push for tablet {} to {} failed: {}",
                        replica.tablet_id(),
                        peer.node_id,
                        e
                    );
                }
            }
            Ok::<_, Error>(())
        });
        for result in join_all(pushes).await {
            result?;
        }
        Ok(())
    }

    /// Heartbeat and safe-time loop; runs until `shutdown` flips.
    pub fn spawn_background_tasks(
        self: &Arc<Self>,
        heartbeat_interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let server = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(heartbeat_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.changed() => break,
                }
                if server.is_stopped() {
                    break;
                }
                if let Err(e) = server.send_heartbeat().await {
                    debug!("Heartbeat from {} failed: {}", server.node_id, e);
                }
                if let Err(e) = server.push_safe_times().await {
                    warn!("Safe time push from {} failed: {}", server.node_id, e);
                }
            }
            debug!("Background tasks of {} stopped", server.node_id);
        })
    }
}

impl TabletServer {
    /// Bind, start serving and heartbeating in the background
    pub async fn start(node_id: String, config: TabletServerConfig) -> Result<TabletServerHandle> {
        let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
        let addr = listener.local_addr()?;
        let server = Arc::new(TabletServer::new(node_id, addr, &config)?);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let heartbeat = server.spawn_background_tasks(config.heartbeat_interval(), shutdown_tx.subscribe());
        let router = crate::tserver::http::create_router(server.clone());
        let node_id = server.node_id.clone();
        let http = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.wait_for(|stop| *stop).await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!("Tablet server {} HTTP error: {}", node_id, e);
            }
        });

        info!("Tablet server {} listening on {}", server.node_id, addr);
        info!("  Master: {}", config.master_address);
        Ok(TabletServerHandle {
            server,
            shutdown_tx,
            tasks: vec![heartbeat, http],
        })
    }

    /// Serve until Ctrl-C
    pub async fn serve(node_id: String, config: TabletServerConfig) -> Result<()> {
        let handle = Self::start(node_id, config).await?;
        tokio::signal::ctrl_c().await?;
        info!("Shutting down tablet server {}", handle.node_id());
        handle.shutdown().await;
        Ok(())
    }
}

pub struct TabletServerHandle {
    server: Arc<TabletServer>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl TabletServerHandle {
    pub fn node_id(&self) -> &str {
        self.server.node_id()
    }

    pub fn address(&self) -> &str {
        self.server.address()
    }

    pub fn server(&self) -> &Arc<TabletServer> {
        &self.server
    }

    /// Stop serving: in-flight requests finish, new ones are refused.
    pub async fn shutdown(self) {
        self.server.stop();
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            let abort = task.abort_handle();
            match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Tablet server task ended abnormally: {}", e),
                Err(_) => {
                    warn!("Tablet server task did not stop within {:?}, aborting", SHUTDOWN_GRACE);
                    abort.abort();
                }
            }
        }
        info!("Tablet server {} stopped", self.server.node_id);
    }
}
