//! Liveness checks for the master and the tablet servers

use crate::common::{Error, Result};
use crate::ksck::model::ClusterView;
use crate::ksck::rpc::{MasterProxy, ProxyFactory};
use futures_util::stream::{self, StreamExt};
use tracing::{info, warn};

/// Probe concurrency used when no explicit bound is configured
pub const DEFAULT_PROBE_CONCURRENCY: usize = 32;

/// Single ping to the master; no retries.
pub async fn check_master_running(master: &dyn MasterProxy) -> Result<()> {
    info!("Connecting to the master at {}", master.address());
    match master.ping().await {
        Ok(()) => {
            info!("Master {} is alive", master.address());
            Ok(())
        }
        Err(e) => {
            warn!("Master {} is unavailable: {}", master.address(), e);
            Err(Error::Unavailable {
                node: master.address().to_string(),
                reason: e.to_string(),
            })
        }
    }
}

/// Ping every tablet server the view references, `concurrency` at a time.
///
/// All probes run to completion; the first failure observed is returned.
pub async fn check_tablet_servers_running(
    view: &ClusterView,
    proxies: &dyn ProxyFactory,
    concurrency: usize,
) -> Result<()> {
    let nodes = view.referenced_nodes();
    info!("Probing {} tablet server(s)", nodes.len());

    let outcomes: Vec<(String, Result<()>)> = stream::iter(nodes)
        .map(|node_id| async move {
            let result = match view.tablet_servers.get(&node_id) {
                Some(descriptor) => proxies.tablet_server(descriptor).ping().await,
                None => Err(Error::Unavailable {
                    node: node_id.clone(),
                    reason: "hosts replicas but is not registered with the master".into(),
                }),
            };
            (node_id, result)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut first_failure = None;
    let mut alive = 0;
    for (node_id, result) in outcomes {
        match result {
            Ok(()) => alive += 1,
            Err(e) => {
                warn!("Tablet server {} is unavailable: {}", node_id, e);
                if first_failure.is_none() {
                    first_failure = Some(Error::Unavailable {
                        node: node_id,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    match first_failure {
        Some(e) => Err(e),
        None => {
            info!("All {} tablet server(s) are alive", alive);
            Ok(())
        }
    }
}
