//! Master server

use crate::common::http::RpcClient;
use crate::common::{MasterConfig, Result};
use crate::master::catalog::Catalog;
use crate::master::http::{create_router, MasterState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Timeout for RPCs the master issues to tablet servers
const TSERVER_RPC_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Master {
    config: MasterConfig,
}

impl Master {
    pub fn new(config: MasterConfig) -> Self {
        Self { config }
    }

    /// Bind and serve in the background
    pub async fn start(self) -> Result<MasterHandle> {
        let catalog = Arc::new(Catalog::new(
            self.config.default_num_replicas,
            Duration::from_millis(self.config.tserver_unresponsive_timeout_ms),
        ));
        let state = MasterState {
            catalog: catalog.clone(),
            rpc: RpcClient::new(TSERVER_RPC_TIMEOUT)?,
            create_lock: Arc::new(tokio::sync::Mutex::new(())),
        };

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let router = create_router(state);
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.wait_for(|stop| *stop).await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!("Master HTTP server error: {}", e);
            }
        });

        tracing::info!("Master listening on {}", addr);
        tracing::info!("  Default replicas: {}", self.config.default_num_replicas);
        Ok(MasterHandle {
            addr,
            catalog,
            shutdown_tx,
            task,
        })
    }

    /// Serve until Ctrl-C
    pub async fn serve(self) -> Result<()> {
        let handle = self.start().await?;
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutting down master");
        handle.shutdown().await;
        Ok(())
    }
}

pub struct MasterHandle {
    addr: SocketAddr,
    catalog: Arc<Catalog>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MasterHandle {
    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!("Master task ended abnormally: {}", e);
        }
    }
}
