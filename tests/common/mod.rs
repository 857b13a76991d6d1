//! Shared fixture for cluster tests: a mini cluster, a client and a checker.

#![allow(dead_code)]

use ksck::client::{generate_data_for_row, Client, FlushMode};
use ksck::common::schema::{ColumnSchema, ColumnType, Schema};
use ksck::common::retry_with_backoff;
use ksck::{ClusterView, Ksck, MiniCluster, MiniClusterOptions, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::future::Future;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const TABLE: &str = "ksck-test-table";

/// Long enough for elections and heartbeats to settle
pub const CONVERGENCE_TIMEOUT: Duration = Duration::from_secs(7);

pub fn schema() -> Schema {
    Schema {
        columns: vec![
            ColumnSchema::new("key", ColumnType::Int32),
            ColumnSchema::new("int_val", ColumnType::Int32),
            ColumnSchema::new("string_val", ColumnType::String),
        ],
        num_key_columns: 1,
    }
}

pub struct Fixture {
    pub cluster: MiniCluster,
    pub client: Client,
    pub ksck: Ksck,
}

impl Fixture {
    pub async fn start() -> Self {
        let cluster = MiniCluster::start(MiniClusterOptions::default())
            .await
            .expect("mini cluster starts");
        let client = cluster.connect_client().await.expect("client connects");
        let ksck = Ksck::connect(cluster.master_address(), Duration::from_secs(5))
            .await
            .expect("ksck connects");
        Self {
            cluster,
            client,
            ksck,
        }
    }

    /// Create `name` with 2 split points (3 tablets)
    pub async fn create_table(&self, name: &str, num_replicas: usize) {
        self.client
            .table_creator(name)
            .schema(schema())
            .num_replicas(num_replicas)
            .split_keys(vec![33, 66])
            .create()
            .await
            .expect("table created");
    }

    /// Re-fetch the view and re-check until every tablet is consistent
    pub async fn wait_for_consistency(&self) -> ClusterView {
        let ksck = &self.ksck;
        retry_with_backoff(
            || async move {
                let view = ksck.fetch_table_and_tablet_info().await?;
                ksck.check_tables_consistency(&view).await?;
                Ok(view)
            },
            100,
            Duration::from_millis(20),
            Duration::from_millis(200),
        )
        .await
        .expect("tables become consistent")
    }

    /// Insert `keys` into `table` through one manual-flush session
    pub async fn insert_rows(&self, table: &str, keys: Range<u64>) {
        let table = self.client.open_table(table).await.expect("table opens");
        let mut session = self.client.new_session();
        session.set_flush_mode(FlushMode::ManualFlush);
        let mut rng = StdRng::seed_from_u64(keys.start);
        for key in keys {
            let row = generate_data_for_row(table.schema(), key, &mut rng).expect("row fits");
            session.apply(&table, row).await.expect("row buffered");
        }
        session.flush().await.expect("rows flushed");
    }
}

/// Retry `f` on any error until `timeout` elapses
pub async fn eventually<F, Fut, T>(timeout: Duration, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if tokio::time::Instant::now() >= deadline => return Err(e),
            Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
        }
    }
}

/// Inserts rows into a table until stopped
pub struct BackgroundWriter {
    stop: Arc<AtomicBool>,
    started: Option<oneshot::Receiver<()>>,
    handle: JoinHandle<Result<u64>>,
}

impl BackgroundWriter {
    /// Start writing keys from `first_key` upwards
    pub fn start(client: Client, table: &str, first_key: u64) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let (started_tx, started_rx) = oneshot::channel();
        let table = table.to_string();
        let flag = stop.clone();

        let handle = tokio::spawn(async move {
            let table = client.open_table(&table).await?;
            let mut session = client.new_session();
            session.set_flush_mode(FlushMode::AutoFlushSync);
            let mut rng = StdRng::seed_from_u64(first_key);
            let mut started_tx = Some(started_tx);
            let mut written = 0;
            let mut key = first_key;
            while !flag.load(Ordering::SeqCst) {
                let row = generate_data_for_row(table.schema(), key, &mut rng)?;
                session.apply(&table, row).await?;
                written += 1;
                key += 1;
                if let Some(tx) = started_tx.take() {
                    let _ = tx.send(());
                }
            }
            Ok(written)
        });

        Self {
            stop,
            started: Some(started_rx),
            handle,
        }
    }

    /// Wait for the first successful write
    pub async fn wait_started(&mut self) {
        if let Some(started) = self.started.take() {
            started.await.expect("writer started");
        }
    }

    /// Stop and return the number of rows written
    pub async fn stop(self) -> Result<u64> {
        self.stop.store(true, Ordering::SeqCst);
        self.handle.await.expect("writer task joins")
    }
}
