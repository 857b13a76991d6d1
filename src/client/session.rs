//! Write sessions

use crate::client::{Client, ClientTable};
use crate::common::schema::Row;
use crate::common::utils::encode_segment;
use crate::common::wire::{WriteRequest, WriteResponse};
use crate::common::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(10);
const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(10);
const MAX_RETRY_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushMode {
    /// Every `apply` is written before it returns
    AutoFlushSync,
    /// Rows are buffered until `flush`
    ManualFlush,
}

pub struct Session {
    client: Client,
    mode: FlushMode,
    timeout: Duration,
    /// Buffered rows keyed by (table, tablet id)
    pending: BTreeMap<(String, String), Vec<Row>>,
    /// tablet id -> (leader node id, leader base url)
    leaders: HashMap<String, (String, String)>,
}

impl Session {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            mode: FlushMode::AutoFlushSync,
            timeout: DEFAULT_SESSION_TIMEOUT,
            pending: BTreeMap::new(),
            leaders: HashMap::new(),
        }
    }

    pub fn set_flush_mode(&mut self, mode: FlushMode) {
        self.mode = mode;
    }

    /// Bound on how long one flush keeps retrying a tablet
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn has_pending_operations(&self) -> bool {
        !self.pending.is_empty()
    }

    pub async fn apply(&mut self, table: &ClientTable, row: Row) -> Result<()> {
        table.schema().check_row(&row)?;
        let tablet = table.tablet_for_key(row.key()?)?;
        self.pending
            .entry((table.name().to_string(), tablet.tablet_id.clone()))
            .or_default()
            .push(row);
        match self.mode {
            FlushMode::AutoFlushSync => self.flush().await,
            FlushMode::ManualFlush => Ok(()),
        }
    }

    /// Write every buffered row. Rows of a tablet that fails stay buffered.
    pub async fn flush(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.pending);
        let mut result = Ok(());
        for ((table, tablet_id), rows) in pending {
            if result.is_err() {
                self.pending.insert((table, tablet_id), rows);
                continue;
            }
            if let Err(e) = self.write_tablet(&table, &tablet_id, &rows).await {
                self.pending.insert((table, tablet_id), rows);
                result = Err(e);
            }
        }
        result
    }

    /// Write to the tablet's leader, following leadership changes until the
    /// session timeout.
    async fn write_tablet(&mut self, table: &str, tablet_id: &str, rows: &[Row]) -> Result<()> {
        let deadline = Instant::now() + self.timeout;
        let mut delay = INITIAL_RETRY_DELAY;
        loop {
            let err = match self.try_write(table, tablet_id, rows).await {
                Ok(response) => {
                    debug!(
                        "Wrote {} row(s) to tablet {} at {}",
                        rows.len(),
                        tablet_id,
                        response.timestamp
                    );
                    return Ok(());
                }
                Err(e) => e,
            };
            if !err.is_retryable() {
                return Err(err);
            }
            self.leaders.remove(tablet_id);
            if Instant::now() + delay >= deadline {
                return Err(Error::TimedOut(format!(
                    "writing to tablet {} of {}: {}",
                    tablet_id, table, err
                )));
            }
            debug!("Retrying write to tablet {}: {}", tablet_id, err);
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(MAX_RETRY_DELAY);
        }
    }

    async fn try_write(&mut self, table: &str, tablet_id: &str, rows: &[Row]) -> Result<WriteResponse> {
        let (node, base) = match self.leaders.get(tablet_id) {
            Some(leader) => leader.clone(),
            None => {
                let leader = self.client.find_leader(table, tablet_id).await?;
                self.leaders.insert(tablet_id.to_string(), leader.clone());
                leader
            }
        };
        let request = WriteRequest {
            rows: rows.to_vec(),
            propagated_timestamp: self.client.latest_observed_timestamp(),
        };
        let url = format!("{}/tablets/{}/write", base, encode_segment(tablet_id));
        self.client.rpc().post(&node, &url, &request).await
    }
}
