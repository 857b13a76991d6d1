//! One tablet replica: an MVCC row store plus its consensus state.
//!
//! Every row keeps all of its versions so a scan can read the state as of
//! any timestamp. A follower only serves a snapshot once its safe time has
//! reached the snapshot timestamp, i.e. once the leader has promised that
//! no write at or below it is still on its way.

use crate::common::clock::Timestamp;
use crate::common::hash::TabletChecksummer;
use crate::common::schema::{KeyRange, Row, Schema};
use crate::common::wire::{ChecksumResponse, PeerInfo, ReplicaRole, ReplicaStatus};
use crate::common::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Clone)]
struct Version {
    timestamp: Timestamp,
    row: Row,
}

#[derive(Debug)]
struct ReplicaState {
    role: ReplicaRole,
    rows: BTreeMap<i64, Vec<Version>>,
    safe_time: Timestamp,
}

pub struct TabletReplica {
    tablet_id: String,
    table_name: String,
    schema: Schema,
    key_range: KeyRange,
    node_id: String,
    peers: Vec<PeerInfo>,
    state: Mutex<ReplicaState>,
    /// Held by the leader while assigning a write timestamp and replicating
    /// it, and while fixing a snapshot.
    write_lock: tokio::sync::Mutex<()>,
    safe_time_advanced: Notify,
}

impl TabletReplica {
    pub fn new(
        tablet_id: String,
        table_name: String,
        schema: Schema,
        key_range: KeyRange,
        node_id: String,
        peers: Vec<PeerInfo>,
    ) -> Self {
        Self {
            tablet_id,
            table_name,
            schema,
            key_range,
            node_id,
            peers,
            state: Mutex::new(ReplicaState {
                role: ReplicaRole::Unknown,
                rows: BTreeMap::new(),
                safe_time: 0,
            }),
            write_lock: tokio::sync::Mutex::new(()),
            safe_time_advanced: Notify::new(),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ReplicaState>> {
        self.state
            .lock()
            .map_err(|_| Error::Internal(format!("tablet {} state poisoned", self.tablet_id)))
    }

    pub fn tablet_id(&self) -> &str {
        &self.tablet_id
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn role(&self) -> Result<ReplicaRole> {
        Ok(self.lock()?.role)
    }

    pub fn set_role(&self, role: ReplicaRole) -> Result<()> {
        self.lock()?.role = role;
        Ok(())
    }

    /// Peers other than this replica
    pub fn followers(&self) -> impl Iterator<Item = &PeerInfo> {
        self.peers.iter().filter(|p| p.node_id != self.node_id)
    }

    pub fn configured_replicas(&self) -> Vec<String> {
        self.peers.iter().map(|p| p.node_id.clone()).collect()
    }

    pub fn status(&self) -> Result<ReplicaStatus> {
        Ok(ReplicaStatus {
            tablet_id: self.tablet_id.clone(),
            node_id: self.node_id.clone(),
            role: self.role()?,
            configured_replicas: self.configured_replicas(),
        })
    }

    pub async fn lock_writes(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    /// Reject rows that do not fit the schema, fall outside this tablet, or
    /// collide with an existing key.
    pub fn check_insert(&self, rows: &[Row]) -> Result<()> {
        let state = self.lock()?;
        let mut batch = BTreeSet::new();
        for row in rows {
            self.schema.check_row(row)?;
            let key = row.key()?;
            if !self.key_range.contains(key) {
                return Err(Error::InvalidArgument(format!(
                    "key {} outside tablet {} range {}",
                    key, self.tablet_id, self.key_range
                )));
            }
            if state.rows.contains_key(&key) || !batch.insert(key) {
                return Err(Error::AlreadyPresent(format!("key {}", key)));
            }
        }
        Ok(())
    }

    /// Apply rows at `timestamp` without any checks
    pub fn apply(&self, rows: &[Row], timestamp: Timestamp) -> Result<()> {
        let mut state = self.lock()?;
        for row in rows {
            let key = row.key()?;
            state.rows.entry(key).or_default().push(Version {
                timestamp,
                row: row.clone(),
            });
        }
        Ok(())
    }

    pub fn safe_time(&self) -> Result<Timestamp> {
        Ok(self.lock()?.safe_time)
    }

    /// Raise the safe time; it never moves backwards.
    pub fn advance_safe_time(&self, timestamp: Timestamp) -> Result<()> {
        let advanced = {
            let mut state = self.lock()?;
            if timestamp > state.safe_time {
                state.safe_time = timestamp;
                true
            } else {
                false
            }
        };
        if advanced {
            self.safe_time_advanced.notify_waiters();
        }
        Ok(())
    }

    /// Wait until the safe time reaches `timestamp`, for at most `timeout`
    pub async fn wait_for_safe_time(&self, timestamp: Timestamp, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let advanced = self.safe_time_advanced.notified();
            let safe_time = self.safe_time()?;
            if safe_time >= timestamp {
                return Ok(());
            }
            if tokio::time::timeout_at(deadline, advanced).await.is_err() {
                return Err(Error::TimedOut(format!(
                    "tablet {} safe time {} did not reach snapshot {} within {:?}",
                    self.tablet_id, safe_time, timestamp, timeout
                )));
            }
        }
    }

    /// Checksum the latest version of every row, or the version visible at
    /// `snapshot` when given.
    pub fn checksum(&self, snapshot: Option<Timestamp>) -> Result<ChecksumResponse> {
        let state = self.lock()?;
        let mut checksummer = TabletChecksummer::new();
        for versions in state.rows.values() {
            let visible = match snapshot {
                Some(ts) => versions.iter().rev().find(|v| v.timestamp <= ts),
                None => versions.last(),
            };
            if let Some(version) = visible {
                checksummer.add(&version.row)?;
            }
        }
        Ok(ChecksumResponse {
            checksum: checksummer.checksum(),
            rows: checksummer.rows(),
        })
    }

    pub fn num_rows(&self) -> Result<usize> {
        Ok(self.lock()?.rows.len())
    }
}
