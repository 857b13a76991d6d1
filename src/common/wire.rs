//! RPC messages exchanged between ksck, the master, the tablet servers and
//! the client library. All of them travel as JSON.

use crate::common::clock::Timestamp;
use crate::common::schema::{KeyRange, Row, Schema};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Response header carrying the server clock reading
pub const TIMESTAMP_HEADER: &str = "x-ksck-timestamp";

/// Role of a tablet replica as reported by consensus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicaRole {
    Leader,
    Follower,
    Unknown,
}

impl fmt::Display for ReplicaRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicaRole::Leader => write!(f, "LEADER"),
            ReplicaRole::Follower => write!(f, "FOLLOWER"),
            ReplicaRole::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// === Master ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    pub schema: Schema,
    pub num_replicas: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaDescriptor {
    pub node_id: String,
    pub role: ReplicaRole,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabletDescriptor {
    pub tablet_id: String,
    pub table_name: String,
    pub key_range: KeyRange,
    pub replicas: Vec<ReplicaDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabletServerDescriptor {
    pub node_id: String,
    pub address: String,
    /// Heartbeated recently enough to be considered alive by the master
    pub live: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTableRequest {
    pub name: String,
    pub schema: Schema,
    pub num_replicas: Option<usize>,
    #[serde(default)]
    pub split_keys: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTableResponse {
    pub table: TableDescriptor,
    pub tablets: Vec<TabletDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaReport {
    pub tablet_id: String,
    pub role: ReplicaRole,
    pub configured_replicas: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub node_id: String,
    pub address: String,
    pub reports: Vec<ReplicaReport>,
}

// === Tablet server ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub node_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub node_id: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReplicaRequest {
    pub tablet_id: String,
    pub table_name: String,
    pub schema: Schema,
    pub key_range: KeyRange,
    pub peers: Vec<PeerInfo>,
    /// Replica expected to win the first election
    pub leader: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaStatus {
    pub tablet_id: String,
    pub node_id: String,
    pub role: ReplicaRole,
    /// Node ids in this replica's consensus configuration
    pub configured_replicas: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteRequest {
    pub rows: Vec<Row>,
    pub propagated_timestamp: Option<Timestamp>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteResponse {
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicateRequest {
    pub leader: String,
    pub timestamp: Timestamp,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafeTimeRequest {
    pub leader: String,
    pub safe_time: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecksumRequest {
    /// Scan at this timestamp; `None` scans the current state
    pub snapshot_timestamp: Option<Timestamp>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumResponse {
    pub checksum: u64,
    pub rows: u64,
}
