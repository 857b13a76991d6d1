//! Common utilities and types shared across ksck

pub mod clock;
pub mod config;
pub mod error;
pub mod hash;
pub mod http;
pub mod schema;
pub mod utils;
pub mod wire;

pub use clock::{HybridClock, ObservedTimestamp, Timestamp};
pub use config::{KsckConfig, MasterConfig, TabletServerConfig};
pub use error::{Error, Result};
pub use hash::{select_replicas, TabletChecksummer};
pub use schema::{ColumnSchema, ColumnType, KeyRange, Row, Schema, Value};
pub use utils::{encode_segment, http_url, parse_duration, retry_with_backoff, timestamp_now_micros};
pub use wire::ReplicaRole;
