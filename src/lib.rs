//! # ksck
//!
//! Consistency checker for a replicated tablet store, together with a
//! small in-process implementation of that store to check against:
//! - `ksck`: master and tablet server liveness, replica-set consistency and
//!   snapshot checksums of every replica
//! - `master`: table catalog, replica placement, tablet server registry
//! - `tserver`: MVCC tablet replicas with synchronous replication and safe
//!   time propagation
//! - `client`: table creation and write sessions
//! - `mini_cluster`: a whole cluster on loopback ports for tests
//!
//! ## Architecture
//!
//! ```text
//!                ┌──────────────┐
//!      ksck ────►│    Master    │◄──── heartbeats ────┐
//!        │       │  (catalog)   │                     │
//!        │       └──────────────┘                     │
//!        │  ping / status / checksum                  │
//!        ├──────────────┬──────────────┐              │
//!  ┌─────▼──────┐ ┌─────▼──────┐ ┌─────▼──────┐       │
//!  │ TServer 0  │ │ TServer 1  │ │ TServer 2  │───────┘
//!  │  replicas  │ │  replicas  │ │  replicas  │
//!  └────────────┘ └────────────┘ └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! ksck-master --bind 127.0.0.1:7051
//! ksck-tserver --id ts-0 --bind 127.0.0.1:7050 --master 127.0.0.1:7051
//!
//! ksck --master 127.0.0.1:7051 --checksum-scan --checksum-scan-concurrency 16
//! ```

#![allow(clippy::result_large_err)]

pub mod client;
pub mod common;
pub mod ksck;
pub mod master;
pub mod mini_cluster;
pub mod tserver;

// Re-export commonly used types
pub use common::{Error, KsckConfig, Result};
pub use ksck::{ChecksumOptions, ChecksumReport, ClusterHandle, ClusterView, Ksck, SnapshotTimestamp};
pub use mini_cluster::{MiniCluster, MiniClusterOptions};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
