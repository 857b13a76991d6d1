//! Tablet server: hosts tablet replicas
//!
//! Each replica keeps every row version (MVCC) so it can be scanned at a
//! snapshot timestamp. Leaders replicate writes synchronously to all
//! followers and periodically push a safe time, below which followers are
//! guaranteed to have every write.

pub mod http;
pub mod server;
pub mod tablet;

pub use server::{TabletServer, TabletServerHandle};
pub use tablet::TabletReplica;
