//! Master: the metadata authority
//!
//! Keeps the catalog of tables and tablets, places replicas on tablet
//! servers and tracks tablet server liveness and replica roles through
//! heartbeats.

pub mod catalog;
pub mod http;
pub mod server;

pub use server::{Master, MasterHandle};
