//! Hashing utilities for ksck
//!
//! - HRW (Highest Random Weight) ordering for replica placement
//! - CRC32 row checksums folded into an order-independent tablet checksum

use crate::common::schema::Row;
use crate::common::Result;

fn hrw_weight(key: &str, node: &str) -> u64 {
    let combined = format!("{}{}", key, node);
    let hash = blake3::hash(combined.as_bytes());
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&hash.as_bytes()[0..8]);
    u64::from_le_bytes(buf)
}

/// Select `n` nodes for `key`, preferring the least loaded ones.
///
/// `nodes` pairs each node with the number of replicas it already hosts.
/// Ties are broken by HRW weight so placement stays deterministic.
pub fn select_replicas(key: &str, nodes: &[(String, usize)], n: usize) -> Vec<String> {
    let mut ranked: Vec<(usize, u64, &String)> = nodes
        .iter()
        .map(|(node, load)| (*load, hrw_weight(key, node), node))
        .collect();
    ranked.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));
    ranked
        .into_iter()
        .take(n)
        .map(|(_, _, node)| node.clone())
        .collect()
}

/// Checksum of one encoded row
pub fn row_checksum(row: &Row) -> Result<u64> {
    let encoded = bincode::serialize(row)?;
    Ok(crc32fast::hash(&encoded) as u64)
}

/// Incremental tablet checksum: the wrapping sum of row checksums, so the
/// result does not depend on scan order.
#[derive(Debug, Default, Clone, Copy)]
pub struct TabletChecksummer {
    sum: u64,
    rows: u64,
}

impl TabletChecksummer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, row: &Row) -> Result<()> {
        self.sum = self.sum.wrapping_add(row_checksum(row)?);
        self.rows += 1;
        Ok(())
    }

    pub fn checksum(&self) -> u64 {
        self.sum
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }
}
