//! Replica-set health of every tablet: leadership, membership and
//! replication factor.
//!
//! The check is read-only and never retries. Right after a table is created
//! (or during a leader election) it is expected to fail with retryable
//! issues; callers that need convergence re-fetch the view and run it again.

use crate::common::wire::ReplicaRole;
use crate::common::{Error, Result};
use crate::ksck::model::{ClusterView, Table, Tablet};
use crate::ksck::rpc::ProxyFactory;
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsistencyIssue {
    /// No replica reports LEADER: an election is probably in progress
    NoLeader { tablet_id: String },
    MultipleLeaders {
        tablet_id: String,
        leaders: Vec<String>,
    },
    ReplicaCount {
        tablet_id: String,
        expected: usize,
        actual: usize,
    },
    /// A node's consensus configuration differs from the master's metadata
    MembershipMismatch {
        tablet_id: String,
        node_id: String,
        master: Vec<String>,
        reported: Vec<String>,
    },
    RoleMismatch {
        tablet_id: String,
        node_id: String,
        master: ReplicaRole,
        reported: ReplicaRole,
    },
    ReplicaUnreachable {
        tablet_id: String,
        node_id: String,
        reason: String,
    },
}

impl ConsistencyIssue {
    pub fn tablet_id(&self) -> &str {
        match self {
            ConsistencyIssue::NoLeader { tablet_id }
            | ConsistencyIssue::MultipleLeaders { tablet_id, .. }
            | ConsistencyIssue::ReplicaCount { tablet_id, .. }
            | ConsistencyIssue::MembershipMismatch { tablet_id, .. }
            | ConsistencyIssue::RoleMismatch { tablet_id, .. }
            | ConsistencyIssue::ReplicaUnreachable { tablet_id, .. } => tablet_id,
        }
    }

    /// Split brain is never transient; everything else may converge.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ConsistencyIssue::MultipleLeaders { .. })
    }
}

impl fmt::Display for ConsistencyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyIssue::NoLeader { tablet_id } => {
                write!(f, "tablet {} has no leader", tablet_id)
            }
            ConsistencyIssue::MultipleLeaders { tablet_id, leaders } => write!(
                f,
                "tablet {} has {} leaders: {}",
                tablet_id,
                leaders.len(),
                leaders.join(", ")
            ),
            ConsistencyIssue::ReplicaCount {
                tablet_id,
                expected,
                actual,
            } => write!(
                f,
                "tablet {} has {} replica(s), expected {}",
                tablet_id, actual, expected
            ),
            ConsistencyIssue::MembershipMismatch {
                tablet_id,
                node_id,
                master,
                reported,
            } => write!(
                f,
                "tablet {} on {} reports members [{}], master has [{}]",
                tablet_id,
                node_id,
                reported.join(", "),
                master.join(", ")
            ),
            ConsistencyIssue::RoleMismatch {
                tablet_id,
                node_id,
                master,
                reported,
            } => write!(
                f,
                "tablet {} on {} reports role {}, master has {}",
                tablet_id, node_id, reported, master
            ),
            ConsistencyIssue::ReplicaUnreachable {
                tablet_id,
                node_id,
                reason,
            } => write!(
                f,
                "tablet {} replica on {} unreachable: {}",
                tablet_id, node_id, reason
            ),
        }
    }
}

/// Verify every tablet in `view`
pub async fn check_tables_consistency(
    view: &ClusterView,
    proxies: &dyn ProxyFactory,
    concurrency: usize,
) -> Result<()> {
    info!("Checking consistency of {} tablet(s)", view.num_tablets());

    let per_tablet: Vec<Vec<ConsistencyIssue>> = stream::iter(view.tablets())
        .map(|(table, tablet)| check_tablet(view, table, tablet, proxies))
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut issues: Vec<ConsistencyIssue> = per_tablet.into_iter().flatten().collect();
    if issues.is_empty() {
        info!("All {} table(s) are consistent", view.tables.len());
        return Ok(());
    }

    issues.sort_by(|a, b| a.tablet_id().cmp(b.tablet_id()));
    for issue in &issues {
        warn!("{}", issue);
    }
    Err(Error::Inconsistent { issues })
}

async fn check_tablet(
    view: &ClusterView,
    table: &Table,
    tablet: &Tablet,
    proxies: &dyn ProxyFactory,
) -> Vec<ConsistencyIssue> {
    let mut issues = Vec::new();
    let tablet_id = tablet.id.clone();

    let leaders = tablet.leaders();
    match leaders.len() {
        0 => issues.push(ConsistencyIssue::NoLeader {
            tablet_id: tablet_id.clone(),
        }),
        1 => {}
        _ => issues.push(ConsistencyIssue::MultipleLeaders {
            tablet_id: tablet_id.clone(),
            leaders: leaders.iter().map(|s| s.to_string()).collect(),
        }),
    }

    if tablet.replicas.len() != table.num_replicas {
        issues.push(ConsistencyIssue::ReplicaCount {
            tablet_id: tablet_id.clone(),
            expected: table.num_replicas,
            actual: tablet.replicas.len(),
        });
    }

    let master_members: BTreeSet<&str> = tablet.replica_nodes();
    for replica in &tablet.replicas {
        let Some(descriptor) = view.tablet_servers.get(&replica.node_id) else {
            issues.push(ConsistencyIssue::ReplicaUnreachable {
                tablet_id: tablet_id.clone(),
                node_id: replica.node_id.clone(),
                reason: "not registered with the master".into(),
            });
            continue;
        };

        let status = match proxies
            .tablet_server(descriptor)
            .replica_status(&tablet.id)
            .await
        {
            Ok(status) => status,
            Err(e) => {
                issues.push(ConsistencyIssue::ReplicaUnreachable {
                    tablet_id: tablet_id.clone(),
                    node_id: replica.node_id.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };
        debug!(
            "Tablet {} on {}: {} with {} member(s)",
            tablet.id,
            replica.node_id,
            status.role,
            status.configured_replicas.len()
        );

        let reported: BTreeSet<&str> = status
            .configured_replicas
            .iter()
            .map(|s| s.as_str())
            .collect();
        if reported != master_members {
            issues.push(ConsistencyIssue::MembershipMismatch {
                tablet_id: tablet_id.clone(),
                node_id: replica.node_id.clone(),
                master: master_members.iter().map(|s| s.to_string()).collect(),
                reported: reported.iter().map(|s| s.to_string()).collect(),
            });
        }

        if status.role != replica.role {
            issues.push(ConsistencyIssue::RoleMismatch {
                tablet_id: tablet_id.clone(),
                node_id: replica.node_id.clone(),
                master: replica.role,
                reported: status.role,
            });
        }
    }

    issues
}
