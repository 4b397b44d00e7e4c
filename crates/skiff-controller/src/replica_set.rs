// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Replica-set health evaluation.
//!
//! The live connectivity probe is the second readiness signal next to
//! the manifest status: the two can disagree while the cluster
//! converges, and a database is only declared up when both agree.

use serde::{Deserialize, Serialize};

/// One replica-set member as reported by the database itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaSetMember {
    /// Whether the member is reachable and in a healthy state.
    pub healthy: bool,
    /// Whether the member currently holds the primary role.
    pub primary: bool,
}

/// Replica-set status from a direct database-level probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaSetStatus {
    /// All known members.
    pub members: Vec<ReplicaSetMember>,
}

/// Whether the replica set can take writes: a majority of members
/// healthy and a healthy primary present.
pub fn is_healthy(status: &ReplicaSetStatus) -> bool {
    if status.members.is_empty() {
        return false;
    }
    let healthy = status.members.iter().filter(|m| m.healthy).count();
    let has_primary = status.members.iter().any(|m| m.primary && m.healthy);
    healthy * 2 > status.members.len() && has_primary
}
