// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-axis drift detection between desired spec and live manifest.
//!
//! The three axes require three different cluster operations, so drift
//! is reported per axis rather than as a single boolean. Quantities are
//! normalized before comparison; an unparseable live quantity counts as
//! drift, since the manifest then cannot be proven to match.

use serde::{Deserialize, Serialize};

use skiff_core::entities::DatabaseSpec;

use crate::manifest::{DeploySpec, OpsKind};
use crate::quantity::{parse_cpu_millis, parse_memory_mib};

/// An independent sizing axis of the database cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleAxis {
    /// CPU/memory limits.
    Vertical,
    /// Replica count.
    Horizontal,
    /// Storage capacity.
    Volume,
}

impl ScaleAxis {
    /// The ops-request kind that converges this axis.
    pub fn ops_kind(&self) -> OpsKind {
        match self {
            Self::Vertical => OpsKind::VerticalScaling,
            Self::Horizontal => OpsKind::HorizontalScaling,
            Self::Volume => OpsKind::VolumeExpansion,
        }
    }
}

/// Compare the desired spec against a live deploy spec and report every
/// drifted axis, in a fixed order.
pub fn detect(desired: &DatabaseSpec, live: &DeploySpec) -> Vec<ScaleAxis> {
    let mut drifted = Vec::new();

    let cpu_matches = parse_cpu_millis(&live.cpu).is_some_and(|m| m == desired.limit_cpu);
    let memory_matches = parse_memory_mib(&live.memory).is_some_and(|m| m == desired.limit_memory);
    if !cpu_matches || !memory_matches {
        drifted.push(ScaleAxis::Vertical);
    }

    if live.replicas != desired.replicas {
        drifted.push(ScaleAxis::Horizontal);
    }

    let storage_matches =
        parse_memory_mib(&live.storage).is_some_and(|m| m == desired.capacity * 1024);
    if !storage_matches {
        drifted.push(ScaleAxis::Volume);
    }

    drifted
}
