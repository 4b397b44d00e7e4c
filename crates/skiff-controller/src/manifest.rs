// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Declarative manifest model for the dedicated database cluster.
//!
//! The reconcilers never template raw Kubernetes YAML; they build these
//! descriptions with pure functions and hand them to the
//! [`ClusterClient`](crate::services::ClusterClient). Operation kinds are
//! a tagged enum rather than string-typed switches, so every
//! infrastructure mutation maps to exactly one declarative description.

use serde::{Deserialize, Serialize};
use std::fmt;

use skiff_core::entities::{DatabaseSpec, dedicated_database_name};

/// Status phase reported by the orchestration layer for a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManifestPhase {
    /// The cluster is being created.
    Creating,
    /// The cluster is up and serving.
    Running,
    /// A spec change is being rolled out.
    Updating,
    /// The cluster is scaling down.
    Stopping,
    /// The cluster is fully scaled down.
    Stopped,
    /// The cluster failed to converge.
    Failed,
    /// The cluster is degraded.
    Abnormal,
}

/// Status phase of an asynchronous ops-request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpsPhase {
    /// Accepted but not yet started.
    Pending,
    /// Resources are being created for the operation.
    Creating,
    /// The operation is executing.
    Running,
    /// The operation finished successfully.
    Succeed,
    /// The operation failed.
    Failed,
    /// The operation was cancelled.
    Cancelled,
}

/// Kind of asynchronous, infrastructure-mutating operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpsKind {
    /// Rolling restart of the cluster pods.
    Restart,
    /// CPU/memory resizing.
    VerticalScaling,
    /// Replica-count resizing.
    HorizontalScaling,
    /// Storage capacity expansion.
    VolumeExpansion,
}

impl OpsKind {
    /// The scaling kinds, one per drift axis.
    pub const SCALING: [OpsKind; 3] = [
        OpsKind::VerticalScaling,
        OpsKind::HorizontalScaling,
        OpsKind::VolumeExpansion,
    ];

    /// Operation type name as the orchestration layer spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Restart => "Restart",
            Self::VerticalScaling => "VerticalScaling",
            Self::HorizontalScaling => "HorizontalScaling",
            Self::VolumeExpansion => "VolumeExpansion",
        }
    }

    /// Manifest-name suffix for this kind.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Restart => "restart",
            Self::VerticalScaling => "vertical-scaling",
            Self::HorizontalScaling => "horizontal-scaling",
            Self::VolumeExpansion => "volume-expansion",
        }
    }
}

impl fmt::Display for OpsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sizing section of the deploy manifest.
///
/// Quantities are kept in the orchestration layer's string form
/// (`500m`, `4Gi`); live manifests may legally report an equivalent
/// representation of the same value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploySpec {
    /// CPU limit quantity, e.g. `500m` or `2`.
    pub cpu: String,
    /// Memory limit quantity, e.g. `512Mi` or `4Gi`.
    pub memory: String,
    /// Replica count; zero means scaled down.
    pub replicas: i32,
    /// Storage capacity quantity, e.g. `10Gi`.
    pub storage: String,
}

/// Cluster status as read back from the orchestration layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStatus {
    /// Current status phase.
    pub phase: ManifestPhase,
}

/// Declarative description of the database cluster deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployManifest {
    /// Deterministic cluster name, derived from the appid.
    pub name: String,
    /// Desired sizing.
    pub spec: DeploySpec,
    /// Status, populated only on manifests read back from the cluster.
    pub status: Option<ClusterStatus>,
}

/// Declarative description of an asynchronous cluster operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpsRequestManifest {
    /// Deterministic name: cluster name plus the kind suffix.
    pub name: String,
    /// Operation kind.
    pub kind: OpsKind,
    /// Status, populated only on manifests read back from the cluster.
    pub status: Option<OpsPhase>,
}

/// Deterministic ops-request manifest name for an appid and kind.
pub fn ops_request_name(appid: &str, kind: OpsKind) -> String {
    format!("{}-{}", dedicated_database_name(appid), kind.suffix())
}

/// Build the deploy manifest for an application's desired spec.
pub fn deploy_manifest(appid: &str, spec: &DatabaseSpec) -> DeployManifest {
    deploy_manifest_with_replicas(appid, spec, spec.replicas)
}

/// Build the deploy manifest with an explicit replica count (the stop
/// path patches replicas to zero while keeping the sizing).
pub fn deploy_manifest_with_replicas(
    appid: &str,
    spec: &DatabaseSpec,
    replicas: i32,
) -> DeployManifest {
    DeployManifest {
        name: dedicated_database_name(appid),
        spec: DeploySpec {
            cpu: format!("{}m", spec.limit_cpu),
            memory: format!("{}Mi", spec.limit_memory),
            replicas,
            storage: format!("{}Gi", spec.capacity),
        },
        status: None,
    }
}

/// Build an ops-request manifest of the given kind.
pub fn ops_request(appid: &str, kind: OpsKind) -> OpsRequestManifest {
    OpsRequestManifest {
        name: ops_request_name(appid, kind),
        kind,
        status: None,
    }
}
