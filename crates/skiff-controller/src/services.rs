// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! External-collaborator interfaces.
//!
//! Everything the reconcilers talk to besides the store lives behind the
//! traits in this module: region/cluster clients, the domain gateway,
//! child-resource services, and object storage. The control-plane host
//! wires concrete implementations in; tests substitute mocks.
//!
//! The interfaces are deliberately narrow. Reconcilers re-read current
//! state through them on every step rather than caching across ticks,
//! because another replica may have processed the same resource between
//! any two awaits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use skiff_core::entities::DatabaseSpec;

use crate::error::Result;
use crate::manifest::{DeployManifest, OpsKind, OpsRequestManifest};
use crate::replica_set::ReplicaSetStatus;

/// A deployment region/cluster a tenant application is pinned to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    /// Region name, e.g. `eu-central-1`.
    pub name: String,
}

/// Provisioning phase of a runtime domain, owned by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainPhase {
    /// The gateway is still provisioning routes/certificates.
    Creating,
    /// The domain is fully provisioned.
    Created,
    /// The domain is being torn down.
    Deleting,
    /// The domain is gone.
    Deleted,
}

/// Runtime domain record owned by the gateway subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeDomain {
    /// Owning application.
    pub appid: String,
    /// The hostname routed to the application runtime.
    pub domain: String,
    /// Gateway-owned provisioning phase.
    pub phase: DomainPhase,
}

/// Region lookup for an application.
#[async_trait]
pub trait RegionService: Send + Sync {
    /// Resolve the region an application is pinned to, if any.
    async fn find_by_appid(&self, appid: &str) -> Result<Option<Region>>;
}

/// Runtime-domain management (gateway subsystem).
///
/// Domain creation is asynchronous: `create` returns a record whose
/// phase advances to [`DomainPhase::Created`] out of band.
#[async_trait]
pub trait DomainService: Send + Sync {
    /// Find the runtime domain for an application.
    async fn find(&self, appid: &str) -> Result<Option<RuntimeDomain>>;
    /// Create the runtime domain for an application.
    async fn create(&self, appid: &str) -> Result<RuntimeDomain>;
    /// Delete the runtime domain for an application.
    async fn delete(&self, appid: &str) -> Result<()>;
}

/// Trigger (scheduled job) child resources.
#[async_trait]
pub trait TriggerService: Send + Sync {
    /// Number of triggers the application still owns.
    async fn count(&self, appid: &str) -> Result<u64>;
    /// Remove all triggers owned by the application.
    async fn remove_all(&self, appid: &str) -> Result<()>;
}

/// Cloud-function child resources.
#[async_trait]
pub trait FunctionService: Send + Sync {
    /// Number of functions the application still owns.
    async fn count(&self, appid: &str) -> Result<u64>;
    /// Remove all functions owned by the application.
    async fn remove_all(&self, appid: &str) -> Result<()>;
}

/// Per-application configuration documents.
#[async_trait]
pub trait ConfigurationService: Send + Sync {
    /// Number of configuration documents for the application.
    async fn count(&self, appid: &str) -> Result<u64>;
    /// Remove the application's configuration.
    async fn remove(&self, appid: &str) -> Result<()>;
}

/// Application bundle: the billing-owned resource document that also
/// carries the desired dedicated-database sizing.
#[async_trait]
pub trait BundleService: Send + Sync {
    /// Whether a bundle document exists for the application.
    async fn exists(&self, appid: &str) -> Result<bool>;
    /// Delete the application's bundle document.
    async fn delete(&self, appid: &str) -> Result<()>;
    /// Read the desired dedicated-database spec from the bundle.
    async fn database_spec(&self, appid: &str) -> Result<Option<DatabaseSpec>>;
}

/// Object-storage buckets.
#[async_trait]
pub trait BucketService: Send + Sync {
    /// Delete the application's bucket. Must be idempotent: deleting an
    /// absent bucket succeeds.
    async fn delete_bucket(&self, appid: &str) -> Result<()>;
}

/// Orchestration-layer client for the dedicated database cluster.
///
/// Manifests are identified deterministically from the appid, so none of
/// these calls needs a stored handle. Reads return `None` when the
/// resource does not exist.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Read the live database deploy manifest.
    async fn get_deploy(&self, appid: &str) -> Result<Option<DeployManifest>>;
    /// Apply (create or replace) the database deploy manifest.
    async fn apply_deploy(&self, appid: &str, manifest: &DeployManifest) -> Result<()>;
    /// Delete the database deploy manifest.
    async fn delete_deploy(&self, appid: &str) -> Result<()>;

    /// Read the ops-request manifest of the given kind, if present.
    async fn get_ops_request(&self, appid: &str, kind: OpsKind)
    -> Result<Option<OpsRequestManifest>>;
    /// Apply an ops-request manifest.
    async fn apply_ops_request(&self, appid: &str, manifest: &OpsRequestManifest) -> Result<()>;
    /// Delete the ops-request manifest of the given kind.
    async fn delete_ops_request(&self, appid: &str, kind: OpsKind) -> Result<()>;

    /// Probe the database replica set directly, independent of what the
    /// manifest status reports. `None` when the database is unreachable.
    async fn replica_set_status(&self, appid: &str) -> Result<Option<ReplicaSetStatus>>;
}
