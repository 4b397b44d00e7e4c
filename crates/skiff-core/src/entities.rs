// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Entity definitions for the control plane.
//!
//! Both entities share the same split between `state` (user-declared
//! intent, written by the API layer) and `phase` (reconciler-owned
//! progress marker). Phases and states are persisted as their string
//! names; `locked_at`/`updated_at` are persisted as timestamps, with the
//! epoch sentinel meaning "never locked".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// User-declared intent for an application or dedicated database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DesiredState {
    /// The resource should be up and serving.
    Running,
    /// The resource should be scaled down but kept.
    Stopped,
    /// The resource should be restarted/reconverged against its spec.
    Restarting,
    /// The resource should be torn down and removed.
    Deleted,
}

impl DesiredState {
    /// String name used in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "Running",
            Self::Stopped => "Stopped",
            Self::Restarting => "Restarting",
            Self::Deleted => "Deleted",
        }
    }
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for DesiredState {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "Running" => Ok(Self::Running),
            "Stopped" => Ok(Self::Stopped),
            "Restarting" => Ok(Self::Restarting),
            "Deleted" => Ok(Self::Deleted),
            _ => Err(CoreError::InvalidValue {
                field: "state",
                value,
            }),
        }
    }
}

/// Reconciler-owned progress marker for an application.
///
/// Only moves forward: `Creating → Created`, and
/// `{Created, Started, Stopped} → Deleting → Deleted`. `Started` and
/// `Stopped` are written by the instance subsystem once the runtime is
/// confirmed up/down; the reconciler only consumes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationPhase {
    /// Initial resources (domain, namespace) are being provisioned.
    Creating,
    /// Provisioning finished; the runtime has not been started yet.
    Created,
    /// The function runtime is confirmed up.
    Started,
    /// The function runtime is confirmed down.
    Stopped,
    /// The runtime is being restarted.
    Restarting,
    /// Ordered teardown is in progress.
    Deleting,
    /// Teardown finished; the record is awaiting garbage collection.
    Deleted,
}

impl ApplicationPhase {
    /// String name used in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creating => "Creating",
            Self::Created => "Created",
            Self::Started => "Started",
            Self::Stopped => "Stopped",
            Self::Restarting => "Restarting",
            Self::Deleting => "Deleting",
            Self::Deleted => "Deleted",
        }
    }
}

impl fmt::Display for ApplicationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for ApplicationPhase {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "Creating" => Ok(Self::Creating),
            "Created" => Ok(Self::Created),
            "Started" => Ok(Self::Started),
            "Stopped" => Ok(Self::Stopped),
            "Restarting" => Ok(Self::Restarting),
            "Deleting" => Ok(Self::Deleting),
            "Deleted" => Ok(Self::Deleted),
            _ => Err(CoreError::InvalidValue {
                field: "phase",
                value,
            }),
        }
    }
}

/// Reconciler-owned progress marker for a dedicated database.
///
/// Transitions: `Starting → Started`, `Started → Stopping → Stopped`,
/// `Stopped → Starting`, `Started ↔ Restarting` while converging, and
/// `{Starting, Stopping, Started, Stopped} → Deleting → Deleted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabasePhase {
    /// The cluster manifest is being applied and brought up.
    Starting,
    /// The cluster is up: manifest running and replica set healthy.
    Started,
    /// The cluster is being scaled to zero replicas.
    Stopping,
    /// The cluster is confirmed scaled down.
    Stopped,
    /// Drift convergence / restart operations are in flight.
    Restarting,
    /// The cluster manifest is being deleted.
    Deleting,
    /// Teardown finished; the record is awaiting garbage collection.
    Deleted,
}

impl DatabasePhase {
    /// String name used in the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "Starting",
            Self::Started => "Started",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
            Self::Restarting => "Restarting",
            Self::Deleting => "Deleting",
            Self::Deleted => "Deleted",
        }
    }
}

impl fmt::Display for DatabasePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for DatabasePhase {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "Starting" => Ok(Self::Starting),
            "Started" => Ok(Self::Started),
            "Stopping" => Ok(Self::Stopping),
            "Stopped" => Ok(Self::Stopped),
            "Restarting" => Ok(Self::Restarting),
            "Deleting" => Ok(Self::Deleting),
            "Deleted" => Ok(Self::Deleted),
            _ => Err(CoreError::InvalidValue {
                field: "phase",
                value,
            }),
        }
    }
}

/// Application record from the store.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApplicationRecord {
    /// Stable unique identifier, immutable.
    pub appid: String,
    /// User-declared intent.
    #[sqlx(try_from = "String")]
    pub state: DesiredState,
    /// Reconciler-owned progress marker.
    #[sqlx(try_from = "String")]
    pub phase: ApplicationPhase,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the last phase transition happened; feeds the relock backoff.
    pub updated_at: DateTime<Utc>,
    /// Mutual-exclusion timestamp; the epoch sentinel means never locked.
    pub locked_at: DateTime<Utc>,
}

/// Dedicated-database record from the store.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DedicatedDatabaseRecord {
    /// Owning application.
    pub appid: String,
    /// Cluster name, derived deterministically from the appid.
    pub name: String,
    /// User-declared intent.
    #[sqlx(try_from = "String")]
    pub state: DesiredState,
    /// Reconciler-owned progress marker.
    #[sqlx(try_from = "String")]
    pub phase: DatabasePhase,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the last phase transition happened; feeds the relock backoff.
    pub updated_at: DateTime<Utc>,
    /// Mutual-exclusion timestamp; the epoch sentinel means never locked.
    pub locked_at: DateTime<Utc>,
}

/// Desired sizing for a dedicated database cluster.
///
/// Owned by the billing/bundle subsystem and read-only to the
/// reconcilers; their job is to make live infrastructure match it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSpec {
    /// CPU limit in millicores.
    pub limit_cpu: i64,
    /// Memory limit in MiB.
    pub limit_memory: i64,
    /// Desired replica count.
    pub replicas: i32,
    /// Storage capacity in GiB.
    pub capacity: i64,
}

/// Deterministic cluster name for an application's dedicated database.
///
/// Manifest identity derives from the appid alone, so existence checks
/// never need a stored handle.
pub fn dedicated_database_name(appid: &str) -> String {
    format!("skiff-{appid}")
}
