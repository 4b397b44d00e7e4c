// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for skiff-controller.

use thiserror::Error;

/// Reconciler errors.
///
/// Handler errors never propagate past the per-handler boundary: the
/// tick driver logs them and the claimed record stays locked until the
/// window expires, after which the handler retries from scratch.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TaskError {
    /// Store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] skiff_core::error::CoreError),

    /// No region record exists for an appid that references one. This is
    /// corrupted cross-entity state requiring operator attention; the
    /// record is retried indefinitely.
    #[error("Region not found for application '{appid}'")]
    RegionNotFound {
        /// The application whose region is missing.
        appid: String,
    },

    /// The application bundle carries no dedicated-database spec.
    #[error("Bundle not found for application '{appid}'")]
    BundleNotFound {
        /// The application whose bundle is missing.
        appid: String,
    },

    /// A deploy manifest that must exist is absent.
    #[error("Deploy manifest not found for application '{appid}'")]
    ManifestNotFound {
        /// The application whose manifest is missing.
        appid: String,
    },

    /// Cluster/orchestration API call failed.
    #[error("Cluster error: {0}")]
    Cluster(String),

    /// Domain/gateway API call failed.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Object-storage API call failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Result type using TaskError.
pub type Result<T> = std::result::Result<T, TaskError>;
