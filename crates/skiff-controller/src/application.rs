// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Application reconciler.
//!
//! Drives an `Application` record through `Creating → Created` and
//! `Deleting → Deleted`, and maps the user-declared `Deleted` state onto
//! the phase machine. Each tick a handler atomically claims at most one
//! eligible record and performs one bounded step; convergence is
//! level-based, so every step re-checks current state rather than
//! trusting an earlier tick.

use std::sync::Arc;

use tracing::{debug, error, info};

use skiff_core::entities::ApplicationPhase;
use skiff_core::persistence::Store;

use crate::error::{Result, TaskError};
use crate::services::{
    BucketService, BundleService, ConfigurationService, DomainPhase, DomainService,
    FunctionService, Region, RegionService, TriggerService,
};

/// Collaborators the application reconciler consumes.
#[derive(Clone)]
pub struct ApplicationServices {
    /// Region lookup.
    pub regions: Arc<dyn RegionService>,
    /// Runtime-domain gateway.
    pub domains: Arc<dyn DomainService>,
    /// Trigger child resources.
    pub triggers: Arc<dyn TriggerService>,
    /// Cloud-function child resources.
    pub functions: Arc<dyn FunctionService>,
    /// Application configuration documents.
    pub configurations: Arc<dyn ConfigurationService>,
    /// Application bundles.
    pub bundles: Arc<dyn BundleService>,
    /// Object-storage buckets.
    pub buckets: Arc<dyn BucketService>,
}

/// The application reconciler task.
pub struct ApplicationTask {
    store: Arc<dyn Store>,
    services: ApplicationServices,
}

impl ApplicationTask {
    /// Create the task over a store and its collaborators.
    pub fn new(store: Arc<dyn Store>, services: ApplicationServices) -> Self {
        Self { store, services }
    }

    /// Run one tick: every handler once, concurrently, errors contained
    /// per handler. A failed handler leaves its claimed record locked
    /// until the window expires; replays are safe because every step is
    /// an idempotent existence check.
    pub async fn tick(&self) {
        let (creating, deleting, sweep) = tokio::join!(
            self.handle_creating_phase(),
            self.handle_deleting_phase(),
            self.handle_deleted_state(),
        );
        if let Err(e) = creating {
            error!(error = %e, "creating-phase handler failed");
        }
        if let Err(e) = deleting {
            error!(error = %e, "deleting-phase handler failed");
        }
        if let Err(e) = sweep {
            error!(error = %e, "deleted-state sweep failed");
        }
    }

    /// Phase `Creating`:
    /// - resolve the region
    /// - ensure the runtime domain exists
    /// - once the domain reports `Created`, move phase to `Created`
    pub async fn handle_creating_phase(&self) -> Result<()> {
        let Some(app) = self.store.claim_application(ApplicationPhase::Creating).await? else {
            return Ok(());
        };
        let appid = app.appid.as_str();
        info!(appid, "claimed application in Creating phase");

        self.require_region(appid).await?;

        let domain = match self.services.domains.find(appid).await? {
            Some(domain) => domain,
            None => {
                info!(appid, "creating runtime domain");
                self.services.domains.create(appid).await?
            }
        };

        // Domain provisioning is asynchronous and owned by the gateway;
        // check back next tick.
        if domain.phase != DomainPhase::Created {
            self.store.unlock_application(appid).await?;
            return Ok(());
        }

        if self
            .store
            .advance_application_phase(appid, ApplicationPhase::Creating, ApplicationPhase::Created)
            .await?
        {
            info!(appid, "application phase advanced to Created");
        }
        Ok(())
    }

    /// Phase `Deleting`: strict ordered teardown, one precondition per
    /// tick, unlocking between steps so each removal is independently
    /// retryable:
    /// - triggers, functions, configuration, bundle
    /// - runtime domain
    /// - dedicated database (delegated to the database reconciler)
    /// - storage bucket, then move phase to `Deleted`
    pub async fn handle_deleting_phase(&self) -> Result<()> {
        let Some(app) = self.store.claim_application(ApplicationPhase::Deleting).await? else {
            return Ok(());
        };
        let appid = app.appid.as_str();

        self.require_region(appid).await?;

        if self.services.triggers.count(appid).await? > 0 {
            self.services.triggers.remove_all(appid).await?;
            self.store.unlock_application(appid).await?;
            return Ok(());
        }

        if self.services.functions.count(appid).await? > 0 {
            self.services.functions.remove_all(appid).await?;
            self.store.unlock_application(appid).await?;
            return Ok(());
        }

        if self.services.configurations.count(appid).await? > 0 {
            self.services.configurations.remove(appid).await?;
            self.store.unlock_application(appid).await?;
            return Ok(());
        }

        if self.services.bundles.exists(appid).await? {
            self.services.bundles.delete(appid).await?;
            self.store.unlock_application(appid).await?;
            return Ok(());
        }

        if self.services.domains.find(appid).await?.is_some() {
            self.services.domains.delete(appid).await?;
            self.store.unlock_application(appid).await?;
            return Ok(());
        }

        if self.store.get_database(appid).await?.is_some() {
            // The database reconciler owns the teardown; this only flips
            // the record over.
            self.store.mark_database_deleted(appid).await?;
            self.store.unlock_application(appid).await?;
            return Ok(());
        }

        self.services.buckets.delete_bucket(appid).await?;

        if self
            .store
            .advance_application_phase(appid, ApplicationPhase::Deleting, ApplicationPhase::Deleted)
            .await?
        {
            info!(appid, "application phase advanced to Deleted");
        }
        Ok(())
    }

    /// State `Deleted`: bulk sweep, no locking needed.
    /// - force phase `Created`/`Started`/`Stopped` into `Deleting`
    /// - remove records whose phase already reached `Deleted`
    pub async fn handle_deleted_state(&self) -> Result<()> {
        let swept = self.store.sweep_deleted_applications().await?;
        if swept > 0 {
            debug!(swept, "forced deleted-state applications into Deleting");
        }
        let purged = self.store.purge_deleted_applications().await?;
        if purged > 0 {
            debug!(purged, "purged fully deleted applications");
        }
        Ok(())
    }

    async fn require_region(&self, appid: &str) -> Result<Region> {
        match self.services.regions.find_by_appid(appid).await? {
            Some(region) => Ok(region),
            None => {
                // Corrupted cross-entity state; there is no automatic
                // remediation. The record stays locked and is retried
                // once the window expires.
                error!(appid, "region not found for application");
                Err(TaskError::RegionNotFound {
                    appid: appid.to_string(),
                })
            }
        }
    }
}
