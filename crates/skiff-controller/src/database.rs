// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Dedicated-database reconciler.
//!
//! Drives a `DedicatedDatabase` record through starting, stopping,
//! deleting and drift-convergence, against a live cluster reached only
//! through the [`ClusterClient`](crate::services::ClusterClient)
//! interface. All handlers share the claim/relock discipline: claim one
//! record, do one bounded step, release with adaptive backoff while the
//! cluster converges.
//!
//! The restarting path reconciles drift between the billing-owned spec
//! and the live manifest across three independent axes (cpu/memory,
//! replicas, storage). Each axis converges through its own ops-request,
//! and the handler never issues a second operation for an axis while one
//! is in flight.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use skiff_core::entities::{DatabasePhase, DatabaseSpec, DesiredState};
use skiff_core::persistence::{DatabaseClaimFilter, Store};

use crate::drift;
use crate::error::{Result, TaskError};
use crate::manifest::{self, ManifestPhase, OpsKind, OpsPhase};
use crate::replica_set;
use crate::services::{BundleService, ClusterClient};

/// The dedicated-database reconciler task.
pub struct DedicatedDatabaseTask {
    store: Arc<dyn Store>,
    cluster: Arc<dyn ClusterClient>,
    bundles: Arc<dyn BundleService>,
}

impl DedicatedDatabaseTask {
    /// Create the task over a store, a cluster client, and the bundle
    /// service carrying the desired spec.
    pub fn new(
        store: Arc<dyn Store>,
        cluster: Arc<dyn ClusterClient>,
        bundles: Arc<dyn BundleService>,
    ) -> Self {
        Self {
            store,
            cluster,
            bundles,
        }
    }

    /// Run one tick: every handler once, concurrently, errors contained
    /// per handler.
    pub async fn tick(&self) {
        let (deleting, stopping, starting, restarting, deleted, stopped, running) = tokio::join!(
            self.handle_deleting_phase(),
            self.handle_stopping_phase(),
            self.handle_starting_phase(),
            self.handle_restarting_state(),
            self.handle_deleted_state(),
            self.handle_stopped_state(),
            self.handle_running_state(),
        );
        for (name, result) in [
            ("deleting-phase", deleting),
            ("stopping-phase", stopping),
            ("starting-phase", starting),
            ("restarting-state", restarting),
            ("deleted-state sweep", deleted),
            ("stopped-state sweep", stopped),
            ("running-state sweep", running),
        ] {
            if let Err(e) = result {
                error!(handler = name, error = %e, "database handler failed");
            }
        }
    }

    /// Phase `Starting`: (re)apply the deploy manifest until the cluster
    /// exists and is scaled out, then require BOTH a `Running` manifest
    /// status and a healthy replica-set probe before advancing to
    /// `Started`. The two signals can disagree while the cluster
    /// converges, so neither alone is trusted.
    ///
    /// Records whose declared state is `Restarting` are skipped; the
    /// restarting handler owns those.
    pub async fn handle_starting_phase(&self) -> Result<()> {
        let filter = DatabaseClaimFilter::phase(DatabasePhase::Starting)
            .without_state(DesiredState::Restarting);
        let Some(db) = self.store.claim_database(&filter).await? else {
            return Ok(());
        };
        let appid = db.appid.as_str();
        let waiting_ms = (Utc::now() - db.updated_at).num_milliseconds();

        let spec = self.desired_spec(appid).await?;
        let deploy = self.cluster.get_deploy(appid).await?;

        let scaled_out = deploy.as_ref().is_some_and(|m| m.spec.replicas > 0);
        if !scaled_out {
            self.cluster
                .apply_deploy(appid, &manifest::deploy_manifest(appid, &spec))
                .await?;
            self.store.relock_database(appid, waiting_ms).await?;
            return Ok(());
        }

        let probe = self.cluster.replica_set_status(appid).await?;
        let connection_ok = probe.as_ref().is_some_and(replica_set::is_healthy);

        // Re-read the manifest: its status may have moved while probing.
        let deploy = self.cluster.get_deploy(appid).await?;
        let running = deploy
            .and_then(|m| m.status)
            .is_some_and(|s| s.phase == ManifestPhase::Running);

        if !(running && connection_ok) {
            self.store.relock_database(appid, waiting_ms).await?;
            return Ok(());
        }

        if self
            .store
            .advance_database_phase(
                appid,
                DatabasePhase::Starting,
                DatabasePhase::Started,
                Some(DesiredState::Running),
            )
            .await?
        {
            debug!(appid, "dedicated database advanced to Started");
        }
        Ok(())
    }

    /// Phase `Stopping`: patch replicas to zero, then wait until the
    /// manifest confirms both zero replicas and a `Stopped` status.
    pub async fn handle_stopping_phase(&self) -> Result<()> {
        let filter = DatabaseClaimFilter::phase(DatabasePhase::Stopping);
        let Some(db) = self.store.claim_database(&filter).await? else {
            return Ok(());
        };
        let appid = db.appid.as_str();
        let waiting_ms = (Utc::now() - db.updated_at).num_milliseconds();

        let Some(deploy) = self.cluster.get_deploy(appid).await? else {
            // A stopping cluster with no manifest is corrupted state.
            return Err(TaskError::ManifestNotFound {
                appid: appid.to_string(),
            });
        };

        if deploy.spec.replicas != 0 {
            let spec = self.desired_spec(appid).await?;
            self.cluster
                .apply_deploy(appid, &manifest::deploy_manifest_with_replicas(appid, &spec, 0))
                .await?;
            self.store.relock_database(appid, waiting_ms).await?;
            return Ok(());
        }

        let stopped = deploy
            .status
            .is_some_and(|s| s.phase == ManifestPhase::Stopped);
        if !stopped {
            self.store.relock_database(appid, waiting_ms).await?;
            return Ok(());
        }

        if self
            .store
            .advance_database_phase(appid, DatabasePhase::Stopping, DatabasePhase::Stopped, None)
            .await?
        {
            info!(appid, "dedicated database advanced to Stopped");
        }
        Ok(())
    }

    /// Phase `Deleting`: delete the deploy manifest, then advance once
    /// it is gone.
    pub async fn handle_deleting_phase(&self) -> Result<()> {
        let filter = DatabaseClaimFilter::phase(DatabasePhase::Deleting);
        let Some(db) = self.store.claim_database(&filter).await? else {
            return Ok(());
        };
        let appid = db.appid.as_str();
        let waiting_ms = (Utc::now() - db.updated_at).num_milliseconds();

        if self.cluster.get_deploy(appid).await?.is_some() {
            self.cluster.delete_deploy(appid).await?;
            self.store.relock_database(appid, waiting_ms).await?;
            return Ok(());
        }

        if self
            .store
            .advance_database_phase(appid, DatabasePhase::Deleting, DatabasePhase::Deleted, None)
            .await?
        {
            info!(appid, "dedicated database advanced to Deleted");
        }
        Ok(())
    }

    /// State `Restarting` (phase `Started`): converge spec drift and
    /// restart the cluster.
    ///
    /// - Manifest missing: full re-provision through the `Starting`
    ///   phase.
    /// - Drifted axes: one ops-request per drifted axis, never two for
    ///   the same axis at once; wait while they run.
    /// - No drift: reap finished scaling operations, then fall through
    ///   to a plain restart ops-request; once it succeeds and the
    ///   manifest is `Running` again, the record returns to `Started`.
    pub async fn handle_restarting_state(&self) -> Result<()> {
        let filter = DatabaseClaimFilter::phase(DatabasePhase::Started)
            .with_state(DesiredState::Restarting);
        let Some(db) = self.store.claim_database(&filter).await? else {
            return Ok(());
        };
        let appid = db.appid.as_str();
        let waiting_ms = (Utc::now() - db.updated_at).num_milliseconds();

        let spec = self.desired_spec(appid).await?;

        let Some(deploy) = self.cluster.get_deploy(appid).await? else {
            // Nothing live to patch: re-provision from scratch.
            info!(appid, "deploy manifest missing, re-provisioning");
            self.cluster
                .apply_deploy(appid, &manifest::deploy_manifest(appid, &spec))
                .await?;
            self.store
                .advance_database_phase(
                    appid,
                    DatabasePhase::Started,
                    DatabasePhase::Starting,
                    Some(DesiredState::Running),
                )
                .await?;
            return Ok(());
        };

        let drifted = drift::detect(&spec, &deploy.spec);
        if !drifted.is_empty() {
            for axis in &drifted {
                let kind = axis.ops_kind();
                match self.cluster.get_ops_request(appid, kind).await? {
                    None => {
                        info!(appid, kind = kind.as_str(), "issuing scaling operation");
                        self.cluster
                            .apply_ops_request(appid, &manifest::ops_request(appid, kind))
                            .await?;
                    }
                    Some(ops) if ops.status == Some(OpsPhase::Failed) => {
                        // Clear the failed operation; the axis still
                        // drifts, so the next tick reissues it.
                        warn!(appid, kind = kind.as_str(), "scaling operation failed, clearing");
                        self.cluster.delete_ops_request(appid, kind).await?;
                    }
                    Some(_) => {}
                }
            }
            self.store.relock_database(appid, waiting_ms).await?;
            return Ok(());
        }

        // Spec and manifest agree again: reap finished scaling
        // operations, wait out the ones still in flight.
        let mut reaped = false;
        for kind in OpsKind::SCALING {
            if let Some(ops) = self.cluster.get_ops_request(appid, kind).await? {
                if ops.status == Some(OpsPhase::Succeed) {
                    self.cluster.delete_ops_request(appid, kind).await?;
                    reaped = true;
                } else {
                    self.store.relock_database(appid, waiting_ms).await?;
                    return Ok(());
                }
            }
        }
        if reaped {
            if self
                .store
                .advance_database_phase(
                    appid,
                    DatabasePhase::Started,
                    DatabasePhase::Started,
                    Some(DesiredState::Running),
                )
                .await?
            {
                info!(appid, "dedicated database reconverged to spec");
            }
            return Ok(());
        }

        // Pure restart: no drift and no scaling operations on the books.
        let Some(ops) = self.cluster.get_ops_request(appid, OpsKind::Restart).await? else {
            self.cluster
                .apply_ops_request(appid, &manifest::ops_request(appid, OpsKind::Restart))
                .await?;
            self.store.relock_database(appid, waiting_ms).await?;
            return Ok(());
        };

        if ops.status == Some(OpsPhase::Failed) {
            warn!(appid, "restart operation failed, clearing for retry");
            self.cluster
                .delete_ops_request(appid, OpsKind::Restart)
                .await?;
            self.store.relock_database(appid, waiting_ms).await?;
            return Ok(());
        }

        let running = self
            .cluster
            .get_deploy(appid)
            .await?
            .and_then(|m| m.status)
            .is_some_and(|s| s.phase == ManifestPhase::Running);

        if running && ops.status == Some(OpsPhase::Succeed) {
            self.cluster
                .delete_ops_request(appid, OpsKind::Restart)
                .await?;
            if self
                .store
                .advance_database_phase(
                    appid,
                    DatabasePhase::Started,
                    DatabasePhase::Started,
                    Some(DesiredState::Running),
                )
                .await?
            {
                info!(appid, "dedicated database restart complete");
            }
        } else {
            self.store.relock_database(appid, waiting_ms).await?;
        }
        Ok(())
    }

    /// State `Deleted`: bulk sweep into `Deleting` plus garbage
    /// collection of fully deleted rows.
    pub async fn handle_deleted_state(&self) -> Result<()> {
        let swept = self.store.sweep_deleted_databases().await?;
        if swept > 0 {
            debug!(swept, "forced deleted-state databases into Deleting");
        }
        let purged = self.store.purge_deleted_databases().await?;
        if purged > 0 {
            debug!(purged, "purged fully deleted databases");
        }
        Ok(())
    }

    /// State `Stopped`: force `Started` records into `Stopping`.
    pub async fn handle_stopped_state(&self) -> Result<()> {
        let swept = self.store.sweep_stopped_databases().await?;
        if swept > 0 {
            debug!(swept, "forced stopped-state databases into Stopping");
        }
        Ok(())
    }

    /// State `Running`: force `Stopped` records into `Starting`.
    pub async fn handle_running_state(&self) -> Result<()> {
        let swept = self.store.sweep_running_databases().await?;
        if swept > 0 {
            debug!(swept, "forced running-state databases into Starting");
        }
        Ok(())
    }

    async fn desired_spec(&self, appid: &str) -> Result<DatabaseSpec> {
        match self.bundles.database_spec(appid).await? {
            Some(spec) => Ok(spec),
            None => {
                // Same class of invariant violation as a missing region:
                // logged loudly, record left locked, retried forever.
                error!(appid, "bundle carries no dedicated-database spec");
                Err(TaskError::BundleNotFound {
                    appid: appid.to_string(),
                })
            }
        }
    }
}
