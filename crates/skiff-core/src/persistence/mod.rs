// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persistence interfaces and backends for skiff-core.
//!
//! The [`Store`] trait is the coordination substrate the reconcilers run
//! on. Claims are atomic filter-and-update operations; every method that
//! touches `locked_at` derives its timestamps from [`crate::lock`] so the
//! protocol is identical across backends.

pub mod memory;
pub mod postgres;

pub use self::memory::MemoryStore;
pub use self::postgres::PostgresStore;

use async_trait::async_trait;

use crate::entities::{
    ApplicationPhase, ApplicationRecord, DatabasePhase, DedicatedDatabaseRecord, DesiredState,
};
use crate::error::CoreError;

/// Claim filter for dedicated-database records.
///
/// Claims always target one phase; some handlers additionally constrain
/// the declared state (the drift-convergence handler claims records whose
/// state *is* `Restarting`, the starting handler skips them).
#[derive(Debug, Clone, Copy)]
pub struct DatabaseClaimFilter {
    /// Phase the record must be in.
    pub phase: DatabasePhase,
    /// When set, the record's state must equal this value.
    pub state: Option<DesiredState>,
    /// When set, the record's state must not equal this value.
    pub not_state: Option<DesiredState>,
}

impl DatabaseClaimFilter {
    /// Claim any record in `phase`, regardless of declared state.
    pub fn phase(phase: DatabasePhase) -> Self {
        Self {
            phase,
            state: None,
            not_state: None,
        }
    }

    /// Additionally require the declared state to equal `state`.
    pub fn with_state(mut self, state: DesiredState) -> Self {
        self.state = Some(state);
        self
    }

    /// Additionally require the declared state to differ from `state`.
    pub fn without_state(mut self, state: DesiredState) -> Self {
        self.not_state = Some(state);
        self
    }
}

/// Store interface used by the reconcilers.
///
/// All phase mutations are compare-and-set on the current phase so a
/// record can never move backwards through its transition graph, even
/// when a stale claimant races a fresh one.
#[async_trait]
pub trait Store: Send + Sync {
    // ========================================================================
    // Applications
    // ========================================================================

    /// Insert a new application record in the given state and phase, with
    /// the never-locked sentinel.
    async fn insert_application(
        &self,
        appid: &str,
        state: DesiredState,
        phase: ApplicationPhase,
    ) -> Result<(), CoreError>;

    /// Fetch an application record by appid.
    async fn get_application(&self, appid: &str)
    -> Result<Option<ApplicationRecord>, CoreError>;

    /// Atomically claim the oldest claimable application in `phase`.
    ///
    /// Returns `None` when no record is eligible or another replica won
    /// the race.
    async fn claim_application(
        &self,
        phase: ApplicationPhase,
    ) -> Result<Option<ApplicationRecord>, CoreError>;

    /// Compare-and-set phase transition. Resets `locked_at` to the
    /// never-locked sentinel and touches `updated_at`. Returns whether a
    /// record in phase `from` was updated.
    async fn advance_application_phase(
        &self,
        appid: &str,
        from: ApplicationPhase,
        to: ApplicationPhase,
    ) -> Result<bool, CoreError>;

    /// Make the record immediately claimable on the next tick.
    async fn unlock_application(&self, appid: &str) -> Result<(), CoreError>;

    /// Release the claim with the adaptive backoff for `waiting_ms`
    /// (milliseconds since the record's last phase transition).
    async fn relock_application(&self, appid: &str, waiting_ms: i64) -> Result<(), CoreError>;

    /// Force `state = Deleted` records still in `Created`/`Started`/
    /// `Stopped` into the `Deleting` phase. Returns the number of records
    /// swept.
    async fn sweep_deleted_applications(&self) -> Result<u64, CoreError>;

    /// Remove records whose state and phase are both `Deleted`. Returns
    /// the number of records removed.
    async fn purge_deleted_applications(&self) -> Result<u64, CoreError>;

    // ========================================================================
    // Dedicated databases
    // ========================================================================

    /// Insert a dedicated-database record for `appid`: name derived from
    /// the appid, phase `Starting`, state `Running`, never-locked
    /// sentinel.
    async fn insert_database(&self, appid: &str) -> Result<(), CoreError>;

    /// Fetch a dedicated-database record by appid.
    async fn get_database(
        &self,
        appid: &str,
    ) -> Result<Option<DedicatedDatabaseRecord>, CoreError>;

    /// Atomically claim the oldest claimable database matching `filter`.
    async fn claim_database(
        &self,
        filter: &DatabaseClaimFilter,
    ) -> Result<Option<DedicatedDatabaseRecord>, CoreError>;

    /// Compare-and-set phase transition, optionally also writing the
    /// declared state (e.g. `Restarting → Running` once convergence
    /// finishes). Resets `locked_at` to the sentinel and touches
    /// `updated_at`.
    async fn advance_database_phase(
        &self,
        appid: &str,
        from: DatabasePhase,
        to: DatabasePhase,
        state: Option<DesiredState>,
    ) -> Result<bool, CoreError>;

    /// Make the record immediately claimable on the next tick.
    async fn unlock_database(&self, appid: &str) -> Result<(), CoreError>;

    /// Release the claim with the adaptive backoff for `waiting_ms`.
    async fn relock_database(&self, appid: &str, waiting_ms: i64) -> Result<(), CoreError>;

    /// Mark a database for teardown: `state = Deleted`, `phase =
    /// Deleting`. Used by the application reconciler's deletion cascade.
    /// Returns whether a record existed.
    async fn mark_database_deleted(&self, appid: &str) -> Result<bool, CoreError>;

    /// Force `state = Deleted` records in any non-terminal phase into
    /// `Deleting`.
    async fn sweep_deleted_databases(&self) -> Result<u64, CoreError>;

    /// Remove records whose state and phase are both `Deleted`.
    async fn purge_deleted_databases(&self) -> Result<u64, CoreError>;

    /// Force `state = Stopped` records still `Started` into `Stopping`.
    async fn sweep_stopped_databases(&self) -> Result<u64, CoreError>;

    /// Force `state = Running` records still `Stopped` into `Starting`.
    async fn sweep_running_databases(&self) -> Result<u64, CoreError>;
}
