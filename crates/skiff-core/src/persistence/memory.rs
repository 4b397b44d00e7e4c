// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory store.
//!
//! Implements the same claim/relock contract as the Postgres backend on
//! top of a mutex-guarded map: the mutex makes each filter-and-update
//! atomic, so claim races between concurrent callers resolve exactly as
//! they do against the real store. Used by tests and by embedders that
//! want to run the reconcilers without PostgreSQL.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{DatabaseClaimFilter, Store};
use crate::entities::{
    ApplicationPhase, ApplicationRecord, DatabasePhase, DedicatedDatabaseRecord, DesiredState,
    dedicated_database_name,
};
use crate::error::CoreError;
use crate::lock;

#[derive(Default)]
struct Inner {
    applications: BTreeMap<String, ApplicationRecord>,
    databases: BTreeMap<String, DedicatedDatabaseRecord>,
}

/// In-memory store implementation.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("store mutex poisoned")
    }

    // ========================================================================
    // Out-of-band mutations
    //
    // The declared state belongs to the API layer and `Started`/`Stopped`
    // application phases to the instance subsystem; neither goes through
    // the reconcilers. These helpers stand in for those writers.
    // ========================================================================

    /// Set an application's declared state.
    pub fn set_application_state(&self, appid: &str, state: DesiredState) -> Result<(), CoreError> {
        let mut inner = self.lock();
        let record = inner
            .applications
            .get_mut(appid)
            .ok_or_else(|| CoreError::RecordNotFound {
                appid: appid.to_string(),
            })?;
        record.state = state;
        Ok(())
    }

    /// Set an application's phase directly, bypassing the transition
    /// guard.
    pub fn set_application_phase(
        &self,
        appid: &str,
        phase: ApplicationPhase,
    ) -> Result<(), CoreError> {
        let mut inner = self.lock();
        let record = inner
            .applications
            .get_mut(appid)
            .ok_or_else(|| CoreError::RecordNotFound {
                appid: appid.to_string(),
            })?;
        record.phase = phase;
        Ok(())
    }

    /// Overwrite an application's lock timestamp (test control of claim
    /// eligibility).
    pub fn set_application_lock(
        &self,
        appid: &str,
        locked_at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let mut inner = self.lock();
        let record = inner
            .applications
            .get_mut(appid)
            .ok_or_else(|| CoreError::RecordNotFound {
                appid: appid.to_string(),
            })?;
        record.locked_at = locked_at;
        Ok(())
    }

    /// Set a database's declared state.
    pub fn set_database_state(&self, appid: &str, state: DesiredState) -> Result<(), CoreError> {
        let mut inner = self.lock();
        let record = inner
            .databases
            .get_mut(appid)
            .ok_or_else(|| CoreError::RecordNotFound {
                appid: appid.to_string(),
            })?;
        record.state = state;
        Ok(())
    }

    /// Set a database's phase directly, bypassing the transition guard.
    pub fn set_database_phase(&self, appid: &str, phase: DatabasePhase) -> Result<(), CoreError> {
        let mut inner = self.lock();
        let record = inner
            .databases
            .get_mut(appid)
            .ok_or_else(|| CoreError::RecordNotFound {
                appid: appid.to_string(),
            })?;
        record.phase = phase;
        Ok(())
    }

    /// Overwrite a database's lock timestamp.
    pub fn set_database_lock(
        &self,
        appid: &str,
        locked_at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let mut inner = self.lock();
        let record = inner
            .databases
            .get_mut(appid)
            .ok_or_else(|| CoreError::RecordNotFound {
                appid: appid.to_string(),
            })?;
        record.locked_at = locked_at;
        Ok(())
    }
}

/// Pick the appid of the oldest claimable record, `(locked_at,
/// updated_at)` ascending.
fn pick_claimable<'a, R, F>(
    records: impl Iterator<Item = &'a R>,
    now: DateTime<Utc>,
    eligible: F,
) -> Option<String>
where
    R: 'a,
    F: Fn(&R) -> Option<(&str, DateTime<Utc>, DateTime<Utc>)>,
{
    let cutoff = lock::claim_cutoff(now);
    records
        .filter_map(|r| eligible(r))
        .filter(|(_, locked_at, _)| *locked_at < cutoff)
        .min_by_key(|(_, locked_at, updated_at)| (*locked_at, *updated_at))
        .map(|(appid, _, _)| appid.to_string())
}

#[async_trait]
impl Store for MemoryStore {
    // ========================================================================
    // Applications
    // ========================================================================

    async fn insert_application(
        &self,
        appid: &str,
        state: DesiredState,
        phase: ApplicationPhase,
    ) -> Result<(), CoreError> {
        let mut inner = self.lock();
        if inner.applications.contains_key(appid) {
            return Err(CoreError::Database {
                operation: "insert_application".to_string(),
                details: format!("duplicate appid '{appid}'"),
            });
        }
        let now = Utc::now();
        inner.applications.insert(
            appid.to_string(),
            ApplicationRecord {
                appid: appid.to_string(),
                state,
                phase,
                created_at: now,
                updated_at: now,
                locked_at: lock::LOCK_INIT_TIME,
            },
        );
        Ok(())
    }

    async fn get_application(
        &self,
        appid: &str,
    ) -> Result<Option<ApplicationRecord>, CoreError> {
        Ok(self.lock().applications.get(appid).cloned())
    }

    async fn claim_application(
        &self,
        phase: ApplicationPhase,
    ) -> Result<Option<ApplicationRecord>, CoreError> {
        let now = Utc::now();
        let mut inner = self.lock();
        let picked = pick_claimable(inner.applications.values(), now, |r| {
            (r.phase == phase).then_some((r.appid.as_str(), r.locked_at, r.updated_at))
        });
        let Some(appid) = picked else {
            return Ok(None);
        };
        let record = inner
            .applications
            .get_mut(&appid)
            .expect("picked appid must exist");
        record.locked_at = now;
        Ok(Some(record.clone()))
    }

    async fn advance_application_phase(
        &self,
        appid: &str,
        from: ApplicationPhase,
        to: ApplicationPhase,
    ) -> Result<bool, CoreError> {
        let mut inner = self.lock();
        match inner.applications.get_mut(appid) {
            Some(record) if record.phase == from => {
                record.phase = to;
                record.locked_at = lock::LOCK_INIT_TIME;
                record.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn unlock_application(&self, appid: &str) -> Result<(), CoreError> {
        if let Some(record) = self.lock().applications.get_mut(appid) {
            record.locked_at = lock::unlock_timestamp(Utc::now());
        }
        Ok(())
    }

    async fn relock_application(&self, appid: &str, waiting_ms: i64) -> Result<(), CoreError> {
        if let Some(record) = self.lock().applications.get_mut(appid) {
            record.locked_at = lock::relock_timestamp(Utc::now(), waiting_ms);
        }
        Ok(())
    }

    async fn sweep_deleted_applications(&self) -> Result<u64, CoreError> {
        let mut swept = 0;
        for record in self.lock().applications.values_mut() {
            if record.state == DesiredState::Deleted
                && matches!(
                    record.phase,
                    ApplicationPhase::Created
                        | ApplicationPhase::Started
                        | ApplicationPhase::Stopped
                )
            {
                record.phase = ApplicationPhase::Deleting;
                record.locked_at = lock::LOCK_INIT_TIME;
                swept += 1;
            }
        }
        Ok(swept)
    }

    async fn purge_deleted_applications(&self) -> Result<u64, CoreError> {
        let mut inner = self.lock();
        let before = inner.applications.len();
        inner.applications.retain(|_, r| {
            !(r.state == DesiredState::Deleted && r.phase == ApplicationPhase::Deleted)
        });
        Ok((before - inner.applications.len()) as u64)
    }

    // ========================================================================
    // Dedicated databases
    // ========================================================================

    async fn insert_database(&self, appid: &str) -> Result<(), CoreError> {
        let mut inner = self.lock();
        if inner.databases.contains_key(appid) {
            return Err(CoreError::Database {
                operation: "insert_database".to_string(),
                details: format!("duplicate appid '{appid}'"),
            });
        }
        let now = Utc::now();
        inner.databases.insert(
            appid.to_string(),
            DedicatedDatabaseRecord {
                appid: appid.to_string(),
                name: dedicated_database_name(appid),
                state: DesiredState::Running,
                phase: DatabasePhase::Starting,
                created_at: now,
                updated_at: now,
                locked_at: lock::LOCK_INIT_TIME,
            },
        );
        Ok(())
    }

    async fn get_database(
        &self,
        appid: &str,
    ) -> Result<Option<DedicatedDatabaseRecord>, CoreError> {
        Ok(self.lock().databases.get(appid).cloned())
    }

    async fn claim_database(
        &self,
        filter: &DatabaseClaimFilter,
    ) -> Result<Option<DedicatedDatabaseRecord>, CoreError> {
        let now = Utc::now();
        let mut inner = self.lock();
        let picked = pick_claimable(inner.databases.values(), now, |r| {
            let matches = r.phase == filter.phase
                && filter.state.is_none_or(|s| r.state == s)
                && filter.not_state.is_none_or(|s| r.state != s);
            matches.then_some((r.appid.as_str(), r.locked_at, r.updated_at))
        });
        let Some(appid) = picked else {
            return Ok(None);
        };
        let record = inner
            .databases
            .get_mut(&appid)
            .expect("picked appid must exist");
        record.locked_at = now;
        Ok(Some(record.clone()))
    }

    async fn advance_database_phase(
        &self,
        appid: &str,
        from: DatabasePhase,
        to: DatabasePhase,
        state: Option<DesiredState>,
    ) -> Result<bool, CoreError> {
        let mut inner = self.lock();
        match inner.databases.get_mut(appid) {
            Some(record) if record.phase == from => {
                record.phase = to;
                if let Some(state) = state {
                    record.state = state;
                }
                record.locked_at = lock::LOCK_INIT_TIME;
                record.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn unlock_database(&self, appid: &str) -> Result<(), CoreError> {
        if let Some(record) = self.lock().databases.get_mut(appid) {
            record.locked_at = lock::unlock_timestamp(Utc::now());
        }
        Ok(())
    }

    async fn relock_database(&self, appid: &str, waiting_ms: i64) -> Result<(), CoreError> {
        if let Some(record) = self.lock().databases.get_mut(appid) {
            record.locked_at = lock::relock_timestamp(Utc::now(), waiting_ms);
        }
        Ok(())
    }

    async fn mark_database_deleted(&self, appid: &str) -> Result<bool, CoreError> {
        let mut inner = self.lock();
        match inner.databases.get_mut(appid) {
            Some(record) => {
                record.state = DesiredState::Deleted;
                record.phase = DatabasePhase::Deleting;
                record.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn sweep_deleted_databases(&self) -> Result<u64, CoreError> {
        let mut swept = 0;
        for record in self.lock().databases.values_mut() {
            if record.state == DesiredState::Deleted
                && matches!(
                    record.phase,
                    DatabasePhase::Starting
                        | DatabasePhase::Stopping
                        | DatabasePhase::Started
                        | DatabasePhase::Stopped
                )
            {
                record.phase = DatabasePhase::Deleting;
                record.locked_at = lock::LOCK_INIT_TIME;
                swept += 1;
            }
        }
        Ok(swept)
    }

    async fn purge_deleted_databases(&self) -> Result<u64, CoreError> {
        let mut inner = self.lock();
        let before = inner.databases.len();
        inner
            .databases
            .retain(|_, r| !(r.state == DesiredState::Deleted && r.phase == DatabasePhase::Deleted));
        Ok((before - inner.databases.len()) as u64)
    }

    async fn sweep_stopped_databases(&self) -> Result<u64, CoreError> {
        let mut swept = 0;
        for record in self.lock().databases.values_mut() {
            if record.state == DesiredState::Stopped && record.phase == DatabasePhase::Started {
                record.phase = DatabasePhase::Stopping;
                record.locked_at = lock::LOCK_INIT_TIME;
                swept += 1;
            }
        }
        Ok(swept)
    }

    async fn sweep_running_databases(&self) -> Result<u64, CoreError> {
        let mut swept = 0;
        for record in self.lock().databases.values_mut() {
            if record.state == DesiredState::Running && record.phase == DatabasePhase::Stopped {
                record.phase = DatabasePhase::Starting;
                record.locked_at = lock::LOCK_INIT_TIME;
                swept += 1;
            }
        }
        Ok(swept)
    }
}
