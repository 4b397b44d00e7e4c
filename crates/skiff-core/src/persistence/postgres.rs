// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL-backed store.
//!
//! Claims are single statements: the eligibility filter, the fairness
//! ordering, and the `locked_at` bump happen in one atomic
//! `UPDATE ... WHERE appid = (SELECT ... FOR UPDATE SKIP LOCKED)`.
//! A replica that loses the race matches zero rows and moves on.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use super::{DatabaseClaimFilter, Store};
use crate::entities::{
    ApplicationPhase, ApplicationRecord, DatabasePhase, DedicatedDatabaseRecord, DesiredState,
    dedicated_database_name,
};
use crate::error::CoreError;
use crate::lock;

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new Postgres-backed store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PostgresStore {
    // ========================================================================
    // Applications
    // ========================================================================

    async fn insert_application(
        &self,
        appid: &str,
        state: DesiredState,
        phase: ApplicationPhase,
    ) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO applications (appid, state, phase, created_at, updated_at, locked_at)
            VALUES ($1, $2, $3, NOW(), NOW(), $4)
            "#,
        )
        .bind(appid)
        .bind(state.as_str())
        .bind(phase.as_str())
        .bind(lock::LOCK_INIT_TIME)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_application(
        &self,
        appid: &str,
    ) -> Result<Option<ApplicationRecord>, CoreError> {
        let record = sqlx::query_as::<_, ApplicationRecord>(
            r#"
            SELECT appid, state, phase, created_at, updated_at, locked_at
            FROM applications
            WHERE appid = $1
            "#,
        )
        .bind(appid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn claim_application(
        &self,
        phase: ApplicationPhase,
    ) -> Result<Option<ApplicationRecord>, CoreError> {
        let now = Utc::now();
        let record = sqlx::query_as::<_, ApplicationRecord>(
            r#"
            UPDATE applications
            SET locked_at = $3
            WHERE appid = (
                SELECT appid FROM applications
                WHERE phase = $1 AND locked_at < $2
                ORDER BY locked_at ASC, updated_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING appid, state, phase, created_at, updated_at, locked_at
            "#,
        )
        .bind(phase.as_str())
        .bind(lock::claim_cutoff(now))
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn advance_application_phase(
        &self,
        appid: &str,
        from: ApplicationPhase,
        to: ApplicationPhase,
    ) -> Result<bool, CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE applications
            SET phase = $3, locked_at = $4, updated_at = NOW()
            WHERE appid = $1 AND phase = $2
            "#,
        )
        .bind(appid)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(lock::LOCK_INIT_TIME)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn unlock_application(&self, appid: &str) -> Result<(), CoreError> {
        sqlx::query("UPDATE applications SET locked_at = $2 WHERE appid = $1")
            .bind(appid)
            .bind(lock::unlock_timestamp(Utc::now()))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn relock_application(&self, appid: &str, waiting_ms: i64) -> Result<(), CoreError> {
        sqlx::query("UPDATE applications SET locked_at = $2 WHERE appid = $1")
            .bind(appid)
            .bind(lock::relock_timestamp(Utc::now(), waiting_ms))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn sweep_deleted_applications(&self) -> Result<u64, CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE applications
            SET phase = 'Deleting', locked_at = $1
            WHERE state = 'Deleted' AND phase IN ('Created', 'Started', 'Stopped')
            "#,
        )
        .bind(lock::LOCK_INIT_TIME)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn purge_deleted_applications(&self) -> Result<u64, CoreError> {
        let result =
            sqlx::query("DELETE FROM applications WHERE state = 'Deleted' AND phase = 'Deleted'")
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    // ========================================================================
    // Dedicated databases
    // ========================================================================

    async fn insert_database(&self, appid: &str) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO dedicated_databases (appid, name, state, phase, created_at, updated_at, locked_at)
            VALUES ($1, $2, 'Running', 'Starting', NOW(), NOW(), $3)
            "#,
        )
        .bind(appid)
        .bind(dedicated_database_name(appid))
        .bind(lock::LOCK_INIT_TIME)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_database(
        &self,
        appid: &str,
    ) -> Result<Option<DedicatedDatabaseRecord>, CoreError> {
        let record = sqlx::query_as::<_, DedicatedDatabaseRecord>(
            r#"
            SELECT appid, name, state, phase, created_at, updated_at, locked_at
            FROM dedicated_databases
            WHERE appid = $1
            "#,
        )
        .bind(appid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn claim_database(
        &self,
        filter: &DatabaseClaimFilter,
    ) -> Result<Option<DedicatedDatabaseRecord>, CoreError> {
        let now = Utc::now();
        let record = sqlx::query_as::<_, DedicatedDatabaseRecord>(
            r#"
            UPDATE dedicated_databases
            SET locked_at = $5
            WHERE appid = (
                SELECT appid FROM dedicated_databases
                WHERE phase = $1
                  AND locked_at < $2
                  AND ($3::text IS NULL OR state = $3)
                  AND ($4::text IS NULL OR state <> $4)
                ORDER BY locked_at ASC, updated_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING appid, name, state, phase, created_at, updated_at, locked_at
            "#,
        )
        .bind(filter.phase.as_str())
        .bind(lock::claim_cutoff(now))
        .bind(filter.state.map(|s| s.as_str()))
        .bind(filter.not_state.map(|s| s.as_str()))
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn advance_database_phase(
        &self,
        appid: &str,
        from: DatabasePhase,
        to: DatabasePhase,
        state: Option<DesiredState>,
    ) -> Result<bool, CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE dedicated_databases
            SET phase = $3, state = COALESCE($4::text, state), locked_at = $5, updated_at = NOW()
            WHERE appid = $1 AND phase = $2
            "#,
        )
        .bind(appid)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(state.map(|s| s.as_str()))
        .bind(lock::LOCK_INIT_TIME)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn unlock_database(&self, appid: &str) -> Result<(), CoreError> {
        sqlx::query("UPDATE dedicated_databases SET locked_at = $2 WHERE appid = $1")
            .bind(appid)
            .bind(lock::unlock_timestamp(Utc::now()))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn relock_database(&self, appid: &str, waiting_ms: i64) -> Result<(), CoreError> {
        sqlx::query("UPDATE dedicated_databases SET locked_at = $2 WHERE appid = $1")
            .bind(appid)
            .bind(lock::relock_timestamp(Utc::now(), waiting_ms))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn mark_database_deleted(&self, appid: &str) -> Result<bool, CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE dedicated_databases
            SET state = 'Deleted', phase = 'Deleting', updated_at = NOW()
            WHERE appid = $1
            "#,
        )
        .bind(appid)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn sweep_deleted_databases(&self) -> Result<u64, CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE dedicated_databases
            SET phase = 'Deleting', locked_at = $1
            WHERE state = 'Deleted'
              AND phase IN ('Starting', 'Stopping', 'Started', 'Stopped')
            "#,
        )
        .bind(lock::LOCK_INIT_TIME)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn purge_deleted_databases(&self) -> Result<u64, CoreError> {
        let result = sqlx::query(
            "DELETE FROM dedicated_databases WHERE state = 'Deleted' AND phase = 'Deleted'",
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn sweep_stopped_databases(&self) -> Result<u64, CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE dedicated_databases
            SET phase = 'Stopping', locked_at = $1
            WHERE state = 'Stopped' AND phase = 'Started'
            "#,
        )
        .bind(lock::LOCK_INIT_TIME)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn sweep_running_databases(&self) -> Result<u64, CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE dedicated_databases
            SET phase = 'Starting', locked_at = $1
            WHERE state = 'Running' AND phase = 'Stopped'
            "#,
        )
        .bind(lock::LOCK_INIT_TIME)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
