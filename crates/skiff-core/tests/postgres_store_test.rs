// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Contract tests for the PostgreSQL store backend.
//!
//! These run only when `SKIFF_TEST_DATABASE_URL` points at a disposable
//! PostgreSQL database; without it each test skips.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use skiff_core::entities::{ApplicationPhase, DatabasePhase, DesiredState};
use skiff_core::persistence::{DatabaseClaimFilter, PostgresStore, Store};

async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("SKIFF_TEST_DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .ok()?;
    skiff_core::migrations::run_postgres(&pool).await.ok()?;
    Some(pool)
}

fn unique_appid(prefix: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .subsec_nanos();
    format!("{prefix}-{}-{nanos}", std::process::id())
}

/// Claim repeatedly until the given appid is won. Unrelated leftover
/// records claimed along the way stay locked and out of the running.
async fn claim_application_for(
    store: &PostgresStore,
    phase: ApplicationPhase,
    appid: &str,
) -> bool {
    for _ in 0..20 {
        match store.claim_application(phase).await.unwrap() {
            Some(record) if record.appid == appid => return true,
            Some(_) => continue,
            None => return false,
        }
    }
    false
}

async fn claim_database_for(
    store: &PostgresStore,
    filter: &DatabaseClaimFilter,
    appid: &str,
) -> bool {
    for _ in 0..20 {
        match store.claim_database(filter).await.unwrap() {
            Some(record) if record.appid == appid => return true,
            Some(_) => continue,
            None => return false,
        }
    }
    false
}

async fn backdate_application_lock(pool: &PgPool, appid: &str, seconds: i64) {
    sqlx::query("UPDATE applications SET locked_at = $2 WHERE appid = $1")
        .bind(appid)
        .bind(Utc::now() - Duration::seconds(seconds))
        .execute(pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_application_claim_contract() {
    let Some(pool) = test_pool().await else {
        eprintln!("skipping: SKIFF_TEST_DATABASE_URL not set");
        return;
    };
    let store = PostgresStore::new(pool.clone());
    let appid = unique_appid("claim");

    store
        .insert_application(&appid, DesiredState::Running, ApplicationPhase::Creating)
        .await
        .unwrap();

    // Sentinel-locked records are immediately claimable; a fresh claim
    // then holds the record for the lock window.
    assert!(claim_application_for(&store, ApplicationPhase::Creating, &appid).await);
    backdate_application_lock(&pool, &appid, 10).await;
    assert!(!claim_application_for(&store, ApplicationPhase::Creating, &appid).await);

    // Past the window the record is handed out again.
    backdate_application_lock(&pool, &appid, 16).await;
    assert!(claim_application_for(&store, ApplicationPhase::Creating, &appid).await);

    // Compare-and-set transition, applied once.
    assert!(
        store
            .advance_application_phase(&appid, ApplicationPhase::Creating, ApplicationPhase::Created)
            .await
            .unwrap()
    );
    assert!(
        !store
            .advance_application_phase(&appid, ApplicationPhase::Creating, ApplicationPhase::Created)
            .await
            .unwrap()
    );

    sqlx::query("DELETE FROM applications WHERE appid = $1")
        .bind(&appid)
        .execute(&pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_database_claim_filter_and_sweeps() {
    let Some(pool) = test_pool().await else {
        eprintln!("skipping: SKIFF_TEST_DATABASE_URL not set");
        return;
    };
    let store = PostgresStore::new(pool.clone());
    let appid = unique_appid("db");

    store.insert_database(&appid).await.unwrap();
    sqlx::query(
        "UPDATE dedicated_databases SET state = 'Restarting', phase = 'Started' WHERE appid = $1",
    )
    .bind(&appid)
    .execute(&pool)
    .await
    .unwrap();

    // The starting filter skips Restarting records; the restarting
    // filter matches them.
    let starting = DatabaseClaimFilter::phase(DatabasePhase::Starting)
        .without_state(DesiredState::Restarting);
    assert!(!claim_database_for(&store, &starting, &appid).await);

    let restarting = DatabaseClaimFilter::phase(DatabasePhase::Started)
        .with_state(DesiredState::Restarting);
    assert!(claim_database_for(&store, &restarting, &appid).await);

    // Deletion sweep forces the phase over and the purge removes the row
    // once the teardown has finished.
    sqlx::query("UPDATE dedicated_databases SET state = 'Deleted' WHERE appid = $1")
        .bind(&appid)
        .execute(&pool)
        .await
        .unwrap();
    assert!(store.sweep_deleted_databases().await.unwrap() >= 1);
    let record = store.get_database(&appid).await.unwrap().unwrap();
    assert_eq!(record.phase, DatabasePhase::Deleting);

    assert!(
        store
            .advance_database_phase(&appid, DatabasePhase::Deleting, DatabasePhase::Deleted, None)
            .await
            .unwrap()
    );
    assert!(store.purge_deleted_databases().await.unwrap() >= 1);
    assert!(store.get_database(&appid).await.unwrap().is_none());
}
