// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end application lifecycle scenarios over the in-memory store.

mod common;

use common::*;
use uuid::Uuid;

use skiff_core::entities::{ApplicationPhase, DesiredState};
use skiff_core::lock;
use skiff_core::persistence::Store;
use skiff_controller::manifest;
use skiff_controller::manifest::ManifestPhase;
use skiff_controller::services::{ClusterClient, DomainPhase, DomainService};

fn appid() -> String {
    format!("app-{}", Uuid::new_v4().simple())
}

#[tokio::test]
async fn test_creating_advances_once_domain_is_ready() {
    let env = TestEnv::new(0, 0, 0);
    let appid = appid();
    env.store
        .insert_application(&appid, DesiredState::Running, ApplicationPhase::Creating)
        .await
        .unwrap();
    env.track(&appid);

    // First tick: the domain gets created, the phase must not advance,
    // and the record is released for a fast retry.
    env.run_ticks(1).await;
    assert!(env.domains.exists());
    let record = env.store.get_application(&appid).await.unwrap().unwrap();
    assert_eq!(record.phase, ApplicationPhase::Creating);

    // The domain is still provisioning: more ticks change nothing and
    // never create a second domain.
    env.run_ticks(2).await;
    let creates = env
        .event_log()
        .iter()
        .filter(|e| *e == "domain.create")
        .count();
    assert_eq!(creates, 1);
    let record = env.store.get_application(&appid).await.unwrap().unwrap();
    assert_eq!(record.phase, ApplicationPhase::Creating);

    // Gateway reports Created: the next eligible tick advances the
    // application.
    env.domains.set_phase(DomainPhase::Created);
    env.run_ticks(1).await;
    let record = env.store.get_application(&appid).await.unwrap().unwrap();
    assert_eq!(record.phase, ApplicationPhase::Created);
    assert_eq!(record.locked_at, lock::LOCK_INIT_TIME);
}

#[tokio::test]
async fn test_deletion_cascade_is_ordered_and_idempotent() {
    let env = TestEnv::new(2, 3, 1);
    let appid = appid();

    // A fully built application: child resources, bundle, ready domain,
    // dedicated database with a live cluster, bucket.
    env.store
        .insert_application(&appid, DesiredState::Running, ApplicationPhase::Created)
        .await
        .unwrap();
    env.store.insert_database(&appid).await.unwrap();
    env.store
        .set_database_phase(&appid, skiff_core::entities::DatabasePhase::Started)
        .unwrap();
    env.domains.create(&appid).await.unwrap();
    env.domains.set_phase(DomainPhase::Created);
    env.cluster
        .apply_deploy(&appid, &manifest::deploy_manifest(&appid, &default_spec()))
        .await
        .unwrap();
    env.cluster.set_deploy_status(ManifestPhase::Running);
    env.track(&appid);

    // The user deletes the application.
    env.store
        .set_application_state(&appid, DesiredState::Deleted)
        .unwrap();

    env.run_ticks(20).await;

    // Everything converged: records purged, infrastructure gone.
    assert!(env.store.get_application(&appid).await.unwrap().is_none());
    assert!(env.store.get_database(&appid).await.unwrap().is_none());
    assert!(!env.cluster.deploy_exists());
    assert!(!env.domains.exists());

    // The teardown ran in its defined order, cheap and local steps
    // before expensive external ones.
    let log = env.event_log();
    let position = |label: &str| {
        log.iter()
            .position(|e| e == label)
            .unwrap_or_else(|| panic!("missing event '{label}' in {log:?}"))
    };
    let triggers = position("triggers.remove");
    let functions = position("functions.remove");
    let configuration = position("configuration.remove");
    let bundle = position("bundle.delete");
    let domain = position("domain.delete");
    let deploy = position("deploy.delete");
    let bucket = position("bucket.delete");
    assert!(triggers < functions);
    assert!(functions < configuration);
    assert!(configuration < bundle);
    assert!(bundle < domain);
    assert!(domain < deploy);
    assert!(deploy < bucket);

    // Idempotency: replays re-check existence instead of re-deleting.
    assert_eq!(env.triggers.removals(), 1);
    assert_eq!(env.functions.removals(), 1);
    assert_eq!(env.configurations.removals(), 1);
    assert_eq!(*env.buckets.deletes.lock().unwrap(), 1);
    assert_eq!(
        log.iter().filter(|e| *e == "deploy.delete").count(),
        1,
        "cluster teardown must run exactly once"
    );
}

#[tokio::test]
async fn test_deleting_application_without_children_converges_directly() {
    let env = TestEnv::new(0, 0, 0);
    env.bundles.set_present(false);
    let appid = appid();
    env.store
        .insert_application(&appid, DesiredState::Deleted, ApplicationPhase::Stopped)
        .await
        .unwrap();
    env.track(&appid);

    env.run_ticks(4).await;

    assert!(env.store.get_application(&appid).await.unwrap().is_none());
    assert_eq!(*env.buckets.deletes.lock().unwrap(), 1);
    // No child resources existed, so no removal events were emitted.
    let log = env.event_log();
    assert!(!log.iter().any(|e| e.ends_with(".remove")));
}
