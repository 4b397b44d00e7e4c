// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared test environment: an in-memory store plus stateful mock
//! collaborators that record every infrastructure mutation in order.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use skiff_core::entities::DatabaseSpec;
use skiff_core::lock;
use skiff_core::persistence::MemoryStore;

use skiff_controller::application::{ApplicationServices, ApplicationTask};
use skiff_controller::database::DedicatedDatabaseTask;
use skiff_controller::error::Result;
use skiff_controller::manifest::{
    ClusterStatus, DeployManifest, ManifestPhase, OpsKind, OpsPhase, OpsRequestManifest,
};
use skiff_controller::replica_set::{ReplicaSetMember, ReplicaSetStatus};
use skiff_controller::services::{
    BucketService, BundleService, ClusterClient, ConfigurationService, DomainPhase, DomainService,
    FunctionService, Region, RegionService, RuntimeDomain, TriggerService,
};

/// Ordered log of infrastructure mutations across all mocks.
pub type Events = Arc<Mutex<Vec<String>>>;

pub fn healthy_replica_set() -> ReplicaSetStatus {
    ReplicaSetStatus {
        members: vec![
            ReplicaSetMember {
                healthy: true,
                primary: true,
            },
            ReplicaSetMember {
                healthy: true,
                primary: false,
            },
            ReplicaSetMember {
                healthy: true,
                primary: false,
            },
        ],
    }
}

pub fn default_spec() -> DatabaseSpec {
    DatabaseSpec {
        limit_cpu: 1000,
        limit_memory: 4096,
        replicas: 3,
        capacity: 10,
    }
}

pub struct MockRegions {
    region: Mutex<Option<Region>>,
}

#[async_trait]
impl RegionService for MockRegions {
    async fn find_by_appid(&self, _appid: &str) -> Result<Option<Region>> {
        Ok(self.region.lock().unwrap().clone())
    }
}

pub struct MockDomains {
    events: Events,
    domain: Mutex<Option<RuntimeDomain>>,
}

impl MockDomains {
    pub fn set_phase(&self, phase: DomainPhase) {
        if let Some(domain) = self.domain.lock().unwrap().as_mut() {
            domain.phase = phase;
        }
    }

    pub fn exists(&self) -> bool {
        self.domain.lock().unwrap().is_some()
    }
}

#[async_trait]
impl DomainService for MockDomains {
    async fn find(&self, _appid: &str) -> Result<Option<RuntimeDomain>> {
        Ok(self.domain.lock().unwrap().clone())
    }

    async fn create(&self, appid: &str) -> Result<RuntimeDomain> {
        self.events.lock().unwrap().push("domain.create".to_string());
        let domain = RuntimeDomain {
            appid: appid.to_string(),
            domain: format!("{appid}.test.skiff.dev"),
            phase: DomainPhase::Creating,
        };
        *self.domain.lock().unwrap() = Some(domain.clone());
        Ok(domain)
    }

    async fn delete(&self, _appid: &str) -> Result<()> {
        self.events.lock().unwrap().push("domain.delete".to_string());
        *self.domain.lock().unwrap() = None;
        Ok(())
    }
}

/// Counter-backed child-resource mock; logs removals under its label.
pub struct MockChildren {
    events: Events,
    label: &'static str,
    count: Mutex<u64>,
    pub removals: Mutex<u64>,
}

impl MockChildren {
    pub fn new(events: Events, label: &'static str, count: u64) -> Self {
        Self {
            events,
            label,
            count: Mutex::new(count),
            removals: Mutex::new(0),
        }
    }

    fn clear(&self) {
        self.events
            .lock()
            .unwrap()
            .push(format!("{}.remove", self.label));
        *self.count.lock().unwrap() = 0;
        *self.removals.lock().unwrap() += 1;
    }

    pub fn removals(&self) -> u64 {
        *self.removals.lock().unwrap()
    }
}

#[async_trait]
impl TriggerService for MockChildren {
    async fn count(&self, _appid: &str) -> Result<u64> {
        Ok(*self.count.lock().unwrap())
    }
    async fn remove_all(&self, _appid: &str) -> Result<()> {
        self.clear();
        Ok(())
    }
}

#[async_trait]
impl FunctionService for MockChildren {
    async fn count(&self, _appid: &str) -> Result<u64> {
        Ok(*self.count.lock().unwrap())
    }
    async fn remove_all(&self, _appid: &str) -> Result<()> {
        self.clear();
        Ok(())
    }
}

#[async_trait]
impl ConfigurationService for MockChildren {
    async fn count(&self, _appid: &str) -> Result<u64> {
        Ok(*self.count.lock().unwrap())
    }
    async fn remove(&self, _appid: &str) -> Result<()> {
        self.clear();
        Ok(())
    }
}

pub struct MockBundles {
    events: Events,
    present: Mutex<bool>,
    spec: Mutex<DatabaseSpec>,
}

impl MockBundles {
    pub fn set_present(&self, present: bool) {
        *self.present.lock().unwrap() = present;
    }

    pub fn set_spec(&self, spec: DatabaseSpec) {
        *self.spec.lock().unwrap() = spec;
    }
}

#[async_trait]
impl BundleService for MockBundles {
    async fn exists(&self, _appid: &str) -> Result<bool> {
        Ok(*self.present.lock().unwrap())
    }
    async fn delete(&self, _appid: &str) -> Result<()> {
        self.events.lock().unwrap().push("bundle.delete".to_string());
        *self.present.lock().unwrap() = false;
        Ok(())
    }
    async fn database_spec(&self, _appid: &str) -> Result<Option<DatabaseSpec>> {
        Ok(Some(*self.spec.lock().unwrap()))
    }
}

pub struct MockBuckets {
    events: Events,
    pub deletes: Mutex<u64>,
}

#[async_trait]
impl BucketService for MockBuckets {
    async fn delete_bucket(&self, _appid: &str) -> Result<()> {
        self.events.lock().unwrap().push("bucket.delete".to_string());
        *self.deletes.lock().unwrap() += 1;
        Ok(())
    }
}

#[derive(Default)]
struct ClusterState {
    deploy: Option<DeployManifest>,
    ops: HashMap<OpsKind, OpsRequestManifest>,
    replica_status: Option<ReplicaSetStatus>,
}

pub struct MockCluster {
    events: Events,
    state: Mutex<ClusterState>,
}

impl MockCluster {
    pub fn deploy_exists(&self) -> bool {
        self.state.lock().unwrap().deploy.is_some()
    }

    pub fn deploy_replicas(&self) -> Option<i32> {
        self.state
            .lock()
            .unwrap()
            .deploy
            .as_ref()
            .map(|m| m.spec.replicas)
    }

    pub fn set_deploy_status(&self, phase: ManifestPhase) {
        if let Some(deploy) = self.state.lock().unwrap().deploy.as_mut() {
            deploy.status = Some(ClusterStatus { phase });
        }
    }

    pub fn set_deploy_cpu(&self, cpu: &str) {
        if let Some(deploy) = self.state.lock().unwrap().deploy.as_mut() {
            deploy.spec.cpu = cpu.to_string();
        }
    }

    pub fn set_replica_status(&self, status: Option<ReplicaSetStatus>) {
        self.state.lock().unwrap().replica_status = status;
    }

    pub fn set_ops_status(&self, kind: OpsKind, phase: OpsPhase) {
        if let Some(ops) = self.state.lock().unwrap().ops.get_mut(&kind) {
            ops.status = Some(phase);
        }
    }

    pub fn ops_kinds(&self) -> Vec<OpsKind> {
        self.state.lock().unwrap().ops.keys().copied().collect()
    }
}

#[async_trait]
impl ClusterClient for MockCluster {
    async fn get_deploy(&self, _appid: &str) -> Result<Option<DeployManifest>> {
        Ok(self.state.lock().unwrap().deploy.clone())
    }

    async fn apply_deploy(&self, _appid: &str, manifest: &DeployManifest) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(format!("deploy.apply replicas={}", manifest.spec.replicas));
        self.state.lock().unwrap().deploy = Some(manifest.clone());
        Ok(())
    }

    async fn delete_deploy(&self, _appid: &str) -> Result<()> {
        self.events.lock().unwrap().push("deploy.delete".to_string());
        self.state.lock().unwrap().deploy = None;
        Ok(())
    }

    async fn get_ops_request(
        &self,
        _appid: &str,
        kind: OpsKind,
    ) -> Result<Option<OpsRequestManifest>> {
        Ok(self.state.lock().unwrap().ops.get(&kind).cloned())
    }

    async fn apply_ops_request(&self, _appid: &str, manifest: &OpsRequestManifest) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(format!("ops.apply {}", manifest.kind));
        self.state
            .lock()
            .unwrap()
            .ops
            .insert(manifest.kind, manifest.clone());
        Ok(())
    }

    async fn delete_ops_request(&self, _appid: &str, kind: OpsKind) -> Result<()> {
        self.events.lock().unwrap().push(format!("ops.delete {kind}"));
        self.state.lock().unwrap().ops.remove(&kind);
        Ok(())
    }

    async fn replica_set_status(&self, _appid: &str) -> Result<Option<ReplicaSetStatus>> {
        Ok(self.state.lock().unwrap().replica_status.clone())
    }
}

/// Full reconciler environment over the in-memory store.
pub struct TestEnv {
    pub store: Arc<MemoryStore>,
    pub domains: Arc<MockDomains>,
    pub triggers: Arc<MockChildren>,
    pub functions: Arc<MockChildren>,
    pub configurations: Arc<MockChildren>,
    pub bundles: Arc<MockBundles>,
    pub buckets: Arc<MockBuckets>,
    pub cluster: Arc<MockCluster>,
    pub events: Events,
    pub app_task: ApplicationTask,
    pub db_task: DedicatedDatabaseTask,
    appids: Mutex<Vec<String>>,
}

impl TestEnv {
    /// Environment with the given child-resource counts and a present
    /// bundle.
    pub fn new(triggers: u64, functions: u64, configurations: u64) -> Self {
        let events: Events = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::new(MemoryStore::new());
        let domains = Arc::new(MockDomains {
            events: events.clone(),
            domain: Mutex::new(None),
        });
        let triggers = Arc::new(MockChildren::new(events.clone(), "triggers", triggers));
        let functions = Arc::new(MockChildren::new(events.clone(), "functions", functions));
        let configurations = Arc::new(MockChildren::new(
            events.clone(),
            "configuration",
            configurations,
        ));
        let bundles = Arc::new(MockBundles {
            events: events.clone(),
            present: Mutex::new(true),
            spec: Mutex::new(default_spec()),
        });
        let buckets = Arc::new(MockBuckets {
            events: events.clone(),
            deletes: Mutex::new(0),
        });
        let cluster = Arc::new(MockCluster {
            events: events.clone(),
            state: Mutex::new(ClusterState::default()),
        });

        let services = ApplicationServices {
            regions: Arc::new(MockRegions {
                region: Mutex::new(Some(Region {
                    name: "eu-central-1".to_string(),
                })),
            }),
            domains: domains.clone(),
            triggers: triggers.clone(),
            functions: functions.clone(),
            configurations: configurations.clone(),
            bundles: bundles.clone(),
            buckets: buckets.clone(),
        };

        let app_task = ApplicationTask::new(store.clone(), services);
        let db_task =
            DedicatedDatabaseTask::new(store.clone(), cluster.clone(), bundles.clone());

        Self {
            store,
            domains,
            triggers,
            functions,
            configurations,
            bundles,
            buckets,
            cluster,
            events,
            app_task,
            db_task,
            appids: Mutex::new(Vec::new()),
        }
    }

    /// Register an appid for lock releasing between ticks.
    pub fn track(&self, appid: &str) {
        self.appids.lock().unwrap().push(appid.to_string());
    }

    /// Run both reconcilers for `ticks` rounds, releasing all locks
    /// between rounds so the next round can claim immediately (the test
    /// equivalent of waiting out a relock delay).
    pub async fn run_ticks(&self, ticks: usize) {
        for _ in 0..ticks {
            self.app_task.tick().await;
            self.db_task.tick().await;
            self.release_locks();
        }
    }

    fn release_locks(&self) {
        for appid in self.appids.lock().unwrap().iter() {
            // Records may already be garbage-collected.
            let _ = self.store.set_application_lock(appid, lock::LOCK_INIT_TIME);
            let _ = self.store.set_database_lock(appid, lock::LOCK_INIT_TIME);
        }
    }

    /// Snapshot of the ordered mutation log.
    pub fn event_log(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}
