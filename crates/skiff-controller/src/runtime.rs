// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embeddable reconciler runtime.
//!
//! This module provides [`ReconcilerRuntime`] which runs the reconciler
//! tick loop inside an existing tokio application. The control-plane
//! host supplies the store and collaborator implementations; the runtime
//! owns nothing but the loop, so any number of replicas can run the same
//! loop against the same store.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use skiff_controller::runtime::ReconcilerRuntime;
//! use skiff_core::persistence::PostgresStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pool = sqlx::PgPool::connect("postgres://...").await?;
//!     skiff_core::migrations::run_postgres(&pool).await?;
//!
//!     let runtime = ReconcilerRuntime::builder()
//!         .store(Arc::new(PostgresStore::new(pool)))
//!         .services(my_services())
//!         .cluster(my_cluster_client())
//!         .build()?
//!         .start();
//!
//!     // ... run your application ...
//!
//!     runtime.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info};

use skiff_core::config::Config;
use skiff_core::persistence::Store;

use crate::application::{ApplicationServices, ApplicationTask};
use crate::database::DedicatedDatabaseTask;
use crate::services::ClusterClient;

/// Default interval between reconciler ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Builder for creating a [`ReconcilerRuntime`].
pub struct ReconcilerRuntimeBuilder {
    store: Option<Arc<dyn Store>>,
    services: Option<ApplicationServices>,
    cluster: Option<Arc<dyn ClusterClient>>,
    tick_interval: Duration,
    disable_application_task: bool,
    disable_database_task: bool,
}

impl std::fmt::Debug for ReconcilerRuntimeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcilerRuntimeBuilder")
            .field("store", &self.store.as_ref().map(|_| "..."))
            .field("services", &self.services.as_ref().map(|_| "..."))
            .field("cluster", &self.cluster.as_ref().map(|_| "..."))
            .field("tick_interval", &self.tick_interval)
            .field("disable_application_task", &self.disable_application_task)
            .field("disable_database_task", &self.disable_database_task)
            .finish()
    }
}

impl Default for ReconcilerRuntimeBuilder {
    fn default() -> Self {
        Self {
            store: None,
            services: None,
            cluster: None,
            tick_interval: DEFAULT_TICK_INTERVAL,
            disable_application_task: false,
            disable_database_task: false,
        }
    }
}

impl ReconcilerRuntimeBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the store (required).
    pub fn store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the collaborator services (required).
    pub fn services(mut self, services: ApplicationServices) -> Self {
        self.services = Some(services);
        self
    }

    /// Set the cluster client (required).
    pub fn cluster(mut self, cluster: Arc<dyn ClusterClient>) -> Self {
        self.cluster = Some(cluster);
        self
    }

    /// Set the tick interval.
    ///
    /// Default: 1 second.
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Skip the application reconciler entirely.
    pub fn disable_application_task(mut self, disable: bool) -> Self {
        self.disable_application_task = disable;
        self
    }

    /// Skip the dedicated-database reconciler entirely.
    pub fn disable_database_task(mut self, disable: bool) -> Self {
        self.disable_database_task = disable;
        self
    }

    /// Apply the tick interval and disable flags from a loaded
    /// [`Config`].
    pub fn with_config(mut self, config: &Config) -> Self {
        self.tick_interval = config.tick_interval;
        self.disable_application_task = config.disable_application_task;
        self.disable_database_task = config.disable_database_task;
        self
    }

    /// Build the runtime configuration.
    ///
    /// Returns an error if required fields are missing.
    pub fn build(self) -> Result<ReconcilerRuntimeConfig> {
        let store = self.store.ok_or_else(|| anyhow::anyhow!("store is required"))?;
        let services = self
            .services
            .ok_or_else(|| anyhow::anyhow!("services are required"))?;
        let cluster = self
            .cluster
            .ok_or_else(|| anyhow::anyhow!("cluster client is required"))?;

        Ok(ReconcilerRuntimeConfig {
            store,
            services,
            cluster,
            tick_interval: self.tick_interval,
            disable_application_task: self.disable_application_task,
            disable_database_task: self.disable_database_task,
        })
    }
}

/// Configuration for a [`ReconcilerRuntime`].
pub struct ReconcilerRuntimeConfig {
    store: Arc<dyn Store>,
    services: ApplicationServices,
    cluster: Arc<dyn ClusterClient>,
    tick_interval: Duration,
    disable_application_task: bool,
    disable_database_task: bool,
}

impl std::fmt::Debug for ReconcilerRuntimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcilerRuntimeConfig")
            .field("tick_interval", &self.tick_interval)
            .field("disable_application_task", &self.disable_application_task)
            .field("disable_database_task", &self.disable_database_task)
            .finish_non_exhaustive()
    }
}

impl ReconcilerRuntimeConfig {
    /// Start the runtime, spawning the tick loop task.
    pub fn start(self) -> ReconcilerRuntime {
        let application = if self.disable_application_task {
            info!("application reconciler disabled by configuration");
            None
        } else {
            Some(ApplicationTask::new(self.store.clone(), self.services.clone()))
        };

        let database = if self.disable_database_task {
            info!("database reconciler disabled by configuration");
            None
        } else {
            Some(DedicatedDatabaseTask::new(
                self.store.clone(),
                self.cluster.clone(),
                self.services.bundles.clone(),
            ))
        };

        let shutdown = Arc::new(Notify::new());
        let handle = tokio::spawn(run_tick_loop(
            application,
            database,
            self.tick_interval,
            shutdown.clone(),
        ));

        info!(
            tick_interval_ms = self.tick_interval.as_millis() as u64,
            "Reconciler runtime started"
        );

        ReconcilerRuntime { handle, shutdown }
    }
}

/// A running reconciler loop that can be embedded in an application.
///
/// Call [`shutdown`](Self::shutdown) for graceful termination; an
/// abandoned replica is also safe to kill, since any claim it holds
/// expires on its own.
pub struct ReconcilerRuntime {
    handle: JoinHandle<()>,
    shutdown: Arc<Notify>,
}

impl ReconcilerRuntime {
    /// Create a new builder for configuring the runtime.
    pub fn builder() -> ReconcilerRuntimeBuilder {
        ReconcilerRuntimeBuilder::new()
    }

    /// Check if the tick loop is still running.
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Gracefully shut down the runtime: stop ticking and wait for the
    /// loop to exit.
    pub async fn shutdown(self) -> Result<()> {
        info!("Reconciler runtime shutting down...");
        self.shutdown.notify_one();

        match self.handle.await {
            Ok(()) => {
                info!("Reconciler runtime shutdown complete");
                Ok(())
            }
            Err(e) => {
                error!("Reconciler tick loop panicked: {}", e);
                Err(anyhow::anyhow!("tick loop panicked: {}", e))
            }
        }
    }
}

/// Run the tick loop until shutdown is signalled.
async fn run_tick_loop(
    application: Option<ApplicationTask>,
    database: Option<DedicatedDatabaseTask>,
    tick_interval: Duration,
    shutdown: Arc<Notify>,
) {
    loop {
        tokio::select! {
            biased;

            _ = shutdown.notified() => {
                info!("Reconciler tick loop received shutdown signal");
                break;
            }

            _ = tokio::time::sleep(tick_interval) => {
                if let Some(task) = &application {
                    task.tick().await;
                }
                if let Some(task) = &database {
                    task.tick().await;
                }
            }
        }
    }

    info!("Reconciler tick loop stopped");
}
