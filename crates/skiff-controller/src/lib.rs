// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Skiff Controller - Reconciliation Engine
//!
//! This crate converges application-hosting infrastructure toward
//! user-declared intent. A fixed-interval tick drives two reconcilers,
//! each of which atomically claims at most one eligible record per tick
//! and performs one bounded, idempotent step of convergence. All mutable
//! state lives in the store, so any number of control-plane replicas can
//! run the same loop; mutual exclusion rests entirely on skiff-core's
//! lock-and-claim primitive.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                  skiff-controller (This Crate)                      │
//! │   ┌─────────────────────┐        ┌──────────────────────────┐       │
//! │   │  Application Task   │        │  DedicatedDatabase Task  │       │
//! │   │  Creating/Deleting  │        │  Starting/Stopping/      │       │
//! │   │  + state sweeps     │        │  Deleting/Restarting     │       │
//! │   └─────────────────────┘        └──────────────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────┘
//!       │ claim/advance/relock        │ manifests, ops-requests, probes
//!       ▼                             ▼
//! ┌───────────────────┐        ┌──────────────────────────────────────┐
//! │    skiff-core     │        │      External Collaborators          │
//! │  Store (Postgres) │        │  cluster · gateway · child services  │
//! └───────────────────┘        └──────────────────────────────────────┘
//! ```
//!
//! # Application Phase Machine
//!
//! ```text
//!  Creating ──► Created ──► Started ◄──► Stopped
//!                  │            │            │
//!                  └────────────┼────────────┘     (state = Deleted)
//!                               ▼
//!                           Deleting ──► Deleted ──► (row removed)
//! ```
//!
//! # Dedicated-Database Phase Machine
//!
//! ```text
//!  Starting ──► Started ──► Stopping ──► Stopped
//!     ▲            │▲                       │
//!     │            ▼│  (state = Restarting) │  (state = Running)
//!     │        Restarting                   │
//!     └─────────────────────────────────────┘
//!
//!  {Starting, Stopping, Started, Stopped} ──► Deleting ──► Deleted
//! ```
//!
//! # Convergence Model
//!
//! Convergence is level-based: every step re-reads live infrastructure
//! state instead of assuming the previous tick succeeded. Handlers
//! release their claim between steps — either unconditionally (retry
//! next tick) or with the adaptive backoff that polls fast right after a
//! transition and decays to the lock-window cadence for records stuck on
//! slow infrastructure. A handler that fails or crashes just leaves its
//! record locked until the window expires; every step is an idempotent
//! existence check, so replays are safe.
//!
//! # Modules
//!
//! - [`application`]: the Application reconciler
//! - [`database`]: the DedicatedDatabase reconciler
//! - [`drift`]: per-axis drift detection against the desired spec
//! - [`manifest`]: declarative cluster/ops-request descriptions
//! - [`quantity`]: resource-quantity normalization
//! - [`replica_set`]: replica-set health evaluation
//! - [`runtime`]: embeddable tick-loop runtime
//! - [`services`]: external-collaborator interfaces
//! - [`error`]: reconciler error type

#![deny(missing_docs)]

/// Application reconciler: Creating/Deleting phases plus state sweeps.
pub mod application;

/// Dedicated-database reconciler: lifecycle phases and drift convergence.
pub mod database;

/// Drift detection between desired spec and live manifest.
pub mod drift;

/// Reconciler error types.
pub mod error;

/// Declarative manifest model and operation kinds.
pub mod manifest;

/// Kubernetes-style quantity parsing.
pub mod quantity;

/// Replica-set health evaluation.
pub mod replica_set;

/// Embeddable reconciler runtime.
pub mod runtime;

/// External-collaborator interfaces.
pub mod services;
