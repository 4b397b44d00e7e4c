// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Skiff Core - Control-Plane Data Model & Coordination Substrate
//!
//! This crate provides the shared foundation for the skiff control plane:
//! the `Application` and `DedicatedDatabase` records, the timestamp-based
//! lock-and-claim primitive, and the persistence backends the reconcilers
//! coordinate through.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     Control-Plane Replicas (N)                      │
//! │            (skiff-controller reconciler tick loops)                 │
//! └─────────────────────────────────────────────────────────────────────┘
//!             │ claim / advance / relock / unlock / sweep
//!             ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      skiff-core (This Crate)                        │
//! │   Entities · Lock math · Store trait · Postgres/Memory backends     │
//! └─────────────────────────────────────────────────────────────────────┘
//!             │
//!             ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           PostgreSQL                                │
//! │            (applications, dedicated_databases tables)               │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Locking Protocol
//!
//! There is no lock service and no job queue. Mutual exclusion across an
//! arbitrary number of control-plane replicas rests on a single atomic
//! filter-and-update against the store:
//!
//! 1. **Claim**: atomically pick the oldest record in the target phase
//!    whose `locked_at` is older than `now - LOCK_TIMEOUT`, ordered by
//!    `(locked_at, updated_at)`, and set `locked_at = now` in the same
//!    statement. Losers of the race match zero rows.
//! 2. **Hold window**: a claim is valid for [`lock::LOCK_TIMEOUT`]. A
//!    claimant that crashes simply lets the window expire; expiry is the
//!    only crash-recovery mechanism.
//! 3. **Relock**: a handler that wants to yield early rewinds `locked_at`
//!    so the record becomes claimable again after an adaptive delay
//!    derived from how long the record has been waiting since its last
//!    phase transition. Fresh transitions retry sub-second; stale records
//!    decay to the full window cadence.
//! 4. **Unlock**: rewinding `locked_at` past the window makes a record
//!    immediately claimable on the next tick.
//!
//! Records that have never been contended carry the epoch sentinel
//! [`lock::LOCK_INIT_TIME`] in `locked_at`.
//!
//! # Entities
//!
//! | Field        | Meaning                                                |
//! |--------------|--------------------------------------------------------|
//! | `appid`      | Stable correlation key across all subsystems           |
//! | `state`      | User-declared intent (`Running`, `Stopped`, ...)       |
//! | `phase`      | Reconciler-owned, forward-only progress marker         |
//! | `locked_at`  | Mutual-exclusion timestamp, never a business field     |
//! | `updated_at` | Last phase transition, feeds the relock backoff        |
//!
//! The reconcilers own every `phase`/`locked_at` mutation. Other
//! subsystems may read records and write `state` (intent), never `phase`.
//!
//! # Modules
//!
//! - [`entities`]: record types, phase/state enums, desired database spec
//! - [`lock`]: lock timeout, epoch sentinel, backoff/relock timestamp math
//! - [`persistence`]: `Store` trait and the Postgres/in-memory backends
//! - [`config`]: environment-variable configuration
//! - [`error`]: crate error type
//! - [`migrations`]: embedded PostgreSQL migrations

#![deny(missing_docs)]

/// Environment-variable configuration for control-plane processes.
pub mod config;

/// Application and dedicated-database records, phases, states.
pub mod entities;

/// Error types for store and coordination operations.
pub mod error;

/// Lock-and-claim timestamp math shared by every backend.
pub mod lock;

/// Embedded PostgreSQL migrations.
pub mod migrations;

/// Store trait and backends.
pub mod persistence;
