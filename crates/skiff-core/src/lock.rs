// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Lock-and-claim timestamp math.
//!
//! Mutual exclusion across control-plane replicas is encoded entirely in
//! the `locked_at` timestamp of a record. A record is claimable when
//! `locked_at < now - LOCK_TIMEOUT`; claiming sets `locked_at = now`
//! atomically. Every backend derives its lock timestamps from the pure
//! functions in this module so the protocol stays identical everywhere.
//!
//! The relock backoff adapts the retry cadence to how long a record has
//! been waiting since its last phase transition: retries start almost
//! immediately after a transition (`waiting / 10`, rounded up) and decay
//! to the full lock-window cadence once a record has been pending for
//! more than two minutes.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

/// How long a claim is held before the record becomes claimable again.
///
/// Expiry of this window is the sole crash-recovery mechanism: there is
/// no heartbeat and no liveness check.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(15);

/// Sentinel for `locked_at` meaning "unlocked, never contended".
pub const LOCK_INIT_TIME: DateTime<Utc> = DateTime::<Utc>::UNIX_EPOCH;

/// Waiting time beyond which the relock delay clamps to the full window.
const BACKOFF_CEILING_MS: i64 = 2 * 60 * 1000;

/// Milliseconds until a relocked record becomes claimable again.
///
/// `waiting_ms` is the time since the record's last phase transition.
/// Negative values (clock skew) are treated as zero.
pub fn retry_delay_ms(waiting_ms: i64) -> i64 {
    let waiting = waiting_ms.max(0);
    if waiting <= BACKOFF_CEILING_MS {
        (waiting as u64).div_ceil(10) as i64
    } else {
        LOCK_TIMEOUT.as_millis() as i64
    }
}

/// Claim eligibility cutoff: records with `locked_at` strictly before
/// this instant are claimable.
pub fn claim_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - ChronoDuration::seconds(LOCK_TIMEOUT.as_secs() as i64)
}

/// Lock timestamp that makes a record claimable again after the adaptive
/// retry delay for `waiting_ms`.
///
/// The returned timestamp satisfies
/// `relock_timestamp + LOCK_TIMEOUT == now + retry_delay`, so the claim
/// filter becomes true again after exactly `retry_delay_ms(waiting_ms)`.
pub fn relock_timestamp(now: DateTime<Utc>, waiting_ms: i64) -> DateTime<Utc> {
    let delay = retry_delay_ms(waiting_ms);
    now - ChronoDuration::milliseconds(LOCK_TIMEOUT.as_millis() as i64)
        + ChronoDuration::milliseconds(delay)
}

/// Lock timestamp that makes a record immediately claimable on the next
/// tick.
pub fn unlock_timestamp(now: DateTime<Utc>) -> DateTime<Utc> {
    now - ChronoDuration::seconds(LOCK_TIMEOUT.as_secs() as i64 + 1)
}
