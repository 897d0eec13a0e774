//! HATM State Reconciler
//!
//! One coherent, queryable view of every wallet's staking state, merged
//! from three independent and partially-overlapping feeds:
//!
//! - the **log listener** (push, on-chain truth with heuristic parsing),
//! - the **webhook ingestor** (push, third-party delivery),
//! - **ledger polling** (pull, authoritative absolute reads).
//!
//! The cache is the only mutable shared state in the workspace.  Event
//! producers call [`cache::StakeCache::apply`]; polling flows call
//! [`cache::StakeCache::sync`]; query handlers read.  Applies for the same
//! wallet are serialized (the map's shard entry lock is held for the whole
//! mutation), applies for different wallets proceed in parallel.
//!
//! ## Crate modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`event`]   | Typed events produced by the listener and the ingestor |
//! | [`record`]  | Per-wallet `StakeRecord`, data-source tag, staleness |
//! | [`cache`]   | The keyed store and its merge policy |
//! | [`metrics`] | Counters for applies, conflicts and discards |

pub mod cache;
pub mod event;
pub mod metrics;
pub mod record;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix timestamp in seconds.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or_default()
}
