//! Per-wallet staking state as the cache holds it.

use {crate::event::EventSource, serde::{Deserialize, Serialize}};

/// Age beyond which a cached record is flagged stale on read.
pub const STALENESS_THRESHOLD_SECS: i64 = 300;

/// Where a record's current values came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    /// Last written by the log listener.
    OnChain,
    /// Last written by the webhook ingestor.
    Webhook,
    /// Last written by a direct ledger read.
    Polled,
    /// Never written — a zero-valued placeholder.
    Default,
}

impl From<EventSource> for DataSource {
    fn from(source: EventSource) -> Self {
        match source {
            EventSource::OnChain => DataSource::OnChain,
            EventSource::Webhook => DataSource::Webhook,
            EventSource::Polled => DataSource::Polled,
        }
    }
}

/// One wallet's reconciled staking state.
///
/// Records are never deleted; `amount_staked` is clamped at zero instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakeRecord {
    /// Base units currently staked.
    pub amount_staked: u64,
    /// Estimated unclaimed rewards in base units.
    pub pending_rewards: u64,
    /// Unix timestamp of the first nonzero stake; 0 until then.  Later
    /// stakes do not move it.
    pub staked_at: i64,
    /// Unix timestamp of the last accepted update.
    pub last_update_time: i64,
    /// Seconds until the position unlocks, when currently locked.
    pub time_until_unlock: Option<i64>,
    /// Estimated annual percentage yield, from program parameters.
    pub estimated_apy: f64,
    /// Which feed last wrote this record.
    pub data_source: DataSource,
}

impl StakeRecord {
    /// A zero-valued record created on first sight of a wallet.
    pub fn empty(now: i64) -> Self {
        Self {
            amount_staked: 0,
            pending_rewards: 0,
            staked_at: 0,
            last_update_time: now,
            time_until_unlock: None,
            estimated_apy: 0.0,
            data_source: DataSource::Default,
        }
    }

    /// Whether this record is older than the staleness threshold.
    ///
    /// Stale records are still served — callers use this flag to prefer a
    /// fresher source, never to hide data.
    pub fn is_stale(&self, now: i64) -> bool {
        now.saturating_sub(self.last_update_time) > STALENESS_THRESHOLD_SECS
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
