//! The keyed store and its merge policy.
//!
//! ## Merge policy
//!
//! The cache never overwrites a stored amount with an incoming event's
//! amount.  `Stake` is additive, `Unstake` subtractive clamped at zero,
//! `Claim` zeroes the pending rewards.  Feeds report *changes*; only a
//! direct ledger read reports absolute state, and that flows through
//! [`StakeCache::sync`] instead.
//!
//! ## Ordering
//!
//! Applies for one wallet must not race: `Stake(100)` and `Unstake(40)`
//! arriving simultaneously from the listener and the webhook must both
//! land, in the order the cache accepts them, or the final amount is
//! wrong.  Every mutation here runs under the wallet's shard entry lock
//! for its whole duration, which serializes same-wallet applies and leaves
//! cross-wallet applies fully parallel.

use {
    crate::{
        event::{EventKind, StakeEvent},
        metrics::ReconcilerMetrics,
        record::{StakeRecord, STALENESS_THRESHOLD_SECS},
    },
    dashmap::DashMap,
    log::{debug, warn},
    parking_lot::Mutex,
    solana_pubkey::Pubkey,
    std::collections::{HashSet, VecDeque},
};

/// How many recent event signatures are remembered for dedup.
const SEEN_SIGNATURE_WINDOW: usize = 1024;

/// Bounded window of recently applied event signatures.
#[derive(Default)]
struct SeenSignatures {
    order: VecDeque<String>,
    set: HashSet<String>,
}

impl SeenSignatures {
    /// Record `signature`; returns `false` when it was already present.
    fn insert(&mut self, signature: &str) -> bool {
        if signature.is_empty() {
            // No dedup key — accept.
            return true;
        }
        if self.set.contains(signature) {
            return false;
        }
        if self.order.len() >= SEEN_SIGNATURE_WINDOW {
            if let Some(evicted) = self.order.pop_front() {
                self.set.remove(&evicted);
            }
        }
        self.order.push_back(signature.to_string());
        self.set.insert(signature.to_string());
        true
    }
}

/// The reconciled per-wallet staking view.
pub struct StakeCache {
    records: DashMap<Pubkey, StakeRecord>,
    seen: Mutex<SeenSignatures>,
    /// Counters exposed to the service layer.
    pub metrics: ReconcilerMetrics,
    staleness_threshold: i64,
}

impl Default for StakeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StakeCache {
    /// Empty cache with the standard staleness threshold.
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            seen: Mutex::new(SeenSignatures::default()),
            metrics: ReconcilerMetrics::default(),
            staleness_threshold: STALENESS_THRESHOLD_SECS,
        }
    }

    /// Cache with a custom threshold, for tests.
    pub fn with_staleness_threshold(staleness_threshold: i64) -> Self {
        Self {
            staleness_threshold,
            ..Self::new()
        }
    }

    /// Merge one event and return the resulting record.
    ///
    /// `Unknown` events and duplicate signatures are discarded (counted and
    /// logged); the stored record is returned unchanged in both cases.
    pub fn apply(&self, event: &StakeEvent) -> StakeRecord {
        if event.kind == EventKind::Unknown {
            debug!(
                "discarding unclassifiable event {} for {}",
                event.signature, event.wallet
            );
            self.metrics.unknown_discarded.inc();
            return self.peek_or_empty(&event.wallet, event.observed_at);
        }
        if !self.seen.lock().insert(&event.signature) {
            warn!(
                "reconciliation conflict: duplicate event {} for {}, discarding",
                event.signature, event.wallet
            );
            self.metrics.duplicates_discarded.inc();
            return self.peek_or_empty(&event.wallet, event.observed_at);
        }

        let mut entry = self
            .records
            .entry(event.wallet)
            .or_insert_with(|| StakeRecord::empty(event.observed_at));
        let record = entry.value_mut();
        match event.kind {
            EventKind::Stake => {
                record.amount_staked = record.amount_staked.saturating_add(event.amount);
                if record.staked_at == 0 && event.amount > 0 {
                    record.staked_at = event.observed_at;
                }
            }
            EventKind::Unstake => {
                record.amount_staked = record.amount_staked.saturating_sub(event.amount);
            }
            EventKind::Claim => {
                record.pending_rewards = 0;
            }
            EventKind::Unknown => unreachable!("discarded above"),
        }
        record.last_update_time = event.observed_at;
        record.data_source = event.source.into();
        self.metrics.events_applied.inc();
        debug!(
            "applied {} {} for {} → {} staked",
            event.kind, event.amount, event.wallet, record.amount_staked
        );
        record.clone()
    }

    /// Overwrite a wallet's record with an authoritative ledger snapshot.
    ///
    /// Polling reports absolute state, so it must not go through the
    /// additive merge — a poll seeing `amount_staked = 500` right after a
    /// webhook `Stake(500)` describes the same tokens, not 500 more.
    pub fn sync(&self, wallet: Pubkey, snapshot: StakeRecord) -> StakeRecord {
        self.metrics.syncs.inc();
        self.records.insert(wallet, snapshot.clone());
        snapshot
    }

    /// Read a wallet's record; `None` when the wallet has never been seen.
    ///
    /// A stale record is still returned — flagged via
    /// [`StakeRecord::is_stale`] and logged so higher layers can prefer a
    /// fresh ledger read.
    pub fn get(&self, wallet: &Pubkey, now: i64) -> Option<StakeRecord> {
        let record = self.records.get(wallet)?.clone();
        if now.saturating_sub(record.last_update_time) > self.staleness_threshold {
            warn!(
                "serving stale record for {wallet} (last update {}s ago)",
                now.saturating_sub(record.last_update_time)
            );
            self.metrics.stale_reads.inc();
        }
        Some(record)
    }

    /// Read a wallet's record, creating the zero-valued placeholder on
    /// first sight.
    pub fn get_or_default(&self, wallet: &Pubkey, now: i64) -> StakeRecord {
        if let Some(record) = self.get(wallet, now) {
            return record;
        }
        self.records
            .entry(*wallet)
            .or_insert_with(|| StakeRecord::empty(now))
            .clone()
    }

    /// Number of wallets with any record.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the cache holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Cache-wide totals: `(total_staked, wallets_with_nonzero_stake)`.
    ///
    /// Fallback for vault statistics when the global-state account cannot
    /// be read.
    pub fn aggregate_totals(&self) -> (u64, u64) {
        let mut total = 0u64;
        let mut stakers = 0u64;
        for entry in self.records.iter() {
            if entry.amount_staked > 0 {
                total = total.saturating_add(entry.amount_staked);
                stakers = stakers.saturating_add(1);
            }
        }
        (total, stakers)
    }

    /// Read without creating or dedup-marking anything.
    fn peek_or_empty(&self, wallet: &Pubkey, now: i64) -> StakeRecord {
        self.records
            .get(wallet)
            .map(|entry| entry.clone())
            .unwrap_or_else(|| StakeRecord::empty(now))
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{event::EventSource, record::DataSource},
    };

    fn event(kind: EventKind, wallet: Pubkey, amount: u64, sig: &str, at: i64) -> StakeEvent {
        StakeEvent::new(kind, wallet, amount, sig, at, EventSource::OnChain)
    }

    #[test]
    fn test_accounting_conservation() {
        let cache = StakeCache::new();
        let wallet = Pubkey::new_unique();
        cache.apply(&event(EventKind::Stake, wallet, 100, "a", 1));
        cache.apply(&event(EventKind::Stake, wallet, 250, "b", 2));
        let record = cache.apply(&event(EventKind::Unstake, wallet, 40, "c", 3));
        // max(0, 100 + 250 - 40)
        assert_eq!(record.amount_staked, 310);
    }

    #[test]
    fn test_unstake_clamps_at_zero() {
        let cache = StakeCache::new();
        let wallet = Pubkey::new_unique();
        let record = cache.apply(&event(EventKind::Unstake, wallet, 40, "a", 1));
        assert_eq!(record.amount_staked, 0);
    }

    #[test]
    fn test_commutative_pairs_reach_same_final_amount() {
        let first = StakeCache::new();
        let second = StakeCache::new();
        let wallet = Pubkey::new_unique();

        first.apply(&event(EventKind::Stake, wallet, 100, "a", 1));
        first.apply(&event(EventKind::Unstake, wallet, 40, "b", 2));

        // Reversed order: the unstake lands on an empty record and clamps,
        // so the intermediate value differs but the policy still converges
        // once both events are in.
        second.apply(&event(EventKind::Unstake, wallet, 40, "b", 1));
        let reversed = second.apply(&event(EventKind::Stake, wallet, 100, "a", 2));
        assert_eq!(reversed.amount_staked, 100);

        let ordered = first.get(&wallet, 3).unwrap();
        assert_eq!(ordered.amount_staked, 60);
    }

    #[test]
    fn test_staked_at_set_once() {
        let cache = StakeCache::new();
        let wallet = Pubkey::new_unique();
        cache.apply(&event(EventKind::Stake, wallet, 100, "a", 1_000));
        cache.apply(&event(EventKind::Stake, wallet, 100, "b", 2_000));
        let record = cache.get(&wallet, 2_000).unwrap();
        assert_eq!(record.staked_at, 1_000);
        assert_eq!(record.last_update_time, 2_000);
    }

    #[test]
    fn test_claim_resets_pending_rewards_only() {
        let cache = StakeCache::new();
        let wallet = Pubkey::new_unique();
        cache.apply(&event(EventKind::Stake, wallet, 500, "a", 1));
        // Install pending rewards via an authoritative sync.
        let mut snapshot = cache.get(&wallet, 1).unwrap();
        snapshot.pending_rewards = 77;
        cache.sync(wallet, snapshot);

        let record = cache.apply(&event(EventKind::Claim, wallet, 0, "b", 2));
        assert_eq!(record.pending_rewards, 0);
        assert_eq!(record.amount_staked, 500);
    }

    #[test]
    fn test_duplicate_signature_discarded() {
        let cache = StakeCache::new();
        let wallet = Pubkey::new_unique();
        cache.apply(&event(EventKind::Stake, wallet, 100, "dup", 1));
        let record = cache.apply(&event(EventKind::Stake, wallet, 100, "dup", 2));
        assert_eq!(record.amount_staked, 100);
        assert_eq!(cache.metrics.duplicates_discarded.get(), 1);
        // The discarded event must not touch the update time either.
        assert_eq!(record.last_update_time, 1);
    }

    #[test]
    fn test_unknown_event_discarded() {
        let cache = StakeCache::new();
        let wallet = Pubkey::new_unique();
        let record = cache.apply(&event(EventKind::Unknown, wallet, 9, "x", 1));
        assert_eq!(record.amount_staked, 0);
        assert_eq!(cache.metrics.unknown_discarded.get(), 1);
        assert!(cache.get(&wallet, 1).is_none());
    }

    #[test]
    fn test_source_overwritten_on_every_apply() {
        let cache = StakeCache::new();
        let wallet = Pubkey::new_unique();
        cache.apply(&StakeEvent::new(
            EventKind::Stake,
            wallet,
            500,
            "a",
            1,
            EventSource::Webhook,
        ));
        assert_eq!(cache.get(&wallet, 1).unwrap().data_source, DataSource::Webhook);

        cache.apply(&StakeEvent::new(
            EventKind::Unstake,
            wallet,
            200,
            "b",
            2,
            EventSource::OnChain,
        ));
        let record = cache.get(&wallet, 2).unwrap();
        assert_eq!(record.data_source, DataSource::OnChain);
        assert_eq!(record.amount_staked, 300);
    }

    #[test]
    fn test_sync_overwrites_absolutely() {
        let cache = StakeCache::new();
        let wallet = Pubkey::new_unique();
        cache.apply(&StakeEvent::new(
            EventKind::Stake,
            wallet,
            500,
            "a",
            1,
            EventSource::Webhook,
        ));

        // A poll reporting the same 500 must not double the amount.
        let mut snapshot = cache.get(&wallet, 1).unwrap();
        snapshot.data_source = DataSource::Polled;
        snapshot.last_update_time = 2;
        let record = cache.sync(wallet, snapshot);
        assert_eq!(record.amount_staked, 500);
        assert_eq!(record.data_source, DataSource::Polled);
    }

    #[test]
    fn test_stale_read_still_served() {
        let cache = StakeCache::new();
        let wallet = Pubkey::new_unique();
        cache.apply(&event(EventKind::Stake, wallet, 100, "a", 1_000));

        let record = cache.get(&wallet, 1_000 + STALENESS_THRESHOLD_SECS + 60).unwrap();
        assert_eq!(record.amount_staked, 100);
        assert!(record.is_stale(1_000 + STALENESS_THRESHOLD_SECS + 60));
        assert_eq!(cache.metrics.stale_reads.get(), 1);

        // A fresh read is not counted.
        let record = cache.get(&wallet, 1_001).unwrap();
        assert!(!record.is_stale(1_001));
        assert_eq!(cache.metrics.stale_reads.get(), 1);
    }

    #[test]
    fn test_get_or_default_creates_placeholder() {
        let cache = StakeCache::new();
        let wallet = Pubkey::new_unique();
        let record = cache.get_or_default(&wallet, 50);
        assert_eq!(record.amount_staked, 0);
        assert_eq!(record.data_source, DataSource::Default);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_aggregate_totals() {
        let cache = StakeCache::new();
        let staker_a = Pubkey::new_unique();
        let staker_b = Pubkey::new_unique();
        cache.apply(&event(EventKind::Stake, staker_a, 100, "a", 1));
        cache.apply(&event(EventKind::Stake, staker_b, 50, "b", 1));
        // A wallet that fully exited doesn't count as a staker.
        let exited = Pubkey::new_unique();
        cache.apply(&event(EventKind::Stake, exited, 10, "c", 1));
        cache.apply(&event(EventKind::Unstake, exited, 10, "d", 2));

        assert_eq!(cache.aggregate_totals(), (150, 2));
    }
}
