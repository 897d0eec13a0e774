//! The polling/query surface exposed to the HTTP layer.
//!
//! Reads go to the cache first.  A miss or a stale hit triggers a ledger
//! re-read, which lands back in the cache as an authoritative `Polled`
//! snapshot with locally estimated rewards overlaid.  `get_staking_info`
//! never fails: when both the cache and the ledger come up empty the
//! caller gets a zero-valued record tagged `Default`.

use {
    crate::estimate,
    hatm_program_client::{
        builder::TransactionBuilder,
        contract::ProgramContract,
        error::{ClientError, Result},
        rpc::LedgerRpc,
    },
    hatm_reconciler::{
        cache::StakeCache,
        record::{DataSource, StakeRecord},
        unix_now,
    },
    log::warn,
    serde::{Deserialize, Serialize},
    solana_pubkey::Pubkey,
    std::sync::Arc,
};

/// Program-wide statistics for the vault dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultStats {
    /// Total base units staked across all wallets.
    pub total_staked: u64,
    /// Wallets with a nonzero stake.
    pub stakers_count: u64,
    /// Current estimated APY in percent.
    pub current_apy: f64,
}

/// Cache-first reads with ledger fallback.
pub struct StakingQueryService {
    builder: TransactionBuilder,
    cache: Arc<StakeCache>,
    contract: ProgramContract,
}

impl StakingQueryService {
    /// Create a query service over the shared cache.
    pub fn new(rpc: Arc<dyn LedgerRpc>, contract: ProgramContract, cache: Arc<StakeCache>) -> Self {
        Self {
            builder: TransactionBuilder::new(rpc, contract),
            cache,
            contract,
        }
    }

    /// The transaction builder sharing this service's RPC connection.
    pub fn builder(&self) -> &TransactionBuilder {
        &self.builder
    }

    /// A wallet's staking state: fresh cache hit, else ledger re-read,
    /// else a zero-valued default.
    pub async fn get_staking_info(&self, wallet: &Pubkey) -> StakeRecord {
        let now = unix_now();
        if let Some(record) = self.cache.get(wallet, now) {
            if !record.is_stale(now) {
                return record;
            }
        }
        match self.refresh_from_ledger(wallet, now).await {
            Ok(Some(record)) => record,
            Ok(None) => self.cache.get_or_default(wallet, now),
            Err(err) => {
                // Stale beats nothing: serve whatever the cache has.
                warn!("ledger refresh for {wallet} failed: {err}");
                self.cache.get_or_default(wallet, now)
            }
        }
    }

    /// Re-read the ledger unconditionally, bypassing the staleness
    /// threshold, and return the synced record.
    pub async fn force_refresh(&self, wallet: &Pubkey) -> Result<StakeRecord> {
        let now = unix_now();
        match self.refresh_from_ledger(wallet, now).await? {
            Some(record) => Ok(record),
            None => Ok(self.cache.get_or_default(wallet, now)),
        }
    }

    /// Vault-wide statistics from the global state account, falling back
    /// to cache aggregates when the ledger is unreachable.
    pub async fn get_vault_stats(&self) -> VaultStats {
        match self.builder.read_global_state().await {
            Ok(Some(state)) => VaultStats {
                total_staked: state.total_staked,
                stakers_count: state.stakers_count,
                current_apy: estimate::apy_percent(state.reward_rate),
            },
            Ok(None) => self.stats_from_cache("global state account missing"),
            Err(err) => self.stats_from_cache(&err.to_string()),
        }
    }

    /// Read the wallet's user-info account and sync an authoritative
    /// snapshot into the cache.  `Ok(None)` means the wallet has no
    /// on-chain record.
    async fn refresh_from_ledger(
        &self,
        wallet: &Pubkey,
        now: i64,
    ) -> std::result::Result<Option<StakeRecord>, ClientError> {
        let Some(user) = self.builder.read_user_info(wallet).await? else {
            return Ok(None);
        };
        let state = self.builder.read_global_state().await?;

        let (pending_rewards, time_until_unlock, estimated_apy) = match &state {
            Some(state) => (
                estimate::estimated_pending_rewards(&user, state, now),
                estimate::time_until_unlock(&user, state, now),
                estimate::apy_percent(state.reward_rate),
            ),
            None => (user.rewards, None, 0.0),
        };

        // The first-stake timestamp survives event merges; the chain only
        // records the most recent stake.
        let staked_at = match self.cache.get(wallet, now) {
            Some(existing) if existing.staked_at != 0 => existing.staked_at,
            _ => user.last_stake_time,
        };

        let record = self.cache.sync(
            *wallet,
            StakeRecord {
                amount_staked: user.staked_amount,
                pending_rewards,
                staked_at,
                last_update_time: now,
                time_until_unlock,
                estimated_apy,
                data_source: DataSource::Polled,
            },
        );
        Ok(Some(record))
    }

    fn stats_from_cache(&self, reason: &str) -> VaultStats {
        warn!("vault stats from cache aggregates: {reason}");
        let (total_staked, stakers_count) = self.cache.aggregate_totals();
        VaultStats {
            total_staked,
            stakers_count,
            current_apy: 0.0,
        }
    }

    /// The contract this service reads against.
    pub fn contract(&self) -> &ProgramContract {
        &self.contract
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
