//! Gateway Test Harness
//!
//! A fully wired [`StakingGateway`] over the deterministic in-memory
//! ledger, plus helpers to install on-chain account state and to sign
//! webhook deliveries the way the indexer would.

use {
    hatm_program_client::{
        accounts::{GlobalState, UserInfo},
        contract::ProgramContract,
        pda,
        rpc::{LedgerAccount, LedgerRpc, mock::MockLedger},
    },
    hatm_reconciler::cache::StakeCache,
    hatm_service::{GatewayConfig, StakingGateway},
    hmac::{Hmac, Mac},
    sha2::Sha256,
    solana_pubkey::Pubkey,
    std::sync::Arc,
};

/// One token in base units (9 decimals).
pub const TOKEN: u64 = 1_000_000_000;

/// Webhook shared secret used by the dev configuration.
pub const WEBHOOK_SECRET: &str = "dev-secret";

/// Rent-exempt balance installed on harness accounts.
pub const ACCOUNT_LAMPORTS: u64 = 2_039_280;

/// A gateway wired to a scriptable ledger.
pub struct GatewayHarness {
    /// The scriptable ledger behind every RPC read.
    pub ledger: Arc<MockLedger>,
    /// The gateway under test.
    pub gateway: StakingGateway,
}

impl Default for GatewayHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayHarness {
    /// Wire a gateway over a fresh in-memory ledger.
    pub fn new() -> Self {
        let ledger = Arc::new(MockLedger::new());
        let rpc: Arc<dyn LedgerRpc> = Arc::clone(&ledger) as Arc<dyn LedgerRpc>;
        let gateway = StakingGateway::with_rpc(GatewayConfig::dev_default(), rpc)
            .expect("gateway wiring");
        Self { ledger, gateway }
    }

    /// The program contract under test.
    pub fn contract(&self) -> ProgramContract {
        *self.gateway.builder().contract()
    }

    /// The shared cache.
    pub fn cache(&self) -> &Arc<StakeCache> {
        self.gateway.cache()
    }

    /// Install a user-info account for `wallet` with the given state.
    pub fn install_user_info(&self, wallet: &Pubkey, info: UserInfo) {
        let contract = self.contract();
        let (address, _) = pda::user_info_address(&contract, wallet).expect("derivable");
        self.ledger.set_account(
            address,
            LedgerAccount {
                owner: contract.program_id,
                data: info.serialize_with_discriminator().expect("serializable"),
                lamports: ACCOUNT_LAMPORTS,
            },
        );
    }

    /// Register `wallet` on the simulated chain with `staked` base units.
    pub fn register_wallet(&self, wallet: &Pubkey, staked: u64, last_stake_time: i64) {
        self.install_user_info(
            wallet,
            UserInfo {
                owner: *wallet,
                staked_amount: staked,
                rewards: 0,
                last_stake_time,
                last_claim_time: 0,
                referrer: None,
                referral_count: 0,
                total_referral_rewards: 0,
            },
        );
    }

    /// Install the global state account.
    pub fn install_global_state(&self, state: GlobalState) {
        let contract = self.contract();
        let (address, _) = pda::global_state_address(&contract).expect("derivable");
        self.ledger.set_account(
            address,
            LedgerAccount {
                owner: contract.program_id,
                data: state.serialize_with_discriminator().expect("serializable"),
                lamports: ACCOUNT_LAMPORTS,
            },
        );
    }

    /// A plausible global state: 1%/day rewards, 7-day lock, no minimum.
    pub fn default_global_state(&self) -> GlobalState {
        let contract = self.contract();
        GlobalState {
            authority: Pubkey::new_unique(),
            token_mint: contract.token_mint,
            vault: Pubkey::new_unique(),
            reward_rate: 100,
            unlock_duration: 604_800,
            early_unstake_penalty: 500,
            min_stake_amount: 0,
            referral_reward_rate: 200,
            total_staked: 0,
            stakers_count: 0,
            reward_pool: 1_000 * TOKEN,
            last_update_time: 0,
            bump: 255,
        }
    }

    /// HMAC-SHA256 signature header for a webhook body, as the indexer
    /// computes it.
    pub fn sign_webhook(&self, body: &[u8]) -> String {
        let mut mac =
            Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).expect("hmac key");
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }
}
