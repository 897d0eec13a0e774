//! The external program contract, versioned in one place.
//!
//! Several earlier revisions of the backend carried parallel copies of seed
//! strings, program ids and discriminators that drifted apart.  Everything
//! the deployed program treats as part of its wire contract now lives in
//! [`ProgramContract`]; the deriver, encoder and builder are parametrized
//! over it, so supporting a redeployed program version means constructing a
//! new contract value, not editing call sites.

use {
    crate::error::EncodingError,
    solana_pubkey::Pubkey,
};

// ── PDA seeds (exact ASCII bytes — any deviation derives a wrong address) ──

/// Seed of the vault token account.
pub const VAULT_SEED: &[u8] = b"vault";

/// Seed of the vault authority PDA.
pub const VAULT_AUTHORITY_SEED: &[u8] = b"vault_auth";

/// Seed prefix of a wallet's user-info account; the wallet address is
/// appended as a second seed.
pub const USER_INFO_SEED: &[u8] = b"user_info";

/// Seed of the global state account.
pub const GLOBAL_STATE_SEED: &[u8] = b"global_state";

// ── Instruction discriminators: sha256("global:<name>")[0..8] ─────────────

/// `register_user(referrer: Option<Pubkey>)`
pub const REGISTER_USER_DISCRIMINATOR: [u8; 8] = [0x02, 0xf1, 0x96, 0xdf, 0x63, 0xd6, 0x74, 0x61];

/// `stake(amount: u64)`
pub const STAKE_DISCRIMINATOR: [u8; 8] = [0xce, 0xb0, 0xca, 0x12, 0xc8, 0xd1, 0xb3, 0x6c];

/// `unstake(amount: u64)`
pub const UNSTAKE_DISCRIMINATOR: [u8; 8] = [0x5a, 0x5f, 0x6b, 0x2a, 0xcd, 0x7c, 0x32, 0xe1];

/// `claim_rewards()`
pub const CLAIM_REWARDS_DISCRIMINATOR: [u8; 8] = [0x04, 0x90, 0x84, 0x47, 0x74, 0x17, 0x97, 0x50];

/// `compound_rewards()`
pub const COMPOUND_REWARDS_DISCRIMINATOR: [u8; 8] =
    [0xfe, 0xbf, 0xe2, 0x78, 0x52, 0x73, 0x05, 0x57];

/// `update_referrer_rewards(staking_amount: u64)`
pub const UPDATE_REFERRER_REWARDS_DISCRIMINATOR: [u8; 8] =
    [0x5b, 0x61, 0x45, 0xd3, 0x02, 0x98, 0x5d, 0xef];

// ── Account discriminators: sha256("account:<Name>")[0..8] ────────────────

/// Prefix of every `UserInfo` account's data.
pub const USER_INFO_ACCOUNT_DISCRIMINATOR: [u8; 8] =
    [0x53, 0x86, 0xc8, 0x38, 0x90, 0x38, 0x0a, 0x3e];

/// Prefix of the `GlobalState` account's data.
pub const GLOBAL_STATE_ACCOUNT_DISCRIMINATOR: [u8; 8] =
    [0xa3, 0x2e, 0x4a, 0xa8, 0xd8, 0x7b, 0x85, 0x62];

/// Everything that varies per deployed program version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramContract {
    /// The staking program's id.
    pub program_id: Pubkey,
    /// Mint of the staked token.
    pub token_mint: Pubkey,
    /// Decimal exponent of the staked token.
    pub decimals: u8,
}

impl ProgramContract {
    /// The contract of the currently deployed mainnet program.
    pub const fn mainnet() -> Self {
        Self {
            program_id: Pubkey::from_str_const("EnGhdovdYhHk4nsHEJr6gmV5cYfrx53ky19RD56eRRGm"),
            token_mint: Pubkey::from_str_const("59TF7G5NqMdqjHvpsBPojuhvksHiHVUkaNkaiVvozDrk"),
            decimals: 9,
        }
    }

    /// A contract pointed at throwaway ids, for tests.
    #[cfg(any(test, feature = "dev-context-only-utils"))]
    pub fn dev(program_id: Pubkey, token_mint: Pubkey) -> Self {
        Self {
            program_id,
            token_mint,
            decimals: 9,
        }
    }

    /// Convert a whole-token amount to base units (`amount × 10^decimals`).
    ///
    /// Fails rather than wrapping: a silently truncated amount would encode
    /// a different stake than the caller asked for.
    pub fn to_base_units(&self, amount_tokens: u64) -> Result<u64, EncodingError> {
        let overflow = EncodingError::AmountOverflow {
            amount: amount_tokens,
            decimals: self.decimals,
        };
        let scale = 10u128
            .checked_pow(self.decimals as u32)
            .ok_or(overflow.clone())?;
        let base = (amount_tokens as u128)
            .checked_mul(scale)
            .ok_or(overflow.clone())?;
        u64::try_from(base).map_err(|_| overflow)
    }
}

impl Default for ProgramContract {
    fn default() -> Self {
        Self::mainnet()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
