//! Typed layouts for the program's on-chain accounts.
//!
//! Each account type has exactly one deserialization function: an 8-byte
//! discriminator check followed by Borsh over the fixed field layout.  All
//! fields are fixed-width (an optional address is a presence byte plus 32
//! bytes), so byte offsets are deterministic and the expected sizes below
//! are part of the contract.

use {
    crate::contract::{GLOBAL_STATE_ACCOUNT_DISCRIMINATOR, USER_INFO_ACCOUNT_DISCRIMINATOR},
    borsh::{BorshDeserialize, BorshSerialize},
    solana_pubkey::Pubkey,
};

/// Size of an account discriminator.
pub const ACCOUNT_DISCRIMINATOR_LEN: usize = 8;

/// Per-wallet staking state.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct UserInfo {
    /// Wallet that owns this position.
    pub owner: Pubkey,
    /// Base units currently staked.
    pub staked_amount: u64,
    /// Accrued, unclaimed rewards in base units.
    pub rewards: u64,
    /// Unix timestamp of the most recent stake.
    pub last_stake_time: i64,
    /// Unix timestamp of the most recent claim.
    pub last_claim_time: i64,
    /// Wallet that referred this user, if any.
    pub referrer: Option<Pubkey>,
    /// How many wallets this user has referred.
    pub referral_count: u64,
    /// Lifetime referral rewards in base units.
    pub total_referral_rewards: u64,
}

impl UserInfo {
    /// Serialized size: discriminator + fixed Borsh body.
    ///
    ///   discriminator (8) + owner (32) + staked_amount (8) + rewards (8)
    ///   + last_stake_time (8) + last_claim_time (8) + referrer (33)
    ///   + referral_count (8) + total_referral_rewards (8) = 121
    pub const SERIALIZED_SIZE: usize = 8 + 32 + 8 + 8 + 8 + 8 + 33 + 8 + 8;

    /// Deserialize from raw account data.
    pub fn deserialize(data: &[u8]) -> Result<Self, std::io::Error> {
        let body = check_discriminator(data, &USER_INFO_ACCOUNT_DISCRIMINATOR, "UserInfo")?;
        let mut cursor = body;
        BorshDeserialize::deserialize_reader(&mut cursor)
    }

    /// Serialize to raw account data (fixture construction in tests).
    pub fn serialize_with_discriminator(&self) -> Result<Vec<u8>, std::io::Error> {
        let mut data = Vec::with_capacity(Self::SERIALIZED_SIZE);
        data.extend_from_slice(&USER_INFO_ACCOUNT_DISCRIMINATOR);
        BorshSerialize::serialize(self, &mut data)?;
        Ok(data)
    }
}

/// Program-wide staking parameters and aggregates.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct GlobalState {
    /// Administrative authority.
    pub authority: Pubkey,
    /// Mint of the staked token.
    pub token_mint: Pubkey,
    /// Vault token account.
    pub vault: Pubkey,
    /// Daily reward rate in basis points.
    pub reward_rate: u64,
    /// Lock duration in seconds.
    pub unlock_duration: i64,
    /// Early-unstake penalty in basis points.
    pub early_unstake_penalty: u64,
    /// Minimum stake in base units.
    pub min_stake_amount: u64,
    /// Referrer reward rate in basis points.
    pub referral_reward_rate: u64,
    /// Total base units staked across all wallets.
    pub total_staked: u64,
    /// Number of wallets with a nonzero stake.
    pub stakers_count: u64,
    /// Base units available for reward payouts.
    pub reward_pool: u64,
    /// Unix timestamp of the last state mutation.
    pub last_update_time: i64,
    /// PDA bump of this account.
    pub bump: u8,
}

impl GlobalState {
    /// Serialized size: discriminator + fixed Borsh body.
    ///
    ///   discriminator (8) + 3 addresses (96) + 9 × u64/i64 (72) + bump (1)
    ///   = 177
    pub const SERIALIZED_SIZE: usize = 8 + 32 * 3 + 8 * 9 + 1;

    /// Deserialize from raw account data.
    pub fn deserialize(data: &[u8]) -> Result<Self, std::io::Error> {
        let body = check_discriminator(data, &GLOBAL_STATE_ACCOUNT_DISCRIMINATOR, "GlobalState")?;
        let mut cursor = body;
        BorshDeserialize::deserialize_reader(&mut cursor)
    }

    /// Serialize to raw account data (fixture construction in tests).
    pub fn serialize_with_discriminator(&self) -> Result<Vec<u8>, std::io::Error> {
        let mut data = Vec::with_capacity(Self::SERIALIZED_SIZE);
        data.extend_from_slice(&GLOBAL_STATE_ACCOUNT_DISCRIMINATOR);
        BorshSerialize::serialize(self, &mut data)?;
        Ok(data)
    }
}

fn check_discriminator<'a>(
    data: &'a [u8],
    expected: &[u8; ACCOUNT_DISCRIMINATOR_LEN],
    name: &str,
) -> Result<&'a [u8], std::io::Error> {
    if data.len() < ACCOUNT_DISCRIMINATOR_LEN || &data[..ACCOUNT_DISCRIMINATOR_LEN] != expected {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("missing or invalid {name} discriminator"),
        ));
    }
    Ok(&data[ACCOUNT_DISCRIMINATOR_LEN..])
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user_info(referrer: Option<Pubkey>) -> UserInfo {
        UserInfo {
            owner: Pubkey::new_unique(),
            staked_amount: 500_000_000_000,
            rewards: 1_250_000,
            last_stake_time: 1_754_000_000,
            last_claim_time: 1_753_000_000,
            referrer,
            referral_count: 3,
            total_referral_rewards: 42,
        }
    }

    #[test]
    fn test_user_info_round_trip() {
        for referrer in [None, Some(Pubkey::new_unique())] {
            let info = sample_user_info(referrer);
            let data = info.serialize_with_discriminator().unwrap();
            assert_eq!(UserInfo::deserialize(&data).unwrap(), info);
        }
    }

    #[test]
    fn test_user_info_serialized_size() {
        // Only the referrer field is variable on paper; Borsh still emits a
        // presence byte either way, so with a referrer the size is exact.
        let with_referrer = sample_user_info(Some(Pubkey::new_unique()));
        let data = with_referrer.serialize_with_discriminator().unwrap();
        assert_eq!(data.len(), UserInfo::SERIALIZED_SIZE);

        let without = sample_user_info(None);
        let data = without.serialize_with_discriminator().unwrap();
        assert_eq!(data.len(), UserInfo::SERIALIZED_SIZE - 32);
    }

    #[test]
    fn test_user_info_byte_fixture() {
        let owner = Pubkey::from([7u8; 32]);
        let mut fixture = Vec::new();
        fixture.extend_from_slice(&USER_INFO_ACCOUNT_DISCRIMINATOR);
        fixture.extend_from_slice(owner.as_ref());
        fixture.extend_from_slice(&100u64.to_le_bytes()); // staked_amount
        fixture.extend_from_slice(&5u64.to_le_bytes()); // rewards
        fixture.extend_from_slice(&1_700_000_000i64.to_le_bytes()); // last_stake_time
        fixture.extend_from_slice(&0i64.to_le_bytes()); // last_claim_time
        fixture.push(0); // referrer: None
        fixture.extend_from_slice(&0u64.to_le_bytes()); // referral_count
        fixture.extend_from_slice(&0u64.to_le_bytes()); // total_referral_rewards

        let info = UserInfo::deserialize(&fixture).unwrap();
        assert_eq!(info.owner, owner);
        assert_eq!(info.staked_amount, 100);
        assert_eq!(info.rewards, 5);
        assert_eq!(info.last_stake_time, 1_700_000_000);
        assert_eq!(info.referrer, None);
    }

    #[test]
    fn test_wrong_discriminator_rejected() {
        let info = sample_user_info(None);
        let mut data = info.serialize_with_discriminator().unwrap();
        data[0] ^= 0xff;
        assert!(UserInfo::deserialize(&data).is_err());
        // A UserInfo payload must not decode as GlobalState either.
        assert!(GlobalState::deserialize(&data).is_err());
    }

    #[test]
    fn test_global_state_round_trip_and_size() {
        let state = GlobalState {
            authority: Pubkey::new_unique(),
            token_mint: Pubkey::new_unique(),
            vault: Pubkey::new_unique(),
            reward_rate: 100,
            unlock_duration: 604_800,
            early_unstake_penalty: 500,
            min_stake_amount: 1_000_000_000,
            referral_reward_rate: 200,
            total_staked: 9_999,
            stakers_count: 17,
            reward_pool: 12345,
            last_update_time: 1_754_300_000,
            bump: 254,
        };
        let data = state.serialize_with_discriminator().unwrap();
        assert_eq!(data.len(), GlobalState::SERIALIZED_SIZE);
        assert_eq!(GlobalState::deserialize(&data).unwrap(), state);
    }

    #[test]
    fn test_empty_data_rejected() {
        assert!(UserInfo::deserialize(&[]).is_err());
        assert!(GlobalState::deserialize(&[]).is_err());
    }
}
