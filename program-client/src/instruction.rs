//! Instruction encoding for the referral-staking program.
//!
//! Every instruction's data is an 8-byte discriminator followed by
//! little-endian fixed-width arguments.  The account list — order and
//! mutability flags included — is part of the program's contract, so each
//! constructor here builds the exact list the program's account validation
//! expects.
//!
//! Amounts are always base units (human amount × 10^decimals); conversion
//! happens at the edge, in [`crate::contract::ProgramContract::to_base_units`].

use {
    crate::{
        contract::{
            CLAIM_REWARDS_DISCRIMINATOR, COMPOUND_REWARDS_DISCRIMINATOR, ProgramContract,
            REGISTER_USER_DISCRIMINATOR, STAKE_DISCRIMINATOR, UNSTAKE_DISCRIMINATOR,
            UPDATE_REFERRER_REWARDS_DISCRIMINATOR,
        },
        error::{DerivationError, EncodingError},
        pda,
    },
    solana_instruction::{AccountMeta, Instruction},
    solana_pubkey::{PUBKEY_BYTES, Pubkey},
};

/// Size of an instruction discriminator.
pub const DISCRIMINATOR_LEN: usize = 8;

/// Operations the backend builds against the staking program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StakingInstruction {
    /// Create the wallet's user-info account, optionally recording a
    /// referrer.
    ///
    /// # Accounts expected
    ///
    /// 0. `[signer, writable]` — Owner wallet (pays rent).
    /// 1. `[writable]`         — User-info PDA for the owner.
    /// 2. `[]`                 — System program.
    /// 3. `[]`                 — Rent sysvar.
    /// 4. `[]`                 — Referrer's user-info PDA (only when a
    ///                           referrer is given).
    RegisterUser {
        /// Wallet that referred this user, if any.
        referrer: Option<Pubkey>,
    },

    /// Move `amount` base units from the owner's token account into the
    /// vault.
    ///
    /// # Accounts expected
    ///
    /// 0. `[signer, writable]` — Owner wallet.
    /// 1. `[writable]`         — Global state PDA.
    /// 2. `[writable]`         — User-info PDA for the owner.
    /// 3. `[writable]`         — Owner's token account.
    /// 4. `[writable]`         — Vault token account.
    /// 5. `[]`                 — Token program.
    /// 6. `[]`                 — System program.
    Stake {
        /// Base units to stake.
        amount: u64,
    },

    /// Return `amount` base units from the vault to the owner.
    /// Accounts as for [`StakingInstruction::Stake`].
    Unstake {
        /// Base units to unstake.
        amount: u64,
    },

    /// Pay out all accrued rewards.  Accounts as for
    /// [`StakingInstruction::Stake`].
    ClaimRewards,

    /// Fold accrued rewards into the staked principal.
    ///
    /// # Accounts expected
    ///
    /// 0. `[signer, writable]` — Owner wallet.
    /// 1. `[writable]`         — Global state PDA.
    /// 2. `[writable]`         — User-info PDA for the owner.
    /// 3. `[]`                 — System program.
    CompoundRewards,

    /// Credit a referrer after their referral's first stake.  Built by the
    /// backend with its service key, not by end-user wallets.
    ///
    /// # Accounts expected
    ///
    /// 0. `[signer, writable]` — Service authority.
    /// 1. `[]`                 — Global state PDA.
    /// 2. `[writable]`         — Referrer's user-info PDA.
    /// 3. `[]`                 — System program.
    UpdateReferrerRewards {
        /// Base units the referral staked.
        staking_amount: u64,
    },
}

impl StakingInstruction {
    /// Serialize to the program's wire layout.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::RegisterUser { referrer } => {
                let mut data = Vec::with_capacity(DISCRIMINATOR_LEN + 1 + PUBKEY_BYTES);
                data.extend_from_slice(&REGISTER_USER_DISCRIMINATOR);
                match referrer {
                    Some(referrer) => {
                        data.push(1);
                        data.extend_from_slice(referrer.as_ref());
                    }
                    None => data.push(0),
                }
                data
            }
            Self::Stake { amount } => encode_amount(&STAKE_DISCRIMINATOR, *amount),
            Self::Unstake { amount } => encode_amount(&UNSTAKE_DISCRIMINATOR, *amount),
            Self::ClaimRewards => CLAIM_REWARDS_DISCRIMINATOR.to_vec(),
            Self::CompoundRewards => COMPOUND_REWARDS_DISCRIMINATOR.to_vec(),
            Self::UpdateReferrerRewards { staking_amount } => {
                encode_amount(&UPDATE_REFERRER_REWARDS_DISCRIMINATOR, *staking_amount)
            }
        }
    }

    /// Inverse of [`encode`](Self::encode).
    ///
    /// Used by the webhook ingestor to recover operations from raw
    /// instruction data, and by tests for the round-trip property.
    pub fn decode(data: &[u8]) -> Result<Self, EncodingError> {
        if data.len() < DISCRIMINATOR_LEN {
            return Err(EncodingError::Truncated {
                expected: DISCRIMINATOR_LEN,
                actual: data.len(),
            });
        }
        let (discriminator, rest) = data.split_at(DISCRIMINATOR_LEN);
        match discriminator {
            d if d == REGISTER_USER_DISCRIMINATOR => match rest.split_first() {
                Some((&0, _)) | None => Ok(Self::RegisterUser { referrer: None }),
                Some((&1, key_bytes)) => {
                    let key: [u8; PUBKEY_BYTES] =
                        key_bytes
                            .try_into()
                            .map_err(|_| EncodingError::Truncated {
                                expected: DISCRIMINATOR_LEN + 1 + PUBKEY_BYTES,
                                actual: data.len(),
                            })?;
                    Ok(Self::RegisterUser {
                        referrer: Some(Pubkey::from(key)),
                    })
                }
                Some((flag, _)) => Err(EncodingError::UnknownInstruction(format!(
                    "bad option flag {flag} in register_user"
                ))),
            },
            d if d == STAKE_DISCRIMINATOR => Ok(Self::Stake {
                amount: decode_amount(rest, data.len())?,
            }),
            d if d == UNSTAKE_DISCRIMINATOR => Ok(Self::Unstake {
                amount: decode_amount(rest, data.len())?,
            }),
            d if d == CLAIM_REWARDS_DISCRIMINATOR => Ok(Self::ClaimRewards),
            d if d == COMPOUND_REWARDS_DISCRIMINATOR => Ok(Self::CompoundRewards),
            d if d == UPDATE_REFERRER_REWARDS_DISCRIMINATOR => Ok(Self::UpdateReferrerRewards {
                staking_amount: decode_amount(rest, data.len())?,
            }),
            other => Err(EncodingError::UnknownInstruction(format!(
                "unknown discriminator {other:02x?}"
            ))),
        }
    }
}

fn encode_amount(discriminator: &[u8; 8], amount: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(DISCRIMINATOR_LEN + 8);
    data.extend_from_slice(discriminator);
    data.extend_from_slice(&amount.to_le_bytes());
    data
}

fn decode_amount(rest: &[u8], total_len: usize) -> Result<u64, EncodingError> {
    let bytes: [u8; 8] = rest
        .get(..8)
        .and_then(|b| b.try_into().ok())
        .ok_or(EncodingError::Truncated {
            expected: DISCRIMINATOR_LEN + 8,
            actual: total_len,
        })?;
    Ok(u64::from_le_bytes(bytes))
}

// ── Instruction constructors ────────────────────────────────────────────────

/// Build a `register_user` instruction for `owner`.
///
/// When a referrer is given, its user-info PDA is appended as a trailing
/// readonly account so the backend can credit it in a follow-up.
pub fn register_user(
    contract: &ProgramContract,
    owner: &Pubkey,
    referrer: Option<&Pubkey>,
) -> Result<Instruction, DerivationError> {
    let (user_info, _) = pda::user_info_address(contract, owner)?;
    let mut accounts = vec![
        AccountMeta::new(*owner, true),
        AccountMeta::new(user_info, false),
        AccountMeta::new_readonly(solana_sdk_ids::system_program::id(), false),
        AccountMeta::new_readonly(solana_sdk_ids::sysvar::rent::id(), false),
    ];
    if let Some(referrer) = referrer {
        let (referrer_info, _) = pda::user_info_address(contract, referrer)?;
        accounts.push(AccountMeta::new_readonly(referrer_info, false));
    }
    Ok(Instruction {
        program_id: contract.program_id,
        accounts,
        data: StakingInstruction::RegisterUser {
            referrer: referrer.copied(),
        }
        .encode(),
    })
}

/// Build a `stake` instruction moving `amount` base units into the vault.
pub fn stake(
    contract: &ProgramContract,
    owner: &Pubkey,
    owner_token_account: &Pubkey,
    amount: u64,
) -> Result<Instruction, DerivationError> {
    Ok(Instruction {
        program_id: contract.program_id,
        accounts: vault_op_accounts(contract, owner, owner_token_account)?,
        data: StakingInstruction::Stake { amount }.encode(),
    })
}

/// Build an `unstake` instruction returning `amount` base units.
pub fn unstake(
    contract: &ProgramContract,
    owner: &Pubkey,
    owner_token_account: &Pubkey,
    amount: u64,
) -> Result<Instruction, DerivationError> {
    Ok(Instruction {
        program_id: contract.program_id,
        accounts: vault_op_accounts(contract, owner, owner_token_account)?,
        data: StakingInstruction::Unstake { amount }.encode(),
    })
}

/// Build a `claim_rewards` instruction.
pub fn claim_rewards(
    contract: &ProgramContract,
    owner: &Pubkey,
    owner_token_account: &Pubkey,
) -> Result<Instruction, DerivationError> {
    Ok(Instruction {
        program_id: contract.program_id,
        accounts: vault_op_accounts(contract, owner, owner_token_account)?,
        data: StakingInstruction::ClaimRewards.encode(),
    })
}

/// Build a `compound_rewards` instruction.
pub fn compound_rewards(
    contract: &ProgramContract,
    owner: &Pubkey,
) -> Result<Instruction, DerivationError> {
    let (global_state, _) = pda::global_state_address(contract)?;
    let (user_info, _) = pda::user_info_address(contract, owner)?;
    Ok(Instruction {
        program_id: contract.program_id,
        accounts: vec![
            AccountMeta::new(*owner, true),
            AccountMeta::new(global_state, false),
            AccountMeta::new(user_info, false),
            AccountMeta::new_readonly(solana_sdk_ids::system_program::id(), false),
        ],
        data: StakingInstruction::CompoundRewards.encode(),
    })
}

/// Build an `update_referrer_rewards` instruction crediting `referrer`.
pub fn update_referrer_rewards(
    contract: &ProgramContract,
    authority: &Pubkey,
    referrer: &Pubkey,
    staking_amount: u64,
) -> Result<Instruction, DerivationError> {
    let (global_state, _) = pda::global_state_address(contract)?;
    let (referrer_info, _) = pda::user_info_address(contract, referrer)?;
    Ok(Instruction {
        program_id: contract.program_id,
        accounts: vec![
            AccountMeta::new(*authority, true),
            AccountMeta::new_readonly(global_state, false),
            AccountMeta::new(referrer_info, false),
            AccountMeta::new_readonly(solana_sdk_ids::system_program::id(), false),
        ],
        data: StakingInstruction::UpdateReferrerRewards { staking_amount }.encode(),
    })
}

/// The shared account list of `stake` / `unstake` / `claim_rewards`.
fn vault_op_accounts(
    contract: &ProgramContract,
    owner: &Pubkey,
    owner_token_account: &Pubkey,
) -> Result<Vec<AccountMeta>, DerivationError> {
    let (global_state, _) = pda::global_state_address(contract)?;
    let (user_info, _) = pda::user_info_address(contract, owner)?;
    let (vault, _) = pda::vault_address(contract)?;
    Ok(vec![
        AccountMeta::new(*owner, true),
        AccountMeta::new(global_state, false),
        AccountMeta::new(user_info, false),
        AccountMeta::new(*owner_token_account, false),
        AccountMeta::new(vault, false),
        AccountMeta::new_readonly(spl_generic_token::token::id(), false),
        AccountMeta::new_readonly(solana_sdk_ids::system_program::id(), false),
    ])
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stake_amount_layout() {
        // 10 tokens at 9 decimals must serialize as 10_000_000_000 LE.
        let contract = ProgramContract::mainnet();
        let amount = contract.to_base_units(10).unwrap();
        let data = StakingInstruction::Stake { amount }.encode();
        assert_eq!(&data[..8], &STAKE_DISCRIMINATOR);
        assert_eq!(&data[8..], &10_000_000_000u64.to_le_bytes());
    }

    #[test]
    fn test_register_user_layout_without_referrer() {
        let data = StakingInstruction::RegisterUser { referrer: None }.encode();
        assert_eq!(data.len(), DISCRIMINATOR_LEN + 1);
        assert_eq!(data[8], 0);
    }

    #[test]
    fn test_register_user_layout_with_referrer() {
        let referrer = Pubkey::new_unique();
        let data = StakingInstruction::RegisterUser {
            referrer: Some(referrer),
        }
        .encode();
        assert_eq!(data.len(), DISCRIMINATOR_LEN + 1 + PUBKEY_BYTES);
        assert_eq!(data[8], 1);
        assert_eq!(&data[9..], referrer.as_ref());
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let cases = vec![
            StakingInstruction::RegisterUser { referrer: None },
            StakingInstruction::RegisterUser {
                referrer: Some(Pubkey::new_unique()),
            },
            StakingInstruction::Stake { amount: 1 },
            StakingInstruction::Stake {
                amount: u64::MAX,
            },
            StakingInstruction::Unstake {
                amount: 40_000_000_000,
            },
            StakingInstruction::ClaimRewards,
            StakingInstruction::CompoundRewards,
            StakingInstruction::UpdateReferrerRewards {
                staking_amount: 500,
            },
        ];
        for case in cases {
            let decoded = StakingInstruction::decode(&case.encode()).unwrap();
            assert_eq!(decoded, case);
        }
    }

    #[test]
    fn test_decode_rejects_unknown_discriminator() {
        let err = StakingInstruction::decode(&[0xff; 8]).unwrap_err();
        assert!(matches!(err, EncodingError::UnknownInstruction(_)));
    }

    #[test]
    fn test_decode_rejects_truncated_amount() {
        let mut data = STAKE_DISCRIMINATOR.to_vec();
        data.extend_from_slice(&[1, 2, 3]); // 3 of 8 amount bytes
        let err = StakingInstruction::decode(&data).unwrap_err();
        assert!(matches!(err, EncodingError::Truncated { .. }));
    }

    #[test]
    fn test_stake_account_order() {
        let contract = ProgramContract::mainnet();
        let owner = Pubkey::new_unique();
        let token_account = Pubkey::new_unique();
        let ix = stake(&contract, &owner, &token_account, 1).unwrap();

        assert_eq!(ix.program_id, contract.program_id);
        assert_eq!(ix.accounts.len(), 7);
        // Owner is the only signer and comes first.
        assert_eq!(ix.accounts[0].pubkey, owner);
        assert!(ix.accounts[0].is_signer);
        assert!(ix.accounts[0].is_writable);
        assert!(ix.accounts.iter().skip(1).all(|meta| !meta.is_signer));
        // Token accounts are writable, programs are not.
        assert_eq!(ix.accounts[3].pubkey, token_account);
        assert!(ix.accounts[3].is_writable);
        assert!(!ix.accounts[5].is_writable);
        assert!(!ix.accounts[6].is_writable);
    }

    #[test]
    fn test_register_appends_trailing_referrer_account() {
        let contract = ProgramContract::mainnet();
        let owner = Pubkey::new_unique();
        let referrer = Pubkey::new_unique();

        let plain = register_user(&contract, &owner, None).unwrap();
        assert_eq!(plain.accounts.len(), 4);

        let referred = register_user(&contract, &owner, Some(&referrer)).unwrap();
        assert_eq!(referred.accounts.len(), 5);
        let (referrer_info, _) = pda::user_info_address(&contract, &referrer).unwrap();
        let trailing = &referred.accounts[4];
        assert_eq!(trailing.pubkey, referrer_info);
        assert!(!trailing.is_signer);
        assert!(!trailing.is_writable);
    }
}
