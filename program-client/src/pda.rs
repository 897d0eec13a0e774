//! Program-derived address computation.
//!
//! Pure functions from `(seed list, program id)` to `(address, bump)`.
//! Derivation is deterministic — identical inputs always yield the identical
//! address — and every result is off-curve, so no private key can ever sign
//! for it.

use {
    crate::{
        contract::{
            GLOBAL_STATE_SEED, ProgramContract, USER_INFO_SEED, VAULT_AUTHORITY_SEED, VAULT_SEED,
        },
        error::DerivationError,
    },
    solana_pubkey::{MAX_SEED_LEN, Pubkey},
};

/// Derive a program address from an ordered seed list.
///
/// Seeds are validated against the ledger's maximum length before the bump
/// search; `NoValidBump` is returned in the (astronomically unlikely) case
/// that no bump in `[0, 255]` lands off-curve.
pub fn derive(seeds: &[&[u8]], program_id: &Pubkey) -> Result<(Pubkey, u8), DerivationError> {
    for (index, seed) in seeds.iter().enumerate() {
        if seed.len() > MAX_SEED_LEN {
            return Err(DerivationError::InvalidSeed {
                index,
                len: seed.len(),
                max: MAX_SEED_LEN,
            });
        }
    }
    Pubkey::try_find_program_address(seeds, program_id)
        .ok_or(DerivationError::NoValidBump(*program_id))
}

/// Address of the vault token account.
pub fn vault_address(contract: &ProgramContract) -> Result<(Pubkey, u8), DerivationError> {
    derive(&[VAULT_SEED], &contract.program_id)
}

/// Address of the vault authority.
pub fn vault_authority_address(
    contract: &ProgramContract,
) -> Result<(Pubkey, u8), DerivationError> {
    derive(&[VAULT_AUTHORITY_SEED], &contract.program_id)
}

/// Address of the global state account.
pub fn global_state_address(contract: &ProgramContract) -> Result<(Pubkey, u8), DerivationError> {
    derive(&[GLOBAL_STATE_SEED], &contract.program_id)
}

/// Address of a wallet's user-info account.
pub fn user_info_address(
    contract: &ProgramContract,
    wallet: &Pubkey,
) -> Result<(Pubkey, u8), DerivationError> {
    derive(&[USER_INFO_SEED, wallet.as_ref()], &contract.program_id)
}

// ── Tests ───────────────────────────────────────────────────────────────────
