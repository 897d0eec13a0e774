//! Registration check for the transaction builder.
//!
//! A wallet is registered when its user-info PDA exists **and** is owned by
//! the staking program.  The second condition matters: anyone can transfer
//! lamports to the derived address, leaving a system-owned account squatting
//! there, and existence alone would misreport such wallets as registered.
//!
//! On an RPC failure the guard reports the failure instead of guessing.
//! The on-chain `register_user` aborts the whole transaction when the
//! account already exists, so guessing "not registered" would convert a
//! transient network blip into a guaranteed-failing transaction for every
//! registered wallet.

use {
    crate::{
        contract::ProgramContract,
        error::Result,
        pda,
        rpc::LedgerRpc,
    },
    log::debug,
    solana_pubkey::Pubkey,
    std::sync::Arc,
};

/// Answers "does this wallet already own a user-info account?".
pub struct RegistrationGuard {
    rpc: Arc<dyn LedgerRpc>,
    contract: ProgramContract,
}

impl RegistrationGuard {
    /// Create a guard reading through `rpc`.
    pub fn new(rpc: Arc<dyn LedgerRpc>, contract: ProgramContract) -> Self {
        Self { rpc, contract }
    }

    /// Whether `wallet` has a program-owned user-info account.
    pub async fn is_registered(&self, wallet: &Pubkey) -> Result<bool> {
        let (user_info, _) = pda::user_info_address(&self.contract, wallet)?;
        match self.rpc.get_account(&user_info).await? {
            None => Ok(false),
            Some(account) => {
                let registered =
                    account.owner == self.contract.program_id && !account.data.is_empty();
                if !registered {
                    debug!(
                        "user-info address {user_info} exists but is owned by {}, treating {wallet} as unregistered",
                        account.owner
                    );
                }
                Ok(registered)
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            accounts::UserInfo,
            error::ClientError,
            rpc::{
                LedgerAccount,
                mock::{MockFailure, MockLedger},
            },
        },
    };

    fn registered_account(contract: &ProgramContract, wallet: Pubkey) -> LedgerAccount {
        let info = UserInfo {
            owner: wallet,
            staked_amount: 0,
            rewards: 0,
            last_stake_time: 0,
            last_claim_time: 0,
            referrer: None,
            referral_count: 0,
            total_referral_rewards: 0,
        };
        LedgerAccount {
            owner: contract.program_id,
            data: info.serialize_with_discriminator().unwrap(),
            lamports: 2_039_280,
        }
    }

    #[tokio::test]
    async fn test_unregistered_wallet() {
        let ledger = Arc::new(MockLedger::new());
        let guard = RegistrationGuard::new(ledger, ProgramContract::mainnet());
        assert!(!guard.is_registered(&Pubkey::new_unique()).await.unwrap());
    }

    #[tokio::test]
    async fn test_registered_wallet() {
        let contract = ProgramContract::mainnet();
        let ledger = Arc::new(MockLedger::new());
        let wallet = Pubkey::new_unique();
        let (user_info, _) = pda::user_info_address(&contract, &wallet).unwrap();
        ledger.set_account(user_info, registered_account(&contract, wallet));

        let guard = RegistrationGuard::new(ledger, contract);
        assert!(guard.is_registered(&wallet).await.unwrap());
    }

    #[tokio::test]
    async fn test_foreign_owned_account_is_not_registration() {
        let contract = ProgramContract::mainnet();
        let ledger = Arc::new(MockLedger::new());
        let wallet = Pubkey::new_unique();
        let (user_info, _) = pda::user_info_address(&contract, &wallet).unwrap();
        // Rent-only squatter: lamports but system-owned, no program data.
        ledger.set_account(
            user_info,
            LedgerAccount {
                owner: solana_sdk_ids::system_program::id(),
                data: vec![],
                lamports: 890_880,
            },
        );

        let guard = RegistrationGuard::new(ledger, contract);
        assert!(!guard.is_registered(&wallet).await.unwrap());
    }

    #[tokio::test]
    async fn test_rpc_failure_propagates() {
        let ledger = Arc::new(MockLedger::new());
        ledger.fail_with(MockFailure::Transient);
        let guard = RegistrationGuard::new(ledger, ProgramContract::mainnet());
        let err = guard.is_registered(&Pubkey::new_unique()).await.unwrap_err();
        assert!(matches!(err, ClientError::RpcTransient(_)));
    }
}
