//! High-level transaction builder.
//!
//! Composes the registration guard, the instruction encoder and the
//! assembler behind one API per user action.  Each build validates against
//! current ledger state and returns an actionable error category — callers
//! can always tell "you don't have that much staked" apart from "the RPC is
//! down" without string matching.
//!
//! Registration is idempotent by construction: every build that needs a
//! user-info account consults the guard once and prepends `register_user`
//! only when the wallet has none.

use {
    crate::{
        accounts::{GlobalState, UserInfo},
        contract::ProgramContract,
        error::{ClientError, Result},
        guard::RegistrationGuard,
        instruction, pda,
        rpc::LedgerRpc,
        transaction,
    },
    log::{info, warn},
    solana_instruction::Instruction,
    solana_keypair::Keypair,
    solana_pubkey::Pubkey,
    solana_signer::Signer,
    solana_transaction::Transaction,
    std::sync::Arc,
};

/// Builds signable transactions for every staking operation.
pub struct TransactionBuilder {
    rpc: Arc<dyn LedgerRpc>,
    contract: ProgramContract,
    guard: RegistrationGuard,
}

impl TransactionBuilder {
    /// Create a builder reading through `rpc`.
    pub fn new(rpc: Arc<dyn LedgerRpc>, contract: ProgramContract) -> Self {
        let guard = RegistrationGuard::new(Arc::clone(&rpc), contract);
        Self {
            rpc,
            contract,
            guard,
        }
    }

    /// The contract this builder targets.
    pub fn contract(&self) -> &ProgramContract {
        &self.contract
    }

    /// Build a standalone registration transaction.
    ///
    /// Fails with `AlreadyRegistered` when the wallet has a user-info
    /// account, and validates the referrer before anything is assembled.
    pub async fn build_register(
        &self,
        owner: &Pubkey,
        referrer: Option<&Pubkey>,
    ) -> Result<Transaction> {
        if self.guard.is_registered(owner).await.map_err(user_facing)? {
            return Err(ClientError::AlreadyRegistered(*owner));
        }
        self.validate_referrer(owner, referrer).await?;
        let ix = instruction::register_user(&self.contract, owner, referrer)?;
        self.assemble_for(owner, vec![ix]).await
    }

    /// Build a stake transaction, registering the wallet first when needed.
    ///
    /// `amount_tokens` is a whole-token amount; conversion to base units is
    /// checked.  The program's configured minimum stake is enforced before
    /// assembly so the transaction cannot fail on-chain for a knowable
    /// reason.
    pub async fn build_stake(
        &self,
        owner: &Pubkey,
        owner_token_account: &Pubkey,
        amount_tokens: u64,
        referrer: Option<&Pubkey>,
    ) -> Result<Transaction> {
        let amount = self.contract.to_base_units(amount_tokens)?;
        if let Some(global_state) = self.read_global_state().await? {
            if amount < global_state.min_stake_amount {
                return Err(ClientError::AmountBelowMinimum {
                    amount,
                    minimum: global_state.min_stake_amount,
                });
            }
        }

        let mut instructions = Vec::with_capacity(2);
        if !self.guard.is_registered(owner).await.map_err(user_facing)? {
            self.validate_referrer(owner, referrer).await?;
            info!("wallet {owner} is unregistered, prepending register_user");
            instructions.push(instruction::register_user(&self.contract, owner, referrer)?);
        }
        instructions.push(instruction::stake(
            &self.contract,
            owner,
            owner_token_account,
            amount,
        )?);
        self.assemble_for(owner, instructions).await
    }

    /// Build a stake transaction whose fee is paid by the service.
    ///
    /// The returned transaction carries the service signature only; the
    /// owner's signature is attached by the wallet before submission
    /// (serialize it with `require_all_signatures = false`).
    pub async fn build_sponsored_stake(
        &self,
        fee_payer: &Keypair,
        owner: &Pubkey,
        owner_token_account: &Pubkey,
        amount_tokens: u64,
        referrer: Option<&Pubkey>,
    ) -> Result<Transaction> {
        let amount = self.contract.to_base_units(amount_tokens)?;
        let mut instructions = Vec::with_capacity(2);
        if !self.guard.is_registered(owner).await.map_err(user_facing)? {
            self.validate_referrer(owner, referrer).await?;
            instructions.push(instruction::register_user(&self.contract, owner, referrer)?);
        }
        instructions.push(instruction::stake(
            &self.contract,
            owner,
            owner_token_account,
            amount,
        )?);

        let blockhash = self.rpc.latest_blockhash().await.map_err(user_facing)?;
        let mut tx = transaction::assemble(&instructions, &fee_payer.pubkey(), blockhash)?;
        transaction::partial_sign(&mut tx, &[fee_payer], blockhash)?;
        Ok(tx)
    }

    /// Build an unstake transaction.
    ///
    /// Requires registration and a sufficient staked balance.
    pub async fn build_unstake(
        &self,
        owner: &Pubkey,
        owner_token_account: &Pubkey,
        amount_tokens: u64,
    ) -> Result<Transaction> {
        let amount = self.contract.to_base_units(amount_tokens)?;
        let user_info = self
            .read_user_info(owner)
            .await?
            .ok_or(ClientError::NotRegistered(*owner))?;
        if user_info.staked_amount < amount {
            return Err(ClientError::InsufficientBalance {
                available: user_info.staked_amount,
                requested: amount,
            });
        }
        let ix = instruction::unstake(&self.contract, owner, owner_token_account, amount)?;
        self.assemble_for(owner, vec![ix]).await
    }

    /// Build a claim-rewards transaction.
    pub async fn build_claim(
        &self,
        owner: &Pubkey,
        owner_token_account: &Pubkey,
    ) -> Result<Transaction> {
        if !self.guard.is_registered(owner).await.map_err(user_facing)? {
            return Err(ClientError::NotRegistered(*owner));
        }
        let ix = instruction::claim_rewards(&self.contract, owner, owner_token_account)?;
        self.assemble_for(owner, vec![ix]).await
    }

    /// Build a compound-rewards transaction.
    pub async fn build_compound(&self, owner: &Pubkey) -> Result<Transaction> {
        if !self.guard.is_registered(owner).await.map_err(user_facing)? {
            return Err(ClientError::NotRegistered(*owner));
        }
        let ix = instruction::compound_rewards(&self.contract, owner)?;
        self.assemble_for(owner, vec![ix]).await
    }

    /// Build and sign the backend's referral-credit follow-up after a
    /// referred wallet's first stake.  The service authority is the only
    /// required signer, so the result is submit-ready.
    pub async fn build_referrer_credit(
        &self,
        authority: &Keypair,
        referrer: &Pubkey,
        staking_amount: u64,
    ) -> Result<Transaction> {
        if !self.guard.is_registered(referrer).await.map_err(user_facing)? {
            return Err(ClientError::InvalidReferrer(format!(
                "referrer {referrer} has no user-info account"
            )));
        }
        let ix = instruction::update_referrer_rewards(
            &self.contract,
            &authority.pubkey(),
            referrer,
            staking_amount,
        )?;
        let blockhash = self.rpc.latest_blockhash().await.map_err(user_facing)?;
        let mut tx = transaction::assemble(&[ix], &authority.pubkey(), blockhash)?;
        transaction::partial_sign(&mut tx, &[authority], blockhash)?;
        Ok(tx)
    }

    /// Current on-chain user info for `wallet`, when registered.
    pub async fn read_user_info(&self, wallet: &Pubkey) -> Result<Option<UserInfo>> {
        let (address, _) = pda::user_info_address(&self.contract, wallet)?;
        let Some(account) = self.rpc.get_account(&address).await.map_err(user_facing)? else {
            return Ok(None);
        };
        if account.owner != self.contract.program_id {
            return Ok(None);
        }
        UserInfo::deserialize(&account.data)
            .map(Some)
            .map_err(|err| ClientError::InvalidAccountData {
                address,
                reason: err.to_string(),
            })
    }

    /// Current on-chain global state, when initialized.
    pub async fn read_global_state(&self) -> Result<Option<GlobalState>> {
        let (address, _) = pda::global_state_address(&self.contract)?;
        let Some(account) = self.rpc.get_account(&address).await.map_err(user_facing)? else {
            warn!("global state account {address} not found");
            return Ok(None);
        };
        GlobalState::deserialize(&account.data)
            .map(Some)
            .map_err(|err| ClientError::InvalidAccountData {
                address,
                reason: err.to_string(),
            })
    }

    async fn validate_referrer(&self, owner: &Pubkey, referrer: Option<&Pubkey>) -> Result<()> {
        let Some(referrer) = referrer else {
            return Ok(());
        };
        if referrer == owner {
            return Err(ClientError::InvalidReferrer(
                "a wallet cannot refer itself".to_string(),
            ));
        }
        if !self
            .guard
            .is_registered(referrer)
            .await
            .map_err(user_facing)?
        {
            return Err(ClientError::InvalidReferrer(format!(
                "referrer {referrer} is not registered"
            )));
        }
        Ok(())
    }

    /// Fetch the freshness token and assemble with `owner` as fee payer.
    async fn assemble_for(
        &self,
        owner: &Pubkey,
        instructions: Vec<Instruction>,
    ) -> Result<Transaction> {
        let blockhash = self.rpc.latest_blockhash().await.map_err(user_facing)?;
        transaction::assemble(&instructions, owner, blockhash)
    }
}

/// Collapse transient RPC failures into the user-visible category.
fn user_facing(err: ClientError) -> ClientError {
    match err {
        ClientError::RpcTransient(reason) => {
            warn!("ledger unavailable: {reason}");
            ClientError::NetworkUnavailable
        }
        other => other,
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
