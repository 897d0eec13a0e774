//! Transaction assembly, partial signing and serialization.
//!
//! Assembly is pure: it orders instructions, sets the fee payer as the
//! first signer, and attaches the freshness token the caller fetched.  The
//! caller is responsible for fetching that token immediately before
//! assembly — it expires within a short validity window, and a transaction
//! built against a stale one will be rejected outright.
//!
//! Partial signing supports the sponsored flow: the backend signs with its
//! service key and hands the serialized payload to the wallet owner, who
//! attaches the final signature and submits.

use {
    crate::error::{ClientError, Result},
    solana_hash::Hash,
    solana_instruction::Instruction,
    solana_keypair::Keypair,
    solana_message::Message,
    solana_pubkey::Pubkey,
    solana_transaction::Transaction,
};

/// Assemble an unsigned transaction.
///
/// Fails on an empty instruction list; the fee payer becomes the first
/// required signer.
pub fn assemble(
    instructions: &[Instruction],
    fee_payer: &Pubkey,
    recent_blockhash: Hash,
) -> Result<Transaction> {
    if instructions.is_empty() {
        return Err(ClientError::EmptyTransaction);
    }
    let message = Message::new_with_blockhash(instructions, Some(fee_payer), &recent_blockhash);
    Ok(Transaction::new_unsigned(message))
}

/// Attach signatures for the keypairs that are present, leaving the rest
/// for another party.
pub fn partial_sign(
    transaction: &mut Transaction,
    keypairs: &[&Keypair],
    recent_blockhash: Hash,
) -> Result<()> {
    transaction.try_partial_sign(keypairs, recent_blockhash)?;
    Ok(())
}

/// Serialize to wire bytes.
///
/// With `require_all_signatures` the transaction must be fully signed;
/// without it, a partially-signed payload is produced for the counterparty
/// to complete.
pub fn serialize(transaction: &Transaction, require_all_signatures: bool) -> Result<Vec<u8>> {
    if require_all_signatures && !transaction.is_signed() {
        return Err(ClientError::MissingSignatures);
    }
    bincode::serialize(transaction).map_err(ClientError::Serialization)
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{contract::ProgramContract, instruction},
        solana_signer::Signer,
    };

    fn stake_instruction(owner: &Pubkey) -> Instruction {
        let contract = ProgramContract::mainnet();
        instruction::stake(&contract, owner, &Pubkey::new_unique(), 1_000_000_000).unwrap()
    }

    #[test]
    fn test_empty_instruction_list_rejected() {
        let err = assemble(&[], &Pubkey::new_unique(), Hash::new_unique()).unwrap_err();
        assert!(matches!(err, ClientError::EmptyTransaction));
    }

    #[test]
    fn test_fee_payer_is_first_signer() {
        let owner = Keypair::new();
        let fee_payer = Keypair::new();
        let ix = stake_instruction(&owner.pubkey());
        let tx = assemble(&[ix], &fee_payer.pubkey(), Hash::new_unique()).unwrap();
        assert_eq!(tx.message.account_keys[0], fee_payer.pubkey());
        // Two signers: the fee payer and the staking wallet.
        assert_eq!(tx.message.header.num_required_signatures, 2);
    }

    #[test]
    fn test_partial_then_full_signing() {
        let owner = Keypair::new();
        let fee_payer = Keypair::new();
        let blockhash = Hash::new_unique();
        let ix = stake_instruction(&owner.pubkey());
        let mut tx = assemble(&[ix], &fee_payer.pubkey(), blockhash).unwrap();

        partial_sign(&mut tx, &[&fee_payer], blockhash).unwrap();
        assert!(!tx.is_signed());
        // The partially-signed payload can be serialized for hand-off…
        assert!(serialize(&tx, false).is_ok());
        // …but not as a submit-ready transaction.
        assert!(matches!(
            serialize(&tx, true).unwrap_err(),
            ClientError::MissingSignatures
        ));

        partial_sign(&mut tx, &[&owner], blockhash).unwrap();
        assert!(tx.is_signed());
        let bytes = serialize(&tx, true).unwrap();
        // The wire bytes round-trip through bincode unchanged.
        let decoded: Transaction = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn test_single_signer_flow() {
        let owner = Keypair::new();
        let blockhash = Hash::new_unique();
        let ix = stake_instruction(&owner.pubkey());
        let mut tx = assemble(&[ix], &owner.pubkey(), blockhash).unwrap();
        partial_sign(&mut tx, &[&owner], blockhash).unwrap();
        assert!(tx.is_signed());
        assert!(serialize(&tx, true).is_ok());
    }
}
