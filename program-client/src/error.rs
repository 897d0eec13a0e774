//! Error types for the program client.

use {solana_pubkey::Pubkey, thiserror::Error};

/// Errors from program-derived address computation.
///
/// Both variants indicate a caller bug, never a transient condition: the
/// same inputs will fail the same way forever.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DerivationError {
    /// A seed exceeds the ledger's maximum seed length.
    #[error("seed {index} is {len} bytes (max {max} bytes)")]
    InvalidSeed {
        /// Position of the offending seed in the seed list.
        index: usize,
        /// Actual seed length.
        len: usize,
        /// Maximum permitted length.
        max: usize,
    },

    /// No bump in `[0, 255]` produced an off-curve address.
    #[error("no valid bump for seed list under program {0}")]
    NoValidBump(Pubkey),
}

/// Errors from instruction data encoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// A token amount does not fit in 64 bits of base units.
    #[error("amount {amount} tokens overflows u64 at {decimals} decimals")]
    AmountOverflow {
        /// Human-readable token amount.
        amount: u64,
        /// Decimal exponent applied.
        decimals: u8,
    },

    /// Instruction data was too short or carried an unknown discriminator.
    #[error("unrecognized instruction data: {0}")]
    UnknownInstruction(String),

    /// Instruction data was truncated relative to its discriminator's layout.
    #[error("instruction data truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes required by the layout.
        expected: usize,
        /// Bytes actually present.
        actual: usize,
    },
}

/// Errors surfaced by the client as a whole.
///
/// Derivation and encoding failures are always propagated — a silently
/// wrong address or payload means lost funds.  RPC failures are split into
/// transient (retryable) and permanent so callers never retry a lookup
/// that cannot succeed.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Address derivation failed.
    #[error(transparent)]
    Derivation(#[from] DerivationError),

    /// Instruction encoding failed.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// Network or timeout failure; retrying may succeed.
    #[error("transient rpc failure: {0}")]
    RpcTransient(String),

    /// The ledger definitively rejected the request; do not retry.
    #[error("permanent rpc failure: {0}")]
    RpcPermanent(String),

    /// Signing failed (missing or mismatched keypair).
    #[error("signing failure: {0}")]
    Signing(#[from] solana_signer::SignerError),

    /// Transaction wire serialization failed.
    #[error("serialization failure: {0}")]
    Serialization(#[from] bincode::Error),

    /// A transaction must contain at least one instruction.
    #[error("transaction has no instructions")]
    EmptyTransaction,

    /// Full serialization was requested but signatures are missing.
    #[error("transaction is missing required signatures")]
    MissingSignatures,

    /// On-chain account data failed to deserialize.
    #[error("invalid account data for {address}: {reason}")]
    InvalidAccountData {
        /// The account whose data was rejected.
        address: Pubkey,
        /// What went wrong.
        reason: String,
    },

    /// The wallet's staked balance cannot cover the request.
    #[error("insufficient staked balance: {available} available, {requested} requested")]
    InsufficientBalance {
        /// Base units currently staked.
        available: u64,
        /// Base units requested.
        requested: u64,
    },

    /// The stake amount is below the program's configured minimum.
    #[error("stake of {amount} is below the program minimum of {minimum}")]
    AmountBelowMinimum {
        /// Base units requested.
        amount: u64,
        /// Program minimum in base units.
        minimum: u64,
    },

    /// The wallet already owns a user-info account.
    #[error("wallet {0} is already registered")]
    AlreadyRegistered(Pubkey),

    /// The wallet has no user-info account yet.
    #[error("wallet {0} is not registered")]
    NotRegistered(Pubkey),

    /// The supplied referrer is unusable (self-referral, unregistered, …).
    #[error("invalid referrer: {0}")]
    InvalidReferrer(String),

    /// The ledger could not be reached after bounded retries.
    #[error("ledger unavailable")]
    NetworkUnavailable,
}

/// Convenience result type for program-client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
