//! Typed staking events.
//!
//! Both push feeds — the log listener and the webhook ingestor — normalize
//! what they observe into [`StakeEvent`]s before anything touches the
//! cache.  An event is consumed exactly once; its signature doubles as the
//! dedup key when both feeds report the same transaction.

use {serde::{Deserialize, Serialize}, solana_pubkey::Pubkey, std::fmt};

/// What happened on chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Tokens moved into the vault.
    Stake,
    /// Tokens returned to the wallet.
    Unstake,
    /// Accrued rewards paid out.
    Claim,
    /// A program transaction that could not be classified.
    Unknown,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Stake => write!(f, "stake"),
            EventKind::Unstake => write!(f, "unstake"),
            EventKind::Claim => write!(f, "claim"),
            EventKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Which feed produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSource {
    /// The program log subscription.
    OnChain,
    /// The push webhook.
    Webhook,
    /// A direct ledger read.
    Polled,
}

/// One observed staking action, ready for the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeEvent {
    /// The classified operation.
    pub kind: EventKind,
    /// The wallet the operation belongs to.  Never empty — producers
    /// discard events they cannot attribute.
    pub wallet: Pubkey,
    /// Amount in base units.  May be a conservative default when no feed
    /// carried a usable figure.
    pub amount: u64,
    /// Transaction signature (or delivery id) — the dedup key.
    pub signature: String,
    /// Unix timestamp at which this event was observed.
    pub observed_at: i64,
    /// The feed that produced it.
    pub source: EventSource,
}

impl StakeEvent {
    /// Shorthand constructor used throughout the producers.
    pub fn new(
        kind: EventKind,
        wallet: Pubkey,
        amount: u64,
        signature: impl Into<String>,
        observed_at: i64,
        source: EventSource,
    ) -> Self {
        Self {
            kind,
            wallet,
            amount,
            signature: signature.into(),
            observed_at,
            source,
        }
    }
}
