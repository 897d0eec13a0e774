//! Log classification heuristics.
//!
//! All guesswork lives behind [`LogClassifier`]; the subscription loop and
//! the webhook ingestor both consume it, so the two push feeds can never
//! drift apart on how a log line is read.

use {
    hatm_program_client::{
        contract::ProgramContract,
        error::DerivationError,
        pda,
        rpc::TransactionDetails,
    },
    hatm_reconciler::event::EventKind,
    regex::Regex,
    solana_pubkey::{PUBKEY_BYTES, Pubkey},
    std::collections::{HashMap, HashSet},
};

/// Fallback amount when every extraction path came up empty.
///
/// A known imprecision: the event is real (the keyword matched) but no feed
/// carried a figure, and recording one base unit keeps the record's
/// timestamps and data source honest until the next poll corrects the
/// amount.
pub const CONSERVATIVE_DEFAULT_AMOUNT: u64 = 1;

/// Outcome of classifying one log batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedLogs {
    /// The matched operation, `Unknown` when no keyword set hit.
    pub kind: EventKind,
    /// Amount parsed near the keyword, when present.
    pub amount: Option<u64>,
    /// First foreign base58 address found in the logs, when present.
    pub wallet: Option<Pubkey>,
}

/// Keyword/regex classification plus the balance-delta fallback.
pub struct LogClassifier {
    stake_pattern: Regex,
    unstake_pattern: Regex,
    claim_pattern: Regex,
    amount_pattern: Regex,
    /// Addresses that can never be the acting wallet: the program itself,
    /// its PDAs, the mint and the builtin programs.
    excluded: HashSet<Pubkey>,
    mint: Pubkey,
}

impl LogClassifier {
    /// Build a classifier for one program contract.
    pub fn new(contract: &ProgramContract) -> Result<Self, DerivationError> {
        let (vault, _) = pda::vault_address(contract)?;
        let (vault_authority, _) = pda::vault_authority_address(contract)?;
        let (global_state, _) = pda::global_state_address(contract)?;
        let excluded = HashSet::from([
            contract.program_id,
            contract.token_mint,
            vault,
            vault_authority,
            global_state,
            spl_generic_token::token::id(),
            solana_sdk_ids::system_program::id(),
            solana_sdk_ids::sysvar::rent::id(),
        ]);
        Ok(Self {
            // Word-bounded stems so "unstaked" never matches the stake set.
            stake_pattern: Regex::new(r"\b(stake[ds]?|staking|deposit(ed|s)?)\b")
                .expect("valid stake pattern"),
            unstake_pattern: Regex::new(r"\b(unstake[ds]?|unstaking|withdraw(al|n|ed|s)?)\b")
                .expect("valid unstake pattern"),
            claim_pattern: Regex::new(r"\b(claim(ed|s)?|rewards?)\b")
                .expect("valid claim pattern"),
            // Standalone digit runs only — digits embedded in a base58
            // address must not be read as amounts.
            amount_pattern: Regex::new(r"\b[0-9][0-9_,]*\b").expect("valid amount pattern"),
            excluded,
            mint: contract.token_mint,
        })
    }

    /// Classify one log batch.
    ///
    /// Keyword sets are tried in priority order — stake/deposit, then
    /// unstake/withdraw, then claim/reward — and the first match wins.
    /// The amount is the first integer at or after the matched keyword.
    pub fn classify(&self, logs: &[String]) -> ClassifiedLogs {
        let joined = logs.join("\n").to_lowercase();
        let matched = [
            (EventKind::Stake, &self.stake_pattern),
            (EventKind::Unstake, &self.unstake_pattern),
            (EventKind::Claim, &self.claim_pattern),
        ]
        .iter()
        .find_map(|(kind, pattern)| pattern.find(&joined).map(|found| (*kind, found.end())));

        let Some((kind, keyword_end)) = matched else {
            return ClassifiedLogs {
                kind: EventKind::Unknown,
                amount: None,
                wallet: None,
            };
        };

        ClassifiedLogs {
            kind,
            amount: self.amount_after(&joined, keyword_end),
            wallet: self.first_foreign_address(logs),
        }
    }

    /// Resolve wallet and amount from a fetched transaction's token-balance
    /// deltas.
    ///
    /// For a stake the acting wallet's balance in the staking mint goes
    /// down; for an unstake or claim it goes up.  The vault side of the
    /// transfer is excluded through its owner PDA.  Returns the wallet and
    /// the absolute delta.
    pub fn balance_delta(
        &self,
        details: &TransactionDetails,
        kind: EventKind,
    ) -> Option<(Pubkey, u64)> {
        let mut deltas: HashMap<Pubkey, i128> = HashMap::new();
        for balance in &details.pre_token_balances {
            let Some(owner) = balance.owner else { continue };
            if balance.mint != self.mint || self.excluded.contains(&owner) {
                continue;
            }
            let entry = deltas.entry(owner).or_insert(0);
            *entry = entry.saturating_sub(balance.amount as i128);
        }
        for balance in &details.post_token_balances {
            let Some(owner) = balance.owner else { continue };
            if balance.mint != self.mint || self.excluded.contains(&owner) {
                continue;
            }
            let entry = deltas.entry(owner).or_insert(0);
            *entry = entry.saturating_add(balance.amount as i128);
        }

        // Deterministic pick: largest magnitude first, owner bytes as the
        // tie breaker.
        let mut candidates: Vec<(Pubkey, i128)> = deltas.into_iter().collect();
        candidates.sort_by(|a, b| b.1.abs().cmp(&a.1.abs()).then(a.0.cmp(&b.0)));

        let wanted_negative = matches!(kind, EventKind::Stake);
        candidates
            .into_iter()
            .find(|(_, delta)| {
                if wanted_negative {
                    *delta < 0
                } else {
                    *delta > 0
                }
            })
            .map(|(owner, delta)| (owner, delta.unsigned_abs().min(u64::MAX as u128) as u64))
    }

    fn amount_after(&self, text: &str, from: usize) -> Option<u64> {
        let tail = text.get(from..)?;
        let found = self.amount_pattern.find(tail)?;
        let digits: String = found
            .as_str()
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        digits.parse::<u64>().ok()
    }

    /// First base58 address in the logs that isn't one of the program's
    /// own accounts.
    fn first_foreign_address(&self, logs: &[String]) -> Option<Pubkey> {
        for line in logs {
            for token in line.split(|c: char| !c.is_ascii_alphanumeric()) {
                if !(32..=44).contains(&token.len()) {
                    continue;
                }
                let Ok(bytes) = bs58::decode(token).into_vec() else {
                    continue;
                };
                if bytes.len() != PUBKEY_BYTES {
                    continue;
                }
                let Ok(address) = Pubkey::try_from(bytes.as_slice()) else {
                    continue;
                };
                if !self.excluded.contains(&address) {
                    return Some(address);
                }
            }
        }
        None
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
