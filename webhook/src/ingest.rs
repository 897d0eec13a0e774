//! Payload parsing: transaction summaries → typed events.
//!
//! The indexer delivers each transaction in a partially-parsed form:
//! instruction list (program id + base58 data), token transfers it already
//! decoded, and the raw log messages.  Extraction prefers the richest
//! source available, in the same order the log listener uses:
//!
//! 1. parsed token transfers in the staking mint,
//! 2. the staking instruction's own encoded data,
//! 3. log keyword/regex heuristics.

use {
    crate::{Result, WebhookAuth, WebhookError},
    hatm_listener::classify::{CONSERVATIVE_DEFAULT_AMOUNT, LogClassifier},
    hatm_program_client::{
        contract::ProgramContract,
        error::DerivationError,
        instruction::StakingInstruction,
    },
    hatm_reconciler::{
        event::{EventKind, EventSource, StakeEvent},
        unix_now,
    },
    log::{debug, warn},
    serde::Deserialize,
    solana_pubkey::Pubkey,
    std::str::FromStr,
};

/// One transaction summary as delivered by the indexer.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookTransaction {
    /// Transaction signature.
    pub signature: String,
    /// Block time, when the indexer includes it.
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// Raw log messages.
    #[serde(default, alias = "logMessages")]
    pub logs: Vec<String>,
    /// Token movements the indexer already decoded.
    #[serde(default, alias = "tokenTransfers")]
    pub token_transfers: Vec<TokenTransfer>,
    /// Top-level instructions.
    #[serde(default)]
    pub instructions: Vec<WebhookInstruction>,
}

/// A decoded token movement.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenTransfer {
    /// Token account owner the tokens left.
    #[serde(default, alias = "fromUserAccount")]
    pub from_user_account: Option<String>,
    /// Token account owner the tokens reached.
    #[serde(default, alias = "toUserAccount")]
    pub to_user_account: Option<String>,
    /// Mint of the moved token.
    pub mint: String,
    /// Human-unit amount (indexers deliver UI units, not base units).
    #[serde(alias = "tokenAmount")]
    pub token_amount: f64,
}

/// One instruction of a summarized transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookInstruction {
    /// The invoked program.
    #[serde(alias = "programId")]
    pub program_id: String,
    /// Base58-encoded instruction data.
    #[serde(default)]
    pub data: String,
    /// Account addresses in instruction order.
    #[serde(default)]
    pub accounts: Vec<String>,
}

/// Payloads arrive either as a bare array or wrapped in an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WebhookPayload {
    Transactions(Vec<WebhookTransaction>),
    Wrapped { transactions: Vec<WebhookTransaction> },
}

/// Verifies and converts webhook deliveries into reconciler events.
pub struct WebhookIngestor {
    contract: ProgramContract,
    classifier: LogClassifier,
    auth: WebhookAuth,
}

impl WebhookIngestor {
    /// Build an ingestor for `contract`, verifying against `secret`.
    pub fn new(contract: ProgramContract, secret: Option<String>) -> Result<Self> {
        let classifier = LogClassifier::new(&contract)
            .map_err(|err: DerivationError| WebhookError::Payload(err.to_string()))?;
        Ok(Self {
            contract,
            classifier,
            auth: WebhookAuth::new(secret),
        })
    }

    /// Verify authenticity, then extract every staking event in the body.
    ///
    /// Authentication failures reject the whole delivery before any
    /// parsing; unattributable transactions inside a valid delivery are
    /// skipped individually.
    pub fn ingest(
        &self,
        raw_body: &[u8],
        signature_header: Option<&str>,
    ) -> Result<Vec<StakeEvent>> {
        self.auth.verify(raw_body, signature_header)?;

        let payload: WebhookPayload = serde_json::from_slice(raw_body)
            .map_err(|err| WebhookError::Payload(err.to_string()))?;
        let transactions = match payload {
            WebhookPayload::Transactions(transactions) => transactions,
            WebhookPayload::Wrapped { transactions } => transactions,
        };

        Ok(transactions
            .iter()
            .filter_map(|tx| self.event_from_summary(tx))
            .collect())
    }

    fn event_from_summary(&self, tx: &WebhookTransaction) -> Option<StakeEvent> {
        let decoded = self.decode_program_instruction(tx);
        let kind = match &decoded {
            Some((_, StakingInstruction::Stake { .. })) => EventKind::Stake,
            Some((_, StakingInstruction::Unstake { .. })) => EventKind::Unstake,
            // Compounding also zeroes the pending rewards; the staked
            // amount is trued up by the next poll.
            Some((_, StakingInstruction::ClaimRewards))
            | Some((_, StakingInstruction::CompoundRewards)) => EventKind::Claim,
            Some((_, StakingInstruction::RegisterUser { .. }))
            | Some((_, StakingInstruction::UpdateReferrerRewards { .. })) => {
                debug!("no stake state change in {}", tx.signature);
                return None;
            }
            None => self.classifier.classify(&tx.logs).kind,
        };
        if kind == EventKind::Unknown {
            debug!("webhook transaction {} not classifiable", tx.signature);
            return None;
        }

        let (transfer_wallet, transfer_amount) = self.from_token_transfers(tx, kind);
        let (instruction_wallet, instruction_amount) = match &decoded {
            Some((first_account, instruction)) => (
                *first_account,
                match instruction {
                    StakingInstruction::Stake { amount }
                    | StakingInstruction::Unstake { amount } => Some(*amount),
                    _ => None,
                },
            ),
            None => (None, None),
        };
        let from_logs = self.classifier.classify(&tx.logs);

        let Some(wallet) = transfer_wallet.or(instruction_wallet).or(from_logs.wallet) else {
            warn!(
                "discarding webhook {} {}: wallet undeterminable",
                kind, tx.signature
            );
            return None;
        };
        let amount = transfer_amount
            .or(instruction_amount)
            .or(from_logs.amount)
            .unwrap_or(0);
        let amount = if amount == 0 && kind != EventKind::Claim {
            warn!(
                "webhook {} {} has no recoverable amount, recording conservative default",
                kind, tx.signature
            );
            CONSERVATIVE_DEFAULT_AMOUNT
        } else {
            amount
        };

        Some(StakeEvent::new(
            kind,
            wallet,
            amount,
            tx.signature.clone(),
            tx.timestamp.unwrap_or_else(unix_now),
            EventSource::Webhook,
        ))
    }

    /// Locate and decode the staking program's instructions, returning the
    /// first state-changing one with its first account (the acting
    /// wallet).  A registration in the same transaction — the normal
    /// first-stake flow prepends one — must not shadow the stake that
    /// follows it.
    fn decode_program_instruction(
        &self,
        tx: &WebhookTransaction,
    ) -> Option<(Option<Pubkey>, StakingInstruction)> {
        let program_id = self.contract.program_id.to_string();
        let mut bookkeeping_only = None;
        for ix in tx.instructions.iter().filter(|ix| ix.program_id == program_id) {
            let Ok(data) = bs58::decode(&ix.data).into_vec() else {
                continue;
            };
            let instruction = match StakingInstruction::decode(&data) {
                Ok(instruction) => instruction,
                Err(err) => {
                    debug!("undecodable instruction data in {}: {err}", tx.signature);
                    continue;
                }
            };
            let first_account = ix
                .accounts
                .first()
                .and_then(|account| Pubkey::from_str(account).ok());
            match instruction {
                StakingInstruction::Stake { .. }
                | StakingInstruction::Unstake { .. }
                | StakingInstruction::ClaimRewards
                | StakingInstruction::CompoundRewards => {
                    return Some((first_account, instruction));
                }
                other => {
                    bookkeeping_only.get_or_insert((first_account, other));
                }
            }
        }
        bookkeeping_only
    }

    /// Wallet and amount from the indexer's own token-transfer decoding.
    fn from_token_transfers(
        &self,
        tx: &WebhookTransaction,
        kind: EventKind,
    ) -> (Option<Pubkey>, Option<u64>) {
        let mint = self.contract.token_mint.to_string();
        let Some(transfer) = tx.token_transfers.iter().find(|t| t.mint == mint) else {
            return (None, None);
        };
        // On a stake tokens leave the wallet; on an unstake or claim they
        // return to it.
        let wallet = match kind {
            EventKind::Stake => transfer.from_user_account.as_deref(),
            _ => transfer.to_user_account.as_deref(),
        }
        .and_then(|address| Pubkey::from_str(address).ok());
        (wallet, self.ui_to_base_units(transfer.token_amount))
    }

    fn ui_to_base_units(&self, ui_amount: f64) -> Option<u64> {
        if !ui_amount.is_finite() || ui_amount < 0.0 {
            return None;
        }
        let scaled = (ui_amount * 10f64.powi(self.contract.decimals as i32)).round();
        if scaled > u64::MAX as f64 {
            return None;
        }
        Some(scaled as u64)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    const SECRET: &str = "hook-secret";

    fn ingestor() -> WebhookIngestor {
        WebhookIngestor::new(ProgramContract::mainnet(), Some(SECRET.to_string())).unwrap()
    }

    fn signed(body: &[u8]) -> String {
        use hmac::{Hmac, Mac};
        let mut mac = Hmac::<sha2::Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_event_from_token_transfers() {
        let contract = ProgramContract::mainnet();
        let wallet = Pubkey::new_unique();
        let body = serde_json::to_vec(&json!([{
            "signature": "5Nf3sig",
            "timestamp": 1_754_000_000i64,
            "tokenTransfers": [{
                "fromUserAccount": wallet.to_string(),
                "toUserAccount": Pubkey::new_unique().to_string(),
                "mint": contract.token_mint.to_string(),
                "tokenAmount": 500.0,
            }],
            "logMessages": ["Program log: Instruction: Stake"],
        }]))
        .unwrap();

        let events = ingestor().ingest(&body, Some(&signed(&body))).unwrap();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.kind, EventKind::Stake);
        assert_eq!(event.wallet, wallet);
        assert_eq!(event.amount, 500_000_000_000); // 500 tokens at 9 decimals
        assert_eq!(event.observed_at, 1_754_000_000);
        assert_eq!(event.source, EventSource::Webhook);
    }

    #[test]
    fn test_event_from_instruction_data() {
        let contract = ProgramContract::mainnet();
        let wallet = Pubkey::new_unique();
        let data = StakingInstruction::Unstake {
            amount: 40_000_000_000,
        }
        .encode();
        let body = serde_json::to_vec(&json!([{
            "signature": "2abcSig",
            "instructions": [{
                "programId": contract.program_id.to_string(),
                "data": bs58::encode(&data).into_string(),
                "accounts": [wallet.to_string()],
            }],
        }]))
        .unwrap();

        let events = ingestor().ingest(&body, Some(&signed(&body))).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Unstake);
        assert_eq!(events[0].wallet, wallet);
        assert_eq!(events[0].amount, 40_000_000_000);
    }

    #[test]
    fn test_event_from_logs_last() {
        let wallet = Pubkey::new_unique();
        let body = serde_json::to_vec(&json!([{
            "signature": "3defSig",
            "logMessages": [format!("Program log: Claimed rewards: 1250 for {wallet}")],
        }]))
        .unwrap();

        let events = ingestor().ingest(&body, Some(&signed(&body))).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Claim);
        assert_eq!(events[0].wallet, wallet);
    }

    #[test]
    fn test_register_only_transaction_emits_nothing() {
        let contract = ProgramContract::mainnet();
        let data = StakingInstruction::RegisterUser { referrer: None }.encode();
        let body = serde_json::to_vec(&json!([{
            "signature": "4regSig",
            "instructions": [{
                "programId": contract.program_id.to_string(),
                "data": bs58::encode(&data).into_string(),
                "accounts": [Pubkey::new_unique().to_string()],
            }],
        }]))
        .unwrap();

        let events = ingestor().ingest(&body, Some(&signed(&body))).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_register_plus_stake_emits_the_stake() {
        let contract = ProgramContract::mainnet();
        let wallet = Pubkey::new_unique();
        let register = StakingInstruction::RegisterUser { referrer: None }.encode();
        let stake = StakingInstruction::Stake {
            amount: 10_000_000_000,
        }
        .encode();
        let body = serde_json::to_vec(&json!([{
            "signature": "7comboSig",
            "instructions": [
                {
                    "programId": contract.program_id.to_string(),
                    "data": bs58::encode(&register).into_string(),
                    "accounts": [wallet.to_string()],
                },
                {
                    "programId": contract.program_id.to_string(),
                    "data": bs58::encode(&stake).into_string(),
                    "accounts": [wallet.to_string()],
                },
            ],
        }]))
        .unwrap();

        let events = ingestor().ingest(&body, Some(&signed(&body))).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Stake);
        assert_eq!(events[0].amount, 10_000_000_000);
        assert_eq!(events[0].wallet, wallet);
    }

    #[test]
    fn test_wrapped_payload_form() {
        let wallet = Pubkey::new_unique();
        let body = serde_json::to_vec(&json!({
            "transactions": [{
                "signature": "5wrapSig",
                "logMessages": [format!("Program log: staked 77 by {wallet}")],
            }]
        }))
        .unwrap();

        let events = ingestor().ingest(&body, Some(&signed(&body))).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].amount, 77);
    }

    #[test]
    fn test_bad_signature_rejected_without_parsing() {
        let body = br#"[{"signature":"x","logMessages":["staked 5"]}]"#;
        let err = ingestor().ingest(body, Some("wrong")).unwrap_err();
        assert!(matches!(err, WebhookError::Auth(_)));
    }

    #[test]
    fn test_malformed_body_is_payload_error() {
        let body = b"not json at all";
        let err = ingestor()
            .ingest(body, Some(&signed(body)))
            .unwrap_err();
        assert!(matches!(err, WebhookError::Payload(_)));
    }

    #[test]
    fn test_unrelated_transactions_skipped() {
        let body = serde_json::to_vec(&json!([{
            "signature": "6otherSig",
            "instructions": [{
                "programId": Pubkey::new_unique().to_string(),
                "data": "",
                "accounts": [],
            }],
            "logMessages": ["Program log: Instruction: Swap"],
        }]))
        .unwrap();

        let events = ingestor().ingest(&body, Some(&signed(&body))).unwrap();
        assert!(events.is_empty());
    }
}
