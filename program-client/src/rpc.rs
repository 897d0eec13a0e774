//! The ledger read boundary.
//!
//! Everything this workspace consumes from the chain goes through the
//! [`LedgerRpc`] trait: account lookups, transaction lookups, signature
//! listings and the recent-blockhash freshness token.  The production
//! implementation wraps the nonblocking RPC client with a bounded timeout
//! and bounded retries; retries apply to transient failures only, so a
//! missing account is reported once, not hammered.

use {
    crate::error::{ClientError, Result},
    async_trait::async_trait,
    log::{debug, warn},
    solana_account::Account,
    solana_commitment_config::CommitmentConfig,
    solana_hash::Hash,
    solana_pubkey::Pubkey,
    solana_rpc_client::nonblocking::rpc_client::RpcClient,
    solana_rpc_client_api::client_error::{Error as RpcError, ErrorKind},
    solana_signature::Signature,
    solana_transaction_status_client_types::{
        EncodedConfirmedTransactionWithStatusMeta, UiTransactionEncoding,
        option_serializer::OptionSerializer,
    },
    std::{str::FromStr, time::Duration},
};

/// The fields of an account lookup this workspace cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerAccount {
    /// Program that owns the account.
    pub owner: Pubkey,
    /// Raw account data.
    pub data: Vec<u8>,
    /// Account balance in lamports.
    pub lamports: u64,
}

impl From<Account> for LedgerAccount {
    fn from(account: Account) -> Self {
        Self {
            owner: account.owner,
            data: account.data,
            lamports: account.lamports,
        }
    }
}

/// A token balance entry from transaction metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBalance {
    /// Index into the transaction's account list.
    pub account_index: u8,
    /// Wallet that owns the token account, when the RPC reports it.
    pub owner: Option<Pubkey>,
    /// Mint of the token account.
    pub mint: Pubkey,
    /// Balance in base units.
    pub amount: u64,
}

/// The slice of a confirmed transaction the listener and ingestor consume.
#[derive(Debug, Clone, Default)]
pub struct TransactionDetails {
    /// Program log messages, in emission order.
    pub log_messages: Vec<String>,
    /// Token balances before execution.
    pub pre_token_balances: Vec<TokenBalance>,
    /// Token balances after execution.
    pub post_token_balances: Vec<TokenBalance>,
}

/// Read access to the ledger.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Look up an account; `None` when it does not exist.
    async fn get_account(&self, address: &Pubkey) -> Result<Option<LedgerAccount>>;

    /// Look up a confirmed transaction; `None` when the ledger does not
    /// know the signature.
    async fn get_transaction(&self, signature: &Signature) -> Result<Option<TransactionDetails>>;

    /// Most recent `limit` signatures mentioning `address`, newest first.
    async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<Signature>>;

    /// The freshness token for transaction assembly.  Callers must fetch
    /// this immediately before signing — it expires.
    async fn latest_blockhash(&self) -> Result<Hash>;
}

/// Timeout and retry policy for ledger reads.
#[derive(Debug, Clone)]
pub struct RpcPolicy {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Attempts per request (first try included).
    pub max_attempts: u32,
    /// Delay before the first retry; doubles per attempt.
    pub retry_base_delay: Duration,
    /// Commitment level for all reads.
    pub commitment: CommitmentConfig,
}

impl Default for RpcPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(250),
            commitment: CommitmentConfig::confirmed(),
        }
    }
}

/// [`LedgerRpc`] over the nonblocking Solana RPC client.
pub struct SolanaLedgerRpc {
    client: RpcClient,
    policy: RpcPolicy,
}

impl SolanaLedgerRpc {
    /// Connect to `url` with the given policy.
    pub fn new(url: String, policy: RpcPolicy) -> Self {
        let client =
            RpcClient::new_with_timeout_and_commitment(url, policy.timeout, policy.commitment);
        Self { client, policy }
    }

    /// Run `attempt` under the retry policy.
    ///
    /// Transient failures (I/O, HTTP transport, request timeout) are
    /// retried with doubling delays; anything else is permanent and
    /// returned immediately.
    async fn with_retry<T, F, Fut>(&self, op: &str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: std::future::Future<Output = std::result::Result<T, RpcError>> + Send,
        T: Send,
    {
        let mut delay = self.policy.retry_base_delay;
        let mut last_failure = String::new();
        for try_number in 1..=self.policy.max_attempts {
            match tokio::time::timeout(self.policy.timeout, attempt()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) if !is_transient(&err) => {
                    return Err(ClientError::RpcPermanent(format!("{op}: {err}")));
                }
                Ok(Err(err)) => {
                    warn!("{op} attempt {try_number} failed: {err}");
                    last_failure = err.to_string();
                }
                Err(_) => {
                    warn!(
                        "{op} attempt {try_number} timed out after {:?}",
                        self.policy.timeout
                    );
                    last_failure = "request timeout".to_string();
                }
            }
            if try_number < self.policy.max_attempts {
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
        }
        Err(ClientError::RpcTransient(format!("{op}: {last_failure}")))
    }
}

fn is_transient(err: &RpcError) -> bool {
    matches!(*err.kind, ErrorKind::Io(_) | ErrorKind::Reqwest(_))
}

#[async_trait]
impl LedgerRpc for SolanaLedgerRpc {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<LedgerAccount>> {
        let commitment = self.policy.commitment;
        let response = self
            .with_retry("get_account", || {
                self.client.get_account_with_commitment(address, commitment)
            })
            .await?;
        Ok(response.value.map(LedgerAccount::from))
    }

    async fn get_transaction(&self, signature: &Signature) -> Result<Option<TransactionDetails>> {
        let config = solana_rpc_client_api::config::RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Json),
            commitment: Some(self.policy.commitment),
            max_supported_transaction_version: Some(0),
        };
        let fetched = self
            .with_retry("get_transaction", || {
                self.client
                    .get_transaction_with_config(signature, config.clone())
            })
            .await;
        match fetched {
            Ok(tx) => Ok(Some(extract_details(tx))),
            Err(ClientError::RpcPermanent(reason)) => {
                // The RPC reports unknown signatures as errors; surface as
                // absence rather than failure.
                debug!("transaction {signature} not found: {reason}");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> Result<Vec<Signature>> {
        let statuses = self
            .with_retry("get_signatures_for_address", || {
                self.client.get_signatures_for_address(address)
            })
            .await?;
        Ok(statuses
            .into_iter()
            .take(limit)
            .filter_map(|status| match Signature::from_str(&status.signature) {
                Ok(signature) => Some(signature),
                Err(err) => {
                    warn!("unparseable signature {}: {err}", status.signature);
                    None
                }
            })
            .collect())
    }

    async fn latest_blockhash(&self) -> Result<Hash> {
        self.with_retry("get_latest_blockhash", || self.client.get_latest_blockhash())
            .await
    }
}

/// Pull logs and token balances out of an encoded confirmed transaction.
fn extract_details(tx: EncodedConfirmedTransactionWithStatusMeta) -> TransactionDetails {
    let Some(meta) = tx.transaction.meta else {
        return TransactionDetails::default();
    };
    let log_messages = match meta.log_messages {
        OptionSerializer::Some(logs) => logs,
        _ => Vec::new(),
    };
    let pre_token_balances = match meta.pre_token_balances {
        OptionSerializer::Some(balances) => convert_token_balances(balances),
        _ => Vec::new(),
    };
    let post_token_balances = match meta.post_token_balances {
        OptionSerializer::Some(balances) => convert_token_balances(balances),
        _ => Vec::new(),
    };
    TransactionDetails {
        log_messages,
        pre_token_balances,
        post_token_balances,
    }
}

fn convert_token_balances(
    balances: Vec<solana_transaction_status_client_types::UiTransactionTokenBalance>,
) -> Vec<TokenBalance> {
    balances
        .into_iter()
        .filter_map(|balance| {
            let mint = match Pubkey::from_str(&balance.mint) {
                Ok(mint) => mint,
                Err(err) => {
                    warn!("token balance with unparseable mint {}: {err}", balance.mint);
                    return None;
                }
            };
            let amount = match balance.ui_token_amount.amount.parse::<u64>() {
                Ok(amount) => amount,
                Err(err) => {
                    warn!(
                        "token balance with unparseable amount {}: {err}",
                        balance.ui_token_amount.amount
                    );
                    return None;
                }
            };
            let owner = match balance.owner {
                OptionSerializer::Some(owner) => Pubkey::from_str(&owner).ok(),
                _ => None,
            };
            Some(TokenBalance {
                account_index: balance.account_index,
                owner,
                mint,
                amount,
            })
        })
        .collect()
}

// ── Deterministic in-memory ledger for tests ────────────────────────────────

#[cfg(any(test, feature = "dev-context-only-utils"))]
pub mod mock {
    use {
        super::*,
        std::{
            collections::HashMap,
            sync::{
                Mutex,
                atomic::{AtomicU32, Ordering},
            },
        },
    };

    /// What the next mock call should do instead of answering.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum MockFailure {
        /// Simulate a network failure.
        Transient,
        /// Simulate a definitive rejection.
        Permanent,
    }

    /// In-memory [`LedgerRpc`] with scriptable accounts and transactions.
    #[derive(Default)]
    pub struct MockLedger {
        accounts: Mutex<HashMap<Pubkey, LedgerAccount>>,
        transactions: Mutex<HashMap<Signature, TransactionDetails>>,
        signatures: Mutex<HashMap<Pubkey, Vec<Signature>>>,
        blockhash: Mutex<Hash>,
        failure: Mutex<Option<MockFailure>>,
        /// Number of `get_account` calls served, for idempotency tests.
        pub account_lookups: AtomicU32,
    }

    impl MockLedger {
        /// Empty ledger with a unique blockhash.
        pub fn new() -> Self {
            let ledger = Self::default();
            *ledger.blockhash.lock().unwrap() = Hash::new_unique();
            ledger
        }

        /// Install (or replace) an account.
        pub fn set_account(&self, address: Pubkey, account: LedgerAccount) {
            self.accounts.lock().unwrap().insert(address, account);
        }

        /// Remove an account entirely.
        pub fn remove_account(&self, address: &Pubkey) {
            self.accounts.lock().unwrap().remove(address);
        }

        /// Install a confirmed transaction.
        pub fn set_transaction(&self, signature: Signature, details: TransactionDetails) {
            self.transactions.lock().unwrap().insert(signature, details);
        }

        /// Record `signature` as mentioning `address`.
        pub fn push_signature(&self, address: Pubkey, signature: Signature) {
            self.signatures
                .lock()
                .unwrap()
                .entry(address)
                .or_default()
                .insert(0, signature);
        }

        /// Current blockhash, for assertions against assembled transactions.
        pub fn latest_blockhash_value(&self) -> Hash {
            *self.blockhash.lock().unwrap()
        }

        /// Make every call fail until [`Self::clear_failure`] is called.
        pub fn fail_with(&self, failure: MockFailure) {
            *self.failure.lock().unwrap() = Some(failure);
        }

        /// Resume normal operation.
        pub fn clear_failure(&self) {
            *self.failure.lock().unwrap() = None;
        }

        fn check_failure(&self) -> Result<()> {
            match *self.failure.lock().unwrap() {
                Some(MockFailure::Transient) => {
                    Err(ClientError::RpcTransient("mock network failure".into()))
                }
                Some(MockFailure::Permanent) => {
                    Err(ClientError::RpcPermanent("mock rejection".into()))
                }
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl LedgerRpc for MockLedger {
        async fn get_account(&self, address: &Pubkey) -> Result<Option<LedgerAccount>> {
            self.check_failure()?;
            self.account_lookups.fetch_add(1, Ordering::Relaxed);
            Ok(self.accounts.lock().unwrap().get(address).cloned())
        }

        async fn get_transaction(
            &self,
            signature: &Signature,
        ) -> Result<Option<TransactionDetails>> {
            self.check_failure()?;
            Ok(self.transactions.lock().unwrap().get(signature).cloned())
        }

        async fn get_signatures_for_address(
            &self,
            address: &Pubkey,
            limit: usize,
        ) -> Result<Vec<Signature>> {
            self.check_failure()?;
            Ok(self
                .signatures
                .lock()
                .unwrap()
                .get(address)
                .map(|sigs| sigs.iter().take(limit).copied().collect())
                .unwrap_or_default())
        }

        async fn latest_blockhash(&self) -> Result<Hash> {
            self.check_failure()?;
            Ok(*self.blockhash.lock().unwrap())
        }
    }
}
