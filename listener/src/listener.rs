//! The log subscription loop.
//!
//! One background task per listener: it subscribes to the program's log
//! stream, classifies every batch, and applies the resulting events to the
//! shared cache.  Stream failures are recoverable — the task re-subscribes
//! with capped exponential backoff — and a shutdown signal tears the
//! subscription down cleanly.

use {
    crate::classify::{CONSERVATIVE_DEFAULT_AMOUNT, ClassifiedLogs, LogClassifier},
    futures::StreamExt,
    hatm_program_client::{
        contract::ProgramContract,
        error::DerivationError,
        rpc::LedgerRpc,
    },
    hatm_reconciler::{
        cache::StakeCache,
        event::{EventKind, EventSource, StakeEvent},
        unix_now,
    },
    log::{debug, info, warn},
    solana_commitment_config::CommitmentConfig,
    solana_pubsub_client::nonblocking::pubsub_client::{PubsubClient, PubsubClientError},
    solana_rpc_client_api::{
        config::{RpcTransactionLogsConfig, RpcTransactionLogsFilter},
        response::RpcLogsResponse,
    },
    solana_signature::Signature,
    std::{str::FromStr, sync::Arc, time::Duration},
    tokio::{sync::watch, task::JoinHandle},
};

/// Tunables for the subscription loop.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Websocket endpoint of the ledger RPC node.
    pub ws_url: String,
    /// Delay before the first reconnect attempt; doubles per failure.
    pub reconnect_base_delay: Duration,
    /// Ceiling for the reconnect delay.
    pub reconnect_max_delay: Duration,
    /// Interval between health-check log lines.
    pub health_check_interval: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            ws_url: "wss://api.mainnet-beta.solana.com/".to_string(),
            reconnect_base_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(60),
            health_check_interval: Duration::from_secs(30),
        }
    }
}

/// Handle to the background subscription task.
pub struct LogListener {
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl LogListener {
    /// Start listening.  The task runs until [`LogListener::shutdown`].
    pub fn start(
        config: ListenerConfig,
        contract: ProgramContract,
        rpc: Arc<dyn LedgerRpc>,
        cache: Arc<StakeCache>,
    ) -> Result<Self, DerivationError> {
        let classifier = Arc::new(LogClassifier::new(&contract)?);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(
            config, contract, classifier, rpc, cache, shutdown_rx,
        ));
        Ok(Self {
            shutdown,
            handle: Some(handle),
        })
    }

    /// Signal the task to stop and wait for it to unsubscribe and exit.
    pub async fn shutdown(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                warn!("listener task ended abnormally: {err}");
            }
        }
    }
}

/// Outer loop: subscribe, consume until failure, back off, repeat.
async fn run_loop(
    config: ListenerConfig,
    contract: ProgramContract,
    classifier: Arc<LogClassifier>,
    rpc: Arc<dyn LedgerRpc>,
    cache: Arc<StakeCache>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut delay = config.reconnect_base_delay;
    loop {
        if *shutdown.borrow() {
            break;
        }
        match run_subscription(
            &config,
            &contract,
            &classifier,
            &rpc,
            &cache,
            &mut shutdown,
        )
        .await
        {
            // Clean shutdown.
            Ok(true) => break,
            Ok(false) => {
                warn!("log stream ended, reconnecting in {delay:?}");
            }
            Err(err) => {
                warn!("log subscription failed: {err}, reconnecting in {delay:?}");
            }
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => {}
        }
        delay = delay.saturating_mul(2).min(config.reconnect_max_delay);
    }
    info!("log listener stopped");
}

/// One subscription lifetime: connect, stream, unsubscribe.
///
/// Returns `true` when the exit was a requested shutdown, `false` when the
/// stream ended and the caller should reconnect.
async fn run_subscription(
    config: &ListenerConfig,
    contract: &ProgramContract,
    classifier: &LogClassifier,
    rpc: &Arc<dyn LedgerRpc>,
    cache: &Arc<StakeCache>,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<bool, PubsubClientError> {
    let client = PubsubClient::new(&config.ws_url).await?;
    let (mut stream, unsubscribe) = client
        .logs_subscribe(
            RpcTransactionLogsFilter::Mentions(vec![contract.program_id.to_string()]),
            RpcTransactionLogsConfig {
                commitment: Some(CommitmentConfig::confirmed()),
            },
        )
        .await?;
    info!(
        "subscribed to logs of program {} via {}",
        contract.program_id, config.ws_url
    );

    // Replay what happened while we were not subscribed.  The cache's
    // signature dedup makes this safe against overlap with the webhook
    // feed or a previous session.
    backfill_recent(classifier, rpc, cache, contract).await;

    let mut health = tokio::time::interval(config.health_check_interval);
    let mut batches_seen = 0u64;
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            _ = health.tick() => {
                debug!("listener healthy, {batches_seen} log batches this session");
            }
            item = stream.next() => match item {
                Some(response) => {
                    batches_seen = batches_seen.saturating_add(1);
                    process_log_batch(classifier, rpc, cache, response.value).await;
                }
                None => {
                    unsubscribe().await;
                    return Ok(false);
                }
            },
        }
    }

    unsubscribe().await;
    Ok(true)
}

/// How many recent program transactions to replay after (re)connecting.
const BACKFILL_SIGNATURE_LIMIT: usize = 25;

/// Catch up on transactions missed between subscriptions.
///
/// Fetches the most recent signatures mentioning the program, replays
/// them oldest-first through the normal classification path, and lets the
/// cache's dedup discard anything another feed already applied.
pub async fn backfill_recent(
    classifier: &LogClassifier,
    rpc: &Arc<dyn LedgerRpc>,
    cache: &Arc<StakeCache>,
    contract: &ProgramContract,
) {
    let signatures = match rpc
        .get_signatures_for_address(&contract.program_id, BACKFILL_SIGNATURE_LIMIT)
        .await
    {
        Ok(signatures) => signatures,
        Err(err) => {
            warn!("backfill signature listing failed: {err}");
            return;
        }
    };
    let mut replayed = 0usize;
    for signature in signatures.iter().rev() {
        match rpc.get_transaction(signature).await {
            Ok(Some(details)) => {
                if let Some(event) = resolve_event(
                    classifier,
                    rpc,
                    &signature.to_string(),
                    &details.log_messages,
                )
                .await
                {
                    cache.apply(&event);
                    replayed = replayed.saturating_add(1);
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!("backfill fetch for {signature} failed: {err}");
            }
        }
    }
    if replayed > 0 {
        info!("backfilled {replayed} events from recent program history");
    }
}

/// Classify one batch and apply the event, if any.
///
/// Every failure here is local: log it, drop the batch, keep listening.
async fn process_log_batch(
    classifier: &LogClassifier,
    rpc: &Arc<dyn LedgerRpc>,
    cache: &Arc<StakeCache>,
    response: RpcLogsResponse,
) {
    if response.err.is_some() {
        debug!("skipping failed transaction {}", response.signature);
        return;
    }
    if let Some(event) =
        resolve_event(classifier, rpc, &response.signature, &response.logs).await
    {
        cache.apply(&event);
    }
}

/// Turn a log batch into an event, consulting the transaction's balance
/// deltas when the logs alone are not enough.
///
/// Returns `None` — never an error — when the batch is unclassifiable or
/// no wallet can be attributed.
pub async fn resolve_event(
    classifier: &LogClassifier,
    rpc: &Arc<dyn LedgerRpc>,
    signature: &str,
    logs: &[String],
) -> Option<StakeEvent> {
    let ClassifiedLogs {
        kind,
        amount,
        wallet,
    } = classifier.classify(logs);
    if kind == EventKind::Unknown {
        debug!("unclassifiable log batch {signature}");
        return None;
    }

    let resolved = if let (Some(wallet), Some(amount)) = (wallet, amount) {
        Some((wallet, amount))
    } else {
        // Logs were not enough: fetch the transaction and fall back to the
        // per-owner token-balance delta.
        let fallback = fetch_balance_delta(classifier, rpc, signature, kind).await;
        match (wallet, fallback) {
            // Trust the delta's amount over a missing one, but keep the
            // wallet the logs named.
            (Some(wallet), Some((_, delta))) => Some((wallet, delta)),
            (Some(wallet), None) => Some((wallet, amount.unwrap_or(0))),
            (None, Some((wallet, delta))) => Some((wallet, delta)),
            (None, None) => None,
        }
    };
    let Some((wallet, amount)) = resolved else {
        debug!("discarding {kind} event {signature}: wallet undeterminable");
        return None;
    };

    let amount = if amount == 0 && kind != EventKind::Claim {
        warn!("{kind} event {signature} has no recoverable amount, recording conservative default");
        CONSERVATIVE_DEFAULT_AMOUNT
    } else {
        amount
    };

    Some(StakeEvent::new(
        kind,
        wallet,
        amount,
        signature,
        unix_now(),
        EventSource::OnChain,
    ))
}

async fn fetch_balance_delta(
    classifier: &LogClassifier,
    rpc: &Arc<dyn LedgerRpc>,
    signature: &str,
    kind: EventKind,
) -> Option<(solana_pubkey::Pubkey, u64)> {
    let parsed = match Signature::from_str(signature) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!("unparseable signature {signature}: {err}");
            return None;
        }
    };
    let details = match rpc.get_transaction(&parsed).await {
        Ok(Some(details)) => details,
        Ok(None) => {
            debug!("transaction {signature} not found for fallback");
            return None;
        }
        Err(err) => {
            warn!("transaction fetch for {signature} failed: {err}");
            return None;
        }
    };
    classifier.balance_delta(&details, kind)
}

// ── Tests ───────────────────────────────────────────────────────────────────
