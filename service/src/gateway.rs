//! The top-level facade the HTTP layer holds.
//!
//! One [`StakingGateway`] owns the shared cache and wires every feed to
//! it: the log listener (started as a background task), the webhook
//! ingestor (driven per request), and the polling query service.  The
//! transaction builder rides along on the same RPC connection.

use {
    crate::{config::GatewayConfig, query::StakingQueryService},
    hatm_listener::LogListener,
    hatm_program_client::{
        builder::TransactionBuilder,
        error::DerivationError,
        rpc::{LedgerRpc, SolanaLedgerRpc},
    },
    hatm_reconciler::{cache::StakeCache, event::StakeEvent},
    hatm_webhook::{Result as WebhookResult, WebhookIngestor},
    log::info,
    std::sync::Arc,
};

/// Everything the route layer needs, wired together.
pub struct StakingGateway {
    config: GatewayConfig,
    rpc: Arc<dyn LedgerRpc>,
    cache: Arc<StakeCache>,
    query: StakingQueryService,
    ingestor: WebhookIngestor,
    listener: Option<LogListener>,
}

impl StakingGateway {
    /// Connect to the configured RPC endpoint.
    pub fn connect(config: GatewayConfig) -> WebhookResult<Self> {
        let rpc: Arc<dyn LedgerRpc> = Arc::new(SolanaLedgerRpc::new(
            config.rpc_url.clone(),
            config.rpc_policy(),
        ));
        Self::with_rpc(config, rpc)
    }

    /// Wire the gateway over an existing ledger connection (tests use the
    /// deterministic mock here).
    pub fn with_rpc(config: GatewayConfig, rpc: Arc<dyn LedgerRpc>) -> WebhookResult<Self> {
        let cache = Arc::new(StakeCache::new());
        let query = StakingQueryService::new(
            Arc::clone(&rpc),
            config.contract,
            Arc::clone(&cache),
        );
        let ingestor = WebhookIngestor::new(config.contract, config.webhook_secret.clone())?;
        Ok(Self {
            config,
            rpc,
            cache,
            query,
            ingestor,
            listener: None,
        })
    }

    /// Start the background log listener.  Idempotent.
    pub fn start_listener(&mut self) -> Result<(), DerivationError> {
        if self.listener.is_some() {
            return Ok(());
        }
        let listener = LogListener::start(
            self.config.listener_config(),
            self.config.contract,
            Arc::clone(&self.rpc),
            Arc::clone(&self.cache),
        )?;
        info!("log listener started for {}", self.config.contract.program_id);
        self.listener = Some(listener);
        Ok(())
    }

    /// Stop the listener and wait for its subscription to tear down.
    pub async fn shutdown(&mut self) {
        if let Some(mut listener) = self.listener.take() {
            listener.shutdown().await;
        }
    }

    /// Verify and apply one webhook delivery.
    ///
    /// A failed verification returns before any event reaches the cache.
    pub fn ingest_webhook(
        &self,
        raw_body: &[u8],
        signature_header: Option<&str>,
    ) -> WebhookResult<Vec<StakeEvent>> {
        let events = self.ingestor.ingest(raw_body, signature_header)?;
        for event in &events {
            self.cache.apply(event);
        }
        Ok(events)
    }

    /// The polling/query surface.
    pub fn query(&self) -> &StakingQueryService {
        &self.query
    }

    /// The transaction builder sharing this gateway's RPC connection.
    pub fn builder(&self) -> &TransactionBuilder {
        self.query.builder()
    }

    /// The shared cache (event producers outside this facade apply here).
    pub fn cache(&self) -> &Arc<StakeCache> {
        &self.cache
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
