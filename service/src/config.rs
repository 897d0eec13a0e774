//! Gateway configuration.
//!
//! Everything deployment-specific comes from the environment; everything
//! else has a sensible default.  `HATM_PROGRAM_ID` and `HATM_TOKEN_MINT`
//! only need setting when targeting a redeployed program.

use {
    hatm_listener::ListenerConfig,
    hatm_program_client::{contract::ProgramContract, rpc::RpcPolicy},
    solana_pubkey::Pubkey,
    std::{env, str::FromStr, time::Duration},
    thiserror::Error,
};

/// Errors raised while reading the environment.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An address-valued variable did not parse.
    #[error("invalid address in {variable}: {value}")]
    InvalidAddress {
        /// The offending environment variable.
        variable: String,
        /// The value it held.
        value: String,
    },

    /// A numeric variable did not parse.
    #[error("invalid number in {variable}: {value}")]
    InvalidNumber {
        /// The offending environment variable.
        variable: String,
        /// The value it held.
        value: String,
    },
}

/// Deployment configuration for the staking gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// HTTP endpoint of the ledger RPC node.
    pub rpc_url: String,
    /// Websocket endpoint for the log subscription.
    pub ws_url: String,
    /// The staking program contract.
    pub contract: ProgramContract,
    /// Shared secret for webhook verification; `None` disables it.
    pub webhook_secret: Option<String>,
    /// Per-request RPC timeout.
    pub rpc_timeout: Duration,
    /// RPC attempts per request.
    pub rpc_max_attempts: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            ws_url: "wss://api.mainnet-beta.solana.com/".to_string(),
            contract: ProgramContract::mainnet(),
            webhook_secret: None,
            rpc_timeout: Duration::from_secs(10),
            rpc_max_attempts: 3,
        }
    }
}

impl GatewayConfig {
    /// Read configuration from the environment, falling back to defaults.
    ///
    /// Variables: `HATM_RPC_URL`, `HATM_WS_URL`, `HATM_PROGRAM_ID`,
    /// `HATM_TOKEN_MINT`, `HATM_WEBHOOK_SECRET`, `HATM_RPC_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Ok(url) = env::var("HATM_RPC_URL") {
            config.rpc_url = url;
        }
        if let Ok(url) = env::var("HATM_WS_URL") {
            config.ws_url = url;
        }
        if let Ok(value) = env::var("HATM_PROGRAM_ID") {
            config.contract.program_id = parse_address("HATM_PROGRAM_ID", &value)?;
        }
        if let Ok(value) = env::var("HATM_TOKEN_MINT") {
            config.contract.token_mint = parse_address("HATM_TOKEN_MINT", &value)?;
        }
        if let Ok(secret) = env::var("HATM_WEBHOOK_SECRET") {
            if !secret.is_empty() {
                config.webhook_secret = Some(secret);
            }
        }
        if let Ok(value) = env::var("HATM_RPC_TIMEOUT_SECS") {
            let seconds: u64 = value.parse().map_err(|_| ConfigError::InvalidNumber {
                variable: "HATM_RPC_TIMEOUT_SECS".to_string(),
                value: value.clone(),
            })?;
            config.rpc_timeout = Duration::from_secs(seconds);
        }
        Ok(config)
    }

    /// The RPC timeout/retry policy this configuration implies.
    pub fn rpc_policy(&self) -> RpcPolicy {
        RpcPolicy {
            timeout: self.rpc_timeout,
            max_attempts: self.rpc_max_attempts,
            ..RpcPolicy::default()
        }
    }

    /// The listener tunables this configuration implies.
    pub fn listener_config(&self) -> ListenerConfig {
        ListenerConfig {
            ws_url: self.ws_url.clone(),
            ..ListenerConfig::default()
        }
    }

    /// A config suitable for local tests: throwaway ids, short timeouts.
    #[cfg(any(test, feature = "dev-context-only-utils"))]
    pub fn dev_default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8899".to_string(),
            ws_url: "ws://127.0.0.1:8900/".to_string(),
            webhook_secret: Some("dev-secret".to_string()),
            rpc_timeout: Duration::from_millis(500),
            rpc_max_attempts: 1,
            ..Self::default()
        }
    }
}

fn parse_address(variable: &str, value: &str) -> Result<Pubkey, ConfigError> {
    Pubkey::from_str(value).map_err(|_| ConfigError::InvalidAddress {
        variable: variable.to_string(),
        value: value.to_string(),
    })
}

// ── Tests ───────────────────────────────────────────────────────────────────
