//! HATM Service Layer
//!
//! Glue between the excluded HTTP route layer and the workspace's moving
//! parts: environment configuration, the polling/query surface
//! (`get_staking_info`, `get_vault_stats`, `force_refresh`), local reward
//! estimation, and the [`gateway::StakingGateway`] facade that wires the
//! cache, the listener, the webhook ingestor and the transaction builder
//! together.
//!
//! Reward figures computed here are *estimates* from the program's
//! published parameters — the authoritative numbers always come from the
//! ledger, and every estimated record is tagged with its data source so
//! callers can tell the difference.

pub mod config;
pub mod estimate;
pub mod gateway;
pub mod query;

pub use {
    config::{ConfigError, GatewayConfig},
    gateway::StakingGateway,
    query::{StakingQueryService, VaultStats},
};
