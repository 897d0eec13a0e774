//! HATM Webhook Ingestor
//!
//! The second push feed into the reconciler: a third-party indexer POSTs
//! batches of transaction summaries, authenticated by either an
//! HMAC-SHA256 signature over the raw body or a static API key.
//!
//! Extraction runs the same priority rules as the log listener: the
//! payload's parsed token transfers first, the instruction's encoded data
//! second, log heuristics last.  An unverifiable payload is rejected
//! before anything is parsed — it must never mutate the cache.

pub mod auth;
pub mod ingest;

pub use {auth::WebhookAuth, ingest::WebhookIngestor};

use thiserror::Error;

/// Errors surfaced to the HTTP layer.
#[derive(Error, Debug)]
pub enum WebhookError {
    /// Signature or key verification failed — map to 401.
    #[error("webhook authentication failed: {0}")]
    Auth(String),

    /// The body was not a recognizable payload — map to 500.
    #[error("malformed webhook payload: {0}")]
    Payload(String),
}

/// Convenience result type for webhook operations.
pub type Result<T> = std::result::Result<T, WebhookError>;
