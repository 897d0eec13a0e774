//! Webhook authenticity verification.
//!
//! Two header schemes are accepted:
//!
//! - **HMAC-SHA256** — hex digest of the raw body under the shared secret,
//!   optionally prefixed `sha256=`;
//! - **static API key** — the shared secret itself.
//!
//! Both comparisons are constant-time.  With no secret configured,
//! verification is skipped but loudly: every delivery logs a warning so an
//! unauthenticated deployment can never masquerade as a secure one.

use {
    crate::{Result, WebhookError},
    hmac::{Hmac, Mac},
    log::warn,
    sha2::Sha256,
};

type HmacSha256 = Hmac<Sha256>;

/// Verifies inbound deliveries against the configured shared secret.
#[derive(Debug, Clone)]
pub struct WebhookAuth {
    secret: Option<String>,
}

impl WebhookAuth {
    /// Verification against `secret`; `None` disables verification.
    pub fn new(secret: Option<String>) -> Self {
        Self { secret }
    }

    /// Check `signature_header` against the raw request body.
    pub fn verify(&self, raw_body: &[u8], signature_header: Option<&str>) -> Result<()> {
        let Some(secret) = self.secret.as_deref() else {
            warn!("webhook secret not configured, accepting delivery UNVERIFIED");
            return Ok(());
        };
        let Some(header) = signature_header else {
            return Err(WebhookError::Auth("missing signature header".to_string()));
        };

        if self.hmac_matches(secret, raw_body, header) {
            return Ok(());
        }
        if constant_time_eq(header.as_bytes(), secret.as_bytes()) {
            return Ok(());
        }
        Err(WebhookError::Auth("signature mismatch".to_string()))
    }

    fn hmac_matches(&self, secret: &str, raw_body: &[u8], header: &str) -> bool {
        let digest = header.trim_start_matches("sha256=");
        let Ok(provided) = hex::decode(digest) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(raw_body);
        mac.verify_slice(&provided).is_ok()
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// ── Tests ───────────────────────────────────────────────────────────────────
