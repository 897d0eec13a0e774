//! HATM Event Listener
//!
//! A long-lived subscription to the staking program's log stream.  Each log
//! batch is classified into a typed event (stake / unstake / claim) through
//! a layered set of heuristics:
//!
//! 1. **Keyword classification** over the lower-cased logs, in priority
//!    order: stake/deposit, then unstake/withdraw, then claim/reward.
//! 2. **Amount** — the first integer following the matched keyword.
//! 3. **Wallet** — the first base58 address in the logs that is not one of
//!    the program's own accounts.
//! 4. **Balance-delta fallback** — when the logs don't carry a usable
//!    wallet or amount, the full transaction is fetched and the pre/post
//!    token-balance delta per owner decides both.
//!
//! Events that still cannot be attributed to a wallet are discarded; a
//! malformed transaction must never take the listener down.  The
//! subscription reconnects with capped exponential backoff and tears down
//! cleanly on shutdown.
//!
//! The heuristics are a best-effort adapter over an unstructured stream,
//! not a source of truth — polling reconciles any drift against real
//! account state.

pub mod classify;
pub mod listener;

pub use listener::{ListenerConfig, LogListener};
