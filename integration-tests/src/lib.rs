//! HATM Gateway Integration Tests
//!
//! Cross-crate test suite for the two subsystems with hard invariants:
//!
//! 1. **Transaction Construction** — deterministic address derivation,
//!    byte-exact instruction encoding, idempotent registration, partial
//!    signing and hand-off serialization
//! 2. **State Reconciliation** — the additive/clamped merge policy across
//!    all three feeds (listener, webhook, polling), duplicate suppression,
//!    staleness flagging, and the full webhook → poll → listener
//!    convergence scenario
//!
//! The harness does NOT talk to a network; every test runs against the
//! deterministic in-memory ledger, so results are bit-for-bit repeatable.

pub mod harness;

#[cfg(test)]
mod transaction_construction_tests;
