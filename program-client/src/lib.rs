//! HATM Program Client
//!
//! Client-side binding to the on-chain referral-staking program.  This crate
//! owns everything that must be byte-exact with the deployed program:
//!
//! - **Address derivation** — deterministic PDAs for the vault, the vault
//!   authority, the global state, and each wallet's user-info account.
//! - **Instruction encoding** — 8-byte discriminator plus little-endian
//!   arguments, with the account list each operation expects.
//! - **Transaction assembly** — ordering, fee payer, recent blockhash, and
//!   partial signing for hand-off to the wallet owner.
//! - **Registration guard** — "does this wallet already own a user-info
//!   account?" so a register instruction is never emitted twice.
//!
//! All network access goes through the [`rpc::LedgerRpc`] trait; production
//! code wraps the nonblocking RPC client, tests substitute a deterministic
//! in-memory ledger.
//!
//! ## Crate modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`contract`]    | Versioned program contract: ids, seeds, discriminators |
//! | [`pda`]         | Program-derived address computation |
//! | [`instruction`] | Instruction data + account-meta encoding |
//! | [`accounts`]    | Typed on-chain account layouts |
//! | [`transaction`] | Transaction assembly, partial signing, serialization |
//! | [`rpc`]         | Ledger read boundary + retry policy |
//! | [`guard`]       | Registration check |
//! | [`builder`]     | High-level transaction builder |
//! | [`error`]       | Crate-wide error enum |

pub mod accounts;
pub mod builder;
pub mod contract;
pub mod error;
pub mod guard;
pub mod instruction;
pub mod pda;
pub mod rpc;
pub mod transaction;
