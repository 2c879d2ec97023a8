//! Wallet Warden - transfer authorization gateway for a Monero wallet
//!
//! Every outbound transfer runs a fixed sequence of fail-closed guards
//! (master switch, address validation, allowlist, ceilings, rate limits)
//! before anything reaches the wallet service, with an optional single-use
//! confirmation step between authorization and execution.

pub mod address;
pub mod audit;
pub mod authorize;
pub mod cli;
pub mod config;
pub mod confirm;
pub mod error;
pub mod guard;
pub mod rpc;
pub mod units;

pub use authorize::{TransferAuthorizer, TransferOutcome, TransferPolicy};
pub use config::Config;
pub use error::{Error, Result};
