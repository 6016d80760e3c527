//! Rate-limited wallet "flush" swaps through the Jupiter aggregator.
//!
//! Quote, build, sign, send and confirm one token at a time, or every token
//! in the wallet into a single output mint.

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod form;
pub mod journal;
pub mod jupiter;
pub mod ledger;
pub mod monitoring;
pub mod notifier;
pub mod rate_limit;
pub mod submitter;

#[cfg(test)]
pub(crate) mod test_rpc;

pub use domain::{AssetHolding, OutcomeStatus, SwapOutcome, SwapTarget};
pub use engine::{Engine, EngineOptions};
pub use error::SwapError;
pub use jupiter::{JupiterClient, Quote, QuoteRequest, SwapTransactionPayload, SwapVenue};
pub use rate_limit::RateLimiter;
pub use submitter::{Submitter, TransactionSigner};
