//! Quoting and gas
//!
//! - `quoter`: QuoterV2 calls through Multicall3
//! - `batcher`: route × percentage grid, chunked with bisecting retries
//! - `gas_model`: per-route gas units and their price in the quote token

pub mod batcher;
pub mod gas_model;
pub mod quoter;

pub use batcher::{QuoteBatcher, QuoteBatcherConfig, QuoteOutcome};
pub use gas_model::{estimate_route_gas, GasPricing};
pub use quoter::{MulticallQuoteSource, QuoteRequest, QuoteSample, QuoteSource};
