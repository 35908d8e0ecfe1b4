//! Alpha Router
//!
//! Uniswap V3 smart order routing: finds the gas-adjusted best way to trade
//! an exact input or output amount, splitting across up to `maxSplits`
//! routes in `distributionPercent` increments.
//!
//! Pipeline:
//! - `cartographer`: tokens, pool state, candidate selection, route generation
//! - `simulator`: on-chain quotes and gas valuation
//! - `brain`: split optimization
//! - `executor`: SwapRouter calldata
//! - `router`: the engines tying it together

pub mod brain;
pub mod cache;
pub mod cartographer;
pub mod chain;
pub mod config;
pub mod error;
pub mod executor;
pub mod gas_oracle;
pub mod models;
pub mod report;
pub mod retry;
pub mod router;
pub mod simulator;
pub mod tokens;

#[cfg(test)]
mod test_support;

pub use config::{Config, PoolSelectionConfig, RoutingConfig};
pub use error::{RouterError, RouterResult};
pub use models::{RouteOutcome, SwapParams, SwapRoute, TradeType};
pub use router::{AlphaRouter, LegacyRouter, RouteRequest, RouterContext, SwapRouter};
pub use tokens::{CurrencyAmount, Token};
