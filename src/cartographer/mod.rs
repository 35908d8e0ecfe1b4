//! The Cartographer (market data)
//!
//! Token metadata and pool state through cached providers, candidate pool
//! selection, and route generation over the resulting token graph.

pub mod graph;
pub mod pool_provider;
pub mod selection;
pub mod token_provider;

pub use graph::{PoolGraph, RouteGenerator};
pub use pool_provider::{FeeTier, Pool, PoolAccessor, PoolKey, PoolProvider};
pub use selection::{select_candidate_pools, CandidatePools};
pub use token_provider::{TokenAccessor, TokenListProvider, TokenProvider};
