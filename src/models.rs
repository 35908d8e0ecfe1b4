//! Routing data model: trade direction, routes, quotes, split plans and the
//! final swap route handed back to callers.

use crate::cartographer::pool_provider::Pool;
use crate::error::{RouterError, RouterResult};
use crate::tokens::{CurrencyAmount, Token};
use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeType {
    /// `amount` is the input; the quote is output
    ExactInput,
    /// `amount` is the output; the quote is required input
    ExactOutput,
}

impl TradeType {
    /// Exactly one direction flag must be set.
    pub fn from_flags(exact_in: bool, exact_out: bool) -> RouterResult<Self> {
        match (exact_in, exact_out) {
            (true, false) => Ok(TradeType::ExactInput),
            (false, true) => Ok(TradeType::ExactOutput),
            _ => Err(RouterError::Configuration(
                "Must set either --exactIn or --exactOut.".to_string(),
            )),
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeType::ExactInput => write!(f, "EXACT_INPUT"),
            TradeType::ExactOutput => write!(f, "EXACT_OUTPUT"),
        }
    }
}

// ============================================
// ROUTE
// ============================================

/// A simple path of pools from `input` to `output`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub pools: Vec<Pool>,
    /// Tokens visited, `input` first and `output` last
    pub path: Vec<Token>,
    pub input: Token,
    pub output: Token,
}

impl Route {
    pub fn new(pools: Vec<Pool>, input: Token, output: Token) -> RouterResult<Self> {
        if pools.is_empty() {
            return Err(RouterError::NoRouteFound("route has no pools".to_string()));
        }

        let mut seen = HashSet::new();
        let mut path = vec![input.clone()];
        for pool in &pools {
            if !seen.insert(pool.address) {
                return Err(RouterError::NoRouteFound(format!("pool {:?} repeated in route", pool.address)));
            }
            let current = path.last().cloned().unwrap_or_else(|| input.clone());
            let next = pool.other(&current).ok_or_else(|| {
                RouterError::NoRouteFound(format!("pool {:?} does not touch {}", pool.address, current))
            })?;
            path.push(next.clone());
        }

        if path.last() != Some(&output) {
            return Err(RouterError::NoRouteFound(format!("route does not end at {}", output)));
        }

        Ok(Self { pools, path, input, output })
    }

    pub fn hops(&self) -> usize {
        self.pools.len()
    }

    pub fn token_path_key(&self) -> Vec<Address> {
        self.path.iter().map(|t| t.address).collect()
    }

    /// V3 packed path: token (20) | fee (3) | token (20) ...
    /// Exact-output paths are encoded output first.
    pub fn encoded_path(&self, trade_type: TradeType) -> Bytes {
        let mut out = Vec::with_capacity(20 + self.pools.len() * 23);
        match trade_type {
            TradeType::ExactInput => {
                out.extend_from_slice(self.path[0].address.as_slice());
                for (pool, token) in self.pools.iter().zip(self.path.iter().skip(1)) {
                    out.extend_from_slice(&pool.fee.pips().to_be_bytes()[1..]);
                    out.extend_from_slice(token.address.as_slice());
                }
            }
            TradeType::ExactOutput => {
                let last = self.path.len() - 1;
                out.extend_from_slice(self.path[last].address.as_slice());
                for (pool, token) in self.pools.iter().rev().zip(self.path.iter().rev().skip(1)) {
                    out.extend_from_slice(&pool.fee.pips().to_be_bytes()[1..]);
                    out.extend_from_slice(token.address.as_slice());
                }
            }
        }
        Bytes::from(out)
    }
}

impl fmt::Display for Route {
    /// `USDC -- 0.05% [0x88e6…] --> WETH`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path[0])?;
        for (pool, token) in self.pools.iter().zip(self.path.iter().skip(1)) {
            let addr = format!("{:?}", pool.address);
            write!(f, " -- {} [{}] --> {}", pool.fee, &addr[..8], token)?;
        }
        Ok(())
    }
}

// ============================================
// QUOTES
// ============================================

/// One simulated execution of a route at one grid percentage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteQuote {
    pub percent: u32,
    pub input_amount: CurrencyAmount,
    pub output_amount: CurrencyAmount,
    pub gas_estimate: u64,
    pub ticks_crossed: u32,
    /// Gas cost valued in the quote token; zero until the engine prices gas
    pub gas_cost_in_quote_token: U256,
}

impl RouteQuote {
    /// The side of the trade the caller did not fix.
    pub fn quote(&self, trade_type: TradeType) -> &CurrencyAmount {
        match trade_type {
            TradeType::ExactInput => &self.output_amount,
            TradeType::ExactOutput => &self.input_amount,
        }
    }

    /// The side of the trade the caller fixed.
    pub fn amount(&self, trade_type: TradeType) -> &CurrencyAmount {
        match trade_type {
            TradeType::ExactInput => &self.input_amount,
            TradeType::ExactOutput => &self.output_amount,
        }
    }
}

/// A route's quote curve across the percentage grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteWithQuotes {
    pub route: Route,
    pub quotes: BTreeMap<u32, RouteQuote>,
}

// ============================================
// PLAN + RESULT
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitEntry {
    pub route: Route,
    pub percent: u32,
    pub quote: RouteQuote,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SplitPlan {
    pub entries: Vec<SplitEntry>,
}

impl SplitPlan {
    pub fn total_percent(&self) -> u32 {
        self.entries.iter().map(|e| e.percent).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Recipient, slippage and deadline for calldata generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapParams {
    pub recipient: Address,
    /// Slippage tolerance in basis points
    pub slippage_bps: u32,
    /// Unix timestamp after which the swap reverts
    pub deadline: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodParameters {
    pub to: Address,
    pub calldata: Bytes,
    pub value: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRoute {
    pub trade_type: TradeType,
    pub amount: CurrencyAmount,
    pub plan: SplitPlan,
    pub quote: CurrencyAmount,
    pub quote_gas_adjusted: CurrencyAmount,
    pub estimated_gas_used: u64,
    pub gas_cost_in_quote_token: CurrencyAmount,
    pub gas_cost_usd: Option<CurrencyAmount>,
    pub gas_price_wei: u128,
    pub block_number: u64,
    /// False when no pool priced gas in the quote token; gas costs are then zero
    pub gas_priced: bool,
    pub method_parameters: Option<MethodParameters>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Found(Box<SwapRoute>),
    NoRoute { reason: String },
}

impl RouteOutcome {
    pub fn no_route(reason: impl Into<String>) -> Self {
        RouteOutcome::NoRoute { reason: reason.into() }
    }

    pub fn swap_route(&self) -> Option<&SwapRoute> {
        match self {
            RouteOutcome::Found(route) => Some(route),
            RouteOutcome::NoRoute { .. } => None,
        }
    }
}

// ============================================
// TESTS
// ============================================
