//! Gas Model - route gas estimate and its value in the quote token / USD
//!
//! ⛽ Prices come from pools already fetched for the request: the deepest
//! wrapped-native/quote pool and the deepest wrapped-native/USD pool, at mid
//! price. A missing pricing pool values gas at zero in that currency.

use crate::cartographer::pool_provider::{Pool, PoolAccessor};
use crate::gas_oracle::GasPrice;
use crate::models::RouteWithQuotes;
use crate::tokens::{CurrencyAmount, Token};
use alloy_primitives::U256;
use tracing::{debug, warn};

// ============================================
// CONSTANTS
// ============================================

/// Fixed overhead of any V3 swap
pub const BASE_SWAP_COST: u64 = 2_000;

/// Added per pool traversed
pub const COST_PER_HOP: u64 = 80_000;

/// Added per initialized tick crossed
pub const COST_PER_INIT_TICK: u64 = 31_000;

/// Gas for one route at one size. The quoter's own estimate wins when present.
pub fn estimate_route_gas(hops: usize, ticks_crossed: u32, quoter_estimate: u64) -> u64 {
    if quoter_estimate > 0 {
        return quoter_estimate.saturating_add(BASE_SWAP_COST);
    }
    BASE_SWAP_COST
        .saturating_add(COST_PER_HOP.saturating_mul(hops as u64))
        .saturating_add(COST_PER_INIT_TICK.saturating_mul(ticks_crossed as u64))
}

// ============================================
// GAS VALUATION
// ============================================

/// Converts gas units into quote-token and USD amounts for one request
#[derive(Debug, Clone)]
pub struct GasPricing {
    gas_price_wei: u128,
    quote_token: Token,
    /// wrapped-native amount → quote token; `None` when unpriceable
    native_to_quote: Option<MidPrice>,
    usd_token: Option<Token>,
    native_to_usd: Option<MidPrice>,
}

#[derive(Debug, Clone)]
enum MidPrice {
    Identity,
    Pool(Pool, Token),
}

impl MidPrice {
    fn convert(&self, wei: U256) -> Option<U256> {
        match self {
            MidPrice::Identity => Some(wei),
            MidPrice::Pool(pool, native) => pool.mid_price_quote(native, wei),
        }
    }
}

fn price_path(pools: &PoolAccessor, native: &Token, target: &Token) -> Option<MidPrice> {
    if native == target {
        return Some(MidPrice::Identity);
    }
    pools
        .deepest(native, target)
        .map(|p| MidPrice::Pool(p.clone(), native.clone()))
}

impl GasPricing {
    pub fn new(
        gas_price: &GasPrice,
        pools: &PoolAccessor,
        native: Option<&Token>,
        quote_token: &Token,
        usd_token: Option<&Token>,
    ) -> Self {
        let native_to_quote = native.and_then(|n| price_path(pools, n, quote_token));
        if native_to_quote.is_none() {
            debug!("No native pricing pool for {}", quote_token);
        }

        let native_to_usd = match (native, usd_token) {
            (Some(n), Some(usd)) => price_path(pools, n, usd),
            _ => None,
        };
        if native_to_usd.is_none() {
            debug!("No USD pricing pool for gas");
        }

        Self {
            gas_price_wei: gas_price.gas_price_wei,
            quote_token: quote_token.clone(),
            native_to_quote,
            usd_token: usd_token.cloned(),
            native_to_usd,
        }
    }

    /// False when no native pool prices gas in the quote token.
    pub fn is_priced(&self) -> bool {
        self.native_to_quote.is_some()
    }

    pub fn gas_price_wei(&self) -> u128 {
        self.gas_price_wei
    }

    pub fn cost_wei(&self, gas: u64) -> U256 {
        U256::from(gas) * U256::from(self.gas_price_wei)
    }

    pub fn cost_in_quote(&self, gas: u64) -> U256 {
        self.native_to_quote
            .as_ref()
            .and_then(|p| p.convert(self.cost_wei(gas)))
            .unwrap_or(U256::ZERO)
    }

    pub fn cost_in_quote_amount(&self, gas: u64) -> CurrencyAmount {
        CurrencyAmount::from_raw(self.quote_token.clone(), self.cost_in_quote(gas))
    }

    /// Stamp every quote with the quote-token value of its own gas estimate.
    pub fn apply(&self, routes: &mut [RouteWithQuotes]) {
        if !self.is_priced() {
            warn!(
                "⛽ No pricing pool for gas in {}; {} routes compared on raw quotes",
                self.quote_token,
                routes.len()
            );
        }
        for route in routes {
            for quote in route.quotes.values_mut() {
                quote.gas_cost_in_quote_token = self.cost_in_quote(quote.gas_estimate);
            }
        }
    }

    /// `None` when the chain has no USD reference or no pricing pool.
    pub fn cost_in_usd(&self, gas: u64) -> Option<CurrencyAmount> {
        let usd = self.usd_token.as_ref()?;
        let raw = self.native_to_usd.as_ref()?.convert(self.cost_wei(gas))?;
        Some(CurrencyAmount::from_raw(usd.clone(), raw))
    }
}

// ============================================
// TESTS
// ============================================
