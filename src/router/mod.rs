//! Routing Engines
//!
//! - `AlphaRouter`: candidate pools → routes → quote grid → split optimizer
//! - `LegacyRouter`: direct and one-intermediate routes, best single quote
//!
//! Both share a `RouterContext`: the providers, quote source, encoder and
//! timing settings wired up once per process.

mod alpha;
mod legacy;

pub use alpha::AlphaRouter;
pub use legacy::LegacyRouter;

use crate::cache::TtlCache;
use crate::cartographer::pool_provider::{
    CachingPoolProvider, FeeTier, OnChainPoolProvider, PoolAccessor, PoolKey, PoolProvider,
};
use crate::cartographer::token_provider::{
    CachingTokenProviderWithFallback, OnChainTokenProvider, TokenListProvider, TokenProvider,
};
use crate::chain::{ChainClient, RpcChainClient};
use crate::config::{Config, RoutingConfig};
use crate::error::{RouterError, RouterResult};
use crate::executor::calldata::split_amounts;
use crate::executor::{CalldataEncoder, SwapRouterEncoder};
use crate::gas_oracle::{on_chain_gas_price_provider, GasPrice, GasPriceProvider};
use crate::models::{RouteOutcome, SplitPlan, SwapParams, SwapRoute, TradeType};
use crate::retry::retry_async;
use crate::simulator::batcher::build_quote;
use crate::simulator::{GasPricing, MulticallQuoteSource, QuoteBatcherConfig, QuoteRequest, QuoteSource};
use crate::tokens::{base_tokens, usd_reference, wrapped_native, CurrencyAmount, Token};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One routing request
#[derive(Debug, Clone)]
pub struct RouteRequest {
    /// Input amount for exact-input, output amount for exact-output
    pub amount: CurrencyAmount,
    /// The other side of the trade
    pub quote_token: Token,
    pub trade_type: TradeType,
    /// When set, the result carries SwapRouter calldata
    pub swap_params: Option<SwapParams>,
    pub config: RoutingConfig,
}

impl RouteRequest {
    /// (tokenIn, tokenOut)
    pub fn tokens(&self) -> (&Token, &Token) {
        match self.trade_type {
            TradeType::ExactInput => (&self.amount.token, &self.quote_token),
            TradeType::ExactOutput => (&self.quote_token, &self.amount.token),
        }
    }
}

#[async_trait]
pub trait SwapRouter: Send + Sync {
    /// `Ok(NoRoute)` for "nothing viable"; `Err` only for configuration,
    /// unknown tokens, missing gas price or exhausted chain retries.
    async fn route(&self, request: &RouteRequest) -> RouterResult<RouteOutcome>;
}

// ============================================
// CONTEXT
// ============================================

#[derive(Clone)]
pub struct RouterContext {
    pub chain_id: u64,
    pub client: Arc<dyn ChainClient>,
    pub token_provider: Arc<dyn TokenProvider>,
    pub pool_provider: Arc<dyn PoolProvider>,
    pub gas_price_provider: Arc<dyn GasPriceProvider>,
    pub quote_source: Arc<dyn QuoteSource>,
    pub encoder: Option<Arc<dyn CalldataEncoder>>,
    pub batcher: QuoteBatcherConfig,
    pub exact_out_block_offset: u64,
    pub route_timeout: Duration,
}

/// Chain data gathered before route generation
pub(crate) struct MarketSnapshot {
    pub block: u64,
    pub bases: Vec<Token>,
    pub native: Option<Token>,
    pub usd: Option<Token>,
    pub pools: PoolAccessor,
    pub gas_price: GasPrice,
}

impl RouterContext {
    pub fn builder(chain_id: u64) -> RouterContextBuilder {
        RouterContextBuilder::new(chain_id)
    }

    /// JSON-RPC client, cached providers and the SwapRouter encoder from `config`.
    pub fn from_config(config: &Config, token_list: Arc<TokenListProvider>) -> RouterResult<Self> {
        let client: Arc<dyn ChainClient> = Arc::new(RpcChainClient::new(config.rpc_url.clone(), config.chain_id));
        let retry = config.retry_policy();

        let token_cache = Arc::new(TtlCache::new("tokens", Duration::from_secs(config.token_cache_ttl_secs)));
        let pool_cache = Arc::new(TtlCache::new("pools", Duration::from_secs(config.pool_cache_ttl_secs)));
        let gas_cache = Arc::new(TtlCache::new("gas", Duration::from_secs(config.gas_price_cache_ttl_secs)));

        let token_provider = Arc::new(CachingTokenProviderWithFallback::new(
            token_cache,
            token_list,
            Arc::new(OnChainTokenProvider::new(client.clone(), retry)),
        ));
        let pool_provider = Arc::new(CachingPoolProvider::new(
            Arc::new(OnChainPoolProvider::new(client.clone(), retry).with_batch_size(config.pool_multicall_chunk)),
            pool_cache,
        ));
        let gas_price_provider =
            on_chain_gas_price_provider(client.clone(), config.etherscan_api_key.clone(), gas_cache)?;

        Self::builder(config.chain_id)
            .client(client.clone())
            .token_provider(token_provider)
            .pool_provider(pool_provider)
            .gas_price_provider(gas_price_provider)
            .quote_source(Arc::new(MulticallQuoteSource::new(client)))
            .encoder(Arc::new(SwapRouterEncoder::default()))
            .batcher(config.batcher_config())
            .exact_out_block_offset(config.exact_out_block_offset)
            .route_timeout(config.route_timeout())
            .build()
    }

    /// Pinned block, else the head; exact-output quotes lag by the configured offset.
    pub async fn resolve_block(&self, trade_type: TradeType, pinned: Option<u64>) -> RouterResult<u64> {
        let head = match pinned {
            Some(block) => block,
            None => self.client.block_number().await?,
        };
        Ok(match trade_type {
            TradeType::ExactInput => head,
            TradeType::ExactOutput => head.saturating_sub(self.exact_out_block_offset),
        })
    }

    /// tokenIn, tokenOut, the base tokens and the gas pricing tokens in one
    /// token provider lookup. Fails with `UnknownToken` when tokenIn or
    /// tokenOut does not resolve.
    async fn resolve_tokens(
        &self,
        token_in: &Token,
        token_out: &Token,
    ) -> RouterResult<(Vec<Token>, Option<Token>, Option<Token>)> {
        let native = wrapped_native(self.chain_id);
        let usd = usd_reference(self.chain_id);

        let mut addresses: Vec<Address> = vec![token_in.address];
        let rest = [token_out.address]
            .into_iter()
            .chain(base_tokens(self.chain_id))
            .chain(native)
            .chain(usd);
        for address in rest {
            if !addresses.contains(&address) {
                addresses.push(address);
            }
        }

        let tokens = self.token_provider.get_tokens(&addresses).await?;
        let mut missing: Vec<Address> = [token_in.address, token_out.address]
            .into_iter()
            .filter(|a| tokens.get(a).is_none())
            .collect();
        missing.dedup();
        if !missing.is_empty() {
            return Err(RouterError::UnknownToken(missing));
        }

        let bases = base_tokens(self.chain_id)
            .iter()
            .filter_map(|a| tokens.get(a).cloned())
            .collect();
        let native = native.and_then(|a| tokens.get(&a).cloned());
        let usd = usd.and_then(|a| tokens.get(&a).cloned());
        Ok((bases, native, usd))
    }

    /// Block, tokens, pool state for every pair among
    /// {tokenIn, tokenOut, bases, native, usd}, and the gas price. Token
    /// resolution and the pool fetch run concurrently with the gas price.
    pub(crate) async fn snapshot(&self, request: &RouteRequest) -> RouterResult<MarketSnapshot> {
        let (token_in, token_out) = request.tokens();
        let block = self.resolve_block(request.trade_type, request.config.block_number).await?;

        let market = async {
            let (bases, native, usd) = self.resolve_tokens(token_in, token_out).await?;

            let mut tokens: Vec<Token> = vec![token_in.clone(), token_out.clone()];
            for token in bases.iter().chain(native.iter()).chain(usd.iter()) {
                if !tokens.contains(token) {
                    tokens.push(token.clone());
                }
            }

            let mut keys = Vec::new();
            for (i, a) in tokens.iter().enumerate() {
                for b in &tokens[i + 1..] {
                    for fee in FeeTier::ALL {
                        keys.push(PoolKey::new(a.clone(), b.clone(), fee));
                    }
                }
            }
            debug!("Fetching {} pool keys over {} tokens at block {}", keys.len(), tokens.len(), block);

            let pools = self.pool_provider.get_pools(&keys, block).await?;
            Ok::<_, RouterError>((bases, native, usd, pools))
        };

        let (market, gas_price) = tokio::join!(market, self.gas_price_provider.gas_price(block));
        let (bases, native, usd, pools) = market?;
        let gas_price = gas_price?;
        info!(
            "⛽ Gas price {:.2} gwei ({}), {} live pools at block {}",
            gas_price.gwei(),
            gas_price.source,
            pools.len(),
            block
        );

        Ok(MarketSnapshot {
            block,
            bases,
            native,
            usd,
            pools,
            gas_price,
        })
    }

    /// Re-quotes the last plan entry for the rounding remainder the calldata
    /// assigns it, so every entry's fixed side is exactly what will be swapped.
    /// Keeps the grid quote when the re-quote fails.
    pub(crate) async fn settle_remainder(
        &self,
        request: &RouteRequest,
        mut plan: SplitPlan,
        pricing: &GasPricing,
        block: u64,
    ) -> SplitPlan {
        let trade_type = request.trade_type;
        let percents: Vec<u32> = plan.entries.iter().map(|e| e.percent).collect();
        let amounts = split_amounts(request.amount.raw, &percents);
        let (Some(last), Some(&exact)) = (plan.entries.len().checked_sub(1), amounts.last()) else {
            return plan;
        };
        if plan.entries[last].quote.amount(trade_type).raw == exact {
            return plan;
        }

        let entry = &plan.entries[last];
        let units = [QuoteRequest {
            route_index: 0,
            percent: entry.percent,
            path: entry.route.encoded_path(trade_type),
            amount: exact,
        }];
        let units = &units;
        let source = &self.quote_source;
        let result = retry_async("remainder quote", &self.batcher.retry, move |_| {
            source.quote_batch(units, trade_type, block)
        })
        .await;

        match result.map(|samples| samples.into_iter().next().flatten().filter(|s| !s.amount.is_zero())) {
            Ok(Some(sample)) => {
                let leg = CurrencyAmount::from_raw(request.amount.token.clone(), exact);
                let mut quote = build_quote(&entry.route, leg, trade_type, entry.percent, sample);
                quote.gas_cost_in_quote_token = pricing.cost_in_quote(quote.gas_estimate);
                debug!(
                    "Settled remainder on {}: {} -> {}",
                    entry.route,
                    entry.quote.amount(trade_type),
                    quote.amount(trade_type)
                );
                plan.entries[last].quote = quote;
            }
            Ok(None) => warn!("Remainder quote for {} unfillable; keeping grid quote", entry.route),
            Err(e) => warn!("Remainder quote for {} failed: {}; keeping grid quote", entry.route, e),
        }
        plan
    }

    /// Totals, gas valuation and (optionally) calldata for a chosen plan.
    pub(crate) fn finish(
        &self,
        request: &RouteRequest,
        plan: SplitPlan,
        pricing: &GasPricing,
        block: u64,
    ) -> RouterResult<RouteOutcome> {
        let trade_type = request.trade_type;
        let quote_raw = plan
            .entries
            .iter()
            .fold(U256::ZERO, |acc, e| acc + e.quote.quote(trade_type).raw);
        let gas_used: u64 = plan.entries.iter().map(|e| e.quote.gas_estimate).sum();
        let gas_cost = pricing.cost_in_quote(gas_used);

        let adjusted = match trade_type {
            TradeType::ExactInput => quote_raw.saturating_sub(gas_cost),
            TradeType::ExactOutput => quote_raw.saturating_add(gas_cost),
        };

        let mut route = SwapRoute {
            trade_type,
            amount: request.amount.clone(),
            plan,
            quote: CurrencyAmount::from_raw(request.quote_token.clone(), quote_raw),
            quote_gas_adjusted: CurrencyAmount::from_raw(request.quote_token.clone(), adjusted),
            estimated_gas_used: gas_used,
            gas_cost_in_quote_token: CurrencyAmount::from_raw(request.quote_token.clone(), gas_cost),
            gas_cost_usd: pricing.cost_in_usd(gas_used),
            gas_price_wei: pricing.gas_price_wei(),
            block_number: block,
            gas_priced: pricing.is_priced(),
            method_parameters: None,
        };

        if let Some(params) = &request.swap_params {
            let encoder = self.encoder.as_ref().ok_or(RouterError::Uninitialized("calldata encoder"))?;
            route.method_parameters = Some(encoder.encode(&route, params)?);
        }

        info!(
            "Route found: quote {} (gas adjusted {}), {} gas, block {}",
            route.quote, route.quote_gas_adjusted, route.estimated_gas_used, route.block_number
        );
        Ok(RouteOutcome::Found(Box::new(route)))
    }
}

// ============================================
// BUILDER
// ============================================

pub struct RouterContextBuilder {
    chain_id: u64,
    client: Option<Arc<dyn ChainClient>>,
    token_provider: Option<Arc<dyn TokenProvider>>,
    pool_provider: Option<Arc<dyn PoolProvider>>,
    gas_price_provider: Option<Arc<dyn GasPriceProvider>>,
    quote_source: Option<Arc<dyn QuoteSource>>,
    encoder: Option<Arc<dyn CalldataEncoder>>,
    batcher: QuoteBatcherConfig,
    exact_out_block_offset: u64,
    route_timeout: Duration,
}

impl RouterContextBuilder {
    pub fn new(chain_id: u64) -> Self {
        let defaults = Config::default();
        Self {
            chain_id,
            client: None,
            token_provider: None,
            pool_provider: None,
            gas_price_provider: None,
            quote_source: None,
            encoder: None,
            batcher: defaults.batcher_config(),
            exact_out_block_offset: defaults.exact_out_block_offset,
            route_timeout: defaults.route_timeout(),
        }
    }

    pub fn client(mut self, client: Arc<dyn ChainClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    pub fn pool_provider(mut self, provider: Arc<dyn PoolProvider>) -> Self {
        self.pool_provider = Some(provider);
        self
    }

    pub fn gas_price_provider(mut self, provider: Arc<dyn GasPriceProvider>) -> Self {
        self.gas_price_provider = Some(provider);
        self
    }

    pub fn quote_source(mut self, source: Arc<dyn QuoteSource>) -> Self {
        self.quote_source = Some(source);
        self
    }

    pub fn encoder(mut self, encoder: Arc<dyn CalldataEncoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    pub fn batcher(mut self, batcher: QuoteBatcherConfig) -> Self {
        self.batcher = batcher;
        self
    }

    pub fn exact_out_block_offset(mut self, offset: u64) -> Self {
        self.exact_out_block_offset = offset;
        self
    }

    pub fn route_timeout(mut self, timeout: Duration) -> Self {
        self.route_timeout = timeout;
        self
    }

    /// Every provider is required; the encoder is only needed for calldata.
    pub fn build(self) -> RouterResult<RouterContext> {
        Ok(RouterContext {
            chain_id: self.chain_id,
            client: self.client.ok_or(RouterError::Uninitialized("chain client"))?,
            token_provider: self.token_provider.ok_or(RouterError::Uninitialized("token provider"))?,
            pool_provider: self.pool_provider.ok_or(RouterError::Uninitialized("pool provider"))?,
            gas_price_provider: self
                .gas_price_provider
                .ok_or(RouterError::Uninitialized("gas price provider"))?,
            quote_source: self.quote_source.ok_or(RouterError::Uninitialized("quote source"))?,
            encoder: self.encoder,
            batcher: self.batcher,
            exact_out_block_offset: self.exact_out_block_offset,
            route_timeout: self.route_timeout,
        })
    }
}

// ============================================
// TESTS
// ============================================
