//! Alpha Router
//!
//! The full pipeline for one request:
//! 1. validate the routing config (before any chain call)
//! 2. block, reference tokens, pool state and gas price
//! 3. candidate pool selection and route generation
//! 4. quote grid over every route
//! 5. gas-adjusted split optimization
//! 6. totals, USD gas cost and optional calldata
//!
//! The whole request runs under the context's route timeout.

use super::{RouteRequest, RouterContext, SwapRouter};
use crate::brain::SplitOptimizer;
use crate::cartographer::{select_candidate_pools, RouteGenerator};
use crate::error::{RouterError, RouterResult};
use crate::models::RouteOutcome;
use crate::simulator::{GasPricing, QuoteBatcher, QuoteOutcome};
use async_trait::async_trait;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{info, warn};

pub struct AlphaRouter {
    ctx: RouterContext,
}

impl AlphaRouter {
    pub fn new(ctx: RouterContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &RouterContext {
        &self.ctx
    }

    async fn route_inner(&self, request: &RouteRequest) -> RouterResult<RouteOutcome> {
        let start = Instant::now();
        let (token_in, token_out) = request.tokens();
        let config = &request.config;

        let market = self.ctx.snapshot(request).await?;

        let candidates =
            select_candidate_pools(token_in, token_out, &market.pools, &market.bases, &config.pool_selection);
        let routes = RouteGenerator::new(config).generate(token_in, token_out, &candidates.pools);
        if routes.is_empty() {
            return Ok(RouteOutcome::no_route(format!(
                "no path {} → {} through {} candidate pools",
                token_in,
                token_out,
                candidates.pools.len()
            )));
        }

        let batcher = QuoteBatcher::new(self.ctx.quote_source.clone(), self.ctx.batcher);
        let mut quoted = match batcher
            .quote(&routes, &request.amount, request.trade_type, &config.percentages(), market.block)
            .await
        {
            QuoteOutcome::Quoted(quoted) => quoted,
            QuoteOutcome::NoViableRoute { unquotable } => {
                return Ok(RouteOutcome::no_route(format!(
                    "all {} quotes across {} routes failed",
                    unquotable,
                    routes.len()
                )));
            }
        };

        let pricing = GasPricing::new(
            &market.gas_price,
            &market.pools,
            market.native.as_ref(),
            &request.quote_token,
            market.usd.as_ref(),
        );
        pricing.apply(&mut quoted);

        let plan = match SplitOptimizer::new(config).optimize(&quoted, request.trade_type) {
            Ok(plan) => plan,
            Err(RouterError::NoRouteFound(reason)) => return Ok(RouteOutcome::no_route(reason)),
            Err(e) => return Err(e),
        };
        info!(
            "🧠 {} route(s) chosen from {} quoted in {:?}",
            plan.len(),
            quoted.len(),
            start.elapsed()
        );

        let plan = self.ctx.settle_remainder(request, plan, &pricing, market.block).await;
        self.ctx.finish(request, plan, &pricing, market.block)
    }
}

#[async_trait]
impl SwapRouter for AlphaRouter {
    async fn route(&self, request: &RouteRequest) -> RouterResult<RouteOutcome> {
        request.config.validate()?;

        match timeout(self.ctx.route_timeout, self.route_inner(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("⏱️ Routing timed out after {:?}", self.ctx.route_timeout);
                Ok(RouteOutcome::no_route(format!(
                    "timed out after {} ms",
                    self.ctx.route_timeout.as_millis()
                )))
            }
        }
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartographer::pool_provider::{FeeTier, Pool};
    use crate::config::RoutingConfig;
    use crate::executor::{CalldataEncoder, SwapRouterEncoder};
    use crate::gas_oracle::{GasPrice, GasPriceProvider, GasSource};
    use crate::models::{SwapParams, TradeType};
    use crate::simulator::QuoteSample;
    use crate::test_support::{
        dai, pool, router_context, usdc, weth, FakeChainClient, FakePoolProvider, FakeQuoteSource,
    };
    use crate::tokens::CurrencyAmount;
    use alloy_primitives::{address, U256};
    use std::sync::Arc;
    use std::time::Duration;

    fn pools() -> Vec<Pool> {
        vec![
            pool(&usdc(), &weth(), FeeTier::Low, 1_000_000),
            pool(&usdc(), &dai(), FeeTier::Lowest, 900_000),
            pool(&dai(), &weth(), FeeTier::Low, 800_000),
        ]
    }

    /// One hop at 1/2000 ETH per USDC, two hops slightly worse; both lose
    /// a quadratic price impact, so splitting the flow pays.
    fn market_quotes() -> FakeQuoteSource {
        FakeQuoteSource::new(|r| {
            let rate = if r.path.len() == 43 { 500_000_000u64 } else { 499_000_000u64 };
            let impact = r.amount * r.amount / U256::from(100u64);
            Some(QuoteSample {
                amount: (r.amount * U256::from(rate)).saturating_sub(impact),
                ticks_crossed: 1,
                gas_estimate: 0,
            })
        })
    }

    fn exact_in(amount: &str) -> RouteRequest {
        RouteRequest {
            amount: CurrencyAmount::parse(usdc(), amount).unwrap(),
            quote_token: weth(),
            trade_type: TradeType::ExactInput,
            swap_params: None,
            config: RoutingConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_exact_input_split_beats_single_routes() {
        let provider = Arc::new(FakePoolProvider::new(pools()));
        let quotes = Arc::new(market_quotes());
        let ctx = router_context(Arc::new(FakeChainClient::new(1, 1_000)), provider, quotes.clone());

        let outcome = AlphaRouter::new(ctx).route(&exact_in("10000")).await.unwrap();
        let route = outcome.swap_route().expect("route found");

        // both the direct and the DAI route were quoted across the whole grid
        let requests = quotes.requests();
        for hops_len in [43, 66] {
            let mut percents: Vec<u32> = requests
                .iter()
                .filter(|r| r.path.len() == hops_len)
                .map(|r| r.percent)
                .collect();
            percents.sort_unstable();
            assert_eq!(percents, (1..=20).map(|i| i * 5).collect::<Vec<u32>>());
        }

        assert_eq!(route.plan.total_percent(), 100);
        assert_eq!(route.plan.len(), 2);
        assert_eq!(route.block_number, 1_000);
        assert_eq!(route.quote_gas_adjusted.raw, route.quote.raw - route.gas_cost_in_quote_token.raw);
        let gas: u64 = route.plan.entries.iter().map(|e| e.quote.gas_estimate).sum();
        assert_eq!(route.estimated_gas_used, gas);
        assert!(route.gas_priced);
        assert!(route.method_parameters.is_none());

        // 10000 USDC through one route: rate * a - a^2 / 100, less 1 gwei gas
        let a = U256::from(10_000_000_000u64);
        let impact = a * a / U256::from(100u64);
        let direct = a * U256::from(500_000_000u64) - impact - U256::from(113_000u64 * 1_000_000_000);
        let via_dai = a * U256::from(499_000_000u64) - impact - U256::from(193_000u64 * 1_000_000_000);
        assert!(route.quote_gas_adjusted.raw > direct);
        assert!(route.quote_gas_adjusted.raw > via_dai);
    }

    #[tokio::test]
    async fn test_exact_output_quotes_behind_head() {
        let provider = Arc::new(FakePoolProvider::new(pools()));
        let quotes = Arc::new(FakeQuoteSource::proportional());
        let ctx = router_context(Arc::new(FakeChainClient::new(1, 1_000)), provider.clone(), quotes.clone());

        let request = RouteRequest {
            amount: CurrencyAmount::parse(weth(), "1").unwrap(),
            quote_token: usdc(),
            trade_type: TradeType::ExactOutput,
            swap_params: None,
            config: RoutingConfig::default(),
        };
        let outcome = AlphaRouter::new(ctx).route(&request).await.unwrap();
        let route = outcome.swap_route().expect("route found");

        assert_eq!(route.block_number, 990);
        assert_eq!(provider.requested_blocks(), vec![990]);
        assert!(quotes.blocks().iter().all(|b| *b == 990));
        assert!(route.quote_gas_adjusted.raw >= route.quote.raw);
    }

    #[tokio::test]
    async fn test_invalid_config_fails_before_chain_calls() {
        let provider = Arc::new(FakePoolProvider::new(pools()));
        let ctx = router_context(
            Arc::new(FakeChainClient::new(1, 1_000)),
            provider.clone(),
            Arc::new(FakeQuoteSource::proportional()),
        );
        let mut request = exact_in("100");
        request.config.min_splits = 4;
        request.config.max_splits = 3;

        let err = AlphaRouter::new(ctx).route(&request).await.unwrap_err();
        assert!(matches!(err, RouterError::Configuration(_)));
        assert!(provider.requested_blocks().is_empty());
    }

    #[tokio::test]
    async fn test_swap_params_need_an_encoder() {
        let provider = Arc::new(FakePoolProvider::new(pools()));
        let mut ctx = router_context(
            Arc::new(FakeChainClient::new(1, 1_000)),
            provider,
            Arc::new(market_quotes()),
        );
        let mut request = exact_in("100");
        request.swap_params = Some(SwapParams {
            recipient: address!("00000000000000000000000000000000000000aa"),
            slippage_bps: 50,
            deadline: 1_700_000_000,
        });

        let err = AlphaRouter::new(ctx.clone()).route(&request).await.unwrap_err();
        assert_eq!(err, RouterError::Uninitialized("calldata encoder"));

        let encoder: Arc<dyn CalldataEncoder> = Arc::new(SwapRouterEncoder::default());
        ctx.encoder = Some(encoder);
        let outcome = AlphaRouter::new(ctx).route(&request).await.unwrap();
        let method = outcome.swap_route().and_then(|r| r.method_parameters.clone()).unwrap();
        assert_eq!(method.value, U256::ZERO);
        assert!(!method.calldata.is_empty());
    }

    #[tokio::test]
    async fn test_no_path_is_no_route() {
        let provider = Arc::new(FakePoolProvider::new(vec![pool(&usdc(), &dai(), FeeTier::Low, 1)]));
        let ctx = router_context(
            Arc::new(FakeChainClient::new(1, 1_000)),
            provider,
            Arc::new(FakeQuoteSource::proportional()),
        );
        let outcome = AlphaRouter::new(ctx).route(&exact_in("100")).await.unwrap();
        assert!(matches!(outcome, RouteOutcome::NoRoute { .. }));
    }

    #[tokio::test]
    async fn test_unquotable_routes_are_no_route() {
        let provider = Arc::new(FakePoolProvider::new(pools()));
        let ctx = router_context(
            Arc::new(FakeChainClient::new(1, 1_000)),
            provider,
            Arc::new(FakeQuoteSource::new(|_| None)),
        );
        let outcome = AlphaRouter::new(ctx).route(&exact_in("100")).await.unwrap();
        assert!(outcome.swap_route().is_none());
    }

    struct StalledGasPrice;

    #[async_trait]
    impl GasPriceProvider for StalledGasPrice {
        async fn gas_price(&self, block: u64) -> RouterResult<GasPrice> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(GasPrice::legacy(1, block, GasSource::Legacy))
        }
    }

    #[tokio::test]
    async fn test_timeout_is_no_route() {
        let mut ctx = router_context(
            Arc::new(FakeChainClient::new(1, 1_000)),
            Arc::new(FakePoolProvider::new(pools())),
            Arc::new(FakeQuoteSource::proportional()),
        );
        ctx.gas_price_provider = Arc::new(StalledGasPrice);
        ctx.route_timeout = Duration::from_millis(20);

        let outcome = AlphaRouter::new(ctx).route(&exact_in("100")).await.unwrap();
        match outcome {
            RouteOutcome::NoRoute { reason } => assert!(reason.contains("timed out")),
            RouteOutcome::Found(_) => panic!("expected timeout"),
        }
    }
}
