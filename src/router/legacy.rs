//! Legacy Router
//!
//! No selection heuristics and no splitting: every direct or one-intermediate
//! route through a pool touching tokenIn or tokenOut is quoted for the full
//! amount, and the best raw quote wins.

use super::{RouteRequest, RouterContext, SwapRouter};
use crate::cartographer::RouteGenerator;
use crate::config::RoutingConfig;
use crate::error::RouterResult;
use crate::models::{RouteOutcome, RouteWithQuotes, SplitEntry, SplitPlan, TradeType};
use crate::simulator::{GasPricing, QuoteBatcher, QuoteOutcome};
use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{info, warn};

const LEGACY_MAX_HOPS: usize = 2;

pub struct LegacyRouter {
    ctx: RouterContext,
}

impl LegacyRouter {
    pub fn new(ctx: RouterContext) -> Self {
        Self { ctx }
    }

    async fn route_inner(&self, request: &RouteRequest) -> RouterResult<RouteOutcome> {
        let (token_in, token_out) = request.tokens();
        let market = self.ctx.snapshot(request).await?;

        let pools: Vec<_> = market
            .pools
            .all()
            .into_iter()
            .filter(|p| p.involves(token_in) || p.involves(token_out))
            .collect();
        let generator = RouteGenerator::new(&RoutingConfig {
            max_swaps_per_path: request.config.max_swaps_per_path.min(LEGACY_MAX_HOPS),
            ..request.config.clone()
        });
        let routes = generator.generate(token_in, token_out, &pools);
        if routes.is_empty() {
            return Ok(RouteOutcome::no_route(format!("no direct or one-hop path {} → {}", token_in, token_out)));
        }

        let batcher = QuoteBatcher::new(self.ctx.quote_source.clone(), self.ctx.batcher);
        let mut quoted = match batcher
            .quote(&routes, &request.amount, request.trade_type, &[100], market.block)
            .await
        {
            QuoteOutcome::Quoted(quoted) => quoted,
            QuoteOutcome::NoViableRoute { .. } => {
                return Ok(RouteOutcome::no_route("no route could be quoted for the full amount"));
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

        let Some(best) = best_raw_quote(&quoted, request.trade_type) else {
            return Ok(RouteOutcome::no_route("no route could be quoted for the full amount"));
        };
        info!("Legacy router picked {} of {} routes", best.route, quoted.len());

        let plan = SplitPlan {
            entries: vec![SplitEntry {
                route: best.route.clone(),
                percent: 100,
                quote: best.quotes[&100].clone(),
            }],
        };
        self.ctx.finish(request, plan, &pricing, market.block)
    }
}

/// Most output for exact-input, least input for exact-output; first wins ties.
fn best_raw_quote(routes: &[RouteWithQuotes], trade_type: TradeType) -> Option<&RouteWithQuotes> {
    let mut best: Option<&RouteWithQuotes> = None;
    for candidate in routes.iter().filter(|r| r.quotes.contains_key(&100)) {
        let value = candidate.quotes[&100].quote(trade_type).raw;
        let better = match best {
            None => true,
            Some(current) => {
                let current = current.quotes[&100].quote(trade_type).raw;
                match trade_type {
                    TradeType::ExactInput => value > current,
                    TradeType::ExactOutput => value < current,
                }
            }
        };
        if better {
            best = Some(candidate);
        }
    }
    best
}

#[async_trait]
impl SwapRouter for LegacyRouter {
    async fn route(&self, request: &RouteRequest) -> RouterResult<RouteOutcome> {
        request.config.validate()?;

        match timeout(self.ctx.route_timeout, self.route_inner(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("⏱️ Legacy routing timed out after {:?}", self.ctx.route_timeout);
                Ok(RouteOutcome::no_route(format!(
                    "timed out after {} ms",
                    self.ctx.route_timeout.as_millis()
                )))
            }
        }
    }
}
