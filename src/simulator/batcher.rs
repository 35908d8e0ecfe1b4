//! Quote Batcher
//!
//! Turns candidate routes into quote curves: one quoter call per
//! (route, grid percentage), grouped into batches that stay under the call
//! count and gas ceilings, fanned out concurrently.
//!
//! Failure policy:
//! - a failed batch is bisected and both halves retried after a back-off
//! - a single call that keeps failing is dropped as unquotable at that size
//! - only "every route unquotable" is reported, as `NoViableRoute`

use crate::error::RouterError;
use crate::models::{Route, RouteQuote, RouteWithQuotes, TradeType};
use crate::retry::{retry_async, RetryPolicy};
use crate::simulator::gas_model::estimate_route_gas;
use crate::simulator::quoter::{QuoteRequest, QuoteSample, QuoteSource};
use crate::tokens::CurrencyAmount;
use futures::future::{join_all, BoxFuture, FutureExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{debug, info, warn};

type Quoted = (QuoteRequest, Option<QuoteSample>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteBatcherConfig {
    /// Max quoter calls per multicall
    pub multicall_chunk: usize,
    /// Gas budgeted for one quoter call
    pub gas_limit_per_call: u64,
    /// Gas ceiling for one whole multicall
    pub batch_gas_limit: u64,
    /// Back-off between bisection rounds and retries of single calls
    pub retry: RetryPolicy,
}

impl Default for QuoteBatcherConfig {
    fn default() -> Self {
        Self {
            multicall_chunk: 150,
            gas_limit_per_call: 1_000_000,
            batch_gas_limit: 150_000_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl QuoteBatcherConfig {
    pub fn batch_size(&self) -> usize {
        let by_gas = (self.batch_gas_limit / self.gas_limit_per_call.max(1)) as usize;
        self.multicall_chunk.min(by_gas).max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoteOutcome {
    /// Routes with at least one quoted percentage, in input order
    Quoted(Vec<RouteWithQuotes>),
    NoViableRoute { unquotable: usize },
}

pub struct QuoteBatcher {
    source: Arc<dyn QuoteSource>,
    config: QuoteBatcherConfig,
}

impl QuoteBatcher {
    pub fn new(source: Arc<dyn QuoteSource>, config: QuoteBatcherConfig) -> Self {
        Self { source, config }
    }

    /// Quote every route at every percentage of `amount`, as of `block`.
    pub async fn quote(
        &self,
        routes: &[Route],
        amount: &CurrencyAmount,
        trade_type: TradeType,
        percents: &[u32],
        block: u64,
    ) -> QuoteOutcome {
        let start = Instant::now();
        let mut requests = Vec::with_capacity(routes.len() * percents.len());
        for (route_index, route) in routes.iter().enumerate() {
            let path = route.encoded_path(trade_type);
            for &percent in percents {
                requests.push(QuoteRequest {
                    route_index,
                    percent,
                    path: path.clone(),
                    amount: amount.percent(percent).raw,
                });
            }
        }

        let total = requests.len();
        let batch_size = self.config.batch_size();
        let batches: Vec<Vec<QuoteRequest>> = requests.chunks(batch_size).map(|c| c.to_vec()).collect();
        debug!(
            "Quoting {} routes x {} percents = {} calls in {} batches at block {}",
            routes.len(),
            percents.len(),
            total,
            batches.len(),
            block
        );

        let results: Vec<Quoted> = join_all(
            batches
                .into_iter()
                .map(|batch| self.quote_units(batch, trade_type, block, 0)),
        )
        .await
        .into_iter()
        .flatten()
        .collect();

        let mut curves: Vec<BTreeMap<u32, RouteQuote>> = vec![BTreeMap::new(); routes.len()];
        let mut unquotable = 0;
        for (request, sample) in results {
            let route = &routes[request.route_index];
            match sample.filter(|s| !s.amount.is_zero()) {
                Some(sample) => {
                    let quote = build_quote(route, amount.percent(request.percent), trade_type, request.percent, sample);
                    curves[request.route_index].insert(request.percent, quote);
                }
                None => unquotable += 1,
            }
        }

        let quoted: Vec<RouteWithQuotes> = routes
            .iter()
            .zip(curves)
            .filter(|(_, quotes)| !quotes.is_empty())
            .map(|(route, quotes)| RouteWithQuotes {
                route: route.clone(),
                quotes,
            })
            .collect();

        info!(
            "Quoted {}/{} calls, {} routes usable in {:?}",
            total - unquotable,
            total,
            quoted.len(),
            start.elapsed()
        );

        if quoted.is_empty() {
            return QuoteOutcome::NoViableRoute { unquotable };
        }
        QuoteOutcome::Quoted(quoted)
    }

    /// Quote `units` as one batch, bisecting on failure.
    fn quote_units(
        &self,
        units: Vec<QuoteRequest>,
        trade_type: TradeType,
        block: u64,
        depth: u32,
    ) -> BoxFuture<'_, Vec<Quoted>> {
        async move {
            if units.len() == 1 {
                return self.quote_single(units, trade_type, block).await;
            }

            match self.source.quote_batch(&units, trade_type, block).await {
                Ok(samples) if samples.len() == units.len() => units.into_iter().zip(samples).collect(),
                Ok(samples) => {
                    self.bisect(units, trade_type, block, depth, format!("{} results", samples.len()))
                        .await
                }
                Err(e) => self.bisect(units, trade_type, block, depth, e.to_string()).await,
            }
        }
        .boxed()
    }

    async fn bisect(
        &self,
        mut units: Vec<QuoteRequest>,
        trade_type: TradeType,
        block: u64,
        depth: u32,
        reason: String,
    ) -> Vec<Quoted> {
        let delay = self.config.retry.delay_for(depth);
        debug!("Batch of {} failed ({}), splitting after {:?}", units.len(), reason, delay);
        sleep(delay).await;

        let right = units.split_off(units.len() / 2);
        let (mut left, right) = futures::join!(
            self.quote_units(units, trade_type, block, depth + 1),
            self.quote_units(right, trade_type, block, depth + 1)
        );
        left.extend(right);
        left
    }

    async fn quote_single(&self, units: Vec<QuoteRequest>, trade_type: TradeType, block: u64) -> Vec<Quoted> {
        let attempt = retry_async("single quote", &self.config.retry, |_| {
            self.source.quote_batch(&units, trade_type, block)
        })
        .await;

        let Some(unit) = units.into_iter().next() else {
            return Vec::new();
        };
        match attempt {
            Ok(mut samples) if samples.len() == 1 => vec![(unit, samples.remove(0))],
            Ok(samples) => {
                warn!("Quoter returned {} results for one call", samples.len());
                vec![(unit, None)]
            }
            Err(e) => {
                let err = RouterError::QuoteUnavailable {
                    route: unit.route_index,
                    percent: unit.percent,
                    reason: e.to_string(),
                };
                warn!("{}", err);
                vec![(unit, None)]
            }
        }
    }
}

/// `leg_amount` is the fixed side this route swaps; `sample` answers the other.
pub(crate) fn build_quote(
    route: &Route,
    leg_amount: CurrencyAmount,
    trade_type: TradeType,
    percent: u32,
    sample: QuoteSample,
) -> RouteQuote {
    let (input_amount, output_amount) = match trade_type {
        TradeType::ExactInput => (leg_amount, CurrencyAmount::from_raw(route.output.clone(), sample.amount)),
        TradeType::ExactOutput => (CurrencyAmount::from_raw(route.input.clone(), sample.amount), leg_amount),
    };
    RouteQuote {
        percent,
        input_amount,
        output_amount,
        gas_estimate: estimate_route_gas(route.hops(), sample.ticks_crossed, sample.gas_estimate),
        ticks_crossed: sample.ticks_crossed,
        gas_cost_in_quote_token: Default::default(),
    }
}

// ============================================
// TESTS
// ============================================
