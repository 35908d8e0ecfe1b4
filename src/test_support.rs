//! Fixtures and in-memory fakes for unit tests.

use crate::cartographer::pool_provider::{
    compute_pool_address, FeeTier, IUniswapV3Pool, Pool, PoolAccessor, PoolKey, PoolProvider, V3_FACTORY,
};
use crate::cartographer::token_provider::{IERC20Metadata, TokenListProvider};
use crate::chain::{CallOutcome, ChainClient, FeeHistory, ReadCall};
use crate::error::RouterResult;
use crate::gas_oracle::{GasPrice, GasPriceProvider, GasSource};
use crate::models::TradeType;
use crate::retry::transport_error;
use crate::router::RouterContext;
use crate::simulator::quoter::{QuoteRequest, QuoteSample, QuoteSource};
use crate::tokens::Token;
use alloy_primitives::{address, Address, Bytes, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================
// TOKENS + POOLS
// ============================================

pub fn usdc() -> Token {
    Token::new(1, address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"), 6, "USDC")
}

pub fn weth() -> Token {
    Token::new(1, address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"), 18, "WETH")
}

pub fn dai() -> Token {
    Token::new(1, address!("6B175474E89094C44Da98b954EedcdeCB5BE3830"), 18, "DAI")
}

pub fn usdt() -> Token {
    Token::new(1, address!("dAC17F958D2ee523a2206206994597C13D831ec7"), 6, "USDT")
}

/// A live pool at price 1.0, tick 0, block 0.
pub fn pool(a: &Token, b: &Token, fee: FeeTier, liquidity: u128) -> Pool {
    let key = PoolKey::new(a.clone(), b.clone(), fee);
    Pool {
        address: compute_pool_address(V3_FACTORY, key.token0.address, key.token1.address, fee),
        token0: key.token0,
        token1: key.token1,
        fee,
        sqrt_price_x96: U256::from(1u64) << 96,
        liquidity,
        tick: 0,
        block_number: 0,
    }
}

fn word(value: U256) -> [u8; 32] {
    value.to_be_bytes::<32>()
}

fn signed_word(value: i64) -> [u8; 32] {
    let mut out = if value < 0 { [0xffu8; 32] } else { [0u8; 32] };
    out[24..].copy_from_slice(&value.to_be_bytes());
    out
}

fn abi_string(s: &str) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&word(U256::from(32u64)));
    out.extend_from_slice(&word(U256::from(s.len())));
    let mut data = s.as_bytes().to_vec();
    data.resize(s.len().div_ceil(32) * 32, 0);
    out.extend_from_slice(&data);
    out
}

// ============================================
// CHAIN CLIENT
// ============================================

/// Answers `(target, selector)` reads from a table; anything else reverts.
pub struct FakeChainClient {
    chain_id: u64,
    block: u64,
    responses: HashMap<(Address, [u8; 4]), Bytes>,
    gas_price: Option<u128>,
    fee_history: Option<FeeHistory>,
    multicalls: Mutex<Vec<(usize, Option<u64>)>>,
}

impl FakeChainClient {
    pub fn new(chain_id: u64, block: u64) -> Self {
        Self {
            chain_id,
            block,
            responses: HashMap::new(),
            gas_price: None,
            fee_history: None,
            multicalls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(mut self, target: Address, selector: [u8; 4], data: Vec<u8>) -> Self {
        self.responses.insert((target, selector), Bytes::from(data));
        self
    }

    pub fn with_gas_price(mut self, wei: u128) -> Self {
        self.gas_price = Some(wei);
        self
    }

    pub fn with_fee_history(mut self, history: FeeHistory) -> Self {
        self.fee_history = Some(history);
        self
    }

    /// Serve `slot0` and `liquidity` for `pool` at its address.
    pub fn with_pool(self, pool: &Pool) -> Self {
        let mut slot0 = Vec::with_capacity(7 * 32);
        slot0.extend_from_slice(&word(pool.sqrt_price_x96));
        slot0.extend_from_slice(&signed_word(pool.tick as i64));
        slot0.extend_from_slice(&word(U256::ZERO));
        slot0.extend_from_slice(&word(U256::from(1u64)));
        slot0.extend_from_slice(&word(U256::from(1u64)));
        slot0.extend_from_slice(&word(U256::ZERO));
        slot0.extend_from_slice(&word(U256::from(1u64)));

        self.with_response(pool.address, IUniswapV3Pool::slot0Call::SELECTOR, slot0)
            .with_response(
                pool.address,
                IUniswapV3Pool::liquidityCall::SELECTOR,
                word(U256::from(pool.liquidity)).to_vec(),
            )
    }

    /// Serve ERC-20 `decimals` and `symbol` at `token`.
    pub fn with_token(self, token: Address, decimals: u8, symbol: &str) -> Self {
        self.with_response(token, IERC20Metadata::decimalsCall::SELECTOR, word(U256::from(decimals)).to_vec())
            .with_response(token, IERC20Metadata::symbolCall::SELECTOR, abi_string(symbol))
    }

    pub fn multicall_sizes(&self) -> Vec<usize> {
        self.multicalls.lock().unwrap().iter().map(|(n, _)| *n).collect()
    }

    pub fn multicall_blocks(&self) -> Vec<Option<u64>> {
        self.multicalls.lock().unwrap().iter().map(|(_, b)| *b).collect()
    }
}

#[async_trait]
impl ChainClient for FakeChainClient {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn block_number(&self) -> RouterResult<u64> {
        Ok(self.block)
    }

    async fn multicall(&self, calls: Vec<ReadCall>, block: Option<u64>) -> RouterResult<Vec<CallOutcome>> {
        self.multicalls.lock().unwrap().push((calls.len(), block));
        Ok(calls
            .iter()
            .map(|call| {
                let mut selector = [0u8; 4];
                if call.call_data.len() >= 4 {
                    selector.copy_from_slice(&call.call_data[..4]);
                }
                match self.responses.get(&(call.target, selector)) {
                    Some(data) => CallOutcome {
                        success: true,
                        return_data: data.clone(),
                    },
                    None => CallOutcome {
                        success: false,
                        return_data: Bytes::new(),
                    },
                }
            })
            .collect())
    }

    async fn gas_price(&self) -> RouterResult<u128> {
        self.gas_price.ok_or_else(|| transport_error("eth_gasPrice not available"))
    }

    async fn fee_history(&self, _count: u64, _newest: u64, _percentiles: &[f64]) -> RouterResult<FeeHistory> {
        self.fee_history
            .clone()
            .ok_or_else(|| transport_error("eth_feeHistory not available"))
    }
}

// ============================================
// POOL PROVIDER
// ============================================

/// Returns the configured pools matching the requested keys.
pub struct FakePoolProvider {
    pools: Vec<Pool>,
    requested: Mutex<Vec<u64>>,
}

impl FakePoolProvider {
    pub fn new(pools: Vec<Pool>) -> Self {
        Self {
            pools,
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn requested_blocks(&self) -> Vec<u64> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl PoolProvider for FakePoolProvider {
    async fn get_pools(&self, keys: &[PoolKey], block: u64) -> RouterResult<PoolAccessor> {
        self.requested.lock().unwrap().push(block);
        let wanted: HashSet<&PoolKey> = keys.iter().collect();
        Ok(PoolAccessor::new(
            self.pools
                .iter()
                .filter(|p| wanted.contains(&p.key()))
                .map(|p| Pool {
                    block_number: block,
                    ..p.clone()
                }),
        ))
    }
}

// ============================================
// GAS PRICE PROVIDER
// ============================================

pub struct FakeGasPriceProvider {
    price: Option<(u128, GasSource)>,
    calls: AtomicUsize,
}

impl FakeGasPriceProvider {
    pub fn fixed(wei: u128, source: GasSource) -> Self {
        Self {
            price: Some((wei, source)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            price: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GasPriceProvider for FakeGasPriceProvider {
    async fn gas_price(&self, block: u64) -> RouterResult<GasPrice> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.price {
            Some((wei, source)) => Ok(GasPrice::legacy(wei, block, source)),
            None => Err(transport_error("gas source down")),
        }
    }
}

// ============================================
// QUOTE SOURCE
// ============================================

type QuoteFn = Box<dyn Fn(&QuoteRequest) -> Option<QuoteSample> + Send + Sync>;

/// Quotes through a closure, with injectable batch failures.
pub struct FakeQuoteSource {
    quote: QuoteFn,
    max_batch: Option<usize>,
    poisoned: HashSet<(usize, u32)>,
    batches: Mutex<Vec<(usize, u64)>>,
    requests: Mutex<Vec<QuoteRequest>>,
}

impl FakeQuoteSource {
    pub fn new(quote: impl Fn(&QuoteRequest) -> Option<QuoteSample> + Send + Sync + 'static) -> Self {
        Self {
            quote: Box::new(quote),
            max_batch: None,
            poisoned: HashSet::new(),
            batches: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Quote equals the requested amount, no gas estimate.
    pub fn proportional() -> Self {
        Self::new(|r| {
            Some(QuoteSample {
                amount: r.amount,
                ticks_crossed: 0,
                gas_estimate: 0,
            })
        })
    }

    /// Any batch larger than `n` fails with a transport error.
    pub fn failing_batches_over(mut self, n: usize) -> Self {
        self.max_batch = Some(n);
        self
    }

    /// Any batch containing this pair fails with a transport error.
    pub fn failing_on(mut self, route_index: usize, percent: u32) -> Self {
        self.poisoned.insert((route_index, percent));
        self
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(|(n, _)| *n).collect()
    }

    pub fn blocks(&self) -> Vec<u64> {
        self.batches.lock().unwrap().iter().map(|(_, b)| *b).collect()
    }

    /// Every request seen, in arrival order
    pub fn requests(&self) -> Vec<QuoteRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuoteSource for FakeQuoteSource {
    async fn quote_batch(
        &self,
        requests: &[QuoteRequest],
        _trade_type: TradeType,
        block: u64,
    ) -> RouterResult<Vec<Option<QuoteSample>>> {
        self.batches.lock().unwrap().push((requests.len(), block));
        self.requests.lock().unwrap().extend_from_slice(requests);
        if self.max_batch.is_some_and(|max| requests.len() > max) {
            return Err(transport_error("batch too large"));
        }
        if requests
            .iter()
            .any(|r| self.poisoned.contains(&(r.route_index, r.percent)))
        {
            return Err(transport_error("execution reverted"));
        }
        Ok(requests.iter().map(|r| (self.quote)(r)).collect())
    }
}

// ============================================
// ROUTER CONTEXT
// ============================================

/// Mainnet token list, 1 gwei legacy gas, no calldata encoder.
pub fn router_context(
    client: Arc<dyn ChainClient>,
    pools: Arc<dyn PoolProvider>,
    quotes: Arc<dyn QuoteSource>,
) -> RouterContext {
    RouterContext::builder(1)
        .client(client)
        .token_provider(Arc::new(TokenListProvider::default_for_chain(1)))
        .pool_provider(pools)
        .gas_price_provider(Arc::new(FakeGasPriceProvider::fixed(1_000_000_000, GasSource::Legacy)))
        .quote_source(quotes)
        .exact_out_block_offset(10)
        .build()
        .unwrap()
}
