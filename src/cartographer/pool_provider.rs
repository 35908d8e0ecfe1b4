//! Pool State Provider - Uniswap V3
//!
//! Pool addresses are derived locally (CREATE2 from the factory) and read with
//! `slot0` + `liquidity` calls through Multicall3, chunked at a configurable
//! number of calls per batch. The default fits a default discovery round
//! (seven tokens, every pair, every fee tier) in one batch.
//! Pools that were never deployed or never initialized come back absent.

use crate::cache::TtlCache;
use crate::chain::{ChainClient, ReadCall};
use crate::error::RouterResult;
use crate::retry::{retry_async, RetryPolicy};
use crate::tokens::Token;
use alloy_primitives::{address, b256, keccak256, Address, B256, U256, U512};
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace};

// ============================================
// POOL INTERFACE
// ============================================

sol! {
    interface IUniswapV3Pool {
        function slot0() external view returns (
            uint160 sqrtPriceX96, int24 tick, uint16 observationIndex,
            uint16 observationCardinality, uint16 observationCardinalityNext,
            uint8 feeProtocol, bool unlocked
        );
        function liquidity() external view returns (uint128);
    }
}

// ============================================
// CONSTANTS
// ============================================

/// Uniswap V3 factory (mainnet, Optimism, Polygon, Arbitrum)
pub const V3_FACTORY: Address = address!("1F98431c8aD98523631AE4a59f267346ea31F984");

/// keccak256 of the V3 pool creation code
pub const POOL_INIT_CODE_HASH: B256 =
    b256!("e34f199b19b2b4f47f68442619d555527d244f78a3297ea89325f843f87b8b54");

/// Default calls per batch; two calls per pool
pub const DEFAULT_POOL_CALLS_PER_BATCH: usize = 400;

// ============================================
// TYPES
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeeTier {
    Lowest,
    Low,
    Medium,
    High,
}

impl FeeTier {
    pub const ALL: [FeeTier; 4] = [FeeTier::Lowest, FeeTier::Low, FeeTier::Medium, FeeTier::High];

    /// Fee in hundredths of a basis point
    pub fn pips(&self) -> u32 {
        match self {
            FeeTier::Lowest => 100,
            FeeTier::Low => 500,
            FeeTier::Medium => 3000,
            FeeTier::High => 10000,
        }
    }

    pub fn from_pips(pips: u32) -> Option<Self> {
        FeeTier::ALL.into_iter().find(|f| f.pips() == pips)
    }
}

impl fmt::Display for FeeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pct = self.pips() as f64 / 10_000.0;
        write!(f, "{}%", pct)
    }
}

/// Normalized pool identity: token0 sorts before token1
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub token0: Token,
    pub token1: Token,
    pub fee: FeeTier,
}

impl PoolKey {
    pub fn new(token_a: Token, token_b: Token, fee: FeeTier) -> Self {
        if token_a.sorts_before(&token_b) {
            Self { token0: token_a, token1: token_b, fee }
        } else {
            Self { token0: token_b, token1: token_a, fee }
        }
    }

    pub fn address(&self, factory: Address) -> Address {
        compute_pool_address(factory, self.token0.address, self.token1.address, self.fee)
    }
}

/// Pool state as of `block_number`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub address: Address,
    pub token0: Token,
    pub token1: Token,
    pub fee: FeeTier,
    pub sqrt_price_x96: U256,
    pub liquidity: u128,
    pub tick: i32,
    pub block_number: u64,
}

impl Pool {
    pub fn involves(&self, token: &Token) -> bool {
        self.token0 == *token || self.token1 == *token
    }

    pub fn other(&self, token: &Token) -> Option<&Token> {
        if self.token0 == *token {
            Some(&self.token1)
        } else if self.token1 == *token {
            Some(&self.token0)
        } else {
            None
        }
    }

    pub fn key(&self) -> PoolKey {
        PoolKey::new(self.token0.clone(), self.token1.clone(), self.fee)
    }

    /// Convert `amount` of `token_in` at the pool's mid price (no impact, no fee).
    /// price(token1/token0) = (sqrtPriceX96 / 2^96)^2
    pub fn mid_price_quote(&self, token_in: &Token, amount: U256) -> Option<U256> {
        if self.sqrt_price_x96.is_zero() {
            return None;
        }
        let sqrt_sq = widen(self.sqrt_price_x96).checked_mul(widen(self.sqrt_price_x96))?;
        let q192 = U512::from(1u64) << 192;
        let amount = widen(amount);

        let out = if *token_in == self.token0 {
            amount.checked_mul(sqrt_sq)? / q192
        } else if *token_in == self.token1 {
            amount.checked_mul(q192)? / sqrt_sq
        } else {
            return None;
        };
        narrow(out)
    }
}

fn widen(x: U256) -> U512 {
    let mut limbs = [0u64; 8];
    limbs[..4].copy_from_slice(x.as_limbs());
    U512::from_limbs(limbs)
}

fn narrow(x: U512) -> Option<U256> {
    let limbs = x.as_limbs();
    if limbs[4..].iter().any(|l| *l != 0) {
        return None;
    }
    Some(U256::from_limbs([limbs[0], limbs[1], limbs[2], limbs[3]]))
}

/// CREATE2 address of a V3 pool: salt = keccak256(abi.encode(token0, token1, fee))
pub fn compute_pool_address(factory: Address, token0: Address, token1: Address, fee: FeeTier) -> Address {
    let (token0, token1) = if token0 < token1 { (token0, token1) } else { (token1, token0) };
    let mut encoded = [0u8; 96];
    encoded[12..32].copy_from_slice(token0.as_slice());
    encoded[44..64].copy_from_slice(token1.as_slice());
    encoded[92..96].copy_from_slice(&fee.pips().to_be_bytes());
    let salt = keccak256(encoded);
    factory.create2(salt.0, POOL_INIT_CODE_HASH.0)
}

/// Pools found for a request, keyed by address
#[derive(Debug, Clone, Default)]
pub struct PoolAccessor {
    pools: BTreeMap<Address, Pool>,
}

impl PoolAccessor {
    pub fn new(pools: impl IntoIterator<Item = Pool>) -> Self {
        Self {
            pools: pools.into_iter().map(|p| (p.address, p)).collect(),
        }
    }

    pub fn get(&self, address: &Address) -> Option<&Pool> {
        self.pools.get(address)
    }

    pub fn get_pool(&self, token_a: &Token, token_b: &Token, fee: FeeTier) -> Option<&Pool> {
        let key = PoolKey::new(token_a.clone(), token_b.clone(), fee);
        self.pools.values().find(|p| p.key() == key)
    }

    /// All pools, address ascending.
    pub fn all(&self) -> Vec<Pool> {
        self.pools.values().cloned().collect()
    }

    /// Deepest pool between two tokens across fee tiers.
    pub fn deepest(&self, token_a: &Token, token_b: &Token) -> Option<&Pool> {
        self.pools
            .values()
            .filter(|p| p.involves(token_a) && p.involves(token_b))
            .max_by(|a, b| a.liquidity.cmp(&b.liquidity).then(b.address.cmp(&a.address)))
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

#[async_trait]
pub trait PoolProvider: Send + Sync {
    /// State at `block` for every requested pair; pairs without a live pool are absent.
    async fn get_pools(&self, keys: &[PoolKey], block: u64) -> RouterResult<PoolAccessor>;
}

/// Unique keys, in first-seen order.
fn dedup_keys(keys: &[PoolKey]) -> Vec<PoolKey> {
    let mut seen = HashSet::new();
    keys.iter().filter(|k| seen.insert((*k).clone())).cloned().collect()
}

// ============================================
// ON-CHAIN PROVIDER
// ============================================

pub struct OnChainPoolProvider {
    client: Arc<dyn ChainClient>,
    factory: Address,
    retry: RetryPolicy,
    calls_per_batch: usize,
}

impl OnChainPoolProvider {
    pub fn new(client: Arc<dyn ChainClient>, retry: RetryPolicy) -> Self {
        Self {
            client,
            factory: V3_FACTORY,
            retry,
            calls_per_batch: DEFAULT_POOL_CALLS_PER_BATCH,
        }
    }

    /// Calls per multicall; rounded down to whole pools, at least one pool.
    pub fn with_batch_size(mut self, calls: usize) -> Self {
        self.calls_per_batch = calls;
        self
    }

    fn pools_per_batch(&self) -> usize {
        (self.calls_per_batch / 2).max(1)
    }

    pub fn with_factory(mut self, factory: Address) -> Self {
        self.factory = factory;
        self
    }

    async fn fetch_chunk(&self, chunk: &[(PoolKey, Address)], block: u64) -> RouterResult<Vec<Pool>> {
        let mut calls = Vec::with_capacity(chunk.len() * 2);
        for (_, address) in chunk {
            calls.push(ReadCall::new(*address, IUniswapV3Pool::slot0Call {}.abi_encode()));
            calls.push(ReadCall::new(*address, IUniswapV3Pool::liquidityCall {}.abi_encode()));
        }

        let results = retry_async("pool state multicall", &self.retry, |_| {
            self.client.multicall(calls.clone(), Some(block))
        })
        .await?;

        let mut pools = Vec::new();
        for (i, (key, address)) in chunk.iter().enumerate() {
            let slot0 = results
                .get(i * 2)
                .and_then(|r| r.data())
                .and_then(|d| IUniswapV3Pool::slot0Call::abi_decode_returns(d).ok());
            let liquidity = results
                .get(i * 2 + 1)
                .and_then(|r| r.data())
                .and_then(|d| IUniswapV3Pool::liquidityCall::abi_decode_returns(d).ok());

            match (slot0, liquidity) {
                (Some(s), Some(liquidity)) => {
                    let sqrt_price_x96 = U256::from(s.sqrtPriceX96);
                    if sqrt_price_x96.is_zero() {
                        trace!("Pool {:?} not initialized", address);
                        continue;
                    }
                    pools.push(Pool {
                        address: *address,
                        token0: key.token0.clone(),
                        token1: key.token1.clone(),
                        fee: key.fee,
                        sqrt_price_x96,
                        liquidity,
                        tick: s.tick.as_i32(),
                        block_number: block,
                    });
                }
                _ => trace!("Pool {}/{} {} absent", key.token0, key.token1, key.fee),
            }
        }

        Ok(pools)
    }
}

#[async_trait]
impl PoolProvider for OnChainPoolProvider {
    async fn get_pools(&self, keys: &[PoolKey], block: u64) -> RouterResult<PoolAccessor> {
        let start = Instant::now();
        let keyed: Vec<(PoolKey, Address)> = dedup_keys(keys)
            .into_iter()
            .map(|k| {
                let address = k.address(self.factory);
                (k, address)
            })
            .collect();

        let chunks: Vec<&[(PoolKey, Address)]> = keyed.chunks(self.pools_per_batch()).collect();
        let results = join_all(chunks.iter().map(|c| self.fetch_chunk(c, block))).await;

        let mut pools = Vec::new();
        for result in results {
            pools.extend(result?);
        }

        info!(
            "Fetched {}/{} pools at block {} in {:?}",
            pools.len(),
            keyed.len(),
            block,
            start.elapsed()
        );
        Ok(PoolAccessor::new(pools))
    }
}

// ============================================
// CACHING DECORATOR
// ============================================

/// (token0, token1, fee, block) → pool or known-absent
pub type PoolCacheKey = (Address, Address, FeeTier, u64);

pub struct CachingPoolProvider {
    inner: Arc<dyn PoolProvider>,
    cache: Arc<TtlCache<PoolCacheKey, Option<Pool>>>,
}

impl CachingPoolProvider {
    pub fn new(inner: Arc<dyn PoolProvider>, cache: Arc<TtlCache<PoolCacheKey, Option<Pool>>>) -> Self {
        Self { inner, cache }
    }

    fn cache_key(key: &PoolKey, block: u64) -> PoolCacheKey {
        (key.token0.address, key.token1.address, key.fee, block)
    }
}

#[async_trait]
impl PoolProvider for CachingPoolProvider {
    async fn get_pools(&self, keys: &[PoolKey], block: u64) -> RouterResult<PoolAccessor> {
        let keys = dedup_keys(keys);
        let cache_keys: Vec<PoolCacheKey> = keys.iter().map(|k| Self::cache_key(k, block)).collect();
        let cached = self.cache.get_many(cache_keys.iter()).await;

        let missing: Vec<PoolKey> = keys
            .iter()
            .zip(cache_keys.iter())
            .filter(|(_, ck)| !cached.contains_key(*ck))
            .map(|(k, _)| k.clone())
            .collect();

        debug!("Pool cache: {} hits, {} misses", cached.len(), missing.len());

        let mut pools: Vec<Pool> = cached.into_values().flatten().collect();
        if !missing.is_empty() {
            let fetched = self.inner.get_pools(&missing, block).await?;
            let by_key: HashMap<PoolKey, Pool> = fetched.all().into_iter().map(|p| (p.key(), p)).collect();

            let mut entries = Vec::with_capacity(missing.len());
            for key in &missing {
                let pool = by_key.get(key).cloned();
                entries.push((Self::cache_key(key, block), pool.clone()));
                pools.extend(pool);
            }
            self.cache.insert_many(entries).await;
        }

        Ok(PoolAccessor::new(pools))
    }
}

// ============================================
// TESTS
// ============================================
