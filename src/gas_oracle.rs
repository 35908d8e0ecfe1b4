//! Gas Price Oracle
//!
//! Sources, tried in order by the on-chain chain:
//! 1. Fee market (EIP-1559): recent base fees + a priority fee percentile
//! 2. Legacy: the node's suggested `eth_gasPrice`
//! 3. Etherscan `eth_gasPrice` proxy (only when an API key is configured)
//!
//! Each wrapper holds an inner `GasPriceProvider` and adds fallback or caching.
//! There is no fixed fallback price: if every source fails the request fails.

use crate::cache::TtlCache;
use crate::chain::ChainClient;
use crate::error::{RouterError, RouterResult};
use crate::tokens::{CHAIN_ARBITRUM, CHAIN_MAINNET, CHAIN_OPTIMISM, CHAIN_POLYGON};
use alloy_primitives::U256;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

// ============================================
// CONSTANTS
// ============================================

/// Etherscan API base URL (v2 supports multiple chains)
const ETHERSCAN_API_URL: &str = "https://api.etherscan.io/v2/api";

/// Timeout for API calls
const API_TIMEOUT_SECS: u64 = 5;

/// Blocks of fee history used by the fee-market estimator
pub const FEE_HISTORY_BLOCKS: u64 = 20;

/// Reward percentile used as the priority fee estimate
pub const PRIORITY_FEE_PERCENTILE: f64 = 50.0;

/// Anything above this is treated as a bad reading (10_000 gwei)
const MAX_SANE_GAS_WEI: u128 = 10_000_000_000_000;

/// Chains with fee-market pricing
const EIP1559_CHAINS: &[u64] = &[CHAIN_MAINNET, CHAIN_OPTIMISM, CHAIN_POLYGON, CHAIN_ARBITRUM, 8453, 11155111];

// ============================================
// TYPES
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GasSource {
    FeeMarket,
    Legacy,
    Etherscan,
}

impl std::fmt::Display for GasSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GasSource::FeeMarket => write!(f, "EIP-1559"),
            GasSource::Legacy => write!(f, "Legacy"),
            GasSource::Etherscan => write!(f, "Etherscan"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasPrice {
    /// Effective price per gas unit used for valuation
    pub gas_price_wei: u128,
    pub base_fee_wei: Option<u128>,
    pub priority_fee_wei: Option<u128>,
    pub block_number: u64,
    pub source: GasSource,
}

impl GasPrice {
    pub fn legacy(gas_price_wei: u128, block_number: u64, source: GasSource) -> Self {
        Self {
            gas_price_wei,
            base_fee_wei: None,
            priority_fee_wei: None,
            block_number,
            source,
        }
    }

    /// Cost in wei of `gas_units` at this price.
    pub fn cost_wei(&self, gas_units: u64) -> U256 {
        U256::from(gas_units) * U256::from(self.gas_price_wei)
    }

    pub fn gwei(&self) -> f64 {
        self.gas_price_wei as f64 / 1e9
    }
}

#[async_trait]
pub trait GasPriceProvider: Send + Sync {
    async fn gas_price(&self, block: u64) -> RouterResult<GasPrice>;
}

fn check_sane(wei: u128, source: GasSource) -> RouterResult<u128> {
    if wei == 0 || wei > MAX_SANE_GAS_WEI {
        return Err(RouterError::GasPriceUnavailable(format!(
            "{} returned implausible gas price {} wei",
            source, wei
        )));
    }
    Ok(wei)
}

// ============================================
// FEE MARKET (EIP-1559)
// ============================================

pub struct Eip1559GasPriceProvider {
    client: Arc<dyn ChainClient>,
    blocks_to_consider: u64,
    priority_fee_percentile: f64,
}

impl Eip1559GasPriceProvider {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self {
            client,
            blocks_to_consider: FEE_HISTORY_BLOCKS,
            priority_fee_percentile: PRIORITY_FEE_PERCENTILE,
        }
    }
}

#[async_trait]
impl GasPriceProvider for Eip1559GasPriceProvider {
    async fn gas_price(&self, block: u64) -> RouterResult<GasPrice> {
        let history = self
            .client
            .fee_history(self.blocks_to_consider, block, &[self.priority_fee_percentile])
            .await?;

        // The last base fee is the projection for the block after `block`
        let next_base_fee = match history.base_fee_per_gas.last() {
            Some(fee) if *fee > 0 => *fee,
            _ => {
                return Err(RouterError::GasPriceUnavailable(
                    "fee history has no base fee".to_string(),
                ))
            }
        };

        let rewards: Vec<u128> = history
            .reward
            .iter()
            .filter_map(|row| row.first().copied())
            .collect();
        let priority_fee = if rewards.is_empty() {
            0
        } else {
            rewards.iter().sum::<u128>() / rewards.len() as u128
        };

        let total = check_sane(next_base_fee.saturating_add(priority_fee), GasSource::FeeMarket)?;
        trace!(
            "Fee market gas: base {} + priority {} over {} blocks",
            next_base_fee,
            priority_fee,
            rewards.len()
        );

        Ok(GasPrice {
            gas_price_wei: total,
            base_fee_wei: Some(next_base_fee),
            priority_fee_wei: Some(priority_fee),
            block_number: block,
            source: GasSource::FeeMarket,
        })
    }
}

// ============================================
// LEGACY
// ============================================

pub struct LegacyGasPriceProvider {
    client: Arc<dyn ChainClient>,
}

impl LegacyGasPriceProvider {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl GasPriceProvider for LegacyGasPriceProvider {
    async fn gas_price(&self, block: u64) -> RouterResult<GasPrice> {
        let wei = check_sane(self.client.gas_price().await?, GasSource::Legacy)?;
        Ok(GasPrice::legacy(wei, block, GasSource::Legacy))
    }
}

// ============================================
// ETHERSCAN
// ============================================

#[derive(Debug, Deserialize)]
struct EtherscanResponse {
    result: Option<String>,
    error: Option<EtherscanError>,
}

#[derive(Debug, Deserialize)]
struct EtherscanError {
    code: i64,
    message: String,
}

pub struct EtherscanGasPriceProvider {
    http_client: Client,
    api_key: String,
    chain_id: u64,
}

impl EtherscanGasPriceProvider {
    pub fn new(api_key: String, chain_id: u64) -> RouterResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(API_TIMEOUT_SECS))
            .build()
            .map_err(|e| RouterError::Configuration(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_key,
            chain_id,
        })
    }

    fn parse_response(response: EtherscanResponse) -> RouterResult<u128> {
        if let Some(error) = response.error {
            return Err(RouterError::Transport(format!(
                "Etherscan error: {} (code {})",
                error.message, error.code
            )));
        }
        let result = response
            .result
            .ok_or_else(|| RouterError::Transport("no result from Etherscan".to_string()))?;

        u128::from_str_radix(result.trim_start_matches("0x"), 16)
            .map_err(|e| RouterError::decode("Etherscan gas price", e))
    }
}

#[async_trait]
impl GasPriceProvider for EtherscanGasPriceProvider {
    async fn gas_price(&self, block: u64) -> RouterResult<GasPrice> {
        let url = format!(
            "{}?chainid={}&module=proxy&action=eth_gasPrice&apikey={}",
            ETHERSCAN_API_URL, self.chain_id, self.api_key
        );

        let response: EtherscanResponse = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| RouterError::Transport(format!("Etherscan request failed: {}", e)))?
            .json()
            .await
            .map_err(|e| RouterError::decode("Etherscan response", e))?;

        let wei = check_sane(Self::parse_response(response)?, GasSource::Etherscan)?;
        Ok(GasPrice::legacy(wei, block, GasSource::Etherscan))
    }
}

// ============================================
// FALLBACK + CACHING
// ============================================

/// Tries `primary`, then `fallback` if the primary fails for any reason
pub struct FallbackGasPriceProvider {
    primary: Arc<dyn GasPriceProvider>,
    fallback: Arc<dyn GasPriceProvider>,
}

impl FallbackGasPriceProvider {
    pub fn new(primary: Arc<dyn GasPriceProvider>, fallback: Arc<dyn GasPriceProvider>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl GasPriceProvider for FallbackGasPriceProvider {
    async fn gas_price(&self, block: u64) -> RouterResult<GasPrice> {
        match self.primary.gas_price(block).await {
            Ok(price) => Ok(price),
            Err(primary_err) => {
                warn!("Gas price source failed, falling back: {}", primary_err);
                self.fallback.gas_price(block).await.map_err(|fallback_err| {
                    RouterError::GasPriceUnavailable(format!("{}; {}", primary_err, fallback_err))
                })
            }
        }
    }
}

/// Serves a shared cached price for the cache TTL (≈15s)
pub struct CachingGasPriceProvider {
    chain_id: u64,
    inner: Arc<dyn GasPriceProvider>,
    cache: Arc<TtlCache<u64, GasPrice>>,
}

impl CachingGasPriceProvider {
    pub fn new(chain_id: u64, inner: Arc<dyn GasPriceProvider>, cache: Arc<TtlCache<u64, GasPrice>>) -> Self {
        Self { chain_id, inner, cache }
    }
}

#[async_trait]
impl GasPriceProvider for CachingGasPriceProvider {
    async fn gas_price(&self, block: u64) -> RouterResult<GasPrice> {
        if let Some(price) = self.cache.get(&self.chain_id).await {
            trace!("Using cached gas price: {:.2} gwei", price.gwei());
            return Ok(price);
        }

        let price = self.inner.gas_price(block).await?;
        debug!("⛽ Gas from {}: {:.2} gwei", price.source, price.gwei());
        self.cache.insert(self.chain_id, price.clone()).await;
        Ok(price)
    }
}

/// Fee market → legacy → Etherscan (optional), wrapped in the shared cache.
pub fn on_chain_gas_price_provider(
    client: Arc<dyn ChainClient>,
    etherscan_api_key: Option<String>,
    cache: Arc<TtlCache<u64, GasPrice>>,
) -> RouterResult<Arc<dyn GasPriceProvider>> {
    let chain_id = client.chain_id();
    let legacy: Arc<dyn GasPriceProvider> = Arc::new(LegacyGasPriceProvider::new(client.clone()));

    let mut chain: Arc<dyn GasPriceProvider> = if EIP1559_CHAINS.contains(&chain_id) {
        Arc::new(FallbackGasPriceProvider::new(
            Arc::new(Eip1559GasPriceProvider::new(client)),
            legacy,
        ))
    } else {
        legacy
    };

    if let Some(api_key) = etherscan_api_key {
        let etherscan = Arc::new(EtherscanGasPriceProvider::new(api_key, chain_id)?);
        chain = Arc::new(FallbackGasPriceProvider::new(chain, etherscan));
    }

    Ok(Arc::new(CachingGasPriceProvider::new(chain_id, chain, cache)))
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::chain::FeeHistory;
    use crate::test_support::{FakeChainClient, FakeGasPriceProvider};

    fn gwei(n: u128) -> u128 {
        n * 1_000_000_000
    }

    #[tokio::test]
    async fn test_fee_market_uses_next_base_fee_plus_mean_priority() {
        let client = Arc::new(FakeChainClient::new(1, 100).with_fee_history(FeeHistory {
            oldest_block: 98,
            base_fee_per_gas: vec![gwei(10), gwei(11), gwei(12), gwei(13)],
            reward: vec![vec![gwei(1)], vec![gwei(2)], vec![gwei(3)]],
        }));

        let price = Eip1559GasPriceProvider::new(client).gas_price(100).await.unwrap();
        assert_eq!(price.base_fee_wei, Some(gwei(13)));
        assert_eq!(price.priority_fee_wei, Some(gwei(2)));
        assert_eq!(price.gas_price_wei, gwei(15));
        assert_eq!(price.source, GasSource::FeeMarket);
    }

    #[tokio::test]
    async fn test_fee_market_without_base_fee_fails() {
        let client = Arc::new(FakeChainClient::new(1, 100).with_fee_history(FeeHistory {
            oldest_block: 98,
            base_fee_per_gas: vec![0, 0, 0],
            reward: vec![],
        }));
        let err = Eip1559GasPriceProvider::new(client).gas_price(100).await.unwrap_err();
        assert!(matches!(err, RouterError::GasPriceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_legacy_reads_node_price() {
        let client = Arc::new(FakeChainClient::new(56, 7).with_gas_price(gwei(3)));
        let price = LegacyGasPriceProvider::new(client).gas_price(7).await.unwrap();
        assert_eq!(price.gas_price_wei, gwei(3));
        assert_eq!(price.source, GasSource::Legacy);
        assert_eq!(price.base_fee_wei, None);
    }

    #[tokio::test]
    async fn test_fallback_used_only_when_primary_fails() {
        let primary = Arc::new(FakeGasPriceProvider::failing());
        let fallback = Arc::new(FakeGasPriceProvider::fixed(gwei(20), GasSource::Legacy));
        let provider = FallbackGasPriceProvider::new(primary.clone(), fallback.clone());

        let price = provider.gas_price(1).await.unwrap();
        assert_eq!(price.gas_price_wei, gwei(20));
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);

        let healthy = Arc::new(FakeGasPriceProvider::fixed(gwei(30), GasSource::FeeMarket));
        let untouched = Arc::new(FakeGasPriceProvider::fixed(gwei(20), GasSource::Legacy));
        let provider = FallbackGasPriceProvider::new(healthy, untouched.clone());
        assert_eq!(provider.gas_price(1).await.unwrap().gas_price_wei, gwei(30));
        assert_eq!(untouched.calls(), 0);
    }

    #[tokio::test]
    async fn test_all_sources_failing_is_gas_price_unavailable() {
        let provider = FallbackGasPriceProvider::new(
            Arc::new(FakeGasPriceProvider::failing()),
            Arc::new(FakeGasPriceProvider::failing()),
        );
        let err = provider.gas_price(1).await.unwrap_err();
        assert!(matches!(err, RouterError::GasPriceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_cache_serves_within_ttl_then_refetches() {
        let clock = Arc::new(ManualClock::new());
        let cache = Arc::new(TtlCache::with_clock("gas", Duration::from_secs(15), clock.clone()));
        let inner = Arc::new(FakeGasPriceProvider::fixed(gwei(25), GasSource::Legacy));
        let provider = CachingGasPriceProvider::new(1, inner.clone(), cache);

        provider.gas_price(1).await.unwrap();
        provider.gas_price(2).await.unwrap();
        assert_eq!(inner.calls(), 1);

        clock.advance(Duration::from_secs(16));
        provider.gas_price(3).await.unwrap();
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test]
    async fn test_on_chain_chain_falls_back_to_legacy() {
        // Fee history is missing on this fake, so the fee market source errors
        let client = Arc::new(FakeChainClient::new(1, 100).with_gas_price(gwei(9)));
        let cache = Arc::new(TtlCache::new("gas", Duration::from_secs(15)));
        let provider = on_chain_gas_price_provider(client, None, cache).unwrap();

        let price = provider.gas_price(100).await.unwrap();
        assert_eq!(price.source, GasSource::Legacy);
        assert_eq!(price.gas_price_wei, gwei(9));
    }

    #[test]
    fn test_etherscan_response_parsing() {
        let ok = EtherscanResponse {
            result: Some("0x4a817c800".to_string()),
            error: None,
        };
        assert_eq!(EtherscanGasPriceProvider::parse_response(ok).unwrap(), gwei(20));

        let err = EtherscanResponse {
            result: None,
            error: Some(EtherscanError {
                code: -32000,
                message: "rate limited".to_string(),
            }),
        };
        assert!(EtherscanGasPriceProvider::parse_response(err).is_err());
    }

    #[test]
    fn test_cost_wei() {
        let price = GasPrice::legacy(gwei(20), 1, GasSource::Legacy);
        assert_eq!(price.cost_wei(21_000), U256::from(420_000_000_000_000u64));
    }
}
