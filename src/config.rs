//! Router Configuration
//!
//! Two layers:
//! - `Config`: process settings (RPC, chain, cache TTLs, quote batching) from
//!   the environment / `.env` or a TOML file
//! - `RoutingConfig`: per-request tunables for route generation and splitting

use crate::error::{RouterError, RouterResult};
use crate::retry::RetryPolicy;
use crate::cartographer::pool_provider::DEFAULT_POOL_CALLS_PER_BATCH;
use crate::simulator::batcher::QuoteBatcherConfig;
use eyre::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

// ============================================
// POOL SELECTION
// ============================================

/// Liquidity-ranking heuristics for candidate pools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSelectionConfig {
    /// Best pools overall
    pub top_n: usize,
    /// Best pools touching tokenIn, and separately tokenOut
    pub top_n_token_in_out: usize,
    /// Best pools touching each token one hop away from tokenIn / tokenOut
    pub top_n_second_hop: usize,
    /// Best pools pairing tokenIn (and tokenOut) with each base token
    pub top_n_with_each_base_token: usize,
    /// Cap on all base-token pools together
    pub top_n_with_base_token: usize,
    /// Count the base-token cap only over pools not already selected
    pub top_n_with_base_token_in_set: bool,
    /// Best pools directly between tokenIn and tokenOut
    pub top_n_direct_swaps: usize,
}

impl Default for PoolSelectionConfig {
    fn default() -> Self {
        Self {
            top_n: 3,
            top_n_token_in_out: 2,
            top_n_second_hop: 0,
            top_n_with_each_base_token: 2,
            top_n_with_base_token: 6,
            top_n_with_base_token_in_set: false,
            top_n_direct_swaps: 2,
        }
    }
}

// ============================================
// ROUTING
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub pool_selection: PoolSelectionConfig,
    pub max_swaps_per_path: usize,
    pub min_splits: usize,
    pub max_splits: usize,
    /// Percentage grid step; must divide 100
    pub distribution_percent: u32,
    /// Keep one route per token sequence (the best-ranked fee tier path)
    pub collapse_by_token_path: bool,
    /// Quote at this block instead of the latest one
    pub block_number: Option<u64>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            pool_selection: PoolSelectionConfig::default(),
            max_swaps_per_path: 3,
            min_splits: 1,
            max_splits: 3,
            distribution_percent: 5,
            collapse_by_token_path: false,
            block_number: None,
        }
    }
}

impl RoutingConfig {
    pub fn validate(&self) -> RouterResult<()> {
        let d = self.distribution_percent;
        if d == 0 || d > 100 || 100 % d != 0 {
            return Err(RouterError::Configuration(format!(
                "distributionPercent must divide 100 (got {})",
                d
            )));
        }
        if self.min_splits == 0 || self.min_splits > self.max_splits {
            return Err(RouterError::Configuration(format!(
                "need 1 <= minSplits <= maxSplits (got {} / {})",
                self.min_splits, self.max_splits
            )));
        }
        let units = (100 / d) as usize;
        if self.min_splits > units {
            return Err(RouterError::Configuration(format!(
                "minSplits {} impossible with {}% increments",
                self.min_splits, d
            )));
        }
        if self.max_swaps_per_path == 0 {
            return Err(RouterError::Configuration("maxSwapsPerPath must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Number of grid units in 100%.
    pub fn units(&self) -> usize {
        (100 / self.distribution_percent.max(1)) as usize
    }

    /// `d, 2d, ..., 100`
    pub fn percentages(&self) -> Vec<u32> {
        (1..=self.units() as u32).map(|u| u * self.distribution_percent).collect()
    }

    /// Route splitting can never use more routes than grid units.
    pub fn effective_max_splits(&self) -> usize {
        self.max_splits.min(self.units())
    }
}

// ============================================
// MAIN CONFIGURATION
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // ========== Network Settings ==========
    pub rpc_url: String,
    pub chain_id: u64,

    // ========== Token Sources ==========
    /// Uniswap token-list JSON file; the built-in list when unset
    pub token_list_path: Option<String>,

    // ========== Cache TTLs ==========
    pub token_cache_ttl_secs: u64,
    pub pool_cache_ttl_secs: u64,
    pub gas_price_cache_ttl_secs: u64,
    /// Pool state calls per discovery multicall (two per pool)
    pub pool_multicall_chunk: usize,

    // ========== Quoting ==========
    /// Exact-output quotes are taken this many blocks behind the head
    pub exact_out_block_offset: u64,
    /// Whole-request deadline
    pub route_timeout_ms: u64,
    pub quote_multicall_chunk: usize,
    pub quote_gas_limit_per_call: u64,
    pub quote_batch_gas_limit: u64,
    pub quote_retries: usize,
    pub quote_retry_min_ms: u64,
    pub quote_retry_max_ms: u64,

    // ========== Output ==========
    /// Append every found route as a JSON line here
    pub quote_log_path: Option<String>,

    // ========== API Keys ==========
    /// Etherscan API key, adds a last-resort gas price source
    pub etherscan_api_key: Option<String>,

    pub routing: RoutingConfig,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Ok(Self {
            rpc_url: env::var("RPC_URL").unwrap_or(defaults.rpc_url),
            chain_id: env_or("CHAIN_ID", defaults.chain_id),
            token_list_path: env::var("TOKEN_LIST_PATH").ok(),
            token_cache_ttl_secs: env_or("TOKEN_CACHE_TTL_SECS", defaults.token_cache_ttl_secs),
            pool_cache_ttl_secs: env_or("POOL_CACHE_TTL_SECS", defaults.pool_cache_ttl_secs),
            gas_price_cache_ttl_secs: env_or("GAS_PRICE_CACHE_TTL_SECS", defaults.gas_price_cache_ttl_secs),
            pool_multicall_chunk: env_or("POOL_MULTICALL_CHUNK", defaults.pool_multicall_chunk),
            exact_out_block_offset: env_or("EXACT_OUT_BLOCK_OFFSET", defaults.exact_out_block_offset),
            route_timeout_ms: env_or("ROUTE_TIMEOUT_MS", defaults.route_timeout_ms),
            quote_multicall_chunk: env_or("QUOTE_MULTICALL_CHUNK", defaults.quote_multicall_chunk),
            quote_gas_limit_per_call: env_or("QUOTE_GAS_LIMIT_PER_CALL", defaults.quote_gas_limit_per_call),
            quote_batch_gas_limit: env_or("QUOTE_BATCH_GAS_LIMIT", defaults.quote_batch_gas_limit),
            quote_retries: env_or("QUOTE_RETRIES", defaults.quote_retries),
            quote_retry_min_ms: env_or("QUOTE_RETRY_MIN_MS", defaults.quote_retry_min_ms),
            quote_retry_max_ms: env_or("QUOTE_RETRY_MAX_MS", defaults.quote_retry_max_ms),
            quote_log_path: env::var("QUOTE_LOG_PATH").ok(),
            etherscan_api_key: env::var("ETHERSCAN_API_KEY").ok(),
            routing: defaults.routing,
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.is_empty() || self.rpc_url.contains("YOUR_API_KEY") {
            return Err(eyre::eyre!("Invalid RPC_URL - please set a valid node URL"));
        }
        if self.pool_multicall_chunk < 2 {
            return Err(eyre::eyre!("POOL_MULTICALL_CHUNK must fit one pool (2 calls)"));
        }
        if self.quote_multicall_chunk == 0 {
            return Err(eyre::eyre!("QUOTE_MULTICALL_CHUNK must be at least 1"));
        }
        if self.quote_gas_limit_per_call == 0 || self.quote_batch_gas_limit < self.quote_gas_limit_per_call {
            return Err(eyre::eyre!(
                "QUOTE_BATCH_GAS_LIMIT ({}) must fit at least one call of QUOTE_GAS_LIMIT_PER_CALL ({})",
                self.quote_batch_gas_limit,
                self.quote_gas_limit_per_call
            ));
        }
        if self.route_timeout_ms == 0 {
            return Err(eyre::eyre!("ROUTE_TIMEOUT_MS must be positive"));
        }
        self.routing.validate()?;
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.quote_retries + 1,
            initial_delay: Duration::from_millis(self.quote_retry_min_ms),
            max_delay: Duration::from_millis(self.quote_retry_max_ms),
        }
    }

    pub fn batcher_config(&self) -> QuoteBatcherConfig {
        QuoteBatcherConfig {
            multicall_chunk: self.quote_multicall_chunk,
            gas_limit_per_call: self.quote_gas_limit_per_call,
            batch_gas_limit: self.quote_batch_gas_limit,
            retry: self.retry_policy(),
        }
    }

    pub fn route_timeout(&self) -> Duration {
        Duration::from_millis(self.route_timeout_ms)
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        let r = &self.routing;
        let s = &r.pool_selection;
        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║              ALPHA ROUTER - CONFIGURATION                  ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ Chain ID:          {:^40} ║", self.chain_id);
        println!("║ Token List:        {:^40} ║", self.token_list_path.as_deref().unwrap_or("built-in"));
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ POOL SELECTION                                             ║");
        println!("║ • topN / direct:   {:^40} ║", format!("{} / {}", s.top_n, s.top_n_direct_swaps));
        println!("║ • in-out / 2nd hop:{:^40} ║", format!("{} / {}", s.top_n_token_in_out, s.top_n_second_hop));
        println!("║ • base each / all: {:^40} ║", format!("{} / {}", s.top_n_with_each_base_token, s.top_n_with_base_token));
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ SPLITTING                                                  ║");
        println!("║ • Max Hops:        {:^40} ║", r.max_swaps_per_path);
        println!("║ • Splits:          {:^40} ║", format!("{}..={}", r.min_splits, r.max_splits));
        println!("║ • Distribution:    {:^40} ║", format!("{}%", r.distribution_percent));
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ QUOTING                                                    ║");
        println!("║ • Pool calls/batch:{:^40} ║", self.pool_multicall_chunk);
        println!("║ • Chunk / gas:     {:^40} ║", format!("{} / {}", self.quote_multicall_chunk, self.quote_gas_limit_per_call));
        println!("║ • Retries:         {:^40} ║", self.quote_retries);
        println!("║ • Timeout:         {:^40} ║", format!("{} ms", self.route_timeout_ms));
        println!("║ • Exact-out lag:   {:^40} ║", format!("{} blocks", self.exact_out_block_offset));
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ GAS ORACLE                                                 ║");
        println!("║ • Etherscan API:   {:^40} ║",
            if self.etherscan_api_key.is_some() { "✓ Configured" } else { "✗ Using RPC" }
        );
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: "https://eth.llamarpc.com".to_string(),
            chain_id: 1,
            token_list_path: None,
            token_cache_ttl_secs: 3600,
            pool_cache_ttl_secs: 60,
            gas_price_cache_ttl_secs: 15,
            pool_multicall_chunk: DEFAULT_POOL_CALLS_PER_BATCH,
            exact_out_block_offset: 10,
            route_timeout_ms: 30_000,
            quote_multicall_chunk: 150,
            quote_gas_limit_per_call: 1_000_000,
            quote_batch_gas_limit: 150_000_000,
            quote_retries: 2,
            quote_retry_min_ms: 25,
            quote_retry_max_ms: 250,
            quote_log_path: None,
            etherscan_api_key: None,
            routing: RoutingConfig::default(),
        }
    }
}

// ============================================
// TESTS
// ============================================
