//! Token Metadata Provider
//!
//! Static list first, on-chain `decimals()` / `symbol()` only for addresses the
//! list misses, all behind a TTL cache (≈1h).

use crate::cache::TtlCache;
use crate::chain::{ChainClient, ReadCall};
use crate::error::{RouterError, RouterResult};
use crate::retry::{retry_async, RetryPolicy};
use crate::tokens::{default_token_list, index_by_symbol, Token};
use alloy_primitives::{Address, B256};
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

sol! {
    interface IERC20Metadata {
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
    }

    /// Pre-standard tokens (MKR, SAI) return symbol as bytes32
    interface IERC20Bytes32Symbol {
        function symbol() external view returns (bytes32);
    }
}

/// Resolved tokens for a request
#[derive(Debug, Clone, Default)]
pub struct TokenAccessor {
    by_address: HashMap<Address, Token>,
}

impl TokenAccessor {
    pub fn new(tokens: impl IntoIterator<Item = Token>) -> Self {
        Self {
            by_address: tokens.into_iter().map(|t| (t.address, t)).collect(),
        }
    }

    pub fn get(&self, address: &Address) -> Option<&Token> {
        self.by_address.get(address)
    }

    pub fn get_by_symbol(&self, symbol: &str) -> Option<&Token> {
        self.by_address
            .values()
            .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
    }

    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.by_address.values()
    }

    /// Requested addresses this accessor could not resolve, in request order.
    pub fn missing(&self, requested: &[Address]) -> Vec<Address> {
        requested
            .iter()
            .filter(|a| !self.by_address.contains_key(*a))
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Resolve what this source knows; unknown addresses are left out.
    async fn get_tokens(&self, addresses: &[Address]) -> RouterResult<TokenAccessor>;
}

// ============================================
// STATIC LIST
// ============================================

#[derive(Debug, Deserialize)]
struct TokenListFile {
    tokens: Vec<TokenListEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenListEntry {
    chain_id: u64,
    address: Address,
    decimals: u8,
    symbol: String,
}

pub struct TokenListProvider {
    chain_id: u64,
    tokens: Vec<Token>,
}

impl TokenListProvider {
    pub fn new(chain_id: u64, tokens: Vec<Token>) -> Self {
        let tokens = tokens.into_iter().filter(|t| t.chain_id == chain_id).collect();
        Self { chain_id, tokens }
    }

    /// The built-in list for `chain_id`.
    pub fn default_for_chain(chain_id: u64) -> Self {
        Self::new(chain_id, default_token_list(chain_id))
    }

    /// A Uniswap token-list document (`{"tokens": [...]}`).
    pub fn from_json(chain_id: u64, json: &str) -> RouterResult<Self> {
        let list: TokenListFile = serde_json::from_str(json)
            .map_err(|e| RouterError::Configuration(format!("invalid token list: {}", e)))?;
        let tokens = list
            .tokens
            .into_iter()
            .map(|e| Token::new(e.chain_id, e.address, e.decimals, e.symbol))
            .collect();
        Ok(Self::new(chain_id, tokens))
    }

    pub fn from_file<P: AsRef<Path>>(chain_id: u64, path: P) -> RouterResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            RouterError::Configuration(format!("cannot read token list {}: {}", path.display(), e))
        })?;
        let provider = Self::from_json(chain_id, &json)?;
        info!("Loaded {} tokens for chain {} from {}", provider.tokens.len(), chain_id, path.display());
        Ok(provider)
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Case-insensitive symbol lookup.
    pub fn by_symbol(&self, symbol: &str) -> Option<Token> {
        index_by_symbol(&self.tokens).remove(&symbol.to_uppercase())
    }
}

#[async_trait]
impl TokenProvider for TokenListProvider {
    async fn get_tokens(&self, addresses: &[Address]) -> RouterResult<TokenAccessor> {
        let wanted: HashSet<&Address> = addresses.iter().collect();
        Ok(TokenAccessor::new(
            self.tokens.iter().filter(|t| wanted.contains(&t.address)).cloned(),
        ))
    }
}

// ============================================
// ON-CHAIN
// ============================================

pub struct OnChainTokenProvider {
    client: Arc<dyn ChainClient>,
    retry: RetryPolicy,
}

impl OnChainTokenProvider {
    pub fn new(client: Arc<dyn ChainClient>, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }
}

fn decode_symbol(data: &[u8]) -> Option<String> {
    if let Ok(symbol) = IERC20Metadata::symbolCall::abi_decode_returns(data) {
        return Some(symbol);
    }
    let raw: B256 = IERC20Bytes32Symbol::symbolCall::abi_decode_returns(data).ok()?;
    let trimmed: Vec<u8> = raw.iter().copied().take_while(|b| *b != 0).collect();
    String::from_utf8(trimmed).ok().filter(|s| !s.is_empty())
}

#[async_trait]
impl TokenProvider for OnChainTokenProvider {
    async fn get_tokens(&self, addresses: &[Address]) -> RouterResult<TokenAccessor> {
        if addresses.is_empty() {
            return Ok(TokenAccessor::default());
        }

        let mut calls = Vec::with_capacity(addresses.len() * 2);
        for address in addresses {
            calls.push(ReadCall::new(*address, IERC20Metadata::decimalsCall {}.abi_encode()));
            calls.push(ReadCall::new(*address, IERC20Metadata::symbolCall {}.abi_encode()));
        }

        let results = retry_async("token metadata multicall", &self.retry, |_| {
            self.client.multicall(calls.clone(), None)
        })
        .await?;

        let chain_id = self.client.chain_id();
        let mut tokens = Vec::new();
        for (i, address) in addresses.iter().enumerate() {
            let decimals = results
                .get(i * 2)
                .and_then(|r| r.data())
                .and_then(|d| IERC20Metadata::decimalsCall::abi_decode_returns(d).ok());
            let Some(decimals) = decimals else {
                debug!("No decimals() for {:?}", address);
                continue;
            };
            let symbol = results
                .get(i * 2 + 1)
                .and_then(|r| r.data())
                .and_then(|d| decode_symbol(d))
                .unwrap_or_else(|| "UNKNOWN".to_string());

            tokens.push(Token::new(chain_id, *address, decimals, symbol));
        }

        debug!("Resolved {}/{} tokens on-chain", tokens.len(), addresses.len());
        Ok(TokenAccessor::new(tokens))
    }
}

// ============================================
// CACHE + FALLBACK
// ============================================

pub struct CachingTokenProviderWithFallback {
    cache: Arc<TtlCache<Address, Token>>,
    primary: Arc<dyn TokenProvider>,
    fallback: Arc<dyn TokenProvider>,
}

impl CachingTokenProviderWithFallback {
    pub fn new(
        cache: Arc<TtlCache<Address, Token>>,
        primary: Arc<dyn TokenProvider>,
        fallback: Arc<dyn TokenProvider>,
    ) -> Self {
        Self { cache, primary, fallback }
    }
}

#[async_trait]
impl TokenProvider for CachingTokenProviderWithFallback {
    /// Fails with `UnknownToken` if any address resolves nowhere.
    async fn get_tokens(&self, addresses: &[Address]) -> RouterResult<TokenAccessor> {
        let mut unique = Vec::new();
        let mut seen = HashSet::new();
        for address in addresses {
            if seen.insert(*address) {
                unique.push(*address);
            }
        }

        let mut found: HashMap<Address, Token> = self.cache.get_many(unique.iter()).await;
        let mut fresh = Vec::new();

        let missing: Vec<Address> = unique.iter().filter(|a| !found.contains_key(*a)).copied().collect();
        if !missing.is_empty() {
            let listed = self.primary.get_tokens(&missing).await?;
            fresh.extend(listed.tokens().cloned());

            let still_missing = listed.missing(&missing);
            if !still_missing.is_empty() {
                debug!("{} token(s) not in list, trying on-chain", still_missing.len());
                let on_chain = self.fallback.get_tokens(&still_missing).await?;
                fresh.extend(on_chain.tokens().cloned());
            }
        }

        if !fresh.is_empty() {
            self.cache.insert_many(fresh.iter().map(|t| (t.address, t.clone()))).await;
            found.extend(fresh.into_iter().map(|t| (t.address, t)));
        }

        let accessor = TokenAccessor::new(found.into_values());
        let unknown = accessor.missing(&unique);
        if !unknown.is_empty() {
            warn!("Unresolvable token(s): {:?}", unknown);
            return Err(RouterError::UnknownToken(unknown));
        }
        Ok(accessor)
    }
}

// ============================================
// TESTS
// ============================================
