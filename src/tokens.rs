//! Tokens and exact currency amounts
//!
//! - `Token` identity is (chain id, address); symbol and decimals are metadata
//! - `CurrencyAmount` holds a raw integer amount in the token's smallest unit
//! - Built-in token lists per chain, with the curated base tokens used as
//!   intermediate hops and the wrapped-native / USD references used for gas pricing

use crate::error::{RouterError, RouterResult};
use alloy_primitives::{address, Address, U256};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

pub const CHAIN_MAINNET: u64 = 1;
pub const CHAIN_OPTIMISM: u64 = 10;
pub const CHAIN_POLYGON: u64 = 137;
pub const CHAIN_ARBITRUM: u64 = 42161;

/// A token on a specific chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub chain_id: u64,
    pub address: Address,
    pub decimals: u8,
    pub symbol: String,
}

impl Token {
    pub fn new(chain_id: u64, address: Address, decimals: u8, symbol: impl Into<String>) -> Self {
        Self {
            chain_id,
            address,
            decimals,
            symbol: symbol.into(),
        }
    }

    /// Pool token ordering: token0 is the lower address.
    pub fn sorts_before(&self, other: &Token) -> bool {
        self.address < other.address
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.chain_id == other.chain_id && self.address == other.address
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.chain_id.hash(state);
        self.address.hash(state);
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

// ============================================
// CURRENCY AMOUNT
// ============================================

/// An exact amount of a token, in its smallest unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyAmount {
    pub token: Token,
    pub raw: U256,
}

impl CurrencyAmount {
    pub fn from_raw(token: Token, raw: U256) -> Self {
        Self { token, raw }
    }

    pub fn zero(token: Token) -> Self {
        Self::from_raw(token, U256::ZERO)
    }

    /// Parse a human decimal string ("10000", "0.25") into raw units.
    /// More fractional digits than the token has decimals is an error, never a rounding.
    pub fn parse(token: Token, value: &str) -> RouterResult<Self> {
        let value = value.trim();
        let (whole, frac) = match value.split_once('.') {
            Some((w, f)) => (w, f),
            None => (value, ""),
        };

        let is_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !is_digits(whole) || !is_digits(frac) {
            return Err(RouterError::Configuration(format!(
                "invalid amount '{}' for {}",
                value, token.symbol
            )));
        }
        if frac.len() > token.decimals as usize {
            return Err(RouterError::Configuration(format!(
                "amount '{}' has more than {} decimals for {}",
                value, token.decimals, token.symbol
            )));
        }

        let mut digits = String::with_capacity(whole.len() + token.decimals as usize);
        digits.push_str(whole);
        digits.push_str(frac);
        for _ in frac.len()..token.decimals as usize {
            digits.push('0');
        }
        let digits = digits.trim_start_matches('0');

        let raw = if digits.is_empty() {
            U256::ZERO
        } else {
            U256::from_str_radix(digits, 10).map_err(|e| {
                RouterError::Configuration(format!("amount '{}' out of range: {}", value, e))
            })?
        };

        Ok(Self::from_raw(token, raw))
    }

    pub fn is_zero(&self) -> bool {
        self.raw.is_zero()
    }

    /// `percent` of this amount, rounded down.
    pub fn percent(&self, percent: u32) -> Self {
        let raw = self.raw * U256::from(percent) / U256::from(100u64);
        Self::from_raw(self.token.clone(), raw)
    }

    /// Full-precision decimal representation, trailing zeros trimmed.
    pub fn to_exact(&self) -> String {
        let digits = self.raw.to_string();
        let decimals = self.token.decimals as usize;
        if decimals == 0 {
            return digits;
        }

        let padded = if digits.len() <= decimals {
            format!("{}{}", "0".repeat(decimals - digits.len() + 1), digits)
        } else {
            digits
        };
        let (whole, frac) = padded.split_at(padded.len() - decimals);
        let frac = frac.trim_end_matches('0');
        if frac.is_empty() {
            whole.to_string()
        } else {
            format!("{}.{}", whole, frac)
        }
    }

    /// Decimal representation truncated to `places` fractional digits.
    pub fn to_fixed(&self, places: usize) -> String {
        let exact = self.to_exact();
        match exact.split_once('.') {
            Some((whole, _)) if places == 0 => whole.to_string(),
            Some((whole, frac)) => {
                let mut frac: String = frac.chars().take(places).collect();
                while frac.len() < places {
                    frac.push('0');
                }
                format!("{}.{}", whole, frac)
            }
            None if places == 0 => exact,
            None => format!("{}.{}", exact, "0".repeat(places)),
        }
    }
}

impl fmt::Display for CurrencyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_exact(), self.token.symbol)
    }
}

// ============================================
// BUILT-IN TOKEN LISTS
// ============================================

/// What a listed token is used for during routing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRole {
    /// Wrapped native token, used to price gas
    WrappedNative,
    /// Base token that is also the USD reference for gas reporting
    UsdReference,
    /// High-liquidity intermediate hop
    Base,
    /// Plain listed token
    Listed,
}

struct ListedToken {
    chain_id: u64,
    symbol: &'static str,
    address: Address,
    decimals: u8,
    role: TokenRole,
}

macro_rules! listed {
    ($chain:expr, $symbol:literal, $address:literal, $decimals:literal, $role:ident) => {
        ListedToken {
            chain_id: $chain,
            symbol: $symbol,
            address: address!($address),
            decimals: $decimals,
            role: TokenRole::$role,
        }
    };
}

lazy_static! {
    static ref DEFAULT_TOKENS: Vec<ListedToken> = vec![
        // Mainnet
        listed!(CHAIN_MAINNET, "WETH", "C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2", 18, WrappedNative),
        listed!(CHAIN_MAINNET, "USDC", "A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", 6, UsdReference),
        listed!(CHAIN_MAINNET, "USDT", "dAC17F958D2ee523a2206206994597C13D831ec7", 6, Base),
        listed!(CHAIN_MAINNET, "DAI", "6B175474E89094C44Da98b954EedcdeCB5BE3830", 18, Base),
        listed!(CHAIN_MAINNET, "WBTC", "2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599", 8, Base),
        listed!(CHAIN_MAINNET, "wstETH", "7f39C581F595B53c5cb19bD0b3f8dA6c935E2Ca0", 18, Listed),
        listed!(CHAIN_MAINNET, "LINK", "514910771AF9Ca656af840dff83E8264EcF986CA", 18, Listed),
        listed!(CHAIN_MAINNET, "UNI", "1f9840a85d5aF5bf1D1762F925BDADdC4201F984", 18, Listed),
        listed!(CHAIN_MAINNET, "AAVE", "7Fc66500c84A76Ad7e9c93437bFc5Ac33E2DDaE9", 18, Listed),
        listed!(CHAIN_MAINNET, "MKR", "9f8F72aA9304c8B593d555F12eF6589cC3A579A2", 18, Listed),
        listed!(CHAIN_MAINNET, "PEPE", "6982508145454Ce325dDbE47a25d4ec3d2311933", 18, Listed),
        // Optimism
        listed!(CHAIN_OPTIMISM, "WETH", "4200000000000000000000000000000000000006", 18, WrappedNative),
        listed!(CHAIN_OPTIMISM, "USDC", "0b2C639c533813f4Aa9D7837CAf62653d097Ff85", 6, UsdReference),
        listed!(CHAIN_OPTIMISM, "USDT", "94b008aA00579c1307B0EF2c499aD98a8ce58e58", 6, Base),
        listed!(CHAIN_OPTIMISM, "DAI", "DA10009cBd5D07dd0CeCc66161FC93D7c9000da1", 18, Base),
        // Polygon
        listed!(CHAIN_POLYGON, "WMATIC", "0d500B1d8E8eF31E21C99d1Db9A6444d3ADf1270", 18, WrappedNative),
        listed!(CHAIN_POLYGON, "USDC", "2791Bca1f2de4661ED88A30C99A7a9449Aa84174", 6, UsdReference),
        listed!(CHAIN_POLYGON, "WETH", "7ceB23fD6bC0adD59E62ac25578270cFf1b9f619", 18, Base),
        listed!(CHAIN_POLYGON, "USDT", "c2132D05D31c914a87C6611C10748AEb04B58e8F", 6, Base),
        listed!(CHAIN_POLYGON, "DAI", "8f3Cf7ad23Cd3CaDbD9735AFf958023239c6A063", 18, Base),
        // Arbitrum One
        listed!(CHAIN_ARBITRUM, "WETH", "82aF49447D8a07e3bd95BD0d56f35241523fBab1", 18, WrappedNative),
        listed!(CHAIN_ARBITRUM, "USDC", "af88d065e77c8cC2239327C5EDb3A432268e5831", 6, UsdReference),
        listed!(CHAIN_ARBITRUM, "USDT", "Fd086bC7CD5C481DCC9C85ebE478A1C0b69FCbb9", 6, Base),
        listed!(CHAIN_ARBITRUM, "DAI", "DA10009cBd5D07dd0CeCc66161FC93D7c9000da1", 18, Base),
        listed!(CHAIN_ARBITRUM, "WBTC", "2f2a2543B76A4166549F7aaB2e75Bef0aefC5B0f", 8, Base),
    ];
}

impl ListedToken {
    fn to_token(&self) -> Token {
        Token::new(self.chain_id, self.address, self.decimals, self.symbol)
    }
}

/// The built-in token list for a chain (empty for unknown chains).
pub fn default_token_list(chain_id: u64) -> Vec<Token> {
    DEFAULT_TOKENS
        .iter()
        .filter(|t| t.chain_id == chain_id)
        .map(ListedToken::to_token)
        .collect()
}

/// Intermediate-hop tokens for a chain, wrapped native first.
pub fn base_tokens(chain_id: u64) -> Vec<Address> {
    DEFAULT_TOKENS
        .iter()
        .filter(|t| t.chain_id == chain_id && t.role != TokenRole::Listed)
        .map(|t| t.address)
        .collect()
}

pub fn wrapped_native(chain_id: u64) -> Option<Address> {
    role_address(chain_id, TokenRole::WrappedNative)
}

pub fn usd_reference(chain_id: u64) -> Option<Address> {
    role_address(chain_id, TokenRole::UsdReference)
}

fn role_address(chain_id: u64, role: TokenRole) -> Option<Address> {
    DEFAULT_TOKENS
        .iter()
        .find(|t| t.chain_id == chain_id && t.role == role)
        .map(|t| t.address)
}

/// Native currency symbol for a chain; routed through its wrapped token.
pub fn native_symbol(chain_id: u64) -> &'static str {
    match chain_id {
        CHAIN_POLYGON => "MATIC",
        _ => "ETH",
    }
}

/// Symbol → token lookup over a list, case-insensitive.
pub fn index_by_symbol(tokens: &[Token]) -> HashMap<String, Token> {
    tokens
        .iter()
        .map(|t| (t.symbol.to_uppercase(), t.clone()))
        .collect()
}

// ============================================
// TESTS
// ============================================
