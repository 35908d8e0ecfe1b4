//! UniswapV3 QuoterV2 - on-chain route quotes
//!
//! Every (route, percentage) pair becomes one `quoteExactInput` /
//! `quoteExactOutput` call on the packed path, batched through Multicall3.
//! A reverted call means "no liquidity for this amount" and comes back as
//! `None`; only transport failures fail the batch.

use crate::chain::{ChainClient, ReadCall};
use crate::error::RouterResult;
use crate::models::TradeType;
use alloy_primitives::{address, Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::trace;

// ============================================
// SOLIDITY INTERFACES
// ============================================

sol! {
    /// Uniswap V3 QuoterV2 interface (path variants)
    #[derive(Debug)]
    interface IQuoterV2 {
        function quoteExactInput(bytes memory path, uint256 amountIn)
            external
            returns (
                uint256 amountOut,
                uint160[] memory sqrtPriceX96AfterList,
                uint32[] memory initializedTicksCrossedList,
                uint256 gasEstimate
            );

        function quoteExactOutput(bytes memory path, uint256 amountOut)
            external
            returns (
                uint256 amountIn,
                uint160[] memory sqrtPriceX96AfterList,
                uint32[] memory initializedTicksCrossedList,
                uint256 gasEstimate
            );
    }
}

/// Official Uniswap V3 QuoterV2 address (mainnet, Optimism, Polygon, Arbitrum)
pub const QUOTER_V2: Address = address!("61fFE014bA17989E743c5F6cB21bF9697530B21e");

// ============================================
// TYPES
// ============================================

/// One quote to take: `amount` through `path` for grid slot `percent`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub route_index: usize,
    pub percent: u32,
    /// Packed V3 path, already oriented for the trade type
    pub path: Bytes,
    pub amount: U256,
}

/// Quoter answer for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteSample {
    /// Output for exact-input, required input for exact-output
    pub amount: U256,
    pub ticks_crossed: u32,
    /// Quoter gas estimate; zero when it did not report one
    pub gas_estimate: u64,
}

#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Quote every request at `block`. The result is aligned with `requests`;
    /// `None` marks a request the pools cannot fill.
    async fn quote_batch(
        &self,
        requests: &[QuoteRequest],
        trade_type: TradeType,
        block: u64,
    ) -> RouterResult<Vec<Option<QuoteSample>>>;
}

// ============================================
// MULTICALL QUOTER
// ============================================

pub struct MulticallQuoteSource {
    client: Arc<dyn ChainClient>,
    quoter: Address,
}

impl MulticallQuoteSource {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self {
            client,
            quoter: QUOTER_V2,
        }
    }

    pub fn with_quoter(mut self, quoter: Address) -> Self {
        self.quoter = quoter;
        self
    }
}

fn encode_quote(request: &QuoteRequest, trade_type: TradeType) -> Vec<u8> {
    match trade_type {
        TradeType::ExactInput => IQuoterV2::quoteExactInputCall {
            path: request.path.clone(),
            amountIn: request.amount,
        }
        .abi_encode(),
        TradeType::ExactOutput => IQuoterV2::quoteExactOutputCall {
            path: request.path.clone(),
            amountOut: request.amount,
        }
        .abi_encode(),
    }
}

/// Decode quoter return data; undecodable data counts as unquotable.
pub fn decode_quote(data: &[u8], trade_type: TradeType) -> Option<QuoteSample> {
    let (amount, ticks, gas) = match trade_type {
        TradeType::ExactInput => {
            let r = IQuoterV2::quoteExactInputCall::abi_decode_returns(data).ok()?;
            (r.amountOut, r.initializedTicksCrossedList, r.gasEstimate)
        }
        TradeType::ExactOutput => {
            let r = IQuoterV2::quoteExactOutputCall::abi_decode_returns(data).ok()?;
            (r.amountIn, r.initializedTicksCrossedList, r.gasEstimate)
        }
    };
    Some(QuoteSample {
        amount,
        ticks_crossed: ticks.iter().sum(),
        gas_estimate: gas.saturating_to::<u64>(),
    })
}

#[async_trait]
impl QuoteSource for MulticallQuoteSource {
    async fn quote_batch(
        &self,
        requests: &[QuoteRequest],
        trade_type: TradeType,
        block: u64,
    ) -> RouterResult<Vec<Option<QuoteSample>>> {
        let calls: Vec<ReadCall> = requests
            .iter()
            .map(|r| ReadCall::new(self.quoter, encode_quote(r, trade_type)))
            .collect();

        let outcomes = self.client.multicall(calls, Some(block)).await?;

        Ok(requests
            .iter()
            .zip(outcomes.iter())
            .map(|(request, outcome)| {
                let sample = outcome.data().and_then(|d| decode_quote(d, trade_type));
                if sample.is_none() {
                    trace!("Route {} @ {}% unquotable", request.route_index, request.percent);
                }
                sample
            })
            .collect())
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_sol_types::SolValue;

    fn encoded_exact_input_return(amount: u64, ticks: Vec<u32>, gas: u64) -> Vec<u8> {
        let prices: Vec<alloy_primitives::aliases::U160> = ticks.iter().map(|_| Default::default()).collect();
        (U256::from(amount), prices, ticks, U256::from(gas)).abi_encode_params()
    }

    #[test]
    fn test_decode_sums_ticks_across_hops() {
        let data = encoded_exact_input_return(1_234, vec![2, 3], 150_000);
        let sample = decode_quote(&data, TradeType::ExactInput).unwrap();
        assert_eq!(sample.amount, U256::from(1_234u64));
        assert_eq!(sample.ticks_crossed, 5);
        assert_eq!(sample.gas_estimate, 150_000);
    }

    #[test]
    fn test_decode_garbage_is_unquotable() {
        assert_eq!(decode_quote(&[1, 2, 3], TradeType::ExactOutput), None);
    }

    #[test]
    fn test_encoding_picks_quoter_function() {
        let request = QuoteRequest {
            route_index: 0,
            percent: 50,
            path: Bytes::from(vec![0u8; 43]),
            amount: U256::from(10u64),
        };
        let exact_in = encode_quote(&request, TradeType::ExactInput);
        let exact_out = encode_quote(&request, TradeType::ExactOutput);
        assert_eq!(exact_in[..4], IQuoterV2::quoteExactInputCall::SELECTOR);
        assert_eq!(exact_out[..4], IQuoterV2::quoteExactOutputCall::SELECTOR);
    }
}
