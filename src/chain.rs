//! Chain Read Client
//!
//! The only path from the routing core to the node: batched read-only calls
//! through Multicall3, the current block number, and gas price inputs.
//!
//! Every provider takes an `Arc<dyn ChainClient>`, so tests swap in fakes.

use crate::error::{RouterError, RouterResult};
use alloy_eips::{BlockId, BlockNumberOrTag};
use alloy_primitives::{address, Address, Bytes};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, trace};

// ============================================
// MULTICALL3 INTERFACE
// ============================================

sol! {
    /// Multicall3 - deployed at same address on all EVM chains
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls)
            external payable returns (Result[] memory returnData);
    }
}

/// Multicall3 address (same on all EVM chains)
pub const MULTICALL3: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

// ============================================
// TYPES
// ============================================

/// One read-only call inside a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadCall {
    pub target: Address,
    pub call_data: Bytes,
}

impl ReadCall {
    pub fn new(target: Address, call_data: impl Into<Bytes>) -> Self {
        Self {
            target,
            call_data: call_data.into(),
        }
    }
}

/// Per-call result of a batch; a reverted call does not fail the batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    pub success: bool,
    pub return_data: Bytes,
}

impl CallOutcome {
    /// Return data of a successful call that actually returned something.
    pub fn data(&self) -> Option<&Bytes> {
        (self.success && !self.return_data.is_empty()).then_some(&self.return_data)
    }
}

/// Fee history window, oldest block first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeeHistory {
    pub oldest_block: u64,
    /// One entry per block plus the next block's base fee at the end
    pub base_fee_per_gas: Vec<u128>,
    /// Priority fee per requested percentile, one row per block
    pub reward: Vec<Vec<u128>>,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    fn chain_id(&self) -> u64;

    async fn block_number(&self) -> RouterResult<u64>;

    /// Execute `calls` as one batch at `block` (latest when `None`).
    /// Outcomes are returned in call order.
    async fn multicall(&self, calls: Vec<ReadCall>, block: Option<u64>) -> RouterResult<Vec<CallOutcome>>;

    /// Node-suggested legacy gas price in wei.
    async fn gas_price(&self) -> RouterResult<u128>;

    async fn fee_history(
        &self,
        block_count: u64,
        newest_block: u64,
        reward_percentiles: &[f64],
    ) -> RouterResult<FeeHistory>;
}

// ============================================
// JSON-RPC CLIENT
// ============================================

pub struct RpcChainClient {
    rpc_url: String,
    chain_id: u64,
}

impl RpcChainClient {
    pub fn new(rpc_url: String, chain_id: u64) -> Self {
        Self { rpc_url, chain_id }
    }

    fn provider(&self) -> RouterResult<impl Provider> {
        let url = reqwest::Url::parse(&self.rpc_url).map_err(|e| {
            RouterError::Configuration(format!("invalid RPC url '{}': {}", self.rpc_url, e))
        })?;
        Ok(ProviderBuilder::new().connect_http(url))
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn block_number(&self) -> RouterResult<u64> {
        let block = self.provider()?.get_block_number().await?;
        trace!("Current block: {}", block);
        Ok(block)
    }

    async fn multicall(&self, calls: Vec<ReadCall>, block: Option<u64>) -> RouterResult<Vec<CallOutcome>> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let count = calls.len();
        let provider = self.provider()?;

        let calls: Vec<IMulticall3::Call3> = calls
            .into_iter()
            .map(|c| IMulticall3::Call3 {
                target: c.target,
                allowFailure: true,
                callData: c.call_data,
            })
            .collect();
        let calldata = IMulticall3::aggregate3Call { calls }.abi_encode();

        let tx = TransactionRequest::default()
            .to(MULTICALL3)
            .input(calldata.into());

        let block_id = block.map(BlockId::number).unwrap_or_else(BlockId::latest);
        let result = provider.call(tx).block(block_id).await?;

        let decoded = IMulticall3::aggregate3Call::abi_decode_returns(&result)
            .map_err(|e| RouterError::decode("multicall result", e))?;

        if decoded.len() != count {
            return Err(RouterError::decode(
                "multicall result",
                format!("expected {} results, got {}", count, decoded.len()),
            ));
        }

        debug!("Multicall3: {} calls in {:?}", count, start.elapsed());

        Ok(decoded
            .into_iter()
            .map(|r| CallOutcome {
                success: r.success,
                return_data: r.returnData,
            })
            .collect())
    }

    async fn gas_price(&self) -> RouterResult<u128> {
        Ok(self.provider()?.get_gas_price().await?)
    }

    async fn fee_history(
        &self,
        block_count: u64,
        newest_block: u64,
        reward_percentiles: &[f64],
    ) -> RouterResult<FeeHistory> {
        let history = self
            .provider()?
            .get_fee_history(block_count, BlockNumberOrTag::Number(newest_block), reward_percentiles)
            .await?;

        Ok(FeeHistory {
            oldest_block: history.oldest_block,
            base_fee_per_gas: history.base_fee_per_gas,
            reward: history.reward.unwrap_or_default(),
        })
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_outcome_data() {
        let ok = CallOutcome {
            success: true,
            return_data: Bytes::from(vec![1u8, 2, 3]),
        };
        assert_eq!(ok.data().map(|b| b.len()), Some(3));

        let reverted = CallOutcome {
            success: false,
            return_data: Bytes::from(vec![1u8]),
        };
        assert!(reverted.data().is_none());

        let empty = CallOutcome {
            success: true,
            return_data: Bytes::new(),
        };
        assert!(empty.data().is_none());
    }

    #[tokio::test]
    async fn test_invalid_rpc_url_is_configuration_error() {
        let client = RpcChainClient::new("not a url".to_string(), 1);
        let err = client.block_number().await.unwrap_err();
        assert!(matches!(err, RouterError::Configuration(_)));
    }
}
