//! SwapRouter Calldata
//!
//! Encodes a split plan for the Uniswap V3 `SwapRouter`: one `exactInput` /
//! `exactOutput` per entry, wrapped in `multicall(bytes[])` when the plan has
//! more than one. ERC-20 in and out only, so `value` is always zero.

use crate::error::{RouterError, RouterResult};
use crate::models::{MethodParameters, SwapParams, SwapRoute, TradeType};
use alloy_primitives::{address, Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};
use tracing::debug;

// ============================================
// CONTRACT ADDRESSES
// ============================================

/// Uniswap V3 SwapRouter (mainnet, Optimism, Polygon, Arbitrum)
pub const SWAP_ROUTER: Address = address!("E592427A0AEce92De3Edee1F18E0157C05861564");

const BPS_DENOMINATOR: u64 = 10_000;

// ============================================
// SOLIDITY INTERFACES
// ============================================

sol! {
    /// Uniswap V3 Router, multi-hop entry points
    interface ISwapRouter {
        struct ExactInputParams {
            bytes path;
            address recipient;
            uint256 deadline;
            uint256 amountIn;
            uint256 amountOutMinimum;
        }

        struct ExactOutputParams {
            bytes path;
            address recipient;
            uint256 deadline;
            uint256 amountOut;
            uint256 amountInMaximum;
        }

        function exactInput(ExactInputParams calldata params)
            external payable returns (uint256 amountOut);

        function exactOutput(ExactOutputParams calldata params)
            external payable returns (uint256 amountIn);

        function multicall(bytes[] calldata data)
            external payable returns (bytes[] memory results);
    }
}

/// Builds executable transaction data for a found route
pub trait CalldataEncoder: Send + Sync {
    fn encode(&self, route: &SwapRoute, params: &SwapParams) -> RouterResult<MethodParameters>;
}

/// `quote * (10000 - bps) / 10000`
pub fn min_amount_out(quote: U256, slippage_bps: u32) -> U256 {
    let keep = BPS_DENOMINATOR.saturating_sub(slippage_bps as u64);
    quote * U256::from(keep) / U256::from(BPS_DENOMINATOR)
}

/// `quote * (10000 + bps) / 10000`
pub fn max_amount_in(quote: U256, slippage_bps: u32) -> U256 {
    quote.saturating_mul(U256::from(BPS_DENOMINATOR + slippage_bps as u64)) / U256::from(BPS_DENOMINATOR)
}

/// Per-entry share of `total`; the rounding remainder goes to the last entry.
pub fn split_amounts(total: U256, percents: &[u32]) -> Vec<U256> {
    let mut amounts: Vec<U256> = percents
        .iter()
        .map(|p| total * U256::from(*p) / U256::from(100u64))
        .collect();
    if let Some(last) = amounts.len().checked_sub(1) {
        let others: U256 = amounts[..last].iter().fold(U256::ZERO, |acc, a| acc + *a);
        amounts[last] = total.saturating_sub(others);
    }
    amounts
}

#[derive(Debug, Clone, Copy)]
pub struct SwapRouterEncoder {
    router: Address,
}

impl Default for SwapRouterEncoder {
    fn default() -> Self {
        Self { router: SWAP_ROUTER }
    }
}

impl SwapRouterEncoder {
    pub fn new(router: Address) -> Self {
        Self { router }
    }
}

impl CalldataEncoder for SwapRouterEncoder {
    fn encode(&self, route: &SwapRoute, params: &SwapParams) -> RouterResult<MethodParameters> {
        let entries = &route.plan.entries;
        if entries.is_empty() {
            return Err(RouterError::NoRouteFound("empty plan has no calldata".to_string()));
        }

        let percents: Vec<u32> = entries.iter().map(|e| e.percent).collect();
        let amounts = split_amounts(route.amount.raw, &percents);
        let deadline = U256::from(params.deadline);

        let calls: Vec<Bytes> = entries
            .iter()
            .zip(amounts)
            .map(|(entry, amount)| {
                let path = entry.route.encoded_path(route.trade_type);
                let quoted = entry.quote.quote(route.trade_type).raw;
                let data = match route.trade_type {
                    TradeType::ExactInput => ISwapRouter::exactInputCall {
                        params: ISwapRouter::ExactInputParams {
                            path,
                            recipient: params.recipient,
                            deadline,
                            amountIn: amount,
                            amountOutMinimum: min_amount_out(quoted, params.slippage_bps),
                        },
                    }
                    .abi_encode(),
                    TradeType::ExactOutput => ISwapRouter::exactOutputCall {
                        params: ISwapRouter::ExactOutputParams {
                            path,
                            recipient: params.recipient,
                            deadline,
                            amountOut: amount,
                            amountInMaximum: max_amount_in(quoted, params.slippage_bps),
                        },
                    }
                    .abi_encode(),
                };
                Bytes::from(data)
            })
            .collect();

        let calldata = match <[Bytes; 1]>::try_from(calls) {
            Ok([single]) => single,
            Err(calls) => Bytes::from(ISwapRouter::multicallCall { data: calls }.abi_encode()),
        };
        debug!("Encoded {} swap(s), {} bytes of calldata", entries.len(), calldata.len());

        Ok(MethodParameters {
            to: self.router,
            calldata,
            value: U256::ZERO,
        })
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartographer::pool_provider::FeeTier;
    use crate::models::{Route, RouteQuote, SplitEntry, SplitPlan};
    use crate::test_support::{dai, pool, usdc, weth};
    use crate::tokens::CurrencyAmount;

    fn entry(route: Route, percent: u32, input: u64, output: u64) -> SplitEntry {
        SplitEntry {
            route,
            percent,
            quote: RouteQuote {
                percent,
                input_amount: CurrencyAmount::from_raw(usdc(), U256::from(input)),
                output_amount: CurrencyAmount::from_raw(weth(), U256::from(output)),
                gas_estimate: 0,
                ticks_crossed: 0,
                gas_cost_in_quote_token: U256::ZERO,
            },
        }
    }

    fn swap_route(trade_type: TradeType, amount: u64, entries: Vec<SplitEntry>) -> SwapRoute {
        let token = match trade_type {
            TradeType::ExactInput => usdc(),
            TradeType::ExactOutput => weth(),
        };
        let quote_token = match trade_type {
            TradeType::ExactInput => weth(),
            TradeType::ExactOutput => usdc(),
        };
        SwapRoute {
            trade_type,
            amount: CurrencyAmount::from_raw(token, U256::from(amount)),
            plan: SplitPlan { entries },
            quote: CurrencyAmount::zero(quote_token.clone()),
            quote_gas_adjusted: CurrencyAmount::zero(quote_token.clone()),
            estimated_gas_used: 0,
            gas_cost_in_quote_token: CurrencyAmount::zero(quote_token),
            gas_cost_usd: None,
            gas_price_wei: 0,
            block_number: 1,
            gas_priced: true,
            method_parameters: None,
        }
    }

    fn params() -> SwapParams {
        SwapParams {
            recipient: address!("00000000000000000000000000000000000000aa"),
            slippage_bps: 50,
            deadline: 1_700_000_000,
        }
    }

    fn direct() -> Route {
        Route::new(vec![pool(&usdc(), &weth(), FeeTier::Low, 1)], usdc(), weth()).unwrap()
    }

    fn via_dai() -> Route {
        Route::new(
            vec![pool(&usdc(), &dai(), FeeTier::Lowest, 1), pool(&dai(), &weth(), FeeTier::Low, 1)],
            usdc(),
            weth(),
        )
        .unwrap()
    }

    #[test]
    fn test_slippage_bounds() {
        assert_eq!(min_amount_out(U256::from(10_000u64), 50), U256::from(9_950u64));
        assert_eq!(max_amount_in(U256::from(10_000u64), 50), U256::from(10_050u64));
        assert_eq!(min_amount_out(U256::from(10_000u64), 20_000), U256::ZERO);
    }

    #[test]
    fn test_remainder_goes_to_last_entry() {
        let amounts = split_amounts(U256::from(101u64), &[50, 25, 25]);
        assert_eq!(amounts, vec![U256::from(50u64), U256::from(25u64), U256::from(26u64)]);
        assert!(split_amounts(U256::from(5u64), &[]).is_empty());
    }

    #[test]
    fn test_single_entry_is_bare_exact_input() {
        let route = swap_route(TradeType::ExactInput, 1_000, vec![entry(direct(), 100, 1_000, 500)]);
        let method = SwapRouterEncoder::default().encode(&route, &params()).unwrap();

        assert_eq!(method.to, SWAP_ROUTER);
        assert_eq!(method.value, U256::ZERO);
        let call = ISwapRouter::exactInputCall::abi_decode(&method.calldata).unwrap();
        assert_eq!(call.params.amountIn, U256::from(1_000u64));
        assert_eq!(call.params.amountOutMinimum, U256::from(497u64));
        assert_eq!(call.params.recipient, params().recipient);
        assert_eq!(call.params.path, direct().encoded_path(TradeType::ExactInput));
    }

    #[test]
    fn test_split_is_wrapped_in_multicall() {
        let route = swap_route(
            TradeType::ExactInput,
            1_001,
            vec![entry(direct(), 60, 600, 300), entry(via_dai(), 40, 400, 199)],
        );
        let method = SwapRouterEncoder::default().encode(&route, &params()).unwrap();

        let multicall = ISwapRouter::multicallCall::abi_decode(&method.calldata).unwrap();
        assert_eq!(multicall.data.len(), 2);
        let second = ISwapRouter::exactInputCall::abi_decode(&multicall.data[1]).unwrap();
        assert_eq!(second.params.amountIn, U256::from(1_001u64 - 600));
        assert_eq!(second.params.path.len(), 20 + 23 * 2);
    }

    #[test]
    fn test_exact_output_caps_input() {
        let route = swap_route(TradeType::ExactOutput, 500, vec![entry(direct(), 100, 1_000, 500)]);
        let method = SwapRouterEncoder::default().encode(&route, &params()).unwrap();

        let call = ISwapRouter::exactOutputCall::abi_decode(&method.calldata).unwrap();
        assert_eq!(call.params.amountOut, U256::from(500u64));
        assert_eq!(call.params.amountInMaximum, U256::from(1_005u64));
        assert_eq!(call.params.path, direct().encoded_path(TradeType::ExactOutput));
    }
}
