//! Transaction data for a found route

pub mod calldata;

pub use calldata::{CalldataEncoder, SwapRouterEncoder, SWAP_ROUTER};
