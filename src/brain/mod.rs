//! Split selection over quote curves

pub mod split_optimizer;

pub use split_optimizer::{NetValue, SplitOptimizer};
