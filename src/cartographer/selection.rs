//! Candidate Pool Selection
//!
//! Narrows the fetched pools to the handful worth routing through. Each
//! heuristic bucket ranks its pools by liquidity (desc, then address asc)
//! and contributes its top-N, skipping pools an earlier bucket already took.
//!
//! Bucket order:
//! 1. base tokens paired with tokenIn / tokenOut (after the rest when
//!    `top_n_with_base_token_in_set` is set)
//! 2. direct tokenIn/tokenOut pools
//! 3. global top-N
//! 4. pools touching tokenIn, then tokenOut
//! 5. second hops out of the tokenIn / tokenOut pools

use crate::cartographer::pool_provider::{Pool, PoolAccessor};
use crate::config::PoolSelectionConfig;
use crate::tokens::Token;
use alloy_primitives::Address;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::debug;

/// Liquidity desc, address asc
pub fn rank_order(a: &Pool, b: &Pool) -> Ordering {
    b.liquidity.cmp(&a.liquidity).then(a.address.cmp(&b.address))
}

#[derive(Debug, Clone, Default)]
pub struct CandidatePools {
    /// Selected pools in rank order
    pub pools: Vec<Pool>,
    pub by_bucket: Vec<(&'static str, usize)>,
}

struct Selector {
    ranked: Vec<Pool>,
    taken: HashSet<Address>,
    selected: Vec<Pool>,
    by_bucket: Vec<(&'static str, usize)>,
}

impl Selector {
    fn new(pools: &PoolAccessor) -> Self {
        let mut ranked = pools.all();
        ranked.sort_by(rank_order);
        Self {
            ranked,
            taken: HashSet::new(),
            selected: Vec::new(),
            by_bucket: Vec::new(),
        }
    }

    /// Best `n` untaken pools matching `filter`, in rank order.
    fn best(&self, n: usize, filter: impl Fn(&Pool) -> bool) -> Vec<Pool> {
        self.ranked
            .iter()
            .filter(|p| !self.taken.contains(&p.address) && filter(p))
            .take(n)
            .cloned()
            .collect()
    }

    fn add(&mut self, bucket: &'static str, pools: Vec<Pool>) -> Vec<Pool> {
        let mut added = Vec::new();
        for pool in pools {
            if self.taken.insert(pool.address) {
                added.push(pool.clone());
                self.selected.push(pool);
            }
        }
        self.by_bucket.push((bucket, added.len()));
        added
    }

    fn take(&mut self, bucket: &'static str, n: usize, filter: impl Fn(&Pool) -> bool) -> Vec<Pool> {
        let pools = self.best(n, filter);
        self.add(bucket, pools)
    }

    /// Up to `each` pools per base token paired with `token`, capped at `cap` overall.
    fn take_base(&mut self, bucket: &'static str, token: &Token, bases: &[Token], each: usize, cap: usize) {
        let mut pools: Vec<Pool> = bases
            .iter()
            .filter(|b| *b != token)
            .flat_map(|base| self.best(each, |p| p.involves(base) && p.involves(token)))
            .collect();
        pools.sort_by(rank_order);
        pools.truncate(cap);
        self.add(bucket, pools);
    }
}

pub fn select_candidate_pools(
    token_in: &Token,
    token_out: &Token,
    pools: &PoolAccessor,
    base_tokens: &[Token],
    config: &PoolSelectionConfig,
) -> CandidatePools {
    let mut s = Selector::new(pools);

    let base_buckets = |s: &mut Selector| {
        s.take_base(
            "base+tokenIn",
            token_in,
            base_tokens,
            config.top_n_with_each_base_token,
            config.top_n_with_base_token,
        );
        s.take_base(
            "base+tokenOut",
            token_out,
            base_tokens,
            config.top_n_with_each_base_token,
            config.top_n_with_base_token,
        );
    };

    if !config.top_n_with_base_token_in_set {
        base_buckets(&mut s);
    }

    s.take("direct", config.top_n_direct_swaps, |p| {
        p.involves(token_in) && p.involves(token_out)
    });
    s.take("topN", config.top_n, |_| true);

    let in_pools = s.take("tokenIn", config.top_n_token_in_out, |p| p.involves(token_in));
    let out_pools = s.take("tokenOut", config.top_n_token_in_out, |p| p.involves(token_out));

    if config.top_n_second_hop > 0 {
        for (bucket, origin, first_hops) in [
            ("secondHop tokenIn", token_in, &in_pools),
            ("secondHop tokenOut", token_out, &out_pools),
        ] {
            let hop_tokens: Vec<Token> = first_hops.iter().filter_map(|p| p.other(origin).cloned()).collect();
            let mut second = Vec::new();
            for hop in &hop_tokens {
                second.extend(s.best(config.top_n_second_hop, |p| p.involves(hop) && !p.involves(origin)));
            }
            s.add(bucket, second);
        }
    }

    if config.top_n_with_base_token_in_set {
        base_buckets(&mut s);
    }

    let mut selected = s.selected;
    selected.sort_by(rank_order);
    debug!("Candidate pools: {} of {} ({:?})", selected.len(), pools.len(), s.by_bucket);

    CandidatePools {
        pools: selected,
        by_bucket: s.by_bucket,
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartographer::pool_provider::FeeTier;
    use crate::test_support::{dai, pool, usdc, usdt, weth};

    fn addresses(c: &CandidatePools) -> Vec<Address> {
        c.pools.iter().map(|p| p.address).collect()
    }

    #[test]
    fn test_rank_order_breaks_ties_by_address() {
        let a = pool(&usdc(), &weth(), FeeTier::Low, 100);
        let b = pool(&usdc(), &weth(), FeeTier::Medium, 100);
        let c = pool(&usdc(), &weth(), FeeTier::High, 500);
        let mut v = vec![a.clone(), b.clone(), c.clone()];
        v.sort_by(rank_order);
        assert_eq!(v[0], c);
        assert!(v[1].address < v[2].address);
    }

    #[test]
    fn test_direct_bucket_takes_top_liquidity() {
        let pools = PoolAccessor::new(vec![
            pool(&usdc(), &weth(), FeeTier::Lowest, 1),
            pool(&usdc(), &weth(), FeeTier::Low, 1_000),
            pool(&usdc(), &weth(), FeeTier::Medium, 500),
        ]);
        let config = PoolSelectionConfig {
            top_n: 0,
            top_n_token_in_out: 0,
            top_n_second_hop: 0,
            top_n_with_each_base_token: 0,
            top_n_with_base_token: 0,
            top_n_with_base_token_in_set: false,
            top_n_direct_swaps: 2,
        };

        let c = select_candidate_pools(&usdc(), &weth(), &pools, &[], &config);
        let liquidity: Vec<u128> = c.pools.iter().map(|p| p.liquidity).collect();
        assert_eq!(liquidity, vec![1_000, 500]);
    }

    #[test]
    fn test_buckets_do_not_double_count() {
        let direct = pool(&usdc(), &weth(), FeeTier::Low, 1_000);
        let via_dai_in = pool(&usdc(), &dai(), FeeTier::Lowest, 800);
        let via_dai_out = pool(&dai(), &weth(), FeeTier::Medium, 700);
        let pools = PoolAccessor::new(vec![direct.clone(), via_dai_in.clone(), via_dai_out.clone()]);

        let c = select_candidate_pools(&usdc(), &weth(), &pools, &[weth(), dai()], &PoolSelectionConfig::default());
        assert_eq!(
            addresses(&c),
            vec![direct.address, via_dai_in.address, via_dai_out.address]
        );
        let total: usize = c.by_bucket.iter().map(|(_, n)| n).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn test_base_token_cap() {
        let pools = PoolAccessor::new(vec![
            pool(&usdc(), &dai(), FeeTier::Lowest, 900),
            pool(&usdc(), &dai(), FeeTier::Low, 800),
            pool(&usdc(), &usdt(), FeeTier::Lowest, 700),
        ]);
        let config = PoolSelectionConfig {
            top_n: 0,
            top_n_token_in_out: 0,
            top_n_second_hop: 0,
            top_n_with_each_base_token: 2,
            top_n_with_base_token: 2,
            top_n_with_base_token_in_set: false,
            top_n_direct_swaps: 0,
        };
        let c = select_candidate_pools(&usdc(), &weth(), &pools, &[dai(), usdt()], &config);
        let liquidity: Vec<u128> = c.pools.iter().map(|p| p.liquidity).collect();
        assert_eq!(liquidity, vec![900, 800]);
    }

    #[test]
    fn test_second_hop_reaches_past_first_pool() {
        let first = pool(&usdc(), &dai(), FeeTier::Lowest, 900);
        let second = pool(&dai(), &usdt(), FeeTier::Lowest, 50);
        let pools = PoolAccessor::new(vec![first, second.clone()]);
        let mut config = PoolSelectionConfig {
            top_n: 0,
            top_n_token_in_out: 1,
            top_n_second_hop: 0,
            top_n_with_each_base_token: 0,
            top_n_with_base_token: 0,
            top_n_with_base_token_in_set: false,
            top_n_direct_swaps: 0,
        };

        let without = select_candidate_pools(&usdc(), &weth(), &pools, &[], &config);
        assert_eq!(without.pools.len(), 1);

        config.top_n_second_hop = 1;
        let with = select_candidate_pools(&usdc(), &weth(), &pools, &[], &config);
        assert!(addresses(&with).contains(&second.address));
    }
}
