//! Route Generation
//!
//! Tokens are nodes, candidate pools are undirected edges. Routes are the
//! simple paths (no pool used twice) from tokenIn that stop as soon as they
//! reach tokenOut, at most `max_swaps_per_path` hops long.
//!
//! Edges are walked in candidate rank order, so the same pool set always
//! yields the same routes in the same order.

use crate::cartographer::pool_provider::Pool;
use crate::config::RoutingConfig;
use crate::models::Route;
use crate::tokens::Token;
use alloy_primitives::Address;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Token graph over the candidate pools; edge weight = index into `pools`
pub struct PoolGraph {
    pub graph: UnGraph<Token, usize>,
    pub token_to_node: HashMap<Address, NodeIndex>,
    pools: Vec<Pool>,
}

impl PoolGraph {
    pub fn from_pools(pools: &[Pool]) -> Self {
        let mut graph = Self {
            graph: UnGraph::new_undirected(),
            token_to_node: HashMap::new(),
            pools: pools.to_vec(),
        };

        for (index, pool) in pools.iter().enumerate() {
            let a = graph.get_or_create_node(&pool.token0);
            let b = graph.get_or_create_node(&pool.token1);
            graph.graph.add_edge(a, b, index);
        }

        debug!(
            "Pool graph: {} tokens, {} pools",
            graph.graph.node_count(),
            graph.graph.edge_count()
        );
        graph
    }

    fn get_or_create_node(&mut self, token: &Token) -> NodeIndex {
        if let Some(&node) = self.token_to_node.get(&token.address) {
            return node;
        }
        let node = self.graph.add_node(token.clone());
        self.token_to_node.insert(token.address, node);
        node
    }

    pub fn get_node(&self, token: &Token) -> Option<NodeIndex> {
        self.token_to_node.get(&token.address).copied()
    }

    /// (pool index, neighbour) for every pool touching `node`, best-ranked first.
    fn neighbours(&self, node: NodeIndex) -> Vec<(usize, NodeIndex)> {
        let mut out: Vec<(usize, NodeIndex)> = self
            .graph
            .edges(node)
            .map(|e| {
                let other = if e.source() == node { e.target() } else { e.source() };
                (*e.weight(), other)
            })
            .collect();
        out.sort_by_key(|(index, _)| *index);
        out
    }
}

pub struct RouteGenerator {
    max_swaps_per_path: usize,
    collapse_by_token_path: bool,
}

impl RouteGenerator {
    pub fn new(config: &RoutingConfig) -> Self {
        Self {
            max_swaps_per_path: config.max_swaps_per_path,
            collapse_by_token_path: config.collapse_by_token_path,
        }
    }

    /// All routes from `token_in` to `token_out` through `pools` (rank ordered).
    /// Empty when none exist.
    pub fn generate(&self, token_in: &Token, token_out: &Token, pools: &[Pool]) -> Vec<Route> {
        if token_in == token_out || self.max_swaps_per_path == 0 {
            return Vec::new();
        }

        let graph = PoolGraph::from_pools(pools);
        let (Some(start), Some(end)) = (graph.get_node(token_in), graph.get_node(token_out)) else {
            debug!("{} or {} not in candidate pools", token_in, token_out);
            return Vec::new();
        };

        let mut paths = Vec::new();
        let mut used = vec![false; pools.len()];
        let mut current = Vec::with_capacity(self.max_swaps_per_path);
        self.dfs(&graph, start, end, &mut current, &mut used, &mut paths);

        let mut routes = Vec::with_capacity(paths.len());
        let mut seen_token_paths = HashSet::new();
        for path in paths {
            let route_pools: Vec<Pool> = path.iter().map(|&i| graph.pools[i].clone()).collect();
            match Route::new(route_pools, token_in.clone(), token_out.clone()) {
                Ok(route) => {
                    if self.collapse_by_token_path && !seen_token_paths.insert(route.token_path_key()) {
                        continue;
                    }
                    routes.push(route);
                }
                Err(e) => debug!("Skipping malformed path: {}", e),
            }
        }

        info!(
            "Generated {} routes {} → {} from {} pools (max {} hops)",
            routes.len(),
            token_in,
            token_out,
            pools.len(),
            self.max_swaps_per_path
        );
        routes
    }

    fn dfs(
        &self,
        graph: &PoolGraph,
        node: NodeIndex,
        end: NodeIndex,
        current: &mut Vec<usize>,
        used: &mut [bool],
        out: &mut Vec<Vec<usize>>,
    ) {
        if node == end && !current.is_empty() {
            out.push(current.clone());
            return;
        }
        if current.len() >= self.max_swaps_per_path {
            return;
        }

        for (index, next) in graph.neighbours(node) {
            if used[index] {
                continue;
            }
            used[index] = true;
            current.push(index);
            self.dfs(graph, next, end, current, used, out);
            current.pop();
            used[index] = false;
        }
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

    fn generator(max_hops: usize, collapse: bool) -> RouteGenerator {
        RouteGenerator::new(&RoutingConfig {
            max_swaps_per_path: max_hops,
            collapse_by_token_path: collapse,
            ..RoutingConfig::default()
        })
    }

    fn fixture() -> Vec<Pool> {
        vec![
            pool(&usdc(), &weth(), FeeTier::Low, 1_000),
            pool(&usdc(), &dai(), FeeTier::Lowest, 900),
            pool(&dai(), &weth(), FeeTier::Medium, 800),
            pool(&dai(), &weth(), FeeTier::Low, 700),
            pool(&usdc(), &usdt(), FeeTier::Lowest, 600),
        ]
    }

    #[test]
    fn test_routes_are_simple_bounded_and_connected() {
        let routes = generator(3, false).generate(&usdc(), &weth(), &fixture());
        assert_eq!(routes.len(), 3);
        for route in &routes {
            assert!(route.hops() <= 3);
            assert!(route.pools[0].involves(&usdc()));
            assert!(route.pools.last().unwrap().involves(&weth()));
            let unique: HashSet<Address> = route.pools.iter().map(|p| p.address).collect();
            assert_eq!(unique.len(), route.hops());
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        let a = generator(3, false).generate(&usdc(), &weth(), &fixture());
        let b = generator(3, false).generate(&usdc(), &weth(), &fixture());
        assert_eq!(a, b);
        // direct pool ranks first, so its route is found first
        assert_eq!(a[0].hops(), 1);
    }

    #[test]
    fn test_max_hops_bounds_search() {
        let routes = generator(1, false).generate(&usdc(), &weth(), &fixture());
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].hops(), 1);
    }

    #[test]
    fn test_collapse_keeps_best_fee_tier_path() {
        let routes = generator(3, true).generate(&usdc(), &weth(), &fixture());
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[1].pools[1].fee, FeeTier::Medium);
    }

    #[test]
    fn test_no_path_is_empty_not_error() {
        let pools = vec![pool(&usdc(), &dai(), FeeTier::Low, 1)];
        assert!(generator(3, false).generate(&usdc(), &weth(), &pools).is_empty());
        assert!(generator(3, false).generate(&usdc(), &usdc(), &fixture()).is_empty());
    }

    #[test]
    fn test_two_hop_routes_through_non_base_token() {
        let mut pools = fixture();
        pools.push(pool(&usdt(), &weth(), FeeTier::High, 10));
        let routes = generator(2, false).generate(&usdc(), &weth(), &pools);
        assert!(routes.iter().any(|r| r.path[1] == usdt()));
        assert!(routes.iter().all(|r| r.hops() <= 2));
    }
}
