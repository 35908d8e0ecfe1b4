//! Split Optimizer
//!
//! Chooses how to spread 100% of the trade over the quoted routes.
//!
//! 100% is cut into `100 / distribution_percent` units. A knapsack-style DP
//! over (routes considered, routes used, units consumed) picks, per route,
//! either nothing or one block of units, maximizing the summed net value.
//! Net value is quote minus gas for exact-input and minus (input + gas) for
//! exact-output, so both directions maximize.
//!
//! Tie-breaks: fewer routes first, then the combination reached first in
//! route (generator) order. Only strict improvements replace a DP cell.

use crate::config::RoutingConfig;
use crate::error::{RouterError, RouterResult};
use crate::models::{RouteQuote, RouteWithQuotes, SplitEntry, SplitPlan, TradeType};
use alloy_primitives::U256;
use std::cmp::Ordering;
use tracing::{debug, info};

// ============================================
// NET VALUE
// ============================================

/// `gain - cost`, kept as two unsigned halves so it can go negative
#[derive(Debug, Clone, Copy, Default)]
pub struct NetValue {
    pub gain: U256,
    pub cost: U256,
}

impl NetValue {
    pub fn new(gain: U256, cost: U256) -> Self {
        Self { gain, cost }
    }

    pub fn of_quote(quote: &RouteQuote, trade_type: TradeType) -> Self {
        match trade_type {
            TradeType::ExactInput => Self::new(quote.output_amount.raw, quote.gas_cost_in_quote_token),
            TradeType::ExactOutput => Self::new(
                U256::ZERO,
                quote.input_amount.raw.saturating_add(quote.gas_cost_in_quote_token),
            ),
        }
    }

    fn plus(self, other: NetValue) -> NetValue {
        NetValue {
            gain: self.gain.saturating_add(other.gain),
            cost: self.cost.saturating_add(other.cost),
        }
    }
}

impl Ord for NetValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.gain
            .saturating_add(other.cost)
            .cmp(&other.gain.saturating_add(self.cost))
    }
}

impl PartialOrd for NetValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for NetValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for NetValue {}

/// `curve[u - 1]` = value of giving this route `u` units; `None` = unquotable
pub type Curve = Vec<Option<NetValue>>;

// ============================================
// DOMINANCE PRUNING
// ============================================

/// `a` is at least as good as `b` wherever `b` is usable, and better somewhere.
fn dominates(a: &Curve, b: &Curve) -> bool {
    let mut strictly = false;
    for (va, vb) in a.iter().zip(b.iter()) {
        match (va, vb) {
            (_, None) => {}
            (None, Some(_)) => return false,
            (Some(x), Some(y)) => match x.cmp(y) {
                Ordering::Less => return false,
                Ordering::Greater => strictly = true,
                Ordering::Equal => {}
            },
        }
    }
    strictly
}

/// Indices of curves worth keeping. A curve is dropped only when at least
/// `max_splits` others dominate it: any plan using it then has an unused
/// dominator to swap in, so the optimum is unchanged.
pub fn prune_dominated(curves: &[Curve], max_splits: usize) -> Vec<usize> {
    (0..curves.len())
        .filter(|&i| {
            let dominators = (0..curves.len())
                .filter(|&j| j != i && dominates(&curves[j], &curves[i]))
                .count();
            dominators < max_splits.max(1)
        })
        .collect()
}

// ============================================
// DYNAMIC PROGRAM
// ============================================

/// Best allocation of all `units` across `curves` using between `min_splits`
/// and `max_splits` curves. Returns `(curve index, units)` in curve order.
pub fn optimize_curves(curves: &[Curve], units: usize, min_splits: usize, max_splits: usize) -> Option<Vec<(usize, usize)>> {
    let n = curves.len();
    let k_max = max_splits.min(n).min(units);
    if n == 0 || units == 0 || min_splits > k_max {
        return None;
    }

    // best[i][k][u]: first i curves, k used, u units consumed
    let mut best = vec![vec![vec![None::<NetValue>; units + 1]; k_max + 1]; n + 1];
    // take[i][k][u]: units given to curve i-1 on the best path (0 = skipped)
    let mut take = vec![vec![vec![0usize; units + 1]; k_max + 1]; n + 1];
    best[0][0][0] = Some(NetValue::default());

    for i in 1..=n {
        let curve = &curves[i - 1];
        for k in 0..=k_max {
            for u in 0..=units {
                let mut cell = best[i - 1][k][u];
                let mut choice = 0;
                if k > 0 {
                    for a in 1..=u.min(curve.len()) {
                        let (Some(prev), Some(value)) = (best[i - 1][k - 1][u - a], curve[a - 1]) else {
                            continue;
                        };
                        let candidate = prev.plus(value);
                        if cell.map_or(true, |c| candidate > c) {
                            cell = Some(candidate);
                            choice = a;
                        }
                    }
                }
                best[i][k][u] = cell;
                take[i][k][u] = choice;
            }
        }
    }

    let mut chosen: Option<(usize, NetValue)> = None;
    for k in min_splits.max(1)..=k_max {
        if let Some(value) = best[n][k][units] {
            if chosen.map_or(true, |(_, c)| value > c) {
                chosen = Some((k, value));
            }
        }
    }
    let (mut k, _) = chosen?;

    let mut u = units;
    let mut allocation = Vec::with_capacity(k);
    for i in (1..=n).rev() {
        let a = take[i][k][u];
        if a > 0 {
            allocation.push((i - 1, a));
            k -= 1;
            u -= a;
        }
    }
    allocation.reverse();
    Some(allocation)
}

// ============================================
// OPTIMIZER
// ============================================

pub struct SplitOptimizer {
    min_splits: usize,
    max_splits: usize,
    distribution_percent: u32,
}

impl SplitOptimizer {
    pub fn new(config: &RoutingConfig) -> Self {
        Self {
            min_splits: config.min_splits,
            max_splits: config.effective_max_splits(),
            distribution_percent: config.distribution_percent,
        }
    }

    fn curve(&self, route: &RouteWithQuotes, units: usize, trade_type: TradeType) -> Curve {
        (1..=units)
            .map(|u| {
                route
                    .quotes
                    .get(&(u as u32 * self.distribution_percent))
                    .map(|q| NetValue::of_quote(q, trade_type))
            })
            .collect()
    }

    /// Gas-adjusted best split. `NoRouteFound` when no combination covers 100%.
    pub fn optimize(&self, routes: &[RouteWithQuotes], trade_type: TradeType) -> RouterResult<SplitPlan> {
        let units = (100 / self.distribution_percent.max(1)) as usize;
        let curves: Vec<Curve> = routes.iter().map(|r| self.curve(r, units, trade_type)).collect();

        let kept = prune_dominated(&curves, self.max_splits);
        debug!("Optimizer: {} routes, {} after dominance pruning, {} units", routes.len(), kept.len(), units);

        let kept_curves: Vec<Curve> = kept.iter().map(|&i| curves[i].clone()).collect();
        let allocation = optimize_curves(&kept_curves, units, self.min_splits, self.max_splits).ok_or_else(|| {
            RouterError::NoRouteFound(format!(
                "no combination of {}..={} routes covers 100% in {}% steps",
                self.min_splits, self.max_splits, self.distribution_percent
            ))
        })?;

        let mut entries = Vec::with_capacity(allocation.len());
        for (kept_index, a) in allocation {
            let route = &routes[kept[kept_index]];
            let percent = a as u32 * self.distribution_percent;
            let quote = route.quotes.get(&percent).cloned().ok_or_else(|| {
                RouterError::NoRouteFound(format!("route lost its {}% quote", percent))
            })?;
            entries.push(SplitEntry {
                route: route.route.clone(),
                percent,
                quote,
            });
        }

        let plan = SplitPlan { entries };
        info!(
            "Best split: {}",
            plan.entries
                .iter()
                .map(|e| format!("{}% {}", e.percent, e.route))
                .collect::<Vec<_>>()
                .join(" | ")
        );
        Ok(plan)
    }
}

// ============================================
// TESTS
// ============================================
