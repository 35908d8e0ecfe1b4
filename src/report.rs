//! Route Summaries
//!
//! What the CLI prints for a found route, either styled for a terminal or as
//! one JSON object (`--debugJSON`). Summaries can also be appended to a
//! JSON-lines quote log.

use crate::models::{RouteOutcome, SwapRoute, TradeType};
use chrono::{DateTime, Utc};
use color_eyre::eyre::Result;
use console::style;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteLine {
    pub percent: u32,
    pub route: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub timestamp: DateTime<Utc>,
    pub trade_type: String,
    pub amount: String,
    pub best_route: Vec<RouteLine>,
    pub raw_quote: String,
    pub gas_adjusted_quote: String,
    pub gas_used_quote_token: String,
    pub gas_used_usd: Option<String>,
    /// False when gas could not be valued in the quote token
    pub gas_priced: bool,
    pub calldata: Option<String>,
    pub value: Option<String>,
    pub block_number: u64,
    pub estimated_gas_used: u64,
    pub gas_price_wei: u128,
}

impl RouteSummary {
    pub fn from_route(route: &SwapRoute) -> Self {
        let trade_type = match route.trade_type {
            TradeType::ExactInput => "exactIn",
            TradeType::ExactOutput => "exactOut",
        };
        Self {
            timestamp: Utc::now(),
            trade_type: trade_type.to_string(),
            amount: route.amount.to_string(),
            best_route: route
                .plan
                .entries
                .iter()
                .map(|e| RouteLine {
                    percent: e.percent,
                    route: e.route.to_string(),
                })
                .collect(),
            raw_quote: route.quote.to_fixed(6),
            gas_adjusted_quote: route.quote_gas_adjusted.to_fixed(6),
            gas_used_quote_token: route.gas_cost_in_quote_token.to_fixed(6),
            gas_used_usd: route.gas_cost_usd.as_ref().map(|usd| usd.to_fixed(6)),
            gas_priced: route.gas_priced,
            calldata: route
                .method_parameters
                .as_ref()
                .map(|m| format!("0x{}", hex::encode(&m.calldata))),
            value: route.method_parameters.as_ref().map(|m| m.value.to_string()),
            block_number: route.block_number,
            estimated_gas_used: route.estimated_gas_used,
            gas_price_wei: route.gas_price_wei,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn print(&self) {
        println!();
        println!("{}", style("Best Route:").green().bold());
        for line in &self.best_route {
            println!("  {} = {}", style(format!("{}%", line.percent)).cyan(), line.route);
        }
        println!();
        println!("{:<24}{}", "Raw Quote:", style(&self.raw_quote).bold());
        println!("{:<24}{}", "Gas Adjusted Quote:", style(&self.gas_adjusted_quote).bold());
        if self.gas_priced {
            println!("{:<24}{}", "Gas Used Quote Token:", self.gas_used_quote_token);
        } else {
            println!(
                "{:<24}{} {}",
                "Gas Used Quote Token:",
                self.gas_used_quote_token,
                style("(not priced: no native pool)").yellow()
            );
        }
        println!(
            "{:<24}{}",
            "Gas Used USD:",
            self.gas_used_usd.as_deref().unwrap_or("n/a")
        );
        println!("{:<24}{}", "Calldata:", self.calldata.as_deref().unwrap_or("n/a"));
        println!("{:<24}{}", "Value:", self.value.as_deref().unwrap_or("n/a"));
        println!();
        println!(
            "  blockNumber: {}  estimatedGasUsed: {}  gasPriceWei: {}",
            style(self.block_number).dim(),
            style(self.estimated_gas_used).dim(),
            style(self.gas_price_wei).dim()
        );
    }

    /// Append as one JSON line, creating parent directories as needed.
    pub fn append_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", serde_json::to_string(self)?)?;
        Ok(())
    }
}

/// Prints a routing outcome the way the CLI reports it.
pub fn print_outcome(outcome: &RouteOutcome, json: bool) -> Result<()> {
    match outcome {
        RouteOutcome::Found(route) => {
            let summary = RouteSummary::from_route(route);
            if json {
                println!("{}", summary.to_json()?);
            } else {
                summary.print();
            }
        }
        RouteOutcome::NoRoute { reason } => {
            if json {
                println!("{}", serde_json::json!({ "noRoute": reason }));
            } else {
                println!("{} {}", style("✗ No route found:").red().bold(), reason);
            }
        }
    }
    Ok(())
}
