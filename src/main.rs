//! Alpha Router CLI
//!
//! Run with: cargo run -- --tokenIn USDC --tokenOut ETH --amount 1000 --exactIn
//!
//! Settings come from the environment (`.env` supported) or `--config`;
//! routing flags override the routing section.

use alloy_primitives::Address;
use alpha_router::cartographer::{TokenListProvider, TokenProvider};
use alpha_router::report::print_outcome;
use alpha_router::report::RouteSummary;
use alpha_router::tokens::{native_symbol, wrapped_native};
use alpha_router::{
    AlphaRouter, Config, CurrencyAmount, LegacyRouter, RouteOutcome, RouteRequest, RouterContext, RouterError,
    RoutingConfig, SwapParams, SwapRouter, Token, TradeType,
};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use color_eyre::eyre::{eyre, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RouterKind {
    Alpha,
    Legacy,
}

#[derive(Parser, Debug)]
#[command(name = "alpha-router")]
#[command(about = "Find the gas-adjusted best Uniswap V3 route, split across pools")]
struct Cli {
    /// Input token address or symbol
    #[arg(short = 'i', long = "tokenIn")]
    token_in: String,
    /// Output token address or symbol
    #[arg(short = 'o', long = "tokenOut")]
    token_out: String,
    /// Human-readable amount of tokenIn (exactIn) or tokenOut (exactOut)
    #[arg(short = 'a', long = "amount")]
    amount: String,
    #[arg(long = "exactIn")]
    exact_in: bool,
    #[arg(long = "exactOut")]
    exact_out: bool,

    /// Produce SwapRouter calldata for this recipient
    #[arg(long = "recipient")]
    recipient: Option<Address>,
    /// Seconds from now
    #[arg(long = "deadline", default_value_t = 100)]
    deadline: u64,
    #[arg(long = "slippageBps", default_value_t = 5)]
    slippage_bps: u32,

    #[arg(long = "topN")]
    top_n: Option<usize>,
    #[arg(long = "topNTokenInOut")]
    top_n_token_in_out: Option<usize>,
    #[arg(long = "topNSecondHop")]
    top_n_second_hop: Option<usize>,
    #[arg(long = "topNWithEachBaseToken")]
    top_n_with_each_base_token: Option<usize>,
    #[arg(long = "topNWithBaseToken")]
    top_n_with_base_token: Option<usize>,
    #[arg(long = "topNWithBaseTokenInSet")]
    top_n_with_base_token_in_set: bool,
    #[arg(long = "topNDirectSwaps")]
    top_n_direct_swaps: Option<usize>,
    #[arg(long = "maxSwapsPerPath")]
    max_swaps_per_path: Option<usize>,
    #[arg(long = "minSplits")]
    min_splits: Option<usize>,
    #[arg(long = "maxSplits")]
    max_splits: Option<usize>,
    #[arg(long = "distributionPercent")]
    distribution_percent: Option<u32>,

    #[arg(short = 'c', long = "chainId")]
    chain_id: Option<u64>,
    #[arg(long = "router", value_enum, default_value_t = RouterKind::Alpha)]
    router: RouterKind,
    /// Uniswap token-list JSON file
    #[arg(long = "tokenListURI")]
    token_list_uri: Option<String>,
    /// TOML configuration file
    #[arg(long = "config")]
    config: Option<String>,
    #[arg(long = "debug")]
    debug: bool,
    #[arg(long = "debugJSON")]
    debug_json: bool,
}

impl Cli {
    fn apply_routing(&self, routing: &mut RoutingConfig) {
        let s = &mut routing.pool_selection;
        if let Some(v) = self.top_n {
            s.top_n = v;
        }
        if let Some(v) = self.top_n_token_in_out {
            s.top_n_token_in_out = v;
        }
        if let Some(v) = self.top_n_second_hop {
            s.top_n_second_hop = v;
        }
        if let Some(v) = self.top_n_with_each_base_token {
            s.top_n_with_each_base_token = v;
        }
        if let Some(v) = self.top_n_with_base_token {
            s.top_n_with_base_token = v;
        }
        if self.top_n_with_base_token_in_set {
            s.top_n_with_base_token_in_set = true;
        }
        if let Some(v) = self.top_n_direct_swaps {
            s.top_n_direct_swaps = v;
        }
        if let Some(v) = self.max_swaps_per_path {
            routing.max_swaps_per_path = v;
        }
        if let Some(v) = self.min_splits {
            routing.min_splits = v;
        }
        if let Some(v) = self.max_splits {
            routing.max_splits = v;
        }
        if let Some(v) = self.distribution_percent {
            routing.distribution_percent = v;
        }
    }
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!("{}", style(" 🧭 ALPHA ROUTER - Uniswap V3 Split Routing").cyan().bold());
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

/// Address or list symbol; the native symbol means the wrapped native token.
async fn resolve_token(
    input: &str,
    chain_id: u64,
    list: &TokenListProvider,
    ctx: &RouterContext,
) -> Result<Token> {
    let address = if let Ok(address) = input.parse::<Address>() {
        address
    } else if input.eq_ignore_ascii_case(native_symbol(chain_id)) {
        wrapped_native(chain_id).ok_or_else(|| eyre!("No wrapped native token known for chain {}", chain_id))?
    } else {
        return list
            .by_symbol(input)
            .ok_or_else(|| eyre!("Token '{}' not in the token list; pass its address", input));
    };

    let tokens = ctx.token_provider.get_tokens(&[address]).await?;
    match tokens.get(&address) {
        Some(token) => Ok(token.clone()),
        None => Err(RouterError::UnknownToken(vec![address]).into()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let directive = if cli.debug { "alpha_router=debug" } else { "alpha_router=info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive)))
        .init();

    let trade_type = TradeType::from_flags(cli.exact_in, cli.exact_out)?;

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Some(chain_id) = cli.chain_id {
        config.chain_id = chain_id;
    }
    if let Some(path) = &cli.token_list_uri {
        config.token_list_path = Some(path.clone());
    }
    cli.apply_routing(&mut config.routing);
    config.validate()?;

    if !cli.debug_json {
        print_banner();
        config.print_summary();
        println!();
    }

    let token_list = Arc::new(match &config.token_list_path {
        Some(path) => TokenListProvider::from_file(config.chain_id, path)?,
        None => TokenListProvider::default_for_chain(config.chain_id),
    });
    let ctx = RouterContext::from_config(&config, token_list.clone())?;

    let token_in = resolve_token(&cli.token_in, config.chain_id, &token_list, &ctx).await?;
    let token_out = resolve_token(&cli.token_out, config.chain_id, &token_list, &ctx).await?;
    debug!("Resolved {} → {}", token_in, token_out);

    let (amount_token, quote_token) = match trade_type {
        TradeType::ExactInput => (token_in, token_out),
        TradeType::ExactOutput => (token_out, token_in),
    };
    let amount = CurrencyAmount::parse(amount_token, &cli.amount)?;

    let swap_params = cli.recipient.map(|recipient| SwapParams {
        recipient,
        slippage_bps: cli.slippage_bps,
        deadline: (Utc::now().timestamp().max(0) as u64).saturating_add(cli.deadline),
    });

    let request = RouteRequest {
        amount,
        quote_token,
        trade_type,
        swap_params,
        config: config.routing.clone(),
    };

    let router: Box<dyn SwapRouter> = match cli.router {
        RouterKind::Alpha => Box::new(AlphaRouter::new(ctx)),
        RouterKind::Legacy => Box::new(LegacyRouter::new(ctx)),
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    spinner.set_message(format!("Routing {} ({:?} router)...", request.amount, cli.router));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let start = Instant::now();
    let outcome = router.route(&request).await;
    spinner.finish_and_clear();
    let outcome = outcome?;
    info!("Routing finished in {:?}", start.elapsed());

    print_outcome(&outcome, cli.debug_json)?;

    if let (RouteOutcome::Found(route), Some(path)) = (&outcome, &config.quote_log_path) {
        if let Err(e) = RouteSummary::from_route(route).append_to_file(path) {
            warn!("Failed to log quote to {}: {}", path, e);
        }
    }

    Ok(())
}
