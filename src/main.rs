//! Paper Trader
//!
//! Scores trade setups, sizes positions by confidence and runs a simulated
//! brokerage account persisted to a JSON file.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

use paper_trader::models::{AnalysisSnapshot, Order, OrderRequest, OrderSide, OrderStatus};
use paper_trader::scoring::{ConfidenceScorer, ScoringConfig, ThemeTable};
use paper_trader::store::{AccountStore, StoredAccount};
use paper_trader::trading::{TradingConfig, TradingEngine};

/// Paper trading CLI.
#[derive(Parser)]
#[command(name = "papertrader")]
#[command(about = "Score setups, size positions and paper trade them", long_about = None)]
struct Cli {
    /// Account file path
    #[arg(short, long, env = "PAPER_ACCOUNT", default_value = "./paper_account.json")]
    account: PathBuf,

    /// Theme membership table (JSON object of theme -> [symbols])
    #[arg(short, long, env = "PAPER_THEMES")]
    themes: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score one snapshot or an array of snapshots from a JSON file
    Score {
        /// Snapshot JSON file
        file: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Size a position from a confidence score
    Size {
        /// Confidence score (0-100)
        #[arg(short, long)]
        score: f64,

        /// Account size in dollars (defaults to the account's total value)
        #[arg(short, long)]
        account_size: Option<Decimal>,

        /// Base risk fraction (defaults to the configured risk per trade)
        #[arg(short, long)]
        risk: Option<Decimal>,

        /// Entry price, to suggest a share quantity
        #[arg(short, long)]
        entry: Option<Decimal>,
    },

    /// Buy shares
    Buy(OrderArgs),

    /// Sell shares
    Sell(OrderArgs),

    /// Cancel a pending order
    Cancel {
        /// Order id
        order_id: Uuid,
    },

    /// Record market prices (SYMBOL=PRICE ...)
    Prices {
        #[arg(required = true)]
        quotes: Vec<String>,
    },

    /// Show the portfolio summary
    Summary,

    /// List open positions
    Positions,

    /// List orders, newest first
    Orders {
        /// Only this symbol
        #[arg(short, long)]
        symbol: Option<String>,

        /// Only this status (pending, filled, cancelled, rejected)
        #[arg(long)]
        status: Option<OrderStatus>,
    },

    /// Show transaction history
    History {
        /// Only the last N days
        #[arg(short, long)]
        days: Option<i64>,
    },

    /// Show performance metrics
    Metrics,

    /// Show current configuration
    Config,

    /// Reset the account
    Reset {
        /// Starting cash (defaults to the configured initial cash)
        #[arg(short, long)]
        cash: Option<Decimal>,
    },
}

#[derive(clap::Args)]
struct OrderArgs {
    /// Ticker symbol
    symbol: String,

    /// Number of shares
    quantity: Decimal,

    /// Limit price
    #[arg(long)]
    limit: Option<Decimal>,

    /// Stop trigger price
    #[arg(long)]
    stop: Option<Decimal>,

    /// Current market price to record before submitting
    #[arg(short, long)]
    price: Option<Decimal>,
}

impl OrderArgs {
    fn request(&self, side: OrderSide) -> OrderRequest {
        let symbol = self.symbol.as_str();
        match (self.stop, self.limit) {
            (Some(stop), Some(limit)) => {
                OrderRequest::stop_limit(symbol, side, self.quantity, stop, limit)
            }
            (Some(stop), None) => OrderRequest::stop(symbol, side, self.quantity, stop),
            (None, Some(limit)) => OrderRequest::limit(symbol, side, self.quantity, limit),
            (None, None) => OrderRequest::market(symbol, side, self.quantity),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = TradingConfig::from_env()?;
    let store = AccountStore::new(&cli.account);

    // Commands that never touch the account
    match &cli.command {
        Commands::Score { file, json } => {
            let themes = match &cli.themes {
                Some(path) => ThemeTable::from_json_file(path)?,
                None => ThemeTable::default(),
            };
            return score(file, *json, themes);
        }
        Commands::Config => {
            print_config(&config, &ScoringConfig::default(), &store);
            return Ok(());
        }
        _ => {}
    }

    let mut engine = match store.load().await? {
        Some(account) => TradingEngine::from_parts(config.clone(), account.portfolio, account.prices),
        None => TradingEngine::new(config.clone()),
    };

    let mutated = match cli.command {
        Commands::Score { .. } | Commands::Config => false,

        Commands::Size {
            score,
            account_size,
            risk,
            entry,
        } => {
            let sizing = match account_size {
                Some(account) => engine.sizer().size(
                    score,
                    account,
                    risk.unwrap_or(config.risk_per_trade),
                )?,
                None => engine.size_position(score, risk)?,
            };
            println!("{}", sizing);

            if let Some(entry) = entry {
                let shares = sizing.suggested_quantity(entry, config.stop_loss);
                let (stop, target) = engine.sizer().exit_levels(entry);
                println!("Suggested Shares: {}", shares);
                println!("Stop Loss:        ${:.2}", stop);
                println!("Take Profit:      ${:.2}", target);
            }
            false
        }

        Commands::Buy(args) => {
            submit(&mut engine, &args, OrderSide::Buy)?;
            true
        }

        Commands::Sell(args) => {
            submit(&mut engine, &args, OrderSide::Sell)?;
            true
        }

        Commands::Cancel { order_id } => {
            if engine.cancel_order(order_id)? {
                println!("Cancelled order {}", order_id);
                true
            } else {
                println!("No order with id {}", order_id);
                false
            }
        }

        Commands::Prices { quotes } => {
            let prices = quotes
                .iter()
                .map(|q| parse_quote(q))
                .collect::<Result<Vec<_>>>()?;
            let update = engine.update_prices(prices)?;

            println!(
                "Marked {} position(s), ignored {} price(s)",
                update.marked, update.ignored
            );
            for order in &update.filled {
                println!("Filled:   {}", describe(order));
            }
            for order in &update.rejected {
                println!("Rejected: {}", describe(order));
            }
            println!("{}", engine.get_portfolio_summary());
            true
        }

        Commands::Summary => {
            println!("{}", engine.get_portfolio_summary());
            false
        }

        Commands::Positions => {
            let positions = engine.positions();
            if positions.is_empty() {
                println!("No open positions.");
                return Ok(());
            }

            println!(
                "\n{:<8} {:>10} {:>12} {:>12} {:>14} {:>8}",
                "SYMBOL", "QTY", "AVG COST", "LAST", "UNREALIZED", "RETURN"
            );
            println!("{}", "-".repeat(70));
            for p in positions {
                println!(
                    "{:<8} {:>10} {:>12.2} {:>12.2} {:>14.2} {:>7.2}%",
                    p.symbol,
                    p.quantity,
                    p.average_cost,
                    p.last_price,
                    p.unrealized_pnl,
                    p.return_pct()
                );
            }
            false
        }

        Commands::Orders { symbol, status } => {
            let orders = engine.get_orders(symbol.as_deref(), status);
            if orders.is_empty() {
                println!("No orders.");
                return Ok(());
            }

            println!(
                "\n{:<36} {:<6} {:<5} {:<10} {:>10} {:>10} {:<10}",
                "ID", "SYMBOL", "SIDE", "TYPE", "QTY", "FILL", "STATUS"
            );
            println!("{}", "-".repeat(95));
            for o in orders {
                let fill = o
                    .filled_price()
                    .map(|p| format!("{:.2}", p))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<36} {:<6} {:<5} {:<10} {:>10} {:>10} {:<10}",
                    o.id(),
                    o.symbol(),
                    o.side(),
                    o.order_type(),
                    o.quantity(),
                    fill,
                    o.status()
                );
            }
            false
        }

        Commands::History { days } => {
            let since = days.map(|d| Utc::now() - Duration::days(d));
            let history = engine.get_transaction_history(since);
            if history.is_empty() {
                println!("No transactions.");
                return Ok(());
            }

            println!(
                "\n{:<20} {:<6} {:<5} {:>10} {:>12} {:>14} {:>12}",
                "TIME", "SYMBOL", "SIDE", "QTY", "PRICE", "TOTAL", "REALIZED"
            );
            println!("{}", "-".repeat(85));
            for tx in history {
                let realized = tx
                    .realized_pnl
                    .map(|p| format!("{:.2}", p))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<20} {:<6} {:<5} {:>10} {:>12.2} {:>14.2} {:>12}",
                    tx.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    tx.symbol,
                    tx.side,
                    tx.quantity,
                    tx.price,
                    tx.total,
                    realized
                );
            }
            false
        }

        Commands::Metrics => {
            println!("{}", engine.performance());
            false
        }

        Commands::Reset { cash } => {
            if cash.is_some_and(|c| c <= Decimal::ZERO) {
                bail!("Starting cash must be positive");
            }
            engine.reset(cash);
            println!(
                "Account reset with ${:.2}",
                engine.portfolio().initial_cash()
            );
            true
        }
    };

    if mutated {
        let account = StoredAccount::new(engine.portfolio().clone(), engine.prices().clone());
        store.save(&account).await?;
    }

    Ok(())
}

/// Score snapshots from a file and print them.
fn score(file: &Path, json: bool, themes: ThemeTable) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    let snapshots: Vec<AnalysisSnapshot> = if value.is_array() {
        serde_json::from_value(value)?
    } else {
        vec![serde_json::from_value(value)?]
    };
    info!(count = snapshots.len(), "Scoring snapshots");

    let scorer = ConfidenceScorer::new(themes, ScoringConfig::default());
    let results = scorer.score_many(&snapshots);

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        for result in &results {
            println!("{}", result);
        }
    }
    Ok(())
}

/// Submit an order from CLI arguments and report the outcome.
fn submit(engine: &mut TradingEngine, args: &OrderArgs, side: OrderSide) -> Result<()> {
    if let Some(price) = args.price {
        engine.update_prices([(args.symbol.as_str(), price)])?;
    }

    let order = engine.submit_order(args.request(side))?;
    match order.status() {
        OrderStatus::Filled => println!("Filled: {}", describe(&order)),
        OrderStatus::Pending => println!("Resting: {}", describe(&order)),
        _ => println!("Rejected: {}", describe(&order)),
    }
    Ok(())
}

fn describe(order: &Order) -> String {
    let mut line = format!(
        "{} {} {} {} ({})",
        order.side(),
        order.quantity(),
        order.symbol(),
        order.order_type(),
        order.id()
    );
    if let Some(price) = order.filled_price() {
        line.push_str(&format!(" @ ${:.2}", price));
    }
    if let Some(reason) = order.rejection() {
        line.push_str(&format!(" [{}] {}", reason.code(), reason));
    }
    line
}

/// Parse "SYMBOL=PRICE".
fn parse_quote(quote: &str) -> Result<(String, Decimal)> {
    let (symbol, price) = quote
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected SYMBOL=PRICE, got '{}'", quote))?;
    let price = Decimal::from_str(price.trim())
        .with_context(|| format!("Invalid price in '{}'", quote))?;
    Ok((symbol.trim().to_uppercase(), price))
}

fn print_config(config: &TradingConfig, scoring: &ScoringConfig, store: &AccountStore) {
    println!("\n=== Trading Configuration ===\n");
    println!("Account:");
    println!("  File:                 {}", store.path().display());
    println!("  Initial Cash:         ${}", config.initial_cash);

    println!("\nPosition Sizing:");
    println!("  Risk Per Trade:       {}%", config.risk_per_trade * dec!(100));
    println!("  Max Position Size:    {}%", config.max_position_size * dec!(100));
    println!("  Max Multiplier:       {}x", config.max_multiplier);

    println!("\nExit Rules:");
    println!("  Stop Loss:            {}%", config.stop_loss * dec!(100));
    println!("  Take Profit:          {}%", config.take_profit * dec!(100));

    println!("\n=== Scoring Configuration ===\n");
    println!("  Volatility Warning:   {}", scoring.volatility_warning);
    println!("  Low Liquidity Volume: {}", scoring.low_liquidity_volume);
    println!("  Max Explanations:     {}", scoring.max_explanations);
}
