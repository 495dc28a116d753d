//! Moneyball
//!
//! Fits kelly ratios per strategy, walk-forward weights per portfolio, and
//! prints the next recommended bets.

use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use moneyball::{
    bets::NextBetSelector,
    config::Config,
    portfolio::Portfolio,
    pricing::{MissingPriceResolver, NoPriceResolver, PriceOverrides},
    search::KellyRatioSearch,
    storage,
    strategy::Strategy,
    types::EventTable,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "moneyball")]
#[command(about = "Walk-forward Kelly sizing and portfolio allocation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "moneyball.toml")]
    config: String,

    /// Evaluation time (RFC 3339), defaults to the current time
    #[arg(long, global = true)]
    now: Option<DateTime<Utc>>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the kelly ratio of a strategy and save its fitted returns
    Fit {
        /// Strategy name
        strategy: String,
        /// Replace the training table with this JSON file
        #[arg(long)]
        table: Option<PathBuf>,
        /// Finish rank that counts as a win
        #[arg(long)]
        place: Option<usize>,
        /// JSON file of prices for outcomes the table lacks
        #[arg(long)]
        prices: Option<PathBuf>,
    },
    /// Fit walk-forward weights for a portfolio of fitted strategies
    Portfolio {
        /// Portfolio name
        name: String,
        /// Replace the member list
        #[arg(long, value_delimiter = ',')]
        strategies: Vec<String>,
    },
    /// Print recommendations for upcoming events
    Next {
        /// Portfolio name
        name: String,
        /// Hours past now to look at (overrides config)
        #[arg(long)]
        hours: Option<i64>,
        /// Also write the recommendations to this JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr, stdout carries the JSON output
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    let now = cli.now.unwrap_or_else(Utc::now);

    let outcome = match cli.command {
        Commands::Fit {
            strategy,
            table,
            place,
            prices,
        } => fit_strategy(config, now, &strategy, table, place, prices).await,
        Commands::Portfolio { name, strategies } => fit_portfolio(config, &name, strategies).await,
        Commands::Next { name, hours, output } => next_bets(config, now, &name, hours, output.as_deref()),
    };

    if let Err(e) = outcome {
        // Exit here; dropping the runtime would wait on an abandoned fit
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

/// Run `job` on the blocking pool, abandoning it past the configured budget
async fn run_with_budget<T, F>(budget_secs: Option<u64>, job: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> moneyball::error::Result<T> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(job);
    let joined = match budget_secs {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), task)
            .await
            .map_err(|_| anyhow!("exceeded the {}s budget, nothing was saved", secs))?,
        None => task.await,
    };
    Ok(joined.context("fit task panicked")??)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_strategy(root: &Path, name: &str, place: Option<usize>, default_place: usize) -> anyhow::Result<Strategy> {
    if root.join(name).exists() {
        let mut strategy = Strategy::load(root, name)?;
        if let Some(place) = place {
            strategy.set_place(place)?;
        }
        Ok(strategy)
    } else {
        tracing::info!(strategy = name, "Creating new strategy");
        Ok(Strategy::create(root, name, place.unwrap_or(default_place))?)
    }
}

async fn fit_strategy(
    config: Config,
    now: DateTime<Utc>,
    name: &str,
    table: Option<PathBuf>,
    place: Option<usize>,
    prices: Option<PathBuf>,
) -> anyhow::Result<()> {
    let root = config.storage.root_dir();
    let mut strategy = open_strategy(&root, name, place, config.strategy.place)?;

    if let Some(path) = table {
        let table: EventTable =
            storage::read_json(&path).with_context(|| format!("reading table {}", path.display()))?;
        tracing::info!(strategy = name, events = table.len(), "Replacing training table");
        strategy.set_table(table);
    }

    let resolver: Box<dyn MissingPriceResolver> = match prices {
        Some(path) => {
            let overrides = PriceOverrides::load(&path)?;
            tracing::info!(prices = overrides.len(), "Loaded price overrides");
            Box::new(overrides)
        }
        None => Box::new(NoPriceResolver),
    };

    let search = KellyRatioSearch::new(config.strategy.search_config());
    let (mut strategy, outcome) = run_with_budget(config.runtime.fit_timeout_secs, move || {
        let outcome = strategy.fit(now, &search, resolver.as_ref())?;
        Ok((strategy, outcome))
    })
    .await?;

    strategy.save()?;
    print_json(&outcome)
}

#[derive(Serialize)]
struct PortfolioReport {
    portfolio: String,
    strategies: std::collections::BTreeMap<String, f64>,
    total_return: f64,
    max_drawdown: f64,
    fallback_dates: usize,
}

async fn fit_portfolio(config: Config, name: &str, members: Vec<String>) -> anyhow::Result<()> {
    let root = config.storage.root_dir();
    let mut portfolio = if members.is_empty() {
        Portfolio::load(&root, name)?
    } else if root.join(name).exists() {
        let mut portfolio = Portfolio::load(&root, name)?;
        portfolio.set_strategies(&members)?;
        portfolio
    } else {
        Portfolio::create(&root, name, &members)?
    };

    let strategies = portfolio
        .strategies()
        .map(|s| Strategy::load(&root, s))
        .collect::<moneyball::error::Result<Vec<_>>>()?;

    let walkforward = config.portfolio.walkforward_config();
    let (portfolio, result) = run_with_budget(config.runtime.fit_timeout_secs, move || {
        let result = portfolio.fit(&strategies, &walkforward)?;
        Ok((portfolio, result))
    })
    .await?;

    portfolio.save()?;

    let metrics = result.returns.metrics(config.portfolio.annualization_factor as f64);
    print_json(&PortfolioReport {
        portfolio: portfolio.name().to_string(),
        strategies: portfolio.weights().clone(),
        total_return: metrics.total_return,
        max_drawdown: metrics.max_drawdown,
        fallback_dates: result.history.iter().filter(|s| s.fallback).count(),
    })
}

fn next_bets(
    config: Config,
    now: DateTime<Utc>,
    name: &str,
    hours: Option<i64>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let root = config.storage.root_dir();
    let portfolio = Portfolio::load(&root, name)?;
    let strategies = portfolio
        .strategies()
        .map(|s| Strategy::load(&root, s))
        .collect::<moneyball::error::Result<Vec<_>>>()?;

    let lookahead = match hours {
        Some(h) => chrono::Duration::hours(h),
        None => config.bets.lookahead(),
    };
    let bets = portfolio.next_bets(&strategies, &NextBetSelector::new(lookahead), now)?;
    print_json(&bets)?;

    if let Some(path) = output {
        bets.save(path).with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}
