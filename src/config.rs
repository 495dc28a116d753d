//! Configuration
//!
//! Loaded from an optional TOML file with `MONEYBALL__SECTION__KEY`
//! environment overrides. Every field has a default so an empty file is a
//! valid configuration.

use crate::error::Result;
use crate::portfolio::walkforward::WalkforwardConfig;
use crate::portfolio::OptimizationMethod;
use crate::search::{Objective, SearchConfig};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub portfolio: PortfolioConfig,
    #[serde(default)]
    pub bets: BetsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl Config {
    /// Load configuration from `path` (optional) and the environment
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("MONEYBALL")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

/// Per-strategy sizing and search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Finish rank that still counts as a win (1 = outright winner)
    #[serde(default = "default_place")]
    pub place: usize,
    /// Number of evenly spaced kelly multipliers in (0, 1]
    #[serde(default = "default_kelly_trials")]
    pub kelly_trials: usize,
    /// Only the most recent days are scored when choosing the multiplier
    #[serde(default = "default_validation_days")]
    pub validation_days: i64,
    /// Periods per year of the (calendar daily) return series
    #[serde(default = "default_strategy_annualization")]
    pub annualization_factor: f64,
    #[serde(default)]
    pub objective: Objective,
}

fn default_place() -> usize { 1 }
fn default_kelly_trials() -> usize { 100 }
fn default_validation_days() -> i64 { 365 }
fn default_strategy_annualization() -> f64 { 365.0 }

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            place: default_place(),
            kelly_trials: default_kelly_trials(),
            validation_days: default_validation_days(),
            annualization_factor: default_strategy_annualization(),
            objective: Objective::default(),
        }
    }
}

impl StrategyConfig {
    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            trials: self.kelly_trials,
            validation_horizon: Duration::days(self.validation_days),
            annualization_factor: self.annualization_factor,
            objective: self.objective,
        }
    }
}

/// Allocation method used once enough portfolio history exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortfolioMethod {
    #[default]
    MaxReturn,
    MaxSharpe,
    MinVariance,
    RiskParity,
    EqualWeight,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioConfig {
    /// Fewer distinct historical values than this triggers equal weighting
    #[serde(default = "default_min_distinct_values")]
    pub min_distinct_values: usize,
    #[serde(default)]
    pub method: PortfolioMethod,
    /// Annualized volatility cap for `max_return` (none = unconstrained)
    #[serde(default)]
    pub max_volatility: Option<f64>,
    #[serde(default)]
    pub risk_free_rate: f64,
    #[serde(default = "default_portfolio_annualization")]
    pub annualization_factor: u32,
}

fn default_min_distinct_values() -> usize { 10 }
fn default_portfolio_annualization() -> u32 { 365 }

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            min_distinct_values: default_min_distinct_values(),
            method: PortfolioMethod::default(),
            max_volatility: None,
            risk_free_rate: 0.0,
            annualization_factor: default_portfolio_annualization(),
        }
    }
}

impl PortfolioConfig {
    pub fn optimization_method(&self) -> OptimizationMethod {
        match self.method {
            PortfolioMethod::MaxReturn => OptimizationMethod::MaxReturn {
                max_volatility: self.max_volatility,
            },
            PortfolioMethod::MaxSharpe => OptimizationMethod::MaxSharpe,
            PortfolioMethod::MinVariance => OptimizationMethod::MinVariance,
            PortfolioMethod::RiskParity => OptimizationMethod::RiskParity,
            PortfolioMethod::EqualWeight => OptimizationMethod::EqualWeight,
        }
    }

    pub fn walkforward_config(&self) -> WalkforwardConfig {
        WalkforwardConfig {
            min_distinct_values: self.min_distinct_values,
            method: self.optimization_method(),
            risk_free_rate: self.risk_free_rate,
            annualization_factor: self.annualization_factor,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetsConfig {
    /// How far past "now" upcoming events are considered
    #[serde(default = "default_lookahead_hours")]
    pub lookahead_hours: i64,
}

fn default_lookahead_hours() -> i64 { 24 }

impl Default for BetsConfig {
    fn default() -> Self {
        Self { lookahead_hours: default_lookahead_hours() }
    }
}

impl BetsConfig {
    pub fn lookahead(&self) -> Duration {
        Duration::hours(self.lookahead_hours)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one sub-directory per strategy and portfolio
    #[serde(default = "default_storage_root")]
    pub root: String,
}

fn default_storage_root() -> String { "~/.moneyball".to_string() }

impl Default for StorageConfig {
    fn default() -> Self {
        Self { root: default_storage_root() }
    }
}

impl StorageConfig {
    pub fn root_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.root).into_owned())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Wall-clock budget for a single fit; the run is abandoned past it
    #[serde(default)]
    pub fit_timeout_secs: Option<u64>,
}
