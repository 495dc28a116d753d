//! Portfolio of strategies
//!
//! A portfolio names its strategies and keeps one weight per strategy, stored
//! as `<root>/<portfolio>/portfolio.json`:
//!
//! ```json
//! {"strategies": {"nba": 0.6, "nhl": 0.4}}
//! ```
//!
//! [`Portfolio::fit`] re-derives the weights by walking forward over the
//! strategies' fitted returns; [`Portfolio::next_bets`] combines the weights
//! with each strategy's kelly ratio into recommendations.

pub mod optimizer;
pub mod walkforward;
#[cfg(test)]
mod tests;

pub use optimizer::{OptimizationMethod, OptimizedPortfolio, PortfolioError, PortfolioOptimizer};
pub use walkforward::{WalkforwardConfig, WalkforwardPortfolioOptimizer, WalkforwardResult, WeightSnapshot};

use crate::bets::{BetSource, NextBetSelector, NextBets};
use crate::error::{Error, Result};
use crate::returns::ReturnSeries;
use crate::storage;
use crate::strategy::Strategy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

const PORTFOLIO_FILE: &str = "portfolio.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct PortfolioFile {
    strategies: BTreeMap<String, f64>,
}

#[derive(Debug, Clone)]
pub struct Portfolio {
    name: String,
    dir: PathBuf,
    weights: BTreeMap<String, f64>,
    /// Blended returns of the last fit
    returns: Option<ReturnSeries>,
}

impl Portfolio {
    /// New, unsaved portfolio; strategies start equally weighted
    pub fn create(root: &Path, name: impl Into<String>, strategies: &[String]) -> Result<Self> {
        let name = name.into();
        let mut portfolio = Self {
            dir: root.join(&name),
            name,
            weights: BTreeMap::new(),
            returns: None,
        };
        portfolio.set_strategies(strategies)?;
        Ok(portfolio)
    }

    pub fn load(root: &Path, name: &str) -> Result<Self> {
        let dir = root.join(name);
        let file: PortfolioFile = storage::read_json(&dir.join(PORTFOLIO_FILE))?;
        info!(portfolio = name, strategies = file.strategies.len(), "Loaded portfolio");
        Ok(Self {
            name: name.to_string(),
            dir,
            weights: file.strategies,
            returns: None,
        })
    }

    pub fn save(&self) -> Result<()> {
        let file = PortfolioFile {
            strategies: self.weights.clone(),
        };
        storage::write_json(&self.dir.join(PORTFOLIO_FILE), &file)?;
        info!(portfolio = %self.name, "Saved portfolio");
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Strategy names in weight order
    pub fn strategies(&self) -> impl Iterator<Item = &str> {
        self.weights.keys().map(String::as_str)
    }

    pub fn weights(&self) -> &BTreeMap<String, f64> {
        &self.weights
    }

    pub fn weight(&self, strategy: &str) -> Option<f64> {
        self.weights.get(strategy).copied()
    }

    /// Replace the member list; every member gets `1/N` until the next fit
    pub fn set_strategies(&mut self, strategies: &[String]) -> Result<()> {
        if strategies.is_empty() {
            return Err(Error::EmptyPortfolio {
                portfolio: self.name.clone(),
            });
        }
        let mut weights = BTreeMap::new();
        for name in strategies {
            weights.insert(name.clone(), 0.0);
        }
        let equal = 1.0 / weights.len() as f64;
        weights.values_mut().for_each(|w| *w = equal);
        self.weights = weights;
        self.returns = None;
        Ok(())
    }

    /// Blended returns of the last fit
    pub fn returns(&self) -> Option<&ReturnSeries> {
        self.returns.as_ref()
    }

    /// Members looked up in `strategies`; a missing or unfitted member fails
    fn members<'a>(&self, strategies: &'a [Strategy]) -> Result<Vec<&'a Strategy>> {
        self.strategies()
            .map(|name| {
                strategies
                    .iter()
                    .find(|s| s.name() == name && s.is_fitted())
                    .ok_or_else(|| Error::NotFitted {
                        strategy: name.to_string(),
                    })
            })
            .collect()
    }

    /// Re-derive the weights from the members' fitted returns.
    ///
    /// Nothing is written; call [`Portfolio::save`] afterwards.
    pub fn fit(&mut self, strategies: &[Strategy], config: &WalkforwardConfig) -> Result<WalkforwardResult> {
        if self.weights.is_empty() {
            return Err(Error::EmptyPortfolio {
                portfolio: self.name.clone(),
            });
        }

        let series = self
            .members(strategies)?
            .into_iter()
            .map(|s| s.returns().map(|r| r.clone().with_name(s.name())))
            .collect::<Result<Vec<_>>>()?;

        let result = WalkforwardPortfolioOptimizer::new(config.clone()).run(&self.name, &series)?;
        self.weights = result.weight_map();
        self.returns = Some(result.returns.clone());

        info!(portfolio = %self.name, weights = ?self.weights, "Fitted portfolio");
        Ok(result)
    }

    /// Recommendations for the members' upcoming events
    pub fn next_bets(
        &self,
        strategies: &[Strategy],
        selector: &NextBetSelector,
        now: DateTime<Utc>,
    ) -> Result<NextBets> {
        let members = self.members(strategies)?;
        let mut sources = Vec::with_capacity(members.len());
        for strategy in members {
            sources.push(BetSource {
                strategy: strategy.name(),
                table: strategy.table()?,
                kelly: strategy.kelly_ratio()?,
                weight: self.weight(strategy.name()),
            });
        }
        Ok(selector.select(&sources, now))
    }
}
