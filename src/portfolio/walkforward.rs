//! Walk-forward portfolio blending
//!
//! Each date's weights come from an optimizer fitted only on the rows before
//! that date (expanding window). Thin history, meaning fewer distinct return
//! values than configured, falls back to equal weighting.

use super::optimizer::{OptimizationMethod, PortfolioError, PortfolioOptimizer};
use crate::error::{Error, Result};
use crate::returns::ReturnSeries;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct WalkforwardConfig {
    /// History with fewer distinct values than this is equal-weighted
    pub min_distinct_values: usize,
    pub method: OptimizationMethod,
    pub risk_free_rate: f64,
    pub annualization_factor: u32,
}

impl Default for WalkforwardConfig {
    fn default() -> Self {
        Self {
            min_distinct_values: 10,
            method: OptimizationMethod::MaxReturn { max_volatility: None },
            risk_free_rate: 0.0,
            annualization_factor: 365,
        }
    }
}

/// Strategy series on one shared daily index, gaps at 0.0
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedReturns {
    pub names: Vec<String>,
    pub dates: Vec<NaiveDate>,
    /// `rows[t][i]` is strategy `i` on `dates[t]`
    pub rows: Vec<Vec<f64>>,
}

impl AlignedReturns {
    pub fn new(series: &[ReturnSeries]) -> Self {
        let names = series.iter().map(|s| s.name().to_string()).collect();
        let first = series.iter().filter_map(ReturnSeries::first_date).min();
        let last = series.iter().filter_map(ReturnSeries::last_date).max();

        let dates: Vec<NaiveDate> = match (first, last) {
            (Some(first), Some(last)) => first.iter_days().take_while(|d| *d <= last).collect(),
            _ => Vec::new(),
        };
        let rows = dates
            .iter()
            .map(|d| series.iter().map(|s| s.get(*d)).collect())
            .collect();

        Self { names, dates, rows }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Counts distinct values, stopping once a threshold is reached
struct DistinctValues {
    seen: HashSet<u64>,
    limit: usize,
}

impl DistinctValues {
    fn new(limit: usize) -> Self {
        Self {
            seen: HashSet::new(),
            limit,
        }
    }

    fn add_row(&mut self, row: &[f64]) {
        for v in row {
            if self.seen.len() >= self.limit {
                return;
            }
            // -0.0 and 0.0 are the same return
            let v = if *v == 0.0 { 0.0 } else { *v };
            self.seen.insert(v.to_bits());
        }
    }

    fn enough(&self) -> bool {
        self.seen.len() >= self.limit
    }
}

/// Weights applied on one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightSnapshot {
    pub date: NaiveDate,
    pub weights: Vec<f64>,
    /// Equal weighting was used instead of the optimizer
    pub fallback: bool,
}

#[derive(Debug, Clone)]
pub struct WalkforwardResult {
    pub names: Vec<String>,
    /// Blended daily returns
    pub returns: ReturnSeries,
    pub history: Vec<WeightSnapshot>,
    /// Weights for the next, not yet realized, date
    pub weights: Vec<f64>,
}

impl WalkforwardResult {
    /// Prospective weights keyed by strategy name
    pub fn weight_map(&self) -> BTreeMap<String, f64> {
        self.names.iter().cloned().zip(self.weights.iter().copied()).collect()
    }
}

pub struct WalkforwardPortfolioOptimizer {
    config: WalkforwardConfig,
}

impl WalkforwardPortfolioOptimizer {
    pub fn new(config: WalkforwardConfig) -> Self {
        Self { config }
    }

    /// Weights from `history` alone; the flag is set on the equal-weight path
    fn weights_for(
        &self,
        names: &[String],
        history: &[Vec<f64>],
        distinct: &DistinctValues,
    ) -> std::result::Result<(Vec<f64>, bool), PortfolioError> {
        let n = names.len();
        if history.is_empty() || !distinct.enough() {
            return Ok((vec![1.0 / n as f64; n], true));
        }
        let optimizer = PortfolioOptimizer::from_returns(
            names.to_vec(),
            history,
            self.config.risk_free_rate,
            self.config.annualization_factor,
        )?;
        let result = optimizer.optimize(self.config.method)?;
        Ok((result.weights, false))
    }

    /// Blend `series` into one portfolio series named `portfolio`.
    ///
    /// The returned history holds the weights applied on every date; the
    /// prospective weights use the full history.
    pub fn run(&self, portfolio: &str, series: &[ReturnSeries]) -> Result<WalkforwardResult> {
        if series.is_empty() {
            return Err(Error::EmptyPortfolio {
                portfolio: portfolio.to_string(),
            });
        }

        let aligned = AlignedReturns::new(series);
        let n = aligned.names.len();
        let equal = vec![1.0 / n as f64; n];

        let mut distinct = DistinctValues::new(self.config.min_distinct_values);
        let mut returns = ReturnSeries::new(portfolio);
        let mut history = Vec::with_capacity(aligned.len());
        let mut failures = 0usize;

        for (t, date) in aligned.dates.iter().enumerate() {
            let (weights, fallback) = match self.weights_for(&aligned.names, &aligned.rows[..t], &distinct) {
                Ok(found) => found,
                Err(e) => {
                    debug!(portfolio, %date, error = %e, "Optimizer failed, equal weighting");
                    failures += 1;
                    (equal.clone(), true)
                }
            };

            let blended: f64 = weights.iter().zip(&aligned.rows[t]).map(|(w, r)| w * r).sum();
            returns.set(*date, blended);
            history.push(WeightSnapshot {
                date: *date,
                weights,
                fallback,
            });

            distinct.add_row(&aligned.rows[t]);
        }

        if failures > 0 {
            warn!(portfolio, failures, "Optimizer failed on some dates, equal weights used");
        }

        let weights = match self.weights_for(&aligned.names, &aligned.rows, &distinct) {
            Ok((weights, _)) => weights,
            Err(e) => {
                warn!(portfolio, error = %e, "Optimizer failed on full history, equal weighting");
                equal
            }
        };

        let fallback_dates = history.iter().filter(|s| s.fallback).count();
        info!(
            portfolio,
            strategies = n,
            dates = aligned.len(),
            fallback_dates,
            "Walk-forward portfolio fitted"
        );

        Ok(WalkforwardResult {
            names: aligned.names,
            returns: returns.resample_daily(),
            history,
            weights,
        })
    }
}
