//! Drawdown and risk-adjusted return statistics.

use serde::{Deserialize, Serialize};

/// Drawdown tracker over a compounded wealth curve.
#[derive(Debug, Clone)]
pub struct DrawdownTracker {
    /// Current wealth.
    wealth: f64,
    /// Highest wealth seen.
    peak: f64,
    /// Maximum drawdown seen, as a fraction of the peak.
    max_drawdown: f64,
}

impl Default for DrawdownTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawdownTracker {
    /// Start with a bankroll of 1.0, which counts as the first peak.
    pub fn new() -> Self {
        Self {
            wealth: 1.0,
            peak: 1.0,
            max_drawdown: 0.0,
        }
    }

    /// Compound one period's return.
    pub fn update(&mut self, period_return: f64) {
        self.wealth *= 1.0 + period_return;
        if self.wealth > self.peak {
            self.peak = self.wealth;
        } else if self.peak > 0.0 {
            let drawdown = (self.peak - self.wealth) / self.peak;
            if drawdown > self.max_drawdown {
                self.max_drawdown = drawdown;
            }
        }
    }

    /// Maximum drawdown magnitude (0.0 = none, 1.0 = bankroll wiped out).
    #[inline]
    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown
    }

    #[inline]
    pub fn wealth(&self) -> f64 {
        self.wealth
    }

    #[inline]
    pub fn peak(&self) -> f64 {
        self.peak
    }
}

/// Summary statistics of a return series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesMetrics {
    pub periods: usize,
    /// Compounded return over the whole series
    pub total_return: f64,
    pub annualized_return: f64,
    /// Drawdown magnitude in [0, ∞)
    pub max_drawdown: f64,
    pub calmar: f64,
    pub sharpe: f64,
}

impl SeriesMetrics {
    pub fn from_returns(returns: &[f64], annualization_factor: f64) -> Self {
        let mut tracker = DrawdownTracker::new();
        for r in returns {
            tracker.update(*r);
        }
        let periods = returns.len();
        let total_return = tracker.wealth() - 1.0;
        let annualized_return = annualized_return(tracker.wealth(), periods, annualization_factor);
        let max_drawdown = tracker.max_drawdown();

        Self {
            periods,
            total_return,
            annualized_return,
            max_drawdown,
            calmar: calmar(annualized_return, max_drawdown),
            sharpe: sharpe(returns, annualization_factor),
        }
    }

    /// Drawdown reached the whole bankroll
    pub fn is_ruined(&self) -> bool {
        self.max_drawdown >= 1.0
    }
}

/// Geometric annual growth given the final wealth multiple
fn annualized_return(ending_wealth: f64, periods: usize, annualization_factor: f64) -> f64 {
    if periods == 0 {
        return 0.0;
    }
    if ending_wealth <= 0.0 {
        return -1.0;
    }
    let years = periods as f64 / annualization_factor;
    ending_wealth.powf(1.0 / years) - 1.0
}

/// Annualized return over drawdown magnitude.
///
/// Without any drawdown a gaining series is unbounded (`+∞`) and a flat one
/// scores 0.0.
fn calmar(annualized_return: f64, max_drawdown: f64) -> f64 {
    if max_drawdown > 0.0 {
        annualized_return / max_drawdown
    } else if annualized_return > 0.0 {
        f64::INFINITY
    } else {
        0.0
    }
}

fn sharpe(returns: &[f64], annualization_factor: f64) -> f64 {
    let n = returns.len();
    if n < 2 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / n as f64;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let std = var.sqrt();
    if std <= f64::EPSILON {
        return 0.0;
    }
    mean / std * annualization_factor.sqrt()
}
