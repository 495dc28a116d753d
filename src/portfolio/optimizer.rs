//! # Portfolio Optimization
//!
//! Long-only, fully-invested allocation across strategy return streams:
//! - Maximum expected return, optionally under a volatility cap
//! - Minimum Variance
//! - Maximum Sharpe Ratio
//! - Risk Parity
//! - Equal Weight
//!
//! ```rust,ignore
//! use moneyball::portfolio::{PortfolioOptimizer, OptimizationMethod};
//!
//! let optimizer = PortfolioOptimizer::from_returns(names, &rows, 0.0, 365)?;
//! let result = optimizer.optimize(OptimizationMethod::MaxReturn { max_volatility: None })?;
//! ```

use thiserror::Error;

/// Portfolio optimization errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PortfolioError {
    #[error("Insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Singular covariance matrix - strategies may be perfectly correlated")]
    SingularMatrix,

    #[error("Invalid constraint: {0}")]
    InvalidConstraint(String),
}

/// Optimization method to use
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptimizationMethod {
    /// Highest expected return; with a cap, the best return whose annualized
    /// volatility stays within it
    MaxReturn { max_volatility: Option<f64> },
    /// Maximum Sharpe ratio portfolio (best risk-adjusted return)
    MaxSharpe,
    /// Minimum variance portfolio (lowest risk)
    MinVariance,
    /// Risk Parity (equal risk contribution)
    RiskParity,
    /// Equal Weight (1/N)
    EqualWeight,
}

/// Optimized portfolio result
#[derive(Debug, Clone)]
pub struct OptimizedPortfolio {
    /// Weights, same order as input
    pub weights: Vec<f64>,
    /// Expected portfolio return (annualized)
    pub expected_return: f64,
    /// Portfolio volatility (annualized)
    pub volatility: f64,
    pub sharpe_ratio: f64,
    /// Effective number of strategies (1/sum(w^2))
    pub effective_n: f64,
    /// Risk contributions per strategy
    pub risk_contributions: Vec<f64>,
}

/// Portfolio optimizer
pub struct PortfolioOptimizer {
    symbols: Vec<String>,
    /// Expected returns vector (annualized)
    expected_returns: Vec<f64>,
    /// Covariance matrix (annualized)
    covariance_matrix: Vec<Vec<f64>>,
    /// Risk-free rate (annualized)
    risk_free_rate: f64,
    max_iterations: usize,
    tolerance: f64,
}

impl PortfolioOptimizer {
    /// Create optimizer from returns matrix
    ///
    /// # Arguments
    /// * `symbols` - Strategy names
    /// * `returns` - Matrix of returns [time][strategy], each row is a period
    /// * `risk_free_rate` - Annual risk-free rate
    /// * `annualization_factor` - Periods per year (365 for daily betting)
    pub fn from_returns(
        symbols: Vec<String>,
        returns: &[Vec<f64>],
        risk_free_rate: f64,
        annualization_factor: u32,
    ) -> Result<Self, PortfolioError> {
        let n_assets = symbols.len();
        let n_periods = returns.len();

        if n_assets == 0 {
            return Err(PortfolioError::InsufficientData { required: 1, actual: 0 });
        }
        if n_periods < 2 {
            return Err(PortfolioError::InsufficientData {
                required: 2,
                actual: n_periods,
            });
        }
        for row in returns {
            if row.len() != n_assets {
                return Err(PortfolioError::DimensionMismatch {
                    expected: n_assets,
                    actual: row.len(),
                });
            }
        }

        let ann_factor = annualization_factor as f64;

        let mut mean_returns = vec![0.0; n_assets];
        for row in returns {
            for (j, ret) in row.iter().enumerate() {
                mean_returns[j] += ret;
            }
        }
        for ret in &mut mean_returns {
            *ret /= n_periods as f64;
        }

        let mut covariance_matrix = vec![vec![0.0; n_assets]; n_assets];
        for row in returns {
            for i in 0..n_assets {
                for j in 0..n_assets {
                    covariance_matrix[i][j] += (row[i] - mean_returns[i]) * (row[j] - mean_returns[j]);
                }
            }
        }

        // Sample covariance, annualized
        let divisor = (n_periods - 1) as f64;
        for row in &mut covariance_matrix {
            for value in row.iter_mut() {
                *value = *value / divisor * ann_factor;
            }
        }

        let expected_returns = mean_returns.iter().map(|r| r * ann_factor).collect();

        Ok(Self {
            symbols,
            expected_returns,
            covariance_matrix,
            risk_free_rate,
            max_iterations: 1000,
            tolerance: 1e-10,
        })
    }

    /// Create optimizer from pre-computed statistics
    pub fn from_statistics(
        symbols: Vec<String>,
        expected_returns: Vec<f64>,
        covariance_matrix: Vec<Vec<f64>>,
        risk_free_rate: f64,
    ) -> Result<Self, PortfolioError> {
        let n = symbols.len();

        if expected_returns.len() != n {
            return Err(PortfolioError::DimensionMismatch {
                expected: n,
                actual: expected_returns.len(),
            });
        }
        if covariance_matrix.len() != n {
            return Err(PortfolioError::DimensionMismatch {
                expected: n,
                actual: covariance_matrix.len(),
            });
        }
        for row in &covariance_matrix {
            if row.len() != n {
                return Err(PortfolioError::DimensionMismatch {
                    expected: n,
                    actual: row.len(),
                });
            }
        }

        Ok(Self {
            symbols,
            expected_returns,
            covariance_matrix,
            risk_free_rate,
            max_iterations: 1000,
            tolerance: 1e-10,
        })
    }

    /// Optimize portfolio using specified method
    pub fn optimize(&self, method: OptimizationMethod) -> Result<OptimizedPortfolio, PortfolioError> {
        let weights = match method {
            OptimizationMethod::EqualWeight => self.equal_weight(),
            OptimizationMethod::MinVariance => self.min_variance()?,
            OptimizationMethod::MaxSharpe => self.max_sharpe()?,
            OptimizationMethod::RiskParity => self.risk_parity(),
            OptimizationMethod::MaxReturn { max_volatility } => self.max_return(max_volatility)?,
        };

        Ok(self.build_result(weights))
    }

    /// Equal weight portfolio (1/N)
    fn equal_weight(&self) -> Vec<f64> {
        let n = self.symbols.len();
        vec![1.0 / n as f64; n]
    }

    /// Minimum variance portfolio using analytical solution
    fn min_variance(&self) -> Result<Vec<f64>, PortfolioError> {
        let n = self.symbols.len();

        // w = (Σ^-1 * 1) / (1' * Σ^-1 * 1)
        let cov_inv = self.invert_matrix(&self.covariance_matrix)?;

        let sigma_inv_ones: Vec<f64> = (0..n).map(|i| cov_inv[i].iter().sum()).collect();
        let denom: f64 = sigma_inv_ones.iter().sum();

        if denom.abs() < self.tolerance {
            return Err(PortfolioError::SingularMatrix);
        }

        let mut weights: Vec<f64> = sigma_inv_ones.iter().map(|x| x / denom).collect();
        self.apply_constraints(&mut weights);

        Ok(weights)
    }

    /// Maximum Sharpe ratio portfolio
    fn max_sharpe(&self) -> Result<Vec<f64>, PortfolioError> {
        let n = self.symbols.len();

        // w = (Σ^-1 * (μ - rf)) / (1' * Σ^-1 * (μ - rf))
        let cov_inv = self.invert_matrix(&self.covariance_matrix)?;

        let excess_returns: Vec<f64> = self.expected_returns.iter().map(|r| r - self.risk_free_rate).collect();

        let mut sigma_inv_excess = vec![0.0; n];
        for i in 0..n {
            for j in 0..n {
                sigma_inv_excess[i] += cov_inv[i][j] * excess_returns[j];
            }
        }

        let denom: f64 = sigma_inv_excess.iter().sum();
        if denom.abs() < self.tolerance {
            // Same excess return everywhere, fall back to min variance
            return self.min_variance();
        }

        let mut weights: Vec<f64> = sigma_inv_excess.iter().map(|x| x / denom).collect();
        self.apply_constraints(&mut weights);

        Ok(weights)
    }

    /// Risk parity portfolio (equal risk contribution)
    fn risk_parity(&self) -> Vec<f64> {
        let n = self.symbols.len();

        // Initial guess: inverse volatility weighted
        let mut weights: Vec<f64> = (0..n)
            .map(|i| {
                let vol = self.covariance_matrix[i][i].max(0.0).sqrt();
                if vol > 0.0 {
                    1.0 / vol
                } else {
                    1.0
                }
            })
            .collect();
        normalize(&mut weights);

        for _iter in 0..self.max_iterations {
            let rc = self.risk_contributions(&weights);
            let portfolio_vol = self.portfolio_volatility(&weights);
            if portfolio_vol <= 0.0 {
                break;
            }

            let target_rc = portfolio_vol / n as f64;
            let max_diff = rc.iter().map(|r| (r - target_rc).abs()).fold(0.0, f64::max);
            if max_diff < self.tolerance * 100.0 {
                break;
            }

            for i in 0..n {
                weights[i] *= target_rc / (rc[i] + self.tolerance);
            }
            normalize(&mut weights);
        }

        self.apply_constraints(&mut weights);
        weights
    }

    /// Highest expected return, optionally within a volatility cap.
    ///
    /// Uncapped, this is the corner portfolio on the best mean (ties split
    /// equally). With a cap, the mean-variance utility `μ'w - λ/2 w'Σw` is
    /// maximized over the simplex for the smallest risk aversion `λ` that keeps
    /// volatility within the cap. If even the minimum-variance portfolio
    /// breaches the cap, that portfolio is returned.
    fn max_return(&self, max_volatility: Option<f64>) -> Result<Vec<f64>, PortfolioError> {
        let corner = self.corner_portfolio();
        let Some(cap) = max_volatility else {
            return Ok(corner);
        };
        if cap.is_nan() || cap <= 0.0 {
            return Err(PortfolioError::InvalidConstraint(format!(
                "max volatility must be positive, got {}",
                cap
            )));
        }
        if self.portfolio_volatility(&corner) <= cap {
            return Ok(corner);
        }

        let least_risk = self.simplex_min_variance();
        if self.portfolio_volatility(&least_risk) >= cap {
            return Ok(least_risk);
        }

        // Volatility falls as risk aversion rises; bisect in log space
        let (mut lo, mut hi) = (-6.0_f64, 10.0_f64);
        let mut best = least_risk;
        for _ in 0..50 {
            let mid = 0.5 * (lo + hi);
            let weights = self.mean_variance(10f64.powf(mid));
            if self.portfolio_volatility(&weights) <= cap {
                best = weights;
                hi = mid;
            } else {
                lo = mid;
            }
        }
        Ok(best)
    }

    /// All weight on the highest expected return, ties split equally
    fn corner_portfolio(&self) -> Vec<f64> {
        let top = self.expected_returns.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut weights: Vec<f64> = self
            .expected_returns
            .iter()
            .map(|r| if (top - r).abs() <= self.tolerance { 1.0 } else { 0.0 })
            .collect();
        normalize(&mut weights);
        weights
    }

    /// Long-only minimum variance by projected gradient
    fn simplex_min_variance(&self) -> Vec<f64> {
        self.projected_gradient(|w| {
            let sigma_w = self.sigma_times(w);
            sigma_w.iter().map(|g| -g).collect()
        }, 1.0)
    }

    /// Maximize `μ'w - λ/2 w'Σw` over the simplex
    fn mean_variance(&self, risk_aversion: f64) -> Vec<f64> {
        self.projected_gradient(|w| {
            let sigma_w = self.sigma_times(w);
            self.expected_returns
                .iter()
                .zip(sigma_w)
                .map(|(mu, s)| mu - risk_aversion * s)
                .collect()
        }, risk_aversion)
    }

    /// Gradient ascent projected onto the simplex, step `1/(λ tr Σ)`
    fn projected_gradient<F>(&self, gradient: F, curvature: f64) -> Vec<f64>
    where
        F: Fn(&[f64]) -> Vec<f64>,
    {
        let trace: f64 = (0..self.symbols.len()).map(|i| self.covariance_matrix[i][i]).sum();
        let lipschitz = curvature * trace;
        if lipschitz <= self.tolerance {
            return self.equal_weight();
        }
        let step = 1.0 / lipschitz;

        let mut weights = self.equal_weight();
        for _iter in 0..self.max_iterations {
            let grad = gradient(&weights);
            let candidate: Vec<f64> = weights.iter().zip(&grad).map(|(w, g)| w + step * g).collect();
            let next = project_to_simplex(&candidate);
            let moved = next.iter().zip(&weights).map(|(a, b)| (a - b).abs()).fold(0.0, f64::max);
            weights = next;
            if moved < self.tolerance {
                break;
            }
        }
        weights
    }

    /// Clip to long-only and renormalize, equal weight if nothing is left
    fn apply_constraints(&self, weights: &mut [f64]) {
        for w in weights.iter_mut() {
            if !w.is_finite() || *w < 0.0 {
                *w = 0.0;
            }
        }
        if weights.iter().sum::<f64>() > 0.0 {
            normalize(weights);
        } else {
            let eq = 1.0 / weights.len() as f64;
            weights.iter_mut().for_each(|w| *w = eq);
        }
    }

    /// Build final result with all metrics
    fn build_result(&self, weights: Vec<f64>) -> OptimizedPortfolio {
        let n = self.symbols.len();

        let expected_return: f64 = weights.iter().zip(&self.expected_returns).map(|(w, r)| w * r).sum();
        let volatility = self.portfolio_volatility(&weights);
        let sharpe_ratio = if volatility > 0.0 {
            (expected_return - self.risk_free_rate) / volatility
        } else {
            0.0
        };

        let sum_w_sq: f64 = weights.iter().map(|w| w * w).sum();
        let effective_n = if sum_w_sq > 0.0 { 1.0 / sum_w_sq } else { n as f64 };

        let risk_contributions = self.risk_contributions(&weights);

        OptimizedPortfolio {
            weights,
            expected_return,
            volatility,
            sharpe_ratio,
            effective_n,
            risk_contributions,
        }
    }

    fn sigma_times(&self, weights: &[f64]) -> Vec<f64> {
        self.covariance_matrix
            .iter()
            .map(|row| row.iter().zip(weights).map(|(c, w)| c * w).sum())
            .collect()
    }

    /// Calculate portfolio volatility
    pub fn portfolio_volatility(&self, weights: &[f64]) -> f64 {
        let variance: f64 = weights.iter().zip(self.sigma_times(weights)).map(|(w, s)| w * s).sum();
        variance.max(0.0).sqrt()
    }

    /// Calculate risk contributions per strategy
    fn risk_contributions(&self, weights: &[f64]) -> Vec<f64> {
        let portfolio_vol = self.portfolio_volatility(weights);
        if portfolio_vol <= 0.0 {
            return vec![0.0; weights.len()];
        }
        // RC_i = w_i * (Σw)_i / σ_p
        weights
            .iter()
            .zip(self.sigma_times(weights))
            .map(|(w, mrc)| w * mrc / portfolio_vol)
            .collect()
    }

    /// Invert a matrix using Gauss-Jordan elimination
    fn invert_matrix(&self, matrix: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, PortfolioError> {
        let n = matrix.len();

        // Augmented matrix [A|I]
        let mut aug = vec![vec![0.0; 2 * n]; n];
        for i in 0..n {
            aug[i][..n].copy_from_slice(&matrix[i]);
            aug[i][n + i] = 1.0;
        }

        for col in 0..n {
            // Partial pivoting
            let mut max_row = col;
            let mut max_val = aug[col][col].abs();
            for (row, values) in aug.iter().enumerate().skip(col + 1) {
                if values[col].abs() > max_val {
                    max_val = values[col].abs();
                    max_row = row;
                }
            }

            if max_val < self.tolerance {
                return Err(PortfolioError::SingularMatrix);
            }
            if max_row != col {
                aug.swap(col, max_row);
            }

            let pivot = aug[col][col];
            for value in aug[col].iter_mut() {
                *value /= pivot;
            }

            let col_row = aug[col].clone();
            for (row, values) in aug.iter_mut().enumerate() {
                if row != col {
                    let factor = values[col];
                    for (value, c) in values.iter_mut().zip(&col_row) {
                        *value -= factor * c;
                    }
                }
            }
        }

        Ok(aug.into_iter().map(|row| row[n..].to_vec()).collect())
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn expected_returns(&self) -> &[f64] {
        &self.expected_returns
    }

    pub fn covariance_matrix(&self) -> &[Vec<f64>] {
        &self.covariance_matrix
    }
}

fn normalize(weights: &mut [f64]) {
    let sum: f64 = weights.iter().sum();
    if sum > 0.0 {
        weights.iter_mut().for_each(|w| *w /= sum);
    }
}

/// Euclidean projection onto `{w : w ≥ 0, Σw = 1}`
fn project_to_simplex(v: &[f64]) -> Vec<f64> {
    let mut sorted = v.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));

    let mut cumulative = 0.0;
    let mut theta = 0.0;
    for (i, u) in sorted.iter().enumerate() {
        cumulative += u;
        let t = (cumulative - 1.0) / (i + 1) as f64;
        if u - t > 0.0 {
            theta = t;
        }
    }
    v.iter().map(|x| (x - theta).max(0.0)).collect()
}
