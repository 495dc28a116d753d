//! Kelly ratio search
//!
//! Grid search over capital-scaling multipliers `k ∈ (0, 1]`. Each trial
//! scales every raw kelly fraction by `k`, replays the strategy, and scores
//! the recent part of the resulting series. Trials are independent and run
//! on the rayon pool; the winner is picked afterwards in grid order, so the
//! result never depends on which worker finished first.


use crate::error::{Error, Result};
use crate::returns::{ReturnSeries, SeriesMetrics};
use crate::simulator::{ProcessedTable, ReturnsSimulator};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Risk-adjusted score maximized by the search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Annualized return over max drawdown
    #[default]
    Calmar,
    /// Annualized mean over volatility
    Sharpe,
}

impl Objective {
    pub fn score(&self, metrics: &SeriesMetrics) -> f64 {
        let score = match self {
            Objective::Calmar => metrics.calmar,
            Objective::Sharpe => metrics.sharpe,
        };
        if score.is_nan() {
            f64::NEG_INFINITY
        } else {
            score
        }
    }
}

/// Search settings
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Grid size; candidates are `1/n, 2/n, ..., 1`
    pub trials: usize,
    /// Only dates within this horizon before "now" are scored
    pub validation_horizon: Duration,
    pub annualization_factor: f64,
    pub objective: Objective,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            trials: 100,
            validation_horizon: Duration::days(365),
            annualization_factor: 365.0,
            objective: Objective::Calmar,
        }
    }
}

/// One evaluated multiplier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub kelly_ratio: f64,
    #[serde(with = "non_finite")]
    pub score: f64,
    /// Drawdown over the scored window
    pub max_drawdown: f64,
    /// Bankroll wiped out somewhere in the full history
    pub ruined: bool,
}

impl Trial {
    /// Whether `self` beats `other`: higher score, then larger multiplier
    fn beats(&self, other: &Trial) -> bool {
        self.score > other.score || (self.score == other.score && self.kelly_ratio > other.kelly_ratio)
    }
}

/// Everything besides the table that a trial's score depends on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StudyScoring {
    pub objective: Objective,
    pub annualization_factor: f64,
    /// First scored date
    pub evaluation_start: NaiveDate,
}

/// Resumable trial history for one training table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KellyStudy {
    /// Hash of the table the trials were run on
    pub table_hash: String,
    /// How the trials were scored; `None` until the first run
    #[serde(default)]
    pub scoring: Option<StudyScoring>,
    pub trials: Vec<Trial>,
}

impl KellyStudy {
    pub fn new(table_hash: impl Into<String>) -> Self {
        Self {
            table_hash: table_hash.into(),
            scoring: None,
            trials: Vec::new(),
        }
    }

    /// Trial already run at `kelly_ratio`
    pub fn find(&self, kelly_ratio: f64) -> Option<&Trial> {
        self.trials.iter().find(|t| (t.kelly_ratio - kelly_ratio).abs() < 1e-12)
    }

    /// Best trial: highest score, ties to the larger multiplier
    pub fn best(&self) -> Option<&Trial> {
        self.trials.iter().fold(None, |best: Option<&Trial>, t| match best {
            Some(b) if !t.beats(b) => Some(b),
            _ => Some(t),
        })
    }

    /// Keep the history only if it was built from `table_hash` and scored
    /// the same way
    fn retain_for(&mut self, table_hash: &str, scoring: StudyScoring) -> bool {
        if self.table_hash == table_hash && self.scoring == Some(scoring) {
            return true;
        }
        self.table_hash = table_hash.to_string();
        self.scoring = Some(scoring);
        self.trials.clear();
        false
    }

    fn record(&mut self, trial: Trial) {
        self.trials.push(trial);
        self.trials.sort_by(|a, b| a.kelly_ratio.total_cmp(&b.kelly_ratio));
    }
}

/// Persisted multiplier of a strategy plus the study behind it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KellyRatio {
    pub ratio: f64,
    #[serde(default)]
    pub study: KellyStudy,
}

/// Result of a search
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub kelly_ratio: f64,
    pub best: Trial,
    /// Full history replayed at the chosen multiplier, daily
    pub returns: ReturnSeries,
    /// Trials computed in this run
    pub evaluated: usize,
    /// Trials taken from the study
    pub reused: usize,
}

pub struct KellyRatioSearch {
    config: SearchConfig,
}

impl KellyRatioSearch {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Candidate multipliers, evenly spaced over (0, 1]
    pub fn grid(&self) -> Vec<f64> {
        let n = self.config.trials;
        (1..=n).map(|i| i as f64 / n as f64).collect()
    }

    /// First date scored for a search run at `now`
    pub fn evaluation_start(&self, now: DateTime<Utc>) -> NaiveDate {
        (now - self.config.validation_horizon).date_naive()
    }

    /// Run the grid over `table`, reusing and extending `study`.
    pub fn run(
        &self,
        name: &str,
        table: &ProcessedTable,
        study: &mut KellyStudy,
        now: DateTime<Utc>,
    ) -> Result<SearchOutcome> {
        if self.config.trials == 0 {
            return Err(Error::InvalidSearch("grid needs at least one trial".to_string()));
        }
        if table.is_empty() {
            return Err(Error::InvalidSearch(format!("{} has no settled events", name)));
        }

        let start = self.evaluation_start(now);
        let scoring = StudyScoring {
            objective: self.config.objective,
            annualization_factor: self.config.annualization_factor,
            evaluation_start: start,
        };
        if !study.retain_for(&table.hash, scoring) {
            debug!(strategy = %name, "Study built from another table or scoring, starting over");
        }

        let window_empty = table.settled_dates.range(start..).next().is_none();
        if window_empty {
            warn!(strategy = %name, %start, "No settled events in validation window, scoring full history");
        }

        let grid = self.grid();
        let pending: Vec<f64> = grid.iter().copied().filter(|k| study.find(*k).is_none()).collect();
        let reused = grid.len() - pending.len();

        info!(
            strategy = %name,
            trials = grid.len(),
            pending = pending.len(),
            reused,
            "Searching kelly ratio"
        );

        let sim = ReturnsSimulator::new(table);
        let evaluated: Vec<Trial> = pending
            .par_iter()
            .map(|k| self.evaluate(&sim, name, *k, start, window_empty))
            .collect();
        let evaluated_count = evaluated.len();
        for trial in evaluated {
            study.record(trial);
        }

        let mut best: Option<&Trial> = None;
        for k in &grid {
            let Some(trial) = study.find(*k) else { continue };
            best = match best {
                Some(b) if !trial.beats(b) => Some(b),
                _ => Some(trial),
            };
        }
        let best = best
            .cloned()
            .ok_or_else(|| Error::InvalidSearch("no trials evaluated".to_string()))?;
        if best.ruined {
            warn!(strategy = %name, trials = grid.len(), "Every kelly ratio ruins the bankroll");
            return Err(Error::InvalidSearch(format!(
                "every kelly ratio on the grid ruins {}",
                name
            )));
        }

        let returns = sim.simulate(name, best.kelly_ratio).resample_daily();

        info!(
            strategy = %name,
            k = best.kelly_ratio,
            score = best.score,
            drawdown = best.max_drawdown,
            "Selected kelly ratio"
        );

        Ok(SearchOutcome {
            kelly_ratio: best.kelly_ratio,
            best,
            returns,
            evaluated: evaluated_count,
            reused,
        })
    }

    fn evaluate(
        &self,
        sim: &ReturnsSimulator<'_>,
        name: &str,
        kelly_ratio: f64,
        start: NaiveDate,
        score_full_history: bool,
    ) -> Trial {
        let full = sim.simulate(name, kelly_ratio).resample_daily();
        let window = if score_full_history { full.clone() } else { full.since(start) };

        let annualization = self.config.annualization_factor;
        let ruined = full.metrics(annualization).is_ruined();
        let metrics = window.metrics(annualization);

        let score = if ruined {
            f64::NEG_INFINITY
        } else {
            self.config.objective.score(&metrics)
        };
        debug!(strategy = %name, k = kelly_ratio, score, ruined, "Kelly trial");

        Trial {
            kelly_ratio,
            score,
            max_drawdown: metrics.max_drawdown,
            ruined,
        }
    }
}

/// JSON has no infinities; store them as strings
mod non_finite {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("nan")
        } else if *value > 0.0 {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(v) => Ok(v),
            Repr::Text(s) => match s.as_str() {
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                "nan" => Ok(f64::NAN),
                other => Err(serde::de::Error::custom(format!("invalid score {}", other))),
            },
        }
    }
}
