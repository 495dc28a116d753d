//! Per-strategy state
//!
//! A strategy owns its training table, the "place" threshold, the processed
//! feature table, the chosen kelly ratio with its study, and the fitted daily
//! returns. Everything lives in memory until [`Strategy::save`]; replacing the
//! table or the threshold drops the derived state.
//!
//! On disk, under `<root>/<strategy>/`:
//!
//! ```text
//! strategy.json   place threshold
//! table.json      training table
//! features.json   processed table, keyed by table hash
//! kelly.json      kelly ratio and study
//! returns.json    fitted daily returns
//! ```

mod cache;
#[cfg(test)]
mod tests;

use crate::error::{Error, Result};
use crate::pricing::MissingPriceResolver;
use crate::returns::{ReturnSeries, SeriesMetrics};
use crate::search::{KellyRatio, KellyRatioSearch};
use crate::simulator::{features_key, process_table, ProcessedTable};
use crate::storage;
use crate::types::EventTable;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

const STRATEGY_FILE: &str = "strategy.json";
const TABLE_FILE: &str = "table.json";
const KELLY_FILE: &str = "kelly.json";
const RETURNS_FILE: &str = "returns.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategySettings {
    /// Finishing within the top `place` counts as a win
    pub place: usize,
}

/// Summary of one fit
#[derive(Debug, Clone, Serialize)]
pub struct FitOutcome {
    pub strategy: String,
    pub kelly_ratio: f64,
    pub score: f64,
    pub metrics: SeriesMetrics,
    pub bets: usize,
    pub trials_evaluated: usize,
    pub trials_reused: usize,
    pub feature_cache_hit: bool,
}

#[derive(Debug, Clone)]
pub struct Strategy {
    name: String,
    dir: PathBuf,
    settings: StrategySettings,
    table: Option<EventTable>,
    table_dirty: bool,
    features: Option<ProcessedTable>,
    features_dirty: bool,
    kelly: Option<KellyRatio>,
    returns: Option<ReturnSeries>,
}

impl Strategy {
    /// New, unsaved strategy stored under `root/name`
    pub fn create(root: &Path, name: impl Into<String>, place: usize) -> Result<Self> {
        if place == 0 {
            return Err(Error::InvalidPlace);
        }
        let name = name.into();
        Ok(Self {
            dir: root.join(&name),
            name,
            settings: StrategySettings { place },
            table: None,
            table_dirty: false,
            features: None,
            features_dirty: false,
            kelly: None,
            returns: None,
        })
    }

    /// Read a saved strategy; only `strategy.json` is required
    pub fn load(root: &Path, name: &str) -> Result<Self> {
        let dir = root.join(name);
        let settings: StrategySettings = storage::read_json(&dir.join(STRATEGY_FILE))?;
        if settings.place == 0 {
            return Err(Error::InvalidPlace);
        }
        let strategy = Self {
            name: name.to_string(),
            settings,
            table: storage::read_json_opt(&dir.join(TABLE_FILE))?,
            table_dirty: false,
            features: None,
            features_dirty: false,
            kelly: storage::read_json_opt(&dir.join(KELLY_FILE))?,
            returns: storage::read_json_opt(&dir.join(RETURNS_FILE))?,
            dir,
        };
        info!(
            strategy = %strategy.name,
            has_table = strategy.table.is_some(),
            fitted = strategy.returns.is_some(),
            "Loaded strategy"
        );
        Ok(strategy)
    }

    /// Write every piece of state that is present
    pub fn save(&mut self) -> Result<()> {
        storage::write_json(&self.dir.join(STRATEGY_FILE), &self.settings)?;

        if self.table_dirty {
            if let Some(table) = &self.table {
                storage::write_json(&self.dir.join(TABLE_FILE), table)?;
            }
            self.table_dirty = false;
        }
        if self.features_dirty {
            if let Some(features) = &self.features {
                cache::store(&self.dir, features)?;
            }
            self.features_dirty = false;
        }
        match &self.kelly {
            Some(kelly) => storage::write_json(&self.dir.join(KELLY_FILE), kelly)?,
            None => storage::remove(&self.dir.join(KELLY_FILE))?,
        }
        match &self.returns {
            Some(returns) => storage::write_json(&self.dir.join(RETURNS_FILE), returns)?,
            None => storage::remove(&self.dir.join(RETURNS_FILE))?,
        }

        info!(strategy = %self.name, dir = %self.dir.display(), "Saved strategy");
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn place(&self) -> usize {
        self.settings.place
    }

    /// Change the threshold; derived state is dropped
    pub fn set_place(&mut self, place: usize) -> Result<()> {
        if place == 0 {
            return Err(Error::InvalidPlace);
        }
        if place != self.settings.place {
            self.settings.place = place;
            self.invalidate();
        }
        Ok(())
    }

    pub fn table(&self) -> Result<&EventTable> {
        self.table.as_ref().ok_or_else(|| Error::MissingTable {
            strategy: self.name.clone(),
        })
    }

    /// Replace the training table; derived state is dropped
    pub fn set_table(&mut self, table: EventTable) {
        self.table = Some(table);
        self.table_dirty = true;
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.features = None;
        self.features_dirty = false;
        self.returns = None;
    }

    pub fn kelly(&self) -> Option<&KellyRatio> {
        self.kelly.as_ref()
    }

    pub fn kelly_ratio(&self) -> Result<f64> {
        self.kelly.as_ref().map(|k| k.ratio).ok_or_else(|| Error::NotFitted {
            strategy: self.name.clone(),
        })
    }

    pub fn returns(&self) -> Result<&ReturnSeries> {
        self.returns.as_ref().ok_or_else(|| Error::NotFitted {
            strategy: self.name.clone(),
        })
    }

    pub fn is_fitted(&self) -> bool {
        self.kelly.is_some() && self.returns.is_some()
    }

    /// Make sure the processed table matches the training table and the
    /// resolver's prices.
    ///
    /// Returns whether the result came from memory or the cache file.
    pub fn compute_features(&mut self, resolver: &dyn MissingPriceResolver) -> Result<bool> {
        let table = self.table()?;
        let hash = features_key(table, self.settings.place, resolver);

        if self.features.as_ref().is_some_and(|f| f.hash == hash) {
            return Ok(true);
        }
        if let Some(cached) = cache::load(&self.dir, &hash) {
            self.features = Some(cached);
            self.features_dirty = false;
            return Ok(true);
        }

        let processed = process_table(table, self.settings.place, resolver)?;
        self.features = Some(processed);
        self.features_dirty = true;
        Ok(false)
    }

    /// Processed table, once computed
    pub fn features(&self) -> Option<&ProcessedTable> {
        self.features.as_ref()
    }

    /// Search the kelly ratio and compute the fitted returns.
    ///
    /// Nothing is written; call [`Strategy::save`] afterwards.
    pub fn fit(
        &mut self,
        now: DateTime<Utc>,
        search: &KellyRatioSearch,
        resolver: &dyn MissingPriceResolver,
    ) -> Result<FitOutcome> {
        let cache_hit = self.compute_features(resolver)?;
        let processed = self.features.as_ref().ok_or_else(|| Error::MissingTable {
            strategy: self.name.clone(),
        })?;

        let mut study = self.kelly.as_ref().map(|k| k.study.clone()).unwrap_or_default();
        let outcome = search.run(&self.name, processed, &mut study, now)?;
        let bets = processed.bets.len();

        let metrics = outcome.returns.metrics(search.config().annualization_factor);
        self.kelly = Some(KellyRatio {
            ratio: outcome.kelly_ratio,
            study,
        });
        self.returns = Some(outcome.returns);

        info!(
            strategy = %self.name,
            kelly_ratio = outcome.kelly_ratio,
            total_return = metrics.total_return,
            max_drawdown = metrics.max_drawdown,
            "Fitted strategy"
        );

        Ok(FitOutcome {
            strategy: self.name.clone(),
            kelly_ratio: outcome.kelly_ratio,
            score: outcome.best.score,
            metrics,
            bets,
            trials_evaluated: outcome.evaluated,
            trials_reused: outcome.reused,
            feature_cache_hit: cache_hit,
        })
    }
}
