//! Daily return series and performance statistics
//!
//! A [`ReturnSeries`] holds one P&L value per UTC calendar date, expressed as
//! a fraction of the bankroll at the start of that day. Dates are kept in a
//! `BTreeMap`, so a series is always strictly increasing with no duplicates.

mod metrics;

pub use metrics::{DrawdownTracker, SeriesMetrics};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One (date, value) point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyReturn {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SeriesRecord {
    name: String,
    returns: Vec<DailyReturn>,
}

/// Date-indexed returns of one strategy or portfolio
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "SeriesRecord", into = "SeriesRecord")]
pub struct ReturnSeries {
    name: String,
    points: BTreeMap<NaiveDate, f64>,
}

impl From<SeriesRecord> for ReturnSeries {
    fn from(record: SeriesRecord) -> Self {
        let mut series = ReturnSeries::new(record.name);
        for point in record.returns {
            series.add(point.date, point.value);
        }
        series
    }
}

impl From<ReturnSeries> for SeriesRecord {
    fn from(series: ReturnSeries) -> Self {
        let returns = series.iter().map(|(date, value)| DailyReturn { date, value }).collect();
        SeriesRecord { name: series.name, returns }
    }
}

impl ReturnSeries {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points: BTreeMap::new(),
        }
    }

    /// Build from points; values on a repeated date are summed
    pub fn from_points<I>(name: impl Into<String>, points: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        let mut series = Self::new(name);
        for (date, value) in points {
            series.add(date, value);
        }
        series
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Accumulate `value` into `date`
    pub fn add(&mut self, date: NaiveDate, value: f64) {
        *self.points.entry(date).or_insert(0.0) += value;
    }

    /// Overwrite the value at `date`
    pub fn set(&mut self, date: NaiveDate, value: f64) {
        self.points.insert(date, value);
    }

    /// Value at `date`, 0.0 when absent
    pub fn get(&self, date: NaiveDate) -> f64 {
        self.points.get(&date).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.points.contains_key(&date)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.keys().next_back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.points.iter().map(|(d, v)| (*d, *v))
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.points.keys().copied()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.values().copied().collect()
    }

    /// One point per calendar day from first to last date, gaps at 0.0
    pub fn resample_daily(&self) -> ReturnSeries {
        let (Some(first), Some(last)) = (self.first_date(), self.last_date()) else {
            return self.clone();
        };
        let points = first
            .iter_days()
            .take_while(|d| *d <= last)
            .map(|d| (d, self.get(d)))
            .collect();
        ReturnSeries { name: self.name.clone(), points }
    }

    /// Points on or after `start`
    pub fn since(&self, start: NaiveDate) -> ReturnSeries {
        ReturnSeries {
            name: self.name.clone(),
            points: self.points.range(start..).map(|(d, v)| (*d, *v)).collect(),
        }
    }

    /// Compute performance statistics
    pub fn metrics(&self, annualization_factor: f64) -> SeriesMetrics {
        SeriesMetrics::from_returns(&self.values(), annualization_factor)
    }
}
