//! Next-bet selection
//!
//! Filters each strategy's forward-looking table to the betting horizon and
//! turns the events found there into weighted recommendation records.

#[cfg(test)]
mod tests;

use crate::error::Result;
use crate::storage;
use crate::types::{Event, EventTable};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// One participant of a recommended event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetParticipant {
    pub name: String,
    pub probability: f64,
}

/// One recommendation: an upcoming event seen through one strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bet {
    pub strategy: String,
    pub league: String,
    pub kelly: f64,
    pub weight: f64,
    pub participants: Vec<BetParticipant>,
    pub datetime: DateTime<Utc>,
    /// Kept for ordering, not part of the output
    #[serde(skip)]
    pub event_id: String,
}

/// Recommendation output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NextBets {
    pub bets: Vec<Bet>,
}

impl NextBets {
    pub fn len(&self) -> usize {
        self.bets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bets.is_empty()
    }

    /// Write the recommendations to `path` as JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        storage::write_json(path, self)?;
        info!(path = %path.display(), bets = self.len(), "Wrote next bets");
        Ok(())
    }
}

/// What the selector needs from one strategy
#[derive(Debug, Clone, Copy)]
pub struct BetSource<'a> {
    pub strategy: &'a str,
    pub table: &'a EventTable,
    pub kelly: f64,
    /// Portfolio weight; `None` when the portfolio has none on record
    pub weight: Option<f64>,
}

pub struct NextBetSelector {
    lookahead: Duration,
}

impl Default for NextBetSelector {
    fn default() -> Self {
        Self::new(Duration::hours(24))
    }
}

impl NextBetSelector {
    pub fn new(lookahead: Duration) -> Self {
        Self { lookahead }
    }

    /// Scheduled after `now` and no later than `now + lookahead`
    pub fn in_horizon(&self, event: &Event, now: DateTime<Utc>) -> bool {
        event.datetime > now && event.datetime <= now + self.lookahead
    }

    /// Recommendation for one event; participants without a probability are left out
    fn bet(&self, source: &BetSource<'_>, weight: f64, event: &Event) -> Bet {
        let participants = event
            .participants
            .iter()
            .filter_map(|p| {
                p.known_probability().map(|probability| BetParticipant {
                    name: p.name.clone(),
                    probability,
                })
            })
            .collect();
        Bet {
            strategy: source.strategy.to_string(),
            league: event.league.clone(),
            kelly: source.kelly,
            weight,
            participants,
            datetime: event.datetime,
            event_id: event.id.clone(),
        }
    }

    /// Records ordered by datetime, then strategy, then event id
    pub fn select(&self, sources: &[BetSource<'_>], now: DateTime<Utc>) -> NextBets {
        let mut bets = Vec::new();

        for source in sources {
            let weight = source.weight.unwrap_or_else(|| {
                warn!(strategy = source.strategy, "No portfolio weight on record, using 0.0");
                0.0
            });
            let before = bets.len();
            bets.extend(
                source
                    .table
                    .events
                    .iter()
                    .filter(|e| self.in_horizon(e, now))
                    .filter(|e| {
                        let usable = e.has_probabilities();
                        if !usable {
                            debug!(event = %e.id, strategy = source.strategy, "No probabilities, omitting");
                        }
                        usable
                    })
                    .map(|e| self.bet(source, weight, e)),
            );
            debug!(strategy = source.strategy, bets = bets.len() - before, "Selected upcoming events");
        }

        bets.sort_by(|a, b| {
            a.datetime
                .cmp(&b.datetime)
                .then_with(|| a.strategy.cmp(&b.strategy))
                .then_with(|| a.event_id.cmp(&b.event_id))
        });

        info!(
            strategies = sources.len(),
            bets = bets.len(),
            until = %(now + self.lookahead),
            "Next bets"
        );
        NextBets { bets }
    }
}
