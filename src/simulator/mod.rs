//! Returns simulation
//!
//! Replays settled events against kelly-sized stakes:
//!
//! ```text
//! EventTable ──process_table──▶ ProcessedTable ──ReturnsSimulator(k)──▶ ReturnSeries
//!             (backed outcome,                  (scale by k, normalize
//!              raw fraction, won)                per date, settle P&L)
//! ```
//!
//! A winning stake adds `price × stake` to the day's P&L and a losing stake
//! subtracts `stake`.


use crate::error::{Error, Result};
use crate::kelly::{allocate_scaled, select_backed};
use crate::pricing::{price_for, MissingPriceResolver};
use crate::returns::ReturnSeries;
use crate::types::{BetCandidate, EventTable};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Indices of the participants finishing within the top `place`.
///
/// Ranked by points, highest first. Equal points keep input order, so the
/// participant listed first takes the better rank at a tied boundary.
pub fn winners(points: &[f64], place: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|a, b| points[*b].total_cmp(&points[*a]));
    order.truncate(place);
    order.sort_unstable();
    order
}

/// Settled events reduced to the bets a strategy would have placed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedTable {
    /// [`features_key`] of the source table
    pub hash: String,
    pub place: usize,
    /// Every date with at least one settled event, bet on or not
    pub settled_dates: BTreeSet<NaiveDate>,
    pub bets: Vec<BetCandidate>,
}

impl ProcessedTable {
    pub fn is_empty(&self) -> bool {
        self.settled_dates.is_empty()
    }
}

/// Key of the processed form of `table`: its content hash, plus the
/// resolver's fingerprint when the resolver can supply prices
pub fn features_key(table: &EventTable, place: usize, resolver: &dyn MissingPriceResolver) -> String {
    let hash = table.content_hash(place);
    match resolver.fingerprint() {
        Some(prices) => format!("{}+{}", hash, prices),
        None => hash,
    }
}

/// Counts of events left out while processing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipCounts {
    pub unsettled: usize,
    pub no_eligible_outcome: usize,
}

/// Reduce `table` to one backed outcome per settled event.
///
/// Fails fast on `place == 0` or a settled event with fewer participants than
/// `place`. Events where no outcome has both a probability and a price are
/// skipped but their date still counts as settled.
pub fn process_table(
    table: &EventTable,
    place: usize,
    resolver: &dyn MissingPriceResolver,
) -> Result<ProcessedTable> {
    if place == 0 {
        return Err(Error::InvalidPlace);
    }

    let mut settled_dates = BTreeSet::new();
    let mut bets = Vec::new();
    let mut skips = SkipCounts::default();

    for event in &table.events {
        if !event.is_settled() {
            skips.unsettled += 1;
            continue;
        }
        if place > event.participants.len() {
            return Err(Error::PlaceExceedsParticipants {
                event: event.id.clone(),
                place,
                participants: event.participants.len(),
            });
        }
        settled_dates.insert(event.date());

        let backed = select_backed(event, |i| price_for(resolver, event, &event.participants[i]));
        let Some(backed) = backed else {
            debug!(event = %event.id, "No outcome with both probability and price, skipping");
            skips.no_eligible_outcome += 1;
            continue;
        };

        let points: Vec<f64> = event
            .participants
            .iter()
            .map(|p| p.points.unwrap_or(f64::NEG_INFINITY))
            .collect();
        let won = winners(&points, place).contains(&backed.index);

        bets.push(BetCandidate {
            event_id: event.id.clone(),
            date: event.date(),
            participant: event.participants[backed.index].name.clone(),
            probability: backed.probability,
            price: backed.price,
            raw_fraction: backed.raw_fraction,
            won,
        });
    }

    bets.sort_by(|a, b| a.date.cmp(&b.date));

    info!(
        events = table.len(),
        bets = bets.len(),
        dates = settled_dates.len(),
        unsettled = skips.unsettled,
        skipped = skips.no_eligible_outcome,
        "Processed event table"
    );

    Ok(ProcessedTable {
        hash: features_key(table, place, resolver),
        place,
        settled_dates,
        bets,
    })
}

/// Stake on one backed outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakeAllocation {
    pub event_id: String,
    pub date: NaiveDate,
    pub participant: String,
    pub raw_fraction: f64,
    pub stake_fraction: f64,
}

/// Replays a processed table under a chosen kelly multiplier
pub struct ReturnsSimulator<'a> {
    table: &'a ProcessedTable,
    /// Bet indices grouped by date
    by_date: BTreeMap<NaiveDate, Vec<usize>>,
}

impl<'a> ReturnsSimulator<'a> {
    pub fn new(table: &'a ProcessedTable) -> Self {
        let mut by_date: BTreeMap<NaiveDate, Vec<usize>> =
            table.settled_dates.iter().map(|d| (*d, Vec::new())).collect();
        for (i, bet) in table.bets.iter().enumerate() {
            by_date.entry(bet.date).or_default().push(i);
        }
        Self { table, by_date }
    }

    /// Bets in allocation order: by date, then table order
    fn ordered(&self) -> impl Iterator<Item = &BetCandidate> + '_ {
        self.by_date.values().flatten().map(|i| &self.table.bets[*i])
    }

    /// Normalized stakes per bet for `kelly_ratio`, by date
    pub fn allocations(&self, kelly_ratio: f64) -> Vec<StakeAllocation> {
        let mut out = Vec::with_capacity(self.table.bets.len());
        for (date, indices) in &self.by_date {
            let raw: Vec<f64> = indices.iter().map(|i| self.table.bets[*i].raw_fraction).collect();
            let stakes = allocate_scaled(&raw, kelly_ratio);
            for (i, stake) in indices.iter().zip(stakes) {
                let bet = &self.table.bets[*i];
                out.push(StakeAllocation {
                    event_id: bet.event_id.clone(),
                    date: *date,
                    participant: bet.participant.clone(),
                    raw_fraction: bet.raw_fraction,
                    stake_fraction: stake,
                });
            }
        }
        out
    }

    /// Daily P&L for `kelly_ratio`, one point per settled date
    pub fn simulate(&self, name: &str, kelly_ratio: f64) -> ReturnSeries {
        let mut series = ReturnSeries::new(name);
        for date in self.by_date.keys() {
            series.set(*date, 0.0);
        }
        for (bet, stake) in self.ordered().zip(self.allocations(kelly_ratio)) {
            let pnl = if bet.won {
                bet.price * stake.stake_fraction
            } else {
                -stake.stake_fraction
            };
            series.set(stake.date, series.get(stake.date) + pnl);
        }
        series
    }
}
