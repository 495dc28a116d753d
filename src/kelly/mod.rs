//! Kelly criterion stake sizing
//!
//! Raw fraction used for allocation:
//!     bet_prob = 1 / price
//!     f = max(p - (1 - p) / bet_prob, 0)
//!
//! The textbook net-odds form `f = p - (1 - p) / (price - 1)` is available as
//! [`canonical_kelly_fraction`]; allocation uses [`kelly_fraction`].


use crate::types::Event;
use serde::{Deserialize, Serialize};

/// Raw stake fraction for one outcome.
///
/// Returns `None` when the outcome cannot be sized (probability NaN or the
/// price missing/unusable); such outcomes are skipped, not errors.
///
/// # Examples
/// ```
/// use moneyball::kelly::kelly_fraction;
/// let f = kelly_fraction(0.8, Some(1.2)).unwrap();
/// assert!((f - 0.56).abs() < 1e-12);
/// assert_eq!(kelly_fraction(0.5, Some(2.0)), Some(0.0));
/// assert_eq!(kelly_fraction(f64::NAN, Some(2.0)), None);
/// ```
pub fn kelly_fraction(probability: f64, price: Option<f64>) -> Option<f64> {
    if probability.is_nan() {
        return None;
    }
    let price = price.filter(|o| o.is_finite() && *o > 1.0)?;
    let bet_prob = 1.0 / price;
    Some((probability - (1.0 - probability) / bet_prob).max(0.0))
}

/// Textbook Kelly with net odds `b = price - 1`: `f = p - (1 - p) / b`
pub fn canonical_kelly_fraction(probability: f64, price: Option<f64>) -> Option<f64> {
    if probability.is_nan() {
        return None;
    }
    let price = price.filter(|o| o.is_finite() && *o > 1.0)?;
    let net_odds = price - 1.0;
    Some((probability - (1.0 - probability) / net_odds).max(0.0))
}

/// The outcome backed on one event and its raw fraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackedOutcome {
    /// Index into `event.participants`
    pub index: usize,
    pub probability: f64,
    pub price: f64,
    pub raw_fraction: f64,
}

/// Pick the outcome to back on `event`.
///
/// Only participants with both a probability and a usable price are
/// eligible; `price_of` supplies the price so callers can fill gaps. The
/// highest probability wins, ties go to the participant listed first.
pub fn select_backed<F>(event: &Event, mut price_of: F) -> Option<BackedOutcome>
where
    F: FnMut(usize) -> Option<f64>,
{
    let mut best: Option<BackedOutcome> = None;
    for (index, participant) in event.participants.iter().enumerate() {
        let Some(probability) = participant.known_probability() else {
            continue;
        };
        let price = price_of(index);
        let Some(raw_fraction) = kelly_fraction(probability, price) else {
            continue;
        };
        let better = match &best {
            Some(b) => probability > b.probability,
            None => true,
        };
        if better {
            best = Some(BackedOutcome {
                index,
                probability,
                // kelly_fraction only succeeds with a usable price
                price: price.unwrap_or_default(),
                raw_fraction,
            });
        }
    }
    best
}

/// Normalize one date's raw fractions so total commitment never exceeds 1.0.
///
/// When the raw sum is above 1.0 every fraction is divided by the sum, which
/// keeps their proportions and commits exactly the whole bankroll. Otherwise
/// the fractions are returned unchanged.
pub fn allocate(raw_fractions: &[f64]) -> Vec<f64> {
    let total: f64 = raw_fractions.iter().sum();
    if total > 1.0 {
        raw_fractions.iter().map(|f| f / total).collect()
    } else {
        raw_fractions.to_vec()
    }
}

/// Scale then normalize, the per-date step of a kelly trial
pub fn allocate_scaled(raw_fractions: &[f64], kelly_ratio: f64) -> Vec<f64> {
    let scaled: Vec<f64> = raw_fractions.iter().map(|f| f * kelly_ratio).collect();
    allocate(&scaled)
}
