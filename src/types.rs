//! Core data types handed over by the forecasting pipeline

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One participant (team, player, runner) of an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    /// Realized points, `None` until the event is played
    #[serde(default)]
    pub points: Option<f64>,
    /// Decimal price offered on this participant winning
    #[serde(default)]
    pub price: Option<f64>,
    /// Model-estimated win probability
    #[serde(default)]
    pub probability: Option<f64>,
}

impl Participant {
    /// Probability if present and a real number
    pub fn known_probability(&self) -> Option<f64> {
        self.probability.filter(|p| !p.is_nan())
    }

    /// Price if present and usable (a finite payout above 1.0)
    pub fn known_price(&self) -> Option<f64> {
        self.price.filter(|o| o.is_finite() && *o > 1.0)
    }
}

/// A scheduled contest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub league: String,
    pub datetime: DateTime<Utc>,
    pub participants: Vec<Participant>,
}

impl Event {
    /// Calendar date (UTC) the event settles on
    pub fn date(&self) -> NaiveDate {
        self.datetime.date_naive()
    }

    /// An event is settled once every participant carries realized points
    pub fn is_settled(&self) -> bool {
        !self.participants.is_empty()
            && self.participants.iter().all(|p| p.points.is_some_and(|x| !x.is_nan()))
    }

    /// Whether at least one participant has a usable probability
    pub fn has_probabilities(&self) -> bool {
        self.participants.iter().any(|p| p.known_probability().is_some())
    }
}

/// The forecasting pipeline's table of events, past and upcoming
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventTable {
    pub events: Vec<Event>,
}

impl EventTable {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events that have been played
    pub fn settled(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(|e| e.is_settled())
    }

    /// Events that have not been played yet
    pub fn upcoming(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(|e| !e.is_settled())
    }

    /// SHA-256 of the table's JSON encoding, salted with `place`
    pub fn content_hash(&self, place: usize) -> String {
        let mut hasher = Sha256::new();
        // serializing plain data into a Vec cannot fail
        let encoded = serde_json::to_vec(self).unwrap_or_default();
        hasher.update(&encoded);
        hasher.update(place.to_le_bytes());
        hex::encode(hasher.finalize())
    }
}

/// The outcome backed on one settled event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetCandidate {
    pub event_id: String,
    pub date: NaiveDate,
    pub participant: String,
    pub probability: f64,
    pub price: f64,
    /// Unscaled kelly fraction before capital normalization
    pub raw_fraction: f64,
    /// Whether the backed participant placed
    pub won: bool,
}
